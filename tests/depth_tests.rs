// tests/depth_tests.rs
//
// The parser and the decoder share one nesting contract: a document the
// parser rejects at some `max_depth` is rejected by the decoder at the same
// limit, and vice versa.

mod common;

use common::{binary_chain, on_big_stack};
use pyast_json::codec::{render_json, Decoder};
use pyast_json::config::{TargetProfile, DEFAULT_MAX_DEPTH};
use pyast_json::syntax::{parse_source, ParseMode};
use pyast_json::{ast_to_json, ErrorType, PythonAstJsonTool, SourceType};
use serde_json::json;

#[test]
fn test_thousand_deep_binary_expression_hits_the_limit() {
    on_big_stack(|| {
        let source = format!("y = {}\n", binary_chain(1000));
        let tool = PythonAstJsonTool::default();
        let err = tool.to_json(&source, SourceType::Code, None).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DepthLimit);
        assert_eq!(
            err.message(),
            format!("nesting depth exceeds the configured maximum of {DEFAULT_MAX_DEPTH}")
        );
        let payload = err.to_payload();
        assert_eq!(payload["error_type"], "depth_limit_exceeded");
        assert!(payload["line"].is_number());

        let response = tool.execute_json(json!({
            "action": "to_json",
            "source": source,
            "source_type": "code"
        }));
        assert!(!response.success);
        assert_eq!(response.payload["error_type"], "depth_limit_exceeded");
    });
}

#[test]
fn test_thousand_deep_document_hits_the_same_limit() {
    on_big_stack(|| {
        let source = format!("y = {}\n", binary_chain(1000));
        let tree = parse_source(&source, ParseMode::Exec, "<deep>", 2000).unwrap();
        let doc = ast_to_json(&tree.into(), false);

        let err = Decoder::default().decode_value(&doc).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DepthLimit);
        assert!(err.json_path().unwrap().starts_with("ast.body[0].value"));

        assert!(Decoder::new(TargetProfile::default(), 2000)
            .decode_value(&doc)
            .is_ok());
    });
}

#[test]
fn test_parser_and_decoder_agree_on_every_threshold() {
    on_big_stack(|| {
        for source in [
            format!("y = {}\n", binary_chain(12)),
            "def f():\n    if a:\n        return [x for x in (-b, not c)]\n".to_string(),
            "match p:\n    case [1, [2, (3 | 4)]] | m.C(x=a.b.c):\n        pass\n".to_string(),
        ] {
            let tree = parse_source(&source, ParseMode::Exec, "<depth>", 500).unwrap();
            let doc = ast_to_json(&tree.into(), false);
            for max_depth in 1..=20 {
                let parsed = parse_source(&source, ParseMode::Exec, "<depth>", max_depth).is_ok();
                let decoded = Decoder::new(TargetProfile::default(), max_depth)
                    .decode_value(&doc)
                    .is_ok();
                assert_eq!(parsed, decoded, "max_depth {max_depth} for:\n{source}");
            }
        }
    });
}

#[test]
fn test_json_text_nesting_is_bounded_by_the_decoder() {
    on_big_stack(|| {
        let mut text = String::from(r#"{"node_type": "Identifier", "name": "x"}"#);
        for _ in 0..1000 {
            text = format!(r#"{{"node_type": "UnaryOp", "op": "Not", "operand": {text}}}"#);
        }
        let err = pyast_json::json_to_ast(text.as_str()).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DepthLimit);
    });
}

/// `x = (1 + (1 + ... 1))` with `levels` additions, nested to the right.
fn right_nested_sum(levels: usize) -> String {
    let mut expr = "1".to_string();
    for _ in 0..levels {
        expr = format!("(1 + {expr})");
    }
    format!("x = {expr}\n")
}

#[test]
fn test_deepest_accepted_tree_survives_a_small_thread() {
    let outcome = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let tool = PythonAstJsonTool::default();
            let deepest = (DEFAULT_MAX_DEPTH - 10..=DEFAULT_MAX_DEPTH)
                .rev()
                .find(|&n| tool.to_json(&right_nested_sum(n), SourceType::Code, None).is_ok())
                .expect("a sum just under the limit parses");
            let err = tool
                .to_json(&right_nested_sum(deepest + 1), SourceType::Code, None)
                .unwrap_err();
            assert_eq!(err.error_type(), ErrorType::DepthLimit);

            let doc = tool
                .to_json(&right_nested_sum(deepest), SourceType::Code, Some(false))
                .unwrap();
            let text = render_json(&doc, true).unwrap();
            let report = tool.validate(text.as_str(), None);
            assert!(report.valid, "{:?}", report.semantic_errors);
            assert!(Decoder::default().decode(text.as_str()).is_ok());

            #[cfg(feature = "unparse")]
            {
                let regenerated = tool.from_json(text.as_str()).unwrap();
                let again = tool
                    .to_json(&regenerated.source_code, SourceType::Code, Some(false))
                    .unwrap();
                assert_eq!(doc["ast"], again["ast"]);
            }
        })
        .unwrap()
        .join();
    assert!(outcome.is_ok(), "walking a tree at the nesting limit overflowed");
}
