// tests/validation_tests.rs

mod common;

use common::encode_bare;
use pyast_json::validation::CompileMode;
use pyast_json::{validate_ast_json, PythonAstJsonTool, ToolConfig};
use serde_json::{json, Value};

// ---
// Valid documents
// ---

#[test]
fn test_parsed_source_is_valid() {
    let doc = common::encode(
        "import os\n\nclass C:\n    def m(self):\n        for i in range(3):\n            if i:\n                break\n        return [x for x in y] if False else None\n",
    );
    let report = validate_ast_json(doc, None);
    assert!(report.valid, "{report:?}");
    assert!(report.schema_valid);
    assert_eq!(report.compile_mode, Some(CompileMode::Exec));
}

#[test]
fn test_expression_root_compiles_in_eval_mode() {
    let report = validate_ast_json(
        json!({"node_type": "Expression", "body": {"node_type": "Constant", "value": 1}}),
        None,
    );
    assert!(report.valid, "{report:?}");
    assert_eq!(report.compile_mode, Some(CompileMode::Eval));
}

#[test]
fn test_document_file_path_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    std::fs::write(&path, encode_bare("x = 1\n").to_string()).unwrap();
    let report = validate_ast_json(path.display().to_string(), None);
    assert!(report.valid, "{report:?}");
}

// ---
// Semantic failures on edited documents
// ---

/// Replaces the module body of `doc` with the body of its first statement.
fn hoist_first_body(mut doc: Value) -> Value {
    let inner = doc["ast"]["body"][0]["body"].clone();
    doc["ast"]["body"] = inner;
    doc
}

#[test]
fn test_return_outside_function() {
    let doc = hoist_first_body(encode_bare("def f():\n    return 1\n"));
    let report = validate_ast_json(doc, None);
    assert!(report.schema_valid);
    assert!(!report.valid);
    assert_eq!(report.semantic_errors, vec!["'return' outside function"]);
}

#[test]
fn test_continue_outside_loop() {
    let doc = hoist_first_body(encode_bare("while x:\n    continue\n"));
    let report = validate_ast_json(doc, None);
    assert_eq!(report.semantic_valid, Some(false));
    assert_eq!(report.semantic_errors, vec!["'continue' not properly in loop"]);
}

#[test]
fn test_keyword_used_as_identifier() {
    let mut doc = encode_bare("x = 1\n");
    doc["ast"]["body"][0]["targets"][0]["name"] = json!("class");
    let report = validate_ast_json(doc, None);
    assert!(report.schema_valid);
    assert_eq!(
        report.semantic_errors,
        vec!["'class' is a keyword and cannot be an identifier"]
    );
}

#[test]
fn test_semantic_errors_carry_line_numbers() {
    let doc = hoist_first_body(common::encode("def f():\n    return 1\n"));
    let report = validate_ast_json(doc, None);
    assert_eq!(report.semantic_errors, vec!["'return' outside function (line 2)"]);
}

// ---
// Structural failures
// ---

#[test]
fn test_wrong_field_type_fails_the_schema() {
    let mut doc = encode_bare("x = 1\n");
    doc["ast"]["body"][0]["targets"] = json!("x");
    let report = validate_ast_json(doc, None);
    assert!(!report.valid);
    assert!(!report.schema_valid);
    assert!(!report.schema_errors.is_empty());
    assert!(report.semantic_errors.is_empty());
    assert_eq!(report.compile_mode, None);
}

#[test]
fn test_unknown_node_type_fails_the_schema() {
    let report = validate_ast_json(json!({"node_type": "Frobnicate"}), None);
    assert!(!report.schema_valid);
}

#[test]
fn test_invalid_json_text_is_reported() {
    let report = validate_ast_json("{\"ast\": ", None);
    assert!(!report.valid);
    assert_eq!(report.schema_errors.len(), 1);
}

// ---
// Custom schemas
// ---

#[test]
fn test_configured_schema_applies_to_tool_validation() {
    let dir = tempfile::tempdir().unwrap();
    let schema = dir.path().join("strict.json");
    std::fs::write(&schema, r#"{"type": "object", "required": ["metadata"]}"#).unwrap();

    let config = ToolConfig {
        schema_path: Some(schema.clone()),
        ..ToolConfig::default()
    };
    let tool = PythonAstJsonTool::new(config);
    let bare = json!({"node_type": "Module", "body": []});
    assert!(!tool.validate(bare.clone(), None).schema_valid);

    let permissive = dir.path().join("open.json");
    std::fs::write(&permissive, r#"{"type": "object"}"#).unwrap();
    let report = tool.validate(bare, Some(&permissive));
    assert!(report.valid, "{report:?}");
}

// ---
// Scope and declaration rules
// ---

fn semantic_errors(source: &str) -> Vec<String> {
    let report = validate_ast_json(encode_bare(source), None);
    assert!(report.schema_valid, "{report:?}");
    report.semantic_errors
}

#[test]
fn test_sources_the_compiler_rejects() {
    let cases = [
        ("*a = b\n", "starred assignment target must be in a list or tuple"),
        ("def f():\n    nonlocal x\n", "no binding for nonlocal 'x' found"),
        ("x = 1\nglobal x\n", "name 'x' is assigned to before global declaration"),
        ("def f(x):\n    global x\n", "name 'x' is parameter and global"),
        ("x: int = 1\nglobal x\n", "annotated name 'x' can't be global"),
        ("def f():\n    print(x)\n    global x\n", "name 'x' is used prior to global declaration"),
        ("from __future__ import braces\n", "not a chance"),
        (
            "import os\nfrom __future__ import annotations\n",
            "from __future__ imports must occur at the beginning of the file",
        ),
        (
            "match v:\n    case a:\n        pass\n    case 1:\n        pass\n",
            "name capture 'a' makes remaining patterns unreachable",
        ),
    ];
    for (source, expected) in cases {
        assert_eq!(semantic_errors(source), vec![expected], "{source:?}");
    }
}

#[test]
fn test_valid_scoping_is_accepted() {
    let source = "from __future__ import annotations\n\
                  counter = 0\n\
                  def outer():\n    total = 0\n    def inner():\n        nonlocal total\n        global counter\n        total += 1\n        counter += 1\n    return inner\n\
                  match v:\n    case [x] if x:\n        pass\n    case _:\n        pass\n";
    assert!(semantic_errors(source).is_empty());
}
