// tests/tool_tests.rs

use pyast_json::tool::TOOL_NAME;
use pyast_json::{ErrorType, PythonAstJsonTool, SourceType, ToolConfig, ToolRequest};
use serde_json::json;

// ---
// Source acquisition
// ---

#[test]
fn test_legacy_encoded_file_is_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.py");
    std::fs::write(&path, b"s = '\x93quoted\x94'\n").unwrap();

    let source = path.display().to_string();
    let doc = PythonAstJsonTool::default()
        .to_json(&source, SourceType::File, None)
        .unwrap();
    assert_eq!(doc["metadata"]["encoding"], "cp1252");
    assert_eq!(doc["metadata"]["source_file"], source);
    assert_eq!(
        doc["ast"]["body"][0]["value"]["value"],
        "\u{201c}quoted\u{201d}"
    );
}

#[test]
fn test_crlf_file_reads_like_lf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("windows.py");
    std::fs::write(&path, b"a = 'x\\\r\ny'\r\nb = \"\"\"p\r\nq\"\"\"\r\nc = 1\r\n").unwrap();

    let doc = PythonAstJsonTool::default()
        .to_json(&path.display().to_string(), SourceType::File, None)
        .unwrap();
    let body = &doc["ast"]["body"];
    assert_eq!(body[0]["value"]["value"], "xy");
    assert_eq!(body[1]["value"]["value"], "p\nq");
    assert_eq!(body[2]["location"]["lineno"], 5);
    assert_eq!(body[2]["location"]["end_col_offset"], 5);
}

#[test]
fn test_module_name_is_resolved_over_search_paths() {
    let dir = tempfile::tempdir().unwrap();
    let package = dir.path().join("pkg");
    std::fs::create_dir(&package).unwrap();
    std::fs::write(package.join("__init__.py"), "").unwrap();
    std::fs::write(package.join("util.py"), "def helper():\n    pass\n").unwrap();

    let config = ToolConfig {
        module_search_paths: vec![dir.path().to_path_buf()],
        ..ToolConfig::default()
    };
    let tool = PythonAstJsonTool::new(config);
    let doc = tool.to_json("pkg.util", SourceType::Module, None).unwrap();
    assert_eq!(doc["metadata"]["module_name"], "pkg.util");
    assert_eq!(doc["ast"]["body"][0]["name"], "helper");

    let package_doc = tool.to_json("pkg", SourceType::Module, None).unwrap();
    assert!(package_doc["metadata"]["source_file"]
        .as_str()
        .unwrap()
        .ends_with("__init__.py"));

    let err = tool.to_json("pkg.missing", SourceType::Module, None).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Input);
    assert_eq!(err.message(), "Module not found: pkg.missing");
}

#[test]
fn test_missing_file_is_an_input_error() {
    let response = PythonAstJsonTool::default().execute(ToolRequest::ToJson {
        source: "/definitely/not/here.py".into(),
        source_type: SourceType::File,
        include_metadata: None,
        format_output: None,
    });
    assert!(!response.success);
    assert_eq!(response.payload["error_type"], "input_error");
    assert_eq!(response.payload["error"], "File not found: /definitely/not/here.py");
}

#[test]
fn test_inline_code_carries_no_file_metadata() {
    let doc = PythonAstJsonTool::default()
        .to_json("pass\n", SourceType::Code, None)
        .unwrap();
    assert!(doc["metadata"].get("source_file").is_none());
    assert!(doc["metadata"].get("module_name").is_none());
}

// ---
// Execute
// ---

#[test]
fn test_syntax_error_payload() {
    let response = PythonAstJsonTool::default().execute_json(json!({
        "action": "to_json",
        "source": "x = 1\ndef broken(:\n",
        "source_type": "code"
    }));
    assert!(!response.success);
    let payload = &response.payload;
    assert_eq!(payload["error_type"], "syntax_error");
    assert_eq!(payload["line"], 2);
    assert!(payload["column"].as_u64().unwrap() >= 1);
    assert_eq!(payload["text"], "def broken(:");
}

#[test]
fn test_validate_action_reports_verdict_in_payload() {
    let tool = PythonAstJsonTool::default();
    let ok = tool.execute_json(json!({
        "action": "validate",
        "json_data": {"node_type": "Module", "body": []}
    }));
    assert!(ok.success);
    assert_eq!(ok.payload["valid"], true);
    assert_eq!(ok.payload["compile_mode"], "exec");

    let bad = tool.execute_json(json!({
        "action": "validate",
        "json_data": {"node_type": "Module", "body": [{"node_type": "Break"}]}
    }));
    assert!(bad.success);
    assert_eq!(bad.payload["valid"], false);
    assert_eq!(bad.payload["semantic_errors"][0], "'break' outside loop");
}

#[test]
fn test_from_json_accepts_json_text() {
    let tool = PythonAstJsonTool::default();
    let response = tool.execute_json(json!({
        "action": "from_json",
        "json_data": r#"{"node_type": "Module", "body": [{"node_type": "Pass"}]}"#
    }));
    if cfg!(feature = "unparse") {
        assert!(response.success, "{}", response.payload);
        assert_eq!(response.payload["source_code"], "pass");
        assert_eq!(response.payload["warnings"], json!([]));
    } else {
        assert_eq!(response.payload["error_type"], "capability_error");
    }
}

#[test]
fn test_format_output_controls_rendering() {
    let tool = PythonAstJsonTool::default();
    let request = |format_output| {
        json!({
            "action": "to_json",
            "source": "x = 1",
            "source_type": "code",
            "include_metadata": false,
            "format_output": format_output
        })
    };
    let pretty = tool.execute_json(request(true)).to_text().unwrap();
    let compact = tool.execute_json(request(false)).to_text().unwrap();
    assert!(pretty.contains('\n'));
    assert!(!compact.contains('\n'));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&pretty).unwrap(),
        serde_json::from_str::<serde_json::Value>(&compact).unwrap()
    );
}

#[test]
fn test_malformed_request_is_an_input_error() {
    let response = PythonAstJsonTool::default().execute_json(json!({"action": "to_json"}));
    assert!(!response.success);
    assert_eq!(response.payload["error_type"], "input_error");
    assert!(response.payload["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid tool request"));
}

#[test]
fn test_definition_names_the_tool() {
    let definition = PythonAstJsonTool::definition();
    assert_eq!(definition.name, TOOL_NAME);
    assert_eq!(definition.input_schema["required"], json!(["action"]));
}

// ---
// Configuration
// ---

#[test]
fn test_yaml_configuration() {
    let config = ToolConfig::from_yaml_str(
        "target:\n  python_version: 3.8.0\nmax_depth: 50\nfallback_encodings: [latin-1]\ninclude_metadata: false\n",
    )
    .unwrap();
    assert_eq!(config.max_depth, 50);
    assert!(!config.include_metadata);

    let doc = PythonAstJsonTool::new(config)
        .to_json("x = 1\n", SourceType::Code, None)
        .unwrap();
    assert_eq!(doc["metadata"]["python_version"], "3.8.0");
    assert!(doc["ast"]["body"][0].get("location").is_none());
}

#[test]
fn test_bad_configuration_is_rejected() {
    let err = ToolConfig::from_yaml_str("max_depth: 0\n").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Config);
    let err = ToolConfig::from_yaml_str("fallback_encodings: [ebcdic]\n").unwrap_err();
    assert_eq!(err.message(), "Unsupported fallback encoding 'ebcdic'");
    let err = ToolConfig::from_yaml_str("colour: always\n").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Config);
}

#[test]
fn test_configured_depth_applies_to_parsing() {
    let config = ToolConfig {
        max_depth: 3,
        ..ToolConfig::default()
    };
    let tool = PythonAstJsonTool::new(config);
    assert!(tool.to_json("x = 1", SourceType::Code, None).is_ok());
    let err = tool
        .to_json("x = [[[1]]]", SourceType::Code, None)
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::DepthLimit);
}
