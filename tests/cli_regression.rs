// tests/cli_regression.rs

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("pyast-json").unwrap()
}

// ---
// to-json / schema
// ---

#[test]
fn test_to_json_inline_code() {
    cli()
        .args(["to-json", "--source-type", "code", "x = 42"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""node_type": "Assign""#))
        .stdout(predicate::str::contains(r#""encoding": "utf-8""#));
}

#[test]
fn test_to_json_compact_without_locations() {
    cli()
        .args(["--compact", "to-json", "--source-type", "code", "--no-locations", "pass"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"node_type":"Pass"}"#))
        .stdout(predicate::str::contains("lineno").not());
}

#[test]
fn test_to_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.py");
    std::fs::write(&path, "def f():\n    return 1\n").unwrap();
    cli()
        .arg("to-json")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""node_type": "FunctionDef""#))
        .stdout(predicate::str::contains(r#""source_file""#));
}

#[test]
fn test_missing_file_fails_with_report() {
    cli()
        .args(["to-json", "/definitely/not/here.py"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("pyast_json::input_error"))
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_syntax_error_points_at_the_source() {
    cli()
        .args(["to-json", "--source-type", "code", "def broken(:\n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pyast_json::syntax_error"));
}

#[test]
fn test_schema_is_printed() {
    cli()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("$defs"))
        .stdout(predicate::str::contains("FunctionDef"));
}

// ---
// from-json / roundtrip
// ---

#[cfg(feature = "unparse")]
#[test]
fn test_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    let doc = pyast_json::PythonAstJsonTool::default()
        .to_json("x = 42\n", pyast_json::SourceType::Code, None)
        .unwrap();
    std::fs::write(&path, doc.to_string()).unwrap();
    cli()
        .arg("from-json")
        .arg(&path)
        .assert()
        .success()
        .stdout("x = 42\n");
}

#[cfg(feature = "unparse")]
#[test]
fn test_from_json_stdin() {
    cli()
        .args(["from-json", "-"])
        .write_stdin(r#"{"node_type": "Module", "body": [{"node_type": "Pass"}]}"#)
        .assert()
        .success()
        .stdout("pass\n");
}

#[cfg(feature = "unparse")]
#[test]
fn test_older_target_warns_on_stderr() {
    let doc = r#"{"node_type": "Module", "body": [{"node_type": "Expr", "value": {"node_type": "NamedExpr", "target": {"node_type": "Identifier", "name": "y", "ctx": "Store"}, "value": {"node_type": "Constant", "value": 1}}}]}"#;
    cli()
        .args(["--target", "3.7", "from-json", "-"])
        .write_stdin(doc)
        .assert()
        .success()
        .stdout("1\n")
        .stderr(predicate::str::contains("warning"));
}

#[cfg(feature = "unparse")]
#[test]
fn test_roundtrip_reports_matching_trees() {
    cli()
        .args(["roundtrip", "--source-type", "code", "x = (1 +  2)\n"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-x = (1 +  2)"))
        .stdout(predicate::str::contains("+x = 1 + 2"))
        .stdout(predicate::str::contains("syntax trees match"));
}

// ---
// validate / execute
// ---

#[test]
fn test_validate_valid_document() {
    cli()
        .args(["validate", r#"{"node_type": "Module", "body": []}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (exec mode)"));
}

#[test]
fn test_validate_invalid_document() {
    cli()
        .args([
            "validate",
            r#"{"node_type": "Module", "body": [{"node_type": "Break"}]}"#,
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("invalid"))
        .stdout(predicate::str::contains("semantic: 'break' outside loop"));
}

#[test]
fn test_execute_request() {
    cli()
        .args([
            "--compact",
            "execute",
            r#"{"action": "to_json", "source": "pass", "source_type": "code", "include_metadata": false}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""node_type":"Pass""#));
}

#[test]
fn test_execute_failure_sets_exit_status() {
    cli()
        .arg("execute")
        .write_stdin(r#"{"action": "to_json", "source": "/definitely/not/here.py"}"#)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error_type": "input_error""#));
}

#[test]
fn test_bad_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "max_depth: 0\n").unwrap();
    cli()
        .arg("--config")
        .arg(&path)
        .arg("schema")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pyast_json::config_error"));
}
