//! Two-stage validation of AST documents.
//!
//! The structural stage checks the raw JSON against a schema (the generated
//! one unless a schema file is given). Only a structurally valid document is
//! decoded and compile-checked. Validation never fails: every problem,
//! including unreadable input, ends up in the [`ValidationReport`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::codec::{DecodeWarning, Decoder, JsonInput};
use crate::config::ToolConfig;

pub mod schema;
pub mod semantic;

pub use schema::builtin_schema;
pub use semantic::{compile_check, CompileMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub schema_valid: bool,
    pub schema_errors: Vec<String>,
    /// `None` when the structural stage failed and the document was not decoded.
    pub semantic_valid: Option<bool>,
    pub semantic_errors: Vec<String>,
    pub compile_mode: Option<CompileMode>,
    pub warnings: Vec<DecodeWarning>,
}

impl ValidationReport {
    fn structural_failure(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            schema_valid: false,
            schema_errors: errors,
            semantic_valid: None,
            semantic_errors: Vec::new(),
            compile_mode: None,
            warnings: Vec::new(),
        }
    }
}

/// Validates with the default decoder and the generated schema unless
/// `schema_path` names another.
pub fn validate_ast_json(input: impl Into<JsonInput>, schema_path: Option<&Path>) -> ValidationReport {
    let mut validator = AstValidator::new(Decoder::default());
    if let Some(path) = schema_path {
        validator = validator.with_schema(path);
    }
    validator.validate(input)
}

#[derive(Debug, Clone)]
pub struct AstValidator {
    decoder: Decoder,
    schema_path: Option<PathBuf>,
}

impl AstValidator {
    pub fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            schema_path: None,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            decoder: Decoder::from_config(config),
            schema_path: config.schema_path.clone(),
        }
    }

    pub fn with_schema(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn validate(&self, input: impl Into<JsonInput>) -> ValidationReport {
        match input.into().into_value() {
            Ok(document) => self.validate_value(&document),
            Err(err) => ValidationReport::structural_failure(vec![err.to_string()]),
        }
    }

    pub fn validate_value(&self, document: &Value) -> ValidationReport {
        let schema_errors = match self.structural(document) {
            Ok(errors) => errors,
            Err(err) => vec![err.to_string()],
        };
        if !schema_errors.is_empty() {
            tracing::debug!(count = schema_errors.len(), "document failed schema validation");
            return ValidationReport::structural_failure(schema_errors);
        }

        let (compile_mode, semantic_errors, warnings) = match self.decoder.decode_value(document) {
            Ok(decoded) => {
                let (mode, errors) = compile_check(&decoded.node);
                (mode, errors, decoded.warnings)
            }
            Err(err) => {
                let message = match err.json_path() {
                    Some(path) => format!("{} (at {})", err, path),
                    None => err.to_string(),
                };
                (None, vec![message], Vec::new())
            }
        };
        let semantic_valid = semantic_errors.is_empty();
        ValidationReport {
            valid: semantic_valid,
            schema_valid: true,
            schema_errors: Vec::new(),
            semantic_valid: Some(semantic_valid),
            semantic_errors,
            compile_mode,
            warnings,
        }
    }

    fn structural(&self, document: &Value) -> crate::Result<Vec<String>> {
        match &self.schema_path {
            Some(path) => {
                let validator = schema::load(path)?;
                Ok(schema::errors(&validator, document))
            }
            None => Ok(schema::errors(schema::builtin_validator()?, document)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_module_is_valid_in_exec_mode() {
        let report = validate_ast_json(json!({"ast": {"node_type": "Module", "body": []}}), None);
        assert!(report.valid, "{report:?}");
        assert_eq!(report.semantic_valid, Some(true));
        assert_eq!(report.compile_mode, Some(CompileMode::Exec));
    }

    #[test]
    fn structural_failure_skips_semantics() {
        let report = validate_ast_json(json!({"node_type": "FunctionDef"}), None);
        assert!(!report.valid);
        assert!(!report.schema_valid);
        assert!(!report.schema_errors.is_empty());
        assert_eq!(report.semantic_valid, None);
    }

    #[test]
    fn semantic_errors_follow_a_clean_schema_pass() {
        let report = validate_ast_json(
            json!({"node_type": "Module", "body": [{"node_type": "Break"}]}),
            None,
        );
        assert!(report.schema_valid);
        assert_eq!(report.semantic_valid, Some(false));
        assert_eq!(report.semantic_errors, vec!["'break' outside loop"]);
    }

    #[test]
    fn unreadable_input_is_reported_not_raised() {
        let report = validate_ast_json("{ not json", None);
        assert!(!report.valid);
        assert!(report.schema_errors[0].starts_with("Invalid JSON"));
    }

    #[test]
    fn custom_schema_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type": "object", "required": ["ast"]}"#).unwrap();
        let report = validate_ast_json(json!({"node_type": "Module", "body": []}), Some(&path));
        assert!(!report.schema_valid);
        let missing = validate_ast_json(json!({}), Some(&dir.path().join("missing.json")));
        assert!(missing.schema_errors[0].starts_with("Cannot read schema file"));
    }
}
