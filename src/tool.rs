//! The tool facade.
//!
//! [`PythonAstJsonTool`] is the only part of the crate that does I/O. It
//! acquires source text (file, module or inline code), runs the parser and the
//! encoder, and composes the decoder with the unparser. Tool-calling frameworks
//! go through [`PythonAstJsonTool::execute`], which never fails: every error is
//! turned into the structured payload of a [`ToolResponse`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::codec::{render_json, DecodeWarning, Encoder, JsonInput};
use crate::config::ToolConfig;
use crate::diagnostics::{AstJsonError, Result};
use crate::err_msg;
use crate::syntax::parser::{parse_source, ParseMode};
use crate::syntax::Node;
use crate::validation::{AstValidator, ValidationReport};

pub mod source;

use source::{read_source_file, resolve_module};

/// Name the tool registers under.
pub const TOOL_NAME: &str = "python_ast_json";

// ============================================================================
// REQUESTS & RESPONSES
// ============================================================================

/// How `to_json` interprets its `source` argument.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A path to a Python file.
    #[default]
    File,
    /// A dotted module name resolved over the search paths.
    Module,
    /// Python source text.
    Code,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::File => "file",
            SourceType::Module => "module",
            SourceType::Code => "code",
        }
    }
}

/// One tool invocation, as sent by a tool-calling framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum ToolRequest {
    ToJson {
        source: String,
        #[serde(default)]
        source_type: SourceType,
        #[serde(default)]
        include_metadata: Option<bool>,
        #[serde(default)]
        format_output: Option<bool>,
    },
    FromJson {
        /// A document, JSON text, or a path to a JSON file.
        json_data: Value,
    },
    Validate {
        json_data: Value,
        #[serde(default)]
        schema_path: Option<PathBuf>,
    },
}

impl ToolRequest {
    pub fn action(&self) -> &'static str {
        match self {
            ToolRequest::ToJson { .. } => "to_json",
            ToolRequest::FromJson { .. } => "from_json",
            ToolRequest::Validate { .. } => "validate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub payload: Value,
    #[serde(skip)]
    pub pretty: bool,
}

impl ToolResponse {
    fn success(payload: Value, pretty: bool) -> Self {
        Self {
            success: true,
            payload,
            pretty,
        }
    }

    fn failure(err: &AstJsonError, pretty: bool) -> Self {
        tracing::warn!(error_type = %err.error_type(), "{}", err);
        Self {
            success: false,
            payload: err.to_payload(),
            pretty,
        }
    }

    /// The payload rendered as the caller receives it.
    pub fn to_text(&self) -> Result<String> {
        render_json(&self.payload, self.pretty)
    }
}

/// Result of `from_json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FromJsonOutput {
    pub source_code: String,
    pub warnings: Vec<DecodeWarning>,
}

/// Source text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredSource {
    pub text: String,
    pub encoding: &'static str,
    pub path: Option<String>,
    pub module_name: Option<String>,
}

impl AcquiredSource {
    /// Name used in diagnostics.
    pub fn filename(&self) -> &str {
        self.path.as_deref().unwrap_or("<string>")
    }
}

/// Name, description and argument schema a tool-calling framework registers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// `json_data` strings are paths or JSON text; anything else is the document.
fn json_input(json_data: Value) -> JsonInput {
    match json_data {
        Value::String(text) => JsonInput::Text(text),
        other => JsonInput::Value(other),
    }
}

// ============================================================================
// FACADE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PythonAstJsonTool {
    config: ToolConfig,
}

impl PythonAstJsonTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Reads the text `source` names.
    pub fn acquire(&self, source: &str, source_type: SourceType) -> Result<AcquiredSource> {
        match source_type {
            SourceType::Code => Ok(AcquiredSource {
                text: source.to_string(),
                encoding: "utf-8",
                path: None,
                module_name: None,
            }),
            SourceType::File => {
                let loaded = read_source_file(Path::new(source), &self.config.encodings())?;
                Ok(AcquiredSource {
                    text: loaded.text,
                    encoding: loaded.encoding,
                    path: Some(source.to_string()),
                    module_name: None,
                })
            }
            SourceType::Module => {
                let path = resolve_module(source, &self.config.module_search_paths)?;
                let loaded = read_source_file(&path, &self.config.encodings())?;
                Ok(AcquiredSource {
                    text: loaded.text,
                    encoding: loaded.encoding,
                    path: Some(path.display().to_string()),
                    module_name: Some(source.to_string()),
                })
            }
        }
    }

    /// Parses `source` and returns its document envelope.
    pub fn to_json(
        &self,
        source: &str,
        source_type: SourceType,
        include_metadata: Option<bool>,
    ) -> Result<Value> {
        let acquired = self.acquire(source, source_type)?;
        let module = parse_source(
            &acquired.text,
            ParseMode::Exec,
            acquired.filename(),
            self.config.max_depth,
        )?;
        let mut encoder = Encoder::new(self.config.target)
            .include_metadata(include_metadata.unwrap_or(self.config.include_metadata))
            .source_encoding(acquired.encoding);
        if let Some(path) = &acquired.path {
            encoder = encoder.source_file(path.clone());
        }
        if let Some(name) = &acquired.module_name {
            encoder = encoder.module_name(name.clone());
        }
        tracing::info!(
            source_type = source_type.as_str(),
            filename = acquired.filename(),
            "encoded source"
        );
        Ok(encoder.encode(&Node::Mod(module)))
    }

    /// Rebuilds source text from a document.
    #[cfg(feature = "unparse")]
    pub fn from_json(&self, json_data: impl Into<JsonInput>) -> Result<FromJsonOutput> {
        let decoded = crate::codec::Decoder::from_config(&self.config).decode(json_data)?;
        tracing::info!(
            kind = decoded.node.kind_name(),
            warnings = decoded.warnings.len(),
            "regenerated source"
        );
        Ok(FromJsonOutput {
            source_code: crate::syntax::unparse::unparse_node(&decoded.node),
            warnings: decoded.warnings,
        })
    }

    /// Rebuilds source text from a document.
    #[cfg(not(feature = "unparse"))]
    pub fn from_json(&self, json_data: impl Into<JsonInput>) -> Result<FromJsonOutput> {
        let _ = json_data.into();
        Err(
            err_msg!(Capability, "Source regeneration is not available in this build")
                .with_help("rebuild pyast-json with `--features unparse`"),
        )
    }

    pub fn validate(&self, json_data: impl Into<JsonInput>, schema_path: Option<&Path>) -> ValidationReport {
        let mut validator = AstValidator::from_config(&self.config);
        if let Some(path) = schema_path {
            validator = validator.with_schema(path);
        }
        validator.validate(json_data)
    }

    /// Runs one request. Failures come back as error payloads.
    pub fn execute(&self, request: ToolRequest) -> ToolResponse {
        let pretty = self.config.format_output;
        tracing::debug!(action = request.action(), "executing tool request");
        match request {
            ToolRequest::ToJson {
                source,
                source_type,
                include_metadata,
                format_output,
            } => {
                let pretty = format_output.unwrap_or(pretty);
                match self.to_json(&source, source_type, include_metadata) {
                    Ok(document) => ToolResponse::success(document, pretty),
                    Err(err) => ToolResponse::failure(&err, pretty),
                }
            }
            ToolRequest::FromJson { json_data } => {
                match self.from_json(json_input(json_data)).and_then(|output| to_value(&output)) {
                    Ok(payload) => ToolResponse::success(payload, pretty),
                    Err(err) => ToolResponse::failure(&err, pretty),
                }
            }
            ToolRequest::Validate {
                json_data,
                schema_path,
            } => {
                let report = self.validate(json_input(json_data), schema_path.as_deref());
                match to_value(&report) {
                    Ok(payload) => ToolResponse::success(payload, pretty),
                    Err(err) => ToolResponse::failure(&err, pretty),
                }
            }
        }
    }

    /// Runs raw tool arguments (`{"action": "...", ...}`).
    pub fn execute_json(&self, arguments: Value) -> ToolResponse {
        match serde_json::from_value::<ToolRequest>(arguments) {
            Ok(request) => self.execute(request),
            Err(e) => {
                let err = err_msg!(Input, "Invalid tool request: {}", e)
                    .with_help("expected an object with `action` set to to_json, from_json or validate");
                ToolResponse::failure(&err, self.config.format_output)
            }
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Convert Python source to a JSON syntax tree, regenerate source \
                          from such a tree, or validate a tree."
                .to_string(),
            input_schema: input_schema(),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| err_msg!(Internal, "cannot serialize tool output: {}", e).caused_by(e))
}

fn input_schema() -> Value {
    let json_data = json!({
        "description": "A document object, JSON text, or a path to a JSON file.",
        "type": ["object", "string"],
    });
    json!({
        "type": "object",
        "required": ["action"],
        "oneOf": [
            {
                "properties": {
                    "action": { "const": "to_json" },
                    "source": { "type": "string" },
                    "source_type": { "enum": ["file", "module", "code"], "default": "file" },
                    "include_metadata": { "type": "boolean" },
                    "format_output": { "type": "boolean" },
                },
                "required": ["action", "source"],
            },
            {
                "properties": {
                    "action": { "const": "from_json" },
                    "json_data": json_data,
                },
                "required": ["action", "json_data"],
            },
            {
                "properties": {
                    "action": { "const": "validate" },
                    "json_data": json_data,
                    "schema_path": { "type": "string" },
                },
                "required": ["action", "json_data"],
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_deserialize_from_tool_arguments() {
        let request: ToolRequest = serde_json::from_value(json!({
            "action": "to_json",
            "source": "x = 1",
            "source_type": "code"
        }))
        .unwrap();
        assert_eq!(
            request,
            ToolRequest::ToJson {
                source: "x = 1".into(),
                source_type: SourceType::Code,
                include_metadata: None,
                format_output: None,
            }
        );
        let request: ToolRequest =
            serde_json::from_value(json!({"action": "validate", "json_data": "doc.json"})).unwrap();
        assert_eq!(request.action(), "validate");
    }

    #[test]
    fn unknown_actions_are_structured_failures() {
        let response = PythonAstJsonTool::default().execute_json(json!({"action": "frobnicate"}));
        assert!(!response.success);
        assert_eq!(response.payload["error_type"], "input_error");
    }

    #[test]
    fn string_json_data_is_text_input() {
        assert_eq!(json_input(json!("{}")), JsonInput::Text("{}".into()));
        assert_eq!(json_input(json!({})), JsonInput::Value(json!({})));
    }

    #[test]
    fn definition_schema_compiles() {
        let definition = PythonAstJsonTool::definition();
        assert_eq!(definition.name, TOOL_NAME);
        assert!(crate::validation::schema::compile(&definition.input_schema).is_ok());
    }

    #[test]
    fn code_sources_skip_source_metadata() {
        let doc = PythonAstJsonTool::default()
            .to_json("x = 1\n", SourceType::Code, None)
            .unwrap();
        assert!(doc["metadata"].get("source_file").is_none());
        assert_eq!(doc["ast"]["body"][0]["node_type"], "Assign");
    }
}
