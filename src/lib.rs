pub use crate::codec::{ast_to_json, json_to_ast, DecodeWarning, Decoder, Encoder, JsonInput};
pub use crate::config::{PythonVersion, TargetProfile, ToolConfig};
pub use crate::diagnostics::{to_error_source, AstJsonError, ErrorContext, ErrorType, Result};
pub use crate::tool::{PythonAstJsonTool, SourceType, ToolRequest, ToolResponse};
pub use crate::validation::{validate_ast_json, ValidationReport};

pub mod cli;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod syntax;
pub mod tool;
pub mod validation;

mod stack;
