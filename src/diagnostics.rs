//!
//! Unified, `miette`-based diagnostics for pyast-json.
//!
//! Every failure in the pipeline (source acquisition, parsing, decoding, schema
//! checks, configuration) is an [`AstJsonError`]. Construct errors with the
//! macros rather than by hand:
//!
//! - `err_msg!(Decode, "unknown node_type '{}'", kind)` for message-only errors.
//! - `err_ctx!(Syntax, "invalid syntax", &src, span)` when a source and span are known.
//! - `err_ctx!(Syntax, "invalid syntax", &src, span, help)` to attach help text.
//!
//! Builder methods (`with_path`, `with_help`, `with_line`, `caused_by`) refine an
//! error after construction. At the tool boundary [`AstJsonError::to_payload`]
//! turns any error into the structured JSON object callers receive.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use serde_json::{json, Map, Value};
use thiserror::Error;

pub type SourceArc = Arc<NamedSource<String>>;

pub type Result<T> = std::result::Result<T, AstJsonError>;

type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Byte range into a named source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Error classification, one per [`AstJsonError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// File or module not found, undecodable bytes, unreadable JSON input
    Input,
    /// Source text failed to parse
    Syntax,
    /// JSON could not be rebuilt into a syntax tree
    Decode,
    /// Schema could not be loaded or compiled
    Schema,
    /// The build lacks an optional capability
    Capability,
    /// Configuration file missing or malformed
    Config,
    /// Nesting exceeded the configured maximum depth
    DepthLimit,
    Internal,
}

impl ErrorType {
    /// Stable string used in structured error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Input => "input_error",
            ErrorType::Syntax => "syntax_error",
            ErrorType::Decode => "decode_error",
            ErrorType::Schema => "schema_error",
            ErrorType::Capability => "capability_error",
            ErrorType::Config => "config_error",
            ErrorType::DepthLimit => "depth_limit_exceeded",
            ErrorType::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Line-oriented position of a syntax error, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, matching what Python reports for `SyntaxError.offset`.
    pub column: usize,
    /// The offending source line.
    pub text: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub line: Option<LineInfo>,
    /// Dotted path into the JSON document, e.g. `ast.body[0].value`.
    pub json_path: Option<String>,
}

impl ErrorContext {
    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            ..Self::default()
        }
    }
}

/// Unified error type for every pyast-json failure mode.
#[derive(Debug, Error)]
pub enum AstJsonError {
    #[error("{message}")]
    Input {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    Syntax {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    Decode {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    Schema {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    Capability {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("{message}")]
    DepthLimit {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl AstJsonError {
    fn parts(&self) -> (&String, &ErrorContext) {
        match self {
            AstJsonError::Input { message, ctx, .. }
            | AstJsonError::Syntax { message, ctx, .. }
            | AstJsonError::Decode { message, ctx, .. }
            | AstJsonError::Schema { message, ctx, .. }
            | AstJsonError::Capability { message, ctx, .. }
            | AstJsonError::Config { message, ctx, .. }
            | AstJsonError::DepthLimit { message, ctx, .. }
            | AstJsonError::Internal { message, ctx, .. } => (message, ctx),
        }
    }

    fn parts_mut(&mut self) -> (&mut ErrorContext, &mut Option<BoxedCause>) {
        match self {
            AstJsonError::Input { ctx, source, .. }
            | AstJsonError::Syntax { ctx, source, .. }
            | AstJsonError::Decode { ctx, source, .. }
            | AstJsonError::Schema { ctx, source, .. }
            | AstJsonError::Capability { ctx, source, .. }
            | AstJsonError::Config { ctx, source, .. }
            | AstJsonError::DepthLimit { ctx, source, .. }
            | AstJsonError::Internal { ctx, source, .. } => (ctx, source),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            AstJsonError::Input { .. } => ErrorType::Input,
            AstJsonError::Syntax { .. } => ErrorType::Syntax,
            AstJsonError::Decode { .. } => ErrorType::Decode,
            AstJsonError::Schema { .. } => ErrorType::Schema,
            AstJsonError::Capability { .. } => ErrorType::Capability,
            AstJsonError::Config { .. } => ErrorType::Config,
            AstJsonError::DepthLimit { .. } => ErrorType::DepthLimit,
            AstJsonError::Internal { .. } => ErrorType::Internal,
        }
    }

    pub fn message(&self) -> &str {
        self.parts().0
    }

    pub fn context(&self) -> &ErrorContext {
        self.parts().1
    }

    pub fn json_path(&self) -> Option<&str> {
        self.context().json_path.as_deref()
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.parts_mut().0.help = Some(help.into());
        self
    }

    /// Records the JSON path only if a deeper frame has not already done so.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let ctx = self.parts_mut().0;
        if ctx.json_path.is_none() {
            ctx.json_path = Some(path.into());
        }
        self
    }

    pub fn with_line(mut self, line: LineInfo) -> Self {
        self.parts_mut().0.line = Some(line);
        self
    }

    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        *self.parts_mut().1 = Some(Box::new(cause));
        self
    }

    /// Structured payload returned at the tool boundary.
    pub fn to_payload(&self) -> Value {
        let ctx = self.context();
        let mut payload = Map::new();
        payload.insert("error".into(), json!(self.message()));
        payload.insert("error_type".into(), json!(self.error_type().as_str()));
        if let Some(line) = &ctx.line {
            payload.insert("line".into(), json!(line.line));
            payload.insert("column".into(), json!(line.column));
            payload.insert("text".into(), json!(line.text));
        }
        if let Some(path) = &ctx.json_path {
            payload.insert("path".into(), json!(path));
        }
        if let Some(help) = &ctx.help {
            payload.insert("help".into(), json!(help));
        }
        Value::Object(payload)
    }
}

impl Diagnostic for AstJsonError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("pyast_json::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let ctx = self.context();
        match (&ctx.help, &ctx.json_path) {
            (Some(help), _) => Some(Box::new(help)),
            (None, Some(path)) => Some(Box::new(format!("at JSON path `{path}`"))),
            (None, None) => None,
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.context();
        let span = ctx.span?;
        ctx.source.as_ref()?;
        let len = span.end.saturating_sub(span.start).max(1);
        let label = LabeledSpan::new(Some(self.message().to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Converts source text into a named source for error contexts.
pub fn to_error_source<S: AsRef<str>>(name: &str, source: S) -> SourceArc {
    Arc::new(NamedSource::new(name, source.as_ref().to_string()))
}

/// Constructs an [`AstJsonError`] variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($fmt:tt)+) => {
        $crate::AstJsonError::$variant {
            message: format!($($fmt)+),
            ctx: $crate::ErrorContext::default(),
            source: None,
        }
    };
}

/// Constructs an [`AstJsonError`] variant with a message, named source, span and optional help.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::AstJsonError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                help: Some(format!("{}", $help)),
                ..$crate::ErrorContext::with_source_and_span(
                    $crate::diagnostics::SourceArc::clone($src),
                    $span,
                )
            },
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::AstJsonError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn test_report_includes_label_and_help() {
        let src = to_error_source("broken.py", "x = (1,\n");
        let err = err_ctx!(
            Syntax,
            "'(' was never closed",
            &src,
            Span { start: 4, end: 5 },
            "close the parenthesis"
        );
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("was never closed"));
        assert!(output.contains("close the parenthesis"));
        assert!(output.contains("pyast_json::syntax_error"));
    }

    #[test]
    fn test_error_chaining() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = err_msg!(Input, "File not found: {}", "missing.py").caused_by(io);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("File not found: missing.py"));
        assert!(output.contains("no such file"));
    }

    #[test]
    fn test_payload_shape() {
        let err = err_msg!(Syntax, "invalid syntax").with_line(LineInfo {
            line: 2,
            column: 5,
            text: "x = = 1".into(),
        });
        let payload = err.to_payload();
        assert_eq!(payload["error_type"], "syntax_error");
        assert_eq!(payload["line"], 2);
        assert_eq!(payload["column"], 5);
        assert_eq!(payload["text"], "x = = 1");
        assert!(payload.get("path").is_none());
    }

    #[test]
    fn test_innermost_path_wins() {
        let err = err_msg!(Decode, "missing field")
            .with_path("ast.body[0]")
            .with_path("ast");
        assert_eq!(err.json_path(), Some("ast.body[0]"));
        assert_eq!(err.to_payload()["path"], "ast.body[0]");
    }
}
