//! Conversion between syntax trees and their JSON documents.
//!
//! [`encode`] turns any [`Node`](crate::syntax::Node) into JSON, wrapping a
//! `Module` root in the document envelope. [`decode`] rebuilds trees from JSON,
//! checking kinds and required fields against the shared [`catalogue`].

use serde::Deserialize;
use serde_json::Value;

use crate::diagnostics::Result;
use crate::err_msg;

pub mod catalogue;
pub mod decode;
pub mod encode;

pub use decode::{json_to_ast, DecodeWarning, Decoded, Decoder, JsonInput};
pub use encode::{ast_to_json, Encoder};

/// JSON field naming the kind of every node.
pub const NODE_TYPE: &str = "node_type";

/// JSON tag used for `Name` nodes.
pub const IDENTIFIER: &str = "Identifier";

/// Parses JSON text without serde_json's recursion cap; nesting is bounded by
/// the decoder's depth limit instead.
pub fn parse_json_text(text: &str) -> Result<Value> {
    crate::stack::with_deep_stack(|| {
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let value = Value::deserialize(&mut de)
            .map_err(|e| err_msg!(Input, "Invalid JSON: {}", e).caused_by(e))?;
        de.end()
            .map_err(|e| err_msg!(Input, "Invalid JSON: {}", e).caused_by(e))?;
        Ok(value)
    })
}

/// Renders a document the way the tool returns it.
pub fn render_json(value: &Value, pretty: bool) -> Result<String> {
    let rendered = crate::stack::with_deep_stack(|| {
        if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    });
    rendered.map_err(|e| err_msg!(Internal, "cannot serialize JSON: {}", e).caused_by(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_text_has_no_recursion_cap() {
        let deep = format!("{}{}", "[".repeat(1000), "]".repeat(1000));
        assert!(parse_json_text(&deep).is_ok());
        assert!(parse_json_text("{\"a\": 1} trailing").is_err());
    }

    #[test]
    fn floats_survive_text() {
        let value = parse_json_text("[0.9468822170900693, 1e-7, 2.5]").unwrap();
        assert_eq!(value[0].as_f64(), Some(0.9468822170900693));
        assert_eq!(
            render_json(&value, false).unwrap(),
            "[0.9468822170900693,1e-7,2.5]"
        );
    }
}
