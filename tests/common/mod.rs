//! Shared helpers for the integration suites.

#![allow(dead_code)]

use pyast_json::syntax::{Mod, Node, Stmt};
use pyast_json::{PythonAstJsonTool, SourceType};
use serde_json::Value;

/// Stack for tests that build or walk trees near the nesting limit.
const DEEP_STACK: usize = 64 * 1024 * 1024;

/// Runs `f` on a thread with a large stack and returns its result.
pub fn on_big_stack<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .stack_size(DEEP_STACK)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

/// Encodes inline source with the default tool, locations included.
pub fn encode(source: &str) -> Value {
    PythonAstJsonTool::default()
        .to_json(source, SourceType::Code, Some(true))
        .unwrap()
}

/// Encodes inline source without locations.
pub fn encode_bare(source: &str) -> Value {
    PythonAstJsonTool::default()
        .to_json(source, SourceType::Code, Some(false))
        .unwrap()
}

pub fn module_body(node: &Node) -> &[Stmt] {
    match node {
        Node::Mod(Mod::Module { body, .. }) => body,
        other => panic!("expected a module, got {}", other.kind_name()),
    }
}

/// `x + x + ... + x` with `operands` terms, left-nested like the parser builds it.
pub fn binary_chain(operands: usize) -> String {
    vec!["x"; operands].join(" + ")
}
