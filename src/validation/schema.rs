//! JSON Schema for AST documents.
//!
//! The schema is generated from the node catalogue rather than maintained by
//! hand. Every kind gets a `$defs` entry; slot definitions (`AnyStmt`,
//! `AnyExpr`, ...) dispatch on `node_type` with `if`/`then` so a bad node
//! reports errors against its own kind instead of a wall of `anyOf` failures.

use std::path::Path;

use jsonschema::{Draft, Validator};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::codec::catalogue::{self, FieldSpec, Group, NodeSpec, Presence, Shape, Slot, SlotKinds, TagKind};
use crate::codec::{parse_json_text, NODE_TYPE};
use crate::diagnostics::Result;
use crate::err_msg;

const DRAFT_URI: &str = "https://json-schema.org/draft/2020-12/schema";

static BUILTIN_SCHEMA: Lazy<Value> = Lazy::new(generate);

static BUILTIN_VALIDATOR: Lazy<std::result::Result<Validator, String>> =
    Lazy::new(|| compile(&BUILTIN_SCHEMA).map_err(|e| e.to_string()));

/// The generated schema.
pub fn builtin_schema() -> &'static Value {
    &BUILTIN_SCHEMA
}

/// The compiled generated schema, built on first use.
pub fn builtin_validator() -> Result<&'static Validator> {
    BUILTIN_VALIDATOR
        .as_ref()
        .map_err(|e| err_msg!(Internal, "generated schema does not compile: {}", e))
}

pub fn compile(schema: &Value) -> Result<Validator> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|e| err_msg!(Schema, "invalid schema: {}", e))
}

/// Loads and compiles a schema file.
pub fn load(path: &Path) -> Result<Validator> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        err_msg!(Schema, "Cannot read schema file {}", path.display()).caused_by(e)
    })?;
    let schema = parse_json_text(&text)
        .map_err(|e| err_msg!(Schema, "Schema file {} is not JSON: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), "compiling schema file");
    compile(&schema)
}

/// Every violation, rendered as the validator's message.
pub fn errors(validator: &Validator, document: &Value) -> Vec<String> {
    crate::stack::with_deep_stack(|| {
        validator
            .iter_errors(document)
            .map(|err| err.to_string())
            .collect()
    })
}

// ============================================================================
// GENERATION
// ============================================================================

fn group_def(group: Group) -> &'static str {
    match group {
        Group::Mod => "AnyRoot",
        Group::Stmt => "AnyStmt",
        Group::Expr => "AnyExpr",
        Group::Pattern => "AnyPattern",
        Group::TypeParam => "AnyTypeParam",
        Group::Record => "AnyRecord",
    }
}

fn tag_def(kind: TagKind) -> &'static str {
    match kind {
        TagKind::Operator => "Operator",
        TagKind::BoolOperator => "BoolOperator",
        TagKind::UnaryOperator => "UnaryOperator",
        TagKind::CmpOperator => "CmpOperator",
        TagKind::ExprContext => "ExprContext",
    }
}

fn def_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{name}") })
}

fn slot_ref(slot: Slot) -> Value {
    match slot.accepts() {
        SlotKinds::Group(group) => def_ref(group_def(group)),
        SlotKinds::Record(name) => def_ref(name),
    }
}

fn nullable(schema: Value) -> Value {
    json!({ "anyOf": [{ "type": "null" }, schema] })
}

fn field_schema(field: &FieldSpec) -> Value {
    match field.shape {
        Shape::Node(slot) => slot_ref(slot),
        Shape::OptNode(slot) => nullable(slot_ref(slot)),
        Shape::Nodes(slot) => json!({ "type": "array", "items": slot_ref(slot) }),
        Shape::OptNodes(slot) => json!({ "type": "array", "items": nullable(slot_ref(slot)) }),
        Shape::Str => json!({ "type": "string" }),
        Shape::OptStr => json!({ "type": ["string", "null"] }),
        Shape::Strs => json!({ "type": "array", "items": { "type": "string" } }),
        Shape::Int => json!({ "type": ["integer", "boolean"] }),
        Shape::Tag(kind) => def_ref(tag_def(kind)),
        Shape::Tags(kind) => json!({ "type": "array", "items": def_ref(tag_def(kind)) }),
        Shape::Value => json!({ "type": ["null", "boolean", "number", "string"] }),
    }
}

fn kind_schema(spec: &NodeSpec) -> Value {
    let mut properties = Map::new();
    properties.insert(NODE_TYPE.into(), json!({ "const": spec.name }));
    for field in spec.fields {
        properties.insert(field.name.into(), field_schema(field));
    }
    if spec.located {
        properties.insert("location".into(), def_ref("Location"));
    }
    let mut required = vec![NODE_TYPE];
    required.extend(
        spec.fields
            .iter()
            .filter(|f| f.presence == Presence::Required)
            .map(|f| f.name),
    );
    json!({
        "type": "object",
        "required": required,
        "properties": properties,
    })
}

/// Object with a `node_type` drawn from `kinds`, checked against that kind's def.
fn dispatch_schema<'a>(kinds: impl Iterator<Item = &'a NodeSpec> + Clone) -> Value {
    let names: Vec<&str> = kinds.clone().map(|spec| spec.name).collect();
    let branches: Vec<Value> = kinds
        .map(|spec| {
            json!({
                "if": { "properties": { NODE_TYPE: { "const": spec.name } } },
                "then": def_ref(spec.name),
            })
        })
        .collect();
    json!({
        "type": "object",
        "required": [NODE_TYPE],
        "properties": { NODE_TYPE: { "enum": names } },
        "allOf": branches,
    })
}

fn generate() -> Value {
    let mut defs = Map::new();
    for spec in catalogue::all() {
        defs.insert(spec.name.into(), kind_schema(spec));
    }
    for group in [
        Group::Mod,
        Group::Stmt,
        Group::Expr,
        Group::Pattern,
        Group::TypeParam,
        Group::Record,
    ] {
        defs.insert(
            group_def(group).into(),
            dispatch_schema(catalogue::kinds_in(group)),
        );
    }
    defs.insert("AnyNode".into(), dispatch_schema(catalogue::all().iter()));
    for kind in [
        TagKind::Operator,
        TagKind::BoolOperator,
        TagKind::UnaryOperator,
        TagKind::CmpOperator,
        TagKind::ExprContext,
    ] {
        defs.insert(tag_def(kind).into(), json!({ "enum": kind.names() }));
    }
    let position = json!({ "type": "integer", "minimum": 0 });
    defs.insert(
        "Location".into(),
        json!({
            "type": "object",
            "required": ["lineno", "col_offset"],
            "properties": {
                "lineno": position,
                "col_offset": position,
                "end_lineno": position,
                "end_col_offset": position,
            },
        }),
    );
    defs.insert(
        "Metadata".into(),
        json!({
            "type": "object",
            "properties": {
                "python_version": { "type": "string" },
                "conversion_timestamp": { "type": "string" },
                "encoding": { "type": "string" },
                "source_file": { "type": "string" },
                "module_name": { "type": "string" },
            },
        }),
    );
    defs.insert(
        "Envelope".into(),
        json!({
            "type": "object",
            "required": ["ast"],
            "properties": {
                "ast": def_ref("AnyNode"),
                "metadata": def_ref("Metadata"),
            },
        }),
    );
    json!({
        "$schema": DRAFT_URI,
        "title": "Python AST JSON document",
        "description": "A syntax tree node, or a document envelope wrapping one.",
        "if": { "required": ["ast"], "not": { "required": [NODE_TYPE] } },
        "then": def_ref("Envelope"),
        "else": def_ref("AnyNode"),
        "$defs": defs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(document: Value) -> Vec<String> {
        errors(builtin_validator().unwrap(), &document)
    }

    #[test]
    fn generated_schema_compiles_and_covers_catalogue() {
        let schema = builtin_schema();
        for spec in catalogue::all() {
            assert!(schema["$defs"].get(spec.name).is_some(), "{}", spec.name);
        }
        assert!(builtin_validator().is_ok());
    }

    #[test]
    fn envelope_documents_validate() {
        let errors = check(json!({
            "ast": {"node_type": "Module", "body": [{
                "node_type": "Assign",
                "targets": [{"node_type": "Identifier", "name": "x", "ctx": "Store"}],
                "value": {"node_type": "Constant", "value": 42},
                "location": {"lineno": 1, "col_offset": 0, "end_lineno": 1, "end_col_offset": 6}
            }], "type_ignores": []},
            "metadata": {"python_version": "3.12.0", "encoding": "utf-8"}
        }));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn tags_are_strict_in_the_schema() {
        let errors = check(json!({
            "node_type": "BinOp",
            "left": {"node_type": "Constant", "value": 1},
            "op": "FrobnicateOp",
            "right": {"node_type": "Constant", "value": 2}
        }));
        assert!(!errors.is_empty());
    }

    #[test]
    fn missing_fields_and_wrong_slots_fail() {
        assert!(!check(json!({"node_type": "FunctionDef"})).is_empty());
        assert!(!check(json!({"node_type": "Frobnicate"})).is_empty());
        assert!(!check(json!({"node_type": "Expr", "value": {"node_type": "Pass"}})).is_empty());
        assert!(!check(json!([1, 2])).is_empty());
    }
}
