// tests/codec_tests.rs

mod common;

use common::{encode, encode_bare, module_body};
use pyast_json::codec::catalogue::{self, Group, NodeSpec, Shape, Slot, SlotKinds};
use pyast_json::codec::{Decoder, NODE_TYPE};
use pyast_json::syntax::{ExprKind, Operator, StmtKind};
use pyast_json::validation::schema::{builtin_validator, errors};
use pyast_json::{ast_to_json, json_to_ast, ErrorType};
use serde_json::{json, Map, Value};

// ---
// Encoder
// ---

#[test]
fn test_simple_assignment_envelope() {
    let doc = encode("x = 42");
    assert_eq!(doc["ast"]["node_type"], "Module");
    assert_eq!(doc["ast"]["type_ignores"], json!([]));

    let assign = &doc["ast"]["body"][0];
    assert_eq!(assign["node_type"], "Assign");
    assert_eq!(
        assign["targets"][0]["node_type"], "Identifier",
        "names are emitted as Identifier"
    );
    assert_eq!(assign["targets"][0]["name"], "x");
    assert_eq!(assign["targets"][0]["ctx"], "Store");
    assert_eq!(assign["value"]["node_type"], "Constant");
    assert_eq!(assign["value"]["value"], 42);
    assert_eq!(
        assign["location"],
        json!({"lineno": 1, "col_offset": 0, "end_lineno": 1, "end_col_offset": 6})
    );

    let metadata = &doc["metadata"];
    assert_eq!(metadata["python_version"], "3.12.0");
    assert_eq!(metadata["encoding"], "utf-8");
    let stamp = metadata["conversion_timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
}

#[test]
fn test_node_type_leads_every_node() {
    fn walk(value: &Value) {
        match value {
            Value::Object(obj) => {
                if obj.contains_key(NODE_TYPE) {
                    assert_eq!(obj.keys().next().map(String::as_str), Some(NODE_TYPE));
                }
                obj.values().for_each(walk);
            }
            Value::Array(items) => items.iter().for_each(walk),
            _ => {}
        }
    }
    walk(&encode(
        "@dec\nclass C(Base, metaclass=M):\n    \"\"\"Doc.\"\"\"\n    def m(self, *, k=1):\n        return [i async for i in self if i]\n",
    ));
}

#[test]
fn test_function_signature_document() {
    let doc = encode_bare("def f(a, b=1, *args, **kwargs): return a + b");
    let def = &doc["ast"]["body"][0];
    assert_eq!(def["node_type"], "FunctionDef");
    assert_eq!(def["name"], "f");
    assert!(def.get("location").is_none());

    let args = &def["args"];
    assert_eq!(args["node_type"], "arguments");
    let names: Vec<&str> = args["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["arg"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(args["defaults"].as_array().unwrap().len(), 1);
    assert_eq!(args["defaults"][0]["value"], 1);
    assert_eq!(args["vararg"]["arg"], "args");
    assert_eq!(args["kwarg"]["arg"], "kwargs");
    assert_eq!(args["kw_defaults"], json!([]));

    let ret = &def["body"][0];
    assert_eq!(ret["node_type"], "Return");
    assert_eq!(ret["value"]["node_type"], "BinOp");
    assert_eq!(ret["value"]["op"], "Add");
}

#[test]
fn test_docstrings_are_duplicated_not_moved() {
    let doc = encode_bare("def f():\n    \"\"\"Say hi.\"\"\"\n    return 1\n");
    let def = &doc["ast"]["body"][0];
    assert_eq!(def["docstring"], "Say hi.");
    assert_eq!(def["body"].as_array().unwrap().len(), 2);
    assert_eq!(def["body"][0]["value"]["value"], "Say hi.");
}

#[test]
fn test_non_native_constants_are_tagged() {
    let doc = encode_bare("b'\\xff'\n10**100\n99999999999999999999\n2j\n...\n1e999\n");
    let values: Vec<&Value> = doc["ast"]["body"]
        .as_array()
        .unwrap()
        .iter()
        .map(|stmt| &stmt["value"])
        .collect();
    assert_eq!(values[0]["constant_type"], "bytes");
    assert_eq!(values[0]["value"], "\u{ff}");
    assert_eq!(values[1]["node_type"], "BinOp");
    assert_eq!(values[2]["constant_type"], "int");
    assert_eq!(values[2]["value"], "99999999999999999999");
    assert_eq!(values[3]["constant_type"], "complex");
    assert_eq!(values[3]["value"], 2.0);
    assert_eq!(values[4]["constant_type"], "Ellipsis");
    assert_eq!(values[4]["value"], Value::Null);
    assert_eq!(values[5]["constant_type"], "float");
    assert_eq!(values[5]["value"], "inf");
}

// ---
// Decoder
// ---

#[test]
fn test_unknown_operator_decodes_as_add() {
    let decoded = Decoder::default()
        .decode(json!({
            "node_type": "BinOp",
            "left": {"node_type": "Constant", "value": 1},
            "op": "FrobnicateOp",
            "right": {"node_type": "Constant", "value": 2}
        }))
        .unwrap();
    let pyast_json::syntax::Node::Expr(expr) = &decoded.node else {
        panic!("expected an expression root");
    };
    assert!(matches!(expr.node, ExprKind::BinOp { op: Operator::Add, .. }));
    assert_eq!(decoded.warnings.len(), 1);
}

#[test]
fn test_bare_function_def_names_missing_field() {
    let err = json_to_ast(json!({"node_type": "FunctionDef"})).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Decode);
    assert!(err.message().contains("name"), "{}", err.message());
}

#[test]
fn test_unknown_and_absent_kinds_are_rejected() {
    let err = json_to_ast(json!({"node_type": "Frobnicate"})).unwrap_err();
    assert_eq!(err.message(), "unknown node_type 'Frobnicate'");
    let err = json_to_ast(json!({"ast": {"body": []}})).unwrap_err();
    assert_eq!(err.json_path(), Some("ast"));
    let err = json_to_ast(json!({"node_type": "Name", "id": "x"})).unwrap_err();
    assert!(err.to_payload()["help"].as_str().unwrap().contains("Identifier"));
}

#[test]
fn test_mismatched_defaults_are_rejected() {
    let function = |arguments: Value| {
        json!({"node_type": "Module", "body": [{
            "node_type": "FunctionDef",
            "name": "f",
            "args": arguments,
            "body": [{"node_type": "Pass"}]
        }]})
    };
    let arg = |name: &str| json!({"node_type": "arg", "arg": name});
    let one = json!({"node_type": "Constant", "value": 1});

    let err = json_to_ast(function(json!({
        "node_type": "arguments",
        "args": [arg("a")],
        "defaults": [one.clone(), one.clone()]
    })))
    .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Decode);
    assert!(err.json_path().unwrap().ends_with("args.defaults"), "{:?}", err.json_path());

    let err = json_to_ast(function(json!({
        "node_type": "arguments",
        "kwonlyargs": [arg("k")],
        "kw_defaults": []
    })))
    .unwrap_err();
    assert_eq!(
        err.message(),
        "kw_defaults has 0 entries for 1 keyword-only parameters"
    );

    // an absent kw_defaults still means "no defaults"
    let decoded = json_to_ast(function(json!({
        "node_type": "arguments",
        "kwonlyargs": [arg("k")]
    })))
    .unwrap();
    let StmtKind::FunctionDef(def) = &module_body(&decoded)[0].node else {
        panic!("expected def");
    };
    assert_eq!(def.args.kw_defaults, vec![None]);
}

#[test]
fn test_envelope_and_bare_root_decode_alike() {
    let doc = encode("if x:\n    y = [i for i in x]\n");
    let wrapped = json_to_ast(doc.clone()).unwrap();
    let bare = json_to_ast(doc["ast"].clone()).unwrap();
    assert_eq!(wrapped, bare);
    assert!(matches!(module_body(&wrapped)[0].node, StmtKind::If { .. }));
}

#[test]
fn test_reencoding_is_idempotent() {
    let source = "import os.path as p\nfrom . import y\n\nasync def run(a, /, b: int = 2, *, c):\n    \"\"\"Doc.\"\"\"\n    async with ctx() as (u, v):\n        await u\n    try:\n        pass\n    except (KeyError, ValueError) as err:\n        raise RuntimeError() from err\n    finally:\n        del a[0], b.attr\n    return {k: v for k, v in c.items() if k}\n";
    let first = encode(source);
    let second = ast_to_json(&json_to_ast(first.clone()).unwrap(), true);
    assert_eq!(first["ast"], second["ast"]);
}

// ---
// Catalogue coherence
// ---

fn minimal(spec: &NodeSpec) -> Value {
    let mut obj = Map::new();
    obj.insert(NODE_TYPE.into(), json!(spec.name));
    for field in spec.required_fields() {
        obj.insert(field.name.into(), minimal_shape(field.shape));
    }
    Value::Object(obj)
}

fn minimal_slot(slot: Slot) -> Value {
    match slot.accepts() {
        SlotKinds::Group(Group::Stmt) => json!({"node_type": "Pass"}),
        SlotKinds::Group(Group::Expr) => json!({"node_type": "Constant", "value": 1}),
        SlotKinds::Group(Group::Pattern) => json!({"node_type": "MatchAs"}),
        SlotKinds::Group(Group::TypeParam) => json!({"node_type": "TypeVar", "name": "T"}),
        SlotKinds::Group(other) => panic!("no field accepts {other:?}"),
        SlotKinds::Record(name) => minimal(catalogue::lookup(name).unwrap()),
    }
}

fn minimal_shape(shape: Shape) -> Value {
    match shape {
        Shape::Node(slot) | Shape::OptNode(slot) => minimal_slot(slot),
        Shape::Nodes(_) | Shape::OptNodes(_) | Shape::Strs | Shape::Tags(_) => json!([]),
        Shape::Str | Shape::OptStr => json!("x"),
        Shape::Int => json!(0),
        Shape::Tag(kind) => json!(kind.names()[0]),
        Shape::Value => Value::Null,
    }
}

#[test]
fn test_every_kind_decodes_from_its_minimal_shape() {
    let validator = builtin_validator().unwrap();
    for spec in catalogue::all() {
        let doc = minimal(spec);
        let node = Decoder::default()
            .decode_value(&doc)
            .unwrap_or_else(|e| panic!("{} failed to decode: {e}", spec.name))
            .node;
        let schema_errors = errors(validator, &doc);
        assert!(schema_errors.is_empty(), "{}: {schema_errors:?}", spec.name);

        let encoded = ast_to_json(&node, false);
        let root = encoded.get("ast").unwrap_or(&encoded);
        assert_eq!(root[NODE_TYPE], spec.name);
    }
}

#[test]
fn test_every_required_field_is_enforced() {
    for spec in catalogue::all() {
        for field in spec.required_fields() {
            let mut doc = minimal(spec);
            doc.as_object_mut().unwrap().remove(field.name);
            let err = Decoder::default().decode_value(&doc).unwrap_err();
            assert_eq!(
                err.message(),
                format!("missing required field '{}' on {}", field.name, spec.name)
            );
        }
    }
}
