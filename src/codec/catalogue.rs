//! The closed node catalogue.
//!
//! One [`NodeSpec`] per JSON `node_type`, listing the fields that kind carries,
//! their shapes and whether the decoder may default them. The decoder checks
//! required fields against this table before rebuilding a node and the schema
//! generator derives its `$defs` from it, so the two cannot drift apart.

use crate::config::Feature;
use crate::syntax::{BoolOperator, CmpOperator, ExprContext, Operator, UnaryOperator};

/// Broad category a kind belongs to; decides which slots accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Mod,
    Stmt,
    Expr,
    Pattern,
    TypeParam,
    Record,
}

/// What a node-valued field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Stmt,
    Expr,
    Pattern,
    TypeParam,
    Arguments,
    Arg,
    Keyword,
    Alias,
    WithItem,
    MatchCase,
    Comprehension,
    ExceptHandler,
    TypeIgnore,
}

impl Slot {
    /// The group for open slots, or the single record kind for closed ones.
    pub fn accepts(&self) -> SlotKinds {
        match self {
            Slot::Stmt => SlotKinds::Group(Group::Stmt),
            Slot::Expr => SlotKinds::Group(Group::Expr),
            Slot::Pattern => SlotKinds::Group(Group::Pattern),
            Slot::TypeParam => SlotKinds::Group(Group::TypeParam),
            Slot::Arguments => SlotKinds::Record("arguments"),
            Slot::Arg => SlotKinds::Record("arg"),
            Slot::Keyword => SlotKinds::Record("keyword"),
            Slot::Alias => SlotKinds::Record("alias"),
            Slot::WithItem => SlotKinds::Record("withitem"),
            Slot::MatchCase => SlotKinds::Record("match_case"),
            Slot::Comprehension => SlotKinds::Record("comprehension"),
            Slot::ExceptHandler => SlotKinds::Record("ExceptHandler"),
            Slot::TypeIgnore => SlotKinds::Record("TypeIgnore"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKinds {
    Group(Group),
    Record(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Operator,
    BoolOperator,
    UnaryOperator,
    CmpOperator,
    ExprContext,
}

impl TagKind {
    pub fn names(&self) -> Vec<&'static str> {
        match self {
            TagKind::Operator => Operator::names(),
            TagKind::BoolOperator => BoolOperator::names(),
            TagKind::UnaryOperator => UnaryOperator::names(),
            TagKind::CmpOperator => CmpOperator::names(),
            TagKind::ExprContext => ExprContext::names(),
        }
    }

    pub fn fallback(&self) -> &'static str {
        match self {
            TagKind::Operator => Operator::FALLBACK.name(),
            TagKind::BoolOperator => BoolOperator::FALLBACK.name(),
            TagKind::UnaryOperator => UnaryOperator::FALLBACK.name(),
            TagKind::CmpOperator => CmpOperator::FALLBACK.name(),
            TagKind::ExprContext => ExprContext::FALLBACK.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Node(Slot),
    OptNode(Slot),
    Nodes(Slot),
    /// List whose entries may be `null` (`Dict.keys`, `kw_defaults`).
    OptNodes(Slot),
    Str,
    OptStr,
    Strs,
    Int,
    Tag(TagKind),
    Tags(TagKind),
    /// `Constant.value` / `MatchSingleton.value`: any JSON scalar.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    Required,
    Optional,
    /// Optional statement list that decodes to `[Pass]` when absent.
    Block,
    /// Emitted by the encoder for readers; ignored on decode.
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: Shape,
    pub presence: Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpec {
    /// JSON `node_type`.
    pub name: &'static str,
    pub group: Group,
    /// Whether nodes of this kind carry a `location`.
    pub located: bool,
    /// Syntax that only exists from some Python release on.
    pub feature: Option<Feature>,
    pub fields: &'static [FieldSpec],
}

impl NodeSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| f.presence == Presence::Required)
    }
}

pub fn lookup(name: &str) -> Option<&'static NodeSpec> {
    CATALOGUE.iter().find(|spec| spec.name == name)
}

pub fn all() -> &'static [NodeSpec] {
    CATALOGUE
}

pub fn kinds_in(group: Group) -> impl Iterator<Item = &'static NodeSpec> + Clone {
    CATALOGUE.iter().filter(move |spec| spec.group == group)
}

// ============================================================================
// CATALOGUE
// ============================================================================

const fn f(name: &'static str, shape: Shape, presence: Presence) -> FieldSpec {
    FieldSpec {
        name,
        shape,
        presence,
    }
}

const fn node(
    name: &'static str,
    group: Group,
    located: bool,
    fields: &'static [FieldSpec],
) -> NodeSpec {
    NodeSpec {
        name,
        group,
        located,
        feature: None,
        fields,
    }
}

const fn gated(spec: NodeSpec, feature: Feature) -> NodeSpec {
    NodeSpec {
        feature: Some(feature),
        ..spec
    }
}

use Presence::{Block, Derived, Optional, Required};
use Shape::{Int, Node, Nodes, OptNode, OptNodes, OptStr, Str, Strs, Tag, Tags, Value};

const FUNCTION_FIELDS: &[FieldSpec] = &[
    f("name", Str, Required),
    f("type_params", Nodes(Slot::TypeParam), Optional),
    f("args", Node(Slot::Arguments), Required),
    f("body", Nodes(Slot::Stmt), Block),
    f("decorator_list", Nodes(Slot::Expr), Optional),
    f("returns", OptNode(Slot::Expr), Optional),
    f("docstring", OptStr, Derived),
];

const FOR_FIELDS: &[FieldSpec] = &[
    f("target", Node(Slot::Expr), Required),
    f("iter", Node(Slot::Expr), Required),
    f("body", Nodes(Slot::Stmt), Block),
    f("orelse", Nodes(Slot::Stmt), Optional),
];

const WITH_FIELDS: &[FieldSpec] = &[
    f("items", Nodes(Slot::WithItem), Optional),
    f("body", Nodes(Slot::Stmt), Block),
];

const TRY_FIELDS: &[FieldSpec] = &[
    f("body", Nodes(Slot::Stmt), Block),
    f("handlers", Nodes(Slot::ExceptHandler), Optional),
    f("orelse", Nodes(Slot::Stmt), Optional),
    f("finalbody", Nodes(Slot::Stmt), Optional),
];

const COMP_FIELDS: &[FieldSpec] = &[
    f("elt", Node(Slot::Expr), Required),
    f("generators", Nodes(Slot::Comprehension), Optional),
];

const CTX: FieldSpec = f("ctx", Tag(TagKind::ExprContext), Optional);
const ELTS: FieldSpec = f("elts", Nodes(Slot::Expr), Optional);
const DEFAULT_VALUE: FieldSpec = f("default_value", OptNode(Slot::Expr), Optional);
const NO_FIELDS: &[FieldSpec] = &[];

static CATALOGUE: &[NodeSpec] = &[
    // Roots
    node(
        "Module",
        Group::Mod,
        false,
        &[
            f("body", Nodes(Slot::Stmt), Optional),
            f("type_ignores", Nodes(Slot::TypeIgnore), Optional),
        ],
    ),
    node("Interactive", Group::Mod, false, &[f("body", Nodes(Slot::Stmt), Optional)]),
    node("Expression", Group::Mod, false, &[f("body", Node(Slot::Expr), Required)]),
    node(
        "FunctionType",
        Group::Mod,
        false,
        &[
            f("argtypes", Nodes(Slot::Expr), Optional),
            f("returns", Node(Slot::Expr), Required),
        ],
    ),
    // Statements
    node("FunctionDef", Group::Stmt, true, FUNCTION_FIELDS),
    node("AsyncFunctionDef", Group::Stmt, true, FUNCTION_FIELDS),
    node(
        "ClassDef",
        Group::Stmt,
        true,
        &[
            f("name", Str, Required),
            f("type_params", Nodes(Slot::TypeParam), Optional),
            f("bases", Nodes(Slot::Expr), Optional),
            f("keywords", Nodes(Slot::Keyword), Optional),
            f("body", Nodes(Slot::Stmt), Block),
            f("decorator_list", Nodes(Slot::Expr), Optional),
            f("docstring", OptStr, Derived),
        ],
    ),
    node("Return", Group::Stmt, true, &[f("value", OptNode(Slot::Expr), Optional)]),
    node("Delete", Group::Stmt, true, &[f("targets", Nodes(Slot::Expr), Optional)]),
    node(
        "Assign",
        Group::Stmt,
        true,
        &[
            f("targets", Nodes(Slot::Expr), Optional),
            f("value", Node(Slot::Expr), Required),
        ],
    ),
    gated(
        node(
            "TypeAlias",
            Group::Stmt,
            true,
            &[
                f("name", Node(Slot::Expr), Required),
                f("type_params", Nodes(Slot::TypeParam), Optional),
                f("value", Node(Slot::Expr), Required),
            ],
        ),
        Feature::TypeParams,
    ),
    node(
        "AugAssign",
        Group::Stmt,
        true,
        &[
            f("target", Node(Slot::Expr), Required),
            f("op", Tag(TagKind::Operator), Required),
            f("value", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "AnnAssign",
        Group::Stmt,
        true,
        &[
            f("target", Node(Slot::Expr), Required),
            f("annotation", Node(Slot::Expr), Required),
            f("value", OptNode(Slot::Expr), Optional),
            f("simple", Int, Optional),
        ],
    ),
    node("For", Group::Stmt, true, FOR_FIELDS),
    node("AsyncFor", Group::Stmt, true, FOR_FIELDS),
    node(
        "While",
        Group::Stmt,
        true,
        &[
            f("test", Node(Slot::Expr), Required),
            f("body", Nodes(Slot::Stmt), Block),
            f("orelse", Nodes(Slot::Stmt), Optional),
        ],
    ),
    node(
        "If",
        Group::Stmt,
        true,
        &[
            f("test", Node(Slot::Expr), Required),
            f("body", Nodes(Slot::Stmt), Block),
            f("orelse", Nodes(Slot::Stmt), Optional),
        ],
    ),
    node("With", Group::Stmt, true, WITH_FIELDS),
    node("AsyncWith", Group::Stmt, true, WITH_FIELDS),
    gated(
        node(
            "Match",
            Group::Stmt,
            true,
            &[
                f("subject", Node(Slot::Expr), Required),
                f("cases", Nodes(Slot::MatchCase), Optional),
            ],
        ),
        Feature::MatchStatement,
    ),
    node(
        "Raise",
        Group::Stmt,
        true,
        &[
            f("exc", OptNode(Slot::Expr), Optional),
            f("cause", OptNode(Slot::Expr), Optional),
        ],
    ),
    node("Try", Group::Stmt, true, TRY_FIELDS),
    gated(node("TryStar", Group::Stmt, true, TRY_FIELDS), Feature::ExceptStar),
    node(
        "Assert",
        Group::Stmt,
        true,
        &[
            f("test", Node(Slot::Expr), Required),
            f("msg", OptNode(Slot::Expr), Optional),
        ],
    ),
    node("Import", Group::Stmt, true, &[f("names", Nodes(Slot::Alias), Optional)]),
    node(
        "ImportFrom",
        Group::Stmt,
        true,
        &[
            f("module", OptStr, Optional),
            f("names", Nodes(Slot::Alias), Optional),
            f("level", Int, Optional),
        ],
    ),
    node("Global", Group::Stmt, true, &[f("names", Strs, Optional)]),
    node("Nonlocal", Group::Stmt, true, &[f("names", Strs, Optional)]),
    node("Expr", Group::Stmt, true, &[f("value", Node(Slot::Expr), Required)]),
    node("Pass", Group::Stmt, true, NO_FIELDS),
    node("Break", Group::Stmt, true, NO_FIELDS),
    node("Continue", Group::Stmt, true, NO_FIELDS),
    // Expressions
    node(
        "BoolOp",
        Group::Expr,
        true,
        &[
            f("op", Tag(TagKind::BoolOperator), Required),
            f("values", Nodes(Slot::Expr), Optional),
        ],
    ),
    gated(
        node(
            "NamedExpr",
            Group::Expr,
            true,
            &[
                f("target", Node(Slot::Expr), Required),
                f("value", Node(Slot::Expr), Required),
            ],
        ),
        Feature::NamedExpr,
    ),
    node(
        "BinOp",
        Group::Expr,
        true,
        &[
            f("left", Node(Slot::Expr), Required),
            f("op", Tag(TagKind::Operator), Required),
            f("right", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "UnaryOp",
        Group::Expr,
        true,
        &[
            f("op", Tag(TagKind::UnaryOperator), Required),
            f("operand", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "Lambda",
        Group::Expr,
        true,
        &[
            f("args", Node(Slot::Arguments), Required),
            f("body", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "IfExp",
        Group::Expr,
        true,
        &[
            f("test", Node(Slot::Expr), Required),
            f("body", Node(Slot::Expr), Required),
            f("orelse", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "Dict",
        Group::Expr,
        true,
        &[
            f("keys", OptNodes(Slot::Expr), Optional),
            f("values", Nodes(Slot::Expr), Optional),
        ],
    ),
    node("Set", Group::Expr, true, &[ELTS]),
    node("ListComp", Group::Expr, true, COMP_FIELDS),
    node("SetComp", Group::Expr, true, COMP_FIELDS),
    node(
        "DictComp",
        Group::Expr,
        true,
        &[
            f("key", Node(Slot::Expr), Required),
            f("value", Node(Slot::Expr), Required),
            f("generators", Nodes(Slot::Comprehension), Optional),
        ],
    ),
    node("GeneratorExp", Group::Expr, true, COMP_FIELDS),
    node("Await", Group::Expr, true, &[f("value", Node(Slot::Expr), Required)]),
    node("Yield", Group::Expr, true, &[f("value", OptNode(Slot::Expr), Optional)]),
    node("YieldFrom", Group::Expr, true, &[f("value", Node(Slot::Expr), Required)]),
    node(
        "Compare",
        Group::Expr,
        true,
        &[
            f("left", Node(Slot::Expr), Required),
            f("ops", Tags(TagKind::CmpOperator), Optional),
            f("comparators", Nodes(Slot::Expr), Optional),
        ],
    ),
    node(
        "Call",
        Group::Expr,
        true,
        &[
            f("func", Node(Slot::Expr), Required),
            f("args", Nodes(Slot::Expr), Optional),
            f("keywords", Nodes(Slot::Keyword), Optional),
        ],
    ),
    node(
        "FormattedValue",
        Group::Expr,
        true,
        &[
            f("value", Node(Slot::Expr), Required),
            f("conversion", Int, Optional),
            f("format_spec", OptNode(Slot::Expr), Optional),
        ],
    ),
    node("JoinedStr", Group::Expr, true, &[f("values", Nodes(Slot::Expr), Optional)]),
    node(
        "Constant",
        Group::Expr,
        true,
        &[
            f("value", Value, Required),
            f("kind", OptStr, Optional),
            f("constant_type", OptStr, Optional),
        ],
    ),
    node(
        "Attribute",
        Group::Expr,
        true,
        &[
            f("value", Node(Slot::Expr), Required),
            f("attr", Str, Required),
            CTX,
        ],
    ),
    node(
        "Subscript",
        Group::Expr,
        true,
        &[
            f("value", Node(Slot::Expr), Required),
            f("slice", Node(Slot::Expr), Required),
            CTX,
        ],
    ),
    node(
        "Starred",
        Group::Expr,
        true,
        &[f("value", Node(Slot::Expr), Required), CTX],
    ),
    node("Identifier", Group::Expr, true, &[f("name", Str, Required), CTX]),
    node("List", Group::Expr, true, &[ELTS, CTX]),
    node("Tuple", Group::Expr, true, &[ELTS, CTX]),
    node(
        "Slice",
        Group::Expr,
        true,
        &[
            f("lower", OptNode(Slot::Expr), Optional),
            f("upper", OptNode(Slot::Expr), Optional),
            f("step", OptNode(Slot::Expr), Optional),
        ],
    ),
    // Patterns
    gated(
        node("MatchValue", Group::Pattern, true, &[f("value", Node(Slot::Expr), Required)]),
        Feature::MatchStatement,
    ),
    gated(
        node("MatchSingleton", Group::Pattern, true, &[f("value", Value, Required)]),
        Feature::MatchStatement,
    ),
    gated(
        node(
            "MatchSequence",
            Group::Pattern,
            true,
            &[f("patterns", Nodes(Slot::Pattern), Optional)],
        ),
        Feature::MatchStatement,
    ),
    gated(
        node(
            "MatchMapping",
            Group::Pattern,
            true,
            &[
                f("keys", Nodes(Slot::Expr), Optional),
                f("patterns", Nodes(Slot::Pattern), Optional),
                f("rest", OptStr, Optional),
            ],
        ),
        Feature::MatchStatement,
    ),
    gated(
        node(
            "MatchClass",
            Group::Pattern,
            true,
            &[
                f("cls", Node(Slot::Expr), Required),
                f("patterns", Nodes(Slot::Pattern), Optional),
                f("kwd_attrs", Strs, Optional),
                f("kwd_patterns", Nodes(Slot::Pattern), Optional),
            ],
        ),
        Feature::MatchStatement,
    ),
    gated(
        node("MatchStar", Group::Pattern, true, &[f("name", OptStr, Optional)]),
        Feature::MatchStatement,
    ),
    gated(
        node(
            "MatchAs",
            Group::Pattern,
            true,
            &[
                f("pattern", OptNode(Slot::Pattern), Optional),
                f("name", OptStr, Optional),
            ],
        ),
        Feature::MatchStatement,
    ),
    gated(
        node(
            "MatchOr",
            Group::Pattern,
            true,
            &[f("patterns", Nodes(Slot::Pattern), Optional)],
        ),
        Feature::MatchStatement,
    ),
    // Type parameters
    gated(
        node(
            "TypeVar",
            Group::TypeParam,
            true,
            &[
                f("name", Str, Required),
                f("bound", OptNode(Slot::Expr), Optional),
                DEFAULT_VALUE,
            ],
        ),
        Feature::TypeParams,
    ),
    gated(
        node("ParamSpec", Group::TypeParam, true, &[f("name", Str, Required), DEFAULT_VALUE]),
        Feature::TypeParams,
    ),
    gated(
        node(
            "TypeVarTuple",
            Group::TypeParam,
            true,
            &[f("name", Str, Required), DEFAULT_VALUE],
        ),
        Feature::TypeParams,
    ),
    // Records
    node(
        "arguments",
        Group::Record,
        false,
        &[
            f("posonlyargs", Nodes(Slot::Arg), Optional),
            f("args", Nodes(Slot::Arg), Optional),
            f("vararg", OptNode(Slot::Arg), Optional),
            f("kwonlyargs", Nodes(Slot::Arg), Optional),
            f("kw_defaults", OptNodes(Slot::Expr), Optional),
            f("kwarg", OptNode(Slot::Arg), Optional),
            f("defaults", Nodes(Slot::Expr), Optional),
        ],
    ),
    node(
        "arg",
        Group::Record,
        true,
        &[
            f("arg", Str, Required),
            f("annotation", OptNode(Slot::Expr), Optional),
        ],
    ),
    node(
        "keyword",
        Group::Record,
        true,
        &[
            f("arg", OptStr, Optional),
            f("value", Node(Slot::Expr), Required),
        ],
    ),
    node(
        "alias",
        Group::Record,
        true,
        &[f("name", Str, Required), f("asname", OptStr, Optional)],
    ),
    node(
        "withitem",
        Group::Record,
        false,
        &[
            f("context_expr", Node(Slot::Expr), Required),
            f("optional_vars", OptNode(Slot::Expr), Optional),
        ],
    ),
    gated(
        node(
            "match_case",
            Group::Record,
            false,
            &[
                f("pattern", Node(Slot::Pattern), Required),
                f("guard", OptNode(Slot::Expr), Optional),
                f("body", Nodes(Slot::Stmt), Block),
            ],
        ),
        Feature::MatchStatement,
    ),
    node(
        "comprehension",
        Group::Record,
        false,
        &[
            f("target", Node(Slot::Expr), Required),
            f("iter", Node(Slot::Expr), Required),
            f("ifs", Nodes(Slot::Expr), Optional),
            f("is_async", Int, Optional),
        ],
    ),
    node(
        "ExceptHandler",
        Group::Record,
        true,
        &[
            f("type", OptNode(Slot::Expr), Optional),
            f("name", OptStr, Optional),
            f("body", Nodes(Slot::Stmt), Block),
        ],
    ),
    node(
        "TypeIgnore",
        Group::Record,
        false,
        &[f("lineno", Int, Required), f("tag", Str, Required)],
    ),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for spec in all() {
            assert!(seen.insert(spec.name), "duplicate kind {}", spec.name);
        }
        assert!(all().len() > 80);
    }

    #[test]
    fn record_slots_resolve_to_catalogue_entries() {
        for spec in all() {
            for field in spec.fields {
                let slot = match field.shape {
                    Shape::Node(s) | Shape::OptNode(s) | Shape::Nodes(s) | Shape::OptNodes(s) => s,
                    _ => continue,
                };
                if let SlotKinds::Record(name) = slot.accepts() {
                    assert!(lookup(name).is_some(), "{}.{} -> {}", spec.name, field.name, name);
                }
            }
        }
    }

    #[test]
    fn name_is_published_as_identifier() {
        assert!(lookup("Name").is_none());
        let ident = lookup("Identifier").unwrap();
        assert_eq!(ident.required_fields().map(|f| f.name).collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(lookup("FunctionDef").unwrap().field("body").unwrap().presence, Presence::Block);
    }
}
