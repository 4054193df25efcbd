//! JSON to syntax tree.
//!
//! Every node is checked against the [`catalogue`](super::catalogue) before it
//! is rebuilt: the `node_type` must exist and fit the slot it appears in, and
//! every required field must be present. Optional fields default per kind.
//!
//! Two kinds of leniency are observable rather than silent. Unknown operator or
//! context names fall back to a fixed tag, and constructs the target Python
//! release cannot express are degraded to the nearest older form. Both emit a
//! `tracing` warning and a [`DecodeWarning`] returned next to the tree.
//!
//! Each statement, expression and pattern counts one nesting level, exactly as
//! the parser counts them, so a document the parser could not have produced
//! for a given `max_depth` is rejected at the same threshold.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use super::catalogue::{self, Group, NodeSpec, Presence, Shape, Slot, SlotKinds};
use super::{parse_json_text, IDENTIFIER, NODE_TYPE};
use crate::config::{Feature, TargetProfile, ToolConfig, DEFAULT_MAX_DEPTH};
use crate::diagnostics::Result;
use crate::err_msg;
use crate::syntax::{
    Alias, Arg, Arguments, BoolOperator, ClassDefData, CmpOperator, Comprehension, ConstantValue,
    ExceptHandler, Expr, ExprContext, ExprKind, ForData, FunctionDefData, Keyword, Located,
    Location, MatchCase, Mod, Node, Operator, Pattern, PatternKind, Stmt, StmtKind, TryData,
    TypeIgnore, TypeParam, TypeParamKind, UnaryOperator, WithData, WithItem,
};

type Object = Map<String, Value>;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonInput {
    Value(Value),
    /// A path to a JSON file, or JSON text. Paths win when both readings work.
    Text(String),
}

impl From<Value> for JsonInput {
    fn from(value: Value) -> Self {
        JsonInput::Value(value)
    }
}

impl From<String> for JsonInput {
    fn from(text: String) -> Self {
        JsonInput::Text(text)
    }
}

impl From<&str> for JsonInput {
    fn from(text: &str) -> Self {
        JsonInput::Text(text.to_string())
    }
}

impl JsonInput {
    pub fn into_value(self) -> Result<Value> {
        match self {
            JsonInput::Value(value) => Ok(value),
            JsonInput::Text(text) => {
                let trimmed = text.trim();
                let looks_like_json = trimmed.starts_with(['{', '[', '"']);
                let path = Path::new(trimmed);
                if !looks_like_json && !trimmed.is_empty() && path.is_file() {
                    tracing::debug!(path = %path.display(), "reading JSON document from file");
                    let contents = std::fs::read_to_string(path).map_err(|e| {
                        err_msg!(Input, "Cannot read JSON file {}", path.display()).caused_by(e)
                    })?;
                    parse_json_text(&contents)
                } else {
                    parse_json_text(&text)
                }
            }
        }
    }
}

/// A leniency the decoder applied instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeWarning {
    pub path: String,
    pub message: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub node: Node,
    pub warnings: Vec<DecodeWarning>,
}

/// Decodes with the default profile and depth limit, discarding warnings.
pub fn json_to_ast(input: impl Into<JsonInput>) -> Result<Node> {
    Decoder::default().decode(input).map(|decoded| decoded.node)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    profile: TargetProfile,
    max_depth: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(TargetProfile::default(), DEFAULT_MAX_DEPTH)
    }
}

impl Decoder {
    pub fn new(profile: TargetProfile, max_depth: usize) -> Self {
        Self { profile, max_depth }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.target, config.max_depth)
    }

    pub fn decode(&self, input: impl Into<JsonInput>) -> Result<Decoded> {
        let value = input.into().into_value()?;
        self.decode_value(&value)
    }

    /// Decodes an envelope (`{"ast": ...}`) or a bare node.
    pub fn decode_value(&self, value: &Value) -> Result<Decoded> {
        let (root, path) = match value {
            Value::Object(obj) if obj.contains_key("ast") && !obj.contains_key(NODE_TYPE) => {
                (&obj["ast"], "ast")
            }
            Value::Object(_) => (value, "$"),
            _ => {
                return Err(err_msg!(
                    Decode,
                    "expected a JSON object describing a node, found {}",
                    json_kind(value)
                )
                .with_path("$"))
            }
        };
        let mut session = Session {
            profile: self.profile,
            max_depth: self.max_depth,
            depth: 0,
            warnings: Vec::new(),
        };
        let node = session.root(root, path)?;
        Ok(Decoded {
            node,
            warnings: session.warnings,
        })
    }
}

// ============================================================================
// TAGS
// ============================================================================

trait Tag: Copy {
    const LABEL: &'static str;
    const DEFAULT: Self;
    fn lookup(name: &str) -> Option<Self>;
    fn tag_name(&self) -> &'static str;
}

macro_rules! impl_tag {
    ($($ty:ident),+) => {
        $(impl Tag for $ty {
            const LABEL: &'static str = stringify!($ty);
            const DEFAULT: Self = $ty::FALLBACK;
            fn lookup(name: &str) -> Option<Self> {
                $ty::from_name(name)
            }
            fn tag_name(&self) -> &'static str {
                self.name()
            }
        })+
    };
}

impl_tag!(Operator, BoolOperator, UnaryOperator, CmpOperator, ExprContext);

// ============================================================================
// SESSION
// ============================================================================

struct Session {
    profile: TargetProfile,
    max_depth: usize,
    depth: usize,
    warnings: Vec<DecodeWarning>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A field's value, treating explicit `null` as absent.
fn present<'v>(obj: &'v Object, field: &str) -> Option<&'v Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn field_path(path: &str, field: &str) -> String {
    format!("{path}.{field}")
}

fn index_path(path: &str, field: &str, index: usize) -> String {
    format!("{path}.{field}[{index}]")
}

fn slot_label(slot: Slot) -> String {
    match slot.accepts() {
        SlotKinds::Group(Group::Stmt) => "a statement".into(),
        SlotKinds::Group(Group::Expr) => "an expression".into(),
        SlotKinds::Group(Group::Pattern) => "a pattern".into(),
        SlotKinds::Group(Group::TypeParam) => "a type parameter".into(),
        SlotKinds::Group(_) => "a root".into(),
        SlotKinds::Record(name) => format!("an '{name}'"),
    }
}

impl Session {
    fn warn(&mut self, path: &str, message: String) {
        tracing::warn!(path = %path, "{}", message);
        self.warnings.push(DecodeWarning {
            path: path.to_string(),
            message,
        });
    }

    fn enter(&mut self, path: &str) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(err_msg!(
                DepthLimit,
                "nesting depth exceeds the configured maximum of {}",
                self.max_depth
            )
            .with_path(path)
            .with_help("simplify the source or raise max_depth in the configuration"));
        }
        self.depth += 1;
        Ok(())
    }

    fn gated(&self, feature: Feature) -> bool {
        !self.profile.supports(feature)
    }

    fn degrade(&mut self, path: &str, feature: Feature, what: &str) {
        let message = format!(
            "{} require Python {}; {} for target {}",
            feature.description(),
            feature.min_version(),
            what,
            self.profile.python_version
        );
        self.warn(path, message);
    }

    /// Resolves `node_type`, checks it against `slot` and the required fields.
    fn header<'v>(
        &self,
        value: &'v Value,
        path: &str,
        slot: Option<Slot>,
    ) -> Result<(&'v Object, &'static NodeSpec)> {
        let obj = value.as_object().ok_or_else(|| {
            err_msg!(Decode, "expected a node object, found {}", json_kind(value)).with_path(path)
        })?;
        let kind = match obj.get(NODE_TYPE) {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => {
                return Err(err_msg!(
                    Decode,
                    "node_type must be a string, found {}",
                    json_kind(other)
                )
                .with_path(path))
            }
            None => return Err(err_msg!(Decode, "node is missing 'node_type'").with_path(path)),
        };
        let spec = catalogue::lookup(kind).ok_or_else(|| {
            let hint = if kind == "Name" {
                "identifier references use node_type 'Identifier' with field 'name'"
            } else {
                "node_type must name a kind from the node catalogue"
            };
            err_msg!(Decode, "unknown node_type '{}'", kind)
                .with_path(path)
                .with_help(hint)
        })?;
        if let Some(slot) = slot {
            let fits = match slot.accepts() {
                SlotKinds::Group(group) => spec.group == group,
                SlotKinds::Record(name) => spec.name == name,
            };
            if !fits {
                return Err(err_msg!(
                    Decode,
                    "expected {} node, found '{}'",
                    slot_label(slot),
                    spec.name
                )
                .with_path(path));
            }
        }
        if let Some(field) = spec
            .required_fields()
            .find(|field| match field.shape {
                // `null` is a legitimate constant value
                Shape::Value => !obj.contains_key(field.name),
                _ => present(obj, field.name).is_none(),
            })
        {
            return Err(err_msg!(
                Decode,
                "missing required field '{}' on {}",
                field.name,
                spec.name
            )
            .with_path(path));
        }
        Ok((obj, spec))
    }

    fn root(&mut self, value: &Value, path: &str) -> Result<Node> {
        let (_, spec) = self.header(value, path, None)?;
        Ok(match spec.group {
            Group::Mod => Node::Mod(self.module(value, path)?),
            Group::Stmt => Node::Stmt(self.stmt(value, path)?),
            Group::Expr => Node::Expr(self.expr(value, path)?),
            Group::Pattern => Node::Pattern(self.pattern(value, path)?),
            Group::TypeParam => Node::TypeParam(self.type_param(value, path)?),
            Group::Record => match spec.name {
                "arguments" => Node::Arguments(self.arguments(value, path)?),
                "arg" => Node::Arg(self.arg(value, path)?),
                "keyword" => Node::Keyword(self.keyword(value, path)?),
                "alias" => Node::Alias(self.alias(value, path)?),
                "withitem" => Node::WithItem(self.with_item(value, path)?),
                "match_case" => Node::MatchCase(self.match_case(value, path)?),
                "comprehension" => Node::Comprehension(self.comprehension(value, path)?),
                "ExceptHandler" => Node::ExceptHandler(self.handler(value, path)?),
                "TypeIgnore" => Node::TypeIgnore(self.type_ignore(value, path)?),
                other => {
                    return Err(
                        err_msg!(Internal, "record kind '{}' has no decoder", other).with_path(path)
                    )
                }
            },
        })
    }

    // ========================================================================
    // FIELD HELPERS
    // ========================================================================

    fn list<T>(
        &mut self,
        obj: &Object,
        field: &str,
        path: &str,
        mut item: impl FnMut(&mut Self, &Value, &str) -> Result<T>,
    ) -> Result<Vec<T>> {
        match present(obj, field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, value)| item(self, value, &index_path(path, field, i)))
                .collect(),
            Some(other) => Err(err_msg!(
                Decode,
                "field '{}' must be a list, found {}",
                field,
                json_kind(other)
            )
            .with_path(field_path(path, field))),
        }
    }

    fn exprs(&mut self, obj: &Object, field: &str, path: &str) -> Result<Vec<Expr>> {
        self.list(obj, field, path, |s, v, p| s.expr(v, p))
    }

    fn stmts(&mut self, obj: &Object, field: &str, path: &str) -> Result<Vec<Stmt>> {
        self.list(obj, field, path, |s, v, p| s.stmt(v, p))
    }

    /// A statement block; absent means a lone `pass`.
    fn block(&mut self, obj: &Object, field: &str, path: &str) -> Result<Vec<Stmt>> {
        if present(obj, field).is_none() {
            return Ok(vec![Located::bare(StmtKind::Pass)]);
        }
        self.stmts(obj, field, path)
    }

    fn patterns(&mut self, obj: &Object, field: &str, path: &str) -> Result<Vec<Pattern>> {
        self.list(obj, field, path, |s, v, p| s.pattern(v, p))
    }

    fn type_params(&mut self, obj: &Object, path: &str) -> Result<Vec<TypeParam>> {
        let params = self.list(obj, "type_params", path, |s, v, p| s.type_param(v, p))?;
        if !params.is_empty() && self.gated(Feature::TypeParams) {
            self.degrade(&field_path(path, "type_params"), Feature::TypeParams, "dropped");
            return Ok(Vec::new());
        }
        Ok(params)
    }

    fn child(&mut self, obj: &Object, field: &str, path: &str) -> Result<Box<Expr>> {
        let child_path = field_path(path, field);
        match present(obj, field) {
            Some(value) => Ok(Box::new(self.expr(value, &child_path)?)),
            None => Err(err_msg!(Decode, "missing required field '{}'", field).with_path(path)),
        }
    }

    fn opt_child(&mut self, obj: &Object, field: &str, path: &str) -> Result<Option<Box<Expr>>> {
        match present(obj, field) {
            Some(value) => Ok(Some(Box::new(self.expr(value, &field_path(path, field))?))),
            None => Ok(None),
        }
    }

    fn string(&self, obj: &Object, field: &str, path: &str) -> Result<String> {
        match self.opt_string(obj, field, path)? {
            Some(s) => Ok(s),
            None => Err(err_msg!(Decode, "missing required field '{}'", field).with_path(path)),
        }
    }

    fn opt_string(&self, obj: &Object, field: &str, path: &str) -> Result<Option<String>> {
        match present(obj, field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(err_msg!(
                Decode,
                "field '{}' must be a string, found {}",
                field,
                json_kind(other)
            )
            .with_path(field_path(path, field))),
        }
    }

    fn strings(&mut self, obj: &Object, field: &str, path: &str) -> Result<Vec<String>> {
        self.list(obj, field, path, |_, value, p| match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(
                err_msg!(Decode, "expected a string, found {}", json_kind(other)).with_path(p),
            ),
        })
    }

    fn integer(&self, obj: &Object, field: &str, path: &str) -> Result<Option<i64>> {
        match present(obj, field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(i64::from(*b))),
            Some(Value::Number(n)) if n.is_i64() => Ok(n.as_i64()),
            Some(other) => Err(err_msg!(
                Decode,
                "field '{}' must be an integer, found {}",
                field,
                json_kind(other)
            )
            .with_path(field_path(path, field))),
        }
    }

    fn tag<T: Tag>(&mut self, obj: &Object, field: &str, path: &str) -> T {
        match present(obj, field) {
            None => T::DEFAULT,
            Some(value) => self.tag_value(value, &field_path(path, field)),
        }
    }

    fn tag_value<T: Tag>(&mut self, value: &Value, path: &str) -> T {
        // Some producers serialize tags as empty nodes: {"node_type": "Add"}.
        let name = match value {
            Value::String(name) => Some(name.as_str()),
            Value::Object(obj) => obj.get(NODE_TYPE).and_then(Value::as_str),
            _ => None,
        };
        if let Some(tag) = name.and_then(T::lookup) {
            return tag;
        }
        let shown = name.map_or_else(|| value.to_string(), |n| format!("'{n}'"));
        self.warn(
            path,
            format!(
                "unknown {} {}; using {}",
                T::LABEL,
                shown,
                T::DEFAULT.tag_name()
            ),
        );
        T::DEFAULT
    }

    fn location(&self, obj: &Object) -> Option<Location> {
        let loc = obj.get("location")?.as_object()?;
        let get = |key: &str| loc.get(key).and_then(Value::as_u64).map(|n| n as usize);
        let lineno = get("lineno")?;
        let col_offset = get("col_offset")?;
        Some(Location {
            lineno,
            col_offset,
            end_lineno: get("end_lineno").unwrap_or(lineno),
            end_col_offset: get("end_col_offset").unwrap_or(col_offset),
        })
    }

    // ========================================================================
    // ROOTS & STATEMENTS
    // ========================================================================

    fn module(&mut self, value: &Value, path: &str) -> Result<Mod> {
        let (obj, spec) = self.header(value, path, None)?;
        Ok(match spec.name {
            "Module" => Mod::Module {
                body: self.stmts(obj, "body", path)?,
                type_ignores: self.list(obj, "type_ignores", path, |s, v, p| {
                    s.type_ignore(v, p)
                })?,
            },
            "Interactive" => Mod::Interactive {
                body: self.stmts(obj, "body", path)?,
            },
            "Expression" => Mod::Expression {
                body: self.child(obj, "body", path)?,
            },
            "FunctionType" => Mod::FunctionType {
                argtypes: self.exprs(obj, "argtypes", path)?,
                returns: self.child(obj, "returns", path)?,
            },
            other => {
                return Err(err_msg!(Decode, "expected a root node, found '{}'", other)
                    .with_path(path))
            }
        })
    }

    fn stmt(&mut self, value: &Value, path: &str) -> Result<Stmt> {
        self.enter(path)?;
        let result = crate::stack::guarded(|| self.stmt_inner(value, path));
        self.depth -= 1;
        result
    }

    fn stmt_inner(&mut self, value: &Value, path: &str) -> Result<Stmt> {
        let (obj, spec) = self.header(value, path, Some(Slot::Stmt))?;
        let location = self.location(obj);
        let p = path;
        let node = match spec.name {
            "FunctionDef" => StmtKind::FunctionDef(self.function(obj, p)?),
            "AsyncFunctionDef" => StmtKind::AsyncFunctionDef(self.function(obj, p)?),
            "ClassDef" => StmtKind::ClassDef(ClassDefData {
                name: self.string(obj, "name", p)?,
                type_params: self.type_params(obj, p)?,
                bases: self.exprs(obj, "bases", p)?,
                keywords: self.list(obj, "keywords", p, |s, v, p| s.keyword(v, p))?,
                body: self.block(obj, "body", p)?,
                decorator_list: self.exprs(obj, "decorator_list", p)?,
            }),
            "Return" => StmtKind::Return {
                value: self.opt_child(obj, "value", p)?,
            },
            "Delete" => StmtKind::Delete {
                targets: self.exprs(obj, "targets", p)?,
            },
            "Assign" => StmtKind::Assign {
                targets: self.exprs(obj, "targets", p)?,
                value: self.child(obj, "value", p)?,
            },
            "TypeAlias" => {
                let mut name = self.child(obj, "name", p)?;
                let type_params = self.type_params(obj, p)?;
                let value = self.child(obj, "value", p)?;
                if self.gated(Feature::TypeParams) {
                    self.degrade(p, Feature::TypeParams, "type alias decoded as an assignment");
                    name.set_ctx(ExprContext::Store);
                    StmtKind::Assign {
                        targets: vec![*name],
                        value,
                    }
                } else {
                    StmtKind::TypeAlias {
                        name,
                        type_params,
                        value,
                    }
                }
            }
            "AugAssign" => StmtKind::AugAssign {
                target: self.child(obj, "target", p)?,
                op: self.tag(obj, "op", p),
                value: self.child(obj, "value", p)?,
            },
            "AnnAssign" => {
                let target = self.child(obj, "target", p)?;
                let default_simple = matches!(target.node, ExprKind::Name { .. });
                StmtKind::AnnAssign {
                    annotation: self.child(obj, "annotation", p)?,
                    value: self.opt_child(obj, "value", p)?,
                    simple: self
                        .integer(obj, "simple", p)?
                        .map_or(default_simple, |n| n != 0),
                    target,
                }
            }
            "For" => StmtKind::For(self.for_loop(obj, p)?),
            "AsyncFor" => StmtKind::AsyncFor(self.for_loop(obj, p)?),
            "While" => StmtKind::While {
                test: self.child(obj, "test", p)?,
                body: self.block(obj, "body", p)?,
                orelse: self.stmts(obj, "orelse", p)?,
            },
            "If" => StmtKind::If {
                test: self.child(obj, "test", p)?,
                body: self.block(obj, "body", p)?,
                orelse: self.stmts(obj, "orelse", p)?,
            },
            "With" => StmtKind::With(self.with(obj, p)?),
            "AsyncWith" => StmtKind::AsyncWith(self.with(obj, p)?),
            "Match" if self.gated(Feature::MatchStatement) => {
                self.degrade(p, Feature::MatchStatement, "replaced with pass");
                StmtKind::Pass
            }
            "Match" => StmtKind::Match {
                subject: self.child(obj, "subject", p)?,
                cases: self.list(obj, "cases", p, |s, v, p| s.match_case(v, p))?,
            },
            "Raise" => StmtKind::Raise {
                exc: self.opt_child(obj, "exc", p)?,
                cause: self.opt_child(obj, "cause", p)?,
            },
            "Try" => StmtKind::Try(self.try_block(obj, p)?),
            "TryStar" if self.gated(Feature::ExceptStar) => {
                self.degrade(p, Feature::ExceptStar, "decoded as a plain try");
                StmtKind::Try(self.try_block(obj, p)?)
            }
            "TryStar" => StmtKind::TryStar(self.try_block(obj, p)?),
            "Assert" => StmtKind::Assert {
                test: self.child(obj, "test", p)?,
                msg: self.opt_child(obj, "msg", p)?,
            },
            "Import" => StmtKind::Import {
                names: self.list(obj, "names", p, |s, v, p| s.alias(v, p))?,
            },
            "ImportFrom" => {
                let level = self.integer(obj, "level", p)?.unwrap_or(0);
                let level = u32::try_from(level).map_err(|_| {
                    err_msg!(Decode, "ImportFrom level must be a non-negative integer, got {}", level)
                        .with_path(field_path(p, "level"))
                })?;
                StmtKind::ImportFrom {
                    module: self.opt_string(obj, "module", p)?,
                    names: self.list(obj, "names", p, |s, v, p| s.alias(v, p))?,
                    level,
                }
            }
            "Global" => StmtKind::Global {
                names: self.strings(obj, "names", p)?,
            },
            "Nonlocal" => StmtKind::Nonlocal {
                names: self.strings(obj, "names", p)?,
            },
            "Expr" => StmtKind::Expr {
                value: self.child(obj, "value", p)?,
            },
            "Pass" => StmtKind::Pass,
            "Break" => StmtKind::Break,
            "Continue" => StmtKind::Continue,
            other => {
                return Err(err_msg!(Internal, "statement kind '{}' has no decoder", other)
                    .with_path(path))
            }
        };
        Ok(Located::new(node, location))
    }

    fn function(&mut self, obj: &Object, path: &str) -> Result<FunctionDefData> {
        Ok(FunctionDefData {
            name: self.string(obj, "name", path)?,
            type_params: self.type_params(obj, path)?,
            args: Box::new(self.arguments_field(obj, "args", path)?),
            body: self.block(obj, "body", path)?,
            decorator_list: self.exprs(obj, "decorator_list", path)?,
            returns: self.opt_child(obj, "returns", path)?,
        })
    }

    fn for_loop(&mut self, obj: &Object, path: &str) -> Result<ForData> {
        Ok(ForData {
            target: self.child(obj, "target", path)?,
            iter: self.child(obj, "iter", path)?,
            body: self.block(obj, "body", path)?,
            orelse: self.stmts(obj, "orelse", path)?,
        })
    }

    fn with(&mut self, obj: &Object, path: &str) -> Result<WithData> {
        Ok(WithData {
            items: self.list(obj, "items", path, |s, v, p| s.with_item(v, p))?,
            body: self.block(obj, "body", path)?,
        })
    }

    fn try_block(&mut self, obj: &Object, path: &str) -> Result<TryData> {
        Ok(TryData {
            body: self.block(obj, "body", path)?,
            handlers: self.list(obj, "handlers", path, |s, v, p| s.handler(v, p))?,
            orelse: self.stmts(obj, "orelse", path)?,
            finalbody: self.stmts(obj, "finalbody", path)?,
        })
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn expr(&mut self, value: &Value, path: &str) -> Result<Expr> {
        self.enter(path)?;
        let result = crate::stack::guarded(|| self.expr_inner(value, path));
        self.depth -= 1;
        result
    }

    fn expr_inner(&mut self, value: &Value, path: &str) -> Result<Expr> {
        let (obj, spec) = self.header(value, path, Some(Slot::Expr))?;
        let location = self.location(obj);
        let p = path;
        let node = match spec.name {
            "BoolOp" => ExprKind::BoolOp {
                op: self.tag(obj, "op", p),
                values: self.exprs(obj, "values", p)?,
            },
            "NamedExpr" if self.gated(Feature::NamedExpr) => {
                self.degrade(p, Feature::NamedExpr, "replaced with the assigned value");
                return self.expr(&obj["value"], &field_path(p, "value"));
            }
            "NamedExpr" => ExprKind::NamedExpr {
                target: self.child(obj, "target", p)?,
                value: self.child(obj, "value", p)?,
            },
            "BinOp" => ExprKind::BinOp {
                left: self.child(obj, "left", p)?,
                op: self.tag(obj, "op", p),
                right: self.child(obj, "right", p)?,
            },
            "UnaryOp" => ExprKind::UnaryOp {
                op: self.tag(obj, "op", p),
                operand: self.child(obj, "operand", p)?,
            },
            "Lambda" => ExprKind::Lambda {
                args: Box::new(self.arguments_field(obj, "args", p)?),
                body: self.child(obj, "body", p)?,
            },
            "IfExp" => ExprKind::IfExp {
                test: self.child(obj, "test", p)?,
                body: self.child(obj, "body", p)?,
                orelse: self.child(obj, "orelse", p)?,
            },
            "Dict" => ExprKind::Dict {
                keys: self.list(obj, "keys", p, |s, v, p| match v {
                    Value::Null => Ok(None),
                    key => s.expr(key, p).map(Some),
                })?,
                values: self.exprs(obj, "values", p)?,
            },
            "Set" => ExprKind::Set {
                elts: self.exprs(obj, "elts", p)?,
            },
            "ListComp" => ExprKind::ListComp {
                elt: self.child(obj, "elt", p)?,
                generators: self.generators(obj, p)?,
            },
            "SetComp" => ExprKind::SetComp {
                elt: self.child(obj, "elt", p)?,
                generators: self.generators(obj, p)?,
            },
            "DictComp" => ExprKind::DictComp {
                key: self.child(obj, "key", p)?,
                value: self.child(obj, "value", p)?,
                generators: self.generators(obj, p)?,
            },
            "GeneratorExp" => ExprKind::GeneratorExp {
                elt: self.child(obj, "elt", p)?,
                generators: self.generators(obj, p)?,
            },
            "Await" => ExprKind::Await {
                value: self.child(obj, "value", p)?,
            },
            "Yield" => ExprKind::Yield {
                value: self.opt_child(obj, "value", p)?,
            },
            "YieldFrom" => ExprKind::YieldFrom {
                value: self.child(obj, "value", p)?,
            },
            "Compare" => ExprKind::Compare {
                left: self.child(obj, "left", p)?,
                ops: self.list(obj, "ops", p, |s, v, p| Ok(s.tag_value(v, p)))?,
                comparators: self.exprs(obj, "comparators", p)?,
            },
            "Call" => ExprKind::Call {
                func: self.child(obj, "func", p)?,
                args: self.exprs(obj, "args", p)?,
                keywords: self.list(obj, "keywords", p, |s, v, p| s.keyword(v, p))?,
            },
            "FormattedValue" => {
                let conversion = self.integer(obj, "conversion", p)?.unwrap_or(-1);
                ExprKind::FormattedValue {
                    value: self.child(obj, "value", p)?,
                    conversion: i32::try_from(conversion).map_err(|_| {
                        err_msg!(Decode, "conversion {} is out of range", conversion)
                            .with_path(field_path(p, "conversion"))
                    })?,
                    format_spec: self.opt_child(obj, "format_spec", p)?,
                }
            }
            "JoinedStr" => ExprKind::JoinedStr {
                values: self.exprs(obj, "values", p)?,
            },
            "Constant" => ExprKind::Constant {
                value: self.constant(obj, p)?,
                kind: self.opt_string(obj, "kind", p)?,
            },
            "Attribute" => ExprKind::Attribute {
                value: self.child(obj, "value", p)?,
                attr: self.string(obj, "attr", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            "Subscript" => ExprKind::Subscript {
                value: self.child(obj, "value", p)?,
                slice: self.child(obj, "slice", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            "Starred" => ExprKind::Starred {
                value: self.child(obj, "value", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            IDENTIFIER => ExprKind::Name {
                id: self.string(obj, "name", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            "List" => ExprKind::List {
                elts: self.exprs(obj, "elts", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            "Tuple" => ExprKind::Tuple {
                elts: self.exprs(obj, "elts", p)?,
                ctx: self.tag(obj, "ctx", p),
            },
            "Slice" => ExprKind::Slice {
                lower: self.opt_child(obj, "lower", p)?,
                upper: self.opt_child(obj, "upper", p)?,
                step: self.opt_child(obj, "step", p)?,
            },
            other => {
                return Err(err_msg!(Internal, "expression kind '{}' has no decoder", other)
                    .with_path(path))
            }
        };
        Ok(Located::new(node, location))
    }

    fn generators(&mut self, obj: &Object, path: &str) -> Result<Vec<Comprehension>> {
        self.list(obj, "generators", path, |s, v, p| s.comprehension(v, p))
    }

    /// Rebuilds a constant from its JSON value and optional `constant_type`.
    fn constant(&self, obj: &Object, path: &str) -> Result<ConstantValue> {
        let value = obj.get("value").unwrap_or(&Value::Null);
        let value_path = field_path(path, "value");
        let bad = |what: &str| {
            err_msg!(Decode, "invalid {} constant: {}", what, value).with_path(value_path.clone())
        };
        let constant_type = self.opt_string(obj, "constant_type", path)?;
        Ok(match constant_type.as_deref() {
            None => match value {
                Value::Null => ConstantValue::None,
                Value::Bool(b) => ConstantValue::Bool(*b),
                Value::Number(n) if n.is_i64() || n.is_u64() => ConstantValue::Int(n.to_string()),
                Value::Number(n) => ConstantValue::Float(n.as_f64().ok_or_else(|| bad("float"))?),
                Value::String(s) => ConstantValue::Str(s.clone()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(err_msg!(
                        Decode,
                        "constant value must be a JSON scalar, found {}",
                        json_kind(value)
                    )
                    .with_path(value_path.clone()))
                }
            },
            Some("bytes") => {
                let text = value.as_str().ok_or_else(|| bad("bytes"))?;
                let bytes = text
                    .chars()
                    .map(|c| u8::try_from(u32::from(c)).map_err(|_| bad("bytes")))
                    .collect::<Result<Vec<u8>>>()?;
                ConstantValue::Bytes(bytes)
            }
            Some("complex") => ConstantValue::Complex(float_value(value).ok_or_else(|| bad("complex"))?),
            Some("float") => ConstantValue::Float(float_value(value).ok_or_else(|| bad("float"))?),
            Some("Ellipsis") => ConstantValue::Ellipsis,
            Some("int") => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => ConstantValue::Int(n.to_string()),
                Value::String(s) if is_decimal(s) => ConstantValue::Int(s.clone()),
                _ => return Err(bad("int")),
            },
            Some(other) => {
                return Err(err_msg!(Decode, "unknown constant_type '{}'", other)
                    .with_path(field_path(path, "constant_type"))
                    .with_help("expected one of: bytes, complex, float, int, Ellipsis"))
            }
        })
    }

    // ========================================================================
    // PATTERNS & TYPE PARAMETERS
    // ========================================================================

    fn pattern(&mut self, value: &Value, path: &str) -> Result<Pattern> {
        self.enter(path)?;
        let result = crate::stack::guarded(|| self.pattern_inner(value, path));
        self.depth -= 1;
        result
    }

    fn pattern_inner(&mut self, value: &Value, path: &str) -> Result<Pattern> {
        let (obj, spec) = self.header(value, path, Some(Slot::Pattern))?;
        let location = self.location(obj);
        let p = path;
        let node = match spec.name {
            "MatchValue" => PatternKind::MatchValue {
                value: self.child(obj, "value", p)?,
            },
            "MatchSingleton" => PatternKind::MatchSingleton {
                value: self.constant(obj, p)?,
            },
            "MatchSequence" => PatternKind::MatchSequence {
                patterns: self.patterns(obj, "patterns", p)?,
            },
            "MatchMapping" => PatternKind::MatchMapping {
                keys: self.exprs(obj, "keys", p)?,
                patterns: self.patterns(obj, "patterns", p)?,
                rest: self.opt_string(obj, "rest", p)?,
            },
            "MatchClass" => PatternKind::MatchClass {
                cls: self.child(obj, "cls", p)?,
                patterns: self.patterns(obj, "patterns", p)?,
                kwd_attrs: self.strings(obj, "kwd_attrs", p)?,
                kwd_patterns: self.patterns(obj, "kwd_patterns", p)?,
            },
            "MatchStar" => PatternKind::MatchStar {
                name: self.opt_string(obj, "name", p)?,
            },
            "MatchAs" => PatternKind::MatchAs {
                pattern: match present(obj, "pattern") {
                    Some(inner) => Some(Box::new(self.pattern(inner, &field_path(p, "pattern"))?)),
                    None => None,
                },
                name: self.opt_string(obj, "name", p)?,
            },
            "MatchOr" => PatternKind::MatchOr {
                patterns: self.patterns(obj, "patterns", p)?,
            },
            other => {
                return Err(err_msg!(Internal, "pattern kind '{}' has no decoder", other)
                    .with_path(path))
            }
        };
        Ok(Located::new(node, location))
    }

    fn type_param(&mut self, value: &Value, path: &str) -> Result<TypeParam> {
        let (obj, spec) = self.header(value, path, Some(Slot::TypeParam))?;
        let location = self.location(obj);
        let name = self.string(obj, "name", path)?;
        let mut default_value = self.opt_child(obj, "default_value", path)?;
        if default_value.is_some() && self.gated(Feature::TypeParamDefaults) {
            self.degrade(
                &field_path(path, "default_value"),
                Feature::TypeParamDefaults,
                "dropped",
            );
            default_value = None;
        }
        let node = match spec.name {
            "TypeVar" => TypeParamKind::TypeVar {
                name,
                bound: self.opt_child(obj, "bound", path)?,
                default_value,
            },
            "ParamSpec" => TypeParamKind::ParamSpec {
                name,
                default_value,
            },
            _ => TypeParamKind::TypeVarTuple {
                name,
                default_value,
            },
        };
        Ok(Located::new(node, location))
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    fn arguments_field(&mut self, obj: &Object, field: &str, path: &str) -> Result<Arguments> {
        match present(obj, field) {
            Some(value) => self.arguments(value, &field_path(path, field)),
            None => Ok(Arguments::default()),
        }
    }

    fn arguments(&mut self, value: &Value, path: &str) -> Result<Arguments> {
        let (obj, _) = self.header(value, path, Some(Slot::Arguments))?;
        let opt_arg = |s: &mut Self, field: &str| -> Result<Option<Box<Arg>>> {
            match present(obj, field) {
                Some(v) => Ok(Some(Box::new(s.arg(v, &field_path(path, field))?))),
                None => Ok(None),
            }
        };
        let mut posonlyargs = self.list(obj, "posonlyargs", path, |s, v, p| s.arg(v, p))?;
        let mut args = self.list(obj, "args", path, |s, v, p| s.arg(v, p))?;
        let vararg = opt_arg(self, "vararg")?;
        let kwonlyargs = self.list(obj, "kwonlyargs", path, |s, v, p| s.arg(v, p))?;
        let kw_defaults = if present(obj, "kw_defaults").is_none() {
            vec![None; kwonlyargs.len()]
        } else {
            self.list(obj, "kw_defaults", path, |s, v, p| match v {
                Value::Null => Ok(None),
                default => s.expr(default, p).map(Some),
            })?
        };
        let kwarg = opt_arg(self, "kwarg")?;
        let defaults = self.exprs(obj, "defaults", path)?;
        let positional = posonlyargs.len() + args.len();
        if defaults.len() > positional {
            return Err(err_msg!(
                Decode,
                "more positional defaults ({}) than positional parameters ({})",
                defaults.len(),
                positional
            )
            .with_path(field_path(path, "defaults")));
        }
        if kw_defaults.len() != kwonlyargs.len() {
            return Err(err_msg!(
                Decode,
                "kw_defaults has {} entries for {} keyword-only parameters",
                kw_defaults.len(),
                kwonlyargs.len()
            )
            .with_path(field_path(path, "kw_defaults")));
        }
        if !posonlyargs.is_empty() && self.gated(Feature::PositionalOnlyParams) {
            self.degrade(
                &field_path(path, "posonlyargs"),
                Feature::PositionalOnlyParams,
                "merged into regular parameters",
            );
            posonlyargs.append(&mut args);
            args = posonlyargs;
            posonlyargs = Vec::new();
        }
        Ok(Arguments {
            posonlyargs,
            args,
            vararg,
            kwonlyargs,
            kw_defaults,
            kwarg,
            defaults,
        })
    }

    fn arg(&mut self, value: &Value, path: &str) -> Result<Arg> {
        let (obj, _) = self.header(value, path, Some(Slot::Arg))?;
        Ok(Arg {
            arg: self.string(obj, "arg", path)?,
            annotation: self.opt_child(obj, "annotation", path)?,
            location: self.location(obj),
        })
    }

    fn keyword(&mut self, value: &Value, path: &str) -> Result<Keyword> {
        let (obj, _) = self.header(value, path, Some(Slot::Keyword))?;
        Ok(Keyword {
            arg: self.opt_string(obj, "arg", path)?,
            value: *self.child(obj, "value", path)?,
            location: self.location(obj),
        })
    }

    fn alias(&mut self, value: &Value, path: &str) -> Result<Alias> {
        let (obj, _) = self.header(value, path, Some(Slot::Alias))?;
        Ok(Alias {
            name: self.string(obj, "name", path)?,
            asname: self.opt_string(obj, "asname", path)?,
            location: self.location(obj),
        })
    }

    fn with_item(&mut self, value: &Value, path: &str) -> Result<WithItem> {
        let (obj, _) = self.header(value, path, Some(Slot::WithItem))?;
        Ok(WithItem {
            context_expr: *self.child(obj, "context_expr", path)?,
            optional_vars: self.opt_child(obj, "optional_vars", path)?.map(|e| *e),
        })
    }

    fn match_case(&mut self, value: &Value, path: &str) -> Result<MatchCase> {
        let (obj, _) = self.header(value, path, Some(Slot::MatchCase))?;
        Ok(MatchCase {
            pattern: self.pattern(&obj["pattern"], &field_path(path, "pattern"))?,
            guard: self.opt_child(obj, "guard", path)?.map(|e| *e),
            body: self.block(obj, "body", path)?,
        })
    }

    fn comprehension(&mut self, value: &Value, path: &str) -> Result<Comprehension> {
        let (obj, _) = self.header(value, path, Some(Slot::Comprehension))?;
        Ok(Comprehension {
            target: *self.child(obj, "target", path)?,
            iter: *self.child(obj, "iter", path)?,
            ifs: self.exprs(obj, "ifs", path)?,
            is_async: self.integer(obj, "is_async", path)?.unwrap_or(0) != 0,
        })
    }

    fn handler(&mut self, value: &Value, path: &str) -> Result<ExceptHandler> {
        let (obj, _) = self.header(value, path, Some(Slot::ExceptHandler))?;
        Ok(ExceptHandler {
            type_: self.opt_child(obj, "type", path)?.map(|e| *e),
            name: self.opt_string(obj, "name", path)?,
            body: self.block(obj, "body", path)?,
            location: self.location(obj),
        })
    }

    /// Generic recipe: every declared field, verbatim.
    fn type_ignore(&mut self, value: &Value, path: &str) -> Result<TypeIgnore> {
        let (obj, spec) = self.header(value, path, Some(Slot::TypeIgnore))?;
        let declared: Object = spec
            .fields
            .iter()
            .filter(|f| f.presence != Presence::Derived)
            .filter_map(|f| obj.get(f.name).map(|v| (f.name.to_string(), v.clone())))
            .collect();
        serde_json::from_value(Value::Object(declared)).map_err(|e| {
            err_msg!(Decode, "invalid TypeIgnore: {}", e)
                .with_path(path)
                .caused_by(e)
        })
    }
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "inf" | "Infinity" => Some(f64::INFINITY),
            "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
            "nan" | "NaN" => Some(f64::NAN),
            other => other.parse().ok(),
        },
        _ => None,
    }
}

fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::PythonVersion;
    use crate::ErrorType;

    fn decode(value: Value) -> Decoded {
        Decoder::default().decode_value(&value).unwrap()
    }

    fn module_body(node: &Node) -> &[Stmt] {
        match node {
            Node::Mod(Mod::Module { body, .. }) => body,
            other => panic!("expected module, got {}", other.kind_name()),
        }
    }

    #[test]
    fn envelope_and_identifier_mapping() {
        let doc = json!({
            "ast": {"node_type": "Module", "body": [{
                "node_type": "Assign",
                "targets": [{"node_type": "Identifier", "name": "x", "ctx": "Store"}],
                "value": {"node_type": "Constant", "value": 42}
            }], "type_ignores": []},
            "metadata": {"python_version": "3.12.0"}
        });
        let decoded = decode(doc);
        let body = module_body(&decoded.node);
        let StmtKind::Assign { targets, value } = &body[0].node else {
            panic!("expected assignment");
        };
        assert_eq!(targets[0], Expr::name("x", ExprContext::Store, None));
        assert_eq!(value.node, ExprKind::Constant { value: ConstantValue::Int("42".into()), kind: None });
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn unknown_operator_falls_back_with_warning() {
        let decoded = decode(json!({
            "node_type": "BinOp",
            "left": {"node_type": "Constant", "value": 1},
            "op": "FrobnicateOp",
            "right": {"node_type": "Constant", "value": 2}
        }));
        let Node::Expr(expr) = &decoded.node else { panic!("expected expression") };
        assert!(matches!(expr.node, ExprKind::BinOp { op: Operator::Add, .. }));
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].path, "$.op");
        assert!(decoded.warnings[0].message.contains("FrobnicateOp"));
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = Decoder::default()
            .decode_value(&json!({"node_type": "FunctionDef"}))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Decode);
        assert_eq!(err.message(), "missing required field 'name' on FunctionDef");
    }

    #[test]
    fn unknown_kind_reports_innermost_path() {
        let err = Decoder::default()
            .decode_value(&json!({"ast": {"node_type": "Module", "body": [
                {"node_type": "Expr", "value": {"node_type": "Frobnicate"}}
            ]}}))
            .unwrap_err();
        assert_eq!(err.message(), "unknown node_type 'Frobnicate'");
        assert_eq!(err.json_path(), Some("ast.body[0].value"));
    }

    #[test]
    fn slot_mismatch_is_rejected() {
        let err = Decoder::default()
            .decode_value(&json!({"node_type": "Expr", "value": {"node_type": "Pass"}}))
            .unwrap_err();
        assert_eq!(err.message(), "expected an expression node, found 'Pass'");
        assert_eq!(err.json_path(), Some("$.value"));
    }

    #[test]
    fn absent_body_becomes_pass() {
        let decoded = decode(json!({
            "node_type": "FunctionDef",
            "name": "f",
            "args": {"node_type": "arguments", "kwonlyargs": [{"node_type": "arg", "arg": "k"}]}
        }));
        let Node::Stmt(stmt) = &decoded.node else { panic!("expected statement") };
        let StmtKind::FunctionDef(def) = &stmt.node else { panic!("expected def") };
        assert_eq!(def.body, vec![Located::bare(StmtKind::Pass)]);
        assert_eq!(def.args.kw_defaults, vec![None]);
    }

    #[test]
    fn constants_restore_non_native_values() {
        let value = |v: Value| {
            let Node::Expr(e) = decode(v).node else { panic!("expected expression") };
            match e.node {
                ExprKind::Constant { value, .. } => value,
                other => panic!("expected constant, got {}", other.kind_name()),
            }
        };
        assert_eq!(
            value(json!({"node_type": "Constant", "value": "\u{ff}A", "constant_type": "bytes"})),
            ConstantValue::Bytes(vec![0xff, b'A'])
        );
        assert_eq!(
            value(json!({"node_type": "Constant", "value": null, "constant_type": "Ellipsis"})),
            ConstantValue::Ellipsis
        );
        assert_eq!(
            value(json!({"node_type": "Constant", "value": "-inf", "constant_type": "float"})),
            ConstantValue::Float(f64::NEG_INFINITY)
        );
        assert_eq!(
            value(json!({"node_type": "Constant", "value": 1.5})),
            ConstantValue::Float(1.5)
        );
        assert!(Decoder::default()
            .decode_value(&json!({"node_type": "Constant", "value": [1]}))
            .is_err());
    }

    #[test]
    fn old_targets_degrade_newer_syntax() {
        let decoder = Decoder::new(TargetProfile::new(PythonVersion::new(3, 7, 0)), 200);
        let decoded = decoder
            .decode_value(&json!({"node_type": "Module", "body": [
                {"node_type": "Match", "subject": {"node_type": "Identifier", "name": "x"}},
                {"node_type": "Expr", "value": {
                    "node_type": "NamedExpr",
                    "target": {"node_type": "Identifier", "name": "y", "ctx": "Store"},
                    "value": {"node_type": "Constant", "value": 1}
                }},
                {"node_type": "FunctionDef", "name": "f", "args": {
                    "node_type": "arguments",
                    "posonlyargs": [{"node_type": "arg", "arg": "a"}],
                    "args": [{"node_type": "arg", "arg": "b"}]
                }}
            ]}))
            .unwrap();
        let body = module_body(&decoded.node);
        assert_eq!(body[0].node, StmtKind::Pass);
        let StmtKind::Expr { value } = &body[1].node else { panic!("expected expr") };
        assert!(matches!(value.node, ExprKind::Constant { .. }));
        let StmtKind::FunctionDef(def) = &body[2].node else { panic!("expected def") };
        assert!(def.args.posonlyargs.is_empty());
        assert_eq!(def.args.args.len(), 2);
        assert_eq!(decoded.warnings.len(), 3);
    }

    #[test]
    fn depth_limit_counts_expressions() {
        let mut expr = json!({"node_type": "Identifier", "name": "x"});
        for _ in 0..5 {
            expr = json!({"node_type": "UnaryOp", "op": "USub", "operand": expr});
        }
        let stmt = json!({"node_type": "Expr", "value": expr});
        // one statement plus six expressions
        assert!(Decoder::new(TargetProfile::default(), 7).decode_value(&stmt).is_ok());
        let err = Decoder::new(TargetProfile::default(), 6)
            .decode_value(&stmt)
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DepthLimit);
    }

    #[test]
    fn text_input_accepts_json_and_files() {
        let text = r#"{"node_type": "Pass"}"#;
        assert!(matches!(json_to_ast(text).unwrap(), Node::Stmt(_)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, text).unwrap();
        assert!(matches!(
            json_to_ast(path.to_string_lossy().as_ref()).unwrap(),
            Node::Stmt(_)
        ));
        assert!(json_to_ast("not json").is_err());
    }
}
