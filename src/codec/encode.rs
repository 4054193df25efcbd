//! Syntax tree to JSON.
//!
//! Encoding is total: every node kind has a recipe and every recipe emits
//! `node_type` first, then the kind's fields in catalogue order, then
//! `location` when metadata is requested and the node has one.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{IDENTIFIER, NODE_TYPE};
use crate::config::{Feature, TargetProfile};
use crate::syntax::{
    docstring_of, Alias, Arg, Arguments, ClassDefData, Comprehension, ConstantValue,
    ExceptHandler, Expr, ExprKind, ForData, FunctionDefData, Keyword, Location, MatchCase, Mod,
    Node, Pattern, PatternKind, Stmt, StmtKind, TryData, TypeParam, TypeParamKind, WithData,
    WithItem,
};

/// Encodes with the default target profile.
pub fn ast_to_json(node: &Node, include_metadata: bool) -> Value {
    Encoder::new(TargetProfile::default())
        .include_metadata(include_metadata)
        .encode(node)
}

#[derive(Debug, Clone)]
pub struct Encoder {
    profile: TargetProfile,
    include_metadata: bool,
    source_file: Option<String>,
    module_name: Option<String>,
    encoding: &'static str,
}

type Fields = Map<String, Value>;

impl Encoder {
    pub fn new(profile: TargetProfile) -> Self {
        Self {
            profile,
            include_metadata: true,
            source_file: None,
            module_name: None,
            encoding: "utf-8",
        }
    }

    /// Controls whether node locations are emitted.
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    /// Encoding the source text was decoded from, reported in the envelope.
    pub fn source_encoding(mut self, encoding: &'static str) -> Self {
        self.encoding = encoding;
        self
    }

    /// Encodes any root. A `Module` comes back inside the document envelope.
    pub fn encode(&self, node: &Node) -> Value {
        match node {
            Node::Mod(module @ Mod::Module { .. }) => self.envelope(self.module(module)),
            Node::Mod(root) => self.module(root),
            Node::Stmt(stmt) => self.stmt(stmt),
            Node::Expr(expr) => self.expr(expr),
            Node::Pattern(pattern) => self.pattern(pattern),
            Node::TypeParam(param) => self.type_param(param),
            Node::Arguments(args) => self.arguments(args),
            Node::Arg(arg) => self.arg(arg),
            Node::Keyword(keyword) => self.keyword(keyword),
            Node::Alias(alias) => self.alias(alias),
            Node::WithItem(item) => self.with_item(item),
            Node::MatchCase(case) => self.match_case(case),
            Node::Comprehension(comp) => self.comprehension(comp),
            Node::ExceptHandler(handler) => self.handler(handler),
            Node::TypeIgnore(ignore) => generic("TypeIgnore", ignore),
        }
    }

    fn envelope(&self, ast: Value) -> Value {
        let mut metadata = Fields::new();
        metadata.insert(
            "python_version".into(),
            json!(self.profile.python_version.to_string()),
        );
        metadata.insert(
            "conversion_timestamp".into(),
            json!(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        metadata.insert("encoding".into(), json!(self.encoding));
        if let Some(file) = &self.source_file {
            metadata.insert("source_file".into(), json!(file));
        }
        if let Some(name) = &self.module_name {
            metadata.insert("module_name".into(), json!(name));
        }
        json!({ "ast": ast, "metadata": Value::Object(metadata) })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn finish(&self, mut fields: Fields, location: Option<&Location>) -> Value {
        if self.include_metadata {
            if let Some(loc) = location {
                fields.insert(
                    "location".into(),
                    json!({
                        "lineno": loc.lineno,
                        "col_offset": loc.col_offset,
                        "end_lineno": loc.end_lineno,
                        "end_col_offset": loc.end_col_offset,
                    }),
                );
            }
        }
        Value::Object(fields)
    }

    fn stmts(&self, body: &[Stmt]) -> Value {
        Value::Array(body.iter().map(|s| self.stmt(s)).collect())
    }

    fn exprs(&self, exprs: &[Expr]) -> Value {
        Value::Array(exprs.iter().map(|e| self.expr(e)).collect())
    }

    fn opt_expr(&self, expr: Option<&Expr>) -> Value {
        expr.map_or(Value::Null, |e| self.expr(e))
    }

    fn patterns(&self, patterns: &[Pattern]) -> Value {
        Value::Array(patterns.iter().map(|p| self.pattern(p)).collect())
    }

    fn type_params(&self, params: &[TypeParam]) -> Value {
        Value::Array(params.iter().map(|p| self.type_param(p)).collect())
    }

    // ========================================================================
    // ROOTS & STATEMENTS
    // ========================================================================

    fn module(&self, root: &Mod) -> Value {
        let mut fields = seed(root.kind_name());
        match root {
            Mod::Module { body, type_ignores } => {
                fields.insert("body".into(), self.stmts(body));
                fields.insert(
                    "type_ignores".into(),
                    Value::Array(
                        type_ignores
                            .iter()
                            .map(|t| generic("TypeIgnore", t))
                            .collect(),
                    ),
                );
            }
            Mod::Interactive { body } => {
                fields.insert("body".into(), self.stmts(body));
            }
            Mod::Expression { body } => {
                fields.insert("body".into(), self.expr(body));
            }
            Mod::FunctionType { argtypes, returns } => {
                fields.insert("argtypes".into(), self.exprs(argtypes));
                fields.insert("returns".into(), self.expr(returns));
            }
        }
        Value::Object(fields)
    }

    pub fn stmt(&self, stmt: &Stmt) -> Value {
        crate::stack::guarded(|| self.stmt_node(stmt))
    }

    fn stmt_node(&self, stmt: &Stmt) -> Value {
        let mut fields = seed(stmt.node.kind_name());
        let f = &mut fields;
        match &stmt.node {
            StmtKind::FunctionDef(def) | StmtKind::AsyncFunctionDef(def) => self.function(f, def),
            StmtKind::ClassDef(def) => self.class(f, def),
            StmtKind::Return { value } => {
                f.insert("value".into(), self.opt_expr(value.as_deref()));
            }
            StmtKind::Delete { targets } => {
                f.insert("targets".into(), self.exprs(targets));
            }
            StmtKind::Assign { targets, value } => {
                f.insert("targets".into(), self.exprs(targets));
                f.insert("value".into(), self.expr(value));
            }
            StmtKind::TypeAlias {
                name,
                type_params,
                value,
            } => {
                f.insert("name".into(), self.expr(name));
                f.insert("type_params".into(), self.type_params(type_params));
                f.insert("value".into(), self.expr(value));
            }
            StmtKind::AugAssign { target, op, value } => {
                f.insert("target".into(), self.expr(target));
                f.insert("op".into(), json!(op.name()));
                f.insert("value".into(), self.expr(value));
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => {
                f.insert("target".into(), self.expr(target));
                f.insert("annotation".into(), self.expr(annotation));
                f.insert("value".into(), self.opt_expr(value.as_deref()));
                f.insert("simple".into(), json!(u8::from(*simple)));
            }
            StmtKind::For(data) | StmtKind::AsyncFor(data) => self.for_loop(f, data),
            StmtKind::While { test, body, orelse } | StmtKind::If { test, body, orelse } => {
                f.insert("test".into(), self.expr(test));
                f.insert("body".into(), self.stmts(body));
                f.insert("orelse".into(), self.stmts(orelse));
            }
            StmtKind::With(data) | StmtKind::AsyncWith(data) => self.with(f, data),
            StmtKind::Match { subject, cases } => {
                f.insert("subject".into(), self.expr(subject));
                f.insert(
                    "cases".into(),
                    Value::Array(cases.iter().map(|c| self.match_case(c)).collect()),
                );
            }
            StmtKind::Raise { exc, cause } => {
                f.insert("exc".into(), self.opt_expr(exc.as_deref()));
                f.insert("cause".into(), self.opt_expr(cause.as_deref()));
            }
            StmtKind::Try(data) | StmtKind::TryStar(data) => self.try_block(f, data),
            StmtKind::Assert { test, msg } => {
                f.insert("test".into(), self.expr(test));
                f.insert("msg".into(), self.opt_expr(msg.as_deref()));
            }
            StmtKind::Import { names } => {
                f.insert("names".into(), self.aliases(names));
            }
            StmtKind::ImportFrom {
                module,
                names,
                level,
            } => {
                f.insert("module".into(), json!(module));
                f.insert("names".into(), self.aliases(names));
                f.insert("level".into(), json!(level));
            }
            StmtKind::Global { names } | StmtKind::Nonlocal { names } => {
                f.insert("names".into(), json!(names));
            }
            StmtKind::Expr { value } => {
                f.insert("value".into(), self.expr(value));
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
        self.finish(fields, stmt.location.as_ref())
    }

    fn function(&self, f: &mut Fields, def: &FunctionDefData) {
        f.insert("name".into(), json!(def.name));
        f.insert("type_params".into(), self.type_params(&def.type_params));
        f.insert("args".into(), self.arguments(&def.args));
        f.insert("body".into(), self.stmts(&def.body));
        f.insert("decorator_list".into(), self.exprs(&def.decorator_list));
        f.insert("returns".into(), self.opt_expr(def.returns.as_deref()));
        if let Some(doc) = docstring_of(&def.body) {
            f.insert("docstring".into(), json!(doc));
        }
    }

    fn class(&self, f: &mut Fields, def: &ClassDefData) {
        f.insert("name".into(), json!(def.name));
        f.insert("type_params".into(), self.type_params(&def.type_params));
        f.insert("bases".into(), self.exprs(&def.bases));
        f.insert(
            "keywords".into(),
            Value::Array(def.keywords.iter().map(|k| self.keyword(k)).collect()),
        );
        f.insert("body".into(), self.stmts(&def.body));
        f.insert("decorator_list".into(), self.exprs(&def.decorator_list));
        if let Some(doc) = docstring_of(&def.body) {
            f.insert("docstring".into(), json!(doc));
        }
    }

    fn for_loop(&self, f: &mut Fields, data: &ForData) {
        f.insert("target".into(), self.expr(&data.target));
        f.insert("iter".into(), self.expr(&data.iter));
        f.insert("body".into(), self.stmts(&data.body));
        f.insert("orelse".into(), self.stmts(&data.orelse));
    }

    fn with(&self, f: &mut Fields, data: &WithData) {
        f.insert(
            "items".into(),
            Value::Array(data.items.iter().map(|i| self.with_item(i)).collect()),
        );
        f.insert("body".into(), self.stmts(&data.body));
    }

    fn try_block(&self, f: &mut Fields, data: &TryData) {
        f.insert("body".into(), self.stmts(&data.body));
        f.insert(
            "handlers".into(),
            Value::Array(data.handlers.iter().map(|h| self.handler(h)).collect()),
        );
        f.insert("orelse".into(), self.stmts(&data.orelse));
        f.insert("finalbody".into(), self.stmts(&data.finalbody));
    }

    fn aliases(&self, names: &[Alias]) -> Value {
        Value::Array(names.iter().map(|a| self.alias(a)).collect())
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    pub fn expr(&self, expr: &Expr) -> Value {
        crate::stack::guarded(|| self.expr_node(expr))
    }

    fn expr_node(&self, expr: &Expr) -> Value {
        let kind = match &expr.node {
            ExprKind::Name { .. } => IDENTIFIER,
            other => other.kind_name(),
        };
        let mut fields = seed(kind);
        let f = &mut fields;
        match &expr.node {
            ExprKind::BoolOp { op, values } => {
                f.insert("op".into(), json!(op.name()));
                f.insert("values".into(), self.exprs(values));
            }
            ExprKind::NamedExpr { target, value } => {
                f.insert("target".into(), self.expr(target));
                f.insert("value".into(), self.expr(value));
            }
            ExprKind::BinOp { left, op, right } => {
                f.insert("left".into(), self.expr(left));
                f.insert("op".into(), json!(op.name()));
                f.insert("right".into(), self.expr(right));
            }
            ExprKind::UnaryOp { op, operand } => {
                f.insert("op".into(), json!(op.name()));
                f.insert("operand".into(), self.expr(operand));
            }
            ExprKind::Lambda { args, body } => {
                f.insert("args".into(), self.arguments(args));
                f.insert("body".into(), self.expr(body));
            }
            ExprKind::IfExp { test, body, orelse } => {
                f.insert("test".into(), self.expr(test));
                f.insert("body".into(), self.expr(body));
                f.insert("orelse".into(), self.expr(orelse));
            }
            ExprKind::Dict { keys, values } => {
                f.insert(
                    "keys".into(),
                    Value::Array(keys.iter().map(|k| self.opt_expr(k.as_ref())).collect()),
                );
                f.insert("values".into(), self.exprs(values));
            }
            ExprKind::Set { elts } => {
                f.insert("elts".into(), self.exprs(elts));
            }
            ExprKind::ListComp { elt, generators }
            | ExprKind::SetComp { elt, generators }
            | ExprKind::GeneratorExp { elt, generators } => {
                f.insert("elt".into(), self.expr(elt));
                f.insert("generators".into(), self.generators(generators));
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                f.insert("key".into(), self.expr(key));
                f.insert("value".into(), self.expr(value));
                f.insert("generators".into(), self.generators(generators));
            }
            ExprKind::Await { value } | ExprKind::YieldFrom { value } => {
                f.insert("value".into(), self.expr(value));
            }
            ExprKind::Yield { value } => {
                f.insert("value".into(), self.opt_expr(value.as_deref()));
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                f.insert("left".into(), self.expr(left));
                f.insert(
                    "ops".into(),
                    Value::Array(ops.iter().map(|op| json!(op.name())).collect()),
                );
                f.insert("comparators".into(), self.exprs(comparators));
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                f.insert("func".into(), self.expr(func));
                f.insert("args".into(), self.exprs(args));
                f.insert(
                    "keywords".into(),
                    Value::Array(keywords.iter().map(|k| self.keyword(k)).collect()),
                );
            }
            ExprKind::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                f.insert("value".into(), self.expr(value));
                f.insert("conversion".into(), json!(conversion));
                f.insert("format_spec".into(), self.opt_expr(format_spec.as_deref()));
            }
            ExprKind::JoinedStr { values } => {
                f.insert("values".into(), self.exprs(values));
            }
            ExprKind::Constant { value, kind } => {
                constant_fields(f, value);
                if let Some(kind) = kind {
                    f.insert("kind".into(), json!(kind));
                }
            }
            ExprKind::Attribute { value, attr, ctx } => {
                f.insert("value".into(), self.expr(value));
                f.insert("attr".into(), json!(attr));
                f.insert("ctx".into(), json!(ctx.name()));
            }
            ExprKind::Subscript { value, slice, ctx } => {
                f.insert("value".into(), self.expr(value));
                f.insert("slice".into(), self.expr(slice));
                f.insert("ctx".into(), json!(ctx.name()));
            }
            ExprKind::Starred { value, ctx } => {
                f.insert("value".into(), self.expr(value));
                f.insert("ctx".into(), json!(ctx.name()));
            }
            ExprKind::Name { id, ctx } => {
                f.insert("name".into(), json!(id));
                f.insert("ctx".into(), json!(ctx.name()));
            }
            ExprKind::List { elts, ctx } | ExprKind::Tuple { elts, ctx } => {
                f.insert("elts".into(), self.exprs(elts));
                f.insert("ctx".into(), json!(ctx.name()));
            }
            ExprKind::Slice { lower, upper, step } => {
                f.insert("lower".into(), self.opt_expr(lower.as_deref()));
                f.insert("upper".into(), self.opt_expr(upper.as_deref()));
                f.insert("step".into(), self.opt_expr(step.as_deref()));
            }
        }
        self.finish(fields, expr.location.as_ref())
    }

    fn generators(&self, generators: &[Comprehension]) -> Value {
        Value::Array(generators.iter().map(|c| self.comprehension(c)).collect())
    }

    // ========================================================================
    // PATTERNS & TYPE PARAMETERS
    // ========================================================================

    pub fn pattern(&self, pattern: &Pattern) -> Value {
        crate::stack::guarded(|| self.pattern_node(pattern))
    }

    fn pattern_node(&self, pattern: &Pattern) -> Value {
        let mut fields = seed(pattern.node.kind_name());
        let f = &mut fields;
        match &pattern.node {
            PatternKind::MatchValue { value } => {
                f.insert("value".into(), self.expr(value));
            }
            PatternKind::MatchSingleton { value } => constant_fields(f, value),
            PatternKind::MatchSequence { patterns } | PatternKind::MatchOr { patterns } => {
                f.insert("patterns".into(), self.patterns(patterns));
            }
            PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                f.insert("keys".into(), self.exprs(keys));
                f.insert("patterns".into(), self.patterns(patterns));
                f.insert("rest".into(), json!(rest));
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                f.insert("cls".into(), self.expr(cls));
                f.insert("patterns".into(), self.patterns(patterns));
                f.insert("kwd_attrs".into(), json!(kwd_attrs));
                f.insert("kwd_patterns".into(), self.patterns(kwd_patterns));
            }
            PatternKind::MatchStar { name } => {
                f.insert("name".into(), json!(name));
            }
            PatternKind::MatchAs { pattern, name } => {
                f.insert(
                    "pattern".into(),
                    pattern.as_deref().map_or(Value::Null, |p| self.pattern(p)),
                );
                f.insert("name".into(), json!(name));
            }
        }
        self.finish(fields, pattern.location.as_ref())
    }

    pub fn type_param(&self, param: &TypeParam) -> Value {
        let mut fields = seed(param.node.kind_name());
        match &param.node {
            TypeParamKind::TypeVar {
                name,
                bound,
                default_value,
            } => {
                fields.insert("name".into(), json!(name));
                fields.insert("bound".into(), self.opt_expr(bound.as_deref()));
                self.default_value(&mut fields, default_value.as_deref());
            }
            TypeParamKind::ParamSpec {
                name,
                default_value,
            }
            | TypeParamKind::TypeVarTuple {
                name,
                default_value,
            } => {
                fields.insert("name".into(), json!(name));
                self.default_value(&mut fields, default_value.as_deref());
            }
        }
        self.finish(fields, param.location.as_ref())
    }

    /// `default_value` only exists on targets that have type parameter defaults.
    fn default_value(&self, fields: &mut Fields, value: Option<&Expr>) {
        if self.profile.supports(Feature::TypeParamDefaults) {
            fields.insert("default_value".into(), self.opt_expr(value));
        }
    }

    // ========================================================================
    // RECORDS
    // ========================================================================

    pub fn arguments(&self, args: &Arguments) -> Value {
        let arg_list = |list: &[Arg]| Value::Array(list.iter().map(|a| self.arg(a)).collect());
        let mut f = seed("arguments");
        f.insert("posonlyargs".into(), arg_list(&args.posonlyargs));
        f.insert("args".into(), arg_list(&args.args));
        f.insert(
            "vararg".into(),
            args.vararg.as_deref().map_or(Value::Null, |a| self.arg(a)),
        );
        f.insert("kwonlyargs".into(), arg_list(&args.kwonlyargs));
        f.insert(
            "kw_defaults".into(),
            Value::Array(
                args.kw_defaults
                    .iter()
                    .map(|d| self.opt_expr(d.as_ref()))
                    .collect(),
            ),
        );
        f.insert(
            "kwarg".into(),
            args.kwarg.as_deref().map_or(Value::Null, |a| self.arg(a)),
        );
        f.insert("defaults".into(), self.exprs(&args.defaults));
        Value::Object(f)
    }

    fn arg(&self, arg: &Arg) -> Value {
        let mut f = seed("arg");
        f.insert("arg".into(), json!(arg.arg));
        f.insert("annotation".into(), self.opt_expr(arg.annotation.as_deref()));
        self.finish(f, arg.location.as_ref())
    }

    fn keyword(&self, keyword: &Keyword) -> Value {
        let mut f = seed("keyword");
        f.insert("arg".into(), json!(keyword.arg));
        f.insert("value".into(), self.expr(&keyword.value));
        self.finish(f, keyword.location.as_ref())
    }

    fn alias(&self, alias: &Alias) -> Value {
        let mut f = seed("alias");
        f.insert("name".into(), json!(alias.name));
        f.insert("asname".into(), json!(alias.asname));
        self.finish(f, alias.location.as_ref())
    }

    fn with_item(&self, item: &WithItem) -> Value {
        let mut f = seed("withitem");
        f.insert("context_expr".into(), self.expr(&item.context_expr));
        f.insert(
            "optional_vars".into(),
            self.opt_expr(item.optional_vars.as_ref()),
        );
        Value::Object(f)
    }

    fn match_case(&self, case: &MatchCase) -> Value {
        let mut f = seed("match_case");
        f.insert("pattern".into(), self.pattern(&case.pattern));
        f.insert("guard".into(), self.opt_expr(case.guard.as_ref()));
        f.insert("body".into(), self.stmts(&case.body));
        Value::Object(f)
    }

    fn comprehension(&self, comp: &Comprehension) -> Value {
        let mut f = seed("comprehension");
        f.insert("target".into(), self.expr(&comp.target));
        f.insert("iter".into(), self.expr(&comp.iter));
        f.insert("ifs".into(), self.exprs(&comp.ifs));
        f.insert("is_async".into(), json!(u8::from(comp.is_async)));
        Value::Object(f)
    }

    fn handler(&self, handler: &ExceptHandler) -> Value {
        let mut f = seed("ExceptHandler");
        f.insert("type".into(), self.opt_expr(handler.type_.as_ref()));
        f.insert("name".into(), json!(handler.name));
        f.insert("body".into(), self.stmts(&handler.body));
        self.finish(f, handler.location.as_ref())
    }
}

fn seed(kind: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(NODE_TYPE.into(), json!(kind));
    fields
}

/// Field-for-field serialization for plain records such as
/// [`TypeIgnore`](crate::syntax::TypeIgnore).
fn generic<T: Serialize>(kind: &str, record: &T) -> Value {
    let mut fields = seed(kind);
    if let Ok(Value::Object(declared)) = serde_json::to_value(record) {
        fields.extend(declared);
    }
    Value::Object(fields)
}

/// Writes `value` (and `constant_type` when JSON has no native form for it).
fn constant_fields(f: &mut Fields, value: &ConstantValue) {
    let (json_value, constant_type) = match value {
        ConstantValue::None => (Value::Null, None),
        ConstantValue::Bool(b) => (json!(b), None),
        ConstantValue::Int(digits) => match value.int_as_i64() {
            Some(n) => (json!(n), None),
            None => (json!(digits), Some("int")),
        },
        ConstantValue::Float(x) if x.is_finite() => (json!(x), None),
        ConstantValue::Float(x) => (json!(non_finite(*x)), Some("float")),
        ConstantValue::Complex(x) if x.is_finite() => (json!(x), Some("complex")),
        ConstantValue::Complex(x) => (json!(non_finite(*x)), Some("complex")),
        ConstantValue::Str(s) => (json!(s), None),
        ConstantValue::Bytes(bytes) => {
            let text: String = bytes.iter().map(|b| char::from(*b)).collect();
            (json!(text), Some("bytes"))
        }
        ConstantValue::Ellipsis => (Value::Null, Some("Ellipsis")),
    };
    f.insert("value".into(), json_value);
    if let Some(tag) = constant_type {
        f.insert("constant_type".into(), json!(tag));
    }
}

fn non_finite(x: f64) -> &'static str {
    if x.is_nan() {
        "nan"
    } else if x > 0.0 {
        "inf"
    } else {
        "-inf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PythonVersion, DEFAULT_MAX_DEPTH};
    use crate::syntax::{parse_source, ParseMode, TypeIgnore};

    fn encode_source(source: &str, metadata: bool) -> Value {
        let module = parse_source(source, ParseMode::Exec, "<test>", DEFAULT_MAX_DEPTH).unwrap();
        ast_to_json(&Node::Mod(module), metadata)
    }

    #[test]
    fn module_root_is_wrapped_in_envelope() {
        let doc = encode_source("x = 42\n", false);
        assert_eq!(doc["metadata"]["encoding"], "utf-8");
        assert_eq!(doc["metadata"]["python_version"], "3.12.0");
        assert!(doc["metadata"]["conversion_timestamp"]
            .as_str()
            .unwrap()
            .ends_with('Z'));
        let assign = &doc["ast"]["body"][0];
        assert_eq!(assign["node_type"], "Assign");
        assert_eq!(assign["targets"][0]["node_type"], "Identifier");
        assert_eq!(assign["targets"][0]["name"], "x");
        assert_eq!(assign["targets"][0]["ctx"], "Store");
        assert_eq!(assign["value"]["value"], 42);
        assert!(assign.get("location").is_none());
    }

    #[test]
    fn node_type_leads_and_location_is_optional() {
        let doc = encode_source("pass\n", true);
        let stmt = doc["ast"]["body"][0].as_object().unwrap();
        assert_eq!(stmt.keys().next().map(String::as_str), Some("node_type"));
        assert_eq!(stmt["location"]["lineno"], 1);
        assert_eq!(stmt["location"]["end_col_offset"], 4);
    }

    #[test]
    fn docstring_is_duplicated_not_moved() {
        let doc = encode_source("def f():\n    \"\"\"Doc.\"\"\"\n    return 1\n", false);
        let def = &doc["ast"]["body"][0];
        assert_eq!(def["docstring"], "Doc.");
        assert_eq!(def["body"].as_array().unwrap().len(), 2);
        let plain = encode_source("class C:\n    x = 1\n", false);
        assert!(plain["ast"]["body"][0].get("docstring").is_none());
    }

    #[test]
    fn non_native_constants_carry_a_type() {
        let doc = encode_source("b'\\xff'\n...\n2j\n123456789012345678901234567890\n", false);
        let values: Vec<&Value> = (0..4).map(|i| &doc["ast"]["body"][i]["value"]).collect();
        assert_eq!(values[0]["value"], "\u{ff}");
        assert_eq!(values[0]["constant_type"], "bytes");
        assert_eq!(values[1]["constant_type"], "Ellipsis");
        assert!(values[1]["value"].is_null());
        assert_eq!(values[2]["value"], 2.0);
        assert_eq!(values[2]["constant_type"], "complex");
        assert_eq!(values[3]["value"], "123456789012345678901234567890");
        assert_eq!(values[3]["constant_type"], "int");
    }

    #[test]
    fn non_module_roots_are_bare() {
        let expr = Expr::name("y", crate::syntax::ExprContext::Load, None);
        let doc = ast_to_json(&Node::Expr(expr), true);
        assert_eq!(doc["node_type"], "Identifier");
        assert!(doc.get("ast").is_none());

        let ignore = TypeIgnore {
            lineno: 3,
            tag: "[attr]".into(),
        };
        let doc = ast_to_json(&Node::TypeIgnore(ignore), true);
        assert_eq!(doc, json!({"node_type": "TypeIgnore", "lineno": 3, "tag": "[attr]"}));
    }

    #[test]
    fn type_param_defaults_follow_the_target() {
        let param = TypeParam::new(
            TypeParamKind::TypeVar {
                name: "T".into(),
                bound: None,
                default_value: Some(Box::new(Expr::name("int", crate::syntax::ExprContext::Load, None))),
            },
            None,
        );
        let node = Node::TypeParam(param);
        let doc = ast_to_json(&node, false);
        assert_eq!(doc["name"], "T");
        assert!(doc.get("default_value").is_none());

        let newer = Encoder::new(TargetProfile::new(PythonVersion::new(3, 13, 0))).encode(&node);
        assert_eq!(newer["default_value"]["name"], "int");
    }

    #[test]
    fn signature_layout_is_explicit() {
        let doc = encode_source("def f(a, /, b=1, *args, c, d=2, **kw): pass\n", false);
        let args = &doc["ast"]["body"][0]["args"];
        assert_eq!(args["node_type"], "arguments");
        assert_eq!(args["posonlyargs"][0]["arg"], "a");
        assert_eq!(args["vararg"]["arg"], "args");
        assert_eq!(args["kw_defaults"][0], Value::Null);
        assert_eq!(args["kw_defaults"][1]["value"], 2);
        assert_eq!(args["defaults"].as_array().unwrap().len(), 1);
    }
}
