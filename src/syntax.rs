//! Python syntax tree model.
//!
//! One enum variant per node kind, each carrying exactly the children CPython's
//! `ast` module declares for it. Statement, expression, pattern and type
//! parameter nodes are wrapped in [`Located`] so the optional source location
//! travels with the node instead of being threaded through every variant.
//!
//! Trees are produced by [`parser`] from source text or by the decoder from
//! JSON, and turned back into text by [`unparse`].

use serde::{Deserialize, Serialize};

pub mod literals;
pub mod parser;
#[cfg(feature = "unparse")]
pub mod unparse;

pub use parser::{parse_source, ParseMode};

// ============================================================================
// LOCATIONS
// ============================================================================

/// Source position of a node: 1-based lines, 0-based UTF-8 byte columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub lineno: usize,
    pub col_offset: usize,
    pub end_lineno: usize,
    pub end_col_offset: usize,
}

/// A node kind paired with its optional source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub node: T,
    pub location: Option<Location>,
}

impl<T> Located<T> {
    pub fn new(node: T, location: Option<Location>) -> Self {
        Self { node, location }
    }

    /// Wraps a node that has no source position (synthesized or decoded without one).
    pub fn bare(node: T) -> Self {
        Self {
            node,
            location: None,
        }
    }
}

pub type Stmt = Located<StmtKind>;
pub type Expr = Located<ExprKind>;
pub type Pattern = Located<PatternKind>;
pub type TypeParam = Located<TypeParamKind>;

// ============================================================================
// TAGS
// ============================================================================

/// Declares a closed tag enumeration with its CPython class names, source symbols
/// and the fallback used when a decoder meets an unrecognized name.
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident,
        { $($variant:ident => $symbol:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const FALLBACK: $name = $name::$fallback;

            /// CPython class name, used as the JSON tag.
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Source-level spelling of the operator.
            pub fn symbol(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_symbol(symbol: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|tag| tag.symbol() == symbol)
            }

            /// Every tag name, in declaration order.
            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|tag| tag.name()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

tag_enum! {
    /// Binary arithmetic and bitwise operators.
    Operator, fallback = Add, {
        Add => "+",
        Sub => "-",
        Mult => "*",
        MatMult => "@",
        Div => "/",
        Mod => "%",
        Pow => "**",
        LShift => "<<",
        RShift => ">>",
        BitOr => "|",
        BitXor => "^",
        BitAnd => "&",
        FloorDiv => "//",
    }
}

tag_enum! {
    BoolOperator, fallback = And, {
        And => "and",
        Or => "or",
    }
}

tag_enum! {
    UnaryOperator, fallback = UAdd, {
        Invert => "~",
        Not => "not",
        UAdd => "+",
        USub => "-",
    }
}

tag_enum! {
    CmpOperator, fallback = Eq, {
        Eq => "==",
        NotEq => "!=",
        Lt => "<",
        LtE => "<=",
        Gt => ">",
        GtE => ">=",
        Is => "is",
        IsNot => "is not",
        In => "in",
        NotIn => "not in",
    }
}

tag_enum! {
    /// How a name, attribute, subscript or container is used.
    ExprContext, fallback = Load, {
        Load => "load",
        Store => "store",
        Del => "del",
    }
}

// ============================================================================
// MODULES
// ============================================================================

/// Root nodes, one per compile mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Mod {
    Module {
        body: Vec<Stmt>,
        type_ignores: Vec<TypeIgnore>,
    },
    Interactive {
        body: Vec<Stmt>,
    },
    Expression {
        body: Box<Expr>,
    },
    FunctionType {
        argtypes: Vec<Expr>,
        returns: Box<Expr>,
    },
}

impl Mod {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Mod::Module { .. } => "Module",
            Mod::Interactive { .. } => "Interactive",
            Mod::Expression { .. } => "Expression",
            Mod::FunctionType { .. } => "FunctionType",
        }
    }
}

// ============================================================================
// STATEMENTS
// ============================================================================

/// Shared layout of `FunctionDef` and `AsyncFunctionDef`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefData {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub args: Box<Arguments>,
    pub body: Vec<Stmt>,
    pub decorator_list: Vec<Expr>,
    pub returns: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefData {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub bases: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<Stmt>,
    pub decorator_list: Vec<Expr>,
}

/// Shared layout of `For` and `AsyncFor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForData {
    pub target: Box<Expr>,
    pub iter: Box<Expr>,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

/// Shared layout of `With` and `AsyncWith`.
#[derive(Debug, Clone, PartialEq)]
pub struct WithData {
    pub items: Vec<WithItem>,
    pub body: Vec<Stmt>,
}

/// Shared layout of `Try` and `TryStar`.
#[derive(Debug, Clone, PartialEq)]
pub struct TryData {
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef(FunctionDefData),
    AsyncFunctionDef(FunctionDefData),
    ClassDef(ClassDefData),
    Return {
        value: Option<Box<Expr>>,
    },
    Delete {
        targets: Vec<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        value: Box<Expr>,
    },
    TypeAlias {
        name: Box<Expr>,
        type_params: Vec<TypeParam>,
        value: Box<Expr>,
    },
    AugAssign {
        target: Box<Expr>,
        op: Operator,
        value: Box<Expr>,
    },
    AnnAssign {
        target: Box<Expr>,
        annotation: Box<Expr>,
        value: Option<Box<Expr>>,
        /// True when the target is a bare name that was not parenthesized.
        simple: bool,
    },
    For(ForData),
    AsyncFor(ForData),
    While {
        test: Box<Expr>,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    If {
        test: Box<Expr>,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    With(WithData),
    AsyncWith(WithData),
    Match {
        subject: Box<Expr>,
        cases: Vec<MatchCase>,
    },
    Raise {
        exc: Option<Box<Expr>>,
        cause: Option<Box<Expr>>,
    },
    Try(TryData),
    TryStar(TryData),
    Assert {
        test: Box<Expr>,
        msg: Option<Box<Expr>>,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: u32,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Expr {
        value: Box<Expr>,
    },
    Pass,
    Break,
    Continue,
}

impl StmtKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            StmtKind::FunctionDef(_) => "FunctionDef",
            StmtKind::AsyncFunctionDef(_) => "AsyncFunctionDef",
            StmtKind::ClassDef(_) => "ClassDef",
            StmtKind::Return { .. } => "Return",
            StmtKind::Delete { .. } => "Delete",
            StmtKind::Assign { .. } => "Assign",
            StmtKind::TypeAlias { .. } => "TypeAlias",
            StmtKind::AugAssign { .. } => "AugAssign",
            StmtKind::AnnAssign { .. } => "AnnAssign",
            StmtKind::For(_) => "For",
            StmtKind::AsyncFor(_) => "AsyncFor",
            StmtKind::While { .. } => "While",
            StmtKind::If { .. } => "If",
            StmtKind::With(_) => "With",
            StmtKind::AsyncWith(_) => "AsyncWith",
            StmtKind::Match { .. } => "Match",
            StmtKind::Raise { .. } => "Raise",
            StmtKind::Try(_) => "Try",
            StmtKind::TryStar(_) => "TryStar",
            StmtKind::Assert { .. } => "Assert",
            StmtKind::Import { .. } => "Import",
            StmtKind::ImportFrom { .. } => "ImportFrom",
            StmtKind::Global { .. } => "Global",
            StmtKind::Nonlocal { .. } => "Nonlocal",
            StmtKind::Expr { .. } => "Expr",
            StmtKind::Pass => "Pass",
            StmtKind::Break => "Break",
            StmtKind::Continue => "Continue",
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Literal value carried by a `Constant` node.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    None,
    Bool(bool),
    /// Arbitrary-precision integer kept as its canonical decimal spelling.
    Int(String),
    Float(f64),
    /// Imaginary literal; the real part is always zero for source literals.
    Complex(f64),
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
}

impl ConstantValue {
    /// Small integers round-trip as JSON numbers; anything else stays a string.
    pub fn int_as_i64(&self) -> Option<i64> {
        match self {
            ConstantValue::Int(digits) => digits.parse().ok(),
            _ => None,
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, ConstantValue::Str(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    BoolOp {
        op: BoolOperator,
        values: Vec<Expr>,
    },
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Lambda {
        args: Box<Arguments>,
        body: Box<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Dict {
        /// `None` marks a `**mapping` unpacking entry.
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Set {
        elts: Vec<Expr>,
    },
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Await {
        value: Box<Expr>,
    },
    Yield {
        value: Option<Box<Expr>>,
    },
    YieldFrom {
        value: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOperator>,
        comparators: Vec<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    FormattedValue {
        value: Box<Expr>,
        /// -1 for none, otherwise the code point of `s`, `r` or `a`.
        conversion: i32,
        format_spec: Option<Box<Expr>>,
    },
    JoinedStr {
        values: Vec<Expr>,
    },
    Constant {
        value: ConstantValue,
        kind: Option<String>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
        ctx: ExprContext,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
        ctx: ExprContext,
    },
    Starred {
        value: Box<Expr>,
        ctx: ExprContext,
    },
    Name {
        id: String,
        ctx: ExprContext,
    },
    List {
        elts: Vec<Expr>,
        ctx: ExprContext,
    },
    Tuple {
        elts: Vec<Expr>,
        ctx: ExprContext,
    },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl ExprKind {
    /// CPython class name. The JSON tag for `Name` is remapped by the codec.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::BoolOp { .. } => "BoolOp",
            ExprKind::NamedExpr { .. } => "NamedExpr",
            ExprKind::BinOp { .. } => "BinOp",
            ExprKind::UnaryOp { .. } => "UnaryOp",
            ExprKind::Lambda { .. } => "Lambda",
            ExprKind::IfExp { .. } => "IfExp",
            ExprKind::Dict { .. } => "Dict",
            ExprKind::Set { .. } => "Set",
            ExprKind::ListComp { .. } => "ListComp",
            ExprKind::SetComp { .. } => "SetComp",
            ExprKind::DictComp { .. } => "DictComp",
            ExprKind::GeneratorExp { .. } => "GeneratorExp",
            ExprKind::Await { .. } => "Await",
            ExprKind::Yield { .. } => "Yield",
            ExprKind::YieldFrom { .. } => "YieldFrom",
            ExprKind::Compare { .. } => "Compare",
            ExprKind::Call { .. } => "Call",
            ExprKind::FormattedValue { .. } => "FormattedValue",
            ExprKind::JoinedStr { .. } => "JoinedStr",
            ExprKind::Constant { .. } => "Constant",
            ExprKind::Attribute { .. } => "Attribute",
            ExprKind::Subscript { .. } => "Subscript",
            ExprKind::Starred { .. } => "Starred",
            ExprKind::Name { .. } => "Name",
            ExprKind::List { .. } => "List",
            ExprKind::Tuple { .. } => "Tuple",
            ExprKind::Slice { .. } => "Slice",
        }
    }

    /// Expression context for kinds that carry one.
    pub fn ctx(&self) -> Option<ExprContext> {
        match self {
            ExprKind::Attribute { ctx, .. }
            | ExprKind::Subscript { ctx, .. }
            | ExprKind::Starred { ctx, .. }
            | ExprKind::Name { ctx, .. }
            | ExprKind::List { ctx, .. }
            | ExprKind::Tuple { ctx, .. } => Some(*ctx),
            _ => None,
        }
    }
}

impl Expr {
    pub fn name(id: impl Into<String>, ctx: ExprContext, location: Option<Location>) -> Self {
        Located::new(
            ExprKind::Name {
                id: id.into(),
                ctx,
            },
            location,
        )
    }

    pub fn constant(value: ConstantValue, location: Option<Location>) -> Self {
        Located::new(ExprKind::Constant { value, kind: None }, location)
    }

    /// Rewrites the context of an assignment or deletion target, recursing into
    /// the element lists of tuples, lists and starred wrappers.
    pub fn set_ctx(&mut self, new_ctx: ExprContext) {
        match &mut self.node {
            ExprKind::Name { ctx, .. }
            | ExprKind::Attribute { ctx, .. }
            | ExprKind::Subscript { ctx, .. } => *ctx = new_ctx,
            ExprKind::Starred { ctx, value } => {
                *ctx = new_ctx;
                value.set_ctx(new_ctx);
            }
            ExprKind::List { ctx, elts } | ExprKind::Tuple { ctx, elts } => {
                *ctx = new_ctx;
                for elt in elts {
                    elt.set_ctx(new_ctx);
                }
            }
            _ => {}
        }
    }

    /// The string value if this is a plain string constant (docstring candidate).
    pub fn as_str_constant(&self) -> Option<&str> {
        match &self.node {
            ExprKind::Constant {
                value: ConstantValue::Str(s),
                ..
            } => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// PATTERNS & TYPE PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    MatchValue {
        value: Box<Expr>,
    },
    MatchSingleton {
        value: ConstantValue,
    },
    MatchSequence {
        patterns: Vec<Pattern>,
    },
    MatchMapping {
        keys: Vec<Expr>,
        patterns: Vec<Pattern>,
        rest: Option<String>,
    },
    MatchClass {
        cls: Box<Expr>,
        patterns: Vec<Pattern>,
        kwd_attrs: Vec<String>,
        kwd_patterns: Vec<Pattern>,
    },
    MatchStar {
        name: Option<String>,
    },
    MatchAs {
        pattern: Option<Box<Pattern>>,
        name: Option<String>,
    },
    MatchOr {
        patterns: Vec<Pattern>,
    },
}

impl PatternKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PatternKind::MatchValue { .. } => "MatchValue",
            PatternKind::MatchSingleton { .. } => "MatchSingleton",
            PatternKind::MatchSequence { .. } => "MatchSequence",
            PatternKind::MatchMapping { .. } => "MatchMapping",
            PatternKind::MatchClass { .. } => "MatchClass",
            PatternKind::MatchStar { .. } => "MatchStar",
            PatternKind::MatchAs { .. } => "MatchAs",
            PatternKind::MatchOr { .. } => "MatchOr",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeParamKind {
    TypeVar {
        name: String,
        bound: Option<Box<Expr>>,
        default_value: Option<Box<Expr>>,
    },
    ParamSpec {
        name: String,
        default_value: Option<Box<Expr>>,
    },
    TypeVarTuple {
        name: String,
        default_value: Option<Box<Expr>>,
    },
}

impl TypeParamKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeParamKind::TypeVar { .. } => "TypeVar",
            TypeParamKind::ParamSpec { .. } => "ParamSpec",
            TypeParamKind::TypeVarTuple { .. } => "TypeVarTuple",
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// Full parameter signature of a function or lambda.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    pub posonlyargs: Vec<Arg>,
    pub args: Vec<Arg>,
    pub vararg: Option<Box<Arg>>,
    pub kwonlyargs: Vec<Arg>,
    /// Parallel to `kwonlyargs`; `None` where a parameter has no default.
    pub kw_defaults: Vec<Option<Expr>>,
    pub kwarg: Option<Box<Arg>>,
    /// Right-aligned against `posonlyargs + args`.
    pub defaults: Vec<Expr>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.posonlyargs.is_empty()
            && self.args.is_empty()
            && self.vararg.is_none()
            && self.kwonlyargs.is_empty()
            && self.kwarg.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub arg: String,
    pub annotation: Option<Box<Expr>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// `None` for `**kwargs` unpacking.
    pub arg: Option<String>,
    pub value: Expr,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: Expr,
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub type_: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub location: Option<Location>,
}

/// `# type: ignore` marker. Serialized field-for-field by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeIgnore {
    pub lineno: usize,
    pub tag: String,
}

// ============================================================================
// ROOT UNION
// ============================================================================

/// Any node the codec can encode or decode as a document root.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mod(Mod),
    Stmt(Stmt),
    Expr(Expr),
    Pattern(Pattern),
    TypeParam(TypeParam),
    Arguments(Arguments),
    Arg(Arg),
    Keyword(Keyword),
    Alias(Alias),
    WithItem(WithItem),
    MatchCase(MatchCase),
    Comprehension(Comprehension),
    ExceptHandler(ExceptHandler),
    TypeIgnore(TypeIgnore),
}

impl Node {
    /// CPython class name of the root.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Mod(m) => m.kind_name(),
            Node::Stmt(s) => s.node.kind_name(),
            Node::Expr(e) => e.node.kind_name(),
            Node::Pattern(p) => p.node.kind_name(),
            Node::TypeParam(t) => t.node.kind_name(),
            Node::Arguments(_) => "arguments",
            Node::Arg(_) => "arg",
            Node::Keyword(_) => "keyword",
            Node::Alias(_) => "alias",
            Node::WithItem(_) => "withitem",
            Node::MatchCase(_) => "match_case",
            Node::Comprehension(_) => "comprehension",
            Node::ExceptHandler(_) => "ExceptHandler",
            Node::TypeIgnore(_) => "TypeIgnore",
        }
    }
}

impl From<Mod> for Node {
    fn from(value: Mod) -> Self {
        Node::Mod(value)
    }
}

impl From<Stmt> for Node {
    fn from(value: Stmt) -> Self {
        Node::Stmt(value)
    }
}

impl From<Expr> for Node {
    fn from(value: Expr) -> Self {
        Node::Expr(value)
    }
}

/// First statement of a body when it is a bare string literal.
pub fn docstring_of(body: &[Stmt]) -> Option<&str> {
    match body.first().map(|stmt| &stmt.node) {
        Some(StmtKind::Expr { value }) => value.as_str_constant(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_tables_are_closed() {
        assert_eq!(Operator::from_name("FloorDiv"), Some(Operator::FloorDiv));
        assert_eq!(Operator::from_name("FrobnicateOp"), None);
        assert_eq!(CmpOperator::from_symbol("not in"), Some(CmpOperator::NotIn));
        assert_eq!(ExprContext::FALLBACK, ExprContext::Load);
        assert_eq!(Operator::names().len(), 13);
    }

    #[test]
    fn set_ctx_recurses_into_containers() {
        let mut target = Located::bare(ExprKind::Tuple {
            elts: vec![
                Expr::name("a", ExprContext::Load, None),
                Located::bare(ExprKind::Starred {
                    value: Box::new(Expr::name("b", ExprContext::Load, None)),
                    ctx: ExprContext::Load,
                }),
            ],
            ctx: ExprContext::Load,
        });
        target.set_ctx(ExprContext::Store);
        let ExprKind::Tuple { elts, ctx } = &target.node else {
            panic!("expected tuple");
        };
        assert_eq!(*ctx, ExprContext::Store);
        assert_eq!(elts[0].node.ctx(), Some(ExprContext::Store));
        let ExprKind::Starred { value, .. } = &elts[1].node else {
            panic!("expected starred");
        };
        assert_eq!(value.node.ctx(), Some(ExprContext::Store));
    }

    #[test]
    fn docstring_requires_leading_string_expression() {
        let doc = Located::bare(StmtKind::Expr {
            value: Box::new(Expr::constant(ConstantValue::Str("hello".into()), None)),
        });
        assert_eq!(docstring_of(&[doc]), Some("hello"));
        assert_eq!(docstring_of(&[Located::bare(StmtKind::Pass)]), None);
        assert_eq!(docstring_of(&[]), None);
    }
}
