//! Compile-time checks on decoded trees.
//!
//! Reports what CPython's AST validator and compiler would reject when handed
//! the same tree: contexts that do not match how an expression is used,
//! targets that cannot be assigned, empty blocks, control flow outside the
//! construct it belongs to, malformed signatures and patterns. Each scope also
//! keeps a symbol table, so `global`/`nonlocal` declarations are checked against
//! earlier uses and, once the walk is done, against the enclosing bindings. All
//! problems are collected; the walk never stops at the first one.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::syntax::{
    Alias, Arguments, ConstantValue, ExceptHandler, Expr, ExprContext, ExprKind, Location, MatchCase,
    Mod, Node, Pattern, PatternKind, Stmt, StmtKind, TypeParam, TypeParamKind,
};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{XID_Start}_][\p{XID_Continue}]*$").expect("identifier pattern compiles")
});

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Features `from __future__ import ...` accepts.
const FUTURE_FEATURES: &[&str] = &[
    "nested_scopes", "generators", "division", "absolute_import", "with_statement",
    "print_function", "unicode_literals", "barry_as_FLUFL", "generator_stop", "annotations",
];

/// Mode the root node would be compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    Exec,
    Eval,
    Single,
    FuncType,
}

impl CompileMode {
    pub fn for_root(root: &Mod) -> Self {
        match root {
            Mod::Module { .. } => CompileMode::Exec,
            Mod::Expression { .. } => CompileMode::Eval,
            Mod::Interactive { .. } => CompileMode::Single,
            Mod::FunctionType { .. } => CompileMode::FuncType,
        }
    }

    /// Mode name as `compile()` spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileMode::Exec => "exec",
            CompileMode::Eval => "eval",
            CompileMode::Single => "single",
            CompileMode::FuncType => "func_type",
        }
    }
}

/// Checks a decoded document. Roots other than the four module kinds cannot
/// be compiled at all.
pub fn compile_check(node: &Node) -> (Option<CompileMode>, Vec<String>) {
    let Node::Mod(root) = node else {
        return (
            None,
            vec![format!(
                "expected Module, Expression, Interactive or FunctionType node, got {}",
                node.kind_name()
            )],
        );
    };
    let mut checker = Checker::new();
    match root {
        Mod::Module { body, .. } | Mod::Interactive { body } => {
            let prefix = future_prefix(body);
            for (i, stmt) in body.iter().enumerate() {
                checker.future_allowed = i < prefix;
                checker.stmt(stmt);
            }
            checker.future_allowed = false;
        }
        Mod::Expression { body } => checker.load(body),
        Mod::FunctionType { argtypes, returns } => {
            for arg in argtypes {
                checker.load(arg);
            }
            checker.load(returns);
        }
    }
    checker.resolve_nonlocals();
    (Some(CompileMode::for_root(root)), checker.errors)
}

/// Number of leading statements (docstring, then `__future__` imports) where
/// future imports may appear.
fn future_prefix(body: &[Stmt]) -> usize {
    let mut count = 0;
    for (i, stmt) in body.iter().enumerate() {
        let allowed = match &stmt.node {
            StmtKind::Expr { value } => {
                i == 0
                    && matches!(
                        &value.node,
                        ExprKind::Constant {
                            value: ConstantValue::Str(_),
                            ..
                        }
                    )
            }
            StmtKind::ImportFrom { module, .. } => module.as_deref() == Some("__future__"),
            _ => false,
        };
        if !allowed {
            break;
        }
        count += 1;
    }
    count
}

// ============================================================================
// SCOPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Class,
    Function { is_async: bool },
    Lambda,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    loops: usize,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self { kind, loops: 0 }
    }
}

// ============================================================================
// SYMBOL TABLES
// ============================================================================

const DEF_GLOBAL: u8 = 1;
const DEF_LOCAL: u8 = 1 << 1;
const DEF_PARAM: u8 = 1 << 2;
const DEF_NONLOCAL: u8 = 1 << 3;
const USE: u8 = 1 << 4;
const DEF_ANNOT: u8 = 1 << 5;
const DEF_IMPORT: u8 = 1 << 6;
const DEF_BOUND: u8 = DEF_LOCAL | DEF_PARAM | DEF_IMPORT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Module,
    Class,
    Function,
    Comprehension,
}

/// Flags for every name a scope mentions, accumulated in walk order.
#[derive(Debug)]
struct SymbolTable {
    kind: TableKind,
    parent: Option<usize>,
    symbols: HashMap<String, u8>,
    /// Declared `nonlocal` names, resolved after the walk.
    nonlocals: Vec<(String, Option<Location>)>,
}

#[derive(Debug)]
struct Checker {
    errors: Vec<String>,
    scopes: Vec<Scope>,
    tables: Vec<SymbolTable>,
    open_tables: Vec<usize>,
    future_allowed: bool,
}

fn at(location: Option<&Location>) -> String {
    location.map_or_else(String::new, |loc| format!(" (line {})", loc.lineno))
}

fn describe(expr: &ExprKind) -> &'static str {
    match expr {
        ExprKind::BoolOp { .. } | ExprKind::BinOp { .. } | ExprKind::UnaryOp { .. } => "expression",
        ExprKind::NamedExpr { .. } => "named expression",
        ExprKind::Lambda { .. } => "lambda",
        ExprKind::IfExp { .. } => "conditional expression",
        ExprKind::Dict { .. } => "dict literal",
        ExprKind::Set { .. } => "set display",
        ExprKind::ListComp { .. } => "list comprehension",
        ExprKind::SetComp { .. } => "set comprehension",
        ExprKind::DictComp { .. } => "dict comprehension",
        ExprKind::GeneratorExp { .. } => "generator expression",
        ExprKind::Await { .. } => "await expression",
        ExprKind::Yield { .. } | ExprKind::YieldFrom { .. } => "yield expression",
        ExprKind::Compare { .. } => "comparison",
        ExprKind::Call { .. } => "function call",
        ExprKind::FormattedValue { .. } | ExprKind::JoinedStr { .. } => "f-string expression",
        ExprKind::Constant { .. } => "literal",
        ExprKind::Slice { .. } => "slice",
        ExprKind::Attribute { .. } => "attribute",
        ExprKind::Subscript { .. } => "subscript",
        ExprKind::Starred { .. } => "starred",
        ExprKind::Name { .. } => "name",
        ExprKind::List { .. } => "list",
        ExprKind::Tuple { .. } => "tuple",
    }
}

impl Checker {
    fn new() -> Self {
        let mut checker = Self {
            errors: Vec::new(),
            scopes: vec![Scope::new(ScopeKind::Module)],
            tables: Vec::new(),
            open_tables: Vec::new(),
            future_allowed: false,
        };
        checker.push_table(TableKind::Module);
        checker
    }

    fn error(&mut self, message: impl Into<String>, location: Option<&Location>) {
        self.errors.push(format!("{}{}", message.into(), at(location)));
    }

    fn scope(&mut self) -> &mut Scope {
        // the module scope is pushed before any walk starts
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn in_function(&self) -> bool {
        matches!(
            self.scopes.last().map(|s| s.kind),
            Some(ScopeKind::Function { .. }) | Some(ScopeKind::Lambda)
        )
    }

    fn with_scope(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self)) {
        let table = match kind {
            ScopeKind::Class => TableKind::Class,
            ScopeKind::Module => TableKind::Module,
            ScopeKind::Function { .. } | ScopeKind::Lambda => TableKind::Function,
        };
        self.scopes.push(Scope::new(kind));
        self.push_table(table);
        f(self);
        self.open_tables.pop();
        self.scopes.pop();
    }

    fn push_table(&mut self, kind: TableKind) {
        self.tables.push(SymbolTable {
            kind,
            parent: self.open_tables.last().copied(),
            symbols: HashMap::new(),
            nonlocals: Vec::new(),
        });
        self.open_tables.push(self.tables.len() - 1);
    }

    fn current_table(&self) -> usize {
        // the module table is opened before any walk starts
        self.open_tables.last().copied().unwrap_or(0)
    }

    fn flags(&self, name: &str) -> u8 {
        self.tables[self.current_table()]
            .symbols
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn define(&mut self, name: &str, flag: u8) {
        let id = self.current_table();
        *self.tables[id].symbols.entry(name.to_string()).or_default() |= flag;
    }

    /// Walrus targets bind in the nearest scope that is not a comprehension.
    fn define_outside_comprehensions(&mut self, name: &str) {
        let mut id = self.current_table();
        while self.tables[id].kind == TableKind::Comprehension {
            match self.tables[id].parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        *self.tables[id].symbols.entry(name.to_string()).or_default() |= DEF_LOCAL;
    }

    fn params(&mut self, args: &Arguments) {
        let all = args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(args.vararg.as_deref())
            .chain(&args.kwonlyargs)
            .chain(args.kwarg.as_deref());
        for arg in all {
            self.define(&arg.arg, DEF_PARAM);
        }
    }

    /// Checks a `global` or `nonlocal` name against what the scope has already
    /// seen.
    fn declare(&mut self, name: &str, is_global: bool, location: Option<&Location>) {
        let keyword = if is_global { "global" } else { "nonlocal" };
        let seen = self.flags(name);
        if seen & (DEF_PARAM | DEF_LOCAL | USE | DEF_ANNOT) != 0 {
            let message = if seen & DEF_PARAM != 0 {
                format!("name '{name}' is parameter and {keyword}")
            } else if seen & USE != 0 {
                format!("name '{name}' is used prior to {keyword} declaration")
            } else if seen & DEF_ANNOT != 0 {
                format!("annotated name '{name}' can't be {keyword}")
            } else {
                format!("name '{name}' is assigned to before {keyword} declaration")
            };
            self.error(message, location);
        }
        let other = if is_global { DEF_NONLOCAL } else { DEF_GLOBAL };
        if seen & other != 0 {
            self.error(format!("name '{name}' is nonlocal and global"), location);
        }
        self.define(name, if is_global { DEF_GLOBAL } else { DEF_NONLOCAL });
    }

    /// Every `nonlocal` name must be bound by an enclosing function.
    fn resolve_nonlocals(&mut self) {
        let mut unbound = Vec::new();
        for table in &self.tables {
            for (name, location) in &table.nonlocals {
                if !self.bound_in_enclosing(table.parent, name) {
                    unbound.push((name.clone(), *location));
                }
            }
        }
        for (name, location) in unbound {
            self.error(format!("no binding for nonlocal '{name}' found"), location.as_ref());
        }
    }

    fn bound_in_enclosing(&self, mut scope: Option<usize>, name: &str) -> bool {
        while let Some(id) = scope {
            let table = &self.tables[id];
            match table.kind {
                TableKind::Module => return false,
                TableKind::Class => {}
                TableKind::Function | TableKind::Comprehension => {
                    let flags = table.symbols.get(name).copied().unwrap_or(0);
                    if flags & DEF_GLOBAL != 0 {
                        return false;
                    }
                    if flags & (DEF_BOUND | DEF_NONLOCAL) != 0 {
                        return true;
                    }
                }
            }
            scope = table.parent;
        }
        false
    }

    fn in_loop(&mut self, f: impl FnOnce(&mut Self)) {
        self.scope().loops += 1;
        f(self);
        self.scope().loops -= 1;
    }

    fn identifier(&mut self, name: &str, location: Option<&Location>) {
        if matches!(name, "None" | "True" | "False") {
            self.error(
                format!("identifier field can't represent '{name}' constant"),
                location,
            );
        } else if KEYWORDS.contains(&name) {
            self.error(format!("'{name}' is a keyword and cannot be an identifier"), location);
        } else if !IDENTIFIER.is_match(name) {
            self.error(format!("invalid identifier '{name}'"), location);
        }
    }

    fn body(&mut self, owner: &str, body: &[Stmt], location: Option<&Location>) {
        if body.is_empty() {
            self.error(format!("empty body on {owner}"), location);
        }
        self.stmts(body);
    }

    // ========================================================================
    // STATEMENTS
    // ========================================================================

    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        crate::stack::guarded(|| self.check_stmt(stmt))
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        let loc = stmt.location.as_ref();
        let kind = stmt.node.kind_name();
        match &stmt.node {
            StmtKind::FunctionDef(def) | StmtKind::AsyncFunctionDef(def) => {
                self.identifier(&def.name, loc);
                for decorator in &def.decorator_list {
                    self.load(decorator);
                }
                self.type_params(&def.type_params);
                self.arguments(&def.args, loc);
                if let Some(returns) = &def.returns {
                    self.load(returns);
                }
                self.define(&def.name, DEF_LOCAL);
                let is_async = matches!(stmt.node, StmtKind::AsyncFunctionDef(_));
                self.with_scope(ScopeKind::Function { is_async }, |c| {
                    c.params(&def.args);
                    c.body(kind, &def.body, loc)
                });
            }
            StmtKind::ClassDef(def) => {
                self.identifier(&def.name, loc);
                for decorator in &def.decorator_list {
                    self.load(decorator);
                }
                self.type_params(&def.type_params);
                for base in &def.bases {
                    self.load(base);
                }
                for keyword in &def.keywords {
                    if let Some(arg) = &keyword.arg {
                        self.identifier(arg, keyword.location.as_ref());
                    }
                    self.load(&keyword.value);
                }
                self.define(&def.name, DEF_LOCAL);
                self.with_scope(ScopeKind::Class, |c| c.body(kind, &def.body, loc));
            }
            StmtKind::Return { value } => {
                if !self.in_function() {
                    self.error("'return' outside function", loc);
                }
                if let Some(value) = value {
                    self.load(value);
                }
            }
            StmtKind::Delete { targets } => {
                if targets.is_empty() {
                    self.error("empty targets on Delete", loc);
                }
                for target in targets {
                    self.target(target, ExprContext::Del);
                }
            }
            StmtKind::Assign { targets, value } => {
                if targets.is_empty() {
                    self.error("empty targets on Assign", loc);
                }
                for target in targets {
                    self.target(target, ExprContext::Store);
                }
                self.load(value);
            }
            StmtKind::TypeAlias {
                name,
                type_params,
                value,
            } => {
                if !matches!(name.node, ExprKind::Name { .. }) {
                    self.error("TypeAlias with non-Name name", loc);
                }
                self.target(name, ExprContext::Store);
                self.type_params(type_params);
                self.load(value);
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.simple_target(target, "augmented assignment");
                self.load(value);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => {
                if *simple && !matches!(target.node, ExprKind::Name { .. }) {
                    self.error("AnnAssign with simple non-Name target", loc);
                }
                if let (true, ExprKind::Name { id, .. }) = (*simple, &target.node) {
                    let seen = self.flags(id);
                    let at_module = self.tables[self.current_table()].kind == TableKind::Module;
                    if seen & (DEF_GLOBAL | DEF_NONLOCAL) != 0 && !at_module {
                        let keyword = if seen & DEF_GLOBAL != 0 { "global" } else { "nonlocal" };
                        self.error(format!("annotated name '{id}' can't be {keyword}"), loc);
                    }
                    self.define(id, DEF_ANNOT | DEF_LOCAL);
                }
                self.simple_target(target, "annotated assignment");
                self.load(annotation);
                if let Some(value) = value {
                    self.load(value);
                }
            }
            StmtKind::For(data) | StmtKind::AsyncFor(data) => {
                if matches!(stmt.node, StmtKind::AsyncFor(_)) {
                    self.require_async("'async for'", loc);
                }
                self.target(&data.target, ExprContext::Store);
                self.load(&data.iter);
                self.in_loop(|c| c.body(kind, &data.body, loc));
                self.stmts(&data.orelse);
            }
            StmtKind::While { test, body, orelse } => {
                self.load(test);
                self.in_loop(|c| c.body(kind, body, loc));
                self.stmts(orelse);
            }
            StmtKind::If { test, body, orelse } => {
                self.load(test);
                self.body(kind, body, loc);
                self.stmts(orelse);
            }
            StmtKind::With(data) | StmtKind::AsyncWith(data) => {
                if matches!(stmt.node, StmtKind::AsyncWith(_)) {
                    self.require_async("'async with'", loc);
                }
                if data.items.is_empty() {
                    self.error(format!("empty items on {kind}"), loc);
                }
                for item in &data.items {
                    self.load(&item.context_expr);
                    if let Some(vars) = &item.optional_vars {
                        self.target(vars, ExprContext::Store);
                    }
                }
                self.body(kind, &data.body, loc);
            }
            StmtKind::Match { subject, cases } => {
                self.load(subject);
                if cases.is_empty() {
                    self.error("empty cases on Match", loc);
                }
                let last = cases.len().saturating_sub(1);
                for (i, case) in cases.iter().enumerate() {
                    self.reachability(&case.pattern, case.guard.is_some() || i == last);
                    self.match_case(case, loc);
                }
            }
            StmtKind::Raise { exc, cause } => {
                if cause.is_some() && exc.is_none() {
                    self.error("Raise with cause but no exception", loc);
                }
                for expr in [exc, cause].into_iter().flatten() {
                    self.load(expr);
                }
            }
            StmtKind::Try(data) | StmtKind::TryStar(data) => {
                self.body(kind, &data.body, loc);
                if data.handlers.is_empty() && data.finalbody.is_empty() {
                    self.error(format!("{kind} has neither except handlers nor finalbody"), loc);
                }
                if data.handlers.is_empty() && !data.orelse.is_empty() {
                    self.error(format!("{kind} has orelse but no except handlers"), loc);
                }
                let last = data.handlers.len().saturating_sub(1);
                for (i, handler) in data.handlers.iter().enumerate() {
                    if handler.type_.is_none() && i != last {
                        self.error("default 'except:' must be last", handler.location.as_ref());
                    }
                    self.handler(handler);
                }
                self.stmts(&data.orelse);
                self.stmts(&data.finalbody);
            }
            StmtKind::Assert { test, msg } => {
                self.load(test);
                if let Some(msg) = msg {
                    self.load(msg);
                }
            }
            StmtKind::Import { names } => {
                if names.is_empty() {
                    self.error("empty names on Import", loc);
                }
                for alias in names {
                    self.dotted(&alias.name, alias.location.as_ref());
                    if let Some(asname) = &alias.asname {
                        self.identifier(asname, alias.location.as_ref());
                    }
                    let bound = match &alias.asname {
                        Some(asname) => asname.as_str(),
                        None => alias.name.split('.').next().unwrap_or(&alias.name),
                    };
                    self.define(bound, DEF_IMPORT);
                }
            }
            StmtKind::ImportFrom { module, names, .. } => {
                if names.is_empty() {
                    self.error("empty names on ImportFrom", loc);
                }
                if let Some(module) = module {
                    self.dotted(module, loc);
                }
                if module.as_deref() == Some("__future__") {
                    self.future_import(names, loc);
                }
                for alias in names {
                    if alias.name == "*" {
                        if self.scopes.len() > 1 {
                            self.error("import * only allowed at module level", loc);
                        }
                        continue;
                    }
                    self.identifier(&alias.name, alias.location.as_ref());
                    if let Some(asname) = &alias.asname {
                        self.identifier(asname, alias.location.as_ref());
                    }
                    self.define(alias.asname.as_deref().unwrap_or(&alias.name), DEF_IMPORT);
                }
            }
            StmtKind::Global { names } | StmtKind::Nonlocal { names } => {
                if names.is_empty() {
                    self.error(format!("empty names on {kind}"), loc);
                }
                let is_global = matches!(stmt.node, StmtKind::Global { .. });
                let at_module = self.scope().kind == ScopeKind::Module;
                if !is_global && at_module {
                    self.error("nonlocal declaration not allowed at module level", loc);
                }
                for name in names {
                    self.identifier(name, loc);
                    let was_global = self.flags(name) & DEF_GLOBAL != 0;
                    self.declare(name, is_global, loc);
                    if !is_global && !at_module && !was_global {
                        let id = self.current_table();
                        self.tables[id].nonlocals.push((name.clone(), loc.copied()));
                    }
                }
            }
            StmtKind::Expr { value } => self.load(value),
            StmtKind::Pass => {}
            StmtKind::Break => {
                if self.scope().loops == 0 {
                    self.error("'break' outside loop", loc);
                }
            }
            StmtKind::Continue => {
                if self.scope().loops == 0 {
                    self.error("'continue' not properly in loop", loc);
                }
            }
        }
    }

    fn future_import(&mut self, names: &[Alias], location: Option<&Location>) {
        if !self.future_allowed {
            self.error(
                "from __future__ imports must occur at the beginning of the file",
                location,
            );
        }
        for alias in names {
            if alias.name == "braces" {
                self.error("not a chance", location);
            } else if !FUTURE_FEATURES.contains(&alias.name.as_str()) {
                self.error(format!("future feature {} is not defined", alias.name), location);
            }
        }
    }

    fn require_async(&mut self, what: &str, location: Option<&Location>) {
        if !matches!(self.scope().kind, ScopeKind::Function { is_async: true }) {
            self.error(format!("{what} outside async function"), location);
        }
    }

    fn dotted(&mut self, name: &str, location: Option<&Location>) {
        for part in name.split('.') {
            self.identifier(part, location);
        }
    }

    fn handler(&mut self, handler: &ExceptHandler) {
        let loc = handler.location.as_ref();
        if let Some(type_) = &handler.type_ {
            self.load(type_);
        }
        if let Some(name) = &handler.name {
            self.identifier(name, loc);
            self.define(name, DEF_LOCAL);
        }
        self.body("ExceptHandler", &handler.body, loc);
    }

    fn type_params(&mut self, params: &[TypeParam]) {
        let mut seen = HashSet::new();
        for param in params {
            let loc = param.location.as_ref();
            let (name, bound, default) = match &param.node {
                TypeParamKind::TypeVar {
                    name,
                    bound,
                    default_value,
                } => (name, bound.as_deref(), default_value.as_deref()),
                TypeParamKind::ParamSpec {
                    name,
                    default_value,
                }
                | TypeParamKind::TypeVarTuple {
                    name,
                    default_value,
                } => (name, None, default_value.as_deref()),
            };
            self.identifier(name, loc);
            if !seen.insert(name.as_str()) {
                self.error(format!("duplicate type parameter '{name}'"), loc);
            }
            for expr in [bound, default].into_iter().flatten() {
                self.load(expr);
            }
        }
    }

    fn arguments(&mut self, args: &Arguments, location: Option<&Location>) {
        if args.kw_defaults.len() != args.kwonlyargs.len() {
            self.error(
                "length of kwonlyargs is not the same as kw_defaults on arguments",
                location,
            );
        }
        if args.defaults.len() > args.posonlyargs.len() + args.args.len() {
            self.error("more positional defaults than args on arguments", location);
        }
        let mut seen = HashSet::new();
        let all = args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(args.vararg.as_deref())
            .chain(&args.kwonlyargs)
            .chain(args.kwarg.as_deref());
        for arg in all {
            let loc = arg.location.as_ref().or(location);
            self.identifier(&arg.arg, loc);
            if !seen.insert(arg.arg.as_str()) {
                self.error(
                    format!("duplicate argument '{}' in function definition", arg.arg),
                    loc,
                );
            }
            if let Some(annotation) = &arg.annotation {
                self.load(annotation);
            }
        }
        for default in args.defaults.iter().chain(args.kw_defaults.iter().flatten()) {
            self.load(default);
        }
    }

    // ========================================================================
    // TARGETS
    // ========================================================================

    /// Checks an assignment or deletion target and the context it carries.
    fn target(&mut self, target: &Expr, expected: ExprContext) {
        crate::stack::guarded(|| self.check_target(target, expected))
    }

    fn check_target(&mut self, target: &Expr, expected: ExprContext) {
        let loc = target.location.as_ref();
        let verb = if expected == ExprContext::Del {
            "delete"
        } else {
            "assign to"
        };
        match &target.node {
            ExprKind::Name { id, ctx } => {
                self.identifier(id, loc);
                self.context(*ctx, expected, loc);
                self.define(id, DEF_LOCAL);
            }
            ExprKind::Attribute { value, attr, ctx } => {
                self.identifier(attr, loc);
                self.context(*ctx, expected, loc);
                self.load(value);
            }
            ExprKind::Subscript { value, slice, ctx } => {
                self.context(*ctx, expected, loc);
                self.load(value);
                self.load(slice);
            }
            ExprKind::Starred { value, ctx } if expected == ExprContext::Store => {
                self.error("starred assignment target must be in a list or tuple", loc);
                self.context(*ctx, expected, loc);
                self.target(value, expected);
            }
            ExprKind::List { elts, ctx } | ExprKind::Tuple { elts, ctx } => {
                self.context(*ctx, expected, loc);
                let starred = elts
                    .iter()
                    .filter(|e| matches!(e.node, ExprKind::Starred { .. }))
                    .count();
                if starred > 1 {
                    self.error("multiple starred expressions in assignment", loc);
                }
                for elt in elts {
                    match &elt.node {
                        ExprKind::Starred { value, ctx } if expected == ExprContext::Store => {
                            self.context(*ctx, expected, elt.location.as_ref());
                            self.target(value, expected);
                        }
                        _ => self.target(elt, expected),
                    }
                }
            }
            other => self.error(format!("cannot {verb} {}", describe(other)), loc),
        }
    }

    /// Targets of augmented and annotated assignment: no unpacking.
    fn simple_target(&mut self, target: &Expr, what: &str) {
        match &target.node {
            ExprKind::Name { .. } | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => {
                self.target(target, ExprContext::Store)
            }
            other => self.error(
                format!("'{}' is an illegal expression for {what}", describe(other)),
                target.location.as_ref(),
            ),
        }
    }

    fn context(&mut self, actual: ExprContext, expected: ExprContext, location: Option<&Location>) {
        if actual != expected {
            self.error(
                format!(
                    "expression must have {} context but has {} instead",
                    expected.name(),
                    actual.name()
                ),
                location,
            );
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// Checks an expression evaluated for its value.
    fn load(&mut self, expr: &Expr) {
        crate::stack::guarded(|| self.check_load(expr))
    }

    fn check_load(&mut self, expr: &Expr) {
        let loc = expr.location.as_ref();
        match &expr.node {
            ExprKind::BoolOp { values, .. } => {
                if values.len() < 2 {
                    self.error("BoolOp with less than 2 values", loc);
                }
                self.loads(values);
            }
            ExprKind::NamedExpr { target, value } => {
                match &target.node {
                    ExprKind::Name { id, ctx } => {
                        let target_loc = target.location.as_ref();
                        self.identifier(id, target_loc);
                        self.context(*ctx, ExprContext::Store, target_loc);
                        self.define_outside_comprehensions(id);
                    }
                    other => self.error(
                        format!("cannot use assignment expressions with {}", describe(other)),
                        loc,
                    ),
                }
                self.load(value);
            }
            ExprKind::BinOp { left, right, .. } => {
                self.load(left);
                self.load(right);
            }
            ExprKind::UnaryOp { operand, .. } => self.load(operand),
            ExprKind::Lambda { args, body } => {
                self.arguments(args, loc);
                self.with_scope(ScopeKind::Lambda, |c| {
                    c.params(args);
                    c.load(body)
                });
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.load(test);
                self.load(body);
                self.load(orelse);
            }
            ExprKind::Dict { keys, values } => {
                if keys.len() != values.len() {
                    self.error("Dict doesn't have the same number of keys as values", loc);
                }
                for key in keys.iter().flatten() {
                    self.load(key);
                }
                self.loads(values);
            }
            ExprKind::Set { elts } => self.loads(elts),
            ExprKind::ListComp { elt, generators }
            | ExprKind::SetComp { elt, generators }
            | ExprKind::GeneratorExp { elt, generators } => {
                self.comprehension(generators, loc, &[&**elt]);
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                self.comprehension(generators, loc, &[&**key, &**value]);
            }
            ExprKind::Await { value } => {
                match self.scopes.last().map(|s| s.kind) {
                    Some(ScopeKind::Function { is_async: true }) => {}
                    Some(ScopeKind::Function { .. }) | Some(ScopeKind::Lambda) => {
                        self.error("'await' outside async function", loc)
                    }
                    _ => self.error("'await' outside function", loc),
                }
                self.load(value);
            }
            ExprKind::Yield { value } => {
                self.require_function("'yield' outside function", loc);
                if let Some(value) = value {
                    self.load(value);
                }
            }
            ExprKind::YieldFrom { value } => {
                self.require_function("'yield from' outside function", loc);
                if matches!(self.scopes.last().map(|s| s.kind), Some(ScopeKind::Function { is_async: true })) {
                    self.error("'yield from' inside async function", loc);
                }
                self.load(value);
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                if comparators.is_empty() {
                    self.error("Compare with no comparators", loc);
                } else if comparators.len() != ops.len() {
                    self.error(
                        "Compare has a different number of comparators and operands",
                        loc,
                    );
                }
                self.load(left);
                self.loads(comparators);
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.load(func);
                self.loads(args);
                let mut seen = HashSet::new();
                for keyword in keywords {
                    if let Some(arg) = &keyword.arg {
                        self.identifier(arg, keyword.location.as_ref().or(loc));
                        if !seen.insert(arg.as_str()) {
                            self.error(format!("keyword argument repeated: {arg}"), loc);
                        }
                    }
                    self.load(&keyword.value);
                }
            }
            ExprKind::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                if !matches!(conversion, -1 | 97 | 114 | 115) {
                    self.error(format!("invalid conversion character {conversion}"), loc);
                }
                self.load(value);
                if let Some(spec) = format_spec {
                    self.load(spec);
                }
            }
            ExprKind::JoinedStr { values } => {
                for value in values {
                    let allowed = matches!(
                        &value.node,
                        ExprKind::FormattedValue { .. }
                            | ExprKind::Constant {
                                value: ConstantValue::Str(_),
                                ..
                            }
                    );
                    if !allowed {
                        self.error(
                            "JoinedStr values must be string constants or formatted values",
                            value.location.as_ref().or(loc),
                        );
                    }
                    self.load(value);
                }
            }
            ExprKind::Constant { kind, value } => {
                if kind.as_deref().is_some_and(|k| k != "u") || (kind.is_some() && !value.is_str()) {
                    self.error("Constant kind must be null or 'u' on a string", loc);
                }
            }
            ExprKind::Attribute { value, attr, ctx } => {
                self.identifier(attr, loc);
                self.context(*ctx, ExprContext::Load, loc);
                self.load(value);
            }
            ExprKind::Subscript { value, slice, ctx } => {
                self.context(*ctx, ExprContext::Load, loc);
                self.load(value);
                self.load(slice);
            }
            ExprKind::Starred { value, ctx } => {
                self.context(*ctx, ExprContext::Load, loc);
                self.load(value);
            }
            ExprKind::Name { id, ctx } => {
                self.identifier(id, loc);
                self.context(*ctx, ExprContext::Load, loc);
                self.define(id, USE);
            }
            ExprKind::List { elts, ctx } | ExprKind::Tuple { elts, ctx } => {
                self.context(*ctx, ExprContext::Load, loc);
                self.loads(elts);
            }
            ExprKind::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.load(part);
                }
            }
        }
    }

    fn loads(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.load(expr);
        }
    }

    fn require_function(&mut self, message: &str, location: Option<&Location>) {
        if !self.in_function() {
            self.error(message, location);
        }
    }

    /// The first iterable is evaluated outside; everything else belongs to the
    /// comprehension's own scope.
    fn comprehension(
        &mut self,
        generators: &[crate::syntax::Comprehension],
        location: Option<&Location>,
        results: &[&Expr],
    ) {
        if generators.is_empty() {
            self.error("comprehension with no generators", location);
        }
        if let Some(first) = generators.first() {
            self.load(&first.iter);
        }
        self.push_table(TableKind::Comprehension);
        for (i, comp) in generators.iter().enumerate() {
            if comp.is_async {
                self.require_async("asynchronous comprehension", location);
            }
            self.target(&comp.target, ExprContext::Store);
            if i > 0 {
                self.load(&comp.iter);
            }
            self.loads(&comp.ifs);
        }
        for expr in results {
            self.load(expr);
        }
        self.open_tables.pop();
    }

    // ========================================================================
    // PATTERNS
    // ========================================================================

    fn match_case(&mut self, case: &MatchCase, location: Option<&Location>) {
        let mut captured = HashSet::new();
        self.pattern(&case.pattern, &mut captured);
        if let Some(guard) = &case.guard {
            self.load(guard);
        }
        self.body("match_case", &case.body, location);
    }

    fn capture(&mut self, name: &str, captured: &mut HashSet<String>, location: Option<&Location>) {
        if name == "_" {
            self.error("can't capture name '_' in patterns", location);
            return;
        }
        self.identifier(name, location);
        self.define(name, DEF_LOCAL);
        if !captured.insert(name.to_string()) {
            self.error(format!("multiple assignments to name '{name}' in pattern"), location);
        }
    }

    /// A capture or wildcard at the top of any case but the last unguarded one
    /// makes the remaining cases unreachable.
    fn reachability(&mut self, pattern: &Pattern, allow_irrefutable: bool) {
        match &pattern.node {
            PatternKind::MatchAs {
                pattern: None,
                name,
            } if !allow_irrefutable => {
                let message = match name {
                    Some(name) => format!("name capture '{name}' makes remaining patterns unreachable"),
                    None => "wildcard makes remaining patterns unreachable".to_string(),
                };
                self.error(message, pattern.location.as_ref());
            }
            PatternKind::MatchAs {
                pattern: Some(inner),
                ..
            } => self.reachability(inner, allow_irrefutable),
            PatternKind::MatchOr { patterns } => {
                let last = patterns.len().saturating_sub(1);
                for (i, alternative) in patterns.iter().enumerate() {
                    self.reachability(alternative, allow_irrefutable && i == last);
                }
            }
            _ => {}
        }
    }

    fn pattern(&mut self, pattern: &Pattern, captured: &mut HashSet<String>) {
        crate::stack::guarded(|| self.check_pattern(pattern, captured))
    }

    fn check_pattern(&mut self, pattern: &Pattern, captured: &mut HashSet<String>) {
        let loc = pattern.location.as_ref();
        match &pattern.node {
            PatternKind::MatchValue { value } => {
                let literal = match &value.node {
                    ExprKind::Constant { value, .. } => !matches!(
                        value,
                        ConstantValue::None | ConstantValue::Bool(_) | ConstantValue::Ellipsis
                    ),
                    ExprKind::Attribute { .. } | ExprKind::UnaryOp { .. } | ExprKind::BinOp { .. } => true,
                    _ => false,
                };
                if !literal {
                    self.error("patterns may only match literals and attribute lookups", loc);
                }
                self.load(value);
            }
            PatternKind::MatchSingleton { value } => {
                if !matches!(value, ConstantValue::None | ConstantValue::Bool(_)) {
                    self.error("MatchSingleton can only contain True, False and None", loc);
                }
            }
            PatternKind::MatchSequence { patterns } => {
                let stars = patterns
                    .iter()
                    .filter(|p| matches!(p.node, PatternKind::MatchStar { .. }))
                    .count();
                if stars > 1 {
                    self.error("multiple starred names in sequence pattern", loc);
                }
                for sub in patterns {
                    self.pattern(sub, captured);
                }
            }
            PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                if keys.len() != patterns.len() {
                    self.error(
                        "MatchMapping doesn't have the same number of keys as patterns",
                        loc,
                    );
                }
                self.loads(keys);
                for sub in patterns {
                    self.pattern(sub, captured);
                }
                if let Some(rest) = rest {
                    self.capture(rest, captured, loc);
                }
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                if kwd_attrs.len() != kwd_patterns.len() {
                    self.error(
                        "MatchClass doesn't have the same number of keyword attributes as patterns",
                        loc,
                    );
                }
                self.load(cls);
                for attr in kwd_attrs {
                    self.identifier(attr, loc);
                }
                for sub in patterns.iter().chain(kwd_patterns) {
                    self.pattern(sub, captured);
                }
            }
            PatternKind::MatchStar { name } => {
                if let Some(name) = name {
                    self.capture(name, captured, loc);
                }
            }
            PatternKind::MatchAs { pattern, name } => {
                if pattern.is_some() && name.is_none() {
                    self.error("MatchAs must specify a target name if a pattern is given", loc);
                }
                if let Some(sub) = pattern {
                    self.pattern(sub, captured);
                }
                if let Some(name) = name {
                    self.capture(name, captured, loc);
                }
            }
            PatternKind::MatchOr { patterns } => {
                if patterns.len() < 2 {
                    self.error("MatchOr requires at least 2 patterns", loc);
                }
                // every alternative must bind the same names
                let mut first: Option<HashSet<String>> = None;
                for sub in patterns {
                    let mut alt = HashSet::new();
                    self.pattern(sub, &mut alt);
                    match &first {
                        None => first = Some(alt),
                        Some(expected) if *expected != alt => {
                            self.error("alternative patterns bind different names", loc);
                        }
                        Some(_) => {}
                    }
                }
                for name in first.unwrap_or_default() {
                    if !captured.insert(name.clone()) {
                        self.error(format!("multiple assignments to name '{name}' in pattern"), loc);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DEPTH;
    use crate::syntax::{parse_source, Located, ParseMode};

    fn check_source(source: &str) -> Vec<String> {
        let module = parse_source(source, ParseMode::Exec, "<test>", DEFAULT_MAX_DEPTH).unwrap();
        compile_check(&Node::Mod(module)).1
    }

    #[test]
    fn parsed_code_is_clean() {
        let errors = check_source(
            "import os.path as p\n\
             async def f(a, /, b=1, *c, d, **e):\n    \
                 async with x as y:\n        await y\n    \
                 for i in range(3):\n        if i:\n            break\n\
             class C:\n    def g(self):\n        yield self\n\
             match v:\n    case [1, *rest] | [2, *rest]:\n        pass\n    case {'k': x, **kw}:\n        pass\n",
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn control_flow_outside_its_construct() {
        let errors = check_source("return 1\nbreak\ncontinue\nnonlocal x\nyield 2\nawait z\n");
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert_eq!(errors[0], "'return' outside function (line 1)");
        assert_eq!(errors[1], "'break' outside loop (line 2)");
        assert!(errors[5].starts_with("'await' outside function"));
    }

    #[test]
    fn wrong_context_is_reported() {
        let module = Mod::Module {
            body: vec![Located::bare(StmtKind::Assign {
                targets: vec![Expr::name("x", ExprContext::Load, None)],
                value: Box::new(Expr::name("y", ExprContext::Store, None)),
            })],
            type_ignores: vec![],
        };
        let (mode, errors) = compile_check(&Node::Mod(module));
        assert_eq!(mode, Some(CompileMode::Exec));
        assert_eq!(
            errors,
            vec![
                "expression must have Store context but has Load instead",
                "expression must have Load context but has Store instead",
            ]
        );
    }

    #[test]
    fn invalid_targets_and_identifiers() {
        let module = Mod::Module {
            body: vec![
                Located::bare(StmtKind::Assign {
                    targets: vec![Expr::constant(ConstantValue::Int("1".into()), None)],
                    value: Box::new(Expr::name("y", ExprContext::Load, None)),
                }),
                Located::bare(StmtKind::Expr {
                    value: Box::new(Expr::name("not an id", ExprContext::Load, None)),
                }),
                Located::bare(StmtKind::Expr {
                    value: Box::new(Expr::name("None", ExprContext::Load, None)),
                }),
            ],
            type_ignores: vec![],
        };
        let (_, errors) = compile_check(&Node::Mod(module));
        assert_eq!(errors[0], "cannot assign to literal");
        assert_eq!(errors[1], "invalid identifier 'not an id'");
        assert_eq!(errors[2], "identifier field can't represent 'None' constant");
    }

    #[test]
    fn signatures_and_handlers() {
        let errors = check_source(
            "def f(a, a):\n    pass\ntry:\n    pass\nexcept:\n    pass\nexcept ValueError:\n    pass\n",
        );
        assert!(errors.iter().any(|e| e.starts_with("duplicate argument 'a'")));
        assert!(errors.iter().any(|e| e.starts_with("default 'except:' must be last")));
    }

    #[test]
    fn empty_bodies_and_bare_try() {
        let module = Mod::Module {
            body: vec![Located::bare(StmtKind::Try(crate::syntax::TryData {
                body: vec![],
                handlers: vec![],
                orelse: vec![],
                finalbody: vec![],
            }))],
            type_ignores: vec![],
        };
        let (_, errors) = compile_check(&Node::Mod(module));
        assert_eq!(
            errors,
            vec![
                "empty body on Try",
                "Try has neither except handlers nor finalbody",
            ]
        );
    }

    #[test]
    fn pattern_captures() {
        let errors = check_source("match v:\n    case [x, x]:\n        pass\n    case [1] | [y]:\n        pass\n");
        assert!(errors.iter().any(|e| e.starts_with("multiple assignments to name 'x'")));
        assert!(errors.iter().any(|e| e.starts_with("alternative patterns bind different names")));
    }

    #[test]
    fn starred_target_outside_a_sequence() {
        assert_eq!(
            check_source("*a = b\n"),
            vec!["starred assignment target must be in a list or tuple (line 1)"]
        );
        assert!(check_source("*a, b = c\n[x, *y] = z\n").is_empty());
    }

    #[test]
    fn declarations_after_use_or_binding() {
        assert_eq!(
            check_source("x = 1\nglobal x\n"),
            vec!["name 'x' is assigned to before global declaration (line 2)"]
        );
        assert_eq!(
            check_source("def f(x):\n    global x\n"),
            vec!["name 'x' is parameter and global (line 2)"]
        );
        assert_eq!(
            check_source("def f():\n    print(x)\n    global x\n"),
            vec!["name 'x' is used prior to global declaration (line 3)"]
        );
        assert_eq!(
            check_source("def f():\n    x: int = 1\n    global x\n"),
            vec!["annotated name 'x' can't be global (line 3)"]
        );
        assert_eq!(
            check_source("def f():\n    global x\n    x: int = 1\n"),
            vec!["annotated name 'x' can't be global (line 3)"]
        );
        assert_eq!(
            check_source("def f():\n    global x\n    nonlocal x\n"),
            vec!["name 'x' is nonlocal and global (line 3)"]
        );
        assert!(check_source("global x\nx = 1\ndef f():\n    global x\n    x += 1\n").is_empty());
    }

    #[test]
    fn nonlocal_needs_an_enclosing_binding() {
        assert_eq!(
            check_source("def f():\n    nonlocal x\n"),
            vec!["no binding for nonlocal 'x' found (line 2)"]
        );
        assert_eq!(
            check_source("x = 1\ndef f():\n    def g():\n        nonlocal x\n"),
            vec!["no binding for nonlocal 'x' found (line 4)"]
        );
        assert!(check_source(
            "def f(a):\n    class C:\n        def g(self):\n            nonlocal a\n    def h():\n        nonlocal b\n    b = 2\n"
        )
        .is_empty());
        assert!(check_source("def f():\n    import os\n    def g():\n        nonlocal os\n").is_empty());
    }

    #[test]
    fn comprehension_targets_stay_local() {
        assert!(check_source("def f():\n    [x for x in y]\n    global x\n").is_empty());
        assert_eq!(
            check_source("def f():\n    [(n := i) for i in y]\n    global n\n"),
            vec!["name 'n' is assigned to before global declaration (line 3)"]
        );
    }

    #[test]
    fn future_imports() {
        assert!(check_source("\"doc\"\nfrom __future__ import annotations\nfrom __future__ import division\nx = 1\n").is_empty());
        assert_eq!(
            check_source("from __future__ import braces\n"),
            vec!["not a chance (line 1)"]
        );
        assert_eq!(
            check_source("from __future__ import teleport\n"),
            vec!["future feature teleport is not defined (line 1)"]
        );
        assert_eq!(
            check_source("import os\nfrom __future__ import annotations\n"),
            vec!["from __future__ imports must occur at the beginning of the file (line 2)"]
        );
    }

    #[test]
    fn irrefutable_case_before_others() {
        assert_eq!(
            check_source("match v:\n    case a:\n        pass\n    case 1:\n        pass\n"),
            vec!["name capture 'a' makes remaining patterns unreachable (line 2)"]
        );
        assert_eq!(
            check_source("match v:\n    case _:\n        pass\n    case 1:\n        pass\n"),
            vec!["wildcard makes remaining patterns unreachable (line 2)"]
        );
        assert!(check_source(
            "match v:\n    case a if a:\n        pass\n    case (1 | 2) as c:\n        pass\n"
        )
        .is_empty());
        let errors = check_source("match v:\n    case x | 1:\n        pass\n");
        assert!(errors.contains(&"name capture 'x' makes remaining patterns unreachable (line 2)".to_string()));
    }

    #[test]
    fn non_module_roots_have_no_compile_mode() {
        let (mode, errors) = compile_check(&Node::Expr(Expr::name("x", ExprContext::Load, None)));
        assert_eq!(mode, None);
        assert_eq!(
            errors,
            vec!["expected Module, Expression, Interactive or FunctionType node, got Name"]
        );
    }
}
