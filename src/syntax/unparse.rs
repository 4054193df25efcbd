//! Syntax tree back to Python source.
//!
//! Output is normalized rather than a copy of the original layout: comments are
//! gone, parentheses appear only where precedence needs them and literals use
//! their canonical repr. Reparsing the output yields a tree equal to the input
//! apart from locations.

use super::*;

// ============================================================================
// PUBLIC API
// ============================================================================

pub fn unparse(root: &Mod) -> String {
    let mut u = Unparser::default();
    u.module(root);
    u.out
}

pub fn unparse_expr(expr: &Expr) -> String {
    let mut u = Unparser::default();
    u.expr(expr, Prec::Test);
    u.out
}

/// Renders any node that can stand as a document root.
pub fn unparse_node(node: &Node) -> String {
    let mut u = Unparser::default();
    match node {
        Node::Mod(m) => u.module(m),
        Node::Stmt(s) => u.stmt(s),
        Node::Expr(e) => u.expr(e, Prec::Test),
        Node::Pattern(p) => u.pattern(p, Prec::Test),
        Node::TypeParam(t) => u.type_param(t),
        Node::Arguments(a) => u.arguments(a, true),
        Node::Arg(a) => u.arg(a, true),
        Node::Keyword(k) => u.keyword(k),
        Node::Alias(a) => u.alias(a),
        Node::WithItem(w) => u.with_item(w),
        Node::MatchCase(c) => u.match_case(c),
        Node::Comprehension(c) => {
            u.comprehension(c);
            u.out = u.out.trim_start().to_string();
        }
        Node::ExceptHandler(h) => u.handler(h, false),
        Node::TypeIgnore(_) => {}
    }
    u.out
}

// ============================================================================
// PRECEDENCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    NamedExpr,
    Tuple,
    Yield,
    Test,
    Or,
    And,
    Not,
    Cmp,
    BOr,
    BXor,
    BAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Await,
    Atom,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::NamedExpr => Prec::Tuple,
            Prec::Tuple => Prec::Yield,
            Prec::Yield => Prec::Test,
            Prec::Test => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Not,
            Prec::Not => Prec::Cmp,
            Prec::Cmp => Prec::BOr,
            Prec::BOr => Prec::BXor,
            Prec::BXor => Prec::BAnd,
            Prec::BAnd => Prec::Shift,
            Prec::Shift => Prec::Arith,
            Prec::Arith => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Power,
            Prec::Power => Prec::Await,
            Prec::Await | Prec::Atom => Prec::Atom,
        }
    }
}

fn binop_prec(op: Operator) -> Prec {
    match op {
        Operator::BitOr => Prec::BOr,
        Operator::BitXor => Prec::BXor,
        Operator::BitAnd => Prec::BAnd,
        Operator::LShift | Operator::RShift => Prec::Shift,
        Operator::Add | Operator::Sub => Prec::Arith,
        Operator::Mult | Operator::MatMult | Operator::Div | Operator::Mod | Operator::FloorDiv => {
            Prec::Term
        }
        Operator::Pow => Prec::Power,
    }
}

// ============================================================================
// LITERALS
// ============================================================================

fn push_escaped_char(out: &mut String, c: char) {
    let code = c as u32;
    if code <= 0xff {
        out.push_str(&format!("\\x{code:02x}"));
    } else if code <= 0xffff {
        out.push_str(&format!("\\u{code:04x}"));
    } else {
        out.push_str(&format!("\\U{code:08x}"));
    }
}

/// Python `repr()` of a `str`.
pub fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => push_escaped_char(&mut out, c),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Python `repr()` of a `bytes` value.
pub fn repr_bytes(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::from("b");
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote as char);
    out
}

/// Float literal text; infinities overflow on purpose.
fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "(1e309 - 1e309)".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "1e309" } else { "-1e309" }.to_string()
    } else {
        format!("{value:?}")
    }
}

/// Escapes the literal part of an f-string body for the chosen quote.
fn escape_fstring_literal(text: &str, quote: &str) -> String {
    let quote_char = quote.chars().next().unwrap_or('\'');
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push_str("{{"),
            '}' => out.push_str("}}"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote_char => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => push_escaped_char(&mut out, c),
            c => out.push(c),
        }
    }
    out
}

// ============================================================================
// UNPARSER
// ============================================================================

#[derive(Default)]
struct Unparser {
    out: String,
    indent: usize,
}

impl Unparser {
    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn fill(&mut self, text: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
    }

    fn comma(&mut self, first: &mut bool) {
        if !*first {
            self.write(", ");
        }
        *first = false;
    }

    fn block(&mut self, body: &[Stmt]) {
        self.write(":");
        self.indent += 1;
        if body.is_empty() {
            self.fill("pass");
        }
        for stmt in body {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn exprs(&mut self, items: &[Expr], prec: Prec) {
        let mut first = true;
        for item in items {
            self.comma(&mut first);
            self.expr(item, prec);
        }
    }

    fn module(&mut self, root: &Mod) {
        match root {
            Mod::Module { body, .. } | Mod::Interactive { body } => {
                for stmt in body {
                    self.stmt(stmt);
                }
            }
            Mod::Expression { body } => self.expr(body, Prec::Test),
            Mod::FunctionType { argtypes, returns } => {
                self.write("(");
                self.exprs(argtypes, Prec::Test);
                self.write(") -> ");
                self.expr(returns, Prec::Test);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn stmt(&mut self, stmt: &Stmt) {
        crate::stack::guarded(|| self.stmt_text(stmt))
    }

    fn stmt_text(&mut self, stmt: &Stmt) {
        match &stmt.node {
            StmtKind::FunctionDef(def) => self.function(def, "def "),
            StmtKind::AsyncFunctionDef(def) => self.function(def, "async def "),
            StmtKind::ClassDef(class) => {
                for decorator in &class.decorator_list {
                    self.fill("@");
                    self.expr(decorator, Prec::Test);
                }
                self.fill("class ");
                self.write(&class.name);
                self.type_params(&class.type_params);
                if !class.bases.is_empty() || !class.keywords.is_empty() {
                    self.write("(");
                    let mut first = true;
                    for base in &class.bases {
                        self.comma(&mut first);
                        self.expr(base, Prec::Test);
                    }
                    for keyword in &class.keywords {
                        self.comma(&mut first);
                        self.keyword(keyword);
                    }
                    self.write(")");
                }
                self.block(&class.body);
            }
            StmtKind::Return { value } => {
                self.fill("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.expr(value, Prec::Test);
                }
            }
            StmtKind::Delete { targets } => {
                self.fill("del ");
                self.exprs(targets, Prec::Test);
            }
            StmtKind::Assign { targets, value } => {
                self.fill("");
                for target in targets {
                    self.expr(target, Prec::Test);
                    self.write(" = ");
                }
                self.expr(value, Prec::Test);
            }
            StmtKind::TypeAlias {
                name,
                type_params,
                value,
            } => {
                self.fill("type ");
                self.expr(name, Prec::Atom);
                self.type_params(type_params);
                self.write(" = ");
                self.expr(value, Prec::Test);
            }
            StmtKind::AugAssign { target, op, value } => {
                self.fill("");
                self.expr(target, Prec::Test);
                self.write(&format!(" {}= ", op.symbol()));
                self.expr(value, Prec::Test);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => {
                self.fill("");
                let wrap = !simple && matches!(target.node, ExprKind::Name { .. });
                if wrap {
                    self.write("(");
                }
                self.expr(target, Prec::Test);
                if wrap {
                    self.write(")");
                }
                self.write(": ");
                self.expr(annotation, Prec::Test);
                if let Some(value) = value {
                    self.write(" = ");
                    self.expr(value, Prec::Test);
                }
            }
            StmtKind::For(data) => self.for_loop(data, "for "),
            StmtKind::AsyncFor(data) => self.for_loop(data, "async for "),
            StmtKind::While { test, body, orelse } => {
                self.fill("while ");
                self.expr(test, Prec::Test);
                self.block(body);
                self.else_block(orelse);
            }
            StmtKind::If { test, body, orelse } => {
                self.fill("if ");
                self.expr(test, Prec::Test);
                self.block(body);
                let mut orelse = orelse;
                while let [Located {
                    node:
                        StmtKind::If {
                            test,
                            body,
                            orelse: next,
                        },
                    ..
                }] = orelse.as_slice()
                {
                    self.fill("elif ");
                    self.expr(test, Prec::Test);
                    self.block(body);
                    orelse = next;
                }
                self.else_block(orelse);
            }
            StmtKind::With(data) => self.with(data, "with "),
            StmtKind::AsyncWith(data) => self.with(data, "async with "),
            StmtKind::Match { subject, cases } => {
                self.fill("match ");
                self.expr(subject, Prec::Test);
                self.write(":");
                self.indent += 1;
                for case in cases {
                    self.match_case(case);
                }
                self.indent -= 1;
            }
            StmtKind::Raise { exc, cause } => {
                self.fill("raise");
                if let Some(exc) = exc {
                    self.write(" ");
                    self.expr(exc, Prec::Test);
                }
                if let Some(cause) = cause {
                    self.write(" from ");
                    self.expr(cause, Prec::Test);
                }
            }
            StmtKind::Try(data) => self.try_block(data, false),
            StmtKind::TryStar(data) => self.try_block(data, true),
            StmtKind::Assert { test, msg } => {
                self.fill("assert ");
                self.expr(test, Prec::Test);
                if let Some(msg) = msg {
                    self.write(", ");
                    self.expr(msg, Prec::Test);
                }
            }
            StmtKind::Import { names } => {
                self.fill("import ");
                self.aliases(names);
            }
            StmtKind::ImportFrom {
                module,
                names,
                level,
            } => {
                self.fill("from ");
                self.write(&".".repeat(*level as usize));
                if let Some(module) = module {
                    self.write(module);
                }
                self.write(" import ");
                self.aliases(names);
            }
            StmtKind::Global { names } => {
                self.fill("global ");
                self.write(&names.join(", "));
            }
            StmtKind::Nonlocal { names } => {
                self.fill("nonlocal ");
                self.write(&names.join(", "));
            }
            StmtKind::Expr { value } => {
                self.fill("");
                self.expr(value, Prec::Yield);
            }
            StmtKind::Pass => self.fill("pass"),
            StmtKind::Break => self.fill("break"),
            StmtKind::Continue => self.fill("continue"),
        }
    }

    fn function(&mut self, def: &FunctionDefData, keyword: &str) {
        for decorator in &def.decorator_list {
            self.fill("@");
            self.expr(decorator, Prec::Test);
        }
        self.fill(keyword);
        self.write(&def.name);
        self.type_params(&def.type_params);
        self.write("(");
        self.arguments(&def.args, true);
        self.write(")");
        if let Some(returns) = &def.returns {
            self.write(" -> ");
            self.expr(returns, Prec::Test);
        }
        self.block(&def.body);
    }

    fn for_loop(&mut self, data: &ForData, keyword: &str) {
        self.fill(keyword);
        self.expr(&data.target, Prec::Tuple);
        self.write(" in ");
        self.expr(&data.iter, Prec::Test);
        self.block(&data.body);
        self.else_block(&data.orelse);
    }

    fn else_block(&mut self, orelse: &[Stmt]) {
        if !orelse.is_empty() {
            self.fill("else");
            self.block(orelse);
        }
    }

    fn with(&mut self, data: &WithData, keyword: &str) {
        self.fill(keyword);
        let mut first = true;
        for item in &data.items {
            self.comma(&mut first);
            self.with_item(item);
        }
        self.block(&data.body);
    }

    fn with_item(&mut self, item: &WithItem) {
        self.expr(&item.context_expr, Prec::Test);
        if let Some(vars) = &item.optional_vars {
            self.write(" as ");
            self.expr(vars, Prec::Test);
        }
    }

    fn try_block(&mut self, data: &TryData, star: bool) {
        self.fill("try");
        self.block(&data.body);
        for handler in &data.handlers {
            self.handler(handler, star);
        }
        self.else_block(&data.orelse);
        if !data.finalbody.is_empty() {
            self.fill("finally");
            self.block(&data.finalbody);
        }
    }

    fn handler(&mut self, handler: &ExceptHandler, star: bool) {
        self.fill(if star { "except*" } else { "except" });
        if let Some(type_) = &handler.type_ {
            self.write(" ");
            self.expr(type_, Prec::Test);
        }
        if let Some(name) = &handler.name {
            self.write(" as ");
            self.write(name);
        }
        self.block(&handler.body);
    }

    fn match_case(&mut self, case: &MatchCase) {
        self.fill("case ");
        self.pattern(&case.pattern, Prec::Test);
        if let Some(guard) = &case.guard {
            self.write(" if ");
            self.expr(guard, Prec::Test);
        }
        self.block(&case.body);
    }

    fn aliases(&mut self, names: &[Alias]) {
        let mut first = true;
        for alias in names {
            self.comma(&mut first);
            self.alias(alias);
        }
    }

    fn alias(&mut self, alias: &Alias) {
        self.write(&alias.name);
        if let Some(asname) = &alias.asname {
            self.write(" as ");
            self.write(asname);
        }
    }

    // ------------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------------

    fn arg(&mut self, arg: &Arg, annotations: bool) {
        self.write(&arg.arg);
        if let (true, Some(annotation)) = (annotations, &arg.annotation) {
            self.write(": ");
            self.expr(annotation, Prec::Test);
        }
    }

    fn arguments(&mut self, args: &Arguments, annotations: bool) {
        let mut first = true;
        let positional: Vec<&Arg> = args.posonlyargs.iter().chain(&args.args).collect();
        let offset = positional.len().saturating_sub(args.defaults.len());
        for (idx, arg) in positional.iter().enumerate() {
            self.comma(&mut first);
            self.arg(arg, annotations);
            if idx >= offset {
                if let Some(default) = args.defaults.get(idx - offset) {
                    self.write("=");
                    self.expr(default, Prec::Test);
                }
            }
            if idx + 1 == args.posonlyargs.len() {
                self.comma(&mut first);
                self.write("/");
            }
        }
        if args.vararg.is_some() || !args.kwonlyargs.is_empty() {
            self.comma(&mut first);
            self.write("*");
            if let Some(vararg) = &args.vararg {
                self.arg(vararg, annotations);
            }
        }
        for (idx, arg) in args.kwonlyargs.iter().enumerate() {
            self.comma(&mut first);
            self.arg(arg, annotations);
            if let Some(Some(default)) = args.kw_defaults.get(idx) {
                self.write("=");
                self.expr(default, Prec::Test);
            }
        }
        if let Some(kwarg) = &args.kwarg {
            self.comma(&mut first);
            self.write("**");
            self.arg(kwarg, annotations);
        }
    }

    fn keyword(&mut self, keyword: &Keyword) {
        match &keyword.arg {
            Some(name) => {
                self.write(name);
                self.write("=");
            }
            None => self.write("**"),
        }
        self.expr(&keyword.value, Prec::Test);
    }

    fn type_params(&mut self, params: &[TypeParam]) {
        if params.is_empty() {
            return;
        }
        self.write("[");
        let mut first = true;
        for param in params {
            self.comma(&mut first);
            self.type_param(param);
        }
        self.write("]");
    }

    fn type_param(&mut self, param: &TypeParam) {
        let default = match &param.node {
            TypeParamKind::TypeVar {
                name,
                bound,
                default_value,
            } => {
                self.write(name);
                if let Some(bound) = bound {
                    self.write(": ");
                    self.expr(bound, Prec::Test);
                }
                default_value
            }
            TypeParamKind::ParamSpec {
                name,
                default_value,
            } => {
                self.write("**");
                self.write(name);
                default_value
            }
            TypeParamKind::TypeVarTuple {
                name,
                default_value,
            } => {
                self.write("*");
                self.write(name);
                default_value
            }
        };
        if let Some(default) = default {
            self.write(" = ");
            self.expr(default, Prec::Test);
        }
    }

    // ------------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------------

    fn pattern(&mut self, pattern: &Pattern, prec: Prec) {
        crate::stack::guarded(|| self.pattern_text(pattern, prec))
    }

    fn pattern_text(&mut self, pattern: &Pattern, prec: Prec) {
        match &pattern.node {
            PatternKind::MatchValue { value } => self.expr(value, Prec::BOr),
            PatternKind::MatchSingleton { value } => self.constant(value, None, Prec::Atom),
            PatternKind::MatchSequence { patterns } => {
                self.write("[");
                let mut first = true;
                for item in patterns {
                    self.comma(&mut first);
                    self.pattern(item, Prec::Test);
                }
                self.write("]");
            }
            PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                self.write("{");
                let mut first = true;
                for (key, item) in keys.iter().zip(patterns) {
                    self.comma(&mut first);
                    self.expr(key, Prec::BOr);
                    self.write(": ");
                    self.pattern(item, Prec::Test);
                }
                if let Some(rest) = rest {
                    self.comma(&mut first);
                    self.write("**");
                    self.write(rest);
                }
                self.write("}");
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                self.expr(cls, Prec::Atom);
                self.write("(");
                let mut first = true;
                for item in patterns {
                    self.comma(&mut first);
                    self.pattern(item, Prec::Test);
                }
                for (attr, item) in kwd_attrs.iter().zip(kwd_patterns) {
                    self.comma(&mut first);
                    self.write(attr);
                    self.write("=");
                    self.pattern(item, Prec::Test);
                }
                self.write(")");
            }
            PatternKind::MatchStar { name } => {
                self.write("*");
                self.write(name.as_deref().unwrap_or("_"));
            }
            PatternKind::MatchAs { pattern, name } => match (pattern, name) {
                (None, None) => self.write("_"),
                (None, Some(name)) => self.write(name),
                (Some(inner), name) => {
                    let wrap = prec > Prec::Test;
                    if wrap {
                        self.write("(");
                    }
                    self.pattern(inner, Prec::BOr);
                    self.write(" as ");
                    self.write(name.as_deref().unwrap_or("_"));
                    if wrap {
                        self.write(")");
                    }
                }
            },
            PatternKind::MatchOr { patterns } => {
                let wrap = prec > Prec::BOr;
                if wrap {
                    self.write("(");
                }
                for (idx, item) in patterns.iter().enumerate() {
                    if idx > 0 {
                        self.write(" | ");
                    }
                    self.pattern(item, Prec::BOr.next());
                }
                if wrap {
                    self.write(")");
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn wrap_if(&mut self, cond: bool, f: impl FnOnce(&mut Self)) {
        if cond {
            self.write("(");
        }
        f(self);
        if cond {
            self.write(")");
        }
    }

    fn expr(&mut self, expr: &Expr, prec: Prec) {
        crate::stack::guarded(|| self.expr_text(expr, prec))
    }

    fn expr_text(&mut self, expr: &Expr, prec: Prec) {
        match &expr.node {
            ExprKind::BoolOp { op, values } => {
                let own = match op {
                    BoolOperator::And => Prec::And,
                    BoolOperator::Or => Prec::Or,
                };
                self.wrap_if(prec > own, |u| {
                    let separator = format!(" {} ", op.symbol());
                    for (idx, value) in values.iter().enumerate() {
                        if idx > 0 {
                            u.write(&separator);
                        }
                        u.expr(value, own.next());
                    }
                });
            }
            ExprKind::NamedExpr { target, value } => {
                self.wrap_if(prec > Prec::NamedExpr, |u| {
                    u.expr(target, Prec::Atom);
                    u.write(" := ");
                    u.expr(value, Prec::Test);
                });
            }
            ExprKind::BinOp { left, op, right } => {
                let own = binop_prec(*op);
                let (left_prec, right_prec) = if *op == Operator::Pow {
                    (own.next(), own)
                } else {
                    (own, own.next())
                };
                self.wrap_if(prec > own, |u| {
                    u.expr(left, left_prec);
                    u.write(&format!(" {} ", op.symbol()));
                    u.expr(right, right_prec);
                });
            }
            ExprKind::UnaryOp { op, operand } => {
                let own = if *op == UnaryOperator::Not {
                    Prec::Not
                } else {
                    Prec::Factor
                };
                self.wrap_if(prec > own, |u| {
                    u.write(op.symbol());
                    if *op == UnaryOperator::Not {
                        u.write(" ");
                    }
                    u.expr(operand, own);
                });
            }
            ExprKind::Lambda { args, body } => {
                self.wrap_if(prec > Prec::Test, |u| {
                    u.write("lambda");
                    if !args.is_empty() {
                        u.write(" ");
                        u.arguments(args, false);
                    }
                    u.write(": ");
                    u.expr(body, Prec::Test);
                });
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.wrap_if(prec > Prec::Test, |u| {
                    u.expr(body, Prec::Test.next());
                    u.write(" if ");
                    u.expr(test, Prec::Test.next());
                    u.write(" else ");
                    u.expr(orelse, Prec::Test);
                });
            }
            ExprKind::Dict { keys, values } => {
                self.write("{");
                let mut first = true;
                for (key, value) in keys.iter().zip(values) {
                    self.comma(&mut first);
                    match key {
                        Some(key) => {
                            self.expr(key, Prec::Test);
                            self.write(": ");
                            self.expr(value, Prec::Test);
                        }
                        None => {
                            self.write("**");
                            self.expr(value, Prec::BOr);
                        }
                    }
                }
                self.write("}");
            }
            ExprKind::Set { elts } => {
                if elts.is_empty() {
                    self.write("{*()}");
                } else {
                    self.write("{");
                    self.exprs(elts, Prec::Test);
                    self.write("}");
                }
            }
            ExprKind::ListComp { elt, generators } => {
                self.write("[");
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.write("]");
            }
            ExprKind::SetComp { elt, generators } => {
                self.write("{");
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.write("}");
            }
            ExprKind::GeneratorExp { elt, generators } => {
                self.write("(");
                self.expr(elt, Prec::Test);
                self.generators(generators);
                self.write(")");
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                self.write("{");
                self.expr(key, Prec::Test);
                self.write(": ");
                self.expr(value, Prec::Test);
                self.generators(generators);
                self.write("}");
            }
            ExprKind::Await { value } => {
                self.wrap_if(prec > Prec::Await, |u| {
                    u.write("await ");
                    u.expr(value, Prec::Atom);
                });
            }
            ExprKind::Yield { value } => {
                self.wrap_if(prec > Prec::Yield, |u| {
                    u.write("yield");
                    if let Some(value) = value {
                        u.write(" ");
                        u.expr(value, Prec::Test);
                    }
                });
            }
            ExprKind::YieldFrom { value } => {
                self.wrap_if(prec > Prec::Yield, |u| {
                    u.write("yield from ");
                    u.expr(value, Prec::Test);
                });
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                self.wrap_if(prec > Prec::Cmp, |u| {
                    u.expr(left, Prec::Cmp.next());
                    for (op, comparator) in ops.iter().zip(comparators) {
                        u.write(&format!(" {} ", op.symbol()));
                        u.expr(comparator, Prec::Cmp.next());
                    }
                });
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.expr(func, Prec::Atom);
                self.write("(");
                let mut first = true;
                for arg in args {
                    self.comma(&mut first);
                    self.expr(arg, Prec::Test);
                }
                for keyword in keywords {
                    self.comma(&mut first);
                    self.keyword(keyword);
                }
                self.write(")");
            }
            ExprKind::FormattedValue { .. } => self.fstring(std::slice::from_ref(expr)),
            ExprKind::JoinedStr { values } => self.fstring(values),
            ExprKind::Constant { value, kind } => self.constant(value, kind.as_deref(), prec),
            ExprKind::Attribute { value, attr, .. } => {
                self.expr(value, Prec::Atom);
                if let ExprKind::Constant {
                    value: ConstantValue::Int(digits),
                    ..
                } = &value.node
                {
                    if !digits.starts_with('-') {
                        self.write(" ");
                    }
                }
                self.write(".");
                self.write(attr);
            }
            ExprKind::Subscript { value, slice, .. } => {
                self.expr(value, Prec::Atom);
                self.write("[");
                match &slice.node {
                    ExprKind::Tuple { elts, .. } if !elts.is_empty() => {
                        self.exprs(elts, Prec::Test);
                        if elts.len() == 1 {
                            self.write(",");
                        }
                    }
                    _ => self.expr(slice, Prec::Test),
                }
                self.write("]");
            }
            ExprKind::Starred { value, .. } => {
                self.write("*");
                self.expr(value, Prec::BOr);
            }
            ExprKind::Name { id, .. } => self.write(id),
            ExprKind::List { elts, .. } => {
                self.write("[");
                self.exprs(elts, Prec::Test);
                self.write("]");
            }
            ExprKind::Tuple { elts, .. } => {
                if elts.is_empty() {
                    self.write("()");
                    return;
                }
                self.wrap_if(prec > Prec::Tuple, |u| {
                    u.exprs(elts, Prec::Test);
                    if elts.len() == 1 {
                        u.write(",");
                    }
                });
            }
            ExprKind::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    self.expr(lower, Prec::Test);
                }
                self.write(":");
                if let Some(upper) = upper {
                    self.expr(upper, Prec::Test);
                }
                if let Some(step) = step {
                    self.write(":");
                    self.expr(step, Prec::Test);
                }
            }
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.comprehension(generator);
        }
    }

    fn comprehension(&mut self, generator: &Comprehension) {
        self.write(if generator.is_async {
            " async for "
        } else {
            " for "
        });
        self.expr(&generator.target, Prec::Tuple);
        self.write(" in ");
        self.expr(&generator.iter, Prec::Test.next());
        for cond in &generator.ifs {
            self.write(" if ");
            self.expr(cond, Prec::Test.next());
        }
    }

    fn constant(&mut self, value: &ConstantValue, kind: Option<&str>, prec: Prec) {
        let negative = match value {
            ConstantValue::Int(digits) => digits.starts_with('-'),
            ConstantValue::Float(f) | ConstantValue::Complex(f) => f.is_sign_negative() && !f.is_nan(),
            _ => false,
        };
        let text = match value {
            ConstantValue::None => "None".to_string(),
            ConstantValue::Bool(true) => "True".to_string(),
            ConstantValue::Bool(false) => "False".to_string(),
            ConstantValue::Ellipsis => "...".to_string(),
            ConstantValue::Int(digits) => digits.clone(),
            ConstantValue::Float(f) => float_literal(*f),
            ConstantValue::Complex(f) if f.is_nan() => "(1e309j - 1e309j)".to_string(),
            ConstantValue::Complex(f) => format!("{}j", float_literal(*f)),
            ConstantValue::Str(s) => {
                let prefix = if kind == Some("u") { "u" } else { "" };
                format!("{prefix}{}", repr_str(s))
            }
            ConstantValue::Bytes(b) => repr_bytes(b),
        };
        self.wrap_if(negative && prec > Prec::Factor, |u| u.write(&text));
    }

    // ------------------------------------------------------------------------
    // f-strings
    // ------------------------------------------------------------------------

    fn fstring(&mut self, values: &[Expr]) {
        let mut inner = Vec::new();
        collect_field_texts(values, &mut inner);
        let quote = ["'", "\"", "'''", "\"\"\""]
            .into_iter()
            .find(|q| !inner.iter().any(|text| text.contains(q)))
            .unwrap_or("\"\"\"");
        self.write("f");
        self.write(quote);
        self.write(&fstring_body(values, quote));
        self.write(quote);
    }
}

/// Source of a replacement field's expression, spaced away from the braces.
fn field_text(value: &Expr) -> String {
    let mut u = Unparser::default();
    u.expr(value, Prec::Test.next());
    if u.out.starts_with('{') {
        u.out.insert(0, ' ');
    }
    u.out
}

fn collect_field_texts(values: &[Expr], acc: &mut Vec<String>) {
    for value in values {
        match &value.node {
            ExprKind::FormattedValue {
                value, format_spec, ..
            } => {
                acc.push(field_text(value));
                if let Some(spec) = format_spec {
                    if let ExprKind::JoinedStr { values } = &spec.node {
                        collect_field_texts(values, acc);
                    }
                }
            }
            ExprKind::Constant { .. } => {}
            _ => acc.push(field_text(value)),
        }
    }
}

fn fstring_body(values: &[Expr], quote: &str) -> String {
    let mut out = String::new();
    for value in values {
        match &value.node {
            ExprKind::Constant {
                value: ConstantValue::Str(text),
                ..
            } => out.push_str(&escape_fstring_literal(text, quote)),
            ExprKind::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                out.push('{');
                out.push_str(&field_text(value));
                if let Some(c) = u32::try_from(*conversion).ok().and_then(char::from_u32) {
                    out.push('!');
                    out.push(c);
                }
                if let Some(spec) = format_spec {
                    out.push(':');
                    match &spec.node {
                        ExprKind::JoinedStr { values } => out.push_str(&fstring_body(values, quote)),
                        ExprKind::Constant {
                            value: ConstantValue::Str(text),
                            ..
                        } => out.push_str(&escape_fstring_literal(text, quote)),
                        _ => {
                            out.push('{');
                            out.push_str(&field_text(spec));
                            out.push('}');
                        }
                    }
                }
                out.push('}');
            }
            _ => {
                out.push('{');
                out.push_str(&field_text(value));
                out.push('}');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_source, ParseMode};

    fn normalize(source: &str) -> String {
        let tree = parse_source(source, ParseMode::Exec, "<test>", 200).unwrap();
        unparse(&tree)
    }

    #[test]
    fn precedence_adds_only_needed_parens() {
        assert_eq!(normalize("x = (a + b) * c\n"), "x = (a + b) * c");
        assert_eq!(normalize("x = a + (b * c)\n"), "x = a + b * c");
        assert_eq!(normalize("x = (-1) ** 2\n"), "x = (-1) ** 2");
        assert_eq!(normalize("x = 2 ** 3 ** 4\n"), "x = 2 ** 3 ** 4");
        assert_eq!(normalize("x = not (a and b)\n"), "x = not (a and b)");
    }

    #[test]
    fn elif_chains_fold() {
        let text = normalize("if a:\n    pass\nelse:\n    if b:\n        pass\n    else:\n        x = 1\n");
        assert_eq!(text, "if a:\n    pass\nelif b:\n    pass\nelse:\n    x = 1");
    }

    #[test]
    fn literals_use_python_repr() {
        assert_eq!(repr_str("it's"), "\"it's\"");
        assert_eq!(repr_str("a\nb\u{1}"), "'a\\nb\\x01'");
        assert_eq!(repr_bytes(&[0, b'a', 0xff]), "b'\\x00a\\xff'");
        assert_eq!(float_literal(f64::INFINITY), "1e309");
        assert_eq!(normalize("x = 1 .real\n"), "x = 1 .real");
    }

    #[test]
    fn empty_set_and_single_tuple() {
        let set = Located::bare(ExprKind::Set { elts: vec![] });
        assert_eq!(unparse_expr(&set), "{*()}");
        assert_eq!(normalize("x = 1,\n"), "x = (1,)");
    }

    #[test]
    fn fstrings_pick_a_free_quote() {
        assert_eq!(normalize("f'{x!r:>10} {{y}}'\n"), "f'{x!r:>10} {{y}}'");
        assert_eq!(normalize("f\"{d['k']}\"\n"), "f\"{d['k']}\"");
    }

    #[test]
    fn signatures_render_all_parameter_kinds() {
        let text = normalize("def f(a, /, b: int = 1, *args, c, d=2, **kw) -> None:\n    pass\n");
        assert_eq!(text, "def f(a, /, b: int=1, *args, c, d=2, **kw) -> None:\n    pass");
    }
}
