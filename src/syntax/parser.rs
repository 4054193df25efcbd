//! Python parser: tree-sitter CST lowered into the [`syntax`](super) model.
//!
//! tree-sitter-python produces a concrete tree that keeps parentheses, comments
//! and punctuation. Lowering walks it top-down, drops trivia, resolves literals
//! and rebuilds the abstract shape CPython's `ast` module would produce.
//! Syntax errors are reported at the first `ERROR` or `MISSING` node.
//!
//! Lowering is depth-guarded: every statement, expression and pattern node that
//! is produced counts one level, and exceeding `max_depth` fails with a
//! `DepthLimit` error instead of exhausting the stack.

use tracing::{debug, trace};
use tree_sitter::{Node as TsNode, Parser};

use super::literals::{
    decode_bytes_body, decode_fstring_segment, decode_str_body, parse_number, split_string_token,
};
use super::*;
use crate::diagnostics::{to_error_source, AstJsonError, LineInfo, Result, SourceArc, Span};
use crate::{err_ctx, err_msg};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compile mode the source is parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseMode {
    /// A sequence of statements, producing `Module`.
    Exec,
    /// A single expression, producing `Expression`.
    Eval,
    /// Statements as typed at a REPL prompt, producing `Interactive`.
    Single,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Exec => "exec",
            ParseMode::Eval => "eval",
            ParseMode::Single => "single",
        }
    }
}

/// Parses Python source text into a root node for `mode`.
pub fn parse_source(source: &str, mode: ParseMode, filename: &str, max_depth: usize) -> Result<Mod> {
    // Line endings are universal: `\r\n` and lone `\r` read as `\n`.
    let normalized;
    let source = if source.contains('\r') {
        normalized = source.replace("\r\n", "\n").replace('\r', "\n");
        normalized.as_str()
    } else {
        source
    };
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| err_msg!(Internal, "cannot load the Python grammar: {}", e))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| err_msg!(Internal, "tree-sitter returned no tree for {}", filename))?;
    let root = tree.root_node();
    debug!(filename, mode = mode.as_str(), bytes = source.len(), "parsed source");

    let mut lowering = Lowering {
        source,
        named: to_error_source(filename, source),
        max_depth,
        depth: 0,
    };
    if root.has_error() {
        return Err(lowering.syntax_error_at_first_error(root));
    }

    let body = lowering.lower_statements(root)?;
    match mode {
        ParseMode::Exec => Ok(Mod::Module {
            body,
            type_ignores: vec![],
        }),
        ParseMode::Single => Ok(Mod::Interactive { body }),
        ParseMode::Eval => lowering.expression_root(root, body),
    }
}

// ============================================================================
// CST HELPERS
// ============================================================================

fn is_trivia(node: &TsNode) -> bool {
    matches!(node.kind(), "comment" | "line_continuation")
}

fn named_children<'t>(node: TsNode<'t>) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !is_trivia(c))
        .collect()
}

fn children<'t>(node: TsNode<'t>) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).filter(|c| !is_trivia(c)).collect()
}

fn field_children<'t>(node: TsNode<'t>, field: &str) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor)
        .filter(|c| !is_trivia(c))
        .collect()
}

fn has_token(node: TsNode, token: &str) -> bool {
    children(node)
        .iter()
        .any(|c| !c.is_named() && c.kind() == token)
}

/// `(p)` without a trailing comma only groups its inner pattern.
fn is_group_pattern(node: TsNode) -> bool {
    node.kind() == "tuple_pattern" && named_children(node).len() == 1 && !has_token(node, ",")
}

fn span_location(first: TsNode, last: TsNode) -> Location {
    let start = first.start_position();
    let end = last.end_position();
    Location {
        lineno: start.row + 1,
        col_offset: start.column,
        end_lineno: end.row + 1,
        end_col_offset: end.column,
    }
}

/// First `ERROR` or `MISSING` node in document order.
fn first_error_node(root: TsNode) -> Option<TsNode> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Piece of a string or f-string before adjacent literals are merged.
enum StrPiece {
    Literal(String, Location),
    Value(Expr),
}

// ============================================================================
// LOWERING
// ============================================================================

struct Lowering<'src> {
    source: &'src str,
    named: SourceArc,
    max_depth: usize,
    depth: usize,
}

impl<'src> Lowering<'src> {
    fn text(&self, node: TsNode) -> &'src str {
        &self.source[node.byte_range()]
    }

    fn location(&self, node: TsNode) -> Option<Location> {
        Some(span_location(node, node))
    }

    /// Location of a byte range inside the source.
    fn byte_span(&self, start: usize, end: usize) -> Location {
        let point = |byte: usize| {
            let before = &self.source[..byte];
            let line_start = before.rfind('\n').map_or(0, |i| i + 1);
            (before.matches('\n').count() + 1, byte - line_start)
        };
        let (lineno, col_offset) = point(start);
        let (end_lineno, end_col_offset) = point(end);
        Location {
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
        }
    }

    fn line_info(&self, node: TsNode) -> LineInfo {
        let pos = node.start_position();
        LineInfo {
            line: pos.row + 1,
            column: pos.column + 1,
            text: self.source.lines().nth(pos.row).unwrap_or("").to_string(),
        }
    }

    fn error(&self, node: TsNode, message: impl Into<String>) -> AstJsonError {
        let span = Span {
            start: node.start_byte(),
            end: node.end_byte(),
        };
        err_ctx!(Syntax, message.into(), &self.named, span).with_line(self.line_info(node))
    }

    fn syntax_error_at_first_error(&self, root: TsNode) -> AstJsonError {
        let Some(node) = first_error_node(root) else {
            return self.error(root, "invalid syntax");
        };
        let message = if node.is_missing() {
            format!("invalid syntax: expected '{}'", node.kind())
        } else if node.start_byte() >= self.source.trim_end().len() {
            "unexpected EOF while parsing".to_string()
        } else {
            "invalid syntax".to_string()
        };
        debug!(line = node.start_position().row + 1, %message, "syntax error");
        self.error(node, message)
    }

    fn field<'t>(&self, node: TsNode<'t>, name: &str) -> Result<TsNode<'t>> {
        node.child_by_field_name(name)
            .ok_or_else(|| self.error(node, format!("{} is missing its {}", node.kind(), name)))
    }

    fn depth_error(&self, node: TsNode) -> AstJsonError {
        err_msg!(
            DepthLimit,
            "nesting depth exceeds the configured maximum of {}",
            self.max_depth
        )
        .with_line(self.line_info(node))
        .with_help("simplify the source or raise max_depth in the configuration")
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, node: TsNode, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.max_depth {
            return Err(self.depth_error(node));
        }
        self.depth += 1;
        let result = crate::stack::guarded(|| f(self));
        self.depth -= 1;
        result
    }

    fn expression_root(&mut self, root: TsNode, body: Vec<Stmt>) -> Result<Mod> {
        let mut body = body.into_iter();
        match (body.next(), body.next()) {
            (
                Some(Located {
                    node: StmtKind::Expr { value },
                    ..
                }),
                None,
            ) => Ok(Mod::Expression { body: value }),
            _ => Err(self.error(root, "invalid syntax: expected a single expression")),
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn lower_statements(&mut self, node: TsNode) -> Result<Vec<Stmt>> {
        named_children(node)
            .into_iter()
            .map(|child| self.lower_stmt(child))
            .collect()
    }

    fn lower_block(&mut self, node: TsNode) -> Result<Vec<Stmt>> {
        let body = self.lower_statements(node)?;
        if body.is_empty() {
            return Err(self.error(node, "expected an indented block"));
        }
        Ok(body)
    }

    fn lower_stmt(&mut self, node: TsNode) -> Result<Stmt> {
        self.nested(node, |this| {
            trace!(kind = node.kind(), "lowering statement");
            let kind = this.lower_stmt_kind(node)?;
            let location = match node.kind() {
                "decorated_definition" => this.location(this.field(node, "definition")?),
                _ => this.location(node),
            };
            Ok(Located::new(kind, location))
        })
    }

    fn lower_stmt_kind(&mut self, node: TsNode) -> Result<StmtKind> {
        match node.kind() {
            "expression_statement" => self.lower_expression_statement(node),
            "return_statement" => {
                let value = match named_children(node).first() {
                    Some(child) => Some(Box::new(self.lower_expr(*child)?)),
                    None => None,
                };
                Ok(StmtKind::Return { value })
            }
            "delete_statement" => {
                let mut targets = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "expression_list" {
                        for elt in named_children(child) {
                            targets.push(self.lower_target(elt, ExprContext::Del)?);
                        }
                    } else {
                        targets.push(self.lower_target(child, ExprContext::Del)?);
                    }
                }
                Ok(StmtKind::Delete { targets })
            }
            "raise_statement" => {
                let cause_node = node.child_by_field_name("cause");
                let exc_node = named_children(node)
                    .into_iter()
                    .find(|c| Some(c.id()) != cause_node.map(|n| n.id()));
                Ok(StmtKind::Raise {
                    exc: self.lower_opt_boxed(exc_node)?,
                    cause: self.lower_opt_boxed(cause_node)?,
                })
            }
            "pass_statement" => Ok(StmtKind::Pass),
            "break_statement" => Ok(StmtKind::Break),
            "continue_statement" => Ok(StmtKind::Continue),
            "global_statement" | "nonlocal_statement" => {
                let names = named_children(node)
                    .into_iter()
                    .map(|c| self.text(c).to_string())
                    .collect();
                Ok(if node.kind() == "global_statement" {
                    StmtKind::Global { names }
                } else {
                    StmtKind::Nonlocal { names }
                })
            }
            "assert_statement" => {
                let parts = named_children(node);
                let test = parts
                    .first()
                    .ok_or_else(|| self.error(node, "assert needs a condition"))?;
                Ok(StmtKind::Assert {
                    test: Box::new(self.lower_expr(*test)?),
                    msg: self.lower_opt_boxed(parts.get(1).copied())?,
                })
            }
            "import_statement" => Ok(StmtKind::Import {
                names: self.lower_import_names(node)?,
            }),
            "import_from_statement" | "future_import_statement" => self.lower_import_from(node),
            "if_statement" => self.lower_if(node),
            "for_statement" => {
                let data = ForData {
                    target: Box::new(self.lower_target(self.field(node, "left")?, ExprContext::Store)?),
                    iter: Box::new(self.lower_expr(self.field(node, "right")?)?),
                    body: self.lower_block(self.field(node, "body")?)?,
                    orelse: self.lower_else(node.child_by_field_name("alternative"))?,
                };
                Ok(if has_token(node, "async") {
                    StmtKind::AsyncFor(data)
                } else {
                    StmtKind::For(data)
                })
            }
            "while_statement" => Ok(StmtKind::While {
                test: Box::new(self.lower_expr(self.field(node, "condition")?)?),
                body: self.lower_block(self.field(node, "body")?)?,
                orelse: self.lower_else(node.child_by_field_name("alternative"))?,
            }),
            "try_statement" => self.lower_try(node),
            "with_statement" => self.lower_with(node),
            "function_definition" => self.lower_function(node, vec![]),
            "class_definition" => self.lower_class(node, vec![]),
            "decorated_definition" => {
                let mut decorators = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "decorator" {
                        let expr = named_children(child)
                            .into_iter()
                            .next()
                            .ok_or_else(|| self.error(child, "empty decorator"))?;
                        decorators.push(self.lower_expr(expr)?);
                    }
                }
                let definition = self.field(node, "definition")?;
                match definition.kind() {
                    "function_definition" => self.lower_function(definition, decorators),
                    "class_definition" => self.lower_class(definition, decorators),
                    other => Err(self.error(definition, format!("cannot decorate {other}"))),
                }
            }
            "match_statement" => self.lower_match(node),
            "type_alias_statement" => {
                let left = self.field(node, "left")?;
                let (name, type_params) = self.lower_alias_head(left)?;
                Ok(StmtKind::TypeAlias {
                    name: Box::new(name),
                    type_params,
                    value: Box::new(self.lower_type(self.field(node, "right")?)?),
                })
            }
            "print_statement" | "exec_statement" => Err(self.error(
                node,
                format!(
                    "Missing parentheses in call to '{}'",
                    node.kind().trim_end_matches("_statement")
                ),
            )),
            other => Err(self.error(node, format!("unsupported statement '{other}'"))),
        }
    }

    fn lower_expression_statement(&mut self, node: TsNode) -> Result<StmtKind> {
        let parts = named_children(node);
        if parts.len() > 1 {
            let elts = self.lower_exprs(&parts)?;
            let tuple = Located::new(
                ExprKind::Tuple {
                    elts,
                    ctx: ExprContext::Load,
                },
                self.location(node),
            );
            return Ok(StmtKind::Expr {
                value: Box::new(tuple),
            });
        }
        let inner = parts
            .first()
            .copied()
            .ok_or_else(|| self.error(node, "empty statement"))?;
        match inner.kind() {
            "assignment" => self.lower_assignment(inner),
            "augmented_assignment" => self.lower_aug_assignment(inner),
            _ => Ok(StmtKind::Expr {
                value: Box::new(self.lower_expr(inner)?),
            }),
        }
    }

    fn lower_assignment(&mut self, node: TsNode) -> Result<StmtKind> {
        let left = self.field(node, "left")?;
        if let Some(annotation) = node.child_by_field_name("type") {
            let simple = left.kind() == "identifier";
            let value = match node.child_by_field_name("right") {
                Some(right) => Some(Box::new(self.lower_expr(right)?)),
                None => None,
            };
            return Ok(StmtKind::AnnAssign {
                target: Box::new(self.lower_target(left, ExprContext::Store)?),
                annotation: Box::new(self.lower_type(annotation)?),
                value,
                simple,
            });
        }

        let mut targets = vec![self.lower_target(left, ExprContext::Store)?];
        let mut right = self.field(node, "right")?;
        while right.kind() == "assignment" {
            if right.child_by_field_name("type").is_some() {
                return Err(self.error(right, "invalid syntax: annotated chained assignment"));
            }
            targets.push(self.lower_target(self.field(right, "left")?, ExprContext::Store)?);
            right = self.field(right, "right")?;
        }
        if right.kind() == "augmented_assignment" {
            return Err(self.error(right, "invalid syntax: augmented assignment as a value"));
        }
        Ok(StmtKind::Assign {
            targets,
            value: Box::new(self.lower_expr(right)?),
        })
    }

    fn lower_aug_assignment(&mut self, node: TsNode) -> Result<StmtKind> {
        let op_node = self.field(node, "operator")?;
        let symbol = self.text(op_node).trim_end_matches('=');
        let op = Operator::from_symbol(symbol)
            .ok_or_else(|| self.error(op_node, format!("unknown operator '{symbol}='")))?;
        Ok(StmtKind::AugAssign {
            target: Box::new(self.lower_target(self.field(node, "left")?, ExprContext::Store)?),
            op,
            value: Box::new(self.lower_expr(self.field(node, "right")?)?),
        })
    }

    fn lower_else(&mut self, clause: Option<TsNode>) -> Result<Vec<Stmt>> {
        match clause {
            Some(clause) => self.lower_block(self.field(clause, "body")?),
            None => Ok(vec![]),
        }
    }

    fn lower_if(&mut self, node: TsNode) -> Result<StmtKind> {
        let test = Box::new(self.lower_expr(self.field(node, "condition")?)?);
        let body = self.lower_block(self.field(node, "consequence")?)?;
        let alternatives = field_children(node, "alternative");

        let mut orelse = Vec::new();
        let last = alternatives.last().copied();
        for clause in alternatives.iter().rev() {
            match clause.kind() {
                "else_clause" => orelse = self.lower_block(self.field(*clause, "body")?)?,
                "elif_clause" => {
                    let branch = self.nested(*clause, |this| {
                        Ok(StmtKind::If {
                            test: Box::new(this.lower_expr(this.field(*clause, "condition")?)?),
                            body: this.lower_block(this.field(*clause, "consequence")?)?,
                            orelse: std::mem::take(&mut orelse),
                        })
                    })?;
                    // an elif runs to the end of the chain below it
                    let end = last.unwrap_or(*clause);
                    orelse = vec![Located::new(branch, Some(span_location(*clause, end)))];
                }
                other => return Err(self.error(*clause, format!("unexpected {other} in if"))),
            }
        }
        Ok(StmtKind::If { test, body, orelse })
    }

    fn lower_try(&mut self, node: TsNode) -> Result<StmtKind> {
        let mut data = TryData {
            body: self.lower_block(self.field(node, "body")?)?,
            handlers: vec![],
            orelse: vec![],
            finalbody: vec![],
        };
        let mut star = false;
        for clause in named_children(node) {
            match clause.kind() {
                "except_clause" | "except_group_clause" => {
                    star |= clause.kind() == "except_group_clause"
                        || has_token(clause, "*")
                        || has_token(clause, "except*");
                    data.handlers.push(self.lower_handler(clause)?);
                }
                "else_clause" => data.orelse = self.lower_block(self.field(clause, "body")?)?,
                "finally_clause" => {
                    let block = named_children(clause)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                        .ok_or_else(|| self.error(clause, "finally needs a body"))?;
                    data.finalbody = self.lower_block(block)?;
                }
                _ => {}
            }
        }
        Ok(if star {
            StmtKind::TryStar(data)
        } else {
            StmtKind::Try(data)
        })
    }

    fn lower_handler(&mut self, clause: TsNode) -> Result<ExceptHandler> {
        let mut parts = named_children(clause);
        let block = match parts.iter().position(|c| c.kind() == "block") {
            Some(idx) => parts.remove(idx),
            None => return Err(self.error(clause, "except needs a body")),
        };

        let (type_node, name_node) = match parts.as_slice() {
            [] => (None, None),
            [single] if single.kind() == "as_pattern" => {
                let inner = named_children(*single);
                let alias = single.child_by_field_name("alias");
                (inner.first().copied(), alias)
            }
            [single] => (Some(*single), None),
            [ty, name, ..] => (Some(*ty), Some(*name)),
        };
        let name = match name_node {
            Some(node) => {
                let ident = if node.kind() == "as_pattern_target" {
                    named_children(node).first().copied().unwrap_or(node)
                } else {
                    node
                };
                if ident.kind() != "identifier" {
                    return Err(self.error(ident, "except ... as target must be a name"));
                }
                Some(self.text(ident).to_string())
            }
            None => None,
        };
        Ok(ExceptHandler {
            type_: self.lower_opt(type_node)?,
            name,
            body: self.lower_block(block)?,
            location: self.location(clause),
        })
    }

    fn lower_with(&mut self, node: TsNode) -> Result<StmtKind> {
        let clause = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "with_clause")
            .ok_or_else(|| self.error(node, "with needs at least one item"))?;
        let mut items = Vec::new();
        for item in named_children(clause) {
            let value = self.field(item, "value")?;
            let with_item = if value.kind() == "as_pattern" {
                let context = named_children(value)
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(value, "with item needs a context manager"))?;
                let alias = self.field(value, "alias")?;
                let target = named_children(alias).into_iter().next().unwrap_or(alias);
                WithItem {
                    context_expr: self.lower_expr(context)?,
                    optional_vars: Some(self.lower_target(target, ExprContext::Store)?),
                }
            } else {
                let optional_vars = match item.child_by_field_name("alias") {
                    Some(alias) => Some(self.lower_target(alias, ExprContext::Store)?),
                    None => None,
                };
                WithItem {
                    context_expr: self.lower_expr(value)?,
                    optional_vars,
                }
            };
            items.push(with_item);
        }
        let data = WithData {
            items,
            body: self.lower_block(self.field(node, "body")?)?,
        };
        Ok(if has_token(node, "async") {
            StmtKind::AsyncWith(data)
        } else {
            StmtKind::With(data)
        })
    }

    fn lower_function(&mut self, node: TsNode, decorator_list: Vec<Expr>) -> Result<StmtKind> {
        let type_params = match node.child_by_field_name("type_parameters") {
            Some(tp) => self.lower_type_params(tp)?,
            None => vec![],
        };
        let returns = match node.child_by_field_name("return_type") {
            Some(rt) => Some(Box::new(self.lower_type(rt)?)),
            None => None,
        };
        let data = FunctionDefData {
            name: self.text(self.field(node, "name")?).to_string(),
            type_params,
            args: Box::new(self.lower_parameters(node.child_by_field_name("parameters"))?),
            body: self.lower_block(self.field(node, "body")?)?,
            decorator_list,
            returns,
        };
        Ok(if has_token(node, "async") {
            StmtKind::AsyncFunctionDef(data)
        } else {
            StmtKind::FunctionDef(data)
        })
    }

    fn lower_class(&mut self, node: TsNode, decorator_list: Vec<Expr>) -> Result<StmtKind> {
        let type_params = match node.child_by_field_name("type_parameters") {
            Some(tp) => self.lower_type_params(tp)?,
            None => vec![],
        };
        let (bases, keywords) = match node.child_by_field_name("superclasses") {
            Some(list) => self.lower_call_arguments(list)?,
            None => (vec![], vec![]),
        };
        Ok(StmtKind::ClassDef(ClassDefData {
            name: self.text(self.field(node, "name")?).to_string(),
            type_params,
            bases,
            keywords,
            body: self.lower_block(self.field(node, "body")?)?,
            decorator_list,
        }))
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    fn dotted(&self, node: TsNode) -> String {
        if node.kind() == "dotted_name" {
            named_children(node)
                .into_iter()
                .map(|c| self.text(c))
                .collect::<Vec<_>>()
                .join(".")
        } else {
            self.text(node).to_string()
        }
    }

    fn lower_import_names(&mut self, node: TsNode) -> Result<Vec<Alias>> {
        let mut names = Vec::new();
        for child in field_children(node, "name") {
            let alias = match child.kind() {
                "aliased_import" => Alias {
                    name: self.dotted(self.field(child, "name")?),
                    asname: Some(self.text(self.field(child, "alias")?).to_string()),
                    location: self.location(child),
                },
                _ => Alias {
                    name: self.dotted(child),
                    asname: None,
                    location: self.location(child),
                },
            };
            names.push(alias);
        }
        Ok(names)
    }

    fn lower_import_from(&mut self, node: TsNode) -> Result<StmtKind> {
        let (module, level) = if node.kind() == "future_import_statement" {
            (Some("__future__".to_string()), 0)
        } else {
            let module_node = self.field(node, "module_name")?;
            if module_node.kind() == "relative_import" {
                let mut level = 0;
                let mut module = None;
                for part in named_children(module_node) {
                    match part.kind() {
                        "import_prefix" => {
                            level = self.text(part).chars().filter(|c| *c == '.').count() as u32
                        }
                        _ => module = Some(self.dotted(part)),
                    }
                }
                (module, level)
            } else {
                (Some(self.dotted(module_node)), 0)
            }
        };

        let mut names = self.lower_import_names(node)?;
        if let Some(wildcard) = named_children(node)
            .into_iter()
            .find(|c| c.kind() == "wildcard_import")
        {
            names.push(Alias {
                name: "*".into(),
                asname: None,
                location: self.location(wildcard),
            });
        }
        Ok(StmtKind::ImportFrom {
            module,
            names,
            level,
        })
    }

    // ------------------------------------------------------------------------
    // Match statements
    // ------------------------------------------------------------------------

    fn lower_match(&mut self, node: TsNode) -> Result<StmtKind> {
        let subjects = field_children(node, "subject");
        let subject = if subjects.len() > 1 || has_token(node, ",") {
            let first = subjects
                .first()
                .copied()
                .ok_or_else(|| self.error(node, "match needs a subject"))?;
            let last = subjects.last().copied().unwrap_or(first);
            Located::new(
                ExprKind::Tuple {
                    elts: self.lower_exprs(&subjects)?,
                    ctx: ExprContext::Load,
                },
                Some(span_location(first, last)),
            )
        } else {
            self.lower_expr(self.field(node, "subject")?)?
        };

        let body = self.field(node, "body")?;
        let mut cases = Vec::new();
        for clause in named_children(body) {
            if clause.kind() == "case_clause" {
                cases.push(self.lower_case(clause)?);
            }
        }
        Ok(StmtKind::Match {
            subject: Box::new(subject),
            cases,
        })
    }

    fn lower_case(&mut self, clause: TsNode) -> Result<MatchCase> {
        let patterns: Vec<TsNode> = named_children(clause)
            .into_iter()
            .filter(|c| c.kind() == "case_pattern")
            .collect();
        let sequence = patterns.len() > 1
            || children(clause)
                .iter()
                .take_while(|c| c.kind() != ":")
                .any(|c| c.kind() == ",");
        let pattern = if sequence {
            let first = patterns
                .first()
                .copied()
                .ok_or_else(|| self.error(clause, "case needs a pattern"))?;
            let last = patterns.last().copied().unwrap_or(first);
            self.nested(clause, |this| {
                let lowered = patterns
                    .iter()
                    .map(|p| this.lower_pattern(*p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Located::new(
                    PatternKind::MatchSequence { patterns: lowered },
                    Some(span_location(first, last)),
                ))
            })?
        } else {
            let single = patterns
                .first()
                .copied()
                .ok_or_else(|| self.error(clause, "case needs a pattern"))?;
            self.lower_pattern(single)?
        };

        let guard = match clause.child_by_field_name("guard") {
            Some(if_clause) => {
                let expr = named_children(if_clause)
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(if_clause, "empty guard"))?;
                Some(self.lower_expr(expr)?)
            }
            None => None,
        };
        Ok(MatchCase {
            pattern,
            guard,
            body: self.lower_block(self.field(clause, "consequence")?)?,
        })
    }

    fn lower_pattern(&mut self, node: TsNode) -> Result<Pattern> {
        let pieces = children(node);
        self.lower_pattern_pieces(node, &pieces)
    }

    /// Lowers the inline pieces of a pattern: one named node, or a short token
    /// sequence such as `-` `1` or `_`.
    fn lower_pattern_pieces(&mut self, owner: TsNode, pieces: &[TsNode]) -> Result<Pattern> {
        if let [single] = pieces {
            match single.kind() {
                "case_pattern" => return self.lower_pattern(*single),
                "tuple_pattern" if is_group_pattern(*single) => {
                    let inner = named_children(*single);
                    return self.lower_pattern(inner[0]);
                }
                "union_pattern" | "as_pattern" | "class_pattern" | "list_pattern"
                | "tuple_pattern" | "dict_pattern" | "splat_pattern" | "dotted_name" | "true"
                | "false" | "none" | "_" => {}
                _ => {
                    return self.nested(*single, |this| {
                        let value = this.lower_value_pieces(owner, pieces)?;
                        Ok(Located::new(
                            PatternKind::MatchValue {
                                value: Box::new(value),
                            },
                            this.location(*single),
                        ))
                    })
                }
            }
        }
        let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
            return Err(self.error(owner, "empty pattern"));
        };
        let location = Some(span_location(*first, *last));

        self.nested(owner, |this| {
            let kind = match pieces {
                [single] => this.lower_pattern_node(*single)?,
                _ => PatternKind::MatchValue {
                    value: Box::new(this.lower_value_pieces(owner, pieces)?),
                },
            };
            Ok(Located::new(kind, location))
        })
    }

    fn lower_pattern_node(&mut self, node: TsNode) -> Result<PatternKind> {
        Ok(match node.kind() {
            "_" => PatternKind::MatchAs {
                pattern: None,
                name: None,
            },
            "true" => PatternKind::MatchSingleton {
                value: ConstantValue::Bool(true),
            },
            "false" => PatternKind::MatchSingleton {
                value: ConstantValue::Bool(false),
            },
            "none" => PatternKind::MatchSingleton {
                value: ConstantValue::None,
            },
            "dotted_name" => {
                let parts = named_children(node);
                if parts.len() == 1 {
                    PatternKind::MatchAs {
                        pattern: None,
                        name: Some(self.text(parts[0]).to_string()),
                    }
                } else {
                    PatternKind::MatchValue {
                        value: Box::new(self.dotted_expr(node)?),
                    }
                }
            }
            "as_pattern" => {
                let parts = named_children(node);
                let (Some(inner), Some(name)) = (parts.first(), parts.last()) else {
                    return Err(self.error(node, "malformed as-pattern"));
                };
                PatternKind::MatchAs {
                    pattern: Some(Box::new(self.lower_pattern(*inner)?)),
                    name: Some(self.text(*name).to_string()),
                }
            }
            "union_pattern" => {
                let mut patterns = Vec::new();
                let mut group: Vec<TsNode> = Vec::new();
                let pieces = children(node);
                for piece in pieces.iter().copied().chain(std::iter::once(node)) {
                    let boundary = piece.id() == node.id() || piece.kind() == "|";
                    if !boundary {
                        group.push(piece);
                        continue;
                    }
                    if let [nested] = group.as_slice() {
                        if nested.kind() == "union_pattern" {
                            if let PatternKind::MatchOr { patterns: inner } =
                                self.lower_pattern_node(*nested)?
                            {
                                patterns.extend(inner);
                                group.clear();
                                continue;
                            }
                        }
                    }
                    patterns.push(self.lower_pattern_pieces(node, &group)?);
                    group.clear();
                }
                PatternKind::MatchOr { patterns }
            }
            "list_pattern" | "tuple_pattern" => {
                let inner: Vec<TsNode> = named_children(node);
                if is_group_pattern(node) {
                    return Ok(self.lower_pattern(inner[0])?.node);
                }
                PatternKind::MatchSequence {
                    patterns: inner
                        .iter()
                        .map(|p| self.lower_pattern(*p))
                        .collect::<Result<_>>()?,
                }
            }
            "splat_pattern" => {
                let name = named_children(node)
                    .first()
                    .map(|n| self.text(*n).to_string())
                    .filter(|n| n != "_");
                PatternKind::MatchStar { name }
            }
            "dict_pattern" => self.lower_mapping_pattern(node)?,
            "class_pattern" => self.lower_class_pattern(node)?,
            other => return Err(self.error(node, format!("unsupported pattern '{other}'"))),
        })
    }

    fn lower_mapping_pattern(&mut self, node: TsNode) -> Result<PatternKind> {
        let mut keys = Vec::new();
        let mut patterns = Vec::new();
        let mut rest = None;
        let mut key_pieces: Vec<TsNode> = Vec::new();
        for piece in children(node) {
            match piece.kind() {
                "{" | "}" | "," | ":" => {}
                "splat_pattern" => {
                    rest = named_children(piece)
                        .first()
                        .map(|n| self.text(*n).to_string());
                }
                "case_pattern" if !key_pieces.is_empty() => {
                    keys.push(self.lower_value_pieces(node, &key_pieces)?);
                    patterns.push(self.lower_pattern(piece)?);
                    key_pieces.clear();
                }
                _ => key_pieces.push(piece),
            }
        }
        Ok(PatternKind::MatchMapping {
            keys,
            patterns,
            rest,
        })
    }

    fn lower_class_pattern(&mut self, node: TsNode) -> Result<PatternKind> {
        let parts = named_children(node);
        let cls_node = parts
            .first()
            .copied()
            .ok_or_else(|| self.error(node, "class pattern needs a class"))?;
        let cls = self.dotted_expr(cls_node)?;
        let mut patterns = Vec::new();
        let mut kwd_attrs = Vec::new();
        let mut kwd_patterns = Vec::new();
        for arg in parts.iter().skip(1) {
            let keyword = if arg.kind() == "keyword_pattern" {
                Some(*arg)
            } else {
                named_children(*arg)
                    .into_iter()
                    .find(|c| c.kind() == "keyword_pattern")
            };
            match keyword {
                Some(kw) => {
                    let pieces = children(kw);
                    let Some(eq) = pieces.iter().position(|p| p.kind() == "=") else {
                        return Err(self.error(kw, "malformed keyword pattern"));
                    };
                    kwd_attrs.push(self.text(pieces[0]).to_string());
                    kwd_patterns.push(self.lower_pattern_pieces(kw, &pieces[eq + 1..])?);
                }
                None => patterns.push(self.lower_pattern(*arg)?),
            }
        }
        Ok(PatternKind::MatchClass {
            cls: Box::new(cls),
            patterns,
            kwd_attrs,
            kwd_patterns,
        })
    }

    /// Literal or value expression used by `MatchValue` and mapping keys.
    fn lower_value_pieces(&mut self, owner: TsNode, pieces: &[TsNode]) -> Result<Expr> {
        match pieces {
            [single] => match single.kind() {
                "dotted_name" => self.dotted_expr(*single),
                "complex_pattern" => {
                    let inner = children(*single);
                    self.lower_value_pieces(*single, &inner)
                }
                "case_pattern" => {
                    let inner = children(*single);
                    self.lower_value_pieces(*single, &inner)
                }
                _ => self.lower_expr(*single),
            },
            [minus, number] if minus.kind() == "-" => self.nested(*minus, |this| {
                let operand = this.lower_expr(*number)?;
                Ok(Located::new(
                    ExprKind::UnaryOp {
                        op: UnaryOperator::USub,
                        operand: Box::new(operand),
                    },
                    Some(span_location(*minus, *number)),
                ))
            }),
            [.., sign, imag] if matches!(sign.kind(), "+" | "-") => self.nested(*sign, |this| {
                let real_pieces = &pieces[..pieces.len() - 2];
                let left = this.lower_value_pieces(owner, real_pieces)?;
                let right = this.lower_expr(*imag)?;
                let op = if sign.kind() == "+" {
                    Operator::Add
                } else {
                    Operator::Sub
                };
                Ok(Located::new(
                    ExprKind::BinOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    Some(span_location(pieces[0], *imag)),
                ))
            }),
            _ => Err(self.error(owner, "unsupported value pattern")),
        }
    }

    /// `a.b.c` as a chain of attribute loads. Every link is one nesting level.
    fn dotted_expr(&mut self, node: TsNode) -> Result<Expr> {
        let parts = named_children(node);
        let first = parts
            .first()
            .copied()
            .ok_or_else(|| self.error(node, "empty dotted name"))?;
        if self.depth + parts.len() > self.max_depth {
            return Err(self.depth_error(node));
        }
        let mut expr = Expr::name(self.text(first), ExprContext::Load, self.location(first));
        for part in parts.iter().skip(1) {
            expr = Located::new(
                ExprKind::Attribute {
                    value: Box::new(expr),
                    attr: self.text(*part).to_string(),
                    ctx: ExprContext::Load,
                },
                Some(span_location(first, *part)),
            );
        }
        Ok(expr)
    }

    // ------------------------------------------------------------------------
    // Signatures & type parameters
    // ------------------------------------------------------------------------

    /// An `arg` spans its name and annotation; defaults and stars stay outside.
    fn make_arg(&mut self, name_node: TsNode, annotation_node: Option<TsNode>) -> Result<Arg> {
        let annotation = match annotation_node {
            Some(ann) => Some(Box::new(self.lower_type(ann)?)),
            None => None,
        };
        Ok(Arg {
            arg: self.text(name_node).to_string(),
            annotation,
            location: Some(span_location(name_node, annotation_node.unwrap_or(name_node))),
        })
    }

    fn splat_name<'t>(&self, node: TsNode<'t>) -> Result<TsNode<'t>> {
        named_children(node)
            .into_iter()
            .next()
            .ok_or_else(|| self.error(node, "star parameter needs a name"))
    }

    fn lower_parameters(&mut self, node: Option<TsNode>) -> Result<Arguments> {
        let mut args = Arguments::default();
        let Some(node) = node else {
            return Ok(args);
        };
        let mut keyword_only = false;
        for param in named_children(node) {
            match param.kind() {
                "identifier" => {
                    let arg = self.make_arg(param, None)?;
                    self.push_param(param, &mut args, keyword_only, arg, None)?;
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = self.field(param, "name")?;
                    if name.kind() != "identifier" {
                        return Err(self.error(param, "tuple parameters are not supported"));
                    }
                    let arg = self.make_arg(name, param.child_by_field_name("type"))?;
                    let default = self.lower_expr(self.field(param, "value")?)?;
                    self.push_param(param, &mut args, keyword_only, arg, Some(default))?;
                }
                "typed_parameter" => {
                    let annotation = self.field(param, "type")?;
                    let inner = named_children(param)
                        .into_iter()
                        .find(|c| c.id() != annotation.id())
                        .ok_or_else(|| self.error(param, "typed parameter needs a name"))?;
                    match inner.kind() {
                        "list_splat_pattern" => {
                            let name = self.splat_name(inner)?;
                            args.vararg = Some(Box::new(self.make_arg(name, Some(annotation))?));
                            keyword_only = true;
                        }
                        "dictionary_splat_pattern" => {
                            let name = self.splat_name(inner)?;
                            args.kwarg = Some(Box::new(self.make_arg(name, Some(annotation))?));
                        }
                        _ => {
                            let arg = self.make_arg(inner, Some(annotation))?;
                            self.push_param(param, &mut args, keyword_only, arg, None)?;
                        }
                    }
                }
                "list_splat_pattern" => {
                    let name = self.splat_name(param)?;
                    args.vararg = Some(Box::new(self.make_arg(name, None)?));
                    keyword_only = true;
                }
                "dictionary_splat_pattern" => {
                    let name = self.splat_name(param)?;
                    args.kwarg = Some(Box::new(self.make_arg(name, None)?));
                }
                "keyword_separator" => keyword_only = true,
                "positional_separator" => {
                    let mut regular = std::mem::take(&mut args.args);
                    args.posonlyargs.append(&mut regular);
                }
                other => return Err(self.error(param, format!("unsupported parameter '{other}'"))),
            }
        }
        Ok(args)
    }

    fn push_param(
        &self,
        node: TsNode,
        args: &mut Arguments,
        keyword_only: bool,
        arg: Arg,
        default: Option<Expr>,
    ) -> Result<()> {
        if keyword_only {
            args.kwonlyargs.push(arg);
            args.kw_defaults.push(default);
            return Ok(());
        }
        match default {
            Some(default) => args.defaults.push(default),
            None if !args.defaults.is_empty() => {
                return Err(self.error(
                    node,
                    "parameter without a default follows parameter with a default",
                ))
            }
            None => {}
        }
        args.args.push(arg);
        Ok(())
    }

    fn lower_type_params(&mut self, node: TsNode) -> Result<Vec<TypeParam>> {
        let mut params = Vec::new();
        for item in named_children(node) {
            let inner = if item.kind() == "type" {
                named_children(item).into_iter().next().unwrap_or(item)
            } else {
                item
            };
            let kind = match inner.kind() {
                "identifier" => TypeParamKind::TypeVar {
                    name: self.text(inner).to_string(),
                    bound: None,
                    default_value: None,
                },
                "constrained_type" => {
                    let parts = named_children(inner);
                    let (Some(name), Some(bound)) = (parts.first(), parts.get(1)) else {
                        return Err(self.error(inner, "malformed bounded type parameter"));
                    };
                    TypeParamKind::TypeVar {
                        name: self.text(*name).trim().to_string(),
                        bound: Some(Box::new(self.lower_type(*bound)?)),
                        default_value: None,
                    }
                }
                "splat_type" => {
                    let name_node = self.splat_name(inner)?;
                    let name = self.text(name_node).to_string();
                    if self.text(inner).trim_start().starts_with("**") {
                        TypeParamKind::ParamSpec {
                            name,
                            default_value: None,
                        }
                    } else {
                        TypeParamKind::TypeVarTuple {
                            name,
                            default_value: None,
                        }
                    }
                }
                other => return Err(self.error(inner, format!("unsupported type parameter '{other}'"))),
            };
            params.push(Located::new(kind, self.location(item)));
        }
        Ok(params)
    }

    /// Splits the left side of `type X[T] = ...` into name and parameters.
    fn lower_alias_head(&mut self, node: TsNode) -> Result<(Expr, Vec<TypeParam>)> {
        let inner = if node.kind() == "type" {
            named_children(node).into_iter().next().unwrap_or(node)
        } else {
            node
        };
        match inner.kind() {
            "identifier" => Ok((
                Expr::name(self.text(inner), ExprContext::Store, self.location(inner)),
                vec![],
            )),
            "generic_type" => {
                let parts = named_children(inner);
                let (Some(name), Some(params)) = (parts.first(), parts.get(1)) else {
                    return Err(self.error(inner, "malformed generic alias"));
                };
                Ok((
                    Expr::name(self.text(*name), ExprContext::Store, self.location(*name)),
                    self.lower_type_params(*params)?,
                ))
            }
            _ => Err(self.error(inner, "type alias name must be an identifier")),
        }
    }

    /// Lowers annotation syntax, which tree-sitter wraps in dedicated type nodes.
    fn lower_type(&mut self, node: TsNode) -> Result<Expr> {
        match node.kind() {
            "type" => {
                let inner = named_children(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(node, "empty type"))?;
                self.lower_type(inner)
            }
            "generic_type" => self.nested(node, |this| {
                let parts = named_children(node);
                let (Some(base), Some(params)) = (parts.first(), parts.get(1)) else {
                    return Err(this.error(node, "malformed generic type"));
                };
                let value = this.lower_type(*base)?;
                let args = named_children(*params);
                let slice = if args.len() == 1 {
                    this.lower_type(args[0])?
                } else {
                    this.nested(*params, |inner| {
                        let elts = args
                            .iter()
                            .map(|a| inner.lower_type(*a))
                            .collect::<Result<Vec<_>>>()?;
                        let location = match (args.first(), args.last()) {
                            (Some(first), Some(last)) => Some(span_location(*first, *last)),
                            _ => inner.location(*params),
                        };
                        Ok(Located::new(
                            ExprKind::Tuple {
                                elts,
                                ctx: ExprContext::Load,
                            },
                            location,
                        ))
                    })?
                };
                Ok(Located::new(
                    ExprKind::Subscript {
                        value: Box::new(value),
                        slice: Box::new(slice),
                        ctx: ExprContext::Load,
                    },
                    this.location(node),
                ))
            }),
            "union_type" => self.nested(node, |this| {
                let parts = named_children(node);
                let (Some(left), Some(right)) = (parts.first(), parts.get(1)) else {
                    return Err(this.error(node, "malformed union type"));
                };
                Ok(Located::new(
                    ExprKind::BinOp {
                        left: Box::new(this.lower_type(*left)?),
                        op: Operator::BitOr,
                        right: Box::new(this.lower_type(*right)?),
                    },
                    this.location(node),
                ))
            }),
            "member_type" => self.nested(node, |this| {
                let parts = named_children(node);
                let (Some(base), Some(attr)) = (parts.first(), parts.last()) else {
                    return Err(this.error(node, "malformed member type"));
                };
                Ok(Located::new(
                    ExprKind::Attribute {
                        value: Box::new(this.lower_type(*base)?),
                        attr: this.text(*attr).to_string(),
                        ctx: ExprContext::Load,
                    },
                    this.location(node),
                ))
            }),
            "splat_type" => self.nested(node, |this| {
                let name = this.splat_name(node)?;
                let value = this.nested(name, |inner| {
                    Ok(Expr::name(inner.text(name), ExprContext::Load, inner.location(name)))
                })?;
                Ok(Located::new(
                    ExprKind::Starred {
                        value: Box::new(value),
                        ctx: ExprContext::Load,
                    },
                    this.location(node),
                ))
            }),
            "constrained_type" => Err(self.error(node, "bounds are only allowed on type parameters")),
            _ => self.lower_expr(node),
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn lower_opt(&mut self, node: Option<TsNode>) -> Result<Option<Expr>> {
        node.map(|n| self.lower_expr(n)).transpose()
    }

    fn lower_opt_boxed(&mut self, node: Option<TsNode>) -> Result<Option<Box<Expr>>> {
        Ok(self.lower_opt(node)?.map(Box::new))
    }

    fn lower_exprs(&mut self, nodes: &[TsNode]) -> Result<Vec<Expr>> {
        nodes.iter().map(|n| self.lower_expr(*n)).collect()
    }

    /// Assignment, deletion and loop targets.
    fn lower_target(&mut self, node: TsNode, ctx: ExprContext) -> Result<Expr> {
        let mut expr = match node.kind() {
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                let elts = named_children(node);
                if node.kind() == "tuple_pattern" && elts.len() == 1 && !has_token(node, ",") {
                    return self.lower_target(elts[0], ctx);
                }
                self.nested(node, |this| {
                    let elts = elts
                        .iter()
                        .map(|e| this.lower_target(*e, ctx))
                        .collect::<Result<Vec<_>>>()?;
                    let kind = if node.kind() == "list_pattern" {
                        ExprKind::List { elts, ctx }
                    } else {
                        ExprKind::Tuple { elts, ctx }
                    };
                    Ok(Located::new(kind, this.location(node)))
                })?
            }
            "list_splat_pattern" => self.nested(node, |this| {
                let inner = this.splat_name(node)?;
                Ok(Located::new(
                    ExprKind::Starred {
                        value: Box::new(this.lower_target(inner, ctx)?),
                        ctx,
                    },
                    this.location(node),
                ))
            })?,
            _ => self.lower_expr(node)?,
        };
        expr.set_ctx(ctx);
        Ok(expr)
    }

    fn lower_expr(&mut self, node: TsNode) -> Result<Expr> {
        let mut node = node;
        loop {
            match node.kind() {
                "parenthesized_expression" | "parenthesized_list_splat" => {
                    let inner = named_children(node);
                    match inner.as_slice() {
                        [single] => node = *single,
                        _ => return Err(self.error(node, "invalid parenthesized expression")),
                    }
                }
                "type" => return self.lower_type(node),
                _ => break,
            }
        }
        if matches!(node.kind(), "string" | "concatenated_string") {
            return self.nested(node, |this| this.lower_string_node(node));
        }
        self.nested(node, |this| {
            let kind = this.lower_expr_kind(node)?;
            Ok(Located::new(kind, this.location(node)))
        })
    }

    fn lower_expr_kind(&mut self, node: TsNode) -> Result<ExprKind> {
        Ok(match node.kind() {
            "identifier" | "keyword_identifier" => ExprKind::Name {
                id: self.text(node).to_string(),
                ctx: ExprContext::Load,
            },
            "integer" | "float" => ExprKind::Constant {
                value: parse_number(self.text(node)).map_err(|e| self.error(node, e))?,
                kind: None,
            },
            "true" => constant_kind(ConstantValue::Bool(true)),
            "false" => constant_kind(ConstantValue::Bool(false)),
            "none" => constant_kind(ConstantValue::None),
            "ellipsis" => constant_kind(ConstantValue::Ellipsis),
            "tuple" | "expression_list" | "pattern_list" => ExprKind::Tuple {
                elts: self.lower_exprs(&named_children(node))?,
                ctx: ExprContext::Load,
            },
            "tuple_pattern" | "list_pattern" => {
                let mut target = self.lower_target(node, ExprContext::Load)?;
                target.set_ctx(ExprContext::Load);
                return Ok(target.node);
            }
            "list" => ExprKind::List {
                elts: self.lower_exprs(&named_children(node))?,
                ctx: ExprContext::Load,
            },
            "set" => ExprKind::Set {
                elts: self.lower_exprs(&named_children(node))?,
            },
            "dictionary" => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for entry in named_children(node) {
                    match entry.kind() {
                        "pair" => {
                            keys.push(Some(self.lower_expr(self.field(entry, "key")?)?));
                            values.push(self.lower_expr(self.field(entry, "value")?)?);
                        }
                        "dictionary_splat" => {
                            keys.push(None);
                            values.push(self.lower_expr(self.splat_name(entry)?)?);
                        }
                        other => return Err(self.error(entry, format!("unexpected {other} in dict"))),
                    }
                }
                ExprKind::Dict { keys, values }
            }
            "list_splat" | "list_splat_pattern" => ExprKind::Starred {
                value: Box::new(self.lower_expr(self.splat_name(node)?)?),
                ctx: ExprContext::Load,
            },
            "list_comprehension" | "set_comprehension" | "generator_expression" => {
                let elt = Box::new(self.lower_expr(self.field(node, "body")?)?);
                let generators = self.lower_generators(node)?;
                match node.kind() {
                    "list_comprehension" => ExprKind::ListComp { elt, generators },
                    "set_comprehension" => ExprKind::SetComp { elt, generators },
                    _ => ExprKind::GeneratorExp { elt, generators },
                }
            }
            "dictionary_comprehension" => {
                let pair = self.field(node, "body")?;
                ExprKind::DictComp {
                    key: Box::new(self.lower_expr(self.field(pair, "key")?)?),
                    value: Box::new(self.lower_expr(self.field(pair, "value")?)?),
                    generators: self.lower_generators(node)?,
                }
            }
            "attribute" => ExprKind::Attribute {
                value: Box::new(self.lower_expr(self.field(node, "object")?)?),
                attr: self.text(self.field(node, "attribute")?).to_string(),
                ctx: ExprContext::Load,
            },
            "subscript" => self.lower_subscript(node)?,
            "slice" => {
                let mut parts: [Option<Box<Expr>>; 3] = [None, None, None];
                let mut slot = 0;
                for child in children(node) {
                    if child.is_named() {
                        if slot < 3 {
                            parts[slot] = Some(Box::new(self.lower_expr(child)?));
                        }
                    } else if child.kind() == ":" {
                        slot += 1;
                    }
                }
                let [lower, upper, step] = parts;
                ExprKind::Slice { lower, upper, step }
            }
            "call" => {
                let func = Box::new(self.lower_expr(self.field(node, "function")?)?);
                let arguments = self.field(node, "arguments")?;
                let (args, keywords) = if arguments.kind() == "generator_expression" {
                    (vec![self.lower_expr(arguments)?], vec![])
                } else {
                    self.lower_call_arguments(arguments)?
                };
                ExprKind::Call {
                    func,
                    args,
                    keywords,
                }
            }
            "binary_operator" => {
                let op_node = self.field(node, "operator")?;
                let op = Operator::from_symbol(self.text(op_node)).ok_or_else(|| {
                    self.error(op_node, format!("unknown operator '{}'", self.text(op_node)))
                })?;
                ExprKind::BinOp {
                    left: Box::new(self.lower_expr(self.field(node, "left")?)?),
                    op,
                    right: Box::new(self.lower_expr(self.field(node, "right")?)?),
                }
            }
            "unary_operator" => {
                let op_node = self.field(node, "operator")?;
                let op = match self.text(op_node) {
                    "-" => UnaryOperator::USub,
                    "+" => UnaryOperator::UAdd,
                    "~" => UnaryOperator::Invert,
                    other => return Err(self.error(op_node, format!("unknown operator '{other}'"))),
                };
                ExprKind::UnaryOp {
                    op,
                    operand: Box::new(self.lower_expr(self.field(node, "argument")?)?),
                }
            }
            "not_operator" => ExprKind::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(self.lower_expr(self.field(node, "argument")?)?),
            },
            "boolean_operator" => self.lower_bool_op(node)?,
            "comparison_operator" => self.lower_compare(node)?,
            "conditional_expression" => {
                let parts = named_children(node);
                let [body, test, orelse] = parts.as_slice() else {
                    return Err(self.error(node, "malformed conditional expression"));
                };
                ExprKind::IfExp {
                    test: Box::new(self.lower_expr(*test)?),
                    body: Box::new(self.lower_expr(*body)?),
                    orelse: Box::new(self.lower_expr(*orelse)?),
                }
            }
            "named_expression" => {
                let name = self.field(node, "name")?;
                let target = self.nested(name, |this| {
                    Ok(Expr::name(this.text(name), ExprContext::Store, this.location(name)))
                })?;
                ExprKind::NamedExpr {
                    target: Box::new(target),
                    value: Box::new(self.lower_expr(self.field(node, "value")?)?),
                }
            }
            "lambda" => ExprKind::Lambda {
                args: Box::new(self.lower_parameters(node.child_by_field_name("parameters"))?),
                body: Box::new(self.lower_expr(self.field(node, "body")?)?),
            },
            "await" => {
                let inner = named_children(node)
                    .into_iter()
                    .next()
                    .ok_or_else(|| self.error(node, "await needs an operand"))?;
                ExprKind::Await {
                    value: Box::new(self.lower_expr(inner)?),
                }
            }
            "yield" => {
                let value = named_children(node).into_iter().next();
                if has_token(node, "from") {
                    let value = value.ok_or_else(|| self.error(node, "yield from needs an operand"))?;
                    ExprKind::YieldFrom {
                        value: Box::new(self.lower_expr(value)?),
                    }
                } else {
                    ExprKind::Yield {
                        value: self.lower_opt_boxed(value)?,
                    }
                }
            }
            "as_pattern" => return Err(self.error(node, "invalid syntax: 'as' outside with/except")),
            "dictionary_splat" => return Err(self.error(node, "invalid syntax: '**' outside call or dict")),
            other => return Err(self.error(node, format!("unsupported expression '{other}'"))),
        })
    }

    fn lower_subscript(&mut self, node: TsNode) -> Result<ExprKind> {
        let value = Box::new(self.lower_expr(self.field(node, "value")?)?);
        let items = field_children(node, "subscript");
        let tuple = items.len() != 1
            || has_token(node, ",")
            || items.iter().any(|item| item.kind() == "list_splat");
        let slice = if tuple {
            let (Some(first), Some(last)) = (items.first(), items.last()) else {
                return Err(self.error(node, "empty subscript"));
            };
            let location = Some(span_location(*first, *last));
            self.nested(node, |this| {
                Ok(Located::new(
                    ExprKind::Tuple {
                        elts: this.lower_exprs(&items)?,
                        ctx: ExprContext::Load,
                    },
                    location,
                ))
            })?
        } else {
            self.lower_expr(items[0])?
        };
        Ok(ExprKind::Subscript {
            value,
            slice: Box::new(slice),
            ctx: ExprContext::Load,
        })
    }

    fn lower_call_arguments(&mut self, node: TsNode) -> Result<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "keyword_argument" => keywords.push(Keyword {
                    arg: Some(self.text(self.field(child, "name")?).to_string()),
                    value: self.lower_expr(self.field(child, "value")?)?,
                    location: self.location(child),
                }),
                "dictionary_splat" => keywords.push(Keyword {
                    arg: None,
                    value: self.lower_expr(self.splat_name(child)?)?,
                    location: self.location(child),
                }),
                _ => args.push(self.lower_expr(child)?),
            }
        }
        Ok((args, keywords))
    }

    fn lower_generators(&mut self, node: TsNode) -> Result<Vec<Comprehension>> {
        let body = node.child_by_field_name("body").map(|b| b.id());
        let mut generators: Vec<Comprehension> = Vec::new();
        for clause in named_children(node) {
            if Some(clause.id()) == body {
                continue;
            }
            match clause.kind() {
                "for_in_clause" => {
                    let right = field_children(clause, "right");
                    let iter = if right.len() == 1 {
                        self.lower_expr(right[0])?
                    } else {
                        let (Some(first), Some(last)) = (right.first(), right.last()) else {
                            return Err(self.error(clause, "for clause needs an iterable"));
                        };
                        let location = Some(span_location(*first, *last));
                        self.nested(clause, |this| {
                            Ok(Located::new(
                                ExprKind::Tuple {
                                    elts: this.lower_exprs(&right)?,
                                    ctx: ExprContext::Load,
                                },
                                location,
                            ))
                        })?
                    };
                    generators.push(Comprehension {
                        target: self.lower_target(self.field(clause, "left")?, ExprContext::Store)?,
                        iter,
                        ifs: vec![],
                        is_async: has_token(clause, "async"),
                    });
                }
                "if_clause" => {
                    let cond = named_children(clause)
                        .into_iter()
                        .next()
                        .ok_or_else(|| self.error(clause, "empty if clause"))?;
                    let cond = self.lower_expr(cond)?;
                    match generators.last_mut() {
                        Some(generator) => generator.ifs.push(cond),
                        None => return Err(self.error(clause, "if clause before for clause")),
                    }
                }
                _ => {}
            }
        }
        Ok(generators)
    }

    /// Flattens left-nested `a and b and c` into one `BoolOp`.
    fn lower_bool_op(&mut self, node: TsNode) -> Result<ExprKind> {
        let op_text = self.text(self.field(node, "operator")?);
        let op = if op_text == "and" {
            BoolOperator::And
        } else {
            BoolOperator::Or
        };
        let mut operands = vec![self.field(node, "right")?];
        let mut left = self.field(node, "left")?;
        while left.kind() == "boolean_operator"
            && left
                .child_by_field_name("operator")
                .map(|o| self.text(o) == op_text)
                .unwrap_or(false)
        {
            operands.push(self.field(left, "right")?);
            left = self.field(left, "left")?;
        }
        operands.push(left);
        operands.reverse();
        Ok(ExprKind::BoolOp {
            op,
            values: self.lower_exprs(&operands)?,
        })
    }

    fn lower_compare(&mut self, node: TsNode) -> Result<ExprKind> {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for child in children(node) {
            if child.is_named() {
                if !pending.is_empty() {
                    let symbol = pending.join(" ");
                    let op = CmpOperator::from_symbol(&symbol)
                        .ok_or_else(|| self.error(child, format!("unknown comparison '{symbol}'")))?;
                    ops.push(op);
                    pending.clear();
                }
                operands.push(child);
            } else {
                pending.extend(self.text(child).split_whitespace());
            }
        }
        let Some((left, rest)) = operands.split_first() else {
            return Err(self.error(node, "empty comparison"));
        };
        Ok(ExprKind::Compare {
            left: Box::new(self.lower_expr(*left)?),
            ops,
            comparators: self.lower_exprs(rest)?,
        })
    }

    // ------------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------------

    /// Lowers `string` and implicitly concatenated strings into a single
    /// `Constant` or `JoinedStr`.
    fn lower_string_node(&mut self, node: TsNode) -> Result<Expr> {
        let parts = if node.kind() == "concatenated_string" {
            named_children(node)
        } else {
            vec![node]
        };
        let mut pieces = Vec::new();
        let mut bytes: Option<Vec<u8>> = None;
        let mut formatted = false;
        let mut unicode_kind = false;
        for (idx, part) in parts.iter().enumerate() {
            let text = self.text(*part);
            let token = split_string_token(text).map_err(|e| self.error(*part, e))?;
            if idx == 0 {
                unicode_kind = token.prefix.unicode;
            }
            if token.prefix.bytes != bytes.is_some() && idx > 0 {
                return Err(self.error(*part, "cannot mix bytes and nonbytes literals"));
            }
            if token.prefix.bytes {
                let decoded =
                    decode_bytes_body(token.body, token.prefix.raw).map_err(|e| self.error(*part, e))?;
                bytes.get_or_insert_with(Vec::new).extend(decoded);
            } else if token.prefix.format {
                formatted = true;
                self.lower_fstring_part(*part, &token, &mut pieces)?;
            } else {
                let decoded =
                    decode_str_body(token.body, token.prefix.raw).map_err(|e| self.error(*part, e))?;
                pieces.push(StrPiece::Literal(decoded, span_location(*part, *part)));
            }
        }

        let location = self.location(node);
        if let Some(bytes) = bytes {
            return Ok(Expr::constant(ConstantValue::Bytes(bytes), location));
        }
        if !formatted {
            let value = pieces
                .into_iter()
                .map(|p| match p {
                    StrPiece::Literal(s, _) => s,
                    StrPiece::Value(_) => String::new(),
                })
                .collect::<String>();
            return Ok(Located::new(
                ExprKind::Constant {
                    value: ConstantValue::Str(value),
                    kind: unicode_kind.then(|| "u".to_string()),
                },
                location,
            ));
        }
        Ok(Located::new(
            ExprKind::JoinedStr {
                values: merge_pieces(pieces),
            },
            location,
        ))
    }

    fn lower_fstring_part(
        &mut self,
        part: TsNode,
        token: &super::literals::StringToken,
        pieces: &mut Vec<StrPiece>,
    ) -> Result<()> {
        let raw = token.prefix.raw;
        let body_end = part.end_byte() - token.close_len;
        let mut cursor = part.start_byte() + token.open_len;
        for child in named_children(part) {
            if child.kind() != "interpolation" {
                continue;
            }
            let literal = &self.source[cursor..child.start_byte()];
            let decoded = decode_fstring_segment(literal, raw).map_err(|e| self.error(part, e))?;
            pieces.push(StrPiece::Literal(decoded, self.byte_span(cursor, child.start_byte())));
            self.lower_interpolation(child, pieces)?;
            cursor = child.end_byte();
        }
        if cursor < body_end {
            let literal = &self.source[cursor..body_end];
            let decoded = decode_fstring_segment(literal, raw).map_err(|e| self.error(part, e))?;
            pieces.push(StrPiece::Literal(decoded, self.byte_span(cursor, body_end)));
        }
        Ok(())
    }

    fn lower_interpolation(&mut self, node: TsNode, pieces: &mut Vec<StrPiece>) -> Result<()> {
        let conversion_node = node.child_by_field_name("type_conversion");
        let spec_node = node.child_by_field_name("format_specifier");
        let expr_node = match node.child_by_field_name("expression") {
            Some(expr) => expr,
            None => named_children(node)
                .into_iter()
                .find(|c| !matches!(c.kind(), "type_conversion" | "format_specifier"))
                .ok_or_else(|| self.error(node, "f-string: empty expression not allowed"))?,
        };
        let parts = children(node);
        let equals = parts
            .iter()
            .position(|c| !c.is_named() && c.kind() == "=");

        if let Some(idx) = equals {
            // The echoed text keeps any whitespace up to the conversion, spec or brace.
            let start = node.start_byte() + 1;
            let end = parts
                .get(idx + 1)
                .map(|next| next.start_byte())
                .unwrap_or_else(|| parts[idx].end_byte());
            pieces.push(StrPiece::Literal(
                self.source[start..end].to_string(),
                self.byte_span(start, end),
            ));
        }

        let mut conversion = match conversion_node {
            Some(conv) => {
                let text = self.text(conv);
                match text.chars().last() {
                    Some(c @ ('s' | 'r' | 'a')) => c as i32,
                    _ => return Err(self.error(conv, format!("invalid conversion '{text}'"))),
                }
            }
            None => -1,
        };
        if equals.is_some() && conversion_node.is_none() && spec_node.is_none() {
            conversion = 'r' as i32;
        }

        let formatted = self.nested(node, |this| {
            let value = match expr_node.kind() {
                "expression_list" | "pattern_list" => this.nested(expr_node, |inner| {
                    Ok(Located::new(
                        ExprKind::Tuple {
                            elts: inner.lower_exprs(&named_children(expr_node))?,
                            ctx: ExprContext::Load,
                        },
                        inner.location(expr_node),
                    ))
                })?,
                _ => this.lower_expr(expr_node)?,
            };
            let format_spec = match spec_node {
                Some(spec) => Some(Box::new(this.lower_format_spec(spec)?)),
                None => None,
            };
            Ok(Located::new(
                ExprKind::FormattedValue {
                    value: Box::new(value),
                    conversion,
                    format_spec,
                },
                this.location(node),
            ))
        })?;
        pieces.push(StrPiece::Value(formatted));
        Ok(())
    }

    fn lower_format_spec(&mut self, spec: TsNode) -> Result<Expr> {
        self.nested(spec, |this| {
            let mut pieces = Vec::new();
            let mut cursor = spec.start_byte() + 1;
            for child in named_children(spec) {
                if !matches!(child.kind(), "format_expression" | "interpolation") {
                    continue;
                }
                let literal = &this.source[cursor..child.start_byte()];
                let decoded = decode_fstring_segment(literal, false).map_err(|e| this.error(spec, e))?;
                pieces.push(StrPiece::Literal(decoded, this.byte_span(cursor, child.start_byte())));
                this.lower_interpolation(child, &mut pieces)?;
                cursor = child.end_byte();
            }
            if cursor < spec.end_byte() {
                let literal = &this.source[cursor..spec.end_byte()];
                let decoded = decode_fstring_segment(literal, false).map_err(|e| this.error(spec, e))?;
                pieces.push(StrPiece::Literal(decoded, this.byte_span(cursor, spec.end_byte())));
            }
            let location = this.location(spec);
            Ok(Located::new(
                ExprKind::JoinedStr {
                    values: merge_pieces(pieces),
                },
                location,
            ))
        })
    }
}

fn constant_kind(value: ConstantValue) -> ExprKind {
    ExprKind::Constant { value, kind: None }
}

/// Joins adjacent literal pieces and drops empty ones, as CPython does. A
/// merged constant spans its first through last literal piece.
fn merge_pieces(pieces: Vec<StrPiece>) -> Vec<Expr> {
    let mut values = Vec::new();
    let mut literal = String::new();
    let mut span: Option<Location> = None;
    let flush = |values: &mut Vec<Expr>, literal: &mut String, span: &mut Option<Location>| {
        if !literal.is_empty() {
            values.push(Expr::constant(
                ConstantValue::Str(std::mem::take(literal)),
                span.take(),
            ));
        }
    };
    for piece in pieces {
        match piece {
            StrPiece::Literal(text, location) => {
                if text.is_empty() {
                    continue;
                }
                literal.push_str(&text);
                span = Some(match span {
                    Some(start) => Location {
                        end_lineno: location.end_lineno,
                        end_col_offset: location.end_col_offset,
                        ..start
                    },
                    None => location,
                });
            }
            StrPiece::Value(expr) => {
                flush(&mut values, &mut literal, &mut span);
                values.push(expr);
            }
        }
    }
    flush(&mut values, &mut literal, &mut span);
    values
}
