//! Front end: Python source text to the crate's own tree.
//!
//! Parsing is delegated to `ruff_python_parser`; this module lowers ruff's AST into
//! [`Node`]/[`ExprLoc`], interning every identifier and string literal on the way. Host
//! constructs the rewrite has no rules for (async, generators, walrus, f-strings, `match`,
//! type parameters) are rejected here with [`ParseError::NotImplemented`] rather than being
//! carried through and silently mishandled later.

use std::{borrow::Cow, fmt};

use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ElifElseClause, Expr as AstExpr, Number, Operator as AstOperator,
    ParameterWithDefault, Stmt, UnaryOp,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    expressions::{
        BoolOperator, ClassDef, CmpOperator, Comprehension, DictItem, ExceptHandler, Expr, ExprContext, ExprLoc,
        FunctionDef, ImportAlias, Keyword, Literal, Node, Operator, Param, Parameters, Symbol, Try, UnaryOperator,
        WithItem,
    },
    intern::InternerBuilder,
};

/// Maximum nesting depth for AST structures during parsing.
/// Matches CPython's limit of ~200 for nested parentheses.
/// This prevents stack overflow from deeply nested structures like `((((x,),),),)`,
/// both here and in the recursive rewrite and printer that walk the same tree.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// In debug builds, we use a lower limit because stack frames are much larger
/// (no inlining, debug info, etc.).
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// Result of parsing one unit: the statements and the interner that owns their names.
#[derive(Debug)]
pub struct ParseResult {
    pub nodes: Vec<Node>,
    pub interner: InternerBuilder,
}

/// Parses Python source into the crate's tree.
pub fn parse(code: &str) -> Result<ParseResult, ParseError> {
    let mut parser = Parser::new(code);
    let parsed = parse_module(code).map_err(|e| ParseError::syntax(e.to_string(), parser.convert_range(e.range())))?;
    let module = parsed.into_syntax();
    let nodes = parser.parse_statements(module.body)?;
    Ok(ParseResult {
        nodes,
        interner: parser.interner,
    })
}

/// Converts ruff's AST into [`Node`]s, owning the interner for the unit.
struct Parser<'a> {
    /// Byte offset at which each line starts, to convert offsets to line/column.
    line_starts: Vec<usize>,
    code: &'a str,
    interner: InternerBuilder,
    /// Remaining nesting depth budget for recursive structures.
    /// Starts at MAX_NESTING_DEPTH and decrements on each nested level.
    depth_remaining: u16,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(code.char_indices().filter(|(_, c)| *c == '\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            line_starts,
            code,
            interner: InternerBuilder::new(code),
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }

    fn parse_statements(&mut self, statements: Vec<Stmt>) -> Result<Vec<Node>, ParseError> {
        statements.into_iter().map(|s| self.parse_statement(s)).collect()
    }

    /// Lowers `elif`/`else` clauses into a nested `if` in the `else` branch.
    ///
    /// Each `elif` becomes one more level of nesting, so each is charged against the depth
    /// budget.
    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<Node>, ParseError> {
        let Some(first) = clauses.first() else {
            return Ok(Vec::new());
        };
        let position = self.convert_range(first.range);
        let elifs = clauses.iter().filter(|clause| clause.test.is_some()).count();
        let reserved = self.reserve_depth(elifs, position)?;
        let result = self.parse_elif_chain(clauses);
        self.depth_remaining += reserved;
        result
    }

    fn parse_elif_chain(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<Node>, ParseError> {
        let mut tail: Vec<Node> = Vec::new();
        for clause in clauses.into_iter().rev() {
            match clause.test {
                Some(test) => {
                    let position = self.convert_range(clause.range);
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body)?;
                    tail = vec![Node::If {
                        test,
                        body,
                        or_else: tail,
                        position,
                    }];
                }
                None => {
                    tail = self.parse_statements(clause.body)?;
                }
            }
        }
        Ok(tail)
    }

    /// Parses an exception handler (except clause).
    fn parse_except_handler(&mut self, handler: ast::ExceptHandler) -> Result<ExceptHandler, ParseError> {
        let ast::ExceptHandler::ExceptHandler(h) = handler;
        let exc_type = h.type_.map(|expr| self.parse_expression(*expr)).transpose()?;
        let name = h.name.map(|n| Symbol::User(self.interner.intern(n.as_str())));
        let body = self.parse_statements(h.body)?;
        Ok(ExceptHandler {
            exc_type,
            name,
            body,
            position: self.convert_range(h.range),
        })
    }

    fn parse_statement(&mut self, statement: Stmt) -> Result<Node, ParseError> {
        self.decr_depth_remaining(|| statement.range())?;
        let result = self.parse_statement_impl(statement);
        self.depth_remaining += 1;
        result
    }

    fn parse_statement_impl(&mut self, statement: Stmt) -> Result<Node, ParseError> {
        match statement {
            Stmt::FunctionDef(function) => {
                let position = self.convert_range(function.range);
                if function.is_async {
                    return Err(ParseError::not_implemented("async functions", position));
                }
                if function.type_params.is_some() {
                    return Err(ParseError::not_implemented("type parameter lists", position));
                }
                let parameters = self.parse_parameters(&function.parameters)?;
                let name = Symbol::User(self.interner.intern(function.name.as_str()));
                let decorators = function
                    .decorator_list
                    .into_iter()
                    .map(|d| self.parse_expression(d.expression))
                    .collect::<Result<Vec<_>, _>>()?;
                let body = self.parse_statements(function.body)?;
                Ok(Node::FunctionDef(Box::new(FunctionDef {
                    name,
                    parameters,
                    body,
                    decorators,
                    position,
                })))
            }
            Stmt::ClassDef(c) => {
                let position = self.convert_range(c.range);
                if c.type_params.is_some() {
                    return Err(ParseError::not_implemented("type parameter lists", position));
                }
                let name = Symbol::User(self.interner.intern(c.name.as_str()));
                let decorators = c
                    .decorator_list
                    .into_iter()
                    .map(|d| self.parse_expression(d.expression))
                    .collect::<Result<Vec<_>, _>>()?;
                let (bases, keywords) = if let Some(ref arguments) = c.arguments {
                    let bases = arguments
                        .args
                        .iter()
                        .map(|arg| self.parse_expression(arg.clone()))
                        .collect::<Result<Vec<_>, _>>()?;
                    let keywords = self.parse_keywords(arguments.keywords.clone().into_vec())?;
                    (bases, keywords)
                } else {
                    (Vec::new(), Vec::new())
                };
                let body = self.parse_statements(c.body)?;
                Ok(Node::ClassDef(Box::new(ClassDef {
                    name,
                    bases,
                    keywords,
                    body,
                    decorators,
                    position,
                })))
            }
            Stmt::Return(ast::StmtReturn { value, range, .. }) => Ok(Node::Return {
                value: value.map(|v| self.parse_expression(*v)).transpose()?,
                position: self.convert_range(range),
            }),
            Stmt::Delete(ast::StmtDelete { targets, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_expression(t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Delete(targets))
            }
            Stmt::Assign(ast::StmtAssign {
                targets, value, range, ..
            }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_expression(t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Node::Assign {
                    targets,
                    value: self.parse_expression(*value)?,
                    position: self.convert_range(range),
                })
            }
            Stmt::AugAssign(ast::StmtAugAssign {
                target,
                op,
                value,
                range,
                ..
            }) => Ok(Node::AugAssign {
                target: self.parse_expression(*target)?,
                op: convert_op(op),
                value: self.parse_expression(*value)?,
                position: self.convert_range(range),
            }),
            Stmt::AnnAssign(ast::StmtAnnAssign {
                target, value, range, ..
            }) => {
                // the annotation is dropped; only the binding survives
                let position = self.convert_range(range);
                let Some(value) = value else {
                    return Err(ParseError::not_implemented(
                        "annotated declarations without a value",
                        position,
                    ));
                };
                Ok(Node::Assign {
                    targets: vec![self.parse_expression(*target)?],
                    value: self.parse_expression(*value)?,
                    position,
                })
            }
            Stmt::TypeAlias(t) => Err(ParseError::not_implemented(
                "type alias statements",
                self.convert_range(t.range),
            )),
            Stmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                range,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_implemented(
                        "async for loops",
                        self.convert_range(range),
                    ));
                }
                Ok(Node::For {
                    target: self.parse_expression(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body)?,
                    or_else: self.parse_statements(orelse)?,
                })
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Ok(Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body)?,
                or_else: self.parse_statements(orelse)?,
            }),
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                range,
                ..
            }) => {
                let position = self.convert_range(range);
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body)?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Ok(Node::If {
                    test,
                    body,
                    or_else,
                    position,
                })
            }
            Stmt::With(ast::StmtWith {
                is_async,
                items,
                body,
                range,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_implemented(
                        "async with statements",
                        self.convert_range(range),
                    ));
                }
                let items = items
                    .into_iter()
                    .map(|item| {
                        Ok(WithItem {
                            context_expr: self.parse_expression(item.context_expr)?,
                            optional_vars: item.optional_vars.map(|v| self.parse_expression(*v)).transpose()?,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Ok(Node::With {
                    items,
                    body: self.parse_statements(body)?,
                })
            }
            Stmt::Match(m) => Err(ParseError::not_implemented(
                "match statements",
                self.convert_range(m.range),
            )),
            Stmt::Raise(ast::StmtRaise { exc, cause, .. }) => Ok(Node::Raise {
                exc: exc.map(|e| self.parse_expression(*e)).transpose()?,
                cause: cause.map(|e| self.parse_expression(*e)).transpose()?,
            }),
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
                range,
                ..
            }) => {
                if is_star {
                    return Err(ParseError::not_implemented("except* clauses", self.convert_range(range)));
                }
                let body = self.parse_statements(body)?;
                let handlers = handlers
                    .into_iter()
                    .map(|h| self.parse_except_handler(h))
                    .collect::<Result<Vec<_>, _>>()?;
                let or_else = self.parse_statements(orelse)?;
                let finally = self.parse_statements(finalbody)?;
                Ok(Node::Try(Try {
                    body,
                    handlers,
                    or_else,
                    finally,
                }))
            }
            Stmt::Assert(ast::StmtAssert { test, msg, .. }) => Ok(Node::Assert {
                test: self.parse_expression(*test)?,
                msg: msg.map(|m| self.parse_expression(*m)).transpose()?,
            }),
            Stmt::Import(ast::StmtImport { names, range, .. }) => {
                let names = names
                    .iter()
                    .map(|alias| {
                        let name = alias.name.as_str();
                        // `import pkg.mod` binds `pkg`, `import pkg.mod as m` binds `m`
                        let binding = match &alias.asname {
                            Some(asname) => asname.as_str(),
                            None => name.split('.').next().unwrap_or(name),
                        };
                        ImportAlias {
                            name: self.interner.intern(name),
                            asname: alias.asname.as_ref().map(|a| self.interner.intern(a.as_str())),
                            binding: Some(self.interner.intern(binding)),
                        }
                    })
                    .collect();
                Ok(Node::Import {
                    names,
                    position: self.convert_range(range),
                })
            }
            Stmt::ImportFrom(ast::StmtImportFrom {
                module,
                names,
                level,
                range,
                ..
            }) => {
                let module = module.map(|m| self.interner.intern(m.as_str()));
                let names = names
                    .iter()
                    .map(|alias| {
                        let name = alias.name.as_str();
                        let binding = match &alias.asname {
                            Some(asname) => Some(asname.as_str()),
                            None if name == "*" => None,
                            None => Some(name),
                        };
                        ImportAlias {
                            name: self.interner.intern(name),
                            asname: alias.asname.as_ref().map(|a| self.interner.intern(a.as_str())),
                            binding: binding.map(|b| self.interner.intern(b)),
                        }
                    })
                    .collect();
                Ok(Node::ImportFrom {
                    module,
                    names,
                    level,
                    position: self.convert_range(range),
                })
            }
            Stmt::Global(ast::StmtGlobal { names, range, .. }) => {
                let names = names.iter().map(|id| self.interner.intern(&self.code[id.range])).collect();
                Ok(Node::Global {
                    names,
                    position: self.convert_range(range),
                })
            }
            Stmt::Nonlocal(ast::StmtNonlocal { names, range, .. }) => {
                let names = names.iter().map(|id| self.interner.intern(&self.code[id.range])).collect();
                Ok(Node::Nonlocal {
                    names,
                    position: self.convert_range(range),
                })
            }
            Stmt::Expr(ast::StmtExpr { value, .. }) => self.parse_expression(*value).map(Node::Expr),
            Stmt::Pass(_) => Ok(Node::Pass),
            Stmt::Break(b) => Ok(Node::Break {
                position: self.convert_range(b.range),
            }),
            Stmt::Continue(c) => Ok(Node::Continue {
                position: self.convert_range(c.range),
            }),
            Stmt::IpyEscapeCommand(i) => Err(ParseError::not_implemented(
                "IPython escape commands",
                self.convert_range(i.range),
            )),
        }
    }

    fn parse_expression(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        self.decr_depth_remaining(|| expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_boxed(&mut self, expression: AstExpr) -> Result<Box<ExprLoc>, ParseError> {
        self.parse_expression(expression).map(Box::new)
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        let position = self.convert_range(expression.range());
        let expr = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                // the rewrite folds the operands into a right-nested chain of calls
                let reserved = self.reserve_depth(values.len().saturating_sub(1), position)?;
                let values = self.parse_expressions(values);
                self.depth_remaining += reserved;
                Expr::BoolOp {
                    op: convert_bool_op(op),
                    values: values?,
                }
            }
            AstExpr::Named(_) => return Err(ParseError::not_implemented("assignment expressions", position)),
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Expr::BinOp {
                left: self.parse_boxed(*left)?,
                op: convert_op(op),
                right: self.parse_boxed(*right)?,
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = self.parse_boxed(*operand)?;
                match op {
                    UnaryOp::Not => Expr::Not(operand),
                    UnaryOp::USub => Expr::UnaryOp {
                        op: UnaryOperator::Neg,
                        operand,
                    },
                    UnaryOp::UAdd => Expr::UnaryOp {
                        op: UnaryOperator::Pos,
                        operand,
                    },
                    UnaryOp::Invert => Expr::UnaryOp {
                        op: UnaryOperator::Invert,
                        operand,
                    },
                }
            }
            AstExpr::Lambda(ast::ExprLambda { parameters, body, .. }) => {
                let parameters = match parameters {
                    Some(params) => self.parse_parameters(&params)?,
                    // No parameters (e.g., `lambda: 42`)
                    None => Parameters::default(),
                };
                Expr::Lambda {
                    parameters: Box::new(parameters),
                    body: self.parse_boxed(*body)?,
                }
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Expr::IfElse {
                test: self.parse_boxed(*test)?,
                body: self.parse_boxed(*body)?,
                or_else: self.parse_boxed(*orelse)?,
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let items = items
                    .into_iter()
                    .map(|ast::DictItem { key, value }| {
                        Ok(DictItem {
                            key: key.map(|k| self.parse_expression(k)).transpose()?,
                            value: self.parse_expression(value)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Expr::Dict(items)
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => Expr::Set(self.parse_expressions(elts)?),
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. }) => Expr::ListComp {
                elt: self.parse_boxed(*elt)?,
                generators: self.parse_comprehension_generators(generators)?,
            },
            AstExpr::SetComp(ast::ExprSetComp { elt, generators, .. }) => Expr::SetComp {
                elt: self.parse_boxed(*elt)?,
                generators: self.parse_comprehension_generators(generators)?,
            },
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, ..
            }) => Expr::DictComp {
                key: self.parse_boxed(*key)?,
                value: self.parse_boxed(*value)?,
                generators: self.parse_comprehension_generators(generators)?,
            },
            AstExpr::Generator(ast::ExprGenerator { elt, generators, .. }) => Expr::GeneratorExp {
                elt: self.parse_boxed(*elt)?,
                generators: self.parse_comprehension_generators(generators)?,
            },
            AstExpr::Await(_) => return Err(ParseError::not_implemented("await expressions", position)),
            AstExpr::Yield(_) | AstExpr::YieldFrom(_) => {
                return Err(ParseError::not_implemented("generator functions (yield)", position));
            }
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => {
                let left = self.parse_boxed(*left)?;
                let comparisons = ops
                    .into_vec()
                    .into_iter()
                    .zip(comparators.into_vec())
                    .map(|(op, right)| Ok((convert_compare_op(op), self.parse_expression(right)?)))
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Expr::Compare { left, comparisons }
            }
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let ast::Arguments { args, keywords, .. } = arguments;
                Expr::Call {
                    func: self.parse_boxed(*func)?,
                    args: self.parse_expressions(args.into_vec())?,
                    keywords: self.parse_keywords(keywords.into_vec())?,
                }
            }
            AstExpr::FString(_) => return Err(ParseError::not_implemented("f-strings", position)),
            AstExpr::TString(_) => return Err(ParseError::not_implemented("template strings (t-strings)", position)),
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Expr::Literal(Literal::Str(self.interner.intern(&value.to_string())))
            }
            AstExpr::BytesLiteral(ast::ExprBytesLiteral { value, .. }) => {
                let bytes: Cow<'_, [u8]> = Cow::from(&value);
                Expr::Literal(Literal::Bytes(self.interner.intern_bytes(&bytes)))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => Expr::Literal(match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => Literal::Int(i),
                    // too large for i64, keep the source spelling
                    None => Literal::LongInt(self.interner.intern(&i.to_string())),
                },
                Number::Float(f) => Literal::Float(f),
                Number::Complex { imag, .. } => Literal::Imag(imag),
            }),
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Expr::Literal(Literal::Bool(value)),
            AstExpr::NoneLiteral(_) => Expr::Literal(Literal::None),
            AstExpr::EllipsisLiteral(_) => Expr::Literal(Literal::Ellipsis),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, ctx, .. }) => Expr::Attribute {
                object: self.parse_boxed(*value)?,
                attr: self.interner.intern(attr.as_str()),
                ctx: convert_ctx(ctx),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, ctx, .. }) => Expr::Subscript {
                object: self.parse_boxed(*value)?,
                index: self.parse_boxed(*slice)?,
                ctx: convert_ctx(ctx),
            },
            AstExpr::Starred(ast::ExprStarred { value, ctx, .. }) => Expr::Starred {
                value: self.parse_boxed(*value)?,
                ctx: convert_ctx(ctx),
            },
            AstExpr::Name(ast::ExprName { id, ctx, .. }) => Expr::Name {
                symbol: Symbol::User(self.interner.intern(&id)),
                ctx: convert_ctx(ctx),
            },
            AstExpr::List(ast::ExprList { elts, ctx, .. }) => Expr::List {
                elts: self.parse_expressions(elts)?,
                ctx: convert_ctx(ctx),
            },
            AstExpr::Tuple(ast::ExprTuple { elts, ctx, .. }) => Expr::Tuple {
                elts: self.parse_expressions(elts)?,
                ctx: convert_ctx(ctx),
            },
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => Expr::Slice {
                lower: lower.map(|e| self.parse_boxed(*e)).transpose()?,
                upper: upper.map(|e| self.parse_boxed(*e)).transpose()?,
                step: step.map(|e| self.parse_boxed(*e)).transpose()?,
            },
            AstExpr::IpyEscapeCommand(_) => {
                return Err(ParseError::not_implemented("IPython escape commands", position));
            }
        };
        Ok(ExprLoc::new(position, expr))
    }

    fn parse_expressions(&mut self, expressions: Vec<AstExpr>) -> Result<Vec<ExprLoc>, ParseError> {
        expressions.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    /// Parses keyword arguments; `**expr` unpacking becomes a keyword without a name.
    fn parse_keywords(&mut self, keywords: Vec<ast::Keyword>) -> Result<Vec<Keyword>, ParseError> {
        keywords
            .into_iter()
            .map(|kwarg| {
                Ok(Keyword {
                    arg: kwarg.arg.map(|key| self.interner.intern(key.as_str())),
                    value: self.parse_expression(kwarg.value)?,
                })
            })
            .collect()
    }

    fn parse_parameters(&mut self, params: &ast::Parameters) -> Result<Parameters, ParseError> {
        Ok(Parameters {
            posonly: self.parse_params_with_defaults(&params.posonlyargs)?,
            args: self.parse_params_with_defaults(&params.args)?,
            vararg: params
                .vararg
                .as_ref()
                .map(|p| Symbol::User(self.interner.intern(p.name.as_str()))),
            kwonly: self.parse_params_with_defaults(&params.kwonlyargs)?,
            kwarg: params
                .kwarg
                .as_ref()
                .map(|p| Symbol::User(self.interner.intern(p.name.as_str()))),
        })
    }

    fn parse_params_with_defaults(&mut self, params: &[ParameterWithDefault]) -> Result<Vec<Param>, ParseError> {
        params
            .iter()
            .map(|p| {
                let name = Symbol::User(self.interner.intern(p.parameter.name.as_str()));
                let default = match &p.default {
                    Some(expr) => Some(self.parse_expression((**expr).clone())?),
                    None => None,
                };
                Ok(Param { name, default })
            })
            .collect()
    }

    /// Parses comprehension generators (the `for ... in ... if ...` clauses).
    ///
    /// All clauses are kept; whether the rewrite accepts them is decided later.
    fn parse_comprehension_generators(
        &mut self,
        generators: Vec<ast::Comprehension>,
    ) -> Result<Vec<Comprehension>, ParseError> {
        generators
            .into_iter()
            .map(|comp| {
                if comp.is_async {
                    return Err(ParseError::not_implemented(
                        "async comprehensions",
                        self.convert_range(comp.range),
                    ));
                }
                Ok(Comprehension {
                    target: self.parse_expression(comp.target)?,
                    iter: self.parse_expression(comp.iter)?,
                    ifs: self.parse_expressions(comp.ifs)?,
                })
            })
            .collect()
    }

    fn convert_range(&self, range: TextRange) -> CodeRange {
        CodeRange::new(
            self.index_to_position(range.start().into()),
            self.index_to_position(range.end().into()),
        )
    }

    /// Converts a byte offset into a 1-based line and character column.
    fn index_to_position(&self, index: usize) -> CodeLoc {
        let line = self.line_starts.partition_point(|start| *start <= index).max(1);
        let line_start = self.line_starts[line - 1];
        let column = self.code.get(line_start..index).map_or(0, |s| s.chars().count());
        CodeLoc::new(line, column + 1)
    }

    /// Decrements the depth remaining for nested structures.
    /// Returns an error if the depth remaining goes to zero.
    /// Takes `levels` from the depth budget for a flat construct the rewrite nests; the
    /// caller returns the reserved levels once the construct is parsed.
    fn reserve_depth(&mut self, levels: usize, position: CodeRange) -> Result<u16, ParseError> {
        let reserved = u16::try_from(levels)
            .ok()
            .and_then(|levels| Some((levels, self.depth_remaining.checked_sub(levels)?)));
        match reserved {
            Some((levels, remaining)) => {
                self.depth_remaining = remaining;
                Ok(levels)
            }
            None => Err(ParseError::syntax(
                "too many chained `and`/`or` operands or `elif` clauses",
                position,
            )),
        }
    }

    fn decr_depth_remaining(&mut self, get_range: impl FnOnce() -> TextRange) -> Result<(), ParseError> {
        if let Some(depth_remaining) = self.depth_remaining.checked_sub(1) {
            self.depth_remaining = depth_remaining;
            Ok(())
        } else {
            let position = self.convert_range(get_range());
            Err(ParseError::syntax("too many nested parentheses", position))
        }
    }
}

fn convert_ctx(ctx: ast::ExprContext) -> ExprContext {
    match ctx {
        ast::ExprContext::Load | ast::ExprContext::Invalid => ExprContext::Load,
        ast::ExprContext::Store => ExprContext::Store,
        ast::ExprContext::Del => ExprContext::Del,
    }
}

fn convert_op(op: AstOperator) -> Operator {
    match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::MatMult => Operator::MatMult,
        AstOperator::Div => Operator::Div,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::FloorDiv => Operator::FloorDiv,
    }
}

fn convert_bool_op(op: BoolOp) -> BoolOperator {
    match op {
        BoolOp::And => BoolOperator::And,
        BoolOp::Or => BoolOperator::Or,
    }
}

fn convert_compare_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// A 1-based line and column in the unit's source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line: u32::try_from(line).expect("line number exceeds u32"),
            column: u32::try_from(column).expect("column number exceeds u32"),
        }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source range of a node.
///
/// Synthesized nodes reuse the range of the source node they were derived from, so errors
/// and trace events always point at something the user wrote.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeRange {
    start: CodeLoc,
    end: CodeLoc,
}

/// Custom Debug implementation to make displaying code much less verbose.
impl fmt::Debug for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeRange{{{}-{}}}", self.start, self.end)
    }
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.start.fmt(f)
    }
}

impl CodeRange {
    #[must_use]
    pub const fn new(start: CodeLoc, end: CodeLoc) -> Self {
        Self { start, end }
    }

    /// Returns the start position.
    #[must_use]
    pub fn start(&self) -> CodeLoc {
        self.start
    }

    /// Returns the end position.
    #[must_use]
    pub fn end(&self) -> CodeLoc {
        self.end
    }
}

/// Errors raised while turning source text into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Error in syntax, reported by the ruff parser or by the nesting limit.
    Syntax {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
    /// Valid Python the pass has no rewrite for.
    /// Message gets prefixed with "facetrans does not support ".
    NotImplemented {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
}

impl ParseError {
    pub(crate) fn not_implemented(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::NotImplemented {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Syntax {
            msg: msg.into(),
            position,
        }
    }

    #[must_use]
    pub fn position(&self) -> CodeRange {
        match self {
            Self::Syntax { position, .. } | Self::NotImplemented { position, .. } => *position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { msg, position } => write!(f, "{position}: SyntaxError: {msg}"),
            Self::NotImplemented { msg, position } => write!(f, "{position}: facetrans does not support {msg}"),
        }
    }
}

impl std::error::Error for ParseError {}
