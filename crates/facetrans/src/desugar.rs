//! The tree rewriter.
//!
//! [`Desugarer`] walks one unit (a function or a whole module) and replaces every construct
//! that would branch on, combine or mutate a value natively with an explicit call into the
//! runtime library. Function locals move into a per-activation namespace object so that
//! branch thunks and nested functions mutate shared storage instead of shadowing it.
//!
//! Statements rewrite to a sequence of statements (an `if` becomes two definitions and a
//! call, an assignment gains temporaries), expressions rewrite to one expression. The
//! [`ScopeContext`] is passed down by reference and extended by copy at every scope boundary.

use std::borrow::Cow;

use crate::{
    config::DesugarOptions,
    error::{DesugarError, UnsupportedConstruct},
    expressions::{
        BoolOperator, ClassDef, CmpOperator, Comprehension, DictItem, ExceptHandler, Expr, ExprContext, ExprLoc,
        FunctionDef, HostStore, ImportAlias, Keyword, Literal, Node, Operator, Param, Parameters, Symbol, Try, WithItem,
    },
    fresh::{FreshNames, FreshSymbol, SymbolKind},
    intern::{InternerBuilder, StringId},
    lhs::{self, SplitTarget},
    parse::CodeRange,
    runtime::RuntimeFn,
    scope::{self, Binding, FrameKind, FunctionScope, ScopeContext},
    tracer::{Rule, RewriteTracer, ScopeReport},
};

/// Unit name reported to tracers when a whole module is rewritten.
pub const MODULE_UNIT: &str = "<module>";

/// Rewrites units of one parsed source.
///
/// All units rewritten by the same `Desugarer` share its [`FreshNames`], so their
/// synthesized names never collide when they end up in the same output module.
#[derive(Debug)]
pub struct Desugarer<'a, Tr: RewriteTracer> {
    interner: &'a InternerBuilder,
    fresh: FreshNames,
    tracer: &'a mut Tr,
    /// The first segment of the runtime module path, if the source ever mentions it.
    runtime_root: Option<StringId>,
}

impl<'a, Tr: RewriteTracer> Desugarer<'a, Tr> {
    pub fn new(interner: &'a InternerBuilder, options: &DesugarOptions, tracer: &'a mut Tr) -> Self {
        Self {
            interner,
            fresh: FreshNames::new(&options.symbol_prefix, interner, &options.runtime),
            tracer,
            runtime_root: interner.try_get_str_id(options.runtime.module_root()),
        }
    }

    /// Rewrites one marked function as a unit.
    ///
    /// The function is treated as defined at module level: its own name stays a host name
    /// and is not published anywhere.
    pub fn desugar_function(&mut self, def: FunctionDef) -> Result<FunctionDef, DesugarError> {
        let unit = self.symbol_text(def.name);
        self.tracer.on_unit_start(&unit);
        let result = self.rewrite_function(def, &ScopeContext::module());
        self.finish_unit(&unit, result)
    }

    /// Rewrites a whole module as one unit. Module-level names stay host names.
    pub fn desugar_module(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>, DesugarError> {
        self.tracer.on_unit_start(MODULE_UNIT);
        let result = self.rewrite_body(nodes, &ScopeContext::module());
        self.finish_unit(MODULE_UNIT, result)
    }

    /// Consumes the rewriter, returning the symbol table needed to print the output.
    #[must_use]
    pub fn into_symbols(self) -> FreshNames {
        self.fresh
    }

    fn finish_unit<T>(&mut self, unit: &str, result: Result<T, DesugarError>) -> Result<T, DesugarError> {
        match &result {
            Ok(_) => self.tracer.on_unit_end(unit, self.fresh.generated()),
            Err(e) => {
                if let Some(construct) = e.construct() {
                    self.tracer.on_rejected(construct, e.position());
                }
            }
        }
        result
    }

    fn fresh_symbol(&mut self, kind: SymbolKind) -> FreshSymbol {
        let symbol = self.fresh.next(kind);
        let rendered = self.fresh.render(symbol).to_string();
        self.tracer.on_fresh_symbol(&rendered, kind);
        symbol
    }

    fn symbol_text(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::User(id) => self.interner.get_str(id).to_owned(),
            Symbol::Fresh(fresh) => self.fresh.render(fresh).to_string(),
        }
    }

    /// Fails when user code binds the name the output relies on to reach the runtime.
    fn check_binding(&self, name: StringId, position: CodeRange) -> Result<(), DesugarError> {
        if self.runtime_root == Some(name) {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::RuntimeAliasShadowed,
                position,
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn rewrite_body(&mut self, body: Vec<Node>, ctx: &ScopeContext) -> Result<Vec<Node>, DesugarError> {
        let mut out = Vec::with_capacity(body.len());
        for node in body {
            self.rewrite_statement(node, ctx, &mut out)?;
        }
        Ok(out)
    }

    fn rewrite_statement(&mut self, node: Node, ctx: &ScopeContext, out: &mut Vec<Node>) -> Result<(), DesugarError> {
        match node {
            Node::Pass | Node::Break { .. } | Node::Continue { .. } | Node::Global { .. } => out.push(node),
            Node::Expr(expr) => out.push(Node::Expr(self.rewrite_expr(expr, ctx)?)),
            Node::Return { value, position } => out.push(Node::Return {
                value: self.rewrite_opt(value, ctx)?,
                position,
            }),
            Node::Assign {
                mut targets,
                value,
                position,
            } => {
                if targets.len() != 1 {
                    return Err(DesugarError::unsupported(
                        UnsupportedConstruct::MultiTargetAssignment,
                        position,
                    ));
                }
                let target = targets.remove(0);
                if matches!(
                    target.expr,
                    Expr::Tuple { .. } | Expr::List { .. } | Expr::Starred { .. }
                ) {
                    return Err(DesugarError::unsupported(
                        UnsupportedConstruct::DestructuringAssignment,
                        target.position,
                    ));
                }
                self.rewrite_assignment(target, None, value, position, ctx, out)?;
            }
            Node::AugAssign {
                target,
                op,
                value,
                position,
            } => self.rewrite_assignment(target, Some(op), value, position, ctx, out)?,
            Node::Delete(targets) => out.push(Node::Delete(self.rewrite_exprs(targets, ctx)?)),
            Node::If {
                test,
                body,
                or_else,
                position,
            } => self.rewrite_if(test, body, or_else, position, ctx, out)?,
            Node::While { test, body, or_else } => out.push(Node::While {
                test: self.rewrite_expr(test, ctx)?,
                body: self.rewrite_body(body, ctx)?,
                or_else: self.rewrite_body(or_else, ctx)?,
            }),
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => {
                let iter = self.rewrite_expr(iter, ctx)?;
                out.push(Node::For {
                    target: self.rewrite_expr(target, ctx)?,
                    iter,
                    body: self.rewrite_body(body, ctx)?,
                    or_else: self.rewrite_body(or_else, ctx)?,
                });
            }
            Node::With { items, body } => {
                let items = items
                    .into_iter()
                    .map(|item| {
                        Ok(WithItem {
                            context_expr: self.rewrite_expr(item.context_expr, ctx)?,
                            optional_vars: self.rewrite_opt(item.optional_vars, ctx)?,
                        })
                    })
                    .collect::<Result<_, DesugarError>>()?;
                out.push(Node::With {
                    items,
                    body: self.rewrite_body(body, ctx)?,
                });
            }
            Node::Raise { exc, cause } => out.push(Node::Raise {
                exc: self.rewrite_opt(exc, ctx)?,
                cause: self.rewrite_opt(cause, ctx)?,
            }),
            Node::Try(t) => out.push(Node::Try(self.rewrite_try(t, ctx)?)),
            Node::Assert { test, msg } => out.push(Node::Assert {
                test: self.rewrite_expr(test, ctx)?,
                msg: self.rewrite_opt(msg, ctx)?,
            }),
            Node::FunctionDef(def) => {
                let (name, position) = (def.name, def.position);
                let def = self.rewrite_function(*def, ctx)?;
                out.push(Node::FunctionDef(Box::new(def)));
                self.publish(name, position, ctx, out);
            }
            Node::ClassDef(class) => {
                let (name, position) = (class.name, class.position);
                let class = self.rewrite_class(*class, ctx)?;
                out.push(Node::ClassDef(Box::new(class)));
                self.publish(name, position, ctx, out);
            }
            Node::Import { names, position } => {
                self.check_import_bindings(&names, true, position)?;
                let bindings = import_bindings(&names);
                out.push(Node::Import { names, position });
                for name in bindings {
                    self.publish(Symbol::User(name), position, ctx, out);
                }
            }
            Node::ImportFrom {
                module,
                names,
                level,
                position,
            } => {
                self.check_import_bindings(&names, false, position)?;
                let bindings = import_bindings(&names);
                out.push(Node::ImportFrom {
                    module,
                    names,
                    level,
                    position,
                });
                for name in bindings {
                    self.publish(Symbol::User(name), position, ctx, out);
                }
            }
            Node::Nonlocal { names, position } => {
                let kept: Vec<StringId> = names
                    .iter()
                    .copied()
                    .filter(|name| ctx.namespace_of(*name).is_none())
                    .collect();
                if kept.len() != names.len() {
                    self.tracer.on_rule(Rule::NonlocalDropped, position);
                }
                if !kept.is_empty() {
                    out.push(Node::Nonlocal { names: kept, position });
                }
            }
        }
        Ok(())
    }

    /// `import <runtime module>` without an alias is the one way user code may bind the
    /// runtime root; any other binding of it would redirect every emitted call.
    fn check_import_bindings(
        &self,
        names: &[ImportAlias],
        plain_import: bool,
        position: CodeRange,
    ) -> Result<(), DesugarError> {
        for alias in names {
            let Some(binding) = alias.binding else { continue };
            if plain_import && alias.asname.is_none() {
                continue;
            }
            self.check_binding(binding, position)?;
        }
        Ok(())
    }

    /// Copies a host binding just created by `def`, `class` or `import` into the namespace
    /// that owns the name, if any.
    fn publish(&mut self, name: Symbol, position: CodeRange, ctx: &ScopeContext, out: &mut Vec<Node>) {
        let Symbol::User(id) = name else { return };
        let Some(ns) = ctx.namespace_of(id) else { return };
        self.tracer.on_rule(Rule::Publication, position);
        let field = ExprLoc::attribute(
            position,
            ExprLoc::name(position, ns, ExprContext::Load),
            id,
            ExprContext::Store,
        );
        out.push(Node::assign(field, ExprLoc::name(position, id, ExprContext::Load)));
    }

    /// Assignment and augmented assignment.
    ///
    /// The target is split into temporaries and assigned through the runtime:
    /// `target = assign(read, value)`, or `target = assign(read, read op value)`. A plain
    /// assignment to a module or class name reads the old value without failing while the
    /// name is still unbound. Only the pass's own temporaries are assigned natively.
    fn rewrite_assignment(
        &mut self,
        target: ExprLoc,
        op: Option<Operator>,
        value: ExprLoc,
        position: CodeRange,
        ctx: &ScopeContext,
        out: &mut Vec<Node>,
    ) -> Result<(), DesugarError> {
        let target = self.rewrite_expr(target, ctx)?;
        let value = self.rewrite_expr(value, ctx)?;

        if let Expr::Name {
            symbol: Symbol::Fresh(_),
            ..
        } = target.expr
        {
            out.push(match op {
                None => Node::assign(target, value),
                Some(op) => Node::AugAssign {
                    target,
                    op,
                    value,
                    position,
                },
            });
            return Ok(());
        }

        self.tracer
            .on_rule(if op.is_some() { Rule::AugAssign } else { Rule::Assign }, position);
        let SplitTarget { temporaries, target } =
            lhs::split_target(target, &mut || self.fresh_symbol(SymbolKind::Temporary))?;
        let read = match (&target.expr, op) {
            (
                Expr::Name {
                    symbol: Symbol::User(name),
                    ..
                },
                None,
            ) => prior_value(*name, position, ctx),
            _ => None,
        }
        .unwrap_or_else(|| lhs::unassigned_read(lhs::to_load(&target)));
        let new_value = match op {
            None => value,
            Some(op) => ExprLoc::new(
                position,
                Expr::BinOp {
                    left: Box::new(read.clone()),
                    op,
                    right: Box::new(value),
                },
            ),
        };
        out.extend(temporaries);
        out.push(Node::assign(
            target,
            ExprLoc::runtime_call(position, RuntimeFn::Assign, vec![read, new_value]),
        ));
        Ok(())
    }

    /// `if test: body else: or_else` becomes
    ///
    /// ```text
    /// def then(): body
    /// def else(): or_else
    /// rt.jif(test, then, else)
    /// ```
    fn rewrite_if(
        &mut self,
        test: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
        position: CodeRange,
        ctx: &ScopeContext,
        out: &mut Vec<Node>,
    ) -> Result<(), DesugarError> {
        if ctx.frame() == FrameKind::Class
            && (!scope::collect_stored_names(&body).is_empty() || !scope::collect_stored_names(&or_else).is_empty())
        {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::ConditionalClassBinding,
                position,
            ));
        }
        if let Some(transfer) = escaping_transfer(&body, false).or_else(|| escaping_transfer(&or_else, false)) {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::ControlTransferInBranch,
                transfer,
            ));
        }

        self.tracer.on_rule(Rule::ConditionalExec, position);
        let then_fn = self.fresh_symbol(SymbolKind::Then);
        let else_fn = self.fresh_symbol(SymbolKind::Else);
        let test = self.rewrite_expr(test, ctx)?;
        let branch_ctx = ctx.enter_branch();
        let then_def = self.branch_thunk(then_fn, body, position, &branch_ctx)?;
        let else_def = self.branch_thunk(else_fn, or_else, position, &branch_ctx)?;

        out.push(Node::FunctionDef(Box::new(then_def)));
        out.push(Node::FunctionDef(Box::new(else_def)));
        out.push(Node::Expr(ExprLoc::runtime_call(
            position,
            RuntimeFn::ConditionalExec,
            vec![
                test,
                ExprLoc::name(position, then_fn, ExprContext::Load),
                ExprLoc::name(position, else_fn, ExprContext::Load),
            ],
        )));
        Ok(())
    }

    /// A zero-argument function holding one branch.
    ///
    /// Names the branch stores that live in module storage are declared `global` first,
    /// otherwise the thunk would bind them locally.
    fn branch_thunk(
        &mut self,
        name: FreshSymbol,
        body: Vec<Node>,
        position: CodeRange,
        ctx: &ScopeContext,
    ) -> Result<FunctionDef, DesugarError> {
        let globals: Vec<StringId> = scope::collect_stored_names(&body)
            .into_iter()
            .filter(|name| match ctx.lookup(*name) {
                Binding::Global => true,
                Binding::Host => ctx.frame() == FrameKind::Module,
                Binding::Namespace(_) | Binding::ClassBody => false,
            })
            .collect();
        let mut thunk_body = Vec::with_capacity(body.len() + 1);
        if !globals.is_empty() {
            self.tracer.on_rule(Rule::GlobalPreamble, position);
            thunk_body.push(Node::Global {
                names: globals,
                position,
            });
        }
        thunk_body.extend(self.rewrite_body(body, ctx)?);
        Ok(FunctionDef {
            name: Symbol::Fresh(name),
            parameters: Parameters::default(),
            body: thunk_body,
            decorators: Vec::new(),
            position,
        })
    }

    fn rewrite_try(&mut self, t: Try, ctx: &ScopeContext) -> Result<Try, DesugarError> {
        let body = self.rewrite_body(t.body, ctx)?;
        let handlers = t
            .handlers
            .into_iter()
            .map(|handler| self.rewrite_handler(handler, ctx))
            .collect::<Result<_, _>>()?;
        Ok(Try {
            body,
            handlers,
            or_else: self.rewrite_body(t.or_else, ctx)?,
            finally: self.rewrite_body(t.finally, ctx)?,
        })
    }

    /// `except E as e` cannot bind a namespace field directly, so a namespaced `e` is bound
    /// through a temporary that the handler body assigns first.
    fn rewrite_handler(&mut self, handler: ExceptHandler, ctx: &ScopeContext) -> Result<ExceptHandler, DesugarError> {
        let ExceptHandler {
            exc_type,
            name,
            body,
            position,
        } = handler;
        let exc_type = self.rewrite_opt(exc_type, ctx)?;
        let mut new_body = Vec::with_capacity(body.len() + 1);
        let name = match name {
            Some(Symbol::User(id)) => {
                self.check_binding(id, position)?;
                if ctx.namespace_of(id).is_some() {
                    self.tracer.on_rule(Rule::HandlerRebinding, position);
                    let tmp = self.fresh_symbol(SymbolKind::Temporary);
                    self.rewrite_assignment(
                        ExprLoc::name(position, id, ExprContext::Store),
                        None,
                        ExprLoc::name(position, tmp, ExprContext::Load),
                        position,
                        ctx,
                        &mut new_body,
                    )?;
                    Some(Symbol::Fresh(tmp))
                } else {
                    Some(Symbol::User(id))
                }
            }
            other => other,
        };
        new_body.extend(self.rewrite_body(body, ctx)?);
        Ok(ExceptHandler {
            exc_type,
            name,
            body: new_body,
            position,
        })
    }

    /// Gives a function a namespace object holding its parameters and locals.
    ///
    /// Decorators and defaults are evaluated where the function is defined, so they use
    /// the outer context.
    fn rewrite_function(&mut self, def: FunctionDef, ctx: &ScopeContext) -> Result<FunctionDef, DesugarError> {
        let FunctionDef {
            name,
            parameters,
            body,
            decorators,
            position,
        } = def;
        if let Symbol::User(id) = name {
            self.check_binding(id, position)?;
        }
        let decorators = self.rewrite_exprs(decorators, ctx)?;
        let parameters = self.rewrite_parameters(parameters, ctx)?;
        let mut def = FunctionDef {
            name,
            parameters,
            body,
            decorators,
            position,
        };

        let scope = scope::analyze_function(&def);
        for param in &scope.params {
            self.check_binding(*param, position)?;
        }
        self.report_scope(name, &scope);
        self.tracer.on_rule(Rule::Namespace, position);
        let ns = self.fresh_symbol(SymbolKind::Namespace);
        let inner = ctx.enter_function(&scope, ns);

        let mut body = std::mem::take(&mut def.body).into_iter().peekable();
        let mut new_body = Vec::new();
        if let Some(docstring) = body.next_if(Node::is_docstring) {
            new_body.push(docstring);
        }
        new_body.push(namespace_init(ns, &scope.params, position));
        new_body.extend(self.rewrite_body(body.collect(), &inner)?);
        def.body = new_body;
        Ok(def)
    }

    fn report_scope(&mut self, name: Symbol, scope: &FunctionScope) {
        let interner = self.interner;
        let function = self.symbol_text(name);
        let params: Vec<&str> = scope.params.iter().map(|id| interner.get_str(*id)).collect();
        let locals: Vec<&str> = scope.locals.iter().map(|id| interner.get_str(*id)).collect();
        self.tracer.on_scope(ScopeReport {
            function: &function,
            params: &params,
            locals: &locals,
        });
    }

    /// Class bodies keep their own host bindings; methods still see the enclosing
    /// function's namespace, as Python's scoping skips class bodies for them.
    fn rewrite_class(&mut self, class: ClassDef, ctx: &ScopeContext) -> Result<ClassDef, DesugarError> {
        let ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
            position,
        } = class;
        if let Symbol::User(id) = name {
            self.check_binding(id, position)?;
        }
        let decorators = self.rewrite_exprs(decorators, ctx)?;
        let bases = self.rewrite_exprs(bases, ctx)?;
        let keywords = self.rewrite_keywords(keywords, ctx)?;

        let stored = scope::collect_stored_names(&body);
        for class_local in &stored {
            self.check_binding(*class_local, position)?;
        }
        self.tracer.on_rule(Rule::ClassBody, position);
        let inner = ctx.enter_class(&stored);
        Ok(ClassDef {
            name,
            bases,
            keywords,
            body: self.rewrite_body(body, &inner)?,
            decorators,
            position,
        })
    }

    fn rewrite_parameters(&mut self, parameters: Parameters, ctx: &ScopeContext) -> Result<Parameters, DesugarError> {
        let Parameters {
            posonly,
            args,
            vararg,
            kwonly,
            kwarg,
        } = parameters;
        Ok(Parameters {
            posonly: self.rewrite_params(posonly, ctx)?,
            args: self.rewrite_params(args, ctx)?,
            vararg,
            kwonly: self.rewrite_params(kwonly, ctx)?,
            kwarg,
        })
    }

    fn rewrite_params(&mut self, params: Vec<Param>, ctx: &ScopeContext) -> Result<Vec<Param>, DesugarError> {
        params
            .into_iter()
            .map(|param| {
                Ok(Param {
                    name: param.name,
                    default: self.rewrite_opt(param.default, ctx)?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn rewrite_exprs(&mut self, exprs: Vec<ExprLoc>, ctx: &ScopeContext) -> Result<Vec<ExprLoc>, DesugarError> {
        exprs.into_iter().map(|expr| self.rewrite_expr(expr, ctx)).collect()
    }

    fn rewrite_opt(&mut self, expr: Option<ExprLoc>, ctx: &ScopeContext) -> Result<Option<ExprLoc>, DesugarError> {
        expr.map(|expr| self.rewrite_expr(expr, ctx)).transpose()
    }

    fn rewrite_boxed(&mut self, expr: Box<ExprLoc>, ctx: &ScopeContext) -> Result<Box<ExprLoc>, DesugarError> {
        Ok(Box::new(self.rewrite_expr(*expr, ctx)?))
    }

    fn rewrite_keywords(&mut self, keywords: Vec<Keyword>, ctx: &ScopeContext) -> Result<Vec<Keyword>, DesugarError> {
        keywords
            .into_iter()
            .map(|keyword| {
                Ok(Keyword {
                    arg: keyword.arg,
                    value: self.rewrite_expr(keyword.value, ctx)?,
                })
            })
            .collect()
    }

    fn rewrite_expr(&mut self, expr: ExprLoc, ctx: &ScopeContext) -> Result<ExprLoc, DesugarError> {
        let position = expr.position;
        let expr = match expr.expr {
            expr @ (Expr::Literal(_) | Expr::Runtime(_) | Expr::PriorValue { .. }) => expr,
            Expr::Name { symbol, ctx: expr_ctx } => return self.rewrite_name(symbol, expr_ctx, position, ctx),
            Expr::Not(operand) => {
                self.tracer.on_rule(Rule::LogicalNot, position);
                let operand = self.rewrite_expr(*operand, ctx)?;
                return Ok(ExprLoc::runtime_call(position, RuntimeFn::LogicalNot, vec![operand]));
            }
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op,
                operand: self.rewrite_boxed(operand, ctx)?,
            },
            Expr::BoolOp { op, values } => return self.rewrite_bool_op(op, values, position, ctx),
            Expr::BinOp { left, op, right } => Expr::BinOp {
                left: self.rewrite_boxed(left, ctx)?,
                op,
                right: self.rewrite_boxed(right, ctx)?,
            },
            Expr::Compare { left, comparisons } => return self.rewrite_compare(*left, comparisons, position, ctx),
            Expr::IfElse { test, body, or_else } => {
                self.tracer.on_rule(Rule::ConditionalValue, position);
                let test = self.rewrite_expr(*test, ctx)?;
                let deferred = deferred_context(ctx);
                let body = self.rewrite_expr(*body, &deferred)?;
                let or_else = self.rewrite_expr(*or_else, &deferred)?;
                return Ok(ExprLoc::runtime_call(
                    position,
                    RuntimeFn::ConditionalValue,
                    vec![test, ExprLoc::thunk(body), ExprLoc::thunk(or_else)],
                ));
            }
            Expr::ListComp { elt, generators } => return self.rewrite_list_comp(*elt, generators, position, ctx),
            Expr::SetComp { elt, generators } => {
                let (generators, inner) = self.rewrite_generators(generators, ctx)?;
                Expr::SetComp {
                    elt: self.rewrite_boxed(elt, &inner)?,
                    generators,
                }
            }
            Expr::GeneratorExp { elt, generators } => {
                let (generators, inner) = self.rewrite_generators(generators, ctx)?;
                Expr::GeneratorExp {
                    elt: self.rewrite_boxed(elt, &inner)?,
                    generators,
                }
            }
            Expr::DictComp { key, value, generators } => {
                let (generators, inner) = self.rewrite_generators(generators, ctx)?;
                Expr::DictComp {
                    key: self.rewrite_boxed(key, &inner)?,
                    value: self.rewrite_boxed(value, &inner)?,
                    generators,
                }
            }
            Expr::Lambda { parameters, body } => {
                self.tracer.on_rule(Rule::Lambda, position);
                let parameters = self.rewrite_parameters(*parameters, ctx)?;
                let scope = scope::analyze_parameters(&parameters);
                for param in &scope.params {
                    self.check_binding(*param, position)?;
                }
                let inner = ctx.with_hosts(scope.params.iter().copied());
                Expr::Lambda {
                    parameters: Box::new(parameters),
                    body: self.rewrite_boxed(body, &inner)?,
                }
            }
            Expr::Call { func, args, keywords } => Expr::Call {
                func: self.rewrite_boxed(func, ctx)?,
                args: self.rewrite_exprs(args, ctx)?,
                keywords: self.rewrite_keywords(keywords, ctx)?,
            },
            Expr::Attribute {
                object,
                attr,
                ctx: expr_ctx,
            } => Expr::Attribute {
                object: self.rewrite_boxed(object, ctx)?,
                attr,
                ctx: expr_ctx,
            },
            Expr::Subscript {
                object,
                index,
                ctx: expr_ctx,
            } => Expr::Subscript {
                object: self.rewrite_boxed(object, ctx)?,
                index: self.rewrite_boxed(index, ctx)?,
                ctx: expr_ctx,
            },
            Expr::Starred { value, ctx: expr_ctx } => Expr::Starred {
                value: self.rewrite_boxed(value, ctx)?,
                ctx: expr_ctx,
            },
            Expr::List { elts, ctx: expr_ctx } => Expr::List {
                elts: self.rewrite_exprs(elts, ctx)?,
                ctx: expr_ctx,
            },
            Expr::Tuple { elts, ctx: expr_ctx } => Expr::Tuple {
                elts: self.rewrite_exprs(elts, ctx)?,
                ctx: expr_ctx,
            },
            Expr::Dict(items) => Expr::Dict(
                items
                    .into_iter()
                    .map(|item| {
                        Ok(DictItem {
                            key: self.rewrite_opt(item.key, ctx)?,
                            value: self.rewrite_expr(item.value, ctx)?,
                        })
                    })
                    .collect::<Result<_, DesugarError>>()?,
            ),
            Expr::Set(elts) => Expr::Set(self.rewrite_exprs(elts, ctx)?),
            Expr::Slice { lower, upper, step } => Expr::Slice {
                lower: lower.map(|e| self.rewrite_boxed(e, ctx)).transpose()?,
                upper: upper.map(|e| self.rewrite_boxed(e, ctx)).transpose()?,
                step: step.map(|e| self.rewrite_boxed(e, ctx)).transpose()?,
            },
        };
        Ok(ExprLoc::new(position, expr))
    }

    /// A namespaced name becomes a field access on its namespace, keeping the context, so
    /// loads, stores and deletes all reach the same storage.
    fn rewrite_name(
        &mut self,
        symbol: Symbol,
        expr_ctx: ExprContext,
        position: CodeRange,
        ctx: &ScopeContext,
    ) -> Result<ExprLoc, DesugarError> {
        if let (Symbol::User(id), ExprContext::Store | ExprContext::Del) = (symbol, expr_ctx) {
            self.check_binding(id, position)?;
        }
        match ctx.lookup_symbol(symbol) {
            Binding::Namespace(ns) => {
                let Symbol::User(id) = symbol else {
                    return Err(DesugarError::invariant("fresh symbol bound to a namespace", position));
                };
                self.tracer.on_rule(Rule::NameIndirection, position);
                Ok(ExprLoc::attribute(
                    position,
                    ExprLoc::name(position, ns, ExprContext::Load),
                    id,
                    expr_ctx,
                ))
            }
            Binding::ClassBody => Err(DesugarError::unsupported(
                UnsupportedConstruct::ConditionalClassBinding,
                position,
            )),
            Binding::Host | Binding::Global => Ok(ExprLoc::name(position, symbol, expr_ctx)),
        }
    }

    /// `a and b and c` folds from the right: `and(lambda: a, lambda: and(lambda: b, lambda: c))`.
    fn rewrite_bool_op(
        &mut self,
        op: BoolOperator,
        values: Vec<ExprLoc>,
        position: CodeRange,
        ctx: &ScopeContext,
    ) -> Result<ExprLoc, DesugarError> {
        let (rule, function) = match op {
            BoolOperator::And => (Rule::LogicalAnd, RuntimeFn::LogicalAnd),
            BoolOperator::Or => (Rule::LogicalOr, RuntimeFn::LogicalOr),
        };
        self.tracer.on_rule(rule, position);
        let deferred = deferred_context(ctx);
        let mut values = self.rewrite_exprs(values, &deferred)?;
        let Some(mut acc) = values.pop() else {
            return Err(DesugarError::invariant("boolean operation without operands", position));
        };
        while let Some(value) = values.pop() {
            acc = ExprLoc::runtime_call(position, function, vec![ExprLoc::thunk(value), ExprLoc::thunk(acc)]);
        }
        Ok(acc)
    }

    /// `x in c` calls the runtime with `(c, x)`. Unless swapping the operands cannot be
    /// observed, `x` is bound first through an immediately applied lambda.
    fn rewrite_compare(
        &mut self,
        left: ExprLoc,
        comparisons: Vec<(CmpOperator, ExprLoc)>,
        position: CodeRange,
        ctx: &ScopeContext,
    ) -> Result<ExprLoc, DesugarError> {
        if !comparisons.iter().any(|(op, _)| op.is_membership()) {
            let left = self.rewrite_expr(left, ctx)?;
            let comparisons = comparisons
                .into_iter()
                .map(|(op, right)| Ok((op, self.rewrite_expr(right, ctx)?)))
                .collect::<Result<_, DesugarError>>()?;
            return Ok(ExprLoc::new(
                position,
                Expr::Compare {
                    left: Box::new(left),
                    comparisons,
                },
            ));
        }
        let mut comparisons = comparisons.into_iter();
        let (Some((op, collection)), None) = (comparisons.next(), comparisons.next()) else {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::ChainedMembershipComparison,
                position,
            ));
        };
        let negated = op == CmpOperator::NotIn;
        self.tracer.on_rule(
            if negated {
                Rule::NegatedMembership
            } else {
                Rule::Membership
            },
            position,
        );

        let hoist = !(is_pure(&left) || is_pure(&collection) || (is_plain_read(&left) && is_plain_read(&collection)));
        let item = self.rewrite_expr(left, ctx)?;
        let test = if hoist {
            let collection = self.rewrite_expr(collection, &deferred_context(ctx))?;
            let tmp = self.fresh_symbol(SymbolKind::Temporary);
            let parameters = Parameters {
                args: vec![Param::new(tmp)],
                ..Parameters::default()
            };
            let body = ExprLoc::runtime_call(
                position,
                RuntimeFn::MembershipTest,
                vec![collection, ExprLoc::name(position, tmp, ExprContext::Load)],
            );
            ExprLoc::call(position, ExprLoc::lambda(parameters, body), vec![item])
        } else {
            let collection = self.rewrite_expr(collection, ctx)?;
            ExprLoc::runtime_call(position, RuntimeFn::MembershipTest, vec![collection, item])
        };
        Ok(if negated {
            ExprLoc::runtime_call(position, RuntimeFn::LogicalNot, vec![test])
        } else {
            test
        })
    }

    /// `[elt for x in it]` becomes `map(it, lambda x: elt)`.
    fn rewrite_list_comp(
        &mut self,
        elt: ExprLoc,
        mut generators: Vec<Comprehension>,
        position: CodeRange,
        ctx: &ScopeContext,
    ) -> Result<ExprLoc, DesugarError> {
        if generators.len() != 1 {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::MultiGeneratorComprehension,
                position,
            ));
        }
        let Comprehension { target, iter, ifs } = generators.remove(0);
        if let Some(filter) = ifs.first() {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::FilteredComprehension,
                filter.position,
            ));
        }
        let Expr::Name {
            symbol: Symbol::User(name),
            ..
        } = target.expr
        else {
            return Err(DesugarError::unsupported(
                UnsupportedConstruct::ComprehensionTargetPattern,
                target.position,
            ));
        };
        self.check_binding(name, target.position)?;
        self.tracer.on_rule(Rule::MapOver, position);

        let iter = self.rewrite_expr(iter, ctx)?;
        let elt = self.rewrite_expr(elt, &ctx.with_hosts([name]))?;
        let parameters = Parameters {
            args: vec![Param::new(name)],
            ..Parameters::default()
        };
        Ok(ExprLoc::runtime_call(
            position,
            RuntimeFn::MapOver,
            vec![iter, ExprLoc::lambda(parameters, elt)],
        ))
    }

    /// Comprehensions that stay native. Targets shadow outer bindings from their own clause
    /// onwards; the first iterable is evaluated in the enclosing scope.
    fn rewrite_generators(
        &mut self,
        generators: Vec<Comprehension>,
        ctx: &ScopeContext,
    ) -> Result<(Vec<Comprehension>, ScopeContext), DesugarError> {
        let mut inner: Option<ScopeContext> = None;
        let mut rewritten = Vec::with_capacity(generators.len());
        for Comprehension { target, iter, ifs } in generators {
            let iter = self.rewrite_expr(iter, inner.as_ref().unwrap_or(ctx))?;
            let names = scope::target_names(&target);
            for name in &names {
                self.check_binding(*name, target.position)?;
            }
            let clause_ctx = inner.as_ref().unwrap_or(ctx).with_hosts(names);
            let target = self.rewrite_expr(target, &clause_ctx)?;
            let ifs = self.rewrite_exprs(ifs, &clause_ctx)?;
            rewritten.push(Comprehension { target, iter, ifs });
            inner = Some(clause_ctx);
        }
        let inner = inner.unwrap_or_else(|| ctx.clone());
        Ok((rewritten, inner))
    }
}

/// Context for expressions that end up inside a lambda. In a class body the class
/// namespace is out of reach from there.
fn deferred_context(ctx: &ScopeContext) -> Cow<'_, ScopeContext> {
    if ctx.frame() == FrameKind::Class {
        Cow::Owned(ctx.enter_branch())
    } else {
        Cow::Borrowed(ctx)
    }
}

/// `globals().get('name')` for a module name, `locals().get('name')` for a class-body name.
/// Other names are always bound when assigned, or are not host names at all.
fn prior_value(name: StringId, position: CodeRange, ctx: &ScopeContext) -> Option<ExprLoc> {
    let store = match (ctx.lookup(name), ctx.frame()) {
        (Binding::Global, _) | (Binding::Host, FrameKind::Module) => HostStore::Globals,
        (Binding::Host, FrameKind::Class) => HostStore::Locals,
        _ => return None,
    };
    Some(ExprLoc::new(position, Expr::PriorValue { store, name }))
}

/// `ns = rt.Namespace({'p': p, ...})`
fn namespace_init(ns: FreshSymbol, params: &[StringId], position: CodeRange) -> Node {
    let fields = params
        .iter()
        .map(|param| DictItem {
            key: Some(ExprLoc::str(position, *param)),
            value: ExprLoc::name(position, *param, ExprContext::Load),
        })
        .collect();
    Node::assign(
        ExprLoc::name(position, ns, ExprContext::Store),
        ExprLoc::runtime_call(
            position,
            RuntimeFn::Namespace,
            vec![ExprLoc::new(position, Expr::Dict(fields))],
        ),
    )
}

fn import_bindings(names: &[ImportAlias]) -> Vec<StringId> {
    names.iter().filter_map(|alias| alias.binding).collect()
}

/// First `return`, or `break`/`continue` outside a loop, that would leave a branch thunk.
/// Nested definitions are separate functions and are not searched.
fn escaping_transfer(body: &[Node], in_loop: bool) -> Option<CodeRange> {
    body.iter().find_map(|node| match node {
        Node::Return { position, .. } => Some(*position),
        Node::Break { position } | Node::Continue { position } if !in_loop => Some(*position),
        Node::For { body, or_else, .. } | Node::While { body, or_else, .. } => {
            escaping_transfer(body, true).or_else(|| escaping_transfer(or_else, in_loop))
        }
        Node::If { body, or_else, .. } => escaping_transfer(body, in_loop).or_else(|| escaping_transfer(or_else, in_loop)),
        Node::With { body, .. } => escaping_transfer(body, in_loop),
        Node::Try(t) => escaping_transfer(&t.body, in_loop)
            .or_else(|| t.handlers.iter().find_map(|h| escaping_transfer(&h.body, in_loop)))
            .or_else(|| escaping_transfer(&t.or_else, in_loop))
            .or_else(|| escaping_transfer(&t.finally, in_loop)),
        _ => None,
    })
}

/// Literals, and displays built only from literals: evaluating them has no effects.
fn is_pure(expr: &ExprLoc) -> bool {
    match &expr.expr {
        Expr::Literal(_) => true,
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } | Expr::Set(elts) => elts.iter().all(is_pure),
        Expr::Dict(items) => items
            .iter()
            .all(|item| item.key.as_ref().is_some_and(is_pure) && is_pure(&item.value)),
        Expr::UnaryOp { operand, .. } => matches!(operand.expr, Expr::Literal(Literal::Int(_) | Literal::Float(_))),
        _ => false,
    }
}

/// A bare name. Name reads never run user code, so their order cannot be observed.
fn is_plain_read(expr: &ExprLoc) -> bool {
    matches!(expr.expr, Expr::Name { .. })
}
