//! Printer from the crate's tree back to Python source.
//!
//! Output is canonical rather than faithful: comments and original formatting are gone,
//! strings are quoted the way Python's `repr` quotes them, tuples are always parenthesized, and parentheses are emitted
//! only where operator precedence requires them.

use std::fmt::{self, Write};

use crate::{
    expressions::{
        BoolOperator, CmpOperator, Comprehension, ExceptHandler, Expr, ExprLoc, ImportAlias, Keyword, Literal, Node,
        Operator, Parameters, Symbol, UnaryOperator,
    },
    fresh::FreshNames,
    intern::InternerBuilder,
    runtime::RuntimeNames,
};

// Binding strength of each expression form, loosest first.
const PREC_LAMBDA: u8 = 0;
const PREC_TERNARY: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_NOT: u8 = 4;
const PREC_COMPARE: u8 = 5;
const PREC_BIT_OR: u8 = 6;
const PREC_BIT_XOR: u8 = 7;
const PREC_BIT_AND: u8 = 8;
const PREC_SHIFT: u8 = 9;
const PREC_ARITH: u8 = 10;
const PREC_TERM: u8 = 11;
const PREC_UNARY: u8 = 12;
const PREC_POWER: u8 = 13;
const PREC_PRIMARY: u8 = 15;

const INDENT: &str = "    ";

/// Writes Python source for trees produced by [`parse`](crate::parse::parse) and the rewrite.
pub struct SourcePrinter<'a, W: Write> {
    out: &'a mut W,
    interner: &'a InternerBuilder,
    symbols: &'a FreshNames,
    runtime: &'a RuntimeNames,
    depth: usize,
}

impl<'a, W: Write> SourcePrinter<'a, W> {
    pub fn new(out: &'a mut W, interner: &'a InternerBuilder, symbols: &'a FreshNames, runtime: &'a RuntimeNames) -> Self {
        Self {
            out,
            interner,
            symbols,
            runtime,
            depth: 0,
        }
    }

    /// Writes a statement list at the current indentation; an empty list is written as `pass`.
    pub fn body(&mut self, nodes: &[Node]) -> fmt::Result {
        if nodes.is_empty() {
            return self.line(|p| p.out.write_str("pass"));
        }
        for node in nodes {
            self.statement(node)?;
        }
        Ok(())
    }

    /// Writes one expression without surrounding parentheses.
    pub fn expression(&mut self, expr: &ExprLoc) -> fmt::Result {
        self.expr(expr, PREC_LAMBDA)
    }

    fn line(&mut self, write: impl FnOnce(&mut Self) -> fmt::Result) -> fmt::Result {
        for _ in 0..self.depth {
            self.out.write_str(INDENT)?;
        }
        write(self)?;
        self.out.write_char('\n')
    }

    fn block(&mut self, nodes: &[Node]) -> fmt::Result {
        self.depth += 1;
        let result = self.body(nodes);
        self.depth -= 1;
        result
    }

    /// `keyword:` followed by an indented block.
    fn clause(&mut self, header: impl FnOnce(&mut Self) -> fmt::Result, nodes: &[Node]) -> fmt::Result {
        self.line(|p| {
            header(p)?;
            p.out.write_char(':')
        })?;
        self.block(nodes)
    }

    /// Writes one statement, followed by a newline, at the current indentation.
    pub fn statement(&mut self, node: &Node) -> fmt::Result {
        match node {
            Node::Pass => self.line(|p| p.out.write_str("pass")),
            Node::Break { .. } => self.line(|p| p.out.write_str("break")),
            Node::Continue { .. } => self.line(|p| p.out.write_str("continue")),
            Node::Expr(expr) => self.line(|p| p.expression(expr)),
            Node::Return { value, .. } => self.line(|p| {
                p.out.write_str("return")?;
                if let Some(value) = value {
                    p.out.write_char(' ')?;
                    p.expression(value)?;
                }
                Ok(())
            }),
            Node::Assign { targets, value, .. } => self.line(|p| {
                for target in targets {
                    p.expression(target)?;
                    p.out.write_str(" = ")?;
                }
                p.expression(value)
            }),
            Node::AugAssign { target, op, value, .. } => self.line(|p| {
                p.expression(target)?;
                write!(p.out, " {}= ", operator_str(*op))?;
                p.expression(value)
            }),
            Node::Delete(targets) => self.line(|p| {
                p.out.write_str("del ")?;
                p.comma_separated(targets)
            }),
            Node::If { .. } => self.if_chain(node, "if"),
            Node::While { test, body, or_else } => {
                self.clause(
                    |p| {
                        p.out.write_str("while ")?;
                        p.expression(test)
                    },
                    body,
                )?;
                self.else_clause(or_else)
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => {
                self.clause(
                    |p| {
                        p.out.write_str("for ")?;
                        p.expression(target)?;
                        p.out.write_str(" in ")?;
                        p.expression(iter)
                    },
                    body,
                )?;
                self.else_clause(or_else)
            }
            Node::With { items, body } => self.clause(
                |p| {
                    p.out.write_str("with ")?;
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            p.out.write_str(", ")?;
                        }
                        p.expr(&item.context_expr, PREC_TERNARY)?;
                        if let Some(vars) = &item.optional_vars {
                            p.out.write_str(" as ")?;
                            p.expression(vars)?;
                        }
                    }
                    Ok(())
                },
                body,
            ),
            Node::Raise { exc, cause } => self.line(|p| {
                p.out.write_str("raise")?;
                if let Some(exc) = exc {
                    p.out.write_char(' ')?;
                    p.expression(exc)?;
                }
                if let Some(cause) = cause {
                    p.out.write_str(" from ")?;
                    p.expression(cause)?;
                }
                Ok(())
            }),
            Node::Try(t) => {
                self.clause(|p| p.out.write_str("try"), &t.body)?;
                for handler in &t.handlers {
                    self.handler(handler)?;
                }
                self.else_clause(&t.or_else)?;
                if !t.finally.is_empty() {
                    self.clause(|p| p.out.write_str("finally"), &t.finally)?;
                }
                Ok(())
            }
            Node::Assert { test, msg } => self.line(|p| {
                p.out.write_str("assert ")?;
                p.expression(test)?;
                if let Some(msg) = msg {
                    p.out.write_str(", ")?;
                    p.expression(msg)?;
                }
                Ok(())
            }),
            Node::FunctionDef(def) => {
                self.decorators(&def.decorators)?;
                self.clause(
                    |p| {
                        p.out.write_str("def ")?;
                        p.symbol(def.name)?;
                        p.out.write_char('(')?;
                        p.parameters(&def.parameters)?;
                        p.out.write_char(')')
                    },
                    &def.body,
                )
            }
            Node::ClassDef(class) => {
                self.decorators(&class.decorators)?;
                self.clause(
                    |p| {
                        p.out.write_str("class ")?;
                        p.symbol(class.name)?;
                        if !class.bases.is_empty() || !class.keywords.is_empty() {
                            p.out.write_char('(')?;
                            p.arguments(&class.bases, &class.keywords)?;
                            p.out.write_char(')')?;
                        }
                        Ok(())
                    },
                    &class.body,
                )
            }
            Node::Import { names, .. } => self.line(|p| {
                p.out.write_str("import ")?;
                p.aliases(names)
            }),
            Node::ImportFrom {
                module, names, level, ..
            } => self.line(|p| {
                p.out.write_str("from ")?;
                for _ in 0..*level {
                    p.out.write_char('.')?;
                }
                if let Some(module) = module {
                    p.out.write_str(p.interner.get_str(*module))?;
                }
                p.out.write_str(" import ")?;
                p.aliases(names)
            }),
            Node::Global { names, .. } => self.line(|p| {
                p.out.write_str("global ")?;
                p.names(names)
            }),
            Node::Nonlocal { names, .. } => self.line(|p| {
                p.out.write_str("nonlocal ")?;
                p.names(names)
            }),
        }
    }

    /// `if`, folding an `else` that holds a single `if` into `elif`.
    fn if_chain(&mut self, node: &Node, keyword: &str) -> fmt::Result {
        let Node::If { test, body, or_else, .. } = node else {
            return self.statement(node);
        };
        self.clause(
            |p| {
                write!(p.out, "{keyword} ")?;
                p.expression(test)
            },
            body,
        )?;
        match or_else.as_slice() {
            [] => Ok(()),
            [nested @ Node::If { .. }] => self.if_chain(nested, "elif"),
            _ => self.clause(|p| p.out.write_str("else"), or_else),
        }
    }

    fn else_clause(&mut self, or_else: &[Node]) -> fmt::Result {
        if or_else.is_empty() {
            return Ok(());
        }
        self.clause(|p| p.out.write_str("else"), or_else)
    }

    fn handler(&mut self, handler: &ExceptHandler) -> fmt::Result {
        self.clause(
            |p| {
                p.out.write_str("except")?;
                if let Some(exc_type) = &handler.exc_type {
                    p.out.write_char(' ')?;
                    p.expression(exc_type)?;
                }
                if let Some(name) = handler.name {
                    p.out.write_str(" as ")?;
                    p.symbol(name)?;
                }
                Ok(())
            },
            &handler.body,
        )
    }

    fn decorators(&mut self, decorators: &[ExprLoc]) -> fmt::Result {
        for decorator in decorators {
            self.line(|p| {
                p.out.write_char('@')?;
                p.expression(decorator)
            })?;
        }
        Ok(())
    }

    fn aliases(&mut self, names: &[ImportAlias]) -> fmt::Result {
        for (i, alias) in names.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.out.write_str(self.interner.get_str(alias.name))?;
            if let Some(asname) = alias.asname {
                write!(self.out, " as {}", self.interner.get_str(asname))?;
            }
        }
        Ok(())
    }

    fn names(&mut self, names: &[crate::intern::StringId]) -> fmt::Result {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.out.write_str(self.interner.get_str(*name))?;
        }
        Ok(())
    }

    fn symbol(&mut self, symbol: Symbol) -> fmt::Result {
        match symbol {
            Symbol::User(id) => self.out.write_str(self.interner.get_str(id)),
            Symbol::Fresh(fresh) => write!(self.out, "{}", self.symbols.render(fresh)),
        }
    }

    fn parameters(&mut self, parameters: &Parameters) -> fmt::Result {
        let mut first = true;
        let mut separator = |p: &mut Self| -> fmt::Result {
            if !std::mem::take(&mut first) {
                p.out.write_str(", ")?;
            }
            Ok(())
        };
        for param in &parameters.posonly {
            separator(self)?;
            self.param(param.name, param.default.as_ref())?;
        }
        if !parameters.posonly.is_empty() {
            separator(self)?;
            self.out.write_char('/')?;
        }
        for param in &parameters.args {
            separator(self)?;
            self.param(param.name, param.default.as_ref())?;
        }
        if let Some(vararg) = parameters.vararg {
            separator(self)?;
            self.out.write_char('*')?;
            self.symbol(vararg)?;
        } else if !parameters.kwonly.is_empty() {
            separator(self)?;
            self.out.write_char('*')?;
        }
        for param in &parameters.kwonly {
            separator(self)?;
            self.param(param.name, param.default.as_ref())?;
        }
        if let Some(kwarg) = parameters.kwarg {
            separator(self)?;
            self.out.write_str("**")?;
            self.symbol(kwarg)?;
        }
        Ok(())
    }

    fn param(&mut self, name: Symbol, default: Option<&ExprLoc>) -> fmt::Result {
        self.symbol(name)?;
        if let Some(default) = default {
            self.out.write_char('=')?;
            self.expression(default)?;
        }
        Ok(())
    }

    fn comma_separated(&mut self, exprs: &[ExprLoc]) -> fmt::Result {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.expression(expr)?;
        }
        Ok(())
    }

    fn arguments(&mut self, args: &[ExprLoc], keywords: &[Keyword]) -> fmt::Result {
        self.comma_separated(args)?;
        for (i, keyword) in keywords.iter().enumerate() {
            if i > 0 || !args.is_empty() {
                self.out.write_str(", ")?;
            }
            match keyword.arg {
                Some(arg) => write!(self.out, "{}=", self.interner.get_str(arg))?,
                None => self.out.write_str("**")?,
            }
            self.expression(&keyword.value)?;
        }
        Ok(())
    }

    fn expr(&mut self, expr: &ExprLoc, min_prec: u8) -> fmt::Result {
        let prec = precedence(&expr.expr);
        let parens = prec < min_prec;
        if parens {
            self.out.write_char('(')?;
        }
        self.expr_inner(expr, prec)?;
        if parens {
            self.out.write_char(')')?;
        }
        Ok(())
    }

    fn expr_inner(&mut self, expr: &ExprLoc, prec: u8) -> fmt::Result {
        match &expr.expr {
            Expr::Literal(literal) => self.literal(literal),
            Expr::Name { symbol, .. } => self.symbol(*symbol),
            Expr::Runtime(function) => self.out.write_str(&self.runtime.qualified(*function)),
            Expr::PriorValue { store, name } => {
                let store: &'static str = (*store).into();
                write!(self.out, "{store}().get(")?;
                write_str_repr(&mut *self.out, self.interner.get_str(*name))?;
                self.out.write_char(')')
            }
            Expr::Not(operand) => {
                self.out.write_str("not ")?;
                self.expr(operand, PREC_NOT)
            }
            Expr::UnaryOp { op, operand } => {
                self.out.write_str(match op {
                    UnaryOperator::Neg => "-",
                    UnaryOperator::Pos => "+",
                    UnaryOperator::Invert => "~",
                })?;
                self.expr(operand, PREC_UNARY)
            }
            Expr::BoolOp { op, values } => {
                let keyword = match op {
                    BoolOperator::And => " and ",
                    BoolOperator::Or => " or ",
                };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.out.write_str(keyword)?;
                    }
                    self.expr(value, prec + 1)?;
                }
                Ok(())
            }
            Expr::BinOp { left, op, right } => {
                // `**` is right-associative and binds tighter than a unary operator on its left
                let (left_prec, right_prec) = if *op == Operator::Pow {
                    (PREC_POWER + 1, PREC_UNARY)
                } else {
                    (prec, prec + 1)
                };
                self.expr(left, left_prec)?;
                write!(self.out, " {} ", operator_str(*op))?;
                self.expr(right, right_prec)
            }
            Expr::Compare { left, comparisons } => {
                self.expr(left, PREC_COMPARE + 1)?;
                for (op, right) in comparisons {
                    write!(self.out, " {} ", compare_str(*op))?;
                    self.expr(right, PREC_COMPARE + 1)?;
                }
                Ok(())
            }
            Expr::IfElse { test, body, or_else } => {
                self.expr(body, PREC_OR)?;
                self.out.write_str(" if ")?;
                self.expr(test, PREC_OR)?;
                self.out.write_str(" else ")?;
                self.expr(or_else, PREC_TERNARY)
            }
            Expr::ListComp { elt, generators } => {
                self.out.write_char('[')?;
                self.expression(elt)?;
                self.generators(generators)?;
                self.out.write_char(']')
            }
            Expr::SetComp { elt, generators } => {
                self.out.write_char('{')?;
                self.expression(elt)?;
                self.generators(generators)?;
                self.out.write_char('}')
            }
            Expr::GeneratorExp { elt, generators } => {
                self.out.write_char('(')?;
                self.expression(elt)?;
                self.generators(generators)?;
                self.out.write_char(')')
            }
            Expr::DictComp { key, value, generators } => {
                self.out.write_char('{')?;
                self.expr(key, PREC_TERNARY)?;
                self.out.write_str(": ")?;
                self.expression(value)?;
                self.generators(generators)?;
                self.out.write_char('}')
            }
            Expr::Lambda { parameters, body } => {
                self.out.write_str("lambda")?;
                if !parameters.is_empty() {
                    self.out.write_char(' ')?;
                    self.parameters(parameters)?;
                }
                self.out.write_str(": ")?;
                self.expr(body, PREC_LAMBDA)
            }
            Expr::Call { func, args, keywords } => {
                self.expr(func, PREC_PRIMARY)?;
                self.out.write_char('(')?;
                self.arguments(args, keywords)?;
                self.out.write_char(')')
            }
            Expr::Attribute { object, attr, .. } => {
                // `1.real` would lex as a float
                if matches!(object.expr, Expr::Literal(Literal::Int(_) | Literal::LongInt(_))) {
                    self.out.write_char('(')?;
                    self.expression(object)?;
                    self.out.write_char(')')?;
                } else {
                    self.expr(object, PREC_PRIMARY)?;
                }
                write!(self.out, ".{}", self.interner.get_str(*attr))
            }
            Expr::Subscript { object, index, .. } => {
                self.expr(object, PREC_PRIMARY)?;
                self.out.write_char('[')?;
                match &index.expr {
                    // slices are not valid inside a parenthesized tuple
                    Expr::Tuple { elts, .. } if !elts.is_empty() => {
                        self.comma_separated(elts)?;
                        if elts.len() == 1 {
                            self.out.write_char(',')?;
                        }
                    }
                    _ => self.expression(index)?,
                }
                self.out.write_char(']')
            }
            Expr::Starred { value, .. } => {
                self.out.write_char('*')?;
                self.expr(value, PREC_BIT_OR)
            }
            Expr::List { elts, .. } => {
                self.out.write_char('[')?;
                self.comma_separated(elts)?;
                self.out.write_char(']')
            }
            Expr::Tuple { elts, .. } => {
                self.out.write_char('(')?;
                self.comma_separated(elts)?;
                if elts.len() == 1 {
                    self.out.write_char(',')?;
                }
                self.out.write_char(')')
            }
            Expr::Set(elts) => {
                self.out.write_char('{')?;
                self.comma_separated(elts)?;
                self.out.write_char('}')
            }
            Expr::Dict(items) => {
                self.out.write_char('{')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.write_str(", ")?;
                    }
                    match &item.key {
                        Some(key) => {
                            self.expression(key)?;
                            self.out.write_str(": ")?;
                            self.expression(&item.value)?;
                        }
                        None => {
                            self.out.write_str("**")?;
                            self.expr(&item.value, PREC_BIT_OR)?;
                        }
                    }
                }
                self.out.write_char('}')
            }
            Expr::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    self.expression(lower)?;
                }
                self.out.write_char(':')?;
                if let Some(upper) = upper {
                    self.expression(upper)?;
                }
                if let Some(step) = step {
                    self.out.write_char(':')?;
                    self.expression(step)?;
                }
                Ok(())
            }
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) -> fmt::Result {
        for generator in generators {
            self.out.write_str(" for ")?;
            self.expression(&generator.target)?;
            self.out.write_str(" in ")?;
            self.expr(&generator.iter, PREC_OR)?;
            for condition in &generator.ifs {
                self.out.write_str(" if ")?;
                self.expr(condition, PREC_OR)?;
            }
        }
        Ok(())
    }

    fn literal(&mut self, literal: &Literal) -> fmt::Result {
        match literal {
            Literal::None => self.out.write_str("None"),
            Literal::Bool(true) => self.out.write_str("True"),
            Literal::Bool(false) => self.out.write_str("False"),
            Literal::Int(i) => write!(self.out, "{i}"),
            Literal::LongInt(text) => self.out.write_str(self.interner.get_str(*text)),
            Literal::Float(f) => write_float(&mut *self.out, *f),
            Literal::Imag(f) => {
                write_float(&mut *self.out, *f)?;
                self.out.write_char('j')
            }
            Literal::Str(id) => write_str_repr(&mut *self.out, self.interner.get_str(*id)),
            Literal::Bytes(id) => write_bytes_repr(&mut *self.out, self.interner.get_bytes(*id)),
            Literal::Ellipsis => self.out.write_str("..."),
        }
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Lambda { .. } => PREC_LAMBDA,
        Expr::IfElse { .. } => PREC_TERNARY,
        Expr::BoolOp {
            op: BoolOperator::Or, ..
        } => PREC_OR,
        Expr::BoolOp {
            op: BoolOperator::And, ..
        } => PREC_AND,
        Expr::Not(_) => PREC_NOT,
        Expr::Compare { .. } => PREC_COMPARE,
        Expr::BinOp { op, .. } => match op {
            Operator::BitOr => PREC_BIT_OR,
            Operator::BitXor => PREC_BIT_XOR,
            Operator::BitAnd => PREC_BIT_AND,
            Operator::LShift | Operator::RShift => PREC_SHIFT,
            Operator::Add | Operator::Sub => PREC_ARITH,
            Operator::Mult | Operator::MatMult | Operator::Div | Operator::Mod | Operator::FloorDiv => PREC_TERM,
            Operator::Pow => PREC_POWER,
        },
        Expr::UnaryOp { .. } => PREC_UNARY,
        // a negative number literal prints with its sign
        Expr::Literal(Literal::Int(i)) if *i < 0 => PREC_UNARY,
        Expr::Literal(Literal::Float(f) | Literal::Imag(f)) if f.is_sign_negative() => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

fn operator_str(op: Operator) -> &'static str {
    match op {
        Operator::Add => "+",
        Operator::Sub => "-",
        Operator::Mult => "*",
        Operator::MatMult => "@",
        Operator::Div => "/",
        Operator::Mod => "%",
        Operator::Pow => "**",
        Operator::LShift => "<<",
        Operator::RShift => ">>",
        Operator::BitOr => "|",
        Operator::BitXor => "^",
        Operator::BitAnd => "&",
        Operator::FloorDiv => "//",
    }
}

fn compare_str(op: CmpOperator) -> &'static str {
    match op {
        CmpOperator::Eq => "==",
        CmpOperator::NotEq => "!=",
        CmpOperator::Lt => "<",
        CmpOperator::LtE => "<=",
        CmpOperator::Gt => ">",
        CmpOperator::GtE => ">=",
        CmpOperator::Is => "is",
        CmpOperator::IsNot => "is not",
        CmpOperator::In => "in",
        CmpOperator::NotIn => "not in",
    }
}

/// Floats print in Rust's shortest round-trip form, which Python reads back unchanged.
fn write_float(out: &mut impl Write, f: f64) -> fmt::Result {
    if f.is_infinite() {
        // only reachable through literals such as `1e999`, which overflow to infinity
        out.write_str(if f.is_sign_negative() { "-1e999" } else { "1e999" })
    } else {
        write!(out, "{f:?}")
    }
}

/// Python's `repr` of a string.
fn write_str_repr(out: &mut impl Write, s: &str) -> fmt::Result {
    let quote = repr_quote(s.contains('\''), s.contains('"'));
    out.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if c == quote => write!(out, "\\{c}")?,
            c if u32::from(c) < 0x20 || c == '\x7f' => write!(out, "\\x{:02x}", u32::from(c))?,
            c => out.write_char(c)?,
        }
    }
    out.write_char(quote)
}

/// Python's `repr` of a bytes literal.
fn write_bytes_repr(out: &mut impl Write, bytes: &[u8]) -> fmt::Result {
    let quote = repr_quote(bytes.contains(&b'\''), bytes.contains(&b'"'));
    out.write_char('b')?;
    out.write_char(quote)?;
    for &b in bytes {
        match b {
            b'\\' => out.write_str("\\\\")?,
            b'\n' => out.write_str("\\n")?,
            b'\r' => out.write_str("\\r")?,
            b'\t' => out.write_str("\\t")?,
            b if char::from(b) == quote => write!(out, "\\{quote}")?,
            0x20..=0x7e => out.write_char(char::from(b))?,
            _ => write!(out, "\\x{b:02x}")?,
        }
    }
    out.write_char(quote)
}

/// Single quotes unless the text contains a single quote and no double quote.
fn repr_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

/// Prints a statement list as Python source.
#[must_use]
pub fn unparse(nodes: &[Node], interner: &InternerBuilder, symbols: &FreshNames, runtime: &RuntimeNames) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = SourcePrinter::new(&mut out, interner, symbols, runtime).body(nodes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fresh::DEFAULT_PREFIX, parse::parse};

    /// Parses `code` and prints it back.
    fn round_trip(code: &str) -> String {
        let parsed = parse(code).unwrap();
        let runtime = RuntimeNames::default();
        let symbols = FreshNames::new(DEFAULT_PREFIX, &parsed.interner, &runtime);
        unparse(&parsed.nodes, &parsed.interner, &symbols, &runtime)
    }

    #[test]
    fn keeps_required_parentheses() {
        assert_eq!(round_trip("x = (a + b) * c\n"), "x = (a + b) * c\n");
        assert_eq!(round_trip("x = a + b * c\n"), "x = a + b * c\n");
        assert_eq!(round_trip("x = a - (b - c)\n"), "x = a - (b - c)\n");
        assert_eq!(round_trip("x = (a - b) - c\n"), "x = a - b - c\n");
        assert_eq!(round_trip("x = (-2) ** 2\n"), "x = (-2) ** 2\n");
        assert_eq!(round_trip("x = 2 ** -1\n"), "x = 2 ** -1\n");
        assert_eq!(round_trip("x = not (a and b)\n"), "x = not (a and b)\n");
        assert_eq!(round_trip("x = (lambda: 1)()\n"), "x = (lambda: 1)()\n");
        assert_eq!(round_trip("x = (1).real\n"), "x = (1).real\n");
    }

    #[test]
    fn string_literals_use_python_repr() {
        assert_eq!(round_trip("s = \"it's\\n\"\n"), "s = \"it's\\n\"\n");
        assert_eq!(round_trip("s = 'a\\'b\"c'\n"), "s = 'a\\'b\"c'\n");
        assert_eq!(round_trip("b = b'\\x00a'\n"), "b = b'\\x00a'\n");
    }

    #[test]
    fn statements() {
        let code = "\
def f(a, /, b=1, *args, c, **kw):
    if a:
        pass
    elif b:
        return a[1:2, ::3]
    else:
        del b
    for i in range(3):
        continue
    else:
        pass
    try:
        raise ValueError('x') from None
    except (TypeError, ValueError) as e:
        pass
    finally:
        pass
";
        assert_eq!(round_trip(code), code);
    }

    #[test]
    fn empty_body_prints_pass() {
        let runtime = RuntimeNames::default();
        let interner = InternerBuilder::default();
        let symbols = FreshNames::new(DEFAULT_PREFIX, &interner, &runtime);
        assert_eq!(unparse(&[], &interner, &symbols, &runtime), "pass\n");
    }
}
