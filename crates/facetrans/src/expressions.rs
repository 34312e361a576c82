use strum::IntoStaticStr;

use crate::{
    fresh::FreshSymbol,
    intern::{BytesId, StringId},
    parse::CodeRange,
    runtime::RuntimeFn,
};

/// Whether an expression is read, written or deleted.
///
/// Carried on every node kind that can appear as an assignment or `del` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExprContext {
    #[default]
    Load,
    Store,
    Del,
}

/// A variable name in the tree.
///
/// User identifiers come from the source and are interned strings. Fresh symbols are
/// introduced by the rewrite (namespace variables, temporaries, branch thunks) and are
/// only turned into text when the tree is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    User(StringId),
    Fresh(FreshSymbol),
}

impl Symbol {
    /// Returns the interned name for user identifiers, `None` for fresh symbols.
    #[must_use]
    pub fn user(self) -> Option<StringId> {
        match self {
            Self::User(id) => Some(id),
            Self::Fresh(_) => None,
        }
    }
}

impl From<StringId> for Symbol {
    fn from(id: StringId) -> Self {
        Self::User(id)
    }
}

impl From<FreshSymbol> for Symbol {
    fn from(symbol: FreshSymbol) -> Self {
        Self::Fresh(symbol)
    }
}

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    /// Integer too large for `i64`, kept as its source text.
    LongInt(StringId),
    Float(f64),
    /// Imaginary literal such as `2j`; the value is the imaginary part.
    Imag(f64),
    Str(StringId),
    Bytes(BytesId),
    Ellipsis,
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    // `+`
    Add,
    // `-`
    Sub,
    // `*`
    Mult,
    // `@`
    MatMult,
    // `/`
    Div,
    // `%`
    Mod,
    // `**`
    Pow,
    // `<<`
    LShift,
    // `>>`
    RShift,
    // `|`
    BitOr,
    // `^`
    BitXor,
    // `&`
    BitAnd,
    // `//`
    FloorDiv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// Unary operators other than `not`, which has its own node kind because the rewrite
/// treats it specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Pos,
    Invert,
}

/// Defined separately since these operators always return a bool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    /// True for `in` and `not in`.
    #[must_use]
    pub fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// One `for target in iter if cond...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: ExprLoc,
    pub iter: ExprLoc,
    pub ifs: Vec<ExprLoc>,
}

/// A keyword argument in a call or class definition.
///
/// `arg` is `None` for `**mapping` unpacking.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<StringId>,
    pub value: ExprLoc,
}

/// One entry of a dict display; `key` is `None` for `**mapping` unpacking.
#[derive(Debug, Clone, PartialEq)]
pub struct DictItem {
    pub key: Option<ExprLoc>,
    pub value: ExprLoc,
}

/// A parameter with its optional default value.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Symbol,
    pub default: Option<ExprLoc>,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<Symbol>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }
}

/// The parameter list of a function or lambda.
///
/// Annotations are not kept: the rewritten code never evaluates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    /// Positional-only parameters (before `/`).
    pub posonly: Vec<Param>,
    /// Positional-or-keyword parameters.
    pub args: Vec<Param>,
    /// `*args`
    pub vararg: Option<Symbol>,
    /// Keyword-only parameters (after `*` or `*args`).
    pub kwonly: Vec<Param>,
    /// `**kwargs`
    pub kwarg: Option<Symbol>,
}

impl Parameters {
    /// Every bound name in declaration order: positional-only, positional, `*args`,
    /// keyword-only, `**kwargs`.
    pub fn names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.posonly
            .iter()
            .chain(&self.args)
            .map(|p| p.name)
            .chain(self.vararg)
            .chain(self.kwonly.iter().map(|p| p.name))
            .chain(self.kwarg)
    }

    /// True when the list binds no names at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names().next().is_none()
    }
}

/// The dictionary backing host names of the frame being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum HostStore {
    /// Module storage, reached through `globals()`.
    Globals,
    /// A class body's namespace, reached through `locals()`.
    Locals,
}

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name {
        symbol: Symbol,
        ctx: ExprContext,
    },
    /// Reference to a runtime library entry point, printed as `<module>.<name>`.
    ///
    /// Never looked up in the scope context, so user code cannot capture it.
    Runtime(RuntimeFn),
    /// Current value of a host name, `None` while it is unbound: `globals().get('name')`.
    PriorValue { store: HostStore, name: StringId },
    Not(Box<ExprLoc>),
    UnaryOp {
        op: UnaryOperator,
        operand: Box<ExprLoc>,
    },
    /// `a and b and c`, kept flat as in the host grammar.
    BoolOp {
        op: BoolOperator,
        values: Vec<ExprLoc>,
    },
    BinOp {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    /// `a < b`, or a chain `a < b <= c`.
    Compare {
        left: Box<ExprLoc>,
        /// Sequence of (operator, operand) pairs: `[(op1, b), (op2, c), ...]`
        comparisons: Vec<(CmpOperator, ExprLoc)>,
    },
    IfElse {
        test: Box<ExprLoc>,
        body: Box<ExprLoc>,
        or_else: Box<ExprLoc>,
    },
    ListComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<ExprLoc>,
        value: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    Lambda {
        parameters: Box<Parameters>,
        body: Box<ExprLoc>,
    },
    /// Function call; `*args` unpacking appears in `args` as `Starred`.
    Call {
        func: Box<ExprLoc>,
        args: Vec<ExprLoc>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        object: Box<ExprLoc>,
        attr: StringId,
        ctx: ExprContext,
    },
    Subscript {
        object: Box<ExprLoc>,
        index: Box<ExprLoc>,
        ctx: ExprContext,
    },
    Starred {
        value: Box<ExprLoc>,
        ctx: ExprContext,
    },
    List {
        elts: Vec<ExprLoc>,
        ctx: ExprContext,
    },
    Tuple {
        elts: Vec<ExprLoc>,
        ctx: ExprContext,
    },
    Dict(Vec<DictItem>),
    Set(Vec<ExprLoc>),
    /// Slice from `x[start:stop:step]` syntax; only valid as a subscript index.
    Slice {
        lower: Option<Box<ExprLoc>>,
        upper: Option<Box<ExprLoc>>,
        step: Option<Box<ExprLoc>>,
    },
}

/// An expression with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprLoc {
    pub position: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    pub fn new(position: CodeRange, expr: Expr) -> Self {
        Self { position, expr }
    }

    /// A name reference.
    pub fn name(position: CodeRange, symbol: impl Into<Symbol>, ctx: ExprContext) -> Self {
        Self::new(
            position,
            Expr::Name {
                symbol: symbol.into(),
                ctx,
            },
        )
    }

    /// `object.attr`
    pub fn attribute(position: CodeRange, object: Self, attr: StringId, ctx: ExprContext) -> Self {
        Self::new(
            position,
            Expr::Attribute {
                object: Box::new(object),
                attr,
                ctx,
            },
        )
    }

    /// A call with positional arguments only.
    pub fn call(position: CodeRange, func: Self, args: Vec<Self>) -> Self {
        Self::new(
            position,
            Expr::Call {
                func: Box::new(func),
                args,
                keywords: Vec::new(),
            },
        )
    }

    /// A call to a runtime library entry point.
    pub fn runtime_call(position: CodeRange, function: RuntimeFn, args: Vec<Self>) -> Self {
        Self::call(position, Self::new(position, Expr::Runtime(function)), args)
    }

    /// `lambda: body`
    pub fn thunk(body: Self) -> Self {
        Self::lambda(Parameters::default(), body)
    }

    /// `lambda <parameters>: body`
    pub fn lambda(parameters: Parameters, body: Self) -> Self {
        Self::new(
            body.position,
            Expr::Lambda {
                parameters: Box::new(parameters),
                body: Box::new(body),
            },
        )
    }

    /// A string literal.
    pub fn str(position: CodeRange, value: StringId) -> Self {
        Self::new(position, Expr::Literal(Literal::Str(value)))
    }
}

/// `context_expr as optional_vars`
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: ExprLoc,
    pub optional_vars: Option<ExprLoc>,
}

/// One `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub exc_type: Option<ExprLoc>,
    pub name: Option<Symbol>,
    pub body: Vec<Node>,
    pub position: CodeRange,
}

/// `try: ... except: ... else: ... finally: ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Try {
    pub body: Vec<Node>,
    pub handlers: Vec<ExceptHandler>,
    pub or_else: Vec<Node>,
    pub finally: Vec<Node>,
}

/// One name in an `import` or `from ... import` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    /// Imported name as written, possibly dotted (`os.path`), or `*`.
    pub name: StringId,
    pub asname: Option<StringId>,
    /// The name the statement binds: the alias, else the first segment of `name`.
    /// `None` for `*` imports.
    pub binding: Option<StringId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Symbol,
    pub parameters: Parameters,
    pub body: Vec<Node>,
    /// Decorator expressions, outermost first.
    pub decorators: Vec<ExprLoc>,
    pub position: CodeRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: Symbol,
    pub bases: Vec<ExprLoc>,
    pub keywords: Vec<Keyword>,
    pub body: Vec<Node>,
    pub decorators: Vec<ExprLoc>,
    pub position: CodeRange,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Pass,
    Expr(ExprLoc),
    Return {
        value: Option<ExprLoc>,
        position: CodeRange,
    },
    /// `a = b = value` keeps every target; the rewrite only accepts one.
    Assign {
        targets: Vec<ExprLoc>,
        value: ExprLoc,
        position: CodeRange,
    },
    AugAssign {
        target: ExprLoc,
        op: Operator,
        value: ExprLoc,
        position: CodeRange,
    },
    Delete(Vec<ExprLoc>),
    If {
        test: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
        position: CodeRange,
    },
    While {
        test: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
    },
    For {
        target: ExprLoc,
        iter: ExprLoc,
        body: Vec<Node>,
        or_else: Vec<Node>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Node>,
    },
    Raise {
        exc: Option<ExprLoc>,
        cause: Option<ExprLoc>,
    },
    Try(Try),
    Assert {
        test: ExprLoc,
        msg: Option<ExprLoc>,
    },
    FunctionDef(Box<FunctionDef>),
    ClassDef(Box<ClassDef>),
    Import {
        names: Vec<ImportAlias>,
        position: CodeRange,
    },
    ImportFrom {
        module: Option<StringId>,
        names: Vec<ImportAlias>,
        level: u32,
        position: CodeRange,
    },
    Global {
        names: Vec<StringId>,
        position: CodeRange,
    },
    Nonlocal {
        names: Vec<StringId>,
        position: CodeRange,
    },
    Break {
        position: CodeRange,
    },
    Continue {
        position: CodeRange,
    },
}

impl Node {
    /// `target = value` with a single target.
    #[must_use]
    pub fn assign(target: ExprLoc, value: ExprLoc) -> Self {
        let position = target.position;
        Self::Assign {
            targets: vec![target],
            value,
            position,
        }
    }

    /// Statement lists nested directly in this statement, including a definition's body.
    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<Self>> {
        match self {
            Self::FunctionDef(def) => vec![&mut def.body],
            Self::ClassDef(class) => vec![&mut class.body],
            Self::If { body, or_else, .. } | Self::While { body, or_else, .. } | Self::For { body, or_else, .. } => {
                vec![body, or_else]
            }
            Self::With { body, .. } => vec![body],
            Self::Try(t) => {
                let mut blocks = vec![&mut t.body];
                blocks.extend(t.handlers.iter_mut().map(|handler| &mut handler.body));
                blocks.push(&mut t.or_else);
                blocks.push(&mut t.finally);
                blocks
            }
            _ => Vec::new(),
        }
    }

    /// True for a string-literal expression statement, i.e. a docstring when first in a body.
    #[must_use]
    pub fn is_docstring(&self) -> bool {
        matches!(
            self,
            Self::Expr(ExprLoc {
                expr: Expr::Literal(Literal::Str(_)),
                ..
            })
        )
    }
}
