//! Scope analysis and the scope context threaded through the rewrite.
//!
//! [`analyze_function`] answers which names a function owns: its parameters and every name
//! it binds, minus names declared `global`/`nonlocal`. Descent stops at nested `def`,
//! `class` and `lambda` bodies since those are separate scopes, but the name a nested
//! `def`/`class` binds belongs to the enclosing scope.
//!
//! [`ScopeContext`] maps each visible name to where its storage lives. It is never mutated
//! in place: entering a scope produces an extended copy, so sibling scopes cannot leak
//! bindings into each other.

use ahash::{AHashMap, AHashSet};
use indexmap::IndexSet;

use crate::{
    expressions::{Expr, ExprContext, ExprLoc, FunctionDef, Node, Parameters, Symbol},
    fresh::FreshSymbol,
    intern::StringId,
};

/// Names owned by one function scope. All sets keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionScope {
    /// Names bound in the body, excluding parameters and declared globals/nonlocals.
    pub locals: IndexSet<StringId>,
    /// Parameter names in declaration order.
    pub params: Vec<StringId>,
    /// Names declared `global` anywhere in the body.
    pub globals: IndexSet<StringId>,
    /// Names declared `nonlocal` anywhere in the body.
    pub nonlocals: IndexSet<StringId>,
}

impl FunctionScope {
    /// Parameters followed by locals: every name that lives in the function's namespace.
    pub fn owned(&self) -> impl Iterator<Item = StringId> + '_ {
        self.params.iter().copied().chain(self.locals.iter().copied())
    }
}

/// Computes the names a function owns.
#[must_use]
pub fn analyze_function(def: &FunctionDef) -> FunctionScope {
    let mut scope = analyze_parameters(&def.parameters);
    collect_declarations_from_body(&def.body, &mut scope.globals, &mut scope.nonlocals);
    let stored = collect_stored_names(&def.body);
    scope.locals = stored
        .into_iter()
        .filter(|name| !scope.globals.contains(name) && !scope.nonlocals.contains(name) && !scope.params.contains(name))
        .collect();
    scope
}

/// Scope of a lambda: only its parameters, since a lambda body cannot bind names.
#[must_use]
pub fn analyze_parameters(parameters: &Parameters) -> FunctionScope {
    FunctionScope {
        params: parameters.names().filter_map(Symbol::user).collect(),
        ..FunctionScope::default()
    }
}

/// Every user name bound by `body`, without descending into nested scopes.
#[must_use]
pub fn collect_stored_names(body: &[Node]) -> IndexSet<StringId> {
    collect_stored_symbols(body).into_iter().filter_map(Symbol::user).collect()
}

fn collect_stored_symbols(body: &[Node]) -> IndexSet<Symbol> {
    let mut stored = IndexSet::new();
    for node in body {
        collect_stored_from_node(node, &mut stored);
    }
    stored
}

fn collect_stored_from_node(node: &Node, stored: &mut IndexSet<Symbol>) {
    match node {
        Node::Assign { targets, .. } => {
            for target in targets {
                collect_target_names(target, stored);
            }
        }
        Node::AugAssign { target, .. } => collect_target_names(target, stored),
        Node::Delete(targets) => {
            for target in targets {
                collect_target_names(target, stored);
            }
        }
        Node::For {
            target, body, or_else, ..
        } => {
            collect_target_names(target, stored);
            collect_stored_from_body(body, stored);
            collect_stored_from_body(or_else, stored);
        }
        Node::While { body, or_else, .. } | Node::If { body, or_else, .. } => {
            collect_stored_from_body(body, stored);
            collect_stored_from_body(or_else, stored);
        }
        Node::With { items, body } => {
            for var in items.iter().filter_map(|item| item.optional_vars.as_ref()) {
                collect_target_names(var, stored);
            }
            collect_stored_from_body(body, stored);
        }
        Node::Try(t) => {
            collect_stored_from_body(&t.body, stored);
            for handler in &t.handlers {
                if let Some(name) = handler.name {
                    stored.insert(name);
                }
                collect_stored_from_body(&handler.body, stored);
            }
            collect_stored_from_body(&t.or_else, stored);
            collect_stored_from_body(&t.finally, stored);
        }
        // the definition binds its name here; its body is a separate scope
        Node::FunctionDef(def) => {
            stored.insert(def.name);
        }
        Node::ClassDef(class) => {
            stored.insert(class.name);
        }
        Node::Import { names, .. } | Node::ImportFrom { names, .. } => {
            stored.extend(names.iter().filter_map(|alias| alias.binding).map(Symbol::User));
        }
        Node::Pass
        | Node::Expr(_)
        | Node::Return { .. }
        | Node::Raise { .. }
        | Node::Assert { .. }
        | Node::Global { .. }
        | Node::Nonlocal { .. }
        | Node::Break { .. }
        | Node::Continue { .. } => {}
    }
}

fn collect_stored_from_body(body: &[Node], stored: &mut IndexSet<Symbol>) {
    for node in body {
        collect_stored_from_node(node, stored);
    }
}

/// User names bound by one assignment or loop target.
#[must_use]
pub fn target_names(target: &ExprLoc) -> IndexSet<StringId> {
    let mut stored = IndexSet::new();
    collect_target_names(target, &mut stored);
    stored.into_iter().filter_map(Symbol::user).collect()
}

/// Collects the names a target binds: plain names, including inside tuple/list/starred
/// patterns. Attribute and subscript targets bind nothing.
fn collect_target_names(target: &ExprLoc, stored: &mut IndexSet<Symbol>) {
    match &target.expr {
        Expr::Name {
            symbol,
            ctx: ExprContext::Store | ExprContext::Del,
        } => {
            stored.insert(*symbol);
        }
        Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
            for elt in elts {
                collect_target_names(elt, stored);
            }
        }
        Expr::Starred { value, .. } => collect_target_names(value, stored),
        _ => {}
    }
}

fn collect_declarations_from_node(node: &Node, globals: &mut IndexSet<StringId>, nonlocals: &mut IndexSet<StringId>) {
    match node {
        Node::Global { names, .. } => {
            globals.extend(names.iter().copied());
        }
        Node::Nonlocal { names, .. } => {
            nonlocals.extend(names.iter().copied());
        }
        Node::For { body, or_else, .. } | Node::While { body, or_else, .. } | Node::If { body, or_else, .. } => {
            collect_declarations_from_body(body, globals, nonlocals);
            collect_declarations_from_body(or_else, globals, nonlocals);
        }
        Node::With { body, .. } => collect_declarations_from_body(body, globals, nonlocals),
        Node::Try(t) => {
            collect_declarations_from_body(&t.body, globals, nonlocals);
            for handler in &t.handlers {
                collect_declarations_from_body(&handler.body, globals, nonlocals);
            }
            collect_declarations_from_body(&t.or_else, globals, nonlocals);
            collect_declarations_from_body(&t.finally, globals, nonlocals);
        }
        _ => {}
    }
}

fn collect_declarations_from_body(body: &[Node], globals: &mut IndexSet<StringId>, nonlocals: &mut IndexSet<StringId>) {
    for node in body {
        collect_declarations_from_node(node, globals, nonlocals);
    }
}

/// Where a name's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Ordinary host variable, left untouched.
    Host,
    /// Declared `global` in the current function, left untouched.
    Global,
    /// Stored as a field of this namespace variable.
    Namespace(FreshSymbol),
    /// Bound in the enclosing class body but referenced from a branch thunk, where the class
    /// namespace is not visible.
    ClassBody,
}

/// Kind of the innermost frame whose statements are being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameKind {
    #[default]
    Module,
    Function,
    Class,
}

/// Immutable name-to-storage mapping for one point of the rewrite.
///
/// Names not in the map are host names. Class-body bindings are tracked separately since a
/// class body is not an enclosing scope for the functions, lambdas and comprehensions
/// nested in it.
#[derive(Debug, Clone, Default)]
pub struct ScopeContext {
    bindings: AHashMap<StringId, Binding>,
    class_locals: AHashSet<StringId>,
    /// Set inside branch thunks; class locals are then out of reach.
    in_branch: bool,
    frame: FrameKind,
}

impl ScopeContext {
    /// Context for module-level code: every name is a host name.
    #[must_use]
    pub fn module() -> Self {
        Self::default()
    }

    /// Where the storage of `name` lives.
    #[must_use]
    pub fn lookup(&self, name: StringId) -> Binding {
        if self.class_locals.contains(&name) {
            return if self.in_branch { Binding::ClassBody } else { Binding::Host };
        }
        self.bindings.get(&name).copied().unwrap_or(Binding::Host)
    }

    /// Binding of a symbol; fresh symbols are always host variables.
    #[must_use]
    pub fn lookup_symbol(&self, symbol: Symbol) -> Binding {
        match symbol {
            Symbol::User(name) => self.lookup(name),
            Symbol::Fresh(_) => Binding::Host,
        }
    }

    /// The namespace variable backing `name`, if any.
    #[must_use]
    pub fn namespace_of(&self, name: StringId) -> Option<FreshSymbol> {
        match self.lookup(name) {
            Binding::Namespace(ns) => Some(ns),
            Binding::Host | Binding::Global | Binding::ClassBody => None,
        }
    }

    #[must_use]
    pub fn frame(&self) -> FrameKind {
        self.frame
    }

    /// Context for the body of a function: the owned names move into `ns`, the declared
    /// globals become untouched globals.
    #[must_use]
    pub fn enter_function(&self, scope: &FunctionScope, ns: FreshSymbol) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.extend(scope.owned().map(|name| (name, Binding::Namespace(ns))));
        bindings.extend(scope.globals.iter().map(|name| (*name, Binding::Global)));
        Self {
            bindings,
            class_locals: AHashSet::new(),
            in_branch: false,
            frame: FrameKind::Function,
        }
    }

    /// Context for a class body: every name the body binds is a host name there.
    #[must_use]
    pub fn enter_class(&self, stored: &IndexSet<StringId>) -> Self {
        Self {
            bindings: self.bindings.clone(),
            class_locals: stored.iter().copied().collect(),
            in_branch: false,
            frame: FrameKind::Class,
        }
    }

    /// Context for the body of a branch thunk. Bindings are unchanged: a branch shares the
    /// storage of the code around it.
    #[must_use]
    pub fn enter_branch(&self) -> Self {
        Self {
            in_branch: true,
            ..self.clone()
        }
    }

    /// Context for an expression scope (lambda body, comprehension element) whose
    /// parameters or targets shadow outer bindings with host names.
    #[must_use]
    pub fn with_hosts(&self, names: impl IntoIterator<Item = StringId>) -> Self {
        let mut bindings = self.bindings.clone();
        bindings.extend(names.into_iter().map(|name| (name, Binding::Host)));
        Self {
            bindings,
            class_locals: AHashSet::new(),
            in_branch: self.in_branch,
            frame: self.frame,
        }
    }
}
