use facetrans::{
    DEFAULT_PREFIX, FreshNames, InternerBuilder, RuntimeNames, StringId, SymbolKind,
    expressions::{FunctionDef, Node},
    parse,
    scope::{Binding, FrameKind, ScopeContext, analyze_function, collect_stored_names},
};
use pretty_assertions::assert_eq;

/// Parses `code` and returns its first statement, which must be a `def`, with the interner.
fn parse_function(code: &str) -> (FunctionDef, InternerBuilder) {
    let parsed = parse(code).unwrap();
    let Some(Node::FunctionDef(def)) = parsed.nodes.into_iter().next() else {
        panic!("expected a function definition");
    };
    (*def, parsed.interner)
}

fn names(interner: &InternerBuilder, ids: impl IntoIterator<Item = StringId>) -> Vec<String> {
    ids.into_iter().map(|id| interner.get_str(id).to_owned()).collect()
}

fn id(interner: &InternerBuilder, name: &str) -> StringId {
    interner.try_get_str_id(name).unwrap()
}

#[test]
fn function_owns_params_and_every_binding_form() {
    let code = "\
def f(a, /, b=1, *args, c, **kw):
    x = 1
    for i in a:
        pass
    with g() as (p, q):
        pass
    try:
        pass
    except E as e:
        pass
    import os.path
    from m import n as alias
    def inner():
        y = 1
    class K:
        z = 1
    global G
    G = 2
";
    let (def, interner) = parse_function(code);
    let scope = analyze_function(&def);
    assert_eq!(names(&interner, scope.params.iter().copied()), ["a", "b", "args", "c", "kw"]);
    assert_eq!(
        names(&interner, scope.locals.iter().copied()),
        ["x", "i", "p", "q", "e", "os", "alias", "inner", "K"]
    );
    assert_eq!(names(&interner, scope.globals.iter().copied()), ["G"]);
    assert!(scope.nonlocals.is_empty());
}

#[test]
fn declarations_inside_blocks_are_found() {
    let code = "\
def f():
    def g():
        if c:
            nonlocal v
        v = 1
    v = 0
";
    let (def, interner) = parse_function(code);
    let Node::FunctionDef(inner) = &def.body[0] else {
        panic!("expected nested function");
    };
    let scope = analyze_function(inner);
    assert_eq!(names(&interner, scope.nonlocals.iter().copied()), ["v"]);
    assert!(scope.locals.is_empty());
}

#[test]
fn parameter_reassignment_is_not_a_local() {
    let (def, interner) = parse_function("def f(a):\n    a = a + 1\n    b = a\n");
    let scope = analyze_function(&def);
    assert_eq!(names(&interner, scope.owned()), ["a", "b"]);
}

#[test]
fn stored_names_skip_nested_scopes() {
    let (def, interner) = parse_function("def f():\n    x = [y for y in z]\n    h = lambda w: w\n    del d\n");
    let stored = collect_stored_names(&def.body);
    assert_eq!(names(&interner, stored), ["x", "h", "d"]);
}

#[test]
fn context_maps_owned_names_to_namespace() {
    let (def, interner) = parse_function("def f(a):\n    global g\n    b = 1\n");
    let scope = analyze_function(&def);
    let mut fresh = FreshNames::new(DEFAULT_PREFIX, &interner, &RuntimeNames::default());
    let ns = fresh.next(SymbolKind::Namespace);

    let module = ScopeContext::module();
    assert_eq!(module.frame(), FrameKind::Module);
    let ctx = module.enter_function(&scope, ns);
    assert_eq!(ctx.frame(), FrameKind::Function);
    assert_eq!(ctx.lookup(id(&interner, "a")), Binding::Namespace(ns));
    assert_eq!(ctx.lookup(id(&interner, "b")), Binding::Namespace(ns));
    assert_eq!(ctx.lookup(id(&interner, "g")), Binding::Global);
    assert_eq!(ctx.lookup(id(&interner, "f")), Binding::Host);
    assert_eq!(ctx.namespace_of(id(&interner, "a")), Some(ns));

    let shadowed = ctx.with_hosts([id(&interner, "a")]);
    assert_eq!(shadowed.lookup(id(&interner, "a")), Binding::Host);
    assert_eq!(shadowed.lookup(id(&interner, "b")), Binding::Namespace(ns));
    // the original context is unchanged
    assert_eq!(ctx.lookup(id(&interner, "a")), Binding::Namespace(ns));
}

#[test]
fn class_locals_are_hidden_from_branches_and_methods() {
    let code = "\
def f(v):
    class C:
        size = 1
        def get(self):
            return v
";
    let (def, interner) = parse_function(code);
    let Node::ClassDef(class) = &def.body[0] else {
        panic!("expected class");
    };
    let Node::FunctionDef(method) = &class.body[1] else {
        panic!("expected method");
    };
    let mut fresh = FreshNames::new(DEFAULT_PREFIX, &interner, &RuntimeNames::default());
    let outer_ns = fresh.next(SymbolKind::Namespace);
    let method_ns = fresh.next(SymbolKind::Namespace);
    let size = id(&interner, "size");
    let v = id(&interner, "v");

    let ctx = ScopeContext::module().enter_function(&analyze_function(&def), outer_ns);
    let class_ctx = ctx.enter_class(&collect_stored_names(&class.body));
    assert_eq!(class_ctx.frame(), FrameKind::Class);
    assert_eq!(class_ctx.lookup(size), Binding::Host);
    assert_eq!(class_ctx.lookup(v), Binding::Namespace(outer_ns));

    let branch = class_ctx.enter_branch();
    assert_eq!(branch.lookup(size), Binding::ClassBody);
    assert_eq!(branch.namespace_of(size), None);

    let method_ctx = class_ctx.enter_function(&analyze_function(method), method_ns);
    assert_eq!(method_ctx.lookup(size), Binding::Host);
    assert_eq!(method_ctx.lookup(v), Binding::Namespace(outer_ns));
    assert_eq!(method_ctx.lookup(id(&interner, "self")), Binding::Namespace(method_ns));
}
