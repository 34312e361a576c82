//! Rewrite rules checked through the printed output.
//!
//! The fixture files under `tests/desugar_cases` cover the common shapes; these tests pin
//! down the less common interactions between rules and the options that change output.

use facetrans::{DesugarOptions, desugar_source};
use pretty_assertions::assert_eq;

/// Rewrites functions marked `@jeeves` and prints the result.
fn desugar(code: &str) -> String {
    desugar_source(code, &DesugarOptions::default())
        .expect("rewrite should succeed")
        .to_source()
}

/// Rewrites the whole module and prints the result.
fn desugar_module(code: &str) -> String {
    desugar_source(code, &DesugarOptions::whole_module())
        .expect("rewrite should succeed")
        .to_source()
}

#[test]
fn boolean_chain_folds_from_the_right() {
    assert_eq!(
        desugar_module("x = a and b and c\n"),
        "x = JeevesLib.jassign(globals().get('x'), JeevesLib.jand(lambda: a, lambda: JeevesLib.jand(lambda: b, lambda: c)))\n"
    );
}

#[test]
fn plain_comparisons_stay_native() {
    assert_eq!(
        desugar_module("x = a < b <= c\n"),
        "x = JeevesLib.jassign(globals().get('x'), a < b <= c)\n"
    );
}

#[test]
fn module_names_assigned_in_a_branch_go_through_runtime() {
    assert_eq!(
        desugar_module("x = 0\nif c:\n    x = 1\n    x -= y\n"),
        "\
x = JeevesLib.jassign(globals().get('x'), 0)
def _jv_then0():
    global x
    x = JeevesLib.jassign(globals().get('x'), 1)
    x = JeevesLib.jassign(x, x - y)
def _jv_else1():
    pass
JeevesLib.jif(c, _jv_then0, _jv_else1)
"
    );
}

#[test]
fn class_level_assignment_reads_the_class_namespace() {
    assert_eq!(
        desugar_module("class C:\n    n = 1\n    n += 1\n"),
        "\
class C:
    n = JeevesLib.jassign(locals().get('n'), 1)
    n = JeevesLib.jassign(n, n + 1)
"
    );
}

#[test]
fn module_attribute_assignment_goes_through_runtime() {
    assert_eq!(
        desugar_module("obj.x = 1\n"),
        "obj.x = JeevesLib.jassign(JeevesLib.jgetattr(obj, 'x'), 1)\n"
    );
}

#[test]
fn subscript_target_is_split_even_for_bare_names() {
    assert_eq!(
        desugar_module("d[k] = v\n"),
        "\
_jv_tmp0 = d
_jv_tmp1 = k
_jv_tmp0[_jv_tmp1] = JeevesLib.jassign(JeevesLib.jgetitem(_jv_tmp0, _jv_tmp1), v)
"
    );
}

#[test]
fn unmarked_functions_are_left_alone() {
    let code = "\
@other
@jeeves
def f(a):
    return not a

def g(a):
    return not a
";
    assert_eq!(
        desugar(code),
        "\
@other
def f(a):
    _jv_ns0 = JeevesLib.Namespace({'a': a})
    return JeevesLib.jnot(_jv_ns0.a)
def g(a):
    return not a
"
    );
}

#[test]
fn marked_functions_are_found_in_classes_and_blocks() {
    let code = "\
class C:
    @jeeves
    def get(self, a):
        return not a

if debug:
    @jeeves
    def h(b):
        return not b
";
    assert_eq!(
        desugar(code),
        "\
class C:
    def get(self, a):
        _jv_ns0 = JeevesLib.Namespace({'self': self, 'a': a})
        return JeevesLib.jnot(_jv_ns0.a)
if debug:
    def h(b):
        _jv_ns1 = JeevesLib.Namespace({'b': b})
        return JeevesLib.jnot(_jv_ns1.b)
"
    );
}

#[test]
fn marker_inside_a_marked_function_is_removed() {
    let code = "\
@jeeves
def outer(a):
    @jeeves
    def inner():
        return a
    return inner
";
    assert_eq!(
        desugar(code),
        "\
def outer(a):
    _jv_ns0 = JeevesLib.Namespace({'a': a})
    def inner():
        _jv_ns1 = JeevesLib.Namespace({})
        return _jv_ns0.a
    _jv_ns0.inner = inner
    return _jv_ns0.inner
"
    );
}

#[test]
fn docstring_stays_first() {
    let code = "\
@jeeves
def f(a):
    \"\"\"Negate.\"\"\"
    return not a
";
    assert_eq!(
        desugar(code),
        "\
def f(a):
    'Negate.'
    _jv_ns0 = JeevesLib.Namespace({'a': a})
    return JeevesLib.jnot(_jv_ns0.a)
"
    );
}

#[test]
fn lambda_parameters_shadow_namespaced_names() {
    let code = "\
@jeeves
def f(x):
    g = lambda x: x + 1
    return g(x)
";
    assert_eq!(
        desugar(code),
        "\
def f(x):
    _jv_ns0 = JeevesLib.Namespace({'x': x})
    _jv_ns0.g = JeevesLib.jassign(JeevesLib.jgetattr(_jv_ns0, 'g'), lambda x: x + 1)
    return _jv_ns0.g(_jv_ns0.x)
"
    );
}

#[test]
fn set_comprehension_stays_native() {
    let code = "\
@jeeves
def f(ys, k):
    s = {y * k for y in ys}
";
    assert_eq!(
        desugar(code),
        "\
def f(ys, k):
    _jv_ns0 = JeevesLib.Namespace({'ys': ys, 'k': k})
    _jv_ns0.s = JeevesLib.jassign(JeevesLib.jgetattr(_jv_ns0, 's'), {y * _jv_ns0.k for y in _jv_ns0.ys})
"
    );
}

#[test]
fn declared_global_is_assigned_through_runtime_in_branch() {
    let code = "\
@jeeves
def f():
    global counter
    if flag:
        counter = 1
";
    assert_eq!(
        desugar(code),
        "\
def f():
    _jv_ns0 = JeevesLib.Namespace({})
    global counter
    def _jv_then1():
        global counter
        counter = JeevesLib.jassign(globals().get('counter'), 1)
    def _jv_else2():
        pass
    JeevesLib.jif(flag, _jv_then1, _jv_else2)
"
    );
}

#[test]
fn break_inside_a_loop_within_a_branch_is_allowed() {
    let code = "\
@jeeves
def f(xs):
    for x in xs:
        if x:
            while True:
                break
";
    assert_eq!(
        desugar(code),
        "\
def f(xs):
    _jv_ns0 = JeevesLib.Namespace({'xs': xs})
    for _jv_ns0.x in _jv_ns0.xs:
        def _jv_then1():
            while True:
                break
        def _jv_else2():
            pass
        JeevesLib.jif(_jv_ns0.x, _jv_then1, _jv_else2)
"
    );
}

#[test]
fn except_name_is_rebound_through_temporary() {
    let code = "\
@jeeves
def f(g):
    try:
        g()
    except ValueError as e:
        return e
";
    assert_eq!(
        desugar(code),
        "\
def f(g):
    _jv_ns0 = JeevesLib.Namespace({'g': g})
    try:
        _jv_ns0.g()
    except ValueError as _jv_tmp1:
        _jv_ns0.e = JeevesLib.jassign(JeevesLib.jgetattr(_jv_ns0, 'e'), _jv_tmp1)
        return _jv_ns0.e
"
    );
}

#[test]
fn import_inside_function_is_published() {
    let code = "\
@jeeves
def f():
    import os.path
    return os.sep
";
    assert_eq!(
        desugar(code),
        "\
def f():
    _jv_ns0 = JeevesLib.Namespace({})
    import os.path
    _jv_ns0.os = os
    return _jv_ns0.os.sep
"
    );
}

#[test]
fn custom_runtime_names() {
    let options = DesugarOptions::from_json(
        r#"{"runtime": {"module": "facets.rt", "conditional_value": "cond"}, "marker": null}"#,
    )
    .unwrap();
    let out = desugar_source("y = a if c else b\n", &options).unwrap();
    assert_eq!(out.to_source(), "y = facets.rt.jassign(globals().get('y'), facets.rt.cond(c, lambda: a, lambda: b))\n");
}

#[test]
fn emitted_import_follows_docstring_and_future_imports() {
    let options = DesugarOptions {
        emit_import: true,
        ..DesugarOptions::whole_module()
    };
    let code = "\
\"\"\"Module.\"\"\"
from __future__ import annotations
x = not y
";
    let out = desugar_source(code, &options).unwrap();
    assert_eq!(
        out.to_source(),
        "\
'Module.'
from __future__ import annotations
import JeevesLib
x = JeevesLib.jassign(globals().get('x'), JeevesLib.jnot(y))
"
    );
}

#[test]
fn symbol_prefix_avoids_user_names() {
    let code = "\
@jeeves
def f(_jv_ns0):
    return not _jv_ns0
";
    assert_eq!(
        desugar(code),
        "\
def f(_jv_ns0):
    __jv_ns0 = JeevesLib.Namespace({'_jv_ns0': _jv_ns0})
    return JeevesLib.jnot(__jv_ns0._jv_ns0)
"
    );
}

#[test]
fn symbols_are_unique_across_marked_functions() {
    let code = "\
@jeeves
def f(a):
    return a

@jeeves
def g(b):
    return b
";
    assert_eq!(
        desugar(code),
        "\
def f(a):
    _jv_ns0 = JeevesLib.Namespace({'a': a})
    return _jv_ns0.a
def g(b):
    _jv_ns1 = JeevesLib.Namespace({'b': b})
    return _jv_ns1.b
"
    );
}
