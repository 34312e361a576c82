//! Rejected constructs and parse failures, with the positions they are reported at.

use facetrans::{DesugarError, DesugarOptions, MAX_NESTING_DEPTH, ParseError, UnsupportedConstruct, desugar_source};
use pretty_assertions::assert_eq;

/// Rewrites `code` in marker mode, expecting failure.
fn desugar_err(code: &str) -> DesugarError {
    desugar_source(code, &DesugarOptions::default()).expect_err("expected rewrite to fail")
}

/// The rejected construct and its 1-based line and column.
fn rejection(code: &str) -> (UnsupportedConstruct, u32, u32) {
    let err = desugar_err(code);
    let construct = err
        .construct()
        .unwrap_or_else(|| panic!("expected an unsupported construct, got: {err}"));
    let start = err.position().start();
    (construct, start.line, start.column)
}

#[test]
fn filtered_comprehension_points_at_filter() {
    let code = "@jeeves\ndef f(xs):\n    return [x for x in xs if x]\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::FilteredComprehension, 3, 30));
}

#[test]
fn comprehension_with_pattern_target() {
    let code = "@jeeves\ndef f(ps):\n    return [a + b for a, b in ps]\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::ComprehensionTargetPattern, 3, 23));
}

#[test]
fn chained_assignment() {
    let code = "@jeeves\ndef f():\n    a = b = 1\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::MultiTargetAssignment, 3, 5));
}

#[test]
fn destructuring_assignment() {
    let code = "@jeeves\ndef f(t):\n    a, b = t\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::DestructuringAssignment, 3, 5));
}

#[test]
fn slice_assignment_points_at_slice() {
    let code = "@jeeves\ndef f(xs, ys):\n    xs[1:2] = ys\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::SliceAssignmentTarget, 3, 8));
}

#[test]
fn chained_membership() {
    let code = "@jeeves\ndef f(a, b, c):\n    return a in b in c\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::ChainedMembershipComparison, 3, 12));
}

#[test]
fn return_inside_branch() {
    let code = "@jeeves\ndef f(a):\n    if a:\n        return 1\n    return 2\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::ControlTransferInBranch, 4, 9));
}

#[test]
fn break_leaving_branch() {
    let code = "\
@jeeves
def f(xs):
    for x in xs:
        if x:
            pass
        else:
            break
";
    assert_eq!(rejection(code), (UnsupportedConstruct::ControlTransferInBranch, 7, 13));
}

#[test]
fn conditional_binding_in_class_body() {
    let code = "@jeeves\ndef f(flag):\n    class C:\n        if flag:\n            y = 1\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::ConditionalClassBinding, 4, 9));
}

#[test]
fn class_local_read_from_deferred_operand() {
    let code = "@jeeves\ndef f(flag):\n    class C:\n        a = 1\n        b = a if flag else 2\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::ConditionalClassBinding, 5, 13));
}

#[test]
fn rebinding_runtime_module() {
    let code = "@jeeves\ndef f():\n    JeevesLib = 3\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::RuntimeAliasShadowed, 3, 5));

    let code = "@jeeves\ndef f():\n    import json as JeevesLib\n";
    assert_eq!(rejection(code), (UnsupportedConstruct::RuntimeAliasShadowed, 3, 5));
}

#[test]
fn plain_import_of_runtime_module_is_allowed() {
    let out = desugar_source("import JeevesLib\nx = not y\n", &DesugarOptions::whole_module()).unwrap();
    assert_eq!(out.to_source(), "import JeevesLib\nx = JeevesLib.jassign(globals().get('x'), JeevesLib.jnot(y))\n");
}

#[test]
fn one_failing_unit_fails_the_whole_module() {
    let code = "\
@jeeves
def good(a):
    return not a

@jeeves
def bad(t):
    a, b = t
";
    let err = desugar_err(code);
    assert_eq!(err.construct(), Some(UnsupportedConstruct::DestructuringAssignment));
}

#[test]
fn error_display_includes_position() {
    let err = desugar_err("@jeeves\ndef f():\n    a = b = 1\n");
    assert_eq!(
        err.to_string(),
        "3:5: unsupported construct: assignment with more than one target"
    );
    assert_eq!(UnsupportedConstruct::MultiTargetAssignment.code(), "multi-target-assignment");
}

#[test]
fn syntax_error_is_a_parse_error() {
    let err = desugar_err("def f(:\n    pass\n");
    assert!(
        matches!(err, DesugarError::Parse(ParseError::Syntax { .. })),
        "expected syntax error, got: {err}"
    );
    assert_eq!(err.construct(), None);
}

#[test]
fn unsupported_syntax_has_descriptive_message() {
    let err = desugar_err("async def f():\n    pass\n");
    assert!(
        matches!(err, DesugarError::Parse(ParseError::NotImplemented { .. })),
        "expected not-implemented error, got: {err}"
    );
    assert!(
        err.to_string().contains("facetrans does not support async functions"),
        "message should mention unsupported feature, got: {err}"
    );
}

/// True when `code` fails in whole-module mode with a syntax-level parse error.
fn exceeds_nesting(code: &str) -> bool {
    matches!(
        desugar_source(code, &DesugarOptions::whole_module()),
        Err(DesugarError::Parse(ParseError::Syntax { .. }))
    )
}

#[test]
fn long_boolean_chain_counts_against_nesting_limit() {
    let operands = usize::from(MAX_NESTING_DEPTH);
    let chain = |n: usize| format!("x = {}\n", vec!["a"; n].join(" and "));
    assert!(exceeds_nesting(&chain(operands)));
    assert!(!exceeds_nesting(&chain(operands / 2)));
}

#[test]
fn long_elif_chain_counts_against_nesting_limit() {
    let chain = |n: usize| {
        let mut code = String::from("if a:\n    pass\n");
        for _ in 0..n {
            code.push_str("elif a:\n    pass\n");
        }
        code
    };
    let clauses = usize::from(MAX_NESTING_DEPTH);
    assert!(exceeds_nesting(&chain(clauses)));
    assert!(!exceeds_nesting(&chain(clauses / 2)));
}
