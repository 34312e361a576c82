//! Left-hand-side splitting for assignments routed through the runtime's `assign`.
//!
//! `obj().attr[idx()] = v()` becomes
//!
//! ```text
//! tmp0 = obj().attr
//! tmp1 = idx()
//! tmp0[tmp1] = rt.jassign(rt.jgetitem(tmp0, tmp1), v())
//! ```
//!
//! so every side-effecting subexpression of the target runs exactly once, before the value.

use crate::{
    error::{DesugarError, UnsupportedConstruct},
    expressions::{Expr, ExprContext, ExprLoc, Node},
    fresh::FreshSymbol,
    runtime::RuntimeFn,
};

/// A target whose subexpressions have been moved into temporaries.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTarget {
    /// `tmp = subexpression` statements, in evaluation order.
    pub temporaries: Vec<Node>,
    /// The simplified target, still in store context.
    pub target: ExprLoc,
}

/// Extracts the object of an attribute target (unless it is already a bare name) and both
/// the object and index of a subscript target into temporaries.
///
/// `fresh` allocates one temporary per call. Only the outermost node is split; extracted
/// subtrees are kept whole.
pub fn split_target(
    target: ExprLoc,
    fresh: &mut impl FnMut() -> FreshSymbol,
) -> Result<SplitTarget, DesugarError> {
    let position = target.position;
    match target.expr {
        Expr::Name { .. } => Ok(SplitTarget {
            temporaries: Vec::new(),
            target,
        }),
        Expr::Attribute { object, attr, ctx } => {
            if matches!(object.expr, Expr::Name { .. }) {
                return Ok(SplitTarget {
                    temporaries: Vec::new(),
                    target: ExprLoc::attribute(position, *object, attr, ctx),
                });
            }
            let (temporary, object) = extract(*object, fresh);
            Ok(SplitTarget {
                temporaries: vec![temporary],
                target: ExprLoc::attribute(position, object, attr, ctx),
            })
        }
        Expr::Subscript { object, index, ctx } => {
            if is_slice(&index) {
                return Err(DesugarError::unsupported(
                    UnsupportedConstruct::SliceAssignmentTarget,
                    index.position,
                ));
            }
            let (object_temporary, object) = extract(*object, fresh);
            let (index_temporary, index) = extract(*index, fresh);
            Ok(SplitTarget {
                temporaries: vec![object_temporary, index_temporary],
                target: ExprLoc::new(
                    position,
                    Expr::Subscript {
                        object: Box::new(object),
                        index: Box::new(index),
                        ctx,
                    },
                ),
            })
        }
        _ => Err(DesugarError::invariant(
            "assignment target is not a name, attribute or subscript",
            position,
        )),
    }
}

/// Binds `expr` to a new temporary; returns the binding statement and a load of the temporary.
fn extract(expr: ExprLoc, fresh: &mut impl FnMut() -> FreshSymbol) -> (Node, ExprLoc) {
    let position = expr.position;
    let symbol = fresh();
    let binding = Node::assign(ExprLoc::name(position, symbol, ExprContext::Store), expr);
    (binding, ExprLoc::name(position, symbol, ExprContext::Load))
}

fn is_slice(index: &ExprLoc) -> bool {
    match &index.expr {
        Expr::Slice { .. } => true,
        Expr::Tuple { elts, .. } => elts.iter().any(|e| matches!(e.expr, Expr::Slice { .. })),
        _ => false,
    }
}

/// Copy of a split target with every store/delete context flipped to load.
#[must_use]
pub fn to_load(target: &ExprLoc) -> ExprLoc {
    let mut load = target.clone();
    flip_to_load(&mut load);
    load
}

fn flip_to_load(expr: &mut ExprLoc) {
    match &mut expr.expr {
        Expr::Name { ctx, .. } => *ctx = ExprContext::Load,
        Expr::Attribute { object, ctx, .. } => {
            *ctx = ExprContext::Load;
            flip_to_load(object);
        }
        Expr::Subscript { object, index, ctx } => {
            *ctx = ExprContext::Load;
            flip_to_load(object);
            flip_to_load(index);
        }
        Expr::Starred { value, ctx } => {
            *ctx = ExprContext::Load;
            flip_to_load(value);
        }
        Expr::List { elts, ctx } | Expr::Tuple { elts, ctx } => {
            *ctx = ExprContext::Load;
            elts.iter_mut().for_each(flip_to_load);
        }
        _ => {}
    }
}

/// Turns a load of a split target into a read that never triggers attribute or item hooks
/// on faceted objects: attributes go through `getAttr`, subscripts through `getItem`.
#[must_use]
pub fn unassigned_read(load: ExprLoc) -> ExprLoc {
    let position = load.position;
    match load.expr {
        Expr::Attribute { object, attr, .. } => ExprLoc::runtime_call(
            position,
            RuntimeFn::GetAttr,
            vec![*object, ExprLoc::str(position, attr)],
        ),
        Expr::Subscript { object, index, .. } => {
            ExprLoc::runtime_call(position, RuntimeFn::GetItem, vec![*object, *index])
        }
        expr => ExprLoc::new(position, expr),
    }
}
