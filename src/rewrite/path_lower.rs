//! Structural expansion of path expressions.
//!
//! Rewrites `EvalPath`/`EvalFilter` wrappers by peeling the outermost
//! path layer, preserving the value/boolean semantics of the path
//! applied to the input:
//!
//! - `PathIdentity` yields the input itself.
//! - `PathConstant(e)` yields `e`, discarding the input.
//! - `PathCompare(op, bound)` becomes a binary comparison of the input
//!   against the bound.
//! - `PathGet(f, sub)` wraps the input in a `getField` call and pushes
//!   the evaluation into the sub-path.
//!
//! One application peels one layer; the fixed-point driver repeats the
//! pass until nothing changes.

use crate::algebra::Expr;
use crate::error::{LowerError, LowerResult};

/// Runs one bottom-up pass over `expr`. Returns whether anything changed.
pub(crate) fn apply(expr: &mut Expr) -> LowerResult<bool> {
    let mut changed = false;

    // Children first.
    match expr {
        Expr::Constant(_) | Expr::Variable(_) | Expr::PathIdentity => {}
        Expr::BinaryOp { left, right, .. } => {
            changed |= apply(left)?;
            changed |= apply(right)?;
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                changed |= apply(arg)?;
            }
        }
        Expr::EvalPath { path, input } | Expr::EvalFilter { path, input } => {
            changed |= apply(path)?;
            changed |= apply(input)?;
        }
        Expr::PathGet { sub, .. } => changed |= apply(sub)?,
        Expr::PathCompare { bound, .. } => changed |= apply(bound)?,
        Expr::PathConstant(inner) => changed |= apply(inner)?,
    }

    // Then this node, peeling as many wrapper layers as are exposed.
    while rewrite_wrapper(expr)? {
        changed = true;
    }

    Ok(changed)
}

/// Rewrites `expr` in place if it is an evaluation wrapper around a
/// path variant. Errors on a wrapper whose path operand is not a path.
fn rewrite_wrapper(expr: &mut Expr) -> LowerResult<bool> {
    let is_filter = match expr {
        Expr::EvalPath { .. } => false,
        Expr::EvalFilter { .. } => true,
        _ => return Ok(false),
    };

    let (Expr::EvalPath { path, input } | Expr::EvalFilter { path, input }) = expr else {
        unreachable!("checked above");
    };

    if !path.is_path() {
        return Err(LowerError::MalformedPath(format!(
            "evaluation wrapper applied to non-path expression: {path}"
        )));
    }

    let input = std::mem::replace(&mut **input, Expr::PathIdentity);
    let replacement = match std::mem::replace(&mut **path, Expr::PathIdentity) {
        Expr::PathIdentity => input,
        Expr::PathConstant(inner) => *inner,
        Expr::PathCompare { op, bound } => {
            Expr::BinaryOp { op, left: Box::new(input), right: bound }
        }
        Expr::PathGet { field, sub } => {
            let get = Expr::call("getField", vec![input, Expr::string(field)]);
            if is_filter {
                Expr::eval_filter(*sub, get)
            } else {
                Expr::eval_path(*sub, get)
            }
        }
        other => {
            return Err(LowerError::MalformedPath(format!(
                "unexpected path variant in evaluation wrapper: {other}"
            )))
        }
    };
    *expr = replacement;
    Ok(true)
}
