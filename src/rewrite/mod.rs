//! Path lowering and constant folding, iterated to a fixed point.
//!
//! Both passes are full-tree bottom-up rescans with a change flag. The
//! driver alternates them until a complete round changes nothing, then
//! verifies no path variant survived. Termination is guaranteed because
//! each rewrite strictly reduces path-node count or foldable-constant
//! count; the iteration cap turns a non-convergent rewrite into a fault
//! instead of an infinite loop.

mod const_fold;
mod path_lower;

use tracing::{debug, trace};

use crate::algebra::{Expr, PlanNode};
use crate::error::{LowerError, LowerResult};

/// Upper bound on rewrite rounds before declaring divergence.
pub const MAX_REWRITE_PASSES: usize = 64;

/// Lowers paths and folds constants in a scalar expression until
/// neither pass changes anything.
pub fn lower_paths(expr: &mut Expr) -> LowerResult<()> {
    for pass in 0..MAX_REWRITE_PASSES {
        let mut changed = path_lower::apply(expr)?;
        changed |= const_fold::apply(expr)?;
        trace!(pass, changed, "rewrite pass over expression");
        if !changed {
            return check_paths_gone(expr);
        }
    }
    Err(LowerError::RewriteDivergence(MAX_REWRITE_PASSES))
}

/// Lowers paths and folds constants in every expression embedded in a
/// plan tree until a full round over the tree changes nothing.
pub fn lower_plan_paths(tree: &mut PlanNode) -> LowerResult<()> {
    for pass in 0..MAX_REWRITE_PASSES {
        let mut changed = false;
        tree.for_each_expr_mut(&mut |expr| {
            changed |= path_lower::apply(expr)?;
            changed |= const_fold::apply(expr)?;
            Ok(())
        })?;
        debug!(pass, changed, "rewrite pass over plan tree");
        if !changed {
            let mut result = Ok(());
            tree.for_each_expr_mut(&mut |expr| {
                if result.is_ok() {
                    result = check_paths_gone(expr);
                }
                Ok(())
            })?;
            return result;
        }
    }
    Err(LowerError::RewriteDivergence(MAX_REWRITE_PASSES))
}

/// A path variant that survives the fixed point has no rewrite that can
/// eliminate it: the composition was malformed.
fn check_paths_gone(expr: &Expr) -> LowerResult<()> {
    if expr.contains_path() {
        return Err(LowerError::MalformedPath(expr.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Operator;

    #[test]
    fn filter_path_lowers_to_single_comparison() {
        let mut e = Expr::eval_filter(
            Expr::path_get("a", Expr::path_compare(Operator::GtEq, Expr::int32(23))),
            Expr::variable("scan0"),
        );
        lower_paths(&mut e).unwrap();
        assert_eq!(
            e,
            Expr::call("getField", vec![Expr::variable("scan0"), Expr::string("a")])
                .gte(Expr::int32(23))
        );
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let mut e = Expr::eval_filter(
            Expr::path_get("a", Expr::path_compare(Operator::GtEq, Expr::int32(20).add(Expr::int32(3)))),
            Expr::variable("scan0"),
        );
        lower_paths(&mut e).unwrap();
        let after_first = e.clone();
        lower_paths(&mut e).unwrap();
        assert_eq!(e, after_first);
    }

    #[test]
    fn folding_reaches_through_lowered_paths() {
        // The comparison bound folds to a constant during the same run.
        let mut e = Expr::eval_filter(
            Expr::path_constant(Expr::int32(1).add(Expr::int32(2)).eq(Expr::int32(3))),
            Expr::variable("scan0"),
        );
        lower_paths(&mut e).unwrap();
        assert_eq!(e, Expr::boolean(true));
    }

    #[test]
    fn orphan_path_variant_is_malformed() {
        // A PathCompare with no addressable input cannot be rewritten.
        let mut e = Expr::path_compare(Operator::Eq, Expr::int32(1));
        assert!(matches!(lower_paths(&mut e), Err(LowerError::MalformedPath(_))));
    }
}
