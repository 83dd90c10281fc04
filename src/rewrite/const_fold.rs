//! Constant folding.
//!
//! Folds binary operations whose operands are both constants into a
//! single constant of the same semantic type, plus boolean identity and
//! annihilator simplification. Folding never widens or truncates:
//! integer arithmetic is checked and overflow is a fatal fault, mixed
//! tags are left unfolded.

use rust_decimal::Decimal;

use crate::algebra::{Expr, Operator, Value, VariableEnvironment};
use crate::error::{LowerError, LowerResult};

/// Runs one bottom-up pass over `expr`. Returns whether anything changed.
pub(crate) fn apply(expr: &mut Expr) -> LowerResult<bool> {
    let mut changed = false;

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

    if let Some(folded) = fold_node(expr)? {
        *expr = folded;
        changed = true;
    }

    Ok(changed)
}

/// Attempts to fold `expr` itself. Returns the replacement, if any.
fn fold_node(expr: &Expr) -> LowerResult<Option<Expr>> {
    let Expr::BinaryOp { op, left, right } = expr else {
        return Ok(None);
    };

    if let (Expr::Constant(l), Expr::Constant(r)) = (&**left, &**right) {
        // Both operands constant: confirm no free-variable dependency
        // remains, then fold to a single constant.
        debug_assert!(VariableEnvironment::free_variables(expr).is_empty());
        return Ok(fold_constants(l, *op, r)?.map(Expr::Constant));
    }

    // Boolean identity and annihilator rules. Discarding the variable
    // operand is sound for two-valued booleans.
    match (op, &**left, &**right) {
        (Operator::And, Expr::Constant(Value::Boolean(true)), other)
        | (Operator::And, other, Expr::Constant(Value::Boolean(true)))
        | (Operator::Or, Expr::Constant(Value::Boolean(false)), other)
        | (Operator::Or, other, Expr::Constant(Value::Boolean(false))) => {
            Ok(Some(other.clone()))
        }
        (Operator::And, Expr::Constant(Value::Boolean(false)), _)
        | (Operator::And, _, Expr::Constant(Value::Boolean(false))) => {
            Ok(Some(Expr::boolean(false)))
        }
        (Operator::Or, Expr::Constant(Value::Boolean(true)), _)
        | (Operator::Or, _, Expr::Constant(Value::Boolean(true))) => Ok(Some(Expr::boolean(true))),
        _ => Ok(None),
    }
}

/// Folds two same-tag constants. `Ok(None)` leaves the expression
/// unfolded (mixed tags, unsupported operator, integer division by
/// zero); overflow is an error, never a truncation.
fn fold_constants(left: &Value, op: Operator, right: &Value) -> LowerResult<Option<Value>> {
    use Value::{Boolean, Date, Decimal as Dec, Double, Int32, Int64, String as Str, Timestamp};

    let folded = match (left, right) {
        (Int32(l), Int32(r)) => match op {
            Operator::Add => Some(Int32(checked(l.checked_add(*r), "int32")?)),
            Operator::Sub => Some(Int32(checked(l.checked_sub(*r), "int32")?)),
            Operator::Mul => Some(Int32(checked(l.checked_mul(*r), "int32")?)),
            Operator::Div if *r != 0 => Some(Int32(checked(l.checked_div(*r), "int32")?)),
            op if op.is_comparison() => Some(Boolean(compare(l, r, op))),
            _ => None,
        },
        (Int64(l), Int64(r)) => match op {
            Operator::Add => Some(Int64(checked(l.checked_add(*r), "int64")?)),
            Operator::Sub => Some(Int64(checked(l.checked_sub(*r), "int64")?)),
            Operator::Mul => Some(Int64(checked(l.checked_mul(*r), "int64")?)),
            Operator::Div if *r != 0 => Some(Int64(checked(l.checked_div(*r), "int64")?)),
            op if op.is_comparison() => Some(Boolean(compare(l, r, op))),
            _ => None,
        },
        (Double(l), Double(r)) => match op {
            Operator::Add => Some(Double(l + r)),
            Operator::Sub => Some(Double(l - r)),
            Operator::Mul => Some(Double(l * r)),
            Operator::Div => Some(Double(l / r)),
            op if op.is_comparison() => partial_compare(l, r, op).map(Boolean),
            _ => None,
        },
        (Dec(l), Dec(r)) => match op {
            Operator::Add => Some(Dec(checked(l.checked_add(*r), "decimal")?)),
            Operator::Sub => Some(Dec(checked(l.checked_sub(*r), "decimal")?)),
            Operator::Mul => Some(Dec(checked(l.checked_mul(*r), "decimal")?)),
            Operator::Div if *r != Decimal::ZERO => {
                Some(Dec(checked(l.checked_div(*r), "decimal")?))
            }
            op if op.is_comparison() => Some(Boolean(compare(l, r, op))),
            _ => None,
        },
        (Str(l), Str(r)) => match op {
            Operator::Eq => Some(Boolean(l == r)),
            Operator::NotEq => Some(Boolean(l != r)),
            _ => None,
        },
        (Boolean(l), Boolean(r)) => match op {
            Operator::And => Some(Boolean(*l && *r)),
            Operator::Or => Some(Boolean(*l || *r)),
            Operator::Eq => Some(Boolean(l == r)),
            Operator::NotEq => Some(Boolean(l != r)),
            _ => None,
        },
        (Timestamp(l), Timestamp(r)) if op.is_comparison() => Some(Boolean(compare(l, r, op))),
        (Date(l), Date(r)) if op.is_comparison() => Some(Boolean(compare(l, r, op))),
        // Mixed tags: no implicit widening, leave unfolded.
        _ => None,
    };
    Ok(folded)
}

fn checked<T>(value: Option<T>, tag: &'static str) -> LowerResult<T> {
    value.ok_or(LowerError::ConstantOverflow(tag))
}

fn compare<T: Ord>(l: &T, r: &T, op: Operator) -> bool {
    match op {
        Operator::Eq => l == r,
        Operator::NotEq => l != r,
        Operator::Lt => l < r,
        Operator::LtEq => l <= r,
        Operator::Gt => l > r,
        Operator::GtEq => l >= r,
        _ => unreachable!("caller checked is_comparison"),
    }
}

fn partial_compare(l: &f64, r: &f64, op: Operator) -> Option<bool> {
    // NaN comparisons stay unfolded.
    l.partial_cmp(r).map(|ord| match op {
        Operator::Eq => ord.is_eq(),
        Operator::NotEq => ord.is_ne(),
        Operator::Lt => ord.is_lt(),
        Operator::LtEq => ord.is_le(),
        Operator::Gt => ord.is_gt(),
        Operator::GtEq => ord.is_ge(),
        _ => unreachable!("caller checked is_comparison"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn folds_int32_arithmetic() {
        let mut e = Expr::int32(1).add(Expr::int32(2));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::int32(3));
    }

    #[test]
    fn int32_overflow_is_a_fault() {
        let mut e = Expr::int32(i32::MAX).add(Expr::int32(1));
        assert!(matches!(apply(&mut e), Err(LowerError::ConstantOverflow("int32"))));
    }

    #[test]
    fn mixed_tags_stay_unfolded() {
        let mut e = Expr::int32(1).add(Expr::int64(2));
        assert!(!apply(&mut e).unwrap());
    }

    #[test]
    fn integer_division_by_zero_stays_unfolded() {
        let mut e = Expr::int32(1).binary(Operator::Div, Expr::int32(0));
        assert!(!apply(&mut e).unwrap());
    }

    #[test]
    fn boolean_identity_drops_the_constant() {
        let mut e = Expr::boolean(true).and(Expr::variable("x"));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::variable("x"));

        let mut e = Expr::variable("x").or(Expr::boolean(false));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::variable("x"));
    }

    #[test]
    fn boolean_annihilator_wins() {
        let mut e = Expr::variable("x").and(Expr::boolean(false));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::boolean(false));
    }

    #[test]
    fn folds_nested_subexpressions() {
        // (1 + 2) * 3 folds bottom-up in one pass.
        let mut e = Expr::int32(1).add(Expr::int32(2)).mul(Expr::int32(3));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::int32(9));
    }

    #[test]
    fn folds_decimal_exactly() {
        let l = Decimal::from_str("0.1").unwrap();
        let r = Decimal::from_str("0.2").unwrap();
        let mut e = Expr::Constant(Value::Decimal(l)).add(Expr::Constant(Value::Decimal(r)));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::Constant(Value::Decimal(Decimal::from_str("0.3").unwrap())));
    }

    #[test]
    fn folds_comparisons() {
        let mut e = Expr::int32(5).binary(Operator::Gt, Expr::int32(3));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::boolean(true));

        let mut e = Expr::string("a").eq(Expr::string("b"));
        assert!(apply(&mut e).unwrap());
        assert_eq!(e, Expr::boolean(false));
    }
}
