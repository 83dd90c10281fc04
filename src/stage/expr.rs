//! Lowered scalar expressions.
//!
//! The target form of expression lowering: variables are gone, replaced
//! by slot references; paths are gone, replaced by `getField` calls and
//! binary operations produced by path lowering.

use std::fmt;

use crate::algebra::{Operator, Value};

/// The physical storage location a projection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A scalar expression over slots.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotExpr {
    /// A literal value, tag preserved exactly from the algebra constant.
    Literal(Value),

    /// A slot read.
    Slot(SlotId),

    /// A binary operation.
    BinaryOp {
        /// The operator.
        op: Operator,
        /// Left operand.
        left: Box<SlotExpr>,
        /// Right operand.
        right: Box<SlotExpr>,
    },

    /// A named function call with ordered arguments.
    Call {
        /// Function name.
        name: String,
        /// Arguments, in declaration order.
        args: Vec<SlotExpr>,
    },
}

impl SlotExpr {
    /// Whether this expression is the literal boolean `true`.
    #[must_use]
    pub const fn is_constant_true(&self) -> bool {
        matches!(self, Self::Literal(Value::Boolean(true)))
    }
}

impl fmt::Display for SlotExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Slot(s) => write!(f, "{s}"),
            Self::BinaryOp { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_readable() {
        let e = SlotExpr::BinaryOp {
            op: Operator::GtEq,
            left: Box::new(SlotExpr::Slot(SlotId(2))),
            right: Box::new(SlotExpr::Literal(Value::Int32(23))),
        };
        assert_eq!(e.to_string(), "(s2 >= 23)");
    }

    #[test]
    fn constant_true_detection() {
        assert!(SlotExpr::Literal(Value::Boolean(true)).is_constant_true());
        assert!(!SlotExpr::Literal(Value::Boolean(false)).is_constant_true());
        assert!(!SlotExpr::Slot(SlotId(0)).is_constant_true());
    }
}
