//! Expression lowering.
//!
//! Maps a path-lowered scalar expression into the slot-based target
//! form. Variables resolve through the slot map; constants map
//! one-to-one onto target literals with their tags intact; function
//! calls lower argument-by-argument in declaration order. Expression
//! lowering never assigns slots; only node lowering does.

use crate::algebra::{Expr, VariableEnvironment};
use crate::error::{LowerError, LowerResult};
use crate::stage::SlotExpr;

use super::SlotMap;

/// Lowers scalar expressions against a slot map.
#[derive(Debug)]
pub struct ExpressionLowering<'a> {
    env: &'a VariableEnvironment,
    slots: &'a SlotMap,
}

impl<'a> ExpressionLowering<'a> {
    /// Creates a lowering over the given environment and slot map.
    #[must_use]
    pub const fn new(env: &'a VariableEnvironment, slots: &'a SlotMap) -> Self {
        Self { env, slots }
    }

    /// Lowers `expr` to its slot-based form.
    pub fn lower(&self, expr: &Expr) -> LowerResult<SlotExpr> {
        match expr {
            Expr::Constant(value) => Ok(SlotExpr::Literal(value.clone())),
            Expr::Variable(name) => match self.slots.resolve(name) {
                Some(slot) => Ok(SlotExpr::Slot(slot)),
                // Defined somewhere in the tree but not slotted yet: the
                // caller lowered things out of order. Not defined at all:
                // a dangling reference.
                None if self.env.defines(name) => {
                    Err(LowerError::SlotNotAssigned(name.clone()))
                }
                None => Err(LowerError::UndefinedVariable(name.clone())),
            },
            Expr::BinaryOp { op, left, right } => Ok(SlotExpr::BinaryOp {
                op: *op,
                left: Box::new(self.lower(left)?),
                right: Box::new(self.lower(right)?),
            }),
            Expr::FunctionCall { name, args } => Ok(SlotExpr::Call {
                name: name.clone(),
                args: args.iter().map(|a| self.lower(a)).collect::<LowerResult<_>>()?,
            }),
            Expr::EvalPath { .. }
            | Expr::EvalFilter { .. }
            | Expr::PathIdentity
            | Expr::PathGet { .. }
            | Expr::PathCompare { .. }
            | Expr::PathConstant(_) => {
                Err(LowerError::UnloweredPath(expr.to_string()))
            }
        }
    }
}
