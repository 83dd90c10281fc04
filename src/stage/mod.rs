//! The lowered representation: slot expressions and execution stages.

mod expr;
mod node;

pub use expr::{SlotExpr, SlotId};
pub use node::{
    IndexScanStage, LoweredBound, LoweredInterval, MergeBranch, ScanStage, SeekStage, Stage,
    StageKind, UnionBranch,
};
