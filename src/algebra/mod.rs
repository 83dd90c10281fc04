//! The algebra tree ("ABT"): expressions, plan nodes, and the derived
//! variable environment.
//!
//! # Overview
//!
//! The algebra is a closed tagged union over two families:
//!
//! - **Expressions** ([`Expr`]): constants, variables, function calls,
//!   and the composable path sub-language with its evaluation wrappers.
//! - **Plan nodes** ([`PlanNode`]): physical operators from scans
//!   through joins, grouping, set operations, and spools.
//!
//! Every pass over the tree matches exhaustively, so adding a node kind
//! forces each of path lowering, expression lowering, and node lowering
//! to handle it.

mod env;
mod expr;
mod node;
mod value;

pub use env::VariableEnvironment;
pub use expr::{Expr, FieldName, Operator, ProjectionName};
pub use node::{
    BoundRequirement, CompoundInterval, FieldProjectionMap, GroupByNode, GroupMode, IndexScanNode,
    Interval, JoinType, NodeId, NodeIdGenerator, PhysicalScanNode, PlanNode, PlanNodeKind,
    SeekNode, SortDirection, SpoolConsumerMode, SpoolProducerMode, UnwindNode,
};
pub use value::Value;
