//! Slotplan
//!
//! This crate lowers a query-algebra tree into a slot-based execution
//! stage tree.
//!
//! # Overview
//!
//! Lowering runs in three phases over one shared algebra:
//!
//! - **Rewrite**: path expressions are eliminated by rule application
//!   and constants are folded, iterated to a fixed point
//! - **Expression lowering**: scalar expressions map onto slot
//!   expressions, resolving variables through the slot map
//! - **Node lowering**: plan nodes map bottom-up onto execution stages,
//!   assigning fresh slots at every projection definition point
//!
//! # Modules
//!
//! - [`algebra`] - Expression and plan-node variants plus the derived
//!   variable environment
//! - [`rewrite`] - Path lowering and constant folding
//! - [`lower`] - Expression and node lowering into stages
//! - [`stage`] - The lowered representation: slots, slot expressions,
//!   and stages
//! - [`metadata`] - Collection and index catalog consulted by scans
//! - [`props`] - Per-node planning properties side-table
//! - [`error`] - Error types for rewriting and lowering
//!
//! # Quick Start
//!
//! Lower a filtered scan:
//!
//! ```
//! use slotplan::algebra::{
//!     Expr, FieldProjectionMap, NodeIdGenerator, Operator, PhysicalScanNode, PlanNode,
//!     PlanNodeKind, VariableEnvironment,
//! };
//! use slotplan::lower::{lower_plan, SlotIdGenerator, SlotMap};
//! use slotplan::metadata::{Metadata, ScanDefinition};
//! use slotplan::props::{NodeProps, NodePropsMap};
//! use slotplan::rewrite::lower_plan_paths;
//! use slotplan::stage::StageKind;
//!
//! let mut ids = NodeIdGenerator::new();
//! let scan = PlanNode::new(
//!     ids.generate(),
//!     PlanNodeKind::PhysicalScan(PhysicalScanNode {
//!         projections: FieldProjectionMap::root("scan0"),
//!         collection: "collName".into(),
//!         parallel: false,
//!     }),
//! );
//! let mut tree = PlanNode::new(
//!     ids.generate(),
//!     PlanNodeKind::Filter {
//!         predicate: Expr::eval_filter(
//!             Expr::path_compare(Operator::GtEq, Expr::int32(23)),
//!             Expr::variable("scan0"),
//!         ),
//!         input: Box::new(scan),
//!     },
//! );
//!
//! let mut props = NodePropsMap::new();
//! for (i, id) in tree.children().iter().map(|c| c.id).chain([tree.id]).enumerate() {
//!     props.insert(id, NodeProps::new(i as i32));
//! }
//!
//! lower_plan_paths(&mut tree).unwrap();
//!
//! let env = VariableEnvironment::build(&tree);
//! let metadata = Metadata::default().with_collection(
//!     "collName",
//!     ScanDefinition { exists: true, ..ScanDefinition::default() },
//! );
//! let mut slots = SlotMap::new();
//! let mut rid_slot = None;
//! let mut slot_ids = SlotIdGenerator::new();
//! let stage = lower_plan(
//!     &tree, &env, &mut slots, &mut rid_slot, &mut slot_ids, &metadata, &props,
//! )
//! .unwrap();
//! assert!(matches!(stage.kind, StageKind::Filter { .. }));
//! ```

pub mod algebra;
pub mod error;
pub mod lower;
pub mod metadata;
pub mod props;
pub mod rewrite;
pub mod stage;

// Re-export commonly used items at the crate root
pub use algebra::{Expr, PlanNode, PlanNodeKind, Value, VariableEnvironment};
pub use error::{LowerError, LowerResult};
pub use lower::{lower_plan, ExpressionLowering, NodeLowering, SlotIdGenerator, SlotMap};
pub use rewrite::{lower_paths, lower_plan_paths};
pub use stage::{SlotExpr, SlotId, Stage, StageKind};
