//! Lowered execution stages.
//!
//! The target of node lowering: a tree of physical stages with explicit
//! slot wiring. Stage construction is irreversible: by the time a
//! stage exists, projection names have been committed to slots and join
//! algorithms have been chosen.

use crate::algebra::{
    FieldName, GroupMode, JoinType, SortDirection, SpoolConsumerMode, SpoolProducerMode,
};

use super::expr::{SlotExpr, SlotId};

/// A lowered collection scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStage {
    /// Collection being scanned.
    pub collection: String,
    /// Slot receiving the row id, if requested.
    pub rid_slot: Option<SlotId>,
    /// Slot receiving the root document, if requested.
    pub root_slot: Option<SlotId>,
    /// Slots receiving stored fields, in request order.
    pub field_slots: Vec<(FieldName, SlotId)>,
    /// Whether this is the parallelizable scan variant.
    pub parallel: bool,
}

/// One lowered side of an index interval.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredBound {
    /// Whether the bound itself is included. Copied verbatim from the
    /// algebra node, independent of scan direction.
    pub inclusive: bool,
    /// The bound expression, or `None` for an open bound.
    pub bound: Option<SlotExpr>,
}

/// A lowered interval over one index key field.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredInterval {
    /// Low side.
    pub low: LoweredBound,
    /// High side.
    pub high: LoweredBound,
}

/// A lowered index range scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanStage {
    /// Collection owning the index.
    pub collection: String,
    /// Index being scanned.
    pub index: String,
    /// Slot receiving the row id, if requested.
    pub rid_slot: Option<SlotId>,
    /// Covering slots keyed by index-key position.
    pub key_slots: Vec<(usize, SlotId)>,
    /// Per-field bounds, leftmost key first.
    pub bounds: Vec<LoweredInterval>,
    /// Whether the scan runs in reverse key order.
    pub reverse: bool,
}

/// A lowered by-row-id document fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekStage {
    /// Slot holding the row id to fetch, shared with the driving index scan.
    pub rid_slot: SlotId,
    /// Collection to fetch from.
    pub collection: String,
    /// Slot receiving the fetched document, if requested.
    pub root_slot: Option<SlotId>,
    /// Slots receiving stored fields, in request order.
    pub field_slots: Vec<(FieldName, SlotId)>,
}

/// One child of a lowered sorted merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeBranch {
    /// The child stage.
    pub stage: Stage,
    /// The child's slots for the merge keys, in collation order.
    pub key_slots: Vec<SlotId>,
    /// The child's slots for the forwarded values, in output order.
    pub value_slots: Vec<SlotId>,
}

/// One child of a lowered union.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionBranch {
    /// The child stage.
    pub stage: Stage,
    /// The child's slots for the union outputs, positionally.
    pub input_slots: Vec<SlotId>,
}

/// The lowered stage variants.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum StageKind {
    /// Collection scan.
    Scan(ScanStage),

    /// Index range scan.
    IndexScan(Box<IndexScanStage>),

    /// Document fetch by row id.
    Seek(SeekStage),

    /// Zero-input stage producing a single control row.
    CoScan,

    /// Predicate filter. Introduces no slots.
    Filter {
        /// The boolean predicate.
        predicate: SlotExpr,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Binds one fresh slot to a computed expression.
    Project {
        /// The slot and the expression bound to it.
        binding: (SlotId, SlotExpr),
        /// Input stage.
        input: Box<Stage>,
    },

    /// Sort keyed by existing slots.
    Sort {
        /// Sort keys with per-key direction.
        keys: Vec<(SlotId, SortDirection)>,
        /// Non-key slots forwarded through the sort.
        values: Vec<SlotId>,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Skip-then-limit.
    LimitSkip {
        /// Maximum rows to emit, or `None` for no limit.
        limit: Option<u64>,
        /// Rows to skip first.
        skip: u64,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Hash aggregation.
    HashAgg {
        /// Grouping key slots.
        key_slots: Vec<SlotId>,
        /// Output slot and aggregate expression, positionally paired.
        aggregates: Vec<(SlotId, SlotExpr)>,
        /// Merge mode the stage applies to aggregate state.
        mode: GroupMode,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Inner hash join on positionally paired key slots.
    HashJoin {
        /// Left-side key slots.
        left_keys: Vec<SlotId>,
        /// Right-side key slots.
        right_keys: Vec<SlotId>,
        /// Left input.
        left: Box<Stage>,
        /// Right input.
        right: Box<Stage>,
    },

    /// Merge join over pre-sorted inputs.
    MergeJoin {
        /// Left-side key slots.
        left_keys: Vec<SlotId>,
        /// Right-side key slots.
        right_keys: Vec<SlotId>,
        /// Per-key sort direction.
        directions: Vec<SortDirection>,
        /// Left input.
        left: Box<Stage>,
        /// Right input.
        right: Box<Stage>,
    },

    /// Nested loop join.
    LoopJoin {
        /// Join type.
        join_type: JoinType,
        /// Outer slots visible to the inner side, in stable order.
        correlated_slots: Vec<SlotId>,
        /// Join predicate.
        predicate: SlotExpr,
        /// Outer input.
        outer: Box<Stage>,
        /// Inner input.
        inner: Box<Stage>,
    },

    /// Order-preserving merge of sorted children.
    SortedMerge {
        /// Per-key merge direction.
        directions: Vec<SortDirection>,
        /// Children with their key and value slots.
        branches: Vec<MergeBranch>,
        /// Fresh output slots, positionally matching each branch's values.
        output_slots: Vec<SlotId>,
    },

    /// Positional concatenation of children.
    Union {
        /// Children with their input slots.
        branches: Vec<UnionBranch>,
        /// Fresh output slots, positionally matching each branch's inputs.
        output_slots: Vec<SlotId>,
    },

    /// Deduplication by key slots; first-seen row per key survives.
    Unique {
        /// Key slots.
        key_slots: Vec<SlotId>,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Array explosion.
    Unwind {
        /// Slot holding the array value.
        input_slot: SlotId,
        /// Fresh slot receiving each element.
        out_slot: SlotId,
        /// Fresh slot receiving the element's positional index.
        index_slot: SlotId,
        /// Whether non-array inputs pass through as single-element unwinds.
        retain_non_arrays: bool,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Spool materialization point.
    SpoolProducer {
        /// Materialization mode.
        mode: SpoolProducerMode,
        /// The spool id consumers read.
        spool_id: u64,
        /// Slots admitted to the spool.
        slots: Vec<SlotId>,
        /// Per-row admission guard (lazy mode only).
        guard: Option<SlotExpr>,
        /// Input stage.
        input: Box<Stage>,
    },

    /// Spool read point.
    SpoolConsumer {
        /// Read mode.
        mode: SpoolConsumerMode,
        /// The spool id being read.
        spool_id: u64,
        /// Slots the consumer binds.
        slots: Vec<SlotId>,
    },
}

/// A lowered stage: the planner-assigned node id plus the stage variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// The originating node's planner-assigned id.
    pub plan_node_id: i32,
    /// The stage variant.
    pub kind: StageKind,
}

impl Stage {
    /// Creates a stage.
    #[must_use]
    pub const fn new(plan_node_id: i32, kind: StageKind) -> Self {
        Self { plan_node_id, kind }
    }

    /// Immediate children, left to right.
    #[must_use]
    pub fn children(&self) -> Vec<&Stage> {
        match &self.kind {
            StageKind::Scan(_)
            | StageKind::IndexScan(_)
            | StageKind::Seek(_)
            | StageKind::CoScan
            | StageKind::SpoolConsumer { .. } => Vec::new(),
            StageKind::Filter { input, .. }
            | StageKind::Project { input, .. }
            | StageKind::Sort { input, .. }
            | StageKind::LimitSkip { input, .. }
            | StageKind::HashAgg { input, .. }
            | StageKind::Unique { input, .. }
            | StageKind::Unwind { input, .. }
            | StageKind::SpoolProducer { input, .. } => vec![input],
            StageKind::HashJoin { left, right, .. }
            | StageKind::MergeJoin { left, right, .. } => vec![left, right],
            StageKind::LoopJoin { outer, inner, .. } => vec![outer, inner],
            StageKind::SortedMerge { branches, .. } => {
                branches.iter().map(|b| &b.stage).collect()
            }
            StageKind::Union { branches, .. } => branches.iter().map(|b| &b.stage).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Value;

    #[test]
    fn children_traversal() {
        let scan = Stage::new(
            0,
            StageKind::Scan(ScanStage {
                collection: "collName".into(),
                rid_slot: None,
                root_slot: Some(SlotId(0)),
                field_slots: Vec::new(),
                parallel: false,
            }),
        );
        let filter = Stage::new(
            1,
            StageKind::Filter {
                predicate: SlotExpr::Literal(Value::Boolean(true)),
                input: Box::new(scan),
            },
        );
        assert_eq!(filter.children().len(), 1);
        assert_eq!(filter.children()[0].plan_node_id, 0);
    }
}
