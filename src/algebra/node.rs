//! Plan-node variants.
//!
//! Plan nodes form the second family of the algebra tree. Each node owns
//! its child node(s) and any scalar sub-expressions (a join predicate, a
//! group-by aggregate argument), and carries a [`NodeId`] stamped at
//! construction. Planning metadata for a node lives in the external
//! [`crate::props::NodePropsMap`] side-table keyed by that id, so the
//! tree stays reusable across planning phases.

use std::collections::BTreeSet;
use std::fmt;

use super::expr::{Expr, FieldName, ProjectionName};
use crate::error::LowerResult;

/// Stable per-node identity, assigned at tree construction.
///
/// Keys the node-properties side-table. Identity survives cloning and
/// partial rewriting of the tree, unlike pointer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Monotonic generator for [`NodeId`]s.
///
/// Owned exclusively by the caller building a tree; lowering never
/// allocates node ids.
#[derive(Debug, Default)]
pub struct NodeIdGenerator {
    next: u32,
}

impl NodeIdGenerator {
    /// Creates a generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next id.
    pub fn generate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Sort direction for collations and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// Join type for nested loop joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Inner join.
    Inner,
    /// Left outer join.
    Left,
}

/// Aggregation merge mode for group-by.
///
/// The mode changes which aggregate-combination semantics the lowered
/// stage applies, not the key/output projection contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// Single-stage full aggregation.
    Complete,
    /// Partial aggregation ahead of a merge boundary.
    Local,
    /// Final merge of partial aggregates.
    Global,
}

/// Spool producer materialization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolProducerMode {
    /// Fully materializes the child before yielding any row.
    Eager,
    /// Admits rows on demand, filtered through a per-row guard.
    Lazy,
}

/// Spool consumer read mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolConsumerMode {
    /// Reads the spool once, in order.
    Regular,
    /// Reentrant consumption, e.g. for recursive unions.
    Stack,
}

/// Projections a scan-like node binds: up to a row-id projection, a
/// root/document projection, and one projection per requested field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldProjectionMap {
    /// Row-identifier projection, if requested.
    pub rid: Option<ProjectionName>,
    /// Root/document projection, if requested.
    pub root: Option<ProjectionName>,
    /// Stored field name to projection name, in request order.
    pub fields: Vec<(FieldName, ProjectionName)>,
}

impl FieldProjectionMap {
    /// Map binding only a root projection.
    pub fn root(name: impl Into<ProjectionName>) -> Self {
        Self { rid: None, root: Some(name.into()), fields: Vec::new() }
    }

    /// Map binding only a row-id projection.
    pub fn rid(name: impl Into<ProjectionName>) -> Self {
        Self { rid: Some(name.into()), root: None, fields: Vec::new() }
    }

    /// Adds a row-id projection.
    #[must_use]
    pub fn with_rid(mut self, name: impl Into<ProjectionName>) -> Self {
        self.rid = Some(name.into());
        self
    }

    /// Adds a field projection.
    #[must_use]
    pub fn with_field(
        mut self,
        field: impl Into<FieldName>,
        name: impl Into<ProjectionName>,
    ) -> Self {
        self.fields.push((field.into(), name.into()));
        self
    }

    /// All projection names this map binds, in a stable order.
    pub fn bound_projections(&self) -> impl Iterator<Item = &ProjectionName> {
        self.rid
            .iter()
            .chain(self.root.iter())
            .chain(self.fields.iter().map(|(_, p)| p))
    }
}

/// One side of an index interval. `bound: None` means the side is open.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRequirement {
    /// Whether the bound itself is included.
    pub inclusive: bool,
    /// The bound expression, or `None` for an open bound.
    pub bound: Option<Expr>,
}

impl BoundRequirement {
    /// A bounded side.
    #[must_use]
    pub fn bounded(inclusive: bool, bound: Expr) -> Self {
        Self { inclusive, bound: Some(bound) }
    }

    /// An open (unbounded) side.
    #[must_use]
    pub const fn open() -> Self {
        Self { inclusive: false, bound: None }
    }
}

/// An interval over one index key field.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    /// Low side of the interval.
    pub low: BoundRequirement,
    /// High side of the interval.
    pub high: BoundRequirement,
}

/// A compound interval: one [`Interval`] per index key field, leftmost first.
pub type CompoundInterval = Vec<Interval>;

/// Configuration for a physical collection scan.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalScanNode {
    /// Projections the scan binds.
    pub projections: FieldProjectionMap,
    /// Collection to scan; must resolve in the metadata.
    pub collection: String,
    /// Whether to emit the parallelizable scan variant.
    pub parallel: bool,
}

/// Configuration for an index range scan.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanNode {
    /// Row-id projection, for a later seek.
    pub rid_projection: Option<ProjectionName>,
    /// Covering projections keyed by index-key position.
    pub key_projections: Vec<(usize, ProjectionName)>,
    /// Collection owning the index.
    pub collection: String,
    /// Index name; must resolve in the collection's definition.
    pub index: String,
    /// Per-field scan bounds.
    pub interval: CompoundInterval,
    /// Whether to scan in reverse key order.
    pub reverse: bool,
}

/// Configuration for a by-row-id document fetch paired with an index scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekNode {
    /// The row-id projection shared with the driving index scan.
    pub rid_projection: ProjectionName,
    /// Projections the seek binds from the fetched document.
    pub projections: FieldProjectionMap,
    /// Collection to fetch from.
    pub collection: String,
}

/// Configuration for a group-by.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByNode {
    /// Grouping key projections, which must already exist below.
    pub keys: Vec<ProjectionName>,
    /// Output projections, one per aggregate.
    pub outputs: Vec<ProjectionName>,
    /// Aggregate function applications, positionally matched to outputs.
    pub aggregates: Vec<Expr>,
    /// Aggregation merge mode.
    pub mode: GroupMode,
}

/// Configuration for unwinding an array-valued projection.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindNode {
    /// The projection to explode; rebound to the element value.
    pub projection: ProjectionName,
    /// Projection bound to the element's positional index.
    pub index_projection: ProjectionName,
    /// Whether non-array inputs pass through as single-element unwinds
    /// instead of being dropped.
    pub retain_non_arrays: bool,
}

/// The plan-node variants of the algebra tree.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum PlanNodeKind {
    // ========== Leaf nodes ==========
    /// Physical collection scan.
    PhysicalScan(PhysicalScanNode),

    /// Index range scan.
    IndexScan(Box<IndexScanNode>),

    /// Document fetch by row id.
    Seek(SeekNode),

    /// Zero-input stage producing a single control row.
    CoScan,

    /// Reads rows from a previously produced spool.
    SpoolConsumer {
        /// Read mode.
        mode: SpoolConsumerMode,
        /// The spool to read; a matching producer must exist in the tree.
        spool_id: u64,
        /// Projections the consumer binds.
        projections: Vec<ProjectionName>,
    },

    // ========== Unary nodes ==========
    /// Filters rows by a boolean predicate.
    Filter {
        /// The predicate; path-lowered before node lowering.
        predicate: Expr,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Binds one new projection to a scalar expression.
    Evaluation {
        /// The projection being introduced.
        projection: ProjectionName,
        /// The bound expression.
        expr: Expr,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Sorts by one or more existing projections.
    Collation {
        /// Sort keys with per-key direction.
        collation: Vec<(ProjectionName, SortDirection)>,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Skips then limits rows.
    LimitSkip {
        /// Maximum rows to emit, or `None` for no limit.
        limit: Option<u64>,
        /// Rows to skip first.
        skip: u64,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Groups and aggregates.
    GroupBy {
        /// Group-by configuration.
        node: GroupByNode,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Deduplicates rows by an ordered key projection list.
    Unique {
        /// Key projections.
        keys: Vec<ProjectionName>,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Explodes an array-valued projection into one row per element.
    Unwind {
        /// Unwind configuration.
        node: UnwindNode,
        /// Input node.
        input: Box<PlanNode>,
    },

    /// Materializes its child under a spool id for reuse by consumers.
    SpoolProducer {
        /// Materialization mode.
        mode: SpoolProducerMode,
        /// The spool being produced.
        spool_id: u64,
        /// Projections admitted to the spool.
        projections: Vec<ProjectionName>,
        /// Per-row admission guard; must be constant-true in eager mode.
        guard: Expr,
        /// Input node.
        input: Box<PlanNode>,
    },

    // ========== Binary nodes ==========
    /// Inner hash join on positionally paired equality keys.
    HashJoin {
        /// Left-side key projections.
        left_keys: Vec<ProjectionName>,
        /// Right-side key projections, positionally paired with the left.
        right_keys: Vec<ProjectionName>,
        /// Left input.
        left: Box<PlanNode>,
        /// Right input.
        right: Box<PlanNode>,
    },

    /// Merge join over pre-sorted inputs.
    MergeJoin {
        /// Left-side key projections.
        left_keys: Vec<ProjectionName>,
        /// Right-side key projections, positionally paired with the left.
        right_keys: Vec<ProjectionName>,
        /// Per-key sort direction; length must equal the key count.
        directions: Vec<SortDirection>,
        /// Left input.
        left: Box<PlanNode>,
        /// Right input.
        right: Box<PlanNode>,
    },

    /// Nested loop join with an arbitrary boolean predicate.
    NestedLoopJoin {
        /// Join type.
        join_type: JoinType,
        /// Outer-side projections visible to the inner side's predicate.
        correlated: BTreeSet<ProjectionName>,
        /// Join predicate; path-lowered before node lowering.
        predicate: Expr,
        /// Outer input.
        left: Box<PlanNode>,
        /// Inner input.
        right: Box<PlanNode>,
    },

    // ========== N-ary nodes ==========
    /// Order-preserving merge of individually sorted children.
    SortedMerge {
        /// Shared collation the children are sorted by.
        collation: Vec<(ProjectionName, SortDirection)>,
        /// Children, all sorted consistently with the collation.
        children: Vec<PlanNode>,
    },

    /// Positional concatenation of children.
    Union {
        /// Declared output projections; every child must supply each.
        projections: Vec<ProjectionName>,
        /// Children.
        children: Vec<PlanNode>,
    },
}

/// A plan node: a construction-time identity plus its variant payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    /// Stable identity keying the node-properties side-table.
    pub id: NodeId,
    /// The node variant.
    pub kind: PlanNodeKind,
}

impl PlanNode {
    /// Creates a node with the given identity.
    #[must_use]
    pub const fn new(id: NodeId, kind: PlanNodeKind) -> Self {
        Self { id, kind }
    }

    /// Immediate children of this node, left to right.
    #[must_use]
    pub fn children(&self) -> Vec<&PlanNode> {
        match &self.kind {
            PlanNodeKind::PhysicalScan(_)
            | PlanNodeKind::IndexScan(_)
            | PlanNodeKind::Seek(_)
            | PlanNodeKind::CoScan
            | PlanNodeKind::SpoolConsumer { .. } => Vec::new(),
            PlanNodeKind::Filter { input, .. }
            | PlanNodeKind::Evaluation { input, .. }
            | PlanNodeKind::Collation { input, .. }
            | PlanNodeKind::LimitSkip { input, .. }
            | PlanNodeKind::GroupBy { input, .. }
            | PlanNodeKind::Unique { input, .. }
            | PlanNodeKind::Unwind { input, .. }
            | PlanNodeKind::SpoolProducer { input, .. } => vec![input],
            PlanNodeKind::HashJoin { left, right, .. }
            | PlanNodeKind::MergeJoin { left, right, .. }
            | PlanNodeKind::NestedLoopJoin { left, right, .. } => vec![left, right],
            PlanNodeKind::SortedMerge { children, .. } | PlanNodeKind::Union { children, .. } => {
                children.iter().collect()
            }
        }
    }

    /// Applies `f` to every scalar expression embedded in this subtree,
    /// including index-scan bound expressions, children first.
    pub fn for_each_expr_mut<F>(&mut self, f: &mut F) -> LowerResult<()>
    where
        F: FnMut(&mut Expr) -> LowerResult<()>,
    {
        match &mut self.kind {
            PlanNodeKind::PhysicalScan(_)
            | PlanNodeKind::Seek(_)
            | PlanNodeKind::CoScan
            | PlanNodeKind::SpoolConsumer { .. } => Ok(()),
            PlanNodeKind::IndexScan(scan) => {
                for interval in &mut scan.interval {
                    if let Some(bound) = &mut interval.low.bound {
                        f(bound)?;
                    }
                    if let Some(bound) = &mut interval.high.bound {
                        f(bound)?;
                    }
                }
                Ok(())
            }
            PlanNodeKind::Filter { predicate, input } => {
                input.for_each_expr_mut(f)?;
                f(predicate)
            }
            PlanNodeKind::Evaluation { expr, input, .. } => {
                input.for_each_expr_mut(f)?;
                f(expr)
            }
            PlanNodeKind::Collation { input, .. }
            | PlanNodeKind::LimitSkip { input, .. }
            | PlanNodeKind::Unique { input, .. }
            | PlanNodeKind::Unwind { input, .. } => input.for_each_expr_mut(f),
            PlanNodeKind::GroupBy { node, input } => {
                input.for_each_expr_mut(f)?;
                for agg in &mut node.aggregates {
                    f(agg)?;
                }
                Ok(())
            }
            PlanNodeKind::SpoolProducer { guard, input, .. } => {
                input.for_each_expr_mut(f)?;
                f(guard)
            }
            PlanNodeKind::HashJoin { left, right, .. }
            | PlanNodeKind::MergeJoin { left, right, .. } => {
                left.for_each_expr_mut(f)?;
                right.for_each_expr_mut(f)
            }
            PlanNodeKind::NestedLoopJoin { predicate, left, right, .. } => {
                left.for_each_expr_mut(f)?;
                right.for_each_expr_mut(f)?;
                f(predicate)
            }
            PlanNodeKind::SortedMerge { children, .. } | PlanNodeKind::Union { children, .. } => {
                for child in children {
                    child.for_each_expr_mut(f)?;
                }
                Ok(())
            }
        }
    }
}
