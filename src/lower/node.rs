//! Node lowering.
//!
//! Walks the plan tree bottom-up and emits one execution stage per
//! node. This is where projection names die: every stage that defines
//! output draws fresh slots and publishes them in the slot map, and
//! every reference resolves against the bindings current at that point
//! of the walk. Each node's planner-assigned id comes out of the
//! properties side-table and is stamped on the emitted stage.
//!
//! Child order is load-bearing. Binary and n-ary nodes lower their
//! children left to right, and each child's slots are captured
//! immediately after that child is lowered, before a sibling gets the
//! chance to rebind the same projection names.

use std::collections::HashSet;

use tracing::debug;

use crate::algebra::{
    BoundRequirement, Expr, NodeId, PlanNode, PlanNodeKind, SpoolProducerMode,
    VariableEnvironment,
};
use crate::error::{LowerError, LowerResult};
use crate::metadata::{Metadata, ScanDefinition};
use crate::props::{NodeProps, NodePropsMap};
use crate::stage::{
    IndexScanStage, LoweredBound, LoweredInterval, MergeBranch, ScanStage, SeekStage, SlotExpr,
    SlotId, Stage, StageKind, UnionBranch,
};

use super::{ExpressionLowering, SlotIdGenerator, SlotMap};

/// Lowers plan trees into stage trees.
///
/// Holds mutable access to the caller's slot map, slot-id generator,
/// and row-id out-slot for the duration of one tree.
#[derive(Debug)]
pub struct NodeLowering<'a> {
    env: &'a VariableEnvironment,
    slots: &'a mut SlotMap,
    rid_slot: &'a mut Option<SlotId>,
    slot_ids: &'a mut SlotIdGenerator,
    metadata: &'a Metadata,
    props: &'a NodePropsMap,
    /// Spool ids with a producer anywhere in the tree being lowered.
    producers: HashSet<u64>,
}

impl<'a> NodeLowering<'a> {
    /// Creates a lowering over the caller's slot state and catalog.
    pub fn new(
        env: &'a VariableEnvironment,
        slots: &'a mut SlotMap,
        rid_slot: &'a mut Option<SlotId>,
        slot_ids: &'a mut SlotIdGenerator,
        metadata: &'a Metadata,
        props: &'a NodePropsMap,
    ) -> Self {
        Self { env, slots, rid_slot, slot_ids, metadata, props, producers: HashSet::new() }
    }

    /// Lowers the whole tree rooted at `tree`.
    pub fn lower(mut self, tree: &PlanNode) -> LowerResult<Stage> {
        // Producers are registered up front so a consumer lowered before
        // its producer (the stack-spool recursion shape) still resolves.
        collect_spool_producers(tree, &mut self.producers);
        self.lower_node(tree)
    }

    fn node_props(&self, id: NodeId) -> LowerResult<&'a NodeProps> {
        let props: &'a NodePropsMap = self.props;
        props.get(id).ok_or(LowerError::MissingNodeProps(id))
    }

    fn scan_definition(&self, collection: &str) -> LowerResult<&'a ScanDefinition> {
        let metadata: &'a Metadata = self.metadata;
        metadata
            .scan_definition(collection)
            .filter(|def| def.exists)
            .ok_or_else(|| LowerError::UnknownCollection(collection.to_string()))
    }

    /// Lowers a scalar expression against the current slot map.
    fn scalar(&self, expr: &Expr) -> LowerResult<SlotExpr> {
        ExpressionLowering::new(self.env, self.slots).lower(expr)
    }

    fn lower_bound(&self, bound: &BoundRequirement) -> LowerResult<LoweredBound> {
        Ok(LoweredBound {
            inclusive: bound.inclusive,
            bound: bound.bound.as_ref().map(|e| self.scalar(e)).transpose()?,
        })
    }

    /// Resolves a projection a node requires from its already-lowered
    /// children.
    fn resolve(&self, name: &str, node: NodeId) -> LowerResult<SlotId> {
        self.slots.resolve(name).ok_or_else(|| LowerError::UnresolvedProjection {
            projection: name.to_string(),
            node,
        })
    }

    /// Resolves a projection one just-lowered child of an n-ary node
    /// must supply. `prior` is the binding snapshotted before that
    /// child lowered; definitions always install a fresh slot, so an
    /// unchanged binding means the child never bound the name and a
    /// sibling's slot would leak across branches.
    fn resolve_branch(
        &self,
        name: &str,
        prior: Option<SlotId>,
        node: NodeId,
    ) -> LowerResult<SlotId> {
        let slot = self.resolve(name, node)?;
        if Some(slot) == prior {
            return Err(LowerError::UnresolvedProjection {
                projection: name.to_string(),
                node,
            });
        }
        Ok(slot)
    }

    /// Binds `name` to a fresh slot, replacing any earlier binding.
    fn define(&mut self, name: &str) -> SlotId {
        let slot = self.slot_ids.generate();
        self.slots.define(name, slot);
        slot
    }

    #[allow(clippy::too_many_lines)]
    fn lower_node(&mut self, node: &PlanNode) -> LowerResult<Stage> {
        let props = self.node_props(node.id)?;
        let plan_node_id = props.plan_node_id;
        debug!(node = %node.id, plan_node_id, "lowering plan node");

        let kind = match &node.kind {
            PlanNodeKind::PhysicalScan(scan) => {
                self.scan_definition(&scan.collection)?;
                let rid_slot = scan.projections.rid.as_deref().map(|p| self.define(p));
                if rid_slot.is_some() {
                    *self.rid_slot = rid_slot;
                }
                let root_slot = scan.projections.root.as_deref().map(|p| self.define(p));
                let field_slots = scan
                    .projections
                    .fields
                    .iter()
                    .map(|(field, proj)| (field.clone(), self.define(proj)))
                    .collect();
                StageKind::Scan(ScanStage {
                    collection: scan.collection.clone(),
                    rid_slot,
                    root_slot,
                    field_slots,
                    parallel: scan.parallel,
                })
            }

            PlanNodeKind::IndexScan(scan) => {
                let def = self.scan_definition(&scan.collection)?;
                if def.index(&scan.index).is_none() {
                    return Err(LowerError::UnknownIndex {
                        collection: scan.collection.clone(),
                        index: scan.index.clone(),
                    });
                }
                // Bounds may reference correlated slots from an enclosing
                // loop join, so they lower before this scan binds anything.
                let bounds = scan
                    .interval
                    .iter()
                    .map(|iv| {
                        Ok(LoweredInterval {
                            low: self.lower_bound(&iv.low)?,
                            high: self.lower_bound(&iv.high)?,
                        })
                    })
                    .collect::<LowerResult<Vec<_>>>()?;
                let rid_slot = scan.rid_projection.as_deref().map(|p| self.define(p));
                if rid_slot.is_some() {
                    *self.rid_slot = rid_slot;
                }
                let key_slots = scan
                    .key_projections
                    .iter()
                    .map(|(pos, proj)| (*pos, self.define(proj)))
                    .collect();
                StageKind::IndexScan(Box::new(IndexScanStage {
                    collection: scan.collection.clone(),
                    index: scan.index.clone(),
                    rid_slot,
                    key_slots,
                    bounds,
                    reverse: scan.reverse,
                }))
            }

            PlanNodeKind::Seek(seek) => {
                self.scan_definition(&seek.collection)?;
                // The row id comes from the driving index scan; a seek
                // never defines it.
                let rid_slot = self.resolve(&seek.rid_projection, node.id)?;
                let root_slot = seek.projections.root.as_deref().map(|p| self.define(p));
                let field_slots = seek
                    .projections
                    .fields
                    .iter()
                    .map(|(field, proj)| (field.clone(), self.define(proj)))
                    .collect();
                StageKind::Seek(SeekStage {
                    rid_slot,
                    collection: seek.collection.clone(),
                    root_slot,
                    field_slots,
                })
            }

            PlanNodeKind::CoScan => StageKind::CoScan,

            PlanNodeKind::SpoolConsumer { mode, spool_id, projections } => {
                if !self.producers.contains(spool_id) {
                    return Err(LowerError::UnknownSpoolId(*spool_id));
                }
                let slots = projections.iter().map(|p| self.define(p)).collect();
                StageKind::SpoolConsumer { mode: *mode, spool_id: *spool_id, slots }
            }

            PlanNodeKind::Filter { predicate, input } => {
                let input = self.lower_node(input)?;
                let predicate = self.scalar(predicate)?;
                StageKind::Filter { predicate, input: Box::new(input) }
            }

            PlanNodeKind::Evaluation { projection, expr, input } => {
                let input = self.lower_node(input)?;
                // The expression sees the child's bindings; the fresh
                // slot only becomes visible afterwards.
                let lowered = self.scalar(expr)?;
                let slot = self.define(projection);
                StageKind::Project { binding: (slot, lowered), input: Box::new(input) }
            }

            PlanNodeKind::Collation { collation, input } => {
                let input = self.lower_node(input)?;
                let keys = collation
                    .iter()
                    .map(|(proj, dir)| Ok((self.resolve(proj, node.id)?, *dir)))
                    .collect::<LowerResult<Vec<_>>>()?;
                // Everything required above the sort that is not itself a
                // sort key rides through as a value slot.
                let values = props
                    .projection_requirement
                    .projections
                    .iter()
                    .filter(|proj| !collation.iter().any(|(key, _)| key == *proj))
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                StageKind::Sort { keys, values, input: Box::new(input) }
            }

            PlanNodeKind::LimitSkip { limit, skip, input } => {
                let input = self.lower_node(input)?;
                StageKind::LimitSkip { limit: *limit, skip: *skip, input: Box::new(input) }
            }

            PlanNodeKind::GroupBy { node: group, input } => {
                if group.outputs.len() != group.aggregates.len() {
                    return Err(LowerError::GroupByArity {
                        outputs: group.outputs.len(),
                        aggregates: group.aggregates.len(),
                    });
                }
                let input = self.lower_node(input)?;
                let key_slots = group
                    .keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                // All aggregate arguments lower against the child's
                // bindings before any output projection is rebound.
                let lowered = group
                    .aggregates
                    .iter()
                    .map(|agg| self.scalar(agg))
                    .collect::<LowerResult<Vec<_>>>()?;
                let aggregates = group
                    .outputs
                    .iter()
                    .zip(lowered)
                    .map(|(out, agg)| (self.define(out), agg))
                    .collect();
                StageKind::HashAgg {
                    key_slots,
                    aggregates,
                    mode: group.mode,
                    input: Box::new(input),
                }
            }

            PlanNodeKind::Unique { keys, input } => {
                let input = self.lower_node(input)?;
                let key_slots = keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                StageKind::Unique { key_slots, input: Box::new(input) }
            }

            PlanNodeKind::Unwind { node: unwind, input } => {
                let input = self.lower_node(input)?;
                let input_slot = self.resolve(&unwind.projection, node.id)?;
                // The unwound projection is rebound to the element value;
                // references above this node see the fresh slot.
                let out_slot = self.define(&unwind.projection);
                let index_slot = self.define(&unwind.index_projection);
                StageKind::Unwind {
                    input_slot,
                    out_slot,
                    index_slot,
                    retain_non_arrays: unwind.retain_non_arrays,
                    input: Box::new(input),
                }
            }

            PlanNodeKind::SpoolProducer { mode, spool_id, projections, guard, input } => {
                let input = self.lower_node(input)?;
                let slots = projections
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                let lowered_guard = self.scalar(guard)?;
                let guard = match mode {
                    SpoolProducerMode::Eager => {
                        if !lowered_guard.is_constant_true() {
                            return Err(LowerError::EagerSpoolGuard(node.id));
                        }
                        None
                    }
                    SpoolProducerMode::Lazy => {
                        if lowered_guard.is_constant_true() {
                            None
                        } else {
                            Some(lowered_guard)
                        }
                    }
                };
                StageKind::SpoolProducer {
                    mode: *mode,
                    spool_id: *spool_id,
                    slots,
                    guard,
                    input: Box::new(input),
                }
            }

            PlanNodeKind::HashJoin { left_keys, right_keys, left, right } => {
                if left_keys.len() != right_keys.len() {
                    return Err(LowerError::JoinKeyArity {
                        left: left_keys.len(),
                        right: right_keys.len(),
                    });
                }
                let left_stage = self.lower_node(left)?;
                let left_slots = left_keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                let right_stage = self.lower_node(right)?;
                let right_slots = right_keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                StageKind::HashJoin {
                    left_keys: left_slots,
                    right_keys: right_slots,
                    left: Box::new(left_stage),
                    right: Box::new(right_stage),
                }
            }

            PlanNodeKind::MergeJoin { left_keys, right_keys, directions, left, right } => {
                if left_keys.len() != right_keys.len() {
                    return Err(LowerError::JoinKeyArity {
                        left: left_keys.len(),
                        right: right_keys.len(),
                    });
                }
                if directions.len() != left_keys.len() {
                    return Err(LowerError::MergeCollationArity {
                        keys: left_keys.len(),
                        directions: directions.len(),
                    });
                }
                let left_stage = self.lower_node(left)?;
                let left_slots = left_keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                let right_stage = self.lower_node(right)?;
                let right_slots = right_keys
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                StageKind::MergeJoin {
                    left_keys: left_slots,
                    right_keys: right_slots,
                    directions: directions.clone(),
                    left: Box::new(left_stage),
                    right: Box::new(right_stage),
                }
            }

            PlanNodeKind::NestedLoopJoin { join_type, correlated, predicate, left, right } => {
                let outer = self.lower_node(left)?;
                // Correlated slots are captured from the outer side before
                // the inner side lowers, so inner bound expressions and the
                // predicate both see them.
                let correlated_slots = correlated
                    .iter()
                    .map(|proj| self.resolve(proj, node.id))
                    .collect::<LowerResult<Vec<_>>>()?;
                let inner = self.lower_node(right)?;
                let predicate = self.scalar(predicate)?;
                StageKind::LoopJoin {
                    join_type: *join_type,
                    correlated_slots,
                    predicate,
                    outer: Box::new(outer),
                    inner: Box::new(inner),
                }
            }

            PlanNodeKind::SortedMerge { collation, children } => {
                let required = &props.projection_requirement.projections;
                let mut branches = Vec::with_capacity(children.len());
                for child in children {
                    let key_prior: Vec<_> =
                        collation.iter().map(|(proj, _)| self.slots.resolve(proj)).collect();
                    let value_prior: Vec<_> =
                        required.iter().map(|proj| self.slots.resolve(proj)).collect();
                    let stage = self.lower_node(child)?;
                    // Captured per child: siblings rebind the same names.
                    let key_slots = collation
                        .iter()
                        .zip(&key_prior)
                        .map(|((proj, _), prior)| self.resolve_branch(proj, *prior, node.id))
                        .collect::<LowerResult<Vec<_>>>()?;
                    let value_slots = required
                        .iter()
                        .zip(&value_prior)
                        .map(|(proj, prior)| self.resolve_branch(proj, *prior, node.id))
                        .collect::<LowerResult<Vec<_>>>()?;
                    branches.push(MergeBranch { stage, key_slots, value_slots });
                }
                let directions = collation.iter().map(|(_, dir)| *dir).collect();
                let required = required.clone();
                let output_slots = required.iter().map(|proj| self.define(proj)).collect();
                StageKind::SortedMerge { directions, branches, output_slots }
            }

            PlanNodeKind::Union { projections, children } => {
                let mut branches = Vec::with_capacity(children.len());
                for child in children {
                    let prior: Vec<_> =
                        projections.iter().map(|proj| self.slots.resolve(proj)).collect();
                    let stage = self.lower_node(child)?;
                    let input_slots = projections
                        .iter()
                        .zip(&prior)
                        .map(|(proj, prior)| self.resolve_branch(proj, *prior, node.id))
                        .collect::<LowerResult<Vec<_>>>()?;
                    branches.push(UnionBranch { stage, input_slots });
                }
                let output_slots = projections.iter().map(|proj| self.define(proj)).collect();
                StageKind::Union { branches, output_slots }
            }
        };

        Ok(Stage::new(plan_node_id, kind))
    }
}

fn collect_spool_producers(node: &PlanNode, out: &mut HashSet<u64>) {
    if let PlanNodeKind::SpoolProducer { spool_id, .. } = &node.kind {
        out.insert(*spool_id);
    }
    for child in node.children() {
        collect_spool_producers(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{FieldProjectionMap, NodeIdGenerator, PhysicalScanNode};
    use crate::metadata::ScanDefinition;
    use crate::props::NodeProps;

    fn scan_node(gen: &mut NodeIdGenerator, projections: FieldProjectionMap) -> PlanNode {
        PlanNode::new(
            gen.generate(),
            PlanNodeKind::PhysicalScan(PhysicalScanNode {
                projections,
                collection: "collName".into(),
                parallel: false,
            }),
        )
    }

    #[test]
    fn scan_defines_fresh_slots_and_publishes_rid() {
        let mut gen = NodeIdGenerator::new();
        let scan = scan_node(&mut gen, FieldProjectionMap::root("root0").with_rid("rid0"));
        let env = VariableEnvironment::build(&scan);
        let metadata = Metadata::default().with_collection("collName", ScanDefinition {
            exists: true,
            ..ScanDefinition::default()
        });
        let mut props = NodePropsMap::new();
        props.insert(scan.id, NodeProps::new(0));

        let mut slots = SlotMap::new();
        let mut rid = None;
        let mut slot_ids = SlotIdGenerator::new();
        let stage =
            NodeLowering::new(&env, &mut slots, &mut rid, &mut slot_ids, &metadata, &props)
                .lower(&scan)
                .unwrap();

        let StageKind::Scan(scan_stage) = stage.kind else { panic!("expected scan") };
        assert_eq!(scan_stage.rid_slot, rid);
        assert!(rid.is_some());
        assert_eq!(slots.resolve("root0"), scan_stage.root_slot);
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn missing_props_entry_fails_fast() {
        let mut gen = NodeIdGenerator::new();
        let scan = scan_node(&mut gen, FieldProjectionMap::root("root0"));
        let env = VariableEnvironment::build(&scan);
        let metadata = Metadata::default().with_collection("collName", ScanDefinition {
            exists: true,
            ..ScanDefinition::default()
        });
        let props = NodePropsMap::new();

        let mut slots = SlotMap::new();
        let mut rid = None;
        let mut slot_ids = SlotIdGenerator::new();
        let err = NodeLowering::new(&env, &mut slots, &mut rid, &mut slot_ids, &metadata, &props)
            .lower(&scan);
        assert!(matches!(err, Err(LowerError::MissingNodeProps(_))));
    }

    #[test]
    fn unknown_collection_is_rejected() {
        let mut gen = NodeIdGenerator::new();
        let scan = scan_node(&mut gen, FieldProjectionMap::root("root0"));
        let env = VariableEnvironment::build(&scan);
        let metadata = Metadata::default();
        let mut props = NodePropsMap::new();
        props.insert(scan.id, NodeProps::new(0));

        let mut slots = SlotMap::new();
        let mut rid = None;
        let mut slot_ids = SlotIdGenerator::new();
        let err = NodeLowering::new(&env, &mut slots, &mut rid, &mut slot_ids, &metadata, &props)
            .lower(&scan);
        assert!(matches!(err, Err(LowerError::UnknownCollection(_))));
    }
}
