//! Plan-to-stage lowering.
//!
//! Consumes a rewritten plan tree (paths already eliminated) and
//! produces an executable stage tree wired together with slots. Slot
//! assignment is the exclusive business of node lowering: stages that
//! define projections draw fresh slots from a [`SlotIdGenerator`] and
//! publish them in the [`SlotMap`]; expression lowering only ever reads
//! that map.
//!
//! The generators and the slot map are caller-owned so a later lowering
//! over the same catalog can continue from where a previous one left
//! off without reusing identifiers.

mod expr;
mod node;

pub use expr::ExpressionLowering;
pub use node::NodeLowering;

use std::collections::HashMap;

use crate::algebra::{PlanNode, ProjectionName, VariableEnvironment};
use crate::error::LowerResult;
use crate::metadata::Metadata;
use crate::props::NodePropsMap;
use crate::stage::{SlotId, Stage};

/// Hands out fresh, never-reused slot identifiers.
#[derive(Debug, Default, Clone)]
pub struct SlotIdGenerator {
    next: u64,
}

impl SlotIdGenerator {
    /// Creates a generator starting at slot zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next unused slot id.
    pub fn generate(&mut self) -> SlotId {
        let id = SlotId(self.next);
        self.next += 1;
        id
    }
}

/// Current binding of projection names to slots.
///
/// A projection may be rebound as lowering walks up the tree (an unwind
/// rebinds its input projection to the unwound element, for instance);
/// `define` therefore overwrites. References always see the binding
/// that is current at their point in the walk.
#[derive(Debug, Default, Clone)]
pub struct SlotMap {
    bindings: HashMap<ProjectionName, SlotId>,
}

impl SlotMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `slot`, replacing any earlier binding.
    pub fn define(&mut self, name: impl Into<ProjectionName>, slot: SlotId) {
        self.bindings.insert(name.into(), slot);
    }

    /// Looks up the current slot for `name`. Never allocates.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<SlotId> {
        self.bindings.get(name).copied()
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no projection has been slotted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Lowers a full plan tree into a stage tree.
///
/// `rid_slot` receives the row-id slot published by the scan family, if
/// any node bound one. The slot map and generator are left holding
/// their final state so a follow-up lowering can continue from them.
pub fn lower_plan(
    tree: &PlanNode,
    env: &VariableEnvironment,
    slots: &mut SlotMap,
    rid_slot: &mut Option<SlotId>,
    slot_ids: &mut SlotIdGenerator,
    metadata: &Metadata,
    props: &NodePropsMap,
) -> LowerResult<Stage> {
    NodeLowering::new(env, slots, rid_slot, slot_ids, metadata, props).lower(tree)
}
