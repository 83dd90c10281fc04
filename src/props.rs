//! Node-properties side-table.
//!
//! Planning metadata is deliberately kept out of the tree nodes so the
//! tree stays reusable across planning phases. Each physical node in a
//! tree being lowered must have an entry here, keyed by its [`NodeId`];
//! lowering fails fast on a missing entry.

use std::collections::HashMap;

use crate::algebra::{NodeId, ProjectionName, SortDirection};
use crate::metadata::DistributionAndPaths;

/// Cost estimate pair for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cost {
    /// Cost of this node alone.
    pub local: f64,
    /// Cost of this node's whole subtree.
    pub total: f64,
}

/// Projections a node must preserve to its output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionRequirement {
    /// The required projection names.
    pub projections: Vec<ProjectionName>,
    /// Whether the listed order is significant.
    pub order_sensitive: bool,
}

impl ProjectionRequirement {
    /// An order-sensitive requirement over the given names.
    #[must_use]
    pub fn ordered(projections: Vec<ProjectionName>) -> Self {
        Self { projections, order_sensitive: true }
    }
}

/// Planning metadata for one plan node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeProps {
    /// Planner-assigned node id, stamped onto the lowered stage.
    /// Process-unique within one lowering run.
    pub plan_node_id: i32,
    /// Projections the node must preserve to its output.
    pub projection_requirement: ProjectionRequirement,
    /// Collation the node's output must satisfy, if any.
    pub collation_requirement: Option<Vec<(ProjectionName, SortDirection)>>,
    /// Cost estimates.
    pub cost: Cost,
    /// Distribution of the node's output.
    pub distribution: DistributionAndPaths,
    /// Whether the node's output is restricted to its required projections.
    pub restricted: bool,
}

impl NodeProps {
    /// Creates properties with the given planner-assigned id.
    #[must_use]
    pub fn new(plan_node_id: i32) -> Self {
        Self { plan_node_id, ..Self::default() }
    }

    /// Sets the projection requirement.
    #[must_use]
    pub fn with_projection_requirement(mut self, req: ProjectionRequirement) -> Self {
        self.projection_requirement = req;
        self
    }

    /// Sets the collation requirement.
    #[must_use]
    pub fn with_collation_requirement(
        mut self,
        collation: Vec<(ProjectionName, SortDirection)>,
    ) -> Self {
        self.collation_requirement = Some(collation);
        self
    }
}

/// Side-table associating node identities with planning metadata.
#[derive(Debug, Clone, Default)]
pub struct NodePropsMap {
    entries: HashMap<NodeId, NodeProps>,
}

impl NodePropsMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers properties for a node.
    pub fn insert(&mut self, id: NodeId, props: NodeProps) {
        self.entries.insert(id, props);
    }

    /// Looks up a node's properties.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeProps> {
        self.entries.get(&id)
    }
}
