//! Error types for rewriting and lowering.

use thiserror::Error;

use crate::algebra::NodeId;

/// Errors raised while rewriting or lowering an algebra tree.
///
/// Every variant is fatal to the current lowering call: the pipeline
/// either returns a complete stage tree or one of these, never a
/// partially lowered result. Most variants indicate a bug in the
/// upstream planner or in the caller's wiring (missing side-table
/// entries, unresolved projections, arity mismatches) rather than a
/// condition the caller can retry.
#[derive(Debug, Error)]
pub enum LowerError {
    /// A scan-family node referenced a collection absent from the metadata.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// An index scan referenced an index absent from its collection's definition.
    #[error("unknown index {index} on collection {collection}")]
    UnknownIndex {
        /// The collection that was consulted.
        collection: String,
        /// The index name that failed to resolve.
        index: String,
    },

    /// A plan node has no entry in the node-properties side-table.
    #[error("no planning properties registered for node {0}")]
    MissingNodeProps(NodeId),

    /// A variable referenced a projection no node in the tree defines.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// A projection is defined by the tree but its defining node has not
    /// been lowered yet. Signals an ordering bug in the caller: children
    /// must be lowered before anything that references their output.
    #[error("projection {0} referenced before a slot was assigned")]
    SlotNotAssigned(String),

    /// A node required a projection that no lowered child supplies.
    #[error("unresolved projection {projection} under node {node}")]
    UnresolvedProjection {
        /// The projection name that failed to resolve.
        projection: String,
        /// The node whose lowering required it.
        node: NodeId,
    },

    /// Left/right equality-key lists of a hash or merge join differ in length.
    #[error("join key arity mismatch: {left} left keys vs {right} right keys")]
    JoinKeyArity {
        /// Number of left-side keys.
        left: usize,
        /// Number of right-side keys.
        right: usize,
    },

    /// A merge join's collation-direction list does not cover its keys.
    #[error("merge join has {keys} keys but {directions} collation directions")]
    MergeCollationArity {
        /// Number of equality keys.
        keys: usize,
        /// Number of collation directions supplied.
        directions: usize,
    },

    /// A group-by's output projection list and aggregate list disagree.
    #[error("group-by declares {outputs} outputs but {aggregates} aggregates")]
    GroupByArity {
        /// Number of output projections.
        outputs: usize,
        /// Number of aggregate expressions.
        aggregates: usize,
    },

    /// A path composition that cannot be rewritten, e.g. an evaluation
    /// wrapper whose path operand is not a path variant.
    #[error("malformed path expression: {0}")]
    MalformedPath(String),

    /// A path-family variant survived into expression lowering.
    #[error("path expression reached expression lowering unlowered: {0}")]
    UnloweredPath(String),

    /// Constant folding produced a value outside the representable
    /// range for its tag. Never silently truncated.
    #[error("constant folding overflowed {0}")]
    ConstantOverflow(&'static str),

    /// The path-lowering/const-fold loop failed to reach a fixed point.
    #[error("rewrite loop did not converge after {0} passes")]
    RewriteDivergence(usize),

    /// A spool consumer referenced a spool id with no producer in the tree.
    #[error("spool consumer references spool id {0} with no producer in the tree")]
    UnknownSpoolId(u64),

    /// An eager spool producer carried a non-trivial admission guard.
    #[error("eager spool producer {0} has a non-constant guard")]
    EagerSpoolGuard(NodeId),
}

/// Result type for rewrite and lowering operations.
pub type LowerResult<T> = Result<T, LowerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LowerError::UnknownCollection("orders".to_string());
        assert!(err.to_string().contains("unknown collection"));
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn arity_display() {
        let err = LowerError::JoinKeyArity { left: 2, right: 3 };
        assert!(err.to_string().contains("2 left keys"));
        assert!(err.to_string().contains("3 right keys"));
    }
}
