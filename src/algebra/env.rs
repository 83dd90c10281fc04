//! Variable environment: a derived index over an algebra tree.
//!
//! The environment records, for every projection name, the plan node
//! that defines it, and can enumerate the free variables of any
//! expression. It is recomputed from the tree on demand; a rewrite pass
//! that changes the tree's shape invalidates any previously built
//! environment, so callers rebuild between passes.

use std::collections::{BTreeSet, HashMap};

use super::expr::{Expr, ProjectionName};
use super::node::{NodeId, PlanNode, PlanNodeKind};

/// Derived mapping from projection names to their defining nodes.
#[derive(Debug, Clone, Default)]
pub struct VariableEnvironment {
    definitions: HashMap<ProjectionName, NodeId>,
}

impl VariableEnvironment {
    /// An environment with no definitions, for standalone scalar
    /// expressions whose variables are all externally bound.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the environment for a plan tree.
    ///
    /// Definitions are collected bottom-up; when a name is rebound
    /// higher in the tree (union outputs, unwind, spool consumers), the
    /// higher node wins, matching what references above it observe.
    #[must_use]
    pub fn build(root: &PlanNode) -> Self {
        let mut env = Self::default();
        env.collect(root);
        env
    }

    fn collect(&mut self, node: &PlanNode) {
        for child in node.children() {
            self.collect(child);
        }
        match &node.kind {
            PlanNodeKind::PhysicalScan(scan) => {
                for name in scan.projections.bound_projections() {
                    self.definitions.insert(name.clone(), node.id);
                }
            }
            PlanNodeKind::Seek(seek) => {
                for name in seek.projections.bound_projections() {
                    self.definitions.insert(name.clone(), node.id);
                }
            }
            PlanNodeKind::IndexScan(scan) => {
                if let Some(rid) = &scan.rid_projection {
                    self.definitions.insert(rid.clone(), node.id);
                }
                for (_, name) in &scan.key_projections {
                    self.definitions.insert(name.clone(), node.id);
                }
            }
            PlanNodeKind::Evaluation { projection, .. } => {
                self.definitions.insert(projection.clone(), node.id);
            }
            PlanNodeKind::GroupBy { node: group, .. } => {
                for name in &group.outputs {
                    self.definitions.insert(name.clone(), node.id);
                }
            }
            PlanNodeKind::Unwind { node: unwind, .. } => {
                self.definitions.insert(unwind.projection.clone(), node.id);
                self.definitions.insert(unwind.index_projection.clone(), node.id);
            }
            PlanNodeKind::SpoolConsumer { projections, .. }
            | PlanNodeKind::Union { projections, .. } => {
                for name in projections {
                    self.definitions.insert(name.clone(), node.id);
                }
            }
            PlanNodeKind::CoScan
            | PlanNodeKind::Filter { .. }
            | PlanNodeKind::Collation { .. }
            | PlanNodeKind::LimitSkip { .. }
            | PlanNodeKind::Unique { .. }
            | PlanNodeKind::SpoolProducer { .. }
            | PlanNodeKind::HashJoin { .. }
            | PlanNodeKind::MergeJoin { .. }
            | PlanNodeKind::NestedLoopJoin { .. }
            | PlanNodeKind::SortedMerge { .. } => {}
        }
    }

    /// The node defining `name`, if any node in the tree does.
    #[must_use]
    pub fn definition_of(&self, name: &str) -> Option<NodeId> {
        self.definitions.get(name).copied()
    }

    /// Whether any node in the tree defines `name`.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// The free variables of an expression.
    ///
    /// The expression sub-language has no binders, so every variable
    /// occurrence is free within the expression itself.
    #[must_use]
    pub fn free_variables(expr: &Expr) -> BTreeSet<ProjectionName> {
        let mut vars = BTreeSet::new();
        collect_variables(expr, &mut vars);
        vars
    }
}

fn collect_variables(expr: &Expr, out: &mut BTreeSet<ProjectionName>) {
    match expr {
        Expr::Constant(_) | Expr::PathIdentity => {}
        Expr::Variable(name) => {
            out.insert(name.clone());
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_variables(left, out);
            collect_variables(right, out);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                collect_variables(arg, out);
            }
        }
        Expr::EvalPath { path, input } | Expr::EvalFilter { path, input } => {
            collect_variables(path, out);
            collect_variables(input, out);
        }
        Expr::PathGet { sub, .. } => collect_variables(sub, out),
        Expr::PathCompare { bound, .. } => collect_variables(bound, out),
        Expr::PathConstant(inner) => collect_variables(inner, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::node::{FieldProjectionMap, NodeIdGenerator, PhysicalScanNode};
    use crate::algebra::Operator;

    fn scan(gen: &mut NodeIdGenerator) -> PlanNode {
        PlanNode::new(
            gen.generate(),
            PlanNodeKind::PhysicalScan(PhysicalScanNode {
                projections: FieldProjectionMap::root("scan0"),
                collection: "collName".into(),
                parallel: false,
            }),
        )
    }

    #[test]
    fn scan_defines_its_projections() {
        let mut gen = NodeIdGenerator::new();
        let node = scan(&mut gen);
        let env = VariableEnvironment::build(&node);
        assert_eq!(env.definition_of("scan0"), Some(NodeId(0)));
        assert!(!env.defines("other"));
    }

    #[test]
    fn evaluation_defines_its_projection() {
        let mut gen = NodeIdGenerator::new();
        let input = scan(&mut gen);
        let eval = PlanNode::new(
            gen.generate(),
            PlanNodeKind::Evaluation {
                projection: "proj0".into(),
                expr: Expr::variable("scan0"),
                input: Box::new(input),
            },
        );
        let env = VariableEnvironment::build(&eval);
        assert_eq!(env.definition_of("proj0"), Some(NodeId(1)));
        assert_eq!(env.definition_of("scan0"), Some(NodeId(0)));
    }

    #[test]
    fn free_variables_cover_paths_and_scalars() {
        let e = Expr::eval_filter(
            Expr::path_compare(Operator::Eq, Expr::variable("b")),
            Expr::variable("a"),
        );
        let vars = VariableEnvironment::free_variables(&e);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["a".to_string(), "b".to_string()]);
    }
}
