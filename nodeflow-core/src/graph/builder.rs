//! Graph Builder
//!
//! Builds the dependency graph reachable from a root node for one evaluation
//! pass.
//!
//! # Algorithm
//!
//! An iterative depth-first walk with an explicit work-list:
//!
//! 1. Pop a node. If it is already recorded, skip it.
//! 2. Otherwise ask it for its dependencies, record them as its forward
//!    edges, and push them onto the work-list.
//!
//! Every node is expanded once, so shared sub-expressions (diamonds) are
//! recorded once no matter how many dependants they have, and a cycle cannot
//! make the walk loop forever.
//!
//! The reverse edges (dependants) are derived afterwards by inverting the
//! forward edges. Each reverse edge remembers which argument slot of the
//! dependant it feeds.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::{Node, NodeId};
use crate::error::{FlowError, Result};
use crate::ops::Dependencies;

/// A reverse edge: `node` consumes a value as its argument number `slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub node: Node,
    pub slot: usize,
}

type Dependants = SmallVec<[Edge; 2]>;

/// Dependency graph of a single evaluation pass.
///
/// Nodes are kept in discovery order. The graph holds the dependency lists
/// exactly as the nodes reported them while it was built; it is not updated
/// if nodes are rewired afterwards.
#[derive(Debug, Clone)]
pub struct Graph {
    root: Node,
    dependencies: IndexMap<Node, Dependencies>,
    dependants: IndexMap<Node, Dependants>,
}

impl Graph {
    /// Walk from `root` and record every reachable node once.
    pub fn build(root: &Node) -> Self {
        let mut dependencies: IndexMap<Node, Dependencies> = IndexMap::new();
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if dependencies.contains_key(&node) {
                continue;
            }
            let deps = node.dependencies();
            stack.extend(deps.iter().cloned());
            dependencies.insert(node, deps);
        }

        let mut dependants: IndexMap<Node, Dependants> = IndexMap::new();
        dependants.insert(root.clone(), Dependants::new());
        for (node, deps) in &dependencies {
            for (slot, dep) in deps.iter().enumerate() {
                dependants.entry(dep.clone()).or_default().push(Edge {
                    node: node.clone(),
                    slot,
                });
            }
        }

        Self {
            root: root.clone(),
            dependencies,
            dependants,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.dependencies.contains_key(node)
    }

    /// Nodes in discovery order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.dependencies.keys()
    }

    /// `(node, dependencies)` pairs in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&Node, &[Node])> + '_ {
        self.dependencies.iter().map(|(node, deps)| (node, deps.as_slice()))
    }

    pub fn dependencies_of(&self, node: &Node) -> Option<&[Node]> {
        self.dependencies.get(node).map(|deps| deps.as_slice())
    }

    /// Nodes consuming `node`'s value, once per consumed argument.
    pub fn dependants_of(&self, node: &Node) -> impl Iterator<Item = &Node> + '_ {
        self.edges_from(node).iter().map(|edge| &edge.node)
    }

    /// Reverse edges leaving `node`.
    pub fn edges_from(&self, node: &Node) -> &[Edge] {
        self.dependants
            .get(node)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    /// Forward edges as a plain map, for graph viewers.
    pub fn to_map(&self) -> IndexMap<Node, Vec<Node>> {
        self.iter()
            .map(|(node, deps)| (node.clone(), deps.to_vec()))
            .collect()
    }

    /// Order the nodes so that every node comes after all of its
    /// dependencies.
    ///
    /// Uses Kahn's algorithm, seeded with the leaves in reverse discovery
    /// order, so the result is stable for a given graph shape. Fails with
    /// [`FlowError::Cycle`] if the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<Node>> {
        let mut remaining: HashMap<NodeId, usize> = HashMap::with_capacity(self.len());
        let mut ready = VecDeque::new();

        for (node, deps) in self.dependencies.iter().rev() {
            remaining.insert(node.id(), deps.len());
            if deps.is_empty() {
                ready.push_back(node.clone());
            }
        }

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = ready.pop_front() {
            for edge in self.edges_from(&node) {
                if let Some(count) = remaining.get_mut(&edge.node.id()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(edge.node.clone());
                    }
                }
            }
            order.push(node);
        }

        if order.len() != self.len() {
            let stuck = self
                .nodes()
                .find(|node| remaining.get(&node.id()).is_some_and(|count| *count > 0))
                .unwrap_or(&self.root);
            return Err(FlowError::Cycle {
                node: stuck.name().to_owned(),
            });
        }

        Ok(order)
    }

    /// Check that `order` lists every node of the graph exactly once, each
    /// after all of its dependencies.
    pub fn verify_order(&self, order: &[Node]) -> Result<()> {
        let position: HashMap<NodeId, usize> = order
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id(), index))
            .collect();

        if position.len() != order.len() || order.len() != self.len() {
            return Err(FlowError::Invariant(format!(
                "order lists {} nodes, graph has {}",
                order.len(),
                self.len()
            )));
        }

        for (node, deps) in self.iter() {
            let at = position.get(&node.id()).ok_or_else(|| {
                FlowError::Invariant(format!("`{node}` is missing from the order"))
            })?;
            for dep in deps {
                match position.get(&dep.id()) {
                    Some(dep_at) if dep_at < at => {}
                    _ => {
                        return Err(FlowError::Invariant(format!(
                            "`{node}` is ordered before its dependency `{dep}`"
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{math, Constant};

    #[test]
    fn diamond_is_recorded_once() {
        let base = Constant::node(2);
        let left = math::plus().node(&[&base, &base]);
        let right = math::multiply().node(&[&base, &base]);
        let top = math::minus().node(&[&left, &right]);

        let graph = Graph::build(&top);
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.dependencies_of(&top), Some(&[left.clone(), right.clone()][..]));
        assert_eq!(graph.dependants_of(&base).count(), 4);
    }

    #[test]
    fn root_is_first_and_has_no_dependants() {
        let leaf = Constant::node(1);
        let root = math::plus().node(&[&leaf, &leaf]);

        let graph = Graph::build(&root);
        assert_eq!(graph.nodes().next(), Some(&root));
        assert_eq!(graph.dependants_of(&root).count(), 0);
        assert_eq!(
            graph.edges_from(&leaf),
            &[
                Edge { node: root.clone(), slot: 0 },
                Edge { node: root.clone(), slot: 1 },
            ]
        );
    }

    #[test]
    fn single_node_graph() {
        let leaf = Constant::node(1);
        let graph = Graph::build(&leaf);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.topological_order().unwrap(), vec![leaf]);
    }

    #[test]
    fn order_puts_dependencies_first() {
        let one = Constant::node(1);
        let five = Constant::node(5);
        let plus = math::plus().node(&[&one, &five]);
        let minus = math::minus().node(&[&five, &one]);
        let divide = math::divide().node(&[&plus, &minus]);
        let mult = math::multiply().node(&[&divide, &five]);

        let graph = Graph::build(&mult);
        let order = graph.topological_order().unwrap();
        graph.verify_order(&order).unwrap();
        assert_eq!(order.last(), Some(&mult));
    }

    #[test]
    fn order_is_deterministic() {
        let a = Constant::node(1);
        let b = Constant::node(2);
        let c = Constant::node(3);
        let ab = math::plus().node(&[&a, &b]);
        let root = math::plus().node(&[&ab, &c]);

        let first = Graph::build(&root).topological_order().unwrap();
        let second = Graph::build(&root).topological_order().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cycles_are_reported() {
        let one = Constant::node(1);
        let a = math::plus().node(&[&one, &one]);
        let b = math::plus().node(&[&a, &one]);
        a.set_input(1, &b).unwrap();

        let graph = Graph::build(&b);
        assert_eq!(graph.len(), 3);
        assert!(matches!(graph.topological_order(), Err(FlowError::Cycle { .. })));
    }

    #[test]
    fn verify_order_rejects_bad_orders() {
        let leaf = Constant::node(1);
        let root = math::plus().node(&[&leaf, &leaf]);
        let graph = Graph::build(&root);

        assert!(graph.verify_order(&[root.clone(), leaf.clone()]).is_err());
        assert!(graph.verify_order(&[leaf.clone()]).is_err());
        assert!(graph.verify_order(&[leaf, root]).is_ok());
    }
}
