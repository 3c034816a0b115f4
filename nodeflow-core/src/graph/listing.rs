//! Graph Listing
//!
//! A flat, serializable description of a [`Graph`] for node-graph viewers.
//! The engine does not depend on any viewer; viewers consume the JSON.
//!
//! Each node carries a `layer`: its longest distance from the root, with the
//! root on layer 0. Drawing layers as rows gives a readable layout without a
//! full layout engine.

use std::collections::HashMap;

use serde::Serialize;

use super::builder::Graph;
use super::node::NodeId;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphListing {
    pub root: NodeId,
    pub nodes: Vec<ListedNode>,
    pub edges: Vec<ListedEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedNode {
    pub id: NodeId,
    pub name: String,
    pub class: String,
    pub layer: usize,
}

/// `dependant` consumes `dependency` as its argument number `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEdge {
    pub dependant: NodeId,
    pub dependency: NodeId,
    pub slot: usize,
}

impl GraphListing {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(&self, id: NodeId) -> Option<&ListedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

impl Graph {
    /// Describe this graph for a viewer. Fails on cyclic graphs.
    pub fn listing(&self) -> Result<GraphListing> {
        let order = self.topological_order()?;

        // Dependants come before dependencies when walking the order
        // backwards, so each node's layer is final once it is reached.
        let mut layers: HashMap<NodeId, usize> = HashMap::with_capacity(self.len());
        layers.insert(self.root().id(), 0);
        for node in order.iter().rev() {
            let layer = layers.get(&node.id()).copied().unwrap_or(0);
            for dep in self.dependencies_of(node).unwrap_or(&[]) {
                let entry = layers.entry(dep.id()).or_insert(0);
                *entry = (*entry).max(layer + 1);
            }
        }

        let nodes = self
            .nodes()
            .map(|node| ListedNode {
                id: node.id(),
                name: node.name().to_owned(),
                class: node.class_name().to_owned(),
                layer: layers.get(&node.id()).copied().unwrap_or(0),
            })
            .collect();

        let edges = self
            .iter()
            .flat_map(|(node, deps)| {
                deps.iter().enumerate().map(move |(slot, dep)| ListedEdge {
                    dependant: node.id(),
                    dependency: dep.id(),
                    slot,
                })
            })
            .collect();

        Ok(GraphListing {
            root: self.root().id(),
            nodes,
            edges,
        })
    }
}
