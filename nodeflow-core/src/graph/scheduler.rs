//! Evaluation Scheduler
//!
//! The evaluator runs one pass over the graph reachable from a root node.
//!
//! # Algorithm
//!
//! 1. Build the graph from the root (see [`Graph::build`]).
//! 2. Sort it topologically so that dependencies come before dependants.
//! 3. Give every node an argument buffer with one slot per dependency.
//! 4. Process nodes in order: compute each node from its buffer, then write
//!    the result into the matching slot of every dependant and drop the
//!    node's own buffer.
//! 5. Once every node has run, no buffer may be left over.
//!
//! Each node is computed at most once per pass, however many dependants it
//! has. Nothing is kept between passes except what individual cache nodes
//! store.
//!
//! # Errors
//!
//! The first failing node aborts the pass and its error is returned as is.
//! No partial results are produced.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::{debug, debug_span, trace};

use super::builder::Graph;
use super::node::{Node, NodeId};
use crate::config::EvalConfig;
use crate::error::{FlowError, Result};
use crate::ops::Args;
use crate::value::Value;

type Buffer = SmallVec<[Option<Value>; 4]>;

/// Runs evaluation passes with a fixed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate `root` and everything it depends on.
    pub fn evaluate(&self, root: &Node) -> Result<Value> {
        let graph = Graph::build(root);
        let order = graph.topological_order()?;
        if self.config.verify_order {
            graph.verify_order(&order)?;
        }

        let _span = debug_span!("evaluate", root = %root, nodes = graph.len()).entered();
        self.run(&graph, &order)
    }

    fn run(&self, graph: &Graph, order: &[Node]) -> Result<Value> {
        let mut pending: HashMap<NodeId, Buffer> = graph
            .iter()
            .map(|(node, deps)| (node.id(), Buffer::from_elem(None, deps.len())))
            .collect();
        let mut result = None;

        for node in order {
            let buffer = pending.remove(&node.id()).ok_or_else(|| {
                FlowError::Invariant(format!("`{node}` has no argument buffer"))
            })?;
            let args = buffer
                .into_iter()
                .enumerate()
                .map(|(slot, value)| {
                    value.ok_or_else(|| {
                        FlowError::Invariant(format!("argument {slot} of `{node}` was never supplied"))
                    })
                })
                .collect::<Result<Args>>()?;

            if self.config.log_values {
                debug!(node = %node, args = ?args, "computing");
            }
            let value = node.compute(args)?;
            if self.config.log_values {
                debug!(node = %node, value = ?value, "computed");
            } else {
                trace!(node = %node, "computed");
            }

            for edge in graph.edges_from(node) {
                let slot = pending
                    .get_mut(&edge.node.id())
                    .and_then(|buffer| buffer.get_mut(edge.slot))
                    .ok_or_else(|| {
                        FlowError::Invariant(format!(
                            "`{}` consumed its arguments before `{node}` was computed",
                            edge.node
                        ))
                    })?;
                *slot = Some(value.clone());
            }

            if node == graph.root() {
                result = Some(value);
            }
        }

        if let Some(id) = pending.keys().next() {
            let leftover = graph
                .nodes()
                .find(|node| node.id() == *id)
                .map(|node| node.name().to_owned())
                .unwrap_or_else(|| format!("node {}", id.raw()));
            return Err(FlowError::Invariant(format!(
                "arguments for `{leftover}` were never consumed"
            )));
        }

        result.ok_or_else(|| FlowError::Invariant(format!("root `{}` was never evaluated", graph.root())))
    }
}

/// Evaluate `root` with the default configuration.
pub fn evaluate(root: &Node) -> Result<Value> {
    Evaluator::default().evaluate(root)
}
