//! Dependency Graph
//!
//! This module implements node handles, graph construction, and evaluation.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are computations ([`Node`]); their inputs are other nodes
//! - Edges are dependencies: if A uses the value of B, A depends on B
//!
//! There is no global graph. Nodes only know their own inputs; a [`Graph`]
//! is built from a root node at the start of every evaluation pass and
//! dropped at the end of it.
//!
//! # Design Decisions
//!
//! 1. Nodes are compared by handle identity ([`NodeId`]), never by content.
//!    Two `Plus` nodes over the same inputs are still two nodes.
//!
//! 2. The graph is rebuilt each pass, so rewiring inputs or changing a
//!    `Variable` between passes needs no invalidation step.
//!
//! 3. We keep both forward (dependencies) and reverse (dependants) edges:
//!    forward edges drive the topological sort, reverse edges route each
//!    computed value to the argument slots that consume it.

mod builder;
mod listing;
mod node;
mod scheduler;

pub use builder::{Edge, Graph};
pub use listing::{GraphListing, ListedEdge, ListedNode};
pub use node::{Input, InputSlot, Inputs, Node, NodeBuilder, NodeId};
pub use scheduler::{evaluate, Evaluator};
