//! Nodeflow Core
//!
//! This crate provides a lazy dataflow-graph evaluator. Nodes are wired
//! together by naming other nodes as their inputs; evaluating a node computes
//! everything it depends on, each node once per pass, in dependency order.
//!
//! It implements:
//!
//! - Node handles with process-unique display names
//! - Graph building and deterministic topological evaluation
//! - Leaf nodes (constants and externally updated variables)
//! - Value-keyed caching nodes that skip unchanged upstream subgraphs
//! - Node classes built from plain closures
//!
//! Image readers, texture upload, and user interfaces live outside this
//! crate. They plug in by implementing [`Operator`], by writing to a
//! [`Variable`] between passes, or by rendering a [`GraphListing`].
//!
//! # Architecture
//!
//! - `graph`: node handles, graph building, evaluation, graph listings
//! - `ops`: the `Operator` trait and the built-in operators
//! - `value`: the dynamic `Value` type and hashable `Key`s
//! - `config`: evaluation and cache configuration
//!
//! # Example
//!
//! ```rust
//! use nodeflow_core::{evaluate, math, Constant, Value, Variable};
//!
//! let x = Variable::new(1).unwrap();
//! let five = Constant::node(5);
//! let sum = math::plus().node(&[x.node(), &five]);
//!
//! assert_eq!(evaluate(&sum).unwrap(), Value::from(6));
//!
//! // The next pass sees the new value.
//! x.set(2).unwrap();
//! assert_eq!(evaluate(&sum).unwrap(), Value::from(7));
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod ops;
pub mod value;

pub use config::{CachePolicy, EvalConfig};
pub use error::{ComputeError, FlowError, Result};
pub use graph::{evaluate, Evaluator, Graph, GraphListing, Input, InputSlot, Inputs, Node, NodeId};
pub use ops::{math, operator, Args, Cache, Constant, FnOperator, Operator, Variable};
pub use value::{Key, Value};

/// Dependency graph reachable from `root`, for inspection and viewers.
pub fn graph(root: &Node) -> Graph {
    Graph::build(root)
}
