//! Error types for graph construction and evaluation.

use thiserror::Error;

use crate::graph::InputSlot;

/// Error type returned by operator computations.
///
/// Operators may return any error. The evaluator wraps it in
/// [`FlowError::Compute`] together with the failing node's name, except for
/// a `FlowError` itself, which is passed through untouched.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    /// A raw value was supplied where a node reference is required.
    #[error("input {slot} of `{operator}` must be a node, got a {found} value")]
    NotANode {
        operator: String,
        slot: InputSlot,
        found: &'static str,
    },

    #[error("cannot set input {index} of `{node}`: it only has {len} positional inputs")]
    InputOutOfRange {
        node: String,
        index: usize,
        len: usize,
    },

    #[error("variable values must be hashable, got a {found} value")]
    Unhashable { found: &'static str },

    #[error("dependency cycle detected through `{node}`")]
    Cycle { node: String },

    #[error("no cached value stored for the current key of `{source_node}`")]
    MissingCacheEntry { source_node: String },

    #[error("evaluation invariant violated: {0}")]
    Invariant(String),

    #[error("`{node}` failed to compute")]
    Compute {
        node: String,
        #[source]
        source: ComputeError,
    },

    #[error("failed to serialize graph listing")]
    Listing(#[from] serde_json::Error),
}

/// Wrong number of arguments reached an operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} arguments, got {found}")]
pub struct ArityError {
    pub expected: usize,
    pub found: usize,
}
