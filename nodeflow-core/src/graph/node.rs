//! Graph Nodes
//!
//! This module defines the node handle that user code wires together.
//!
//! A [`Node`] is a cheap, clonable handle to shared node storage. Two handles
//! are equal if and only if they point at the same node: equality and hashing
//! use the [`NodeId`], never the node's contents.
//!
//! Each node stores:
//!
//! - a display name, unique per base name (`Plus#001`, `Plus#002`, ...)
//! - its inputs, an ordered positional list followed by named inputs
//! - the [`Operator`] that computes its value
//!
//! Inputs sit behind a lock so they can be rewired between evaluation passes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{FlowError, Result};
use crate::ops::{Args, Dependencies, KeyMemo, Operator};
use crate::value::{Key, Value};

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

// Per-base-name counters shared by the whole process.
static NAME_COUNTERS: OnceLock<DashMap<String, u64>> = OnceLock::new();

/// Produce the next display name for `base`, e.g. `Plus#003`.
fn unique_name(base: &str) -> String {
    let counters = NAME_COUNTERS.get_or_init(DashMap::new);
    let mut count = counters.entry(base.to_owned()).or_insert(0);
    *count += 1;
    format!("{base}#{:03}", *count)
}

/// Address of a single input on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputSlot {
    Index(usize),
    Name(String),
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSlot::Index(i) => write!(f, "#{i}"),
            InputSlot::Name(name) => write!(f, "`{name}`"),
        }
    }
}

impl From<usize> for InputSlot {
    fn from(index: usize) -> Self {
        InputSlot::Index(index)
    }
}

impl From<&str> for InputSlot {
    fn from(name: &str) -> Self {
        InputSlot::Name(name.to_owned())
    }
}

impl From<String> for InputSlot {
    fn from(name: String) -> Self {
        InputSlot::Name(name)
    }
}

/// The dependency references of a node.
///
/// Positional inputs come first, then named inputs in insertion order. This
/// is also the order in which dependency values reach `Operator::compute`.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    positional: SmallVec<[Node; 4]>,
    named: IndexMap<String, Node>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positional<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        Self {
            positional: nodes.into_iter().collect(),
            named: IndexMap::new(),
        }
    }

    /// Append a positional input.
    pub fn with(mut self, node: Node) -> Self {
        self.positional.push(node);
        self
    }

    /// Add a named input. A repeated name replaces the earlier node.
    pub fn with_named(mut self, name: impl Into<String>, node: Node) -> Self {
        self.named.insert(name.into(), node);
        self
    }

    pub fn positional(&self) -> &[Node] {
        &self.positional
    }

    pub fn named(&self) -> &IndexMap<String, Node> {
        &self.named
    }

    pub fn get(&self, slot: &InputSlot) -> Option<&Node> {
        match slot {
            InputSlot::Index(i) => self.positional.get(*i),
            InputSlot::Name(name) => self.named.get(name),
        }
    }

    /// All inputs, positional first.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.positional.iter().chain(self.named.values())
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An argument to the dynamic construction path.
///
/// Accepting raw values here lets the builder report a mis-wired graph as a
/// [`FlowError::NotANode`] at construction time instead of at evaluation.
#[derive(Debug, Clone)]
pub enum Input {
    Node(Node),
    Value(Value),
}

impl From<Node> for Input {
    fn from(node: Node) -> Self {
        Input::Node(node)
    }
}

impl From<&Node> for Input {
    fn from(node: &Node) -> Self {
        Input::Node(node.clone())
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(value)
    }
}

impl From<i64> for Input {
    fn from(i: i64) -> Self {
        Input::Value(Value::Int(i))
    }
}

impl From<i32> for Input {
    fn from(i: i32) -> Self {
        Input::Value(Value::from(i))
    }
}

impl From<f64> for Input {
    fn from(f: f64) -> Self {
        Input::Value(Value::Float(f))
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Value(Value::from(s))
    }
}

struct NodeInner {
    id: NodeId,
    name: String,
    class: String,
    inputs: RwLock<Inputs>,
    operator: Box<dyn Operator>,
}

// Dropping the last handle to a long chain would otherwise recurse once per
// upstream node. Inputs are unlinked onto a local list instead.
impl Drop for NodeInner {
    fn drop(&mut self) {
        let mut orphans: Vec<Node> = take_inputs(self.inputs.get_mut());
        while let Some(node) = orphans.pop() {
            if let Some(mut inner) = Arc::into_inner(node.inner) {
                orphans.extend(take_inputs(inner.inputs.get_mut()));
            }
        }
    }
}

fn take_inputs(inputs: &mut Inputs) -> Vec<Node> {
    let Inputs { positional, named } = std::mem::take(inputs);
    positional.into_iter().chain(named.into_values()).collect()
}

/// Handle to a node in a dataflow graph.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Create a node from an operator and already-validated inputs.
    pub fn new(operator: impl Operator, inputs: Inputs) -> Self {
        Self::from_parts(Box::new(operator), inputs, None)
    }

    /// Like [`Node::new`], with `name` as the base of the display name.
    pub fn with_name(operator: impl Operator, inputs: Inputs, name: &str) -> Self {
        Self::from_parts(Box::new(operator), inputs, Some(name))
    }

    /// Start a node whose inputs are checked when built.
    pub fn builder(operator: impl Operator) -> NodeBuilder {
        NodeBuilder::new(Box::new(operator))
    }

    pub(crate) fn from_parts(
        operator: Box<dyn Operator>,
        inputs: Inputs,
        name: Option<&str>,
    ) -> Self {
        let class = operator.class_name().to_owned();
        let name = unique_name(name.unwrap_or(&class));
        Self {
            inner: Arc::new(NodeInner {
                id: NodeId::new(),
                name,
                class,
                inputs: RwLock::new(inputs),
                operator,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The display name, e.g. `Plus#001`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the operator class this node was built from.
    pub fn class_name(&self) -> &str {
        &self.inner.class
    }

    /// Snapshot of the current inputs.
    pub fn inputs(&self) -> Inputs {
        self.inner.inputs.read().clone()
    }

    /// The nodes whose values this node needs on the next pass, in argument
    /// order. Usually all inputs; caches report none once they hold a value.
    pub fn dependencies(&self) -> Dependencies {
        let inputs = self.inputs();
        self.inner.operator.dependencies(&inputs)
    }

    /// Structural fingerprint of this node and everything upstream of it.
    ///
    /// The graph must be acyclic.
    pub fn key(&self) -> Key {
        KeyMemo::new().of(self)
    }

    pub(crate) fn key_with(&self, keys: &mut KeyMemo) -> Key {
        let inputs = self.inputs();
        self.inner.operator.key(self, &inputs, keys)
    }

    /// Run this node's operator on already-resolved dependency values.
    pub fn compute(&self, args: Args) -> Result<Value> {
        let inputs = self.inputs();
        self.inner
            .operator
            .compute(&inputs, args)
            .map_err(|source| match source.downcast::<FlowError>() {
                Ok(flow) => *flow,
                Err(source) => FlowError::Compute {
                    node: self.name().to_owned(),
                    source,
                },
            })
    }

    /// Replace all inputs. Must not be called while this node is being
    /// evaluated.
    pub fn set_inputs(&self, inputs: Inputs) {
        *self.inner.inputs.write() = inputs;
    }

    /// Rewire a single input.
    ///
    /// A positional index equal to the current length appends.
    pub fn set_input(&self, slot: impl Into<InputSlot>, node: &Node) -> Result<()> {
        let mut inputs = self.inner.inputs.write();
        match slot.into() {
            InputSlot::Index(index) => {
                let len = inputs.positional.len();
                if index < len {
                    inputs.positional[index] = node.clone();
                } else if index == len {
                    inputs.positional.push(node.clone());
                } else {
                    return Err(FlowError::InputOutOfRange {
                        node: self.name().to_owned(),
                        index,
                        len,
                    });
                }
            }
            InputSlot::Name(name) => {
                inputs.named.insert(name, node.clone());
            }
        }
        Ok(())
    }

    /// Evaluate this node with the default configuration.
    pub fn evaluate(&self) -> Result<Value> {
        crate::graph::evaluate(self)
    }

    /// Dependency graph reachable from this node.
    pub fn graph(&self) -> crate::graph::Graph {
        crate::graph::Graph::build(self)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'[{}]", self.name(), self.class_name())
    }
}

/// Builder for the dynamic construction path.
///
/// Inputs are collected as [`Input`]s and validated in [`NodeBuilder::build`],
/// which fails on the first input that is not a node.
pub struct NodeBuilder {
    operator: Box<dyn Operator>,
    positional: Vec<Input>,
    named: Vec<(String, Input)>,
    name: Option<String>,
}

impl NodeBuilder {
    pub(crate) fn new(operator: Box<dyn Operator>) -> Self {
        Self {
            operator,
            positional: Vec::new(),
            named: Vec::new(),
            name: None,
        }
    }

    pub fn input(mut self, input: impl Into<Input>) -> Self {
        self.positional.push(input.into());
        self
    }

    pub fn inputs<I, T>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        self.positional.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn named_input(mut self, name: impl Into<String>, input: impl Into<Input>) -> Self {
        self.named.push((name.into(), input.into()));
        self
    }

    /// Base of the display name; defaults to the operator's class name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Node> {
        let class = self.operator.class_name();
        let reject = |slot: InputSlot, value: &Value| FlowError::NotANode {
            operator: class.to_owned(),
            slot,
            found: value.type_name(),
        };

        let mut inputs = Inputs::new();
        for (index, input) in self.positional.into_iter().enumerate() {
            match input {
                Input::Node(node) => inputs.positional.push(node),
                Input::Value(value) => return Err(reject(InputSlot::Index(index), &value)),
            }
        }
        for (name, input) in self.named {
            match input {
                Input::Node(node) => {
                    inputs.named.insert(name, node);
                }
                Input::Value(value) => return Err(reject(InputSlot::Name(name), &value)),
            }
        }

        Ok(Node::from_parts(self.operator, inputs, self.name.as_deref()))
    }
}
