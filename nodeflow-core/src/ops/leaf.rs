//! Leaf operators: nodes without inputs.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{Args, KeyMemo, Operator};
use crate::error::{ComputeError, FlowError, Result};
use crate::graph::{Input, Inputs, Node};
use crate::value::{Key, Value};

/// A node that always produces the same value.
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn node(value: impl Into<Value>) -> Node {
        Node::new(Self { value: value.into() }, Inputs::new())
    }

    pub fn named(value: impl Into<Value>, name: &str) -> Node {
        Node::with_name(Self { value: value.into() }, Inputs::new(), name)
    }
}

impl Operator for Constant {
    fn class_name(&self) -> &str {
        "Constant"
    }

    fn compute(&self, _inputs: &Inputs, _args: Args) -> std::result::Result<Value, ComputeError> {
        Ok(self.value.clone())
    }

    // The value can never change under this node, so the node itself
    // identifies it. This also covers opaque values, which have no key.
    fn key(&self, node: &Node, _inputs: &Inputs, _keys: &mut KeyMemo) -> Key {
        Key::Identity(node.id())
    }
}

struct Slot {
    value: Value,
    key: Key,
}

impl Slot {
    fn new(value: Value) -> Result<Self> {
        let key = value.key().ok_or(FlowError::Unhashable {
            found: value.type_name(),
        })?;
        Ok(Self { value, key })
    }
}

struct VariableOp {
    slot: Arc<RwLock<Slot>>,
}

impl Operator for VariableOp {
    fn class_name(&self) -> &str {
        "Variable"
    }

    fn compute(&self, _inputs: &Inputs, _args: Args) -> std::result::Result<Value, ComputeError> {
        Ok(self.slot.read().value.clone())
    }

    fn key(&self, node: &Node, _inputs: &Inputs, _keys: &mut KeyMemo) -> Key {
        Key::Cell {
            id: node.id(),
            value: Box::new(self.slot.read().key.clone()),
        }
    }
}

/// A node holding a value that callers change between evaluation passes.
///
/// The engine only reads the value. A frame scrubber, for instance, writes
/// the current frame here and then evaluates the output node.
///
/// Values must be hashable so that changing the value changes the node's key.
#[derive(Clone)]
pub struct Variable {
    node: Node,
    slot: Arc<RwLock<Slot>>,
}

impl Variable {
    pub fn new(value: impl Into<Value>) -> Result<Self> {
        Self::build(value.into(), None)
    }

    pub fn named(value: impl Into<Value>, name: &str) -> Result<Self> {
        Self::build(value.into(), Some(name))
    }

    fn build(value: Value, name: Option<&str>) -> Result<Self> {
        let slot = Arc::new(RwLock::new(Slot::new(value)?));
        let operator = VariableOp {
            slot: Arc::clone(&slot),
        };
        let node = match name {
            Some(name) => Node::with_name(operator, Inputs::new(), name),
            None => Node::new(operator, Inputs::new()),
        };
        Ok(Self { node, slot })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn get(&self) -> Value {
        self.slot.read().value.clone()
    }

    /// Replace the value. Takes effect on the next evaluation pass.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        *self.slot.write() = Slot::new(value.into())?;
        Ok(())
    }
}

impl AsRef<Node> for Variable {
    fn as_ref(&self) -> &Node {
        &self.node
    }
}

impl From<&Variable> for Input {
    fn from(variable: &Variable) -> Self {
        Input::Node(variable.node.clone())
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("node", &self.node)
            .field("value", &self.get())
            .finish()
    }
}
