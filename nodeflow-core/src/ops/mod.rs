//! Operators
//!
//! An [`Operator`] is the computation behind a node. The node owns the
//! inputs; the operator decides what to do with their values.
//!
//! # Provided Operators
//!
//! - [`Constant`]: a fixed value
//! - [`Variable`]: a value that callers change between evaluation passes
//! - [`Cache`]: reuses a source's result while the source's key is unchanged
//! - [`operator`]: turns a closure into a node class
//! - [`math`]: arithmetic built on top of [`operator`]
//!
//! # Writing an Operator
//!
//! Only `class_name` and `compute` are required. `compute` receives one
//! argument per dependency, positional inputs first, then named inputs in
//! insertion order.
//!
//! Override `dependencies` to request fewer inputs than the node has (this
//! is how caches skip their source), and `key` when the node's output depends
//! on something other than its inputs.

mod cache;
mod function;
mod leaf;
pub mod math;

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{ArityError, ComputeError};
use crate::graph::{Inputs, Node, NodeId};
use crate::value::{Key, Value};

pub use cache::{Cache, CacheBuilder, CacheStats, KeyFn};
pub use function::{operator, FnOperator};
pub use leaf::{Constant, Variable};

/// Nodes a node needs evaluated before it can compute.
pub type Dependencies = SmallVec<[Node; 4]>;

/// The computation behind a node.
pub trait Operator: Send + Sync + 'static {
    /// Class name, also the default base of node display names.
    fn class_name(&self) -> &str;

    /// Compute the node's value from its dependencies' values.
    fn compute(&self, inputs: &Inputs, args: Args) -> Result<Value, ComputeError>;

    /// Dependencies for the next evaluation pass. Defaults to every input.
    fn dependencies(&self, inputs: &Inputs) -> Dependencies {
        inputs.iter().cloned().collect()
    }

    /// Fingerprint of the node. Defaults to the class name plus the keys of
    /// all inputs.
    fn key(&self, _node: &Node, inputs: &Inputs, keys: &mut KeyMemo) -> Key {
        keys.structural(self.class_name(), inputs)
    }
}

/// Resolved dependency values handed to `Operator::compute`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: SmallVec<[Value; 4]>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Take exactly `N` arguments.
    pub fn exact<const N: usize>(self) -> Result<[Value; N], ArityError> {
        let found = self.values.len();
        self.values
            .into_vec()
            .try_into()
            .map_err(|_| ArityError { expected: N, found })
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Memoizes node keys while fingerprinting a subgraph, so a node shared by
/// several dependants is visited once.
#[derive(Debug, Default)]
pub struct KeyMemo {
    keys: HashMap<NodeId, Key>,
    // Nodes whose inputs are still being keyed.
    open: HashSet<NodeId>,
}

impl KeyMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of `node`, computed at most once per memo.
    ///
    /// Upstream nodes are keyed first, in post-order with an explicit stack,
    /// so `Operator::key` only ever reads keys that are already memoized.
    pub fn of(&mut self, node: &Node) -> Key {
        if let Some(key) = self.keys.get(&node.id()) {
            return key.clone();
        }

        let mut stack = vec![(node.clone(), false)];
        while let Some((current, inputs_done)) = stack.pop() {
            let id = current.id();
            if self.keys.contains_key(&id) {
                continue;
            }
            if inputs_done {
                let key = current.key_with(self);
                self.open.remove(&id);
                self.keys.insert(id, key);
            } else if self.open.insert(id) {
                let inputs = current.inputs();
                stack.push((current, true));
                for input in inputs.iter() {
                    if !self.keys.contains_key(&input.id()) && !self.open.contains(&input.id()) {
                        stack.push((input.clone(), false));
                    }
                }
            }
        }

        // Only a node reached again through a cycle has no key at this
        // point; it stands in for itself.
        self.keys
            .get(&node.id())
            .cloned()
            .unwrap_or(Key::Identity(node.id()))
    }

    /// Class name plus the keys of every input, folded into one digest.
    pub fn structural(&mut self, class: &str, inputs: &Inputs) -> Key {
        let mut digest = Digest::default();
        class.hash(&mut digest);
        inputs.positional().len().hash(&mut digest);
        for node in inputs.positional() {
            self.of(node).hash(&mut digest);
        }
        inputs.named().len().hash(&mut digest);
        for (name, node) in inputs.named() {
            name.hash(&mut digest);
            self.of(node).hash(&mut digest);
        }
        Key::Operator {
            class: Arc::from(class),
            digest: digest.0.finalize().into(),
        }
    }
}

/// Feeds `Hash` output into blake3.
#[derive(Default)]
struct Digest(blake3::Hasher);

impl Hasher for Digest {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0.finalize().as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}
