//! Values and Keys
//!
//! `Value` is the dynamic result type that flows along graph edges. Node
//! computations receive their dependencies' values as arguments and return a
//! new one.
//!
//! `Key` is a hashable fingerprint. Hashable values map to a key via
//! [`Value::key`], and every node produces one through `Node::key`. Caches use
//! keys to decide whether an upstream subgraph needs to run again.
//!
//! # Opaque Payloads
//!
//! Anything the engine does not understand (decoded images, textures, file
//! handles) travels as `Value::Opaque`. Opaque values are compared by pointer
//! and have no key, so they can flow through the graph but cannot be stored
//! in a `Variable`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::graph::NodeId;

/// A value produced by a node.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    List(Arc<[Value]>),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary payload.
    pub fn opaque<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Value::Opaque(Arc::new(payload))
    }

    /// Borrow an opaque payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(&**items),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Fingerprint of the value, or `None` if it contains an opaque payload.
    pub fn key(&self) -> Option<Key> {
        Some(match self {
            Value::Unit => Key::Unit,
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(i) => Key::Int(*i),
            Value::Float(f) => Key::float(*f),
            Value::Text(s) => Key::Text(Arc::clone(s)),
            Value::List(items) => Key::List(
                items
                    .iter()
                    .map(Value::key)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Opaque(_) => return None,
        })
    }

    /// Whether [`Value::key`] would succeed.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::Opaque(_) => false,
            Value::List(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::from(items))
    }
}

/// Hashable fingerprint of a value or of a node's upstream subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Unit,
    Bool(bool),
    Int(i64),
    /// Bit pattern of a float, with `-0.0` folded into `0.0`.
    Float(u64),
    Text(Arc<str>),
    List(Vec<Key>),

    /// A node whose output is fixed for its lifetime.
    Identity(NodeId),

    /// A mutable cell together with the value it currently holds.
    Cell { id: NodeId, value: Box<Key> },

    /// Structural fingerprint of an operator and the keys of its inputs.
    ///
    /// Input keys are folded into a fixed-size digest, so the key of a deep
    /// subgraph stays as small as the key of a single node.
    Operator { class: Arc<str>, digest: [u8; 32] },
}

impl Key {
    pub fn float(f: f64) -> Self {
        let f = if f == 0.0 { 0.0 } else { f };
        Key::Float(f.to_bits())
    }

    pub fn text(s: &str) -> Self {
        Key::Text(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashable_values_have_keys() {
        assert_eq!(Value::from(3).key(), Some(Key::Int(3)));
        assert_eq!(Value::from("a").key(), Some(Key::text("a")));
        assert_eq!(
            Value::from(vec![Value::from(1), Value::from(true)]).key(),
            Some(Key::List(vec![Key::Int(1), Key::Bool(true)]))
        );
    }

    #[test]
    fn opaque_values_have_no_key() {
        let image = Value::opaque(vec![0u8; 16]);
        assert!(image.key().is_none());
        assert!(!image.is_hashable());

        let nested = Value::from(vec![Value::from(1), image]);
        assert!(nested.key().is_none());
        assert!(!nested.is_hashable());
    }

    #[test]
    fn signed_zero_shares_a_key() {
        assert_eq!(Value::from(0.0).key(), Value::from(-0.0).key());
        assert_ne!(Value::from(1.0).key(), Value::from(-1.0).key());
    }

    #[test]
    fn opaque_equality_is_by_pointer() {
        let a = Value::opaque(String::from("frame"));
        let b = Value::opaque(String::from("frame"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("frame"));
        assert!(a.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::from(2).as_float(), Some(2.0));
        assert_eq!(Value::from(2.5).as_int(), None);
    }
}
