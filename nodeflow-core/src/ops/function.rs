//! Functional operators: node classes built from closures.

use std::fmt;
use std::sync::Arc;

use super::{Args, Operator};
use crate::error::{ComputeError, Result};
use crate::graph::{Input, Inputs, Node, NodeBuilder};
use crate::value::Value;

type ComputeFn = dyn Fn(Args) -> std::result::Result<Value, ComputeError> + Send + Sync;

/// A node class whose computation is a closure.
///
/// Cloning is cheap; every node built from the same `FnOperator` shares the
/// closure.
#[derive(Clone)]
pub struct FnOperator {
    name: Arc<str>,
    function: Arc<ComputeFn>,
}

/// Register `function` as a node class called `name`.
///
/// Nodes built from it are named `name#001`, `name#002`, ...
///
/// ```rust,ignore
/// let scale = operator("Scale", |args| {
///     let [x, factor] = args.exact::<2>()?;
///     Ok(Value::Float(x.as_float().unwrap_or(0.0) * factor.as_float().unwrap_or(1.0)))
/// });
/// let node = scale.node(&[&input, &factor]);
/// ```
pub fn operator<F>(name: &str, function: F) -> FnOperator
where
    F: Fn(Args) -> std::result::Result<Value, ComputeError> + Send + Sync + 'static,
{
    FnOperator {
        name: Arc::from(name),
        function: Arc::new(function),
    }
}

impl FnOperator {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a node over typed inputs.
    pub fn node(&self, inputs: &[&Node]) -> Node {
        let inputs = Inputs::from_positional(inputs.iter().map(|node| (*node).clone()));
        Node::new(self.instance(), inputs)
    }

    /// Build a node from dynamic inputs, failing if any of them is not a
    /// node.
    pub fn call<I, T>(&self, inputs: I) -> Result<Node>
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        self.builder().inputs(inputs).build()
    }

    /// Builder for nodes with named inputs or a custom name.
    pub fn builder(&self) -> NodeBuilder {
        Node::builder(self.instance())
    }

    fn instance(&self) -> FnOp {
        FnOp {
            class: Arc::clone(&self.name),
            function: Arc::clone(&self.function),
        }
    }
}

impl fmt::Debug for FnOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperator").field("name", &self.name).finish()
    }
}

struct FnOp {
    class: Arc<str>,
    function: Arc<ComputeFn>,
}

impl Operator for FnOp {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn compute(&self, _inputs: &Inputs, args: Args) -> std::result::Result<Value, ComputeError> {
        (self.function)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::ops::Constant;

    fn add() -> FnOperator {
        operator("AdderFn", |args: Args| {
            let [a, b] = args.exact::<2>()?;
            match (a.as_int(), b.as_int()) {
                (Some(a), Some(b)) => Ok(Value::Int(a + b)),
                _ => Err("expected integers".into()),
            }
        })
    }

    #[test]
    fn closure_becomes_a_node_class() {
        let three = add().node(&[&Constant::node(1), &Constant::node(2)]);
        assert_eq!(three.evaluate().unwrap(), Value::from(3));
        assert_eq!(three.class_name(), "AdderFn");
    }

    #[test]
    fn default_name_is_the_function_name() {
        let f = operator("MyFunction", |_| Ok(Value::Unit));
        let node = f.node(&[]);
        assert_eq!(node.name(), "MyFunction#001");
    }

    #[test]
    fn call_rejects_raw_values() {
        let err = add().call([1, 2]).unwrap_err();
        assert!(matches!(err, FlowError::NotANode { ref operator, .. } if operator == "AdderFn"));
    }

    #[test]
    fn call_accepts_nodes() {
        let one = Constant::node(1);
        let node = add().call([&one, &one]).unwrap();
        assert_eq!(node.evaluate().unwrap(), Value::from(2));
    }

    #[test]
    fn builder_supports_named_inputs() {
        let sub = operator("SubFn", |args: Args| {
            let [a, b] = args.exact::<2>()?;
            Ok(Value::Int(a.as_int().unwrap_or(0) - b.as_int().unwrap_or(0)))
        });
        let node = sub
            .builder()
            .named_input("lhs", Constant::node(10))
            .named_input("rhs", Constant::node(4))
            .name("difference")
            .build()
            .unwrap();

        assert_eq!(node.evaluate().unwrap(), Value::from(6));
        assert!(node.name().starts_with("difference#"));
    }

    #[test]
    fn wrong_arity_is_a_compute_error() {
        let node = add().node(&[&Constant::node(1)]);
        assert!(matches!(node.evaluate(), Err(FlowError::Compute { .. })));
    }
}
