//! Arithmetic operators.
//!
//! Integers stay integers where the result is exact; anything involving a
//! float is computed in `f64`. `divide` is true division and always returns
//! a float.

use thiserror::Error;

use super::{operator, Args, FnOperator};
use crate::error::ComputeError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },

    #[error("unsupported operand types for {op}: {lhs} and {rhs}")]
    Unsupported {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
}

#[derive(Clone, Copy)]
enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOp {
    fn name(self) -> &'static str {
        match self {
            BinaryOp::Plus => "Plus",
            BinaryOp::Minus => "Minus",
            BinaryOp::Multiply => "Multiply",
            BinaryOp::Divide => "Divide",
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value, MathError> {
        let unsupported = || MathError::Unsupported {
            op: self.name(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        };

        if let (BinaryOp::Plus, Value::Text(a), Value::Text(b)) = (self, lhs, rhs) {
            return Ok(Value::from(format!("{a}{b}")));
        }

        if let (Value::Int(a), Value::Int(b), false) = (lhs, rhs, matches!(self, BinaryOp::Divide)) {
            let result = match self {
                BinaryOp::Plus => a.checked_add(*b),
                BinaryOp::Minus => a.checked_sub(*b),
                _ => a.checked_mul(*b),
            };
            return result
                .map(Value::Int)
                .ok_or(MathError::Overflow { op: self.name() });
        }

        let a = lhs.as_float().ok_or_else(unsupported)?;
        let b = rhs.as_float().ok_or_else(unsupported)?;
        let result = match self {
            BinaryOp::Plus => a + b,
            BinaryOp::Minus => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => {
                if b == 0.0 {
                    return Err(MathError::DivisionByZero);
                }
                a / b
            }
        };
        Ok(Value::Float(result))
    }

    fn operator(self) -> FnOperator {
        operator(self.name(), move |args: Args| -> Result<Value, ComputeError> {
            let [lhs, rhs] = args.exact::<2>()?;
            Ok(self.apply(&lhs, &rhs)?)
        })
    }
}

/// `a + b`; also concatenates text.
pub fn plus() -> FnOperator {
    BinaryOp::Plus.operator()
}

/// `a - b`
pub fn minus() -> FnOperator {
    BinaryOp::Minus.operator()
}

/// `a * b`
pub fn multiply() -> FnOperator {
    BinaryOp::Multiply.operator()
}

/// `a / b`, always a float.
pub fn divide() -> FnOperator {
    BinaryOp::Divide.operator()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::ops::Constant;

    #[test]
    fn integer_arithmetic_stays_integral() {
        let a = Constant::node(7);
        let b = Constant::node(3);
        assert_eq!(plus().node(&[&a, &b]).evaluate().unwrap(), Value::from(10));
        assert_eq!(minus().node(&[&a, &b]).evaluate().unwrap(), Value::from(4));
        assert_eq!(multiply().node(&[&a, &b]).evaluate().unwrap(), Value::from(21));
    }

    #[test]
    fn divide_is_true_division() {
        let a = Constant::node(3);
        let b = Constant::node(2);
        assert_eq!(divide().node(&[&a, &b]).evaluate().unwrap(), Value::from(1.5));
    }

    #[test]
    fn mixed_operands_promote_to_float() {
        let a = Constant::node(2);
        let b = Constant::node(0.5);
        assert_eq!(multiply().node(&[&a, &b]).evaluate().unwrap(), Value::from(1.0));
    }

    #[test]
    fn plus_concatenates_text() {
        let a = Constant::node("frame_");
        let b = Constant::node("0001");
        assert_eq!(plus().node(&[&a, &b]).evaluate().unwrap(), Value::from("frame_0001"));
    }

    fn math_error(result: crate::error::Result<Value>) -> MathError {
        match result {
            Err(FlowError::Compute { source, .. }) => *source
                .downcast::<MathError>()
                .unwrap_or_else(|other| panic!("unexpected source: {other}")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_fails() {
        let node = divide().node(&[&Constant::node(1), &Constant::node(0)]);
        assert_eq!(math_error(node.evaluate()), MathError::DivisionByZero);
    }

    #[test]
    fn overflow_fails() {
        let node = plus().node(&[&Constant::node(i64::MAX), &Constant::node(1)]);
        assert_eq!(math_error(node.evaluate()), MathError::Overflow { op: "Plus" });
    }

    #[test]
    fn unsupported_operands_fail() {
        let node = minus().node(&[&Constant::node("a"), &Constant::node(1)]);
        assert_eq!(
            math_error(node.evaluate()),
            MathError::Unsupported { op: "Minus", lhs: "text", rhs: "int" }
        );
    }
}
