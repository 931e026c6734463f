//! Control flow signals for loops and functions.
//!
//! These let `break` and `return` propagate through the statement execution
//! stack without being mistaken for errors.

use super::value::Value;

/// Control flow signal from statement execution.
///
/// Normal execution returns `Normal(value)`. `Break` unwinds to the nearest
/// enclosing `for`, `Return` to the nearest function call.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// Normal completion with the statement's value.
    Normal(Value),
    /// Leave the innermost loop.
    Break,
    /// Return from a function with a value.
    Return(Value),
}

impl ControlFlow {
    /// Normal completion with `nil`.
    pub fn nil() -> Self {
        ControlFlow::Normal(Value::Nil)
    }

    /// Check if this is normal flow.
    pub fn is_normal(&self) -> bool {
        matches!(self, ControlFlow::Normal(_))
    }

    /// Get the value if this is normal flow.
    pub fn into_value(self) -> Option<Value> {
        match self {
            ControlFlow::Normal(value) => Some(value),
            _ => None,
        }
    }
}

impl Default for ControlFlow {
    fn default() -> Self {
        ControlFlow::nil()
    }
}

impl From<Value> for ControlFlow {
    fn from(value: Value) -> Self {
        ControlFlow::Normal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_flow() {
        let flow = ControlFlow::from(Value::Integer(1));
        assert!(flow.is_normal());
        assert_eq!(flow.into_value(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_signals_carry_no_normal_value() {
        assert!(!ControlFlow::Break.is_normal());
        assert_eq!(ControlFlow::Return(Value::Nil).into_value(), None);
    }

    #[test]
    fn test_default_is_nil() {
        assert_eq!(ControlFlow::default(), ControlFlow::Normal(Value::Nil));
    }
}
