//! Operand and return-address stacks
//!
//! Both stacks are growth-checked with explicit capacity limits sized
//! generously for realistic inputs; exceeding a limit is an
//! internal-consistency fault, not a recoverable condition.

use crate::error::{CodegenError, CodegenResult};
use crate::options::Precision;

/// Capacity of the rendered-expression stack
pub const VALUE_STACK_LIMIT: usize = 512;

/// Capacity of the return-address stack
pub const RETURN_STACK_LIMIT: usize = 64;

/// LIFO of rendered expression fragments awaiting consumption
#[derive(Debug, Default)]
pub struct ExprStack {
    values: Vec<String>,
}

impl ExprStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a rendered expression
    pub fn push(&mut self, value: String) -> CodegenResult<()> {
        if self.values.len() >= VALUE_STACK_LIMIT {
            return Err(CodegenError::StackLimit {
                limit: VALUE_STACK_LIMIT,
            });
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop the most recent expression
    pub fn pop(&mut self) -> CodegenResult<String> {
        self.values.pop().ok_or(CodegenError::StackUnderflow)
    }

    /// Current depth
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the stack holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// LIFO of instruction positions used by the explicit-return mechanism
///
/// An empty stack at a `Return` instruction marks the end of the compiled
/// unit; a non-empty stack resumes the cursor at the popped position.
#[derive(Debug, Default)]
pub struct ReturnStack {
    addresses: Vec<usize>,
}

impl ReturnStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a resume position
    pub fn push(&mut self, address: usize) -> CodegenResult<()> {
        if self.addresses.len() >= RETURN_STACK_LIMIT {
            return Err(CodegenError::ReturnStackLimit {
                limit: RETURN_STACK_LIMIT,
            });
        }
        self.addresses.push(address);
        Ok(())
    }

    /// Pop the most recent resume position
    pub fn pop(&mut self) -> Option<usize> {
        self.addresses.pop()
    }

    /// Whether no resume position is pending
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Render a real literal with enough digits to round-trip exactly
///
/// Single precision narrows to `f32` first so the printed form parses back
/// to the identical 32-bit value.
pub fn format_real(value: f64, precision: Precision) -> String {
    match precision {
        Precision::Single => format!("{:?}", value as f32),
        Precision::Double | Precision::Quad => format!("{:?}", value),
    }
}

/// Render a 32-bit integer literal in exact decimal form
pub fn format_int32(value: i32) -> String {
    value.to_string()
}

/// Render a 64-bit integer literal in exact decimal form
pub fn format_int64(value: i64) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut stack = ExprStack::new();
        stack.push("a".to_string()).unwrap();
        stack.push("b".to_string()).unwrap();
        assert_eq!(stack.pop().unwrap(), "b");
        assert_eq!(stack.pop().unwrap(), "a");
        assert!(stack.is_empty());
    }

    #[test]
    fn test_underflow_is_an_error() {
        let mut stack = ExprStack::new();
        assert!(matches!(stack.pop(), Err(CodegenError::StackUnderflow)));
    }

    #[test]
    fn test_capacity_is_checked() {
        let mut stack = ExprStack::new();
        for i in 0..VALUE_STACK_LIMIT {
            stack.push(i.to_string()).unwrap();
        }
        assert!(matches!(
            stack.push("overflow".to_string()),
            Err(CodegenError::StackLimit { .. })
        ));
    }

    #[test]
    fn test_return_stack() {
        let mut returns = ReturnStack::new();
        assert!(returns.is_empty());
        returns.push(7).unwrap();
        assert!(!returns.is_empty());
        assert_eq!(returns.pop(), Some(7));
        assert_eq!(returns.pop(), None);
    }

    #[test]
    fn test_real_literal_round_trip_single() {
        for value in [0.1_f64, 1.0 / 3.0, 1e-7, 12345.678, -0.015625] {
            let text = format_real(value, Precision::Single);
            let parsed: f32 = text.parse().unwrap();
            assert_eq!(parsed.to_bits(), (value as f32).to_bits(), "{}", text);
        }
    }

    #[test]
    fn test_real_literal_round_trip_double() {
        for value in [0.1_f64, 1.0 / 3.0, 1e-300, 441.0 / 44100.0] {
            let text = format_real(value, Precision::Double);
            let parsed: f64 = text.parse().unwrap();
            assert_eq!(parsed.to_bits(), value.to_bits(), "{}", text);
        }
    }

    #[test]
    fn test_integer_literals_exact() {
        assert_eq!(format_int32(i32::MIN), "-2147483648");
        assert_eq!(format_int32(i32::MAX), "2147483647");
        assert_eq!(format_int64(i64::MIN), "-9223372036854775808");
    }
}
