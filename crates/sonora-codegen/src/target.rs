//! The pluggable output-syntax seam
//!
//! The bytecode walk is identical for every backend; everything
//! syntax-specific goes through [`TargetSyntax`]. Implementations render
//! expression fragments and statements as plain strings and never see the
//! operand stack or the block list.

use crate::blocks::BlockKind;
use crate::error::CodegenResult;
use sonora_bytecode::{HeapKind, Opcode};

/// A heap cell address, either known at compile time or computed at run time
#[derive(Debug, Clone, PartialEq)]
pub enum CellIndex {
    /// Literal cell offset
    Literal(i32),
    /// Rendered run-time element-index expression
    Dynamic(String),
}

/// Output-syntax hooks for one backend
pub trait TargetSyntax {
    /// Backend name for diagnostics
    fn backend_name(&self) -> &'static str;

    /// Render a real literal that round-trips exactly through the target's
    /// literal grammar
    fn real_literal(&self, value: f64) -> String;

    /// Render a 32-bit integer literal
    fn int32_literal(&self, value: i32) -> String;

    /// Render a 64-bit integer literal
    fn int64_literal(&self, value: i64) -> String;

    /// Render a binary operator applied to two operands; `v1` is the
    /// first-popped (left) operand
    fn binop(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String>;

    /// Render a unary math-library call
    fn unary_call(&self, opcode: Opcode, value: &str) -> CodegenResult<String>;

    /// Render a binary math-library call; `v1` is the first-popped operand
    fn binary_call(&self, opcode: Opcode, v1: &str, v2: &str) -> CodegenResult<String>;

    /// Combine a literal base offset with a run-time index expression into
    /// one element-index expression
    fn indexed(&self, base: i32, index: &str) -> String;

    /// Render a heap load expression
    fn load_heap(&self, heap: HeapKind, index: &CellIndex) -> String;

    /// Render a heap store statement consuming `value`
    fn store_heap(&self, heap: HeapKind, index: &CellIndex, value: &str) -> String;

    /// Render an input-sample load converted to the working float type
    fn load_input(&self, channel: i32, frame: &str) -> String;

    /// Render an output-sample store converted to the external sample type
    fn store_output(&self, channel: i32, frame: &str, value: &str) -> String;

    /// Render a numeric conversion to the working float type
    fn cast_real(&self, value: &str) -> String;

    /// Render a numeric conversion to int
    fn cast_int(&self, value: &str) -> String;

    /// Render a bit-level reinterpretation as the working float type
    fn bitcast_real(&self, value: &str) -> CodegenResult<String>;

    /// Render a bit-level reinterpretation as int
    fn bitcast_int(&self, value: &str) -> CodegenResult<String>;

    /// Render a ternary select; evaluates to `then_value` when `cond` is
    /// true and `else_value` otherwise
    fn select(&self, opcode: Opcode, cond: &str, then_value: &str, else_value: &str) -> String;

    /// Render the two-way transfer ending a block: control moves to
    /// `true_label` when `cond` holds and to `false_label` otherwise
    ///
    /// `true_kind` is the emitted kind of the true-target block; a backend
    /// without unstructured jumps must reject a target it cannot label
    /// instead of emitting a reference to a label that never exists.
    fn cond_transfer(
        &self,
        cond: &str,
        true_label: usize,
        true_kind: BlockKind,
        false_label: usize,
    ) -> CodegenResult<String>;
}
