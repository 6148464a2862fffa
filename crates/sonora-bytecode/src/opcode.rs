//! FBC opcodes
//!
//! This module defines the instruction set of the flat bytecode consumed by
//! the text backends. FBC is a stack-machine code over two flat heaps, one
//! holding the working floating-point type and one holding 32-bit integers.

use serde::{Deserialize, Serialize};

/// FBC opcode enumeration
///
/// Opcodes are organized into categories:
/// - Literals: push a rendered numeric constant
/// - Heap access: direct and indexed load/store on the real and int heaps
/// - Block shift: delay-line bookkeeping over a contiguous heap range
/// - I/O: audio input load / output store with sample-type conversion
/// - Casts: numeric conversion and bit-level reinterpretation
/// - Binary ops: arithmetic, comparison, bitwise
/// - Math calls: unary and binary math-library functions
/// - Control: return, select, conditional branch, loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ===== Literals =====
    /// Push a real (working float) literal
    RealValue,
    /// Push a 32-bit integer literal
    Int32Value,
    /// Push a 64-bit integer literal
    Int64Value,

    // ===== Heap load/store =====
    /// Push `realHeap[offset1]`
    LoadReal,
    /// Push `intHeap[offset1]`
    LoadInt,
    /// Pop a value, store to `realHeap[offset1]`
    StoreReal,
    /// Pop a value, store to `intHeap[offset1]`
    StoreInt,
    /// Pop an index expression, push `realHeap[offset1 + index]`
    LoadIndexedReal,
    /// Pop an index expression, push `intHeap[offset1 + index]`
    LoadIndexedInt,
    /// Pop an index then a value, store to `realHeap[offset1 + index]`
    StoreIndexedReal,
    /// Pop an index then a value, store to `intHeap[offset1 + index]`
    StoreIndexedInt,

    // ===== Block memory shift =====
    /// Shift `realHeap[offset2..offset1]` up by one slot, descending order
    BlockShiftReal,
    /// Shift `intHeap[offset2..offset1]` up by one slot, descending order
    BlockShiftInt,

    // ===== Input/output =====
    /// Pop a frame index, push input channel `offset1` converted to the
    /// working float type
    LoadInput,
    /// Pop a frame index then a value, store to output channel `offset1`
    /// converted to the external sample type
    StoreOutput,

    // ===== Casts =====
    /// Numeric conversion of the top of stack to the working float type
    CastReal,
    /// Numeric conversion of the top of stack to int
    CastInt,
    /// Bit-level reinterpretation of the top of stack as int
    BitcastInt,
    /// Bit-level reinterpretation of the top of stack as the working float
    BitcastReal,

    // ===== Binary arithmetic =====
    /// Real addition
    AddReal,
    /// Integer addition
    AddInt,
    /// Real subtraction
    SubReal,
    /// Integer subtraction
    SubInt,
    /// Real multiplication
    MultReal,
    /// Integer multiplication
    MultInt,
    /// Real division
    DivReal,
    /// Integer division
    DivInt,
    /// Exact (non-truncating) floating remainder
    RemReal,
    /// Integer remainder
    RemInt,
    /// Integer left shift
    LshInt,
    /// Integer arithmetic right shift
    RshInt,

    // ===== Comparison =====
    /// Integer greater-than
    GTInt,
    /// Real greater-than
    GTReal,
    /// Integer less-than
    LTInt,
    /// Real less-than
    LTReal,
    /// Integer greater-or-equal
    GEInt,
    /// Real greater-or-equal
    GEReal,
    /// Integer less-or-equal
    LEInt,
    /// Real less-or-equal
    LEReal,
    /// Integer equality
    EQInt,
    /// Real equality
    EQReal,
    /// Integer inequality
    NEInt,
    /// Real inequality
    NEReal,

    // ===== Bitwise =====
    /// Integer bitwise and
    AndInt,
    /// Integer bitwise or
    OrInt,
    /// Integer bitwise xor
    XorInt,

    // ===== Unary math calls =====
    /// Integer absolute value
    Abs,
    /// Real absolute value
    Absf,
    /// Arc cosine
    Acosf,
    /// Arc sine
    Asinf,
    /// Arc tangent
    Atanf,
    /// Ceiling
    Ceilf,
    /// Cosine
    Cosf,
    /// Hyperbolic cosine
    Coshf,
    /// Exponential
    Expf,
    /// Floor
    Floorf,
    /// Natural logarithm
    Logf,
    /// Base-10 logarithm
    Log10f,
    /// Round to nearest
    Roundf,
    /// Sine
    Sinf,
    /// Hyperbolic sine
    Sinhf,
    /// Square root
    Sqrtf,
    /// Tangent
    Tanf,
    /// Hyperbolic tangent
    Tanhf,

    // ===== Binary math calls =====
    /// Two-argument arc tangent
    Atan2f,
    /// Truncating floating remainder
    Fmodf,
    /// Power
    Powf,
    /// Integer maximum
    Max,
    /// Real maximum
    Maxf,
    /// Integer minimum
    Min,
    /// Real minimum
    Minf,

    // ===== Control =====
    /// End of the compiled unit when the return-address stack is empty,
    /// otherwise resume at the popped position
    Return,
    /// Structural two-branch conditional; must be pre-lowered upstream,
    /// rejected by the text backends
    If,
    /// Real ternary select over `branch1` (then) and `branch2` (else)
    SelectReal,
    /// Integer ternary select over `branch1` (then) and `branch2` (else)
    SelectInt,
    /// Two-way goto: current block is the true target, a fresh block the
    /// false/continuation target
    CondBranch,
    /// Loop boundary: `branch1` is the init block, `branch2` the body
    Loop,

    // ===== No text lowering =====
    /// Soundfile access; carried by the instruction set but not lowered by
    /// either text backend
    Soundfile,
}

impl Opcode {
    /// The infix symbol for plain binary operator opcodes
    ///
    /// `RemReal` is excluded: floating remainder is a library call in both
    /// backends, not an infix operator.
    pub fn binop_symbol(&self) -> Option<&'static str> {
        match self {
            Opcode::AddReal | Opcode::AddInt => Some("+"),
            Opcode::SubReal | Opcode::SubInt => Some("-"),
            Opcode::MultReal | Opcode::MultInt => Some("*"),
            Opcode::DivReal | Opcode::DivInt => Some("/"),
            Opcode::RemInt => Some("%"),
            Opcode::LshInt => Some("<<"),
            Opcode::RshInt => Some(">>"),
            Opcode::GTInt | Opcode::GTReal => Some(">"),
            Opcode::LTInt | Opcode::LTReal => Some("<"),
            Opcode::GEInt | Opcode::GEReal => Some(">="),
            Opcode::LEInt | Opcode::LEReal => Some("<="),
            Opcode::EQInt | Opcode::EQReal => Some("=="),
            Opcode::NEInt | Opcode::NEReal => Some("!="),
            Opcode::AndInt => Some("&"),
            Opcode::OrInt => Some("|"),
            Opcode::XorInt => Some("^"),
            _ => None,
        }
    }

    /// Whether this opcode is a unary math-library call
    pub fn is_unary_math(&self) -> bool {
        matches!(
            self,
            Opcode::Abs
                | Opcode::Absf
                | Opcode::Acosf
                | Opcode::Asinf
                | Opcode::Atanf
                | Opcode::Ceilf
                | Opcode::Cosf
                | Opcode::Coshf
                | Opcode::Expf
                | Opcode::Floorf
                | Opcode::Logf
                | Opcode::Log10f
                | Opcode::Roundf
                | Opcode::Sinf
                | Opcode::Sinhf
                | Opcode::Sqrtf
                | Opcode::Tanf
                | Opcode::Tanhf
        )
    }

    /// Whether this opcode is a binary math-library call
    pub fn is_binary_math(&self) -> bool {
        matches!(
            self,
            Opcode::Atan2f
                | Opcode::Fmodf
                | Opcode::Powf
                | Opcode::RemReal
                | Opcode::Max
                | Opcode::Maxf
                | Opcode::Min
                | Opcode::Minf
        )
    }

    /// Whether this opcode owns child blocks in `branch1`/`branch2`
    pub fn has_branches(&self) -> bool {
        matches!(
            self,
            Opcode::If | Opcode::SelectReal | Opcode::SelectInt | Opcode::Loop
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binop_symbols() {
        assert_eq!(Opcode::AddReal.binop_symbol(), Some("+"));
        assert_eq!(Opcode::SubInt.binop_symbol(), Some("-"));
        assert_eq!(Opcode::RemInt.binop_symbol(), Some("%"));
        // Floating remainder is a call, never an infix operator
        assert_eq!(Opcode::RemReal.binop_symbol(), None);
        assert_eq!(Opcode::Sinf.binop_symbol(), None);
    }

    #[test]
    fn test_math_categories() {
        assert!(Opcode::Sqrtf.is_unary_math());
        assert!(!Opcode::Sqrtf.is_binary_math());
        assert!(Opcode::Atan2f.is_binary_math());
        assert!(Opcode::RemReal.is_binary_math());
        assert!(!Opcode::AddReal.is_unary_math());
    }

    #[test]
    fn test_branch_owners() {
        assert!(Opcode::Loop.has_branches());
        assert!(Opcode::SelectReal.has_branches());
        assert!(!Opcode::CondBranch.has_branches());
        assert!(!Opcode::LoadReal.has_branches());
    }
}
