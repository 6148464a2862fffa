//! Code-generation errors

use sonora_bytecode::Opcode;
use thiserror::Error;

/// Result alias for all code-generation entry points
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Code-generation failure
///
/// Configuration errors are raised before any output is written; the other
/// variants are internal-consistency faults or coverage refusals raised
/// mid-walk and propagated, never caught and continued past.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Requested configuration is incompatible with the selected backend
    #[error("unsupported configuration: {0}")]
    UnsupportedOption(String),

    /// Opcode reached a backend that must not silently accept it
    #[error("opcode {opcode:?} has no lowering in the {backend} backend")]
    UnsupportedOpcode {
        /// The offending opcode
        opcode: Opcode,
        /// Backend name
        backend: &'static str,
    },

    /// Value stack popped while empty
    #[error("value stack underflow")]
    StackUnderflow,

    /// Value stack grew past its capacity
    #[error("value stack limit exceeded ({limit} entries)")]
    StackLimit {
        /// The configured capacity
        limit: usize,
    },

    /// Return-address stack grew past its capacity
    #[error("return-address stack limit exceeded ({limit} entries)")]
    ReturnStackLimit {
        /// The configured capacity
        limit: usize,
    },

    /// Values left on the stack after a fully compiled top-level block
    #[error("value stack unbalanced after block ({0} values left)")]
    UnbalancedStack(usize),

    /// Malformed IR: a branch-bearing instruction without its child block,
    /// or a block-list operation with no open block
    #[error("internal consistency fault: {0}")]
    Internal(String),

    /// Text sink failure
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}
