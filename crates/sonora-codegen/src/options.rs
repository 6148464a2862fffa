//! Shared code-generation configuration
//!
//! Options are validated by each generator before any output is written;
//! an incompatible combination aborts generation with
//! [`CodegenError::UnsupportedOption`](crate::CodegenError::UnsupportedOption)
//! and leaves the output sinks untouched.

/// Numeric precision of the working floating-point type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// 32-bit working float
    #[default]
    Single,
    /// 64-bit working float
    Double,
    /// Extended-precision working float; C++ backend only
    Quad,
}

impl Precision {
    /// Byte size of one real-heap cell
    pub fn real_size(&self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
            Precision::Quad => 16,
        }
    }
}

/// Placement of the module's linear memory (WAST backend)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryMode {
    /// Memory allocated inside the module and exported, sized from the
    /// structure size, the audio buffers and the JSON blob
    #[default]
    Internal,
    /// Memory imported from the host, sized by the host
    External,
}

/// Sample-loop scheduling mode
///
/// Only scalar scheduling has a lowering in the text backends; the vector
/// and parallel variants are rejected at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    /// One sample per iteration
    #[default]
    Scalar,
    /// Vectorized sample loop (no text lowering)
    Vector,
    /// Work-stealing parallel loop (no text lowering)
    Parallel,
}

/// Complete backend configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct CodegenOptions {
    /// Working float precision
    pub precision: Precision,
    /// Linear-memory placement (WAST backend only)
    pub memory: MemoryMode,
    /// Sample-loop scheduling
    pub schedule: ScheduleMode,
}
