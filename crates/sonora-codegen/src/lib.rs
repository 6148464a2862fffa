//! Sonora FBC Text Backends
//!
//! This crate lowers the flat bytecode IR (`sonora-bytecode`) into target
//! source text. The same stack-machine traversal is used for both backends;
//! only the output syntax differs:
//!
//! - [`cpp::CppGenerator`] renders a C++-like class with virtual lifecycle
//!   methods operating on two flat heap arrays;
//! - [`wast::WastGenerator`] renders a WebAssembly text module with exported
//!   lifecycle functions, a typed memory section, a JSON data segment, and a
//!   companion host-side helper artifact.
//!
//! Code generation is a pure, single-threaded traversal: the factory is
//! borrowed immutably, per-phase state lives in a fresh [`FbcCompiler`], and
//! rendered text is appended to caller-owned sinks.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod blocks;
pub mod compiler;
pub mod cpp;
pub mod error;
pub mod json;
pub mod options;
pub mod stack;
pub mod target;
pub mod text;
pub mod wast;

pub use compiler::{CompileStats, FbcCompiler};
pub use cpp::CppGenerator;
pub use error::{CodegenError, CodegenResult};
pub use options::{CodegenOptions, MemoryMode, Precision, ScheduleMode};
pub use wast::WastGenerator;
