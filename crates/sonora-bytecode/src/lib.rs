//! Sonora FBC Bytecode Definitions
//!
//! This crate provides the flat bytecode (FBC) intermediate representation
//! consumed by the Sonora text backends: the opcode set, the instruction and
//! block tree, the declarative user-interface and metadata instruction lists,
//! and the factory object that owns one bytecode block per DSP lifecycle
//! phase.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod factory;
pub mod instr;
pub mod opcode;
pub mod ui;

pub use factory::{Factory, LifecyclePhase};
pub use instr::{Block, HeapKind, Instruction};
pub use opcode::Opcode;
pub use ui::{MetaDeclaration, UiInstruction};
