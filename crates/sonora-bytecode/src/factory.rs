//! The factory object handed to the text backends
//!
//! A [`Factory`] is the complete code-generation input: one bytecode block
//! per DSP lifecycle phase plus the scalar counters (channel counts, heap
//! sizes, sample-rate and frame-count storage offsets) produced by the
//! front end. The backends borrow it immutably; nothing here is mutated
//! during generation.

use crate::instr::Block;
use crate::ui::{MetaDeclaration, UiInstruction};
use serde::{Deserialize, Serialize};

/// The fixed set of DSP lifecycle phases
///
/// Each phase maps 1:1 to one block owned by the factory. `Compute` maps to
/// the per-sample block (`compute_dsp_block`); the loop-control prelude
/// compiled just before it lives in `compute_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Widget layout declarations
    BuildUserInterface,
    /// Class-level (shared) initialization
    ClassInit,
    /// Per-instance constants, including sample-rate storage
    InstanceConstants,
    /// Reset of user-interface zones to their initial values
    InstanceResetUserInterface,
    /// Clearing of delay lines and accumulators
    InstanceClear,
    /// Metadata key/value declarations
    Metadata,
    /// The per-sample processing loop
    Compute,
}

impl LifecyclePhase {
    /// All phases, in generation order
    pub const ALL: [LifecyclePhase; 7] = [
        LifecyclePhase::BuildUserInterface,
        LifecyclePhase::ClassInit,
        LifecyclePhase::InstanceConstants,
        LifecyclePhase::InstanceResetUserInterface,
        LifecyclePhase::InstanceClear,
        LifecyclePhase::Metadata,
        LifecyclePhase::Compute,
    ];

    /// The exported entry-point name for this phase
    pub fn method_name(&self) -> &'static str {
        match self {
            LifecyclePhase::BuildUserInterface => "buildUserInterface",
            LifecyclePhase::ClassInit => "classInit",
            LifecyclePhase::InstanceConstants => "instanceConstants",
            LifecyclePhase::InstanceResetUserInterface => "instanceResetUserInterface",
            LifecyclePhase::InstanceClear => "instanceClear",
            LifecyclePhase::Metadata => "metadata",
            LifecyclePhase::Compute => "compute",
        }
    }
}

/// Code-generation input: lifecycle bytecode plus layout counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Factory {
    /// Unit name, used as the emitted class/module name
    pub name: String,
    /// Number of audio input channels
    pub num_inputs: usize,
    /// Number of audio output channels
    pub num_outputs: usize,
    /// Integer heap size, in cells
    pub int_heap_size: usize,
    /// Real heap size, in cells
    pub real_heap_size: usize,
    /// Integer-heap offset where the sample rate is stored
    pub sr_offset: usize,
    /// Integer-heap offset where the per-call frame count is stored
    pub count_offset: usize,
    /// Widget layout declarations
    pub user_interface_block: Vec<UiInstruction>,
    /// Class-level initialization bytecode
    pub static_init_block: Block,
    /// Per-instance constants bytecode
    pub init_block: Block,
    /// User-interface reset bytecode
    pub reset_ui_block: Block,
    /// Delay-line clearing bytecode
    pub clear_block: Block,
    /// Metadata declarations
    pub meta_block: Vec<MetaDeclaration>,
    /// Loop-control prelude compiled ahead of the per-sample block
    pub compute_block: Block,
    /// Per-sample processing bytecode
    pub compute_dsp_block: Block,
}

impl Factory {
    /// Create an empty factory with the given unit name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The bytecode block for a code-bearing phase
    ///
    /// `BuildUserInterface` and `Metadata` are declarative lists, not
    /// bytecode, so they return `None`; `Compute` returns the per-sample
    /// block.
    pub fn code_block(&self, phase: LifecyclePhase) -> Option<&Block> {
        match phase {
            LifecyclePhase::ClassInit => Some(&self.static_init_block),
            LifecyclePhase::InstanceConstants => Some(&self.init_block),
            LifecyclePhase::InstanceResetUserInterface => Some(&self.reset_ui_block),
            LifecyclePhase::InstanceClear => Some(&self.clear_block),
            LifecyclePhase::Compute => Some(&self.compute_dsp_block),
            LifecyclePhase::BuildUserInterface | LifecyclePhase::Metadata => None,
        }
    }

    /// Total audio port count (inputs plus outputs)
    pub fn num_ports(&self) -> usize {
        self.num_inputs + self.num_outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction;
    use crate::opcode::Opcode;

    #[test]
    fn test_phase_block_mapping() {
        let mut factory = Factory::new("osc");
        factory
            .clear_block
            .push(Instruction::new(Opcode::RealValue));

        assert_eq!(
            factory
                .code_block(LifecyclePhase::InstanceClear)
                .map(Block::len),
            Some(1)
        );
        assert!(factory
            .code_block(LifecyclePhase::BuildUserInterface)
            .is_none());
        assert!(factory.code_block(LifecyclePhase::Metadata).is_none());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(LifecyclePhase::ClassInit.method_name(), "classInit");
        assert_eq!(
            LifecyclePhase::InstanceResetUserInterface.method_name(),
            "instanceResetUserInterface"
        );
        assert_eq!(LifecyclePhase::ALL.len(), 7);
    }

    #[test]
    fn test_port_count() {
        let mut factory = Factory::new("fx");
        factory.num_inputs = 2;
        factory.num_outputs = 2;
        assert_eq!(factory.num_ports(), 4);
    }
}
