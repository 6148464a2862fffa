//! FBC instructions and blocks
//!
//! An [`Instruction`] is an opcode plus a fixed set of payload fields; a
//! [`Block`] is an ordered instruction list. Branch-bearing instructions own
//! their child blocks exclusively, so a block is always a tree, never a
//! graph.

use crate::opcode::Opcode;
use serde::{Deserialize, Serialize};

/// Identity of one of the two flat heaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeapKind {
    /// The working floating-point heap
    Real,
    /// The 32-bit integer heap
    Int,
}

/// One FBC instruction
///
/// Payload fields not used by the opcode stay at their zero defaults.
/// Instructions are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Operation tag
    pub opcode: Opcode,
    /// Immediate real value (`RealValue`)
    pub real: f64,
    /// Immediate integer value (`Int32Value`, `Int64Value`)
    pub int: i64,
    /// First heap offset (direct/indexed access, shift upper bound, channel)
    pub offset1: i32,
    /// Second heap offset (shift lower bound)
    pub offset2: i32,
    /// First child block (select/if then-branch, loop init)
    pub branch1: Option<Box<Block>>,
    /// Second child block (select/if else-branch, loop body)
    pub branch2: Option<Box<Block>>,
}

impl Instruction {
    /// Create an instruction with zeroed payload
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            real: 0.0,
            int: 0,
            offset1: 0,
            offset2: 0,
            branch1: None,
            branch2: None,
        }
    }

    /// Set the immediate real value
    pub fn with_real(mut self, value: f64) -> Self {
        self.real = value;
        self
    }

    /// Set the immediate integer value
    pub fn with_int(mut self, value: i64) -> Self {
        self.int = value;
        self
    }

    /// Set the first heap offset
    pub fn with_offset1(mut self, offset: i32) -> Self {
        self.offset1 = offset;
        self
    }

    /// Set both heap offsets
    pub fn with_offsets(mut self, offset1: i32, offset2: i32) -> Self {
        self.offset1 = offset1;
        self.offset2 = offset2;
        self
    }

    /// Attach child blocks
    pub fn with_branches(mut self, branch1: Block, branch2: Block) -> Self {
        self.branch1 = Some(Box::new(branch1));
        self.branch2 = Some(Box::new(branch2));
        self
    }
}

/// An ordered sequence of instructions
///
/// Appears as a top-level lifecycle block or as a child of a branch-bearing
/// instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The instructions, executed in order
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// Create an empty block
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Number of instructions in this block (children excluded)
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the block holds no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl FromIterator<Instruction> for Block {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_builders() {
        let inst = Instruction::new(Opcode::LoadIndexedReal).with_offset1(8);
        assert_eq!(inst.opcode, Opcode::LoadIndexedReal);
        assert_eq!(inst.offset1, 8);
        assert_eq!(inst.offset2, 0);
        assert!(inst.branch1.is_none());

        let shift = Instruction::new(Opcode::BlockShiftReal).with_offsets(5, 2);
        assert_eq!(shift.offset1, 5);
        assert_eq!(shift.offset2, 2);
    }

    #[test]
    fn test_branch_ownership_is_a_tree() {
        let mut then_block = Block::new();
        then_block.push(Instruction::new(Opcode::RealValue).with_real(1.0));
        let mut else_block = Block::new();
        else_block.push(Instruction::new(Opcode::RealValue).with_real(2.0));

        let select = Instruction::new(Opcode::SelectReal).with_branches(then_block, else_block);
        assert_eq!(select.branch1.as_ref().unwrap().len(), 1);
        assert_eq!(select.branch2.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut block = Block::new();
        block.push(Instruction::new(Opcode::RealValue).with_real(0.5));
        block.push(Instruction::new(Opcode::StoreReal).with_offset1(3));

        let text = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, block);
    }
}
