//! Bytecode-to-text compiler
//!
//! [`FbcCompiler`] walks one bytecode block with a linear cursor and
//! dispatches per opcode: expression-producing opcodes push a rendered
//! fragment on the operand stack, statement-producing opcodes append to the
//! current emitted block, and branching opcodes recurse into their child
//! blocks. One compiler instance serves one phase of one generation unit;
//! nothing is shared across units.

use crate::blocks::{BlockKind, BlockList};
use crate::error::{CodegenError, CodegenResult};
use crate::stack::{ExprStack, ReturnStack};
use crate::target::{CellIndex, TargetSyntax};
use sonora_bytecode::{Block, HeapKind, Instruction, Opcode};

/// Coverage accounting for one compilation
///
/// Opcodes without a lowering advance the cursor and are recorded here
/// instead of failing, so callers can assert coverage rather than trust
/// silent gaps in the output text.
#[derive(Debug, Default)]
pub struct CompileStats {
    /// Instructions lowered to output text
    pub lowered: usize,
    /// Opcodes skipped with no output
    pub skipped: Vec<Opcode>,
}

impl CompileStats {
    /// Fold another phase's accounting into this one
    pub fn merge(&mut self, other: CompileStats) {
        self.lowered += other.lowered;
        self.skipped.extend(other.skipped);
    }
}

/// Stack-machine compiler for one phase block
pub struct FbcCompiler<'a, T: TargetSyntax> {
    target: &'a T,
    stack: ExprStack,
    returns: ReturnStack,
    blocks: BlockList,
    stats: CompileStats,
}

impl<'a, T: TargetSyntax> FbcCompiler<'a, T> {
    /// Create a compiler over the given target syntax
    pub fn new(target: &'a T) -> Self {
        Self {
            target,
            stack: ExprStack::new(),
            returns: ReturnStack::new(),
            blocks: BlockList::new(),
            stats: CompileStats::default(),
        }
    }

    /// Compile one top-level phase block
    ///
    /// Opens a fresh emitted block first, then enforces the balance
    /// invariant: every value pushed by the block's opcodes must have been
    /// consumed by the time the block ends.
    pub fn compile_phase(&mut self, block: &Block) -> CodegenResult<()> {
        self.blocks.add_block();
        self.compile_block(block)?;
        if !self.stack.is_empty() {
            return Err(CodegenError::UnbalancedStack(self.stack.len()));
        }
        Ok(())
    }

    /// Compile a further top-level block into the same emitted list
    ///
    /// Used when two lifecycle blocks render into one output body; block
    /// labels keep counting across both and the balance invariant is
    /// enforced at each boundary.
    pub fn compile_phase_continued(&mut self, block: &Block) -> CodegenResult<()> {
        if self.blocks.is_empty() {
            self.blocks.add_block();
        }
        self.compile_block(block)?;
        if !self.stack.is_empty() {
            return Err(CodegenError::UnbalancedStack(self.stack.len()));
        }
        Ok(())
    }

    /// The emitted blocks accumulated so far
    pub fn blocks(&self) -> &BlockList {
        &self.blocks
    }

    /// Coverage accounting for this compiler
    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// Consume the compiler and take its coverage accounting
    pub fn into_stats(self) -> CompileStats {
        self.stats
    }

    fn branch1<'b>(&self, inst: &'b Instruction) -> CodegenResult<&'b Block> {
        inst.branch1.as_deref().ok_or_else(|| {
            CodegenError::Internal(format!("{:?} missing its first child block", inst.opcode))
        })
    }

    fn branch2<'b>(&self, inst: &'b Instruction) -> CodegenResult<&'b Block> {
        inst.branch2.as_deref().ok_or_else(|| {
            CodegenError::Internal(format!("{:?} missing its second child block", inst.opcode))
        })
    }

    /// Pop two operands and push the rendered binary operation
    ///
    /// The first-popped value is the left operand; FBC emits operands so
    /// that this pop order reconstructs the source order, which matters for
    /// every non-commutative operator.
    fn push_binop(&mut self, opcode: Opcode) -> CodegenResult<()> {
        let v1 = self.stack.pop()?;
        let v2 = self.stack.pop()?;
        let rendered = self.target.binop(opcode, &v1, &v2)?;
        self.stack.push(rendered)
    }

    fn push_unary_call(&mut self, opcode: Opcode) -> CodegenResult<()> {
        let value = self.stack.pop()?;
        let rendered = self.target.unary_call(opcode, &value)?;
        self.stack.push(rendered)
    }

    fn push_binary_call(&mut self, opcode: Opcode) -> CodegenResult<()> {
        let v1 = self.stack.pop()?;
        let v2 = self.stack.pop()?;
        let rendered = self.target.binary_call(opcode, &v1, &v2)?;
        self.stack.push(rendered)
    }

    fn push_load(&mut self, heap: HeapKind, index: CellIndex) -> CodegenResult<()> {
        let rendered = self.target.load_heap(heap, &index);
        self.stack.push(rendered)
    }

    fn store(&mut self, heap: HeapKind, index: CellIndex) -> CodegenResult<()> {
        let value = self.stack.pop()?;
        let rendered = self.target.store_heap(heap, &index, &value);
        self.blocks.add_inst(rendered)
    }

    /// Pop an index expression and merge it with the literal base offset
    fn indexed_cell(&mut self, base: i32) -> CodegenResult<CellIndex> {
        let index = self.stack.pop()?;
        Ok(CellIndex::Dynamic(self.target.indexed(base, &index)))
    }

    fn compile_block(&mut self, block: &Block) -> CodegenResult<()> {
        let mut pc = 0;
        while pc < block.instructions.len() {
            let inst = &block.instructions[pc];
            let mut next = pc + 1;

            match inst.opcode {
                // Numbers
                Opcode::RealValue => {
                    let literal = self.target.real_literal(inst.real);
                    self.stack.push(literal)?;
                }
                Opcode::Int32Value => {
                    let literal = self.target.int32_literal(inst.int as i32);
                    self.stack.push(literal)?;
                }
                Opcode::Int64Value => {
                    let literal = self.target.int64_literal(inst.int);
                    self.stack.push(literal)?;
                }

                // Memory load/store
                Opcode::LoadReal => {
                    self.push_load(HeapKind::Real, CellIndex::Literal(inst.offset1))?;
                }
                Opcode::LoadInt => {
                    self.push_load(HeapKind::Int, CellIndex::Literal(inst.offset1))?;
                }
                Opcode::StoreReal => {
                    self.store(HeapKind::Real, CellIndex::Literal(inst.offset1))?;
                }
                Opcode::StoreInt => {
                    self.store(HeapKind::Int, CellIndex::Literal(inst.offset1))?;
                }

                // Indexed memory load/store: the literal base is merged with
                // the popped index expression at emission time
                Opcode::LoadIndexedReal => {
                    let cell = self.indexed_cell(inst.offset1)?;
                    self.push_load(HeapKind::Real, cell)?;
                }
                Opcode::LoadIndexedInt => {
                    let cell = self.indexed_cell(inst.offset1)?;
                    self.push_load(HeapKind::Int, cell)?;
                }
                Opcode::StoreIndexedReal => {
                    let cell = self.indexed_cell(inst.offset1)?;
                    self.store(HeapKind::Real, cell)?;
                }
                Opcode::StoreIndexedInt => {
                    let cell = self.indexed_cell(inst.offset1)?;
                    self.store(HeapKind::Int, cell)?;
                }

                // Memory shift, expanded into load/store pairs evaluated
                // descending so no slot is overwritten before it is read
                Opcode::BlockShiftReal => {
                    for i in ((inst.offset2 + 1)..=inst.offset1).rev() {
                        self.push_load(HeapKind::Real, CellIndex::Literal(i - 1))?;
                        self.store(HeapKind::Real, CellIndex::Literal(i))?;
                    }
                }
                Opcode::BlockShiftInt => {
                    for i in ((inst.offset2 + 1)..=inst.offset1).rev() {
                        self.push_load(HeapKind::Int, CellIndex::Literal(i - 1))?;
                        self.store(HeapKind::Int, CellIndex::Literal(i))?;
                    }
                }

                // Input/output
                Opcode::LoadInput => {
                    let frame = self.stack.pop()?;
                    let rendered = self.target.load_input(inst.offset1, &frame);
                    self.stack.push(rendered)?;
                }
                Opcode::StoreOutput => {
                    let frame = self.stack.pop()?;
                    let value = self.stack.pop()?;
                    let rendered = self.target.store_output(inst.offset1, &frame, &value);
                    self.blocks.add_inst(rendered)?;
                }

                // Casts
                Opcode::CastReal => {
                    let value = self.stack.pop()?;
                    let rendered = self.target.cast_real(&value);
                    self.stack.push(rendered)?;
                }
                Opcode::CastInt => {
                    let value = self.stack.pop()?;
                    let rendered = self.target.cast_int(&value);
                    self.stack.push(rendered)?;
                }
                Opcode::BitcastReal => {
                    let value = self.stack.pop()?;
                    let rendered = self.target.bitcast_real(&value)?;
                    self.stack.push(rendered)?;
                }
                Opcode::BitcastInt => {
                    let value = self.stack.pop()?;
                    let rendered = self.target.bitcast_int(&value)?;
                    self.stack.push(rendered)?;
                }

                // Control
                Opcode::Return => {
                    // Empty address stack = end of the compiled unit;
                    // otherwise resume at the saved position
                    match self.returns.pop() {
                        None => break,
                        Some(address) => next = address,
                    }
                }

                Opcode::If => {
                    // Structural conditionals must be pre-lowered to
                    // cond-branch/select form before reaching this compiler
                    return Err(CodegenError::UnsupportedOpcode {
                        opcode: Opcode::If,
                        backend: self.target.backend_name(),
                    });
                }

                Opcode::SelectReal | Opcode::SelectInt => {
                    let cond = self.stack.pop()?;

                    // Each child pushes exactly one resulting expression;
                    // the else result sits on top afterwards
                    self.compile_block(self.branch1(inst)?)?;
                    self.compile_block(self.branch2(inst)?)?;

                    let else_value = self.stack.pop()?;
                    let then_value = self.stack.pop()?;
                    let rendered =
                        self.target
                            .select(inst.opcode, &cond, &then_value, &else_value);
                    self.stack.push(rendered)?;
                }

                Opcode::CondBranch => {
                    let cond = self.stack.pop()?;

                    // The block being finished is the true target; the
                    // fresh block is the false/continuation target
                    let true_label = self.blocks.index()?;
                    let true_kind = self.blocks.kind()?;
                    self.blocks.add_block();
                    let false_label = self.blocks.index()?;

                    let transfer =
                        self.target
                            .cond_transfer(&cond, true_label, true_kind, false_label)?;
                    self.blocks.add_previous_inst(transfer)?;
                }

                Opcode::Loop => {
                    // Only block boundaries are managed here; the back edge
                    // is a cond-branch inside the body child
                    self.blocks.add_block();
                    self.compile_block(self.branch1(inst)?)?;

                    self.blocks.add_block_kind(BlockKind::Loop);
                    self.compile_block(self.branch2(inst)?)?;
                }

                // Binary arithmetic, comparison, bitwise
                opcode if opcode.binop_symbol().is_some() => {
                    self.push_binop(opcode)?;
                }

                // Unary math calls
                opcode if opcode.is_unary_math() => {
                    self.push_unary_call(opcode)?;
                }

                // Binary math calls; floating remainder is exact, unlike
                // the truncating integer `%`
                opcode if opcode.is_binary_math() => {
                    self.push_binary_call(opcode)?;
                }

                // No lowering (soundfile access): record the gap and move on
                opcode => {
                    tracing::warn!(
                        ?opcode,
                        backend = self.target.backend_name(),
                        "opcode has no lowering; skipping"
                    );
                    self.stats.skipped.push(opcode);
                    pc = next;
                    continue;
                }
            }

            self.stats.lowered += 1;
            pc = next;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpp::CppTarget;
    use crate::options::Precision;

    fn compile(block: &Block) -> (Vec<Vec<String>>, CompileStats) {
        let target = CppTarget::new(Precision::Single);
        let mut compiler = FbcCompiler::new(&target);
        compiler.compile_phase(block).expect("compile failed");
        let rendered = compiler
            .blocks()
            .iter()
            .map(|b| b.statements.clone())
            .collect();
        (rendered, compiler.into_stats())
    }

    fn real(v: f64) -> Instruction {
        Instruction::new(Opcode::RealValue).with_real(v)
    }

    fn int32(v: i64) -> Instruction {
        Instruction::new(Opcode::Int32Value).with_int(v)
    }

    #[test]
    fn test_store_literal() {
        let mut block = Block::new();
        block.push(real(0.5));
        block.push(Instruction::new(Opcode::StoreReal).with_offset1(2));

        let (rendered, stats) = compile(&block);
        assert_eq!(rendered[0], vec!["fRealHeap[2] = 0.5;"]);
        assert_eq!(stats.lowered, 2);
        assert!(stats.skipped.is_empty());
    }

    #[test]
    fn test_binop_pop_order_is_left_operand_first() {
        // The left operand must be the first pop, so it is pushed second
        let mut block = Block::new();
        block.push(int32(3));
        block.push(int32(10));
        block.push(Instruction::new(Opcode::SubInt));
        block.push(Instruction::new(Opcode::StoreInt).with_offset1(0));

        let (rendered, _) = compile(&block);
        assert_eq!(rendered[0], vec!["fIntHeap[0] = (10 - 3);"]);
    }

    #[test]
    fn test_indexed_access_merges_base_and_index() {
        let mut block = Block::new();
        block.push(Instruction::new(Opcode::LoadInt).with_offset1(4));
        block.push(Instruction::new(Opcode::LoadIndexedReal).with_offset1(16));
        block.push(Instruction::new(Opcode::StoreReal).with_offset1(0));

        let (rendered, _) = compile(&block);
        assert_eq!(rendered[0], vec!["fRealHeap[0] = fRealHeap[16+fIntHeap[4]];"]);
    }

    #[test]
    fn test_block_shift_descends() {
        let mut block = Block::new();
        block.push(Instruction::new(Opcode::BlockShiftReal).with_offsets(3, 1));

        let (rendered, _) = compile(&block);
        assert_eq!(
            rendered[0],
            vec![
                "fRealHeap[3] = fRealHeap[2];",
                "fRealHeap[2] = fRealHeap[1];",
            ]
        );
    }

    #[test]
    fn test_select_keeps_then_branch_in_true_slot() {
        let mut then_block = Block::new();
        then_block.push(real(1.0));
        let mut else_block = Block::new();
        else_block.push(real(2.0));

        let mut block = Block::new();
        block.push(int32(1));
        block.push(Instruction::new(Opcode::SelectReal).with_branches(then_block, else_block));
        block.push(Instruction::new(Opcode::StoreReal).with_offset1(0));

        let (rendered, _) = compile(&block);
        assert_eq!(rendered[0], vec!["fRealHeap[0] = ((1) ? 1.0 : 2.0);"]);
    }

    #[test]
    fn test_cond_branch_emits_dual_transfer() {
        let mut block = Block::new();
        block.push(int32(0));
        block.push(int32(1));
        block.push(Instruction::new(Opcode::GTInt));
        block.push(Instruction::new(Opcode::CondBranch));

        let (rendered, _) = compile(&block);
        assert_eq!(rendered.len(), 2);
        assert_eq!(
            rendered[0],
            vec!["if (1 > 0) { goto label0; } else { goto label1; }"]
        );
        assert!(rendered[1].is_empty());
    }

    #[test]
    fn test_if_is_rejected() {
        let mut block = Block::new();
        block.push(int32(1));
        block.push(Instruction::new(Opcode::If).with_branches(Block::new(), Block::new()));

        let target = CppTarget::new(Precision::Single);
        let mut compiler = FbcCompiler::new(&target);
        assert!(matches!(
            compiler.compile_phase(&block),
            Err(CodegenError::UnsupportedOpcode {
                opcode: Opcode::If,
                ..
            })
        ));
    }

    #[test]
    fn test_skipped_opcode_is_accounted() {
        let mut block = Block::new();
        block.push(Instruction::new(Opcode::Soundfile));
        block.push(real(0.0));
        block.push(Instruction::new(Opcode::StoreReal).with_offset1(0));

        let (rendered, stats) = compile(&block);
        assert_eq!(stats.skipped, vec![Opcode::Soundfile]);
        assert_eq!(stats.lowered, 2);
        assert_eq!(rendered[0], vec!["fRealHeap[0] = 0.0;"]);
    }

    #[test]
    fn test_unbalanced_phase_is_an_error() {
        let mut block = Block::new();
        block.push(real(1.0));

        let target = CppTarget::new(Precision::Single);
        let mut compiler = FbcCompiler::new(&target);
        assert!(matches!(
            compiler.compile_phase(&block),
            Err(CodegenError::UnbalancedStack(1))
        ));
    }

    #[test]
    fn test_missing_branch_is_internal_fault() {
        let mut block = Block::new();
        block.push(int32(1));
        block.push(Instruction::new(Opcode::SelectReal));

        let target = CppTarget::new(Precision::Single);
        let mut compiler = FbcCompiler::new(&target);
        assert!(matches!(
            compiler.compile_phase(&block),
            Err(CodegenError::Internal(_))
        ));
    }
}
