//! Emitted-block list
//!
//! Control flow in the low-level output is expressed with labeled,
//! straight-line statement groups linked by explicit transfers: conditional
//! and looping constructs are lowered into gotos (or structured loop forms,
//! in the WAST renderer) between blocks rather than nested language
//! constructs. The list is append-only during compilation of one phase and
//! fully consumed when that phase is rendered.

use crate::error::{CodegenError, CodegenResult};

/// Role of an emitted block, used by structured renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    /// Ordinary straight-line block
    #[default]
    Plain,
    /// Block opened as a loop body; the WAST renderer wraps it in
    /// `(loop $label ...)`
    Loop,
}

/// One labeled straight-line statement group
#[derive(Debug, Default)]
pub struct EmittedBlock {
    /// Numeric label
    pub label: usize,
    /// Block role
    pub kind: BlockKind,
    /// Rendered statements, in order
    pub statements: Vec<String>,
}

/// Ordered, append-only list of emitted blocks
#[derive(Debug, Default)]
pub struct BlockList {
    blocks: Vec<EmittedBlock>,
}

impl BlockList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new empty plain block and make it current
    pub fn add_block(&mut self) {
        self.add_block_kind(BlockKind::Plain);
    }

    /// Append a new empty block of the given kind and make it current
    pub fn add_block_kind(&mut self, kind: BlockKind) {
        let label = self.blocks.len();
        self.blocks.push(EmittedBlock {
            label,
            kind,
            statements: Vec::new(),
        });
    }

    /// Append a statement to the current block
    pub fn add_inst(&mut self, statement: String) -> CodegenResult<()> {
        self.blocks
            .last_mut()
            .ok_or_else(|| CodegenError::Internal("statement emitted with no open block".into()))?
            .statements
            .push(statement);
        Ok(())
    }

    /// Append a statement to the second-most-recent block
    ///
    /// Used so a branch decision computed while finishing one block can
    /// inject its transfer statement into that block after a successor has
    /// already been opened.
    pub fn add_previous_inst(&mut self, statement: String) -> CodegenResult<()> {
        let len = self.blocks.len();
        if len < 2 {
            return Err(CodegenError::Internal(
                "transfer emitted with no predecessor block".into(),
            ));
        }
        self.blocks[len - 2].statements.push(statement);
        Ok(())
    }

    /// Label of the current block
    pub fn index(&self) -> CodegenResult<usize> {
        self.blocks
            .last()
            .map(|block| block.label)
            .ok_or_else(|| CodegenError::Internal("label requested with no open block".into()))
    }

    /// Kind of the current block
    pub fn kind(&self) -> CodegenResult<BlockKind> {
        self.blocks
            .last()
            .map(|block| block.kind)
            .ok_or_else(|| CodegenError::Internal("kind requested with no open block".into()))
    }

    /// Iterate the blocks in list order
    pub fn iter(&self) -> impl Iterator<Item = &EmittedBlock> {
        self.blocks.iter()
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been opened yet
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_sequential() {
        let mut list = BlockList::new();
        list.add_block();
        assert_eq!(list.index().unwrap(), 0);
        assert_eq!(list.kind().unwrap(), BlockKind::Plain);
        list.add_block();
        assert_eq!(list.index().unwrap(), 1);
        list.add_block_kind(BlockKind::Loop);
        assert_eq!(list.index().unwrap(), 2);
        assert_eq!(list.kind().unwrap(), BlockKind::Loop);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_add_inst_targets_current() {
        let mut list = BlockList::new();
        list.add_block();
        list.add_inst("first;".to_string()).unwrap();
        list.add_block();
        list.add_inst("second;".to_string()).unwrap();

        let blocks: Vec<_> = list.iter().collect();
        assert_eq!(blocks[0].statements, vec!["first;"]);
        assert_eq!(blocks[1].statements, vec!["second;"]);
    }

    #[test]
    fn test_add_previous_inst_targets_predecessor() {
        let mut list = BlockList::new();
        list.add_block();
        list.add_inst("body;".to_string()).unwrap();
        list.add_block();
        list.add_previous_inst("goto;".to_string()).unwrap();

        let blocks: Vec<_> = list.iter().collect();
        assert_eq!(blocks[0].statements, vec!["body;", "goto;"]);
        assert!(blocks[1].statements.is_empty());
    }

    #[test]
    fn test_operations_require_open_blocks() {
        let mut list = BlockList::new();
        assert!(list.add_inst(";".to_string()).is_err());
        assert!(list.index().is_err());
        assert!(list.kind().is_err());
        list.add_block();
        assert!(list.add_previous_inst(";".to_string()).is_err());
    }
}
