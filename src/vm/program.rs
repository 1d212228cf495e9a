//! A compiled song: an ordered instruction sequence and an execution cursor.

use super::instruction::Instruction;

/// A compiled, playable song.
///
/// The cursor is always a valid instruction index or the end sentinel
/// (`len()`). Instructions never change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    cursor: usize,
}

impl Program {
    /// Wrap an instruction sequence with the cursor at the start.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            cursor: 0,
        }
    }

    /// All instructions in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions, which is also the end sentinel.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index of the next instruction to execute.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The instruction under the cursor, or `None` at the end sentinel.
    pub fn current(&self) -> Option<&Instruction> {
        self.instructions.get(self.cursor)
    }

    /// Whether the cursor sits on the end sentinel.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.instructions.len()
    }

    /// Move the cursor back to the first instruction.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Move the cursor to `target`. Fails without moving when `target` is
    /// past the end sentinel.
    pub fn seek(&mut self, target: usize) -> bool {
        if target > self.instructions.len() {
            return false;
        }
        self.cursor = target;
        true
    }

    /// Step the cursor past the current instruction.
    pub(crate) fn advance(&mut self) {
        if self.cursor < self.instructions.len() {
            self.cursor += 1;
        }
    }
}
