//! Assembles instruction sequences into the binary program encoding.
//!
//! Offsets are byte offsets, exactly as `JGT` sees them. Backward jumps go
//! through [`ProgramBuilder::jgt_to`]; forward jumps are emitted as a
//! placeholder and patched once the target offset is known.

use crate::bytecode::opcodes;

#[derive(Default)]
pub struct ProgramBuilder {
    code: Vec<u8>,
}

/// Handle to an emitted `JGT` whose target is not yet known.
#[derive(Debug, Clone, Copy)]
#[must_use = "an unpatched forward jump targets its own instruction"]
pub struct ForwardJump {
    at: usize,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset the next instruction will be emitted at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    fn op(&mut self, opcode: u8) {
        self.code.push(opcode);
    }

    fn op_with_operand(&mut self, opcode: u8, operand: i32) {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_le_bytes());
    }

    pub fn constant(&mut self, value: i32) {
        self.op_with_operand(opcodes::CONSTANT, value);
    }

    pub fn add(&mut self) {
        self.op(opcodes::ADD);
    }

    pub fn print(&mut self) {
        self.op(opcodes::PRINT);
    }

    pub fn input(&mut self) {
        self.op(opcodes::INPUT);
    }

    pub fn discard(&mut self) {
        self.op(opcodes::DISCARD);
    }

    pub fn get(&mut self, slot: i32) {
        self.op_with_operand(opcodes::GET, slot);
    }

    pub fn set(&mut self, slot: i32) {
        self.op_with_operand(opcodes::SET, slot);
    }

    pub fn cmp(&mut self) {
        self.op(opcodes::CMP);
    }

    /// Emit `JGT` with a raw relative operand.
    pub fn jgt(&mut self, delta: i32) {
        self.op_with_operand(opcodes::JGT, delta);
    }

    /// Emit `JGT` targeting an already-emitted offset.
    pub fn jgt_to(&mut self, target: usize) {
        let delta = target as i64 - self.offset() as i64;
        self.jgt(delta as i32);
    }

    /// Emit `JGT` whose target will be supplied later via [`Self::patch`].
    pub fn jgt_forward(&mut self) -> ForwardJump {
        let at = self.offset();
        self.jgt(0);
        ForwardJump { at }
    }

    /// Point a forward jump at `target` (usually [`Self::offset`]).
    pub fn patch(&mut self, jump: ForwardJump, target: usize) {
        let delta = (target as i64 - jump.at as i64) as i32;
        self.code[jump.at + 1..jump.at + 5].copy_from_slice(&delta.to_le_bytes());
    }

    pub fn halt(&mut self) {
        self.op(opcodes::HALT);
    }

    pub fn finish(self) -> Vec<u8> {
        self.code
    }
}
