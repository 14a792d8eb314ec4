//! The bytecode instruction set and its binary encoding.
//!
//! A program is a byte sequence: each instruction is a 1-byte opcode,
//! optionally followed by a 4-byte little-endian two's-complement operand.
//! Four opcodes carry an operand (`CONSTANT`, `GET`, `SET`, `JGT`); the rest
//! are a bare opcode byte. Instruction boundaries are the offsets reached by
//! a linear scan from offset 0, and `JGT` targets are byte offsets relative
//! to the start of the jumping instruction.

use crate::error::MalformedProgram;

pub mod builder;
pub mod verify;

/// Raw opcode bytes. The numeric values are part of the wire format and
/// cannot change.
pub mod opcodes {
    pub const CONSTANT: u8 = 0;
    pub const ADD: u8 = 1;
    pub const PRINT: u8 = 2;
    pub const INPUT: u8 = 3;
    pub const DISCARD: u8 = 4;
    pub const GET: u8 = 5;
    pub const SET: u8 = 6;
    pub const CMP: u8 = 7;
    pub const JGT: u8 = 8;
    pub const HALT: u8 = 9;
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Push the immediate.
    Constant(i32),
    /// Pop b, pop a, push a + b (32-bit wraparound).
    Add,
    /// Pop a value and emit its decimal representation.
    Print,
    /// Read the next value from the input stream and push it.
    Input,
    /// Pop and drop one value.
    Discard,
    /// Push a copy of the value `n` slots below the top (0 = top).
    Get(i32),
    /// Pop a value and store it `n` slots below the new top.
    Set(i32),
    /// Pop b, pop a, push +1 / 0 / -1 as a >, ==, < b.
    Cmp,
    /// Pop a; if a > 0, jump by the operand relative to this instruction's
    /// start offset.
    Jgt(i32),
    /// Stop and return to the caller.
    Halt,
}

impl Op {
    /// Encoded size in bytes: opcode byte plus operand if any.
    pub fn size(self) -> usize {
        match self {
            Op::Constant(_) | Op::Get(_) | Op::Set(_) | Op::Jgt(_) => 5,
            _ => 1,
        }
    }

    /// (pops, pushes) on the value stack. `SET` counts its store target as
    /// untouched; `GET`/`SET` reach depth is validated separately.
    pub fn stack_effect(self) -> (usize, usize) {
        match self {
            Op::Constant(_) | Op::Input | Op::Get(_) => (0, 1),
            Op::Add | Op::Cmp => (2, 1),
            Op::Print | Op::Discard | Op::Set(_) | Op::Jgt(_) => (1, 0),
            Op::Halt => (0, 0),
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            Op::Constant(_) => opcodes::CONSTANT,
            Op::Add => opcodes::ADD,
            Op::Print => opcodes::PRINT,
            Op::Input => opcodes::INPUT,
            Op::Discard => opcodes::DISCARD,
            Op::Get(_) => opcodes::GET,
            Op::Set(_) => opcodes::SET,
            Op::Cmp => opcodes::CMP,
            Op::Jgt(_) => opcodes::JGT,
            Op::Halt => opcodes::HALT,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Op::Constant(v) => write!(f, "constant {}", v),
            Op::Add => write!(f, "add"),
            Op::Print => write!(f, "print"),
            Op::Input => write!(f, "input"),
            Op::Discard => write!(f, "discard"),
            Op::Get(n) => write!(f, "get {}", n),
            Op::Set(n) => write!(f, "set {}", n),
            Op::Cmp => write!(f, "cmp"),
            Op::Jgt(d) => write!(f, "jgt {}", d),
            Op::Halt => write!(f, "halt"),
        }
    }
}

/// An instruction together with its byte offset in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub offset: usize,
    pub op: Op,
}

/// A decoded program: the encoded byte length plus the instruction list
/// produced by one linear scan. The scan's offsets are the program's only
/// instruction boundaries; jumps into the middle of an operand are rejected
/// by the verifier.
#[derive(Debug, Clone)]
pub struct Program {
    len: usize,
    insts: Vec<Inst>,
}

impl Program {
    /// Decode a byte sequence. Fails on the empty program, unknown opcode
    /// bytes, and operands running past the end.
    pub fn parse(bytes: &[u8]) -> Result<Program, MalformedProgram> {
        if bytes.is_empty() {
            return Err(MalformedProgram::EmptyProgram);
        }

        let mut insts = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let operand = |offset: usize| -> Result<i32, MalformedProgram> {
                if offset + 5 > bytes.len() {
                    return Err(MalformedProgram::TruncatedOperand { offset });
                }
                let mut le = [0u8; 4];
                le.copy_from_slice(&bytes[offset + 1..offset + 5]);
                Ok(i32::from_le_bytes(le))
            };

            let op = match bytes[offset] {
                opcodes::CONSTANT => Op::Constant(operand(offset)?),
                opcodes::ADD => Op::Add,
                opcodes::PRINT => Op::Print,
                opcodes::INPUT => Op::Input,
                opcodes::DISCARD => Op::Discard,
                opcodes::GET => Op::Get(operand(offset)?),
                opcodes::SET => Op::Set(operand(offset)?),
                opcodes::CMP => Op::Cmp,
                opcodes::JGT => Op::Jgt(operand(offset)?),
                opcodes::HALT => Op::Halt,
                byte => return Err(MalformedProgram::UnknownOpcode { offset, byte }),
            };

            insts.push(Inst { offset, op });
            offset += op.size();
        }

        Ok(Program {
            len: bytes.len(),
            insts,
        })
    }

    /// Byte length of the encoded program.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }

    /// Index into `instructions()` of the instruction starting at `offset`,
    /// if `offset` is an instruction boundary.
    pub fn index_of(&self, offset: usize) -> Option<usize> {
        self.insts
            .binary_search_by_key(&offset, |inst| inst.offset)
            .ok()
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for inst in &self.insts {
            writeln!(f, "{:5}: {}", inst.offset, inst.op)?;
        }
        Ok(())
    }
}
