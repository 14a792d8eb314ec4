//! A simple template JIT.
//!
//! We use [macroassembler](https://docs.rs/macroassembler) which lets us
//! generate code for x86-64 and AArch64 from one instruction stream. Each
//! bytecode opcode maps to a fixed native template; there is no IR and no
//! register allocation beyond the role assignment below.
//!
//! Register roles. Long-lived state lives in callee-saved registers so the
//! `PRINT` call cannot clobber it; scratch values never survive past a
//! single template.
//!
//! | role                       | register       |
//! |----------------------------|----------------|
//! | input-stream cursor        | `INPUT` (CS0)  |
//! | value-stack next-free slot | `STACK` (CS1)  |
//! | scratch                    | T0, T1, T2     |
//!
//! On x86-64 SysV this lands INPUT in rbx and STACK in r12. Retargeting the
//! compiler means editing this table, nothing else.

use macroassembler::jit::gpr_info;

pub mod code;
pub mod compiler;
pub mod labels;
pub mod thunks;

/// Input-stream cursor: address of the next unread 32-bit value.
pub const INPUT: u8 = gpr_info::CS0;

/// Value-stack pointer: address of the next free 8-byte slot. The stack
/// grows upward from the base reserved in the prologue.
pub const STACK: u8 = gpr_info::CS1;

/// Width of one value-stack slot in bytes. Slots hold 32-bit values
/// sign-extended to the full word.
pub const SLOT: i32 = 8;

/// Width of one input-stream element in bytes.
pub const INPUT_ELEM: i32 = 4;

pub use code::CompiledCode;

use crate::bytecode::{verify, Program};
use crate::error::CompileError;

/// Compile a bytecode program to directly callable native code.
///
/// The bytes are decoded and verified first; anything structurally wrong is
/// reported as [`CompileError::Malformed`] and nothing is emitted.
pub fn compile(bytes: &[u8]) -> Result<CompiledCode, CompileError> {
    let program = Program::parse(bytes)?;
    let layout = verify::verify(&program)?;
    compiler::TemplateCompiler::new(&program, layout).compile()
}
