//! The template compiler: one native-code template per opcode.
//!
//! A single forward scan over the decoded program. At each instruction
//! boundary the offset's label is defined, then the opcode's template is
//! emitted with its encoding-time constants baked in: immediates directly,
//! `GET`/`SET` slot numbers as byte displacements, `JGT` operands as
//! absolute byte offsets referenced through the label table. Jump
//! resolution is deferred to one sweep after the scan, which handles
//! forward and backward targets identically.
//!
//! Value-stack slots are 8 bytes and always hold a sign-extended 32-bit
//! value, so `CMP` can compare full words and `JGT` can test the low half;
//! `ADD` re-extends after the add, which is exactly 32-bit wraparound.

use macroassembler::assembler::abstract_macro_assembler::{AbsoluteAddress, Address, Operand};
use macroassembler::assembler::{RelationalCondition, TargetMacroAssembler};
use macroassembler::jit::gpr_info::*;

use crate::bytecode::verify::StackLayout;
use crate::bytecode::{Op, Program};
use crate::error::CompileError;
use crate::jit::labels::{OffsetLabels, PendingJump};
use crate::jit::{code, thunks, CompiledCode, INPUT, INPUT_ELEM, SLOT, STACK};

const FP: u8 = TargetMacroAssembler::FRAME_POINTER_REGISTER;
const SP: u8 = TargetMacroAssembler::STACK_POINTER_REGISTER;
#[cfg(target_arch = "aarch64")]
const LR: u8 = TargetMacroAssembler::LINK_REGISTER;

pub struct TemplateCompiler<'a> {
    program: &'a Program,
    masm: TargetMacroAssembler,
    labels: OffsetLabels,
    pending: Vec<PendingJump>,
    /// Native-stack bytes reserved for the value stack, 16-byte aligned,
    /// sized from the verifier's high-water mark.
    frame_bytes: i32,
}

impl<'a> TemplateCompiler<'a> {
    pub fn new(program: &'a Program, layout: StackLayout) -> Self {
        let frame_bytes = ((layout.max_depth as i64 * SLOT as i64 + 15) & !15) as i32;
        TemplateCompiler {
            program,
            masm: TargetMacroAssembler::new(),
            labels: OffsetLabels::allocate(program.len()),
            pending: Vec::new(),
            frame_bytes,
        }
    }

    pub fn compile(mut self) -> Result<CompiledCode, CompileError> {
        let program = self.program;
        log::debug!(
            "compiling {} bytecode bytes, {} instructions, frame {} bytes",
            program.len(),
            program.instructions().len(),
            self.frame_bytes
        );

        self.emit_prologue();

        for inst in program.instructions() {
            let label = self.masm.label();
            self.labels.define(inst.offset, label);
            log::trace!("{:5}: {}", inst.offset, inst.op);

            match inst.op {
                Op::Constant(value) => self.emit_constant(value),
                Op::Add => self.emit_add(),
                Op::Print => self.emit_print(),
                Op::Input => self.emit_input(),
                Op::Discard => self.emit_discard(),
                Op::Get(slot) => self.emit_get(slot),
                Op::Set(slot) => self.emit_set(slot),
                Op::Cmp => self.emit_cmp(),
                Op::Jgt(delta) => self.emit_jgt(inst.offset, delta),
                Op::Halt => self.emit_halt(),
            }
        }

        let pending = std::mem::take(&mut self.pending);
        self.labels.resolve(&mut self.masm, pending)?;

        code::link_and_encode(&mut self.masm)
    }

    /// Save the caller's frame and the callee-saved registers we repurpose,
    /// park the input cursor, and carve the value stack out of the native
    /// stack. The reservation keeps SP 16-byte aligned at every call site.
    fn emit_prologue(&mut self) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "x86_64")] {
                self.masm.push_to_save(FP);
                self.masm.mov(SP, FP);
                self.masm.push_to_save(INPUT);
                self.masm.push_to_save(STACK);
            } else if #[cfg(target_arch = "aarch64")] {
                self.masm.push_pair(FP, LR);
                self.masm.push_pair(INPUT, STACK);
            } else {
                compile_error!("unsupported target architecture");
            }
        }

        self.masm.mov(ARGUMENT_GPR0, INPUT);
        self.masm.sub64(self.frame_bytes, SP);
        self.masm.mov(SP, STACK);
    }

    fn emit_constant(&mut self, value: i32) {
        self.masm.store64(value, Address::new(STACK, 0));
        self.masm.add64(SLOT, STACK);
    }

    fn emit_add(&mut self) {
        self.masm.load64(Address::new(STACK, -SLOT), T1);
        self.masm.load64(Address::new(STACK, -2 * SLOT), T0);
        self.masm.add64(T1, T0);
        self.masm.sign_extend32_to_64(T0, T0);
        self.masm.store64(T0, Address::new(STACK, -2 * SLOT));
        self.masm.sub64(SLOT, STACK);
    }

    fn emit_print(&mut self) {
        self.masm.load64(Address::new(STACK, -SLOT), ARGUMENT_GPR0);
        self.masm.sub64(SLOT, STACK);
        self.ccall1(AbsoluteAddress::new(thunks::jit_print as _));
    }

    fn emit_input(&mut self) {
        self.masm.load32(Address::new(INPUT, 0), T0);
        self.masm.sign_extend32_to_64(T0, T0);
        self.masm.store64(T0, Address::new(STACK, 0));
        self.masm.add64(SLOT, STACK);
        self.masm.add64(INPUT_ELEM, INPUT);
    }

    fn emit_discard(&mut self) {
        self.masm.sub64(SLOT, STACK);
    }

    fn emit_get(&mut self, slot: i32) {
        self.masm.load64(Address::new(STACK, slot_disp(slot)), T0);
        self.masm.store64(T0, Address::new(STACK, 0));
        self.masm.add64(SLOT, STACK);
    }

    fn emit_set(&mut self, slot: i32) {
        self.masm.load64(Address::new(STACK, -SLOT), T0);
        self.masm.sub64(SLOT, STACK);
        self.masm.store64(T0, Address::new(STACK, slot_disp(slot)));
    }

    fn emit_cmp(&mut self) {
        self.masm.load64(Address::new(STACK, -SLOT), T1);
        self.masm.load64(Address::new(STACK, -2 * SLOT), T0);
        self.masm.sub64(SLOT, STACK);

        let greater = self
            .masm
            .branch64(RelationalCondition::GreaterThan, T0, T1);
        let equal = self.masm.branch64(RelationalCondition::Equal, T0, T1);
        self.masm.mov(-1i64, T2);
        let done_less = self.masm.jump();
        greater.link(&mut self.masm);
        self.masm.mov(1i64, T2);
        let done_greater = self.masm.jump();
        equal.link(&mut self.masm);
        self.masm.mov(0i64, T2);
        done_less.link(&mut self.masm);
        done_greater.link(&mut self.masm);

        self.masm.store64(T2, Address::new(STACK, -SLOT));
    }

    fn emit_jgt(&mut self, at: usize, delta: i32) {
        self.masm.load64(Address::new(STACK, -SLOT), T0);
        self.masm.sub64(SLOT, STACK);
        let jump = self
            .masm
            .branch32(RelationalCondition::GreaterThan, T0, 0i32);
        self.pending.push(PendingJump {
            jump,
            target: at as i64 + delta as i64,
            at,
        });
    }

    /// Unwind the prologue. Every `HALT` gets its own copy of the epilogue.
    fn emit_halt(&mut self) {
        self.masm.add64(self.frame_bytes, SP);
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "x86_64")] {
                self.masm.pop_to_restore(STACK);
                self.masm.pop_to_restore(INPUT);
                self.masm.pop_to_restore(FP);
            } else if #[cfg(target_arch = "aarch64")] {
                self.masm.pop_pair(STACK, INPUT);
                self.masm.pop_pair(LR, FP);
            }
        }
        self.masm.ret();
    }

    /// Call a one-argument C function. Windows x64 owes the callee 32 bytes
    /// of shadow space; everyone else calls directly.
    fn ccall1(&mut self, func: impl Into<Operand>) {
        cfg_if::cfg_if! {
            if #[cfg(all(windows, target_arch = "x86_64"))] {
                self.masm.sub64(32i32, SP);
                self.masm.call_op(Some(func));
                self.masm.add64(32i32, SP);
            } else {
                self.masm.call_op(Some(func));
            }
        }
    }
}

/// Byte displacement of the slot `n` below the top, relative to the STACK
/// register (which points one past the top). Wraps rather than panics so a
/// nonsense operand in dead code still just emits an unreachable template.
fn slot_disp(n: i32) -> i32 {
    (-(n as i64 + 1) * SLOT as i64) as i32
}
