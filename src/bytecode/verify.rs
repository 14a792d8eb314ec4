//! Compile-time stack-depth verification.
//!
//! The verifier walks the control-flow graph of a decoded program with a
//! worklist, tracking the exact stack depth at every reachable instruction.
//! Depth is a static property of a program point: every path into an offset
//! must agree on it, or the program is rejected. The returned layout carries
//! the high-water mark, which sizes the runtime stack reservation exactly.
//! Verified programs cannot underflow or overflow it, so the generated code
//! carries no per-instruction bounds checks.
//!
//! Instructions a scan reaches but no execution path does (dead code) are
//! compiled like everything else; they are just never constrained here.

use std::collections::VecDeque;

use crate::bytecode::{Inst, Op, Program};
use crate::error::MalformedProgram;

/// What the verifier learned about a valid program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    /// The largest number of live values at any instruction boundary.
    pub max_depth: usize,
}

pub fn verify(program: &Program) -> Result<StackLayout, MalformedProgram> {
    let insts = program.instructions();
    let mut depth_at: Vec<Option<usize>> = vec![None; insts.len()];
    let mut work: VecDeque<usize> = VecDeque::new();
    let mut max_depth = 0usize;

    depth_at[0] = Some(0);
    work.push_back(0);

    while let Some(index) = work.pop_front() {
        let Inst { offset, op } = insts[index];
        let depth = depth_at[index].expect("worklist entries have a recorded depth");

        let (pops, pushes) = op.stack_effect();
        if depth < pops {
            return Err(MalformedProgram::StackUnderflow { offset, depth });
        }

        match op {
            Op::Get(n) => {
                if n < 0 {
                    return Err(MalformedProgram::NegativeOperand { offset, operand: n });
                }
                if (n as usize) + 1 > depth {
                    return Err(MalformedProgram::OperandOutOfRange {
                        offset,
                        operand: n,
                        depth,
                    });
                }
            }
            Op::Set(n) => {
                if n < 0 {
                    return Err(MalformedProgram::NegativeOperand { offset, operand: n });
                }
                // The slot is addressed after the pop.
                if (n as usize) + 2 > depth {
                    return Err(MalformedProgram::OperandOutOfRange {
                        offset,
                        operand: n,
                        depth,
                    });
                }
            }
            _ => {}
        }

        let depth_after = depth - pops + pushes;
        max_depth = max_depth.max(depth).max(depth_after);

        let mut flow_to = |index: usize, depth: usize| -> Result<(), MalformedProgram> {
            match depth_at[index] {
                None => {
                    depth_at[index] = Some(depth);
                    work.push_back(index);
                    Ok(())
                }
                Some(expected) if expected != depth => Err(MalformedProgram::DepthMismatch {
                    offset: insts[index].offset,
                    expected,
                    found: depth,
                }),
                Some(_) => Ok(()),
            }
        };

        match op {
            Op::Halt => {}
            Op::Jgt(delta) => {
                let target = offset as i64 + delta as i64;
                if target < 0 || target >= program.len() as i64 {
                    return Err(MalformedProgram::JumpOutOfRange { offset, target });
                }
                let target = target as usize;
                let target_index = program
                    .index_of(target)
                    .ok_or(MalformedProgram::JumpIntoOperand { offset, target })?;
                flow_to(target_index, depth_after)?;
                if index + 1 == insts.len() {
                    return Err(MalformedProgram::ControlFallsThrough { offset });
                }
                flow_to(index + 1, depth_after)?;
            }
            _ => {
                if index + 1 == insts.len() {
                    return Err(MalformedProgram::ControlFallsThrough { offset });
                }
                flow_to(index + 1, depth_after)?;
            }
        }
    }

    log::debug!(
        "verified {} instructions ({} bytes), max stack depth {}",
        insts.len(),
        program.len(),
        max_depth
    );

    Ok(StackLayout { max_depth })
}
