//! One resolvable jump target per byte offset of the source program.
//!
//! Every offset gets a slot up front, so a `JGT` can reference its target
//! before or after the target is compiled; resolution happens in one sweep
//! after the scan. Deliberately wasteful (most offsets are never jumped to),
//! and at bytecode scale that is fine.

use macroassembler::assembler::abstract_macro_assembler::{Jump, Label};
use macroassembler::assembler::TargetMacroAssembler;

use crate::error::CompileError;

pub struct OffsetLabels {
    slots: Vec<Option<Label>>,
}

/// A `JGT` whose target label may not exist yet. The target is kept signed:
/// a jump in dead code can aim anywhere, and resolution is where that fails.
pub struct PendingJump {
    pub jump: Jump,
    /// Byte offset the jump must land on.
    pub target: i64,
    /// Byte offset of the jumping instruction, for error reporting.
    pub at: usize,
}

impl OffsetLabels {
    /// Reserve label slots for offsets `0..n`.
    pub fn allocate(n: usize) -> Self {
        OffsetLabels {
            slots: (0..n).map(|_| None).collect(),
        }
    }

    /// Bind `offset` to `label`. Offsets are defined exactly once, in scan
    /// order; violating that is a compiler bug, not a user error.
    pub fn define(&mut self, offset: usize, label: Label) {
        assert!(offset < self.slots.len(), "label offset out of range");
        assert!(self.slots[offset].is_none(), "label defined twice");
        self.slots[offset] = Some(label);
    }

    /// Link every pending jump to its target's label. Targets that were
    /// never reached by the scan surface as `UnresolvedJump`.
    pub fn resolve(
        &self,
        masm: &mut TargetMacroAssembler,
        pending: Vec<PendingJump>,
    ) -> Result<(), CompileError> {
        for p in pending {
            let slot = usize::try_from(p.target)
                .ok()
                .and_then(|target| self.slots.get(target))
                .copied()
                .flatten();
            let label = slot.ok_or(CompileError::UnresolvedJump {
                at: p.at,
                target: p.target,
            })?;
            p.jump.link_to(masm, label);
        }
        Ok(())
    }
}
