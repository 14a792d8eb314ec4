//! Executable-memory lifecycle and the invocation adapter.
//!
//! The link pass computes final displacements and the code size; the encode
//! pass writes the bytes into a region obtained from the executable
//! allocator, which hands it back executable and non-writable (and flushes
//! the instruction cache on targets whose data and instruction views can
//! disagree). Either pass failing means no executable pointer exists and
//! the compilation is abandoned; there is no retry.

use jit_allocator::JitAllocatorOptions;
use macroassembler::assembler::link_buffer::LinkBuffer;
use macroassembler::assembler::TargetMacroAssembler;
use macroassembler::wtf::executable_memory_handle::CodeRef;
use once_cell::sync::Lazy;

use crate::error::CompileError;

/// One-time allocator setup. Dual mapping is the W^X arrangement: code is
/// written through a writable alias and executed through a separate
/// executable one, so no page is ever both at once.
static EXECUTABLE_ALLOCATOR: Lazy<()> = Lazy::new(|| {
    macroassembler::jit::init_executable_allocator_with(JitAllocatorOptions {
        use_dual_mapping: true,
        ..Default::default()
    });
});

/// Run the link and encode passes over a finished instruction stream.
pub fn link_and_encode(masm: &mut TargetMacroAssembler) -> Result<CompiledCode, CompileError> {
    Lazy::force(&EXECUTABLE_ALLOCATOR);

    let mut buffer = match LinkBuffer::from_macro_assembler(masm) {
        Ok(buffer) => buffer,
        Err(_) => return Err(CompileError::CodeAllocation),
    };
    let code = buffer.finalize_without_disassembly();
    log::debug!("generated code entry at {:p}", code.start());

    Ok(CompiledCode { code })
}

/// A finished translation: an executable region and the typed entry into it.
///
/// The region is never written again once encoded. Dropping this releases
/// it exactly once; any pointer from [`Self::entrypoint`] dies with it.
pub struct CompiledCode {
    code: CodeRef,
}

impl std::fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCode")
            .field("entrypoint", &self.entrypoint())
            .finish()
    }
}

// The region is immutable and executable for the life of the handle, and
// calls carry no shared state besides their own input cursor.
unsafe impl Send for CompiledCode {}
unsafe impl Sync for CompiledCode {}

impl CompiledCode {
    /// Entry address of the generated function, with the fixed signature
    /// `extern "C" fn(*const i32)`.
    pub fn entrypoint(&self) -> *const u8 {
        self.code.start() as *const u8
    }

    /// Call the generated code on an input stream.
    ///
    /// # Safety
    ///
    /// The program must not execute more `INPUT` instructions than `input`
    /// has elements: input sufficiency is the one contract verification
    /// cannot bound statically, and the generated code does not check it.
    pub unsafe fn call(&self, input: &[i32]) {
        let f: extern "C" fn(*const i32) = std::mem::transmute(self.entrypoint());
        f(input.as_ptr());
    }
}
