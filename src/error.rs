//! Compile-time error reporting.
//!
//! Everything that can go wrong before an executable pointer exists lands
//! here: malformed bytecode rejected by the verifier, label resolution
//! failures, and executable-memory acquisition failures. Runtime misbehavior
//! of *verified* programs is limited to reading past the caller-supplied
//! input stream, which is the caller's contract (see `CompiledCode::call`).

/// Why a bytecode program was rejected before emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedProgram {
    /// The program is empty; there is nothing to compile.
    EmptyProgram,
    /// The byte at `offset` is not one of the ten opcodes.
    UnknownOpcode { offset: usize, byte: u8 },
    /// An operand-carrying opcode at `offset` runs past the end of the
    /// program.
    TruncatedOperand { offset: usize },
    /// A `GET`/`SET` operand is negative.
    NegativeOperand { offset: usize, operand: i32 },
    /// A `GET`/`SET` reaches below the bottom of the stack.
    OperandOutOfRange {
        offset: usize,
        operand: i32,
        depth: usize,
    },
    /// An instruction pops more values than the stack holds at that point.
    StackUnderflow { offset: usize, depth: usize },
    /// A `JGT` lands outside the program.
    JumpOutOfRange { offset: usize, target: i64 },
    /// A `JGT` lands inside another instruction's operand bytes.
    JumpIntoOperand { offset: usize, target: usize },
    /// Two control-flow paths reach `offset` with different stack depths.
    DepthMismatch {
        offset: usize,
        expected: usize,
        found: usize,
    },
    /// Control can run past the last instruction without reaching `HALT`.
    ControlFallsThrough { offset: usize },
}

impl std::fmt::Display for MalformedProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            MalformedProgram::EmptyProgram => write!(f, "empty program"),
            MalformedProgram::UnknownOpcode { offset, byte } => {
                write!(f, "unknown opcode {:#04x} at offset {}", byte, offset)
            }
            MalformedProgram::TruncatedOperand { offset } => {
                write!(f, "truncated operand at offset {}", offset)
            }
            MalformedProgram::NegativeOperand { offset, operand } => {
                write!(f, "negative stack offset {} at offset {}", operand, offset)
            }
            MalformedProgram::OperandOutOfRange {
                offset,
                operand,
                depth,
            } => write!(
                f,
                "stack offset {} out of range at offset {} (depth is {})",
                operand, offset, depth
            ),
            MalformedProgram::StackUnderflow { offset, depth } => {
                write!(f, "stack underflow at offset {} (depth is {})", offset, depth)
            }
            MalformedProgram::JumpOutOfRange { offset, target } => {
                write!(f, "jump from offset {} to {} is out of range", offset, target)
            }
            MalformedProgram::JumpIntoOperand { offset, target } => write!(
                f,
                "jump from offset {} to {} lands inside an instruction",
                offset, target
            ),
            MalformedProgram::DepthMismatch {
                offset,
                expected,
                found,
            } => write!(
                f,
                "inconsistent stack depth at offset {}: {} vs {}",
                offset, expected, found
            ),
            MalformedProgram::ControlFallsThrough { offset } => write!(
                f,
                "control can fall past the end of the program after offset {}",
                offset
            ),
        }
    }
}

/// Compilation failure. On any of these, no executable pointer is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    /// The bytecode was rejected by decoding or verification.
    Malformed(MalformedProgram),
    /// A jump referenced an offset whose label was never defined: either a
    /// compiler bug, or a jump in dead code (which the verifier does not
    /// constrain) aimed outside the program or into an operand.
    UnresolvedJump { at: usize, target: i64 },
    /// The link pass failed or executable memory could not be obtained.
    CodeAllocation,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            CompileError::Malformed(ref m) => write!(f, "malformed program: {}", m),
            CompileError::UnresolvedJump { at, target } => write!(
                f,
                "jump at offset {} targets offset {} which was never compiled",
                at, target
            ),
            CompileError::CodeAllocation => {
                write!(f, "failed to link or allocate executable code")
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<MalformedProgram> for CompileError {
    fn from(m: MalformedProgram) -> Self {
        CompileError::Malformed(m)
    }
}
