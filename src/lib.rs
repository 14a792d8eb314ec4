//! A template just-in-time compiler for a small stack bytecode.
//!
//! Programs are byte sequences over ten opcodes operating on an implicit
//! stack of signed 32-bit integers (see [`bytecode`]). [`compile`] decodes
//! and verifies a program, then translates it to native code in one forward
//! scan (one fixed template per opcode, no interpretation loop) and hands
//! back a [`CompiledCode`] that is called directly with an input stream.
//!
//! ```no_run
//! use stackjit::bytecode::builder::ProgramBuilder;
//!
//! let mut b = ProgramBuilder::new();
//! b.input();
//! b.input();
//! b.add();
//! b.print();
//! b.halt();
//!
//! let code = stackjit::compile(&b.finish()).unwrap();
//! unsafe { code.call(&[40, 2]) }; // prints 42
//! ```
//!
//! The [`interp`] module evaluates the same semantics with full runtime
//! checking; the test-suite holds the two implementations against each
//! other.

pub mod bytecode;
pub mod error;
pub mod interp;
pub mod jit;

pub use error::{CompileError, MalformedProgram};
pub use jit::{compile, CompiledCode};
