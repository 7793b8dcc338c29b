//! Bytecode representation and decoding
//!
//! ### Structure
//!
//! Method bodies are essentially just a CFG of basic blocks, with an operand stack and a stack of
//! local variables. We split up the [list of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions (the body of the basic blocks)
//!   - [`BranchInstruction`] for instructions that may branch (the end of the basic blocks)
//!
//! Both are produced by an [`InstructionStream`], which decodes the instruction starting at any
//! given offset in the code array. The operands referring to the constant pool stay as raw indices
//! until they get resolved by a [`ConstantResolver`] into the types the verifier needs.
//!
//! The exception table of the method is modelled separately, as a list of [`ExceptionHandler`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod constants;
mod decode;
mod exception_table;
mod instructions;

pub use constants::*;
pub use decode::*;
pub use exception_table::*;
pub use instructions::*;
