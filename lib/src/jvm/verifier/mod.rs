//! Bytecode data-flow analysis
//!
//! For any specific instruction inside a method body, the stack and locals have a structure that
//! is known statically: although the values on the stack and in the locals may obviously be
//! different from one run to the next, their types and order are not. This information is the
//! _frame_ at that instruction (represented using [`Frame`]), and the "types" used (represented
//! using [`VerificationType`]) are slightly augmented to take into account initialization and
//! null.
//!
//! Knowing the frame before an instruction makes it possible to check that the instruction makes
//! sense (eg. `dadd` only makes sense if the top two elements on the stack are of type `double`)
//! and to compute the frame after it (see [`Frame::after_instruction`]). Straight-line code is
//! simple. Code with branches is walked block by block by the [`Analyzer`], which records the
//! first frame reaching each instruction, seeds exception handlers from the frame at the start of
//! their protected range, and then hands every frame to the registered [`FrameProcessor`]s.
//!
//! The frames at block entries are exactly what a `StackMapTable` attribute stores, and
//! [`Analysis::stack_map_table`] renders them in that compressed form.

mod analyzer;
mod frame;
mod processor;
mod stack_map;
mod transfer;
mod types;

pub use analyzer::*;
pub use frame::*;
pub use processor::*;
pub use stack_map::*;
pub use types::*;
