//! Data-flow analysis of JVM method bodies
//!
//! The interesting part of this crate is [`jvm::verifier`], which computes the verification types
//! of the local variables and operand stack at every instruction of a method. The rest of the
//! crate ([`jvm::code`], plus the descriptor and name types in [`jvm`]) provides just enough of a
//! model of class files to feed it: decoded instructions, resolved constants, and exception
//! tables.

pub mod jvm;
pub mod util;
