//! Analyze JVM method bodies
//!
//! ### Simple example
//!
//! Consider the following simple Java method:
//!
//! ```java,ignore,no_run
//! static int max(int x, int y) {
//!     return x > y ? x : y;
//! }
//! ```
//!
//! Computing the verification frame at every instruction of the compiled method can be done as
//! follows:
//!
//! ```
//! use classflow::jvm::code::{BytecodeStream, ConstantTable};
//! use classflow::jvm::verifier::{Analyzer, MethodContext, VerificationType};
//! use classflow::jvm::*;
//! use classflow::util::Offset;
//!
//! # fn analyze() -> Result<(), Error> {
//! let method = MethodContext {
//!     owner: BinaryName::from_string(String::from("me/alec/Util")).unwrap(),
//!     name: UnqualifiedName::from_string(String::from("max")).unwrap(),
//!     descriptor: MethodDescriptor::parse("(II)I")?,
//!     is_static: true,
//! };
//!
//! let bytecode = [
//!     0x1a,             //  0: iload_0
//!     0x1b,             //  1: iload_1
//!     0xa4, 0x00, 0x07, //  2: if_icmple 9
//!     0x1a,             //  5: iload_0
//!     0xa7, 0x00, 0x04, //  6: goto 10
//!     0x1b,             //  9: iload_1
//!     0xac,             // 10: ireturn
//! ];
//! let code = BytecodeStream::new(&bytecode)?;
//! let constants = ConstantTable::new();
//!
//! let analysis = Analyzer::new(&method, &code, &[], &constants).analyze()?;
//! let before_return = analysis.frame_before(Offset(10)).unwrap();
//! assert_eq!(before_return.peek(), Ok(&VerificationType::Integer));
//! # Ok(())
//! # }
//! # analyze().unwrap();
//! ```

pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use descriptors::*;
pub use errors::*;
pub use names::*;
