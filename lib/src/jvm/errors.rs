use super::code::ExceptionHandler;
use super::DescriptorError;
use super::verifier::VerificationType;
use crate::util::Offset;
use std::fmt::{Display, Error as FmtError, Formatter};

/// Reasons the analysis of a method can be aborted
///
/// None of these are meant to be recovered from: they either signal malformed input (bytecode
/// that no compiler would have produced) or a bug in one of the collaborators feeding the analysis
/// (the decoder or the constant resolver). Either way, no frames for the method are published.
#[derive(Debug)]
pub enum Error {
    /// An instruction could not be applied to the frame before it
    InvariantViolated {
        offset: Offset,
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// The opcode is not one that the analysis knows how to model (eg. `jsr` or `ret`)
    UnsupportedOpcode { offset: Offset, opcode: u8 },

    /// The code ends in the middle of an instruction, or its operands are malformed (eg. a
    /// `tableswitch` with `high < low`)
    TruncatedInstruction(Offset),

    /// A jump lands somewhere that isn't the start of an instruction (targets before the start of
    /// the code are reported as `Offset(0)`)
    InvalidJumpTarget { offset: Offset, target: Offset },

    /// The instruction at this offset falls through past the end of the code
    FellOffCode(Offset),

    /// There is no frame available at this offset when one is needed
    MissingFrame(Offset),

    /// An exception table entry has out-of-bounds or misaligned offsets
    InvalidExceptionHandler(ExceptionHandler),

    /// An operand of the instruction at this offset could not be resolved
    UnresolvedConstant {
        offset: Offset,
        kind: VerifierErrorKind,
    },

    /// A descriptor string could not be parsed
    BadDescriptor(DescriptorError),

    /// The code array is longer than the 65535 bytes a method body may have
    CodeTooLong(usize),
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Error {
        Error::BadDescriptor(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            Error::InvariantViolated {
                offset,
                instruction,
                kind,
            } => write!(f, "{} at {} is invalid: {}", instruction, offset.0, kind),
            Error::UnsupportedOpcode { offset, opcode } => {
                write!(f, "unsupported opcode 0x{:02x} at {}", opcode, offset.0)
            }
            Error::TruncatedInstruction(offset) => {
                write!(f, "truncated or malformed instruction at {}", offset.0)
            }
            Error::InvalidJumpTarget { offset, target } => write!(
                f,
                "jump at {} to {} does not land on an instruction",
                offset.0, target.0
            ),
            Error::FellOffCode(offset) => {
                write!(f, "instruction at {} falls off the end of the code", offset.0)
            }
            Error::MissingFrame(offset) => write!(f, "no frame is known at {}", offset.0),
            Error::InvalidExceptionHandler(handler) => write!(
                f,
                "exception handler {}..{} -> {} has invalid offsets",
                handler.start_pc.0, handler.end_pc.0, handler.handler_pc.0
            ),
            Error::UnresolvedConstant { offset, kind } => {
                write!(f, "operand of instruction at {} is unresolved: {}", offset.0, kind)
            }
            Error::BadDescriptor(err) => write!(f, "bad descriptor: {}", err),
            Error::CodeTooLong(length) => write!(f, "code is {} bytes long", length),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifierErrorKind {
    /// Tried to pop from an empty operand stack
    EmptyStack,

    /// Value on the stack has the wrong category
    InvalidWidth(usize),

    /// Local variable is out of range, unset, or the second half of a `long`/`double`
    InvalidLocal(u16),

    /// Value has the wrong type
    InvalidType {
        expected: VerificationType,
        found: VerificationType,
    },

    /// Value should be a reference type (including `null` and uninitialized types)
    NotReference(VerificationType),

    /// Value should be an array type (or `null`)
    NotArrayType(VerificationType),

    /// Constructor was called on something that isn't uninitialized
    NotUninitialized(VerificationType),

    /// Constant pool index has no entry
    MissingConstant(u16),

    /// Constant pool index points at the wrong kind of entry
    WrongConstantKind(u16),

    BadDescriptor(DescriptorError),
}

impl Display for VerifierErrorKind {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            VerifierErrorKind::EmptyStack => f.write_str("operand stack is empty"),
            VerifierErrorKind::InvalidWidth(width) => {
                write!(f, "expected a value {} word(s) wide", width)
            }
            VerifierErrorKind::InvalidLocal(index) => {
                write!(f, "local {} holds no usable value", index)
            }
            VerifierErrorKind::InvalidType { expected, found } => {
                write!(f, "expected {} but found {}", expected, found)
            }
            VerifierErrorKind::NotReference(found) => {
                write!(f, "expected a reference but found {}", found)
            }
            VerifierErrorKind::NotArrayType(found) => {
                write!(f, "expected an array but found {}", found)
            }
            VerifierErrorKind::NotUninitialized(found) => {
                write!(f, "expected an uninitialized reference but found {}", found)
            }
            VerifierErrorKind::MissingConstant(index) => {
                write!(f, "constant pool has no entry {}", index)
            }
            VerifierErrorKind::WrongConstantKind(index) => {
                write!(f, "constant pool entry {} has the wrong kind", index)
            }
            VerifierErrorKind::BadDescriptor(err) => write!(f, "bad descriptor: {}", err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::BinaryName;

    #[test]
    fn messages() {
        let err = Error::InvariantViolated {
            offset: Offset(3),
            instruction: String::from("Regular(IAdd)"),
            kind: VerifierErrorKind::InvalidType {
                expected: VerificationType::Integer,
                found: VerificationType::Float,
            },
        };
        assert_eq!(
            err.to_string(),
            format!(
                "Regular(IAdd) at 3 is invalid: expected {} but found {}",
                VerificationType::Integer,
                VerificationType::Float
            )
        );
        assert_eq!(
            Error::UnsupportedOpcode {
                offset: Offset(0),
                opcode: 0xa8
            }
            .to_string(),
            "unsupported opcode 0xa8 at 0"
        );
        assert_eq!(
            Error::InvalidExceptionHandler(ExceptionHandler {
                start_pc: Offset(0),
                end_pc: Offset(4),
                handler_pc: Offset(9),
                catch_type: Some(BinaryName::THROWABLE),
            })
            .to_string(),
            "exception handler 0..4 -> 9 has invalid offsets"
        );
        assert_eq!(
            Error::UnresolvedConstant {
                offset: Offset(5),
                kind: VerifierErrorKind::MissingConstant(7)
            }
            .to_string(),
            "operand of instruction at 5 is unresolved: constant pool has no entry 7"
        );
    }
}
