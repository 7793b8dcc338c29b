use crate::jvm::BinaryName;
use crate::util::Offset;

/// Entry in the exception table of a method
///
/// If an exception is thrown by an instruction in `start_pc..end_pc` and it is an instance of
/// `catch_type`, control transfers to `handler_pc` with a stack holding only the exception.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_pc: Offset,

    /// End of the protected range (exclusive)
    pub end_pc: Offset,

    /// Start of the handler
    pub handler_pc: Offset,

    /// Type of exception caught (`None` catches everything)
    pub catch_type: Option<BinaryName>,
}

impl ExceptionHandler {
    /// Class of the exception value on the stack when the handler starts
    pub fn caught_class(&self) -> BinaryName {
        self.catch_type.clone().unwrap_or(BinaryName::THROWABLE)
    }
}
