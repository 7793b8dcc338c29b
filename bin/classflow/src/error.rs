use classflow::jvm::{self, DescriptorError};
use std::fmt::{Display, Error as FmtError, Formatter};

/// Ways running the CLI can go wrong
#[derive(Debug)]
pub enum CliError {
    /// A command line argument could not be understood
    Argument { flag: &'static str, message: String },

    /// Descriptor failed to parse
    Descriptor(DescriptorError),

    /// Analysis of the method failed
    Analysis(jvm::Error),
}

impl CliError {
    pub fn argument(flag: &'static str, message: impl Into<String>) -> CliError {
        CliError::Argument {
            flag,
            message: message.into(),
        }
    }
}

impl From<DescriptorError> for CliError {
    fn from(err: DescriptorError) -> CliError {
        CliError::Descriptor(err)
    }
}

impl From<jvm::Error> for CliError {
    fn from(err: jvm::Error) -> CliError {
        CliError::Analysis(err)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match self {
            CliError::Argument { flag, message } => write!(f, "Invalid --{}: {}", flag, message),
            CliError::Descriptor(err) => write!(f, "Invalid descriptor: {}", err),
            CliError::Analysis(err) => write!(f, "Analysis failed: {}", err),
        }
    }
}
