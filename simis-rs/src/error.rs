/// Represents the fatal errors that can abort the load of a SIMIS file.
///
/// Only signature mismatches, I/O failures, and explicit caller-requested
/// aborts are fatal. Everything else (unknown tokens, stray brackets,
/// truncated blocks) is recoverable and is reported through the
/// [`Diagnostics`](crate::diagnostics::Diagnostics) sink instead.
#[derive(Debug)]
pub enum SimisError {
    /// The leading header bytes did not match any recognized signature.
    UnrecognizedHeader {
        /// The file being opened.
        file: String,
        /// The literal header characters that were read.
        header: String,
    },
    /// The sub-header did not select a known content kind.
    UnrecognizedSubHeader {
        /// The file being opened.
        file: String,
        /// The literal sub-header characters that were read.
        sub_header: String,
    },
    /// An abort requested by a higher-level loader that knows a block's
    /// content is semantically invalid. Carries file and position context.
    Fatal(String),
    /// Represents an error that occurs during I/O operations.
    Io(std::io::Error),
}

impl std::fmt::Display for SimisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimisError::UnrecognizedHeader { file, header } => {
                write!(f, "Unrecognized header \"{header}\" in {file}")
            }
            SimisError::UnrecognizedSubHeader { file, sub_header } => {
                write!(f, "Unrecognized subHeader \"{sub_header}\" in {file}")
            }
            SimisError::Fatal(message) => write!(f, "{message}"),
            SimisError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for SimisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimisError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Allows automatic conversion from `std::io::Error` to `SimisError`.
impl From<std::io::Error> for SimisError {
    fn from(error: std::io::Error) -> Self {
        SimisError::Io(error)
    }
}
