//! Error types for the sublink CLI.

use std::fmt;

use sublink::SublinkError;

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Error from the sublink client library.
    Link(SublinkError),

    /// Invalid command-line argument (bad hex key, malformed extrinsic, ...).
    InvalidArgument(String),

    /// A watched extrinsic ended in a non-success terminal status.
    Transaction(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Link(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            CliError::Transaction(status) => {
                write!(f, "transaction did not finalize: {}", status)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<SublinkError> for CliError {
    fn from(err: SublinkError) -> Self {
        CliError::Link(err)
    }
}
