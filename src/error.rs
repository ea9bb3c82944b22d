//! Error types for the xrefmap library.

use thiserror::Error;

/// Errors that can occur during xref mapping operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parse error occurred while reading input data.
    #[error("{0}")]
    Parse(String),

    /// A species, source, or method name that could not be resolved.
    #[error("{0}")]
    Config(String),

    /// A validation constraint was violated.
    #[error("{0}")]
    Validation(String),
}
