//! Error types for the interception layer.

use thiserror::Error;

/// Result type for interception-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the interception layer.
///
/// Failures reported by the real filesystem are carried transparently so the
/// caller sees exactly what the underlying primitive reported.
#[derive(Debug, Error)]
pub enum Error {
    /// `set_up` was called while another interceptor is active
    #[error("an interceptor is already active in this process")]
    AlreadyActive,

    /// An option or metadata kind this handle does not support
    #[error("invalid option for this handle: {0}")]
    InvalidOption(String),

    /// Path resolution failed for a load-purpose open
    #[error("path could not be resolved: {0}")]
    NotFound(String),

    /// Passthrough I/O error from the real filesystem
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error raised by the embedder's load hook
    #[error(transparent)]
    Hook(anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_option(kind: impl Into<String>) -> Self {
        Error::InvalidOption(kind.into())
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io) => io,
            other => std::io::Error::other(other),
        }
    }
}
