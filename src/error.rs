//! Error types for WACZ container access.
//!
//! All fallible operations in this crate return [`Result<T>`]. The
//! [`Error`] enum distinguishes container-level corruption from lookup
//! misses, I/O failures, and caller mistakes, so hosts can decide what is
//! retryable and what means the archive itself is bad.

use std::io;

use thiserror::Error;

/// The error type for all WACZ operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The container is corrupt, truncated, or missing a required piece
    /// (bad ZIP magic, inflate failure, no index file).
    #[error("container error: {0}")]
    Container(String),

    /// A requested entry path or capture does not exist in the archive.
    #[error("not found: {0}")]
    NotFound(String),

    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Text decoding failed for an entry that was expected to be UTF-8.
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON parsing failed for an entry read via `get_json`.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The caller omitted a required option or passed an unusable value.
    #[error("usage error: {0}")]
    Usage(String),

    /// The operation was cancelled through the archive's cancellation
    /// token.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn container(reason: impl Into<String>) -> Self {
        Error::Container(reason.into())
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub(crate) fn usage(reason: impl Into<String>) -> Self {
        Error::Usage(reason.into())
    }

    /// Returns `true` if the error indicates the container itself is
    /// damaged, as opposed to a miss or a transient failure.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Container(_))
    }

    /// Returns `true` for misses that a caller may treat as "absent"
    /// rather than as a hard failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// A specialized `Result` type for WACZ operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn container_classification() {
        let err = Error::container("truncated central directory");
        assert!(err.is_corruption());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("truncated central directory"));
    }

    #[test]
    fn not_found_classification() {
        let err = Error::not_found("datapackage.json");
        assert!(err.is_not_found());
        assert!(!err.is_corruption());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
