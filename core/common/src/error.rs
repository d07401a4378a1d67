//! Common error types for objstore.

use thiserror::Error;

/// Top-level error type for object storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested object does not exist.
    ///
    /// Every backend reports absence through this variant rather than a raw
    /// status code, so callers can branch on existence uniformly.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// The backend answered with a non-success status.
    #[error("{operation} failed with status {status}: {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The backend returned an error document for the whole request.
    #[error("Backend error {code}: {message} (request id: {request_id})")]
    Backend {
        code: String,
        message: String,
        request_id: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Network error: {0}")]
    Network(String),

    /// Transferred bytes did not match the declared checksum.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation's context was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation's context deadline passed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Whether this error is the object-not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound(_))
    }

    /// Whether this error came from the caller's context rather than the backend.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
