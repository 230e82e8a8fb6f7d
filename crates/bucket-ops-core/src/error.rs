//! Error types for the bucket-ops core library.

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bucket-ops library.
///
/// Only operation-wide failures travel through this type. Failures that
/// concern a single key of a bulk call are reported as data
/// (`StatResult`, `DeleteOutcome`) and never show up here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The worker pool stopped accepting work
    #[error("Worker pool is shut down")]
    PoolShutdown,

    /// A work unit panicked while running
    #[error("Work unit panicked: {0}")]
    WorkerPanic(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is the result of a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Missing objects, rejected credentials, bad configuration and
    /// cancellation are final; backend and I/O failures are assumed to be
    /// transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_retryable(),
            Error::Io(_) => true,
            Error::Config(_)
            | Error::Cancelled
            | Error::PoolShutdown
            | Error::WorkerPanic(_)
            | Error::Serialization(_)
            | Error::Internal(_) => false,
        }
    }
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Credentials were rejected by the backend
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Storage backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend answered a ranged read with an unexpected status
    #[error("Unexpected status {status} for {key}")]
    UnexpectedStatus { key: String, status: u16 },

    /// Invalid path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Backend(_) | StorageError::UnexpectedStatus { .. }
        )
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            object_store::Error::PermissionDenied { path, .. } => {
                StorageError::PermissionDenied(path)
            }
            object_store::Error::Unauthenticated { path, source } => {
                StorageError::Unauthenticated(format!("{}: {}", path, source))
            }
            object_store::Error::InvalidPath { source } => {
                StorageError::InvalidPath(source.to_string())
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        Error::Storage(err.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
