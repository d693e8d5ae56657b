//! Error types for the quote archive.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the quote archive.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A path handed to the core does not exist.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A uniqueness or referential constraint was violated.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store cannot be opened, is corrupted, or is otherwise unusable.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(String),

    /// The ZIP container itself could not be read.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A member name could not be decoded into broker/symbol/session.
    #[error("Malformed member name: {0}")]
    MemberName(String),

    /// A CSV member could not be decoded at all (e.g. unreadable header).
    #[error("CSV error: {0}")]
    Csv(String),

    /// Data error (invalid or out-of-range value).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a not-found error for a path.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound(path.into())
    }

    /// Create a constraint violation error.
    pub fn constraint(msg: impl Into<String>) -> Self {
        Error::ConstraintViolation(msg.into())
    }

    /// Create a storage-unavailable error.
    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Error::StorageUnavailable(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Create an archive error.
    pub fn archive(msg: impl Into<String>) -> Self {
        Error::Archive(msg.into())
    }

    /// Create a member name error.
    pub fn member_name(msg: impl Into<String>) -> Self {
        Error::MemberName(msg.into())
    }

    /// Create a CSV error.
    pub fn csv(msg: impl Into<String>) -> Self {
        Error::Csv(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether a failed quote batch has to stop the whole archive.
    ///
    /// True when the store or the filesystem itself is unusable. A batch the
    /// store merely rejects is logged and counted by the orchestrator instead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::Io(_))
    }
}
