//! Error types and Result aliases for reindex.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using reindex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reindex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Query construction or parsing error.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// A path is used both as a file and as a directory.
    #[error("path conflict: '{path}' is already a file")]
    PathConflict { path: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Query-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// AND/OR built without operands.
    #[error("{operator} requires at least one operand")]
    EmptyOperands { operator: &'static str },

    /// Malformed query text.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Path registered twice.
    #[error("path '{path}' is already registered")]
    DuplicateRegistration { path: String },

    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// Path cannot be normalized.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Dispatcher no longer accepts callbacks.
    #[error("watch dispatcher is shut down")]
    DispatcherClosed,
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl QueryError {
    /// Create a parse error at the given byte position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

impl WatcherError {
    /// Create a watch-failed error.
    pub fn watch_failed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
