//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure, which can be
//! matched to determine the underlying cause.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Dataset name is not a valid table identifier.
    ///
    /// Table names cannot be bound as SQL parameters, so only
    /// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
    #[error("invalid dataset name: {0:?}")]
    InvalidDatasetName(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}
