//! Error types for the storage layer.

use complio_license::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// License not found.
    #[error("license not found: {0}")]
    NotFound(String),

    /// Unique key violated.
    #[error("license already exists: {0}")]
    Duplicate(String),

    /// A stored row could not be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Returns true if SQLite rejected a write on a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => StoreError::NotFound(key),
            StorageError::Duplicate(key) => StoreError::Conflict(key),
            StorageError::Serialization(e) => StoreError::Serialization(e.to_string()),
            StorageError::InvalidData(msg) => StoreError::Serialization(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
