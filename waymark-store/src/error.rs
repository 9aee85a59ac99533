//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open or initialize a store.
    #[error("failed to open store: {0}")]
    Open(String),

    /// A query or statement failed.
    #[error("query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted state could not be recovered.
    #[error("corrupt persisted state: {0}")]
    Corrupt(String),
}
