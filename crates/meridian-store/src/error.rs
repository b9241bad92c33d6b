//! Error types for the instance store.

use thiserror::Error;

/// Errors raised by instance store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Organization id that cannot be used as a partition key.
    #[error("invalid partition: {0:?}")]
    InvalidPartition(String),

    #[error("store configuration error: {0}")]
    Config(String),

    /// Failure reported by a backend that has no more specific variant.
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("failed to acquire store lock")]
    LockError,
}
