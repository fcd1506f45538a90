//! Error types for the blob store and sink collaborators

use std::fmt;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Object or table not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A byte range could not be transferred
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The store answered with a content range we cannot use
    #[error("Invalid content range: {0}")]
    InvalidContentRange(String),

    /// Response body length disagrees with its content range
    #[error("Short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: u64, received: u64 },

    /// A batch was larger than the sink accepts in one call
    #[error("Batch of {size} items exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// The sink kept rejecting items after all retries
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Storage backend unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a not found error
    pub fn not_found<E: fmt::Display>(item: E) -> Self {
        Self::NotFound(item.to_string())
    }

    /// Create a transfer error
    pub fn transfer<E: fmt::Display>(msg: E) -> Self {
        Self::Transfer(msg.to_string())
    }

    /// Create an invalid content range error
    pub fn invalid_content_range<E: fmt::Display>(msg: E) -> Self {
        Self::InvalidContentRange(msg.to_string())
    }

    /// Create a throttled error
    pub fn throttled<E: fmt::Display>(msg: E) -> Self {
        Self::Throttled(msg.to_string())
    }

    /// Create an unavailable error
    pub fn unavailable<E: fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Check if resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
