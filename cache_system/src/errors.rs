//! Error types for cache operations
//!
//! Drivers report failures through these variants; the manager logs them
//! and turns them into the contract's failure values, so none of them
//! reach callers of the facade.

use std::time::Duration;
use thiserror::Error;

/// Cache system errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    ConnectionError(#[from] redis::RedisError),

    #[error("Cache table error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Stored value is not an integer: {0}")]
    NotNumeric(String),

    #[error("Counter would overflow: {0}")]
    Overflow(String),

    #[error("Value cannot be stored with this serializer: {0}")]
    UnsupportedValue(String),

    #[error("Cache is disabled")]
    Disabled,

    #[error("General cache error: {0}")]
    General(String),
}

impl CacheError {
    /// Whether the failure means the cache is simply absent rather than broken
    pub fn is_disabled(&self) -> bool {
        matches!(self, CacheError::Disabled)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
