//! Error types for the LMS cache crate
//!
//! These cover setup only: building the database pool, the cache table and
//! the process-wide handle. Cache operations themselves never error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LmsCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Invalid cache table name: {0}")]
    InvalidTable(String),

    #[error("Cache handle is not initialized")]
    NotInitialized,

    #[error("Cache handle is already initialized")]
    AlreadyInitialized,
}
