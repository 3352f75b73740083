//! Convenience re-exports for common LMS cache usage
//!
//! ```rust
//! use lms_cache::prelude::*;
//! ```

// Core components
pub use crate::core::LmsCache;
pub use crate::errors::LmsCacheError;
pub use crate::global;
pub use crate::migration;

// Re-export centralized config
pub use config::{
    AppConfig, CacheConfig, DatabaseConfig, RedisConfig, RelationalConfig, Serializer,
};

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use async_trait;
pub use sqlx;
pub use sqlx::PgPool;
