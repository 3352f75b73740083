//! # LMS Cache
//!
//! Key-value caching core for an LMS: one contract, four backends probed at
//! startup (Redis, host shared memory, a Postgres cache table, ephemeral
//! process memory), a null fallback, and a manager that namespaces keys so
//! deployments sharing one store stay apart.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lms_cache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig {
//!         database: None,
//!         cache: CacheConfig::new("https://school.example.com".to_string()),
//!     };
//!
//!     let lms = LmsCache::new(config, None).await?;
//!     let cache = lms.cache();
//!     println!("Cache driver: {}", cache.get_driver_name());
//!
//!     cache.set("course:42:title", &json!("Intro to Rust")).await;
//!     let enrolled = cache.increment("course:42:enrolled", 1).await;
//!     println!("Enrolled: {:?}", enrolled);
//!
//!     lms.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod errors;
pub mod global;
pub mod migration;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::LmsCache;
pub use crate::errors::LmsCacheError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig};

// Re-export internal crates
pub use cache_system;
pub use config;

// Re-export external dependencies used in public API
pub use sqlx;
pub use async_trait;
