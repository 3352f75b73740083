//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::driver::{CacheDriver, DriverKind, FlushReport};
pub use crate::errors::{CacheError, CacheResult};
pub use crate::manager::{CacheEnvironment, CacheManager, ProbeOutcome};
pub use crate::namespace::Namespace;
pub use crate::store::MemoryObjectCache;
pub use crate::drivers::{
    EphemeralDriver, NullDriver, ObjectCache, RedisDriver, RelationalDriver, SharedMemoryDriver,
};

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use serde_json::{self, json, Value};
pub use tokio;
