//! Cache system for the LMS cache core
//!
//! One driver contract ([`CacheDriver`]), four backends probed in priority
//! order (Redis, host shared memory, relational table, ephemeral process
//! memory) plus a null fallback, and a [`CacheManager`] facade that binds
//! to the first available backend and namespaces every key.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod codec;
pub mod driver;
pub mod drivers;
pub mod errors;
pub mod manager;
pub mod namespace;
pub mod prelude;
pub mod store;

// Re-export centralized config
pub use config::{CacheConfig, RedisConfig, RelationalConfig, Serializer};

pub use codec::PayloadCodec;
pub use driver::{CacheDriver, DriverKind, FlushReport};
pub use drivers::{
    EphemeralDriver, NullDriver, ObjectCache, RedisDriver, RelationalDriver, SharedMemoryDriver,
};
pub use errors::{CacheError, CacheResult};
pub use manager::{CacheEnvironment, CacheManager, ProbeOutcome};
pub use namespace::Namespace;
pub use store::MemoryObjectCache;
