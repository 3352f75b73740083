//! Cache driver contract
//!
//! Every storage backend implements [`CacheDriver`]. Keys handed to a
//! driver are already namespaced by the manager; the namespace itself is
//! passed to [`CacheDriver::flush`] so a flush never leaves its tenant.
//!
//! # TTL
//!
//! All drivers share one rule: a TTL greater than zero expires the entry
//! after that many seconds, a TTL of zero or below stores it without expiry.

use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::time::Duration;

/// Stable identifier of a driver implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    RemoteKv,
    SharedMemory,
    Relational,
    Ephemeral,
    Null,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::RemoteKv => "remote-kv",
            DriverKind::SharedMemory => "shared-memory",
            DriverKind::Relational => "relational",
            DriverKind::Ephemeral => "ephemeral",
            DriverKind::Null => "null",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a namespace flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries removed, when the driver can count them
    pub deleted: u64,
    /// False when the driver stopped early (scan ceiling reached)
    pub complete: bool,
}

impl FlushReport {
    pub fn complete(deleted: u64) -> Self {
        Self {
            deleted,
            complete: true,
        }
    }

    pub fn partial(deleted: u64) -> Self {
        Self {
            deleted,
            complete: false,
        }
    }
}

/// Expiry for a TTL in seconds, `None` meaning the entry never expires
pub fn ttl_duration(ttl_seconds: i64) -> Option<Duration> {
    if ttl_seconds > 0 {
        Some(Duration::from_secs(ttl_seconds as u64))
    } else {
        None
    }
}

/// Operations every cache backend supports
#[async_trait]
pub trait CacheDriver: Send + Sync + Debug {
    fn kind(&self) -> DriverKind;

    /// Live capability check used while probing
    async fn is_available(&self) -> bool;

    /// `Ok(None)` when the key is absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Unconditional overwrite
    async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> CacheResult<()>;

    /// Idempotent: deleting a missing key succeeds
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// True iff `get` would return a value
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key of `namespace` and nothing else
    async fn flush(&self, namespace: &Namespace) -> CacheResult<FlushReport>;

    /// Hits only; missing keys are omitted from the map
    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Value>>;

    async fn set_multiple(&self, entries: &[(String, Value)], ttl_seconds: i64)
    -> CacheResult<()>;

    /// Add `offset` to an integer entry, creating it from zero when missing
    async fn increment(&self, key: &str, offset: i64) -> CacheResult<i64>;

    async fn decrement(&self, key: &str, offset: i64) -> CacheResult<i64> {
        let offset = offset
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
        self.increment(key, offset).await
    }

    /// Release connections or other held resources
    async fn close(&self) {}
}
