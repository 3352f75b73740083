//! Ephemeral driver
//!
//! Last-resort fallback: entries live in process memory with their own
//! expiry bookkeeping and vanish when the process ends. Counters are
//! updated under the store lock and keep the expiry they were written with.

use crate::driver::{CacheDriver, DriverKind, FlushReport, ttl_duration};
use crate::drivers::shared_memory::ObjectCache;
use crate::errors::CacheResult;
use crate::namespace::Namespace;
use crate::store::MemoryObjectCache;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

const TRANSIENT_GROUP: &str = "transient";

#[derive(Debug)]
pub struct EphemeralDriver {
    store: MemoryObjectCache,
    enabled: bool,
}

impl EphemeralDriver {
    pub fn new(enabled: bool) -> Self {
        Self {
            store: MemoryObjectCache::new(),
            enabled,
        }
    }

    /// Sweep expired entries; reads already skip them
    pub async fn purge_expired(&self) -> u64 {
        self.store.purge_expired().await
    }
}

impl Default for EphemeralDriver {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl CacheDriver for EphemeralDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Ephemeral
    }

    async fn is_available(&self) -> bool {
        self.enabled
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.store.get(TRANSIENT_GROUP, key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> CacheResult<()> {
        self.store
            .set(TRANSIENT_GROUP, key, value.clone(), ttl_duration(ttl_seconds))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.delete(TRANSIENT_GROUP, key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn flush(&self, namespace: &Namespace) -> CacheResult<FlushReport> {
        let deleted = self
            .store
            .remove_prefixed(TRANSIENT_GROUP, namespace.as_str())
            .await;
        Ok(FlushReport::complete(deleted))
    }

    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    async fn set_multiple(
        &self,
        entries: &[(String, Value)],
        ttl_seconds: i64,
    ) -> CacheResult<()> {
        for (key, value) in entries {
            self.set(key, value, ttl_seconds).await?;
        }
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> CacheResult<i64> {
        self.store.increment(TRANSIENT_GROUP, key, offset).await
    }
}
