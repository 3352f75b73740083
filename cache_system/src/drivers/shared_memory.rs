//! Shared-memory driver
//!
//! Thin adapter over a host-provided object cache. The host enforces TTL
//! and owns serialization, so values pass through untouched. Entries live
//! in a group named after the namespace, which makes `flush` a single
//! `flush_group` call.

use crate::driver::{CacheDriver, DriverKind, FlushReport, ttl_duration};
use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Object cache supplied by the hosting application
///
/// Implementations must enforce expiry themselves and should make
/// `increment` atomic.
#[async_trait]
pub trait ObjectCache: Send + Sync + Debug {
    /// Whether the cache is actually backed by something right now
    fn is_active(&self) -> bool;

    async fn get(&self, group: &str, key: &str) -> CacheResult<Option<Value>>;

    async fn set(
        &self,
        group: &str,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Returns whether an entry was removed
    async fn delete(&self, group: &str, key: &str) -> CacheResult<bool>;

    async fn increment(&self, group: &str, key: &str, offset: i64) -> CacheResult<i64>;

    /// Remove the whole group, returning how many entries went
    async fn flush_group(&self, group: &str) -> CacheResult<u64>;
}

#[derive(Debug)]
pub struct SharedMemoryDriver {
    cache: Option<Arc<dyn ObjectCache>>,
    group: String,
}

impl SharedMemoryDriver {
    /// `cache` is `None` when the host offers no object cache
    pub fn new(cache: Option<Arc<dyn ObjectCache>>, namespace: &Namespace) -> Self {
        Self {
            cache,
            group: namespace.as_str().to_string(),
        }
    }

    fn cache(&self) -> CacheResult<&Arc<dyn ObjectCache>> {
        self.cache.as_ref().ok_or(CacheError::Disabled)
    }
}

#[async_trait]
impl CacheDriver for SharedMemoryDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::SharedMemory
    }

    async fn is_available(&self) -> bool {
        self.cache.as_ref().is_some_and(|cache| cache.is_active())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.cache()?.get(&self.group, key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> CacheResult<()> {
        self.cache()?
            .set(&self.group, key, value.clone(), ttl_duration(ttl_seconds))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache()?.delete(&self.group, key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn flush(&self, namespace: &Namespace) -> CacheResult<FlushReport> {
        let deleted = self.cache()?.flush_group(namespace.as_str()).await?;
        Ok(FlushReport::complete(deleted))
    }

    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        let cache = self.cache()?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = cache.get(&self.group, key).await? {
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
        let cache = self.cache()?;
        let ttl = ttl_duration(ttl_seconds);
        for (key, value) in entries {
            cache.set(&self.group, key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> CacheResult<i64> {
        self.cache()?.increment(&self.group, key, offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectCache;
    use serde_json::json;

    fn driver(cache: &Arc<MemoryObjectCache>, prefix: &str) -> SharedMemoryDriver {
        SharedMemoryDriver::new(
            Some(cache.clone() as Arc<dyn ObjectCache>),
            &Namespace::new(prefix),
        )
    }

    #[tokio::test]
    async fn test_unavailable_without_host_cache() {
        let driver = SharedMemoryDriver::new(None, &Namespace::new("p_"));
        assert!(!driver.is_available().await);
        assert!(driver.get("p_k").await.is_err());
    }

    #[tokio::test]
    async fn test_flush_only_touches_own_group() {
        let cache = Arc::new(MemoryObjectCache::new());
        let a = driver(&cache, "a_");
        let b = driver(&cache, "b_");
        assert!(a.is_available().await);

        a.set("a_k", &json!(1), 0).await.unwrap();
        b.set("b_k", &json!(2), 0).await.unwrap();

        let report = a.flush(&Namespace::new("a_")).await.unwrap();
        assert_eq!(report, FlushReport::complete(1));
        assert!(!a.exists("a_k").await.unwrap());
        assert_eq!(b.get("b_k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_batch_and_counter() {
        let cache = Arc::new(MemoryObjectCache::new());
        let driver = driver(&cache, "p_");

        driver
            .set_multiple(
                &[("p_x".to_string(), json!("x")), ("p_y".to_string(), json!([1]))],
                60,
            )
            .await
            .unwrap();
        let found = driver
            .get_multiple(&["p_x".to_string(), "p_missing".to_string(), "p_y".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["p_y"], json!([1]));

        assert_eq!(driver.increment("p_n", 5).await.unwrap(), 5);
        assert_eq!(driver.decrement("p_n", 2).await.unwrap(), 3);
    }
}
