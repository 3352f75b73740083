//! Cache manager implementation
//!
//! The manager probes drivers once, binds to the first available one and
//! forwards every call to it with the key namespaced. Its public methods
//! never fail: driver errors are logged and turned into misses or `false`.

use crate::debug_log;
use crate::driver::{CacheDriver, DriverKind};
use crate::drivers::{
    EphemeralDriver, NullDriver, ObjectCache, RedisDriver, RelationalDriver, SharedMemoryDriver,
};
use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use config::CacheConfig;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// Host collaborators the drivers may need
#[derive(Debug, Clone, Default)]
pub struct CacheEnvironment {
    /// Shared object cache offered by the host, if any
    pub object_cache: Option<Arc<dyn ObjectCache>>,
    /// Database holding the cache table, if any
    pub pool: Option<PgPool>,
}

impl CacheEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_cache(mut self, cache: Arc<dyn ObjectCache>) -> Self {
        self.object_cache = Some(cache);
        self
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

/// Result of probing one candidate driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub driver: DriverKind,
    pub available: bool,
}

/// Facade over the bound cache driver
pub struct CacheManager {
    driver: Box<dyn CacheDriver>,
    namespace: Namespace,
    default_ttl: i64,
    probes: Vec<ProbeOutcome>,
}

impl Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("driver", &self.driver.kind())
            .field("namespace", &self.namespace.as_str())
            .field("default_ttl", &self.default_ttl)
            .field("probes", &self.probes)
            .finish()
    }
}

impl CacheManager {
    /// Probe drivers in priority order and bind to the first available one.
    ///
    /// Order: remote KV, shared memory, relational table, ephemeral. Disabled
    /// drivers are skipped; when nothing answers, the null driver is bound.
    pub async fn initialize(config: &CacheConfig, environment: CacheEnvironment) -> Self {
        let namespace = Namespace::resolve(config.prefix.as_deref(), &config.site_url);
        let mut probes = Vec::new();

        for candidate in Self::candidates(config, &environment, &namespace) {
            let kind = candidate.kind();
            let available = candidate.is_available().await;
            tracing::debug!(driver = kind.as_str(), available, "Probed cache driver");
            probes.push(ProbeOutcome {
                driver: kind,
                available,
            });

            if available {
                tracing::info!(
                    driver = kind.as_str(),
                    namespace = %namespace,
                    "Cache driver selected"
                );
                return Self {
                    driver: candidate,
                    namespace,
                    default_ttl: config.default_ttl,
                    probes,
                };
            }
        }

        tracing::warn!(
            namespace = %namespace,
            "No cache driver available, caching disabled"
        );
        Self {
            driver: Box::new(NullDriver),
            namespace,
            default_ttl: config.default_ttl,
            probes,
        }
    }

    /// Bind directly to `driver`, skipping the probe
    pub fn with_driver(
        namespace: Namespace,
        driver: Box<dyn CacheDriver>,
        default_ttl: i64,
    ) -> Self {
        Self {
            driver,
            namespace,
            default_ttl,
            probes: Vec::new(),
        }
    }

    fn candidates(
        config: &CacheConfig,
        environment: &CacheEnvironment,
        namespace: &Namespace,
    ) -> Vec<Box<dyn CacheDriver>> {
        let mut candidates: Vec<Box<dyn CacheDriver>> = Vec::with_capacity(4);

        if config.redis.enabled {
            match RedisDriver::new(&config.redis) {
                Ok(driver) => candidates.push(Box::new(driver)),
                Err(e) => tracing::error!(
                    driver = DriverKind::RemoteKv.as_str(),
                    error = %e,
                    "Invalid Redis connection settings"
                ),
            }
        }

        if config.shared_memory.enabled {
            candidates.push(Box::new(SharedMemoryDriver::new(
                environment.object_cache.clone(),
                namespace,
            )));
        }

        if config.relational.enabled {
            match RelationalDriver::new(environment.pool.clone(), &config.relational.table) {
                Ok(driver) => candidates.push(Box::new(driver)),
                Err(e) => tracing::error!(
                    driver = DriverKind::Relational.as_str(),
                    error = %e,
                    "Invalid cache table settings"
                ),
            }
        }

        if config.ephemeral.enabled {
            candidates.push(Box::new(EphemeralDriver::new(true)));
        }

        candidates
    }

    /// Log a driver failure and swallow it
    fn absorb<T>(&self, operation: &str, key: Option<&str>, result: CacheResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(CacheError::Disabled) => {
                tracing::debug!(
                    driver = self.driver.kind().as_str(),
                    operation,
                    key = key.unwrap_or_default(),
                    "Cache disabled, operation skipped"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    driver = self.driver.kind().as_str(),
                    operation,
                    key = key.unwrap_or_default(),
                    error = %e,
                    "Cache operation failed"
                );
                None
            }
        }
    }

    /// Cached value, `None` when absent, expired, or unreadable
    pub async fn get(&self, key: &str) -> Option<Value> {
        let result = self.driver.get(&self.namespace.key(key)).await;
        self.absorb("get", Some(key), result).flatten()
    }

    /// Cached value converted to `T`; a shape mismatch counts as a miss
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        self.absorb(
            "get_as",
            Some(key),
            serde_json::from_value(value).map_err(CacheError::from),
        )
    }

    /// Store with the configured default TTL
    pub async fn set(&self, key: &str, value: &Value) -> bool {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Store with `ttl_seconds`; zero or below stores without expiry
    pub async fn set_with_ttl(&self, key: &str, value: &Value, ttl_seconds: i64) -> bool {
        let result = self
            .driver
            .set(&self.namespace.key(key), value, ttl_seconds)
            .await;
        self.absorb("set", Some(key), result).is_some()
    }

    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: i64) -> bool {
        let encoded = serde_json::to_value(value).map_err(CacheError::from);
        match self.absorb("set_as", Some(key), encoded) {
            Some(value) => self.set_with_ttl(key, &value, ttl_seconds).await,
            None => false,
        }
    }

    /// True once the key is gone, including when it never existed
    pub async fn delete(&self, key: &str) -> bool {
        let result = self.driver.delete(&self.namespace.key(key)).await;
        self.absorb("delete", Some(key), result).is_some()
    }

    pub async fn exists(&self, key: &str) -> bool {
        let result = self.driver.exists(&self.namespace.key(key)).await;
        self.absorb("exists", Some(key), result).unwrap_or(false)
    }

    /// Remove this namespace's entries. A flush cut short by the scan
    /// ceiling still reports success for the part it removed.
    pub async fn flush(&self) -> bool {
        let result = self.driver.flush(&self.namespace).await;
        match self.absorb("flush", None, result) {
            Some(report) => {
                tracing::debug!(
                    driver = self.driver.kind().as_str(),
                    deleted = report.deleted,
                    complete = report.complete,
                    "Cache namespace flushed"
                );
                true
            }
            None => false,
        }
    }

    /// Hits keyed by caller key; misses are left out
    pub async fn get_multiple<K: AsRef<str>>(&self, keys: &[K]) -> HashMap<String, Value> {
        let full_keys: Vec<String> = keys
            .iter()
            .map(|key| self.namespace.key(key.as_ref()))
            .collect();

        let result = self.driver.get_multiple(&full_keys).await;
        let Some(found) = self.absorb("get_multiple", None, result) else {
            return HashMap::new();
        };

        found
            .into_iter()
            .filter_map(|(full_key, value)| {
                self.namespace
                    .strip(&full_key)
                    .map(|key| (key.to_string(), value))
            })
            .collect()
    }

    pub async fn set_multiple(&self, entries: &HashMap<String, Value>) -> bool {
        self.set_multiple_with_ttl(entries, self.default_ttl).await
    }

    pub async fn set_multiple_with_ttl(
        &self,
        entries: &HashMap<String, Value>,
        ttl_seconds: i64,
    ) -> bool {
        let namespaced: Vec<(String, Value)> = entries
            .iter()
            .map(|(key, value)| (self.namespace.key(key), value.clone()))
            .collect();

        let result = self.driver.set_multiple(&namespaced, ttl_seconds).await;
        self.absorb("set_multiple", None, result).is_some()
    }

    /// New counter value, `None` on failure
    pub async fn increment(&self, key: &str, offset: i64) -> Option<i64> {
        let result = self.driver.increment(&self.namespace.key(key), offset).await;
        self.absorb("increment", Some(key), result)
    }

    pub async fn decrement(&self, key: &str, offset: i64) -> Option<i64> {
        let result = self.driver.decrement(&self.namespace.key(key), offset).await;
        self.absorb("decrement", Some(key), result)
    }

    /// Cached value, or compute it with `fallback` and cache the result.
    ///
    /// A failed write does not change the returned value.
    pub async fn remember<F, Fut>(&self, key: &str, ttl_seconds: i64, fallback: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        if let Some(cached) = self.get(key).await {
            return cached;
        }

        let value = fallback().await;
        self.set_with_ttl(key, &value, ttl_seconds).await;
        value
    }

    pub fn get_driver_name(&self) -> &'static str {
        self.driver.kind().as_str()
    }

    pub fn driver_kind(&self) -> DriverKind {
        self.driver.kind()
    }

    /// Live availability of the bound driver
    pub async fn is_available(&self) -> bool {
        self.driver.is_available().await
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Probe outcomes from initialization, in probing order
    pub fn probe_results(&self) -> &[ProbeOutcome] {
        &self.probes
    }

    /// Release the bound driver's resources
    pub async fn shutdown(&self) {
        debug_log!("Shutting down cache driver {}", self.driver.kind());
        self.driver.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectCache;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn offline_config() -> CacheConfig {
        CacheConfig::new("https://school.example.com".to_string()).without_redis()
    }

    #[tokio::test]
    async fn test_falls_through_to_ephemeral() {
        let manager = CacheManager::initialize(&offline_config(), CacheEnvironment::new()).await;

        assert_eq!(manager.get_driver_name(), "ephemeral");
        assert!(manager.is_available().await);
        assert_eq!(
            manager.probe_results(),
            &[
                ProbeOutcome {
                    driver: DriverKind::SharedMemory,
                    available: false,
                },
                ProbeOutcome {
                    driver: DriverKind::Relational,
                    available: false,
                },
                ProbeOutcome {
                    driver: DriverKind::Ephemeral,
                    available: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_prefers_shared_memory_when_host_offers_it() {
        let environment =
            CacheEnvironment::new().with_object_cache(Arc::new(MemoryObjectCache::new()));
        let manager = CacheManager::initialize(&offline_config(), environment).await;

        assert_eq!(manager.get_driver_name(), "shared-memory");
        assert_eq!(manager.probe_results().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_skipped() {
        let mut config = CacheConfig::new("https://school.example.com".to_string());
        config.redis.port = 1;
        config.redis.connect_timeout_ms = 300;

        let manager = CacheManager::initialize(&config, CacheEnvironment::new()).await;
        assert_eq!(manager.probe_results()[0].driver, DriverKind::RemoteKv);
        assert!(!manager.probe_results()[0].available);
        assert_eq!(manager.get_driver_name(), "ephemeral");
    }

    #[tokio::test]
    async fn test_graceful_degradation_with_no_driver() {
        let config = offline_config().without_shared_memory().without_ephemeral();
        let manager = CacheManager::initialize(&config, CacheEnvironment::new()).await;

        assert_eq!(manager.get_driver_name(), "null");
        assert!(!manager.is_available().await);
        assert_eq!(manager.get("k").await, None);
        assert!(!manager.set("k", &json!(1)).await);
        assert!(!manager.delete("k").await);
        assert!(!manager.exists("k").await);
        assert!(!manager.flush().await);
        assert!(manager.get_multiple(&["a", "b"]).await.is_empty());
        assert!(!manager.set_multiple(&HashMap::from([("a".to_string(), json!(1))])).await);
        assert_eq!(manager.increment("n", 1).await, None);
        assert_eq!(manager.decrement("n", 1).await, None);
    }

    #[tokio::test]
    async fn test_namespace_isolation_on_shared_store() {
        let store = Arc::new(MemoryObjectCache::new());
        let environment = CacheEnvironment::new().with_object_cache(store.clone());
        let config_a = offline_config().with_prefix("tenant_a_");
        let config_b = offline_config().with_prefix("tenant_b_");
        let a = CacheManager::initialize(&config_a, environment.clone()).await;
        let b = CacheManager::initialize(&config_b, environment).await;

        assert!(a.set("k", &json!("v1")).await);
        assert!(b.set("k", &json!("v2")).await);
        assert_eq!(a.get("k").await, Some(json!("v1")));
        assert_eq!(b.get("k").await, Some(json!("v2")));
    }

    #[tokio::test]
    async fn test_flush_scope() {
        let store = Arc::new(MemoryObjectCache::new());
        let environment = CacheEnvironment::new().with_object_cache(store);
        let config_p1 = offline_config().with_prefix("p1_");
        let config_p2 = offline_config().with_prefix("p2_");
        let p1 = CacheManager::initialize(&config_p1, environment.clone()).await;
        let p2 = CacheManager::initialize(&config_p2, environment).await;

        p1.set("a", &json!(1)).await;
        p1.set("b", &json!(2)).await;
        p2.set("c", &json!(3)).await;

        assert!(p1.flush().await);
        assert_eq!(p1.get("a").await, None);
        assert_eq!(p1.get("b").await, None);
        assert_eq!(p2.get("c").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_multi_get_partial_hit() {
        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        manager.set("k1", &json!("v1")).await;
        manager.set("k3", &json!("v3")).await;

        let found = manager.get_multiple(&["k1", "k2", "k3"]).await;
        assert_eq!(
            found,
            HashMap::from([
                ("k1".to_string(), json!("v1")),
                ("k3".to_string(), json!("v3")),
            ])
        );
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Progress {
            lesson: u32,
            completed: bool,
        }

        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        let progress = Progress { lesson: 3, completed: false };
        assert!(manager.set_as("progress:7", &progress, 60).await);
        assert_eq!(manager.get_as::<Progress>("progress:7").await, Some(progress));

        // Wrong shape reads as a miss
        manager.set("progress:8", &json!("oops")).await;
        assert_eq!(manager.get_as::<Progress>("progress:8").await, None);
    }

    #[tokio::test]
    async fn test_counters_and_delete() {
        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        assert_eq!(manager.increment("views", 1).await, Some(1));
        assert_eq!(manager.increment("views", 10).await, Some(11));
        assert_eq!(manager.decrement("views", 1).await, Some(10));
        assert_eq!(manager.get("views").await, Some(json!(10)));

        assert!(manager.delete("views").await);
        assert!(manager.delete("views").await);
        assert!(!manager.exists("views").await);
    }

    #[tokio::test]
    async fn test_remember_computes_once() {
        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = manager
                .remember("expensive", 60, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    json!({"courses": 12})
                })
                .await;
            assert_eq!(value, json!({"courses": 12}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_accepted() {
        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        assert!(manager.set_with_ttl("k", &json!(1), i64::MAX).await);
        assert_eq!(manager.get("k").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_counter_keeps_ttl_and_stops_at_overflow() {
        let manager = CacheManager::with_driver(
            Namespace::new("p_"),
            Box::new(EphemeralDriver::default()),
            3600,
        );
        assert!(manager.set_with_ttl("c", &json!(5), 1).await);
        assert_eq!(manager.increment("c", 1).await, Some(6));
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert_eq!(manager.get("c").await, None);

        assert!(manager.set("max", &json!(i64::MAX)).await);
        assert_eq!(manager.increment("max", 1).await, None);
        assert_eq!(manager.get("max").await, Some(json!(i64::MAX)));
    }

    #[tokio::test]
    async fn test_remember_without_cache_still_returns_value() {
        let manager =
            CacheManager::with_driver(Namespace::new("p_"), Box::new(NullDriver), 3600);
        let value = manager.remember("k", 60, || async { json!(42) }).await;
        assert_eq!(value, json!(42));
    }
}
