//! Driver selection and degraded-mode behavior, no external services needed

use lms_cache::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn offline_config() -> CacheConfig {
    CacheConfig::new("https://school.example.com".to_string()).without_redis()
}

/// Host object cache that is installed but not backed by anything
#[derive(Debug)]
struct InactiveObjectCache;

#[async_trait]
impl ObjectCache for InactiveObjectCache {
    fn is_active(&self) -> bool {
        false
    }

    async fn get(&self, _group: &str, _key: &str) -> CacheResult<Option<Value>> {
        Ok(None)
    }

    async fn set(
        &self,
        _group: &str,
        _key: &str,
        _value: Value,
        _ttl: Option<Duration>,
    ) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _group: &str, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn increment(&self, _group: &str, _key: &str, _offset: i64) -> CacheResult<i64> {
        Ok(0)
    }

    async fn flush_group(&self, _group: &str) -> CacheResult<u64> {
        Ok(0)
    }
}

/// Driver whose every operation breaks, as a dropped connection would
#[derive(Debug)]
struct BrokenDriver;

#[async_trait]
impl CacheDriver for BrokenDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::RemoteKv
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<Value>> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl_seconds: i64) -> CacheResult<()> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn flush(&self, _namespace: &Namespace) -> CacheResult<FlushReport> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn get_multiple(&self, _keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn set_multiple(
        &self,
        _entries: &[(String, Value)],
        _ttl_seconds: i64,
    ) -> CacheResult<()> {
        Err(CacheError::General("connection reset".to_string()))
    }

    async fn increment(&self, _key: &str, _offset: i64) -> CacheResult<i64> {
        Err(CacheError::General("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_inactive_host_cache_is_skipped() {
    let environment = CacheEnvironment::new().with_object_cache(Arc::new(InactiveObjectCache));
    let cache = CacheManager::initialize(&offline_config(), environment).await;

    assert_eq!(cache.get_driver_name(), "ephemeral");
    assert!(!cache.probe_results()[0].available);
}

#[tokio::test]
async fn test_driver_errors_never_escape() {
    let cache = CacheManager::with_driver(Namespace::new("p_"), Box::new(BrokenDriver), 3600);

    assert_eq!(cache.get_driver_name(), "remote-kv");
    assert_eq!(cache.get("k").await, None);
    assert!(!cache.set("k", &json!(1)).await);
    assert!(!cache.delete("k").await);
    assert!(!cache.exists("k").await);
    assert!(!cache.flush().await);
    assert!(cache.get_multiple(&["k"]).await.is_empty());
    assert!(!cache.set_multiple(&HashMap::from([("k".to_string(), json!(1))])).await);
    assert_eq!(cache.increment("k", 1).await, None);
    assert_eq!(cache.decrement("k", 1).await, None);

    // Recomputed value still reaches the caller
    assert_eq!(cache.remember("k", 60, || async { json!("fresh") }).await, json!("fresh"));
}

#[tokio::test]
async fn test_no_driver_reports_null() {
    let config = offline_config()
        .without_shared_memory()
        .without_relational()
        .without_ephemeral();
    let cache = CacheManager::initialize(&config, CacheEnvironment::new()).await;

    assert_eq!(cache.get_driver_name(), "null");
    assert!(cache.probe_results().is_empty());
    assert!(!cache.set_as("k", &vec![1, 2, 3], 60).await);
    assert_eq!(cache.get_as::<Vec<i32>>("k").await, None);
}

#[tokio::test]
async fn test_expiry_through_manager() {
    let cache = CacheManager::initialize(&offline_config(), CacheEnvironment::new()).await;

    assert!(cache.set_with_ttl("x", &json!(1), 1).await);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(cache.get("x").await, None);
    assert!(!cache.exists("x").await);
}

#[tokio::test]
async fn test_generated_namespace_is_stable() {
    let first = CacheManager::initialize(&offline_config(), CacheEnvironment::new()).await;
    let second = CacheManager::initialize(&offline_config(), CacheEnvironment::new()).await;
    assert_eq!(first.namespace(), second.namespace());

    let other = CacheManager::initialize(
        &CacheConfig::new("https://other.example.com".to_string()).without_redis(),
        CacheEnvironment::new(),
    )
    .await;
    assert_ne!(first.namespace(), other.namespace());
}

#[tokio::test]
async fn test_shared_host_cache_across_managers() {
    let host = Arc::new(MemoryObjectCache::new());
    let environment = CacheEnvironment::new().with_object_cache(host.clone());

    let writer = CacheManager::initialize(&offline_config(), environment.clone()).await;
    let reader = CacheManager::initialize(&offline_config(), environment).await;
    assert_eq!(writer.get_driver_name(), "shared-memory");

    writer.set("course:9:outline", &json!(["intro", "borrowing"])).await;
    assert_eq!(
        reader.get("course:9:outline").await,
        Some(json!(["intro", "borrowing"]))
    );
    assert_eq!(host.len(writer.namespace().as_str()).await, 1);
}
