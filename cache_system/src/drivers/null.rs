//! Null driver, bound when no real backend is available
//!
//! Reads miss, writes fail with [`CacheError::Disabled`]. The manager treats
//! that as the degraded "no cache" mode rather than a fault.

use crate::driver::{CacheDriver, DriverKind, FlushReport};
use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

#[async_trait]
impl CacheDriver for NullDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Null
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<Value>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl_seconds: i64) -> CacheResult<()> {
        Err(CacheError::Disabled)
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::Disabled)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn flush(&self, _namespace: &Namespace) -> CacheResult<FlushReport> {
        Err(CacheError::Disabled)
    }

    async fn get_multiple(&self, _keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        Ok(HashMap::new())
    }

    async fn set_multiple(
        &self,
        _entries: &[(String, Value)],
        _ttl_seconds: i64,
    ) -> CacheResult<()> {
        Err(CacheError::Disabled)
    }

    async fn increment(&self, _key: &str, _offset: i64) -> CacheResult<i64> {
        Err(CacheError::Disabled)
    }
}
