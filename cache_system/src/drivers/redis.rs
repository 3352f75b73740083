//! Remote KV driver (Redis)
//!
//! Values are serialized by [`PayloadCodec`] and stored as plain strings;
//! nothing relies on a store-side serializer, so counters written by
//! `INCRBY` stay readable through `get` and vice versa.
//!
//! The connection is opened lazily, bounded by the configured connect
//! timeout, and owned by this driver alone. Broken connections are dropped
//! so the next call reconnects; no call retries on its own.

use crate::codec::PayloadCodec;
use crate::driver::{CacheDriver, DriverKind, FlushReport};
use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use config::RedisConfig;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::RwLock;

/// Largest `EX` the server accepts with room for its clock added on top
const MAX_EXPIRE_SECONDS: i64 = i64::MAX / 1000 / 2;

/// `EX` argument for a TTL; `None` stores without expiry
fn expire_seconds(ttl_seconds: i64) -> Option<u64> {
    (ttl_seconds > 0 && ttl_seconds <= MAX_EXPIRE_SECONDS).then_some(ttl_seconds as u64)
}

/// Redis-backed cache driver
pub struct RedisDriver {
    client: Client,
    codec: PayloadCodec,
    connect_timeout: Duration,
    scan_batch_size: usize,
    max_scan_iterations: usize,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl Debug for RedisDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = match self.connection.try_read() {
            Ok(slot) => {
                if slot.is_some() {
                    "connected"
                } else {
                    "no_connection"
                }
            }
            Err(_) => "lock_error",
        };

        f.debug_struct("RedisDriver")
            .field("connection", &self.client.get_connection_info().addr)
            .field("serializer", &self.codec.serializer())
            .field("connect_timeout", &self.connect_timeout)
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisDriver {
    /// Build the driver; no connection is made until first use
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = match &config.url {
            Some(url) => Client::open(url.as_str())?,
            None => {
                let mut info = (config.host.as_str(), config.port).into_connection_info()?;
                info.redis.db = config.database;
                info.redis.password = config.password.clone();
                Client::open(info)?
            }
        };

        Ok(Self {
            client,
            codec: PayloadCodec::new(config.serializer),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            scan_batch_size: config.scan_batch_size.max(1),
            max_scan_iterations: config.max_scan_iterations.max(1),
            connection: RwLock::new(None),
        })
    }

    /// Get or open the connection
    async fn get_connection(&self) -> CacheResult<MultiplexedConnection> {
        if let Some(connection) = self.connection.read().await.as_ref() {
            return Ok(connection.clone());
        }

        let mut slot = self.connection.write().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let connection = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.connect_timeout))??;

        debug_log!("Redis connection opened: {:?}", self.client.get_connection_info().addr);
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// Convert a command result, dropping the connection if it broke
    async fn settle<T>(&self, result: RedisResult<T>) -> CacheResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    debug_log!("Dropping broken Redis connection: {}", e);
                    self.connection.write().await.take();
                }
                Err(CacheError::from(e))
            }
        }
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> CacheResult<String> {
        let mut conn = self.get_connection().await?;
        let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        self.settle(pong).await
    }

    /// Remaining TTL in seconds (-1 without expiry, -2 when missing)
    pub async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.get_connection().await?;
        let ttl: RedisResult<i64> = conn.ttl(key).await;
        self.settle(ttl).await
    }

    fn decode(&self, payload: Option<String>) -> CacheResult<Option<Value>> {
        payload.map(|p| self.codec.decode(&p)).transpose()
    }
}

#[async_trait]
impl CacheDriver for RedisDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::RemoteKv
    }

    async fn is_available(&self) -> bool {
        match self.ping().await {
            Ok(_) => true,
            Err(_e) => {
                debug_log!("Redis unavailable: {}", _e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.get_connection().await?;
        let payload: RedisResult<Option<String>> = conn.get(key).await;
        let payload = self.settle(payload).await?;
        self.decode(payload)
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> CacheResult<()> {
        let payload = self.codec.encode(value)?;
        let mut conn = self.get_connection().await?;

        let result: RedisResult<()> = match expire_seconds(ttl_seconds) {
            Some(seconds) => conn.set_ex(key, payload, seconds).await,
            None => conn.set(key, payload).await,
        };
        self.settle(result).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let deleted: RedisResult<i64> = conn.del(key).await;
        self.settle(deleted).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let exists: RedisResult<bool> = conn.exists(key).await;
        self.settle(exists).await
    }

    /// Incremental `SCAN` + `UNLINK`, never a blocking `KEYS`.
    ///
    /// Stops after `max_scan_iterations` rounds; the partial result is
    /// still a success, reported with `complete = false`.
    async fn flush(&self, namespace: &Namespace) -> CacheResult<FlushReport> {
        let pattern = namespace.scan_pattern();
        let mut conn = self.get_connection().await?;
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        for _ in 0..self.max_scan_iterations {
            let scanned: RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_batch_size)
                .query_async(&mut conn)
                .await;
            let (next, keys) = self.settle(scanned).await?;

            if !keys.is_empty() {
                let removed: RedisResult<i64> =
                    redis::cmd("UNLINK").arg(&keys).query_async(&mut conn).await;
                deleted += self.settle(removed).await?.max(0) as u64;
                trace_log!("Flush batch removed {} keys", keys.len());
            }

            if next == 0 {
                return Ok(FlushReport::complete(deleted));
            }
            cursor = next;
        }

        tracing::warn!(
            driver = DriverKind::RemoteKv.as_str(),
            namespace = %namespace,
            deleted,
            max_iterations = self.max_scan_iterations,
            "Flush hit the scan iteration ceiling before finishing"
        );
        Ok(FlushReport::partial(deleted))
    }

    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.get_connection().await?;
        let payloads: RedisResult<Vec<Option<String>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await;
        let payloads = self.settle(payloads).await?;

        let mut found = HashMap::with_capacity(keys.len());
        for (key, payload) in keys.iter().zip(payloads) {
            // One undecodable entry must not sink the batch
            match self.decode(payload) {
                Ok(Some(value)) => {
                    found.insert(key.clone(), value);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    driver = DriverKind::RemoteKv.as_str(),
                    key = %key,
                    error = %e,
                    "Skipping undecodable cache entry"
                ),
            }
        }
        Ok(found)
    }

    /// One `MULTI`/`EXEC` pipeline. Every value is encoded before anything
    /// is sent, so an unencodable value writes nothing.
    async fn set_multiple(
        &self,
        entries: &[(String, Value)],
        ttl_seconds: i64,
    ) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            let payload = self.codec.encode(value)?;
            match expire_seconds(ttl_seconds) {
                Some(seconds) => pipe.set_ex(key, payload, seconds).ignore(),
                None => pipe.set(key, payload).ignore(),
            };
        }

        let mut conn = self.get_connection().await?;
        let result: RedisResult<()> = pipe.query_async(&mut conn).await;
        self.settle(result).await
    }

    async fn increment(&self, key: &str, offset: i64) -> CacheResult<i64> {
        let mut conn = self.get_connection().await?;
        let value: RedisResult<i64> = conn.incr(key, offset).await;
        self.settle(value).await
    }

    async fn decrement(&self, key: &str, offset: i64) -> CacheResult<i64> {
        let mut conn = self.get_connection().await?;
        let value: RedisResult<i64> = conn.decr(key, offset).await;
        self.settle(value).await
    }

    async fn close(&self) {
        if self.connection.write().await.take().is_some() {
            debug_log!("Redis connection released");
        }
    }
}
