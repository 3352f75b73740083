//! Relational table driver (PostgreSQL via sqlx)
//!
//! Entries are rows of a pre-existing table:
//!
//! ```sql
//! CREATE TABLE lms_cache (
//!     cache_key   TEXT PRIMARY KEY,
//!     cache_value TEXT NOT NULL,
//!     expires_at  TIMESTAMPTZ NULL
//! );
//! ```
//!
//! Expired rows are reclaimed lazily: `get` deletes the row it finds
//! expired, and [`RelationalDriver::purge_expired`] sweeps the rest.
//! Upsert atomicity comes from the database; `increment`/`decrement` are a
//! read-modify-write and can lose updates under concurrent callers.

use crate::codec::{PayloadCodec, as_counter};
use crate::debug_log;
use crate::driver::{CacheDriver, DriverKind, FlushReport};
use crate::errors::{CacheError, CacheResult};
use crate::namespace::Namespace;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use config::{Serializer, is_valid_identifier};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;

/// SQL text for one table name, built once
#[derive(Debug, Clone)]
struct Statements {
    select: String,
    select_many: String,
    exists: String,
    upsert: String,
    update_value: String,
    delete: String,
    delete_expired_key: String,
    purge_expired: String,
    flush: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            select: format!(
                "SELECT cache_value, expires_at FROM {} WHERE cache_key = $1",
                table
            ),
            select_many: format!(
                "SELECT cache_key, cache_value FROM {} \
                 WHERE cache_key = ANY($1) AND (expires_at IS NULL OR expires_at > $2)",
                table
            ),
            exists: format!(
                "SELECT EXISTS(SELECT 1 FROM {} \
                 WHERE cache_key = $1 AND (expires_at IS NULL OR expires_at > $2))",
                table
            ),
            upsert: format!(
                "INSERT INTO {} (cache_key, cache_value, expires_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (cache_key) DO UPDATE \
                 SET cache_value = EXCLUDED.cache_value, expires_at = EXCLUDED.expires_at",
                table
            ),
            update_value: format!("UPDATE {} SET cache_value = $2 WHERE cache_key = $1", table),
            delete: format!("DELETE FROM {} WHERE cache_key = $1", table),
            delete_expired_key: format!(
                "DELETE FROM {} WHERE cache_key = $1 \
                 AND expires_at IS NOT NULL AND expires_at <= $2",
                table
            ),
            purge_expired: format!(
                "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= $1",
                table
            ),
            flush: format!(
                "DELETE FROM {} WHERE cache_key LIKE $1 ESCAPE '\\'",
                table
            ),
        }
    }
}

fn expires_at(now: DateTime<Utc>, ttl_seconds: i64) -> Option<DateTime<Utc>> {
    if ttl_seconds <= 0 {
        return None;
    }
    // Beyond the timestamp range the row simply never expires
    TimeDelta::try_seconds(ttl_seconds).and_then(|ttl| now.checked_add_signed(ttl))
}

#[derive(Debug)]
pub struct RelationalDriver {
    pool: Option<PgPool>,
    table: String,
    codec: PayloadCodec,
    sql: Statements,
}

impl RelationalDriver {
    /// `pool` is `None` when no database is configured
    pub fn new(pool: Option<PgPool>, table: &str) -> CacheResult<Self> {
        if !is_valid_identifier(table) {
            return Err(CacheError::General(format!(
                "invalid cache table name: {:?}",
                table
            )));
        }

        Ok(Self {
            pool,
            table: table.to_string(),
            codec: PayloadCodec::new(Serializer::Json),
            sql: Statements::for_table(table),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn pool(&self) -> CacheResult<&PgPool> {
        self.pool.as_ref().ok_or(CacheError::Disabled)
    }

    /// Delete every expired row, returning how many went
    pub async fn purge_expired(&self) -> CacheResult<u64> {
        let result = sqlx::query(&self.sql.purge_expired)
            .bind(Utc::now())
            .execute(self.pool()?)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert(
        &self,
        key: &str,
        payload: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> CacheResult<()> {
        sqlx::query(&self.sql.upsert)
            .bind(key)
            .bind(payload)
            .bind(expires_at)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CacheDriver for RelationalDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Relational
    }

    /// True when a pool is configured and the cache table exists
    async fn is_available(&self) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        let found: Result<bool, sqlx::Error> =
            sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(&self.table)
                .fetch_one(pool)
                .await;
        match found {
            Ok(found) => found,
            Err(_e) => {
                debug_log!("Cache table probe failed: {}", _e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let pool = self.pool()?;
        let now = Utc::now();

        let row: Option<(String, Option<DateTime<Utc>>)> = sqlx::query_as(&self.sql.select)
            .bind(key)
            .fetch_optional(pool)
            .await?;

        match row {
            None => Ok(None),
            Some((_, Some(expires_at))) if expires_at <= now => {
                sqlx::query(&self.sql.delete_expired_key)
                    .bind(key)
                    .bind(now)
                    .execute(pool)
                    .await?;
                Ok(None)
            }
            Some((payload, _)) => Ok(Some(self.codec.decode(&payload)?)),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> CacheResult<()> {
        let payload = self.codec.encode(value)?;
        self.upsert(key, &payload, expires_at(Utc::now(), ttl_seconds))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        sqlx::query(&self.sql.delete)
            .bind(key)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let exists: bool = sqlx::query_scalar(&self.sql.exists)
            .bind(key)
            .bind(Utc::now())
            .fetch_one(self.pool()?)
            .await?;
        Ok(exists)
    }

    async fn flush(&self, namespace: &Namespace) -> CacheResult<FlushReport> {
        let result = sqlx::query(&self.sql.flush)
            .bind(namespace.like_pattern())
            .execute(self.pool()?)
            .await?;
        Ok(FlushReport::complete(result.rows_affected()))
    }

    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Value>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, String)> = sqlx::query_as(&self.sql.select_many)
            .bind(keys)
            .bind(Utc::now())
            .fetch_all(self.pool()?)
            .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for (key, payload) in rows {
            match self.codec.decode(&payload) {
                Ok(value) => {
                    found.insert(key, value);
                }
                Err(e) => tracing::warn!(
                    driver = DriverKind::Relational.as_str(),
                    key = %key,
                    error = %e,
                    "Skipping undecodable cache row"
                ),
            }
        }
        Ok(found)
    }

    /// All rows in one transaction: either every entry lands or none does
    async fn set_multiple(
        &self,
        entries: &[(String, Value)],
        ttl_seconds: i64,
    ) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let expires_at = expires_at(Utc::now(), ttl_seconds);
        let mut tx = self.pool()?.begin().await?;
        for (key, value) in entries {
            let payload = self.codec.encode(value)?;
            sqlx::query(&self.sql.upsert)
                .bind(key)
                .bind(payload)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn increment(&self, key: &str, offset: i64) -> CacheResult<i64> {
        let pool = self.pool()?;
        let now = Utc::now();

        let row: Option<(String, Option<DateTime<Utc>>)> = sqlx::query_as(&self.sql.select)
            .bind(key)
            .fetch_optional(pool)
            .await?;

        match row {
            Some((payload, expiry)) if expiry.is_none_or(|at| at > now) => {
                let current = as_counter(&self.codec.decode(&payload)?)
                    .ok_or_else(|| CacheError::NotNumeric(key.to_string()))?;
                let next = current
                    .checked_add(offset)
                    .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
                // Keeps the row's expiry
                sqlx::query(&self.sql.update_value)
                    .bind(key)
                    .bind(next.to_string())
                    .execute(pool)
                    .await?;
                Ok(next)
            }
            _ => {
                self.upsert(key, &offset.to_string(), None).await?;
                Ok(offset)
            }
        }
    }
}
