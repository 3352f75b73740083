//! Core LMS cache coordination
//!
//! [`LmsCache`] owns the optional database pool and the cache manager built
//! on top of it, so applications get one object to construct at startup and
//! shut down at teardown.

use cache_system::{CacheEnvironment, CacheManager, ObjectCache};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::LmsCacheError;
use config::{AppConfig, DatabaseConfig};

/// Database pool plus the cache manager probed against it
pub struct LmsCache {
    pool: Option<PgPool>,
    cache: Arc<CacheManager>,
}

impl std::fmt::Debug for LmsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmsCache")
            .field("has_database", &self.pool.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}

impl LmsCache {
    /// Connect the configured database (if any) and initialize the cache.
    ///
    /// The cache table must already exist for the relational driver to be
    /// picked; see [`crate::migration::ensure_cache_table`].
    pub async fn new(
        config: AppConfig,
        object_cache: Option<Arc<dyn ObjectCache>>,
    ) -> Result<Self, LmsCacheError> {
        config.validate()?;

        let pool = match &config.database {
            Some(database) => Some(Self::connect_pool(database).await?),
            None => None,
        };

        Ok(Self::from_parts(&config, pool, object_cache).await)
    }

    /// Initialize the cache over an existing pool
    pub async fn from_parts(
        config: &AppConfig,
        pool: Option<PgPool>,
        object_cache: Option<Arc<dyn ObjectCache>>,
    ) -> Self {
        let mut environment = CacheEnvironment::new();
        if let Some(pool) = &pool {
            environment = environment.with_pool(pool.clone());
        }
        if let Some(object_cache) = object_cache {
            environment = environment.with_object_cache(object_cache);
        }

        let cache = CacheManager::initialize(&config.cache, environment).await;
        Self {
            pool,
            cache: Arc::new(cache),
        }
    }

    /// Build a Postgres pool from database settings
    pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, LmsCacheError> {
        let connection_string = config.connection_string();

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        // Set max lifetime if specified
        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        let pool = pool_options.connect(&connection_string).await?;
        tracing::info!(host = %config.host, database = %config.database, "Database pool connected");
        Ok(pool)
    }

    /// Cache facade shared with callers
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Get database pool reference
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), LmsCacheError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").fetch_one(pool).await?;
        }
        Ok(())
    }

    /// Release the cache driver and close the pool
    pub async fn shutdown(self) {
        self.cache.shutdown().await;
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}
