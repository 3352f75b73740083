//! Cache table schema
//!
//! The relational driver expects its table to exist before probing. These
//! helpers create and drop it for deployments that let this crate own the
//! schema.

use crate::errors::LmsCacheError;
use config::is_valid_identifier;
use sqlx::PgPool;

fn checked(table: &str) -> Result<&str, LmsCacheError> {
    if is_valid_identifier(table) {
        Ok(table)
    } else {
        Err(LmsCacheError::InvalidTable(table.to_string()))
    }
}

/// DDL for the cache table and its expiry index
pub fn create_cache_table_sql(table: &str) -> Result<Vec<String>, LmsCacheError> {
    let table = checked(table)?;
    Ok(vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                cache_key TEXT PRIMARY KEY,
                cache_value TEXT NOT NULL,
                expires_at TIMESTAMPTZ NULL
            )",
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_expires_at ON {} (expires_at)",
            table, table
        ),
    ])
}

/// Create the cache table if missing
pub async fn ensure_cache_table(pool: &PgPool, table: &str) -> Result<(), LmsCacheError> {
    for statement in create_cache_table_sql(table)? {
        sqlx::query(&statement).execute(pool).await?;
    }
    tracing::info!(table, "Cache table ready");
    Ok(())
}

/// Drop the cache table
pub async fn drop_cache_table(pool: &PgPool, table: &str) -> Result<(), LmsCacheError> {
    let table = checked(table)?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
        .execute(pool)
        .await?;
    Ok(())
}
