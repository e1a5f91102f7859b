//! Database adapters: connection pool and schema wiring.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::store::{StoreError, map_sqlx_error};

/// Schema applied at startup. Every statement is `IF NOT EXISTS`.
pub const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Open a pool and prove it works.
///
/// The whole attempt (connect + probe) is bounded by `connect_timeout`.
pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<PgPool, StoreError> {
    let attempt = async {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        health_check(&pool).await?;
        Ok::<_, StoreError>(pool)
    };

    match tokio::time::timeout(settings.connect_timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "database did not answer within {}s",
            settings.connect_timeout.as_secs()
        ))),
    }
}

pub async fn health_check(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("health_check", e))?;
    Ok(())
}

pub async fn apply_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("apply_schema", e))?;
    tracing::info!("database schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent_ddl() {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let first_code_line = stmt
                .lines()
                .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with("--"))
                .unwrap_or("");
            assert!(
                first_code_line.contains("IF NOT EXISTS"),
                "statement is not idempotent: {first_code_line}"
            );
        }
    }

    #[test]
    fn schema_enforces_one_open_log_per_item() {
        assert!(SCHEMA.contains("ON lending_logs (item_id) WHERE returned_at IS NULL"));
    }
}
