//! Database connection management

pub mod schema;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;

/// PostgreSQL database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        Self::connect_with(&config.postgres_url, config.max_connections).await
    }

    /// Create a small pool for a bare URL
    pub async fn connect_url(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::connect_with(database_url, 10).await
    }

    async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create ledger tables and indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in schema::statements() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Ledger schema ready");
        Ok(())
    }
}
