use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use teamdesk_core::config::DatabaseConfig;
use teamdesk_core::error::{Result, TeamdeskError};

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let options = Self::connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| TeamdeskError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| TeamdeskError::Config(format!("Invalid database url: {}", e)))?;
        let timeout_ms = (config.statement_timeout_secs * 1000).to_string();
        Ok(options.options([("statement_timeout", timeout_ms.as_str())]))
    }

    /// Get the pool.
    pub fn primary(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| TeamdeskError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
