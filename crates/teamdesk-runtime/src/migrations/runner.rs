//! Migration runner.
//!
//! Only one server instance runs migrations at a time, serialized by a
//! PostgreSQL advisory lock.

use sqlx::PgPool;
use std::collections::HashSet;
use teamdesk_core::error::{Result, TeamdeskError};
use tracing::{debug, info, warn};

/// Lock ID for the migration advisory lock ("TDESK" in hex).
const MIGRATION_LOCK_ID: i64 = 0x5444_4553_4B;

/// A single migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique name, e.g. "0000_teamdesk_documents".
    pub name: String,
    /// SQL to execute.
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Applies built-in migrations that have not run yet.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations under the advisory lock.
    pub async fn run(&self) -> Result<()> {
        self.acquire_lock().await?;

        let result = self.run_migrations_inner().await;

        // Always release lock, even on error
        if let Err(e) = self.release_lock().await {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }

    async fn run_migrations_inner(&self) -> Result<()> {
        self.ensure_migrations_table().await?;

        let applied = self.get_applied_migrations().await?;
        debug!("Already applied migrations: {:?}", applied);

        for migration in super::builtin::get_builtin_migrations() {
            if !applied.contains(&migration.name) {
                self.apply_migration(&migration).await?;
            }
        }

        Ok(())
    }

    async fn acquire_lock(&self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TeamdeskError::Database(format!("Failed to acquire migration lock: {}", e))
            })?;
        debug!("Migration lock acquired");
        Ok(())
    }

    async fn release_lock(&self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TeamdeskError::Database(format!("Failed to release migration lock: {}", e))
            })?;
        Ok(())
    }

    async fn ensure_migrations_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teamdesk_migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            TeamdeskError::Database(format!("Failed to create migrations table: {}", e))
        })?;
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM teamdesk_migrations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                TeamdeskError::Database(format!("Failed to get applied migrations: {}", e))
            })?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        info!("Applying migration: {}", migration.name);

        for statement in split_sql_statements(&migration.sql) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    TeamdeskError::Database(format!(
                        "Failed to apply migration '{}': {}",
                        migration.name, e
                    ))
                })?;
        }

        sqlx::query("INSERT INTO teamdesk_migrations (name) VALUES ($1)")
            .bind(&migration.name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TeamdeskError::Database(format!(
                    "Failed to record migration '{}': {}",
                    migration.name, e
                ))
            })?;

        info!("Migration applied: {}", migration.name);
        Ok(())
    }
}

/// Split SQL into statements, dropping comment lines and empty statements.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let stripped: String = sql
        .lines()
        .filter(|l| !l.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_skips_comments_and_blanks() {
        let sql = "-- header\nCREATE TABLE a (id INT);\n\n-- one more\nCREATE INDEX b ON a (id);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE INDEX b ON a (id)"]
        );
    }

    #[test]
    fn test_builtin_migration_splits_cleanly() {
        let migration = &super::super::builtin::get_builtin_migrations()[0];
        let statements = split_sql_statements(&migration.sql);
        assert_eq!(statements.len(), 6);
        assert!(statements.iter().all(|s| !s.starts_with("--")));
    }
}
