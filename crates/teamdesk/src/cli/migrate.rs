use anyhow::Result;
use clap::Parser;

use teamdesk::init_tracing;
use teamdesk_runtime::{Database, MigrationRunner};

use super::load_config;

/// Apply the built-in migrations to the configured Postgres database.
#[derive(Parser)]
pub struct MigrateCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "teamdesk.toml")]
    pub config: String,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        let config = load_config(&self.config)?;
        init_tracing(&config.observability.logging, false);

        if config.database.is_memory() {
            anyhow::bail!("The in-memory store has no migrations");
        }

        let db = Database::from_config(&config.database).await?;
        MigrationRunner::new(db.primary().clone()).run().await?;
        db.close().await;
        println!("Migrations applied");
        Ok(())
    }
}
