mod migrate;
mod run;

pub use migrate::MigrateCommand;
pub use run::RunCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// TeamDesk - team management server
#[derive(Parser)]
#[command(name = "teamdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the server.
    Run(RunCommand),

    /// Apply database migrations and exit.
    Migrate(MigrateCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Migrate(cmd) => cmd.execute().await,
        }
    }
}

/// Load `.env` then the TOML file at `path`.
pub(crate) fn load_config(path: &str) -> Result<teamdesk::TeamdeskConfig> {
    match dotenvy::dotenv() {
        Ok(file) => tracing::debug!("Loaded environment from {}", file.display()),
        Err(e) if e.not_found() => {}
        Err(e) => anyhow::bail!("Failed to read .env: {}", e),
    }

    if !std::path::Path::new(path).exists() {
        anyhow::bail!("Configuration file not found: {}", path);
    }
    Ok(teamdesk::TeamdeskConfig::from_file(path)?)
}
