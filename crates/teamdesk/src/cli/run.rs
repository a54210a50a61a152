use anyhow::Result;
use clap::Parser;
use console::style;

use teamdesk::{init_tracing, TeamDesk};

use super::load_config;

/// Run the server.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "teamdesk.toml")]
    pub config: String,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Verbose logging.
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config(&self.config)?;
        init_tracing(&config.observability.logging, self.dev);
        tracing::info!("Loaded configuration from {}", self.config);

        if let Some(port) = self.port {
            config.gateway.port = port;
        }

        println!();
        println!(
            "  {} v{}",
            style("TeamDesk").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  Listening on {}",
            style(format!("http://0.0.0.0:{}", config.gateway.port)).cyan()
        );
        println!(
            "  Store: {}",
            if config.database.is_memory() {
                style("in-memory").yellow()
            } else {
                style("postgres").green()
            }
        );
        println!();

        let app = TeamDesk::builder().config(config).build()?;
        app.run().await?;

        println!("\n  {}", style("Stopped").bold());
        Ok(())
    }
}
