use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use teamdesk_core::config::{LoggingConfig, TeamdeskConfig};
use teamdesk_core::error::{Result, TeamdeskError};
use teamdesk_runtime::{
    AppState, Database, GatewayServer, MigrationRunner, NotificationPurger, PgStore, RoomManager,
    Services, Store, TokenService,
};

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // a subscriber may already be installed (tests, embedding)
    if logging.json_format {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// A configured TeamDesk server.
pub struct TeamDesk {
    config: TeamdeskConfig,
    shutdown: CancellationToken,
}

impl TeamDesk {
    pub fn builder() -> TeamDeskBuilder {
        TeamDeskBuilder::new()
    }

    pub fn config(&self) -> &TeamdeskConfig {
        &self.config
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Open the configured store, migrating Postgres first.
    pub async fn connect_store(&self) -> Result<Store> {
        if self.config.database.is_memory() {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            return Ok(Store::memory());
        }

        let db = Database::from_config(&self.config.database).await?;
        tracing::info!("Connected to database");
        MigrationRunner::new(db.primary().clone()).run().await?;
        tracing::info!("Migrations completed");
        Ok(Store::new(Arc::new(PgStore::new(db))))
    }

    fn token_service(&self) -> TokenService {
        let ttl = self.config.security.token_ttl_secs;
        match self.config.security.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => TokenService::new(secret, ttl),
            _ => {
                tracing::warn!(
                    "security.jwt_secret is not set; using a random secret, tokens will not survive a restart"
                );
                let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
                TokenService::new(&secret, ttl)
            }
        }
    }

    /// Build the shared state on top of `store`: bootstrap the admin account
    /// and make sure the team chat exists.
    pub async fn prepare(&self, store: Store) -> Result<AppState> {
        let services = Services::new(store, self.token_service());

        if let Some((email, password)) = self.config.admin.credentials() {
            services
                .auth
                .bootstrap_admin(&self.config.admin.name, email, password)
                .await?;
        }
        services.chat.ensure_team_chat().await?;

        Ok(AppState::new(services, Arc::new(RoomManager::new())))
    }

    /// Run until ctrl-c or until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            project = %self.config.project.name,
            environment = %self.config.environment,
            "TeamDesk starting"
        );

        let store = self.connect_store().await?;
        let state = self.prepare(store).await?;

        let purger = match self.config.notifications.purge_interval_secs {
            0 => None,
            secs => {
                let purger = NotificationPurger::new(
                    state.services.notifications.clone(),
                    Duration::from_secs(secs),
                );
                let token = self.shutdown.clone();
                Some(tokio::spawn(async move { purger.run(token).await }))
            }
        };

        let server = GatewayServer::new(self.config.gateway.clone(), state)
            .expose_errors(!self.config.is_production());

        let token = self.shutdown.clone();
        let shutdown = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                }
                _ = token.cancelled() => {
                    tracing::info!("Received shutdown notification");
                }
            }
            token.cancel();
        };

        server.run(shutdown).await.map_err(TeamdeskError::Io)?;

        self.shutdown.cancel();
        if let Some(handle) = purger {
            if let Err(e) = handle.await {
                tracing::warn!("Notification purger did not stop cleanly: {}", e);
            }
        }
        tracing::info!("TeamDesk stopped");
        Ok(())
    }
}

/// Builder for [`TeamDesk`].
pub struct TeamDeskBuilder {
    config: Option<TeamdeskConfig>,
}

impl TeamDeskBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: TeamdeskConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<TeamDesk> {
        let config = self
            .config
            .ok_or_else(|| TeamdeskError::Config("Configuration is required".to_string()))?;
        Ok(TeamDesk {
            config,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for TeamDeskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
