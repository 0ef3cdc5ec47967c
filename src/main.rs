//! PaisaSplit Backend Service
//!
//! Boots the ledger services over the configured store and idles until
//! shutdown. The transport layer attaches to `AppState`.

use anyhow::Context;
use paisasplit_backend::config::StoreBackend;
use paisasplit_backend::database::Database;
use paisasplit_backend::telemetry::init_tracing;
use paisasplit_backend::{AppConfig, AppError, AppState, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()
        .map_err(AppError::Config)
        .context("Failed to load configuration")?;

    init_tracing(&config);

    info!("PaisaSplit backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let clock = Arc::new(SystemClock);

    // =========================================================================
    // STORE SETUP
    // =========================================================================
    let state = match config.database.backend() {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on shutdown");
            let (state, _store) = AppState::in_memory(config.clone(), clock);
            state
        }
        StoreBackend::Postgres => {
            info!("Connecting to database...");
            let database = Database::connect(&config.database)
                .await
                .context("Failed to connect to the database")?;
            info!("Max connections: {}", config.database.max_connections);

            info!("Running database migrations...");
            database
                .migrate(None)
                .await
                .context("Database migration failed")?;
            database
                .ping()
                .await
                .context("Database health check failed")?;
            info!("Database ready");

            AppState::postgres(config.clone(), database.into_pool(), clock)
        }
    };

    let state = Arc::new(state);
    info!("{} ready", state.config.app_name);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received, stopping");
    Ok(())
}
