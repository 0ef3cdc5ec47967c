//! Postgres connection handling for the ledger tables.

use crate::config::DatabaseConfig;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Migrations directory used when none is given, relative to the working directory
pub const DEFAULT_MIGRATIONS_PATH: &str = "./migrations";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Invalid database settings: {0}")]
    Settings(String),

    #[error("Could not open a Postgres connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Postgres did not answer the health check: {0}")]
    Unhealthy(#[source] sqlx::Error),

    #[error("Could not load migrations from {path}: {source}")]
    LoadMigrations {
        path: String,
        #[source]
        source: MigrateError,
    },

    #[error("Applying migrations failed: {0}")]
    Migrate(#[source] MigrateError),
}

/// Pool handle used at startup; repositories take the bare `PgPool`
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a pool sized by `config` and make sure one connection answers.
    /// Settings are checked before any connection attempt.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate().map_err(DatabaseError::Settings)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .test_before_acquire(config.test_before_acquire)
            .connect(&config.url)
            .await
            .map_err(DatabaseError::Connect)?;

        let database = Self { pool };
        database.ping().await?;
        Ok(database)
    }

    /// Apply pending migrations from `dir`, or `DEFAULT_MIGRATIONS_PATH`
    pub async fn migrate(&self, dir: Option<&str>) -> Result<(), DatabaseError> {
        let path = dir.unwrap_or(DEFAULT_MIGRATIONS_PATH);
        let migrator = Migrator::new(Path::new(path))
            .await
            .map_err(|source| DatabaseError::LoadMigrations {
                path: path.to_string(),
                source,
            })?;

        debug!("Applying {} migrations from {}", migrator.iter().count(), path);
        migrator.run(&self.pool).await.map_err(DatabaseError::Migrate)
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Unhealthy)?;
        Ok(())
    }

    pub fn into_pool(self) -> PgPool {
        self.pool
    }
}
