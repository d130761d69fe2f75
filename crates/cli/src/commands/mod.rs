//! Command implementations.

pub mod cogs;
pub mod cutoff;
pub mod import;
pub mod migrate;
pub mod purchase;
pub mod report;

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use fuelcost_engine::{CogsError, CostingService, LedgerError};
use fuelcost_store::{ConfigError, PgBatchLedger, RepositoryError, StoreConfig, create_pool};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Costing failed.
    #[error(transparent)]
    Cogs(#[from] CogsError),

    /// In-memory ledger rejected the input.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not valid YAML for the expected shape.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Output could not be encoded.
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load configuration and connect to the database.
pub async fn connect() -> Result<(StoreConfig, PgPool), CommandError> {
    let config = StoreConfig::from_env()?;
    tracing::info!("Connecting to database...");
    let pool = create_pool(&config).await?;
    Ok((config, pool))
}

/// Connect and build a costing service over the `PostgreSQL` ledger.
pub async fn costing_service() -> Result<CostingService<PgBatchLedger>, CommandError> {
    let (config, pool) = connect().await?;
    Ok(CostingService::new(
        Arc::new(PgBatchLedger::new(pool)),
        config.engine_config(),
    ))
}

/// Read a whole file, naming it in the error.
pub async fn read_file(path: &str) -> Result<String, CommandError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.to_string(),
            source,
        })
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let out = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{out}");
    }
    Ok(())
}
