//! Database operations for the COGS ledger in `PostgreSQL`.
//!
//! # Schema: `cogs`
//!
//! ## Tables
//!
//! - `company_setting` - Company-wide cost-basis cutoff
//! - `product` - Products per company, with an optional cutoff override
//! - `batch` - Fuel deliveries and their remaining volume
//! - `sale_commit` - One row per committed sale (idempotency key)
//! - `sale_allocation` - Line items of committed sales
//! - `sale` - Pump sales as recorded
//! - `inventory_adjustment` - Losses and gains from tank dips
//!
//! # Migrations
//!
//! Migrations are stored in `crates/store/migrations/` and run via:
//! ```bash
//! cargo run -p fuelcost-cli -- migrate
//! ```

pub mod adjustments;
pub mod batches;
pub mod ledger;
pub mod products;
pub mod sales;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use secrecy::ExposeSecret;

use fuelcost_core::BatchError;
use fuelcost_engine::LedgerError;

use crate::config::StoreConfig;

pub use adjustments::AdjustmentRepository;
pub use batches::BatchRepository;
pub use ledger::PgBatchLedger;
pub use products::ProductRepository;
pub use sales::SaleRepository;

/// Embedded migrations for the `cogs` schema.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate sale id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Input rejected by a batch invariant.
    #[error(transparent)]
    Invalid(#[from] BatchError),
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Unavailable(e.to_string()),
            RepositoryError::Invalid(e) => Self::Batch(e),
            RepositoryError::DataCorruption(_)
            | RepositoryError::NotFound
            | RepositoryError::Conflict(_) => Self::Corrupt(err.to_string()),
        }
    }
}

/// Create a `PostgreSQL` connection pool from the store configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &StoreConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(config.database_url.expose_secret())
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history is inconsistent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running cogs migrations...");
    MIGRATOR.run(pool).await?;
    tracing::info!("Migrations complete");
    Ok(())
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_string());
    }
    RepositoryError::Database(e)
}
