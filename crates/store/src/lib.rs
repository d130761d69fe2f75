//! Fuelcost Store - `PostgreSQL` persistence for the COGS ledger.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven database and commit settings
//! - [`db`] - Connection pool, migrations, [`PgBatchLedger`], and repositories

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;

pub use config::{ConfigError, StoreConfig};
pub use db::{
    AdjustmentRepository, BatchRepository, PgBatchLedger, ProductRepository, RepositoryError,
    SaleRepository, create_pool, run_migrations,
};
