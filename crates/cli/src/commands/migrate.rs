//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cogs-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `COGS_DATABASE_URL` - `PostgreSQL` connection string (or `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/store/migrations/` and are embedded in the
//! binary at build time.

use fuelcost_store::run_migrations;

use super::{CommandError, connect};

/// Run all pending `cogs` schema migrations.
pub async fn run() -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    run_migrations(&pool).await?;
    Ok(())
}
