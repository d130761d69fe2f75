//! Integration tests for fuelcost.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests only
//! cargo test -p fuelcost-integration-tests
//!
//! # Include the PostgreSQL ledger tests
//! COGS_TEST_DATABASE_URL=postgres://localhost/cogs_test cargo test -p fuelcost-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `allocation_scenarios` - Worked FIFO examples
//! - `commit_semantics` - Idempotency, concurrency and failure handling
//! - `fifo_properties` - Property tests over random ledgers
//! - `reports` - Profitability report behavior
//! - `postgres_ledger` - The same contracts against `PostgreSQL`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use fuelcost_core::{CompanyId, NewBatch, ProductCode};
use fuelcost_engine::{CostingService, EngineConfig, InMemoryLedger, Scope};

/// Environment variable naming the database for `PostgreSQL` tests.
pub const TEST_DATABASE_URL: &str = "COGS_TEST_DATABASE_URL";

/// A date in 2025.
#[must_use]
pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

#[must_use]
pub fn company() -> CompanyId {
    CompanyId::new(1)
}

#[must_use]
pub fn gasoline() -> ProductCode {
    ProductCode::parse("GAS_C").unwrap()
}

#[must_use]
pub fn diesel() -> ProductCode {
    ProductCode::parse("DIESEL").unwrap()
}

#[must_use]
pub fn purchase(
    company_id: CompanyId,
    product_code: &ProductCode,
    acquired_on: NaiveDate,
    volume: Decimal,
    unit_cost: Decimal,
) -> NewBatch {
    NewBatch {
        company_id,
        product_code: product_code.clone(),
        acquired_on,
        volume,
        unit_cost,
        reference: None,
    }
}

/// Ledger holding `(acquired_on, volume, unit_cost)` batches of gasoline
/// for [`company`]. The product is known even when `batches` is empty.
#[must_use]
pub fn gasoline_ledger(batches: &[(NaiveDate, Decimal, Decimal)]) -> Arc<InMemoryLedger> {
    let ledger = InMemoryLedger::new();
    ledger
        .register_product(Scope::new(company(), gasoline()))
        .unwrap();
    for &(acquired_on, volume, unit_cost) in batches {
        ledger
            .record_purchase(purchase(
                company(),
                &gasoline(),
                acquired_on,
                volume,
                unit_cost,
            ))
            .unwrap();
    }
    Arc::new(ledger)
}

/// 100 L at 2.00 on Jan 1 and 50 L at 2.50 on Jan 5.
#[must_use]
pub fn two_batch_ledger() -> Arc<InMemoryLedger> {
    gasoline_ledger(&[
        (date(1, 1), dec!(100), dec!(2.00)),
        (date(1, 5), dec!(50), dec!(2.50)),
    ])
}

#[must_use]
pub fn service(ledger: Arc<InMemoryLedger>) -> CostingService<InMemoryLedger> {
    CostingService::new(ledger, EngineConfig::default())
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// Connect to the test database and apply migrations.
///
/// Returns `None` when [`TEST_DATABASE_URL`] is unset so the tests using it
/// pass trivially on machines without a database.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var(TEST_DATABASE_URL).ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap();
    fuelcost_store::run_migrations(&pool).await.unwrap();
    Some(pool)
}

/// A company id no other test run has used, so tests never see each
/// other's rows.
#[must_use]
pub fn unique_company() -> CompanyId {
    static COUNTER: AtomicI64 = AtomicI64::new(0);
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros();
    let base = i64::try_from(micros % 1_000_000_000_000).unwrap();
    CompanyId::new(base * 1000 + COUNTER.fetch_add(1, Ordering::Relaxed) % 1000)
}
