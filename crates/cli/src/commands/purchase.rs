//! Purchase (batch) commands.
//!
//! # Usage
//!
//! ```bash
//! # Record a delivery of 10,000 L at 5.4321 per litre
//! cogs-cli purchase record -c 1 -p GAS_C -d 2025-01-05 --volume 10000 --unit-cost 5.4321
//!
//! # List every batch for a product
//! cogs-cli purchase list -c 1 -p GAS_C
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fuelcost_core::{CompanyId, NewBatch, ProductCode};
use fuelcost_store::BatchRepository;

use super::{CommandError, connect, print_json};

/// Record a purchase as a new batch and print it.
pub async fn record(
    company_id: CompanyId,
    product_code: ProductCode,
    acquired_on: NaiveDate,
    volume: Decimal,
    unit_cost: Decimal,
    reference: Option<String>,
) -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    let batch = BatchRepository::new(&pool)
        .record_purchase(&NewBatch {
            company_id,
            product_code,
            acquired_on,
            volume,
            unit_cost,
            reference,
        })
        .await?;
    print_json(&batch)
}

/// Print all batches for a product, depleted ones included.
pub async fn list(company_id: CompanyId, product_code: &ProductCode) -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    let batches = BatchRepository::new(&pool)
        .list(company_id, product_code)
        .await?;
    tracing::info!(count = batches.len(), "Loaded batches");
    print_json(&batches)
}
