//! Costing commands.
//!
//! # Usage
//!
//! ```bash
//! # What would 120 L cost right now? Changes nothing.
//! cogs-cli cogs simulate -c 1 -p GAS_C -d 2025-02-01 --volume 120
//!
//! # Cost sale 42 and consume the stock. Safe to repeat.
//! cogs-cli cogs commit -c 1 -p GAS_C -s 42 -d 2025-02-01 --volume 120
//! ```
//!
//! Output is rounded to cents and millilitres, like the reports.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fuelcost_core::{CompanyId, ProductCode, SaleId};

use super::{CommandError, costing_service, print_json};

/// Simulate a sale and print the allocation.
pub async fn simulate(
    company_id: CompanyId,
    product_code: &ProductCode,
    sale_date: NaiveDate,
    volume: Decimal,
) -> Result<(), CommandError> {
    let service = costing_service().await?;
    let result = service
        .simulate(company_id, product_code, sale_date, volume)
        .await?;
    print_json(&result.presented())
}

/// Commit a sale and print the allocation.
pub async fn commit(
    company_id: CompanyId,
    product_code: &ProductCode,
    sale_id: SaleId,
    sale_date: NaiveDate,
    volume: Decimal,
) -> Result<(), CommandError> {
    let service = costing_service().await?;
    let result = service
        .commit(company_id, product_code, sale_id, sale_date, volume)
        .await?;
    print_json(&result.presented())
}
