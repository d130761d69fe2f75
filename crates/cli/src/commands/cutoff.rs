//! Cost-basis cutoff settings.
//!
//! Batches acquired before the cutoff are ignored when costing sales. A
//! product cutoff overrides the company one.
//!
//! # Usage
//!
//! ```bash
//! cogs-cli cutoff get -c 1
//! cogs-cli cutoff set -c 1 --date 2025-01-03
//! cogs-cli cutoff set -c 1 -p DIESEL --date 2025-02-01
//! cogs-cli cutoff set -c 1 --clear
//! ```

use chrono::NaiveDate;

use fuelcost_core::{CompanyId, ProductCode};
use fuelcost_store::ProductRepository;

use super::{CommandError, connect, print_json};

/// Print the company and product cutoffs.
pub async fn get(company_id: CompanyId) -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    let settings = ProductRepository::new(&pool)
        .cutoff_settings(company_id)
        .await?;
    print_json(&settings)
}

/// Set or clear a cutoff.
pub async fn set(
    company_id: CompanyId,
    product_code: Option<ProductCode>,
    cutoff: Option<NaiveDate>,
) -> Result<(), CommandError> {
    let (_, pool) = connect().await?;
    let products = ProductRepository::new(&pool);
    match product_code {
        Some(code) => products.set_product_cutoff(company_id, &code, cutoff).await?,
        None => products.set_company_cutoff(company_id, cutoff).await?,
    }
    print_json(&products.cutoff_settings(company_id).await?)
}
