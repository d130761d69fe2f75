//! Import recorded sales and inventory adjustments from YAML.
//!
//! # Usage
//!
//! ```bash
//! cogs-cli import -c 1 --file sales.yaml
//! ```
//!
//! # File Format
//!
//! ```yaml
//! sales:
//!   - sale_id: 1001
//!     product_code: GAS_C
//!     product_name: Gasoline C
//!     sale_date: 2025-02-01
//!     volume: "120"
//!     revenue: "720.00"
//! adjustments:
//!   - product_code: GAS_C
//!     adjusted_on: 2025-02-28
//!     kind: loss
//!     volume: "12.5"
//!     total_cost: "68.75"
//!     reason: evaporation
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fuelcost_core::CompanyId;
use fuelcost_engine::{InventoryAdjustment, SaleRecord};
use fuelcost_store::{AdjustmentRepository, RepositoryError, SaleRepository};

use super::{CommandError, connect, print_json, read_file};

/// Contents of an import file.
#[derive(Debug, Default, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
    #[serde(default)]
    pub adjustments: Vec<InventoryAdjustment>,
}

/// Counts printed after an import.
#[derive(Debug, Default, Serialize)]
struct ImportSummary {
    sales_imported: usize,
    sales_skipped: usize,
    adjustments_imported: usize,
}

/// Parse an import file.
///
/// # Errors
///
/// Returns `CommandError::Yaml` if the content does not match the format.
pub fn parse(content: &str) -> Result<ImportFile, CommandError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Import sales and adjustments for a company.
///
/// Sales whose id is already recorded are skipped, so a file can be
/// re-imported after a partial failure.
pub async fn run(company_id: CompanyId, file_path: &str) -> Result<(), CommandError> {
    let file = parse(&read_file(file_path).await?)?;
    info!(
        path = %file_path,
        sales = file.sales.len(),
        adjustments = file.adjustments.len(),
        "Parsed import file"
    );

    let (_, pool) = connect().await?;
    let sales = SaleRepository::new(&pool);
    let adjustments = AdjustmentRepository::new(&pool);
    let mut summary = ImportSummary::default();

    for sale in &file.sales {
        match sales.record(company_id, sale).await {
            Ok(()) => summary.sales_imported += 1,
            Err(RepositoryError::Conflict(_)) => {
                warn!(sale_id = %sale.sale_id, "Sale already recorded, skipping");
                summary.sales_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    for adjustment in &file.adjustments {
        adjustments.record(company_id, adjustment).await?;
        summary.adjustments_imported += 1;
    }

    print_json(&summary)
}
