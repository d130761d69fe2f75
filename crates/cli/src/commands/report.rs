//! Profitability reports.
//!
//! # Usage
//!
//! ```bash
//! # Company report from the database
//! cogs-cli report profitability -c 1
//!
//! # Same, costing uncommitted sales from 2025-01-03 onwards
//! cogs-cli report profitability -c 1 --start-date 2025-01-03
//!
//! # Per-product rollup with current stock
//! cogs-cli report products -c 1
//!
//! # Offline: everything from one YAML file, no database needed
//! cogs-cli report scenario --file crates/cli/fixtures/scenario.yaml
//! ```
//!
//! Figures are rounded for display (cents and millilitres) on output only.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fuelcost_core::{CompanyId, NewBatch, ProductCode};
use fuelcost_engine::{
    BatchLedger, CostingService, EngineConfig, InMemoryLedger, InventoryAdjustment,
    ProductAnalysis, ProfitabilityReport, ReportOptions, SaleRecord, Scope, product_analysis,
    profitability_report,
};
use fuelcost_store::{AdjustmentRepository, PgBatchLedger, SaleRepository};

use super::{CommandError, costing_service, print_json, read_file};

/// Report printed by the `products` and `scenario --products` commands.
#[derive(Debug, Serialize)]
struct ProductReport {
    cutoff_override: Option<NaiveDate>,
    products: Vec<ProductAnalysis>,
}

async fn load_inputs(
    service: &CostingService<PgBatchLedger>,
    company_id: CompanyId,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(Vec<SaleRecord>, Vec<InventoryAdjustment>), CommandError> {
    let pool = service.ledger().pool();
    let sales = SaleRepository::new(pool).list(company_id, from, to).await?;
    let adjustments = AdjustmentRepository::new(pool)
        .list(company_id, None)
        .await?;
    info!(
        sales = sales.len(),
        adjustments = adjustments.len(),
        "Loaded report inputs"
    );
    Ok((sales, adjustments))
}

/// Company profitability report from the database.
pub async fn profitability(
    company_id: CompanyId,
    options: ReportOptions,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), CommandError> {
    let service = costing_service().await?;
    let (sales, adjustments) = load_inputs(&service, company_id, from, to).await?;
    let report = profitability_report(&service, company_id, &sales, &adjustments, options).await;
    print_json(&report.presented())
}

/// Per-product analysis from the database.
pub async fn products(company_id: CompanyId, options: ReportOptions) -> Result<(), CommandError> {
    let service = costing_service().await?;
    let (sales, adjustments) = load_inputs(&service, company_id, None, None).await?;
    let products = product_analysis(&service, company_id, &sales, &adjustments, options).await?;
    print_json(&ProductReport {
        cutoff_override: options.cutoff_override,
        products: products.iter().map(ProductAnalysis::presented).collect(),
    })
}

// =============================================================================
// Offline scenarios
// =============================================================================

/// A purchase in a scenario file. The company comes from the file header.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioPurchase {
    pub product_code: ProductCode,
    pub acquired_on: NaiveDate,
    pub volume: Decimal,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Self-contained input for an in-memory report run.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub company_id: CompanyId,
    /// Company-wide cost-basis cutoff.
    #[serde(default)]
    pub cutoff: Option<NaiveDate>,
    /// Per-product overrides of `cutoff`.
    #[serde(default)]
    pub product_cutoffs: BTreeMap<ProductCode, NaiveDate>,
    #[serde(default)]
    pub purchases: Vec<ScenarioPurchase>,
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
    #[serde(default)]
    pub adjustments: Vec<InventoryAdjustment>,
    /// Commit every sale, in date order, before reporting.
    #[serde(default)]
    pub commit_sales: bool,
}

impl Scenario {
    /// Parse a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Yaml` if the content does not match the format.
    pub fn parse(content: &str) -> Result<Self, CommandError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load the scenario into an in-memory ledger and, if asked, commit its
    /// sales.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Ledger` if a purchase is invalid.
    pub async fn load(&self) -> Result<CostingService<InMemoryLedger>, CommandError> {
        let ledger = InMemoryLedger::new();
        for purchase in &self.purchases {
            ledger.record_purchase(NewBatch {
                company_id: self.company_id,
                product_code: purchase.product_code.clone(),
                acquired_on: purchase.acquired_on,
                volume: purchase.volume,
                unit_cost: purchase.unit_cost,
                reference: purchase.reference.clone(),
            })?;
        }
        for sale in &self.sales {
            ledger.register_product(Scope::new(self.company_id, sale.product_code.clone()))?;
        }
        ledger.set_company_cutoff(self.company_id, self.cutoff)?;
        for (code, date) in &self.product_cutoffs {
            ledger.set_product_cutoff(Scope::new(self.company_id, code.clone()), Some(*date))?;
        }

        let service = CostingService::new(Arc::new(ledger), EngineConfig::default());
        if self.commit_sales {
            self.commit_all(&service).await;
        }
        Ok(service)
    }

    async fn commit_all<L: BatchLedger>(&self, service: &CostingService<L>) {
        let mut ordered: Vec<&SaleRecord> = self.sales.iter().collect();
        ordered.sort_by_key(|s| (s.sale_date, s.sale_id));
        for sale in ordered {
            if let Err(err) = service
                .commit(
                    self.company_id,
                    &sale.product_code,
                    sale.sale_id,
                    sale.sale_date,
                    sale.volume,
                )
                .await
            {
                // The report lists this sale under failures.
                warn!(sale_id = %sale.sale_id, error = %err, "Scenario commit failed");
            }
        }
    }

    /// Run the profitability report over the scenario.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Ledger` if a purchase is invalid.
    pub async fn profitability(
        &self,
        options: ReportOptions,
    ) -> Result<ProfitabilityReport, CommandError> {
        let service = self.load().await?;
        Ok(profitability_report(
            &service,
            self.company_id,
            &self.sales,
            &self.adjustments,
            options,
        )
        .await)
    }

    /// Run the per-product analysis over the scenario.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Ledger` if a purchase is invalid.
    pub async fn products(
        &self,
        options: ReportOptions,
    ) -> Result<Vec<ProductAnalysis>, CommandError> {
        let service = self.load().await?;
        Ok(product_analysis(
            &service,
            self.company_id,
            &self.sales,
            &self.adjustments,
            options,
        )
        .await?)
    }
}

/// Report over a scenario file without touching the database.
pub async fn scenario(
    file_path: &str,
    options: ReportOptions,
    by_product: bool,
) -> Result<(), CommandError> {
    let scenario = Scenario::parse(&read_file(file_path).await?)?;
    info!(
        path = %file_path,
        purchases = scenario.purchases.len(),
        sales = scenario.sales.len(),
        "Loaded scenario"
    );

    if by_product {
        let products = scenario.products(options).await?;
        print_json(&ProductReport {
            cutoff_override: options.cutoff_override,
            products: products.iter().map(ProductAnalysis::presented).collect(),
        })
    } else {
        print_json(&scenario.profitability(options).await?.presented())
    }
}
