//! Profitability reporting over sales and inventory adjustments.
//!
//! Reports never change inventory. A sale that already has a commit record
//! is reported with its booked cost; every other sale is simulated, in date
//! order per product, against one snapshot so each sees the stock left by
//! the ones before it.
//!
//! A sale that cannot be costed is listed in `failures` and left out of the
//! totals. Its revenue is summed into `excluded_revenue` so the gap is
//! visible.
//!
//! Sales and adjustments beyond the ledger limits (`MAX_VOLUME`,
//! `MAX_AMOUNT`) are rejected up front, which keeps every total in range.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fuelcost_core::{
    AdjustmentKind, AllocationOutcome, AllocationResult, CompanyId, MAX_AMOUNT, MAX_VOLUME,
    ProductCode, SaleId, margin_pct, present_money, present_volume,
};

use crate::engine::{AllocationEngine, validate_volume};
use crate::error::{CogsError, Result};
use crate::ledger::{BatchLedger, Scope};
use crate::service::CostingService;

/// A sale as recorded at the pump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale_id: SaleId,
    pub product_code: ProductCode,
    #[serde(default)]
    pub product_name: Option<String>,
    pub sale_date: NaiveDate,
    pub volume: Decimal,
    /// Total revenue for the sale.
    pub revenue: Decimal,
}

impl SaleRecord {
    /// Check the sale is within the ledger limits.
    ///
    /// # Errors
    ///
    /// Returns [`CogsError::InvalidRequest`] for a negative or oversized
    /// volume, or revenue beyond `MAX_AMOUNT` either way.
    pub fn validate(&self) -> Result<()> {
        validate_volume(self.volume)?;
        if self.revenue.abs() > MAX_AMOUNT {
            return Err(CogsError::InvalidRequest(format!(
                "revenue {} exceeds the limit of {MAX_AMOUNT}",
                self.revenue
            )));
        }
        Ok(())
    }
}

/// A physical stock correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub product_code: ProductCode,
    #[serde(default)]
    pub product_name: Option<String>,
    pub adjusted_on: NaiveDate,
    pub kind: AdjustmentKind,
    pub volume: Decimal,
    /// Cost written off. Only meaningful for losses; absent means zero.
    #[serde(default)]
    pub total_cost: Option<Decimal>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl InventoryAdjustment {
    #[must_use]
    pub fn cost(&self) -> Decimal {
        self.total_cost.unwrap_or_default()
    }

    fn within_limits(&self) -> bool {
        self.volume >= Decimal::ZERO
            && self.volume <= MAX_VOLUME
            && self.cost().abs() <= MAX_AMOUNT
    }
}

/// Report knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Use this cutoff for simulated sales instead of the stored setting.
    #[serde(default)]
    pub cutoff_override: Option<NaiveDate>,
}

/// One costed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub sale_id: SaleId,
    pub sale_date: NaiveDate,
    pub product_code: ProductCode,
    pub product_name: Option<String>,
    pub volume: Decimal,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub profit: Decimal,
    pub margin_pct: Decimal,
    /// Volume that could not be costed for lack of stock.
    pub shortfall: Decimal,
    pub outcome: AllocationOutcome,
    /// Whether the cost comes from a commit record rather than a simulation.
    pub committed: bool,
}

impl SaleLine {
    fn new(sale: &SaleRecord, result: &AllocationResult, committed: bool) -> Self {
        let profit = sale.revenue - result.total_cost;
        Self {
            sale_id: sale.sale_id,
            sale_date: sale.sale_date,
            product_code: sale.product_code.clone(),
            product_name: sale.product_name.clone(),
            volume: sale.volume,
            revenue: sale.revenue,
            cogs: result.total_cost,
            profit,
            margin_pct: margin_pct(profit, sale.revenue),
            shortfall: result.shortfall,
            outcome: result.outcome,
            committed,
        }
    }

    fn presented(&self) -> Self {
        Self {
            volume: present_volume(self.volume),
            revenue: present_money(self.revenue),
            cogs: present_money(self.cogs),
            profit: present_money(self.profit),
            margin_pct: present_money(self.margin_pct),
            shortfall: present_volume(self.shortfall),
            ..self.clone()
        }
    }
}

/// A sale the report could not cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFailure {
    pub sale_id: SaleId,
    pub sale_date: NaiveDate,
    pub product_code: ProductCode,
    pub revenue: Decimal,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

impl SaleFailure {
    fn new(sale: &SaleRecord, err: &CogsError) -> Self {
        Self {
            sale_id: sale.sale_id,
            sale_date: sale.sale_date,
            product_code: sale.product_code.clone(),
            revenue: sale.revenue,
            kind: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// A loss or gain as listed on the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub product_code: ProductCode,
    pub product_name: Option<String>,
    pub volume: Decimal,
    pub cost: Decimal,
}

/// Loss and gain totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub loss_volume: Decimal,
    pub loss_cost: Decimal,
    pub gain_volume: Decimal,
    pub losses: Vec<AdjustmentLine>,
    pub gains: Vec<AdjustmentLine>,
}

impl AdjustmentSummary {
    /// Tally adjustments, optionally for one product only.
    #[must_use]
    pub fn collect<'a, I>(adjustments: I, product: Option<&ProductCode>) -> Self
    where
        I: IntoIterator<Item = &'a InventoryAdjustment>,
    {
        let mut summary = Self::default();
        for adj in adjustments {
            if product.is_some_and(|p| p != &adj.product_code) {
                continue;
            }
            if !adj.within_limits() {
                warn!(
                    product = %adj.product_code,
                    volume = %adj.volume,
                    cost = %adj.cost(),
                    "Adjustment outside ledger limits left out of report"
                );
                continue;
            }
            let line = AdjustmentLine {
                product_code: adj.product_code.clone(),
                product_name: adj.product_name.clone(),
                volume: adj.volume,
                cost: adj.cost(),
            };
            match adj.kind {
                AdjustmentKind::Loss => {
                    summary.loss_volume += line.volume;
                    summary.loss_cost += line.cost;
                    summary.losses.push(line);
                }
                AdjustmentKind::Gain => {
                    summary.gain_volume += line.volume;
                    summary.gains.push(AdjustmentLine {
                        cost: Decimal::ZERO,
                        ..line
                    });
                }
            }
        }
        summary
    }
}

/// Company-wide profit and loss on a FIFO cost basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityReport {
    pub company_id: CompanyId,
    pub cutoff_override: Option<NaiveDate>,
    pub sales_count: usize,
    pub total_volume: Decimal,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_profit: Decimal,
    pub overall_margin: Decimal,
    /// Volume sold that had no stock to cost it against.
    pub unallocated_volume: Decimal,
    /// Revenue of sales listed in `failures`, not included in the totals.
    /// Revenue beyond `MAX_AMOUNT` is not summed.
    pub excluded_revenue: Decimal,
    pub total_loss_volume: Decimal,
    pub total_loss_cost: Decimal,
    pub total_gain_volume: Decimal,
    pub adjusted_profit: Decimal,
    pub adjusted_margin: Decimal,
    pub losses: Vec<AdjustmentLine>,
    pub gains: Vec<AdjustmentLine>,
    pub sales: Vec<SaleLine>,
    pub failures: Vec<SaleFailure>,
}

impl ProfitabilityReport {
    /// Copy with every money figure rounded to cents and every volume to
    /// millilitres.
    #[must_use]
    pub fn presented(&self) -> Self {
        let round_lines = |lines: &[AdjustmentLine]| {
            lines
                .iter()
                .map(|l| AdjustmentLine {
                    volume: present_volume(l.volume),
                    cost: present_money(l.cost),
                    ..l.clone()
                })
                .collect()
        };
        Self {
            company_id: self.company_id,
            cutoff_override: self.cutoff_override,
            sales_count: self.sales_count,
            total_volume: present_volume(self.total_volume),
            total_revenue: present_money(self.total_revenue),
            total_cogs: present_money(self.total_cogs),
            total_profit: present_money(self.total_profit),
            overall_margin: present_money(self.overall_margin),
            unallocated_volume: present_volume(self.unallocated_volume),
            excluded_revenue: present_money(self.excluded_revenue),
            total_loss_volume: present_volume(self.total_loss_volume),
            total_loss_cost: present_money(self.total_loss_cost),
            total_gain_volume: present_volume(self.total_gain_volume),
            adjusted_profit: present_money(self.adjusted_profit),
            adjusted_margin: present_money(self.adjusted_margin),
            losses: round_lines(&self.losses),
            gains: round_lines(&self.gains),
            sales: self.sales.iter().map(SaleLine::presented).collect(),
            failures: self.failures.clone(),
        }
    }
}

/// Per-product rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_code: ProductCode,
    pub product_name: Option<String>,
    pub sales_count: usize,
    pub failed_sales: usize,
    pub total_volume_sold: Decimal,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub profit: Decimal,
    pub margin: Decimal,
    pub loss_volume: Decimal,
    pub loss_cost: Decimal,
    pub gain_volume: Decimal,
    pub adjusted_profit: Decimal,
    pub adjusted_margin: Decimal,
    /// Remaining volume over active batches, ignoring any cutoff.
    pub current_stock: Decimal,
}

impl ProductAnalysis {
    #[must_use]
    pub fn presented(&self) -> Self {
        Self {
            total_volume_sold: present_volume(self.total_volume_sold),
            total_revenue: present_money(self.total_revenue),
            total_cogs: present_money(self.total_cogs),
            profit: present_money(self.profit),
            margin: present_money(self.margin),
            loss_volume: present_volume(self.loss_volume),
            loss_cost: present_money(self.loss_cost),
            gain_volume: present_volume(self.gain_volume),
            adjusted_profit: present_money(self.adjusted_profit),
            adjusted_margin: present_money(self.adjusted_margin),
            current_stock: present_volume(self.current_stock),
            ..self.clone()
        }
    }
}

type Costed<'a> = (&'a SaleRecord, Result<(AllocationResult, bool)>);

/// Cost one product's sales (already in date order).
async fn cost_product<'a, L: BatchLedger>(
    service: &CostingService<L>,
    scope: Scope,
    sales: &[&'a SaleRecord],
    options: ReportOptions,
) -> Vec<Costed<'a>> {
    let fail_all = |err: &CogsError| {
        sales
            .iter()
            .map(|&sale| (sale, Err(err.clone())))
            .collect::<Vec<Costed<'a>>>()
    };

    let engine = match service.engine(&scope).await {
        Ok(engine) => engine,
        Err(err) => return fail_all(&err),
    };
    let engine = match options.cutoff_override {
        Some(cutoff) => Arc::new(AllocationEngine::with_cutoff(
            Arc::clone(service.ledger()),
            scope.clone(),
            Some(cutoff),
            service.config(),
        )),
        None => engine,
    };

    let mut costed: Vec<Option<Result<(AllocationResult, bool)>>> = Vec::with_capacity(sales.len());
    let mut pending = Vec::new();
    for (idx, sale) in sales.iter().enumerate() {
        if let Err(err) = sale.validate() {
            costed.push(Some(Err(err)));
            continue;
        }
        match service
            .committed(scope.company_id, &scope.product_code, sale.sale_id)
            .await
        {
            Ok(Some(record))
                if record.product_code == sale.product_code
                    && record.result.requested_volume == sale.volume =>
            {
                costed.push(Some(Ok((record.result, true))));
            }
            Ok(Some(record)) => costed.push(Some(Err(CogsError::InvalidRequest(format!(
                "sale {} was committed as {} of {}",
                sale.sale_id, record.result.requested_volume, record.product_code
            ))))),
            Ok(None) => {
                costed.push(None);
                pending.push(idx);
            }
            Err(err) => costed.push(Some(Err(err))),
        }
    }

    let requests: Vec<(NaiveDate, Decimal)> = pending
        .iter()
        .filter_map(|&idx| sales.get(idx).map(|s| (s.sale_date, s.volume)))
        .collect();
    match engine.simulate_sequence(&requests).await {
        Ok(results) => {
            for (&idx, result) in pending.iter().zip(results) {
                if let Some(slot) = costed.get_mut(idx) {
                    *slot = Some(result.map(|r| (r, false)));
                }
            }
        }
        Err(err) => {
            for &idx in &pending {
                if let Some(slot) = costed.get_mut(idx) {
                    *slot = Some(Err(err.clone()));
                }
            }
        }
    }

    sales
        .iter()
        .zip(costed)
        .map(|(&sale, outcome)| {
            let outcome = outcome.unwrap_or_else(|| {
                Err(CogsError::InvariantViolation(format!(
                    "sale {} was not costed",
                    sale.sale_id
                )))
            });
            (sale, outcome)
        })
        .collect()
}

fn by_product(sales: &[SaleRecord]) -> BTreeMap<ProductCode, Vec<&SaleRecord>> {
    let mut sorted: Vec<&SaleRecord> = sales.iter().collect();
    sorted.sort_by_key(|s| (s.sale_date, s.sale_id));

    let mut grouped: BTreeMap<ProductCode, Vec<&SaleRecord>> = BTreeMap::new();
    for sale in sorted {
        grouped.entry(sale.product_code.clone()).or_default().push(sale);
    }
    grouped
}

/// Build the company profitability report.
///
/// Never fails as a whole: anything that goes wrong costing a sale is
/// recorded in [`ProfitabilityReport::failures`].
pub async fn profitability_report<L: BatchLedger>(
    service: &CostingService<L>,
    company_id: CompanyId,
    sales: &[SaleRecord],
    adjustments: &[InventoryAdjustment],
    options: ReportOptions,
) -> ProfitabilityReport {
    let mut lines = Vec::with_capacity(sales.len());
    let mut failures = Vec::new();

    for (product_code, group) in by_product(sales) {
        let scope = Scope::new(company_id, product_code);
        for (sale, outcome) in cost_product(service, scope, &group, options).await {
            match outcome {
                Ok((result, committed)) => lines.push(SaleLine::new(sale, &result, committed)),
                Err(err) => {
                    warn!(
                        sale_id = %sale.sale_id,
                        product = %sale.product_code,
                        error = %err,
                        "Sale excluded from profitability report"
                    );
                    failures.push(SaleFailure::new(sale, &err));
                }
            }
        }
    }
    lines.sort_by_key(|l| (l.sale_date, l.sale_id));

    let total_volume: Decimal = lines.iter().map(|l| l.volume).sum();
    let total_revenue: Decimal = lines.iter().map(|l| l.revenue).sum();
    let total_cogs: Decimal = lines.iter().map(|l| l.cogs).sum();
    let unallocated_volume: Decimal = lines.iter().map(|l| l.shortfall).sum();
    let excluded_revenue: Decimal = failures
        .iter()
        .map(|f| f.revenue)
        .filter(|r| r.abs() <= MAX_AMOUNT)
        .sum();
    let total_profit = total_revenue - total_cogs;

    let adjustments = AdjustmentSummary::collect(adjustments, None);
    let adjusted_profit = total_profit - adjustments.loss_cost;

    info!(
        company_id = %company_id,
        sales = lines.len(),
        failures = failures.len(),
        total_cogs = %total_cogs,
        "Built profitability report"
    );

    ProfitabilityReport {
        company_id,
        cutoff_override: options.cutoff_override,
        sales_count: lines.len(),
        total_volume,
        total_revenue,
        total_cogs,
        total_profit,
        overall_margin: margin_pct(total_profit, total_revenue),
        unallocated_volume,
        excluded_revenue,
        total_loss_volume: adjustments.loss_volume,
        total_loss_cost: adjustments.loss_cost,
        total_gain_volume: adjustments.gain_volume,
        adjusted_profit,
        adjusted_margin: margin_pct(adjusted_profit, total_revenue),
        losses: adjustments.losses,
        gains: adjustments.gains,
        sales: lines,
        failures,
    }
}

/// Roll the profitability report up per product and attach current stock.
///
/// Products without sales are left out.
///
/// # Errors
///
/// Returns [`CogsError::PersistenceUnavailable`] if current stock cannot be
/// read.
pub async fn product_analysis<L: BatchLedger>(
    service: &CostingService<L>,
    company_id: CompanyId,
    sales: &[SaleRecord],
    adjustments: &[InventoryAdjustment],
    options: ReportOptions,
) -> Result<Vec<ProductAnalysis>> {
    let report = profitability_report(service, company_id, sales, adjustments, options).await;

    let mut analyses = Vec::new();
    for (product_code, group) in by_product(sales) {
        let product_lines: Vec<&SaleLine> = report
            .sales
            .iter()
            .filter(|l| l.product_code == product_code)
            .collect();
        let failed_sales = report
            .failures
            .iter()
            .filter(|f| f.product_code == product_code)
            .count();

        let total_volume_sold: Decimal = product_lines.iter().map(|l| l.volume).sum();
        let total_revenue: Decimal = product_lines.iter().map(|l| l.revenue).sum();
        let total_cogs: Decimal = product_lines.iter().map(|l| l.cogs).sum();
        let profit = total_revenue - total_cogs;

        let adj = AdjustmentSummary::collect(adjustments, Some(&product_code));
        let adjusted_profit = profit - adj.loss_cost;
        let current_stock = service.current_stock(company_id, &product_code).await?;
        let product_name = group.iter().find_map(|s| s.product_name.clone());

        analyses.push(ProductAnalysis {
            product_code,
            product_name,
            sales_count: product_lines.len(),
            failed_sales,
            total_volume_sold,
            total_revenue,
            total_cogs,
            profit,
            margin: margin_pct(profit, total_revenue),
            loss_volume: adj.loss_volume,
            loss_cost: adj.loss_cost,
            gain_volume: adj.gain_volume,
            adjusted_profit,
            adjusted_margin: margin_pct(adjusted_profit, total_revenue),
            current_stock,
        });
    }
    Ok(analyses)
}
