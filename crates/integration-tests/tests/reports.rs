//! Profitability report behavior over the in-memory ledger.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fuelcost_core::{AdjustmentKind, ProductCode, SaleId};
use fuelcost_engine::{
    InventoryAdjustment, ReportOptions, SaleRecord, product_analysis, profitability_report,
};
use fuelcost_integration_tests::{company, date, gasoline, service, two_batch_ledger};

fn sale(id: i64, product_code: &ProductCode, day: u32, volume: Decimal, revenue: Decimal) -> SaleRecord {
    SaleRecord {
        sale_id: SaleId::new(id),
        product_code: product_code.clone(),
        product_name: None,
        sale_date: date(2, day),
        volume,
        revenue,
    }
}

fn loss(volume: Decimal, total_cost: Decimal) -> InventoryAdjustment {
    InventoryAdjustment {
        product_code: gasoline(),
        product_name: None,
        adjusted_on: date(2, 28),
        kind: AdjustmentKind::Loss,
        volume,
        total_cost: Some(total_cost),
        reason: Some("evaporation".to_string()),
    }
}

// =============================================================================
// Totals
// =============================================================================

#[tokio::test]
async fn test_sales_costed_in_date_order() {
    let service = service(two_batch_ledger());
    // Listed out of order on purpose.
    let sales = [
        sale(2, &gasoline(), 2, dec!(40), dec!(120.00)),
        sale(1, &gasoline(), 1, dec!(80), dec!(200.00)),
    ];

    let report =
        profitability_report(&service, company(), &sales, &[], ReportOptions::default()).await;

    assert_eq!(report.sales_count, 2);
    assert_eq!(report.sales[0].sale_id, SaleId::new(1));
    assert_eq!(report.sales[0].cogs, dec!(160.00));
    assert_eq!(report.sales[1].cogs, dec!(90.00));
    assert_eq!(report.total_profit, dec!(70.00));
    assert_eq!(report.overall_margin, dec!(70.00) / dec!(320.00) * dec!(100));
}

#[tokio::test]
async fn test_losses_reduce_adjusted_profit() {
    let service = service(two_batch_ledger());
    let sales = [sale(1, &gasoline(), 1, dec!(50), dec!(150.00))];
    let adjustments = [loss(dec!(2), dec!(4.00)), loss(dec!(1), dec!(2.00))];

    let report = profitability_report(
        &service,
        company(),
        &sales,
        &adjustments,
        ReportOptions::default(),
    )
    .await;

    assert_eq!(report.total_profit, dec!(50.00));
    assert_eq!(report.total_loss_volume, dec!(3));
    assert_eq!(report.total_loss_cost, dec!(6.00));
    assert_eq!(report.adjusted_profit, dec!(44.00));
    assert_eq!(report.losses.len(), 2);
}

// =============================================================================
// Failures and Cutoffs
// =============================================================================

#[tokio::test]
async fn test_unknown_product_sale_is_excluded_not_fatal() {
    let service = service(two_batch_ledger());
    let kerosene = ProductCode::parse("KEROSENE").unwrap();
    let sales = [
        sale(1, &gasoline(), 1, dec!(10), dec!(30.00)),
        sale(2, &kerosene, 1, dec!(10), dec!(45.00)),
    ];

    let report =
        profitability_report(&service, company(), &sales, &[], ReportOptions::default()).await;

    assert_eq!(report.sales_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sale_id, SaleId::new(2));
    assert_eq!(report.failures[0].kind, "invalid_request");
    assert_eq!(report.excluded_revenue, dec!(45.00));
    assert_eq!(report.total_revenue, dec!(30.00));
}

#[tokio::test]
async fn test_cutoff_override_changes_simulated_cost_only() {
    let ledger = two_batch_ledger();
    let service = service(Arc::clone(&ledger));
    service
        .commit(company(), &gasoline(), SaleId::new(1), date(2, 1), dec!(10))
        .await
        .unwrap();
    let sales = [
        sale(1, &gasoline(), 1, dec!(10), dec!(30.00)),
        sale(2, &gasoline(), 2, dec!(10), dec!(30.00)),
    ];

    let report = profitability_report(
        &service,
        company(),
        &sales,
        &[],
        ReportOptions {
            cutoff_override: Some(date(1, 3)),
        },
    )
    .await;

    // Sale 1 keeps its booked cost from the first batch.
    assert!(report.sales[0].committed);
    assert_eq!(report.sales[0].cogs, dec!(20.00));
    // Sale 2 is simulated against the second batch only.
    assert!(!report.sales[1].committed);
    assert_eq!(report.sales[1].cogs, dec!(25.00));
}

#[tokio::test]
async fn test_unallocated_volume_is_reported() {
    let service = service(two_batch_ledger());
    let sales = [sale(1, &gasoline(), 1, dec!(200), dec!(600.00))];

    let report =
        profitability_report(&service, company(), &sales, &[], ReportOptions::default()).await;

    assert_eq!(report.unallocated_volume, dec!(50));
    assert_eq!(report.total_cogs, dec!(325.00));
}

// =============================================================================
// Product Analysis
// =============================================================================

#[tokio::test]
async fn test_product_analysis_reports_current_stock() {
    let ledger = two_batch_ledger();
    let service = service(Arc::clone(&ledger));
    service
        .commit(company(), &gasoline(), SaleId::new(1), date(2, 1), dec!(30))
        .await
        .unwrap();
    let sales = [
        sale(1, &gasoline(), 1, dec!(30), dec!(90.00)),
        sale(2, &gasoline(), 2, dec!(10), dec!(30.00)),
    ];

    let products = product_analysis(
        &service,
        company(),
        &sales,
        &[loss(dec!(1), dec!(2.00))],
        ReportOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(products.len(), 1);
    let gas = &products[0];
    assert_eq!(gas.sales_count, 2);
    assert_eq!(gas.total_cogs, dec!(80.00));
    assert_eq!(gas.loss_cost, dec!(2.00));
    assert_eq!(gas.adjusted_profit, dec!(38.00));
    // Only the committed sale has consumed stock.
    assert_eq!(gas.current_stock, dec!(120));
}
