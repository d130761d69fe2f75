//! Worked FIFO examples run through the costing service.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fuelcost_core::{AllocationOutcome, BatchError, MAX_AMOUNT, MAX_UNIT_COST, MAX_VOLUME};
use fuelcost_engine::{CogsError, InMemoryLedger, LedgerError, Scope};
use fuelcost_integration_tests::{
    company, date, gasoline, gasoline_ledger, purchase, service, two_batch_ledger,
};

// =============================================================================
// Fulfilled and Short Requests
// =============================================================================

#[tokio::test]
async fn test_request_spanning_two_batches() {
    let service = service(two_batch_ledger());
    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(120))
        .await
        .unwrap();

    assert_eq!(result.outcome, AllocationOutcome::Fulfilled);
    assert_eq!(result.line_items.len(), 2);
    assert_eq!(result.line_items[0].volume, dec!(100));
    assert_eq!(result.line_items[0].cost, dec!(200.00));
    assert_eq!(result.line_items[1].volume, dec!(20));
    assert_eq!(result.line_items[1].cost, dec!(50.00));
    assert_eq!(result.total_cost, dec!(250.00));
    assert_eq!(result.shortfall, Decimal::ZERO);
}

#[tokio::test]
async fn test_request_beyond_stock_reports_shortfall() {
    let service = service(two_batch_ledger());
    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(200))
        .await
        .unwrap();

    assert_eq!(result.outcome, AllocationOutcome::PartiallyFulfilled);
    assert_eq!(result.total_volume, dec!(150));
    assert_eq!(result.total_cost, dec!(325.00));
    assert_eq!(result.shortfall, dec!(50));
    assert!(result.is_consistent());
}

// =============================================================================
// Cutoff
// =============================================================================

#[tokio::test]
async fn test_cutoff_excludes_older_batches() {
    let ledger = two_batch_ledger();
    ledger
        .set_company_cutoff(company(), Some(date(1, 3)))
        .unwrap();
    let service = service(ledger);

    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(30))
        .await
        .unwrap();

    assert_eq!(result.line_items.len(), 1);
    assert_eq!(result.line_items[0].acquired_on, date(1, 5));
    assert_eq!(result.total_cost, dec!(75.00));
}

#[tokio::test]
async fn test_product_cutoff_overrides_company_cutoff() {
    let ledger = two_batch_ledger();
    ledger
        .set_company_cutoff(company(), Some(date(1, 3)))
        .unwrap();
    ledger
        .set_product_cutoff(Scope::new(company(), gasoline()), Some(date(1, 1)))
        .unwrap();
    let service = service(ledger);

    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(30))
        .await
        .unwrap();

    assert_eq!(result.total_cost, dec!(60.00));
}

#[tokio::test]
async fn test_cutoff_after_all_batches_leaves_no_supply() {
    let ledger = two_batch_ledger();
    ledger
        .set_company_cutoff(company(), Some(date(3, 1)))
        .unwrap();
    let service = service(ledger);

    let result = service
        .simulate(company(), &gasoline(), date(3, 2), dec!(10))
        .await
        .unwrap();

    assert_eq!(result.outcome, AllocationOutcome::NoEligibleSupply);
    assert!(result.line_items.is_empty());
    assert_eq!(result.shortfall, dec!(10));
}

// =============================================================================
// Edge Cases
// =============================================================================

#[tokio::test]
async fn test_zero_volume_is_not_an_error() {
    let service = service(two_batch_ledger());
    let result = service
        .simulate(company(), &gasoline(), date(2, 1), Decimal::ZERO)
        .await
        .unwrap();

    assert_eq!(result.outcome, AllocationOutcome::NothingRequested);
    assert!(result.line_items.is_empty());
    assert_eq!(result.total_cost, Decimal::ZERO);
    assert_eq!(result.shortfall, Decimal::ZERO);
}

#[tokio::test]
async fn test_negative_volume_is_rejected() {
    let service = service(two_batch_ledger());
    let err = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(-1))
        .await
        .unwrap_err();

    assert!(matches!(err, CogsError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_unknown_product_is_rejected() {
    let service = service(two_batch_ledger());
    let err = service
        .simulate(
            company(),
            &fuelcost_integration_tests::diesel(),
            date(2, 1),
            dec!(10),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CogsError::InvalidRequest(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_same_day_batches_consumed_in_id_order() {
    let ledger = fuelcost_integration_tests::gasoline_ledger(&[
        (date(1, 2), dec!(10), dec!(3.00)),
        (date(1, 2), dec!(10), dec!(1.00)),
    ]);
    let service = service(ledger);

    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(15))
        .await
        .unwrap();

    assert_eq!(result.line_items[0].unit_cost, dec!(3.00));
    assert_eq!(result.line_items[1].unit_cost, dec!(1.00));
    assert_eq!(result.total_cost, dec!(35.00));
}

#[tokio::test]
async fn test_fractional_volumes_cost_exactly() {
    let ledger = fuelcost_integration_tests::gasoline_ledger(&[(
        date(1, 1),
        dec!(1000),
        dec!(5.4321),
    )]);
    let service = service(ledger);

    let result = service
        .simulate(company(), &gasoline(), date(2, 1), dec!(12.345))
        .await
        .unwrap();

    assert_eq!(result.total_cost, dec!(67.0592745));
    assert_eq!(result.presented().total_cost, dec!(67.06));
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_oversized_purchase_is_rejected() {
    let ledger = InMemoryLedger::new();
    let err = ledger
        .record_purchase(purchase(company(), &gasoline(), date(1, 1), Decimal::MAX, dec!(2)))
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Batch(BatchError::VolumeTooLarge { .. })
    ));
    assert!(ledger.snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn test_largest_batch_costs_without_overflow() {
    let service = service(gasoline_ledger(&[(date(1, 1), MAX_VOLUME, MAX_UNIT_COST)]));

    let result = service
        .simulate(company(), &gasoline(), date(2, 1), MAX_VOLUME)
        .await
        .unwrap();
    assert_eq!(result.outcome, AllocationOutcome::Fulfilled);
    assert_eq!(result.total_cost, MAX_AMOUNT);

    let err = service
        .simulate(company(), &gasoline(), date(2, 1), Decimal::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, CogsError::InvalidRequest(_)));
}
