// Property tests for FIFO allocation over random ledgers.
// CI: 64 cases (default). Soak: PROPTEST_CASES=2000 cargo test --release

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use fuelcost_core::{AllocationOutcome, SaleId};
use fuelcost_engine::{InMemoryLedger, Scope};
use fuelcost_integration_tests::{company, date, gasoline, gasoline_ledger, service};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Volume with up to three decimal places, 0.001 to 1000.000 L.
fn arb_volume() -> impl Strategy<Value = Decimal> {
    (1_i64..=1_000_000).prop_map(|millis| Decimal::new(millis, 3))
}

/// Unit cost with four decimal places, 0.5000 to 9.9999.
fn arb_unit_cost() -> impl Strategy<Value = Decimal> {
    (5_000_i64..=99_999).prop_map(|c| Decimal::new(c, 4))
}

/// Up to eight batches spread over January, dates possibly repeating.
fn arb_batches() -> impl Strategy<Value = Vec<(NaiveDate, Decimal, Decimal)>> {
    prop::collection::vec(
        (1_u32..=31, arb_volume(), arb_unit_cost())
            .prop_map(|(day, volume, cost)| (date(1, day), volume, cost)),
        0..8,
    )
}

fn total_stock(ledger: &InMemoryLedger) -> Decimal {
    ledger
        .remaining_volume(&Scope::new(company(), gasoline()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    /// Allocated volume is the lesser of request and stock, and costs are
    /// the exact sum of volume times unit cost.
    #[test]
    fn prop_allocation_conserves_volume_and_cost(
        batches in arb_batches(),
        requested in arb_volume(),
    ) {
        let ledger = gasoline_ledger(&batches);
        let stock = total_stock(&ledger);
        let service = service(Arc::clone(&ledger));

        let result = runtime()
            .block_on(service.simulate(company(), &gasoline(), date(2, 1), requested))
            .unwrap();

        prop_assert_eq!(result.total_volume, requested.min(stock));
        prop_assert_eq!(result.total_volume + result.shortfall, requested);
        let expected_cost: Decimal = result
            .line_items
            .iter()
            .map(|l| l.volume * l.unit_cost)
            .sum();
        prop_assert_eq!(result.total_cost, expected_cost);
        prop_assert!(result.is_consistent());
        if stock.is_zero() {
            prop_assert_eq!(result.outcome, AllocationOutcome::NoEligibleSupply);
        }
    }

    /// Line items follow acquisition order and only the last may be partial.
    #[test]
    fn prop_allocation_is_fifo(
        batches in arb_batches(),
        requested in arb_volume(),
    ) {
        let ledger = gasoline_ledger(&batches);
        let service = service(ledger);

        let result = runtime()
            .block_on(service.simulate(company(), &gasoline(), date(2, 1), requested))
            .unwrap();

        for pair in result.line_items.windows(2) {
            prop_assert!(pair[0].acquired_on <= pair[1].acquired_on);
            prop_assert!(pair[0].batch_id < pair[1].batch_id || pair[0].acquired_on < pair[1].acquired_on);
        }
        if let Some((_, earlier)) = result.line_items.split_last() {
            for item in earlier {
                prop_assert_eq!(item.volume, item.remaining_before);
            }
        }
    }

    /// Same ledger, same request, same answer.
    #[test]
    fn prop_simulation_is_deterministic(
        batches in arb_batches(),
        requested in arb_volume(),
    ) {
        let rt = runtime();
        let first = rt
            .block_on(service(gasoline_ledger(&batches)).simulate(company(), &gasoline(), date(2, 1), requested))
            .unwrap();
        let second = rt
            .block_on(service(gasoline_ledger(&batches)).simulate(company(), &gasoline(), date(2, 1), requested))
            .unwrap();

        prop_assert_eq!(first, second);
    }

    /// A run of commits never takes more than was acquired, and stock left
    /// plus volume allocated equals stock at the start.
    #[test]
    fn prop_commits_conserve_stock(
        batches in arb_batches(),
        requests in prop::collection::vec(arb_volume(), 1..10),
    ) {
        let ledger = gasoline_ledger(&batches);
        let initial = total_stock(&ledger);
        let service = service(Arc::clone(&ledger));
        let rt = runtime();

        let mut allocated = Decimal::ZERO;
        for (sale, volume) in (1_i64..).zip(&requests) {
            let result = rt
                .block_on(service.commit(company(), &gasoline(), SaleId::new(sale), date(2, 1), *volume))
                .unwrap();
            prop_assert!(result.is_consistent());
            allocated += result.total_volume;
        }

        prop_assert!(allocated <= initial);
        prop_assert_eq!(total_stock(&ledger) + allocated, initial);
        for batch in ledger.snapshot().unwrap() {
            prop_assert!(batch.remaining_volume() >= Decimal::ZERO);
            prop_assert!(batch.remaining_volume() <= batch.acquired_volume());
            prop_assert_eq!(batch.is_active(), !batch.remaining_volume().is_zero());
        }
    }
}
