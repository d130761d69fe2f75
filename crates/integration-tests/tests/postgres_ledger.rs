//! The costing contracts against the `PostgreSQL` ledger.
//!
//! Skipped unless `COGS_TEST_DATABASE_URL` points at a database the tests
//! may migrate. Each test works in its own company so runs never collide.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fuelcost_core::{AllocationOutcome, CompanyId, SaleId};
use fuelcost_engine::{CogsError, CostingService, EngineConfig};
use fuelcost_integration_tests::{date, gasoline, purchase, test_pool, unique_company};
use fuelcost_store::{BatchRepository, PgBatchLedger, ProductRepository, SaleRepository};

async fn seed_two_batches(pool: &sqlx::PgPool, company_id: CompanyId) {
    let batches = BatchRepository::new(pool);
    batches
        .record_purchase(&purchase(company_id, &gasoline(), date(1, 1), dec!(100), dec!(2.00)))
        .await
        .unwrap();
    batches
        .record_purchase(&purchase(company_id, &gasoline(), date(1, 5), dec!(50), dec!(2.50)))
        .await
        .unwrap();
}

fn pg_service(pool: &sqlx::PgPool) -> CostingService<PgBatchLedger> {
    CostingService::new(
        Arc::new(PgBatchLedger::new(pool.clone())),
        EngineConfig::default(),
    )
}

// =============================================================================
// Allocation
// =============================================================================

#[tokio::test]
async fn test_pg_simulate_matches_worked_examples() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    seed_two_batches(&pool, company_id).await;
    let service = pg_service(&pool);

    let fulfilled = service
        .simulate(company_id, &gasoline(), date(2, 1), dec!(120))
        .await
        .unwrap();
    assert_eq!(fulfilled.total_cost, dec!(250.00));

    let short = service
        .simulate(company_id, &gasoline(), date(2, 1), dec!(200))
        .await
        .unwrap();
    assert_eq!(short.total_cost, dec!(325.00));
    assert_eq!(short.shortfall, dec!(50));
}

#[tokio::test]
async fn test_pg_cutoff_excludes_older_batches() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    seed_two_batches(&pool, company_id).await;
    ProductRepository::new(&pool)
        .set_company_cutoff(company_id, Some(date(1, 3)))
        .await
        .unwrap();
    let service = pg_service(&pool);

    let result = service
        .simulate(company_id, &gasoline(), date(2, 1), dec!(30))
        .await
        .unwrap();

    assert_eq!(result.line_items.len(), 1);
    assert_eq!(result.total_cost, dec!(75.00));
}

#[tokio::test]
async fn test_pg_unknown_product_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let err = pg_service(&pool)
        .simulate(unique_company(), &gasoline(), date(2, 1), dec!(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CogsError::InvalidRequest(_)));
}

// =============================================================================
// Commit
// =============================================================================

#[tokio::test]
async fn test_pg_commit_persists_and_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    seed_two_batches(&pool, company_id).await;
    let service = pg_service(&pool);

    let first = service
        .commit(company_id, &gasoline(), SaleId::new(1), date(2, 1), dec!(120))
        .await
        .unwrap();
    // A fresh service has no cached engine and must read the stored record.
    let replay = pg_service(&pool)
        .commit(company_id, &gasoline(), SaleId::new(1), date(2, 1), dec!(120))
        .await
        .unwrap();

    assert_eq!(first, replay);
    let stock = BatchRepository::new(&pool)
        .current_stock(company_id, &gasoline())
        .await
        .unwrap();
    assert_eq!(stock, dec!(30));

    let batches = BatchRepository::new(&pool)
        .list(company_id, &gasoline())
        .await
        .unwrap();
    assert!(!batches[0].is_active());
    assert_eq!(batches[1].remaining_volume(), dec!(30));
}

#[tokio::test]
async fn test_pg_no_supply_commit_is_recorded() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    seed_two_batches(&pool, company_id).await;
    // Both batches predate the cutoff, so the product is known but has no
    // eligible stock.
    ProductRepository::new(&pool)
        .set_product_cutoff(company_id, &gasoline(), Some(date(1, 10)))
        .await
        .unwrap();
    let service = pg_service(&pool);

    let result = service
        .commit(company_id, &gasoline(), SaleId::new(9), date(2, 1), dec!(10))
        .await
        .unwrap();

    assert_eq!(result.outcome, AllocationOutcome::NoEligibleSupply);
    let stored = service
        .committed(company_id, &gasoline(), SaleId::new(9))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.result, result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_concurrent_services_never_oversell() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    seed_two_batches(&pool, company_id).await;
    let config = EngineConfig {
        max_commit_attempts: 50,
    };

    let mut handles = Vec::new();
    for sale in 1..=16_i64 {
        // One service per task: no shared in-process gate.
        let service =
            CostingService::new(Arc::new(PgBatchLedger::new(pool.clone())), config);
        handles.push(tokio::spawn(async move {
            service
                .commit(company_id, &gasoline(), SaleId::new(sale), date(2, 1), dec!(10))
                .await
        }));
    }

    let mut allocated = Decimal::ZERO;
    for handle in handles {
        allocated += handle.await.unwrap().unwrap().total_volume;
    }

    assert_eq!(allocated, dec!(150));
    let stock = BatchRepository::new(&pool)
        .current_stock(company_id, &gasoline())
        .await
        .unwrap();
    assert_eq!(stock, Decimal::ZERO);
}

// =============================================================================
// Sales
// =============================================================================

#[tokio::test]
async fn test_pg_duplicate_sale_is_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let company_id = unique_company();
    let sales = SaleRepository::new(&pool);
    let record = fuelcost_engine::SaleRecord {
        sale_id: SaleId::new(1),
        product_code: gasoline(),
        product_name: Some("Gasoline C".to_string()),
        sale_date: date(2, 1),
        volume: dec!(10),
        revenue: dec!(30.00),
    };

    sales.record(company_id, &record).await.unwrap();
    let err = sales.record(company_id, &record).await.unwrap_err();

    assert!(matches!(err, fuelcost_store::RepositoryError::Conflict(_)));
    let listed = sales.list(company_id, None, None).await.unwrap();
    assert_eq!(listed, vec![record]);
}
