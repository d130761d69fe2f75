//! `PostgreSQL` implementation of [`BatchLedger`].
//!
//! A commit runs in one transaction:
//!
//! 1. Take a transaction-scoped advisory lock keyed on the scope, so commits
//!    for the same (company, product) queue up across processes.
//! 2. Insert the `sale_commit` row. Its primary key makes a second commit
//!    for the same sale fail with [`LedgerError::AlreadyCommitted`].
//! 3. Decrement each batch with a compare-and-swap on `remaining_volume`.
//!    Zero rows updated means the allocation was computed from a stale read.
//! 4. Insert the line items and commit.
//!
//! Any failure drops the transaction, so no partial decrement is ever
//! visible.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use fuelcost_core::{
    AllocationOutcome, AllocationResult, Batch, BatchId, BatchStatus, LineItem, ProductCode,
    SaleId,
};
use fuelcost_engine::{BatchLedger, CommitRecord, LedgerError, Scope};

use super::batches::{BatchRepository, fetch_eligible};
use super::products::ProductRepository;
use super::{RepositoryError, map_unique_violation};

/// Internal row type for commit headers.
#[derive(Debug, sqlx::FromRow)]
struct CommitRow {
    sale_id: SaleId,
    product_code: ProductCode,
    sale_date: NaiveDate,
    requested_volume: Decimal,
    total_volume: Decimal,
    total_cost: Decimal,
    shortfall: Decimal,
    outcome: AllocationOutcome,
}

/// Internal row type for commit line items.
#[derive(Debug, sqlx::FromRow)]
struct LineItemRow {
    batch_id: BatchId,
    acquired_on: NaiveDate,
    unit_cost: Decimal,
    volume: Decimal,
    cost: Decimal,
    remaining_before: Decimal,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        Self {
            batch_id: row.batch_id,
            acquired_on: row.acquired_on,
            unit_cost: row.unit_cost,
            volume: row.volume,
            cost: row.cost,
            remaining_before: row.remaining_before,
        }
    }
}

/// Batch ledger stored in the `cogs` schema.
#[derive(Debug, Clone)]
pub struct PgBatchLedger {
    pool: PgPool,
}

impl PgBatchLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_commit(
        &self,
        scope: &Scope,
        sale_id: SaleId,
    ) -> Result<Option<CommitRecord>, RepositoryError> {
        let Some(header) = sqlx::query_as::<_, CommitRow>(
            r"
            SELECT sale_id, product_code, sale_date, requested_volume,
                   total_volume, total_cost, shortfall, outcome
            FROM cogs.sale_commit
            WHERE company_id = $1 AND sale_id = $2
            ",
        )
        .bind(scope.company_id)
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let line_items = sqlx::query_as::<_, LineItemRow>(
            r"
            SELECT batch_id, acquired_on, unit_cost, volume, cost, remaining_before
            FROM cogs.sale_allocation
            WHERE company_id = $1 AND sale_id = $2
            ORDER BY line_no
            ",
        )
        .bind(scope.company_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(LineItem::from)
        .collect();

        Ok(Some(CommitRecord {
            sale_id: header.sale_id,
            product_code: header.product_code,
            sale_date: header.sale_date,
            result: AllocationResult {
                requested_volume: header.requested_volume,
                total_volume: header.total_volume,
                total_cost: header.total_cost,
                shortfall: header.shortfall,
                outcome: header.outcome,
                line_items,
            },
        }))
    }

    async fn write_commit(
        tx: &mut Transaction<'_, Postgres>,
        scope: &Scope,
        record: &CommitRecord,
    ) -> Result<(), LedgerError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(scope.to_string())
            .execute(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;

        let result = &record.result;
        sqlx::query(
            r"
            INSERT INTO cogs.sale_commit (
                company_id, sale_id, product_code, sale_date, requested_volume,
                total_volume, total_cost, shortfall, outcome
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(scope.company_id)
        .bind(record.sale_id)
        .bind(&record.product_code)
        .bind(record.sale_date)
        .bind(result.requested_volume)
        .bind(result.total_volume)
        .bind(result.total_cost)
        .bind(result.shortfall)
        .bind(result.outcome)
        .execute(&mut **tx)
        .await
        .map_err(|e| match map_unique_violation(e, "sale already committed") {
            RepositoryError::Conflict(_) => LedgerError::AlreadyCommitted(record.sale_id),
            other => other.into(),
        })?;

        for (line_no, item) in (1_i32..).zip(&result.line_items) {
            let remaining_after = item.remaining_after();
            let updated = sqlx::query(
                r"
                UPDATE cogs.batch
                SET remaining_volume = $1, status = $2, updated_at = NOW()
                WHERE id = $3
                  AND company_id = $4
                  AND product_code = $5
                  AND status = 'active'
                  AND remaining_volume = $6
                ",
            )
            .bind(remaining_after)
            .bind(BatchStatus::for_remaining(remaining_after))
            .bind(item.batch_id)
            .bind(scope.company_id)
            .bind(&scope.product_code)
            .bind(item.remaining_before)
            .execute(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;

            if updated.rows_affected() == 0 {
                return Err(LedgerError::StaleSnapshot {
                    batch_id: item.batch_id,
                    expected: item.remaining_before,
                });
            }

            sqlx::query(
                r"
                INSERT INTO cogs.sale_allocation (
                    company_id, sale_id, line_no, batch_id, acquired_on,
                    unit_cost, volume, cost, remaining_before
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(scope.company_id)
            .bind(record.sale_id)
            .bind(line_no)
            .bind(item.batch_id)
            .bind(item.acquired_on)
            .bind(item.unit_cost)
            .bind(item.volume)
            .bind(item.cost)
            .bind(item.remaining_before)
            .execute(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        Ok(())
    }
}

impl BatchLedger for PgBatchLedger {
    async fn eligible_batches(
        &self,
        scope: &Scope,
        cutoff: Option<NaiveDate>,
    ) -> Result<Vec<Batch>, LedgerError> {
        Ok(fetch_eligible(&self.pool, scope.company_id, &scope.product_code, cutoff).await?)
    }

    async fn find_commit(
        &self,
        scope: &Scope,
        sale_id: SaleId,
    ) -> Result<Option<CommitRecord>, LedgerError> {
        Ok(self.load_commit(scope, sale_id).await?)
    }

    async fn apply_commit(&self, scope: &Scope, record: &CommitRecord) -> Result<(), LedgerError> {
        if record.product_code != scope.product_code {
            return Err(LedgerError::Corrupt(format!(
                "commit for {} applied to scope {scope}",
                record.product_code
            )));
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        Self::write_commit(&mut tx, scope, record).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::debug!(
            %scope,
            sale_id = %record.sale_id,
            line_items = record.result.line_items.len(),
            "Commit persisted"
        );
        Ok(())
    }

    async fn cost_basis_cutoff(&self, scope: &Scope) -> Result<Option<NaiveDate>, LedgerError> {
        Ok(ProductRepository::new(&self.pool)
            .effective_cutoff(scope.company_id, &scope.product_code)
            .await?)
    }

    async fn product_exists(&self, scope: &Scope) -> Result<bool, LedgerError> {
        Ok(ProductRepository::new(&self.pool)
            .get(scope.company_id, &scope.product_code)
            .await?
            .is_some())
    }

    async fn current_stock(&self, scope: &Scope) -> Result<Decimal, LedgerError> {
        Ok(BatchRepository::new(&self.pool)
            .current_stock(scope.company_id, &scope.product_code)
            .await?)
    }
}
