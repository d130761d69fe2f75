//! Database operations for inventory batches.
//!
//! All queries are runtime-checked (`query_as` with `FromRow` rows), so the
//! crate builds without a live database.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};

use fuelcost_core::{Batch, BatchId, BatchStatus, CompanyId, NewBatch, ProductCode};

use super::RepositoryError;
use super::products::ensure_product;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for batch queries.
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: BatchId,
    company_id: CompanyId,
    product_code: ProductCode,
    acquired_on: NaiveDate,
    acquired_volume: Decimal,
    remaining_volume: Decimal,
    unit_cost: Decimal,
    status: BatchStatus,
    reference: Option<String>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = RepositoryError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Self::restore(
            row.id,
            row.company_id,
            row.product_code,
            row.acquired_on,
            row.acquired_volume,
            row.remaining_volume,
            row.unit_cost,
            row.status,
            row.reference,
        )
        .map_err(|e| RepositoryError::DataCorruption(format!("batch {id}: {e}")))
    }
}

const BATCH_COLUMNS: &str = "id, company_id, product_code, acquired_on, acquired_volume, \
     remaining_volume, unit_cost, status, reference";

/// Active batches for a scope in FIFO order, optionally on or after `cutoff`.
pub(crate) async fn fetch_eligible<'e>(
    executor: impl PgExecutor<'e>,
    company_id: CompanyId,
    product_code: &ProductCode,
    cutoff: Option<NaiveDate>,
) -> Result<Vec<Batch>, RepositoryError> {
    let rows = sqlx::query_as::<_, BatchRow>(&format!(
        r"
        SELECT {BATCH_COLUMNS}
        FROM cogs.batch
        WHERE company_id = $1
          AND product_code = $2
          AND status = 'active'
          AND ($3::date IS NULL OR acquired_on >= $3)
        ORDER BY acquired_on, id
        "
    ))
    .bind(company_id)
    .bind(product_code)
    .bind(cutoff)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Batch::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for batch database operations.
pub struct BatchRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BatchRepository<'a> {
    /// Create a new batch repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a purchase as a new active batch, registering the product if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` for a non-positive volume or a
    /// negative unit cost, `RepositoryError::Database` if the query fails.
    pub async fn record_purchase(&self, purchase: &NewBatch) -> Result<Batch, RepositoryError> {
        purchase.validate()?;

        let mut tx = self.pool.begin().await?;
        ensure_product(&mut *tx, purchase.company_id, &purchase.product_code, None).await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r"
            INSERT INTO cogs.batch (
                company_id, product_code, acquired_on,
                acquired_volume, remaining_volume, unit_cost, status, reference
            )
            VALUES ($1, $2, $3, $4, $4, $5, 'active', $6)
            RETURNING {BATCH_COLUMNS}
            "
        ))
        .bind(purchase.company_id)
        .bind(&purchase.product_code)
        .bind(purchase.acquired_on)
        .bind(purchase.volume)
        .bind(purchase.unit_cost)
        .bind(purchase.reference.as_deref())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let batch = Batch::try_from(row)?;
        tracing::info!(
            batch_id = %batch.id(),
            company_id = %batch.company_id(),
            product = %batch.product_code(),
            volume = %batch.acquired_volume(),
            unit_cost = %batch.unit_cost(),
            "Recorded purchase"
        );
        Ok(batch)
    }

    /// List every batch for a product, depleted ones included, in FIFO order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
    ) -> Result<Vec<Batch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r"
            SELECT {BATCH_COLUMNS}
            FROM cogs.batch
            WHERE company_id = $1 AND product_code = $2
            ORDER BY acquired_on, id
            "
        ))
        .bind(company_id)
        .bind(product_code)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    /// Remaining volume across active batches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn current_stock(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
    ) -> Result<Decimal, RepositoryError> {
        let stock = sqlx::query_scalar::<_, Decimal>(
            r"
            SELECT COALESCE(SUM(remaining_volume), 0)
            FROM cogs.batch
            WHERE company_id = $1 AND product_code = $2 AND status = 'active'
            ",
        )
        .bind(company_id)
        .bind(product_code)
        .fetch_one(self.pool)
        .await?;
        Ok(stock)
    }
}
