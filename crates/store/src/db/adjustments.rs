//! Database operations for inventory adjustments (losses and gains).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use fuelcost_core::{AdjustmentKind, CompanyId, ProductCode};
use fuelcost_engine::InventoryAdjustment;

use super::RepositoryError;
use super::products::ensure_product;

/// Internal row type for adjustment queries.
#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRow {
    product_code: ProductCode,
    product_name: Option<String>,
    adjusted_on: NaiveDate,
    kind: AdjustmentKind,
    volume: Decimal,
    total_cost: Option<Decimal>,
    reason: Option<String>,
}

impl From<AdjustmentRow> for InventoryAdjustment {
    fn from(row: AdjustmentRow) -> Self {
        Self {
            product_code: row.product_code,
            product_name: row.product_name,
            adjusted_on: row.adjusted_on,
            kind: row.kind,
            volume: row.volume,
            total_cost: row.total_cost,
            reason: row.reason,
        }
    }
}

/// Repository for inventory adjustment database operations.
pub struct AdjustmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdjustmentRepository<'a> {
    /// Create a new adjustment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an adjustment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` for a non-positive volume,
    /// `RepositoryError::Database` if the query fails.
    pub async fn record(
        &self,
        company_id: CompanyId,
        adjustment: &InventoryAdjustment,
    ) -> Result<(), RepositoryError> {
        if adjustment.volume <= Decimal::ZERO {
            return Err(RepositoryError::DataCorruption(format!(
                "adjustment volume must be > 0, got {}",
                adjustment.volume
            )));
        }

        let mut tx = self.pool.begin().await?;
        ensure_product(
            &mut *tx,
            company_id,
            &adjustment.product_code,
            adjustment.product_name.as_deref(),
        )
        .await?;

        sqlx::query(
            r"
            INSERT INTO cogs.inventory_adjustment (
                company_id, product_code, adjusted_on, kind, volume, total_cost, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(company_id)
        .bind(&adjustment.product_code)
        .bind(adjustment.adjusted_on)
        .bind(adjustment.kind)
        .bind(adjustment.volume)
        .bind(adjustment.total_cost)
        .bind(adjustment.reason.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            company_id = %company_id,
            product = %adjustment.product_code,
            kind = %adjustment.kind,
            volume = %adjustment.volume,
            "Recorded inventory adjustment"
        );
        Ok(())
    }

    /// List a company's adjustments by date, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        kind: Option<AdjustmentKind>,
    ) -> Result<Vec<InventoryAdjustment>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdjustmentRow>(
            r"
            SELECT a.product_code, p.product_name, a.adjusted_on, a.kind,
                   a.volume, a.total_cost, a.reason
            FROM cogs.inventory_adjustment a
            JOIN cogs.product p
              ON p.company_id = a.company_id AND p.product_code = a.product_code
            WHERE a.company_id = $1
              AND ($2::cogs.adjustment_kind IS NULL OR a.kind = $2)
            ORDER BY a.adjusted_on, a.id
            ",
        )
        .bind(company_id)
        .bind(kind)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(InventoryAdjustment::from).collect())
    }
}
