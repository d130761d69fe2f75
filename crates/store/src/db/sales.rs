//! Database operations for recorded pump sales.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use fuelcost_core::{CompanyId, ProductCode, SaleId};
use fuelcost_engine::SaleRecord;

use super::products::ensure_product;
use super::{RepositoryError, map_unique_violation};

/// Internal row type for sale queries.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: SaleId,
    product_code: ProductCode,
    product_name: Option<String>,
    sale_date: NaiveDate,
    volume: Decimal,
    revenue: Decimal,
}

impl From<SaleRow> for SaleRecord {
    fn from(row: SaleRow) -> Self {
        Self {
            sale_id: row.id,
            product_code: row.product_code,
            product_name: row.product_name,
            sale_date: row.sale_date,
            volume: row.volume,
            revenue: row.revenue,
        }
    }
}

/// Repository for sale database operations.
pub struct SaleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SaleRepository<'a> {
    /// Create a new sale repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the sale id is already used
    /// for this company.
    pub async fn record(
        &self,
        company_id: CompanyId,
        sale: &SaleRecord,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_product(
            &mut *tx,
            company_id,
            &sale.product_code,
            sale.product_name.as_deref(),
        )
        .await?;

        sqlx::query(
            r"
            INSERT INTO cogs.sale (company_id, id, product_code, sale_date, volume, revenue)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(company_id)
        .bind(sale.sale_id)
        .bind(&sale.product_code)
        .bind(sale.sale_date)
        .bind(sale.volume)
        .bind(sale.revenue)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "sale id already recorded"))?;

        tx.commit().await?;
        Ok(())
    }

    /// List a company's sales by date, optionally within `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        company_id: CompanyId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SaleRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT s.id, s.product_code, p.product_name, s.sale_date, s.volume, s.revenue
            FROM cogs.sale s
            JOIN cogs.product p
              ON p.company_id = s.company_id AND p.product_code = s.product_code
            WHERE s.company_id = $1
              AND ($2::date IS NULL OR s.sale_date >= $2)
              AND ($3::date IS NULL OR s.sale_date <= $3)
            ORDER BY s.sale_date, s.id
            ",
        )
        .bind(company_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleRecord::from).collect())
    }

    /// Get a sale by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such sale exists.
    pub async fn get(
        &self,
        company_id: CompanyId,
        sale_id: SaleId,
    ) -> Result<SaleRecord, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT s.id, s.product_code, p.product_name, s.sale_date, s.volume, s.revenue
            FROM cogs.sale s
            JOIN cogs.product p
              ON p.company_id = s.company_id AND p.product_code = s.product_code
            WHERE s.company_id = $1 AND s.id = $2
            ",
        )
        .bind(company_id)
        .bind(sale_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
