//! Products and cost-basis cutoff settings.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};

use fuelcost_core::{CompanyId, ProductCode};

use super::RepositoryError;

/// A product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub company_id: CompanyId,
    pub product_code: ProductCode,
    pub product_name: Option<String>,
    pub fifo_cutoff: Option<NaiveDate>,
}

/// Cutoff settings for a company, as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CutoffSettings {
    pub company_cutoff: Option<NaiveDate>,
    pub product_cutoffs: Vec<(ProductCode, NaiveDate)>,
}

/// Register a product if it is not already known. Works inside a transaction.
pub(crate) async fn ensure_product<'e>(
    executor: impl PgExecutor<'e>,
    company_id: CompanyId,
    product_code: &ProductCode,
    product_name: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO cogs.product (company_id, product_code, product_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (company_id, product_code) DO UPDATE
            SET product_name = COALESCE(EXCLUDED.product_name, cogs.product.product_name),
                updated_at = NOW()
        ",
    )
    .bind(company_id)
    .bind(product_code)
    .bind(product_name)
    .execute(executor)
    .await?;
    Ok(())
}

/// Repository for products and their cutoff settings.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(
            r"
            SELECT company_id, product_code, product_name, fifo_cutoff
            FROM cogs.product
            WHERE company_id = $1 AND product_code = $2
            ",
        )
        .bind(company_id)
        .bind(product_code)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// List a company's products by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, company_id: CompanyId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(
            r"
            SELECT company_id, product_code, product_name, fifo_cutoff
            FROM cogs.product
            WHERE company_id = $1
            ORDER BY product_code
            ",
        )
        .bind(company_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Cutoff settings
    // =========================================================================

    /// Company-wide cutoff, if set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn company_cutoff(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<NaiveDate>, RepositoryError> {
        let cutoff = sqlx::query_scalar::<_, Option<NaiveDate>>(
            "SELECT fifo_cutoff FROM cogs.company_setting WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(cutoff.flatten())
    }

    /// Set or clear the company-wide cutoff.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_company_cutoff(
        &self,
        company_id: CompanyId,
        cutoff: Option<NaiveDate>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cogs.company_setting (company_id, fifo_cutoff)
            VALUES ($1, $2)
            ON CONFLICT (company_id) DO UPDATE
                SET fifo_cutoff = EXCLUDED.fifo_cutoff, updated_at = NOW()
            ",
        )
        .bind(company_id)
        .bind(cutoff)
        .execute(self.pool)
        .await?;
        tracing::info!(company_id = %company_id, ?cutoff, "Updated company cutoff");
        Ok(())
    }

    /// Set or clear a product's cutoff override.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is unknown.
    pub async fn set_product_cutoff(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
        cutoff: Option<NaiveDate>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cogs.product
            SET fifo_cutoff = $3, updated_at = NOW()
            WHERE company_id = $1 AND product_code = $2
            ",
        )
        .bind(company_id)
        .bind(product_code)
        .bind(cutoff)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::info!(company_id = %company_id, product = %product_code, ?cutoff, "Updated product cutoff");
        Ok(())
    }

    /// Effective cutoff for a product: its own override, else the company's.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn effective_cutoff(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
    ) -> Result<Option<NaiveDate>, RepositoryError> {
        let cutoff = sqlx::query_scalar::<_, Option<NaiveDate>>(
            r"
            SELECT COALESCE(
                (SELECT fifo_cutoff FROM cogs.product
                 WHERE company_id = $1 AND product_code = $2),
                (SELECT fifo_cutoff FROM cogs.company_setting
                 WHERE company_id = $1)
            )
            ",
        )
        .bind(company_id)
        .bind(product_code)
        .fetch_one(self.pool)
        .await?;
        Ok(cutoff)
    }

    /// All cutoff settings for a company.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cutoff_settings(
        &self,
        company_id: CompanyId,
    ) -> Result<CutoffSettings, RepositoryError> {
        let company_cutoff = self.company_cutoff(company_id).await?;
        let product_cutoffs = self
            .list(company_id)
            .await?
            .into_iter()
            .filter_map(|p| p.fifo_cutoff.map(|date| (p.product_code, date)))
            .collect();
        Ok(CutoffSettings {
            company_cutoff,
            product_cutoffs,
        })
    }
}
