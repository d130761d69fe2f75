//! The public costing entry points.
//!
//! [`CostingService`] keeps one [`AllocationEngine`] per scope, created on
//! first use, so concurrent commits for the same (company, product) share a
//! commit gate while different scopes proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fuelcost_core::{AllocationResult, CompanyId, ProductCode, SaleId};

use crate::engine::{AllocationEngine, ConsumptionRequest, EngineConfig, validate_volume};
use crate::error::Result;
use crate::ledger::{BatchLedger, CommitRecord, Scope};

/// FIFO costing over a shared [`BatchLedger`].
#[derive(Debug)]
pub struct CostingService<L> {
    ledger: Arc<L>,
    config: EngineConfig,
    engines: Mutex<HashMap<Scope, Arc<AllocationEngine<L>>>>,
}

impl<L: BatchLedger> CostingService<L> {
    #[must_use]
    pub fn new(ledger: Arc<L>, config: EngineConfig) -> Self {
        Self {
            ledger,
            config,
            engines: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    #[must_use]
    pub const fn config(&self) -> EngineConfig {
        self.config
    }

    /// The engine for `scope`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CogsError::InvalidRequest`] if the product is
    /// unknown for the company.
    pub async fn engine(&self, scope: &Scope) -> Result<Arc<AllocationEngine<L>>> {
        if let Some(engine) = self.cached(scope) {
            return Ok(engine);
        }

        let built = Arc::new(
            AllocationEngine::new(Arc::clone(&self.ledger), scope.clone(), self.config).await?,
        );
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        // A concurrent caller may have won the race; keep theirs so both share one gate.
        Ok(Arc::clone(engines.entry(scope.clone()).or_insert(built)))
    }

    fn cached(&self, scope: &Scope) -> Option<Arc<AllocationEngine<L>>> {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .cloned()
    }

    /// Drop cached engines for a company so the next call re-reads its
    /// cutoff settings.
    pub fn invalidate_company(&self, company_id: CompanyId) {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|scope, _| scope.company_id != company_id);
    }

    /// Cost a sale without changing inventory.
    ///
    /// # Errors
    ///
    /// See [`AllocationEngine::simulate`].
    pub async fn simulate(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
        sale_date: NaiveDate,
        volume: Decimal,
    ) -> Result<AllocationResult> {
        validate_volume(volume)?;
        let scope = Scope::new(company_id, product_code.clone());
        self.engine(&scope).await?.simulate(sale_date, volume).await
    }

    /// Cost a sale and consume the allocated stock. Idempotent per sale id.
    ///
    /// # Errors
    ///
    /// See [`AllocationEngine::commit`].
    pub async fn commit(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
        sale_id: SaleId,
        sale_date: NaiveDate,
        volume: Decimal,
    ) -> Result<AllocationResult> {
        validate_volume(volume)?;
        let scope = Scope::new(company_id, product_code.clone());
        let request = ConsumptionRequest {
            sale_id,
            product_code: product_code.clone(),
            sale_date,
            volume,
        };
        self.engine(&scope).await?.commit(&request).await
    }

    /// The stored commit record for a sale, if it has been committed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CogsError::PersistenceUnavailable`] if the ledger
    /// cannot be read.
    pub async fn committed(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
        sale_id: SaleId,
    ) -> Result<Option<CommitRecord>> {
        let scope = Scope::new(company_id, product_code.clone());
        Ok(self.ledger.find_commit(&scope, sale_id).await?)
    }

    /// Remaining volume over active batches, ignoring the cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CogsError::PersistenceUnavailable`] if the ledger
    /// cannot be read.
    pub async fn current_stock(
        &self,
        company_id: CompanyId,
        product_code: &ProductCode,
    ) -> Result<Decimal> {
        let scope = Scope::new(company_id, product_code.clone());
        Ok(self.ledger.current_stock(&scope).await?)
    }
}
