//! In-process [`BatchLedger`] used by tests, simulations, and the CLI's
//! file-based mode.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fuelcost_core::{Batch, BatchId, CompanyId, NewBatch, SaleId};

use crate::ledger::{BatchLedger, CommitRecord, LedgerError, Scope};

#[derive(Debug, Default)]
struct LedgerState {
    batches: BTreeMap<BatchId, Batch>,
    commits: BTreeMap<(CompanyId, SaleId), CommitRecord>,
    products: BTreeSet<Scope>,
    company_cutoffs: BTreeMap<CompanyId, NaiveDate>,
    product_cutoffs: BTreeMap<Scope, NaiveDate>,
    next_batch_id: i64,
}

/// A [`BatchLedger`] backed by a mutex-guarded map.
///
/// Commits validate every line item before any batch is touched, so a
/// failed commit leaves the ledger exactly as it was.
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    available: AtomicBool,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            available: AtomicBool::new(true),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable(
                "in-memory ledger marked unavailable".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger lock poisoned".to_string()))
    }

    /// Simulate a storage outage. While unavailable every operation fails
    /// with [`LedgerError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make a product known for a company without recording stock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn register_product(&self, scope: Scope) -> Result<(), LedgerError> {
        self.state()?.products.insert(scope);
        Ok(())
    }

    /// Record a purchase as a new active batch and return it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Batch`] if the purchase is invalid.
    pub fn record_purchase(&self, purchase: NewBatch) -> Result<Batch, LedgerError> {
        purchase.validate()?;
        let mut state = self.state()?;
        state.next_batch_id += 1;
        let id = BatchId::new(state.next_batch_id);
        let scope = Scope::new(purchase.company_id, purchase.product_code.clone());
        let batch = Batch::acquired(id, purchase)?;

        state.products.insert(scope);
        state.batches.insert(id, batch.clone());
        tracing::debug!(batch_id = %id, volume = %batch.acquired_volume(), "Recorded purchase");
        Ok(batch)
    }

    /// Set (or clear with `None`) the company-wide cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn set_company_cutoff(
        &self,
        company_id: CompanyId,
        cutoff: Option<NaiveDate>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        match cutoff {
            Some(date) => state.company_cutoffs.insert(company_id, date),
            None => state.company_cutoffs.remove(&company_id),
        };
        Ok(())
    }

    /// Set (or clear with `None`) a product-specific cutoff that overrides
    /// the company setting.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn set_product_cutoff(
        &self,
        scope: Scope,
        cutoff: Option<NaiveDate>,
    ) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        match cutoff {
            Some(date) => state.product_cutoffs.insert(scope, date),
            None => state.product_cutoffs.remove(&scope),
        };
        Ok(())
    }

    /// All batches in id order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn snapshot(&self) -> Result<Vec<Batch>, LedgerError> {
        Ok(self.state()?.batches.values().cloned().collect())
    }

    /// All commit records in (company, sale) order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn commits(&self) -> Result<Vec<CommitRecord>, LedgerError> {
        Ok(self.state()?.commits.values().cloned().collect())
    }
}

impl BatchLedger for InMemoryLedger {
    async fn eligible_batches(
        &self,
        scope: &Scope,
        cutoff: Option<NaiveDate>,
    ) -> Result<Vec<Batch>, LedgerError> {
        let state = self.state()?;
        let mut batches: Vec<Batch> = state
            .batches
            .values()
            .filter(|b| scope.contains(b) && b.is_active())
            .filter(|b| cutoff.is_none_or(|date| b.acquired_on() >= date))
            .cloned()
            .collect();
        batches.sort_by_key(Batch::fifo_key);
        Ok(batches)
    }

    async fn find_commit(
        &self,
        scope: &Scope,
        sale_id: SaleId,
    ) -> Result<Option<CommitRecord>, LedgerError> {
        let state = self.state()?;
        Ok(state.commits.get(&(scope.company_id, sale_id)).cloned())
    }

    async fn apply_commit(&self, scope: &Scope, record: &CommitRecord) -> Result<(), LedgerError> {
        let mut state = self.state()?;
        let key = (scope.company_id, record.sale_id);
        if state.commits.contains_key(&key) {
            return Err(LedgerError::AlreadyCommitted(record.sale_id));
        }

        // Work on copies; nothing is written back until every take succeeds.
        let mut updated = Vec::with_capacity(record.result.line_items.len());
        for item in &record.result.line_items {
            let batch = state
                .batches
                .get(&item.batch_id)
                .filter(|b| scope.contains(b))
                .ok_or_else(|| LedgerError::UnknownBatch {
                    batch_id: item.batch_id,
                    scope: scope.clone(),
                })?;
            if batch.remaining_volume() != item.remaining_before {
                return Err(LedgerError::StaleSnapshot {
                    batch_id: item.batch_id,
                    expected: item.remaining_before,
                });
            }
            let mut batch = batch.clone();
            batch.apply_consumption(item.volume)?;
            updated.push(batch);
        }

        for batch in updated {
            state.batches.insert(batch.id(), batch);
        }
        state.commits.insert(key, record.clone());
        Ok(())
    }

    async fn cost_basis_cutoff(&self, scope: &Scope) -> Result<Option<NaiveDate>, LedgerError> {
        let state = self.state()?;
        Ok(state
            .product_cutoffs
            .get(scope)
            .or_else(|| state.company_cutoffs.get(&scope.company_id))
            .copied())
    }

    async fn product_exists(&self, scope: &Scope) -> Result<bool, LedgerError> {
        Ok(self.state()?.products.contains(scope))
    }
}

impl InMemoryLedger {
    /// Total volume still on hand for the scope, depleted batches included.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] if the ledger is unavailable.
    pub fn remaining_volume(&self, scope: &Scope) -> Result<Decimal, LedgerError> {
        Ok(self
            .state()?
            .batches
            .values()
            .filter(|b| scope.contains(b))
            .map(Batch::remaining_volume)
            .sum())
    }
}
