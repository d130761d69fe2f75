//! Per-scope allocation engine.
//!
//! An [`AllocationEngine`] owns one (company, product) scope. It resolves
//! the cost-basis cutoff once, then serves two kinds of call:
//!
//! - [`AllocationEngine::simulate`] reads a snapshot and allocates against
//!   it. No lock, no write.
//! - [`AllocationEngine::commit`] does the same under the scope's commit
//!   gate and persists the takes through [`BatchLedger::apply_commit`].

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use fuelcost_core::{
    AllocationOutcome, AllocationResult, Batch, MAX_VOLUME, ProductCode, SaleId, allocate,
};

use crate::error::{CogsError, Result};
use crate::ledger::{BatchLedger, CommitRecord, LedgerError, Scope};

/// Default number of read-allocate-write rounds before a commit gives up.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rounds of re-read and re-allocate after a stale snapshot.
    pub max_commit_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

/// Reject a sale volume that is negative or above [`MAX_VOLUME`].
///
/// Needs no ledger access, so callers run it before anything that can fail
/// for storage reasons.
pub(crate) fn validate_volume(volume: Decimal) -> Result<()> {
    if volume < Decimal::ZERO {
        return Err(CogsError::InvalidRequest(format!(
            "volume must be >= 0, got {volume}"
        )));
    }
    if volume > MAX_VOLUME {
        return Err(CogsError::InvalidRequest(format!(
            "volume {volume} exceeds the limit of {MAX_VOLUME}"
        )));
    }
    Ok(())
}

/// A sale to be costed and committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRequest {
    pub sale_id: SaleId,
    pub product_code: ProductCode,
    pub sale_date: NaiveDate,
    pub volume: Decimal,
}

/// FIFO costing for a single scope.
#[derive(Debug)]
pub struct AllocationEngine<L> {
    ledger: Arc<L>,
    scope: Scope,
    cutoff: Option<NaiveDate>,
    config: EngineConfig,
    commit_gate: Mutex<()>,
}

impl<L: BatchLedger> AllocationEngine<L> {
    /// Build an engine for `scope`, resolving its cutoff from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`CogsError::InvalidRequest`] if the product is unknown for
    /// the company, or [`CogsError::PersistenceUnavailable`] if the ledger
    /// cannot be read.
    pub async fn new(ledger: Arc<L>, scope: Scope, config: EngineConfig) -> Result<Self> {
        if !ledger.product_exists(&scope).await? {
            return Err(CogsError::InvalidRequest(format!(
                "unknown product {} for company {}",
                scope.product_code, scope.company_id
            )));
        }
        let cutoff = ledger.cost_basis_cutoff(&scope).await?;
        debug!(%scope, ?cutoff, "Allocation engine ready");
        Ok(Self::with_cutoff(ledger, scope, cutoff, config))
    }

    /// Build an engine with an explicit cutoff, bypassing the stored setting.
    #[must_use]
    pub fn with_cutoff(
        ledger: Arc<L>,
        scope: Scope,
        cutoff: Option<NaiveDate>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            scope,
            cutoff,
            config,
            commit_gate: Mutex::new(()),
        }
    }

    async fn snapshot(&self) -> Result<Vec<Batch>> {
        Ok(self.ledger.eligible_batches(&self.scope, self.cutoff).await?)
    }

    /// Cost `volume` against the current ledger without changing it.
    ///
    /// `sale_date` is carried for logging only; eligibility depends on the
    /// cutoff alone.
    ///
    /// # Errors
    ///
    /// Returns [`CogsError::InvalidRequest`] for a negative or oversized
    /// volume, or [`CogsError::PersistenceUnavailable`] if the ledger cannot
    /// be read.
    #[instrument(skip(self), fields(scope = %self.scope))]
    pub async fn simulate(&self, sale_date: NaiveDate, volume: Decimal) -> Result<AllocationResult> {
        validate_volume(volume)?;
        if volume.is_zero() {
            return Ok(AllocationResult::nothing_requested());
        }

        let batches = self.snapshot().await?;
        let result = allocate(volume, &batches);
        debug!(
            outcome = ?result.outcome,
            total_cost = %result.total_cost,
            shortfall = %result.shortfall,
            "Simulated allocation"
        );
        Ok(result)
    }

    /// Cost a run of sales in order against one snapshot, each sale seeing
    /// the stock left by the ones before it. Nothing is written.
    ///
    /// Each entry succeeds or fails on its own; an invalid volume does not
    /// consume stock for later entries.
    ///
    /// # Errors
    ///
    /// Returns [`CogsError::PersistenceUnavailable`] if the snapshot cannot
    /// be read, or [`CogsError::InvariantViolation`] if the simulated takes
    /// disagree with the snapshot.
    pub async fn simulate_sequence(
        &self,
        requests: &[(NaiveDate, Decimal)],
    ) -> Result<Vec<Result<AllocationResult>>> {
        let mut batches = self.snapshot().await?;
        let mut results = Vec::with_capacity(requests.len());

        for &(_, volume) in requests {
            if let Err(err) = validate_volume(volume) {
                results.push(Err(err));
                continue;
            }
            let result = allocate(volume, &batches);
            for item in &result.line_items {
                let batch = batches
                    .iter_mut()
                    .find(|b| b.id() == item.batch_id)
                    .ok_or_else(|| {
                        CogsError::InvariantViolation(format!(
                            "allocated batch {} missing from snapshot",
                            item.batch_id
                        ))
                    })?;
                batch
                    .apply_consumption(item.volume)
                    .map_err(LedgerError::from)?;
            }
            results.push(Ok(result));
        }

        debug!(scope = %self.scope, sales = requests.len(), "Simulated sale sequence");
        Ok(results)
    }

    /// Cost a sale and durably consume the allocated stock.
    ///
    /// Idempotent per sale id: a sale that is already committed returns its
    /// stored result without touching inventory.
    ///
    /// # Errors
    ///
    /// - [`CogsError::InvalidRequest`] for a negative or oversized volume, a
    ///   product outside this engine's scope, or a re-commit that disagrees
    ///   with the stored one.
    /// - [`CogsError::InvariantViolation`] if the ledger keeps changing under
    ///   the commit for `max_commit_attempts` rounds, or rejects a take.
    /// - [`CogsError::PersistenceUnavailable`] if the ledger is unreachable.
    #[instrument(skip(self, request), fields(scope = %self.scope, sale_id = %request.sale_id))]
    pub async fn commit(&self, request: &ConsumptionRequest) -> Result<AllocationResult> {
        if request.product_code != self.scope.product_code {
            return Err(CogsError::InvalidRequest(format!(
                "product {} does not match engine scope {}",
                request.product_code, self.scope
            )));
        }
        validate_volume(request.volume)?;

        let _gate = self.commit_gate.lock().await;

        if let Some(existing) = self.ledger.find_commit(&self.scope, request.sale_id).await? {
            return Self::replay(existing, request);
        }

        let attempts = self.config.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let batches = self.snapshot().await?;
            let record = CommitRecord {
                sale_id: request.sale_id,
                product_code: request.product_code.clone(),
                sale_date: request.sale_date,
                result: allocate(request.volume, &batches),
            };

            match self.ledger.apply_commit(&self.scope, &record).await {
                Ok(()) => {
                    Self::log_committed(&record.result);
                    return Ok(record.result);
                }
                Err(LedgerError::StaleSnapshot { batch_id, expected }) => {
                    warn!(
                        attempt,
                        %batch_id,
                        %expected,
                        "Batch changed during commit, re-reading ledger"
                    );
                }
                Err(LedgerError::AlreadyCommitted(_)) => {
                    // Another process committed this sale between our lookup and write.
                    let existing = self
                        .ledger
                        .find_commit(&self.scope, request.sale_id)
                        .await?
                        .ok_or_else(|| {
                            CogsError::InvariantViolation(format!(
                                "sale {} reported committed but has no record",
                                request.sale_id
                            ))
                        })?;
                    return Self::replay(existing, request);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CogsError::InvariantViolation(format!(
            "ledger for {} changed on each of {attempts} commit attempts",
            self.scope
        )))
    }

    fn replay(existing: CommitRecord, request: &ConsumptionRequest) -> Result<AllocationResult> {
        if existing.product_code != request.product_code
            || existing.result.requested_volume != request.volume
        {
            return Err(CogsError::InvalidRequest(format!(
                "sale {} already committed as {} of {}",
                request.sale_id, existing.result.requested_volume, existing.product_code
            )));
        }
        if !existing.result.is_consistent() {
            return Err(CogsError::InvariantViolation(format!(
                "stored result for sale {} is inconsistent",
                request.sale_id
            )));
        }
        debug!("Sale already committed, returning stored result");
        Ok(existing.result)
    }

    fn log_committed(result: &AllocationResult) {
        match result.outcome {
            AllocationOutcome::NoEligibleSupply => warn!(
                requested = %result.requested_volume,
                "Committed sale with no eligible supply"
            ),
            AllocationOutcome::PartiallyFulfilled => warn!(
                requested = %result.requested_volume,
                shortfall = %result.shortfall,
                total_cost = %result.total_cost,
                "Committed sale with shortfall"
            ),
            AllocationOutcome::Fulfilled | AllocationOutcome::NothingRequested => info!(
                volume = %result.total_volume,
                total_cost = %result.total_cost,
                batches = result.line_items.len(),
                "Committed sale"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use fuelcost_core::{CompanyId, NewBatch};
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    fn gas() -> ProductCode {
        ProductCode::parse("GAS_C").unwrap()
    }

    fn scope() -> Scope {
        Scope::new(CompanyId::new(1), gas())
    }

    fn seeded() -> Arc<InMemoryLedger> {
        let ledger = InMemoryLedger::new();
        for (on, volume, cost) in [
            (date(1, 1), dec!(100), dec!(2.00)),
            (date(1, 5), dec!(50), dec!(2.50)),
        ] {
            ledger
                .record_purchase(NewBatch {
                    company_id: CompanyId::new(1),
                    product_code: gas(),
                    acquired_on: on,
                    volume,
                    unit_cost: cost,
                    reference: None,
                })
                .unwrap();
        }
        Arc::new(ledger)
    }

    fn sale(id: i64, volume: Decimal) -> ConsumptionRequest {
        ConsumptionRequest {
            sale_id: SaleId::new(id),
            product_code: gas(),
            sale_date: date(2, 1),
            volume,
        }
    }

    async fn engine(ledger: &Arc<InMemoryLedger>) -> AllocationEngine<InMemoryLedger> {
        AllocationEngine::new(Arc::clone(ledger), scope(), EngineConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let ledger = seeded();
        let err = AllocationEngine::new(
            ledger,
            Scope::new(CompanyId::new(1), ProductCode::parse("KEROSENE").unwrap()),
            EngineConfig::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_simulate_leaves_ledger_untouched() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        let before = ledger.snapshot().unwrap();

        let first = engine.simulate(date(2, 1), dec!(120)).await.unwrap();
        let second = engine.simulate(date(2, 1), dec!(120)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total_cost, dec!(250.00));
        assert_eq!(ledger.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_negative_volume_rejected_before_ledger() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        ledger.set_available(false);

        let err = engine.simulate(date(2, 1), dec!(-1)).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        let err = engine.commit(&sale(1, dec!(-1))).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_volume_above_limit_rejected() {
        let ledger = seeded();
        let engine = engine(&ledger).await;

        let err = engine.simulate(date(2, 1), Decimal::MAX).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        let err = engine
            .commit(&sale(1, MAX_VOLUME + Decimal::ONE))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");

        let results = engine
            .simulate_sequence(&[(date(2, 1), Decimal::MAX), (date(2, 2), dec!(10))])
            .await
            .unwrap();
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().total_cost, dec!(20.00));
    }

    #[tokio::test]
    async fn test_zero_volume_is_nothing_requested() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        let result = engine.simulate(date(2, 1), Decimal::ZERO).await.unwrap();
        assert_eq!(result.outcome, AllocationOutcome::NothingRequested);
        assert!(result.line_items.is_empty());
    }

    #[tokio::test]
    async fn test_commit_consumes_and_is_idempotent() {
        let ledger = seeded();
        let engine = engine(&ledger).await;

        let first = engine.commit(&sale(1, dec!(120))).await.unwrap();
        let after_first = ledger.snapshot().unwrap();
        let again = engine.commit(&sale(1, dec!(120))).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(ledger.snapshot().unwrap(), after_first);
        assert_eq!(after_first[0].remaining_volume(), Decimal::ZERO);
        assert_eq!(after_first[1].remaining_volume(), dec!(30));
    }

    #[tokio::test]
    async fn test_conflicting_recommit_rejected() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        engine.commit(&sale(1, dec!(10))).await.unwrap();

        let err = engine.commit(&sale(1, dec!(11))).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(ledger.snapshot().unwrap()[0].remaining_volume(), dec!(90));
    }

    #[tokio::test]
    async fn test_commit_with_wrong_product_rejected() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        let mut request = sale(1, dec!(10));
        request.product_code = ProductCode::parse("DIESEL").unwrap();

        let err = engine.commit(&request).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn test_commit_without_supply_is_recorded() {
        let ledger = seeded();
        let engine = AllocationEngine::with_cutoff(
            Arc::clone(&ledger),
            scope(),
            Some(date(6, 1)),
            EngineConfig::default(),
        );

        let result = engine.commit(&sale(7, dec!(5))).await.unwrap();
        assert_eq!(result.outcome, AllocationOutcome::NoEligibleSupply);
        assert_eq!(result.shortfall, dec!(5));
        assert_eq!(ledger.commits().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cutoff_resolved_once_at_construction() {
        let ledger = seeded();
        ledger
            .set_company_cutoff(CompanyId::new(1), Some(date(1, 3)))
            .unwrap();
        let engine = engine(&ledger).await;
        ledger.set_company_cutoff(CompanyId::new(1), None).unwrap();

        let result = engine.simulate(date(2, 1), dec!(30)).await.unwrap();
        assert_eq!(result.total_cost, dec!(75.00));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_retryable() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        ledger.set_available(false);

        let err = engine.commit(&sale(1, dec!(10))).await.unwrap_err();
        assert!(err.is_retryable());

        ledger.set_available(true);
        assert_eq!(ledger.snapshot().unwrap()[0].remaining_volume(), dec!(100));
    }

    #[tokio::test]
    async fn test_simulate_sequence_chains_stock() {
        let ledger = seeded();
        let engine = engine(&ledger).await;
        let before = ledger.snapshot().unwrap();

        let results = engine
            .simulate_sequence(&[
                (date(2, 1), dec!(80)),
                (date(2, 2), dec!(-3)),
                (date(2, 3), dec!(40)),
                (date(2, 4), dec!(50)),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().total_cost, dec!(160.00));
        assert!(results[1].is_err());
        // 20 left in the first batch, then 20 from the second.
        assert_eq!(results[2].as_ref().unwrap().total_cost, dec!(90.00));
        let last = results[3].as_ref().unwrap();
        assert_eq!(last.total_volume, dec!(30));
        assert_eq!(last.shortfall, dec!(20));
        assert_eq!(ledger.snapshot().unwrap(), before);
    }
}
