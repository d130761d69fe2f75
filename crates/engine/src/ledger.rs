//! The persistence boundary between the allocation engine and batch storage.
//!
//! [`BatchLedger`] is the only place batch state is read or written. The
//! engine never mutates a [`Batch`] it holds; it hands a [`CommitRecord`] to
//! [`BatchLedger::apply_commit`], which applies every line item or none.

use std::fmt;
use std::future::Future;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuelcost_core::{AllocationResult, Batch, BatchError, BatchId, CompanyId, ProductCode, SaleId};

/// A (company, product) pair. Commits are serialized per scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub company_id: CompanyId,
    pub product_code: ProductCode,
}

impl Scope {
    #[must_use]
    pub const fn new(company_id: CompanyId, product_code: ProductCode) -> Self {
        Self {
            company_id,
            product_code,
        }
    }

    /// Whether a batch belongs to this scope.
    #[must_use]
    pub fn contains(&self, batch: &Batch) -> bool {
        batch.company_id() == self.company_id && batch.product_code() == &self.product_code
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.company_id, self.product_code)
    }
}

/// The durable record of one committed sale.
///
/// Stored alongside the batch decrements so a repeated commit for the same
/// sale returns this result instead of consuming inventory twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sale_id: SaleId,
    pub product_code: ProductCode,
    pub sale_date: NaiveDate,
    pub result: AllocationResult,
}

/// Errors raised by a [`BatchLedger`] implementation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage could not be reached or the operation failed in transit.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// A batch no longer has the remaining volume the allocation was based on.
    #[error("batch {batch_id} changed since it was read (expected remaining {expected})")]
    StaleSnapshot { batch_id: BatchId, expected: Decimal },

    /// The sale already has a commit record.
    #[error("sale {0} is already committed")]
    AlreadyCommitted(SaleId),

    /// A line item names a batch the ledger does not hold for this scope.
    #[error("batch {batch_id} does not exist in scope {scope}")]
    UnknownBatch { batch_id: BatchId, scope: Scope },

    /// A batch invariant would be broken.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Stored data failed validation on the way out of storage.
    #[error("corrupt ledger data: {0}")]
    Corrupt(String),
}

/// Storage for inventory batches and commit records.
///
/// Implementations must return batches in FIFO order and must apply a
/// commit atomically: every line item's batch is checked against its
/// `remaining_before` and the whole commit fails with
/// [`LedgerError::StaleSnapshot`] if any one differs.
pub trait BatchLedger: Send + Sync {
    /// Active batches for `scope` acquired on or after `cutoff`, ordered by
    /// acquisition date then batch id.
    fn eligible_batches(
        &self,
        scope: &Scope,
        cutoff: Option<NaiveDate>,
    ) -> impl Future<Output = Result<Vec<Batch>, LedgerError>> + Send;

    /// The commit record for `sale_id` within the scope's company, if any.
    ///
    /// Sale ids are unique per company, so the returned record may carry a
    /// different product than `scope`; callers compare.
    fn find_commit(
        &self,
        scope: &Scope,
        sale_id: SaleId,
    ) -> impl Future<Output = Result<Option<CommitRecord>, LedgerError>> + Send;

    /// Apply every line item of `record` and store the record, or change
    /// nothing.
    fn apply_commit(
        &self,
        scope: &Scope,
        record: &CommitRecord,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Cost-basis cutoff for the scope: product setting, then company
    /// setting, then none.
    fn cost_basis_cutoff(
        &self,
        scope: &Scope,
    ) -> impl Future<Output = Result<Option<NaiveDate>, LedgerError>> + Send;

    /// Whether the product is known for the company at all.
    fn product_exists(&self, scope: &Scope)
    -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// Sum of remaining volume over active batches, ignoring any cutoff.
    fn current_stock(
        &self,
        scope: &Scope,
    ) -> impl Future<Output = Result<Decimal, LedgerError>> + Send {
        async move {
            let batches = self.eligible_batches(scope, None).await?;
            Ok(batches.iter().map(Batch::remaining_volume).sum())
        }
    }
}
