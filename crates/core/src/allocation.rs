//! FIFO cost allocation.
//!
//! [`allocate`] walks batches oldest-first and takes from each until the
//! requested volume is covered or the batches run out. It is a pure
//! function: the same batch snapshot and request always produce the same
//! [`AllocationResult`], and the batches themselves are never modified.
//! Persisting the takes is the caller's job.
//!
//! Costs are `volume * unit_cost` at full decimal precision per line item,
//! summed without intermediate rounding. Use [`AllocationResult::presented`]
//! when a result is shown to a person.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::types::{BatchId, present_money, present_volume};

/// How an allocation relates to the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cogs.allocation_outcome", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOutcome {
    /// Zero volume was requested. Nothing to cost; not an error.
    NothingRequested,
    /// The full request was covered by eligible batches.
    Fulfilled,
    /// Some supply was found but not enough; see `shortfall`.
    PartiallyFulfilled,
    /// A positive volume was requested and no eligible batch had stock.
    ///
    /// Distinct from [`Self::NothingRequested`] so callers can alert on an
    /// inventory gap instead of recording a silent zero-cost sale.
    NoEligibleSupply,
}

/// Volume taken from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Batch the volume was taken from.
    pub batch_id: BatchId,
    /// Acquisition date of that batch.
    pub acquired_on: NaiveDate,
    /// Unit cost of that batch.
    pub unit_cost: Decimal,
    /// Volume taken.
    pub volume: Decimal,
    /// `volume * unit_cost`, unrounded.
    pub cost: Decimal,
    /// Batch remaining volume in the snapshot the allocation was computed
    /// from. Committing writes compare against this value.
    pub remaining_before: Decimal,
}

impl LineItem {
    /// Remaining volume the batch will have once this take is applied.
    #[must_use]
    pub fn remaining_after(&self) -> Decimal {
        self.remaining_before - self.volume
    }
}

/// The cost breakdown for one consumption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Volume the caller asked for.
    pub requested_volume: Decimal,
    /// Sum of line item volumes.
    pub total_volume: Decimal,
    /// Sum of line item costs, unrounded.
    pub total_cost: Decimal,
    /// `requested_volume - total_volume`.
    pub shortfall: Decimal,
    /// Classification of the result.
    pub outcome: AllocationOutcome,
    /// Takes in FIFO order.
    pub line_items: Vec<LineItem>,
}

impl AllocationResult {
    /// The result for a zero-volume request.
    #[must_use]
    pub const fn nothing_requested() -> Self {
        Self {
            requested_volume: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            shortfall: Decimal::ZERO,
            outcome: AllocationOutcome::NothingRequested,
            line_items: Vec::new(),
        }
    }

    /// Whether eligible supply was insufficient.
    #[must_use]
    pub fn has_shortfall(&self) -> bool {
        self.shortfall > Decimal::ZERO
    }

    /// Copy with money rounded to cents and volumes to millilitres, for
    /// display. Unit costs are left as recorded.
    #[must_use]
    pub fn presented(&self) -> Self {
        Self {
            requested_volume: present_volume(self.requested_volume),
            total_volume: present_volume(self.total_volume),
            total_cost: present_money(self.total_cost),
            shortfall: present_volume(self.shortfall),
            outcome: self.outcome,
            line_items: self
                .line_items
                .iter()
                .map(|l| LineItem {
                    volume: present_volume(l.volume),
                    cost: present_money(l.cost),
                    remaining_before: present_volume(l.remaining_before),
                    ..l.clone()
                })
                .collect(),
        }
    }

    /// Re-derive the totals from the line items and compare.
    ///
    /// Holds for every result produced by [`allocate`]; persisted results
    /// are checked with this before they are trusted. Figures too large to
    /// re-derive count as inconsistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut volume = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        for l in &self.line_items {
            let item_ok = l.volume > Decimal::ZERO
                && l.volume <= l.remaining_before
                && l.volume.checked_mul(l.unit_cost) == Some(l.cost);
            match (item_ok, volume.checked_add(l.volume), cost.checked_add(l.cost)) {
                (true, Some(v), Some(c)) => {
                    volume = v;
                    cost = c;
                }
                _ => return false,
            }
        }

        volume == self.total_volume
            && cost == self.total_cost
            && self.total_volume.checked_add(self.shortfall) == Some(self.requested_volume)
            && self.shortfall >= Decimal::ZERO
    }
}

/// Allocate `requested` volume across `batches` in the order given.
///
/// `batches` must already be in FIFO order (acquisition date, then id); the
/// ledger query is responsible for that. Batches that are depleted or have
/// no remaining volume are skipped. Iteration stops as soon as the request
/// is covered, so later batches are never read.
///
/// A request of zero or below yields
/// [`AllocationOutcome::NothingRequested`]. Callers validate sign before
/// calling.
///
/// Every [`Batch`] holds at most `MAX_VOLUME` litres at `MAX_UNIT_COST`, so
/// each take prices to at most `MAX_AMOUNT` and the running total cannot
/// leave the [`Decimal`] range whatever `requested` is.
pub fn allocate<'a, I>(requested: Decimal, batches: I) -> AllocationResult
where
    I: IntoIterator<Item = &'a Batch>,
{
    debug_assert!(requested >= Decimal::ZERO, "requested volume must be >= 0");
    if requested <= Decimal::ZERO {
        return AllocationResult::nothing_requested();
    }

    let mut needed = requested;
    let mut total_cost = Decimal::ZERO;
    let mut line_items = Vec::new();

    for batch in batches {
        let available = batch.remaining_volume();
        if !batch.is_active() || available <= Decimal::ZERO {
            continue;
        }

        let take = available.min(needed);
        let cost = take * batch.unit_cost();
        needed -= take;
        total_cost += cost;
        line_items.push(LineItem {
            batch_id: batch.id(),
            acquired_on: batch.acquired_on(),
            unit_cost: batch.unit_cost(),
            volume: take,
            cost,
            remaining_before: available,
        });
        if needed.is_zero() {
            break;
        }
    }

    let outcome = if line_items.is_empty() {
        AllocationOutcome::NoEligibleSupply
    } else if needed > Decimal::ZERO {
        AllocationOutcome::PartiallyFulfilled
    } else {
        AllocationOutcome::Fulfilled
    };

    AllocationResult {
        requested_volume: requested,
        total_volume: requested - needed,
        total_cost,
        shortfall: needed,
        outcome,
        line_items,
    }
}
