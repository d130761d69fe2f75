//! Inventory batches: one inbound purchase lot per batch.
//!
//! A [`Batch`] carries an immutable acquired volume and unit cost and a
//! depletable remaining volume. Fields are private so the invariant
//! `0 <= remaining_volume <= acquired_volume`, and the coupling between a
//! zero remaining volume and [`BatchStatus::Depleted`], can only be changed
//! through [`Batch::apply_consumption`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BatchId, BatchStatus, CompanyId, MAX_UNIT_COST, MAX_VOLUME, ProductCode};

/// Invariant violations surfaced by batch construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Acquired or consumed volume must be strictly positive.
    #[error("volume must be > 0, got {volume}")]
    NonPositiveVolume { volume: Decimal },

    /// Unit cost must not be negative.
    #[error("unit cost must be >= 0, got {unit_cost}")]
    NegativeUnitCost { unit_cost: Decimal },

    /// Acquired volume above [`MAX_VOLUME`].
    #[error("volume {volume} exceeds the limit of {MAX_VOLUME}")]
    VolumeTooLarge { volume: Decimal },

    /// Unit cost above [`MAX_UNIT_COST`].
    #[error("unit cost {unit_cost} exceeds the limit of {MAX_UNIT_COST}")]
    UnitCostTooLarge { unit_cost: Decimal },

    /// Remaining volume is outside `0..=acquired`.
    #[error("remaining volume {remaining} outside 0..={acquired}")]
    RemainingOutOfRange { remaining: Decimal, acquired: Decimal },

    /// Status disagrees with the remaining volume.
    #[error("status {status} inconsistent with remaining volume {remaining}")]
    StatusMismatch {
        status: BatchStatus,
        remaining: Decimal,
    },

    /// Attempted to take more than the batch holds.
    #[error("batch {batch_id}: cannot consume {requested}, only {remaining} remaining")]
    Overconsumption {
        batch_id: BatchId,
        requested: Decimal,
        remaining: Decimal,
    },

    /// The batch is depleted and cannot be consumed further.
    #[error("batch {batch_id} is depleted")]
    Depleted { batch_id: BatchId },
}

/// One inbound inventory lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
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

impl Batch {
    /// Create a freshly acquired batch (`remaining == acquired`, active).
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] if the volume or unit cost is out of range.
    pub fn acquired(id: BatchId, purchase: NewBatch) -> Result<Self, BatchError> {
        purchase.validate()?;
        Ok(Self {
            id,
            company_id: purchase.company_id,
            product_code: purchase.product_code,
            acquired_on: purchase.acquired_on,
            acquired_volume: purchase.volume,
            remaining_volume: purchase.volume,
            unit_cost: purchase.unit_cost,
            status: BatchStatus::Active,
            reference: purchase.reference,
        })
    }

    /// Rebuild a batch from persisted state, re-checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] if the stored row violates a batch invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: BatchId,
        company_id: CompanyId,
        product_code: ProductCode,
        acquired_on: NaiveDate,
        acquired_volume: Decimal,
        remaining_volume: Decimal,
        unit_cost: Decimal,
        status: BatchStatus,
        reference: Option<String>,
    ) -> Result<Self, BatchError> {
        check_purchase(acquired_volume, unit_cost)?;
        if remaining_volume < Decimal::ZERO || remaining_volume > acquired_volume {
            return Err(BatchError::RemainingOutOfRange {
                remaining: remaining_volume,
                acquired: acquired_volume,
            });
        }
        if BatchStatus::for_remaining(remaining_volume) != status {
            return Err(BatchError::StatusMismatch {
                status,
                remaining: remaining_volume,
            });
        }
        Ok(Self {
            id,
            company_id,
            product_code,
            acquired_on,
            acquired_volume,
            remaining_volume,
            unit_cost,
            status,
            reference,
        })
    }

    /// Take `volume` from this batch.
    ///
    /// Either both `remaining_volume` and `status` change or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::NonPositiveVolume`] for `volume <= 0`,
    /// [`BatchError::Depleted`] if the batch is already depleted, and
    /// [`BatchError::Overconsumption`] if `volume > remaining_volume`.
    pub fn apply_consumption(&mut self, volume: Decimal) -> Result<(), BatchError> {
        if volume <= Decimal::ZERO {
            return Err(BatchError::NonPositiveVolume { volume });
        }
        if self.status == BatchStatus::Depleted {
            return Err(BatchError::Depleted { batch_id: self.id });
        }
        if volume > self.remaining_volume {
            return Err(BatchError::Overconsumption {
                batch_id: self.id,
                requested: volume,
                remaining: self.remaining_volume,
            });
        }

        let remaining = self.remaining_volume - volume;
        self.remaining_volume = remaining;
        self.status = BatchStatus::for_remaining(remaining);
        Ok(())
    }

    #[must_use]
    pub const fn id(&self) -> BatchId {
        self.id
    }

    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    #[must_use]
    pub const fn product_code(&self) -> &ProductCode {
        &self.product_code
    }

    #[must_use]
    pub const fn acquired_on(&self) -> NaiveDate {
        self.acquired_on
    }

    #[must_use]
    pub const fn acquired_volume(&self) -> Decimal {
        self.acquired_volume
    }

    #[must_use]
    pub const fn remaining_volume(&self) -> Decimal {
        self.remaining_volume
    }

    #[must_use]
    pub const fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    #[must_use]
    pub const fn status(&self) -> BatchStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == BatchStatus::Active
    }

    /// FIFO sort key: acquisition date, then batch id.
    #[must_use]
    pub const fn fifo_key(&self) -> (NaiveDate, BatchId) {
        (self.acquired_on, self.id)
    }
}

/// Input for recording a purchase as a new batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    /// Company that bought the fuel.
    pub company_id: CompanyId,
    /// Product delivered.
    pub product_code: ProductCode,
    /// Delivery (acquisition) date.
    pub acquired_on: NaiveDate,
    /// Delivered volume in litres.
    pub volume: Decimal,
    /// Cost per litre, fixed at acquisition.
    pub unit_cost: Decimal,
    /// Optional invoice / delivery note reference.
    #[serde(default)]
    pub reference: Option<String>,
}

impl NewBatch {
    /// Check the purchase can become a batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] for a volume outside `(0, MAX_VOLUME]` or a
    /// unit cost outside `[0, MAX_UNIT_COST]`.
    pub fn validate(&self) -> Result<(), BatchError> {
        check_purchase(self.volume, self.unit_cost)
    }
}

/// Volume in `(0, MAX_VOLUME]`, unit cost in `[0, MAX_UNIT_COST]`.
fn check_purchase(volume: Decimal, unit_cost: Decimal) -> Result<(), BatchError> {
    if volume <= Decimal::ZERO {
        return Err(BatchError::NonPositiveVolume { volume });
    }
    if volume > MAX_VOLUME {
        return Err(BatchError::VolumeTooLarge { volume });
    }
    if unit_cost < Decimal::ZERO {
        return Err(BatchError::NegativeUnitCost { unit_cost });
    }
    if unit_cost > MAX_UNIT_COST {
        return Err(BatchError::UnitCostTooLarge { unit_cost });
    }
    Ok(())
}
