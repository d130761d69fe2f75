//! Status enums for ledger entities.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an inventory batch.
///
/// A batch starts `Active` and becomes `Depleted` exactly when its remaining
/// volume reaches zero. Depleted batches are kept for the audit trail and are
/// never selected for allocation again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cogs.batch_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Active,
    Depleted,
}

impl BatchStatus {
    /// Status implied by a remaining volume.
    #[must_use]
    pub fn for_remaining(remaining: rust_decimal::Decimal) -> Self {
        if remaining.is_zero() {
            Self::Depleted
        } else {
            Self::Active
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Depleted => write!(f, "depleted"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "depleted" => Ok(Self::Depleted),
            _ => Err(format!("invalid batch status: {s}")),
        }
    }
}

/// Direction of a physical inventory adjustment (tank dip vs. book stock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cogs.adjustment_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Evaporation, leakage, or measurement loss. Carries a cost.
    Loss,
    /// Volume found over book stock (e.g. thermal expansion).
    Gain,
}

impl std::fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loss => write!(f, "loss"),
            Self::Gain => write!(f, "gain"),
        }
    }
}

impl std::str::FromStr for AdjustmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loss" => Ok(Self::Loss),
            "gain" => Ok(Self::Gain),
            _ => Err(format!("invalid adjustment kind: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_for_remaining() {
        assert_eq!(BatchStatus::for_remaining(Decimal::ZERO), BatchStatus::Depleted);
        assert_eq!(BatchStatus::for_remaining(Decimal::ONE), BatchStatus::Active);
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [BatchStatus::Active, BatchStatus::Depleted] {
            assert_eq!(status.to_string().parse::<BatchStatus>().unwrap(), status);
        }
        assert!("exhausted".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_adjustment_kind_parse() {
        assert_eq!("loss".parse::<AdjustmentKind>().unwrap(), AdjustmentKind::Loss);
        assert_eq!("gain".parse::<AdjustmentKind>().unwrap(), AdjustmentKind::Gain);
        assert!("LOSS".parse::<AdjustmentKind>().is_err());
    }
}
