//! Errors returned by the costing service.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Costing failures visible to callers.
///
/// A shortfall is not an error; it is reported on a successful
/// [`fuelcost_core::AllocationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CogsError {
    /// The request was rejected before the ledger was touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ledger state would be (or already is) inconsistent.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The ledger could not be read or written.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl CogsError {
    /// Whether the same call may succeed if retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceUnavailable(_))
    }

    /// Short machine-readable label, used in logs and report failures.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::PersistenceUnavailable(_) => "persistence_unavailable",
        }
    }
}

impl From<LedgerError> for CogsError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(msg) => Self::PersistenceUnavailable(msg),
            LedgerError::AlreadyCommitted(_) => Self::InvalidRequest(err.to_string()),
            LedgerError::StaleSnapshot { .. }
            | LedgerError::UnknownBatch { .. }
            | LedgerError::Batch(_)
            | LedgerError::Corrupt(_) => Self::InvariantViolation(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CogsError>;
