//! Error types for payment history reconciliation

use crate::types::Currency;
use thiserror::Error;

/// Result type for payment history operations
pub type Result<T> = std::result::Result<T, Error>;

/// Payment history errors
///
/// Every failure aborts the whole query. Partial aggregates are never
/// reported because they would misstate the financial position of an order.
#[derive(Error, Debug)]
pub enum Error {
    /// A chain failed a structural check before accumulation
    #[error("Validation failed [{validator}]: {reason}")]
    Validation {
        /// Name of the rejecting validator
        validator: &'static str,
        /// What was wrong with the chain
        reason: String,
    },

    /// An event could not be folded into its group state
    #[error("Accumulation failed at event {event}: {reason}")]
    Accumulation {
        /// Guid of the offending event
        event: String,
        /// Why the fold step is impossible
        reason: String,
    },

    /// Two branch states could not be merged
    #[error("Combination failed: {0}")]
    Combination(String),

    /// Arithmetic across two different currencies
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency already in use
        expected: Currency,
        /// Currency of the other operand
        found: Currency,
    },

    /// The event list itself is malformed (duplicate guids, cycles)
    #[error("Invalid ledger: {0}")]
    InvalidLedger(String),

    /// Invariant violation (negative combined balance, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable label for this error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::Accumulation { .. } => "accumulation",
            Error::Combination(_) => "combination",
            Error::CurrencyMismatch { .. } => "currency_mismatch",
            Error::InvalidLedger(_) => "invalid_ledger",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    pub(crate) fn accumulation(event: impl ToString, reason: impl Into<String>) -> Self {
        Error::Accumulation {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
