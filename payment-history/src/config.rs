//! Configuration for payment history queries

use crate::types::Currency;
use serde::{Deserialize, Serialize};

/// Payment history configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Currency of zero results for an empty ledger
    pub default_currency: Currency,

    /// Drop failed/skipped events before building chains
    pub approved_only: bool,

    /// Reject ledgers whose sibling charges overdraw a reservation
    pub enforce_combined_balance: bool,

    /// Built-in validators
    pub validation: ValidationConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::USD,
            approved_only: true,
            enforce_combined_balance: true,
            validation: ValidationConfig::default(),
        }
    }
}

/// Which built-in validators run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Chains start at a reservation
    pub reservation_root: bool,

    /// One currency per chain
    pub currency_consistency: bool,

    /// Causal ordering of transaction types
    pub event_order: bool,

    /// Sign and reserved-balance checks
    pub balance: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reservation_root: true,
            currency_consistency: true,
            event_order: true,
            balance: true,
        }
    }
}

impl HistoryConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = HistoryConfig::default();

        if let Ok(code) = std::env::var("PAYMENT_HISTORY_DEFAULT_CURRENCY") {
            config.default_currency = code.parse().map_err(|e| {
                crate::Error::Config(format!("PAYMENT_HISTORY_DEFAULT_CURRENCY: {}", e))
            })?;
        }

        if let Ok(flag) = std::env::var("PAYMENT_HISTORY_APPROVED_ONLY") {
            config.approved_only = parse_flag("PAYMENT_HISTORY_APPROVED_ONLY", &flag)?;
        }

        if let Ok(flag) = std::env::var("PAYMENT_HISTORY_ENFORCE_COMBINED_BALANCE") {
            config.enforce_combined_balance =
                parse_flag("PAYMENT_HISTORY_ENFORCE_COMBINED_BALANCE", &flag)?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::Error::Config(format!("{}: not a boolean: {}", name, other))),
    }
}
