//! Payment History
//!
//! Reconstructs the financial state of an order from its flat ledger of
//! payment events and answers balance questions about it.
//!
//! # Architecture
//!
//! - **Derived state**: Nothing is stored, every query rebuilds from events
//! - **Chains**: Parent links form a forest, expanded into root-to-leaf paths
//! - **Handlers**: One fold rule per transaction type
//! - **Groups**: Branches of one reservation combine without double counting
//!
//! # Invariants
//!
//! - Every counted chain starts at a reservation
//! - Events within a chain are folded strictly root → leaf
//! - Results do not depend on the input order of events
//! - All amounts in one answer share a currency

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod chain;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod metrics;
pub mod money;
pub mod registry;
pub mod state;
pub mod types;
pub mod validators;

// Re-exports
pub use chain::{build_chains, EventChain};
pub use config::{HistoryConfig, ValidationConfig};
pub use error::{Error, Result};
pub use handlers::{handler_for, TransactionHandler};
pub use history::{EventBalance, GroupSummary, InstrumentHeadroom, LedgerSummary, PaymentHistory};
pub use metrics::Metrics;
pub use money::Money;
pub use registry::{EventIndex, EventRegistry};
pub use state::{Contribution, PaymentGroupState};
pub use types::{
    ledger_from_json, Currency, EventGuid, InstrumentGuid, OrderPaymentInstrument, PaymentEvent,
    PaymentStatus, TransactionType,
};
pub use validators::{
    default_validators, BalanceValidator, CurrencyConsistencyValidator, EventOrderValidator,
    EventValidator, ReservationRootValidator,
};
