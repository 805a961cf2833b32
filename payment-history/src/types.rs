//! Core types for the payment history
//!
//! Events and instruments are supplied by the surrounding order service and
//! are treated as immutable here. Amounts are exact decimals (see [`Money`]).

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Canadian Dollar
    CAD,
    /// Australian Dollar
    AUD,
    /// Japanese Yen
    JPY,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::JPY => "JPY",
            Currency::AED => "AED",
            Currency::INR => "INR",
        }
    }

    /// Parse from an ISO code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            "JPY" => Some(Currency::JPY),
            "AED" => Some(Currency::AED),
            "INR" => Some(Currency::INR),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| format!("unknown currency: {s}"))
    }
}

/// Payment event identifier, unique within one ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventGuid(String);

impl EventGuid {
    /// Create new event guid
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random guid for freshly recorded events
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order payment instrument identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentGuid(String);

impl InstrumentGuid {
    /// Create new instrument guid
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random guid
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of payment event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Funds set aside on an instrument
    Reserve,
    /// Signed adjustment of a reservation
    ModifyReserve,
    /// Reservation released
    CancelReserve,
    /// Reserved funds captured
    Charge,
    /// Captured charge undone
    ReverseCharge,
    /// Charged funds returned to the customer
    Credit,
    /// Refund issued by an operator outside the gateway
    ManualCredit,
}

impl TransactionType {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Reserve => "RESERVE",
            TransactionType::ModifyReserve => "MODIFY_RESERVE",
            TransactionType::CancelReserve => "CANCEL_RESERVE",
            TransactionType::Charge => "CHARGE",
            TransactionType::ReverseCharge => "REVERSE_CHARGE",
            TransactionType::Credit => "CREDIT",
            TransactionType::ManualCredit => "MANUAL_CREDIT",
        }
    }

    /// Refund-like types
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionType::Credit | TransactionType::ManualCredit)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway outcome recorded with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Provider accepted the operation
    #[default]
    Approved,
    /// Provider declined or errored
    Failed,
    /// Operation was not attempted
    Skipped,
}

/// Payment event recorded against an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Unique event guid
    pub guid: EventGuid,

    /// Parent event (None for an original reservation)
    #[serde(default)]
    pub parent_guid: Option<EventGuid>,

    /// Kind of event
    pub transaction_type: TransactionType,

    /// Amount; sign semantics depend on `transaction_type`
    pub amount: Money,

    /// Instrument this event is attached to
    pub order_payment_instrument_guid: InstrumentGuid,

    /// Gateway outcome
    #[serde(default)]
    pub status: PaymentStatus,

    /// When the event was recorded
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    /// Create an approved root event
    pub fn new(
        guid: impl Into<String>,
        transaction_type: TransactionType,
        amount: Money,
        instrument: &InstrumentGuid,
    ) -> Self {
        Self {
            guid: EventGuid::new(guid),
            parent_guid: None,
            transaction_type,
            amount,
            order_payment_instrument_guid: instrument.clone(),
            status: PaymentStatus::Approved,
            created_at: Utc::now(),
        }
    }

    /// Attach to a parent event
    pub fn with_parent(mut self, parent: &PaymentEvent) -> Self {
        self.parent_guid = Some(parent.guid.clone());
        self
    }

    /// Attach to a parent by guid (the parent need not exist)
    pub fn with_parent_guid(mut self, parent: impl Into<String>) -> Self {
        self.parent_guid = Some(EventGuid::new(parent));
        self
    }

    /// Override gateway outcome
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Override record time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Root of a causal tree
    pub fn is_root(&self) -> bool {
        self.parent_guid.is_none()
    }
}

/// Payment instrument attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderPaymentInstrument {
    /// Instrument guid referenced by events
    pub guid: InstrumentGuid,

    /// Reservation cap; zero means uncapped
    pub limit: Money,
}

impl OrderPaymentInstrument {
    /// Create new instrument
    pub fn new(guid: InstrumentGuid, limit: Money) -> Self {
        Self { guid, limit }
    }

    /// Zero limit is the "no cap" sentinel
    pub fn is_unlimited(&self) -> bool {
        self.limit.is_zero()
    }
}

/// Parse a ledger exported as a JSON array of events
pub fn ledger_from_json(json: &str) -> crate::Result<Vec<PaymentEvent>> {
    Ok(serde_json::from_str(json)?)
}
