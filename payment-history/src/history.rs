//! Ledger query engine
//!
//! Every query runs the same pipeline over a fresh copy of the derived data:
//!
//! 1. Drop non-approved events (if configured)
//! 2. Index the ledger and build root-to-leaf chains
//! 3. Run every validator over every chain
//! 4. Fold each chain into a [`PaymentGroupState`], root → leaf
//! 5. Combine states that share a reservation
//! 6. Derive the requested aggregate
//!
//! Nothing is cached between calls and the input slice is never modified.
//!
//! # Example
//!
//! ```
//! use payment_history::{
//!     Currency, HistoryConfig, InstrumentGuid, Money, PaymentEvent, PaymentHistory,
//!     TransactionType,
//! };
//! use rust_decimal::Decimal;
//!
//! # fn main() -> payment_history::Result<()> {
//! let card = InstrumentGuid::new("card-1");
//! let usd = |v: i64| Money::new(Decimal::from(v), Currency::USD);
//!
//! let reserve = PaymentEvent::new("r1", TransactionType::Reserve, usd(100), &card);
//! let charge = PaymentEvent::new("c1", TransactionType::Charge, usd(60), &card)
//!     .with_parent(&reserve);
//!
//! let history = PaymentHistory::new(HistoryConfig::default());
//! let ledger = vec![reserve, charge];
//! assert_eq!(history.available_reserved_amount(&ledger)?, usd(40));
//! assert_eq!(history.charged_amount(&ledger)?, usd(60));
//! # Ok(())
//! # }
//! ```

use crate::{
    chain::build_chains,
    config::HistoryConfig,
    metrics::Metrics,
    money::{ensure_currency, Money},
    registry::EventRegistry,
    state::PaymentGroupState,
    types::{Currency, EventGuid, OrderPaymentInstrument, PaymentEvent, PaymentStatus},
    validators::{default_validators, EventValidator},
    Error, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap, fmt};

/// An event paired with an amount derived for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBalance {
    /// Representative reservation
    pub event: PaymentEvent,
    /// Amount available to charge or refund against it
    pub amount: Money,
}

/// Remaining reservable amount on an instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentHeadroom {
    /// The instrument
    pub instrument: OrderPaymentInstrument,
    /// Headroom below its limit (zero for uncapped instruments)
    pub amount: Money,
}

/// Balances of one original reservation after combining its branches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Root reservation
    pub reservation: PaymentEvent,
    /// Still reservable/chargeable
    pub available: Money,
    /// Gross charged
    pub charged: Money,
    /// Gross reversed charges
    pub reverse_charged: Money,
    /// Gross refunded
    pub refunded: Money,
    /// Distinct events folded in
    pub event_count: usize,
}

/// Every aggregate of one ledger, computed in a single pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Ledger currency
    pub currency: Currency,
    /// Σ available
    pub available: Money,
    /// Σ charged − Σ reverse charged
    pub charged: Money,
    /// Σ reverse charged
    pub reverse_charged: Money,
    /// Σ refunded
    pub refunded: Money,
    /// Reservations that can still be charged
    pub chargeable: Vec<EventBalance>,
    /// Reservations that can still be refunded
    pub refundable: Vec<EventBalance>,
    /// Per-reservation breakdown, ordered by reservation guid
    pub groups: Vec<GroupSummary>,
}

/// Combined per-reservation states of one ledger
struct Reconciliation {
    currency: Currency,
    groups: Vec<PaymentGroupState>,
}

impl Reconciliation {
    fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }

    fn total(&self, field: impl Fn(&PaymentGroupState) -> Decimal) -> Money {
        self.money(self.groups.iter().map(field).sum())
    }

    fn available(&self) -> Money {
        self.total(PaymentGroupState::available)
    }

    fn charged(&self) -> Money {
        self.total(PaymentGroupState::net_charged)
    }

    fn reverse_charged(&self) -> Money {
        self.total(PaymentGroupState::reverse_charged)
    }

    fn refunded(&self) -> Money {
        self.total(PaymentGroupState::refunded)
    }

    fn chargeable(&self) -> Vec<EventBalance> {
        self.balances(PaymentGroupState::available)
    }

    /// A pending reversal anywhere in the ledger blocks every refund
    fn refundable(&self) -> Vec<EventBalance> {
        if self.reverse_charged().is_positive() {
            return Vec::new();
        }
        self.balances(PaymentGroupState::refundable)
    }

    fn balances(&self, field: impl Fn(&PaymentGroupState) -> Decimal) -> Vec<EventBalance> {
        self.groups
            .iter()
            .filter_map(|group| {
                let amount = field(group);
                let event = group.representative_event()?;
                (amount > Decimal::ZERO).then(|| EventBalance {
                    event: event.clone(),
                    amount: self.money(amount),
                })
            })
            .collect()
    }

    fn summary(&self) -> LedgerSummary {
        let groups = self
            .groups
            .iter()
            .filter_map(|group| {
                Some(GroupSummary {
                    reservation: group.representative_event()?.clone(),
                    available: self.money(group.available()),
                    charged: self.money(group.charged()),
                    reverse_charged: self.money(group.reverse_charged()),
                    refunded: self.money(group.refunded()),
                    event_count: group.event_count(),
                })
            })
            .collect();

        LedgerSummary {
            currency: self.currency,
            available: self.available(),
            charged: self.charged(),
            reverse_charged: self.reverse_charged(),
            refunded: self.refunded(),
            chargeable: self.chargeable(),
            refundable: self.refundable(),
            groups,
        }
    }
}

/// Payment history query engine
pub struct PaymentHistory {
    config: HistoryConfig,
    validators: Vec<Box<dyn EventValidator>>,
    metrics: Option<Metrics>,
}

impl fmt::Debug for PaymentHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validators: Vec<&str> = self.validators.iter().map(|v| v.name()).collect();
        f.debug_struct("PaymentHistory")
            .field("config", &self.config)
            .field("validators", &validators)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for PaymentHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl PaymentHistory {
    /// Create engine with the built-in validators enabled by `config`
    pub fn new(config: HistoryConfig) -> Self {
        let validators = default_validators(&config.validation);
        Self {
            config,
            validators,
            metrics: None,
        }
    }

    /// Add a validator, run after the built-in ones
    pub fn with_validator(mut self, validator: Box<dyn EventValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Attach metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Σ available across all reservations
    pub fn available_reserved_amount(&self, events: &[PaymentEvent]) -> Result<Money> {
        self.run("available_reserved_amount", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.available())
        })
    }

    /// Σ charged − Σ reverse charged
    pub fn charged_amount(&self, events: &[PaymentEvent]) -> Result<Money> {
        self.run("charged_amount", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.charged())
        })
    }

    /// Σ refunded
    pub fn refunded_amount(&self, events: &[PaymentEvent]) -> Result<Money> {
        self.run("refunded_amount", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.refunded())
        })
    }

    /// Reservations with a positive available amount
    pub fn chargeable_payment_events(&self, events: &[PaymentEvent]) -> Result<Vec<EventBalance>> {
        self.run("chargeable_payment_events", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.chargeable())
        })
    }

    /// Reservations with charged − refunded > 0; empty while any reversal
    /// exists in the ledger
    pub fn refundable_payment_events(&self, events: &[PaymentEvent]) -> Result<Vec<EventBalance>> {
        self.run("refundable_payment_events", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.refundable())
        })
    }

    /// Instruments that can take a further reservation, with their headroom
    ///
    /// An instrument with a zero limit is uncapped and always reported with a
    /// zero amount. Otherwise headroom is `limit − (available + charged −
    /// refunded)` over the events attached to that instrument, and only
    /// positive headroom is reported.
    pub fn reservable_order_payment_instruments(
        &self,
        events: &[PaymentEvent],
        instruments: &[OrderPaymentInstrument],
    ) -> Result<Vec<InstrumentHeadroom>> {
        self.run("reservable_order_payment_instruments", |chains| {
            let mut reservable = Vec::new();

            for instrument in instruments {
                if instrument.is_unlimited() {
                    reservable.push(InstrumentHeadroom {
                        instrument: instrument.clone(),
                        amount: Money::zero(instrument.limit.currency),
                    });
                    continue;
                }

                let attached: Vec<PaymentEvent> = events
                    .iter()
                    .filter(|e| e.order_payment_instrument_guid == instrument.guid)
                    .cloned()
                    .collect();
                let reconciliation =
                    self.reconcile(&attached, instrument.limit.currency, chains)?;
                let used = reconciliation
                    .available()
                    .checked_add(&reconciliation.charged())?
                    .checked_sub(&reconciliation.refunded())?;
                let headroom = instrument.limit.checked_sub(&used)?;

                tracing::debug!(
                    instrument = %instrument.guid,
                    limit = %instrument.limit,
                    used = %used,
                    "computed instrument headroom"
                );

                if headroom.is_positive() {
                    reservable.push(InstrumentHeadroom {
                        instrument: instrument.clone(),
                        amount: headroom,
                    });
                }
            }

            Ok(reservable)
        })
    }

    /// All aggregates plus the per-reservation breakdown
    pub fn summarize(&self, events: &[PaymentEvent]) -> Result<LedgerSummary> {
        self.run("summarize", |chains| {
            Ok(self.reconcile(events, self.config.default_currency, chains)?.summary())
        })
    }

    /// Run one public query; `f` adds the chains it builds to the counter
    fn run<T>(&self, query: &'static str, f: impl FnOnce(&mut usize) -> Result<T>) -> Result<T> {
        let mut chains = 0;
        let result = f(&mut chains);
        if let Some(metrics) = &self.metrics {
            metrics.record_chains(chains);
        }
        match &result {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_query(query);
                }
            }
            Err(err) => {
                tracing::warn!(
                    query,
                    kind = err.kind(),
                    error = %err,
                    "payment history query failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(err.kind());
                }
            }
        }
        result
    }

    fn reconcile(
        &self,
        events: &[PaymentEvent],
        fallback: Currency,
        chain_count: &mut usize,
    ) -> Result<Reconciliation> {
        let filtered = self.config.approved_only
            && events.iter().any(|e| e.status != PaymentStatus::Approved);
        let ledger: Cow<'_, [PaymentEvent]> = if filtered {
            Cow::Owned(
                events
                    .iter()
                    .filter(|e| e.status == PaymentStatus::Approved)
                    .cloned()
                    .collect(),
            )
        } else {
            Cow::Borrowed(events)
        };

        let registry = EventRegistry::index(&ledger)?;
        let chains = build_chains(&registry);
        *chain_count += chains.len();

        // Validate everything before folding anything
        for chain in &chains {
            let view: Vec<&PaymentEvent> = chain.events(&registry).collect();
            for validator in &self.validators {
                validator.validate(&view)?;
            }
        }

        let mut combined: BTreeMap<EventGuid, PaymentGroupState> = BTreeMap::new();
        for chain in &chains {
            let state = chain.fold(
                &registry,
                PaymentGroupState::new(),
                |mut state, index, event| {
                    state.apply(index, event)?;
                    Ok(state)
                },
            )?;

            let key = state
                .representative_event()
                .map(|e| e.guid.clone())
                .ok_or_else(|| {
                    Error::InvariantViolation("chain folded without a reservation".to_string())
                })?;

            let merged = match combined.remove(&key) {
                Some(existing) => existing.combine(state)?,
                None => state,
            };
            combined.insert(key, merged);
        }

        let groups: Vec<PaymentGroupState> = combined.into_values().collect();

        let currency = groups
            .first()
            .and_then(PaymentGroupState::currency)
            .unwrap_or(fallback);
        for group in &groups {
            if let Some(group_currency) = group.currency() {
                ensure_currency(currency, group_currency)?;
            }
            group.check_combined(self.config.enforce_combined_balance)?;
        }

        tracing::info!(
            events = events.len(),
            chains = chains.len(),
            reservations = groups.len(),
            currency = %currency,
            "reconciled payment events"
        );

        Ok(Reconciliation { currency, groups })
    }
}
