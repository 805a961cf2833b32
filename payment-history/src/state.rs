//! Per-reservation accumulator (derived from events)
//!
//! A state is built by folding one chain root → leaf. Each folded event
//! leaves a [`Contribution`]: the delta it applied to the four balances. An
//! event's delta depends only on its ancestors, so it is the same in every
//! chain that contains it. Combining two branch states is therefore a union
//! of their contributions, and the balances are always the sum of the unique
//! contributions:
//!
//! ```text
//! [R 100, C 40]  -> {R: avail +100, C: avail -40 charged +40}
//! [R 100, C 30]  -> {R: avail +100, C': avail -30 charged +30}
//! combined       -> {R, C, C'}  => available 30, charged 70
//! ```
//!
//! Cancellation is not a delta. A cancel in any branch flags the whole group,
//! and `available` reads as zero once every branch is combined.

use crate::{
    handlers::handler_for,
    registry::EventIndex,
    types::{Currency, EventGuid, PaymentEvent, TransactionType},
    Error, Result,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Delta one event applied to its group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    /// Event that produced the delta
    pub event: EventGuid,
    /// Kind of that event
    pub transaction_type: TransactionType,
    /// Change to available
    pub available: Decimal,
    /// Change to gross charged
    pub charged: Decimal,
    /// Change to gross refunded
    pub refunded: Decimal,
    /// Change to gross reversed charges
    pub reverse_charged: Decimal,
    /// Releases whatever the reservation still holds
    pub cancels: bool,
}

impl Contribution {
    /// Zero delta for `event`
    pub fn none(event: &PaymentEvent) -> Self {
        Self {
            event: event.guid.clone(),
            transaction_type: event.transaction_type,
            available: Decimal::ZERO,
            charged: Decimal::ZERO,
            refunded: Decimal::ZERO,
            reverse_charged: Decimal::ZERO,
            cancels: false,
        }
    }

    /// Set available delta
    pub fn with_available(mut self, delta: Decimal) -> Self {
        self.available = delta;
        self
    }

    /// Set charged delta
    pub fn with_charged(mut self, delta: Decimal) -> Self {
        self.charged = delta;
        self
    }

    /// Set refunded delta
    pub fn with_refunded(mut self, delta: Decimal) -> Self {
        self.refunded = delta;
        self
    }

    /// Set reverse-charged delta
    pub fn with_reverse_charged(mut self, delta: Decimal) -> Self {
        self.reverse_charged = delta;
        self
    }

    /// Mark as a cancellation
    pub fn cancelling(mut self) -> Self {
        self.cancels = true;
        self
    }
}

/// Running balances of one original reservation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentGroupState {
    representative_event: Option<PaymentEvent>,
    available: Decimal,
    charged: Decimal,
    refunded: Decimal,
    reverse_charged: Decimal,
    cancelled: bool,
    contributions: BTreeMap<EventIndex, Contribution>,
}

impl PaymentGroupState {
    /// Empty state, before the reservation is folded in
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain's root reservation, once folded
    pub fn representative_event(&self) -> Option<&PaymentEvent> {
        self.representative_event.as_ref()
    }

    /// Currency of the reservation
    pub fn currency(&self) -> Option<Currency> {
        self.representative_event.as_ref().map(|e| e.amount.currency)
    }

    /// Amount still reservable/chargeable, zero once cancelled
    pub fn available(&self) -> Decimal {
        if self.cancelled {
            Decimal::ZERO
        } else {
            self.available
        }
    }

    /// Reserved minus charged, ignoring any cancellation
    pub fn gross_available(&self) -> Decimal {
        self.available
    }

    /// A cancel was folded in on some branch
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Gross charged
    pub fn charged(&self) -> Decimal {
        self.charged
    }

    /// Gross refunded
    pub fn refunded(&self) -> Decimal {
        self.refunded
    }

    /// Gross reversed charges
    pub fn reverse_charged(&self) -> Decimal {
        self.reverse_charged
    }

    /// Charged net of reversals
    pub fn net_charged(&self) -> Decimal {
        self.charged - self.reverse_charged
    }

    /// Charged but not yet refunded
    pub fn refundable(&self) -> Decimal {
        self.charged - self.refunded
    }

    /// Number of distinct events folded in
    pub fn event_count(&self) -> usize {
        self.contributions.len()
    }

    /// Per-event deltas, keyed by arena position
    pub fn contributions(&self) -> &BTreeMap<EventIndex, Contribution> {
        &self.contributions
    }

    /// Fold one event (the next one on the chain) into this state
    pub fn apply(&mut self, index: EventIndex, event: &PaymentEvent) -> Result<()> {
        if self.contributions.contains_key(&index) {
            return Err(Error::accumulation(&event.guid, "event already folded into this state"));
        }
        let contribution = handler_for(event.transaction_type).accumulate(self, event)?;
        self.record(index, contribution);
        Ok(())
    }

    /// Merge a state from a sibling branch of the same reservation
    pub fn combine(mut self, other: PaymentGroupState) -> Result<Self> {
        match (&self.representative_event, &other.representative_event) {
            (Some(mine), Some(theirs)) if mine == theirs => {}
            (mine, theirs) => {
                return Err(Error::Combination(format!(
                    "representative events differ: {:?} vs {:?}",
                    mine.as_ref().map(|e| &e.guid),
                    theirs.as_ref().map(|e| &e.guid),
                )));
            }
        }

        for (index, theirs) in other.contributions {
            if let Some(mine) = self.contributions.get(&index) {
                handler_for(mine.transaction_type).combine(mine, &theirs)?;
                continue;
            }
            self.record(index, theirs);
        }

        Ok(self)
    }

    /// Balances that only hold once every branch is combined
    ///
    /// Each branch checks its own ancestors, so sibling reversals or refunds
    /// can jointly exceed what was charged. Sibling charges overdrawing the
    /// reservation are checked only when `enforce_available` is set.
    pub fn check_combined(&self, enforce_available: bool) -> Result<()> {
        let reservation = self
            .representative_event
            .as_ref()
            .map(|e| e.guid.as_str())
            .unwrap_or_default();

        if enforce_available && self.available < Decimal::ZERO {
            return Err(Error::InvariantViolation(format!(
                "branches of reservation {} overdraw it: available {}",
                reservation, self.available
            )));
        }
        if self.reverse_charged > self.charged {
            return Err(Error::InvariantViolation(format!(
                "reservation {} reverses {} of {} charged",
                reservation, self.reverse_charged, self.charged
            )));
        }
        if self.refunded > self.net_charged() {
            return Err(Error::InvariantViolation(format!(
                "reservation {} refunds {} of {} net charged",
                reservation,
                self.refunded,
                self.net_charged()
            )));
        }
        Ok(())
    }

    pub(crate) fn set_representative(&mut self, event: &PaymentEvent) -> Result<()> {
        if let Some(existing) = &self.representative_event {
            return Err(Error::accumulation(
                &event.guid,
                format!("chain already has reservation {}", existing.guid),
            ));
        }
        self.representative_event = Some(event.clone());
        Ok(())
    }

    fn record(&mut self, index: EventIndex, contribution: Contribution) {
        self.available += contribution.available;
        self.charged += contribution.charged;
        self.refunded += contribution.refunded;
        self.reverse_charged += contribution.reverse_charged;
        self.cancelled |= contribution.cancels;
        self.contributions.insert(index, contribution);
    }
}
