//! Transaction-type handlers
//!
//! One handler per [`TransactionType`], selected by an exhaustive match in
//! [`handler_for`]. Each handler knows how to fold an event into a running
//! [`PaymentGroupState`] and how to reconcile the same event seen from two
//! sibling branches.
//!
//! | Type            | available  | charged | reverse_charged | refunded |
//! |-----------------|------------|---------|-----------------|----------|
//! | Reserve         | = amount   |         |                 |          |
//! | ModifyReserve   | += delta   |         |                 |          |
//! | CancelReserve   | = 0 (flag) |         |                 |          |
//! | Charge          | -= amount  | += amt  |                 |          |
//! | ReverseCharge   |            |         | += amount       |          |
//! | Credit          |            |         |                 | += amt   |

use crate::{
    money::ensure_currency,
    state::{Contribution, PaymentGroupState},
    types::{PaymentEvent, TransactionType},
    Error, Result,
};
use rust_decimal::Decimal;

/// Fold and merge rules for one transaction type
pub trait TransactionHandler {
    /// Delta `event` applies on top of `state`
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution>;

    /// Reconcile the contribution of one event as seen by two branches
    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution>;
}

/// Handler for a transaction type
pub fn handler_for(transaction_type: TransactionType) -> &'static dyn TransactionHandler {
    match transaction_type {
        TransactionType::Reserve => &ReserveHandler,
        TransactionType::ModifyReserve => &ModifyReserveHandler,
        TransactionType::CancelReserve => &CancelReserveHandler,
        TransactionType::Charge => &ChargeHandler,
        TransactionType::ReverseCharge => &ReverseChargeHandler,
        TransactionType::Credit | TransactionType::ManualCredit => &CreditHandler,
    }
}

/// Sets the representative reservation and its initial available amount
#[derive(Debug)]
pub struct ReserveHandler;

/// Applies a signed adjustment to available
#[derive(Debug)]
pub struct ModifyReserveHandler;

/// Releases whatever is still available
#[derive(Debug)]
pub struct CancelReserveHandler;

/// Moves funds from available into charged
#[derive(Debug)]
pub struct ChargeHandler;

/// Records a reversal against charged
#[derive(Debug)]
pub struct ReverseChargeHandler;

/// Records a refund against charged
#[derive(Debug)]
pub struct CreditHandler;

impl TransactionHandler for ReserveHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        let amount = non_negative(event)?;
        state.set_representative(event)?;
        Ok(Contribution::none(event).with_available(amount))
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

impl TransactionHandler for ModifyReserveHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        in_scope(state, event)?;
        let delta = event.amount.amount;
        if state.available() + delta < Decimal::ZERO {
            return Err(Error::accumulation(
                &event.guid,
                format!(
                    "modification {} would leave available {} negative",
                    delta,
                    state.available()
                ),
            ));
        }
        Ok(Contribution::none(event).with_available(delta))
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

impl TransactionHandler for CancelReserveHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        in_scope(state, event)?;
        Ok(Contribution::none(event).cancelling())
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

impl TransactionHandler for ChargeHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        in_scope(state, event)?;
        let amount = non_negative(event)?;
        if amount > state.available() {
            return Err(Error::accumulation(
                &event.guid,
                format!("charge {} exceeds available {}", amount, state.available()),
            ));
        }
        Ok(Contribution::none(event)
            .with_available(-amount)
            .with_charged(amount))
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

impl TransactionHandler for ReverseChargeHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        in_scope(state, event)?;
        let amount = non_negative(event)?;
        if state.reverse_charged() + amount > state.charged() {
            return Err(Error::accumulation(
                &event.guid,
                format!(
                    "reversal {} exceeds unreversed charges {}",
                    amount,
                    state.net_charged()
                ),
            ));
        }
        Ok(Contribution::none(event).with_reverse_charged(amount))
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

impl TransactionHandler for CreditHandler {
    fn accumulate(
        &self,
        state: &mut PaymentGroupState,
        event: &PaymentEvent,
    ) -> Result<Contribution> {
        in_scope(state, event)?;
        let amount = non_negative(event)?;
        let refundable = state.net_charged() - state.refunded();
        if amount > refundable {
            return Err(Error::accumulation(
                &event.guid,
                format!("refund {} exceeds refundable {}", amount, refundable),
            ));
        }
        Ok(Contribution::none(event).with_refunded(amount))
    }

    fn combine(&self, left: &Contribution, right: &Contribution) -> Result<Contribution> {
        same_contribution(left, right)
    }
}

/// Reservation must already be folded, in the event's currency
fn in_scope(state: &PaymentGroupState, event: &PaymentEvent) -> Result<()> {
    let currency = state.currency().ok_or_else(|| {
        Error::accumulation(
            &event.guid,
            format!("{} has no preceding reservation", event.transaction_type),
        )
    })?;
    ensure_currency(currency, event.amount.currency)
}

fn non_negative(event: &PaymentEvent) -> Result<Decimal> {
    if event.amount.is_negative() {
        return Err(Error::accumulation(
            &event.guid,
            format!("{} amount {} is negative", event.transaction_type, event.amount),
        ));
    }
    Ok(event.amount.amount)
}

/// An event's delta depends only on its ancestors, so both sides must agree
fn same_contribution(left: &Contribution, right: &Contribution) -> Result<Contribution> {
    if left != right {
        return Err(Error::Combination(format!(
            "event {} contributed differently in two branches",
            left.event
        )));
    }
    Ok(left.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        money::Money,
        types::{Currency, InstrumentGuid},
    };

    fn event(guid: &str, kind: TransactionType, amount: i64) -> PaymentEvent {
        PaymentEvent::new(
            guid,
            kind,
            Money::new(Decimal::from(amount), Currency::USD),
            &InstrumentGuid::new("card"),
        )
    }

    fn reserved(amount: i64) -> PaymentGroupState {
        let mut state = PaymentGroupState::new();
        state
            .apply(0, &event("r1", TransactionType::Reserve, amount))
            .unwrap();
        state
    }

    #[test]
    fn test_every_type_has_a_handler() {
        let mut state = reserved(100);
        let steps = [
            (TransactionType::ModifyReserve, 20),
            (TransactionType::Charge, 50),
            (TransactionType::ReverseCharge, 10),
            (TransactionType::Credit, 15),
            (TransactionType::ManualCredit, 5),
            (TransactionType::CancelReserve, 0),
        ];
        for (i, (kind, amount)) in steps.iter().enumerate() {
            state
                .apply(i + 1, &event(&format!("e{i}"), *kind, *amount))
                .unwrap();
        }

        assert_eq!(state.available(), Decimal::ZERO);
        assert_eq!(state.charged(), Decimal::from(50));
        assert_eq!(state.reverse_charged(), Decimal::from(10));
        assert_eq!(state.refunded(), Decimal::from(20));
    }

    #[test]
    fn test_charge_exceeding_available_fails() {
        let mut state = reserved(100);
        let err = state
            .apply(1, &event("c1", TransactionType::Charge, 101))
            .unwrap_err();
        assert!(matches!(err, Error::Accumulation { .. }));
        assert!(err.to_string().contains("exceeds available"));
    }

    #[test]
    fn test_reverse_exceeding_charged_fails() {
        let mut state = reserved(100);
        state.apply(1, &event("c1", TransactionType::Charge, 40)).unwrap();
        let err = state
            .apply(2, &event("rc1", TransactionType::ReverseCharge, 41))
            .unwrap_err();
        assert!(matches!(err, Error::Accumulation { .. }));
    }

    #[test]
    fn test_refund_exceeding_charged_fails() {
        let mut state = reserved(100);
        state.apply(1, &event("c1", TransactionType::Charge, 40)).unwrap();
        assert!(state
            .apply(2, &event("cr1", TransactionType::Credit, 41))
            .is_err());
    }

    #[test]
    fn test_negative_modification_floor() {
        let mut state = reserved(100);
        state
            .apply(1, &event("m1", TransactionType::ModifyReserve, -60))
            .unwrap();
        assert_eq!(state.available(), Decimal::from(40));
        assert!(state
            .apply(2, &event("m2", TransactionType::ModifyReserve, -41))
            .is_err());
    }

    #[test]
    fn test_charge_without_reservation_fails() {
        let mut state = PaymentGroupState::new();
        let err = state
            .apply(0, &event("c1", TransactionType::Charge, 10))
            .unwrap_err();
        assert!(err.to_string().contains("no preceding reservation"));
    }

    #[test]
    fn test_currency_mismatch_in_chain() {
        let mut state = reserved(100);
        let charge = PaymentEvent::new(
            "c1",
            TransactionType::Charge,
            Money::new(Decimal::from(10), Currency::EUR),
            &InstrumentGuid::new("card"),
        );
        assert!(matches!(
            state.apply(1, &charge),
            Err(Error::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_second_reservation_in_chain_fails() {
        let mut state = reserved(100);
        assert!(state
            .apply(1, &event("r2", TransactionType::Reserve, 10))
            .is_err());
    }

    #[test]
    fn test_combine_detects_disagreement() {
        let charge = event("c1", TransactionType::Charge, 10);
        let left = Contribution::none(&charge)
            .with_available(Decimal::from(-10))
            .with_charged(Decimal::from(10));
        let right = left.clone().with_charged(Decimal::from(11));

        let handler = handler_for(TransactionType::Charge);
        assert_eq!(handler.combine(&left, &left).unwrap(), left);
        assert!(matches!(
            handler.combine(&left, &right),
            Err(Error::Combination(_))
        ));
    }
}
