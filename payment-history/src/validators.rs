//! Structural checks run over every chain before accumulation
//!
//! A validator sees one fully built root-to-leaf chain. The first failure
//! aborts the whole query.

use crate::{
    config::ValidationConfig,
    types::{PaymentEvent, TransactionType},
    Error, Result,
};
use rust_decimal::Decimal;

/// Consistency check over one chain
pub trait EventValidator: Send + Sync {
    /// Name reported in validation errors
    fn name(&self) -> &'static str;

    /// Inspect `chain` (root first)
    fn validate(&self, chain: &[&PaymentEvent]) -> Result<()>;
}

/// Built-in validators enabled by `config`, in evaluation order
pub fn default_validators(config: &ValidationConfig) -> Vec<Box<dyn EventValidator>> {
    let mut validators: Vec<Box<dyn EventValidator>> = Vec::new();
    if config.reservation_root {
        validators.push(Box::new(ReservationRootValidator));
    }
    if config.currency_consistency {
        validators.push(Box::new(CurrencyConsistencyValidator));
    }
    if config.event_order {
        validators.push(Box::new(EventOrderValidator));
    }
    if config.balance {
        validators.push(Box::new(BalanceValidator));
    }
    validators
}

fn failure(validator: &dyn EventValidator, reason: String) -> Error {
    Error::Validation {
        validator: validator.name(),
        reason,
    }
}

/// Every chain must start at a reservation
#[derive(Debug, Default)]
pub struct ReservationRootValidator;

impl EventValidator for ReservationRootValidator {
    fn name(&self) -> &'static str {
        "reservation_root"
    }

    fn validate(&self, chain: &[&PaymentEvent]) -> Result<()> {
        match chain.first() {
            Some(root) if root.transaction_type == TransactionType::Reserve => Ok(()),
            Some(root) => Err(failure(
                self,
                format!(
                    "chain starts at {} {} instead of a reservation",
                    root.transaction_type, root.guid
                ),
            )),
            None => Err(failure(self, "empty chain".to_string())),
        }
    }
}

/// All amounts on a chain share the reservation's currency
#[derive(Debug, Default)]
pub struct CurrencyConsistencyValidator;

impl EventValidator for CurrencyConsistencyValidator {
    fn name(&self) -> &'static str {
        "currency_consistency"
    }

    fn validate(&self, chain: &[&PaymentEvent]) -> Result<()> {
        let Some(root) = chain.first() else {
            return Ok(());
        };
        let expected = root.amount.currency;
        match chain.iter().find(|e| e.amount.currency != expected) {
            Some(event) => Err(failure(
                self,
                format!(
                    "event {} is in {} but reservation {} is in {}",
                    event.guid, event.amount.currency, root.guid, expected
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Causal ordering of transaction types along a chain
///
/// - a reservation only appears at the root
/// - reversals and refunds need an earlier charge
/// - nothing reserves or charges after a cancellation
#[derive(Debug, Default)]
pub struct EventOrderValidator;

impl EventValidator for EventOrderValidator {
    fn name(&self) -> &'static str {
        "event_order"
    }

    fn validate(&self, chain: &[&PaymentEvent]) -> Result<()> {
        let mut charged = false;
        let mut cancelled = false;

        for (position, event) in chain.iter().enumerate() {
            match event.transaction_type {
                TransactionType::Reserve if position > 0 => {
                    return Err(failure(
                        self,
                        format!("reservation {} is not at the root of its chain", event.guid),
                    ));
                }
                TransactionType::Reserve => {}
                TransactionType::ModifyReserve | TransactionType::Charge if cancelled => {
                    return Err(failure(
                        self,
                        format!(
                            "{} {} follows a cancelled reservation",
                            event.transaction_type, event.guid
                        ),
                    ));
                }
                TransactionType::Charge => charged = true,
                TransactionType::ModifyReserve => {}
                TransactionType::CancelReserve => cancelled = true,
                TransactionType::ReverseCharge
                | TransactionType::Credit
                | TransactionType::ManualCredit
                    if !charged =>
                {
                    return Err(failure(
                        self,
                        format!(
                            "{} {} has no preceding charge",
                            event.transaction_type, event.guid
                        ),
                    ));
                }
                TransactionType::ReverseCharge
                | TransactionType::Credit
                | TransactionType::ManualCredit => {}
            }
        }
        Ok(())
    }
}

/// Amounts are non-negative (except modifications) and the reserved
/// balance never dips below zero along the chain
#[derive(Debug, Default)]
pub struct BalanceValidator;

impl EventValidator for BalanceValidator {
    fn name(&self) -> &'static str {
        "balance"
    }

    fn validate(&self, chain: &[&PaymentEvent]) -> Result<()> {
        let mut reserved = Decimal::ZERO;

        for event in chain {
            let amount = event.amount.amount;
            if event.transaction_type != TransactionType::ModifyReserve && amount < Decimal::ZERO {
                return Err(failure(
                    self,
                    format!(
                        "{} {} has negative amount {}",
                        event.transaction_type, event.guid, event.amount
                    ),
                ));
            }

            match event.transaction_type {
                TransactionType::Reserve | TransactionType::ModifyReserve => reserved += amount,
                TransactionType::CancelReserve => reserved = Decimal::ZERO,
                _ => {}
            }

            if reserved < Decimal::ZERO {
                return Err(failure(
                    self,
                    format!("reserved balance {} is negative after {}", reserved, event.guid),
                ));
            }
        }
        Ok(())
    }
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

    fn validator_name(err: Error) -> &'static str {
        match err {
            Error::Validation { validator, .. } => validator,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_default_validators_follow_config() {
        assert_eq!(default_validators(&ValidationConfig::default()).len(), 4);

        let config = ValidationConfig {
            balance: false,
            event_order: false,
            ..ValidationConfig::default()
        };
        let names: Vec<&str> = default_validators(&config).iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["reservation_root", "currency_consistency"]);
    }

    #[test]
    fn test_charge_without_reservation_root() {
        let charge = event("c1", TransactionType::Charge, 10);
        let err = ReservationRootValidator.validate(&[&charge]).unwrap_err();
        assert_eq!(validator_name(err), "reservation_root");

        let reserve = event("r1", TransactionType::Reserve, 10);
        assert!(ReservationRootValidator.validate(&[&reserve, &charge]).is_ok());
    }

    #[test]
    fn test_currency_consistency() {
        let reserve = event("r1", TransactionType::Reserve, 10);
        let charge = PaymentEvent::new(
            "c1",
            TransactionType::Charge,
            Money::new(Decimal::from(5), Currency::GBP),
            &InstrumentGuid::new("card"),
        );
        let err = CurrencyConsistencyValidator
            .validate(&[&reserve, &charge])
            .unwrap_err();
        assert_eq!(validator_name(err), "currency_consistency");
    }

    #[test]
    fn test_event_order() {
        let reserve = event("r1", TransactionType::Reserve, 100);
        let charge = event("c1", TransactionType::Charge, 10);
        let refund = event("cr1", TransactionType::Credit, 10);
        let cancel = event("x1", TransactionType::CancelReserve, 0);

        assert!(EventOrderValidator.validate(&[&reserve, &charge, &refund]).is_ok());
        assert!(EventOrderValidator.validate(&[&reserve, &refund]).is_err());
        assert!(EventOrderValidator.validate(&[&reserve, &reserve]).is_err());
        assert!(EventOrderValidator.validate(&[&reserve, &cancel, &charge]).is_err());
        assert!(EventOrderValidator
            .validate(&[&reserve, &charge, &cancel, &refund])
            .is_ok());
    }

    #[test]
    fn test_balance() {
        let reserve = event("r1", TransactionType::Reserve, 100);
        let shrink = event("m1", TransactionType::ModifyReserve, -100);
        let too_far = event("m2", TransactionType::ModifyReserve, -1);
        let negative_charge = event("c1", TransactionType::Charge, -5);

        assert!(BalanceValidator.validate(&[&reserve, &shrink]).is_ok());
        assert!(BalanceValidator.validate(&[&reserve, &shrink, &too_far]).is_err());
        assert!(BalanceValidator.validate(&[&reserve, &negative_charge]).is_err());
    }
}
