//! Currency-aware money arithmetic
//!
//! Every binary operation checks currencies first; mixing currencies has no
//! safe default and always fails with [`Error::CurrencyMismatch`].

use crate::{types::Currency, Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact monetary amount in one currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount
    pub amount: Decimal,

    /// Currency of `amount`
    pub currency: Currency,
}

impl Money {
    /// Create new money value
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Amount is exactly zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Fail unless `other` is in the same currency
    pub fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        ensure_currency(self.currency, other.currency)
    }

    /// Currency-checked addition
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    /// Currency-checked subtraction
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency))
    }

    /// Currency-checked comparison
    pub fn checked_cmp(&self, other: &Money) -> Result<std::cmp::Ordering> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Sum values that must all share `currency`; empty input yields zero
    pub fn try_sum<'a, I>(currency: Currency, values: I) -> Result<Money>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        values
            .into_iter()
            .try_fold(Money::zero(currency), |acc, value| acc.checked_add(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

pub(crate) fn ensure_currency(expected: Currency, found: Currency) -> Result<()> {
    if expected != found {
        return Err(Error::CurrencyMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), Currency::USD)
    }

    #[test]
    fn test_add_and_subtract() {
        let total = usd(10000).checked_add(&usd(2550)).unwrap();
        assert_eq!(total, usd(12550));

        let rest = usd(10000).checked_sub(&usd(12550)).unwrap();
        assert!(rest.is_negative());
        assert_eq!(rest.amount, Decimal::new(-2550, 2));
    }

    #[test]
    fn test_currency_mismatch_fails() {
        let eur = Money::new(Decimal::from(5), Currency::EUR);
        let err = usd(100).checked_add(&eur).unwrap_err();
        assert!(matches!(
            err,
            Error::CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::EUR
            }
        ));
        assert!(usd(100).checked_sub(&eur).is_err());
        assert!(usd(100).checked_cmp(&eur).is_err());
    }

    #[test]
    fn test_zero_and_sign() {
        let zero = Money::zero(Currency::GBP);
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(usd(1).is_positive());
        assert_eq!(usd(1).checked_cmp(&usd(2)).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_try_sum() {
        let values = [usd(100), usd(250), usd(-50)];
        assert_eq!(Money::try_sum(Currency::USD, &values).unwrap(), usd(300));
        assert_eq!(
            Money::try_sum(Currency::JPY, &[]).unwrap(),
            Money::zero(Currency::JPY)
        );
        assert!(Money::try_sum(Currency::EUR, &values).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(12550).to_string(), "125.50 USD");
    }
}
