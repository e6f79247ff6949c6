use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative wallet balance.
///
/// Wraps `rust_decimal::Decimal` so arithmetic stays exact. The only way to
/// lower a balance is [`Balance::debit`], which refuses to go below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

/// A strictly positive monetary amount moved by a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::invalid("Amount must be positive"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::invalid("Balance cannot be negative"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn credit(self, amount: Amount) -> Self {
        Self(self.0 + amount.0)
    }

    pub fn debit(self, amount: Amount) -> Result<Self, PaymentError> {
        if self.0 >= amount.0 {
            Ok(Self(self.0 - amount.0))
        } else {
            Err(PaymentError::InsufficientBalance {
                required: amount.0,
                available: self.0,
            })
        }
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Balance::new(value).map_err(serde::de::Error::custom)
    }
}

/// Wallet currency format: `E` prefix, two decimals.
fn fmt_currency(value: Decimal, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "E{:.2}", value)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_currency(self.0, f)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_currency(self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::InvalidInput(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_balance_rejects_negative() {
        assert!(Balance::new(dec!(0)).is_ok());
        assert!(Balance::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_balance_credit_and_debit() {
        let balance = Balance::new(dec!(100)).unwrap();
        let balance = balance.debit(amount(dec!(40))).unwrap();
        assert_eq!(balance.value(), dec!(60));
        assert_eq!(balance.credit(amount(dec!(0.5))).value(), dec!(60.5));
    }

    #[test]
    fn test_balance_debit_insufficient() {
        let balance = Balance::new(dec!(60)).unwrap();
        let err = balance.debit(amount(dec!(80))).unwrap_err();
        assert!(matches!(
            err,
            PaymentError::InsufficientBalance { required, available }
                if required == dec!(80) && available == dec!(60)
        ));
    }

    #[test]
    fn test_debit_to_exactly_zero() {
        let balance = Balance::new(dec!(25)).unwrap();
        assert_eq!(balance.debit(amount(dec!(25))).unwrap(), Balance::ZERO);
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(amount(dec!(100)).to_string(), "E100.00");
        assert_eq!(Balance::new(dec!(7.5)).unwrap().to_string(), "E7.50");
    }

    #[test]
    fn test_deserialize_validates_through_serde() {
        assert!(serde_json::from_str::<Balance>("\"-1\"").is_err());
        assert_eq!(
            serde_json::from_str::<Balance>("\"40.25\"").unwrap().value(),
            dec!(40.25)
        );
    }

    #[test]
    fn test_deserialize_rejects_non_positive_amount() {
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
        assert_eq!(
            serde_json::from_str::<Amount>("\"12.5\"").unwrap().value(),
            dec!(12.5)
        );
    }
}
