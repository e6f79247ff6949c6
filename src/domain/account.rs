use super::money::{Amount, Balance};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Merchant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Merchant => f.write_str("merchant"),
        }
    }
}

impl FromStr for Role {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "merchant" => Ok(Role::Merchant),
            other => Err(PaymentError::invalid(format!("unknown role '{other}'"))),
        }
    }
}

/// A wallet account as held by the account directory.
///
/// The balance is only ever changed by the ledger engine, through
/// [`Account::credit`] and [`Account::debit`], inside an atomic unit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub role: Role,
    pub balance: Balance,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Opens an empty account.
    pub fn new(id: impl Into<String>, role: Role, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            balance: Balance::ZERO,
            email: email.into(),
            created_at: Utc::now(),
        }
    }

    pub fn credit(&mut self, amount: Amount) {
        self.balance = self.balance.credit(amount);
    }

    /// Debits the balance, leaving it untouched when funds are short.
    pub fn debit(&mut self, amount: Amount) -> Result<(), PaymentError> {
        self.balance = self.balance.debit(amount)?;
        Ok(())
    }
}

/// A stored value together with the version it was read at.
///
/// Versions back the store's optimistic concurrency: a write set that names
/// a stale version is rejected at commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new("acc-1", Role::Client, "a@example.com");
        assert_eq!(account.balance, Balance::ZERO);
        assert_eq!(account.role, Role::Client);
    }

    #[test]
    fn test_account_debit_insufficient_keeps_balance() {
        let mut account = Account::new("acc-1", Role::Client, "a@example.com");
        account.credit(Amount::new(dec!(10)).unwrap());

        let result = account.debit(Amount::new(dec!(20)).unwrap());
        assert!(matches!(
            result,
            Err(PaymentError::InsufficientBalance { .. })
        ));
        assert_eq!(account.balance.value(), dec!(10));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("merchant".parse::<Role>().unwrap(), Role::Merchant);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_account_serializes_camel_case() {
        let account = Account::new("acc-1", Role::Merchant, "m@example.com");
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["role"], "merchant");
        assert!(json.get("createdAt").is_some());
    }
}
