//! Catalog of the channels through which external funds enter the wallet.

use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    MobileMoney,
    Bank,
    Card,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::MobileMoney => "mobile_money",
            ChannelType::Bank => "bank",
            ChannelType::Card => "card",
        }
    }
}

/// `fee = fixed + amount * percentage / 100`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct FeeSchedule {
    pub fixed: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub display_name: String,
    pub channel_type: ChannelType,
    pub is_active: bool,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub fees: FeeSchedule,
    pub processing_time_hint: String,
}

impl PaymentMethod {
    fn builtin(
        id: &str,
        display_name: &str,
        channel_type: ChannelType,
        (min_amount, max_amount): (Decimal, Decimal),
        (fixed, percentage): (Decimal, Decimal),
        processing_time_hint: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            channel_type,
            is_active: true,
            min_amount,
            max_amount,
            fees: FeeSchedule { fixed, percentage },
            processing_time_hint: processing_time_hint.to_string(),
        }
    }
}

static BUILTIN: LazyLock<PaymentMethodRegistry> = LazyLock::new(|| PaymentMethodRegistry {
    methods: vec![
        PaymentMethod::builtin(
            "mtn_momo",
            "MTN MoMo",
            ChannelType::MobileMoney,
            (dec!(5), dec!(50000)),
            (dec!(2), dec!(0.5)),
            "Instant",
        ),
        PaymentMethod::builtin(
            "unayo",
            "Unayo",
            ChannelType::MobileMoney,
            (dec!(10), dec!(25000)),
            (dec!(1.5), dec!(0.3)),
            "Instant",
        ),
        PaymentMethod::builtin(
            "fnb",
            "FNB Eswatini",
            ChannelType::Bank,
            (dec!(50), dec!(100000)),
            (dec!(5), dec!(0.2)),
            "1-2 hours",
        ),
        PaymentMethod::builtin(
            "swazibank",
            "SwaziBank",
            ChannelType::Bank,
            (dec!(50), dec!(100000)),
            (dec!(4), dec!(0.25)),
            "1-2 hours",
        ),
        PaymentMethod::builtin(
            "standard_bank",
            "Standard Bank",
            ChannelType::Bank,
            (dec!(50), dec!(150000)),
            (dec!(6), dec!(0.15)),
            "2-4 hours",
        ),
        PaymentMethod::builtin(
            "nedbank",
            "Nedbank",
            ChannelType::Bank,
            (dec!(50), dec!(120000)),
            (dec!(5.5), dec!(0.2)),
            "1-3 hours",
        ),
    ],
});

/// Read-only registry of payment methods, kept in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethodRegistry {
    methods: Vec<PaymentMethod>,
}

impl PaymentMethodRegistry {
    /// The process-wide built-in catalog.
    pub fn builtin() -> &'static PaymentMethodRegistry {
        &BUILTIN
    }

    /// Builds a custom catalog. Ids must be unique and limits consistent.
    pub fn from_methods(methods: Vec<PaymentMethod>) -> Result<Self> {
        let mut seen = HashSet::new();
        for method in &methods {
            if !seen.insert(method.id.as_str()) {
                return Err(PaymentError::invalid(format!(
                    "duplicate payment method id '{}'",
                    method.id
                )));
            }
            if method.min_amount > method.max_amount {
                return Err(PaymentError::invalid(format!(
                    "payment method '{}' has min amount above max amount",
                    method.id
                )));
            }
        }
        Ok(Self { methods })
    }

    pub fn get(&self, id: &str) -> Result<&PaymentMethod> {
        self.methods
            .iter()
            .find(|method| method.id == id)
            .ok_or_else(|| PaymentError::UnknownPaymentMethod(id.to_string()))
    }

    pub fn list_active(&self) -> impl Iterator<Item = &PaymentMethod> {
        self.methods.iter().filter(|method| method.is_active)
    }
}
