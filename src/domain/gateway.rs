use super::money::Amount;
use crate::error::{FailureKind, PaymentError};
use std::fmt;

/// Who the external funds come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSubject {
    Phone(String),
    AccountNumber(String),
}

impl fmt::Display for PaymentSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentSubject::Phone(_) => f.write_str("phone"),
            PaymentSubject::AccountNumber(_) => f.write_str("account number"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub channel: String,
    pub amount: Amount,
    pub reference: String,
    pub subject: PaymentSubject,
}

/// The provider accepted the funds movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl GatewayFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            reason: reason.into(),
        }
    }

    pub fn terminal(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Terminal,
            reason: reason.into(),
        }
    }
}

impl From<GatewayFailure> for PaymentError {
    fn from(failure: GatewayFailure) -> Self {
        PaymentError::Gateway {
            kind: failure.kind,
            reason: failure.reason,
        }
    }
}
