use super::money::Amount;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    TopUp,
    InvoicePayment,
    ProductPayment,
    Transfer,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::TopUp => "top_up",
            TransactionKind::InvoicePayment => "invoice_payment",
            TransactionKind::ProductPayment => "product_payment",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }

    /// Kinds that move value from one wallet to another.
    pub fn is_wallet_payment(&self) -> bool {
        matches!(
            self,
            TransactionKind::InvoicePayment
                | TransactionKind::ProductPayment
                | TransactionKind::Transfer
        )
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_up" => Ok(TransactionKind::TopUp),
            "invoice_payment" => Ok(TransactionKind::InvoicePayment),
            "product_payment" => Ok(TransactionKind::ProductPayment),
            "transfer" => Ok(TransactionKind::Transfer),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            other => Err(PaymentError::invalid(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger entry.
///
/// Only `status` (and the failure reason that accompanies a failed status)
/// changes after creation, and only out of `Pending`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub payer_id: String,
    pub payer_contact: String,
    pub receiver_id: String,
    pub receiver_contact: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub reference: String,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fees: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// The parties of a transaction: who pays and who receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Parties {
    pub payer_id: String,
    pub payer_contact: String,
    pub receiver_id: String,
    pub receiver_contact: String,
}

impl Transaction {
    /// Starts a pending transaction with a fresh id and the current time.
    pub fn pending(
        parties: Parties,
        amount: Amount,
        kind: TransactionKind,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payer_id: parties.payer_id,
            payer_contact: parties.payer_contact,
            receiver_id: parties.receiver_id,
            receiver_contact: parties.receiver_contact,
            amount,
            kind,
            reference: reference.into(),
            status: TransactionStatus::Pending,
            timestamp: Utc::now(),
            description: None,
            channel: None,
            external_reference: None,
            fees: None,
            failure_reason: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>, fees: Decimal) -> Self {
        self.channel = Some(channel.into());
        self.fees = Some(fees);
        self
    }

    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.transition(TransactionStatus::Completed)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), PaymentError> {
        self.transition(TransactionStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Administrative cancellation of a pending entry.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.transition(TransactionStatus::Cancelled)
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), PaymentError> {
        if self.status != TransactionStatus::Pending || to == TransactionStatus::Pending {
            return Err(PaymentError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// Whether this entry holds its reference. Failed attempts release it so
    /// the caller can retry under the same key.
    pub fn claims_reference(&self) -> bool {
        self.status != TransactionStatus::Failed
    }
}
