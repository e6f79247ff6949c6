use crate::domain::account::Role;
use crate::domain::transaction::TransactionKind;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Open,
    TopUp,
    InvoicePayment,
    ProductPayment,
    Transfer,
}

impl OperationType {
    /// The ledger kind a payment row produces; `None` for non-payment rows.
    pub fn payment_kind(&self) -> Option<TransactionKind> {
        match self {
            OperationType::InvoicePayment => Some(TransactionKind::InvoicePayment),
            OperationType::ProductPayment => Some(TransactionKind::ProductPayment),
            OperationType::Transfer => Some(TransactionKind::Transfer),
            OperationType::Open | OperationType::TopUp => None,
        }
    }
}

/// One row of an operations file.
///
/// Columns a row type does not use may be left empty.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub account: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Phone number or bank account number, depending on the channel.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Operation {
    pub fn amount(&self) -> Result<Decimal> {
        self.amount
            .ok_or_else(|| PaymentError::invalid(format!("{:?} row needs an amount", self.op_type)))
    }

    pub fn reference(&self) -> Result<&str> {
        self.reference.as_deref().ok_or_else(|| {
            PaymentError::invalid(format!("{:?} row needs a reference", self.op_type))
        })
    }
}

/// Reads wallet operations from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating short rows.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows, so large files stream.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
