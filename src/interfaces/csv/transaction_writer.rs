use crate::application::feed::FeedEvent;
use crate::domain::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    timestamp: String,
    kind: TransactionKind,
    status: TransactionStatus,
    payer: &'a str,
    receiver: &'a str,
    amount: String,
    fees: Option<String>,
    reference: &'a str,
    description: Option<&'a str>,
}

impl<'a> From<&'a Transaction> for HistoryRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            timestamp: tx.timestamp.to_rfc3339(),
            kind: tx.kind,
            status: tx.status,
            payer: &tx.payer_id,
            receiver: &tx.receiver_id,
            amount: format!("{:.2}", tx.amount.value()),
            fees: tx.fees.map(|fee| format!("{fee:.2}")),
            reference: &tx.reference,
            description: tx.description.as_deref(),
        }
    }
}

/// Writes an account history, newest first, as CSV.
pub struct TransactionWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> TransactionWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_transactions<'a>(
        &mut self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Result<()> {
        for tx in transactions {
            self.writer.serialize(HistoryRow::from(tx))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes the transactions a feed event carries.
    pub fn write_event(&mut self, event: &FeedEvent) -> Result<()> {
        match event {
            FeedEvent::Snapshot(items) => self.write_transactions(items),
            FeedEvent::Added(tx) => self.write_transactions([tx]),
        }
    }
}
