use super::account::{Account, Versioned};
use super::gateway::{GatewayFailure, GatewayReceipt, GatewayRequest};
use super::transaction::{Transaction, TransactionStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// An account write guarded by the version it was read at.
#[derive(Debug, Clone)]
pub struct AccountWrite {
    pub account: Account,
    pub expected_version: u64,
}

/// Everything one atomic unit writes. A store applies all of it or none.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub accounts: Vec<AccountWrite>,
    pub transactions: Vec<Transaction>,
    /// Replacements for stored `pending` records with the same id.
    pub updates: Vec<Transaction>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&mut self, read: &Versioned<Account>, account: Account) -> &mut Self {
        self.accounts.push(AccountWrite {
            account,
            expected_version: read.version,
        });
        self
    }

    pub fn insert_transaction(&mut self, tx: Transaction) -> &mut Self {
        self.transactions.push(tx);
        self
    }

    /// Settles a stored pending transaction, e.g. pending to completed.
    pub fn update_transaction(&mut self, tx: Transaction) -> &mut Self {
        self.updates.push(tx);
        self
    }
}

/// Checks that `update` may replace `stored`: the stored record must be
/// pending and keep its reference.
pub fn check_update(stored: Option<&Transaction>, update: &Transaction) -> Result<()> {
    let stored = stored.ok_or_else(|| {
        PaymentError::Storage(format!("transaction {} does not exist", update.id))
    })?;
    if stored.status != TransactionStatus::Pending || update.status == TransactionStatus::Pending {
        return Err(PaymentError::InvalidTransition {
            from: stored.status.to_string(),
            to: update.status.to_string(),
        });
    }
    if stored.reference != update.reference {
        return Err(PaymentError::Storage(format!(
            "transaction {} cannot change its reference",
            update.id
        )));
    }
    Ok(())
}

/// Which side of a transaction an account is looked up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionFilter {
    Payer(String),
    Receiver(String),
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            TransactionFilter::Payer(id) => &tx.payer_id == id,
            TransactionFilter::Receiver(id) => &tx.receiver_id == id,
        }
    }
}

/// The transactional document store holding the account directory and the
/// transaction log.
///
/// `commit` must be serializable: it fails with `PaymentError::Conflict`
/// when any account write names a version other than the current one, and
/// with `PaymentError::DuplicateReference` when an inserted transaction
/// claims a reference that is already claimed. An update may only replace
/// a stored `pending` record (`PaymentError::InvalidTransition` otherwise)
/// and releases the reference when the new status no longer claims it.
/// Inserted and updated transactions in a final status are published to
/// subscribers, in commit order.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, id: &str) -> Result<Option<Versioned<Account>>>;
    /// Inserts the account unless one with the same id exists; returns the
    /// stored account either way.
    async fn insert_account_if_absent(&self, account: Account) -> Result<Versioned<Account>>;
    async fn accounts(&self) -> Result<Vec<Account>>;
    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;
    /// The transaction currently claiming `reference`, if any.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;
    /// Matching transactions, newest first.
    async fn transactions_for(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
    async fn commit(&self, writes: WriteSet) -> Result<()>;
    /// Inserts a single transaction with no account writes.
    async fn record(&self, tx: Transaction) -> Result<()> {
        let mut writes = WriteSet::new();
        writes.insert_transaction(tx);
        self.commit(writes).await
    }
    fn subscribe(&self) -> broadcast::Receiver<Transaction>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;

/// An external provider moving funds into the wallet. Implementations never
/// touch the ledger.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(
        &self,
        request: &GatewayRequest,
    ) -> std::result::Result<GatewayReceipt, GatewayFailure>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
