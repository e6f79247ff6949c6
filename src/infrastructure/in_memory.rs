use crate::domain::account::{Account, Versioned};
use crate::domain::ports::{LedgerStore, TransactionFilter, WriteSet, check_update};
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Change notifications kept for slow subscribers.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Ledger {
    accounts: HashMap<String, Versioned<Account>>,
    /// Commit order; the position doubles as the recency rank.
    transactions: Vec<Transaction>,
    by_id: HashMap<String, usize>,
    /// Reference -> position of the transaction claiming it.
    references: HashMap<String, usize>,
}

impl Ledger {
    fn check(&self, writes: &WriteSet) -> Result<()> {
        for write in &writes.accounts {
            let current = self
                .accounts
                .get(&write.account.id)
                .map(|stored| stored.version);
            if current != Some(write.expected_version) {
                return Err(PaymentError::Conflict(write.account.id.clone()));
            }
        }

        let mut batch_refs = HashSet::new();
        for tx in &writes.transactions {
            if self.by_id.contains_key(&tx.id) {
                return Err(PaymentError::Storage(format!(
                    "transaction id {} already exists",
                    tx.id
                )));
            }
            if tx.claims_reference()
                && (self.references.contains_key(&tx.reference)
                    || !batch_refs.insert(tx.reference.as_str()))
            {
                return Err(PaymentError::DuplicateReference(tx.reference.clone()));
            }
        }

        for tx in &writes.updates {
            let stored = self.by_id.get(&tx.id).map(|&pos| &self.transactions[pos]);
            check_update(stored, tx)?;
        }
        Ok(())
    }
}

/// A thread-safe in-memory document store for accounts and transactions.
///
/// A single `RwLock` over both collections gives `commit` serializable
/// isolation; account versions detect read-modify-write races between the
/// engine's read and its commit. Ideal for tests and single-process runs.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
    events: broadcast::Sender<Transaction>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            ledger: Arc::new(RwLock::new(Ledger::default())),
            events,
        }
    }

    /// Live change-feed receivers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_account(&self, id: &str) -> Result<Option<Versioned<Account>>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.accounts.get(id).cloned())
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<Versioned<Account>> {
        let mut ledger = self.ledger.write().await;
        let stored = ledger
            .accounts
            .entry(account.id.clone())
            .or_insert(Versioned {
                value: account,
                version: 1,
            });
        Ok(stored.clone())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let ledger = self.ledger.read().await;
        let mut accounts: Vec<Account> =
            ledger.accounts.values().map(|v| v.value.clone()).collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .by_id
            .get(id)
            .map(|&pos| ledger.transactions[pos].clone()))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .references
            .get(reference)
            .map(|&pos| ledger.transactions[pos].clone()))
    }

    async fn transactions_for(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .transactions
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    async fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        ledger.check(&writes)?;

        for write in writes.accounts {
            let version = write.expected_version + 1;
            ledger.accounts.insert(
                write.account.id.clone(),
                Versioned {
                    value: write.account,
                    version,
                },
            );
        }

        let mut settled = Vec::new();
        for tx in writes.transactions {
            let pos = ledger.transactions.len();
            ledger.by_id.insert(tx.id.clone(), pos);
            if tx.claims_reference() {
                ledger.references.insert(tx.reference.clone(), pos);
            }
            ledger.transactions.push(tx.clone());
            settled.push(tx);
        }
        for tx in writes.updates {
            let Some(&pos) = ledger.by_id.get(&tx.id) else {
                continue;
            };
            if !tx.claims_reference() {
                ledger.references.remove(&tx.reference);
            }
            ledger.transactions[pos] = tx.clone();
            settled.push(tx);
        }

        // Published under the write lock so subscribers see commit order.
        // Having no subscribers is fine.
        for tx in settled.into_iter().filter(|tx| tx.status.is_final()) {
            let _ = self.events.send(tx);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Transaction> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Role;
    use crate::domain::money::Amount;
    use crate::domain::transaction::{Parties, TransactionKind};
    use rust_decimal_macros::dec;

    fn tx(payer: &str, receiver: &str, reference: &str) -> Transaction {
        let mut tx = Transaction::pending(
            Parties {
                payer_id: payer.to_string(),
                payer_contact: format!("{payer}@example.com"),
                receiver_id: receiver.to_string(),
                receiver_contact: format!("{receiver}@example.com"),
            },
            Amount::new(dec!(10)).unwrap(),
            TransactionKind::Transfer,
            reference,
        );
        tx.complete().unwrap();
        tx
    }

    #[tokio::test]
    async fn test_insert_account_if_absent_is_idempotent() {
        let store = InMemoryLedgerStore::new();
        let first = store
            .insert_account_if_absent(Account::new("m-1", Role::Merchant, "m@example.com"))
            .await
            .unwrap();
        let second = store
            .insert_account_if_absent(Account::new("m-1", Role::Client, "other@example.com"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.value.role, Role::Merchant);
        assert!(store.get_account("m-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_version() {
        let store = InMemoryLedgerStore::new();
        let read = store
            .insert_account_if_absent(Account::new("c-1", Role::Client, "c@example.com"))
            .await
            .unwrap();

        let mut credited = read.value.clone();
        credited.credit(Amount::new(dec!(5)).unwrap());
        let mut first = WriteSet::new();
        first.put_account(&read, credited.clone());
        store.commit(first).await.unwrap();

        // Same read version again: someone else committed in between.
        let mut second = WriteSet::new();
        second.put_account(&read, credited);
        assert!(matches!(
            store.commit(second).await,
            Err(PaymentError::Conflict(id)) if id == "c-1"
        ));

        let current = store.get_account("c-1").await.unwrap().unwrap();
        assert_eq!(current.version, read.version + 1);
        assert_eq!(current.value.balance.value(), dec!(5));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing_on_duplicate_reference() {
        let store = InMemoryLedgerStore::new();
        let read = store
            .insert_account_if_absent(Account::new("c-1", Role::Client, "c@example.com"))
            .await
            .unwrap();

        let mut writes = WriteSet::new();
        writes.insert_transaction(tx("c-1", "m-1", "REF-1"));
        store.commit(writes).await.unwrap();

        let mut credited = read.value.clone();
        credited.credit(Amount::new(dec!(5)).unwrap());
        let mut writes = WriteSet::new();
        writes
            .put_account(&read, credited)
            .insert_transaction(tx("c-1", "m-1", "REF-1"));
        assert!(matches!(
            store.commit(writes).await,
            Err(PaymentError::DuplicateReference(r)) if r == "REF-1"
        ));

        let account = store.get_account("c-1").await.unwrap().unwrap();
        assert_eq!(account.value.balance.value(), dec!(0));
    }

    #[tokio::test]
    async fn test_failed_records_release_reference() {
        let store = InMemoryLedgerStore::new();
        let mut failed = Transaction::pending(
            Parties {
                payer_id: "c-1".to_string(),
                payer_contact: "c@example.com".to_string(),
                receiver_id: "c-1".to_string(),
                receiver_contact: "c@example.com".to_string(),
            },
            Amount::new(dec!(10)).unwrap(),
            TransactionKind::TopUp,
            "TOPUP-1",
        );
        failed.fail("Network timeout").unwrap();

        let mut writes = WriteSet::new();
        writes.insert_transaction(failed);
        store.commit(writes).await.unwrap();
        assert!(store.find_by_reference("TOPUP-1").await.unwrap().is_none());

        let mut writes = WriteSet::new();
        writes.insert_transaction(tx("c-1", "c-1", "TOPUP-1"));
        store.commit(writes).await.unwrap();
        assert!(store.find_by_reference("TOPUP-1").await.unwrap().is_some());
    }

    fn pending_top_up(reference: &str) -> Transaction {
        Transaction::pending(
            Parties {
                payer_id: "c-1".to_string(),
                payer_contact: "c@example.com".to_string(),
                receiver_id: "c-1".to_string(),
                receiver_contact: "c@example.com".to_string(),
            },
            Amount::new(dec!(10)).unwrap(),
            TransactionKind::TopUp,
            reference,
        )
    }

    #[tokio::test]
    async fn test_pending_record_claims_reference_until_settled() {
        let store = InMemoryLedgerStore::new();
        let mut events = store.subscribe();
        let pending = pending_top_up("TOPUP-1");
        store.record(pending.clone()).await.unwrap();

        // A second claim on the same reference loses while the first is in flight.
        assert!(matches!(
            store.record(pending_top_up("TOPUP-1")).await,
            Err(PaymentError::DuplicateReference(r)) if r == "TOPUP-1"
        ));
        // Pending entries are not published.
        assert!(events.try_recv().is_err());

        let mut completed = pending.clone();
        completed.complete().unwrap();
        let mut writes = WriteSet::new();
        writes.update_transaction(completed.clone());
        store.commit(writes).await.unwrap();

        assert_eq!(events.recv().await.unwrap(), completed);
        assert_eq!(
            store.find_by_reference("TOPUP-1").await.unwrap(),
            Some(completed.clone())
        );
        let history = store
            .transactions_for(&TransactionFilter::Receiver("c-1".to_string()))
            .await
            .unwrap();
        assert_eq!(history, vec![completed.clone()]);

        // Settled records are final.
        let mut failed = pending;
        failed.fail("Network timeout").unwrap();
        let mut writes = WriteSet::new();
        writes.update_transaction(failed);
        assert!(matches!(
            store.commit(writes).await,
            Err(PaymentError::InvalidTransition { .. })
        ));
        assert_eq!(store.get_transaction(&completed.id).await.unwrap(), Some(completed));
    }

    #[tokio::test]
    async fn test_failing_a_pending_record_releases_reference() {
        let store = InMemoryLedgerStore::new();
        let mut pending = pending_top_up("TOPUP-1");
        store.record(pending.clone()).await.unwrap();

        pending.fail("Insufficient funds").unwrap();
        let mut writes = WriteSet::new();
        writes.update_transaction(pending.clone());
        store.commit(writes).await.unwrap();

        assert!(store.find_by_reference("TOPUP-1").await.unwrap().is_none());
        assert_eq!(store.get_transaction(&pending.id).await.unwrap(), Some(pending));
        store.record(pending_top_up("TOPUP-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_of_unknown_transaction_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let mut completed = pending_top_up("TOPUP-1");
        completed.complete().unwrap();
        let mut writes = WriteSet::new();
        writes.update_transaction(completed);
        assert!(matches!(
            store.commit(writes).await,
            Err(PaymentError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_transactions_newest_first_and_published() {
        let store = InMemoryLedgerStore::new();
        let mut events = store.subscribe();

        let t1 = tx("c-1", "m-1", "A");
        let t2 = tx("c-1", "m-2", "B");
        let other = tx("c-2", "m-1", "C");
        for t in [t1.clone(), t2.clone(), other.clone()] {
            let mut writes = WriteSet::new();
            writes.insert_transaction(t);
            store.commit(writes).await.unwrap();
        }

        let payer = store
            .transactions_for(&TransactionFilter::Payer("c-1".to_string()))
            .await
            .unwrap();
        assert_eq!(payer, vec![t2.clone(), t1.clone()]);

        let receiver = store
            .transactions_for(&TransactionFilter::Receiver("m-1".to_string()))
            .await
            .unwrap();
        assert_eq!(receiver, vec![other.clone(), t1.clone()]);

        assert_eq!(events.recv().await.unwrap(), t1);
        assert_eq!(events.recv().await.unwrap(), t2);
        assert_eq!(events.recv().await.unwrap(), other);
        assert_eq!(store.get_transaction(&t2.id).await.unwrap(), Some(t2));
    }
}
