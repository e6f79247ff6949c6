use crate::domain::account::{Account, Versioned};
use crate::domain::ports::{LedgerStore, TransactionFilter, WriteSet, check_update};
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::DEFAULT_EVENT_CAPACITY;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Column Family for storing versioned accounts, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the transaction log, keyed by big-endian commit sequence.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family mapping transaction id to commit sequence.
pub const CF_TX_INDEX: &str = "tx_index";
/// Column Family mapping a claimed reference to commit sequence.
pub const CF_REFERENCES: &str = "references";

#[derive(Serialize, Deserialize)]
struct StoredAccount {
    version: u64,
    account: Account,
}

fn db_error(e: rocksdb::Error) -> PaymentError {
    PaymentError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| PaymentError::Storage(format!("Serialization error: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| PaymentError::Storage(format!("Deserialization error: {e}")))
}

fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| PaymentError::Storage("Corrupt sequence key".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

/// A persistent store implementation using RocksDB.
///
/// Accounts and the transaction log live in separate Column Families and
/// every commit is a single `WriteBatch`, so a crash never leaves a balance
/// change without its transaction. Commits are serialized by an async mutex
/// that also guards the next commit sequence number.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    next_seq: Arc<Mutex<u64>>,
    events: broadcast::Sender<Transaction>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and resumes the
    /// commit sequence after the last stored transaction.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_event_capacity(path, DEFAULT_EVENT_CAPACITY)
    }

    /// Like [`RocksDBStore::open`], buffering `capacity` change
    /// notifications for slow subscribers.
    pub fn open_with_event_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_TX_INDEX, CF_REFERENCES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(db_error)?;

        let next_seq = {
            let cf = db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| {
                PaymentError::Storage("Transactions column family not found".to_string())
            })?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item.map_err(db_error)?;
                    decode_seq(&key)? + 1
                }
                None => 0,
            }
        };

        let (events, _) = broadcast::channel(capacity.max(1));
        Ok(Self {
            db: Arc::new(db),
            next_seq: Arc::new(Mutex::new(next_seq)),
            events,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::Storage(format!("{name} column family not found")))
    }

    fn read_account(&self, id: &str) -> Result<Option<StoredAccount>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.as_bytes()).map_err(db_error)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_by_seq(&self, seq_bytes: &[u8]) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, seq_bytes).map_err(db_error)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn get_account(&self, id: &str) -> Result<Option<Versioned<Account>>> {
        Ok(self.read_account(id)?.map(|stored| Versioned {
            value: stored.account,
            version: stored.version,
        }))
    }

    async fn insert_account_if_absent(&self, account: Account) -> Result<Versioned<Account>> {
        let _guard = self.next_seq.lock().await;
        if let Some(stored) = self.read_account(&account.id)? {
            return Ok(Versioned {
                value: stored.account,
                version: stored.version,
            });
        }

        let stored = StoredAccount {
            version: 1,
            account,
        };
        let cf = self.cf(CF_ACCOUNTS)?;
        self.db
            .put_cf(cf, stored.account.id.as_bytes(), encode(&stored)?)
            .map_err(db_error)?;
        Ok(Versioned {
            value: stored.account,
            version: stored.version,
        })
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item.map_err(db_error)?;
            let stored: StoredAccount = decode(&value)?;
            accounts.push(stored.account);
        }
        // Keys are account ids, so iteration order is already sorted.
        Ok(accounts)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TX_INDEX)?;
        match self.db.get_cf(cf, id.as_bytes()).map_err(db_error)? {
            Some(seq) => self.read_by_seq(&seq),
            None => Ok(None),
        }
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_REFERENCES)?;
        match self.db.get_cf(cf, reference.as_bytes()).map_err(db_error)? {
            Some(seq) => self.read_by_seq(&seq),
            None => Ok(None),
        }
    }

    async fn transactions_for(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut matching = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_key, value) = item.map_err(db_error)?;
            let tx: Transaction = decode(&value)?;
            if filter.matches(&tx) {
                matching.push(tx);
            }
        }
        Ok(matching)
    }

    async fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut next_seq = self.next_seq.lock().await;

        for write in &writes.accounts {
            let current = self.read_account(&write.account.id)?.map(|s| s.version);
            if current != Some(write.expected_version) {
                return Err(PaymentError::Conflict(write.account.id.clone()));
            }
        }

        let refs_cf = self.cf(CF_REFERENCES)?;
        let index_cf = self.cf(CF_TX_INDEX)?;
        let mut batch_refs = HashSet::new();
        for tx in &writes.transactions {
            if self
                .db
                .get_pinned_cf(index_cf, tx.id.as_bytes())
                .map_err(db_error)?
                .is_some()
            {
                return Err(PaymentError::Storage(format!(
                    "transaction id {} already exists",
                    tx.id
                )));
            }
            if tx.claims_reference() {
                let taken = self
                    .db
                    .get_pinned_cf(refs_cf, tx.reference.as_bytes())
                    .map_err(db_error)?
                    .is_some();
                if taken || !batch_refs.insert(tx.reference.as_str()) {
                    return Err(PaymentError::DuplicateReference(tx.reference.clone()));
                }
            }
        }

        let mut update_seqs = Vec::with_capacity(writes.updates.len());
        for tx in &writes.updates {
            let seq = self.db.get_cf(index_cf, tx.id.as_bytes()).map_err(db_error)?;
            let stored = match &seq {
                Some(seq) => self.read_by_seq(seq)?,
                None => None,
            };
            check_update(stored.as_ref(), tx)?;
            if let Some(seq) = seq {
                update_seqs.push(seq);
            }
        }

        let accounts_cf = self.cf(CF_ACCOUNTS)?;
        let tx_cf = self.cf(CF_TRANSACTIONS)?;
        let mut batch = WriteBatch::default();
        for write in &writes.accounts {
            let stored = StoredAccount {
                version: write.expected_version + 1,
                account: write.account.clone(),
            };
            batch.put_cf(accounts_cf, write.account.id.as_bytes(), encode(&stored)?);
        }

        let mut seq = *next_seq;
        for tx in &writes.transactions {
            let key = seq.to_be_bytes();
            batch.put_cf(tx_cf, key, encode(tx)?);
            batch.put_cf(index_cf, tx.id.as_bytes(), key);
            if tx.claims_reference() {
                batch.put_cf(refs_cf, tx.reference.as_bytes(), key);
            }
            seq += 1;
        }

        for (tx, key) in writes.updates.iter().zip(&update_seqs) {
            batch.put_cf(tx_cf, key, encode(tx)?);
            if !tx.claims_reference() {
                batch.delete_cf(refs_cf, tx.reference.as_bytes());
            }
        }

        self.db.write(batch).map_err(db_error)?;
        *next_seq = seq;

        for tx in writes.transactions.into_iter().chain(writes.updates) {
            if tx.status.is_final() {
                let _ = self.events.send(tx);
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Transaction> {
        self.events.subscribe()
    }
}
