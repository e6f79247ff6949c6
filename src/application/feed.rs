use crate::domain::account::Role;
use crate::domain::ports::{LedgerStore, LedgerStoreRef, TransactionFilter};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// What a subscriber sees next.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The account's full history, newest first.
    Snapshot(Vec<Transaction>),
    /// A matching transaction committed after the last snapshot.
    Added(Transaction),
}

/// Live per-account transaction views over a store.
#[derive(Clone)]
pub struct TransactionFeed {
    store: LedgerStoreRef,
}

impl TransactionFeed {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Opens a view of `account_id`: clients see what they paid, merchants
    /// what they received.
    ///
    /// The first event is always a snapshot. Subscribing again restarts the
    /// view with a new snapshot.
    pub async fn subscribe(&self, account_id: &str, role: Role) -> Result<FeedSubscription> {
        let filter = match role {
            Role::Client => TransactionFilter::Payer(account_id.to_string()),
            Role::Merchant => TransactionFilter::Receiver(account_id.to_string()),
        };
        // Listen before reading so nothing committed in between is lost.
        let receiver = self.store.subscribe();
        let snapshot = self.store.transactions_for(&filter).await?;
        debug!(account = %account_id, role = %role, size = snapshot.len(), "feed opened");

        Ok(FeedSubscription {
            store: Arc::downgrade(&self.store),
            filter,
            receiver,
            seen: seen(&snapshot),
            pending: Some(snapshot),
        })
    }
}

fn seen(snapshot: &[Transaction]) -> HashMap<String, TransactionStatus> {
    snapshot.iter().map(|tx| (tx.id.clone(), tx.status)).collect()
}

/// A pull-based subscription returned by [`TransactionFeed::subscribe`].
///
/// Holds only a weak handle on the store: once the store is gone the feed
/// drains what was already published and then ends.
pub struct FeedSubscription {
    store: Weak<dyn LedgerStore>,
    filter: TransactionFilter,
    receiver: broadcast::Receiver<Transaction>,
    /// Entries of the last snapshot, by id, in the status they were shown in.
    seen: HashMap<String, TransactionStatus>,
    pending: Option<Vec<Transaction>>,
}

impl FeedSubscription {
    /// Waits for the next event. `Ok(None)` means the feed has ended.
    pub async fn next(&mut self) -> Result<Option<FeedEvent>> {
        if let Some(snapshot) = self.pending.take() {
            return Ok(Some(FeedEvent::Snapshot(snapshot)));
        }

        loop {
            match self.receiver.recv().await {
                Ok(tx) => {
                    if !self.filter.matches(&tx) {
                        continue;
                    }
                    // A pending snapshot entry that settled since still counts as new.
                    if self.seen.remove(&tx.id) == Some(tx.status) {
                        continue;
                    }
                    return Ok(Some(FeedEvent::Added(tx)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "feed fell behind, resending snapshot");
                    let Some(store) = self.store.upgrade() else {
                        return Ok(None);
                    };
                    self.receiver = store.subscribe();
                    let snapshot = store.transactions_for(&self.filter).await?;
                    self.seen = seen(&snapshot);
                    return Ok(Some(FeedEvent::Snapshot(snapshot)));
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    /// Stops listening. Dropping the subscription has the same effect.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
