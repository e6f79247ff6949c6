use super::feed::TransactionFeed;
use crate::config::EngineConfig;
use crate::domain::account::{Account, Role, Versioned};
use crate::domain::fees::{self, FeeQuote};
use crate::domain::gateway::{GatewayFailure, GatewayRequest, PaymentSubject};
use crate::domain::money::Amount;
use crate::domain::payment_method::{ChannelType, PaymentMethod, PaymentMethodRegistry};
use crate::domain::ports::{LedgerStoreRef, PaymentGatewayRef, WriteSet};
use crate::domain::session::Session;
use crate::domain::transaction::{Parties, Transaction, TransactionKind, TransactionStatus};
use crate::error::{ErrorKind, PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A request to move funds from an external channel into a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub account_id: String,
    pub amount: Decimal,
    pub channel_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    pub reference: String,
}

/// Outcome of a top-up in the shape handed back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl From<&Result<Transaction>> for TopUpResult {
    fn from(outcome: &Result<Transaction>) -> Self {
        match outcome {
            Ok(tx) => Self {
                success: true,
                transaction_id: Some(tx.id.clone()),
                error: None,
                error_kind: None,
            },
            Err(e) => Self {
                success: false,
                transaction_id: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            },
        }
    }
}

/// A wallet-to-wallet payment made by the session's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub receiver_id: String,
    pub receiver_contact: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub reference: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(PaymentError::invalid(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// The wallet ledger engine.
///
/// Each balance change and its transaction record go to the store as one
/// `WriteSet`. When a concurrent commit invalidates what was read, the whole
/// unit is rebuilt from fresh reads and retried, up to
/// `EngineConfig::max_commit_attempts`. Nothing outside the store is touched
/// while building a unit, so retries are safe. A top-up cancelled between
/// its gateway call and its commit leaves its `pending` record in place.
pub struct LedgerEngine {
    store: LedgerStoreRef,
    gateway: PaymentGatewayRef,
    registry: Arc<PaymentMethodRegistry>,
    config: EngineConfig,
}

impl LedgerEngine {
    /// Creates an engine over the built-in payment method catalog.
    ///
    /// # Arguments
    ///
    /// * `store` - The document store holding accounts and transactions.
    /// * `gateway` - The provider used for top-ups.
    /// * `config` - Retry budget and gateway timeout.
    pub fn new(store: LedgerStoreRef, gateway: PaymentGatewayRef, config: EngineConfig) -> Self {
        Self::with_registry(
            store,
            gateway,
            Arc::new(PaymentMethodRegistry::builtin().clone()),
            config,
        )
    }

    pub fn with_registry(
        store: LedgerStoreRef,
        gateway: PaymentGatewayRef,
        registry: Arc<PaymentMethodRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            registry,
            config,
        }
    }

    pub fn store(&self) -> LedgerStoreRef {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> &PaymentMethodRegistry {
        &self.registry
    }

    /// Live history views over this engine's store.
    pub fn feed(&self) -> TransactionFeed {
        TransactionFeed::new(self.store())
    }

    pub async fn account(&self, id: &str) -> Result<Account> {
        self.read_account(id).await.map(|read| read.value)
    }

    /// Idempotent upsert: returns the existing account untouched, or opens
    /// an empty one.
    pub async fn ensure_account(&self, id: &str, role: Role, contact: &str) -> Result<Account> {
        require(id, "account id")?;
        let stored = self
            .store
            .insert_account_if_absent(Account::new(id, role, contact))
            .await?;
        Ok(stored.value)
    }

    /// Tops up and reports the outcome as a [`TopUpResult`].
    pub async fn top_up(&self, session: &Session, request: &TopUpRequest) -> TopUpResult {
        TopUpResult::from(&self.try_top_up(session, request).await)
    }

    /// Tops up the session's own account through an external channel.
    ///
    /// The reference is claimed by a `pending` record before the gateway is
    /// contacted, so concurrent requests under one reference charge the
    /// source at most once. The requested amount is credited; the channel
    /// fee is charged on top by the provider and stored on the record. A
    /// gateway failure leaves the balance untouched and settles the record
    /// as `failed`, which frees the reference for a retry.
    pub async fn try_top_up(
        &self,
        session: &Session,
        request: &TopUpRequest,
    ) -> Result<Transaction> {
        let outcome = self.run_top_up(session, request).await;
        if let Err(e) = &outcome {
            warn!(kind = %e.kind(), channel = %request.channel_id, "top-up rejected");
        }
        outcome
    }

    async fn run_top_up(&self, session: &Session, request: &TopUpRequest) -> Result<Transaction> {
        require(&request.account_id, "account id")?;
        require(&request.reference, "reference")?;
        if request.account_id != session.account_id {
            return Err(PaymentError::invalid(
                "a session may only top up its own account",
            ));
        }
        let amount = Amount::new(request.amount)?;
        let method = self.registry.get(&request.channel_id)?;
        let subject = Self::subject_for(method, request)?;
        let quote = fees::quote(amount, method)?;

        if let Some(existing) = self.store.find_by_reference(&request.reference).await? {
            return Self::replay_top_up(existing, request, amount);
        }
        let account = self.account(&request.account_id).await?;

        let mut tx = Self::top_up_record(&account, method, &quote, &request.reference);
        match self.store.record(tx.clone()).await {
            Ok(()) => {}
            Err(PaymentError::DuplicateReference(reference)) => {
                // Another request claimed this reference first.
                return match self.store.find_by_reference(&reference).await? {
                    Some(existing) => Self::replay_top_up(existing, request, amount),
                    None => Err(PaymentError::DuplicateReference(reference)),
                };
            }
            Err(e) => return Err(e),
        }

        let gateway_request = GatewayRequest {
            channel: method.id.clone(),
            amount,
            reference: request.reference.clone(),
            subject,
        };
        let initiated = tokio::time::timeout(
            self.config.gateway_timeout(),
            self.gateway.initiate(&gateway_request),
        )
        .await
        .unwrap_or_else(|_| Err(GatewayFailure::transient("Gateway timed out")));
        let receipt = match initiated {
            Ok(receipt) => receipt,
            Err(failure) => return Err(self.fail_top_up(tx, failure).await),
        };

        tx.external_reference = Some(receipt.external_reference);
        tx.complete()?;

        let store = &self.store;
        let tx_ref = &tx;
        let account_id = account.id.as_str();
        let committed = self
            .commit_with_retry(move || async move {
                let read = store
                    .get_account(account_id)
                    .await?
                    .ok_or_else(|| PaymentError::UserNotFound(account_id.to_string()))?;
                let mut credited = read.value.clone();
                credited.credit(amount);

                let mut writes = WriteSet::new();
                writes
                    .put_account(&read, credited)
                    .update_transaction(tx_ref.clone());
                Ok(writes)
            })
            .await;

        match committed {
            Ok(()) => {
                info!(
                    transaction_id = %tx.id,
                    kind = %tx.kind,
                    channel = %method.id,
                    "top-up committed"
                );
                Ok(tx)
            }
            Err(e) => {
                // The source was charged; the pending record keeps the reference.
                error!(
                    transaction_id = %tx.id,
                    external_reference = tx.external_reference.as_deref().unwrap_or_default(),
                    kind = %e.kind(),
                    error = %e,
                    "top-up charged but not credited"
                );
                Err(e)
            }
        }
    }

    fn subject_for(method: &PaymentMethod, request: &TopUpRequest) -> Result<PaymentSubject> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        match method.channel_type {
            ChannelType::MobileMoney | ChannelType::Card => present(&request.phone)
                .map(PaymentSubject::Phone)
                .ok_or_else(|| PaymentError::invalid("phone number is required for this channel")),
            ChannelType::Bank => present(&request.account_number)
                .map(PaymentSubject::AccountNumber)
                .ok_or_else(|| {
                    PaymentError::invalid("account number is required for this channel")
                }),
        }
    }

    fn top_up_record(
        account: &Account,
        method: &PaymentMethod,
        quote: &FeeQuote,
        reference: &str,
    ) -> Transaction {
        Transaction::pending(
            Parties {
                payer_id: account.id.clone(),
                payer_contact: account.email.clone(),
                receiver_id: account.id.clone(),
                receiver_contact: account.email.clone(),
            },
            quote.amount,
            TransactionKind::TopUp,
            reference,
        )
        .with_description(Some(format!("Top-up via {}", method.display_name)))
        .with_channel(method.id.clone(), quote.fee)
    }

    /// Settles the claimed record as failed and hands back the error to report.
    async fn fail_top_up(&self, mut tx: Transaction, failure: GatewayFailure) -> PaymentError {
        if let Err(e) = tx.fail(failure.reason.clone()) {
            return e;
        }

        let mut writes = WriteSet::new();
        writes.update_transaction(tx.clone());
        if let Err(e) = self.store.commit(writes).await {
            // The gateway failure is still the answer; the reference stays claimed.
            error!(
                transaction_id = %tx.id,
                kind = %e.kind(),
                error = %e,
                "could not record failed top-up"
            );
        }
        failure.into()
    }

    fn replay_top_up(
        existing: Transaction,
        request: &TopUpRequest,
        amount: Amount,
    ) -> Result<Transaction> {
        let same = existing.kind == TransactionKind::TopUp
            && existing.status == TransactionStatus::Completed
            && existing.receiver_id == request.account_id
            && existing.amount == amount
            && existing.channel.as_deref() == Some(request.channel_id.as_str());
        if same {
            debug!(transaction_id = %existing.id, "top-up replayed by reference");
            Ok(existing)
        } else {
            Err(PaymentError::DuplicateReference(existing.reference))
        }
    }

    /// Pays `request.amount` from the session's account to the receiver.
    ///
    /// The receiver account is created as an empty merchant account when it
    /// does not exist yet. Debit, credit and the completed record commit
    /// together; an insufficient balance aborts with no effect.
    pub async fn pay(&self, session: &Session, request: &PaymentRequest) -> Result<Transaction> {
        let outcome = self.run_payment(session, request).await;
        if let Err(e) = &outcome {
            warn!(kind = %e.kind(), payment_kind = %request.kind, "payment rejected");
        }
        outcome
    }

    async fn run_payment(
        &self,
        session: &Session,
        request: &PaymentRequest,
    ) -> Result<Transaction> {
        require(&session.account_id, "payer id")?;
        require(&request.receiver_id, "receiver id")?;
        require(&request.reference, "reference")?;
        let amount = Amount::new(request.amount)?;
        if !request.kind.is_wallet_payment() {
            return Err(PaymentError::invalid(format!(
                "{} is not a wallet payment",
                request.kind
            )));
        }
        if request.receiver_id == session.account_id {
            return Err(PaymentError::invalid("payer and receiver must differ"));
        }

        if let Some(existing) = self.store.find_by_reference(&request.reference).await? {
            return Self::replay_payment(existing, session, request, amount);
        }

        self.read_account(&session.account_id).await?;
        self.ensure_account(&request.receiver_id, Role::Merchant, &request.receiver_contact)
            .await?;

        let mut tx = Transaction::pending(
            Parties {
                payer_id: session.account_id.clone(),
                payer_contact: session.contact.clone(),
                receiver_id: request.receiver_id.clone(),
                receiver_contact: request.receiver_contact.clone(),
            },
            amount,
            request.kind,
            request.reference.clone(),
        )
        .with_description(request.description.clone());
        tx.complete()?;

        let store = &self.store;
        let tx_ref = &tx;
        let committed = self
            .commit_with_retry(move || async move {
                let payer = store
                    .get_account(&tx_ref.payer_id)
                    .await?
                    .ok_or_else(|| PaymentError::UserNotFound(tx_ref.payer_id.clone()))?;
                let receiver = store
                    .get_account(&tx_ref.receiver_id)
                    .await?
                    .ok_or_else(|| PaymentError::UserNotFound(tx_ref.receiver_id.clone()))?;

                let mut debited = payer.value.clone();
                debited.debit(tx_ref.amount)?;
                let mut credited = receiver.value.clone();
                credited.credit(tx_ref.amount);

                let mut writes = WriteSet::new();
                writes
                    .put_account(&payer, debited)
                    .put_account(&receiver, credited)
                    .insert_transaction(tx_ref.clone());
                Ok(writes)
            })
            .await;

        match committed {
            Ok(()) => {
                info!(transaction_id = %tx.id, kind = %tx.kind, "payment committed");
                Ok(tx)
            }
            Err(PaymentError::DuplicateReference(reference)) => {
                match self.store.find_by_reference(&reference).await? {
                    Some(existing) => Self::replay_payment(existing, session, request, amount),
                    None => Err(PaymentError::DuplicateReference(reference)),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn replay_payment(
        existing: Transaction,
        session: &Session,
        request: &PaymentRequest,
        amount: Amount,
    ) -> Result<Transaction> {
        let same = existing.kind == request.kind
            && existing.status == TransactionStatus::Completed
            && existing.payer_id == session.account_id
            && existing.receiver_id == request.receiver_id
            && existing.amount == amount;
        if same {
            debug!(transaction_id = %existing.id, "payment replayed by reference");
            Ok(existing)
        } else {
            Err(PaymentError::DuplicateReference(existing.reference))
        }
    }

    async fn read_account(&self, id: &str) -> Result<Versioned<Account>> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| PaymentError::UserNotFound(id.to_string()))
    }

    /// Builds and commits an atomic unit, rebuilding it from fresh reads on
    /// every write conflict.
    async fn commit_with_retry<F, Fut>(&self, mut build: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<WriteSet>>,
    {
        let attempts = self.config.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let writes = build().await?;
            match self.store.commit(writes).await {
                Ok(()) => return Ok(()),
                Err(PaymentError::Conflict(account)) => {
                    debug!(attempt, account = %account, "write conflict, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(PaymentError::ConcurrencyExhausted { attempts })
    }
}
