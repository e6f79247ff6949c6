use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;
use wallet_ledger::application::engine::{LedgerEngine, PaymentRequest, TopUpRequest};
use wallet_ledger::application::feed::FeedEvent;
use wallet_ledger::config::EngineConfig;
use wallet_ledger::domain::account::Role;
use wallet_ledger::domain::gateway::{GatewayFailure, GatewayReceipt, GatewayRequest};
use wallet_ledger::domain::ports::{LedgerStoreRef, PaymentGateway, PaymentGatewayRef};
use wallet_ledger::domain::session::Session;
use wallet_ledger::domain::transaction::{TransactionKind, TransactionStatus};
use wallet_ledger::error::ErrorKind;
use wallet_ledger::infrastructure::in_memory::InMemoryLedgerStore;

struct AcceptingGateway;

#[async_trait]
impl PaymentGateway for AcceptingGateway {
    async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayFailure> {
        Ok(GatewayReceipt {
            external_reference: format!("EXT-{}", request.reference),
        })
    }
}

fn engine() -> Arc<LedgerEngine> {
    let store: LedgerStoreRef = Arc::new(InMemoryLedgerStore::new());
    let gateway: PaymentGatewayRef = Arc::new(AcceptingGateway);
    Arc::new(LedgerEngine::new(store, gateway, EngineConfig::default()))
}

fn invoice(receiver: &str, amount: rust_decimal::Decimal, reference: &str) -> PaymentRequest {
    PaymentRequest {
        receiver_id: receiver.to_string(),
        receiver_contact: format!("{}@example.com", receiver.to_lowercase()),
        amount,
        kind: TransactionKind::InvoicePayment,
        reference: reference.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn test_engine_shared_across_tasks() {
    let engine = engine();
    let a = Session::new("A", Role::Client, "a@example.com");
    engine
        .ensure_account("A", Role::Client, "a@example.com")
        .await
        .unwrap();

    let top_up = engine
        .top_up(
            &a,
            &TopUpRequest {
                account_id: "A".to_string(),
                amount: dec!(100),
                channel_id: "mtn_momo".to_string(),
                phone: Some("76123456".to_string()),
                account_number: None,
                reference: "TOPUP-1".to_string(),
            },
        )
        .await;
    assert!(top_up.success);

    // Verify Send + Sync by spawning tasks
    let handles: Vec<_> = ["INV-1", "INV-2", "INV-3"]
        .into_iter()
        .map(|reference| {
            let engine = Arc::clone(&engine);
            let a = a.clone();
            tokio::spawn(async move { engine.pay(&a, &invoice("B", dec!(40), reference)).await })
        })
        .collect();

    let mut kinds = Vec::new();
    for handle in handles {
        kinds.push(handle.await.unwrap().map_err(|e| e.kind()).err());
    }
    assert_eq!(kinds.iter().filter(|k| k.is_none()).count(), 2);
    assert!(kinds.contains(&Some(ErrorKind::InsufficientBalance)));

    assert_eq!(engine.account("A").await.unwrap().balance.value(), dec!(20));
    assert_eq!(engine.account("B").await.unwrap().balance.value(), dec!(80));
}

#[tokio::test]
async fn test_merchant_feed_follows_payments() {
    let engine = engine();
    let a = Session::new("A", Role::Client, "a@example.com");
    engine
        .ensure_account("A", Role::Client, "a@example.com")
        .await
        .unwrap();
    engine
        .ensure_account("SHOP", Role::Merchant, "shop@example.com")
        .await
        .unwrap();
    engine
        .try_top_up(
            &a,
            &TopUpRequest {
                account_id: "A".to_string(),
                amount: dec!(100),
                channel_id: "fnb".to_string(),
                phone: None,
                account_number: Some("1234567890".to_string()),
                reference: "TOPUP-1".to_string(),
            },
        )
        .await
        .unwrap();

    let t1 = engine.pay(&a, &invoice("SHOP", dec!(10), "INV-1")).await.unwrap();
    let t2 = engine.pay(&a, &invoice("SHOP", dec!(15), "INV-2")).await.unwrap();

    let mut feed = engine.feed().subscribe("SHOP", Role::Merchant).await.unwrap();
    assert_eq!(
        feed.next().await.unwrap(),
        Some(FeedEvent::Snapshot(vec![t2, t1]))
    );

    let t3 = engine.pay(&a, &invoice("SHOP", dec!(5), "INV-3")).await.unwrap();
    match feed.next().await.unwrap() {
        Some(FeedEvent::Added(tx)) => {
            assert_eq!(tx.id, t3.id);
            assert_eq!(tx.status, TransactionStatus::Completed);
        }
        other => panic!("expected the new payment, got {other:?}"),
    }
    feed.unsubscribe();
}
