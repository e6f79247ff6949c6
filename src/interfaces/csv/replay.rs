use super::operation_reader::{Operation, OperationType};
use crate::application::engine::{LedgerEngine, PaymentRequest, TopUpRequest};
use crate::domain::account::Role;
use crate::domain::payment_method::ChannelType;
use crate::domain::session::Session;
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};

/// Applies one operation row on behalf of the row's account.
///
/// Returns the committed transaction, or `None` for `open` rows.
pub async fn apply(engine: &LedgerEngine, op: &Operation) -> Result<Option<Transaction>> {
    match op.op_type {
        OperationType::Open => {
            let role = op.role.unwrap_or(Role::Client);
            let contact = op.contact.as_deref().unwrap_or_default();
            engine.ensure_account(&op.account, role, contact).await?;
            Ok(None)
        }
        OperationType::TopUp => {
            let session = session_for(engine, &op.account).await?;
            let channel_id = op
                .channel
                .clone()
                .ok_or_else(|| PaymentError::invalid("top_up row needs a channel"))?;
            let is_bank = engine
                .registry()
                .get(&channel_id)
                .map(|method| method.channel_type == ChannelType::Bank)
                .unwrap_or(false);
            let (phone, account_number) = if is_bank {
                (None, op.subject.clone())
            } else {
                (op.subject.clone(), None)
            };

            let request = TopUpRequest {
                account_id: op.account.clone(),
                amount: op.amount()?,
                channel_id,
                phone,
                account_number,
                reference: op.reference()?.to_string(),
            };
            engine.try_top_up(&session, &request).await.map(Some)
        }
        OperationType::InvoicePayment | OperationType::ProductPayment | OperationType::Transfer => {
            let session = session_for(engine, &op.account).await?;
            let receiver_id = op
                .counterparty
                .clone()
                .ok_or_else(|| PaymentError::invalid("payment row needs a counterparty"))?;
            let kind = op
                .op_type
                .payment_kind()
                .ok_or_else(|| PaymentError::invalid("not a payment row"))?;

            let request = PaymentRequest {
                receiver_contact: op.contact.clone().unwrap_or_default(),
                receiver_id,
                amount: op.amount()?,
                kind,
                reference: op.reference()?.to_string(),
                description: op.description.clone(),
            };
            engine.pay(&session, &request).await.map(Some)
        }
    }
}

async fn session_for(engine: &LedgerEngine, account_id: &str) -> Result<Session> {
    let account = engine.account(account_id).await?;
    Ok(Session::new(account.id, account.role, account.email))
}
