use super::money::Amount;
use super::payment_method::PaymentMethod;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The charge for moving `amount` through a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Credited to the wallet.
    pub amount: Amount,
    pub fee: Decimal,
    /// Charged to the external source: `amount + fee`.
    pub total: Decimal,
}

/// Computes `fixed + amount * percentage / 100` with exact decimal
/// arithmetic. No rounding is applied.
pub fn compute_fee(amount: Amount, method: &PaymentMethod) -> Result<Decimal> {
    if !method.is_active {
        return Err(PaymentError::PaymentMethodUnavailable(method.id.clone()));
    }

    let value = amount.value();
    if value < method.min_amount || value > method.max_amount {
        return Err(PaymentError::AmountOutOfRange {
            amount: value,
            min: method.min_amount,
            max: method.max_amount,
        });
    }

    Ok(method.fees.fixed + value * method.fees.percentage / dec!(100))
}

pub fn quote(amount: Amount, method: &PaymentMethod) -> Result<FeeQuote> {
    let fee = compute_fee(amount, method)?;
    Ok(FeeQuote {
        amount,
        fee,
        total: amount.value() + fee,
    })
}
