use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Whether a gateway failure may be retried with the same reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts and temporary unavailability.
    Transient,
    /// Invalid subject or a provider rejection.
    Terminal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Terminal => f.write_str("terminal"),
        }
    }
}

/// Coarse classification of a [`PaymentError`], stable enough for callers
/// to map onto user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnknownPaymentMethod,
    AmountOutOfRange,
    PaymentMethodUnavailable,
    GatewayTransient,
    GatewayTerminal,
    InsufficientBalance,
    UserNotFound,
    DuplicateReference,
    InvalidTransition,
    ConcurrencyExhausted,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnknownPaymentMethod => "unknown_payment_method",
            ErrorKind::AmountOutOfRange => "amount_out_of_range",
            ErrorKind::PaymentMethodUnavailable => "payment_method_unavailable",
            ErrorKind::GatewayTransient => "gateway_transient",
            ErrorKind::GatewayTerminal => "gateway_terminal",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::DuplicateReference => "duplicate_reference",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::ConcurrencyExhausted => "concurrency_exhausted",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),
    #[error("Amount must be between E{min} and E{max}, got E{amount}")]
    AmountOutOfRange {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },
    #[error("Payment method {0} is currently unavailable")]
    PaymentMethodUnavailable(String),
    #[error("Gateway failure ({kind}): {reason}")]
    Gateway { kind: FailureKind, reason: String },
    #[error("Insufficient wallet balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Reference {0} is already used by another operation")]
    DuplicateReference(String),
    #[error("Transaction cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Could not commit after {attempts} attempts under contention")]
    ConcurrencyExhausted { attempts: u32 },
    /// A concurrent write invalidated the versions read by an atomic unit.
    /// The engine retries on this; it only escapes through direct store use.
    #[error("Write conflict on account {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidInput(_) => ErrorKind::InvalidInput,
            PaymentError::UnknownPaymentMethod(_) => ErrorKind::UnknownPaymentMethod,
            PaymentError::AmountOutOfRange { .. } => ErrorKind::AmountOutOfRange,
            PaymentError::PaymentMethodUnavailable(_) => ErrorKind::PaymentMethodUnavailable,
            PaymentError::Gateway {
                kind: FailureKind::Transient,
                ..
            } => ErrorKind::GatewayTransient,
            PaymentError::Gateway {
                kind: FailureKind::Terminal,
                ..
            } => ErrorKind::GatewayTerminal,
            PaymentError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PaymentError::UserNotFound(_) => ErrorKind::UserNotFound,
            PaymentError::DuplicateReference(_) => ErrorKind::DuplicateReference,
            PaymentError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PaymentError::ConcurrencyExhausted { .. } => ErrorKind::ConcurrencyExhausted,
            PaymentError::Conflict(_) => ErrorKind::Conflict,
            PaymentError::Storage(_)
            | PaymentError::Csv(_)
            | PaymentError::Io(_)
            | PaymentError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// True when repeating the same request (same reference) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::GatewayTransient | ErrorKind::ConcurrencyExhausted
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PaymentError::InvalidInput(message.into())
    }
}
