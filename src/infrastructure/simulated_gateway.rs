use crate::config::GatewayConfig;
use crate::domain::gateway::{GatewayFailure, GatewayReceipt, GatewayRequest, PaymentSubject};
use crate::domain::ports::PaymentGateway;
use crate::error::FailureKind;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Provider responses the simulator picks from when a call fails.
const FAILURES: [(&str, FailureKind); 4] = [
    ("Insufficient funds", FailureKind::Terminal),
    ("Network timeout", FailureKind::Transient),
    ("Invalid account details", FailureKind::Terminal),
    ("Service temporarily unavailable", FailureKind::Transient),
];

const REFERENCE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Eswatini mobile number: optional `+268`, `268` or `0`, then `6`/`7`
/// followed by seven digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let local = |s: &str| {
        s.len() == 8
            && s.starts_with(['6', '7'])
            && s.bytes().all(|b| b.is_ascii_digit())
    };
    local(phone)
        || ["+268", "268", "0"]
            .iter()
            .filter_map(|prefix| phone.strip_prefix(prefix))
            .any(local)
}

pub fn is_valid_account_number(account_number: &str) -> bool {
    (8..=12).contains(&account_number.chars().count())
}

/// A stand-in for real mobile-money and bank providers.
///
/// Each channel succeeds with its configured probability after a latency
/// drawn from its configured range. Subjects are validated up front and
/// rejected as terminal failures without any delay.
pub struct SimulatedGateway {
    config: GatewayConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedGateway {
    /// Fails with `InvalidInput` when a channel profile is out of range.
    pub fn new(config: GatewayConfig) -> crate::error::Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng: Mutex::new(rng),
        })
    }

    fn validate(subject: &PaymentSubject) -> Result<(), GatewayFailure> {
        match subject {
            PaymentSubject::Phone(phone) if !is_valid_phone(phone) => {
                Err(GatewayFailure::terminal("Invalid phone number format"))
            }
            PaymentSubject::AccountNumber(number) if !is_valid_account_number(number) => {
                Err(GatewayFailure::terminal("Invalid account number format"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayReceipt, GatewayFailure> {
        Self::validate(&request.subject)?;

        let profile = self.config.profile(&request.channel);
        let (latency, outcome) = {
            let mut rng = self.rng.lock().await;
            let latency = rng.gen_range(profile.latency.min_ms..=profile.latency.max_ms);
            let outcome = if rng.gen_bool(profile.success_rate.clamp(0.0, 1.0)) {
                let suffix: String = (0..9)
                    .map(|_| {
                        let index = rng.gen_range(0..REFERENCE_ALPHABET.len());
                        REFERENCE_ALPHABET[index] as char
                    })
                    .collect();
                Ok(GatewayReceipt {
                    external_reference: format!(
                        "{}_{}_{}",
                        request.channel.to_uppercase(),
                        Utc::now().timestamp_millis(),
                        suffix
                    ),
                })
            } else {
                let (reason, kind) = FAILURES[rng.gen_range(0..FAILURES.len())];
                Err(GatewayFailure {
                    kind,
                    reason: reason.to_string(),
                })
            };
            (latency, outcome)
        };

        debug!(
            channel = %request.channel,
            latency_ms = latency,
            accepted = outcome.is_ok(),
            "simulated gateway call"
        );
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        outcome
    }
}
