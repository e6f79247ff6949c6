//! Runtime configuration for the engine and the simulated gateway.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides.

use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WalletConfig {
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts per atomic unit before giving up with `ConcurrencyExhausted`.
    pub max_commit_attempts: u32,
    /// Upper bound on a single gateway call.
    pub gateway_timeout_ms: u64,
    /// Change notifications buffered per store before slow feeds resync.
    pub feed_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
            gateway_timeout_ms: 10_000,
            feed_buffer: 256,
        }
    }
}

impl EngineConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

/// Simulated latency, drawn uniformly from `[min_ms, max_ms]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const fn fixed(ms: u64) -> Self {
        Self {
            min_ms: ms,
            max_ms: ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChannelProfile {
    pub success_rate: f64,
    pub latency: LatencyRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Used for channels without an explicit profile.
    pub default_profile: ChannelProfile,
    pub channels: BTreeMap<String, ChannelProfile>,
    /// Fixes the simulator's randomness for reproducible runs.
    pub seed: Option<u64>,
}

const DEFAULT_LATENCY: LatencyRange = LatencyRange::fixed(2_000);

impl Default for GatewayConfig {
    fn default() -> Self {
        let channels = [
            ("mtn_momo", 0.95),
            ("unayo", 0.92),
            ("fnb", 0.98),
            ("swazibank", 0.96),
            ("standard_bank", 0.97),
            ("nedbank", 0.95),
        ]
        .into_iter()
        .map(|(id, success_rate)| {
            (
                id.to_string(),
                ChannelProfile {
                    success_rate,
                    latency: DEFAULT_LATENCY,
                },
            )
        })
        .collect();

        Self {
            default_profile: ChannelProfile {
                success_rate: 0.9,
                latency: DEFAULT_LATENCY,
            },
            channels,
            seed: None,
        }
    }
}

impl GatewayConfig {
    pub fn profile(&self, channel: &str) -> ChannelProfile {
        self.channels
            .get(channel)
            .copied()
            .unwrap_or(self.default_profile)
    }

    /// Every profile needs a success rate within `0..=1` and an ordered
    /// latency range.
    pub fn validate(&self) -> Result<()> {
        let profiles = std::iter::once(("default", &self.default_profile)).chain(
            self.channels
                .iter()
                .map(|(id, profile)| (id.as_str(), profile)),
        );
        for (id, profile) in profiles {
            if !(0.0..=1.0).contains(&profile.success_rate) {
                return Err(PaymentError::invalid(format!(
                    "config: success_rate for '{id}' must be within 0..=1"
                )));
            }
            if profile.latency.min_ms > profile.latency.max_ms {
                return Err(PaymentError::invalid(format!(
                    "config: latency for '{id}' has min_ms above max_ms"
                )));
            }
        }
        Ok(())
    }
}

impl WalletConfig {
    /// Reads a JSON config file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: WalletConfig = serde_json::from_str(raw)
            .map_err(|e| PaymentError::invalid(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_commit_attempts == 0 {
            return Err(PaymentError::invalid(
                "config: engine.max_commit_attempts must be at least 1",
            ));
        }
        if self.engine.feed_buffer == 0 {
            return Err(PaymentError::invalid(
                "config: engine.feed_buffer must be at least 1",
            ));
        }

        self.gateway.validate()
    }
}
