//! Token manager configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Where a base64-encoded key comes from.
///
/// An inline `value` wins over `env`. Either may be absent; the binary decides
/// what a missing key means (verification-only deployments have no private key).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeySource {
    /// Base64-encoded key bytes.
    #[serde(default)]
    pub value: Option<String>,

    /// Name of an environment variable holding the base64-encoded key.
    #[serde(default)]
    pub env: Option<String>,
}

impl KeySource {
    pub fn from_env(var: impl Into<String>) -> Self {
        Self {
            value: None,
            env: Some(var.into()),
        }
    }
}

/// Configuration for issuing and verifying bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// 32-byte Ed25519 private key (signing).
    #[serde(default = "default_private_key")]
    pub private_key: KeySource,

    /// 32-byte Ed25519 public key (verification).
    #[serde(default = "default_public_key")]
    pub public_key: KeySource,

    /// Lifetime of an issued token in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How long after expiry a token may still be exchanged by `refresh`.
    #[serde(default = "default_refresh_grace_secs")]
    pub refresh_grace_secs: u64,
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        seconds(self.ttl_secs)
    }

    pub fn refresh_grace(&self) -> Duration {
        seconds(self.refresh_grace_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            private_key: default_private_key(),
            public_key: default_public_key(),
            ttl_secs: default_ttl_secs(),
            refresh_grace_secs: default_refresh_grace_secs(),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    // chrono panics above i64::MAX / 1000 seconds
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    Duration::seconds(secs)
}

fn default_private_key() -> KeySource {
    KeySource::from_env("GATEKEEP_PRIVATE_KEY")
}

fn default_public_key() -> KeySource {
    KeySource::from_env("GATEKEEP_PUBLIC_KEY")
}

fn default_ttl_secs() -> u64 {
    120 * 60
}

fn default_refresh_grace_secs() -> u64 {
    60 * 60
}
