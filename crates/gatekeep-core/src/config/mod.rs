//! Configuration types shared across all Gatekeep crates.
//!
//! These are plain `serde` structures. Loading them from a file and resolving key
//! material from the environment is the job of the binary, not of the core.

pub mod store;
pub mod token;

pub use store::StoreConfig;
pub use token::{KeySource, TokenConfig};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// ```toml
/// [token]
/// ttl_secs = 7200
/// refresh_grace_secs = 3600
///
/// [token.private_key]
/// env = "GATEKEEP_PRIVATE_KEY"
///
/// [token.public_key]
/// env = "GATEKEEP_PUBLIC_KEY"
///
/// [store]
/// read_timeout_ms = 5000
/// write_timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeepConfig {
    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub store: StoreConfig,
}
