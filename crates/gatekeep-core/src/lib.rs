//! # gatekeep-core
//!
//! Shared building blocks for the Gatekeep authentication and authorization core.
//!
//! This crate provides:
//! - The domain model (principals, roles, permissions, resource/action enums)
//! - Configuration types consumed at construction time by the other crates
//! - The Credential Store and Policy Store contracts, with their structured errors
//! - A [`Clock`] abstraction so token expiry can be tested deterministically
//!
//! Nothing in this crate reads the environment or the filesystem. Configuration is
//! built by the caller (see the `gatekeep` CLI) and handed over as plain values.

pub mod clock;
pub mod config;
pub mod model;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{GatekeepConfig, KeySource, StoreConfig, TokenConfig};
pub use model::{
    ActionType, NewPermission, NewPrincipal, ParseEnumError, Permission, PermissionId, Principal,
    PrincipalId, PrincipalRecord, ResourceType, Role, RoleId,
};
pub use store::{CredentialStore, PolicyStore, SecretHasher, StoreError, with_timeout};
