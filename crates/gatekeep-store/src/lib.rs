//! # gatekeep-store
//!
//! Reference implementations of the Gatekeep store contracts:
//!
//! - [`MemoryStore`] implements both [`CredentialStore`](gatekeep_core::CredentialStore)
//!   and [`PolicyStore`](gatekeep_core::PolicyStore) in process memory, with the
//!   same uniqueness and cascade rules a relational schema would enforce.
//! - [`Argon2Hasher`] implements [`SecretHasher`](gatekeep_core::SecretHasher) with
//!   Argon2id PHC strings.
//!
//! They back the CLI and the test suites. Production deployments plug their own
//! persistence in behind the same traits.

pub mod hasher;
pub mod memory;

pub use hasher::Argon2Hasher;
pub use memory::MemoryStore;
