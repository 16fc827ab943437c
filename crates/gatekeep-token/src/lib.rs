//! # gatekeep-token
//!
//! Bearer token lifecycle for Gatekeep.
//!
//! This crate provides functionality for:
//! - Loading Ed25519 key material supplied as base64 configuration values
//! - Issuing self-contained tokens that carry a principal id and an expiry
//! - Verifying tokens without a database round-trip
//! - Refreshing tokens and revoking them before they expire
//!
//! ## Token Format
//!
//! Tokens are [Biscuit](https://www.biscuitsec.org) tokens serialized as URL-safe
//! base64, so they can be placed in an `Authorization` header as-is. The authority
//! block holds three facts:
//!
//! ```datalog
//! principal(42);
//! issued_at(1700000000);
//! expires_at(1700007200);
//! ```
//!
//! Roles are deliberately not embedded. Permissions are resolved fresh from the
//! policy engine on every check, so a role change takes effect immediately.
//!
//! ## Revocation
//!
//! Revoking a token records the revocation identifier of its authority block (a
//! value derived from the block signature) in a [`RevocationSet`]. Entries carry the
//! token's own expiry as TTL and are pruned on every write.

pub mod claims;
pub mod error;
pub mod keys;
pub mod revocation;
pub mod token;

pub use biscuit_auth::PublicKey;
pub use claims::{IssuedToken, TokenClaims};
pub use error::TokenError;
pub use keys::{KEY_LENGTH, KeyPair, load_public_key_base64};
pub use revocation::RevocationSet;
pub use token::TokenManager;
