//! # gatekeep-service
//!
//! The authorization service: registration, login, token validation and
//! permission checks, plus the role and permission administration surface.
//!
//! The service combines three collaborators:
//!
//! 1. a [`CredentialStore`](gatekeep_core::CredentialStore) and
//!    [`SecretHasher`](gatekeep_core::SecretHasher) for principals and secrets,
//! 2. a [`TokenManager`](gatekeep_token::TokenManager) for bearer tokens,
//! 3. a [`PolicyEngine`](gatekeep_policy::PolicyEngine) for decisions and the
//!    paired store/index writes behind every administrative call.
//!
//! Every failure surfaces as an [`AuthError`] whose [`ErrorKind`] keeps
//! authentication failures apart from authorization failures.

pub mod error;
pub mod service;
pub mod validation;

pub use error::{AuthError, ErrorKind};
pub use service::AuthorizationService;
pub use validation::ValidationError;
