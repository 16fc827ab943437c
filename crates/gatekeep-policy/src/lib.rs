//! Gatekeep Policy Enforcement
//!
//! Role-based access control over a closed set of `(resource, action)` pairs.
//!
//! - [`PolicyIndex`] is the pure, in-memory projection of grants (role →
//!   resource/action) and groupings (principal → role).
//! - [`PolicyEngine`] owns an index, rebuilds it from a
//!   [`PolicyStore`](gatekeep_core::PolicyStore) and keeps it consistent with the
//!   store as administrators mutate roles, permissions and assignments.
//!
//! Decisions are fail-closed: a principal with no roles, a role with no grants and
//! an unknown principal are all denied.

pub mod engine;
pub mod error;
pub mod index;

pub use engine::{EngineState, LoadSummary, PolicyEngine};
pub use error::{LoadErrors, LoadFailure, PolicyError};
pub use index::PolicyIndex;
