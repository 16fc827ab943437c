//! Error types for the policy engine.

use crate::engine::EngineState;
use gatekeep_core::StoreError;
use std::fmt;
use thiserror::Error;

/// Errors returned by the [`PolicyEngine`](crate::PolicyEngine).
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The engine has not completed a load, or has been closed.
    #[error("policy engine is not ready (state: {state})")]
    NotReady { state: EngineState },

    /// A Policy Store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A rebuild completed with per-item failures.
    #[error(transparent)]
    Load(#[from] LoadErrors),
}

impl PolicyError {
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// One role or principal whose edges could not be loaded.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub subject: String,
    pub error: StoreError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.error)
    }
}

/// Every failure from a single rebuild, joined.
#[derive(Debug, Clone, Default)]
pub struct LoadErrors {
    pub failures: Vec<LoadFailure>,
}

impl LoadErrors {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// `true` when any underlying failure was a timeout or I/O error.
    pub fn any_unavailable(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_unavailable())
    }
}

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy load failed for {} item(s)", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadErrors {}
