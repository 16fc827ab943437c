//! Service error taxonomy.

use crate::validation::ValidationError;
use gatekeep_core::StoreError;
use gatekeep_policy::PolicyError;
use gatekeep_token::TokenError;
use std::fmt;
use thiserror::Error;

/// Broad category of an [`AuthError`], stable for callers to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad credentials, or an invalid, expired or revoked token.
    Unauthenticated,
    /// Valid identity, denied by policy.
    Forbidden,
    /// A principal, role or permission does not exist.
    NotFound,
    /// A uniqueness rule would be violated.
    Conflict,
    /// A store timed out or failed, or the policy engine cannot answer.
    StoreUnavailable,
    /// Malformed token or malformed input.
    Invalid,
    /// Misconfiguration inside the service, such as missing signing keys.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::StoreUnavailable => "store unavailable",
            Self::Invalid => "invalid",
            Self::Internal => "internal",
        })
    }
}

/// Error returned by every [`AuthorizationService`](crate::AuthorizationService) call.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    fn caused_by(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Prefix the message with what the service was doing. The kind is preserved.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        let kind = match &err {
            TokenError::Malformed(_) | TokenError::MissingClaim { .. } => ErrorKind::Invalid,
            TokenError::InvalidSignature(_) | TokenError::Expired { .. } | TokenError::Revoked => {
                ErrorKind::Unauthenticated
            }
            TokenError::InvalidKey(_)
            | TokenError::SigningUnavailable
            | TokenError::CreationFailed(_) => ErrorKind::Internal,
        };
        Self::caused_by(kind, err)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
        };
        Self::caused_by(kind, err)
    }
}

impl From<PolicyError> for AuthError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Store(store) => store.into(),
            other => Self::caused_by(ErrorKind::StoreUnavailable, other),
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        Self::caused_by(ErrorKind::Invalid, err)
    }
}
