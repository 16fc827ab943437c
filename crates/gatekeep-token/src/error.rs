//! Error types for the token crate.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while issuing, verifying, refreshing or revoking tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Key material could not be decoded or has the wrong length.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The manager was built without a private key.
    #[error("no signing key configured")]
    SigningUnavailable,

    /// Failed to create token.
    #[error("failed to create token: {0}")]
    CreationFailed(String),

    /// The token could not be decoded or does not have the expected shape.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token decoded but its signature does not verify under the configured key.
    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    /// Token is missing required claim.
    #[error("token missing required claim: {claim}")]
    MissingClaim { claim: String },

    /// Token has expired.
    #[error("token has expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// Token was revoked before its expiry.
    #[error("token has been revoked")]
    Revoked,
}

impl TokenError {
    /// Sort a biscuit parse failure into signature problems and everything else.
    pub(crate) fn from_parse(err: biscuit_auth::error::Token) -> Self {
        use biscuit_auth::error::{Format, Token};

        match &err {
            Token::Format(Format::Signature(_)) | Token::Format(Format::SealedSignature) => {
                Self::InvalidSignature(err.to_string())
            }
            _ => Self::Malformed(err.to_string()),
        }
    }

    /// `true` when the token could not be decoded at all.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::MissingClaim { .. })
    }
}
