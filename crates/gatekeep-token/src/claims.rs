//! Claims carried by a Gatekeep token.

use chrono::{DateTime, Duration, Utc};
use gatekeep_core::PrincipalId;

/// Claims decoded from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    pub principal_id: PrincipalId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// Expiry is inclusive: a token is still valid at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A freshly minted token together with its claims.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

impl IssuedToken {
    pub fn principal_id(&self) -> PrincipalId {
        self.claims.principal_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at
    }

    /// Remaining lifetime relative to `now`, floored at zero.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Duration {
        (self.claims.expires_at - now).max(Duration::zero())
    }
}

// Tokens are bearer credentials; keep them out of logs.
impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .finish()
    }
}
