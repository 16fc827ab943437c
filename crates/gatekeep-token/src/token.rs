//! Token issuance, verification, refresh and revocation.

use crate::claims::{IssuedToken, TokenClaims};
use crate::error::TokenError;
use crate::keys::{KeyPair, load_public_key_base64};
use crate::revocation::RevocationSet;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use biscuit_auth::builder::AuthorizerBuilder;
use biscuit_auth::macros::fact;
use biscuit_auth::{Biscuit, PublicKey};
use chrono::{DateTime, Duration, Utc};
use gatekeep_core::{Clock, PrincipalId, SystemClock, TokenConfig};
use std::sync::Arc;

/// Issues and verifies Gatekeep bearer tokens.
///
/// Issuing needs the private key; a manager built with [`TokenManager::verify_only`]
/// can still verify and revoke. Apart from the revocation set, every call only reads
/// immutable key material and the clock.
pub struct TokenManager {
    signer: Option<KeyPair>,
    public_key: PublicKey,
    ttl: Duration,
    refresh_grace: Duration,
    clock: Arc<dyn Clock>,
    revoked: Arc<RevocationSet>,
}

/// A token that decoded and passed signature verification.
struct Decoded {
    claims: TokenClaims,
    fingerprint: String,
}

impl TokenManager {
    /// Create a manager that can issue and verify.
    pub fn new(keypair: KeyPair, config: &TokenConfig) -> Self {
        let public_key = keypair.public_key();
        Self::build(Some(keypair), public_key, config)
    }

    /// Create a manager that can only verify (and revoke).
    pub fn verify_only(public_key: PublicKey, config: &TokenConfig) -> Self {
        Self::build(None, public_key, config)
    }

    /// Create a manager from base64 key material.
    ///
    /// When both keys are supplied they must belong to the same pair.
    pub fn from_base64(
        private_key: Option<&str>,
        public_key: &str,
        config: &TokenConfig,
    ) -> Result<Self, TokenError> {
        let public = load_public_key_base64(public_key)?;
        match private_key {
            Some(encoded) => {
                let keypair = KeyPair::from_private_key_base64(encoded)?;
                if keypair.public_key().to_bytes_hex() != public.to_bytes_hex() {
                    return Err(TokenError::InvalidKey(
                        "public key does not match private key".to_string(),
                    ));
                }
                Ok(Self::new(keypair, config))
            }
            None => Ok(Self::verify_only(public, config)),
        }
    }

    fn build(signer: Option<KeyPair>, public_key: PublicKey, config: &TokenConfig) -> Self {
        Self {
            signer,
            public_key,
            ttl: config.ttl(),
            refresh_grace: config.refresh_grace(),
            clock: Arc::new(SystemClock),
            revoked: Arc::new(RevocationSet::new()),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a revocation set with other managers in the process.
    pub fn with_revocation_set(mut self, revoked: Arc<RevocationSet>) -> Self {
        self.revoked = revoked;
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key.clone()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn can_issue(&self) -> bool {
        self.signer.is_some()
    }

    pub fn revocations(&self) -> &RevocationSet {
        &self.revoked
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Mint a token for `principal_id` that expires `ttl` from now.
    pub fn issue(&self, principal_id: PrincipalId) -> Result<IssuedToken, TokenError> {
        let signer = self.signer.as_ref().ok_or(TokenError::SigningUnavailable)?;

        let issued_at = whole_seconds(self.clock.now());
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::CreationFailed("expiry out of range".to_string()))?;
        let principal = i64::from(principal_id.0);

        let biscuit = Biscuit::builder()
            .fact(fact!("principal({principal})", principal = principal))
            .and_then(|b| b.fact(fact!("issued_at({ts})", ts = issued_at.timestamp())))
            .and_then(|b| b.fact(fact!("expires_at({ts})", ts = expires_at.timestamp())))
            .map_err(|e| TokenError::CreationFailed(e.to_string()))?
            .build(signer.inner())
            .map_err(|e| TokenError::CreationFailed(e.to_string()))?;

        let token = biscuit
            .to_base64()
            .map_err(|e| TokenError::CreationFailed(e.to_string()))?;

        Ok(IssuedToken {
            token,
            claims: TokenClaims {
                principal_id,
                issued_at,
                expires_at,
            },
        })
    }

    /// Verify a token and return the principal it was issued to.
    pub fn verify(&self, token: &str) -> Result<PrincipalId, TokenError> {
        self.verify_claims(token).map(|claims| claims.principal_id)
    }

    /// Verify a token and return all of its claims.
    ///
    /// Checks, in order: decoding and signature, revocation, expiry.
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let decoded = self.decode(token)?;
        let now = self.clock.now();

        if self.revoked.contains(&decoded.fingerprint, now) {
            return Err(TokenError::Revoked);
        }
        if decoded.claims.is_expired_at(now) {
            return Err(TokenError::Expired {
                expired_at: decoded.claims.expires_at,
            });
        }
        Ok(decoded.claims)
    }

    /// Exchange a token for a new one for the same principal.
    ///
    /// An expired token is accepted for `refresh_grace` past its expiry. Revoked
    /// tokens are never accepted. The presented token keeps its own expiry.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, TokenError> {
        let decoded = self.decode(token)?;
        let now = self.clock.now();

        if self.revoked.contains(&decoded.fingerprint, now) {
            return Err(TokenError::Revoked);
        }
        let refresh_until = decoded
            .claims
            .expires_at
            .checked_add_signed(self.refresh_grace)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now > refresh_until {
            return Err(TokenError::Expired {
                expired_at: decoded.claims.expires_at,
            });
        }

        self.issue(decoded.claims.principal_id)
    }

    /// Stop honouring a token before its expiry.
    ///
    /// The token must carry a valid signature. Revoking an already revoked or long
    /// expired token succeeds without effect.
    pub fn revoke(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let decoded = self.decode(token)?;
        let retain_until = decoded
            .claims
            .expires_at
            .checked_add_signed(self.refresh_grace)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.revoked
            .insert(decoded.fingerprint, retain_until, self.clock.now());
        Ok(decoded.claims)
    }

    fn decode(&self, token: &str) -> Result<Decoded, TokenError> {
        let biscuit = Biscuit::from_base64(token.trim(), self.public_key.clone())
            .map_err(TokenError::from_parse)?;

        let mut authorizer = AuthorizerBuilder::new()
            .code("allow if true;")
            .map_err(|e| TokenError::Malformed(e.to_string()))?
            .build(&biscuit)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        authorizer
            .authorize()
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let principal = extract_int_fact(&mut authorizer, "principal")?;
        let issued_at = extract_int_fact(&mut authorizer, "issued_at")?;
        let expires_at = extract_int_fact(&mut authorizer, "expires_at")?;

        let principal_id = u32::try_from(principal)
            .map(PrincipalId)
            .map_err(|_| TokenError::Malformed(format!("principal id {principal} out of range")))?;

        let fingerprint = biscuit
            .revocation_identifiers()
            .first()
            .map(|id| URL_SAFE_NO_PAD.encode(id))
            .ok_or_else(|| TokenError::Malformed("token has no authority block".to_string()))?;

        Ok(Decoded {
            claims: TokenClaims {
                principal_id,
                issued_at: timestamp("issued_at", issued_at)?,
                expires_at: timestamp("expires_at", expires_at)?,
            },
            fingerprint,
        })
    }
}

fn extract_int_fact(
    authorizer: &mut biscuit_auth::Authorizer,
    name: &str,
) -> Result<i64, TokenError> {
    let rule_str = format!("data($x) <- {name}($x)");
    let rule: biscuit_auth::builder::Rule = rule_str
        .parse()
        .map_err(|e: biscuit_auth::error::Token| TokenError::Malformed(e.to_string()))?;

    let results: Vec<(i64,)> = authorizer
        .query(rule)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;

    match results.as_slice() {
        [(value,)] => Ok(*value),
        [] => Err(TokenError::MissingClaim {
            claim: name.to_string(),
        }),
        _ => Err(TokenError::Malformed(format!("duplicate {name} claim"))),
    }
}

fn timestamp(claim: &str, secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| TokenError::Malformed(format!("{claim} out of range: {secs}")))
}

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
