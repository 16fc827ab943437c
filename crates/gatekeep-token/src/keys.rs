//! Keypair management for Gatekeep tokens.
//!
//! Keys travel through configuration as standard base64 of the raw 32-byte
//! Ed25519 secret and public keys.

use crate::error::TokenError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use biscuit_auth::{Algorithm, KeyPair as BiscuitKeyPair, PrivateKey, PublicKey};
use rand::RngCore;

/// Length in bytes of both the private and the public key.
pub const KEY_LENGTH: usize = 32;

/// An Ed25519 keypair for signing and verifying tokens.
pub struct KeyPair {
    inner: BiscuitKeyPair,
    secret: [u8; KEY_LENGTH],
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_base64())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Result<Self, TokenError> {
        let mut secret = [0u8; KEY_LENGTH];
        rand::rng().fill_bytes(&mut secret);
        Self::from_private_key_bytes(&secret)
    }

    /// Load a keypair from raw private key bytes.
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        let secret: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            TokenError::InvalidKey(format!(
                "private key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let private_key = PrivateKey::from_bytes(&secret, Algorithm::Ed25519)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        Ok(Self {
            inner: BiscuitKeyPair::from(&private_key),
            secret,
        })
    }

    /// Load a keypair from a base64-encoded private key.
    pub fn from_private_key_base64(encoded: &str) -> Result<Self, TokenError> {
        let bytes = decode("private", encoded)?;
        Self::from_private_key_bytes(&bytes)
    }

    /// Get the inner biscuit keypair.
    pub fn inner(&self) -> &BiscuitKeyPair {
        &self.inner
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.inner.public()
    }

    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(self.secret)
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.inner.public().to_bytes())
    }
}

/// Load a public key from base64 (for verification-only deployments).
pub fn load_public_key_base64(encoded: &str) -> Result<PublicKey, TokenError> {
    let bytes = decode("public", encoded)?;
    if bytes.len() != KEY_LENGTH {
        return Err(TokenError::InvalidKey(format!(
            "public key must be {KEY_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }
    PublicKey::from_bytes(&bytes, Algorithm::Ed25519)
        .map_err(|e| TokenError::InvalidKey(e.to_string()))
}

fn decode(which: &str, encoded: &str) -> Result<Vec<u8>, TokenError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| TokenError::InvalidKey(format!("{which} key is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate().unwrap();
        assert_eq!(STANDARD.decode(keypair.private_key_base64()).unwrap().len(), 32);
        assert_eq!(STANDARD.decode(keypair.public_key_base64()).unwrap().len(), 32);
    }

    #[test]
    fn test_keypair_roundtrip() {
        let keypair1 = KeyPair::generate().unwrap();
        let encoded = keypair1.private_key_base64();

        let keypair2 = KeyPair::from_private_key_base64(&encoded).unwrap();
        assert_eq!(keypair1.public_key_base64(), keypair2.public_key_base64());
    }

    #[test]
    fn test_public_key_loads_from_base64() {
        let keypair = KeyPair::generate().unwrap();
        let public = load_public_key_base64(&keypair.public_key_base64()).unwrap();
        assert_eq!(public.to_bytes_hex(), keypair.public_key().to_bytes_hex());
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let short = STANDARD.encode([7u8; 16]);
        assert!(matches!(
            KeyPair::from_private_key_base64(&short),
            Err(TokenError::InvalidKey(_))
        ));
        assert!(matches!(
            load_public_key_base64(&short),
            Err(TokenError::InvalidKey(_))
        ));
        assert!(matches!(
            load_public_key_base64("not base64!"),
            Err(TokenError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = KeyPair::generate().unwrap();
        let rendered = format!("{keypair:?}");
        assert!(!rendered.contains(&keypair.private_key_base64()));
    }
}
