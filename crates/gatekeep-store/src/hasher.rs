//! Argon2 secret hashing.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use gatekeep_core::{SecretHasher, StoreError};

/// Hashes secrets into Argon2id PHC strings with a fresh random salt.
///
/// Verification reads the cost parameters from the stored digest, so digests made
/// under older parameters keep verifying after the cost is raised.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Hasher with the crate's recommended default cost.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hasher with explicit cost: memory in KiB, passes, lanes.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, StoreError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| StoreError::Unavailable(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StoreError::Unavailable(format!("hashing failed: {e}")))
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            tracing::debug!("stored digest is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap();
        let digest = hasher.hash("correct horse").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify(&digest, "correct horse"));
        assert!(!hasher.verify(&digest, "wrong horse"));
    }

    #[test]
    fn test_default_cost_verifies_cheap_digest() {
        let digest = cheap().hash("secret-secret").unwrap();
        assert!(Argon2Hasher::new().verify(&digest, "secret-secret"));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = cheap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_garbage_digest_fails_closed() {
        let hasher = cheap();
        assert!(!hasher.verify("", "anything"));
        assert!(!hasher.verify("plaintext", "plaintext"));
    }

    #[test]
    fn test_rejects_impossible_params() {
        assert!(Argon2Hasher::with_params(0, 0, 0).is_err());
    }
}
