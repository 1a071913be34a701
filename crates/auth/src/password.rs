//! Credential store: one-way salted password hashing.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand_core::OsRng;
use tracing::warn;

use crate::error::CredentialError;

/// Argon2id password hasher.
///
/// Hashes are PHC strings, so verification always uses the algorithm and cost
/// recorded in the hash itself. Changing `params` only affects new hashes.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    params: Params,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialStore {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Explicit cost parameters (memory KiB, iterations, lanes).
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, CredentialError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| CredentialError::Params(e.to_string()))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }

    /// A malformed stored hash verifies as `false`.
    pub fn verify_password(&self, hash: &str, plaintext: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// `hash_password` on the blocking pool.
    pub async fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let store = self.clone();
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || store.hash_password(&plaintext))
            .await
            .map_err(|e| CredentialError::Hash(e.to_string()))?
    }

    /// `verify_password` on the blocking pool.
    pub async fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let store = self.clone();
        let hash = hash.to_owned();
        let plaintext = plaintext.to_owned();
        match tokio::task::spawn_blocking(move || store.verify_password(&hash, &plaintext)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "password verification task failed");
                false
            }
        }
    }

    /// Spend one Argon2 run on a password that has no account behind it,
    /// so a miss costs as much as a wrong password. Always `false`.
    pub async fn verify_absent(&self, plaintext: &str) -> bool {
        if let Err(e) = self.hash(plaintext).await {
            warn!(error = %e, "decoy hash failed");
        }
        false
    }
}

#[cfg(test)]
pub(crate) fn cheap_credentials() -> CredentialStore {
    CredentialStore::with_cost(8, 1, 1).expect("valid test params")
}
