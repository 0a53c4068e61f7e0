//! Password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`),
//! so cost parameters travel with each stored hash.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Hashes and verifies user passwords.
pub trait PasswordHasher: Send + Sync {
    /// Produces a self-describing encoded hash for `plaintext`.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Checks `plaintext` against a value previously produced by `hash`.
    /// Malformed encodings never verify.
    fn verify(&self, plaintext: &str, encoded: &str) -> bool;
}

/// Argon2id with a random per-password salt.
#[derive(Debug, Clone, Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Argon2id with the crate's recommended cost (19 MiB, 2 passes, 1 lane).
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with explicit cost parameters.
    ///
    /// # Arguments
    /// * `memory_kib` - Memory cost in KiB (at least 8 per lane)
    /// * `passes` - Number of passes over memory
    /// * `lanes` - Degree of parallelism
    ///
    /// # Errors
    /// Returns an error when argon2 rejects the parameter combination.
    pub fn with_cost(memory_kib: u32, passes: u32, lanes: u32) -> Result<Self> {
        let params = Params::new(memory_kib, passes, lanes, None)
            .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = password_hash::PasswordHasher::hash_password(
            &self.argon2,
            plaintext.as_bytes(),
            &salt,
        )
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, encoded: &str) -> bool {
        // Cost parameters come from the stored hash, not from `self`.
        match PasswordHash::new(encoded) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
