//! Password hashing seam
//!
//! The default hasher stores PBKDF2-HMAC-SHA256 in PHC string form, e.g.
//! `$pbkdf2-sha256$i=100000,l=32$<salt>$<hash>`. The round count travels
//! with each hash, so raising it later does not invalidate stored ones.

use pbkdf2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use wordmate_common::{Error, Result};

pub const DEFAULT_PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const OUTPUT_LEN: usize = 32;

/// Hashes and verifies account passwords
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    /// False for a wrong password and for a stored value that does not parse
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// PBKDF2-HMAC-SHA256 with a random 16-byte salt
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2PasswordHasher {
    rounds: u32,
}

impl Pbkdf2PasswordHasher {
    pub fn with_rounds(rounds: u32) -> Self {
        Self { rounds }
    }
}

impl Default for Pbkdf2PasswordHasher {
    fn default() -> Self {
        Self::with_rounds(DEFAULT_PBKDF2_ROUNDS)
    }
}

impl PasswordHasher for Pbkdf2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| Error::Internal(format!("Failed to encode salt: {}", e)))?;

        let params = Params {
            rounds: self.rounds,
            output_length: OUTPUT_LEN,
        };
        let hash = Pbkdf2
            .hash_password_customized(password.as_bytes(), None, None, params, &salt)
            .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
