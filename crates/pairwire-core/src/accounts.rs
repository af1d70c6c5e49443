//! Account credentials for pairwire users.
//!
//! Account records are independent of matchmaking: a participant never needs
//! an account to be paired. Passwords are stored as salted
//! PBKDF2-HMAC-SHA256 hashes.

use crate::error::{PairwireError, PairwireResult};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use std::num::NonZeroU32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Account creation and credential verification.
pub trait CredentialService {
    /// Create a new account. Fails if a field is empty or the username is taken.
    fn create_account(&mut self, username: &str, password: &str) -> PairwireResult<()>;

    /// Verify a username/password pair.
    ///
    /// Unknown users and wrong passwords produce the same error.
    fn verify_credentials(&self, username: &str, password: &str) -> PairwireResult<()>;
}

/// A stored password hash.
#[derive(Debug, Clone)]
struct StoredCredential {
    salt: [u8; SALT_LEN],
    hash: [u8; HASH_LEN],
}

/// Process-local credential store.
pub struct InMemoryCredentials {
    accounts: HashMap<String, StoredCredential>,
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }

    /// Create a store with a custom PBKDF2 iteration count.
    pub fn with_iterations(iterations: NonZeroU32) -> Self {
        Self {
            accounts: HashMap::new(),
            iterations,
            rng: SystemRandom::new(),
        }
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Hex-encoded `salt:hash` for a user.
    #[cfg(test)]
    fn export_hash(&self, username: &str) -> Option<String> {
        self.accounts
            .get(username)
            .map(|c| format!("{}:{}", hex::encode(c.salt), hex::encode(c.hash)))
    }
}

impl Default for InMemoryCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialService for InMemoryCredentials {
    fn create_account(&mut self, username: &str, password: &str) -> PairwireResult<()> {
        if username.is_empty() || password.is_empty() {
            return Err(PairwireError::Credential("all fields are required".into()));
        }
        if self.accounts.contains_key(username) {
            return Err(PairwireError::Credential("user already exists".into()));
        }

        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| PairwireError::Credential("salt generation failed".into()))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        self.accounts
            .insert(username.to_string(), StoredCredential { salt, hash });
        Ok(())
    }

    fn verify_credentials(&self, username: &str, password: &str) -> PairwireResult<()> {
        if username.is_empty() || password.is_empty() {
            return Err(PairwireError::Credential("all fields are required".into()));
        }
        let stored = self
            .accounts
            .get(username)
            .ok_or_else(|| PairwireError::Credential("invalid credentials".into()))?;

        pbkdf2::verify(
            PBKDF2_ALG,
            self.iterations,
            &stored.salt,
            password.as_bytes(),
            &stored.hash,
        )
        .map_err(|_| PairwireError::Credential("invalid credentials".into()))
    }
}
