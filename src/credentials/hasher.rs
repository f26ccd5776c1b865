//! Password hashing built around Argon2id.
//!
//! Digests are PHC strings, so the salt and parameters travel with the hash
//! and a digest produced under older parameters still verifies after the
//! configuration changes.

use argon2::password_hash::SaltString;
use argon2::{
    password_hash, Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier,
    Version,
};
use rand::rngs::OsRng;

use super::error::AuthError;

pub const DEFAULT_MEMORY_COST_KIB: u32 = 19 * 1024;
pub const DEFAULT_TIME_COST: u32 = 2;
pub const DEFAULT_PARALLELISM: u32 = 1;

// Upper bounds accepted from a stored digest; costs above them are refused
// before argon2 allocates. The configured params always fit.
const MAX_VERIFY_MEMORY_COST_KIB: u32 = 256 * 1024;
const MAX_VERIFY_TIME_COST: u32 = 16;
const MAX_VERIFY_PARALLELISM: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: DEFAULT_MEMORY_COST_KIB,
            time_cost: DEFAULT_TIME_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    /// # Errors
    /// Returns an error if the Argon2 parameters are out of range.
    pub fn new(config: HasherConfig) -> Result<Self, password_hash::Error> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )?;
        Ok(Self { params })
    }

    fn within_verify_ceiling(&self, stored: &Params) -> bool {
        stored.m_cost() <= MAX_VERIFY_MEMORY_COST_KIB.max(self.params.m_cost())
            && stored.t_cost() <= MAX_VERIFY_TIME_COST.max(self.params.t_cost())
            && stored.p_cost() <= MAX_VERIFY_PARALLELISM.max(self.params.p_cost())
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if hashing fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|err| AuthError::Internal(format!("password hashing failed: {err}")))
    }

    /// Check a plaintext password against a stored digest.
    ///
    /// A digest that does not parse, is not Argon2id, or carries costs above
    /// the verify ceiling is treated as a mismatch.
    #[must_use]
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return false;
        }
        let Ok(params) = Params::try_from(&parsed) else {
            return false;
        };
        if !self.within_verify_ceiling(&params) {
            return false;
        }
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> SecretHasher {
    // Smallest legal cost so the suite stays fast.
    let config = HasherConfig {
        memory_cost_kib: 8,
        time_cost: 1,
        parallelism: 1,
    };
    match SecretHasher::new(config) {
        Ok(hasher) => hasher,
        Err(err) => panic!("test hasher params rejected: {err}"),
    }
}
