//! Password hashing.
//!
//! [`PasswordHasher`] is the seam the identity store hashes and verifies
//! through. [`Argon2Hasher`] is the production implementation: Argon2id PHC
//! strings, where the work factor is the iteration count (`t`).

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

use gatehouse_core::HashSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hash parameters: {0}")]
    Params(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("salt generation failed: {0}")]
    Salt(String),
}

/// One-way password hashing with an inspectable work factor.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check a plaintext password against a stored hash.
    fn verify(&self, hash: &str, plaintext: &str) -> bool;

    /// The work factor recorded in `hash`, or `None` if it is not a hash this
    /// hasher understands.
    fn work_factor(&self, hash: &str) -> Option<u32>;

    /// Minimum work factor a stored hash must carry.
    fn min_work_factor(&self) -> u32;

    /// Whether `value` is a hash of sufficient cost (and not plaintext).
    fn is_hashed(&self, value: &str) -> bool {
        !value.is_empty()
            && self
                .work_factor(value)
                .is_some_and(|cost| cost >= self.min_work_factor())
    }
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    const SALT_LEN: usize = 16;

    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn from_settings(settings: &HashSettings) -> Result<Self, HashError> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self::new(params))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let mut salt_bytes = [0u8; Self::SALT_LEN];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| HashError::Salt(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| HashError::Salt(e.to_string()))?;

        let phc = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(phc.to_string())
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        match PasswordHash::new(hash) {
            // Parameters come from the PHC string, not from `self`.
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn work_factor(&self, hash: &str) -> Option<u32> {
        let parsed = PasswordHash::new(hash).ok()?;
        if !parsed.algorithm.as_str().starts_with("argon2") {
            return None;
        }
        Params::try_from(&parsed).ok().map(|p| p.t_cost())
    }

    fn min_work_factor(&self) -> u32 {
        self.params.t_cost()
    }
}

/// Cheap parameters so unit tests do not spend seconds hashing.
#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(Params::new(8, 1, 1, None).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash("who are you gonna call").unwrap();

        assert_ne!(hash, "who are you gonna call");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "who are you gonna call"));
        assert!(!hasher.verify(&hash, "ghostbusters"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = test_hasher();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn work_factor_is_read_from_hash() {
        let strong = Argon2Hasher::new(Params::new(8, 3, 1, None).unwrap());
        let hash = strong.hash("pw").unwrap();

        assert_eq!(strong.work_factor(&hash), Some(3));
        assert!(strong.is_hashed(&hash));

        let weak = test_hasher().hash("pw").unwrap();
        assert_eq!(strong.work_factor(&weak), Some(1));
        assert!(!strong.is_hashed(&weak), "hash below the configured cost");
    }

    #[test]
    fn plaintext_is_not_a_hash() {
        let hasher = test_hasher();
        assert!(!hasher.is_hashed(""));
        assert!(!hasher.is_hashed("hunter2"));
        assert_eq!(hasher.work_factor("hunter2"), None);
        assert!(!hasher.verify("hunter2", "hunter2"));
    }

    #[test]
    fn settings_are_validated() {
        let bad = HashSettings {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            Argon2Hasher::from_settings(&bad),
            Err(HashError::Params(_))
        ));
        let hasher = Argon2Hasher::from_settings(&HashSettings::default()).unwrap();
        assert_eq!(hasher.min_work_factor(), 2);
    }
}
