//! Snapshot encryption at rest.
//!
//! AES-256-GCM over the whole encoded snapshot. Each write draws a fresh
//! 96-bit nonce, stored in front of the ciphertext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::StoreError;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Key material for an encrypted store file.
#[derive(Clone)]
pub struct SnapshotCipher {
    cipher: Aes256Gcm,
}

impl core::fmt::Debug for SnapshotCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SnapshotCipher(..)")
    }
}

impl SnapshotCipher {
    /// `key` must be exactly [`KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, StoreError> {
        Aes256Gcm::new_from_slice(key)
            .map(|cipher| Self { cipher })
            .map_err(|_| {
                StoreError::Cipher(format!("key must be {KEY_LEN} bytes, got {}", key.len()))
            })
    }

    pub(crate) fn seal(&self, plain: &[u8]) -> Result<Vec<u8>, StoreError> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).map_err(|e| StoreError::Cipher(e.to_string()))?;
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plain)
            .map_err(|_| StoreError::Cipher("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub(crate) fn open(&self, bytes: &[u8]) -> Result<Vec<u8>, StoreError> {
        if bytes.len() < NONCE_LEN {
            return Err(StoreError::Cipher("snapshot too short".into()));
        }
        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| StoreError::Cipher("snapshot could not be decrypted".into()))
    }
}
