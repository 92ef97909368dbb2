//! Pre-shared key handling.
//!
//! PRISM has no key exchange: both ends are configured out of band with the
//! same 256-bit secret.

use std::fmt;

use crate::core::{CryptoError, SHARED_KEY_SIZE};
use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroize;

/// A pre-shared symmetric key.
///
/// Zeroized on drop for security. `Debug` never prints key material.
#[derive(Clone)]
pub struct SharedKey {
    key: [u8; SHARED_KEY_SIZE],
}

impl SharedKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut key = [0u8; SHARED_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; SHARED_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Create a key from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SHARED_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SHARED_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; SHARED_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Use the UTF-8 bytes of a passphrase directly as the key.
    ///
    /// Collectors are commonly configured with a 32-character ASCII secret
    /// such as `secret-auth-key-123=============`. No stretching is applied,
    /// so the passphrase must be exactly 32 bytes.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CryptoError> {
        Self::from_slice(passphrase.as_bytes())
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey([redacted])")
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
