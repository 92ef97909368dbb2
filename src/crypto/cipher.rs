//! Authenticated encryption with detached tags.
//!
//! Every call to [`Cipher::encrypt`] draws a fresh 96-bit nonce from the OS
//! RNG and returns the nonce, the ciphertext (same length as the plaintext)
//! and the 16-byte tag as separate values, which is how they travel on the
//! wire. No associated data is bound.

use std::fmt;

use aes_gcm::Aes256Gcm;
use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{AeadInPlace, KeyInit, generic_array::GenericArray},
};
use rand::{RngCore, rngs::OsRng};

use super::keys::SharedKey;
use crate::core::{AEAD_NONCE_SIZE, AEAD_TAG_SIZE, CryptoError};

/// Supported AEAD constructions.
///
/// Both use a 256-bit key, a 96-bit nonce and a 128-bit tag, so the frame
/// layout does not depend on the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherSuite {
    /// AES-256-GCM, the suite deployed collectors speak.
    #[default]
    Aes256Gcm,
    /// ChaCha20-Poly1305 (RFC 8439).
    ChaCha20Poly1305,
}

/// Output of a single encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Nonce used for this message.
    pub nonce: [u8; AEAD_NONCE_SIZE],
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// Detached authentication tag.
    pub tag: [u8; AEAD_TAG_SIZE],
}

impl Sealed {
    /// Total length of nonce, ciphertext and tag.
    pub fn wire_len(&self) -> usize {
        AEAD_NONCE_SIZE + self.ciphertext.len() + AEAD_TAG_SIZE
    }
}

enum Engine {
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

/// AEAD cipher keyed with the pre-shared key.
pub struct Cipher {
    suite: CipherSuite,
    engine: Engine,
}

impl Cipher {
    /// Create a cipher for the given suite and key.
    pub fn new(suite: CipherSuite, key: &SharedKey) -> Self {
        let key_bytes = GenericArray::from_slice(key.as_bytes());
        let engine = match suite {
            CipherSuite::Aes256Gcm => Engine::Aes256Gcm(Box::new(Aes256Gcm::new(key_bytes))),
            CipherSuite::ChaCha20Poly1305 => {
                Engine::ChaCha20Poly1305(ChaCha20Poly1305::new(key_bytes))
            }
        };
        Self { suite, engine }
    }

    /// The suite this cipher was built with.
    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
        let mut nonce = [0u8; AEAD_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        self.encrypt_with_nonce(nonce, plaintext)
    }

    fn encrypt_with_nonce(
        &self,
        nonce: [u8; AEAD_NONCE_SIZE],
        plaintext: &[u8],
    ) -> Result<Sealed, CryptoError> {
        let mut buffer = plaintext.to_vec();
        let n = GenericArray::from_slice(&nonce);

        let tag = match &self.engine {
            Engine::Aes256Gcm(c) => c.encrypt_in_place_detached(n, &[], &mut buffer),
            Engine::ChaCha20Poly1305(c) => c.encrypt_in_place_detached(n, &[], &mut buffer),
        }
        .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut tag_bytes = [0u8; AEAD_TAG_SIZE];
        tag_bytes.copy_from_slice(&tag);

        Ok(Sealed {
            nonce,
            ciphertext: buffer,
            tag: tag_bytes,
        })
    }

    /// Verify and decrypt.
    ///
    /// Fails closed: on any tag mismatch no plaintext is returned.
    pub fn decrypt(
        &self,
        nonce: &[u8; AEAD_NONCE_SIZE],
        ciphertext: &[u8],
        tag: &[u8; AEAD_TAG_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut buffer = ciphertext.to_vec();
        let n = GenericArray::from_slice(nonce);
        let t = GenericArray::from_slice(tag);

        let verified = match &self.engine {
            Engine::Aes256Gcm(c) => c.decrypt_in_place_detached(n, &[], &mut buffer, t),
            Engine::ChaCha20Poly1305(c) => c.decrypt_in_place_detached(n, &[], &mut buffer, t),
        };
        verified.map_err(|_| CryptoError::DecryptionFailed)?;

        Ok(buffer)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("suite", &self.suite)
            .finish_non_exhaustive()
    }
}
