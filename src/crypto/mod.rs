//! PRISM - Security Layer
//!
//! Pre-shared-key authenticated encryption:
//! - [`SharedKey`]: 256-bit secret, zeroized on drop
//! - [`Cipher`]: AES-256-GCM or ChaCha20-Poly1305 with random 96-bit nonces
//!   and detached 16-byte tags

mod cipher;
mod keys;

pub use cipher::{Cipher, CipherSuite, Sealed};
pub use keys::SharedKey;
