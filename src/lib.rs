//! # PRISM Transport
//!
//! A point-to-point reliable transport on top of UDP. Every payload travels
//! in a single authenticated-encrypted datagram and is confirmed by a short
//! acknowledgment frame from the peer:
//!
//! - **Security**: AES-256-GCM (default) or ChaCha20-Poly1305 under a
//!   pre-shared 32-byte key, plus a CRC32 over header and payload
//! - **Confirmation**: each send waits for the ACK carrying its sequence
//!   number, or fails with a timeout
//! - **Simplicity**: no ordering, no retries, no congestion control
//!
//! ## Feature Flags
//!
//! - `messages` (default): telemetry message schema (`Login`,
//!   `AuthResponse`, `Update`) encoded with bincode
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types
//! - [`crypto`]: Pre-shared key and AEAD cipher
//! - [`transport`]: Frame codec, pending-request registry and the
//!   [`Transport`] endpoint
//! - [`message`]: Application payload schema (requires `messages` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use prism_transport::prelude::*;
//!
//! # async fn run() -> Result<(), TransportError> {
//! let key = SharedKey::from_passphrase("secret-auth-key-123=============")
//!     .map_err(|e| TransportError::Config(e.to_string()))?;
//!
//! let transport = TransportBuilder::new(key)
//!     .start(|frame: InboundFrame| println!("received {} bytes", frame.payload.len()))
//!     .await?;
//!
//! let delivered = transport.send(b"hello", FrameKind::Data).await?;
//! println!("acknowledged after {:?}", delivered.rtt);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod crypto;
pub mod transport;

// Application message schema (feature-gated)
#[cfg(feature = "messages")]
#[cfg_attr(docsrs, doc(cfg(feature = "messages")))]
pub mod message;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::CryptoError;
    pub use crate::crypto::{Cipher, CipherSuite, SharedKey};
    pub use crate::transport::{
        Delivered, FrameError, FrameHandler, FrameKind, InboundFrame, NoopHandler,
        SequenceStrategy, Transport, TransportBuilder, TransportConfig, TransportError,
        TransportResult,
    };

    #[cfg(feature = "messages")]
    pub use crate::message::{AuthResponse, Body, DataPacket, Login, MessageKind, Update};
}

// Re-export commonly used items at crate root
pub use crypto::{CipherSuite, SharedKey};
pub use transport::{
    Delivered, FrameHandler, FrameKind, InboundFrame, Transport, TransportBuilder,
    TransportConfig, TransportError, TransportResult,
};
