//! Transport layer error types.
//!
//! Errors raised while handling received datagrams never reach a caller:
//! the receive loop logs and drops them. A peer observes a dropped frame
//! only as a missing ACK.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::frame::FrameError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local socket could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The socket could not be associated with the remote collector.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Remote address.
        addr: SocketAddr,
        /// Underlying socket error.
        source: io::Error,
    },

    /// I/O error (socket write).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// No ACK arrived before the deadline.
    ///
    /// The frame may or may not have been delivered.
    #[error("ACK not received for sequence {0}")]
    Timeout(u32),

    /// Another send drew the same sequence number and replaced this one in
    /// the pending registry.
    #[error("pending request for sequence {0} was replaced by a newer request")]
    Superseded(u32),

    /// The payload does not fit into a single datagram.
    #[error("payload of {size} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Largest payload that fits.
        max: usize,
    },

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,

    /// Frame parsing, integrity or authentication error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Check if this error results in a silent drop (no ACK, no callback).
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, TransportError::Frame(_))
    }

    /// Check if the frame may have reached the peer despite the error.
    pub fn is_delivery_uncertain(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::Superseded(_)
        )
    }

    /// Check if this error is fatal to the transport.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Bind { .. } | TransportError::Connect { .. } | TransportError::Closed
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CryptoError;

    #[test]
    fn test_silent_drop_errors() {
        assert!(TransportError::Frame(FrameError::InvalidKind(0xFF)).is_silent_drop());
        assert!(
            TransportError::Frame(FrameError::Crypto(CryptoError::DecryptionFailed))
                .is_silent_drop()
        );
        assert!(
            TransportError::Frame(FrameError::ChecksumMismatch {
                expected: 1,
                actual: 2
            })
            .is_silent_drop()
        );

        assert!(!TransportError::Timeout(1).is_silent_drop());
        assert!(!TransportError::Io(io::Error::other("test")).is_silent_drop());
    }

    #[test]
    fn test_delivery_uncertain_errors() {
        assert!(TransportError::Timeout(7).is_delivery_uncertain());
        assert!(TransportError::Superseded(7).is_delivery_uncertain());

        assert!(!TransportError::Closed.is_delivery_uncertain());
        assert!(
            !TransportError::PayloadTooLarge { size: 2000, max: 978 }.is_delivery_uncertain()
        );
    }

    #[test]
    fn test_fatal_errors() {
        let addr: SocketAddr = "127.0.0.1:6969".parse().unwrap();
        assert!(
            TransportError::Bind {
                addr,
                source: io::Error::other("in use")
            }
            .is_fatal()
        );
        assert!(TransportError::Closed.is_fatal());

        assert!(!TransportError::Timeout(1).is_fatal());
        assert!(!TransportError::Io(io::Error::other("test")).is_fatal());
    }

    #[test]
    fn test_timeout_message_names_sequence() {
        assert_eq!(
            TransportError::Timeout(1234).to_string(),
            "ACK not received for sequence 1234"
        );
    }
}
