//! Protocol constants for the PRISM transport.
//!
//! These values are fixed by the wire format and are not negotiated.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// AEAD authentication tag size (GCM / Poly1305).
pub const AEAD_TAG_SIZE: usize = 16;

/// AEAD nonce size (96-bit).
pub const AEAD_NONCE_SIZE: usize = 12;

/// Pre-shared key size (256-bit).
pub const SHARED_KEY_SIZE: usize = 32;

// =============================================================================
// FRAME KINDS
// =============================================================================

/// Encrypted data frame carrying an application payload.
pub const FRAME_KIND_DATA: u8 = 0x01;

/// Plaintext acknowledgment frame.
pub const FRAME_KIND_ACK: u8 = 0x02;

/// Negative acknowledgment. Reserved, never emitted.
pub const FRAME_KIND_NACK: u8 = 0x03;

// =============================================================================
// FRAME SIZES
// =============================================================================

/// Sequence number size (BE32).
pub const SEQUENCE_SIZE: usize = 4;

/// CRC32 checksum size (BE32).
pub const CHECKSUM_SIZE: usize = 4;

/// Short (ACK) frame size: kind + sequence.
pub const SHORT_FRAME_SIZE: usize = 1 + SEQUENCE_SIZE;

/// Long frame header size: kind + sequence + checksum.
pub const FRAME_HEADER_SIZE: usize = 1 + SEQUENCE_SIZE + CHECKSUM_SIZE;

/// Smallest datagram that is parsed as a long frame.
///
/// Anything shorter is either an ACK or malformed.
pub const MIN_LONG_FRAME_SIZE: usize = FRAME_HEADER_SIZE + AEAD_NONCE_SIZE + AEAD_TAG_SIZE;

/// Bytes a long frame adds on top of the application payload.
///
/// Outer header, nonce, encrypted inner header and tag.
pub const LONG_FRAME_OVERHEAD: usize = MIN_LONG_FRAME_SIZE + FRAME_HEADER_SIZE;

/// Default maximum datagram size, matching the collector's receive buffer.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1024;

/// Largest UDP payload the 16-bit length field allows (65535 minus the
/// 8-byte UDP header). Over IPv4 the IP header lowers the real ceiling to
/// 65507, and the OS rejects anything above it when sending.
pub const MAX_UDP_PAYLOAD_SIZE: usize = 65_527;

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Default collector port.
pub const DEFAULT_COLLECTOR_PORT: u16 = 6969;

// =============================================================================
// TIMING
// =============================================================================

/// How long `send` waits for an acknowledgment before reporting a timeout.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);
