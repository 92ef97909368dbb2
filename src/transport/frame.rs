//! Frame encoding and decoding for the PRISM transport.
//!
//! Two frame shapes share the wire:
//!
//! Short (acknowledgment) frame, always 5 bytes, never encrypted:
//! ```text
//! +--------+--------------------+
//! | Kind   | Sequence           |
//! | 1 byte | 4 bytes (BE32)     |
//! +--------+--------------------+
//! ```
//!
//! Long (data) frame:
//! ```text
//! +--------+----------------+----------------+----------+--------------+----------+
//! | Kind   | Sequence       | Checksum       | Nonce    | Ciphertext   | Tag      |
//! | 1 byte | 4 bytes (BE32) | 4 bytes (BE32) | 12 bytes | N bytes      | 16 bytes |
//! +--------+----------------+----------------+----------+--------------+----------+
//! ```
//!
//! The ciphertext decrypts to `inner header (9 bytes) ++ payload`, where the
//! inner header repeats kind, sequence and checksum. The checksum is
//! `CRC32(header with checksum field zeroed ++ payload)` and is verified over
//! the same scope on receipt.

use thiserror::Error;

use crate::core::{
    AEAD_NONCE_SIZE, AEAD_TAG_SIZE, CryptoError, FRAME_HEADER_SIZE, FRAME_KIND_ACK,
    FRAME_KIND_DATA, FRAME_KIND_NACK, MIN_LONG_FRAME_SIZE, SHORT_FRAME_SIZE,
};
use crate::crypto::Cipher;

/// Frame kind discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Encrypted data frame.
    Data = FRAME_KIND_DATA,
    /// Acknowledgment.
    Ack = FRAME_KIND_ACK,
    /// Negative acknowledgment (reserved).
    Nack = FRAME_KIND_NACK,
}

impl FrameKind {
    /// Parse frame kind from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FRAME_KIND_DATA => Some(Self::Data),
            FRAME_KIND_ACK => Some(Self::Ack),
            FRAME_KIND_NACK => Some(Self::Nack),
            _ => None,
        }
    }

    /// Convert frame kind to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The 9-byte header that prefixes a long frame, both on the wire and
/// inside the encrypted plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame kind.
    pub kind: FrameKind,
    /// Sequence number correlating the frame with its ACK.
    pub sequence: u32,
    /// CRC32 over the zeroed header skeleton and the payload.
    pub checksum: u32,
}

impl FrameHeader {
    /// Create a header with its checksum computed over `payload`.
    pub fn for_payload(kind: FrameKind, sequence: u32, payload: &[u8]) -> Self {
        Self {
            kind,
            sequence,
            checksum: compute_checksum(kind, sequence, payload),
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0] = self.kind.as_byte();
        buf[1..5].copy_from_slice(&self.sequence.to_be_bytes());
        buf[5..9].copy_from_slice(&self.checksum.to_be_bytes());
        buf
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: FRAME_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let kind = FrameKind::from_byte(bytes[0]).ok_or(FrameError::InvalidKind(bytes[0]))?;
        let sequence = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let checksum = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

        Ok(Self {
            kind,
            sequence,
            checksum,
        })
    }
}

/// CRC32 (IEEE) over `[kind][sequence][0000] ++ payload`.
///
/// The checksum field takes part in its own computation as four zero bytes;
/// the value is computed strictly before it is written into the header.
pub fn compute_checksum(kind: FrameKind, sequence: u32, payload: &[u8]) -> u32 {
    let skeleton = FrameHeader {
        kind,
        sequence,
        checksum: 0,
    }
    .to_bytes();

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&skeleton);
    hasher.update(payload);
    hasher.finalize()
}

/// Build a short acknowledgment frame.
pub fn build_ack(sequence: u32) -> [u8; SHORT_FRAME_SIZE] {
    let mut buf = [0u8; SHORT_FRAME_SIZE];
    buf[0] = FrameKind::Ack.as_byte();
    buf[1..5].copy_from_slice(&sequence.to_be_bytes());
    buf
}

/// Build an encrypted long frame for `payload`.
pub fn build_data_frame(
    kind: FrameKind,
    sequence: u32,
    payload: &[u8],
    cipher: &Cipher,
) -> Result<Vec<u8>, FrameError> {
    let header = FrameHeader::for_payload(kind, sequence, payload);
    seal_frame(&header, payload, cipher)
}

/// Encrypt `header ++ payload` and lay out the long frame.
///
/// The header is used verbatim, checksum included.
pub fn seal_frame(
    header: &FrameHeader,
    payload: &[u8],
    cipher: &Cipher,
) -> Result<Vec<u8>, FrameError> {
    let header_bytes = header.to_bytes();

    let mut plaintext = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    plaintext.extend_from_slice(&header_bytes);
    plaintext.extend_from_slice(payload);

    let sealed = cipher.encrypt(&plaintext)?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + sealed.wire_len());
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(&sealed.nonce);
    frame.extend_from_slice(&sealed.ciphertext);
    frame.extend_from_slice(&sealed.tag);
    Ok(frame)
}

/// A classified incoming datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming<'a> {
    /// Short acknowledgment frame.
    Ack {
        /// Acknowledged sequence number.
        sequence: u32,
    },
    /// Long frame, not yet decrypted.
    Data(SealedFrame<'a>),
}

/// A long frame split into its wire parts, borrowing the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFrame<'a> {
    /// Outer (unauthenticated) header.
    pub header: FrameHeader,
    /// AEAD nonce.
    pub nonce: [u8; AEAD_NONCE_SIZE],
    /// Encrypted `inner header ++ payload`.
    pub ciphertext: &'a [u8],
    /// AEAD tag.
    pub tag: [u8; AEAD_TAG_SIZE],
}

impl SealedFrame<'_> {
    /// Decrypt the frame and verify its integrity.
    ///
    /// The outer header is not covered by the AEAD, so it must match the
    /// authenticated inner header exactly.
    pub fn open(&self, cipher: &Cipher) -> Result<OpenedFrame, FrameError> {
        let mut plaintext = cipher.decrypt(&self.nonce, self.ciphertext, &self.tag)?;

        let inner = FrameHeader::from_bytes(&plaintext)?;
        let payload = plaintext.split_off(FRAME_HEADER_SIZE);

        let computed = compute_checksum(inner.kind, inner.sequence, &payload);
        if computed != inner.checksum {
            return Err(FrameError::ChecksumMismatch {
                expected: inner.checksum,
                actual: computed,
            });
        }

        if inner != self.header {
            return Err(FrameError::HeaderMismatch {
                outer: self.header,
                inner,
            });
        }

        Ok(OpenedFrame {
            header: inner,
            payload,
        })
    }
}

/// A decrypted, verified long frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFrame {
    /// Authenticated inner header.
    pub header: FrameHeader,
    /// Application payload.
    pub payload: Vec<u8>,
}

/// Classify a received datagram.
///
/// Datagrams shorter than a minimal long frame are acknowledgments if their
/// first byte is [`FrameKind::Ack`]; everything else is split into header,
/// nonce, ciphertext and tag.
pub fn parse_incoming(data: &[u8]) -> Result<Incoming<'_>, FrameError> {
    if data.len() < MIN_LONG_FRAME_SIZE {
        return match data.first() {
            Some(&FRAME_KIND_ACK) if data.len() >= SHORT_FRAME_SIZE => Ok(Incoming::Ack {
                sequence: u32::from_be_bytes([data[1], data[2], data[3], data[4]]),
            }),
            Some(&FRAME_KIND_ACK) | None => Err(FrameError::TooShort {
                expected: SHORT_FRAME_SIZE,
                actual: data.len(),
            }),
            Some(_) => Err(FrameError::TooShort {
                expected: MIN_LONG_FRAME_SIZE,
                actual: data.len(),
            }),
        };
    }

    let header = FrameHeader::from_bytes(data)?;

    let body = &data[FRAME_HEADER_SIZE..];
    let (nonce_bytes, rest) = body.split_at(AEAD_NONCE_SIZE);
    let (ciphertext, tag_bytes) = rest.split_at(rest.len() - AEAD_TAG_SIZE);

    let mut nonce = [0u8; AEAD_NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);
    let mut tag = [0u8; AEAD_TAG_SIZE];
    tag.copy_from_slice(tag_bytes);

    Ok(Incoming::Data(SealedFrame {
        header,
        nonce,
        ciphertext,
        tag,
    }))
}

/// Errors that can occur during frame parsing or verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is too short.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Unknown frame kind.
    #[error("invalid frame kind: 0x{0:02x}")]
    InvalidKind(u8),

    /// Integrity check failed after decryption.
    #[error("checksum mismatch: header says 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch {
        /// Checksum carried in the inner header.
        expected: u32,
        /// Checksum computed over the decrypted payload.
        actual: u32,
    },

    /// Outer header disagrees with the authenticated inner header.
    #[error("outer header {outer:?} does not match inner header {inner:?}")]
    HeaderMismatch {
        /// Header as received in the clear.
        outer: FrameHeader,
        /// Header recovered from the ciphertext.
        inner: FrameHeader,
    },

    /// Encryption or authentication failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
