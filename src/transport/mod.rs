//! PRISM Protocol - Transport Layer
//!
//! Reliable, authenticated-encrypted delivery of single datagrams over UDP:
//!
//! - **Frame encoding/decoding**: [`build_ack`], [`build_data_frame`],
//!   [`parse_incoming`] and the CRC32 integrity check
//! - **Pending requests**: [`PendingRegistry`] correlating ACKs with senders
//! - **Endpoint**: [`Transport`] with concurrent [`Transport::send`] and one
//!   background receive loop
//! - **Async sockets**: [`PrismSocket`] wrapper for tokio UDP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Application (messages)            │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, ACK registry, receive loop    │
//! ├─────────────────────────────────────────┤
//! │     Cipher (AES-256-GCM / ChaCha20)     │
//! ├─────────────────────────────────────────┤
//! │              UDP                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every long frame is answered by a short ACK carrying the same sequence.
//! Frames that fail to parse, authenticate or verify are dropped without an
//! ACK, so the sender sees a timeout. Nothing is retried.

mod config;
mod endpoint;
mod error;
mod frame;
mod registry;
mod sequence;
mod socket;

pub use config::{TransportBuilder, TransportConfig};
pub use endpoint::{Delivered, FrameHandler, InboundFrame, NoopHandler, Transport};
pub use error::{TransportError, TransportResult};
pub use frame::*;
pub use registry::{PendingRegistry, WaitOutcome, Waiter};
pub use sequence::{SequenceGenerator, SequenceStrategy};
pub use socket::PrismSocket;
