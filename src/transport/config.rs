//! Transport configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::core::{
    ACK_TIMEOUT, DEFAULT_COLLECTOR_PORT, DEFAULT_MAX_DATAGRAM_SIZE, LONG_FRAME_OVERHEAD,
    MAX_UDP_PAYLOAD_SIZE,
};
use crate::crypto::{CipherSuite, SharedKey};

use super::endpoint::{FrameHandler, Transport};
use super::error::{TransportError, TransportResult};
use super::sequence::SequenceStrategy;

/// Transport configuration.
///
/// There is no `Default`: the pre-shared key has no sensible fallback.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Collector address the socket is connected to.
    pub remote_addr: SocketAddr,

    /// Local address to bind.
    pub bind_addr: SocketAddr,

    /// Pre-shared key.
    pub key: SharedKey,

    /// AEAD construction.
    pub cipher_suite: CipherSuite,

    /// How long `send` waits for the matching ACK.
    pub ack_timeout: Duration,

    /// Largest datagram sent or accepted.
    ///
    /// Not negotiated: both ends must use the same limit, or the larger
    /// side's frames are dropped by the smaller side's receive buffer. The
    /// reference collector reads 1024-byte datagrams.
    pub max_datagram_size: usize,

    /// Sequence number allocation.
    pub sequence_strategy: SequenceStrategy,
}

impl TransportConfig {
    /// Configuration with default addresses and timings for `key`.
    pub fn new(key: SharedKey) -> Self {
        Self {
            remote_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_COLLECTOR_PORT)),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            key,
            cipher_suite: CipherSuite::default(),
            ack_timeout: ACK_TIMEOUT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            sequence_strategy: SequenceStrategy::default(),
        }
    }

    /// Largest payload a single long frame can carry.
    pub fn max_payload_size(&self) -> usize {
        self.max_datagram_size.saturating_sub(LONG_FRAME_OVERHEAD)
    }

    /// Check that the datagram limit fits UDP and leaves room for a payload.
    pub fn validate(&self) -> TransportResult<()> {
        if self.max_datagram_size <= LONG_FRAME_OVERHEAD {
            return Err(TransportError::Config(format!(
                "max_datagram_size must exceed the {LONG_FRAME_OVERHEAD}-byte frame \
                 overhead, got {}",
                self.max_datagram_size
            )));
        }
        if self.max_datagram_size > MAX_UDP_PAYLOAD_SIZE {
            return Err(TransportError::Config(format!(
                "max_datagram_size must not exceed {MAX_UDP_PAYLOAD_SIZE}, got {}",
                self.max_datagram_size
            )));
        }
        if self.ack_timeout.is_zero() {
            return Err(TransportError::Config("ack_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for creating a [`Transport`].
#[derive(Debug)]
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    /// Create a new builder for `key`.
    pub fn new(key: SharedKey) -> Self {
        Self {
            config: TransportConfig::new(key),
        }
    }

    /// Set the collector address.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.config.remote_addr = addr;
        self
    }

    /// Set the local bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the cipher suite.
    pub fn cipher_suite(mut self, suite: CipherSuite) -> Self {
        self.config.cipher_suite = suite;
        self
    }

    /// Set the ACK timeout.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the maximum datagram size. The peer must be configured to match.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    /// Set the sequence strategy.
    pub fn sequence_strategy(mut self, strategy: SequenceStrategy) -> Self {
        self.config.sequence_strategy = strategy;
        self
    }

    /// Build the transport configuration.
    pub fn build(self) -> TransportResult<TransportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration and start a transport with it.
    pub async fn start<H: FrameHandler>(self, handler: H) -> TransportResult<Transport> {
        Transport::start(self.build()?, handler).await
    }
}
