//! Async UDP socket wrapper for the PRISM transport.
//!
//! Enforces the maximum datagram size on both directions: outgoing frames
//! are checked by the transport before they are written, and incoming
//! datagrams that do not fit are reported instead of being silently
//! truncated.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::core::DEFAULT_MAX_DATAGRAM_SIZE;

/// Async UDP socket wrapper for PRISM.
#[derive(Debug)]
pub struct PrismSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Receive buffer, one byte larger than the datagram limit so that
    /// oversized datagrams can be detected.
    recv_buffer: Vec<u8>,
    /// Largest datagram accepted in either direction.
    max_datagram_size: usize,
}

impl PrismSocket {
    /// Bind with the default datagram limit.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Self::bind_with_limit(addr, DEFAULT_MAX_DATAGRAM_SIZE).await
    }

    /// Bind with an explicit datagram limit.
    pub async fn bind_with_limit(addr: SocketAddr, max_datagram_size: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, max_datagram_size))
    }

    /// Wrap an existing UDP socket.
    pub fn from_socket(socket: UdpSocket, max_datagram_size: usize) -> Self {
        Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; max_datagram_size + 1],
            max_datagram_size,
        }
    }

    /// Get the maximum datagram size.
    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Get the connected peer address.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    /// Connect to the remote collector.
    ///
    /// After connecting, only datagrams from that address are received.
    pub async fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.socket.connect(addr).await
    }

    /// Send data to the connected address.
    pub async fn send(&self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data).await
    }

    /// Receive one datagram from the connected address.
    ///
    /// Datagrams larger than the limit yield an `InvalidData` error.
    pub async fn recv(&mut self) -> io::Result<&[u8]> {
        let len = self.socket.recv(&mut self.recv_buffer).await?;
        if len > self.max_datagram_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "datagram exceeds {} bytes, dropped",
                    self.max_datagram_size
                ),
            ));
        }
        Ok(&self.recv_buffer[..len])
    }

    /// Get a clone of the Arc-wrapped socket, for writers running alongside
    /// the reader.
    pub fn socket_arc(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}
