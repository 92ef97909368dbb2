//! The PRISM transport endpoint.
//!
//! A [`Transport`] owns one connected UDP socket. Any number of tasks may
//! call [`Transport::send`] concurrently; a single background task reads the
//! socket, resolves acknowledgments and hands verified DATA frames to the
//! [`FrameHandler`].

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::crypto::{Cipher, CipherSuite};
#[cfg(feature = "messages")]
use crate::message::MessageKind;

use super::config::TransportConfig;
use super::error::{TransportError, TransportResult};
use super::frame::{
    FrameKind, Incoming, SealedFrame, build_ack, build_data_frame, parse_incoming,
};
use super::registry::{PendingRegistry, WaitOutcome};
use super::sequence::SequenceGenerator;
use super::socket::PrismSocket;

/// A verified DATA frame received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Application message type declared by the payload's leading byte,
    /// `None` for an empty payload.
    pub message_type: Option<u8>,
    /// Sequence number, acknowledged back to the peer after the handler ran.
    pub sequence: u32,
    /// Decrypted application payload.
    pub payload: Vec<u8>,
}

impl InboundFrame {
    /// Wrap a decrypted payload, reading its message type.
    pub fn new(sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            message_type: payload.first().copied(),
            sequence,
            payload,
        }
    }

    /// The message type as a known [`MessageKind`], if it is one.
    #[cfg(feature = "messages")]
    #[cfg_attr(docsrs, doc(cfg(feature = "messages")))]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.message_type.and_then(|value| MessageKind::try_from(value).ok())
    }
}

/// Consumer of inbound DATA frames.
///
/// Called from the receive loop before the ACK is written, so it should
/// return quickly. Hand heavy work off to another task. A panic is caught
/// and logged; the frame is still acknowledged.
pub trait FrameHandler: Send + Sync + 'static {
    /// Handle one verified frame.
    fn on_frame(&self, frame: InboundFrame);
}

impl<F> FrameHandler for F
where
    F: Fn(InboundFrame) + Send + Sync + 'static,
{
    fn on_frame(&self, frame: InboundFrame) {
        self(frame)
    }
}

/// Handler that discards inbound frames (they are still acknowledged).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl FrameHandler for NoopHandler {
    fn on_frame(&self, _frame: InboundFrame) {}
}

/// Successful delivery of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    /// Sequence number the frame was sent under.
    pub sequence: u32,
    /// Time from registration to ACK.
    pub rtt: Duration,
}

/// State shared between senders and the receive loop.
#[derive(Debug)]
struct Shared {
    socket: Arc<UdpSocket>,
    cipher: Cipher,
    registry: PendingRegistry,
    closed: AtomicBool,
}

impl Shared {
    async fn handle_datagram<H: FrameHandler>(
        &self,
        datagram: &[u8],
        handler: &H,
    ) -> TransportResult<()> {
        match parse_incoming(datagram)? {
            Incoming::Ack { sequence } => {
                match self.registry.resolve(sequence) {
                    Some(rtt) => {
                        trace!(sequence, rtt_us = rtt.as_micros() as u64, "ACK matched")
                    }
                    None => debug!(sequence, "ACK for unknown sequence"),
                }
                Ok(())
            }
            Incoming::Data(sealed) => self.handle_long_frame(&sealed, handler).await,
        }
    }

    async fn handle_long_frame<H: FrameHandler>(
        &self,
        sealed: &SealedFrame<'_>,
        handler: &H,
    ) -> TransportResult<()> {
        let opened = sealed.open(&self.cipher)?;
        let sequence = opened.header.sequence;

        if opened.header.kind != FrameKind::Data {
            debug!(sequence, kind = ?opened.header.kind, "ignoring long frame that is not DATA");
            return Ok(());
        }

        let frame = InboundFrame::new(sequence, opened.payload);
        trace!(
            sequence,
            len = frame.payload.len(),
            message_type = ?frame.message_type,
            "DATA frame received"
        );
        log_unrecognized_type(&frame);

        // A panicking handler must not take the receive loop down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| handler.on_frame(frame))).is_err() {
            error!(sequence, "frame handler panicked");
        }

        self.socket.send(&build_ack(sequence)).await?;
        Ok(())
    }
}

/// Reliable encrypted datagram transport.
///
/// Dropping the transport stops the receive loop; prefer
/// [`shutdown`](Self::shutdown) to also wait for it to finish.
#[derive(Debug)]
pub struct Transport {
    shared: Arc<Shared>,
    sequences: SequenceGenerator,
    ack_timeout: Duration,
    max_payload_size: usize,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Bind, connect to the collector and spawn the receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start<H: FrameHandler>(
        config: TransportConfig,
        handler: H,
    ) -> TransportResult<Self> {
        config.validate()?;

        let socket = PrismSocket::bind_with_limit(config.bind_addr, config.max_datagram_size)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        socket
            .connect(config.remote_addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: config.remote_addr,
                source,
            })?;
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(Shared {
            socket: socket.socket_arc(),
            cipher: Cipher::new(config.cipher_suite, &config.key),
            registry: PendingRegistry::new(),
            closed: AtomicBool::new(false),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let recv_task = tokio::spawn(receive_loop(
            Arc::clone(&shared),
            socket,
            handler,
            shutdown_rx,
        ));

        info!(
            %local_addr,
            remote_addr = %config.remote_addr,
            suite = ?config.cipher_suite,
            "transport started"
        );

        Ok(Self {
            shared,
            sequences: SequenceGenerator::new(config.sequence_strategy),
            ack_timeout: config.ack_timeout,
            max_payload_size: config.max_payload_size(),
            local_addr,
            remote_addr: config.remote_addr,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            recv_task: Mutex::new(Some(recv_task)),
        })
    }

    /// Send `payload` in a long frame of `kind` and wait for its ACK.
    ///
    /// Never retries. On [`TransportError::Timeout`] the frame may still
    /// have been delivered.
    pub async fn send(&self, payload: &[u8], kind: FrameKind) -> TransportResult<Delivered> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if payload.len() > self.max_payload_size {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }

        let sequence = self.sequences.next_sequence();
        let frame = build_data_frame(kind, sequence, payload, &self.shared.cipher)?;

        let waiter = self.shared.registry.register(sequence);
        // Shutdown may have cleared the registry between the check above and
        // the registration.
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        if let Err(e) = self.shared.socket.send(&frame).await {
            warn!(sequence, error = %e, "failed to write frame");
            return Err(TransportError::Io(e));
        }
        trace!(sequence, len = frame.len(), "frame sent");

        match waiter.wait(self.ack_timeout).await {
            WaitOutcome::Resolved(rtt) => {
                debug!(sequence, rtt_ms = rtt.as_millis() as u64, "frame acknowledged");
                Ok(Delivered { sequence, rtt })
            }
            WaitOutcome::Expired => {
                warn!(
                    sequence,
                    timeout_ms = self.ack_timeout.as_millis() as u64,
                    "ACK not received"
                );
                Err(TransportError::Timeout(sequence))
            }
            WaitOutcome::Abandoned if self.is_closed() => Err(TransportError::Closed),
            WaitOutcome::Abandoned => Err(TransportError::Superseded(sequence)),
        }
    }

    /// Send `payload` as a DATA frame.
    pub async fn send_data(&self, payload: &[u8]) -> TransportResult<Delivered> {
        self.send(payload, FrameKind::Data).await
    }

    /// Stop the receive loop and fail every pending send with
    /// [`TransportError::Closed`]. Idempotent.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(tx) = lock(&self.shutdown_tx).take() {
            let _ = tx.send(());
        }
        let task = lock(&self.recv_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "receive loop ended abnormally");
            }
        }

        self.shared.registry.clear();
        info!(local_addr = %self.local_addr, "transport shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Collector address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Number of sends waiting for an ACK.
    pub fn pending_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Largest payload accepted by [`send`](Self::send).
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// AEAD construction in use.
    pub fn cipher_suite(&self) -> CipherSuite {
        self.shared.cipher.suite()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        let tx = self
            .shutdown_tx
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }
        self.shared.registry.clear();
    }
}

#[cfg(feature = "messages")]
fn log_unrecognized_type(frame: &InboundFrame) {
    if frame.message_kind().is_none() {
        debug!(
            sequence = frame.sequence,
            message_type = ?frame.message_type,
            "unrecognized application message type"
        );
    }
}

#[cfg(not(feature = "messages"))]
fn log_unrecognized_type(_frame: &InboundFrame) {}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read datagrams until shut down. Errors are logged, never propagated.
async fn receive_loop<H: FrameHandler>(
    shared: Arc<Shared>,
    mut socket: PrismSocket,
    handler: H,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("receive loop stopped");
                break;
            }
            received = socket.recv() => {
                let result = match received {
                    Ok(datagram) => shared.handle_datagram(datagram, &handler).await,
                    Err(e) => Err(TransportError::Io(e)),
                };
                if let Err(e) = result {
                    if e.is_silent_drop() {
                        debug!(error = %e, "dropping datagram");
                    } else {
                        warn!(error = %e, "receive error");
                    }
                }
            }
        }
    }
}
