//! Integration tests for the PRISM transport.
//!
//! Each test starts a real `Transport` on loopback and drives it from a
//! hand-rolled peer socket that speaks the frame format directly, so every
//! byte the transport emits or accepts is observable.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prism_transport::crypto::{Cipher, CipherSuite, SharedKey};
use prism_transport::transport::{
    FrameHeader, FrameKind, InboundFrame, Incoming, NoopHandler, OpenedFrame, SequenceStrategy,
    Transport, TransportBuilder, TransportError, build_ack, build_data_frame, parse_incoming,
    seal_frame,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const KEY: &str = "secret-auth-key-123=============";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn key() -> SharedKey {
    SharedKey::from_passphrase(KEY).unwrap()
}

/// The remote side of a transport under test.
struct Peer {
    socket: UdpSocket,
    cipher: Cipher,
}

impl Peer {
    async fn bind() -> Self {
        Self::bind_with(CipherSuite::Aes256Gcm).await
    }

    async fn bind_with(suite: CipherSuite) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind peer");
        Self {
            socket,
            cipher: Cipher::new(suite, &key()),
        }
    }

    fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Receive and open one long frame.
    async fn recv_frame(&self) -> (SocketAddr, OpenedFrame) {
        let mut buf = [0u8; 2048];
        let (len, from) = self.socket.recv_from(&mut buf).await.expect("peer recv");
        match parse_incoming(&buf[..len]).expect("parse") {
            Incoming::Data(sealed) => (from, sealed.open(&self.cipher).expect("open")),
            other => panic!("expected a long frame, got {other:?}"),
        }
    }

    /// Receive one datagram and expect it to be an ACK.
    async fn recv_ack(&self) -> u32 {
        let mut buf = [0u8; 2048];
        let (len, _) = self.socket.recv_from(&mut buf).await.expect("peer recv");
        assert_eq!(len, 5, "ACK frames are 5 bytes");
        match parse_incoming(&buf[..len]).expect("parse") {
            Incoming::Ack { sequence } => sequence,
            other => panic!("expected an ACK, got {other:?}"),
        }
    }

    async fn send_raw(&self, to: SocketAddr, bytes: &[u8]) {
        self.socket.send_to(bytes, to).await.expect("peer send");
    }

    async fn ack(&self, to: SocketAddr, sequence: u32) {
        self.send_raw(to, &build_ack(sequence)).await;
    }
}

fn builder(peer: &Peer) -> TransportBuilder {
    TransportBuilder::new(key())
        .remote_addr(peer.addr())
        .bind_addr("127.0.0.1:0".parse().unwrap())
}

/// Start a transport whose handler forwards every inbound frame to a channel.
async fn start_with_channel(
    builder: TransportBuilder,
) -> (Transport, mpsc::UnboundedReceiver<InboundFrame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = builder
        .start(move |frame: InboundFrame| {
            let _ = tx.send(frame);
        })
        .await
        .expect("start transport");
    (transport, rx)
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_acknowledged_within_one_second() {
    let peer = Peer::bind().await;
    let transport = builder(&peer).start(NoopHandler).await.unwrap();

    let login = b"login:telemetry:token";
    let send = transport.send(login, FrameKind::Data);
    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        assert_eq!(frame.header.kind, FrameKind::Data);
        assert_eq!(frame.payload, login);
        peer.ack(from, frame.header.sequence).await;
        frame.header.sequence
    };

    let (result, acked) = tokio::time::timeout(Duration::from_secs(1), async {
        tokio::join!(send, respond)
    })
    .await
    .expect("exchange finished within a second");

    let delivered = result.expect("send succeeds");
    assert_eq!(delivered.sequence, acked);
    assert!(delivered.rtt < Duration::from_secs(1));
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn no_response_times_out() {
    let peer = Peer::bind().await;
    let transport = builder(&peer)
        .ack_timeout(Duration::from_millis(200))
        .start(NoopHandler)
        .await
        .unwrap();

    let (result, (_, frame)) = tokio::join!(transport.send_data(b"anyone?"), peer.recv_frame());

    match result {
        Err(TransportError::Timeout(sequence)) => assert_eq!(sequence, frame.header.sequence),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn ack_for_other_sequence_times_out() {
    let peer = Peer::bind().await;
    let transport = builder(&peer)
        .ack_timeout(Duration::from_millis(200))
        .start(NoopHandler)
        .await
        .unwrap();

    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        peer.ack(from, frame.header.sequence.wrapping_add(1)).await;
    };
    let (result, ()) = tokio::join!(transport.send_data(b"payload"), respond);

    assert!(matches!(result, Err(TransportError::Timeout(_))));
    assert!(result.unwrap_err().is_delivery_uncertain());
}

#[tokio::test]
async fn unknown_ack_is_harmless() {
    let peer = Peer::bind().await;
    let transport = builder(&peer).start(NoopHandler).await.unwrap();

    peer.ack(transport.local_addr(), 0xDEAD_BEEF).await;
    peer.ack(transport.local_addr(), 0).await;

    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        peer.ack(from, frame.header.sequence).await;
    };
    let (result, ()) = tokio::join!(transport.send_data(b"after stray ACKs"), respond);

    assert!(result.is_ok());
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_sends_resolved_out_of_order() {
    const SENDS: usize = 8;

    let peer = Peer::bind().await;
    let transport = Arc::new(
        builder(&peer)
            .sequence_strategy(SequenceStrategy::Counter)
            .start(NoopHandler)
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..SENDS {
        let transport = Arc::clone(&transport);
        handles.push(tokio::spawn(async move {
            let payload = format!("update-{i}").into_bytes();
            let delivered = transport.send_data(&payload).await;
            (payload, delivered)
        }));
    }

    let mut seen: HashMap<u32, Vec<u8>> = HashMap::new();
    let mut from = None;
    for _ in 0..SENDS {
        let (addr, frame) = peer.recv_frame().await;
        from = Some(addr);
        seen.insert(frame.header.sequence, frame.payload);
    }
    assert_eq!(seen.len(), SENDS, "every send used its own sequence");

    // Acknowledge in descending sequence order.
    let mut sequences: Vec<u32> = seen.keys().copied().collect();
    sequences.sort_unstable_by(|a, b| b.cmp(a));
    let from = from.unwrap();
    for sequence in sequences {
        peer.ack(from, sequence).await;
    }

    for handle in handles {
        let (payload, delivered) = handle.await.unwrap();
        let delivered = delivered.expect("every send is acknowledged");
        assert_eq!(seen[&delivered.sequence], payload);
    }
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn counter_strategy_uses_consecutive_sequences() {
    let peer = Peer::bind().await;
    let transport = builder(&peer)
        .sequence_strategy(SequenceStrategy::Counter)
        .start(NoopHandler)
        .await
        .unwrap();

    let mut sequences = Vec::new();
    for _ in 0..3 {
        let respond = async {
            let (from, frame) = peer.recv_frame().await;
            peer.ack(from, frame.header.sequence).await;
        };
        let (result, ()) = tokio::join!(transport.send_data(b"tick"), respond);
        sequences.push(result.unwrap().sequence);
    }

    assert_eq!(sequences[1], sequences[0].wrapping_add(1));
    assert_eq!(sequences[2], sequences[1].wrapping_add(1));
}

#[tokio::test]
async fn chacha20_suite_end_to_end() {
    let peer = Peer::bind_with(CipherSuite::ChaCha20Poly1305).await;
    let transport = builder(&peer)
        .cipher_suite(CipherSuite::ChaCha20Poly1305)
        .start(NoopHandler)
        .await
        .unwrap();

    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        assert_eq!(frame.payload, b"over chacha");
        peer.ack(from, frame.header.sequence).await;
    };
    let (result, ()) = tokio::join!(transport.send_data(b"over chacha"), respond);
    assert!(result.is_ok());
}

#[tokio::test]
async fn largest_payload_fits_one_datagram() {
    let peer = Peer::bind().await;
    let transport = builder(&peer).start(NoopHandler).await.unwrap();

    let payload = vec![0xA5; transport.max_payload_size()];
    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        assert_eq!(frame.payload.len(), 1024 - 46);
        peer.ack(from, frame.header.sequence).await;
    };
    let (result, ()) = tokio::join!(transport.send_data(&payload), respond);
    assert!(result.is_ok());

    let too_big = vec![0xA5; transport.max_payload_size() + 1];
    assert!(matches!(
        transport.send_data(&too_big).await,
        Err(TransportError::PayloadTooLarge { .. })
    ));
}

// ---------------------------------------------------------------------------
// Receiving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inbound_data_is_delivered_then_acknowledged() {
    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    let frame = build_data_frame(FrameKind::Data, 77, b"auth-response", &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &frame).await;

    assert_eq!(peer.recv_ack().await, 77);
    let inbound = frames.recv().await.expect("handler called");
    assert_eq!(inbound.message_type, Some(b'a'));
    assert_eq!(inbound.sequence, 77);
    assert_eq!(inbound.payload, b"auth-response");
}

#[tokio::test]
async fn inbound_message_type_is_leading_payload_byte() {
    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    let frame = build_data_frame(FrameKind::Data, 31, &[3, 0, 0], &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &frame).await;

    assert_eq!(peer.recv_ack().await, 31);
    let inbound = frames.recv().await.unwrap();
    assert_eq!(inbound.message_type, Some(3));
    assert_eq!(inbound.payload, [3, 0, 0]);
}

#[tokio::test]
async fn unrecognized_message_type_is_still_acknowledged() {
    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    let frame = build_data_frame(FrameKind::Data, 32, &[0xEE, 1], &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &frame).await;

    assert_eq!(peer.recv_ack().await, 32);
    assert_eq!(frames.recv().await.unwrap().message_type, Some(0xEE));
}

#[tokio::test]
async fn panicking_handler_does_not_stop_the_loop() {
    let peer = Peer::bind().await;
    let (tx, mut frames) = mpsc::unbounded_channel();
    let transport = builder(&peer)
        .start(move |frame: InboundFrame| {
            if frame.payload == b"boom" {
                panic!("handler failure");
            }
            let _ = tx.send(frame);
        })
        .await
        .unwrap();

    let bad = build_data_frame(FrameKind::Data, 40, b"boom", &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &bad).await;
    // The frame was verified, so it is acknowledged even though the handler failed.
    assert_eq!(peer.recv_ack().await, 40);

    let good = build_data_frame(FrameKind::Data, 41, b"fine", &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &good).await;
    assert_eq!(peer.recv_ack().await, 41);
    assert_eq!(frames.recv().await.unwrap().sequence, 41);
    assert!(!transport.is_closed());
}

#[tokio::test]
async fn empty_inbound_payload_is_delivered() {
    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    let frame = build_data_frame(FrameKind::Data, 1, b"", &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &frame).await;

    assert_eq!(peer.recv_ack().await, 1);
    let inbound = frames.recv().await.unwrap();
    assert!(inbound.payload.is_empty());
    assert_eq!(inbound.message_type, None);
}

/// Send `rejected`, then a valid marker frame. The receive loop handles
/// datagrams in order, so if the first ACK the peer sees is for the marker,
/// the rejected frame was dropped without an ACK.
async fn assert_dropped(rejected: &[u8]) {
    const MARKER: u32 = 4242;

    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    peer.send_raw(transport.local_addr(), rejected).await;
    let marker = build_data_frame(FrameKind::Data, MARKER, b"marker", &peer.cipher).unwrap();
    peer.send_raw(transport.local_addr(), &marker).await;

    assert_eq!(peer.recv_ack().await, MARKER);
    let inbound = frames.recv().await.unwrap();
    assert_eq!(inbound.sequence, MARKER);
    assert!(frames.try_recv().is_err(), "rejected frame reached the handler");
}

#[tokio::test]
async fn checksum_failure_is_dropped_silently() {
    let cipher = Cipher::new(CipherSuite::Aes256Gcm, &key());
    // Decrypts fine, but the checksum covers different bytes.
    let stale = FrameHeader::for_payload(FrameKind::Data, 5, b"original");
    let frame = seal_frame(&stale, b"tampered", &cipher).unwrap();

    assert_dropped(&frame).await;
}

#[tokio::test]
async fn wrong_key_is_dropped_silently() {
    let other = Cipher::new(CipherSuite::Aes256Gcm, &SharedKey::from_bytes([9u8; 32]));
    let frame = build_data_frame(FrameKind::Data, 5, b"intruder", &other).unwrap();

    assert_dropped(&frame).await;
}

#[tokio::test]
async fn rewritten_outer_header_is_dropped_silently() {
    let cipher = Cipher::new(CipherSuite::Aes256Gcm, &key());
    let mut frame = build_data_frame(FrameKind::Data, 5, b"payload", &cipher).unwrap();
    frame[1..5].copy_from_slice(&6u32.to_be_bytes());

    assert_dropped(&frame).await;
}

#[tokio::test]
async fn flipped_ciphertext_bit_is_dropped_silently() {
    let cipher = Cipher::new(CipherSuite::Aes256Gcm, &key());
    let mut frame = build_data_frame(FrameKind::Data, 5, b"payload", &cipher).unwrap();
    frame[9 + 12] ^= 0x01;

    assert_dropped(&frame).await;
}

#[tokio::test]
async fn malformed_datagrams_do_not_stop_the_loop() {
    assert_dropped(&[0x02, 0x00]).await;
    assert_dropped(&[0x01; 20]).await;
    assert_dropped(&[0x7F; 64]).await;
    assert_dropped(&[]).await;
}

#[tokio::test]
async fn non_data_long_frame_is_ignored() {
    let cipher = Cipher::new(CipherSuite::Aes256Gcm, &key());
    let frame = build_data_frame(FrameKind::Nack, 5, b"not data", &cipher).unwrap();

    assert_dropped(&frame).await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_after_shutdown_is_closed() {
    let peer = Peer::bind().await;
    let transport = builder(&peer).start(NoopHandler).await.unwrap();

    transport.shutdown().await;
    assert!(matches!(
        transport.send_data(b"late").await,
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn shutdown_stops_acknowledging() {
    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;
    let local = transport.local_addr();
    transport.shutdown().await;

    let frame = build_data_frame(FrameKind::Data, 8, b"anyone home?", &peer.cipher).unwrap();
    peer.send_raw(local, &frame).await;

    let mut buf = [0u8; 64];
    let answered =
        tokio::time::timeout(Duration::from_millis(200), peer.socket.recv_from(&mut buf)).await;
    assert!(answered.is_err(), "no ACK after shutdown");
    assert!(frames.try_recv().is_err());
}

#[cfg(feature = "messages")]
#[tokio::test]
async fn login_and_auth_response_exchange() {
    use prism_transport::message::{Body, DataPacket, MessageKind};

    let peer = Peer::bind().await;
    let (transport, mut frames) = start_with_channel(builder(&peer)).await;

    let login = DataPacket::login("telemetry", "token-123").encode().unwrap();
    let respond = async {
        let (from, frame) = peer.recv_frame().await;
        let packet = DataPacket::decode(&frame.payload).unwrap();
        assert!(matches!(packet.body, Body::Login(ref l) if l.token == "token-123"));
        peer.ack(from, frame.header.sequence).await;

        let reply = DataPacket::auth_response(1, "bad token").encode().unwrap();
        let reply = build_data_frame(FrameKind::Data, 900, &reply, &peer.cipher).unwrap();
        peer.send_raw(from, &reply).await;
        assert_eq!(peer.recv_ack().await, 900);
    };
    let (result, ()) = tokio::join!(transport.send_data(&login), respond);
    assert!(result.is_ok());

    let inbound = frames.recv().await.unwrap();
    assert_eq!(inbound.message_type, Some(3));
    assert_eq!(inbound.message_kind(), Some(MessageKind::AuthResponse));
    match DataPacket::decode(&inbound.payload).unwrap().body {
        Body::AuthResponse(response) => assert!(response.is_failure()),
        other => panic!("expected AuthResponse, got {other:?}"),
    }
}
