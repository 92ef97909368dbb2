//! PRISM telemetry collector.
//!
//! Listens on `PRISM_BIND_ADDR` (default 0.0.0.0:6969), acknowledges every
//! valid DATA frame, answers logins with an AuthResponse and logs updates.
//! Serves any number of clients from one unconnected socket.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use prism_transport::core::DEFAULT_MAX_DATAGRAM_SIZE;
use prism_transport::crypto::Cipher;
use prism_transport::message::{Body, DataPacket, Login};
use prism_transport::transport::{
    FrameKind, Incoming, SequenceGenerator, build_ack, build_data_frame, parse_incoming,
};
use prism_telemetry::{Settings, init_tracing};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Collector state shared by every datagram.
struct Collector {
    socket: UdpSocket,
    cipher: Cipher,
    settings: Settings,
    sequences: SequenceGenerator,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let settings = Settings::from_env("0.0.0.0:6969")?;

    let socket = UdpSocket::bind(settings.bind_addr)
        .await
        .with_context(|| format!("bind {}", settings.bind_addr))?;
    info!(addr = %socket.local_addr()?, suite = ?settings.cipher_suite, "collector listening");

    let collector = Collector {
        socket,
        cipher: Cipher::new(settings.cipher_suite, &settings.key),
        settings,
        sequences: SequenceGenerator::default(),
    };

    let mut buf = vec![0u8; DEFAULT_MAX_DATAGRAM_SIZE];
    loop {
        let (len, from) = match collector.socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "receive failed");
                continue;
            }
        };
        if let Err(e) = collector.handle(&buf[..len], from).await {
            debug!(%from, error = %e, "dropping datagram");
        }
    }
}

impl Collector {
    async fn handle(&self, datagram: &[u8], from: SocketAddr) -> Result<()> {
        let sealed = match parse_incoming(datagram)? {
            Incoming::Ack { sequence } => {
                debug!(%from, sequence, "ACK received");
                return Ok(());
            }
            Incoming::Data(sealed) => sealed,
        };

        let frame = sealed.open(&self.cipher)?;
        if frame.header.kind != FrameKind::Data {
            return Ok(());
        }
        self.socket
            .send_to(&build_ack(frame.header.sequence), from)
            .await?;

        let packet = DataPacket::decode(&frame.payload)?;
        match packet.body {
            Body::Login(login) => self.respond_to_login(&login, from).await?,
            Body::Update(update) => info!(
                %from,
                name = %update.name,
                value = %update.value,
                category = %update.category,
                persist = update.persist_cache,
                "update"
            ),
            Body::AuthResponse(_) => warn!(%from, "unexpected AuthResponse from client"),
        }
        Ok(())
    }

    /// Replies are fire-and-forget; their ACKs are only logged.
    async fn respond_to_login(&self, login: &Login, from: SocketAddr) -> Result<()> {
        let accepted = login.token == self.settings.token;
        info!(%from, service = %login.service, accepted, "login");

        let response = if accepted {
            DataPacket::auth_response(0, "welcome")
        } else {
            DataPacket::auth_response(1, "invalid token")
        };
        let frame = build_data_frame(
            FrameKind::Data,
            self.sequences.next_sequence(),
            &response.encode()?,
            &self.cipher,
        )?;
        self.socket.send_to(&frame, from).await?;
        Ok(())
    }
}
