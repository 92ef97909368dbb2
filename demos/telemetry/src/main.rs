//! PRISM telemetry client.
//!
//! Logs in to the collector, waits for its authentication verdict and then
//! pushes one update. See the crate docs for the environment variables.

use std::time::Duration;

use anyhow::{Result, bail};
use prism_transport::message::{AuthResponse, Body, DataPacket, MessageKind, Update};
use prism_transport::{InboundFrame, TransportError};
use prism_telemetry::{Settings, init_tracing};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// How long to wait for the collector's AuthResponse after the login ACK.
const AUTH_RESPONSE_WAIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let settings = Settings::from_env("0.0.0.0:0")?;

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let transport = settings
        .transport_builder()
        .start(move |frame: InboundFrame| {
            let _ = inbound_tx.send(frame);
        })
        .await?;

    let login = DataPacket::login(settings.service.as_str(), settings.token.as_str()).encode()?;
    match transport.send_data(&login).await {
        Ok(delivered) => info!(
            sequence = delivered.sequence,
            rtt_ms = delivered.rtt.as_millis() as u64,
            "login acknowledged"
        ),
        Err(TransportError::Timeout(sequence)) => {
            transport.shutdown().await;
            bail!("collector did not acknowledge login (sequence {sequence})");
        }
        Err(e) => return Err(e.into()),
    }

    match tokio::time::timeout(AUTH_RESPONSE_WAIT, next_auth_response(&mut inbound_rx)).await {
        Ok(Some(response)) if response.is_failure() => {
            error!(message = %response.message, "authentication failed");
            transport.shutdown().await;
            bail!("authentication failed: {}", response.message);
        }
        Ok(Some(response)) => info!(message = %response.message, "authenticated"),
        Ok(None) | Err(_) => warn!("no authentication response, continuing"),
    }

    let update = DataPacket::update(Update {
        name: "test-name".into(),
        value: "10".into(),
        category: "KILLS".into(),
        persist_cache: true,
    })
    .encode()?;
    let delivered = transport.send_data(&update).await?;
    info!(sequence = delivered.sequence, "update acknowledged");

    transport.shutdown().await;
    Ok(())
}

/// Wait for the next inbound AuthResponse, skipping anything else.
async fn next_auth_response(
    inbound: &mut mpsc::UnboundedReceiver<InboundFrame>,
) -> Option<AuthResponse> {
    while let Some(frame) = inbound.recv().await {
        if frame.message_kind() != Some(MessageKind::AuthResponse) {
            info!(message_type = ?frame.message_type, "ignoring inbound message");
            continue;
        }
        match DataPacket::decode(&frame.payload) {
            Ok(DataPacket {
                body: Body::AuthResponse(response),
                ..
            }) => return Some(response),
            Ok(_) => {}
            Err(e) => warn!(sequence = frame.sequence, error = %e, "undecodable AuthResponse"),
        }
    }
    None
}
