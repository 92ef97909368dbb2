//! Shared setup for the PRISM telemetry demo binaries.
//!
//! Environment variables:
//! - PRISM_COLLECTOR_ADDR: collector address (default 127.0.0.1:6969)
//! - PRISM_BIND_ADDR: local bind address (client 0.0.0.0:0, collector 0.0.0.0:6969)
//! - PRISM_KEY: 32-character pre-shared key
//! - PRISM_CIPHER: aes-256-gcm | chacha20-poly1305
//! - PRISM_ACK_TIMEOUT_MS: ACK timeout in milliseconds (default 5000)
//! - PRISM_SERVICE: service name sent in the login (client only)
//! - PRISM_TOKEN: login token; the collector rejects any other token
//! - RUST_LOG: tracing filter (default info)

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use prism_transport::core::ACK_TIMEOUT;
use prism_transport::{CipherSuite, SharedKey, TransportBuilder};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Key the reference collector ships with. Demo use only.
pub const DEMO_KEY: &str = "secret-auth-key-123=============";

/// Token accepted when `PRISM_TOKEN` is unset.
pub const DEMO_TOKEN: &str = "demo-token";

/// Install a fmt subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Settings read from `PRISM_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Collector address.
    pub collector_addr: SocketAddr,
    /// Local bind address.
    pub bind_addr: SocketAddr,
    /// Pre-shared key.
    pub key: SharedKey,
    /// Cipher suite.
    pub cipher_suite: CipherSuite,
    /// ACK timeout.
    pub ack_timeout: Duration,
    /// Service name for the login.
    pub service: String,
    /// Login token.
    pub token: String,
}

impl Settings {
    /// Read settings, using `default_bind` when `PRISM_BIND_ADDR` is unset.
    pub fn from_env(default_bind: &str) -> Result<Self> {
        let key_text = env::var("PRISM_KEY").unwrap_or_else(|_| DEMO_KEY.to_string());
        let key = SharedKey::from_passphrase(&key_text).context("PRISM_KEY")?;

        let cipher_suite = match env::var("PRISM_CIPHER").as_deref() {
            Err(_) | Ok("aes-256-gcm") => CipherSuite::Aes256Gcm,
            Ok("chacha20-poly1305") => CipherSuite::ChaCha20Poly1305,
            Ok(other) => return Err(anyhow!("PRISM_CIPHER: unknown cipher suite {other:?}")),
        };

        let ack_timeout = match env::var("PRISM_ACK_TIMEOUT_MS") {
            Ok(ms) => Duration::from_millis(parse(&ms, "PRISM_ACK_TIMEOUT_MS")?),
            Err(_) => ACK_TIMEOUT,
        };

        let collector_addr = var_or("PRISM_COLLECTOR_ADDR", "127.0.0.1:6969");
        let bind_addr = var_or("PRISM_BIND_ADDR", default_bind);

        Ok(Self {
            collector_addr: parse(&collector_addr, "PRISM_COLLECTOR_ADDR")?,
            bind_addr: parse(&bind_addr, "PRISM_BIND_ADDR")?,
            key,
            cipher_suite,
            ack_timeout,
            service: var_or("PRISM_SERVICE", "telemetry"),
            token: var_or("PRISM_TOKEN", DEMO_TOKEN),
        })
    }

    /// Transport builder for the client side.
    pub fn transport_builder(&self) -> TransportBuilder {
        TransportBuilder::new(self.key.clone())
            .remote_addr(self.collector_addr)
            .bind_addr(self.bind_addr)
            .cipher_suite(self.cipher_suite)
            .ack_timeout(self.ack_timeout)
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse<T>(value: &str, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{name}: invalid value {value:?}"))
}
