//! Telemetry message schema carried as transport payloads.
//!
//! Every payload is one bincode-encoded [`DataPacket`]: a numeric
//! [`MessageKind`] followed by the matching body. The transport reads only
//! the leading type byte, see [`InboundFrame::message_kind`].
//!
//! [`InboundFrame::message_kind`]: crate::transport::InboundFrame::message_kind

use serde::{Deserialize, Serialize};

/// Numeric message type, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum MessageKind {
    /// Client authentication.
    Login = 2,
    /// Collector's answer to a login.
    AuthResponse = 3,
    /// Telemetry value update.
    Update = 4,
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(MessageKind::Login),
            3 => Ok(MessageKind::AuthResponse),
            4 => Ok(MessageKind::Update),
            other => Err(MessageError::UnknownKind(other)),
        }
    }
}

/// Client authentication request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    /// Service the client authenticates against.
    pub service: String,
    /// Opaque credential.
    pub token: String,
}

/// Authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// `0` on success, `1` when authentication failed.
    pub status: u32,
    /// Human-readable detail.
    pub message: String,
}

impl AuthResponse {
    /// Status code signalling a rejected login.
    pub const STATUS_FAILED: u32 = 1;

    /// Whether the collector rejected the login.
    pub fn is_failure(&self) -> bool {
        self.status == Self::STATUS_FAILED
    }
}

/// A named telemetry value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Metric name.
    pub name: String,
    /// Value, as text.
    pub value: String,
    /// Metric category, e.g. `KILLS`.
    pub category: String,
    /// Whether the collector should persist the value.
    pub persist_cache: bool,
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    /// See [`Login`].
    Login(Login),
    /// See [`AuthResponse`].
    AuthResponse(AuthResponse),
    /// See [`Update`].
    Update(Update),
}

impl Body {
    /// The kind this body must be tagged with.
    pub fn kind(&self) -> MessageKind {
        match self {
            Body::Login(_) => MessageKind::Login,
            Body::AuthResponse(_) => MessageKind::AuthResponse,
            Body::Update(_) => MessageKind::Update,
        }
    }
}

/// Envelope for every application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    /// Declared message type.
    pub kind: MessageKind,
    /// Message contents.
    pub body: Body,
}

impl DataPacket {
    /// Wrap `body`, tagging it with its kind.
    pub fn new(body: Body) -> Self {
        Self {
            kind: body.kind(),
            body,
        }
    }

    /// Login packet.
    pub fn login(service: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(Body::Login(Login {
            service: service.into(),
            token: token.into(),
        }))
    }

    /// Authentication response packet.
    pub fn auth_response(status: u32, message: impl Into<String>) -> Self {
        Self::new(Body::AuthResponse(AuthResponse {
            status,
            message: message.into(),
        }))
    }

    /// Update packet.
    pub fn update(update: Update) -> Self {
        Self::new(Body::Update(update))
    }

    /// Serialize to a transport payload.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        if self.kind != self.body.kind() {
            return Err(MessageError::KindMismatch {
                declared: self.kind,
                body: self.body.kind(),
            });
        }
        Ok(bincode::serialize(self)?)
    }

    /// Parse a transport payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let packet: DataPacket = bincode::deserialize(bytes)?;
        if packet.kind != packet.body.kind() {
            return Err(MessageError::KindMismatch {
                declared: packet.kind,
                body: packet.body.kind(),
            });
        }
        Ok(packet)
    }
}

/// Error encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// bincode failure.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Numeric type outside the known set.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// Declared type disagrees with the body.
    #[error("message declared as {declared:?} carries a {body:?} body")]
    KindMismatch {
        /// Type field.
        declared: MessageKind,
        /// Type implied by the body.
        body: MessageKind,
    },
}
