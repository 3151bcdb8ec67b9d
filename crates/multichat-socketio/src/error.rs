//! Error types for the Socket.IO transport

use multichat_core::TransportError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SocketIoError {
    #[error("Empty packet")]
    EmptyPacket,

    #[error("Unknown {layer} packet type '{kind}'")]
    UnknownPacketType { layer: &'static str, kind: char },

    #[error("Malformed packet payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Event packet without an event name")]
    MissingEventName,

    #[error("Unsupported URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("No async runtime available to drive the connection")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SocketIoError>;

impl SocketIoError {
    /// Convert into the core's transport error for the server at `address`
    pub fn into_transport_error(self, address: &url::Url) -> TransportError {
        match self {
            SocketIoError::UnsupportedScheme { .. } => TransportError::InvalidAddress {
                address: address.to_string(),
                reason: self.to_string(),
            },
            other => TransportError::OpenFailed {
                address: address.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
