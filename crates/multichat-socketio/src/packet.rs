//! Engine.IO and Socket.IO packet framing
//!
//! Engine.IO frames are a single type digit followed by a payload. A Socket.IO packet rides
//! inside an Engine.IO `message` frame: type digit, optional namespace terminated by `,`,
//! optional ack id, then JSON data. For example `42["im",{...}]` is an Engine.IO message
//! carrying a Socket.IO event on the default namespace.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SocketIoError};

// ----------------------------------------------------------------------------
// Engine.IO
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn parse(frame: &str) -> Result<Self> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(SocketIoError::EmptyPacket)?;
        let data = chars.as_str().to_string();

        match kind {
            '0' => Ok(EnginePacket::Open(data)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data)),
            '3' => Ok(EnginePacket::Pong(data)),
            '4' => Ok(EnginePacket::Message(data)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(SocketIoError::UnknownPacketType {
                layer: "Engine.IO",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Payload of the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// How long the connection may stay silent before the server is considered gone
    pub fn heartbeat_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

// ----------------------------------------------------------------------------
// Socket.IO
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, payload: Value },
    Ack(Value),
    ConnectError(Value),
}

impl SocketPacket {
    /// Parse the body of an Engine.IO message frame. Binary packets are not supported.
    pub fn parse(data: &str) -> Result<Self> {
        let mut chars = data.chars();
        let kind = chars.next().ok_or(SocketIoError::EmptyPacket)?;
        let body = skip_ack_id(skip_namespace(chars.as_str()));

        match kind {
            '0' => Ok(SocketPacket::Connect(parse_optional(body)?)),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut items = match serde_json::from_str(body)? {
                    Value::Array(items) => items.into_iter(),
                    _ => return Err(SocketIoError::MissingEventName),
                };
                let name = match items.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(SocketIoError::MissingEventName),
                };
                let payload = items.next().unwrap_or(Value::Null);
                Ok(SocketPacket::Event { name, payload })
            }
            '3' => Ok(SocketPacket::Ack(
                parse_optional(body)?.unwrap_or(Value::Null),
            )),
            '4' => Ok(SocketPacket::ConnectError(
                parse_optional(body)?.unwrap_or(Value::Null),
            )),
            other => Err(SocketIoError::UnknownPacketType {
                layer: "Socket.IO",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            SocketPacket::Ack(data) => format!("3{}", Value::Array(vec![data.clone()])),
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    /// Engine.IO frame carrying this packet
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Human-readable reason from a connect error payload (`{"message": ...}` or a bare string)
pub fn connect_error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(index) => &body[index + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_optional(body: &str) -> Result<Option<Value>> {
    if body.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_str(body)?))
    }
}
