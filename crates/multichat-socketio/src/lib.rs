//! Socket.IO transport for the multichat client
//!
//! Implements [`multichat_core::Connector`] over Engine.IO v4 and the Socket.IO v5 packet
//! format on a plain WebSocket, using `tokio-tungstenite`. Only the default namespace and
//! text packets are supported.

pub mod config;
pub mod error;
pub mod packet;
pub mod transport;

pub use config::SocketIoConfig;
pub use error::{Result, SocketIoError};
pub use packet::{EnginePacket, Handshake, SocketPacket};
pub use transport::{SocketIoConnector, SocketIoTransport};
