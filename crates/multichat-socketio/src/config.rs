//! Configuration for the Socket.IO transport

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SocketIoError};

/// Engine.IO protocol revision spoken by this transport
pub const ENGINE_IO_VERSION: u8 = 4;

// ----------------------------------------------------------------------------
// Socket.IO Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketIoConfig {
    /// Server path the Engine.IO endpoint is mounted on
    pub path: String,
    /// Drop the connection when the server stops pinging
    pub heartbeat_timeout: bool,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            path: "/socket.io/".to_string(),
            heartbeat_timeout: true,
        }
    }
}

impl SocketIoConfig {
    /// WebSocket endpoint for a server address: `http://h:p` becomes
    /// `ws://h:p/socket.io/?EIO=4&transport=websocket`
    pub fn endpoint(&self, server: &Url) -> Result<Url> {
        let scheme = match server.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(SocketIoError::UnsupportedScheme {
                    scheme: other.to_string(),
                })
            }
        };

        let mut endpoint = server.clone();
        endpoint
            .set_scheme(scheme)
            .map_err(|()| SocketIoError::UnsupportedScheme {
                scheme: server.scheme().to_string(),
            })?;

        let path = if self.path.ends_with('/') {
            self.path.clone()
        } else {
            format!("{}/", self.path)
        };
        endpoint.set_path(&path);
        endpoint.set_query(Some(&format!(
            "EIO={}&transport=websocket",
            ENGINE_IO_VERSION
        )));
        endpoint.set_fragment(None);
        Ok(endpoint)
    }
}
