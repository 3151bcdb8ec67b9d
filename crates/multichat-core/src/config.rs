//! Client Configuration
//!
//! Everything the original client kept as module-level constants (server ports, wire event
//! names, the no-recipient sentinel, status texts) is injected through [`ClientConfig`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::errors::{ChatError, Result, TransportError};
use crate::types::PortNumber;

// ----------------------------------------------------------------------------
// Wire Event Names
// ----------------------------------------------------------------------------

/// Names of the application events exchanged with the server
///
/// Lifecycle events (`connect`, `disconnect`, `connect_error`, `reconnect_error`) are
/// reserved by the transport and are not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventNames {
    /// Client → server handshake carrying the user name
    pub identify: String,
    /// Instant message, both directions
    pub instant_message: String,
    /// Server → client roster push, payload `{ "list": [...] }`
    pub update_client: String,
}

impl Default for EventNames {
    fn default() -> Self {
        Self {
            identify: "identify".to_string(),
            instant_message: "im".to_string(),
            update_client: "update_client".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Status Texts
// ----------------------------------------------------------------------------

/// User-visible status lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTexts {
    pub initial: String,
    pub connecting: String,
    pub connected: String,
    pub disconnected: String,
}

impl Default for StatusTexts {
    fn default() -> Self {
        Self {
            initial: "Select a user and port.".to_string(),
            connecting: "Connecting...".to_string(),
            connected: "Connected".to_string(),
            disconnected: "Disconnected".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the client task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for commands (presentation → client task)
    pub command_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL scheme of the chat servers
    pub scheme: String,
    /// Host all server instances listen on
    pub host: String,
    /// Ports a user may pick from, in display order
    pub ports: Vec<PortNumber>,
    /// Port preselected for a fresh session
    pub default_port: PortNumber,
    /// Wire value of the "no recipient selected" sentinel
    pub no_recipient: String,
    pub events: EventNames,
    pub status: StatusTexts,
    pub channels: ChannelConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            ports: vec![3001, 3002, 3003, 3004],
            default_port: 3001,
            no_recipient: String::new(),
            events: EventNames::default(),
            status: StatusTexts::default(),
            channels: ChannelConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn is_allowed_port(&self, port: PortNumber) -> bool {
        self.ports.contains(&port)
    }

    /// Address of the server instance listening on `port`
    pub fn server_url(&self, port: PortNumber) -> std::result::Result<Url, TransportError> {
        let address = format!("{}://{}:{}", self.scheme, self.host, port);
        Url::parse(&address).map_err(|e| TransportError::InvalidAddress {
            address,
            reason: e.to_string(),
        })
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(ChatError::Config("at least one server port is required".into()));
        }
        if !self.is_allowed_port(self.default_port) {
            return Err(ChatError::Config(format!(
                "default port {} is not in the port list",
                self.default_port
            )));
        }
        if self.host.trim().is_empty() {
            return Err(ChatError::Config("host must not be empty".into()));
        }

        let names = [
            &self.events.identify,
            &self.events.instant_message,
            &self.events.update_client,
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(ChatError::Config("event names must not be empty".into()));
        }
        let distinct: HashSet<&String> = names.iter().copied().collect();
        if distinct.len() != names.len() {
            return Err(ChatError::Config("event names must be distinct".into()));
        }

        for port in &self.ports {
            self.server_url(*port)?;
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
