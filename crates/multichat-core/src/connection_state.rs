//! Connection State Machine
//!
//! `Disconnected → Connecting → Connected → Disconnected`. Errors are not a resting state:
//! they are reported and fold straight back to `Disconnected`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ChatError;

// ----------------------------------------------------------------------------
// Connection State Types
// ----------------------------------------------------------------------------

/// Lifecycle state of the single transport a session may hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport handle exists
    #[default]
    Disconnected,
    /// Transport opened, waiting for the server to acknowledge
    Connecting,
    /// Acknowledged and identified
    Connected,
}

/// Events that drive [`ConnectionState::transition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// A transport was opened for a server
    Open,
    /// The transport reported connect-success
    Acknowledged,
    /// The transport went away, or the user disconnected
    Closed,
    /// The transport reported a connect or reconnect error
    Failed,
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl ConnectionState {
    /// Get current state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }

    /// Process an event and move to the next state (consumes self)
    pub fn transition(self, event: ConnectionEvent) -> Result<ConnectionState, ChatError> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, Open) => Ok(Connecting),
            (Connecting, Acknowledged) => Ok(Connected),
            (Connecting | Connected, Closed | Failed) => Ok(Disconnected),
            (from, event) => Err(ChatError::InvalidTransition { from, event }),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Only an identified connection may carry instant messages
    pub fn can_send_messages(&self) -> bool {
        self.is_connected()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionEvent::Open => "open",
            ConnectionEvent::Acknowledged => "acknowledged",
            ConnectionEvent::Closed => "closed",
            ConnectionEvent::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
