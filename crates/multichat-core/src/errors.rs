//! Error types for the chat core
//!
//! `ChatError` covers commands rejected locally (nothing is mutated when one is returned)
//! and failures of the transport collaborator.

use thiserror::Error;

use crate::connection_state::{ConnectionEvent, ConnectionState};
use crate::types::PortNumber;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures raised synchronously by a [`crate::Transport`] or [`crate::Connector`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid server address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("Failed to open transport to {address}: {reason}")]
    OpenFailed { address: String, reason: String },
    #[error("Transport channel closed")]
    ChannelClosed,
}

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("A user name is required")]
    MissingUser,
    #[error("A server port is required")]
    MissingPort,
    #[error("Port {port} is not one of the configured servers")]
    PortNotAllowed { port: PortNumber },
    #[error("Cannot {operation} while {state}")]
    NotDisconnected {
        operation: &'static str,
        state: ConnectionState,
    },
    #[error("Not connected")]
    NotConnected,
    #[error("No recipient selected")]
    NoRecipient,
    #[error("Message text is empty")]
    EmptyDraft,
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition {
        from: ConnectionState,
        event: ConnectionEvent,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Client task has shut down")]
    ClientClosed,
}

impl ChatError {
    /// Commands rejected by local validation, before anything touched the transport
    pub fn is_invalid_command(&self) -> bool {
        matches!(
            self,
            ChatError::MissingUser
                | ChatError::MissingPort
                | ChatError::PortNotAllowed { .. }
                | ChatError::NotDisconnected { .. }
                | ChatError::NotConnected
                | ChatError::NoRecipient
                | ChatError::EmptyDraft
                | ChatError::InvalidTransition { .. }
        )
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ChatError>;
