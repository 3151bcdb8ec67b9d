//! Multichat Core
//!
//! Connection and session state machine for a chat client that talks to one of several
//! independent chat servers. The crate owns the transport lifecycle (connect, identify,
//! disconnect, error recovery), roster reconciliation, and the ordered message log.
//! Rendering is left to whatever observes the published [`Session`] snapshots.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod client;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use client::{ChatClient, ClientHandle, ClientTask};
pub use config::{ChannelConfig, ClientConfig, EventNames, StatusTexts};
pub use connection::{ConnectionManager, ConnectionStats};
pub use connection_state::{ConnectionEvent, ConnectionState};
pub use errors::{ChatError, Result, TransportError};
pub use protocol::WireCodec;
pub use session::{Action, Effect, Session, SessionTransition};
pub use transport::{
    create_event_channel, Connector, EventReceiver, EventSender, HandleId, Outbound, Transport,
    TransportErrorKind, TransportEvent, TransportEventKind,
};
pub use types::{Message, PortNumber, Recipient, UserId};
