//! Transport abstraction
//!
//! A transport is an ordered, bidirectional event channel to one server instance. The core
//! never talks to a socket library directly: a [`Connector`] opens a [`Transport`] handle for
//! an address, and everything the transport observes comes back as [`TransportEvent`]s on a
//! channel, tagged with the handle that produced them.

use std::fmt;
use tokio::sync::mpsc;
use url::Url;

use crate::errors::TransportError;
use crate::types::{Message, UserId};

pub mod memory;

pub use memory::{MemoryConnector, MemoryTransport};

// ----------------------------------------------------------------------------
// Handle Identity
// ----------------------------------------------------------------------------

/// Identity of one opened transport
///
/// Identities are never reused, so an event from a retired handle can always be told apart
/// from an event of the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Which lifecycle error the transport reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// `connect_error`
    Connect,
    /// `reconnect_error`
    Reconnect,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Connect => f.write_str("connect_error"),
            TransportErrorKind::Reconnect => f.write_str("reconnect_error"),
        }
    }
}

/// Events a transport delivers to the client
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// `connect`: the server acknowledged the connection
    Connected,
    /// `disconnect`
    Disconnected { reason: String },
    /// `connect_error` / `reconnect_error`
    Error {
        kind: TransportErrorKind,
        message: String,
    },
    /// `im`
    Message(Message),
    /// `update_client`
    RosterUpdate(Vec<UserId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub handle: HandleId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(handle: HandleId, kind: TransportEventKind) -> Self {
        Self { handle, kind }
    }
}

/// Operations the client emits to the server
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// `identify`
    Identify(UserId),
    /// `im`
    InstantMessage(Message),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the channel transports deliver their events on
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// A live handle to one server instance
///
/// Neither method blocks: emissions are queued for the transport's writer.
pub trait Transport: Send {
    fn handle(&self) -> HandleId;

    /// Queue an outgoing operation
    fn emit(&mut self, message: Outbound) -> Result<(), TransportError>;

    /// Close the handle; calling it again is a no-op
    fn close(&mut self);
}

/// Opens transports
pub trait Connector: Send + 'static {
    /// Open a transport to `address`. Everything it observes must be delivered on `events`
    /// tagged with `handle`, in the order it happened.
    fn open(
        &self,
        address: &Url,
        handle: HandleId,
        events: EventSender,
    ) -> Result<Box<dyn Transport>, TransportError>;
}
