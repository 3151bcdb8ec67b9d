//! Connection management
//!
//! The [`ConnectionManager`] owns at most one live transport handle. It turns session
//! commands into transport operations and transport events into session [`Action`]s.

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::connection_state::{ConnectionEvent, ConnectionState};
use crate::errors::{ChatError, Result};
use crate::session::Action;
use crate::transport::{
    Connector, EventSender, HandleId, Outbound, Transport, TransportEvent, TransportEventKind,
};
use crate::types::{Message, PortNumber, UserId};

// ----------------------------------------------------------------------------
// Active Transport
// ----------------------------------------------------------------------------

/// The one transport handle the manager currently holds
struct ActiveTransport {
    transport: Box<dyn Transport>,
    user: UserId,
    address: Url,
    /// Message and roster listeners are only registered once the handle is identified
    session_listeners: bool,
}

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

/// Connection statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub transports_opened: u64,
    pub identifications_sent: u64,
    pub messages_sent: u64,
    pub stale_events_ignored: u64,
}

/// Drives the connection state machine for a single session
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: ClientConfig,
    events: EventSender,
    state: ConnectionState,
    active: Option<ActiveTransport>,
    next_handle: u64,
    stats: ConnectionStats,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager whose transports deliver their events on `events`
    pub fn new(config: ClientConfig, connector: C, events: EventSender) -> Self {
        Self {
            connector,
            config,
            events,
            state: ConnectionState::Disconnected,
            active: None,
            next_handle: 1,
            stats: ConnectionStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handle identity of the live transport, if any
    pub fn active_handle(&self) -> Option<HandleId> {
        self.active.as_ref().map(|active| active.transport.handle())
    }

    pub fn statistics(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Open a transport to the server on `port` and start connecting
    pub fn connect(&mut self, user: &UserId, port: PortNumber) -> Result<HandleId> {
        if user.is_blank() {
            return Err(ChatError::MissingUser);
        }
        if !self.config.is_allowed_port(port) {
            return Err(ChatError::PortNotAllowed { port });
        }
        if !self.state.is_disconnected() {
            return Err(ChatError::NotDisconnected {
                operation: "connect",
                state: self.state,
            });
        }

        let next_state = self.state.transition(ConnectionEvent::Open)?;
        let address = self.config.server_url(port)?;
        let handle = HandleId::new(self.next_handle);

        let transport = self
            .connector
            .open(&address, handle, self.events.clone())?;

        self.next_handle += 1;
        self.stats.transports_opened += 1;
        info!("Connecting to {} as {} (transport {})", address, user, handle);

        self.active = Some(ActiveTransport {
            transport,
            user: user.clone(),
            address,
            session_listeners: false,
        });
        self.state = next_state;
        Ok(handle)
    }

    /// Emit an instant message; only valid while connected
    pub fn send_message(&mut self, message: &Message) -> Result<()> {
        if !self.state.can_send_messages() {
            return Err(ChatError::NotConnected);
        }
        let active = self.active.as_mut().ok_or(ChatError::NotConnected)?;

        active
            .transport
            .emit(Outbound::InstantMessage(message.clone()))?;
        self.stats.messages_sent += 1;
        debug!("Sent message to {}", message.to);
        Ok(())
    }

    /// Close the transport if one exists. Returns false when there was nothing to close.
    pub fn disconnect(&mut self) -> bool {
        if self.active.is_none() {
            debug!("Disconnect requested while already disconnected");
            return false;
        }
        info!("Disconnecting");
        self.retire(ConnectionEvent::Closed);
        true
    }

    /// Process an event from a transport. Events from any handle other than the live one
    /// are dropped.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<Action> {
        let listening = match self.active.as_ref() {
            Some(active) if active.transport.handle() == event.handle => active.session_listeners,
            _ => {
                self.ignore_stale(&event);
                return Vec::new();
            }
        };

        match event.kind {
            TransportEventKind::Connected => self.on_connected(),
            TransportEventKind::Disconnected { reason } => {
                info!("Transport {} disconnected: {}", event.handle, reason);
                self.retire(ConnectionEvent::Closed);
                vec![Action::ConnectionChanged(false)]
            }
            TransportEventKind::Error { kind, message } => {
                warn!("Transport {} reported {}: {}", event.handle, kind, message);
                self.retire(ConnectionEvent::Failed);
                vec![Action::ConnectionFailed { message }]
            }
            TransportEventKind::Message(message) if listening => {
                vec![Action::MessageReceived(message)]
            }
            TransportEventKind::RosterUpdate(list) if listening => {
                vec![Action::RosterUpdated(list)]
            }
            other => {
                debug!("No listener for {:?} while {}", other, self.state);
                Vec::new()
            }
        }
    }

    /// Connect-success: identify first, then register the session listeners
    fn on_connected(&mut self) -> Vec<Action> {
        let next_state = match self.state.transition(ConnectionEvent::Acknowledged) {
            Ok(state) => state,
            Err(e) => {
                debug!("Ignoring repeated connect acknowledgement: {}", e);
                return Vec::new();
            }
        };
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };

        if let Err(e) = active
            .transport
            .emit(Outbound::Identify(active.user.clone()))
        {
            warn!("Failed to identify on {}: {}", active.address, e);
            self.retire(ConnectionEvent::Failed);
            return vec![Action::ConnectionFailed {
                message: e.to_string(),
            }];
        }

        self.stats.identifications_sent += 1;
        active.session_listeners = true;
        self.state = next_state;
        info!("Connected to {} as {}", active.address, active.user);
        vec![Action::ConnectionChanged(true)]
    }

    /// Close and drop the live handle, detaching all of its listeners
    fn retire(&mut self, event: ConnectionEvent) {
        if let Some(mut active) = self.active.take() {
            active.transport.close();
        }
        self.state = match self.state.transition(event) {
            Ok(state) => state,
            Err(e) => {
                debug!("{}", e);
                ConnectionState::Disconnected
            }
        };
    }

    fn ignore_stale(&mut self, event: &TransportEvent) {
        self.stats.stale_events_ignored += 1;
        debug!("Ignoring event from retired transport {}", event.handle);
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.transport.close();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{create_event_channel, EventReceiver, MemoryConnector, TransportErrorKind};
    use crate::types::Recipient;

    fn manager() -> (ConnectionManager<MemoryConnector>, MemoryConnector, EventReceiver) {
        let connector = MemoryConnector::new();
        let (tx, rx) = create_event_channel();
        let manager = ConnectionManager::new(ClientConfig::default(), connector.clone(), tx);
        (manager, connector, rx)
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[test]
    fn test_connect_opens_transport() {
        let (mut manager, connector, _rx) = manager();
        let handle = manager.connect(&alice(), 3002).unwrap();

        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.active_handle(), Some(handle));
        let opened = connector.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].1.as_str(), "http://localhost:3002/");
        // Nothing is emitted before the server acknowledges
        assert!(connector.emitted().is_empty());
    }

    #[test]
    fn test_connect_preconditions() {
        let (mut manager, connector, _rx) = manager();

        assert_eq!(manager.connect(&UserId::from(""), 3001), Err(ChatError::MissingUser));
        assert_eq!(
            manager.connect(&alice(), 8080),
            Err(ChatError::PortNotAllowed { port: 8080 })
        );
        assert!(connector.opened().is_empty());

        manager.connect(&alice(), 3001).unwrap();
        assert!(matches!(
            manager.connect(&alice(), 3001),
            Err(ChatError::NotDisconnected { .. })
        ));
        assert_eq!(connector.opened().len(), 1);
    }

    #[test]
    fn test_open_failure_leaves_state_untouched() {
        let (mut manager, connector, _rx) = manager();
        connector.fail_next_open("refused");

        assert!(matches!(
            manager.connect(&alice(), 3001),
            Err(ChatError::Transport(_))
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.active_handle(), None);
    }

    #[test]
    fn test_acknowledgement_identifies_once() {
        let (mut manager, connector, _rx) = manager();
        let handle = manager.connect(&alice(), 3001).unwrap();

        let actions = manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));
        assert_eq!(actions, vec![Action::ConnectionChanged(true)]);
        assert_eq!(manager.state(), ConnectionState::Connected);

        // A repeated acknowledgement must not identify again
        let actions = manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));
        assert!(actions.is_empty());
        assert_eq!(connector.emitted_by(handle), vec![Outbound::Identify(alice())]);
    }

    #[test]
    fn test_session_listeners_registered_after_identify() {
        let (mut manager, _connector, _rx) = manager();
        let handle = manager.connect(&alice(), 3001).unwrap();
        let roster = TransportEventKind::RosterUpdate(vec![UserId::from("bob")]);

        assert!(manager
            .handle_event(TransportEvent::new(handle, roster.clone()))
            .is_empty());

        manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));
        assert_eq!(
            manager.handle_event(TransportEvent::new(handle, roster)),
            vec![Action::RosterUpdated(vec![UserId::from("bob")])]
        );
    }

    #[test]
    fn test_error_closes_transport() {
        let (mut manager, connector, _rx) = manager();
        let handle = manager.connect(&alice(), 3001).unwrap();

        let actions = manager.handle_event(TransportEvent::new(
            handle,
            TransportEventKind::Error {
                kind: TransportErrorKind::Connect,
                message: "xhr poll error".to_string(),
            },
        ));

        assert_eq!(
            actions,
            vec![Action::ConnectionFailed {
                message: "xhr poll error".to_string()
            }]
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(handle));
        assert_eq!(manager.active_handle(), None);

        // Late events from the closed handle are ignored
        let actions = manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));
        assert!(actions.is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.statistics().stale_events_ignored, 1);
    }

    #[test]
    fn test_stale_handle_ignored_after_reconnect() {
        let (mut manager, connector, _rx) = manager();
        let first = manager.connect(&alice(), 3001).unwrap();
        assert!(manager.disconnect());
        let second = manager.connect(&alice(), 3002).unwrap();
        assert_ne!(first, second);
        assert!(connector.is_closed(first));

        let actions = manager.handle_event(TransportEvent::new(first, TransportEventKind::Connected));
        assert!(actions.is_empty());
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_send_requires_connection() {
        let (mut manager, connector, _rx) = manager();
        let message = Message::outgoing(alice(), Recipient::User(UserId::from("bob")), "hi");

        assert_eq!(manager.send_message(&message), Err(ChatError::NotConnected));
        let handle = manager.connect(&alice(), 3001).unwrap();
        assert_eq!(manager.send_message(&message), Err(ChatError::NotConnected));
        assert!(connector.emitted().is_empty());

        manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));
        manager.send_message(&message).unwrap();
        assert_eq!(
            connector.emitted_by(handle),
            vec![Outbound::Identify(alice()), Outbound::InstantMessage(message)]
        );
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (mut manager, connector, _rx) = manager();
        assert!(!manager.disconnect());

        let handle = manager.connect(&alice(), 3001).unwrap();
        assert!(manager.disconnect());
        assert!(!manager.disconnect());
        assert_eq!(connector.close_count(handle), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_server_disconnect() {
        let (mut manager, connector, _rx) = manager();
        let handle = manager.connect(&alice(), 3001).unwrap();
        manager.handle_event(TransportEvent::new(handle, TransportEventKind::Connected));

        let actions = manager.handle_event(TransportEvent::new(
            handle,
            TransportEventKind::Disconnected {
                reason: "io server disconnect".to_string(),
            },
        ));
        assert_eq!(actions, vec![Action::ConnectionChanged(false)]);
        assert!(connector.is_closed(handle));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
