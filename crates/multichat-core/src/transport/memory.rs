//! In-memory transport
//!
//! Test double for the [`Connector`]/[`Transport`] pair. Every open, emission and close is
//! recorded in shared state, and events can be fired into any handle that was ever opened,
//! including retired ones, to simulate events already in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

use super::{Connector, EventSender, HandleId, Outbound, Transport, TransportEvent, TransportEventKind};
use crate::errors::TransportError;

#[derive(Debug, Default)]
struct MemoryState {
    opened: Vec<(HandleId, Url)>,
    emitted: Vec<(HandleId, Outbound)>,
    closed: Vec<HandleId>,
    senders: HashMap<HandleId, EventSender>,
    fail_next_open: Option<String>,
}

// ----------------------------------------------------------------------------
// Memory Connector
// ----------------------------------------------------------------------------

/// Cloneable connector; clones share the same recorded state
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `open` fail with `reason`
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.lock().fail_next_open = Some(reason.into());
    }

    /// Addresses opened so far, in order
    pub fn opened(&self) -> Vec<(HandleId, Url)> {
        self.lock().opened.clone()
    }

    pub fn last_handle(&self) -> Option<HandleId> {
        self.lock().opened.last().map(|(handle, _)| *handle)
    }

    /// Everything emitted on any handle, in order
    pub fn emitted(&self) -> Vec<(HandleId, Outbound)> {
        self.lock().emitted.clone()
    }

    pub fn emitted_by(&self, handle: HandleId) -> Vec<Outbound> {
        self.lock()
            .emitted
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn is_closed(&self, handle: HandleId) -> bool {
        self.lock().closed.contains(&handle)
    }

    pub fn close_count(&self, handle: HandleId) -> usize {
        self.lock().closed.iter().filter(|h| **h == handle).count()
    }

    /// Deliver an event as if `handle` had produced it. Returns false when the receiving
    /// side of the event channel is gone.
    pub fn fire(&self, handle: HandleId, kind: TransportEventKind) -> bool {
        let sender = self.lock().senders.get(&handle).cloned();
        match sender {
            Some(sender) => sender.send(TransportEvent::new(handle, kind)).is_ok(),
            None => false,
        }
    }
}

impl Connector for MemoryConnector {
    fn open(
        &self,
        address: &Url,
        handle: HandleId,
        events: EventSender,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.lock();
        if let Some(reason) = state.fail_next_open.take() {
            return Err(TransportError::OpenFailed {
                address: address.to_string(),
                reason,
            });
        }

        debug!("Memory transport {} opened for {}", handle, address);
        state.opened.push((handle, address.clone()));
        state.senders.insert(handle, events);

        Ok(Box::new(MemoryTransport {
            handle,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryTransport {
    handle: HandleId,
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl Transport for MemoryTransport {
    fn handle(&self) -> HandleId {
        self.handle
    }

    fn emit(&mut self, message: Outbound) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emitted
            .push((self.handle, message));
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
            .push(self.handle);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::create_event_channel;
    use crate::types::UserId;

    #[test]
    fn test_records_emissions_and_close() {
        let connector = MemoryConnector::new();
        let (tx, _rx) = create_event_channel();
        let url = Url::parse("http://localhost:3001").unwrap();
        let handle = HandleId::new(1);

        let mut transport = connector.open(&url, handle, tx).unwrap();
        transport
            .emit(Outbound::Identify(UserId::from("alice")))
            .unwrap();
        transport.close();
        transport.close();

        assert_eq!(connector.opened(), vec![(handle, url)]);
        assert_eq!(
            connector.emitted_by(handle),
            vec![Outbound::Identify(UserId::from("alice"))]
        );
        assert_eq!(connector.close_count(handle), 1);
        assert_eq!(
            transport.emit(Outbound::Identify(UserId::from("alice"))),
            Err(TransportError::ChannelClosed)
        );
    }

    #[test]
    fn test_fire_delivers_tagged_events() {
        let connector = MemoryConnector::new();
        let (tx, mut rx) = create_event_channel();
        let url = Url::parse("http://localhost:3001").unwrap();
        let handle = HandleId::new(7);
        let _transport = connector.open(&url, handle, tx).unwrap();

        assert!(connector.fire(handle, TransportEventKind::Connected));
        assert!(!connector.fire(HandleId::new(8), TransportEventKind::Connected));

        let event = rx.try_recv().unwrap();
        assert_eq!(event, TransportEvent::new(handle, TransportEventKind::Connected));
    }

    #[test]
    fn test_fail_next_open() {
        let connector = MemoryConnector::new();
        connector.fail_next_open("refused");
        let (tx, _rx) = create_event_channel();
        let url = Url::parse("http://localhost:3001").unwrap();

        let result = connector.open(&url, HandleId::new(1), tx.clone());
        assert!(matches!(result, Err(TransportError::OpenFailed { .. })));
        assert!(connector.open(&url, HandleId::new(2), tx).is_ok());
    }
}
