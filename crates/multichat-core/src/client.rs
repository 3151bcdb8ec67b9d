//! Chat client
//!
//! [`ChatClient`] ties a [`Session`] to a [`ConnectionManager`] and publishes a snapshot
//! after every change. [`ClientTask`] runs a client on a single task, serializing commands
//! and transport events; [`ClientHandle`] is the cloneable command interface to it.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::errors::{ChatError, Result};
use crate::session::{Action, Effect, Session};
use crate::transport::{create_event_channel, Connector, EventReceiver, EventSender, TransportEvent};
use crate::types::{PortNumber, Recipient};

// ----------------------------------------------------------------------------
// Chat Client
// ----------------------------------------------------------------------------

pub struct ChatClient<C: Connector> {
    config: ClientConfig,
    session: Session,
    manager: ConnectionManager<C>,
    snapshots: watch::Sender<Session>,
}

impl<C: Connector> ChatClient<C> {
    /// Create a client whose transports deliver events on `events`
    pub fn new(config: ClientConfig, connector: C, events: EventSender) -> Self {
        let session = Session::new(&config);
        let (snapshots, _) = watch::channel(session.clone());
        let manager = ConnectionManager::new(config.clone(), connector, events);

        Self {
            config,
            session,
            manager,
            snapshots,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receive a snapshot after every accepted change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshots.subscribe()
    }

    /// Run a command. Rejected commands leave the session untouched.
    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        let effects = match self.session.plan(&action, &self.config) {
            Ok(effects) => effects,
            Err(e) => {
                warn!("Rejected {:?}: {}", action, e);
                return Err(e);
            }
        };

        for effect in effects {
            self.execute(effect)?;
        }

        self.session.apply(action, &self.config);
        self.publish();
        Ok(())
    }

    fn execute(&mut self, effect: Effect) -> Result<()> {
        match effect {
            Effect::Connect { user, port } => match self.manager.connect(&user, port) {
                Ok(_) => Ok(()),
                Err(ChatError::Transport(e)) => {
                    // Could not even open a transport: report like a connect error
                    warn!("Failed to open transport: {}", e);
                    self.session.apply(
                        Action::ConnectionFailed {
                            message: e.to_string(),
                        },
                        &self.config,
                    );
                    self.publish();
                    Err(ChatError::Transport(e))
                }
                Err(e) => Err(e),
            },
            Effect::Disconnect => {
                self.manager.disconnect();
                Ok(())
            }
            Effect::Send(message) => self.manager.send_message(&message),
        }
    }

    /// Feed an event from a transport through the connection manager into the session
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let actions = self.manager.handle_event(event);
        if actions.is_empty() {
            return;
        }
        for action in actions {
            debug!("Applying {:?}", action);
            self.session.apply(action, &self.config);
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.clone());
    }

    pub fn change_user(&mut self, user: impl Into<String>) -> Result<()> {
        self.dispatch(Action::ChangeUser(user.into()))
    }

    pub fn change_port(&mut self, port: PortNumber) -> Result<()> {
        self.dispatch(Action::ChangePort(port))
    }

    pub fn change_recipient(&mut self, recipient: Recipient) -> Result<()> {
        self.dispatch(Action::ChangeRecipient(recipient))
    }

    pub fn change_draft(&mut self, text: impl Into<String>) -> Result<()> {
        self.dispatch(Action::ChangeDraft(text.into()))
    }

    pub fn toggle_connection(&mut self) -> Result<()> {
        self.dispatch(Action::ToggleConnection)
    }

    pub fn connect(&mut self) -> Result<()> {
        self.dispatch(Action::Connect)
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.dispatch(Action::Disconnect)
    }

    pub fn send_message(&mut self) -> Result<()> {
        self.dispatch(Action::SendMessage)
    }
}

// ----------------------------------------------------------------------------
// Client Task
// ----------------------------------------------------------------------------

enum Request {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Owns a [`ChatClient`] and processes commands and transport events one at a time
pub struct ClientTask<C: Connector> {
    client: ChatClient<C>,
    requests: mpsc::Receiver<Request>,
    events: EventReceiver,
}

impl<C: Connector> ClientTask<C> {
    pub fn new(config: ClientConfig, connector: C) -> (Self, ClientHandle) {
        let (event_sender, events) = create_event_channel();
        let (request_sender, requests) = mpsc::channel(config.channels.command_buffer_size.max(1));
        let client = ChatClient::new(config, connector, event_sender);
        let handle = ClientHandle {
            requests: request_sender,
            snapshots: client.subscribe(),
        };

        (
            Self {
                client,
                requests,
                events,
            },
            handle,
        )
    }

    /// Run until shutdown is requested or every handle is dropped. Returns the client so
    /// its final state can be inspected.
    pub async fn run(mut self) -> ChatClient<C> {
        info!("Client task started");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(Request::Dispatch { action, reply }) => {
                        let result = self.client.dispatch(action);
                        if reply.send(result).is_err() {
                            debug!("Command caller went away before the reply");
                        }
                    }
                    Some(Request::Shutdown) | None => break,
                },
                Some(event) = self.events.recv() => {
                    self.client.handle_transport_event(event);
                }
            }
        }

        if let Err(e) = self.client.disconnect() {
            warn!("Disconnect on shutdown failed: {}", e);
        }
        info!("Client task stopped");
        self.client
    }
}

// ----------------------------------------------------------------------------
// Client Handle
// ----------------------------------------------------------------------------

/// Command interface to a running [`ClientTask`]
#[derive(Clone)]
pub struct ClientHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<Session>,
}

impl ClientHandle {
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Dispatch { action, reply })
            .await
            .map_err(|_| ChatError::ClientClosed)?;
        response.await.map_err(|_| ChatError::ClientClosed)?
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshots.clone()
    }

    /// Latest published session
    pub fn snapshot(&self) -> Session {
        self.snapshots.borrow().clone()
    }

    pub async fn change_user(&self, user: impl Into<String>) -> Result<()> {
        self.dispatch(Action::ChangeUser(user.into())).await
    }

    pub async fn change_port(&self, port: PortNumber) -> Result<()> {
        self.dispatch(Action::ChangePort(port)).await
    }

    pub async fn change_recipient(&self, recipient: Recipient) -> Result<()> {
        self.dispatch(Action::ChangeRecipient(recipient)).await
    }

    pub async fn change_draft(&self, text: impl Into<String>) -> Result<()> {
        self.dispatch(Action::ChangeDraft(text.into())).await
    }

    pub async fn toggle_connection(&self) -> Result<()> {
        self.dispatch(Action::ToggleConnection).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.dispatch(Action::Connect).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.dispatch(Action::Disconnect).await
    }

    pub async fn send_message(&self) -> Result<()> {
        self.dispatch(Action::SendMessage).await
    }

    /// Stop the task, closing any live transport
    pub async fn shutdown(&self) -> Result<()> {
        self.requests
            .send(Request::Shutdown)
            .await
            .map_err(|_| ChatError::ClientClosed)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
