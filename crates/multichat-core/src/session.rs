//! Session State
//!
//! The aggregate client state: identity, server selection, roster, recipient, message log,
//! draft and status line. A session is only changed through [`Action`]s.
//!
//! Reduction is split in two steps so callers never have to undo anything:
//! [`Session::plan`] validates an action and returns the side [`Effect`]s it requires, and
//! [`Session::apply`] performs the state change once those effects succeeded.
//! [`Session::reduce`] combines both as a pure function of the current state.

use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection_state::ConnectionState;
use crate::errors::{ChatError, Result};
use crate::types::{Message, PortNumber, Recipient, UserId};

// ----------------------------------------------------------------------------
// Actions and Effects
// ----------------------------------------------------------------------------

/// Everything that can change a session
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Commands from the presentation layer
    ChangeUser(String),
    ChangePort(PortNumber),
    ChangeRecipient(Recipient),
    ChangeDraft(String),
    ToggleConnection,
    Connect,
    Disconnect,
    SendMessage,

    // Notifications from the connection manager
    ConnectionChanged(bool),
    ConnectionFailed { message: String },
    MessageReceived(Message),
    RosterUpdated(Vec<UserId>),
}

/// Side effects an action requires from the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect { user: UserId, port: PortNumber },
    Disconnect,
    Send(Message),
}

/// Result of [`Session::reduce`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTransition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    user: Option<UserId>,
    port: Option<PortNumber>,
    state: ConnectionState,
    status: String,
    is_error: bool,
    recipient: Recipient,
    roster: Vec<UserId>,
    messages: Vec<Message>,
    draft: String,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            user: None,
            port: Some(config.default_port),
            state: ConnectionState::Disconnected,
            status: config.status.initial.clone(),
            is_error: false,
            recipient: Recipient::None,
            roster: Vec::new(),
            messages: Vec::new(),
            draft: String::new(),
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn port(&self) -> Option<PortNumber> {
        self.port
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// Other connected users, self excluded
    pub fn roster(&self) -> &[UserId] {
        &self.roster
    }

    /// Received messages in arrival order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Whether the connect/disconnect toggle would do anything
    pub fn can_toggle(&self) -> bool {
        !self.state.is_disconnected() || (self.user.is_some() && self.port.is_some())
    }

    // ------------------------------------------------------------------------
    // Reduction
    // ------------------------------------------------------------------------

    /// Validate `action` against the current state and list the effects it requires.
    /// Nothing is mutated.
    pub fn plan(&self, action: &Action, config: &ClientConfig) -> Result<Vec<Effect>> {
        match action {
            Action::ChangeUser(_) => {
                self.require_disconnected("change user")?;
                Ok(Vec::new())
            }
            Action::ChangePort(port) => {
                self.require_disconnected("change port")?;
                if !config.is_allowed_port(*port) {
                    return Err(ChatError::PortNotAllowed { port: *port });
                }
                Ok(Vec::new())
            }
            Action::ToggleConnection => {
                if !self.state.is_disconnected() {
                    Ok(vec![Effect::Disconnect])
                } else if self.user.is_some() && self.port.is_some() {
                    self.plan_connect(config)
                } else {
                    Ok(Vec::new())
                }
            }
            Action::Connect => self.plan_connect(config),
            Action::Disconnect => {
                if self.state.is_disconnected() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![Effect::Disconnect])
                }
            }
            Action::SendMessage => self.plan_send(),
            Action::ChangeRecipient(_)
            | Action::ChangeDraft(_)
            | Action::ConnectionChanged(_)
            | Action::ConnectionFailed { .. }
            | Action::MessageReceived(_)
            | Action::RosterUpdated(_) => Ok(Vec::new()),
        }
    }

    fn plan_connect(&self, config: &ClientConfig) -> Result<Vec<Effect>> {
        self.require_disconnected("connect")?;
        let user = match &self.user {
            Some(user) if !user.is_blank() => user.clone(),
            _ => return Err(ChatError::MissingUser),
        };
        let port = self.port.ok_or(ChatError::MissingPort)?;
        if !config.is_allowed_port(port) {
            return Err(ChatError::PortNotAllowed { port });
        }
        Ok(vec![Effect::Connect { user, port }])
    }

    fn plan_send(&self) -> Result<Vec<Effect>> {
        if !self.state.can_send_messages() {
            return Err(ChatError::NotConnected);
        }
        let to = match &self.recipient {
            Recipient::None => return Err(ChatError::NoRecipient),
            recipient => recipient.clone(),
        };
        if self.draft.trim().is_empty() {
            return Err(ChatError::EmptyDraft);
        }
        let from = self.user.clone().ok_or(ChatError::MissingUser)?;
        Ok(vec![Effect::Send(Message::outgoing(from, to, self.draft.clone()))])
    }

    fn require_disconnected(&self, operation: &'static str) -> Result<()> {
        if self.state.is_disconnected() {
            Ok(())
        } else {
            Err(ChatError::NotDisconnected {
                operation,
                state: self.state,
            })
        }
    }

    /// Perform the state change for an action that [`Session::plan`] accepted and whose
    /// effects have been carried out
    pub fn apply(&mut self, action: Action, config: &ClientConfig) {
        match action {
            Action::ChangeUser(name) => {
                self.user = if name.trim().is_empty() {
                    None
                } else {
                    Some(UserId::from(name))
                };
            }
            Action::ChangePort(port) => self.port = Some(port),
            Action::ChangeRecipient(recipient) => {
                if recipient.is_none() {
                    self.draft.clear();
                }
                self.recipient = recipient;
            }
            Action::ChangeDraft(text) => self.draft = text,
            Action::ToggleConnection => {
                if !self.state.is_disconnected() {
                    self.reset_to_disconnected(config.status.disconnected.clone(), false);
                } else if self.user.is_some() && self.port.is_some() {
                    self.begin_connecting(config);
                }
            }
            Action::Connect => self.begin_connecting(config),
            Action::Disconnect => {
                if !self.state.is_disconnected() {
                    self.reset_to_disconnected(config.status.disconnected.clone(), false);
                }
            }
            Action::SendMessage => self.draft.clear(),
            Action::ConnectionChanged(true) => {
                self.state = ConnectionState::Connected;
                self.status = config.status.connected.clone();
                self.is_error = false;
            }
            Action::ConnectionChanged(false) => {
                self.reset_to_disconnected(config.status.disconnected.clone(), false);
            }
            Action::ConnectionFailed { message } => self.reset_to_disconnected(message, true),
            Action::MessageReceived(message) => self.append_message(message),
            Action::RosterUpdated(list) => self.update_roster(list),
        }
    }

    /// Pure reduction: the next session and the effects needed to get there
    pub fn reduce(&self, action: Action, config: &ClientConfig) -> Result<SessionTransition> {
        let effects = self.plan(&action, config)?;
        let mut session = self.clone();
        session.apply(action, config);
        Ok(SessionTransition { session, effects })
    }

    fn begin_connecting(&mut self, config: &ClientConfig) {
        self.state = ConnectionState::Connecting;
        self.status = config.status.connecting.clone();
        self.is_error = false;
    }

    fn reset_to_disconnected(&mut self, status: String, is_error: bool) {
        self.state = ConnectionState::Disconnected;
        self.status = status;
        self.is_error = is_error;
        self.roster.clear();
        self.recipient = Recipient::None;
        self.draft.clear();
    }

    fn append_message(&mut self, mut message: Message) {
        message.sequence = self.messages.len() as u64;
        debug!("Message #{} from {}", message.sequence, message.from);
        self.messages.push(message);
    }

    /// Replace the roster, dropping self and duplicates, and clear a recipient that is no
    /// longer online
    fn update_roster(&mut self, list: Vec<UserId>) {
        let mut roster: Vec<UserId> = Vec::with_capacity(list.len());
        for user in list {
            if Some(&user) != self.user.as_ref() && !roster.contains(&user) {
                roster.push(user);
            }
        }
        self.roster = roster;

        if let Recipient::User(recipient) = &self.recipient {
            if !self.roster.contains(recipient) {
                debug!("Recipient {} left, clearing selection", recipient);
                self.recipient = Recipient::None;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
