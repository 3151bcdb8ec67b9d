//! Core value types shared by the session and transport layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// TCP port that addresses one chat server instance
pub type PortNumber = u16;

// ----------------------------------------------------------------------------
// User Identity
// ----------------------------------------------------------------------------

/// Name a user announces to the server when identifying
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank names (empty or whitespace only) cannot identify a session
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for UserId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ----------------------------------------------------------------------------
// Recipient Selection
// ----------------------------------------------------------------------------

/// Target of outgoing messages
///
/// `None` is the "no recipient selected" sentinel. On the wire it is written as the
/// configured sentinel string (see [`crate::ClientConfig::no_recipient`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    #[default]
    None,
    User(UserId),
}

impl Recipient {
    /// Decode a wire value, mapping the sentinel (and the empty string) to `None`
    pub fn from_wire(value: &str, sentinel: &str) -> Self {
        if value == sentinel || value.is_empty() {
            Recipient::None
        } else {
            Recipient::User(UserId::from(value))
        }
    }

    pub fn to_wire(&self, sentinel: &str) -> String {
        match self {
            Recipient::None => sentinel.to_string(),
            Recipient::User(user) => user.as_str().to_string(),
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        match self {
            Recipient::None => None,
            Recipient::User(user) => Some(user),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Recipient::None)
    }
}

impl From<UserId> for Recipient {
    fn from(user: UserId) -> Self {
        Recipient::User(user)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::None => f.write_str("(none)"),
            Recipient::User(user) => write!(f, "{}", user),
        }
    }
}

// ----------------------------------------------------------------------------
// Instant Message
// ----------------------------------------------------------------------------

/// An instant message as held in the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: UserId,
    pub to: Recipient,
    pub text: String,
    /// Set by the server when the message was relayed from another server instance
    pub forwarded: bool,
    /// Assigned locally on append; never sent over the wire
    pub sequence: u64,
}

impl Message {
    /// Build an outgoing message; `sequence` is only meaningful once received
    pub fn outgoing(from: UserId, to: Recipient, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
            forwarded: false,
            sequence: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
