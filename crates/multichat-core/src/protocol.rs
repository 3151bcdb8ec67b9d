//! Wire codec for application events
//!
//! Maps [`Outbound`] operations to `(event name, JSON payload)` pairs and named incoming
//! events back to [`TransportEventKind`]s. Incoming payloads are not schema-validated:
//! unknown fields are ignored and missing or mistyped fields fall back to defaults.

use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ClientConfig, EventNames};
use crate::transport::{Outbound, TransportEventKind};
use crate::types::{Message, Recipient, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCodec {
    events: EventNames,
    no_recipient: String,
}

impl WireCodec {
    pub fn new(events: EventNames, no_recipient: impl Into<String>) -> Self {
        Self {
            events,
            no_recipient: no_recipient.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.events.clone(), config.no_recipient.clone())
    }

    /// Event name and payload for an outgoing operation
    pub fn encode(&self, outbound: &Outbound) -> (String, Value) {
        match outbound {
            Outbound::Identify(user) => (
                self.events.identify.clone(),
                Value::String(user.as_str().to_string()),
            ),
            Outbound::InstantMessage(message) => (
                self.events.instant_message.clone(),
                self.encode_message(message),
            ),
        }
    }

    fn encode_message(&self, message: &Message) -> Value {
        json!({
            "from": message.from.as_str(),
            "to": message.to.to_wire(&self.no_recipient),
            "text": message.text,
            "forwarded": message.forwarded,
        })
    }

    /// Decode a named event; `None` for events the client does not listen to
    pub fn decode(&self, event: &str, payload: Value) -> Option<TransportEventKind> {
        if event == self.events.instant_message {
            Some(TransportEventKind::Message(self.decode_message(&payload)))
        } else if event == self.events.update_client {
            Some(TransportEventKind::RosterUpdate(decode_roster(&payload)))
        } else {
            debug!("Ignoring unhandled event '{}'", event);
            None
        }
    }

    /// Lenient message decoding: never fails
    pub fn decode_message(&self, payload: &Value) -> Message {
        let from = payload
            .get("from")
            .map(scalar_to_string)
            .unwrap_or_default();
        let to = payload
            .get("to")
            .map(scalar_to_string)
            .map(|to| Recipient::from_wire(&to, &self.no_recipient))
            .unwrap_or_default();
        let text = match payload.get("text") {
            Some(value) => scalar_to_string(value),
            // Bare string payloads are treated as the message text
            None => payload.as_str().map(str::to_string).unwrap_or_default(),
        };
        let forwarded = payload
            .get("forwarded")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Message {
            from: UserId::from(from),
            to,
            text,
            forwarded,
            sequence: 0,
        }
    }
}

/// Roster payload `{ "list": [...] }`; entries that are not scalars are skipped
fn decode_roster(payload: &Value) -> Vec<UserId> {
    let list = payload
        .get("list")
        .or(Some(payload))
        .and_then(Value::as_array);

    match list {
        Some(entries) => entries
            .iter()
            .filter(|entry| !entry.is_array() && !entry.is_object() && !entry.is_null())
            .map(|entry| UserId::from(scalar_to_string(entry)))
            .collect(),
        None => {
            debug!("Roster update without a list: {}", payload);
            Vec::new()
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
