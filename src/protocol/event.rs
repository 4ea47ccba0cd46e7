//! Event envelope and wire codec.
//!
//! Every WebSocket text frame carries exactly one envelope.
//!
//! # Format
//!
//! ```json
//! {
//!   "type": "send_message",
//!   "payload": { "message": "hi", "from": "percy" }
//! }
//! ```
//!
//! # Event Types
//!
//! | Tag | Direction | Payload |
//! |-----|-----------|---------|
//! | `send_message` | Client → Hub | [`SendMessage`](super::SendMessage) |
//! | `new_message` | Hub → Client | [`NewMessage`](super::NewMessage) |
//! | `change_room` | Client → Hub | [`ChangeRoom`](super::ChangeRoom) |
//! | `error` | Hub → Client | [`ErrorNotice`](super::ErrorNotice) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, from_value, to_string, to_value};

use crate::error::{Error, Result};

use super::payload::ErrorNotice;

// ============================================================================
// EventKind
// ============================================================================

/// Known event type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Client posts a chat message.
    SendMessage,
    /// Hub delivers a chat message.
    NewMessage,
    /// Client switches chat room.
    ChangeRoom,
    /// Hub reports a failed event back to its sender.
    Error,
}

impl EventKind {
    /// Every known kind.
    pub const ALL: [Self; 4] = [
        Self::SendMessage,
        Self::NewMessage,
        Self::ChangeRoom,
        Self::Error,
    ];

    /// Returns the wire tag.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::NewMessage => "new_message",
            Self::ChangeRoom => "change_room",
            Self::Error => "error",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| Error::unsupported_event(tag))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event
// ============================================================================

/// A typed event in transit.
///
/// Immutable once constructed. The payload is opaque to the codec; handlers
/// interpret it with [`Event::parse_payload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Type tag.
    #[serde(rename = "type")]
    kind: EventKind,

    /// Event-specific data.
    payload: Value,
}

/// Decode-side envelope. Tag is kept as a raw string so unknown tags can be
/// reported by name.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    payload: Value,
}

impl Event {
    /// Creates an event from a kind and a raw payload.
    #[inline]
    #[must_use]
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Creates an event by serializing a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn with_payload<T: Serialize>(kind: EventKind, payload: &T) -> Result<Self> {
        Ok(Self::new(kind, to_value(payload)?))
    }

    /// Creates an `error` event reporting a failure back to a sender.
    #[must_use]
    pub fn error(tag: Option<&str>, message: impl Into<String>) -> Self {
        let notice = ErrorNotice {
            tag: tag.map(str::to_owned),
            message: message.into(),
        };
        let payload = to_value(&notice).unwrap_or(Value::Null);
        Self::new(EventKind::Error, payload)
    }

    /// Returns the event kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the wire tag.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Returns the raw payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handler`] if the payload does not match `T`.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T> {
        from_value(self.payload.clone()).map_err(|e| Error::handler(self.tag(), e.to_string()))
    }
}

// ============================================================================
// Codec
// ============================================================================

impl Event {
    /// Encodes the event into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Decodes a text frame into an event.
    ///
    /// Unknown envelope fields are ignored. A missing `payload` decodes as
    /// `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFrame`] if the frame is not an envelope with a string `type`
    /// - [`Error::UnsupportedEvent`] if `type` is not a known tag
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawEnvelope =
            from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))?;
        let kind = raw.tag.parse::<EventKind>()?;

        Ok(Self::new(kind, raw.payload))
    }
}

// ============================================================================
// Tests
// ============================================================================
