//! Typed payloads for the known event kinds.

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Chat Payloads
// ============================================================================

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Message body.
    pub message: String,
    /// Display name of the author.
    pub from: String,
}

/// Payload of `new_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Message body.
    pub message: String,
    /// Display name of the author.
    pub from: String,
    /// When the hub accepted the message.
    pub sent: DateTime<Utc>,
}

impl NewMessage {
    /// Stamps an inbound message with the current time.
    #[must_use]
    pub fn from_send(message: SendMessage) -> Self {
        Self {
            message: message.message,
            from: message.from,
            sent: Utc::now(),
        }
    }
}

/// Payload of `change_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRoom {
    /// Room to join.
    pub name: String,
}

// ============================================================================
// Error Payload
// ============================================================================

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Tag of the event that failed, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Human-readable description.
    pub message: String,
}
