//! WebSocket protocol message types.
//!
//! This module defines the envelope exchanged over every admitted
//! connection and the typed payloads carried inside it. Encoding and
//! decoding are pure: nothing here knows about the registry or handlers.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `send_message` | Client → Hub | Post a chat message |
//! | `change_room` | Client → Hub | Switch chat room |
//! | `new_message` | Hub → Client | Deliver a chat message |
//! | `error` | Hub → Client | Report a rejected event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Envelope, kinds and codec |
//! | `payload` | Typed payload structs |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope, kinds and codec.
pub mod event;

/// Typed payload structs.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Event, EventKind};
pub use payload::{ChangeRoom, ErrorNotice, NewMessage, SendMessage};
