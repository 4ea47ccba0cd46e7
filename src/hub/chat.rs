//! Chat-room handlers.
//!
//! The default handler table: clients post messages into their current
//! room and can switch rooms.
//!
//! | Inbound | Effect |
//! |---------|--------|
//! | `send_message` | `new_message` to everyone in the sender's room, sender included |
//! | `change_room` | Sender moves to the named room |

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{ChangeRoom, Event, EventKind, NewMessage, SendMessage};

use super::handlers::{EventContext, HandlerTable};

// ============================================================================
// Handler Table
// ============================================================================

/// Builds the chat handler table.
///
/// # Errors
///
/// Never fails in practice; propagates [`HandlerTable::on`] validation.
pub fn handlers() -> Result<HandlerTable> {
    HandlerTable::new()
        .on(EventKind::SendMessage.as_str(), send_message)?
        .on(EventKind::ChangeRoom.as_str(), change_room)
}

// ============================================================================
// Handlers
// ============================================================================

/// Fans a message out to the sender's room.
fn send_message(event: &Event, ctx: &EventContext<'_>) -> Result<()> {
    let inbound: SendMessage = event.parse_payload()?;
    if inbound.message.is_empty() {
        return Err(Error::handler(event.tag(), "message must not be empty"));
    }

    let outbound = Event::with_payload(EventKind::NewMessage, &NewMessage::from_send(inbound))?;
    let room = ctx.connection().room();
    let delivered = ctx
        .hub()
        .broadcast_where(|conn| conn.in_room(&room), &outbound);

    debug!(
        connection_id = %ctx.connection().id(),
        room = %room,
        delivered,
        "Message fanned out"
    );
    Ok(())
}

/// Moves the sender to another room.
fn change_room(event: &Event, ctx: &EventContext<'_>) -> Result<()> {
    let ChangeRoom { name } = event.parse_payload()?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::handler(event.tag(), "room name must not be empty"));
    }

    ctx.connection().set_room(name);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
