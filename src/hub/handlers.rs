//! Handler table.
//!
//! Maps event kinds to handler functions. The table is built once, before
//! the hub starts, and is read-only afterwards, so routing never takes a
//! lock.
//!
//! # Example
//!
//! ```ignore
//! use otp_hub::hub::HandlerTable;
//!
//! let handlers = HandlerTable::new()
//!     .on("send_message", |event, ctx| {
//!         ctx.reply(event.clone())
//!     })?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::protocol::{Event, EventKind};
use crate::transport::Connection;

use super::Hub;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Runs synchronously on the read pump of the sending connection, so a slow
/// handler delays only that connection's subsequent reads.
pub type Handler = Box<dyn Fn(&Event, &EventContext<'_>) -> Result<()> + Send + Sync>;

// ============================================================================
// EventContext
// ============================================================================

/// What a handler can reach while handling one event.
pub struct EventContext<'a> {
    /// Hub the event was routed through.
    hub: &'a Hub,
    /// Connection the event arrived on.
    connection: &'a Arc<Connection>,
}

impl<'a> EventContext<'a> {
    /// Creates a context for one routed event.
    #[inline]
    #[must_use]
    pub fn new(hub: &'a Hub, connection: &'a Arc<Connection>) -> Self {
        Self { hub, connection }
    }

    /// Returns the hub, for sending to other connections.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &'a Hub {
        self.hub
    }

    /// Returns the sending connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &'a Arc<Connection> {
        self.connection
    }

    /// Queues an event back to the sender.
    ///
    /// # Errors
    ///
    /// See [`Hub::send_to`].
    pub fn reply(&self, event: Event) -> Result<()> {
        self.hub.deliver(self.connection, event)
    }
}

// ============================================================================
// HandlerTable
// ============================================================================

/// Immutable mapping from event kind to handler.
#[derive(Default)]
pub struct HandlerTable {
    handlers: FxHashMap<EventKind, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a type tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the tag is malformed, unknown to the
    /// protocol, or already has a handler.
    pub fn on<F>(mut self, tag: &str, handler: F) -> Result<Self>
    where
        F: Fn(&Event, &EventContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        if tag.is_empty() || tag.trim() != tag {
            return Err(Error::config(format!("malformed event tag {tag:?}")));
        }

        let kind = tag
            .parse::<EventKind>()
            .map_err(|_| Error::config(format!("unknown event tag {tag:?}")))?;

        if self.handlers.contains_key(&kind) {
            return Err(Error::config(format!("duplicate handler for {tag:?}")));
        }

        self.handlers.insert(kind, Box::new(handler));
        Ok(self)
    }

    /// Returns the handler for `kind`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    /// Returns `true` if `kind` has a handler.
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Returns the number of handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().map(EventKind::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("HandlerTable").field("tags", &tags).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
