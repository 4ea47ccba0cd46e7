//! Per-client connection state.
//!
//! A [`Connection`] is the hub-side handle for one admitted client. It owns
//! the sending half of the client's bounded outbox and the cancellation
//! token both pumps watch. The socket itself lives inside the pumps (see
//! [`super::pump`]), so nothing here ever blocks on I/O.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::Event;

// ============================================================================
// Constants
// ============================================================================

/// Room every connection starts in.
pub const DEFAULT_ROOM: &str = "general";

// ============================================================================
// Connection
// ============================================================================

/// Hub-side handle for one admitted client.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and shared as `Arc<Connection>` between the
/// registry, both pumps and any handler holding a reference. All methods are
/// non-blocking.
pub struct Connection {
    /// Registry identity.
    id: ConnectionId,

    /// Sending half of the outbox, drained by the write pump.
    outbox: mpsc::Sender<Event>,

    /// Outbox depth, reported in backpressure errors.
    capacity: usize,

    /// Fired once when the connection is torn down.
    cancel: CancellationToken,

    /// Close-once guard.
    closed: AtomicBool,

    /// Chat room the client is currently in.
    room: RwLock<String>,
}

impl Connection {
    /// Creates a connection and the receiving half of its outbox.
    pub(crate) fn new(
        id: ConnectionId,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (outbox, outbox_rx) = mpsc::channel(capacity);

        let connection = Arc::new(Self {
            id,
            outbox,
            capacity,
            cancel,
            closed: AtomicBool::new(false),
            room: RwLock::new(DEFAULT_ROOM.to_string()),
        });

        (connection, outbox_rx)
    }

    /// Returns the registry identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the outbox depth.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current chat room.
    #[must_use]
    pub fn room(&self) -> String {
        self.room.read().clone()
    }

    /// Returns `true` if the client is in `name`.
    #[must_use]
    pub fn in_room(&self, name: &str) -> bool {
        *self.room.read() == name
    }

    /// Moves the client to another chat room.
    pub fn set_room(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(connection_id = %self.id, room = %name, "Room changed");
        *self.room.write() = name;
    }

    /// Queues an event for delivery.
    ///
    /// Never blocks. The event is written to the socket by the write pump.
    ///
    /// # Errors
    ///
    /// - [`Error::Backpressure`] if the outbox is full
    /// - [`Error::ConnectionClosed`] if the connection is torn down
    pub fn send(&self, event: Event) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        self.outbox.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => Error::backpressure(self.id, self.capacity),
            TrySendError::Closed(_) => Error::ConnectionClosed,
        })
    }

    /// Returns `true` once the connection has been torn down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Resolves when the connection is torn down.
    #[inline]
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Tears the connection down, stopping both pumps.
    ///
    /// Returns `true` only for the first caller.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
