//! Hub: connection registry, event router and lifecycle owner.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                     Hub                      │
//! │  ┌────────────┐  ┌──────────────────────┐    │
//! │  │ TokenStore │  │ Registry (RwLock)    │    │
//! │  │ + reaper   │  │ conn-1 → Connection  │    │
//! │  └────────────┘  │ conn-2 → Connection  │    │
//! │                  └──────────────────────┘    │
//! │  ┌──────────────────────┐  ┌─────────────┐   │
//! │  │ HandlerTable (R/O)   │  │ TaskTracker │   │
//! │  └──────────────────────┘  └─────────────┘   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Neither the registry lock nor the token lock is held across handler
//! invocation or any await point.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::{BackpressurePolicy, HubConfig};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::Event;
use crate::token::{Token, TokenStore};
use crate::transport::{Connection, pump};

use super::handlers::{EventContext, HandlerTable};

// ============================================================================
// Admission
// ============================================================================

/// Proof that an upgrade request presented a valid token.
///
/// Only [`Hub::authorize`] produces one, and [`Hub::admit`] consumes it, so
/// a connection cannot be admitted without a redeemed token.
#[derive(Debug)]
pub struct Admission {
    _private: (),
}

// ============================================================================
// Hub
// ============================================================================

/// Registry of live connections and router for their events.
///
/// Construct with [`Hub::new`] inside a Tokio runtime and share as
/// `Arc<Hub>`.
pub struct Hub {
    /// Hub configuration.
    config: HubConfig,

    /// Live connections. Membership means both pumps are running.
    clients: RwLock<FxHashMap<ConnectionId, Arc<Connection>>>,

    /// Event handlers, immutable after construction.
    handlers: HandlerTable,

    /// Upgrade tokens.
    tokens: Arc<TokenStore>,

    /// Root of every connection's and the reaper's cancellation.
    cancel: CancellationToken,

    /// Pumps and reaper, awaited on shutdown.
    tasks: TaskTracker,
}

// ============================================================================
// Hub - Constructor
// ============================================================================

impl Hub {
    /// Creates a hub and starts its token reaper.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid.
    pub fn new(config: HubConfig, handlers: HandlerTable) -> Result<Arc<Self>> {
        config.validate()?;

        let tokens = Arc::new(TokenStore::new(
            config.token_retention,
            config.token_capacity,
        ));
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();

        tasks.spawn(
            Arc::clone(&tokens).run_reaper(config.reap_interval(), cancel.child_token()),
        );

        info!(
            handlers = ?handlers,
            retention_ms = config.token_retention.as_millis() as u64,
            "Hub started"
        );

        Ok(Arc::new(Self {
            config,
            clients: RwLock::new(FxHashMap::default()),
            handlers,
            tokens,
            cancel,
            tasks,
        }))
    }
}

// ============================================================================
// Hub - Accessors
// ============================================================================

impl Hub {
    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the token store.
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Returns the tracker pumps are spawned on.
    #[inline]
    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns `true` if `id` is registered.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Returns the registered connection with `id`.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.clients.read().get(&id).cloned()
    }

    /// Returns the identities of all registered connections.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.clients.read().keys().copied().collect()
    }

    /// Returns `true` once shutdown has begun.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when shutdown begins.
    #[inline]
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

// ============================================================================
// Hub - Admission
// ============================================================================

impl Hub {
    /// Issues a token for an authenticated client.
    #[inline]
    pub fn issue_token(&self) -> Token {
        self.tokens.issue()
    }

    /// Redeems an upgrade token.
    ///
    /// # Errors
    ///
    /// - [`Error::HubClosed`] if the hub is shutting down
    /// - [`Error::Unauthorized`] if `otp` is missing, unknown, expired or used
    pub fn authorize(&self, otp: Option<&str>) -> Result<Admission> {
        if self.is_closed() {
            return Err(Error::HubClosed);
        }

        match otp {
            Some(key) if !key.is_empty() && self.tokens.verify(key) => {
                Ok(Admission { _private: () })
            }
            _ => {
                debug!("Upgrade rejected");
                Err(Error::Unauthorized)
            }
        }
    }

    /// Admits an upgraded socket.
    ///
    /// Creates the [`Connection`], registers it, and starts its pumps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HubClosed`] if the hub is shutting down. The socket
    /// is dropped in that case.
    pub fn admit<S>(self: &Arc<Self>, admission: Admission, socket: S) -> Result<Arc<Connection>>
    where
        S: Stream<Item = std::result::Result<Message, axum::Error>>
            + Sink<Message, Error = axum::Error>
            + Send
            + 'static,
    {
        let Admission { _private: () } = admission;

        let (connection, outbox) = Connection::new(
            ConnectionId::next(),
            self.config.outbox_capacity,
            self.cancel.child_token(),
        );

        // Pumps are spawned under the registry lock, so shutdown's drain and
        // tracker close either see them or reject this admit
        let pumps = Arc::clone(&connection);
        self.insert(Arc::clone(&connection), move || {
            pump::spawn(self, pumps, outbox, socket);
        })?;

        info!(connection_id = %connection.id(), "Connection admitted");

        Ok(connection)
    }

    /// Adds a connection to the registry.
    ///
    /// Returns `false` if it was already registered.
    ///
    /// # Errors
    ///
    /// - [`Error::HubClosed`] if the hub is shutting down
    /// - [`Error::ConnectionClosed`] if the connection was already torn down
    pub fn register(&self, connection: Arc<Connection>) -> Result<bool> {
        self.insert(connection, || {})
    }

    /// Inserts `connection`, running `on_insert` before the write lock is
    /// released. `on_insert` must not touch the registry.
    fn insert(&self, connection: Arc<Connection>, on_insert: impl FnOnce()) -> Result<bool> {
        let mut clients = self.clients.write();

        // Checked under the write lock so shutdown's drain cannot miss us
        if self.is_closed() {
            return Err(Error::HubClosed);
        }
        if connection.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let id = connection.id();
        if clients.contains_key(&id) {
            return Ok(false);
        }
        clients.insert(id, connection);
        on_insert();
        let count = clients.len();
        drop(clients);

        debug!(connection_id = %id, count, "Connection registered");
        Ok(true)
    }

    /// Removes a connection and tears it down.
    ///
    /// Safe to call any number of times, from any task. Only the call that
    /// actually removes the entry releases the connection and returns `true`.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut clients = self.clients.write();
            clients.remove(&id).map(|conn| (conn, clients.len()))
        };

        let Some((connection, remaining)) = removed else {
            return false;
        };

        connection.close();
        info!(connection_id = %id, remaining, "Connection unregistered");
        true
    }
}

// ============================================================================
// Hub - Routing
// ============================================================================

impl Hub {
    /// Dispatches an event from `connection` to its handler.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedEvent`] if no handler is registered for the kind
    /// - Whatever the handler returns
    pub fn route(&self, event: &Event, connection: &Arc<Connection>) -> Result<()> {
        let handler = self
            .handlers
            .get(event.kind())
            .ok_or_else(|| Error::unsupported_event(event.tag()))?;

        handler(event, &EventContext::new(self, connection))
    }
}

// ============================================================================
// Hub - Delivery
// ============================================================================

impl Hub {
    /// Queues an event for one registered connection.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if `id` is not registered
    /// - [`Error::Backpressure`] if its outbox is full
    pub fn send_to(&self, id: ConnectionId, event: Event) -> Result<()> {
        let connection = self.connection(id).ok_or(Error::ConnectionClosed)?;
        self.deliver(&connection, event)
    }

    /// Queues an event for every registered connection.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn broadcast(&self, event: &Event) -> usize {
        self.broadcast_where(|_| true, event)
    }

    /// Queues an event for every registered connection matching `filter`.
    ///
    /// Returns the number of connections the event was queued for. Slow
    /// connections are skipped, and disconnected under
    /// [`BackpressurePolicy::Disconnect`].
    ///
    /// `filter` runs without the registry lock held.
    pub fn broadcast_where(&self, filter: impl Fn(&Connection) -> bool, event: &Event) -> usize {
        let mut delivered = 0;
        let mut slow = Vec::new();

        // Snapshot only; `filter` may call back into the hub
        let targets: Vec<Arc<Connection>> = self.clients.read().values().cloned().collect();

        for connection in targets.iter().filter(|c| filter(c)) {
            match connection.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) if e.is_backpressure() => {
                    warn!(connection_id = %connection.id(), tag = event.tag(), "Outbox full, event dropped");
                    slow.push(connection.id());
                }
                Err(e) => {
                    debug!(connection_id = %connection.id(), error = %e, "Skipping closed connection");
                }
            }
        }

        if self.config.backpressure == BackpressurePolicy::Disconnect {
            for id in slow {
                warn!(connection_id = %id, "Disconnecting slow client");
                self.unregister(id);
            }
        }

        debug!(tag = event.tag(), delivered, "Broadcast event");
        delivered
    }

    /// Queues an event on `connection`, applying the backpressure policy.
    pub(crate) fn deliver(&self, connection: &Connection, event: Event) -> Result<()> {
        let result = connection.send(event);

        if let Err(e) = &result
            && e.is_backpressure()
            && self.config.backpressure == BackpressurePolicy::Disconnect
        {
            warn!(connection_id = %connection.id(), "Disconnecting slow client");
            self.unregister(connection.id());
        }

        result
    }
}

// ============================================================================
// Hub - Lifecycle
// ============================================================================

impl Hub {
    /// Shuts the hub down.
    ///
    /// Stops the token reaper, tears down every registered connection and
    /// waits for all pumps to exit.
    pub async fn shutdown(&self) {
        info!("Hub shutting down");

        self.cancel.cancel();

        let drained: Vec<_> = {
            let mut clients = self.clients.write();
            clients.drain().map(|(_, conn)| conn).collect()
        };
        for connection in &drained {
            connection.close();
        }

        self.tasks.close();
        self.tasks.wait().await;

        info!(closed = drained.len(), "Hub shutdown complete");
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.connection_count())
            .field("handlers", &self.handlers)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
