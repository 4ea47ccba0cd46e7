//! WebSocket transport layer.
//!
//! This module owns the per-client I/O: a [`Connection`] handle shared with
//! the hub, and the two pumps that move frames between the socket and the
//! hub.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!  socket (read)  ──►│ read pump  ── route ──► Hub  │
//!                    │                          │   │
//!                    │                          ▼   │
//!  socket (write) ◄──│ write pump ◄── outbox ◄─ send│
//!                    └──────────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Hub::admit` - Create the [`Connection`], register it, spawn both pumps
//! 2. Read pump routes inbound events; write pump drains the outbox and pings
//! 3. First pump to stop calls `Hub::unregister`, which cancels the other
//! 4. Write pump drains the outbox and sends a close frame
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Shared connection handle and outbox |
//! | `pump` | Read and write pump tasks |

// ============================================================================
// Submodules
// ============================================================================

/// Shared connection handle and outbox.
pub mod connection;

/// Read and write pump tasks.
pub(crate) mod pump;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DEFAULT_ROOM};
