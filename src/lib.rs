//! OTP Hub - One-time-token gated real-time WebSocket hub.
//!
//! Clients log in over HTTP, receive a short-lived single-use token, and
//! redeem it to open a WebSocket. Every open socket is a [`Connection`]
//! registered with the [`Hub`], which routes its inbound events to handlers
//! and fans outbound events back out.
//!
//! # Architecture
//!
//! - **Token Store**: mints and redeems one-time upgrade tokens
//! - **Hub**: connection registry, event router and lifecycle owner
//! - **Transport**: per-connection read and write pumps with keepalive
//! - **HTTP**: `/login` and `/ws` on top of axum
//!
//! Key design principles:
//!
//! - A connection is only ever admitted with an [`Admission`] from a redeemed token
//! - Registry membership means both pumps are running
//! - Per-connection failures never reach other connections
//! - Outbound sends never block; a full outbox is [`Error::Backpressure`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use otp_hub::{HubConfig, Hub, Result, StaticAuthenticator, http, hub::chat};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Hub::new(HubConfig::default(), chat::handlers()?)?;
//!     let auth = Arc::new(StaticAuthenticator::new().with_account("percy", "123"));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     http::serve(listener, hub, auth).await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`HubConfig`] and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`http`] | Login and upgrade endpoints |
//! | [`hub`] | [`Hub`], handler table and chat handlers |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Event envelope and payloads |
//! | [`token`] | One-time token store |
//! | [`transport`] | Connection handle and pumps |

// ============================================================================
// Modules
// ============================================================================

/// Hub configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// HTTP boundary: login and upgrade.
pub mod http;

/// Connection registry and event router.
pub mod hub;

/// Type-safe identifiers.
pub mod identifiers;

/// Event envelope and payload types.
pub mod protocol;

/// One-time upgrade tokens.
pub mod token;

/// WebSocket transport layer.
///
/// Connection handles and the read/write pumps behind them.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{BackpressurePolicy, HubConfig};

// Error types
pub use error::{Error, Result};

// HTTP types
pub use http::{Authenticator, Credentials, StaticAuthenticator};

// Hub types
pub use hub::{Admission, EventContext, Handler, HandlerTable, Hub};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{Event, EventKind};

// Token types
pub use token::{Token, TokenStore};

// Transport types
pub use transport::Connection;
