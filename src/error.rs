//! Error types for the hub.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use otp_hub::{Error, Result};
//!
//! fn deliver(hub: &Hub, id: ConnectionId, event: Event) -> Result<()> {
//!     hub.send_to(id, event)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Admission | [`Error::Unauthorized`], [`Error::UpgradeFailed`], [`Error::HubClosed`] |
//! | Protocol | [`Error::UnsupportedEvent`], [`Error::MalformedFrame`], [`Error::Handler`] |
//! | Delivery | [`Error::Backpressure`], [`Error::ConnectionClosed`], [`Error::Transport`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Admission Errors
    // ========================================================================
    /// Missing, unknown, expired or already redeemed token.
    ///
    /// Deliberately carries no detail so callers cannot learn which check failed.
    #[error("Unauthorized")]
    Unauthorized,

    /// Transport-level handshake failed.
    #[error("Upgrade failed: {message}")]
    UpgradeFailed {
        /// Description of the handshake failure.
        message: String,
    },

    /// The hub is shutting down and no longer admits connections.
    #[error("Hub is closed")]
    HubClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Event type tag is unknown, or has no handler.
    #[error("Unsupported event: {tag}")]
    UnsupportedEvent {
        /// The offending type tag.
        tag: String,
    },

    /// Frame could not be decoded into an event envelope.
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Description of the decode failure.
        message: String,
    },

    /// A handler rejected an event.
    #[error("Handler for {tag} failed: {message}")]
    Handler {
        /// Type tag of the event being handled.
        tag: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Outbound queue of a connection is full.
    #[error("Outbox of connection {connection_id} is full ({capacity} events)")]
    Backpressure {
        /// The slow connection.
        connection_id: ConnectionId,
        /// Configured outbox capacity.
        capacity: usize,
    },

    /// Connection is closed or not registered.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Socket read or write failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an upgrade failed error.
    #[inline]
    pub fn upgrade_failed(message: impl Into<String>) -> Self {
        Self::UpgradeFailed {
            message: message.into(),
        }
    }

    /// Creates an unsupported event error.
    #[inline]
    pub fn unsupported_event(tag: impl Into<String>) -> Self {
        Self::UnsupportedEvent { tag: tag.into() }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Creates a backpressure error.
    #[inline]
    pub fn backpressure(connection_id: ConnectionId, capacity: usize) -> Self {
        Self::Backpressure {
            connection_id,
            capacity,
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error ends the connection it occurred on.
    ///
    /// Routing failures are reported back to the sender; everything that
    /// breaks the framing or the socket tears the connection down.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. }
                | Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if the socket itself failed.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::WebSocket(_))
    }

    /// Returns `true` if this is an admission error.
    #[inline]
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this error was caused by a slow consumer.
    #[inline]
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Backpressure { .. })
    }
}

// ============================================================================
// HTTP Mapping
// ============================================================================

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::UpgradeFailed { .. } | Self::MalformedFrame { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Self::HubClosed => StatusCode::SERVICE_UNAVAILABLE.into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
