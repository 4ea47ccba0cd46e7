//! Connection hub.
//!
//! The hub owns the set of live connections, admits new ones, routes their
//! inbound events to handlers and fans outbound events back out.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Hub`] | Registry, router and lifecycle owner |
//! | [`Admission`] | Proof of a redeemed upgrade token |
//! | [`HandlerTable`] | Immutable kind → handler mapping |
//! | [`EventContext`] | What a handler can reach |
//!
//! # Example
//!
//! ```ignore
//! use otp_hub::{Hub, HubConfig, hub::chat};
//!
//! let hub = Hub::new(HubConfig::default(), chat::handlers()?)?;
//! let otp = hub.issue_token();
//!
//! // ...client presents otp on upgrade...
//! let admission = hub.authorize(Some(otp.key()))?;
//! let connection = hub.admit(admission, socket)?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Chat-room handlers.
pub mod chat;

/// Hub implementation.
pub mod core;

/// Handler table and handler context.
pub mod handlers;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Admission, Hub};
pub use handlers::{EventContext, Handler, HandlerTable};
