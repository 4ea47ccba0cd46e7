//! HTTP boundary.
//!
//! Two routes put clients on the hub:
//!
//! | Route | Request | Response |
//! |-------|---------|----------|
//! | `POST /login` | `{"username": ..., "password": ...}` | `200 {"otp": ...}` or `401` |
//! | `GET /ws?otp=...` | WebSocket upgrade | `101` or `401` |
//!
//! After the upgrade the socket speaks the [`Event`](crate::protocol::Event)
//! envelope.

// ============================================================================
// Submodules
// ============================================================================

/// Credential checking.
pub mod auth;

/// Router and server loop.
pub mod routes;

// ============================================================================
// Re-exports
// ============================================================================

pub use auth::{Authenticator, Credentials, StaticAuthenticator};
pub use routes::{AppState, LoginResponse, UpgradeQuery, router, serve};
