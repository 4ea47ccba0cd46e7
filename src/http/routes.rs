//! Router, handlers and server loop.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hub::Hub;

use super::auth::{Authenticator, Credentials};

// ============================================================================
// State
// ============================================================================

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// The hub connections are admitted into.
    pub hub: Arc<Hub>,
    /// Login policy.
    pub authenticator: Arc<dyn Authenticator>,
}

// ============================================================================
// Wire Types
// ============================================================================

/// Body of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// One-time upgrade token.
    pub otp: String,
}

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeQuery {
    /// One-time upgrade token.
    #[serde(default)]
    pub otp: Option<String>,
}

// ============================================================================
// Router
// ============================================================================

/// Builds the router exposing `POST /login` and `GET /ws`.
pub fn router(hub: Arc<Hub>, authenticator: Arc<dyn Authenticator>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/ws", get(upgrade))
        .with_state(AppState { hub, authenticator })
}

/// Serves the router on `listener` until the hub shuts down.
///
/// # Errors
///
/// Returns [`Error::Io`] if the listener fails.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<Hub>,
    authenticator: Arc<dyn Authenticator>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Listening");

    let signal_hub = Arc::clone(&hub);
    axum::serve(listener, router(hub, authenticator))
        .with_graceful_shutdown(async move { signal_hub.closed().await })
        .await?;

    info!(%addr, "Server stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /login`: checks credentials and issues a token.
async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Json(credentials) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Malformed login body");
            return rejection.into_response();
        }
    };

    if !state.authenticator.authenticate(&credentials).await {
        debug!(username = %credentials.username, "Login rejected");
        return Error::Unauthorized.into_response();
    }

    let token = state.hub.issue_token();
    info!(username = %credentials.username, "Login succeeded");

    Json(LoginResponse {
        otp: token.into_key(),
    })
    .into_response()
}

/// `GET /ws?otp=...`: redeems the token, then upgrades.
///
/// The token is checked before the handshake, so a request without a valid
/// token is answered with 401 whether or not it is a WebSocket request.
async fn upgrade(
    State(state): State<AppState>,
    query: std::result::Result<Query<UpgradeQuery>, QueryRejection>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response> {
    // An unparsable query is just another invalid token
    let Ok(Query(query)) = query else {
        debug!("Upgrade rejected: unparsable query");
        return Err(Error::Unauthorized);
    };
    let admission = state.hub.authorize(query.otp.as_deref())?;
    let ws = ws.map_err(|rejection| Error::upgrade_failed(rejection.body_text()))?;

    let hub = state.hub;
    Ok(ws
        .max_message_size(hub.config().max_frame_size)
        .on_failed_upgrade(|e: axum::Error| warn!(error = %e, "Upgrade failed"))
        .on_upgrade(move |socket| async move {
            if let Err(e) = hub.admit(admission, socket) {
                warn!(error = %e, "Admission failed after upgrade");
            }
        }))
}
