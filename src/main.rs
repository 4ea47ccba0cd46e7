//! Development server: chat handlers and a single `percy`/`123` account.
//!
//! ```text
//! otp-hub [BIND_ADDR]        (default 0.0.0.0:8080)
//! RUST_LOG=otp_hub=debug otp-hub
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use otp_hub::hub::chat;
use otp_hub::{Hub, HubConfig, Result, StaticAuthenticator, http};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Configuration
// ============================================================================

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

    let hub = Hub::new(HubConfig::default(), chat::handlers()?)?;
    let authenticator = Arc::new(StaticAuthenticator::new().with_account("percy", "123"));

    let listener = TcpListener::bind(&addr).await?;
    let server = tokio::spawn(http::serve(listener, Arc::clone(&hub), authenticator));

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received");

    hub.shutdown().await;

    match server.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "Server task failed"),
    }

    Ok(())
}
