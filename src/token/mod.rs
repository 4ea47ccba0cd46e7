//! Single-use, time-limited upgrade tokens.
//!
//! A token is minted on successful login and redeemed exactly once when the
//! client opens its WebSocket. Tokens that are never redeemed are purged by
//! a background reaper once the retention window has passed.
//!
//! # Lifecycle
//!
//! 1. `TokenStore::issue` - Mint a random key and record its creation time
//! 2. `TokenStore::verify` - Redeem the key (first caller wins, then it is gone)
//! 3. `TokenStore::run_reaper` - Drop entries older than the retention window
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `store` | Token map, eviction and reaper loop |

// ============================================================================
// Submodules
// ============================================================================

/// Token map, eviction and reaper loop.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use store::{Token, TokenStore};
