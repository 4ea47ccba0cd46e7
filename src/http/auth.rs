//! Credential checking for the login endpoint.
//!
//! The hub never checks passwords itself. [`Authenticator`] is the seam an
//! embedding application plugs its own account store into;
//! [`StaticAuthenticator`] is a fixed in-memory table for development.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Deserialize;

// ============================================================================
// Credentials
// ============================================================================

/// Username and password submitted to `/login`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plain-text password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Decides whether a login attempt succeeds.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `true` if `credentials` identify a known account.
    async fn authenticate(&self, credentials: &Credentials) -> bool;
}

// ============================================================================
// StaticAuthenticator
// ============================================================================

/// Authenticator backed by a fixed username → password table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    accounts: FxHashMap<String, String>,
}

impl StaticAuthenticator {
    /// Creates an authenticator that rejects everyone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    #[must_use]
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), password.into());
        self
    }

    /// Returns the number of accounts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if there are no accounts.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> bool {
        self.accounts
            .get(&credentials.username)
            .is_some_and(|password| *password == credentials.password)
    }
}

// ============================================================================
// Tests
// ============================================================================
