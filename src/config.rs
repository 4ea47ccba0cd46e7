//! Hub configuration.
//!
//! Provides the recognized tuning knobs for token retention, outbound
//! queueing and keepalive.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use otp_hub::{BackpressurePolicy, HubConfig};
//!
//! let config = HubConfig::new()
//!     .with_token_retention(Duration::from_secs(5))
//!     .with_outbox_capacity(64)
//!     .with_backpressure(BackpressurePolicy::Disconnect);
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default lifetime of an unredeemed token.
pub const DEFAULT_TOKEN_RETENTION: Duration = Duration::from_secs(5);

/// Default maximum number of outstanding tokens.
pub const DEFAULT_TOKEN_CAPACITY: usize = 10_000;

/// Default outbound queue depth per connection.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(9);

/// Default time a peer has to answer a ping.
pub const DEFAULT_PONG_DEADLINE: Duration = Duration::from_secs(10);

/// Default deadline for a single socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum inbound frame size in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

// ============================================================================
// BackpressurePolicy
// ============================================================================

/// What the hub does when a connection's outbox is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Fail the send with [`Error::Backpressure`]; the connection stays up.
    #[default]
    Reject,
    /// Fail the send and tear the slow connection down.
    Disconnect,
}

// ============================================================================
// HubConfig
// ============================================================================

/// Hub configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Maximum lifetime of an issued token.
    pub token_retention: Duration,

    /// Hard bound on outstanding tokens; the oldest is evicted on overflow.
    pub token_capacity: usize,

    /// Outbound queue depth per connection.
    pub outbox_capacity: usize,

    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,

    /// Time a peer has to answer a ping before the connection is dropped.
    pub pong_deadline: Duration,

    /// Deadline for a single socket write.
    pub write_timeout: Duration,

    /// Maximum inbound frame size in bytes.
    pub max_frame_size: usize,

    /// Full-outbox policy.
    pub backpressure: BackpressurePolicy,
}

// ============================================================================
// Constructors
// ============================================================================

impl HubConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            token_retention: DEFAULT_TOKEN_RETENTION,
            token_capacity: DEFAULT_TOKEN_CAPACITY,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            pong_deadline: DEFAULT_PONG_DEADLINE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            backpressure: BackpressurePolicy::Reject,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl HubConfig {
    /// Sets the token retention window.
    #[inline]
    #[must_use]
    pub fn with_token_retention(mut self, retention: Duration) -> Self {
        self.token_retention = retention;
        self
    }

    /// Sets the maximum number of outstanding tokens.
    #[inline]
    #[must_use]
    pub fn with_token_capacity(mut self, capacity: usize) -> Self {
        self.token_capacity = capacity;
        self
    }

    /// Sets the outbound queue depth per connection.
    #[inline]
    #[must_use]
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Sets the keepalive ping interval and the pong deadline.
    #[inline]
    #[must_use]
    pub fn with_keepalive(mut self, interval: Duration, pong_deadline: Duration) -> Self {
        self.keepalive_interval = interval;
        self.pong_deadline = pong_deadline;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the maximum inbound frame size.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Sets the full-outbox policy.
    #[inline]
    #[must_use]
    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HubConfig {
    /// Checks that every duration and capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("token_retention", self.token_retention),
            ("keepalive_interval", self.keepalive_interval),
            ("pong_deadline", self.pong_deadline),
            ("write_timeout", self.write_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be non-zero")));
            }
        }

        let sizes = [
            ("token_capacity", self.token_capacity),
            ("outbox_capacity", self.outbox_capacity),
            ("max_frame_size", self.max_frame_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::config(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }

    /// Interval at which the token reaper scans for expired entries.
    #[inline]
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        (self.token_retention / 2).max(Duration::from_millis(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
