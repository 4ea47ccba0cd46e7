//! Token storage with retention-window expiry.
//!
//! Entries live in a hash map keyed by token key, with a FIFO index ordered
//! by creation time. The index makes both the reaper and capacity eviction
//! walk from the oldest entry without scanning the whole map.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

// ============================================================================
// Token
// ============================================================================

/// A freshly issued upgrade token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Opaque random key handed to the client.
    key: String,
    /// When the token was issued.
    created_at: Instant,
}

impl Token {
    /// Returns the key the client presents on upgrade.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the issue time.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Consumes the token, returning its key.
    #[inline]
    #[must_use]
    pub fn into_key(self) -> String {
        self.key
    }
}

// ============================================================================
// Entries
// ============================================================================

/// State guarded by the store lock.
#[derive(Default)]
struct Entries {
    /// Live tokens by key.
    live: FxHashMap<String, Instant>,
    /// Issue order. May still hold keys that were already redeemed; those
    /// are skipped when popped.
    order: VecDeque<(String, Instant)>,
}

impl Entries {
    /// Removes the oldest entry from the index, and from the map if it is
    /// still live. Returns `true` if a live token was dropped.
    fn pop_oldest(&mut self) -> bool {
        let Some((key, created_at)) = self.order.pop_front() else {
            return false;
        };
        if self.live.get(&key) == Some(&created_at) {
            self.live.remove(&key);
            return true;
        }
        false
    }
}

// ============================================================================
// TokenStore
// ============================================================================

/// Thread-safe store of outstanding upgrade tokens.
///
/// All operations take a short synchronous lock and never await while
/// holding it.
pub struct TokenStore {
    /// Maximum token lifetime.
    retention: Duration,
    /// Hard bound on live tokens.
    capacity: usize,
    /// Guarded state.
    entries: Mutex<Entries>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            retention,
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns the retention window.
    #[inline]
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Returns the number of live tokens.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().live.len()
    }

    /// Returns `true` if no token is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Issues a new token.
    ///
    /// When the store is at capacity the oldest live token is evicted first.
    pub fn issue(&self) -> Token {
        let key = Uuid::new_v4().simple().to_string();
        let created_at = Instant::now();

        let mut entries = self.entries.lock();
        while entries.live.len() >= self.capacity {
            if entries.pop_oldest() {
                warn!(capacity = self.capacity, "Token store full, evicted oldest token");
            }
        }
        entries.live.insert(key.clone(), created_at);
        entries.order.push_back((key.clone(), created_at));
        drop(entries);

        trace!("Token issued");

        Token { key, created_at }
    }

    /// Redeems a token.
    ///
    /// Returns `true` exactly once per issued key, and only while the token
    /// is within its retention window. The key is removed either way, so an
    /// expired key cannot be retried.
    pub fn verify(&self, key: &str) -> bool {
        let created_at = self.entries.lock().live.remove(key);

        match created_at {
            Some(created_at) if created_at.elapsed() <= self.retention => {
                trace!("Token redeemed");
                true
            }
            Some(_) => {
                debug!("Token presented after retention window");
                false
            }
            None => false,
        }
    }

    /// Drops every token older than the retention window.
    ///
    /// Returns the number of live tokens removed.
    pub fn reap(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut removed = 0;

        while let Some((_, created_at)) = entries.order.front() {
            if now.duration_since(*created_at) <= self.retention {
                break;
            }
            if entries.pop_oldest() {
                removed += 1;
            }
        }

        removed
    }

    /// Periodically reaps expired tokens until `cancel` fires.
    pub async fn run_reaper(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(period_ms = period.as_millis() as u64, "Token reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.reap();
                    if removed > 0 {
                        trace!(removed, "Reaped expired tokens");
                    }
                }
            }
        }

        debug!("Token reaper stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use tokio::time::advance;

    const RETENTION: Duration = Duration::from_secs(5);

    #[test]
    fn test_issue_generates_unique_keys() {
        let store = TokenStore::new(RETENTION, 100);
        let keys: HashSet<_> = (0..50).map(|_| store.issue().into_key()).collect();

        assert_eq!(keys.len(), 50);
        assert!(keys.iter().all(|k| !k.is_empty()));
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn test_verify_is_single_use() {
        let store = TokenStore::new(RETENTION, 100);
        let token = store.issue();

        assert!(store.verify(token.key()));
        assert!(!store.verify(token.key()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_verify_unknown_key() {
        let store = TokenStore::new(RETENTION, 100);
        assert!(!store.verify("nope"));
        assert!(!store.verify(""));
    }

    #[test]
    fn test_concurrent_verify_same_key_has_one_winner() {
        let store = TokenStore::new(RETENTION, 100);

        for _ in 0..20 {
            let token = store.issue();
            let wins = AtomicUsize::new(0);

            thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        if store.verify(token.key()) {
                            wins.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(wins.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = TokenStore::new(RETENTION, 2);
        let first = store.issue();
        let second = store.issue();
        let third = store.issue();

        assert_eq!(store.len(), 2);
        assert!(!store.verify(first.key()));
        assert!(store.verify(second.key()));
        assert!(store.verify(third.key()));
    }

    #[test]
    fn test_capacity_skips_redeemed_entries() {
        let store = TokenStore::new(RETENTION, 2);
        let first = store.issue();
        let second = store.issue();
        assert!(store.verify(first.key()));

        let third = store.issue();
        assert_eq!(store.len(), 2);
        assert!(store.verify(second.key()));
        assert!(store.verify(third.key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_within_window() {
        let store = TokenStore::new(RETENTION, 100);
        let token = store.issue();

        advance(Duration::from_secs(4)).await;
        assert!(store.verify(token.key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_after_window_fails() {
        let store = TokenStore::new(RETENTION, 100);
        let token = store.issue();

        advance(Duration::from_secs(6)).await;
        assert!(!store.verify(token.key()));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_removes_only_expired() {
        let store = TokenStore::new(RETENTION, 100);
        let old = store.issue();
        advance(Duration::from_secs(3)).await;
        let young = store.issue();
        advance(Duration::from_secs(3)).await;

        assert_eq!(store.reap(), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.verify(old.key()));
        assert!(store.verify(young.key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_purges_unredeemed_tokens() {
        let store = Arc::new(TokenStore::new(RETENTION, 100));
        let cancel = CancellationToken::new();
        let reaper = tokio::spawn(
            Arc::clone(&store).run_reaper(RETENTION / 2, cancel.clone()),
        );

        for _ in 0..10 {
            let _ = store.issue();
        }
        assert_eq!(store.len(), 10);

        advance(Duration::from_secs(8)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_empty());

        cancel.cancel();
        reaper.await.expect("reaper exits cleanly");
    }

    #[tokio::test]
    async fn test_reaper_stops_on_cancel() {
        let store = Arc::new(TokenStore::new(RETENTION, 100));
        let cancel = CancellationToken::new();
        let reaper = tokio::spawn(
            Arc::clone(&store).run_reaper(Duration::from_millis(10), cancel.clone()),
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), reaper)
            .await
            .expect("reaper stops promptly")
            .expect("reaper does not panic");
    }
}
