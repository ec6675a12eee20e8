//! Process-wide rate-limit table.

use crate::RateLimitHeaders;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Last observed quota for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_getters::Getters)]
pub struct BucketState {
    /// Requests left before the bucket resets
    remaining: u32,
    /// When the bucket's window closes
    reset_at: Instant,
}

impl BucketState {
    fn is_exhausted(&self, now: Instant) -> bool {
        self.reset_at > now && self.remaining == 0
    }
}

#[derive(Debug, Default)]
struct TableState {
    buckets: HashMap<String, BucketState>,
    /// Route key to Discord's opaque bucket hash
    routes: HashMap<String, String>,
    global_reset: Option<Instant>,
}

/// Shared map from bucket key to quota, plus one global reset instant.
///
/// Entries expire lazily: a bucket whose reset time has passed is treated as
/// unlimited and removed the next time it is consulted.
///
/// Cloning is cheap; every clone shares the same table.
#[derive(Debug, Clone, Default)]
pub struct RateLimitTable {
    state: Arc<RwLock<TableState>>,
}

impl RateLimitTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the quota for a bucket. Last write wins.
    #[instrument(skip(self))]
    pub async fn update(&self, bucket: &str, remaining: u32, reset_after: Duration) {
        let reset_at = Instant::now() + reset_after;
        debug!("Updating rate limit bucket");
        self.state.write().await.buckets.insert(
            bucket.to_string(),
            BucketState {
                remaining,
                reset_at,
            },
        );
    }

    /// Block every bucket until `reset_after` elapses.
    #[instrument(skip(self))]
    pub async fn set_global(&self, reset_after: Duration) {
        debug!("Global rate limit observed");
        self.state.write().await.global_reset = Some(Instant::now() + reset_after);
    }

    /// True while the global reset is in the future.
    pub async fn is_global_limited(&self) -> bool {
        self.state
            .read()
            .await
            .global_reset
            .is_some_and(|reset| reset > Instant::now())
    }

    /// True when the bucket has no requests left in its current window.
    ///
    /// An expired entry is evicted and reported as not limited.
    pub async fn is_rate_limited(&self, bucket: &str) -> bool {
        let now = Instant::now();
        let mut state = self.state.write().await;
        match state.buckets.get(bucket).copied() {
            Some(entry) if entry.reset_at > now => entry.remaining == 0,
            Some(_) => {
                state.buckets.remove(bucket);
                false
            }
            None => false,
        }
    }

    /// Snapshot of a bucket, if one is tracked and unexpired.
    pub async fn bucket(&self, bucket: &str) -> Option<BucketState> {
        let now = Instant::now();
        self.state
            .read()
            .await
            .buckets
            .get(bucket)
            .filter(|entry| entry.reset_at > now)
            .copied()
    }

    /// Number of tracked buckets (expired ones included until evicted).
    pub async fn len(&self) -> usize {
        self.state.read().await.buckets.len()
    }

    /// True when no buckets are tracked.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.buckets.is_empty()
    }

    /// Suspend until the global limit and the bucket's window allow a request.
    ///
    /// Returns the total time spent waiting. Never fails.
    #[instrument(skip(self))]
    pub async fn wait_for(&self, bucket: &str) -> Duration {
        let started = Instant::now();

        let global_reset = self.state.read().await.global_reset;
        if let Some(reset) = global_reset {
            let now = Instant::now();
            if reset > now {
                debug!(wait_ms = (reset - now).as_millis() as u64, "Waiting for global rate limit");
                tokio::time::sleep_until(reset).await;
            }
        }

        let entry = self.state.read().await.buckets.get(bucket).copied();
        if let Some(entry) = entry {
            let now = Instant::now();
            if entry.is_exhausted(now) {
                debug!(
                    wait_ms = (entry.reset_at - now).as_millis() as u64,
                    "Waiting for bucket reset"
                );
                tokio::time::sleep_until(entry.reset_at).await;
            }
        }

        // Drop the stale entry now that its window has passed.
        self.is_rate_limited(bucket).await;

        started.elapsed()
    }

    /// Bucket key for a route: Discord's shared bucket hash once one has been
    /// observed for the route, the route itself before that.
    pub async fn bucket_for_route(&self, route: &str) -> String {
        self.state
            .read()
            .await
            .routes
            .get(route)
            .cloned()
            .unwrap_or_else(|| route.to_string())
    }

    /// Wait for the bucket a route maps to.
    pub async fn wait_for_route(&self, route: &str) -> Duration {
        let bucket = self.bucket_for_route(route).await;
        self.wait_for(&bucket).await
    }

    /// Fold a response's rate-limit headers into the table.
    #[instrument(skip(self, headers), fields(bucket = ?headers.bucket()))]
    pub async fn observe(&self, route: &str, headers: &RateLimitHeaders) {
        let bucket = match headers.bucket() {
            Some(hash) => {
                self.state
                    .write()
                    .await
                    .routes
                    .insert(route.to_string(), hash.clone());
                hash.clone()
            }
            None => route.to_string(),
        };

        if let (Some(remaining), Some(reset_after)) = (headers.remaining(), headers.reset_after()) {
            self.update(&bucket, *remaining, *reset_after).await;
        }

        if *headers.global() {
            if let Some(retry_after) = headers.retry_after() {
                self.set_global(*retry_after).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_bucket_waits_for_reset() {
        let table = RateLimitTable::new();
        table.update("send_message", 0, Duration::from_millis(1000)).await;
        assert!(table.is_rate_limited("send_message").await);

        let waited = table.wait_for("send_message").await;
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited < Duration::from_millis(1100));
        assert!(!table.is_rate_limited("send_message").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_with_remaining_proceeds_immediately() {
        let table = RateLimitTable::new();
        table.update("send_message", 4, Duration::from_millis(1000)).await;

        let waited = table.wait_for("send_message").await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_evicted() {
        let table = RateLimitTable::new();
        table.update("edit_role", 0, Duration::from_millis(50)).await;
        assert_eq!(table.len().await, 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!table.is_rate_limited("edit_role").await);
        assert!(table.is_empty().await);
        assert!(table.bucket("edit_role").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_limit_delays_every_bucket() {
        let table = RateLimitTable::new();
        table.set_global(Duration::from_millis(500)).await;
        assert!(table.is_global_limited().await);

        let waited = table.wait_for("anything").await;
        assert!(waited >= Duration::from_millis(500));
        assert!(!table.is_global_limited().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_bucket_is_unlimited() {
        let table = RateLimitTable::new();
        assert!(!table.is_rate_limited("never_seen").await);
        assert_eq!(table.wait_for("never_seen").await, Duration::ZERO);
    }
}
