//! Exponential backoff for transient Discord failures.

use guildmaster_error::RetryableError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_retry2::{
    Retry, RetryError,
    strategy::{ExponentialFactorBackoff, jitter},
};
use tracing::warn;

/// How many times, and how patiently, a failed request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_getters::Getters)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    max_retries: usize,
    /// Delay before the first retry, doubled on each subsequent one
    base_delay_ms: u64,
    /// Cap on any single delay
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default 30 second delay cap.
    pub fn new(max_retries: usize, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Override the cap on a single delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// The delays between attempts.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialFactorBackoff::from_millis(self.base_delay_ms, 2.0)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_retries)
    }

    /// Run `operation` until it succeeds, fails permanently, or the retries
    /// run out.
    ///
    /// Retryable errors are retried after the backoff delay, or after the
    /// server's `retry_after` when the error carries one. The last error is
    /// returned once attempts are exhausted.
    pub async fn run<F, Fut, R, E>(&self, operation: F) -> Result<R, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<R, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let max_delay = self.max_delay;
        // Server-requested delay, slept at the start of the next attempt so
        // the final failure is not delayed.
        let pending_ms = AtomicU64::new(0);
        Retry::spawn(self.strategy(), || async {
            let wait_ms = pending_ms.swap(0, Ordering::SeqCst);
            if wait_ms > 0 {
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            match operation().await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    let retry_after = e
                        .retry_after_ms()
                        .map(|ms| Duration::from_millis(ms).min(max_delay));
                    if let Some(delay) = retry_after {
                        pending_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
                    }
                    warn!(retry_after = ?retry_after, "Transient error, will retry: {}", e);
                    Err(RetryError::Transient { err: e, retry_after })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildmaster_error::{GuildError, GuildErrorKind};
    use std::sync::atomic::AtomicUsize;

    fn server_error() -> GuildError {
        GuildError::new(GuildErrorKind::DiscordApi {
            message: "Bad Gateway".to_string(),
            code: None,
            status: Some(502),
            method: "GET".to_string(),
            path: "/guilds/1".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, 100);

        let result: Result<&str, GuildError> = policy
            .run(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.ok(), Some("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_fail_immediately() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, 100);

        let result: Result<(), GuildError> = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GuildError::validation("Invalid input: name"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(2, 10);

        let result: Result<(), GuildError> = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind().status(), Some(502));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_retry_after() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(1, 1);
        let started = tokio::time::Instant::now();

        let result: Result<(), GuildError> = policy
            .run(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(GuildError::rate_limit(750, false))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_policy_makes_one_attempt() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), GuildError> = RetryPolicy::none()
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
