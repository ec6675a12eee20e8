//! Retry classification for Discord failures.

use crate::{GuildError, GuildErrorKind};

/// Failures that may succeed when the request is sent again.
///
/// # Examples
///
/// ```
/// use guildmaster_error::{GuildError, GuildErrorKind, RetryableError};
///
/// let err = GuildError::new(GuildErrorKind::DiscordApi {
///     message: "Service Unavailable".to_string(),
///     code: None,
///     status: Some(503),
///     method: "GET".to_string(),
///     path: "/guilds/1".to_string(),
/// });
/// assert!(err.is_retryable());
///
/// assert!(!GuildError::validation("Invalid input: name").is_retryable());
/// ```
pub trait RetryableError {
    /// Whether the same request is worth sending again.
    ///
    /// Transient failures (5xx, per-route 429, dropped connections) are
    /// retryable. Client errors and local checks are not.
    fn is_retryable(&self) -> bool;

    /// Server-provided delay before the next attempt, when known.
    fn retry_after_ms(&self) -> Option<u64> {
        None
    }
}

impl RetryableError for GuildErrorKind {
    fn is_retryable(&self) -> bool {
        match self {
            GuildErrorKind::DiscordApi { status, .. } => {
                matches!(status, Some(500 | 502 | 503 | 504))
            }
            GuildErrorKind::RateLimit { global, .. } => !global,
            GuildErrorKind::Http(_) => true,
            _ => false,
        }
    }

    fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GuildErrorKind::RateLimit { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

impl RetryableError for GuildError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_after_ms(&self) -> Option<u64> {
        self.kind.retry_after_ms()
    }
}
