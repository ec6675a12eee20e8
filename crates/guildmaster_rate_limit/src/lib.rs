//! Rate limiting and retry for Discord requests.
//!
//! Discord reports its throttling state on every response through
//! `X-RateLimit-*` headers. This crate keeps the last observed state per
//! bucket and lets callers wait until a bucket (or the global limit) resets
//! before sending another request. It never rejects a call; it only delays it.
//!
//! - [`RateLimitTable`] holds bucket state plus the global reset and is shared
//!   by the REST client and the pre-dispatch gate
//! - [`RateLimitHeaders`] parses a response's headers into an observation
//! - [`RetryPolicy`] drives exponential backoff with jitter for transient
//!   failures
//!
//! ```
//! use guildmaster_rate_limit::RateLimitTable;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let table = RateLimitTable::new();
//! table.update("send_message", 3, Duration::from_secs(2)).await;
//! assert!(!table.is_rate_limited("send_message").await);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod headers;
mod retry;
mod table;

pub use headers::RateLimitHeaders;
pub use retry::RetryPolicy;
pub use table::{BucketState, RateLimitTable};
