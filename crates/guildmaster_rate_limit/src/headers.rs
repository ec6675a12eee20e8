//! Parsing of Discord's rate-limit response headers.
//!
//! Discord sends, on every REST response:
//! - `X-RateLimit-Bucket`: opaque hash shared by routes with a common quota
//! - `X-RateLimit-Limit` / `X-RateLimit-Remaining`: window size and requests left
//! - `X-RateLimit-Reset-After`: seconds (fractional) until the window resets
//! - `X-RateLimit-Global`: present on 429s that apply to every route
//! - `X-RateLimit-Scope`: `user`, `global` or `shared` on 429s
//! - `Retry-After`: seconds to wait after a 429

use reqwest::header::HeaderMap;
use std::time::Duration;

/// Rate-limit observation extracted from one response.
#[derive(Debug, Clone, Default, PartialEq, derive_getters::Getters)]
pub struct RateLimitHeaders {
    bucket: Option<String>,
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_after: Option<Duration>,
    retry_after: Option<Duration>,
    global: bool,
    scope: Option<String>,
}

impl RateLimitHeaders {
    /// Parse the rate-limit headers of a response. Missing or malformed
    /// headers leave their field unset.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            bucket: parse_header_str(headers, "x-ratelimit-bucket"),
            limit: parse_header_u32(headers, "x-ratelimit-limit"),
            remaining: parse_header_u32(headers, "x-ratelimit-remaining"),
            reset_after: parse_header_secs(headers, "x-ratelimit-reset-after"),
            retry_after: parse_header_secs(headers, "retry-after"),
            global: parse_header_str(headers, "x-ratelimit-global")
                .is_some_and(|value| value.eq_ignore_ascii_case("true")),
            scope: parse_header_str(headers, "x-ratelimit-scope"),
        }
    }

    /// Replace the retry delay and global flag with the values from a 429 body,
    /// which are more precise than the headers.
    pub fn with_retry_body(mut self, retry_after_secs: f64, global: bool) -> Self {
        if retry_after_secs.is_finite() && retry_after_secs >= 0.0 {
            self.retry_after = Some(Duration::from_secs_f64(retry_after_secs));
        }
        self.global = self.global || global;
        self
    }

    /// True when nothing rate-limit related was present.
    pub fn is_empty(&self) -> bool {
        self.bucket.is_none()
            && self.remaining.is_none()
            && self.reset_after.is_none()
            && self.retry_after.is_none()
            && !self.global
    }
}

fn parse_header_str(headers: &HeaderMap, key: &str) -> Option<String> {
    Some(headers.get(key)?.to_str().ok()?.to_string())
}

fn parse_header_u32(headers: &HeaderMap, key: &str) -> Option<u32> {
    headers.get(key)?.to_str().ok()?.parse().ok()
}

fn parse_header_secs(headers: &HeaderMap, key: &str) -> Option<Duration> {
    let secs: f64 = headers.get(key)?.to_str().ok()?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
