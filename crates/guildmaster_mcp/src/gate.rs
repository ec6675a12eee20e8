//! Pre-dispatch gate: authorization, logging and advisory throttling
//! around every action.

use guildmaster_discord::Outcome;
use guildmaster_error::{GuildError, GuildErrorKind, GuildResult};
use guildmaster_rate_limit::RateLimitTable;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Wraps each dispatched action.
///
/// Order: authorize, log the intent, wait on the action's bucket, run,
/// log the outcome. The gate never rejects for throttling; it only delays.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct Gate {
    /// When non-empty, the only actions permitted
    allowed: HashSet<String>,
    /// Consulted only when `allowed` is empty
    denied: HashSet<String>,
    /// Per-action buckets and the global reset
    limits: RateLimitTable,
    /// Wait on buckets before running
    protection: bool,
    /// Emit intent and success lines at `info` instead of `debug`
    log_operations: bool,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), RateLimitTable::new())
    }
}

impl Gate {
    /// Gate with the given lists, protection on and operation logging off.
    pub fn new(
        allowed: impl IntoIterator<Item = String>,
        denied: impl IntoIterator<Item = String>,
        limits: RateLimitTable,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            denied: denied.into_iter().collect(),
            limits,
            protection: true,
            log_operations: false,
        }
    }

    /// Toggle waiting on rate-limit buckets.
    pub fn with_protection(mut self, protection: bool) -> Self {
        self.protection = protection;
        self
    }

    /// Toggle `info`-level operation lines.
    pub fn with_operation_logging(mut self, enabled: bool) -> Self {
        self.log_operations = enabled;
        self
    }

    /// Whether `action` passes the allow/deny lists.
    pub fn is_allowed(&self, action: &str) -> bool {
        if !self.allowed.is_empty() {
            return self.allowed.contains(action);
        }
        !self.denied.contains(action)
    }

    /// Fail with a permission error when `action` is not allowed.
    pub fn authorize(&self, action: &str) -> GuildResult<()> {
        if self.is_allowed(action) {
            Ok(())
        } else {
            Err(GuildError::permission(format!(
                "Permission denied: Action '{}' is not allowed",
                action
            )))
        }
    }

    /// Run `operation` for `action` behind the gate.
    pub async fn run<F, Fut>(&self, action: &str, params: &Value, operation: F) -> GuildResult<Outcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GuildResult<Outcome>>,
    {
        self.authorize(action)?;

        if self.log_operations {
            info!("Operation: {} {}", action, params);
        } else {
            debug!(action, params = %params, "Operation");
        }

        if self.protection {
            let waited = self.limits.wait_for(action).await;
            if !waited.is_zero() {
                debug!(action, waited_ms = waited.as_millis() as u64, "Throttled before dispatch");
            }
        }

        let result = operation().await;
        match &result {
            Ok(_) if self.log_operations => info!("Action '{}' executed successfully", action),
            Ok(_) => debug!(action, "Action executed"),
            Err(e) => {
                error!(error = %e, "Operation failed: Action '{}' failed", action);
                self.record_rate_limit(action, e).await;
            }
        }
        result
    }

    async fn record_rate_limit(&self, action: &str, err: &GuildError) {
        if let GuildErrorKind::RateLimit {
            retry_after_ms,
            global,
        } = err.kind()
        {
            let reset_after = Duration::from_millis(*retry_after_ms);
            warn!(action, retry_after_ms, global, "Recording rate limit for action");
            self.limits.update(action, 0, reset_after).await;
            if *global {
                self.limits.set_global(reset_after).await;
            }
        }
    }
}
