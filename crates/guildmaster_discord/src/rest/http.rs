//! reqwest-backed Discord REST client.

use super::{DiscordRest, RestBody, RestRequest};
use async_trait::async_trait;
use guildmaster_error::{GuildError, GuildErrorKind, GuildResult};
use guildmaster_rate_limit::{RateLimitHeaders, RateLimitTable, RetryPolicy};
use reqwest::{Client, StatusCode, multipart};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Discord API base URL.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/guildmaster-rs/guildmaster, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Error body Discord returns with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Body of a 429 response.
#[derive(Debug, Default, Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    retry_after: f64,
    #[serde(default)]
    global: bool,
}

/// Authenticated Discord HTTP client.
///
/// Every request waits on the shared [`RateLimitTable`] before it is sent,
/// feeds the response's rate-limit headers back into the table, and is
/// retried according to the [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct HttpRest {
    client: Client,
    token: String,
    api_base: String,
    limits: RateLimitTable,
    retry: RetryPolicy,
}

impl HttpRest {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(token: impl Into<String>, timeout: Duration) -> GuildResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GuildError::http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token: token.into(),
            api_base: DISCORD_API_BASE.to_string(),
            limits: RateLimitTable::new(),
            retry: RetryPolicy::default(),
        })
    }

    /// Point the client at a different API base (a proxy or test server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Share a rate-limit table with other components.
    pub fn with_rate_limits(mut self, limits: RateLimitTable) -> Self {
        self.limits = limits;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The rate-limit table this client feeds.
    pub fn rate_limits(&self) -> &RateLimitTable {
        &self.limits
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_base, path)
        }
    }

    fn build(&self, request: &RestRequest) -> GuildResult<reqwest::RequestBuilder> {
        let url = self.url(request.path());
        let method = reqwest::Method::from_bytes(request.method().to_string().as_bytes())
            .map_err(|e| GuildError::http(format!("Invalid method: {}", e)))?;
        let mut builder = self.client.request(method, &url);

        if !request.path().starts_with("http") {
            builder = builder.header("Authorization", format!("Bot {}", self.token));
        }
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(reason) = request.audit_reason() {
            builder = builder.header("X-Audit-Log-Reason", reason);
        }

        builder = match request.body() {
            RestBody::Empty => builder,
            RestBody::Json(body) => builder.json(body),
            RestBody::Multipart { fields, files } => {
                // Forms are consumed on send, so each attempt builds a fresh one.
                let mut form = multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                for file in files {
                    let part = multipart::Part::bytes(file.data().clone())
                        .file_name(file.file_name().clone());
                    form = form.part(file.field().clone(), part);
                }
                builder.multipart(form)
            }
        };
        Ok(builder)
    }

    #[instrument(skip(self, request), fields(method = %request.method(), route = %route))]
    async fn send_once(&self, request: &RestRequest, route: &str) -> GuildResult<Value> {
        let waited = self.limits.wait_for_route(route).await;
        if !waited.is_zero() {
            debug!(waited_ms = waited.as_millis() as u64, "Waited for rate limit");
        }

        debug!("Discord API request");
        let response = self
            .build(request)?
            .send()
            .await
            .map_err(|e| GuildError::http(format!("Discord API request failed: {}", e)))?;

        let status = response.status();
        let headers = RateLimitHeaders::from_headers(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| GuildError::http(format!("Failed to read Discord response: {}", e)))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body: RateLimitBody = serde_json::from_str(&text).unwrap_or_default();
            let headers = headers.with_retry_body(body.retry_after, body.global);
            self.limits.observe(route, &headers).await;
            let retry_after_ms = headers
                .retry_after()
                .map(|delay| delay.as_millis() as u64)
                .unwrap_or(1000);
            warn!(retry_after_ms, global = *headers.global(), "Discord rate limited request");
            return Err(GuildError::rate_limit(retry_after_ms, *headers.global()));
        }

        self.limits.observe(route, &headers).await;

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                return Ok(Value::Null);
            }
            // Not retryable: the request already took effect.
            return serde_json::from_str(&text).map_err(|e| {
                GuildError::new(GuildErrorKind::Unknown(format!(
                    "Failed to parse Discord response: {}",
                    e
                )))
            });
        }

        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body.message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        });
        debug!(status = status.as_u16(), code = ?body.code, "Discord API error");
        Err(GuildError::new(GuildErrorKind::DiscordApi {
            message,
            code: body.code,
            status: Some(status.as_u16()),
            method: request.method().to_string(),
            path: error_path(request.path(), route),
        }))
    }
}

/// Path recorded on API errors. Absolute webhook URLs carry a token, so
/// those fall back to the route key's path.
fn error_path(path: &str, route: &str) -> String {
    if path.starts_with("http") {
        route.split_once(' ').map_or(route, |(_, path)| path).to_string()
    } else {
        path.to_string()
    }
}

#[async_trait]
impl DiscordRest for HttpRest {
    async fn request(&self, request: RestRequest) -> GuildResult<Value> {
        let route = request.route_key();
        self.retry.run(|| self.send_once(&request, &route)).await
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> GuildResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GuildError::http(format!("Download failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(GuildError::operation(format!(
                "Download failed: HTTP {}",
                response.status().as_u16()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GuildError::http(format!("Download failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_join_the_api_base() {
        let rest = HttpRest::new("token", Duration::from_secs(5))
            .unwrap()
            .with_api_base("http://localhost:9999/api/");
        assert_eq!(rest.url("/guilds/1"), "http://localhost:9999/api/guilds/1");
        assert_eq!(
            rest.url("https://discord.com/api/webhooks/1/abc"),
            "https://discord.com/api/webhooks/1/abc"
        );
    }

    #[test]
    fn test_webhook_error_paths_hide_the_token() {
        let request = RestRequest::post("https://discord.com/api/webhooks/1/abc");
        assert_eq!(
            error_path(request.path(), &request.route_key()),
            "/webhooks/1/:token"
        );
        assert_eq!(error_path("/channels/5", "GET /channels/5"), "/channels/5");
    }
}
