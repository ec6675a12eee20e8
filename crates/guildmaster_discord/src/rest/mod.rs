//! The REST seam between operations and Discord.
//!
//! Operations describe a call as a [`RestRequest`] and hand it to a
//! [`DiscordRest`] implementation: [`HttpRest`] talks to Discord over reqwest,
//! [`MockRest`] replays scripted responses in tests.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use http::HttpRest;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRest;

use async_trait::async_trait;
use guildmaster_error::GuildResult;
use serde_json::Value;

/// HTTP verb of a Discord call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    /// Read
    Get,
    /// Create or act
    Post,
    /// Idempotent create
    Put,
    /// Partial update
    Patch,
    /// Remove
    Delete,
}

/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct FileUpload {
    /// Form field name (`files[0]`, `file`)
    field: String,
    /// File name reported to Discord
    file_name: String,
    /// Raw contents
    data: Vec<u8>,
}

impl FileUpload {
    /// Create an upload for the given form field.
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            data,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RestBody {
    /// No body
    #[default]
    Empty,
    /// A JSON document
    Json(Value),
    /// A multipart form with text fields and files
    Multipart {
        /// Plain text fields (`payload_json`, `name`, `tags`)
        fields: Vec<(String, String)>,
        /// Attached files
        files: Vec<FileUpload>,
    },
}

/// One call against the Discord API.
///
/// `path` is relative to the API base (`/channels/1/messages`). An absolute
/// `https://` URL is sent as-is and without the bot token, which is how
/// webhook execution URLs are called.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct RestRequest {
    method: Method,
    path: String,
    #[getter(skip)]
    query: Vec<(String, String)>,
    body: RestBody,
    /// Sent as `X-Audit-Log-Reason`
    #[getter(skip)]
    reason: Option<String>,
}

impl RestRequest {
    /// Start a request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RestBody::Empty,
            reason: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// `PUT path`
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// `PATCH path`
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = RestBody::Json(body);
        self
    }

    /// Attach a multipart body.
    pub fn multipart(mut self, fields: Vec<(String, String)>, files: Vec<FileUpload>) -> Self {
        self.body = RestBody::Multipart { fields, files };
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present.
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Record an audit log reason.
    pub fn reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason.map(str::to_string);
        self
    }

    /// Query parameters in insertion order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// The audit log reason, if one was recorded.
    pub fn audit_reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// The JSON body, if the request has one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            RestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Rate-limit route key: the method plus the path with every id that is
    /// not a major parameter (channel, guild, webhook) replaced by `:id`.
    pub fn route_key(&self) -> String {
        format!("{} {}", self.method, route_path(&self.path))
    }
}

fn route_path(path: &str) -> String {
    let path = if path.starts_with("http") {
        path.find("/webhooks/").map_or(path, |at| &path[at..])
    } else {
        path
    };

    let mut previous = "";
    let mut segments = Vec::new();
    for segment in path.split('/') {
        let is_id = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
        let normalized = if previous == "webhooks" && is_id {
            segment.to_string()
        } else if is_id && matches!(previous, "channels" | "guilds") {
            segment.to_string()
        } else if is_id {
            ":id".to_string()
        } else if segments.len() >= 2 && segments[segments.len() - 2] == "webhooks" {
            ":token".to_string()
        } else {
            segment.to_string()
        };
        previous = segment;
        segments.push(normalized);
    }
    segments.join("/")
}

/// A Discord REST backend.
#[async_trait]
pub trait DiscordRest: Send + Sync + std::fmt::Debug {
    /// Perform one API call and return its JSON body (`Null` for 204).
    async fn request(&self, request: RestRequest) -> GuildResult<Value>;

    /// Fetch the raw bytes behind a URL (attachments, emoji images).
    async fn download(&self, url: &str) -> GuildResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key_keeps_major_parameters() {
        let request = RestRequest::get("/channels/123/messages/456");
        assert_eq!(request.route_key(), "GET /channels/123/messages/:id");

        let request = RestRequest::put("/guilds/1/members/2/roles/3");
        assert_eq!(request.route_key(), "PUT /guilds/1/members/:id/roles/:id");
    }

    #[test]
    fn test_route_key_hides_webhook_tokens() {
        let request = RestRequest::post("https://discord.com/api/webhooks/77/s3cr3t");
        assert_eq!(request.route_key(), "POST /webhooks/77/:token");
    }

    #[test]
    fn test_builder_collects_query_and_reason() {
        let request = RestRequest::get("/guilds/1/audit-logs")
            .query("limit", 50)
            .query_opt("action_type", None::<u32>)
            .reason(Some("cleanup"));
        assert_eq!(request.query_pairs(), &[("limit".to_string(), "50".to_string())]);
        assert_eq!(request.audit_reason(), Some("cleanup"));
    }
}
