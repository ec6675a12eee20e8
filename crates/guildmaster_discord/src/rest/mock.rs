//! Scripted in-memory REST backend for tests.

use super::{DiscordRest, Method, RestRequest};
use async_trait::async_trait;
use guildmaster_error::{GuildError, GuildErrorKind, GuildResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Error(GuildError),
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: String,
    reply: Reply,
}

/// A [`DiscordRest`] that answers from a script and records every request.
///
/// Routes match on method and exact path (query strings are ignored). When
/// the same route is registered twice the later registration wins, so tests
/// can start from a fixture and override single responses. Unmatched routes
/// answer with a Discord-style 404.
#[derive(Debug, Default)]
pub struct MockRest {
    routes: Mutex<Vec<Route>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    log: Mutex<Vec<RestRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockRest {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        lock(&self.routes).push(Route {
            method,
            path: path.to_string(),
            reply,
        });
        self
    }

    /// Answer `method path` with a JSON body.
    pub fn on(&self, method: Method, path: &str, body: Value) -> &Self {
        self.push(method, path, Reply::Json(body))
    }

    /// Answer `method path` with an error.
    pub fn on_error(&self, method: Method, path: &str, error: GuildError) -> &Self {
        self.push(method, path, Reply::Error(error))
    }

    /// Answer `method path` with a Discord API error of the given status.
    pub fn on_status(&self, method: Method, path: &str, status: u16, message: &str) -> &Self {
        let error = GuildError::new(GuildErrorKind::DiscordApi {
            message: message.to_string(),
            code: None,
            status: Some(status),
            method: method.to_string(),
            path: path.to_string(),
        });
        self.on_error(method, path, error)
    }

    /// Serve `bytes` for downloads of `url`.
    pub fn with_download(&self, url: &str, bytes: Vec<u8>) -> &Self {
        lock(&self.downloads).insert(url.to_string(), bytes);
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<RestRequest> {
        lock(&self.log).clone()
    }

    /// Requests received for one route.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RestRequest> {
        lock(&self.log)
            .iter()
            .filter(|request| *request.method() == method && request.path() == path)
            .cloned()
            .collect()
    }

    /// Requests received other than reads.
    pub fn mutations(&self) -> Vec<RestRequest> {
        lock(&self.log)
            .iter()
            .filter(|request| *request.method() != Method::Get)
            .cloned()
            .collect()
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        lock(&self.log).len()
    }
}

#[async_trait]
impl DiscordRest for MockRest {
    async fn request(&self, request: RestRequest) -> GuildResult<Value> {
        let method = *request.method();
        let path = request.path().clone();
        lock(&self.log).push(request);

        let reply = lock(&self.routes)
            .iter()
            .rev()
            .find(|route| route.method == method && route.path == path)
            .map(|route| route.reply.clone());

        match reply {
            Some(Reply::Json(body)) => Ok(body),
            Some(Reply::Error(error)) => Err(error),
            None => Err(GuildError::new(GuildErrorKind::DiscordApi {
                message: "404: Not Found".to_string(),
                code: Some(0),
                status: Some(404),
                method: method.to_string(),
                path,
            })),
        }
    }

    async fn download(&self, url: &str) -> GuildResult<Vec<u8>> {
        lock(&self.downloads)
            .get(url)
            .cloned()
            .ok_or_else(|| GuildError::operation(format!("Download failed: HTTP 404 for {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_later_registration_wins() {
        let rest = MockRest::new();
        rest.on(Method::Get, "/guilds/1", json!({"id": "1", "name": "Old"}))
            .on(Method::Get, "/guilds/1", json!({"id": "1", "name": "New"}));

        let guild = rest.request(RestRequest::get("/guilds/1")).await.unwrap();
        assert_eq!(guild["name"], "New");
    }

    #[tokio::test]
    async fn test_unmatched_routes_are_not_found() {
        let rest = MockRest::new();
        let err = rest
            .request(RestRequest::delete("/channels/9"))
            .await
            .unwrap_err();
        assert!(err.kind().is_not_found());
        assert_eq!(rest.requests_to(Method::Delete, "/channels/9").len(), 1);
        assert_eq!(rest.mutations().len(), 1);
    }
}
