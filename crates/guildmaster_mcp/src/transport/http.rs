//! HTTP transport: JSON-RPC over `POST /mcp`, server-sent events over
//! `GET /sse` + `POST /message`, and a health check.

use crate::error::codes;
use crate::server::{McpServer, ToolErrors};
use crate::{McpError, McpResult};
use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, instrument, warn};

type Sessions = HashMap<String, mpsc::UnboundedSender<Value>>;

/// Shared state of the HTTP routes.
#[derive(Clone)]
pub struct HttpState {
    server: Arc<McpServer>,
    sessions: Arc<Mutex<Sessions>>,
}

impl HttpState {
    /// State serving `server` with no open sessions.
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of open SSE streams.
    pub fn active_connections(&self) -> usize {
        self.sessions().len()
    }

    fn session(&self, id: &str) -> Option<mpsc::UnboundedSender<Value>> {
        self.sessions().get(id).cloned()
    }

    fn open_session(&self) -> SessionStream {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions().insert(id.clone(), tx);
        info!(session = %id, "SSE connection opened");
        SessionStream {
            id,
            messages: UnboundedReceiverStream::new(rx),
            sessions: self.sessions.clone(),
        }
    }
}

/// Responses queued for one SSE client. Dropping it closes the session.
struct SessionStream {
    id: String,
    messages: UnboundedReceiverStream<Value>,
    sessions: Arc<Mutex<Sessions>>,
}

impl Stream for SessionStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Value>> {
        Pin::new(&mut self.messages).poll_next(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(&self.id);
        info!(session = %self.id, "SSE connection closed");
    }
}

/// Creates the HTTP router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/mcp", post(rpc))
        .route("/", get(banner).post(rpc))
        .route("/sse", get(sse))
        .route("/message", post(message))
        .route("/health", get(health))
        .fallback(banner)
        .layer(cors())
        .with_state(state)
}

/// Serve `server` over HTTP on `addr` until `shutdown` resolves.
#[instrument(skip(server, shutdown))]
pub async fn serve_http(
    server: Arc<McpServer>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> McpResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| McpError::Transport(format!("Cannot bind {}: {}", addr, e)))?;
    info!(%addr, "Discord MCP server running on HTTP");
    info!("SSE endpoint: http://{}/sse", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router(HttpState::new(server)))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| McpError::Transport(e.to_string()))
}

/// Any origin; preflight requests are answered here.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Stateless JSON-RPC.
async fn rpc(State(state): State<HttpState>, body: String) -> Response {
    match state.server.handle_text(&body, ToolErrors::JsonRpc).await {
        Some(response) if response["error"]["code"] == codes::PARSE_ERROR => {
            (StatusCode::BAD_REQUEST, Json(response)).into_response()
        }
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Open an event stream. The first event names the endpoint to post to.
async fn sse(State(state): State<HttpState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.open_session();
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/message?sessionId={}", session.id));
    let messages = session.map(|message| {
        Ok::<_, Infallible>(Event::default().event("message").data(message.to_string()))
    });
    Sse::new(stream::once(async move { Ok(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Accept a message for an SSE session; the response goes out on its stream.
async fn message(
    State(state): State<HttpState>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let session_id = query.session_id.or_else(|| {
        headers
            .get("x-session-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });
    let Some(sender) = session_id.as_deref().and_then(|id| state.session(id)) else {
        warn!(session = ?session_id, "Message for unknown session");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Session not found"})),
        )
            .into_response();
    };

    let request: Value = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()})))
                .into_response();
        }
    };

    if let Some(response) = state.server.handle(request, ToolErrors::Envelope).await
        && sender.send(response).is_err()
    {
        debug!(session = ?session_id, "Stream closed before the response was sent");
    }
    Json(json!({"success": true})).into_response()
}

async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "server": "discord-mcp",
        "activeConnections": state.active_connections(),
    }))
}

async fn banner(State(state): State<HttpState>, headers: HeaderMap) -> Response<Body> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let text = format!(
        "Discord MCP Server\n\n\
         MCP Remote Usage:\n\
         npx -y mcp-remote {}\n\n\
         Endpoints:\n\
         - GET /sse - SSE connection\n\
         - POST /message - Message handling\n\
         - GET /health - Health check\n\n\
         Active connections: {}",
        host,
        state.active_connections()
    );
    ([(header::CONTENT_TYPE, "text/plain")], text).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use axum::http;
    use tower::ServiceExt;

    fn state() -> HttpState {
        HttpState::new(Arc::new(McpServer::builder().tools(ToolRegistry::new()).build()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_is_answered_with_cors() {
        let response = router(state())
            .oneshot(
                http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/mcp")
                    .header(header::ORIGIN, "https://agent.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST"), "{}", methods);
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
            .to_str()
            .unwrap()
            .to_lowercase();
        assert!(allowed.contains("authorization"), "{}", allowed);
    }

    #[tokio::test]
    async fn test_plain_responses_allow_any_origin() {
        let response = router(state())
            .oneshot(
                http::Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://agent.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_health_counts_sessions() {
        let state = state();
        let _session = state.open_session();
        let response = router(state.clone())
            .oneshot(http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "server": "discord-mcp", "activeConnections": 1})
        );
    }

    #[tokio::test]
    async fn test_dropped_stream_closes_session() {
        let state = state();
        let session = state.open_session();
        assert_eq!(state.active_connections(), 1);
        drop(session);
        assert_eq!(state.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_malformed_rpc_is_bad_request() {
        let response = router(state())
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/mcp")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_message_routes_response_to_stream() {
        let state = state();
        let mut session = state.open_session();
        let uri = format!("/message?sessionId={}", session.id);
        let response = router(state.clone())
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"success": true}));

        let pushed = session.next().await.unwrap();
        assert_eq!(pushed["id"], 3);
        assert_eq!(pushed["result"], json!({}));
    }

    #[tokio::test]
    async fn test_message_for_unknown_session() {
        let response = router(state())
            .oneshot(
                http::Request::builder()
                    .method(Method::POST)
                    .uri("/message?sessionId=missing")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "Session not found"}));
    }

    #[tokio::test]
    async fn test_banner_names_endpoints() {
        let response = router(state())
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .header(header::HOST, "bot.example:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("npx -y mcp-remote bot.example:3000"));
        assert!(text.contains("- GET /sse - SSE connection"));
        assert!(text.contains("Active connections: 0"));
    }
}
