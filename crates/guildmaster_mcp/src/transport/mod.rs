//! Transports carrying JSON-RPC messages to the [`McpServer`](crate::McpServer).
//!
//! - [`stdio`]: newline-delimited messages on stdin/stdout
//! - [`http`]: `POST /mcp`, the SSE pair `GET /sse` + `POST /message`,
//!   `GET /health` and a plain-text banner

pub mod http;
pub mod stdio;

pub use http::{HttpState, router, serve_http};
pub use stdio::serve_stdio;
