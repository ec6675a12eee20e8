//! Model Context Protocol (MCP) server for Discord administration.
//!
//! One tool, `discord_manage`, takes `{action, ...params}` and runs the named
//! action against a [`DiscordClient`](guildmaster_discord::DiscordClient):
//!
//! - [`catalog`]: the closed [`ActionName`] set and the advertised schema
//! - [`dispatch`]: wire name and parameter bag to exactly one client call
//! - [`gate`]: allow/deny lists, operation logging, advisory throttling
//! - [`server`]: JSON-RPC method routing shared by the transports
//! - [`transport`]: stdio, HTTP JSON-RPC, SSE and health endpoints
//! - [`config`]: layered settings (bundled defaults, files, environment)
//!
//! # Usage
//!
//! ```no_run
//! use guildmaster_discord::{DiscordClient, HttpRest};
//! use guildmaster_mcp::{Dispatcher, Gate, McpServer, registry, transport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let rest = HttpRest::new("bot-token", Duration::from_secs(30))?;
//! let client = Arc::new(DiscordClient::new(Arc::new(rest), None));
//! let tools = registry(Dispatcher::new(client), Arc::new(Gate::default()));
//! let server = Arc::new(McpServer::builder().tools(tools).build());
//! transport::serve_stdio(server).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod dispatch;
mod error;
pub mod gate;
pub mod server;
pub mod tools;
pub mod transport;

pub use catalog::{ActionName, Area};
pub use config::{LogLevel, Settings};
pub use dispatch::Dispatcher;
pub use error::{McpError, McpResult, codes};
pub use gate::Gate;
pub use server::{McpServer, McpServerBuilder, ToolErrors};
pub use tools::{DiscordManageTool, McpTool, ToolRegistry};

use std::sync::Arc;

/// Registry holding `discord_manage` over `dispatcher` and `gate`.
pub fn registry(dispatcher: Dispatcher, gate: Arc<Gate>) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(DiscordManageTool::new(dispatcher, gate)));
    tools
}
