//! MCP server implementation: JSON-RPC 2.0 method routing shared by every
//! transport.

use crate::tools::ToolRegistry;
use crate::{McpError, McpResult};
use guildmaster_discord::Outcome;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

/// Protocol revision announced on `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// How a failed `tools/call` is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrors {
    /// A normal result flagged `isError`, with `Error: <message>` as text
    Envelope,
    /// A JSON-RPC error with code `-32000`
    JsonRpc,
}

/// MCP server for Discord administration.
#[derive(Debug)]
pub struct McpServer {
    name: String,
    version: String,
    tools: ToolRegistry,
}

impl McpServer {
    /// Creates a new server builder.
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::default()
    }

    /// The registered tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle raw request text. Malformed JSON yields a `-32700` response
    /// with a null id.
    pub async fn handle_text(&self, text: &str, style: ToolErrors) -> Option<Value> {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle(message, style).await,
            Err(e) => {
                warn!(error = %e, "Unparsable request");
                Some(error_response(Value::Null, &McpError::Parse))
            }
        }
    }

    /// Handle one JSON-RPC message. Notifications produce no response.
    #[instrument(skip(self, message), fields(method = tracing::field::Empty))]
    pub async fn handle(&self, message: Value, style: ToolErrors) -> Option<Value> {
        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            let err = McpError::InvalidRequest("missing method".to_string());
            return Some(error_response(id.unwrap_or(Value::Null), &err));
        };
        tracing::Span::current().record("method", method);

        let Some(id) = id else {
            debug!("Notification received");
            return None;
        };

        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let result = match method {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(params, style).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        };

        Some(match result {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(err) => error_response(id, &err),
        })
    }

    fn initialize(&self) -> Value {
        info!(name = %self.name, version = %self.version, "Client initialized");
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": self.name, "version": self.version},
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<Value> = self.tools.list().iter().map(|tool| tool.definition()).collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&self, params: Value, style: ToolErrors) -> McpResult<Value> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidRequest("Tool name is required".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        debug!(tool = name, "Calling tool");

        match (self.tools.execute(name, arguments).await, style) {
            (Ok(outcome), _) => Ok(text_result(&outcome)),
            (Err(err), ToolErrors::Envelope) => Ok(error_result(&err)),
            (Err(err), ToolErrors::JsonRpc) => Err(normalized(err)),
        }
    }
}

/// Fold transport failures inside tool errors into operation failures.
fn normalized(err: McpError) -> McpError {
    match err {
        McpError::Tool(e) => McpError::Tool(e.normalize()),
        other => other,
    }
}

fn text_result(outcome: &Outcome) -> Value {
    json!({"content": [{"type": "text", "text": outcome.text()}]})
}

fn error_result(err: &McpError) -> Value {
    let text = match err {
        McpError::Tool(e) => e.clone().normalize().user_message(),
        other => format!("Error: {}", other),
    };
    warn!(error = %text, "Tool call failed");
    json!({"content": [{"type": "text", "text": text}], "isError": true})
}

fn error_response(id: Value, err: &McpError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": err.code(), "message": err.to_string()},
    })
}

/// Builder for MCP server.
#[derive(Debug, Default)]
pub struct McpServerBuilder {
    name: Option<String>,
    version: Option<String>,
    tools: Option<ToolRegistry>,
}

impl McpServerBuilder {
    /// Sets the server name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the server version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the tool registry.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Builds the server.
    pub fn build(self) -> McpServer {
        McpServer {
            name: self.name.unwrap_or_else(|| "discord-mcp-server".to_string()),
            version: self
                .version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            tools: self.tools.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::McpTool;
    use async_trait::async_trait;
    use guildmaster_error::{GuildError, GuildResult};
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl McpTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> String {
            "Echo the text argument".to_string()
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, arguments: Value) -> GuildResult<Outcome> {
            match arguments.get("text").and_then(Value::as_str) {
                Some(text) => Ok(Outcome::new(text)),
                None => Err(GuildError::http("connection reset")),
            }
        }
    }

    fn server() -> McpServer {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Echo));
        McpServer::builder().tools(tools).build()
    }

    fn call(arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "echo", "arguments": arguments}
        })
    }

    #[tokio::test]
    async fn test_initialize() {
        let response = server()
            .handle(
                json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
                ToolErrors::Envelope,
            )
            .await
            .unwrap();
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], "discord-mcp-server");
        assert_eq!(response["result"]["capabilities"], json!({"tools": {}}));
    }

    #[tokio::test]
    async fn test_notifications_have_no_response() {
        let response = server()
            .handle(
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                ToolErrors::Envelope,
            )
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = server()
            .handle(
                json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"}),
                ToolErrors::Envelope,
            )
            .await
            .unwrap();
        assert_eq!(response["id"], "a");
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["error"]["message"], "Method not found");
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = server()
            .handle_text("{not json", ToolErrors::JsonRpc)
            .await
            .unwrap();
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_tool_success_is_text_content() {
        let response = server()
            .handle(call(json!({"text": "hi"})), ToolErrors::Envelope)
            .await
            .unwrap();
        assert_eq!(
            response["result"],
            json!({"content": [{"type": "text", "text": "hi"}]})
        );
    }

    #[tokio::test]
    async fn test_tool_failure_styles() {
        let server = server();
        let envelope = server
            .handle(call(json!({})), ToolErrors::Envelope)
            .await
            .unwrap();
        assert_eq!(envelope["result"]["isError"], true);
        assert_eq!(
            envelope["result"]["content"][0]["text"],
            "Error: Operation failed: HTTP request failed: connection reset"
        );

        let rpc = server.handle(call(json!({})), ToolErrors::JsonRpc).await.unwrap();
        assert_eq!(rpc["error"]["code"], -32000);
        assert_eq!(
            rpc["error"]["message"],
            "Operation failed: HTTP request failed: connection reset"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = server()
            .handle(
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "nope"}}),
                ToolErrors::Envelope,
            )
            .await
            .unwrap();
        assert_eq!(response["result"]["content"][0]["text"], "Error: Unknown tool: nope");
    }
}
