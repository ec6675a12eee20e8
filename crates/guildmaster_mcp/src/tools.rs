//! Tools the server advertises.

use crate::catalog::{self, ActionName, TOOL_NAME};
use crate::dispatch::Dispatcher;
use crate::gate::Gate;
use crate::{McpError, McpResult};
use async_trait::async_trait;
use guildmaster_discord::Outcome;
use guildmaster_error::{GuildError, GuildResult};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

/// Trait for MCP tools.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Returns the tool name.
    fn name(&self) -> &str;

    /// Returns the tool description for the agent.
    fn description(&self) -> String;

    /// Returns the input schema as JSON Schema.
    fn input_schema(&self) -> Value;

    /// Executes the tool with the given arguments.
    async fn execute(&self, arguments: Value) -> GuildResult<Outcome>;

    /// The `tools/list` entry for this tool.
    fn definition(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

/// Registry of tools by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn McpTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.get(name).cloned()
    }

    /// Lists all registered tools, ordered by name.
    pub fn list(&self) -> Vec<Arc<dyn McpTool>> {
        self.tools.values().cloned().collect()
    }

    /// Executes a tool by name.
    ///
    /// A bare action name (`send_message`) is accepted as a call of
    /// `discord_manage` with that action.
    pub async fn execute(&self, name: &str, arguments: Value) -> McpResult<Outcome> {
        if let Some(tool) = self.get(name) {
            return Ok(tool.execute(arguments).await?);
        }

        let manage = self.get(TOOL_NAME);
        match (manage, ActionName::from_str(name)) {
            (Some(tool), Ok(action)) => {
                let mut arguments = match arguments {
                    Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                arguments.insert("action".to_string(), json!(action.as_str()));
                Ok(tool.execute(Value::Object(arguments)).await?)
            }
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}

/// `discord_manage`: `{action, ...params}` through the gate to the
/// dispatcher.
#[derive(Debug, Clone)]
pub struct DiscordManageTool {
    dispatcher: Dispatcher,
    gate: Arc<Gate>,
}

impl DiscordManageTool {
    /// Tool dispatching through `gate`.
    pub fn new(dispatcher: Dispatcher, gate: Arc<Gate>) -> Self {
        Self { dispatcher, gate }
    }
}

#[async_trait]
impl McpTool for DiscordManageTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> String {
        catalog::catalog_text()
    }

    fn input_schema(&self) -> Value {
        catalog::input_schema()
    }

    async fn execute(&self, arguments: Value) -> GuildResult<Outcome> {
        let mut params = match arguments {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => return Err(GuildError::validation("Arguments must be an object")),
        };
        let action = match params.remove("action") {
            Some(Value::String(action)) if !action.is_empty() => action,
            _ => {
                return Err(GuildError::validation(
                    "Action parameter is required for discord_manage tool",
                ));
            }
        };
        let params = Value::Object(params);

        self.gate
            .run(&action, &params, || {
                self.dispatcher.dispatch_named(&action, params.clone())
            })
            .await
    }
}
