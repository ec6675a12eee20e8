//! Protocol-level errors of the MCP server.
//!
//! Tool failures travel as [`GuildError`] and are rendered into the result
//! envelope; these are the failures of the JSON-RPC layer around them.

use guildmaster_error::GuildError;

/// JSON-RPC error codes used by the server.
pub mod codes {
    /// Malformed JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Well-formed JSON that is not a request.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// A tool call failed (HTTP transport only).
    pub const TOOL_FAILED: i64 = -32000;
}

/// Errors that can occur in the MCP server.
#[derive(Debug, Clone, derive_more::Display, derive_more::From)]
pub enum McpError {
    /// Request body is not JSON
    #[display("Parse error")]
    #[from(skip)]
    Parse,

    /// Request is not a JSON-RPC call
    #[display("Invalid Request: {}", _0)]
    #[from(skip)]
    InvalidRequest(String),

    /// Method not implemented
    #[display("Method not found")]
    #[from(skip)]
    MethodNotFound(String),

    /// Tool not registered
    #[display("Unknown tool: {}", _0)]
    #[from(skip)]
    ToolNotFound(String),

    /// Tool execution failed
    #[display("{}", _0.kind())]
    Tool(GuildError),

    /// Transport could not be started or broke
    #[display("Transport error: {}", _0)]
    #[from(skip)]
    Transport(String),
}

impl std::error::Error for McpError {}

impl McpError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            McpError::Parse => codes::PARSE_ERROR,
            McpError::InvalidRequest(_) => codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            McpError::ToolNotFound(_) | McpError::Tool(_) | McpError::Transport(_) => {
                codes::TOOL_FAILED
            }
        }
    }
}

/// Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_displays_kind_only() {
        let err: McpError = GuildError::validation("Unknown operation: frobnicate").into();
        assert_eq!(err.to_string(), "Unknown operation: frobnicate");
        assert_eq!(err.code(), codes::TOOL_FAILED);
    }

    #[test]
    fn test_protocol_codes() {
        assert_eq!(McpError::Parse.code(), -32700);
        assert_eq!(McpError::MethodNotFound("x".into()).to_string(), "Method not found");
        assert_eq!(McpError::ToolNotFound("x".into()).to_string(), "Unknown tool: x");
    }
}
