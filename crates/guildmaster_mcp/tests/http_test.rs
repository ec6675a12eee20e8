//! JSON-RPC over the HTTP router with the real `discord_manage` tool.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use guildmaster_discord::testing::fixture;
use guildmaster_mcp::transport::{HttpState, router};
use guildmaster_mcp::{Dispatcher, Gate, McpServer, registry};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> axum::Router {
    let (client, _rest) = fixture().await;
    let tools = registry(Dispatcher::new(Arc::new(client)), Arc::new(Gate::default()));
    let server = Arc::new(McpServer::builder().tools(tools).build());
    router(HttpState::new(server))
}

async fn post_rpc(body: Value) -> (StatusCode, Value) {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_tools_list_advertises_discord_manage() {
    let (status, body) = post_rpc(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    assert_eq!(status, StatusCode::OK);
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "discord_manage");
    let actions = tools[0]["inputSchema"]["properties"]["action"]["enum"]
        .as_array()
        .unwrap();
    assert!(actions.contains(&json!("create_automod_rule")));
}

#[tokio::test]
async fn test_tools_call_success_is_text_content() {
    let (_, body) = post_rpc(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {"name": "discord_manage", "arguments": {"action": "get_server_info"}}
    }))
    .await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["result"]["content"][0]["type"], "text");
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Server Name: Test Guild"), "{}", text);
}

#[tokio::test]
async fn test_tools_call_failure_is_rpc_error() {
    let (status, body) = post_rpc(json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {"name": "discord_manage", "arguments": {"action": "launch_rockets"}}
    }))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["error"]["message"], "Unknown operation: launch_rockets");
}
