//! Newline-delimited JSON-RPC over stdin/stdout.

use crate::server::{McpServer, ToolErrors};
use crate::{McpError, McpResult};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

/// Serve on the process's stdin and stdout until stdin closes.
pub async fn serve_stdio(server: Arc<McpServer>) -> McpResult<()> {
    serve_lines(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve requests read line by line from `input`, writing one response per
/// line to `output`.
///
/// Requests run concurrently; responses are written in completion order.
#[instrument(skip_all)]
pub async fn serve_lines<R, W>(server: Arc<McpServer>, input: R, mut output: W) -> McpResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    info!("Listening on stdio");
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = input.lines();
    let mut calls = tokio::task::JoinSet::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| McpError::Transport(format!("stdin: {}", e)))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let server = server.clone();
        let tx = tx.clone();
        calls.spawn(async move {
            if let Some(response) = server.handle_text(&line, ToolErrors::Envelope).await {
                // The writer only stops once every sender is gone.
                let _ = tx.send(response.to_string());
            }
        });
    }
    debug!("stdin closed, draining in-flight calls");

    while calls.join_next().await.is_some() {}
    drop(tx);

    writer
        .await
        .map_err(|e| McpError::Transport(e.to_string()))?
        .map_err(|e| McpError::Transport(format!("stdout: {}", e)))
}
