//! Stdio transport endpoint
//!
//! Newline-delimited JSON-RPC over the process's standard streams. Exactly
//! one implicit session per process run; it never enters the session table.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::mcp::rpc::json_rpc_error;
use crate::mcp::server::McpEngine;

/// Serve requests from stdin until it reaches end of file.
pub async fn serve(engine: Arc<McpEngine>) -> std::io::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve_streams(engine, reader, writer).await
}

/// Generic over the stream pair so the loop can be driven from buffers.
pub async fn serve_streams<R, W>(
    engine: Arc<McpEngine>,
    reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(payload) => engine.handle_json_rpc_value(payload).await,
            Err(_) => Some(json_rpc_error(None, -32700, "Parse error")),
        };

        if let Some(response) = response {
            let frame =
                serde_json::to_string(&response).expect("jsonrpc response serialization");
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    debug!("stdio input closed");
    Ok(())
}
