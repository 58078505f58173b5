//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! stdout carries protocol traffic only; logging must go to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::MAX_OUTPUT_SIZE;
use crate::error::Result;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::{Dispatcher, ToolProvider};

/// Serve requests from the process's stdin until EOF.
pub async fn serve_stdio<P: ToolProvider>(dispatcher: Arc<Dispatcher<P>>) -> Result<()> {
    serve_lines(dispatcher, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve newline-delimited requests from `input`, one at a time.
pub async fn serve_lines<P, R, W>(dispatcher: Arc<Dispatcher<P>>, input: R, mut output: W) -> Result<()>
where
    P: ToolProvider,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = if line.len() > MAX_OUTPUT_SIZE {
            error!(size = line.len(), "message too large");
            Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "message too large"),
            ))
        } else {
            match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) => dispatcher.handle(request).await,
                Err(e) => {
                    error!("invalid JSON-RPC: {e}");
                    Some(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e.to_string())))
                }
            }
        };

        if let Some(response) = response {
            let json = serde_json::to_string(&response)?;
            output.write_all(json.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
    }

    info!("EOF on stdin, shutting down");
    Ok(())
}
