//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("server not initialized")]
    NotInitialized,

    #[error("server closed the event stream")]
    ServerExited,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
