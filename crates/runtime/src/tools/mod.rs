//! Tool hosts: where the agent's tool calls actually run.
//!
//! A [`ToolHost`] publishes tool specs and executes calls. The SQL tools
//! normally live in a separate server process, reached either over
//! HTTP + SSE ([`SseToolHost`]) or by spawning it on stdio
//! ([`McpToolHost`]).

mod empty;
pub mod errors;
mod host;
mod mcp_client;
mod mcp_host;
mod sse_host;
mod types;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use mcp_client::{McpClient, McpError, StdioServer};
pub use mcp_host::McpToolHost;
pub use sse_host::SseToolHost;
pub use host::ToolHost;
pub use types::{ToolCall, ToolSpec, decode_output};

use serde_json::Value;

/// A tool host chosen at runtime from configuration.
pub enum AnyToolHost {
    Sse(SseToolHost),
    Stdio(McpToolHost),
}

impl From<SseToolHost> for AnyToolHost {
    fn from(host: SseToolHost) -> Self {
        Self::Sse(host)
    }
}

impl From<McpToolHost> for AnyToolHost {
    fn from(host: McpToolHost) -> Self {
        Self::Stdio(host)
    }
}

impl ToolHost for AnyToolHost {
    fn specs(&self) -> &[ToolSpec] {
        match self {
            Self::Sse(host) => host.specs(),
            Self::Stdio(host) => host.specs(),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        match self {
            Self::Sse(host) => host.execute(call).await,
            Self::Stdio(host) => host.execute(call).await,
        }
    }
}
