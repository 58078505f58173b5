//! Tool host backed by a server reached over HTTP + SSE.

use super::{ToolCall, ToolError, ToolHost, ToolSpec, decode_output};
use mcp::{ChannelOptions, SseClient};
use serde_json::Value;
use tracing::debug;

/// Tool host backed by [`SseClient`].
pub struct SseToolHost {
    client: SseClient,
    specs: Vec<ToolSpec>,
    read_timeout_ms: u64,
}

impl SseToolHost {
    /// Connect, run the MCP handshake and cache the tool specs.
    pub async fn connect(base_url: &str, options: ChannelOptions) -> mcp::Result<Self> {
        let client = SseClient::connect(base_url, options).await?;
        client.initialize().await?;
        let specs: Vec<ToolSpec> = client.tools().await.into_iter().map(ToolSpec::from).collect();
        debug!(tools = specs.len(), "tool specs cached");
        Ok(Self {
            client,
            specs,
            read_timeout_ms: options.read_timeout.as_millis() as u64,
        })
    }

    pub fn client(&self) -> &SseClient {
        &self.client
    }
}

impl ToolHost for SseToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        if !self.specs.iter().any(|s| s.name == call.name) {
            return Err(ToolError::NotFound(call.name.clone()));
        }

        let arguments = match &call.input {
            Value::Null => None,
            other => Some(other.clone()),
        };

        match self.client.call_tool(&call.name, arguments).await {
            Ok(result) => Ok(decode_output(&result.joined_text())),
            Err(mcp::Error::Timeout) => Err(ToolError::Timeout(self.read_timeout_ms)),
            Err(mcp::Error::ToolCallFailed(message)) => Err(ToolError::Execution(message)),
            Err(e) => Err(ToolError::Execution(e.to_string())),
        }
    }
}
