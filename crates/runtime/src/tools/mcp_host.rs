//! Tool host backed by a server process on stdio.

use super::{McpClient, McpError, StdioServer, ToolCall, ToolError, ToolHost, ToolSpec, decode_output};
use serde_json::Value;

/// Tool host backed by a spawned MCP server.
pub struct McpToolHost {
    client: McpClient,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Spawn the server and cache its tool specs.
    pub async fn spawn(server: &StdioServer) -> Result<Self, McpError> {
        let client = McpClient::spawn(server).await?;
        let specs = client
            .list_tools()
            .await?
            .into_iter()
            .map(ToolSpec::from)
            .collect();
        Ok(Self { client, specs })
    }
}

fn arguments(input: &Value) -> Result<Option<serde_json::Map<String, Value>>, ToolError> {
    match input {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.clone())),
        other => Err(ToolError::InvalidInput(format!(
            "tool arguments must be an object, got {other}"
        ))),
    }
}

/// Collapse an rmcp tool result into the tool's decoded text output.
fn into_output(result: Value) -> Result<Value, ToolError> {
    let text = result["content"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result["isError"].as_bool().unwrap_or(false) {
        return Err(ToolError::Execution(text));
    }
    Ok(decode_output(&text))
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = arguments(&call.input)?;
        let result = self
            .client
            .call_tool(&call.name, arguments)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let result = serde_json::to_value(&result)
            .map_err(|e| ToolError::Execution(format!("serialize result: {e}")))?;
        into_output(result)
    }
}
