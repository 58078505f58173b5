//! Tool-related types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call requested by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    /// A call passing `query` as the tool's single argument.
    pub fn query(id: impl Into<String>, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: serde_json::json!({ "query": query.into() }),
        }
    }
}

/// A tool definition exposed to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl From<mcp::Tool> for ToolSpec {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema: tool.input_schema,
        }
    }
}

impl From<rmcp::model::Tool> for ToolSpec {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            schema: Value::Object((*tool.input_schema).clone()),
        }
    }
}

/// Turn a tool's text output back into a value.
///
/// The SQL tools encode their results as JSON text (`true`, `[[1,"a"]]`).
/// Text that is not JSON is kept as a string.
pub fn decode_output(text: &str) -> Value {
    serde_json::from_str(text.trim()).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_json_and_keeps_plain_text() {
        assert_eq!(decode_output("true"), json!(true));
        assert_eq!(decode_output(r#"[[1,"car"]]"#), json!([[1, "car"]]));
        assert_eq!(decode_output("no such table"), json!("no such table"));
    }

    #[test]
    fn query_call_wraps_argument() {
        let call = ToolCall::query("step-1", "read_data", "SELECT 1");
        assert_eq!(call.input, json!({"query": "SELECT 1"}));
    }

    #[test]
    fn spec_from_mcp_tool() {
        let spec = ToolSpec::from(mcp::Tool {
            name: "read_data".into(),
            description: None,
            input_schema: json!({"type": "object"}),
        });
        assert_eq!(spec.name, "read_data");
        assert_eq!(spec.description, "");
    }
}
