//! The three SQL tools as the agent sees them.
//!
//! Each descriptor names a server tool and decides how its raw result is
//! turned into the observation text the model reads next.

use serde_json::Value;
use storage::Row;
use tracing::{debug, warn};

use crate::tools::{ToolCall, ToolError, ToolHost, ToolSpec};
use crate::{Error, Result};

/// Observation for a write that went through.
pub const WRITE_OK: &str = "Statement executed successfully.";

/// Observation for a write the server reported as failed.
pub const WRITE_FAILED: &str = "Add error: statement was not executed";

/// Observation for a read that matched nothing.
pub const NO_DATA: &str = "No data found.";

/// How a tool's result is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Statements run for their effect (`INSERT`, `CREATE TABLE`).
    Write,
    /// Statements run for their rows (`SELECT`).
    Read,
}

/// A tool offered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTool {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolKind,
}

pub const ADD_DATA: SqlTool = SqlTool {
    name: "add_data",
    description: "Add data using INSERT INTO ...",
    kind: ToolKind::Write,
};

pub const READ_DATA: SqlTool = SqlTool {
    name: "read_data",
    description: "Read data using SELECT ...",
    kind: ToolKind::Read,
};

pub const CREATE_TABLE: SqlTool = SqlTool {
    name: "create_table",
    description: "Create a table using CREATE TABLE ...",
    kind: ToolKind::Write,
};

/// Every tool the agent may call, in prompt order.
pub static SQL_TOOLS: [SqlTool; 3] = [ADD_DATA, READ_DATA, CREATE_TABLE];

/// Look up a tool by the name the model wrote.
pub fn find(name: &str) -> Option<&'static SqlTool> {
    SQL_TOOLS.iter().find(|tool| tool.name == name)
}

/// Comma-separated tool names, as listed in the prompt.
pub fn tool_names() -> String {
    SQL_TOOLS.iter().map(|t| t.name).collect::<Vec<_>>().join(", ")
}

/// Fail unless the host offers every tool the agent relies on.
pub fn verify(specs: &[ToolSpec]) -> Result<()> {
    let missing: Vec<&str> = SQL_TOOLS
        .iter()
        .map(|tool| tool.name)
        .filter(|name| !specs.iter().any(|spec| spec.name == *name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Tool(format!(
            "tool host does not offer: {}",
            missing.join(", ")
        )))
    }
}

impl SqlTool {
    /// Run the tool with `input` as its query and describe the outcome.
    ///
    /// Never fails: dispatch errors become part of the observation.
    pub async fn invoke<H: ToolHost>(&self, host: &H, call_id: &str, input: &str) -> String {
        let call = ToolCall::query(call_id, self.name, input.trim());
        debug!(tool = self.name, id = call_id, "dispatching tool call");

        let outcome = host.execute(&call).await;
        if let Err(e) = &outcome {
            warn!(tool = self.name, "tool call failed: {e}");
        }
        self.observe(outcome)
    }

    /// Render a tool outcome as observation text.
    pub fn observe(&self, outcome: std::result::Result<Value, ToolError>) -> String {
        match (self.kind, outcome) {
            (ToolKind::Write, Ok(Value::Bool(true))) => WRITE_OK.to_string(),
            (ToolKind::Write, Ok(Value::Bool(false))) => WRITE_FAILED.to_string(),
            (ToolKind::Write, Ok(value)) => render_rows(&value).unwrap_or_else(|| WRITE_OK.to_string()),
            (ToolKind::Write, Err(e)) => format!("Add error: {e}"),
            (ToolKind::Read, Ok(value)) => render_rows(&value).unwrap_or_else(|| NO_DATA.to_string()),
            (ToolKind::Read, Err(e)) => format!("Read error: {e}"),
        }
    }
}

/// One `| a | b |` line per row. `None` when there is nothing to show.
fn render_rows(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Array(_) => match serde_json::from_value::<Vec<Row>>(value.clone()) {
            Ok(rows) => Some(
                rows.iter()
                    .map(Row::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(_) => Some(value.to_string()),
        },
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
