//! Empty tool host implementation.

use crate::tools::{ToolCall, ToolError, ToolHost, ToolSpec};
use serde_json::Value;

/// A tool host with no tools. Every call fails with `NotFound`.
#[derive(Debug, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &[]
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}
