use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    Execution(String),
}
