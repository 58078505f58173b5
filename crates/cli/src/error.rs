//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The tool server did not answer the startup probe.
    #[error("MCP server not reachable at {url}")]
    Connection { url: String },

    /// The tool server could not be spawned or refused the handshake.
    #[error("failed to start tool server: {0}")]
    Spawn(String),

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred on the MCP channel.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
