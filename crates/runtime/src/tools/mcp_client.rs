//! Stdio connection to a `sqlite-mcp` child process, using the rmcp SDK.
//!
//! ```ignore
//! use runtime::tools::{McpClient, StdioServer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = StdioServer::new("sqlite-mcp").db("agent.db");
//! let client = McpClient::spawn(&server).await?;
//! let tools = client.list_tools().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::{RoleClient, RunningService},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, info};

/// Error type for stdio MCP operations.
pub type McpError = Box<dyn std::error::Error + Send + Sync>;

/// How to launch the SQLite tool host on stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServer {
    /// Server binary, `sqlite-mcp` unless configured otherwise.
    pub command: String,
    /// Database file handed to `--db`. The server default applies when unset.
    pub db: Option<PathBuf>,
    /// Extra arguments passed through verbatim.
    pub args: Vec<String>,
}

impl StdioServer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            db: None,
            args: Vec::new(),
        }
    }

    pub fn db(mut self, path: impl Into<PathBuf>) -> Self {
        self.db = Some(path.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument list. Selects the stdio transport and the database
    /// unless the extra arguments already do.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if !self.has_flag("server_type") {
            argv.extend(["--server_type".to_string(), "stdio".to_string()]);
        }
        match &self.db {
            Some(db) if !self.has_flag("db") => {
                argv.extend(["--db".to_string(), db.display().to_string()]);
            }
            _ => {}
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn has_flag(&self, name: &str) -> bool {
        let underscored = format!("--{name}");
        let dashed = format!("--{}", name.replace('_', "-"));
        self.args.iter().any(|arg| {
            let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
            flag == underscored || flag == dashed
        })
    }
}

/// An MCP client connected to a spawned tool host.
pub struct McpClient {
    service: Arc<RunningService<RoleClient, ()>>,
}

impl McpClient {
    /// Spawn the tool host and run the MCP handshake with it.
    pub async fn spawn(server: &StdioServer) -> Result<Self, McpError> {
        let argv = server.argv();
        info!(
            command = %server.command,
            db = ?server.db,
            "spawning SQLite tool host on stdio"
        );
        debug!(args = ?argv, "tool host arguments");

        let transport = TokioChildProcess::new(Command::new(&server.command).configure(|cmd| {
            cmd.args(&argv);
        }))?;
        let service = ().serve(transport).await?;

        Ok(Self {
            service: Arc::new(service),
        })
    }

    /// Tools published by the host.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let response = self.service.list_tools(Default::default()).await?;
        debug!(count = response.tools.len(), "listed tools");
        Ok(response.tools)
    }

    /// Call a tool with the given name and arguments.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = CallToolRequestParams {
            name: name.into().into(),
            arguments,
            meta: None,
            task: None,
        };
        Ok(self.service.call_tool(params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_stdio_and_database() {
        let server = StdioServer::new("sqlite-mcp").db("/tmp/agent.db");
        assert_eq!(
            server.argv(),
            ["--server_type", "stdio", "--db", "/tmp/agent.db"]
        );
    }

    #[test]
    fn no_db_leaves_the_server_default() {
        assert_eq!(StdioServer::new("sqlite-mcp").argv(), ["--server_type", "stdio"]);
    }

    #[test]
    fn explicit_flags_are_not_repeated() {
        let server = StdioServer::new("sqlite-mcp")
            .db("ignored.db")
            .args(["--server-type=stdio", "--db", "mine.db"]);
        assert_eq!(server.argv(), ["--server-type=stdio", "--db", "mine.db"]);
    }
}
