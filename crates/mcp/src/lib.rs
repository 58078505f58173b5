//! MCP (Model Context Protocol) plumbing for the SQL tool host and agent.
//!
//! This crate carries both ends of the remote tool channel:
//!
//! - **Server side**: a [`ToolProvider`] publishes tools, a [`Dispatcher`]
//!   maps JSON-RPC requests onto it, and [`serve_stdio`] / [`serve_sse`]
//!   bind it to a transport.
//! - **Client side**: [`SseClient`] talks to a server over HTTP + SSE, and
//!   [`probe`] checks reachability before anything else happens.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ChannelOptions, SseClient};
//!
//! # async fn example() -> mcp::Result<()> {
//! if !mcp::probe("http://127.0.0.1:8000", mcp::PROBE_TIMEOUT).await {
//!     panic!("server not reachable");
//! }
//!
//! let client = SseClient::connect("http://127.0.0.1:8000", ChannelOptions::default()).await?;
//! client.initialize().await?;
//!
//! for tool in client.tools().await {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = client.call_tool("read_data", Some(serde_json::json!({
//!     "query": "SELECT * FROM people"
//! }))).await?;
//! println!("{}", result.joined_text());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod event;
mod protocol;
mod server;
mod sse;
mod stdio;

/// Maximum size of a single message (1MB).
/// Sized for large query results.
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

pub use client::{ChannelOptions, PROBE_TIMEOUT, SseClient, handshake_url, probe};
pub use error::{Error, Result};
pub use event::{EventStream, SseDecoder, SseEvent};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListToolsResult,
    RequestId, SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCapability,
};
pub use server::{Dispatcher, ToolProvider};
pub use sse::{MESSAGES_PATH, SSE_PATH, serve_sse, sse_router};
pub use stdio::{serve_lines, serve_stdio};
