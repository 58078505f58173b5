//! Reasoning client runtime: LLM backends, tool hosts and the agent loop.
//!
//! # Overview
//!
//! - **LlmBackend**: a trait over text-completion providers (Ollama,
//!   Anthropic).
//! - **ToolHost**: a trait over wherever the SQL tools run, normally the
//!   `sqlite-mcp` server reached over SSE or spawned on stdio.
//! - **Agent**: one bounded ReAct step per user turn.
//! - **Session**: conversation history around successive turns.
//!
//! # Example
//!
//! ```ignore
//! use mcp::ChannelOptions;
//! use runtime::{OllamaBackend, Session, SseToolHost};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OllamaBackend::builder("llama3.2").build();
//! let host = SseToolHost::connect("http://127.0.0.1:8000", ChannelOptions::default()).await?;
//!
//! let mut session = Session::new(backend, host)?;
//! let reply = session.process_message("show all people").await;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
mod backend;
mod error;
mod session;
pub mod tools;

pub use agent::{EarlyStopping, FORCED_STOP_MESSAGE, Step, StepPolicy, TurnResult};
pub use backend::{
    API_KEY_ENV, AnthropicBackend, AnthropicBackendBuilder, AnyBackend, ChatRequest, ChatResponse,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, LlmBackend, Message, OllamaBackend, OllamaBackendBuilder,
    Role, Usage, default_ollama_host,
};
pub use error::{Error, Result};
pub use session::{HistoryEntry, Session, Speaker};
pub use tools::{
    AnyToolHost, McpToolHost, SseToolHost, StdioServer, ToolCall, ToolError, ToolHost, ToolSpec,
};

