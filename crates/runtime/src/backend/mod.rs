//! LLM backend abstraction.
//!
//! The reasoning loop only needs text completion with stop sequences, so a
//! backend is a single `chat` call. Ollama is the local default; the
//! Anthropic API is available for hosted models.

mod anthropic;
mod ollama;

pub use anthropic::{API_KEY_ENV, AnthropicBackend, AnthropicBackendBuilder};
pub use ollama::{
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, OllamaBackend, OllamaBackendBuilder,
    default_host as default_ollama_host,
};

use crate::Result;
use std::future::Future;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Request to send to an LLM backend.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
    pub system: Option<&'a str>,
    /// Generation halts before any of these strings would be emitted.
    pub stop: &'a [&'a str],
}

/// Token usage reported by the provider, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response from an LLM backend.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
}

/// Trait for LLM backends.
///
/// Implementations handle the specifics of communicating with different
/// LLM providers (API calls, etc.).
pub trait LlmBackend: Send + Sync {
    /// Send a chat request and get a response.
    fn chat(&self, request: ChatRequest<'_>) -> impl Future<Output = Result<ChatResponse>> + Send;
}

/// A backend chosen at runtime from configuration.
pub enum AnyBackend {
    Ollama(OllamaBackend),
    Anthropic(AnthropicBackend),
}

impl std::fmt::Display for AnyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama(backend) => std::fmt::Display::fmt(backend, f),
            Self::Anthropic(backend) => std::fmt::Display::fmt(backend, f),
        }
    }
}

impl From<OllamaBackend> for AnyBackend {
    fn from(backend: OllamaBackend) -> Self {
        Self::Ollama(backend)
    }
}

impl From<AnthropicBackend> for AnyBackend {
    fn from(backend: AnthropicBackend) -> Self {
        Self::Anthropic(backend)
    }
}

impl LlmBackend for AnyBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        match self {
            Self::Ollama(backend) => backend.chat(request).await,
            Self::Anthropic(backend) => backend.chat(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_tokens() {
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total_tokens(), 150);
    }

    #[test]
    fn any_backend_displays_inner() {
        let backend = AnyBackend::from(OllamaBackend::builder("llama3.2").build());
        assert_eq!(backend.to_string(), "ollama(llama3.2)");
    }
}
