//! Anthropic API backend.

use super::{ChatRequest, ChatResponse, LlmBackend, Role, Usage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Builder for creating an Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackendBuilder {
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicBackendBuilder {
    /// Create a new builder with an API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// Set the maximum tokens for responses.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the backend.
    pub fn build(self) -> AnthropicBackend {
        AnthropicBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicBackend {
    /// Create a builder for the Anthropic backend.
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> AnthropicBackendBuilder {
        AnthropicBackendBuilder::new(api_key, model)
    }

    fn api_request<'a>(&'a self, request: &ChatRequest<'a>) -> ApiRequest<'a> {
        // System text travels in its own field; the messages list only
        // carries user and assistant turns.
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            system: request.system,
            temperature: self.temperature,
            // The API rejects stop sequences made only of whitespace.
            stop_sequences: request
                .stop
                .iter()
                .copied()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        }
    }
}

impl std::fmt::Display for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({})", self.model)
    }
}

impl LlmBackend for AnthropicBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let api_request = self.api_request(&request);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let content = api_response
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = Usage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        };

        Ok(ChatResponse { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Message;
    use serde_json::json;

    #[test]
    fn system_messages_move_to_the_system_field() {
        let backend = AnthropicBackend::builder("key", "claude-test").build();
        let messages = [
            Message::system("ignored here"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let request = ChatRequest {
            messages: &messages,
            system: Some("be brief"),
            stop: &["\nObservation"],
        };

        let body = serde_json::to_value(backend.api_request(&request)).unwrap();
        assert_eq!(body["system"], "be brief");
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": "hi"},
            ])
        );
        assert_eq!(body["stop_sequences"], json!(["\nObservation"]));
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn blank_stop_sequences_are_dropped() {
        let backend = AnthropicBackend::builder("key", "claude-test")
            .temperature(0.2)
            .build();
        let request = ChatRequest {
            messages: &[],
            system: None,
            stop: &["\n", " "],
        };
        let body = serde_json::to_value(backend.api_request(&request)).unwrap();
        assert!(body.get("stop_sequences").is_none());
        assert!(body.get("system").is_none());
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn display_names_model() {
        let backend = AnthropicBackend::builder("key", "claude-test").build();
        assert_eq!(backend.to_string(), "anthropic(claude-test)");
    }
}
