//! Ollama backend (`/api/chat`, non-streaming).

use super::{ChatRequest, ChatResponse, LlmBackend, Role, Usage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// Server used when neither configuration nor `OLLAMA_HOST` names one.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

/// Resolve the Ollama host from `OLLAMA_HOST`, falling back to loopback.
pub fn default_host() -> String {
    normalize_host(&std::env::var("OLLAMA_HOST").unwrap_or_default())
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        DEFAULT_HOST.to_string()
    } else if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ApiMessage<'a>>,
    options: ApiOptions<'a>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [&'a str],
}

fn no_stops(stop: &&[&str]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: ApiReply,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    content: String,
}

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    host: Option<String>,
    temperature: f32,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            host: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Server base URL. Defaults to `OLLAMA_HOST`, then loopback.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build(self) -> OllamaBackend {
        let host = match self.host {
            Some(host) => normalize_host(&host),
            None => default_host(),
        };
        OllamaBackend {
            client: reqwest::Client::new(),
            url: format!("{host}/api/chat"),
            model: self.model,
            temperature: self.temperature,
        }
    }
}

/// Local models served by Ollama.
pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn api_request<'a>(&'a self, request: &ChatRequest<'a>) -> ApiRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(ApiMessage {
                role: Role::System.as_str(),
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| ApiMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        ApiRequest {
            model: &self.model,
            stream: false,
            messages,
            options: ApiOptions {
                temperature: self.temperature,
                stop: request.stop,
            },
        }
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.model)
    }
}

impl LlmBackend for OllamaBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let body = self.api_request(&request);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::Network(format!(
                    "failed to reach ollama at {} (is it running?): {e}",
                    self.url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        Ok(ChatResponse {
            content: api_response.message.content,
            usage: Usage {
                input_tokens: api_response.prompt_eval_count,
                output_tokens: api_response.eval_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Message;
    use serde_json::json;

    #[test]
    fn hosts_are_normalized() {
        assert_eq!(normalize_host(""), DEFAULT_HOST);
        assert_eq!(normalize_host("10.0.0.5:11434"), "http://10.0.0.5:11434");
        assert_eq!(normalize_host("https://ollama.lan/"), "https://ollama.lan");
    }

    #[test]
    fn builder_places_chat_endpoint_under_host() {
        let backend = OllamaBackend::builder(DEFAULT_MODEL)
            .host("127.0.0.1:9999")
            .build();
        assert_eq!(backend.url(), "http://127.0.0.1:9999/api/chat");
    }

    #[test]
    fn request_carries_system_stop_and_temperature() {
        let backend = OllamaBackend::builder(DEFAULT_MODEL)
            .host(DEFAULT_HOST)
            .temperature(0.6)
            .build();
        let messages = [Message::user("list people")];
        let request = ChatRequest {
            messages: &messages,
            system: Some("be brief"),
            stop: &["\nObservation"],
        };

        let body = serde_json::to_value(backend.api_request(&request)).unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(
            body["messages"],
            json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "list people"},
            ])
        );
        assert_eq!(body["options"]["stop"], json!(["\nObservation"]));
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn empty_stop_list_is_omitted() {
        let backend = OllamaBackend::builder(DEFAULT_MODEL).host(DEFAULT_HOST).build();
        let request = ChatRequest {
            messages: &[],
            system: None,
            stop: &[],
        };
        let body = serde_json::to_value(backend.api_request(&request)).unwrap();
        assert!(body["options"].get("stop").is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let backend = OllamaBackend::builder(DEFAULT_MODEL)
            .host("http://127.0.0.1:1")
            .build();
        let err = backend
            .chat(ChatRequest {
                messages: &[Message::user("hi")],
                system: None,
                stop: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
