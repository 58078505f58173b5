//! Configuration loading from sql-agent.toml.
//!
//! ```toml
//! [backend]
//! provider = "ollama"          # or "anthropic"
//! model = "llama3.2"
//! temperature = 0.6
//!
//! [server]
//! url = "http://127.0.0.1:8000"
//! transport = "sse"            # or "stdio"
//! db = "agent.db"              # stdio only: database for the spawned host
//!
//! [agent]
//! max_iterations = 1
//! early_stopping = "force"     # or "generate"
//! ```

use runtime::{AnthropicBackend, AnyBackend, OllamaBackend, StdioServer, StepPolicy};
use serde::Deserialize;
use std::path::Path;

/// Model used for the Anthropic provider when none is configured.
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Top-level configuration. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
    pub agent: StepPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Anthropic,
}

/// LLM provider configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: Provider,

    /// Model name. Defaults per provider.
    pub model: Option<String>,

    /// Ollama server URL. Defaults to `OLLAMA_HOST`, then loopback.
    pub host: Option<String>,

    pub temperature: Option<f32>,

    /// Anthropic API key. Falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Sse,
    Stdio,
}

/// Where the SQL tools live.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the SSE server.
    pub url: String,

    pub transport: Transport,

    /// Server binary spawned for the stdio transport.
    pub command: String,

    /// Database file for the spawned server. Unset keeps its default.
    pub db: Option<String>,

    /// Extra arguments for `command`.
    pub args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            transport: Transport::Sse,
            command: "sqlite-mcp".to_string(),
            db: None,
            args: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Launch description for the stdio transport.
    pub fn stdio_server(&self) -> StdioServer {
        let server = StdioServer::new(&self.command).args(self.args.iter().cloned());
        match &self.db {
            Some(db) => server.db(db),
            None => server,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the configured LLM backend.
    pub fn backend(&self) -> Result<AnyBackend, ConfigError> {
        let backend = &self.backend;
        let temperature = backend.temperature.unwrap_or(runtime::DEFAULT_TEMPERATURE);

        match backend.provider {
            Provider::Ollama => {
                let model = backend.model.as_deref().unwrap_or(runtime::DEFAULT_MODEL);
                let mut builder = OllamaBackend::builder(model).temperature(temperature);
                if let Some(host) = &backend.host {
                    builder = builder.host(host);
                }
                Ok(builder.build().into())
            }
            Provider::Anthropic => {
                let api_key = match &backend.api_key {
                    Some(key) => key.clone(),
                    None => std::env::var(runtime::API_KEY_ENV)
                        .map_err(|_| ConfigError::MissingApiKey)?,
                };
                let model = backend.model.as_deref().unwrap_or(DEFAULT_ANTHROPIC_MODEL);
                Ok(AnthropicBackend::builder(api_key, model)
                    .temperature(temperature)
                    .build()
                    .into())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("anthropic provider needs backend.api_key or ANTHROPIC_API_KEY")]
    MissingApiKey,
}
