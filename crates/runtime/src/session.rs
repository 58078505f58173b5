//! Session management.

use std::fmt;

use tracing::{info, warn};

use crate::agent::{Agent, StepPolicy, TurnResult, tools};
use crate::backend::LlmBackend;
use crate::tools::ToolHost;
use crate::Result;

/// Who said something in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Agent,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "Human"),
            Self::Agent => write!(f, "Agent"),
        }
    }
}

/// One utterance in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Speaker,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Speaker, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A conversation with the database agent.
pub struct Session<B, H> {
    backend: B,
    host: H,
    policy: StepPolicy,
    history: Vec<HistoryEntry>,
}

impl<B: LlmBackend, H: ToolHost> Session<B, H> {
    /// Create a session, checking that the host offers every SQL tool.
    pub fn new(backend: B, host: H) -> Result<Self> {
        tools::verify(host.specs())?;
        Ok(Self {
            backend,
            host,
            policy: StepPolicy::default(),
            history: Vec::new(),
        })
    }

    /// Set the per-turn iteration policy.
    pub fn with_policy(mut self, policy: StepPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StepPolicy {
        self.policy
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Run one turn. History grows by the question and answer only on success.
    pub async fn process(&mut self, input: &str) -> Result<TurnResult> {
        let result = Agent::new(&self.backend, &self.host, self.policy)
            .run(&self.history, input)
            .await?;

        info!(steps = result.steps.len(), "turn complete");
        self.history.push(HistoryEntry::new(Speaker::Human, input));
        self.history.push(HistoryEntry::new(Speaker::Agent, result.output.clone()));
        Ok(result)
    }

    /// Run one turn and return the text to show the user.
    pub async fn process_message(&mut self, input: &str) -> String {
        match self.process(input).await {
            Ok(result) => result.output,
            Err(e) => {
                warn!("turn failed: {e}");
                format!("Processing error: {e}")
            }
        }
    }
}
