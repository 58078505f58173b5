//! One bounded reasoning step per user turn.
//!
//! A turn moves through a small state machine:
//!
//! ```text
//! Prompting -> Generating -> Dispatching -> Prompting -> ... -> Finalizing
//!                   \______________ Finish _______________________/
//! ```
//!
//! `Prompting` checks the iteration budget, `Generating` calls the model and
//! parses its reply, `Dispatching` runs at most one tool, and `Finalizing`
//! produces the output, asking the model once more when the budget ran out
//! under [`EarlyStopping::Generate`].

pub mod parser;
pub mod prompt;
pub mod tools;

pub use parser::{ParseError, ReactOutput};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{ChatRequest, LlmBackend, Message};
use crate::session::HistoryEntry;
use crate::tools::ToolHost;
use crate::Result;

/// Output when the iteration budget runs out under [`EarlyStopping::Force`].
pub const FORCED_STOP_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

/// What to do when the iteration budget is spent without a final answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Return [`FORCED_STOP_MESSAGE`].
    #[default]
    Force,
    /// Ask the model for one last answer from what it has seen.
    Generate,
}

/// Bounds on a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPolicy {
    /// Model generations allowed per turn; each dispatches at most one tool.
    pub max_iterations: usize,
    pub early_stopping: EarlyStopping,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            early_stopping: EarlyStopping::Force,
        }
    }
}

/// One iteration of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub thought: String,
    /// Tool the model asked for. `None` when its reply could not be parsed.
    pub action: Option<String>,
    pub action_input: String,
    pub observation: String,
    /// The model text this step came from.
    pub log: String,
}

/// Outcome of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub output: String,
    pub steps: Vec<Step>,
}

enum Phase {
    Prompting,
    Generating(String),
    Dispatching {
        thought: String,
        tool: String,
        input: String,
        log: String,
    },
    Finalizing(Option<String>),
}

/// Drives one turn against a backend and a tool host.
pub struct Agent<'a, B, H> {
    backend: &'a B,
    host: &'a H,
    policy: StepPolicy,
}

impl<'a, B: LlmBackend, H: ToolHost> Agent<'a, B, H> {
    pub fn new(backend: &'a B, host: &'a H, policy: StepPolicy) -> Self {
        Self {
            backend,
            host,
            policy,
        }
    }

    /// Run one turn for `input`, with `history` shown to the model.
    ///
    /// Errors only when the model cannot be reached; tool and parse
    /// failures are reported to the model as observations.
    pub async fn run(&self, history: &[HistoryEntry], input: &str) -> Result<TurnResult> {
        let mut steps: Vec<Step> = Vec::new();
        let mut phase = Phase::Prompting;

        loop {
            phase = match phase {
                Phase::Prompting => {
                    if steps.len() >= self.policy.max_iterations {
                        Phase::Finalizing(None)
                    } else {
                        Phase::Generating(prompt::render(history, input, &steps))
                    }
                }

                Phase::Generating(text) => {
                    let reply = self.generate(&text).await?;
                    match ReactOutput::parse(&reply) {
                        Ok(ReactOutput::Finish { answer, .. }) => Phase::Finalizing(Some(answer)),
                        Ok(ReactOutput::Action {
                            thought,
                            tool,
                            input,
                            log,
                        }) => Phase::Dispatching {
                            thought,
                            tool,
                            input,
                            log,
                        },
                        Err(e) => {
                            debug!("unparseable model output: {e}");
                            steps.push(Step {
                                thought: String::new(),
                                action: None,
                                action_input: String::new(),
                                observation: format!("Invalid Format: {e}"),
                                log: reply,
                            });
                            Phase::Prompting
                        }
                    }
                }

                Phase::Dispatching {
                    thought,
                    tool,
                    input,
                    log,
                } => {
                    let observation = match tools::find(&tool) {
                        Some(sql_tool) => {
                            let call_id = format!("step-{}", steps.len() + 1);
                            sql_tool.invoke(self.host, &call_id, &input).await
                        }
                        None => format!(
                            "{tool} is not a valid tool, try one of [{}].",
                            tools::tool_names()
                        ),
                    };
                    info!(tool = %tool, "observation: {observation}");
                    steps.push(Step {
                        thought,
                        action: Some(tool),
                        action_input: input,
                        observation,
                        log,
                    });
                    Phase::Prompting
                }

                Phase::Finalizing(answer) => {
                    let output = match answer {
                        Some(answer) => answer,
                        None => self.stop_early(history, input, &steps).await?,
                    };
                    return Ok(TurnResult { output, steps });
                }
            };
        }
    }

    async fn generate(&self, text: &str) -> Result<String> {
        let messages = [Message::user(text)];
        let response = self
            .backend
            .chat(ChatRequest {
                messages: &messages,
                system: Some(prompt::SYSTEM_PROMPT),
                stop: prompt::STOP,
            })
            .await?;
        debug!(tokens = response.usage.total_tokens(), "model replied");
        Ok(response.content)
    }

    async fn stop_early(&self, history: &[HistoryEntry], input: &str, steps: &[Step]) -> Result<String> {
        match self.policy.early_stopping {
            EarlyStopping::Force => Ok(FORCED_STOP_MESSAGE.to_string()),
            EarlyStopping::Generate => {
                let mut text = prompt::render(history, input, steps);
                text.push_str(prompt::FINAL_ANSWER_NUDGE);
                let reply = self.generate(&text).await?;
                Ok(match ReactOutput::parse(&reply) {
                    Ok(ReactOutput::Finish { answer, .. }) => answer,
                    _ => reply,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::ChatResponse;
    use crate::tools::{ToolCall, ToolError, ToolSpec};
    use crate::Error;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with canned completions in order and records every prompt.
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String>>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(replies: impl IntoIterator<Item = &'static str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(Error::Network("connection refused".into()))])),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl LlmBackend for ScriptedBackend {
        async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
            assert_eq!(request.stop, prompt::STOP);
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Api("script exhausted".into())))?;
            Ok(ChatResponse {
                content: reply,
                usage: Default::default(),
            })
        }
    }

    /// Offers the three SQL tools and answers from a fixed table.
    pub(crate) struct MockHost {
        specs: Vec<ToolSpec>,
        pub(crate) calls: Mutex<Vec<ToolCall>>,
    }

    impl MockHost {
        pub(crate) fn new() -> Self {
            let specs = tools::SQL_TOOLS
                .iter()
                .map(|t| ToolSpec {
                    name: t.name.into(),
                    description: t.description.into(),
                    schema: json!({"type": "object"}),
                })
                .collect();
            Self {
                specs,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ToolHost for MockHost {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
            self.calls.lock().unwrap().push(call.clone());
            let query = call.input["query"].as_str().unwrap_or_default();
            match call.name.as_str() {
                "add_data" => Ok(json!(query.starts_with("INSERT"))),
                "read_data" if query.contains("missing") => Ok(json!([])),
                "read_data" => Ok(json!([[1, "John Doe", 30, "Engineer"]])),
                "create_table" => Ok(json!([])),
                other => Err(ToolError::NotFound(other.into())),
            }
        }
    }

    const READ_ACTION: &str = "Thought: I need all people\nAction: read_data\nAction Input: SELECT * FROM people";

    #[tokio::test]
    async fn final_answer_needs_no_tool() {
        let backend = ScriptedBackend::new(["Thought: nothing to do\nFinal Answer: Hello!"]);
        let host = MockHost::new();
        let result = Agent::new(&backend, &host, StepPolicy::default())
            .run(&[], "hi")
            .await
            .unwrap();

        assert_eq!(result.output, "Hello!");
        assert!(result.steps.is_empty());
        assert_eq!(host.call_count(), 0);
    }

    #[tokio::test]
    async fn single_iteration_runs_one_tool_then_forces_stop() {
        let backend = ScriptedBackend::new([READ_ACTION, "Final Answer: never asked"]);
        let host = MockHost::new();
        let result = Agent::new(&backend, &host, StepPolicy::default())
            .run(&[], "show all people")
            .await
            .unwrap();

        assert_eq!(result.output, FORCED_STOP_MESSAGE);
        assert_eq!(host.call_count(), 1);
        assert_eq!(backend.calls(), 1);
        let step = &result.steps[0];
        assert_eq!(step.action.as_deref(), Some("read_data"));
        assert_eq!(step.action_input, "SELECT * FROM people");
        assert_eq!(step.observation, "| 1 | John Doe | 30 | Engineer |");
        assert_eq!(host.calls.lock().unwrap()[0].input, json!({"query": "SELECT * FROM people"}));
    }

    #[tokio::test]
    async fn generate_stopping_asks_for_a_last_answer() {
        let backend = ScriptedBackend::new([
            READ_ACTION,
            "Thought: I have the rows\nFinal Answer: John Doe is the only person",
        ]);
        let host = MockHost::new();
        let policy = StepPolicy {
            max_iterations: 1,
            early_stopping: EarlyStopping::Generate,
        };
        let result = Agent::new(&backend, &host, policy)
            .run(&[], "show all people")
            .await
            .unwrap();

        assert_eq!(result.output, "John Doe is the only person");
        assert_eq!(host.call_count(), 1);
        let last_prompt = backend.prompts.lock().unwrap()[1].clone();
        assert!(last_prompt.contains("Observation: | 1 | John Doe | 30 | Engineer |"));
        assert!(last_prompt.ends_with(prompt::FINAL_ANSWER_NUDGE));
    }

    #[tokio::test]
    async fn larger_budget_feeds_observation_back() {
        let backend = ScriptedBackend::new([
            "Action: add_data\nAction Input: INSERT INTO people (name, age, profession) VALUES ('Ann', 52, 'Chef')",
            "Thought: I now know the final answer\nFinal Answer: Added Ann",
        ]);
        let host = MockHost::new();
        let policy = StepPolicy {
            max_iterations: 3,
            ..StepPolicy::default()
        };
        let result = Agent::new(&backend, &host, policy)
            .run(&[], "add Ann, 52, chef")
            .await
            .unwrap();

        assert_eq!(result.output, "Added Ann");
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].observation, tools::WRITE_OK);
        assert!(backend.prompts.lock().unwrap()[1].contains("Observation: Statement executed successfully.\nThought: "));
    }

    #[tokio::test]
    async fn parse_errors_become_observations() {
        let backend = ScriptedBackend::new(["I think the answer is 42"]);
        let host = MockHost::new();
        let result = Agent::new(&backend, &host, StepPolicy::default())
            .run(&[], "what?")
            .await
            .unwrap();

        assert_eq!(result.output, FORCED_STOP_MESSAGE);
        assert_eq!(host.call_count(), 0);
        assert_eq!(result.steps[0].action, None);
        assert_eq!(
            result.steps[0].observation,
            "Invalid Format: Missing 'Action:' after 'Thought:'"
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_not_dispatched() {
        let backend = ScriptedBackend::new(["Action: drop_table\nAction Input: DROP TABLE people"]);
        let host = MockHost::new();
        let result = Agent::new(&backend, &host, StepPolicy::default())
            .run(&[], "delete everything")
            .await
            .unwrap();

        assert_eq!(host.call_count(), 0);
        assert_eq!(
            result.steps[0].observation,
            "drop_table is not a valid tool, try one of [add_data, read_data, create_table]."
        );
    }

    #[tokio::test]
    async fn backend_failure_fails_the_turn() {
        let backend = ScriptedBackend::failing();
        let host = MockHost::new();
        let err = Agent::new(&backend, &host, StepPolicy::default())
            .run(&[], "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn policy_parses_from_toml_style_names() {
        let policy: StepPolicy =
            serde_json::from_value(json!({"early_stopping": "generate"})).unwrap();
        assert_eq!(policy.max_iterations, 1);
        assert_eq!(policy.early_stopping, EarlyStopping::Generate);
    }
}
