//! Parsing of ReAct-formatted model output.
//!
//! The model is asked to answer either with
//!
//! ```text
//! Thought: ...
//! Action: read_data
//! Action Input: SELECT * FROM people
//! ```
//!
//! or with a `Final Answer:` line. Anything else is a parse error, which the
//! reasoning loop feeds back to the model as an observation.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Marker preceding the final answer.
pub const FINAL_ANSWER: &str = "Final Answer:";

static ACTION_WITH_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("static regex")
});

static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*:").expect("static regex"));

static ACTION_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("static regex"));

/// One parsed model completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactOutput {
    /// The model wants a tool run.
    Action {
        thought: String,
        tool: String,
        input: String,
        /// The completion the action was parsed from.
        log: String,
    },
    /// The model has answered.
    Finish {
        thought: String,
        answer: String,
        log: String,
    },
}

/// Why a completion could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Parsing LLM output produced both a final answer and a parse-able action: {0}")]
    ActionAndFinalAnswer(String),
    #[error("Missing 'Action:' after 'Thought:'")]
    MissingAction,
    #[error("Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,
    #[error("Could not parse LLM output: `{0}`")]
    Unparseable(String),
}

impl ReactOutput {
    /// Parse one completion.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let text = truncate_at_observation(text);
        let includes_answer = text.contains(FINAL_ANSWER);

        if let Some(captures) = ACTION_WITH_INPUT.captures(text) {
            if includes_answer {
                return Err(ParseError::ActionAndFinalAnswer(text.to_string()));
            }
            let tool = captures.get(1).map_or("", |m| m.as_str()).trim();
            let input = captures.get(2).map_or("", |m| m.as_str());
            return Ok(Self::Action {
                thought: thought(text),
                tool: tool.to_string(),
                input: clean_input(input),
                log: text.to_string(),
            });
        }

        if let Some(index) = text.find(FINAL_ANSWER) {
            let answer = text[index + FINAL_ANSWER.len()..].trim();
            return Ok(Self::Finish {
                thought: thought(text),
                answer: answer.to_string(),
                log: text.to_string(),
            });
        }

        if !ACTION.is_match(text) {
            Err(ParseError::MissingAction)
        } else if !ACTION_INPUT.is_match(text) {
            Err(ParseError::MissingActionInput)
        } else {
            Err(ParseError::Unparseable(text.to_string()))
        }
    }

    pub fn log(&self) -> &str {
        match self {
            Self::Action { log, .. } | Self::Finish { log, .. } => log,
        }
    }
}

/// Models that ignore the stop sequence invent their own observations.
fn truncate_at_observation(text: &str) -> &str {
    match text.find("\nObservation") {
        Some(index) => &text[..index],
        None => text,
    }
}

/// Text before the first `Action:` or `Final Answer:`, minus a `Thought:` label.
fn thought(text: &str) -> String {
    let action = ACTION.find(text).map(|m| m.start());
    let answer = text.find(FINAL_ANSWER);
    let end = match (action, answer) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => text.len(),
    };

    let head = text[..end].trim();
    head.strip_prefix("Thought:").unwrap_or(head).trim().to_string()
}

fn clean_input(input: &str) -> String {
    input.trim().trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action() {
        let output = ReactOutput::parse(
            "Thought: I need to add a new person\n\
             Action: add_data\n\
             Action Input: INSERT INTO people (name, age, profession) VALUES ('John Doe', 30, 'Engineer')",
        )
        .unwrap();

        match output {
            ReactOutput::Action {
                thought,
                tool,
                input,
                ..
            } => {
                assert_eq!(thought, "I need to add a new person");
                assert_eq!(tool, "add_data");
                assert_eq!(
                    input,
                    "INSERT INTO people (name, age, profession) VALUES ('John Doe', 30, 'Engineer')"
                );
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn strips_quotes_and_whitespace_from_input() {
        let output =
            ReactOutput::parse("Action: read_data\nAction Input:   \"SELECT * FROM car\"  \n").unwrap();
        assert!(matches!(
            output,
            ReactOutput::Action { ref input, .. } if input == "SELECT * FROM car"
        ));
    }

    #[test]
    fn parses_final_answer() {
        let output =
            ReactOutput::parse("Thought: I now know the final answer\nFinal Answer: car table created")
                .unwrap();
        assert_eq!(
            output,
            ReactOutput::Finish {
                thought: "I now know the final answer".into(),
                answer: "car table created".into(),
                log: "Thought: I now know the final answer\nFinal Answer: car table created".into(),
            }
        );
    }

    #[test]
    fn action_and_answer_together_is_an_error() {
        let err = ReactOutput::parse(
            "Action: read_data\nAction Input: SELECT 1\nFinal Answer: one",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::ActionAndFinalAnswer(_)));
    }

    #[test]
    fn invented_observation_is_cut_off() {
        let output = ReactOutput::parse(
            "Action: read_data\nAction Input: SELECT * FROM people\nObservation: 3 rows\nFinal Answer: 3 people",
        )
        .unwrap();
        assert!(matches!(
            output,
            ReactOutput::Action { ref input, .. } if input == "SELECT * FROM people"
        ));
    }

    #[test]
    fn missing_pieces_are_reported() {
        assert_eq!(
            ReactOutput::parse("I am not sure what to do").unwrap_err(),
            ParseError::MissingAction
        );
        assert_eq!(
            ReactOutput::parse("Thought: look\nAction: read_data").unwrap_err(),
            ParseError::MissingActionInput
        );
        assert_eq!(
            ParseError::MissingAction.to_string(),
            "Missing 'Action:' after 'Thought:'"
        );
    }
}
