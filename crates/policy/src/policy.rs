//! Policy configuration and enforcement.

use crate::{Error, Result, StatementKind, StatementRequest};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Policy configuration loaded from TOML.
///
/// ```toml
/// [allow]
/// add_data = ["insert"]
/// read_data = ["select", "with"]
///
/// [deny]
/// all = ["drop"]
/// multiple_statements = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Statement families allowed per tool.
    #[serde(default)]
    pub allow: AllowRules,

    /// Statement families denied for every tool (overrides allow).
    #[serde(default)]
    pub deny: DenyRules,
}

/// Per-tool allow lists. A tool with no entry accepts any statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowRules(pub HashMap<String, HashSet<StatementKind>>);

/// Rules that apply to every tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenyRules {
    /// Deny all statements of these kinds.
    #[serde(default)]
    pub all: HashSet<StatementKind>,

    /// Reject input holding more than one statement.
    #[serde(default)]
    pub multiple_statements: bool,
}

/// Result of a statement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert into a `Result`, mapping a denial to [`Error::Denied`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny { reason } => Err(Error::Denied(reason)),
        }
    }
}

impl Policy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Allow every statement through every tool.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Restrict each SQL tool to its own statement family.
    pub fn restrictive() -> Self {
        let allow = [
            ("add_data", vec![StatementKind::Insert]),
            ("read_data", vec![StatementKind::Select, StatementKind::With]),
            ("create_table", vec![StatementKind::Create]),
        ]
        .into_iter()
        .map(|(tool, kinds)| (tool.to_string(), kinds.into_iter().collect()))
        .collect();

        Self {
            allow: AllowRules(allow),
            deny: DenyRules {
                all: HashSet::from([StatementKind::Drop]),
                multiple_statements: true,
            },
        }
    }

    /// Check if a statement is allowed.
    pub fn check(&self, request: &StatementRequest) -> Decision {
        if self.deny.multiple_statements && request.statements > 1 {
            return Decision::Deny {
                reason: format!("{} statements submitted, only one allowed", request.statements),
            };
        }

        if self.deny.all.contains(&request.kind) {
            return Decision::Deny {
                reason: format!("{:?} is denied by policy", request.kind),
            };
        }

        match self.allow.0.get(&request.tool) {
            Some(kinds) if !kinds.contains(&request.kind) => Decision::Deny {
                reason: format!("{:?} not allowed for {}", request.kind, request.tool),
            },
            _ => Decision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_allows_anything() {
        let policy = Policy::passthrough();
        let req = StatementRequest::new("add_data", "DROP TABLE people; DELETE FROM car");
        assert!(policy.check(&req).is_allowed());
    }

    #[test]
    fn restrictive_limits_tools_to_their_family() {
        let policy = Policy::restrictive();
        assert!(
            policy
                .check(&StatementRequest::new(
                    "add_data",
                    "INSERT INTO people (name, age, profession) VALUES ('a', 1, 'b')"
                ))
                .is_allowed()
        );
        assert!(
            !policy
                .check(&StatementRequest::new("read_data", "DELETE FROM people"))
                .is_allowed()
        );
        assert!(
            !policy
                .check(&StatementRequest::new("create_table", "DROP TABLE people"))
                .is_allowed()
        );
    }

    #[test]
    fn restrictive_rejects_stacked_statements() {
        let policy = Policy::restrictive();
        let req = StatementRequest::new("read_data", "SELECT 1; SELECT 2");
        let decision = policy.check(&req);
        assert!(matches!(decision, Decision::Deny { .. }));
        assert!(decision.into_result().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[allow]
add_data = ["insert", "create"]
read_data = ["select"]

[deny]
all = ["drop"]
multiple_statements = true
"#;
        let policy = Policy::parse(toml).unwrap();

        // Allowed
        assert!(policy.check(&StatementRequest::new("add_data", "CREATE TABLE car (id INT)")).is_allowed());
        assert!(policy.check(&StatementRequest::new("read_data", "select * from car")).is_allowed());
        // Unlisted tool accepts anything not globally denied
        assert!(policy.check(&StatementRequest::new("create_table", "PRAGMA table_info(car)")).is_allowed());

        // Denied
        assert!(!policy.check(&StatementRequest::new("read_data", "UPDATE car SET year = 1")).is_allowed());
        assert!(!policy.check(&StatementRequest::new("create_table", "DROP TABLE car")).is_allowed());
    }

    #[test]
    fn parse_error_is_reported() {
        let err = Policy::parse("[allow]\nadd_data = [\"truncate\"]").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
