use serde::{Deserialize, Serialize};

/// Statement family, taken from the leading SQL keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    With,
    Insert,
    Update,
    Delete,
    Replace,
    Create,
    Drop,
    Alter,
    Pragma,
    Other,
}

impl StatementKind {
    /// Classify a statement by its first keyword.
    ///
    /// Leading whitespace, `--` line comments and `/* */` block comments are
    /// skipped. Matching is case-insensitive.
    pub fn classify(sql: &str) -> Self {
        let rest = skip_trivia(sql);
        let keyword: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();

        match keyword.as_str() {
            "select" => Self::Select,
            "with" => Self::With,
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "replace" => Self::Replace,
            "create" => Self::Create,
            "drop" => Self::Drop,
            "alter" => Self::Alter,
            "pragma" => Self::Pragma,
            _ => Self::Other,
        }
    }
}

/// A statement submitted through a named tool.
#[derive(Debug, Clone)]
pub struct StatementRequest {
    pub tool: String,
    pub kind: StatementKind,
    pub statements: usize,
}

impl StatementRequest {
    pub fn new(tool: impl Into<String>, sql: &str) -> Self {
        Self {
            tool: tool.into(),
            kind: StatementKind::classify(sql),
            statements: statement_count(sql),
        }
    }
}

fn skip_trivia(mut sql: &str) -> &str {
    loop {
        let trimmed = sql.trim_start();
        if let Some(rest) = trimmed.strip_prefix("--") {
            sql = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            sql = rest.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return trimmed;
        }
    }
}

/// Count the non-empty `;`-separated statements in `sql`.
///
/// Semicolons inside quoted strings, quoted identifiers and comments do not
/// split.
pub fn statement_count(sql: &str) -> usize {
    let mut count = 0;
    let mut pending = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                pending = true;
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => {
                if pending {
                    count += 1;
                }
                pending = false;
            }
            c if c.is_whitespace() => {}
            _ => pending = true,
        }
    }

    if pending {
        count += 1;
    }
    count
}
