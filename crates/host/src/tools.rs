//! The three SQL tools and their MCP binding.

use mcp::{CallToolResult, Tool, ToolProvider};
use policy::{Policy, StatementRequest};
use serde_json::{Value, json};
use storage::{RecordStore, Row};
use tracing::{info, warn};

use crate::Result;

pub const ADD_DATA: &str = "add_data";
pub const READ_DATA: &str = "read_data";
pub const CREATE_TABLE: &str = "create_table";

/// Query run by `read_data` when the caller passes none.
pub const DEFAULT_READ_QUERY: &str = "SELECT * FROM people";

/// Statement run by `create_table` when the caller passes none.
pub const DEFAULT_CREATE_QUERY: &str =
    "CREATE TABLE IF NOT EXISTS new_table (id INTEGER, new_column VARCHAR(255))";

/// SQL tools backed by a record store.
#[derive(Debug, Clone)]
pub struct SqliteTools {
    store: RecordStore,
    policy: Policy,
}

impl SqliteTools {
    pub fn new(store: RecordStore, policy: Policy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Execute an insert (or any other) statement. `false` on any failure.
    pub fn add_data(&self, query: &str) -> bool {
        match self.run(ADD_DATA, query) {
            Ok(_) => true,
            Err(e) => {
                warn!(tool = ADD_DATA, query, "error adding data: {e}");
                false
            }
        }
    }

    /// Execute a select statement. Empty on any failure.
    pub fn read_data(&self, query: Option<&str>) -> Vec<Row> {
        let query = query.unwrap_or(DEFAULT_READ_QUERY);
        self.run(READ_DATA, query).unwrap_or_else(|e| {
            warn!(tool = READ_DATA, query, "error reading data: {e}");
            Vec::new()
        })
    }

    /// Execute a DDL statement and return whatever rows it produced,
    /// which for DDL is none. Empty on any failure.
    pub fn create_table(&self, query: Option<&str>) -> Vec<Row> {
        let query = query.unwrap_or(DEFAULT_CREATE_QUERY);
        self.run(CREATE_TABLE, query).unwrap_or_else(|e| {
            warn!(tool = CREATE_TABLE, query, "error creating table: {e}");
            Vec::new()
        })
    }

    fn run(&self, tool: &str, query: &str) -> Result<Vec<Row>> {
        let query = query.trim();
        info!(tool, query, "executing");
        self.policy
            .check(&StatementRequest::new(tool, query))
            .into_result()?;
        Ok(self.store.query(query)?)
    }

    fn dispatch(&self, name: &str, query: Option<&str>) -> CallToolResult {
        let encoded = match name {
            ADD_DATA => match query {
                Some(query) => Ok(self.add_data(query).to_string()),
                None => return CallToolResult::error("missing required argument: query"),
            },
            READ_DATA => serde_json::to_string(&self.read_data(query)),
            CREATE_TABLE => serde_json::to_string(&self.create_table(query)),
            other => return CallToolResult::error(format!("unknown tool: {other}")),
        };

        match encoded {
            Ok(text) => CallToolResult::text(text),
            Err(e) => CallToolResult::error(format!("failed to encode result: {e}")),
        }
    }
}

fn query_schema(description: &str, default: Option<&str>) -> Value {
    let mut query = json!({ "type": "string", "description": description });
    if let Some(default) = default {
        query["default"] = json!(default);
    }
    let required: Vec<&str> = if default.is_none() { vec!["query"] } else { Vec::new() };
    json!({
        "type": "object",
        "properties": { "query": query },
        "required": required,
    })
}

/// Pull the optional `query` string out of tool arguments.
fn query_argument(arguments: Option<&Value>) -> std::result::Result<Option<String>, String> {
    match arguments.and_then(|a| a.get("query")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(query)) => Ok(Some(query.clone())),
        Some(other) => Err(format!("query must be a string, got {other}")),
    }
}

impl ToolProvider for SqliteTools {
    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: ADD_DATA.to_string(),
                description: Some(
                    "Add rows to any table with one SQL INSERT statement, e.g. \
                     INSERT INTO people (name, age, profession) VALUES ('John Doe', 30, 'Engineer'). \
                     Returns true when the statement ran, false otherwise."
                        .to_string(),
                ),
                input_schema: query_schema("A single SQL INSERT statement", None),
            },
            Tool {
                name: READ_DATA.to_string(),
                description: Some(
                    "Read rows from any table with one SQL SELECT statement. \
                     Returns a list of rows, each a list of column values; empty on failure."
                        .to_string(),
                ),
                input_schema: query_schema("A single SQL SELECT statement", Some(DEFAULT_READ_QUERY)),
            },
            Tool {
                name: CREATE_TABLE.to_string(),
                description: Some(
                    "Create a table with one SQL CREATE TABLE statement. \
                     Returns the rows the statement produced, which for DDL is an empty list."
                        .to_string(),
                ),
                input_schema: query_schema(
                    "A single SQL CREATE TABLE statement",
                    Some(DEFAULT_CREATE_QUERY),
                ),
            },
        ]
    }

    async fn call(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
        let query = match query_argument(arguments.as_ref()) {
            Ok(query) => query,
            Err(message) => return CallToolResult::error(message),
        };

        // rusqlite is blocking; keep it off the async workers.
        let tools = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || tools.dispatch(&name, query.as_deref()))
            .await
            .unwrap_or_else(|e| CallToolResult::error(format!("tool task failed: {e}")))
    }
}
