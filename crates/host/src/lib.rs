//! SQLite tool host.
//!
//! Exposes three MCP tools over a [`storage::RecordStore`]:
//!
//! | tool | input | output |
//! |---|---|---|
//! | `add_data` | SQL string (required) | `true` / `false` |
//! | `read_data` | SQL string, default `SELECT * FROM people` | JSON array of rows |
//! | `create_table` | SQL string, default creates `new_table` | JSON array of rows |
//!
//! SQL failures are never protocol errors: `add_data` answers `false` and the
//! other two answer `[]`, with the cause logged on the host side.

mod error;
mod tools;

pub use error::{Error, Result};
pub use tools::{
    ADD_DATA, CREATE_TABLE, DEFAULT_CREATE_QUERY, DEFAULT_READ_QUERY, READ_DATA, SqliteTools,
};

/// Server info announced during the MCP handshake.
pub fn server_info() -> mcp::ServerInfo {
    mcp::ServerInfo {
        name: "sqlite-demo".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}
