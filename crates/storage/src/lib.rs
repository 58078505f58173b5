//! SQLite-backed record store for the SQL tool host.
//!
//! The store is deliberately connection-less: a [`RecordStore`] only knows
//! where the database file lives. Every operation opens a fresh
//! [`rusqlite::Connection`], makes sure the default `people` table exists,
//! runs exactly one caller-supplied statement, and drops the connection on
//! the way out, whether the statement succeeded or not.
//!
//! # Core Concepts
//!
//! ## RecordStore
//!
//! [`RecordStore::execute`] runs a statement for its side effect, and
//! [`RecordStore::query`] additionally collects every row the statement
//! produces, in SQLite's native order. Statements that produce no columns
//! (DDL, `INSERT`, `UPDATE`) yield an empty row set.
//!
//! ## Row and Value
//!
//! A [`Row`] is an ordered list of [`Value`]s, one per result column. Both
//! serialize to plain JSON (`[1, "John Doe", 30, "Engineer"]`), which is the
//! wire shape the tool host returns for query results.
//!
//! # Example
//!
//! ```no_run
//! use storage::RecordStore;
//!
//! let store = RecordStore::new("demo.db");
//! store.execute("INSERT INTO people (name, age, profession) VALUES ('John Doe', 30, 'Engineer')")?;
//!
//! for row in store.query("SELECT * FROM people")? {
//!     println!("{row}");
//! }
//! # Ok::<(), storage::Error>(())
//! ```
//!
//! No sanitization happens here: SQL is executed verbatim. Callers that want
//! to restrict statements check them before reaching the store.

mod error;
mod store;
mod value;

pub use error::{Error, Result};
pub use store::{DEFAULT_DB_PATH, DEFAULT_SCHEMA, RecordStore};
pub use value::{Row, Value};
