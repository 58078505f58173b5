//! SQLite record store implementation.

use crate::{Result, Row, Value};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Database file used when the host is started without `--db`.
pub const DEFAULT_DB_PATH: &str = "demo.db";

/// Schema applied on every connection open.
pub const DEFAULT_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS people (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        profession TEXT NOT NULL
    );
"#;

/// SQLite-backed record store.
///
/// Holds no connection between calls; see the crate docs.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Create a store for the database file at `path`.
    ///
    /// Nothing is touched on disk until the first operation.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection and ensure the default schema.
    ///
    /// The returned connection closes when dropped.
    pub fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(DEFAULT_SCHEMA)?;
        Ok(conn)
    }

    /// Run a single statement for its side effect.
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.query(sql).map(|_| ())
    }

    /// Run a single statement and collect every row it produces.
    ///
    /// Blank input is a no-op that yields no rows.
    pub fn query(&self, sql: &str) -> Result<Vec<Row>> {
        if sql.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.open()?;
        debug!(path = %self.path.display(), sql, "executing statement");
        run(&conn, sql)
    }
}

fn run(conn: &Connection, sql: &str) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(Value::from(row.get_ref(idx)?));
        }
        out.push(Row(values));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("test.db"));
        (dir, store)
    }

    #[test]
    fn creates_file_and_default_table_lazily() {
        let (_dir, store) = temp_store();
        assert!(!store.path().exists());

        let rows = store.query("SELECT * FROM people").unwrap();
        assert!(rows.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn insert_then_select_assigns_ids_from_one() {
        let (_dir, store) = temp_store();
        store
            .execute("INSERT INTO people (name, age, profession) VALUES ('John Doe', 30, 'Engineer')")
            .unwrap();
        store
            .execute("INSERT INTO people (name, age, profession) VALUES ('Alice Smith', 25, 'Developer')")
            .unwrap();

        let rows = store.query("SELECT * FROM people").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].values(),
            &[
                Value::Integer(1),
                Value::Text("John Doe".into()),
                Value::Integer(30),
                Value::Text("Engineer".into()),
            ]
        );
        assert_eq!(rows[1].values()[0], Value::Integer(2));
    }

    #[test]
    fn blank_statement_is_a_no_op() {
        let (_dir, store) = temp_store();
        store.execute("").unwrap();
        assert!(store.query(" \n\t").unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn rows_keep_their_own_width() {
        let (_dir, store) = temp_store();
        store
            .execute("INSERT INTO people (name, age, profession) VALUES ('Alice Smith', 25, 'Developer')")
            .unwrap();

        let rows = store
            .query("SELECT name, profession FROM people WHERE age < 30")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn ddl_yields_no_rows() {
        let (_dir, store) = temp_store();
        let rows = store
            .query("CREATE TABLE car (id INTEGER PRIMARY KEY, make TEXT, year INTEGER)")
            .unwrap();
        assert!(rows.is_empty());
        assert!(store.query("SELECT * FROM car").unwrap().is_empty());
    }

    #[test]
    fn malformed_sql_is_an_error() {
        let (_dir, store) = temp_store();
        assert!(store.execute("INSERT INTO nowhere VALUES (").is_err());
        assert!(store.query("SELEC * FROM people").is_err());
    }

    #[test]
    fn constraint_violation_is_an_error() {
        let (_dir, store) = temp_store();
        let err = store.execute("INSERT INTO people (name) VALUES ('No Age')");
        assert!(err.is_err());
        assert!(store.query("SELECT * FROM people").unwrap().is_empty());
    }

    #[test]
    fn writes_survive_across_connections() {
        let (_dir, store) = temp_store();
        store
            .execute("INSERT INTO people (name, age, profession) VALUES ('Bob', 41, 'Pilot')")
            .unwrap();

        let reopened = RecordStore::new(store.path());
        let rows = reopened.query("SELECT name FROM people").unwrap();
        assert_eq!(rows[0].values(), &[Value::Text("Bob".into())]);
    }
}
