//! Row and value types returned by queries.

use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single SQLite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

/// One result row, one value per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Renders as a table line: `| 1 | John Doe | 30 | Engineer |`.
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for value in &self.0 {
            write!(f, " {value} |")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_serializes_as_plain_array() {
        let row = Row(vec![
            Value::Integer(1),
            Value::Text("John Doe".into()),
            Value::Null,
            Value::Real(1.5),
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,"John Doe",null,1.5]"#);
    }

    #[test]
    fn rows_deserialize_from_wire_json() {
        let rows: Vec<Row> = serde_json::from_str(r#"[[1,"John Doe",30,"Engineer"]]"#).unwrap();
        assert_eq!(rows[0].values()[2], Value::Integer(30));
        assert_eq!(rows[0].values()[1], Value::Text("John Doe".into()));
    }

    #[test]
    fn row_display_is_a_table_line() {
        let row = Row(vec![Value::Integer(1), Value::Text("car".into())]);
        assert_eq!(row.to_string(), "| 1 | car |");
        assert_eq!(Row::default().to_string(), "|");
    }
}
