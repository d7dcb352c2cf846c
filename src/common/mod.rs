// Shared value and row types used across the storage, index, and execution
// layers. Rows reference their table by name and are addressed everywhere by
// `row_id`; no component holds back-pointers into another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-assigned monotonic 64-bit row identity, stable across updates.
pub type RowId = u64;

/// Page index within a table's data file.
pub type PageId = u32;

/// All values a row cell can hold. Column types outside this set (DECIMAL,
/// DATE, TIMESTAMP) are carried through as the closest variant and never
/// interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// 32-bit signed integer
    Integer(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Boolean true/false
    Boolean(bool),

    /// Variable-length string (UTF-8)
    String(String),
}

impl Value {
    /// Check if value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::BigInt(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Textual representation used for string-typed comparison and display.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// A stored row: ordered column values plus engine metadata. The tombstone
/// flag and row_id travel with the row through the codec; timestamps are
/// in-memory only and are reset when a row is decoded from a page.
#[derive(Debug, Clone)]
pub struct Row {
    pub row_id: RowId,
    pub values: Vec<(String, Value)>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Row {
    pub fn new(row_id: RowId, values: Vec<(String, Value)>) -> Self {
        let now = Utc::now();
        Self {
            row_id,
            values,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Value of the named column; `None` when the row has no such column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replace the named column's value, appending it if absent.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.values.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((column.to_string(), value)),
        }
        self.updated_at = Utc::now();
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.iter().any(|(name, _)| name == column)
    }
}
