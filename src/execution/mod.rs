pub mod executor;
pub mod hash_join;
pub mod predicate;

pub use executor::Executor;
pub use hash_join::{execute_join, JoinInput};

use crate::common::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Request shapes (shared with the SQL dispatcher and the outer surfaces)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefRequest {
    pub name: String,
    pub data_type: crate::catalog::DataType,
    pub max_length: Option<u32>,
    pub nullable: Option<bool>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefRequest {
    pub index_name: String,
    pub column_name: String,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub table_name: String,
    pub columns: Vec<ColumnDefRequest>,
    pub primary_keys: Vec<String>,
    pub unique_keys: Vec<String>,
    pub indexes: Vec<IndexDefRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    pub table_name: String,
    pub values: Vec<(String, Value)>,
}

/// One WHERE entry. Entries are kept in insertion order; the access-method
/// chooser walks them front to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            CompareOp::Eq => write!(f, "{} = {}", self.column, self.value),
            CompareOp::NotEq => write!(f, "{} != {}", self.column, self.value),
            CompareOp::Gt => write!(f, "{} > {}", self.column, self.value),
            CompareOp::Gte => write!(f, "{} >= {}", self.column, self.value),
            CompareOp::Lt => write!(f, "{} < {}", self.column, self.value),
            CompareOp::Lte => write!(f, "{} <= {}", self.column, self.value),
            CompareOp::Like => write!(f, "{} LIKE {}", self.column, self.value),
            CompareOp::IsNull => write!(f, "{} IS NULL", self.column),
            CompareOp::IsNotNull => write!(f, "{} IS NOT NULL", self.column),
        }
    }
}

/// Render a WHERE clause the way the plan record reports it.
pub fn conditions_display(conditions: &[Condition]) -> Option<String> {
    if conditions.is_empty() {
        return None;
    }
    Some(
        conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectRequest {
    pub table_name: String,
    /// `None` projects every schema column in schema order.
    pub columns: Option<Vec<String>>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub table_name: String,
    pub set: Vec<(String, Value)>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub table_name: String,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub left_table: String,
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
    pub join_type: JoinType,
    /// Qualified `table.column` names; `None` keeps every column of both
    /// sides.
    pub columns: Option<Vec<String>>,
    pub conditions: Vec<Condition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ============================================================================
// Response shapes
// ============================================================================

/// One projected result row: column/value pairs in projection order. Pairs
/// are simply absent for the unmatched side of an outer join.
pub type OutputRow = Vec<(String, Value)>;

/// Index operation recorded in an execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexOperation {
    EqualityLookup,
    RangeScanGt,
    RangeScanGte,
    RangeScanLt,
    RangeScanLte,
}

/// The observable execution plan of one query. `EXPLAIN` returns this in
/// place of the normal result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecution {
    pub table: String,
    pub query_type: String,
    pub index_used: bool,
    pub index_name: Option<String>,
    pub index_column: Option<String>,
    pub index_operation: Option<IndexOperation>,
    pub rows_scanned: usize,
    pub rows_returned: usize,
    pub execution_time_ms: f64,
    pub where_clause: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_display() {
        let c = Condition {
            column: "price".to_string(),
            op: CompareOp::Gt,
            value: Value::Integer(20),
        };
        assert_eq!(c.to_string(), "price > 20");

        let clauses = vec![
            c,
            Condition {
                column: "name".to_string(),
                op: CompareOp::IsNotNull,
                value: Value::Null,
            },
        ];
        assert_eq!(
            conditions_display(&clauses).unwrap(),
            "price > 20 AND name IS NOT NULL"
        );
        assert_eq!(conditions_display(&[]), None);
    }

    #[test]
    fn test_index_operation_wire_names() {
        assert_eq!(
            serde_json::to_string(&IndexOperation::EqualityLookup).unwrap(),
            "\"EQUALITY_LOOKUP\""
        );
        assert_eq!(
            serde_json::to_string(&IndexOperation::RangeScanGte).unwrap(),
            "\"RANGE_SCAN_GTE\""
        );
    }
}
