// CRUD and equi-join operators over the catalog, storage, and index layers.
// Every operator loads the schema first, enforces constraints through the
// index manager, and mutates through the storage engine, notifying the index
// manager per affected row. select/update/delete return their plan record
// alongside the result; EXPLAIN reuses those same paths.

use crate::catalog::{
    Catalog, ColumnSchema, DataType, IndexSchema, KeySchema, KeyType, TableSchema,
};
use crate::common::{Row, RowId, Value};
use crate::error::{DbError, Result};
use crate::execution::hash_join::{execute_join, JoinInput};
use crate::execution::predicate;
use crate::execution::{
    conditions_display, CompareOp, Condition, CreateTableRequest, DeleteRequest, IndexOperation,
    InsertRequest, JoinRequest, OrderBy, OutputRow, QueryExecution, SelectRequest, UpdateRequest,
};
use crate::index::{IndexKey, IndexManager};
use crate::storage::StorageEngine;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct Executor {
    catalog: Arc<Catalog>,
    storage: Arc<StorageEngine>,
    indexes: Arc<IndexManager>,
}

/// Outcome of candidate-row resolution: the surviving rows plus what the
/// access-method chooser decided.
struct ResolvedRows {
    rows: Vec<Row>,
    rows_scanned: usize,
    index_used: bool,
    index_name: Option<String>,
    index_column: Option<String>,
    index_operation: Option<IndexOperation>,
}

impl Executor {
    pub fn new(
        catalog: Arc<Catalog>,
        storage: Arc<StorageEngine>,
        indexes: Arc<IndexManager>,
    ) -> Self {
        Self {
            catalog,
            storage,
            indexes,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    // ------------------------------------------------------------------
    // DDL
    // ------------------------------------------------------------------

    pub fn create_table(&self, request: CreateTableRequest) -> Result<TableSchema> {
        let mut schema = TableSchema::new(request.table_name.as_str());
        for (position, column) in request.columns.iter().enumerate() {
            schema.columns.push(ColumnSchema {
                name: column.name.clone(),
                data_type: column.data_type,
                max_length: column.max_length,
                nullable: column.nullable.unwrap_or(true),
                default_value: column.default_value.clone(),
                ordinal_position: position as u32,
            });
        }
        for column in &request.primary_keys {
            schema.keys.push(KeySchema {
                column_name: column.clone(),
                key_type: KeyType::Primary,
            });
        }
        for column in &request.unique_keys {
            schema.keys.push(KeySchema {
                column_name: column.clone(),
                key_type: KeyType::Unique,
            });
        }
        for index in &request.indexes {
            if index.index_name.starts_with("pk_") {
                return Err(DbError::InvalidSql {
                    sql: format!("index name '{}' uses the reserved pk_ prefix", index.index_name),
                });
            }
            schema.indexes.push(IndexSchema {
                index_name: index.index_name.clone(),
                column_name: index.column_name.clone(),
                unique: index.unique,
            });
        }

        self.catalog.create_table(schema)?;
        let schema = self.catalog.get_table(&request.table_name)?;

        let table = schema.table_name.as_str();
        for column in schema.primary_key_columns() {
            let name = format!("pk_{}_{}", table, column);
            self.indexes.create_index(table, &name, column, true, true)?;
        }
        for column in schema.unique_key_columns() {
            let name = format!("uq_{}_{}", table, column);
            self.indexes.create_index(table, &name, column, true, false)?;
        }
        for index in &schema.indexes {
            self.indexes
                .create_index(table, &index.index_name, &index.column_name, index.unique, false)?;
        }

        Ok(schema)
    }

    /// Returns whether a table was actually dropped (`if_exists` suppresses
    /// the not-found error).
    pub fn drop_table(&self, table: &str, if_exists: bool) -> Result<bool> {
        if !self.catalog.table_exists(table) {
            if if_exists {
                return Ok(false);
            }
            return Err(DbError::TableNotFound {
                table: table.to_string(),
            });
        }
        self.catalog.drop_table(table)?;
        self.storage.invalidate(table);
        self.indexes.drop_table_indexes(table)?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // DML
    // ------------------------------------------------------------------

    /// Insert one row, filling defaults, enforcing NOT NULL and key
    /// constraints, and registering it in every index. Returns the stored
    /// row including its assigned row id.
    pub fn insert(&self, request: InsertRequest) -> Result<Row> {
        let schema = self.catalog.get_table(&request.table_name)?;
        let table = schema.table_name.as_str();

        for (column, _) in &request.values {
            if !schema.has_column(column) {
                return Err(DbError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }

        let mut values = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let provided = request
                .values
                .iter()
                .find(|(name, _)| name == &column.name)
                .map(|(_, value)| value.clone());
            let value = match provided {
                Some(value) => value,
                None => match &column.default_value {
                    Some(text) => parse_default(table, column, text)?,
                    None => Value::Null,
                },
            };
            if value.is_null() && !column.nullable {
                return Err(DbError::NotNullViolation {
                    table: table.to_string(),
                    column: column.name.clone(),
                });
            }
            values.push((column.name.clone(), value));
        }

        for column in schema.primary_key_columns() {
            let value = lookup(&values, column);
            if value.is_null() {
                return Err(DbError::NotNullViolation {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
            if self.indexes.primary_key_exists(table, column, value) {
                return Err(DbError::PrimaryKeyViolation {
                    table: table.to_string(),
                    column: column.to_string(),
                    value: value.clone(),
                });
            }
        }
        for column in unique_columns(&schema) {
            let value = lookup(&values, &column);
            if !value.is_null() && self.indexes.unique_key_exists(table, &column, value) {
                return Err(DbError::UniqueKeyViolation {
                    table: table.to_string(),
                    column,
                    value: value.clone(),
                });
            }
        }

        let row = self.storage.insert_row(table, values)?;
        self.indexes.on_row_inserted(table, &row)?;
        Ok(row)
    }

    /// Execute a SELECT: access-method choice, remaining WHERE filtering,
    /// ORDER BY, OFFSET, LIMIT, projection. Returns the projected rows and
    /// the recorded plan.
    pub fn select(&self, request: SelectRequest) -> Result<(Vec<OutputRow>, QueryExecution)> {
        let start = Instant::now();
        let schema = self.catalog.get_table(&request.table_name)?;
        self.check_columns(&schema, &request.conditions)?;
        for order in &request.order_by {
            self.check_column(&schema, &order.column)?;
        }
        let projection = match &request.columns {
            Some(columns) => {
                for column in columns {
                    self.check_column(&schema, column)?;
                }
                columns.clone()
            }
            None => schema.column_names(),
        };

        let resolved = self.resolve_rows(&schema, &request.conditions)?;
        let mut rows = resolved.rows;
        sort_rows(&mut rows, &request.order_by);
        let rows = apply_window(rows, request.offset, request.limit);

        let output: Vec<OutputRow> = rows
            .iter()
            .map(|row| {
                projection
                    .iter()
                    .map(|column| {
                        let value = row.get(column).cloned().unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect()
            })
            .collect();

        let plan = QueryExecution {
            table: schema.table_name.clone(),
            query_type: "SELECT".to_string(),
            index_used: resolved.index_used,
            index_name: resolved.index_name,
            index_column: resolved.index_column,
            index_operation: resolved.index_operation,
            rows_scanned: resolved.rows_scanned,
            rows_returned: output.len(),
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            where_clause: conditions_display(&request.conditions),
        };
        debug!(table = %plan.table, index_used = plan.index_used, rows = plan.rows_returned, "select");
        Ok((output, plan))
    }

    /// Apply a SET map to every matching row, re-validating key constraints
    /// against all rows except the one being rewritten. Stops at the first
    /// violation; rows already mutated stay mutated.
    pub fn update(&self, request: UpdateRequest) -> Result<(usize, QueryExecution)> {
        let start = Instant::now();
        let schema = self.catalog.get_table(&request.table_name)?;
        let table = schema.table_name.as_str();
        self.check_columns(&schema, &request.conditions)?;

        for (column, value) in &request.set {
            let column_schema =
                schema
                    .get_column(column)
                    .ok_or_else(|| DbError::ColumnNotFound {
                        table: table.to_string(),
                        column: column.clone(),
                    })?;
            if value.is_null() && !column_schema.nullable {
                return Err(DbError::NotNullViolation {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }

        let primary: Vec<String> = schema
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let unique = unique_columns(&schema);
        let resolved = self.resolve_rows(&schema, &request.conditions)?;

        let mut count = 0;
        for row in &resolved.rows {
            for (column, value) in &request.set {
                if primary.iter().any(|c| c == column) {
                    if value.is_null() {
                        return Err(DbError::NotNullViolation {
                            table: table.to_string(),
                            column: column.clone(),
                        });
                    }
                    if self
                        .indexes
                        .primary_key_conflict(table, column, value, Some(row.row_id))
                    {
                        return Err(DbError::PrimaryKeyViolation {
                            table: table.to_string(),
                            column: column.clone(),
                            value: value.clone(),
                        });
                    }
                }
                if unique.iter().any(|c| c == column)
                    && !value.is_null()
                    && self
                        .indexes
                        .unique_key_conflict(table, column, value, Some(row.row_id))
                {
                    return Err(DbError::UniqueKeyViolation {
                        table: table.to_string(),
                        column: column.clone(),
                        value: value.clone(),
                    });
                }
            }

            let row_id = row.row_id;
            let mutated = self
                .storage
                .update_rows(table, &request.set, |r| r.row_id == row_id)?;
            for (old, new) in &mutated {
                self.indexes.on_row_updated(table, old, new)?;
            }
            count += mutated.len();
        }

        let plan = QueryExecution {
            table: table.to_string(),
            query_type: "UPDATE".to_string(),
            index_used: resolved.index_used,
            index_name: resolved.index_name,
            index_column: resolved.index_column,
            index_operation: resolved.index_operation,
            rows_scanned: resolved.rows_scanned,
            rows_returned: count,
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            where_clause: conditions_display(&request.conditions),
        };
        Ok((count, plan))
    }

    /// Tombstone every matching row and deregister it from all indexes.
    pub fn delete(&self, request: DeleteRequest) -> Result<(usize, QueryExecution)> {
        let start = Instant::now();
        let schema = self.catalog.get_table(&request.table_name)?;
        let table = schema.table_name.as_str();
        self.check_columns(&schema, &request.conditions)?;

        let resolved = self.resolve_rows(&schema, &request.conditions)?;
        let targets: HashSet<RowId> = resolved.rows.iter().map(|row| row.row_id).collect();
        let removed = self
            .storage
            .delete_rows(table, |row| targets.contains(&row.row_id))?;
        for row in &removed {
            self.indexes.on_row_deleted(table, row)?;
        }

        let plan = QueryExecution {
            table: table.to_string(),
            query_type: "DELETE".to_string(),
            index_used: resolved.index_used,
            index_name: resolved.index_name,
            index_column: resolved.index_column,
            index_operation: resolved.index_operation,
            rows_scanned: resolved.rows_scanned,
            rows_returned: removed.len(),
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            where_clause: conditions_display(&request.conditions),
        };
        Ok((removed.len(), plan))
    }

    /// Equi-join two tables. The right side is read fully and built into a
    /// probe map; WHERE clauses after the join must use fully qualified
    /// `table.column` references. LIMIT/OFFSET apply to the joined stream.
    pub fn join(&self, request: JoinRequest) -> Result<(Vec<OutputRow>, QueryExecution)> {
        let start = Instant::now();
        let left_schema = self.catalog.get_table(&request.left_table)?;
        let right_schema = self.catalog.get_table(&request.right_table)?;
        self.check_column(&left_schema, &request.left_column)?;
        self.check_column(&right_schema, &request.right_column)?;

        let joined_name = format!("{} JOIN {}", request.left_table, request.right_table);
        for condition in &request.conditions {
            self.check_qualified(&joined_name, &left_schema, &right_schema, &condition.column)?;
        }
        if let Some(columns) = &request.columns {
            for column in columns {
                self.check_qualified(&joined_name, &left_schema, &right_schema, column)?;
            }
        }

        // Read under shared locks in lexical table order.
        let (left_rows, right_rows) = if request.left_table <= request.right_table {
            let left = self.storage.read_all_rows(&request.left_table)?;
            let right = self.storage.read_all_rows(&request.right_table)?;
            (left, right)
        } else {
            let right = self.storage.read_all_rows(&request.right_table)?;
            let left = self.storage.read_all_rows(&request.left_table)?;
            (left, right)
        };
        let rows_scanned = left_rows.len() + right_rows.len();

        let joined = execute_join(
            JoinInput {
                table: &request.left_table,
                rows: &left_rows,
                column: &request.left_column,
            },
            JoinInput {
                table: &request.right_table,
                rows: &right_rows,
                column: &request.right_column,
            },
            request.join_type,
        );

        let filtered: Vec<OutputRow> = joined
            .into_iter()
            .filter(|row| predicate::matches_all(row, &request.conditions))
            .collect();
        let windowed = apply_window(filtered, request.offset, request.limit);

        let output: Vec<OutputRow> = match &request.columns {
            None => windowed,
            Some(columns) => windowed
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .filter_map(|column| {
                            row.iter()
                                .find(|(name, _)| name == column)
                                .map(|(name, value)| (name.clone(), value.clone()))
                        })
                        .collect()
                })
                .collect(),
        };

        let plan = QueryExecution {
            table: joined_name,
            query_type: "JOIN".to_string(),
            index_used: false,
            index_name: None,
            index_column: None,
            index_operation: None,
            rows_scanned,
            rows_returned: output.len(),
            execution_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            where_clause: conditions_display(&request.conditions),
        };
        Ok((output, plan))
    }

    // ------------------------------------------------------------------
    // Access-method chooser
    // ------------------------------------------------------------------

    /// Walk WHERE entries in insertion order and take the first indexed
    /// equality, falling back to the first indexed range operator; apply
    /// the remaining predicates to the candidate rows. No usable entry
    /// means a full scan.
    fn resolve_rows(&self, schema: &TableSchema, conditions: &[Condition]) -> Result<ResolvedRows> {
        let table = schema.table_name.as_str();
        let all_rows = self.storage.read_all_rows(table)?;

        let eligible = |condition: &Condition| {
            !condition.value.is_null() && self.indexes.is_column_indexed(table, &condition.column)
        };
        let chosen = conditions
            .iter()
            .enumerate()
            .find(|(_, c)| c.op == CompareOp::Eq && eligible(c))
            .or_else(|| {
                conditions.iter().enumerate().find(|(_, c)| {
                    matches!(
                        c.op,
                        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte
                    ) && eligible(c)
                })
            });

        let Some((chosen_at, condition)) = chosen else {
            let rows_scanned = all_rows.len();
            let rows: Vec<Row> = all_rows
                .into_iter()
                .filter(|row| predicate::matches_all(&row.values, conditions))
                .collect();
            return Ok(ResolvedRows {
                rows,
                rows_scanned,
                index_used: false,
                index_name: None,
                index_column: None,
                index_operation: None,
            });
        };

        let column = condition.column.as_str();
        let value = &condition.value;
        let (ids, operation) = match condition.op {
            CompareOp::Eq => (
                self.indexes.find_equal(table, column, value),
                IndexOperation::EqualityLookup,
            ),
            CompareOp::Gt => (
                self.indexes.find_greater_than(table, column, value, false),
                IndexOperation::RangeScanGt,
            ),
            CompareOp::Gte => (
                self.indexes.find_greater_than(table, column, value, true),
                IndexOperation::RangeScanGte,
            ),
            CompareOp::Lt => (
                self.indexes.find_less_than(table, column, value, false),
                IndexOperation::RangeScanLt,
            ),
            CompareOp::Lte => (
                self.indexes.find_less_than(table, column, value, true),
                IndexOperation::RangeScanLte,
            ),
            _ => unreachable!("chooser only selects equality and range operators"),
        };
        let ids: HashSet<RowId> = ids
            .ok_or_else(|| DbError::index(format!("index on {}.{} disappeared", table, column)))?
            .into_iter()
            .collect();

        let candidates: Vec<Row> = all_rows
            .into_iter()
            .filter(|row| ids.contains(&row.row_id))
            .collect();
        let rows_scanned = candidates.len();
        let remaining: Vec<Condition> = conditions
            .iter()
            .enumerate()
            .filter(|(at, _)| *at != chosen_at)
            .map(|(_, c)| c.clone())
            .collect();
        let rows: Vec<Row> = candidates
            .into_iter()
            .filter(|row| predicate::matches_all(&row.values, &remaining))
            .collect();

        Ok(ResolvedRows {
            rows,
            rows_scanned,
            index_used: true,
            index_name: self.indexes.index_name_for(table, column),
            index_column: Some(column.to_string()),
            index_operation: Some(operation),
        })
    }

    fn check_column(&self, schema: &TableSchema, column: &str) -> Result<()> {
        if schema.has_column(column) {
            return Ok(());
        }
        Err(DbError::ColumnNotFound {
            table: schema.table_name.clone(),
            column: column.to_string(),
        })
    }

    fn check_columns(&self, schema: &TableSchema, conditions: &[Condition]) -> Result<()> {
        for condition in conditions {
            self.check_column(schema, &condition.column)?;
        }
        Ok(())
    }

    /// Joined-stream references must be `table.column` over one of the two
    /// joined tables.
    fn check_qualified(
        &self,
        joined_name: &str,
        left: &TableSchema,
        right: &TableSchema,
        reference: &str,
    ) -> Result<()> {
        let not_found = || DbError::ColumnNotFound {
            table: joined_name.to_string(),
            column: reference.to_string(),
        };
        let (table, column) = reference.split_once('.').ok_or_else(not_found)?;
        let schema = if table == left.table_name {
            left
        } else if table == right.table_name {
            right
        } else {
            return Err(not_found());
        };
        if !schema.has_column(column) {
            return Err(not_found());
        }
        Ok(())
    }
}

fn lookup<'a>(values: &'a [(String, Value)], column: &str) -> &'a Value {
    values
        .iter()
        .find(|(name, _)| name == column)
        .map(|(_, value)| value)
        .unwrap_or(&Value::Null)
}

/// Columns carrying a UNIQUE key or a unique secondary index.
fn unique_columns(schema: &TableSchema) -> Vec<String> {
    let mut columns: Vec<String> = schema
        .unique_key_columns()
        .into_iter()
        .map(str::to_string)
        .collect();
    for index in &schema.indexes {
        if index.unique && !columns.iter().any(|c| c == &index.column_name) {
            columns.push(index.column_name.clone());
        }
    }
    columns
}

/// Typed rendering of a stored default-value string.
fn parse_default(table: &str, column: &ColumnSchema, text: &str) -> Result<Value> {
    let invalid = || DbError::InvalidSql {
        sql: format!(
            "invalid default value '{}' for column '{}' of table '{}'",
            text, column.name, table
        ),
    };
    match column.data_type {
        DataType::Integer => text.parse::<i32>().map(Value::Integer).map_err(|_| invalid()),
        DataType::BigInt => text.parse::<i64>().map(Value::BigInt).map_err(|_| invalid()),
        DataType::Decimal => text.parse::<f64>().map(Value::Double).map_err(|_| invalid()),
        DataType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid()),
        },
        DataType::Varchar | DataType::Text | DataType::Date | DataType::Timestamp => {
            Ok(Value::String(text.to_string()))
        }
    }
}

/// Multi-key ORDER BY with the engine-wide value ordering.
fn sort_rows(rows: &mut [Row], order_by: &[OrderBy]) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in order_by {
            let left = a.get(&order.column).unwrap_or(&Value::Null);
            let right = b.get(&order.column).unwrap_or(&Value::Null);
            let mut ordering = IndexKey::compare(left, right);
            if order.descending {
                ordering = ordering.reverse();
            }
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// OFFSET first, then LIMIT.
fn apply_window<T>(rows: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    let iter = rows.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
