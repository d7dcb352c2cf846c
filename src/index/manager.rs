// Owner of every live index. Indexes are grouped per table into a primary
// map and a regular map (unique and non-unique secondary indexes), plus a
// membership set of indexed columns. The executor drives maintenance through
// the on_row_* event handlers while holding the table's write lock; lookup
// helpers return `None` when a column has no index at all, which is how the
// access-method chooser distinguishes "not indexed" from "no matches".

use crate::catalog::TableSchema;
use crate::common::{Row, RowId, Value};
use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::index::btree::{BTreeIndex, IndexStats};
use crate::index::key::IndexKey;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::fs;
use tracing::{info, warn};

pub struct IndexManager {
    config: DatabaseConfig,
    /// table -> column -> primary-key index (`pk_` prefixed)
    primary: DashMap<String, HashMap<String, BTreeIndex>>,
    /// table -> column -> secondary index (unique or not)
    regular: DashMap<String, HashMap<String, BTreeIndex>>,
    /// table -> columns with any index, for cheap membership checks
    indexed_columns: DashMap<String, HashSet<String>>,
}

impl IndexManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            primary: DashMap::new(),
            regular: DashMap::new(),
            indexed_columns: DashMap::new(),
        }
    }

    /// Scan `<data_dir>/indexes/*.idx` and restore every persisted index.
    /// Names prefixed `pk_` land in the primary map, the rest in the regular
    /// map with their persisted uniqueness flag.
    pub fn load_all(&self) -> Result<usize> {
        let dir = self.config.indexes_dir();
        let entries = fs::read_dir(&dir).map_err(DbError::index)?;
        let mut loaded = 0;
        for entry in entries {
            let entry = entry.map_err(DbError::index)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".idx") {
                continue;
            }
            let index = BTreeIndex::load(&entry.path())?;
            self.register(index);
            loaded += 1;
        }
        if loaded > 0 {
            info!(count = loaded, "indexes loaded");
        }
        Ok(loaded)
    }

    fn register(&self, index: BTreeIndex) {
        let table = index.table_name().to_string();
        let column = index.column_name().to_string();
        self.indexed_columns
            .entry(table.clone())
            .or_default()
            .insert(column.clone());
        let target = if index.index_name().starts_with("pk_") {
            &self.primary
        } else {
            &self.regular
        };
        target.entry(table).or_default().insert(column, index);
    }

    /// Create an empty index. Primary indexes are unique by construction.
    pub fn create_index(
        &self,
        table: &str,
        index_name: &str,
        column: &str,
        unique: bool,
        primary: bool,
    ) -> Result<()> {
        let index = BTreeIndex::new(index_name, table, column, unique || primary);
        if primary && !index_name.starts_with("pk_") {
            return Err(DbError::index(format!(
                "primary index '{}' must carry the pk_ prefix",
                index_name
            )));
        }
        self.register(index);
        Ok(())
    }

    /// Whether a table has any live index; used at startup to decide on a
    /// rebuild from row data.
    pub fn has_indexes(&self, table: &str) -> bool {
        self.indexed_columns
            .get(table)
            .map(|cols| !cols.is_empty())
            .unwrap_or(false)
    }

    pub fn is_column_indexed(&self, table: &str, column: &str) -> bool {
        self.indexed_columns
            .get(table)
            .map(|cols| cols.contains(column))
            .unwrap_or(false)
    }

    /// Name of the index serving a column, primary indexes first; `None`
    /// when the column is not indexed. Used for plan records.
    pub fn index_name_for(&self, table: &str, column: &str) -> Option<String> {
        if let Some(map) = self.primary.get(table) {
            if let Some(index) = map.get(column) {
                return Some(index.index_name().to_string());
            }
        }
        self.regular
            .get(table)
            .and_then(|map| map.get(column).map(|index| index.index_name().to_string()))
    }

    // ------------------------------------------------------------------
    // Mutation event handlers (called under the table's write lock)
    // ------------------------------------------------------------------

    /// Register a freshly stored row in every index covering one of its
    /// non-null columns. PK/UNIQUE existence must have been checked first.
    pub fn on_row_inserted(&self, table: &str, row: &Row) -> Result<()> {
        self.with_indexes_mut(table, |index| {
            match row.get(index.column_name()) {
                Some(value) if !value.is_null() => index.insert(value.clone(), row.row_id),
                _ => Ok(()),
            }
        })
    }

    /// Re-point every index whose column changed value.
    pub fn on_row_updated(&self, table: &str, old: &Row, new: &Row) -> Result<()> {
        self.with_indexes_mut(table, |index| {
            let column = index.column_name();
            let old_value = old.get(column).cloned().unwrap_or(Value::Null);
            let new_value = new.get(column).cloned().unwrap_or(Value::Null);
            if IndexKey::values_equal(&old_value, &new_value) {
                return Ok(());
            }
            if !old_value.is_null() {
                index.delete(&old_value, old.row_id);
            }
            if !new_value.is_null() {
                index.insert(new_value, new.row_id)?;
            }
            Ok(())
        })
    }

    /// Remove a tombstoned row from every index.
    pub fn on_row_deleted(&self, table: &str, row: &Row) -> Result<()> {
        self.with_indexes_mut(table, |index| {
            if let Some(value) = row.get(index.column_name()) {
                if !value.is_null() {
                    index.delete(value, row.row_id);
                }
            }
            Ok(())
        })
    }

    fn with_indexes_mut(
        &self,
        table: &str,
        mut apply: impl FnMut(&mut BTreeIndex) -> Result<()>,
    ) -> Result<()> {
        if let Some(mut map) = self.primary.get_mut(table) {
            for index in map.values_mut() {
                apply(index).map_err(promote_primary)?;
            }
        }
        if let Some(mut map) = self.regular.get_mut(table) {
            for index in map.values_mut() {
                apply(index)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup helpers for the access-method chooser
    // ------------------------------------------------------------------

    pub fn find_equal(&self, table: &str, column: &str, value: &Value) -> Option<Vec<RowId>> {
        self.with_index(table, column, |index| index.find(value).into_iter().collect())
    }

    pub fn find_range(
        &self,
        table: &str,
        column: &str,
        min: &Value,
        max: &Value,
    ) -> Option<Vec<RowId>> {
        self.with_index(table, column, |index| {
            index.find_range(min, max).into_iter().collect()
        })
    }

    pub fn find_greater_than(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        inclusive: bool,
    ) -> Option<Vec<RowId>> {
        self.with_index(table, column, |index| {
            index.find_greater_than(value, inclusive).into_iter().collect()
        })
    }

    pub fn find_less_than(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        inclusive: bool,
    ) -> Option<Vec<RowId>> {
        self.with_index(table, column, |index| {
            index.find_less_than(value, inclusive).into_iter().collect()
        })
    }

    fn with_index<T>(
        &self,
        table: &str,
        column: &str,
        apply: impl FnOnce(&BTreeIndex) -> T,
    ) -> Option<T> {
        if let Some(map) = self.primary.get(table) {
            if let Some(index) = map.get(column) {
                return Some(apply(index));
            }
        }
        self.regular
            .get(table)
            .and_then(|map| map.get(column).map(apply))
    }

    // ------------------------------------------------------------------
    // Constraint checks
    // ------------------------------------------------------------------

    /// Does any row other than `exclude` hold `value` in the primary index
    /// on `column`?
    pub fn primary_key_conflict(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude: Option<RowId>,
    ) -> bool {
        self.primary
            .get(table)
            .and_then(|map| {
                map.get(column)
                    .map(|index| occupied_by_other(index, value, exclude))
            })
            .unwrap_or(false)
    }

    /// Does any row other than `exclude` hold `value` in the primary index
    /// or any unique secondary index on `column`?
    pub fn unique_key_conflict(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude: Option<RowId>,
    ) -> bool {
        if self.primary_key_conflict(table, column, value, exclude) {
            return true;
        }
        self.regular
            .get(table)
            .and_then(|map| {
                map.get(column).map(|index| {
                    index.is_unique() && occupied_by_other(index, value, exclude)
                })
            })
            .unwrap_or(false)
    }

    pub fn primary_key_exists(&self, table: &str, column: &str, value: &Value) -> bool {
        self.primary_key_conflict(table, column, value, None)
    }

    pub fn unique_key_exists(&self, table: &str, column: &str, value: &Value) -> bool {
        self.unique_key_conflict(table, column, value, None)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Persist every index; called at shutdown.
    pub fn save_all(&self) -> Result<()> {
        let tables: Vec<String> = self
            .indexed_columns
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for table in tables {
            self.save_table(&table)?;
        }
        Ok(())
    }

    /// Persist one table's indexes; used after bulk rebuilds.
    pub fn save_table(&self, table: &str) -> Result<()> {
        if let Some(map) = self.primary.get(table) {
            for index in map.values() {
                index.save(&self.config.index_path(index.index_name()))?;
            }
        }
        if let Some(map) = self.regular.get(table) {
            for index in map.values() {
                index.save(&self.config.index_path(index.index_name()))?;
            }
        }
        Ok(())
    }

    /// Discard a table's indexes and their files; used by DROP TABLE.
    pub fn drop_table_indexes(&self, table: &str) -> Result<()> {
        let mut names = Vec::new();
        if let Some((_, map)) = self.primary.remove(table) {
            names.extend(map.values().map(|i| i.index_name().to_string()));
        }
        if let Some((_, map)) = self.regular.remove(table) {
            names.extend(map.values().map(|i| i.index_name().to_string()));
        }
        self.indexed_columns.remove(table);
        for name in names {
            let path = self.config.index_path(&name);
            if path.exists() {
                fs::remove_file(&path).map_err(DbError::index)?;
            }
        }
        Ok(())
    }

    /// Recreate a table's indexes from its schema definitions and reindex
    /// every active row, then persist. Used when a table exists on disk but
    /// no index files do.
    pub fn rebuild_indexes(&self, schema: &TableSchema, rows: &[Row]) -> Result<()> {
        let table = schema.table_name.as_str();
        warn!(table = %table, rows = rows.len(), "rebuilding indexes from row data");
        self.primary.remove(table);
        self.regular.remove(table);
        self.indexed_columns.remove(table);

        for column in schema.primary_key_columns() {
            let name = format!("pk_{}_{}", table, column);
            self.create_index(table, &name, column, true, true)?;
        }
        for column in schema.unique_key_columns() {
            let name = format!("uq_{}_{}", table, column);
            self.create_index(table, &name, column, true, false)?;
        }
        for index in &schema.indexes {
            self.create_index(table, &index.index_name, &index.column_name, index.unique, false)?;
        }

        for row in rows {
            if !row.deleted {
                self.on_row_inserted(table, row)?;
            }
        }
        self.save_table(table)
    }

    /// Identity and counters of every live index, for SHOW INDEXES.
    pub fn list_all(&self) -> Vec<IndexStats> {
        let mut stats = Vec::new();
        for entry in self.primary.iter() {
            stats.extend(entry.value().values().map(|i| i.stats()));
        }
        for entry in self.regular.iter() {
            stats.extend(entry.value().values().map(|i| i.stats()));
        }
        stats.sort_by(|a, b| {
            (a.table_name.as_str(), a.index_name.as_str())
                .cmp(&(b.table_name.as_str(), b.index_name.as_str()))
        });
        stats
    }
}

fn occupied_by_other(index: &BTreeIndex, value: &Value, exclude: Option<RowId>) -> bool {
    index
        .find(value)
        .iter()
        .any(|row_id| Some(*row_id) != exclude)
}

/// A duplicate detected inside a primary index surfaces as a primary-key
/// violation rather than the generic unique-key one.
fn promote_primary(err: DbError) -> DbError {
    match err {
        DbError::UniqueKeyViolation {
            table,
            column,
            value,
        } => DbError::PrimaryKeyViolation {
            table,
            column,
            value,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSchema, DataType, IndexSchema, KeySchema, KeyType};
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> IndexManager {
        let config = DatabaseConfig::new(dir.path());
        fs::create_dir_all(config.indexes_dir()).unwrap();
        IndexManager::new(config)
    }

    fn row(row_id: RowId, id: i32, email: &str) -> Row {
        Row::new(
            row_id,
            vec![
                ("id".to_string(), Value::Integer(id)),
                ("email".to_string(), Value::String(email.to_string())),
            ],
        )
    }

    fn users_schema() -> TableSchema {
        let mut schema = TableSchema::new("users");
        schema.columns = vec![
            ColumnSchema {
                name: "id".to_string(),
                data_type: DataType::Integer,
                max_length: None,
                nullable: false,
                default_value: None,
                ordinal_position: 0,
            },
            ColumnSchema {
                name: "email".to_string(),
                data_type: DataType::Varchar,
                max_length: Some(64),
                nullable: true,
                default_value: None,
                ordinal_position: 1,
            },
        ];
        schema.keys = vec![
            KeySchema {
                column_name: "id".to_string(),
                key_type: KeyType::Primary,
            },
            KeySchema {
                column_name: "email".to_string(),
                key_type: KeyType::Unique,
            },
        ];
        schema
    }

    fn setup_users(manager: &IndexManager) {
        manager
            .create_index("users", "pk_users_id", "id", true, true)
            .unwrap();
        manager
            .create_index("users", "uq_users_email", "email", true, false)
            .unwrap();
    }

    #[test]
    fn test_insert_and_lookup() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);

        manager.on_row_inserted("users", &row(1, 10, "a@x")).unwrap();
        manager.on_row_inserted("users", &row(2, 20, "b@x")).unwrap();

        assert_eq!(
            manager.find_equal("users", "id", &Value::Integer(10)),
            Some(vec![1])
        );
        assert_eq!(
            manager.find_equal("users", "email", &Value::String("b@x".to_string())),
            Some(vec![2])
        );
        // Unindexed column: None, distinct from "no matches".
        assert_eq!(manager.find_equal("users", "name", &Value::Null), None);
        assert_eq!(
            manager.find_equal("users", "id", &Value::Integer(99)),
            Some(vec![])
        );
    }

    #[test]
    fn test_range_lookups_through_manager() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);
        for (row_id, id) in [(1, 10), (2, 20), (3, 30)] {
            manager
                .on_row_inserted("users", &row(row_id, id, &format!("u{}@x", id)))
                .unwrap();
        }

        assert_eq!(
            manager.find_range("users", "id", &Value::Integer(10), &Value::Integer(20)),
            Some(vec![1, 2])
        );
        assert_eq!(
            manager.find_greater_than("users", "id", &Value::Integer(10), false),
            Some(vec![2, 3])
        );
        assert_eq!(
            manager.find_less_than("users", "id", &Value::Integer(30), true),
            Some(vec![1, 2, 3])
        );
        // Unindexed column: the range helpers report "no index" too.
        assert_eq!(
            manager.find_range("users", "name", &Value::Integer(0), &Value::Integer(9)),
            None
        );
    }

    #[test]
    fn test_constraint_checks() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);
        manager.on_row_inserted("users", &row(1, 10, "a@x")).unwrap();

        assert!(manager.primary_key_exists("users", "id", &Value::Integer(10)));
        assert!(!manager.primary_key_exists("users", "id", &Value::Integer(11)));
        assert!(manager.unique_key_exists(
            "users",
            "email",
            &Value::String("a@x".to_string())
        ));

        // The row itself is not a conflict when excluded.
        assert!(!manager.primary_key_conflict("users", "id", &Value::Integer(10), Some(1)));
        assert!(manager.primary_key_conflict("users", "id", &Value::Integer(10), Some(2)));
    }

    #[test]
    fn test_duplicate_in_primary_index_promotes() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);
        manager.on_row_inserted("users", &row(1, 10, "a@x")).unwrap();

        let err = manager
            .on_row_inserted("users", &row(2, 10, "b@x"))
            .unwrap_err();
        assert_eq!(err.code(), "PRIMARY_KEY_VIOLATION");
    }

    #[test]
    fn test_update_and_delete_events() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);

        let old = row(1, 10, "a@x");
        manager.on_row_inserted("users", &old).unwrap();
        let new = row(1, 10, "c@x");
        manager.on_row_updated("users", &old, &new).unwrap();

        assert_eq!(
            manager.find_equal("users", "email", &Value::String("a@x".to_string())),
            Some(vec![])
        );
        assert_eq!(
            manager.find_equal("users", "email", &Value::String("c@x".to_string())),
            Some(vec![1])
        );
        // Unchanged column stays registered.
        assert_eq!(
            manager.find_equal("users", "id", &Value::Integer(10)),
            Some(vec![1])
        );

        manager.on_row_deleted("users", &new).unwrap();
        assert_eq!(
            manager.find_equal("users", "id", &Value::Integer(10)),
            Some(vec![])
        );
        assert_eq!(
            manager.find_equal("users", "email", &Value::String("c@x".to_string())),
            Some(vec![])
        );
    }

    #[test]
    fn test_null_values_are_not_indexed() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);

        let mut r = row(1, 10, "ignored");
        r.set("email", Value::Null);
        manager.on_row_inserted("users", &r).unwrap();

        // A second null email is no unique violation.
        let mut r2 = row(2, 20, "ignored");
        r2.set("email", Value::Null);
        manager.on_row_inserted("users", &r2).unwrap();
        assert!(!manager.unique_key_exists("users", "email", &Value::Null));
    }

    #[test]
    fn test_save_load_classifies_primary() {
        let dir = TempDir::new().unwrap();
        {
            let manager = manager(&dir);
            setup_users(&manager);
            manager.on_row_inserted("users", &row(1, 10, "a@x")).unwrap();
            manager.save_all().unwrap();
        }

        let restored = manager(&dir);
        assert_eq!(restored.load_all().unwrap(), 2);
        assert!(restored.primary_key_exists("users", "id", &Value::Integer(10)));
        assert!(restored.unique_key_exists(
            "users",
            "email",
            &Value::String("a@x".to_string())
        ));
        assert_eq!(
            restored.index_name_for("users", "id"),
            Some("pk_users_id".to_string())
        );
    }

    #[test]
    fn test_rebuild_from_rows() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let mut schema = users_schema();
        schema.indexes = vec![IndexSchema {
            index_name: "idx_users_email".to_string(),
            column_name: "email".to_string(),
            unique: false,
        }];

        let rows = vec![row(1, 10, "a@x"), row(2, 20, "b@x")];
        manager.rebuild_indexes(&schema, &rows).unwrap();

        assert!(manager.has_indexes("users"));
        assert!(manager.is_column_indexed("users", "id"));
        assert_eq!(
            manager.find_equal("users", "id", &Value::Integer(20)),
            Some(vec![2])
        );
        // Rebuild persists immediately.
        assert!(manager
            .config
            .index_path("pk_users_id")
            .exists());
        assert!(manager.config.index_path("uq_users_email").exists());
        assert!(manager.config.index_path("idx_users_email").exists());
    }

    #[test]
    fn test_drop_table_indexes_removes_files() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);
        manager.save_table("users").unwrap();
        assert!(manager.config.index_path("pk_users_id").exists());

        manager.drop_table_indexes("users").unwrap();
        assert!(!manager.has_indexes("users"));
        assert!(!manager.config.index_path("pk_users_id").exists());
        assert_eq!(manager.find_equal("users", "id", &Value::Integer(1)), None);
    }

    #[test]
    fn test_list_all_sorted() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        setup_users(&manager);
        manager
            .create_index("accounts", "pk_accounts_id", "id", true, true)
            .unwrap();

        let stats = manager.list_all();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].table_name, "accounts");
        assert_eq!(stats[1].index_name, "pk_users_id");
        assert_eq!(stats[2].index_name, "uq_users_email");
    }
}
