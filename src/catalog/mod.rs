// Schema catalog: the authoritative owner of every table's schema document.
// Documents live as `<data_dir>/schemas/<table>.schema.json` and are scanned
// into an in-memory map at open; callers always receive clones. The catalog
// also owns the table data-file lifecycle: creating a table preallocates its
// `.dat` file with one blank header page, dropping removes both files.

use crate::common::RowId;
use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::storage::page::Page;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use tracing::{debug, info};

/// Column data types. DECIMAL, DATE and TIMESTAMP are declared here but
/// carried through the engine untyped (see `common::Value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Varchar,
    Integer,
    BigInt,
    Decimal,
    Boolean,
    Date,
    Timestamp,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Primary,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_length: Option<u32>,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_value: Option<String>,
    pub ordinal_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySchema {
    pub column_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub index_name: String,
    pub column_name: String,
    pub unique: bool,
}

/// Per-table schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
    pub keys: Vec<KeySchema>,
    pub indexes: Vec<IndexSchema>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub row_count: u64,
    pub next_row_id: u64,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            keys: Vec::new(),
            indexes: Vec::new(),
            created_at: now,
            updated_at: now,
            row_count: 0,
            next_row_id: 1,
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| k.key_type == KeyType::Primary)
            .map(|k| k.column_name.as_str())
            .collect()
    }

    pub fn unique_key_columns(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| k.key_type == KeyType::Unique)
            .map(|k| k.column_name.as_str())
            .collect()
    }

    /// Structural invariants: identifier-shaped name, unique column names,
    /// ordinal positions matching list order, keys and indexes referencing
    /// real columns, index names unique within the table.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.table_name) {
            return Err(DbError::InvalidSql {
                sql: format!("invalid table name '{}'", self.table_name),
            });
        }
        let mut seen = HashSet::new();
        for (position, column) in self.columns.iter().enumerate() {
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::InvalidSql {
                    sql: format!(
                        "duplicate column '{}' in table '{}'",
                        column.name, self.table_name
                    ),
                });
            }
            if column.ordinal_position != position as u32 {
                return Err(DbError::InvalidSql {
                    sql: format!(
                        "column '{}' has ordinal {} but occupies position {}",
                        column.name, column.ordinal_position, position
                    ),
                });
            }
        }
        for key in &self.keys {
            if !self.has_column(&key.column_name) {
                return Err(DbError::ColumnNotFound {
                    table: self.table_name.clone(),
                    column: key.column_name.clone(),
                });
            }
        }
        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if !self.has_column(&index.column_name) {
                return Err(DbError::ColumnNotFound {
                    table: self.table_name.clone(),
                    column: index.column_name.clone(),
                });
            }
            if !index_names.insert(index.index_name.as_str()) {
                return Err(DbError::InvalidSql {
                    sql: format!(
                        "duplicate index name '{}' in table '{}'",
                        index.index_name, self.table_name
                    ),
                });
            }
        }
        Ok(())
    }
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// In-memory schema cache over the on-disk schema documents.
pub struct Catalog {
    config: DatabaseConfig,
    schemas: RwLock<HashMap<String, TableSchema>>,
}

impl Catalog {
    /// Create the data directories if absent and load every schema document.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        for dir in [config.schemas_dir(), config.tables_dir(), config.indexes_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| DbError::storage_write(&dir.to_string_lossy(), e))?;
        }

        let mut schemas = HashMap::new();
        let entries = fs::read_dir(config.schemas_dir())
            .map_err(|e| DbError::storage_read("schemas", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| DbError::storage_read("schemas", e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(table) = file_name.strip_suffix(".schema.json") else {
                continue;
            };
            let text = fs::read_to_string(entry.path())
                .map_err(|e| DbError::storage_read(table, e))?;
            let schema: TableSchema =
                serde_json::from_str(&text).map_err(|e| DbError::storage_read(table, e))?;
            schemas.insert(schema.table_name.clone(), schema);
        }
        info!(tables = schemas.len(), "catalog loaded");

        Ok(Self {
            config,
            schemas: RwLock::new(schemas),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Register a new table: schema document plus an empty data file holding
    /// one blank header page.
    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        schema.validate()?;
        let mut schemas = self.schemas.write();
        if schemas.contains_key(&schema.table_name) {
            return Err(DbError::TableAlreadyExists {
                table: schema.table_name.clone(),
            });
        }

        self.write_schema_document(&schema)?;
        let page = Page::new(0);
        fs::write(self.config.table_path(&schema.table_name), page.as_bytes())
            .map_err(|e| DbError::storage_write(&schema.table_name, e))?;

        info!(table = %schema.table_name, "table created");
        schemas.insert(schema.table_name.clone(), schema);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<TableSchema> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound {
                table: name.to_string(),
            })
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Rewrite a table's schema document; used for row-count and row-id
    /// counter changes.
    pub fn update_schema(&self, mut schema: TableSchema) -> Result<()> {
        let mut schemas = self.schemas.write();
        if !schemas.contains_key(&schema.table_name) {
            return Err(DbError::TableNotFound {
                table: schema.table_name.clone(),
            });
        }
        schema.updated_at = Utc::now();
        self.write_schema_document(&schema)?;
        schemas.insert(schema.table_name.clone(), schema);
        Ok(())
    }

    /// Remove the schema document and data file and invalidate the cache.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut schemas = self.schemas.write();
        if schemas.remove(name).is_none() {
            return Err(DbError::TableNotFound {
                table: name.to_string(),
            });
        }
        fs::remove_file(self.config.schema_path(name))
            .map_err(|e| DbError::storage_write(name, e))?;
        let data_path = self.config.table_path(name);
        if data_path.exists() {
            fs::remove_file(data_path).map_err(|e| DbError::storage_write(name, e))?;
        }
        info!(table = %name, "table dropped");
        Ok(())
    }

    /// Hand out the next monotonic row id and persist the counter. Ids are
    /// never reused, even after deletes.
    pub fn allocate_row_id(&self, table: &str) -> Result<RowId> {
        let mut schemas = self.schemas.write();
        let schema = schemas.get_mut(table).ok_or_else(|| DbError::TableNotFound {
            table: table.to_string(),
        })?;
        let row_id = schema.next_row_id;
        schema.next_row_id += 1;
        schema.updated_at = Utc::now();
        let snapshot = schema.clone();
        self.write_schema_document(&snapshot)?;
        Ok(row_id)
    }

    /// Apply a row-count delta and persist it.
    pub fn adjust_row_count(&self, table: &str, delta: i64) -> Result<()> {
        let mut schemas = self.schemas.write();
        let schema = schemas.get_mut(table).ok_or_else(|| DbError::TableNotFound {
            table: table.to_string(),
        })?;
        schema.row_count = if delta.is_negative() {
            schema.row_count.saturating_sub(delta.unsigned_abs())
        } else {
            schema.row_count + delta as u64
        };
        schema.updated_at = Utc::now();
        let snapshot = schema.clone();
        self.write_schema_document(&snapshot)?;
        debug!(table = %table, delta, row_count = snapshot.row_count, "row count adjusted");
        Ok(())
    }

    fn write_schema_document(&self, schema: &TableSchema) -> Result<()> {
        let text = serde_json::to_string_pretty(schema)
            .map_err(|e| DbError::storage_write(&schema.table_name, e))?;
        fs::write(self.config.schema_path(&schema.table_name), text)
            .map_err(|e| DbError::storage_write(&schema.table_name, e))
    }
}
