// Page cache and file I/O. Each table maps to a sequence of 4096-byte pages
// backed by `<data_dir>/tables/<table>.dat`, loaded on first access and kept
// for the process lifetime. The per-table `RwLock` is the engine's
// reader/writer lock: readers take it shared, mutators exclusive. Mutations
// write affected pages through to the file before returning and leave them
// clean; `flush_all` exists for shutdown.

use crate::catalog::Catalog;
use crate::common::{Row, Value};
use crate::config::{DatabaseConfig, PAGE_SIZE};
use crate::error::{DbError, Result};
use crate::storage::codec::{decode_row, encode_row};
use crate::storage::page::Page;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::debug;

/// One table's in-memory page list plus its backing file.
struct TableStore {
    table: String,
    file: File,
    pages: Vec<Page>,
}

impl TableStore {
    fn load(table: &str, config: &DatabaseConfig) -> Result<Self> {
        let path = config.table_path(table);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DbError::storage_read(table, e))?;

        let len = file
            .metadata()
            .map_err(|e| DbError::storage_read(table, e))?
            .len() as usize;
        let page_count = len / PAGE_SIZE;
        let mut pages = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            file.seek(SeekFrom::Start((page_index * PAGE_SIZE) as u64))
                .map_err(|e| DbError::storage_read(table, e))?;
            let mut buf = vec![0u8; PAGE_SIZE];
            file.read_exact(&mut buf)
                .map_err(|e| DbError::storage_read(table, e))?;
            pages.push(Page::from_bytes(buf).map_err(|e| DbError::storage_read(table, e))?);
        }

        Ok(Self {
            table: table.to_string(),
            file,
            pages,
        })
    }

    /// Place a row image in the first page with room, allocating a new page
    /// when none has any. Fails only when the image can never fit in a page.
    fn insert_bytes(&mut self, bytes: &[u8]) -> Result<(usize, usize)> {
        for (page_index, page) in self.pages.iter_mut().enumerate() {
            if let Some(slot) = page.insert_row(bytes) {
                return Ok((page_index, slot));
            }
        }

        let page_index = self.pages.len();
        let mut page = Page::new(page_index as u32);
        let slot = page.insert_row(bytes).ok_or_else(|| {
            DbError::storage_write(&self.table, "row image exceeds page capacity")
        })?;
        debug!(table = %self.table, page = page_index, "allocated page");
        self.pages.push(page);
        Ok((page_index, slot))
    }

    fn write_page(&mut self, page_index: usize) -> Result<()> {
        let offset = (page_index * PAGE_SIZE) as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(self.pages[page_index].as_bytes()))
            .map_err(|e| DbError::storage_write(&self.table, e))?;
        self.pages[page_index].mark_clean();
        Ok(())
    }

    fn flush_dirty(&mut self) -> Result<()> {
        for page_index in 0..self.pages.len() {
            if self.pages[page_index].is_dirty() {
                self.write_page(page_index)?;
            }
        }
        Ok(())
    }
}

/// Table-addressed row storage composing the slotted page and the row codec.
pub struct StorageEngine {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    tables: DashMap<String, Arc<RwLock<TableStore>>>,
}

impl StorageEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            config: catalog.config().clone(),
            catalog,
            tables: DashMap::new(),
        }
    }

    fn store(&self, table: &str) -> Result<Arc<RwLock<TableStore>>> {
        if let Some(store) = self.tables.get(table) {
            return Ok(store.value().clone());
        }
        if !self.catalog.table_exists(table) {
            return Err(DbError::TableNotFound {
                table: table.to_string(),
            });
        }
        let store = Arc::new(RwLock::new(TableStore::load(table, &self.config)?));
        self.tables.insert(table.to_string(), store.clone());
        Ok(store)
    }

    /// Assign the next row id, serialize, place the row, and write the page
    /// through. Returns the stored row.
    pub fn insert_row(&self, table: &str, values: Vec<(String, Value)>) -> Result<Row> {
        let store = self.store(table)?;
        let mut store = store.write();

        let row_id = self.catalog.allocate_row_id(table)?;
        let row = Row::new(row_id, values);
        let bytes = encode_row(&row);
        let (page_index, _slot) = store.insert_bytes(&bytes)?;
        store.write_page(page_index)?;
        self.catalog.adjust_row_count(table, 1)?;
        Ok(row)
    }

    /// Every active row, in page and slot order.
    pub fn read_all_rows(&self, table: &str) -> Result<Vec<Row>> {
        let store = self.store(table)?;
        let store = store.read();

        let mut rows = Vec::new();
        for page in &store.pages {
            for (_slot, bytes) in page.iter_rows() {
                let row = decode_row(bytes).map_err(|e| DbError::storage_read(table, e))?;
                if !row.deleted {
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    /// Apply `set` to every row matching the predicate. A row whose new
    /// image no longer fits its page is tombstoned and re-inserted with its
    /// row id preserved. Returns the (old, new) pair per mutated row.
    pub fn update_rows(
        &self,
        table: &str,
        set: &[(String, Value)],
        predicate: impl Fn(&Row) -> bool,
    ) -> Result<Vec<(Row, Row)>> {
        let store = self.store(table)?;
        let mut store = store.write();

        let mut mutated = Vec::new();
        // A grown row re-inserted ahead of the scan must not be mutated twice.
        let mut seen = HashSet::new();
        let page_count = store.pages.len();
        for page_index in 0..page_count {
            let slot_count = store.pages[page_index].slot_count();
            for slot in 0..slot_count {
                let Some(bytes) = store.pages[page_index].read_row(slot) else {
                    continue;
                };
                let old = decode_row(bytes).map_err(|e| DbError::storage_read(table, e))?;
                if old.deleted || seen.contains(&old.row_id) || !predicate(&old) {
                    continue;
                }
                seen.insert(old.row_id);

                let mut new = old.clone();
                for (column, value) in set {
                    new.set(column, value.clone());
                }
                new.updated_at = Utc::now();
                let image = encode_row(&new);

                if store.pages[page_index].update_row(slot, &image).is_none() {
                    // No room left in this page: move the row, keeping its id.
                    store.pages[page_index].delete_row(slot);
                    store.insert_bytes(&image)?;
                }
                mutated.push((old, new));
            }
        }

        store.flush_dirty()?;
        Ok(mutated)
    }

    /// Tombstone every row matching the predicate and decrement the row
    /// count. Returns the removed rows.
    pub fn delete_rows(
        &self,
        table: &str,
        predicate: impl Fn(&Row) -> bool,
    ) -> Result<Vec<Row>> {
        let store = self.store(table)?;
        let mut store = store.write();

        let mut removed = Vec::new();
        for page_index in 0..store.pages.len() {
            let slot_count = store.pages[page_index].slot_count();
            for slot in 0..slot_count {
                let Some(bytes) = store.pages[page_index].read_row(slot) else {
                    continue;
                };
                let row = decode_row(bytes).map_err(|e| DbError::storage_read(table, e))?;
                if row.deleted || !predicate(&row) {
                    continue;
                }
                store.pages[page_index].delete_row(slot);
                removed.push(row);
            }
        }

        store.flush_dirty()?;
        if !removed.is_empty() {
            self.catalog.adjust_row_count(table, -(removed.len() as i64))?;
        }
        Ok(removed)
    }

    /// Forget a table's cached pages; used by DROP TABLE.
    pub fn invalidate(&self, table: &str) {
        self.tables.remove(table);
    }

    pub fn flush_table(&self, table: &str) -> Result<()> {
        if let Some(store) = self.tables.get(table) {
            store.write().flush_dirty()?;
        }
        Ok(())
    }

    /// Write every dirty page of every cached table; called at shutdown.
    pub fn flush_all(&self) -> Result<()> {
        for entry in self.tables.iter() {
            entry.value().write().flush_dirty()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSchema, DataType, TableSchema};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Arc<Catalog>, StorageEngine) {
        let catalog = Arc::new(Catalog::open(DatabaseConfig::new(dir.path())).unwrap());
        let mut schema = TableSchema::new("items");
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
                name: "label".to_string(),
                data_type: DataType::Text,
                max_length: None,
                nullable: true,
                default_value: None,
                ordinal_position: 1,
            },
        ];
        catalog.create_table(schema).unwrap();
        let storage = StorageEngine::new(catalog.clone());
        (catalog, storage)
    }

    fn item(id: i32, label: &str) -> Vec<(String, Value)> {
        vec![
            ("id".to_string(), Value::Integer(id)),
            ("label".to_string(), Value::String(label.to_string())),
        ]
    }

    #[test]
    fn test_insert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let (catalog, storage) = setup(&dir);

        let row = storage.insert_row("items", item(1, "first")).unwrap();
        assert_eq!(row.row_id, 1);
        storage.insert_row("items", item(2, "second")).unwrap();

        let rows = storage.read_all_rows("items").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("label"), Some(&Value::String("first".to_string())));
        assert_eq!(rows[1].row_id, 2);
        assert_eq!(catalog.get_table("items").unwrap().row_count, 2);
    }

    #[test]
    fn test_rows_survive_reload() {
        let dir = TempDir::new().unwrap();
        let (catalog, storage) = setup(&dir);
        storage.insert_row("items", item(1, "persisted")).unwrap();
        drop(storage);

        let storage = StorageEngine::new(catalog);
        let rows = storage.read_all_rows("items").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("label"),
            Some(&Value::String("persisted".to_string()))
        );
    }

    #[test]
    fn test_update_preserves_row_id() {
        let dir = TempDir::new().unwrap();
        let (_catalog, storage) = setup(&dir);
        let row = storage.insert_row("items", item(1, "old")).unwrap();

        let set = vec![("label".to_string(), Value::String("new".to_string()))];
        let mutated = storage
            .update_rows("items", &set, |r| r.get("id") == Some(&Value::Integer(1)))
            .unwrap();
        assert_eq!(mutated.len(), 1);
        assert_eq!(mutated[0].0.get("label"), Some(&Value::String("old".to_string())));
        assert_eq!(mutated[0].1.row_id, row.row_id);

        let rows = storage.read_all_rows("items").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, row.row_id);
        assert_eq!(rows[0].get("label"), Some(&Value::String("new".to_string())));
    }

    #[test]
    fn test_update_grown_row_moves_but_keeps_id() {
        let dir = TempDir::new().unwrap();
        let (_catalog, storage) = setup(&dir);
        // Fill most of the first page so the grown row cannot stay put.
        for id in 0..7 {
            storage.insert_row("items", item(id, &"x".repeat(500))).unwrap();
        }
        let target = storage.insert_row("items", item(100, "short")).unwrap();

        let set = vec![("label".to_string(), Value::String("y".repeat(600)))];
        let mutated = storage
            .update_rows("items", &set, |r| r.get("id") == Some(&Value::Integer(100)))
            .unwrap();
        assert_eq!(mutated.len(), 1);

        let rows = storage.read_all_rows("items").unwrap();
        let moved = rows.iter().find(|r| r.row_id == target.row_id).unwrap();
        assert_eq!(moved.get("label"), Some(&Value::String("y".repeat(600))));
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn test_delete_tombstones_and_counts() {
        let dir = TempDir::new().unwrap();
        let (catalog, storage) = setup(&dir);
        for id in 0..10 {
            storage.insert_row("items", item(id, "row")).unwrap();
        }

        let removed = storage
            .delete_rows("items", |r| {
                matches!(r.get("id"), Some(Value::Integer(id)) if *id >= 6)
            })
            .unwrap();
        assert_eq!(removed.len(), 4);

        let rows = storage.read_all_rows("items").unwrap();
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| {
            matches!(r.get("id"), Some(Value::Integer(id)) if *id < 6)
        }));
        assert_eq!(catalog.get_table("items").unwrap().row_count, 6);
    }

    #[test]
    fn test_pages_allocated_on_demand() {
        let dir = TempDir::new().unwrap();
        let (catalog, storage) = setup(&dir);
        // Each row is ~1KB; a 4KB page holds at most 3 of them.
        for id in 0..12 {
            storage.insert_row("items", item(id, &"p".repeat(1000))).unwrap();
        }
        assert_eq!(storage.read_all_rows("items").unwrap().len(), 12);

        let file_len = std::fs::metadata(catalog.config().table_path("items"))
            .unwrap()
            .len() as usize;
        assert!(file_len >= 4 * PAGE_SIZE);
        assert_eq!(file_len % PAGE_SIZE, 0);
    }

    #[test]
    fn test_oversized_row_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let (_catalog, storage) = setup(&dir);
        let err = storage
            .insert_row("items", item(1, &"z".repeat(PAGE_SIZE)))
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_WRITE_ERROR");
    }

    #[test]
    fn test_unknown_table() {
        let dir = TempDir::new().unwrap();
        let (_catalog, storage) = setup(&dir);
        assert_eq!(
            storage.read_all_rows("ghost").unwrap_err().code(),
            "TABLE_NOT_FOUND"
        );
    }
}
