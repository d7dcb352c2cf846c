// reldb - a small self-contained relational storage engine.
//
// SQL text goes in through `Database::execute_sql`; the parser produces
// typed requests, the executor enforces key constraints through the index
// manager and moves rows through the page-file storage layer, and every
// query leaves behind an observable execution plan (surfaced by EXPLAIN).
//
// On-disk state lives under one data directory: JSON schema documents,
// 4096-byte slotted page files, and persisted B-tree index files.

pub mod catalog;
pub mod common;
pub mod config;
pub mod error;
pub mod execution;
pub mod index;
pub mod parser;
pub mod storage;

pub use common::{Row, RowId, Value};
pub use config::DatabaseConfig;
pub use error::{DbError, Result};
pub use execution::Executor;
pub use parser::{SqlResponse, Statement};

use catalog::Catalog;
use index::IndexManager;
use std::sync::Arc;
use storage::StorageEngine;
use tracing::{info, warn};

/// The assembled engine. `open` loads schemas and indexes (rebuilding any
/// index set that has no persisted files), `shutdown` flushes dirty pages
/// and saves every index; dropping the handle does the same on a best-effort
/// basis.
pub struct Database {
    catalog: Arc<Catalog>,
    storage: Arc<StorageEngine>,
    indexes: Arc<IndexManager>,
    executor: Executor,
}

impl Database {
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let catalog = Arc::new(Catalog::open(config.clone())?);
        let storage = Arc::new(StorageEngine::new(catalog.clone()));
        let indexes = Arc::new(IndexManager::new(config));
        indexes.load_all()?;

        // A table whose schema declares keys or indexes but has no loaded
        // index files gets its indexes rebuilt from row data.
        for table in catalog.list_tables() {
            let schema = catalog.get_table(&table)?;
            let declares_indexes = !schema.keys.is_empty() || !schema.indexes.is_empty();
            if declares_indexes && !indexes.has_indexes(&table) {
                let rows = storage.read_all_rows(&table)?;
                indexes.rebuild_indexes(&schema, &rows)?;
            }
        }

        let executor = Executor::new(catalog.clone(), storage.clone(), indexes.clone());
        info!(tables = catalog.list_tables().len(), "database open");
        Ok(Self {
            catalog,
            storage,
            indexes,
            executor,
        })
    }

    /// Parse and execute one SQL statement. Parsing happens before any
    /// table lock is taken.
    pub fn execute_sql(&self, sql: &str) -> Result<SqlResponse> {
        parser::execute_sql(&self.executor, sql)
    }

    /// Typed request surface, for callers that skip SQL.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Flush every dirty page and persist every index.
    pub fn shutdown(&self) -> Result<()> {
        self.storage.flush_all()?;
        self.indexes.save_all()?;
        info!("database shut down");
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "shutdown during drop failed");
        }
    }
}
