use std::path::{Path, PathBuf};

/// Fixed page size in bytes. Must match any existing on-disk corpus; the
/// file layout addresses pages at `page_index * PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Page header: page_id, row_count, free_space_start, free_space_end, flags
/// (5 x u32, little-endian) plus 12 reserved bytes.
pub const PAGE_HEADER_SIZE: usize = 32;

/// Slot directory entry: offset:u32, length:u32.
pub const SLOT_SIZE: usize = 8;

/// Process-wide engine configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Root directory for schemas, table data files, and index files.
    pub data_directory: PathBuf,
}

impl DatabaseConfig {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
        }
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.data_directory.join("schemas")
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.data_directory.join("tables")
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.data_directory.join("indexes")
    }

    pub fn schema_path(&self, table: &str) -> PathBuf {
        self.schemas_dir().join(format!("{}.schema.json", table))
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.tables_dir().join(format!("{}.dat", table))
    }

    pub fn index_path(&self, index_name: &str) -> PathBuf {
        self.indexes_dir().join(format!("{}.idx", index_name))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_directory: Path::new("data").to_path_buf(),
        }
    }
}
