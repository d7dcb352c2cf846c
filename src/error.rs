use crate::common::Value;
use thiserror::Error;

/// Engine-wide error taxonomy. Every layer returns these unchanged; nothing
/// below the public surface catches and rethrows under a different kind.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid SQL: {sql}")]
    InvalidSql { sql: String },

    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    #[error("table '{table}' already exists")]
    TableAlreadyExists { table: String },

    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("column '{column}' of table '{table}' cannot be null")]
    NotNullViolation { table: String, column: String },

    #[error("duplicate primary key value {value} for column '{column}' of table '{table}'")]
    PrimaryKeyViolation {
        table: String,
        column: String,
        value: Value,
    },

    #[error("duplicate value {value} for unique column '{column}' of table '{table}'")]
    UniqueKeyViolation {
        table: String,
        column: String,
        value: Value,
    },

    #[error("storage read failure for table '{table}': {message}")]
    StorageRead { table: String, message: String },

    #[error("storage write failure for table '{table}': {message}")]
    StorageWrite { table: String, message: String },

    #[error("index error: {message}")]
    IndexError { message: String },

    /// Internal signal only: the target page has no room for the row. The
    /// storage layer reacts by allocating a new page; it never escapes to
    /// callers of the public surface.
    #[error("page full")]
    PageFull,
}

impl DbError {
    /// Stable machine-readable code for the outer request/response surface.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::InvalidSql { .. } => "INVALID_SQL",
            DbError::TableNotFound { .. } => "TABLE_NOT_FOUND",
            DbError::TableAlreadyExists { .. } => "TABLE_ALREADY_EXISTS",
            DbError::ColumnNotFound { .. } => "COLUMN_NOT_FOUND",
            DbError::NotNullViolation { .. } => "NOT_NULL_VIOLATION",
            DbError::PrimaryKeyViolation { .. } => "PRIMARY_KEY_VIOLATION",
            DbError::UniqueKeyViolation { .. } => "UNIQUE_KEY_VIOLATION",
            DbError::StorageRead { .. } => "STORAGE_READ_ERROR",
            DbError::StorageWrite { .. } => "STORAGE_WRITE_ERROR",
            DbError::IndexError { .. } => "INDEX_ERROR",
            DbError::PageFull => "PAGE_FULL",
        }
    }

    pub(crate) fn storage_read(table: &str, err: impl std::fmt::Display) -> Self {
        DbError::StorageRead {
            table: table.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn storage_write(table: &str, err: impl std::fmt::Display) -> Self {
        DbError::StorageWrite {
            table: table.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn index(err: impl std::fmt::Display) -> Self {
        DbError::IndexError {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
