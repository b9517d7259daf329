use thiserror::Error;

use crate::storage::CsvError;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DB filename must end with .{extension}, please retry: {name:?}")]
    InvalidFilename { name: String, extension: String },

    #[error("Database file not found: {0}")]
    DatabaseNotFound(String),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("You can only execute one statement at a time")]
    MultipleStatements,
}

impl DbError {
    /// Input that was rejected before any storage was touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DbError::InvalidFilename { .. } | DbError::InvalidTableName(_) | DbError::EmptyQuery
        )
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
