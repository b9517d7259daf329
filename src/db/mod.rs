//! SQLite access: opening database files, reading the table catalog,
//! importing tables, running queries and exporting tables as CSV.
//!
//! Every call opens what it needs and drops the connection when done.

mod catalog;
mod connection;
mod error;
mod export;
mod import;
mod query;

pub use catalog::{fetch_table, list_tables, quote_identifier, table_exists};
pub use connection::{list_database_files, open_database, open_existing, DatabaseName};
pub use error::{DbError, Result};
pub use export::{Download, CSV_MIME};
pub use import::{validate_table_name, write_table, ConflictPolicy};
pub use query::{execute_query, QueryOutput};
