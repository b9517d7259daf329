pub mod cli;
pub mod commands;
pub mod db;
pub mod session;
pub mod storage;
pub mod tui;

pub use commands::{dispatch, Command, Outcome, Workspace};
pub use db::{ConflictPolicy, DbError, QueryOutput};
pub use session::{QueryStore, SavedQuery, SessionQueries};
pub use storage::table::{Table, DataType, Value, Schema, Column};
