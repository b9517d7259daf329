//! User commands and the single dispatcher that carries them out.
//!
//! The TUI and the one-shot CLI both turn input into a [`Command`], hand it to
//! [`dispatch`] together with the session's [`QueryStore`], and render the
//! returned [`Outcome`] or error message.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::db::{
    self, ConflictPolicy, DatabaseName, DbError, Download, QueryOutput, Result,
};
use crate::session::{QueryStore, SavedQuery};
use crate::storage::csv::{CsvReader, CsvWriter};
use crate::storage::table::Table;

pub const DEFAULT_EXTENSION: &str = "db";
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Where databases live and how files are read and written.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub dir: PathBuf,
    pub extension: String,
    pub export_dir: PathBuf,
    pub preview_rows: usize,
    pub delimiter: char,
    pub has_header: bool,
    /// First CSV column is a row index: dropped on import, written on export.
    pub index_column: bool,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            export_dir: dir.clone(),
            dir,
            extension: DEFAULT_EXTENSION.to_string(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            delimiter: ',',
            has_header: true,
            index_column: false,
        }
    }

    pub fn with_index_column(mut self, index_column: bool) -> Self {
        self.index_column = index_column;
        self
    }

    pub fn csv_reader(&self) -> CsvReader {
        CsvReader::new()
            .with_delimiter(self.delimiter)
            .with_header(self.has_header)
            .with_index_column(self.index_column)
    }

    pub fn csv_writer(&self) -> CsvWriter {
        CsvWriter::new()
            .with_delimiter(self.delimiter)
            .with_index_column(self.index_column)
    }

    /// Database files currently present in the workspace directory.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        db::list_database_files(&self.dir, &self.extension)
    }

    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        Ok(DatabaseName::parse(name, &self.extension)?.path_in(&self.dir))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateDb {
        filename: String,
    },
    Import {
        database: String,
        table: String,
        source: PathBuf,
        /// `None` asks first when the table already exists.
        on_conflict: Option<ConflictPolicy>,
    },
    ListTables {
        database: String,
    },
    View {
        database: String,
        table: String,
    },
    Export {
        database: String,
        table: String,
    },
    RunQuery {
        database: String,
        sql: String,
    },
    SaveQuery {
        database: String,
        sql: String,
    },
    ListSaved,
    ClearSaved,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::CreateDb { .. } => "create_db",
            Command::Import { .. } => "import",
            Command::ListTables { .. } => "list_tables",
            Command::View { .. } => "view",
            Command::Export { .. } => "export",
            Command::RunQuery { .. } => "run_query",
            Command::SaveQuery { .. } => "save_query",
            Command::ListSaved => "list_saved",
            Command::ClearSaved => "clear_saved",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Created {
        path: PathBuf,
    },
    Imported {
        table: String,
        rows: usize,
        preview: Table,
    },
    /// The import target exists and the user has not chosen what to do.
    NameCollision {
        table: String,
    },
    Tables {
        database: String,
        tables: Vec<String>,
    },
    Preview {
        table: String,
        total_rows: usize,
        preview: Table,
    },
    Download(Download),
    Query(QueryOutput),
    Saved {
        total: usize,
    },
    SavedList(Vec<SavedQuery>),
    Cleared,
}

impl Outcome {
    /// One-line summary for the status area.
    pub fn message(&self) -> String {
        match self {
            Outcome::Created { path } => format!("Database ready: {}", path.display()),
            Outcome::Imported { rows, preview, .. } => format!(
                "Data uploaded successfully ({} rows). These are the first {} rows.",
                rows,
                preview.row_count()
            ),
            Outcome::NameCollision { table } => format!(
                "Table {} already exists! Do you want to replace or choose another name?",
                table
            ),
            Outcome::Tables { database, tables } if tables.is_empty() => {
                format!("No table(s) in database {}", database)
            }
            Outcome::Tables { database, tables } => {
                format!("{} table(s) in {}", tables.len(), database)
            }
            Outcome::Preview { table, total_rows, preview } => format!(
                "These are the first {} rows of the {} table ({} total).",
                preview.row_count(),
                table,
                total_rows
            ),
            Outcome::Download(d) => format!("Prepared {} ({} bytes)", d.file_name, d.data.len()),
            Outcome::Query(QueryOutput::Rows(t)) => format!("{} row(s) returned", t.row_count()),
            Outcome::Query(QueryOutput::Affected(n)) => format!("Statement executed, {} row(s) affected", n),
            Outcome::Saved { total } => format!("Query saved ({} saved this session)", total),
            Outcome::SavedList(list) if list.is_empty() => "No saved queries".to_string(),
            Outcome::SavedList(list) => format!("Saved queries: {}", list.len()),
            Outcome::Cleared => "Saved queries cleared".to_string(),
        }
    }
}

/// Runs one command to completion.
pub fn dispatch(ws: &Workspace, store: &mut dyn QueryStore, command: Command) -> Result<Outcome> {
    let name = command.name();
    let result = run(ws, store, command);
    match &result {
        Ok(outcome) => info!(command = name, "{}", outcome.message()),
        Err(e) if e.is_validation() => info!(command = name, error = %e, "rejected"),
        Err(e) => warn!(command = name, error = %e, "command failed"),
    }
    result
}

fn run(ws: &Workspace, store: &mut dyn QueryStore, command: Command) -> Result<Outcome> {
    match command {
        Command::CreateDb { filename } => {
            let path = ws.database_path(&filename)?;
            db::open_database(&path)?;
            Ok(Outcome::Created { path })
        }
        Command::Import {
            database,
            table,
            source,
            on_conflict,
        } => import(ws, &database, &table, &source, on_conflict),
        Command::ListTables { database } => {
            let conn = db::open_existing(&ws.database_path(&database)?)?;
            let tables = db::list_tables(&conn)?;
            Ok(Outcome::Tables { database, tables })
        }
        Command::View { database, table } => {
            let conn = db::open_existing(&ws.database_path(&database)?)?;
            let full = db::fetch_table(&conn, &table)?;
            Ok(Outcome::Preview {
                total_rows: full.row_count(),
                preview: full.head(ws.preview_rows),
                table,
            })
        }
        Command::Export { database, table } => {
            let conn = db::open_existing(&ws.database_path(&database)?)?;
            let full = db::fetch_table(&conn, &table)?;
            Ok(Outcome::Download(Download::csv(&full, &ws.csv_writer())?))
        }
        Command::RunQuery { database, sql } => {
            let conn = db::open_existing(&ws.database_path(&database)?)?;
            Ok(Outcome::Query(db::execute_query(&conn, &sql)?))
        }
        Command::SaveQuery { database, sql } => {
            if sql.trim().is_empty() {
                return Err(DbError::EmptyQuery);
            }
            store.append(SavedQuery::new(database, sql));
            Ok(Outcome::Saved {
                total: store.list().len(),
            })
        }
        Command::ListSaved => Ok(Outcome::SavedList(store.list())),
        Command::ClearSaved => {
            store.clear();
            Ok(Outcome::Cleared)
        }
    }
}

fn import(
    ws: &Workspace,
    database: &str,
    table: &str,
    source: &Path,
    on_conflict: Option<ConflictPolicy>,
) -> Result<Outcome> {
    let table = db::validate_table_name(table)?.to_string();
    let path = ws.database_path(database)?;
    let parsed = ws.csv_reader().read_file(source)?;

    let mut conn = db::open_existing(&path)?;
    let policy = match on_conflict {
        Some(policy) => policy,
        None if db::table_exists(&conn, &table)? => return Ok(Outcome::NameCollision { table }),
        None => ConflictPolicy::Fail,
    };

    let rows = db::write_table(&mut conn, &table, &parsed, policy)?;
    Ok(Outcome::Imported {
        preview: parsed.head(ws.preview_rows),
        rows,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionQueries;
    use std::fs;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    #[test]
    fn test_create_rejects_bad_extension_without_touching_disk() {
        let (dir, ws) = workspace();
        let mut store = SessionQueries::new();

        let err = dispatch(&ws, &mut store, Command::CreateDb { filename: "test.sqlite".into() }).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_create_then_list_databases() {
        let (_dir, ws) = workspace();
        let mut store = SessionQueries::new();

        let outcome = dispatch(&ws, &mut store, Command::CreateDb { filename: "test.db".into() }).unwrap();
        assert!(matches!(outcome, Outcome::Created { .. }));
        assert_eq!(ws.list_databases().unwrap(), vec!["test.db"]);
    }

    #[test]
    fn test_save_query_rules() {
        let (_dir, ws) = workspace();
        let mut store = SessionQueries::new();

        let err = dispatch(
            &ws,
            &mut store,
            Command::SaveQuery { database: "a.db".into(), sql: String::new() },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::EmptyQuery));
        assert!(store.is_empty());

        for _ in 0..2 {
            dispatch(
                &ws,
                &mut store,
                Command::SaveQuery { database: "a.db".into(), sql: "SELECT 1".into() },
            )
            .unwrap();
        }
        match dispatch(&ws, &mut store, Command::ListSaved).unwrap() {
            Outcome::SavedList(list) => assert_eq!(list.len(), 1),
            other => panic!("unexpected outcome {:?}", other),
        }

        dispatch(&ws, &mut store, Command::ClearSaved).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_into_missing_database_fails() {
        let (dir, ws) = workspace();
        let mut store = SessionQueries::new();
        let csv = dir.path().join("a.csv");
        fs::write(&csv, "id\n1\n").unwrap();

        let err = dispatch(
            &ws,
            &mut store,
            Command::Import {
                database: "nope.db".into(),
                table: "t".into(),
                source: csv,
                on_conflict: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::DatabaseNotFound(_)));
        assert!(!dir.path().join("nope.db").exists());
    }

    #[test]
    fn test_outcome_messages() {
        let outcome = Outcome::Tables { database: "a.db".into(), tables: vec![] };
        assert_eq!(outcome.message(), "No table(s) in database a.db");
        let outcome = Outcome::NameCollision { table: "t".into() };
        assert!(outcome.message().contains("replace or choose another name"));
    }
}
