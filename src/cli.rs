use clap::Parser;
use std::path::PathBuf;

use crate::commands::{Workspace, DEFAULT_EXTENSION, DEFAULT_PREVIEW_ROWS};

#[derive(Parser, Debug)]
#[command(name = "tabdb")]
#[command(author, version, about = "Create SQLite databases, import CSV files and run queries from the terminal")]
pub struct Cli {
    /// Directory holding the database files
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// File extension that marks a database file
    #[arg(short, long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Directory downloads are written to (defaults to DIR)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Number of rows shown in table previews
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub preview_rows: usize,

    /// CSV delimiter for imports and downloads
    #[arg(short, long, default_value = ",")]
    pub delimiter: char,

    /// Imported CSV files have no header row
    #[arg(long)]
    pub no_header: bool,

    /// Treat the first CSV column as a row index: dropped on import, written on download
    #[arg(long)]
    pub index_column: bool,

    /// Log file for the interactive mode (defaults to DIR/tabdb.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Database file to query in non-interactive mode
    #[arg(long, requires = "query")]
    pub db: Option<String>,

    /// Execute a SQL query directly (non-interactive mode)
    #[arg(short, long, requires = "db")]
    pub query: Option<String>,

    /// Output format for non-interactive mode
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn workspace(&self) -> Workspace {
        let mut ws = Workspace::new(&self.dir).with_index_column(self.index_column);
        ws.extension = self.extension.trim_start_matches('.').to_string();
        ws.preview_rows = self.preview_rows;
        ws.delimiter = self.delimiter;
        ws.has_header = !self.no_header;
        if let Some(ref export_dir) = self.export_dir {
            ws.export_dir = export_dir.clone();
        }
        ws
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.dir.join("tabdb.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tabdb"]).unwrap();
        let ws = cli.workspace();
        assert_eq!(ws.dir, PathBuf::from("."));
        assert_eq!(ws.extension, "db");
        assert_eq!(ws.preview_rows, 5);
        assert!(ws.has_header);
        assert!(!ws.index_column);
        assert_eq!(cli.log_path(), PathBuf::from("./tabdb.log"));
    }

    #[test]
    fn test_workspace_options() {
        let cli = Cli::try_parse_from([
            "tabdb", "data", "--extension", ".sqlite", "--index-column", "--export-dir", "out", "-d", ";",
        ])
        .unwrap();
        let ws = cli.workspace();
        assert_eq!(ws.extension, "sqlite");
        assert_eq!(ws.export_dir, PathBuf::from("out"));
        assert_eq!(ws.delimiter, ';');
        assert!(ws.index_column);
    }

    #[test]
    fn test_query_requires_db() {
        assert!(Cli::try_parse_from(["tabdb", "--query", "SELECT 1"]).is_err());
        assert!(Cli::try_parse_from(["tabdb", "--db", "a.db", "--query", "SELECT 1"]).is_ok());
    }
}
