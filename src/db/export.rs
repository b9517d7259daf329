use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::error::Result;
use crate::storage::csv::CsvWriter;
use crate::storage::table::Table;

pub const CSV_MIME: &str = "text/csv";

/// A file offered to the user for download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub data: Vec<u8>,
}

impl Download {
    /// Full contents of `table` as UTF-8 CSV named `<table>.csv`.
    pub fn csv(table: &Table, writer: &CsvWriter) -> Result<Self> {
        Ok(Self {
            file_name: format!("{}.csv", sanitize_file_stem(&table.name)),
            mime: CSV_MIME,
            data: writer.to_bytes(table)?,
        })
    }

    /// Writes the payload into `dir`, returning the written path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.data)?;
        info!(path = %path.display(), bytes = self.data.len(), "download written");
        Ok(path)
    }
}

fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{Column, DataType, Row, Schema, Value};

    #[test]
    fn test_csv_download() {
        let table = Table::with_rows(
            "t",
            Schema::new(vec![Column::new("id", DataType::Integer)]),
            vec![Row::new(vec![Value::Integer(1)]), Row::new(vec![Value::Integer(2)])],
        );

        let download = Download::csv(&table, &CsvWriter::new()).unwrap();
        assert_eq!(download.file_name, "t.csv");
        assert_eq!(download.mime, "text/csv");
        assert_eq!(download.data, b"id\n1\n2\n");

        let dir = tempfile::tempdir().unwrap();
        let path = download.save_to(&dir.path().join("exports")).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"id\n1\n2\n");
    }

    #[test]
    fn test_file_name_has_no_separators() {
        assert_eq!(sanitize_file_stem("a/b"), "a_b");
    }
}
