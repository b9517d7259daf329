use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::error::{DbError, Result};

/// A database filename that passed the extension check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn parse(name: &str, extension: &str) -> Result<Self> {
        let name = name.trim();
        let suffix = format!(".{}", extension);
        let invalid = || DbError::InvalidFilename {
            name: name.to_string(),
            extension: extension.to_string(),
        };

        let stem = name.strip_suffix(&suffix).ok_or_else(invalid)?;
        if stem.is_empty() || name.contains(['/', '\\']) {
            return Err(invalid());
        }

        Ok(Self(name.to_string()))
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.0)
    }
}

/// Opens the database at `path`, creating an empty file if none exists.
pub fn open_database(path: &Path) -> Result<Connection> {
    debug!(path = %path.display(), "opening database");
    Ok(Connection::open(path)?)
}

/// Opens a database that must already exist.
pub fn open_existing(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(DbError::DatabaseNotFound(path.display().to_string()));
    }
    debug!(path = %path.display(), "opening existing database");
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Ok(Connection::open_with_flags(path, flags)?)
}

/// Names of the files in `dir` ending in `.<extension>`, sorted.
pub fn list_database_files(dir: &Path, extension: &str) -> Result<Vec<String>> {
    let suffix = format!(".{}", extension);
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(&suffix) && name.len() > suffix.len() {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_name_requires_extension() {
        assert!(DatabaseName::parse("test.db", "db").is_ok());
        assert!(DatabaseName::parse("  test.db ", "db").is_ok());

        for bad in ["test", "test.sqlite", ".db", "", "test.db.bak", "dir/test.db"] {
            let err = DatabaseName::parse(bad, "db").unwrap_err();
            assert!(err.is_validation(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.db");
        assert!(!path.exists());

        open_database(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_existing_rejects_missing() {
        let dir = tempdir().unwrap();
        let err = open_existing(&dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, DbError::DatabaseNotFound(_)));
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_list_database_files() {
        let dir = tempdir().unwrap();
        for name in ["b.db", "a.db", "notes.txt", "c.db.bak"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("folder.db")).unwrap();

        let names = list_database_files(dir.path(), "db").unwrap();
        assert_eq!(names, vec!["a.db", "b.db"]);
    }
}
