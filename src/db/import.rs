use rusqlite::Connection;
use tracing::{debug, info};

use super::catalog::{quote_identifier, table_exists};
use super::error::{DbError, Result};
use crate::storage::table::Table;

/// What to do when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Drop the existing table and recreate it from the import.
    Replace,
    /// Only insert if the name is free; otherwise fail.
    Fail,
}

pub fn validate_table_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.to_lowercase().starts_with("sqlite_") {
        return Err(DbError::InvalidTableName(name.to_string()));
    }
    Ok(trimmed)
}

/// Writes `table` into the database as `table_name`, returning the number of
/// rows inserted. The drop, create and inserts share one transaction, so an
/// error leaves any existing table as it was.
pub fn write_table(
    conn: &mut Connection,
    table_name: &str,
    table: &Table,
    policy: ConflictPolicy,
) -> Result<usize> {
    let table_name = validate_table_name(table_name)?;
    let quoted = quote_identifier(table_name);

    let tx = conn.transaction()?;

    if table_exists(&tx, table_name)? {
        match policy {
            ConflictPolicy::Fail => return Err(DbError::TableAlreadyExists(table_name.to_string())),
            ConflictPolicy::Replace => {
                debug!(table = table_name, "dropping existing table");
                tx.execute(&format!("DROP TABLE {}", quoted), [])?;
            }
        }
    }

    let columns: Vec<String> = table
        .schema
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.data_type.sql_type()))
        .collect();
    let create = format!("CREATE TABLE {} ({})", quoted, columns.join(", "));
    debug!(sql = %create, "creating table");
    tx.execute(&create, [])?;

    let placeholders: Vec<String> = (1..=table.column_count()).map(|i| format!("?{}", i)).collect();
    let insert = format!("INSERT INTO {} VALUES ({})", quoted, placeholders.join(", "));
    {
        let mut stmt = tx.prepare(&insert)?;
        for row in &table.rows {
            stmt.execute(rusqlite::params_from_iter(row.values.iter()))?;
        }
    }

    tx.commit()?;
    info!(table = table_name, rows = table.row_count(), "table written");
    Ok(table.row_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::fetch_table;
    use crate::storage::table::{Column, DataType, Row, Schema, Value};

    fn people(names: &[&str]) -> Table {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Text),
        ]);
        let rows = names
            .iter()
            .enumerate()
            .map(|(i, n)| Row::new(vec![Value::Integer(i as i64 + 1), Value::Text(n.to_string())]))
            .collect();
        Table::with_rows("people", schema, rows)
    }

    #[test]
    fn test_write_new_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        let written = write_table(&mut conn, "people", &people(&["a", "b"]), ConflictPolicy::Fail).unwrap();
        assert_eq!(written, 2);

        let stored = fetch_table(&conn, "people").unwrap();
        assert_eq!(stored.row_count(), 2);
        assert_eq!(stored.schema.columns[0].data_type, DataType::Integer);
        assert_eq!(stored.rows[1].values[1], Value::Text("b".into()));
    }

    #[test]
    fn test_fail_policy_keeps_existing() {
        let mut conn = Connection::open_in_memory().unwrap();
        write_table(&mut conn, "people", &people(&["a", "b"]), ConflictPolicy::Fail).unwrap();

        let err = write_table(&mut conn, "people", &people(&["z"]), ConflictPolicy::Fail).unwrap_err();
        assert!(matches!(err, DbError::TableAlreadyExists(_)));
        assert_eq!(fetch_table(&conn, "people").unwrap().row_count(), 2);
    }

    #[test]
    fn test_replace_policy_overwrites() {
        let mut conn = Connection::open_in_memory().unwrap();
        write_table(&mut conn, "people", &people(&["a", "b"]), ConflictPolicy::Fail).unwrap();
        write_table(&mut conn, "people", &people(&["z"]), ConflictPolicy::Replace).unwrap();

        let stored = fetch_table(&conn, "people").unwrap();
        assert_eq!(stored.row_count(), 1);
        assert_eq!(stored.rows[0].values[1], Value::Text("z".into()));
    }

    #[test]
    fn test_failed_replace_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        write_table(&mut conn, "people", &people(&["a", "b"]), ConflictPolicy::Fail).unwrap();

        let duplicate = Table::new(
            "dup",
            Schema::new(vec![
                Column::new("x", DataType::Integer),
                Column::new("x", DataType::Integer),
            ]),
        );
        assert!(write_table(&mut conn, "people", &duplicate, ConflictPolicy::Replace).is_err());
        assert_eq!(fetch_table(&conn, "people").unwrap().row_count(), 2);
    }

    #[test]
    fn test_invalid_table_names() {
        let mut conn = Connection::open_in_memory().unwrap();
        for bad in ["", "   ", "sqlite_master", "SQLITE_x"] {
            let err = write_table(&mut conn, bad, &people(&["a"]), ConflictPolicy::Replace).unwrap_err();
            assert!(err.is_validation());
        }
    }
}
