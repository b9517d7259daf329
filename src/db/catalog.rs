use rusqlite::{Connection, OptionalExtension, Statement};
use tracing::debug;

use super::error::{DbError, Result};
use crate::storage::table::{Column, DataType, Row, Schema, Table, Value};

/// Quotes `name` as an SQLite identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// User tables of the database, sorted by name.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;

    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(tables)
}

pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1",
            [table_name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Reads every row of `table_name`.
pub fn fetch_table(conn: &Connection, table_name: &str) -> Result<Table> {
    if !table_exists(conn, table_name)? {
        return Err(DbError::TableNotFound(table_name.to_string()));
    }

    let sql = format!("SELECT * FROM {}", quote_identifier(table_name));
    debug!(%sql, "fetching table");
    let mut stmt = conn.prepare(&sql)?;
    read_statement(&mut stmt, table_name)
}

/// Runs a prepared statement and collects its result set. Column types come
/// from the declared type when there is one, otherwise from the first
/// non-null value seen.
pub(crate) fn read_statement(stmt: &mut Statement<'_>, name: &str) -> Result<Table> {
    let declared: Vec<(String, Option<DataType>)> = stmt
        .columns()
        .iter()
        .map(|col| {
            let dtype = col.decl_type().map(declared_type);
            (col.name().to_string(), dtype)
        })
        .collect();
    let column_count = declared.len();

    let mut rows = Vec::new();
    let mut query = stmt.query([])?;
    while let Some(row) = query.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(Value::from(row.get_ref(i)?));
        }
        rows.push(Row::new(values));
    }

    let columns = declared
        .into_iter()
        .enumerate()
        .map(|(i, (col_name, dtype))| {
            let dtype = dtype.unwrap_or_else(|| {
                rows.iter()
                    .map(|r: &Row| r.values[i].data_type())
                    .find(|t| *t != DataType::Null)
                    .unwrap_or(DataType::Null)
            });
            Column::new(col_name, dtype)
        })
        .collect();

    Ok(Table::with_rows(name, Schema::new(columns), rows))
}

fn declared_type(decl: &str) -> DataType {
    match decl.to_uppercase().as_str() {
        t if t.contains("INT") => DataType::Integer,
        t if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") => DataType::Float,
        t if t.contains("BLOB") => DataType::Blob,
        _ => DataType::Text,
    }
}
