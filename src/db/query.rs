use rusqlite::{Batch, Connection};
use tracing::{debug, info};

use super::catalog::read_statement;
use super::error::{DbError, Result};
use crate::storage::table::Table;

/// Result of running one free-form statement.
#[derive(Debug, Clone)]
pub enum QueryOutput {
    /// The statement produced a result set (possibly empty).
    Rows(Table),
    /// The statement produced no columns; carries the changed row count.
    Affected(usize),
}

/// Executes `sql` as a single statement. The text is passed to SQLite
/// untouched; text holding more than one statement is rejected before
/// anything runs.
pub fn execute_query(conn: &Connection, sql: &str) -> Result<QueryOutput> {
    debug!(%sql, "executing query");
    let mut batch = Batch::new(conn, sql);
    let mut stmt = batch.next()?.ok_or(DbError::EmptyQuery)?;
    if batch.next()?.is_some() {
        return Err(DbError::MultipleStatements);
    }

    if stmt.column_count() == 0 {
        let changed = stmt.execute([])?;
        info!(rows_affected = changed, "statement executed");
        return Ok(QueryOutput::Affected(changed));
    }

    let table = read_statement(&mut stmt, "result")?;
    info!(rows = table.row_count(), columns = table.column_count(), "query returned rows");
    Ok(QueryOutput::Rows(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::Value;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'x'), (2, 'y');")
            .unwrap();
        conn
    }

    #[test]
    fn test_count_query() {
        let conn = setup();
        match execute_query(&conn, "SELECT COUNT(*) FROM t").unwrap() {
            QueryOutput::Rows(table) => {
                assert_eq!(table.row_count(), 1);
                assert_eq!(table.column_count(), 1);
                assert_eq!(table.rows[0].values[0], Value::Integer(2));
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_expression_column_type_from_values() {
        let conn = setup();
        let QueryOutput::Rows(table) = execute_query(&conn, "SELECT name || '!' AS shout FROM t").unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(table.schema.column_names(), vec!["shout"]);
        assert_eq!(table.rows[1].values[0], Value::Text("y!".into()));
    }

    #[test]
    fn test_mutating_statement_reports_changes() {
        let conn = setup();
        match execute_query(&conn, "UPDATE t SET name = 'z'").unwrap() {
            QueryOutput::Affected(n) => assert_eq!(n, 2),
            other => panic!("expected affected count, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_query_is_error() {
        let conn = setup();
        assert!(execute_query(&conn, "SELEC nonsense").is_err());
        assert!(execute_query(&conn, "SELECT * FROM missing").is_err());
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let conn = setup();
        let err = execute_query(&conn, "DELETE FROM t; SELECT 2").unwrap_err();
        assert!(matches!(err, DbError::MultipleStatements));

        // Nothing ran
        let QueryOutput::Rows(table) = execute_query(&conn, "SELECT * FROM t;").unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_blank_query_is_error() {
        let conn = setup();
        assert!(matches!(execute_query(&conn, "  ").unwrap_err(), DbError::EmptyQuery));
    }
}
