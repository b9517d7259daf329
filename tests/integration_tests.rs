use std::fs;
use std::path::{Path, PathBuf};

use tabdb::commands::{dispatch, Command, Outcome, Workspace};
use tabdb::db::{ConflictPolicy, DbError, QueryOutput};
use tabdb::session::SessionQueries;
use tabdb::storage::table::{Table, Value};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    ws: Workspace,
    queries: SessionQueries,
}

impl Fixture {
    fn new() -> Self {
        Self::with_workspace(|ws| ws)
    }

    fn with_workspace(configure: impl FnOnce(Workspace) -> Workspace) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let ws = configure(Workspace::new(dir.path()));
        Self {
            dir,
            ws,
            queries: SessionQueries::new(),
        }
    }

    fn run(&mut self, command: Command) -> Result<Outcome, DbError> {
        dispatch(&self.ws, &mut self.queries, command)
    }

    fn write_csv(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write csv");
        path
    }

    fn create(&mut self, filename: &str) {
        self.run(Command::CreateDb { filename: filename.into() })
            .expect("Failed to create database");
    }

    fn import(&mut self, database: &str, table: &str, source: &Path, on_conflict: Option<ConflictPolicy>) -> Result<Outcome, DbError> {
        self.run(Command::Import {
            database: database.into(),
            table: table.into(),
            source: source.to_path_buf(),
            on_conflict,
        })
    }

    fn tables(&mut self, database: &str) -> Vec<String> {
        match self.run(Command::ListTables { database: database.into() }).unwrap() {
            Outcome::Tables { tables, .. } => tables,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn query(&mut self, database: &str, sql: &str) -> Table {
        match self.run(Command::RunQuery { database: database.into(), sql: sql.into() }).unwrap() {
            Outcome::Query(QueryOutput::Rows(table)) => table,
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

const SAMPLE: &str = "id,name\n1,x\n2,y\n";

#[test]
fn test_create_view_and_query_walkthrough() {
    let mut fx = Fixture::new();
    fx.create("test.db");
    let csv = fx.write_csv("a.csv", SAMPLE);

    let outcome = fx.import("test.db", "t", &csv, None).unwrap();
    match outcome {
        Outcome::Imported { rows, preview, .. } => {
            assert_eq!(rows, 2);
            assert_eq!(preview.row_count(), 2);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(fx.tables("test.db"), vec!["t"]);

    match fx.run(Command::View { database: "test.db".into(), table: "t".into() }).unwrap() {
        Outcome::Preview { total_rows, preview, .. } => {
            assert_eq!(total_rows, 2);
            assert_eq!(preview.rows[0].values, vec![Value::Integer(1), Value::Text("x".into())]);
            assert_eq!(preview.rows[1].values, vec![Value::Integer(2), Value::Text("y".into())]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let count = fx.query("test.db", "SELECT COUNT(*) FROM t");
    assert_eq!(count.row_count(), 1);
    assert_eq!(count.column_count(), 1);
    assert_eq!(count.rows[0].values[0], Value::Integer(2));
}

#[test]
fn test_invalid_filenames_never_touch_storage() {
    let mut fx = Fixture::new();

    for name in ["test", "test.csv", "test.db.old", ".db", ""] {
        let err = fx.run(Command::CreateDb { filename: name.into() }).unwrap_err();
        assert!(err.is_validation(), "{:?} should be a validation error", name);
    }

    assert_eq!(fs::read_dir(fx.dir.path()).unwrap().count(), 0);
}

#[test]
fn test_import_matches_row_and_column_counts() {
    let mut fx = Fixture::new();
    fx.create("shop.db");
    let csv = fx.write_csv(
        "orders.csv",
        "order_id,customer,amount,note\n1,ann,9.5,\n2,bob,12,\"rush, gift\"\n3,cy,,\n",
    );

    fx.import("shop.db", "orders", &csv, None).unwrap();

    let stored = fx.query("shop.db", "SELECT * FROM orders");
    assert_eq!(stored.row_count(), 3);
    assert_eq!(stored.schema.column_names(), vec!["order_id", "customer", "amount", "note"]);
    assert_eq!(stored.rows[1].values[3], Value::Text("rush, gift".into()));
    assert!(stored.rows[2].values[2].is_null());
}

#[test]
fn test_collision_without_confirmation_leaves_table_unchanged() {
    let mut fx = Fixture::new();
    fx.create("test.db");
    let original = fx.write_csv("a.csv", SAMPLE);
    let other = fx.write_csv("b.csv", "id,name\n9,z\n");

    fx.import("test.db", "t", &original, None).unwrap();

    let outcome = fx.import("test.db", "t", &other, None).unwrap();
    assert!(matches!(outcome, Outcome::NameCollision { ref table } if table == "t"));

    let err = fx.import("test.db", "t", &other, Some(ConflictPolicy::Fail)).unwrap_err();
    assert!(matches!(err, DbError::TableAlreadyExists(_)));

    let stored = fx.query("test.db", "SELECT * FROM t ORDER BY id");
    assert_eq!(stored.row_count(), 2);
    assert_eq!(stored.rows[0].values[1], Value::Text("x".into()));

    fx.import("test.db", "t", &other, Some(ConflictPolicy::Replace)).unwrap();
    let stored = fx.query("test.db", "SELECT * FROM t");
    assert_eq!(stored.row_count(), 1);
    assert_eq!(stored.rows[0].values[0], Value::Integer(9));
}

#[test]
fn test_parse_failure_leaves_database_untouched() {
    let mut fx = Fixture::new();
    fx.create("test.db");
    let broken = fx.write_csv("broken.csv", "a,b\n1,2\n1,2,3\n");

    let err = fx.import("test.db", "t", &broken, None).unwrap_err();
    assert!(matches!(err, DbError::Csv(_)));
    assert!(fx.tables("test.db").is_empty());
}

#[test]
fn test_saved_queries_reject_empty_and_dedup() {
    let mut fx = Fixture::new();

    let err = fx
        .run(Command::SaveQuery { database: "test.db".into(), sql: String::new() })
        .unwrap_err();
    assert!(matches!(err, DbError::EmptyQuery));

    for _ in 0..2 {
        fx.run(Command::SaveQuery { database: "test.db".into(), sql: "SELECT 1".into() })
            .unwrap();
    }

    match fx.run(Command::ListSaved).unwrap() {
        Outcome::SavedList(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].database, "test.db");
            assert_eq!(list[0].query, "SELECT 1");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

fn assert_round_trip(fx: &mut Fixture, table: &str) {
    let download = match fx.run(Command::Export { database: "test.db".into(), table: table.into() }).unwrap() {
        Outcome::Download(d) => d,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(download.file_name, format!("{}.csv", table));
    assert_eq!(download.mime, "text/csv");

    let exported = download.save_to(&fx.dir.path().join("exports")).unwrap();
    let copy_name = format!("{}_copy", table);
    fx.import("test.db", &copy_name, &exported, None).unwrap();

    let original = fx.query("test.db", &format!("SELECT * FROM {}", table));
    let copy = fx.query("test.db", &format!("SELECT * FROM {}", copy_name));
    assert_eq!(copy.row_count(), original.row_count());
    assert_eq!(copy.schema.column_names(), original.schema.column_names());
    assert_eq!(copy.rows, original.rows);
}

fn export_and_reimport(mut fx: Fixture) {
    fx.create("test.db");
    let csv = fx.write_csv(
        "a.csv",
        "id,name,score\n1,x,1.5\n2,\"y, z\",\n3,\"multi\nline\",3\n4,\"\",\n5,\"NA\",2\n6,\" pad \",\n7,,\n",
    );
    fx.import("test.db", "t", &csv, None).unwrap();
    assert_round_trip(&mut fx, "t");

    let stored = fx.query("test.db", "SELECT name FROM t ORDER BY rowid");
    let names: Vec<Value> = stored.rows[3..].iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(
        names,
        vec![
            Value::Text(String::new()),
            Value::Text("NA".into()),
            Value::Text(" pad ".into()),
            Value::Null,
        ]
    );

    for sql in [
        "CREATE TABLE s (v TEXT)",
        "INSERT INTO s VALUES (' pad '), ('NA'), (''), ('null'), (NULL)",
    ] {
        fx.run(Command::RunQuery { database: "test.db".into(), sql: sql.into() }).unwrap();
    }
    assert_round_trip(&mut fx, "s");
}

#[test]
fn test_export_round_trip() {
    export_and_reimport(Fixture::new());
}

#[test]
fn test_export_round_trip_with_index_column() {
    export_and_reimport(Fixture::with_workspace(|ws| ws.with_index_column(true)));
}

#[test]
fn test_queries_are_not_restricted() {
    let mut fx = Fixture::new();
    fx.create("test.db");

    let outcome = fx
        .run(Command::RunQuery { database: "test.db".into(), sql: "CREATE TABLE made_here (x INTEGER)".into() })
        .unwrap();
    assert!(matches!(outcome, Outcome::Query(QueryOutput::Affected(0))));
    assert_eq!(fx.tables("test.db"), vec!["made_here"]);

    let err = fx
        .run(Command::RunQuery { database: "test.db".into(), sql: "SELECT * FROM nowhere".into() })
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}

#[test]
fn test_view_on_empty_database() {
    let mut fx = Fixture::new();
    fx.create("empty.db");

    let outcome = fx.run(Command::ListTables { database: "empty.db".into() }).unwrap();
    assert_eq!(outcome.message(), "No table(s) in database empty.db");

    let err = fx
        .run(Command::View { database: "empty.db".into(), table: "t".into() })
        .unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)));
}

#[test]
fn test_preview_is_limited() {
    let mut fx = Fixture::new();
    fx.create("big.db");
    let mut contents = String::from("n\n");
    for i in 0..12 {
        contents.push_str(&format!("{}\n", i));
    }
    let csv = fx.write_csv("n.csv", &contents);
    fx.import("big.db", "numbers", &csv, None).unwrap();

    match fx.run(Command::View { database: "big.db".into(), table: "numbers".into() }).unwrap() {
        Outcome::Preview { total_rows, preview, .. } => {
            assert_eq!(total_rows, 12);
            assert_eq!(preview.row_count(), 5);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}
