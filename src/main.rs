use std::fs::OpenOptions;
use std::io::{stdout, Write};
use std::sync::Mutex;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

use tabdb::cli::{Cli, OutputFormat};
use tabdb::commands::{dispatch, Command, Outcome, Workspace};
use tabdb::db::QueryOutput;
use tabdb::session::SessionQueries;
use tabdb::storage::csv::CsvWriter;
use tabdb::storage::table::{Table, Value};
use tabdb::tui::{app::App, input::handle_events, ui::draw};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();
    let ws = cli.workspace();

    if let (Some(db), Some(query)) = (&cli.db, &cli.query) {
        // Non-interactive mode
        init_logging(LogTarget::Stderr);
        run_query(&ws, db, query, cli.format)?;
    } else {
        // Interactive TUI mode
        init_logging(LogTarget::File(&cli.log_path()));
        run_tui(ws)?;
    }

    Ok(())
}

enum LogTarget<'a> {
    Stderr,
    File(&'a std::path::Path),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(target: LogTarget<'_>) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let _ = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).try_init(),
            // Without a log file the TUI runs silent rather than writing over the screen
            Err(_) => builder.with_writer(std::io::sink).try_init(),
        },
    };
}

fn run_query(
    ws: &Workspace,
    database: &str,
    query: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut queries = SessionQueries::new();
    let command = Command::RunQuery {
        database: database.to_string(),
        sql: query.to_string(),
    };

    match dispatch(ws, &mut queries, command)? {
        Outcome::Query(QueryOutput::Rows(result)) => match format {
            OutputFormat::Table => print_table(&result),
            OutputFormat::Csv => print_csv(&result, ws)?,
            OutputFormat::Json => print_json(&result),
        },
        Outcome::Query(QueryOutput::Affected(n)) => println!("({} rows affected)", n),
        other => println!("{}", other.message()),
    }

    Ok(())
}

fn print_table(table: &Table) {
    if table.row_count() == 0 {
        println!("(0 rows)");
        return;
    }

    // Calculate column widths
    let widths: Vec<usize> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let header_width = col.name.chars().count();
            let max_value_width = table
                .rows
                .iter()
                .map(|row| row.values.get(i).map(|v| v.to_string().chars().count()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            header_width.max(max_value_width)
        })
        .collect();

    let header: Vec<String> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{:width$}", col.name, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("-+-"));

    for row in &table.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", v.to_string(), width = widths[i]))
            .collect();
        println!("{}", values.join(" | "));
    }

    println!("({} rows)", table.row_count());
}

fn print_csv(table: &Table, ws: &Workspace) -> std::io::Result<()> {
    // Query results carry no index column
    let writer = CsvWriter::new().with_delimiter(ws.delimiter);
    let out = stdout();
    let mut lock = out.lock();
    writer.write_table(table, &mut lock)?;
    lock.flush()
}

fn print_json(table: &Table) {
    print!("[");
    for (i, row) in table.rows.iter().enumerate() {
        if i > 0 {
            print!(",");
        }
        print!("{{");
        for (j, (col, val)) in table.schema.columns.iter().zip(row.values.iter()).enumerate() {
            if j > 0 {
                print!(",");
            }
            let val_str = match val {
                Value::Text(s) => json_string(s),
                Value::Null => "null".to_string(),
                Value::Float(f) if !f.is_finite() => "null".to_string(),
                Value::Blob(b) => json_string(&b.iter().map(|byte| format!("{:02x}", byte)).collect::<String>()),
                _ => val.to_string(),
            };
            print!("{}:{}", json_string(&col.name), val_str);
        }
        print!("}}");
    }
    println!("]");
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn run_tui(ws: Workspace) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(ws);

    // Main loop
    let result = loop {
        if let Err(e) = terminal.draw(|frame| draw(frame, &app)) {
            break Err(e);
        }

        match handle_events(&mut app) {
            Ok(true) => break Ok(()),
            Ok(false) => {}
            Err(e) => break Err(e),
        }
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(result?)
}
