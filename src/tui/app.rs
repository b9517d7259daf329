use std::path::PathBuf;

use tracing::debug;

use crate::commands::{dispatch, Command, Outcome, Workspace};
use crate::db::{ConflictPolicy, QueryOutput};
use crate::session::{SavedQuery, SessionQueries};
use crate::storage::table::{Column, DataType, Row, Schema, Table, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Normal,
    Insert,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Page {
    CreateDatabase,
    UploadData,
    ViewTables,
    RunQuery,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::CreateDatabase,
        Page::UploadData,
        Page::ViewTables,
        Page::RunQuery,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Page::CreateDatabase => "Create Database",
            Page::UploadData => "Upload Data",
            Page::ViewTables => "View Table(s)",
            Page::RunQuery => "Run Query",
        }
    }

    pub fn index(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    /// Focusable fields in display order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Page::CreateDatabase => &[Field::Filename],
            Page::UploadData => &[Field::Database, Field::TableName, Field::SourcePath, Field::Results],
            Page::ViewTables => &[Field::Database, Field::Tables, Field::Results],
            Page::RunQuery => &[Field::Database, Field::Query, Field::Results],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field {
    Filename,
    Database,
    TableName,
    SourcePath,
    Tables,
    Query,
    Results,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Filename => "DB Filename",
            Field::Database => "DB Filename",
            Field::TableName => "Table Name to Insert",
            Field::SourcePath => "CSV file to upload",
            Field::Tables => "Table(s) in database",
            Field::Query => "SQL Query",
            Field::Results => "Results",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Field::Filename | Field::TableName | Field::SourcePath | Field::Query
        )
    }
}

/// Single-line text being edited. `cursor` is a byte offset on a char
/// boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextInput {
    pub value: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.len();
    }

    pub fn insert_char(&mut self, c: char) {
        self.value.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn delete_char(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.value.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn delete_char_forward(&mut self) {
        if self.cursor < self.value.len() {
            self.value.remove(self.cursor);
        }
    }

    pub fn move_cursor_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if let Some(c) = self.value[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn move_cursor_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.value.len();
    }

    pub fn move_cursor_word_forward(&mut self) {
        let rest = &self.value[self.cursor..];
        let mut chars = rest.char_indices().peekable();
        let mut offset = rest.len();

        // Skip current word, then whitespace
        while let Some((_, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
        }
        while let Some(&(i, c)) = chars.peek() {
            if !c.is_whitespace() {
                offset = i;
                break;
            }
            chars.next();
        }

        self.cursor += offset;
    }

    pub fn move_cursor_word_backward(&mut self) {
        let before = &self.value[..self.cursor];
        let trimmed = before.trim_end();
        self.cursor = trimmed
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
    }

    pub fn delete_word_backward(&mut self) {
        let end = self.cursor;
        self.move_cursor_word_backward();
        self.value.drain(self.cursor..end);
    }

    pub fn delete_to_end(&mut self) {
        self.value.truncate(self.cursor);
    }

    pub fn delete_to_start(&mut self) {
        self.value.drain(..self.cursor);
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Display width of the text before the cursor.
    pub fn cursor_column(&self) -> usize {
        self.value[..self.cursor].chars().count()
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.value[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }
}

/// A list with one selected entry.
#[derive(Debug, Clone, Default)]
pub struct Picker {
    pub items: Vec<String>,
    pub selected: usize,
}

impl Picker {
    /// Replaces the items, keeping the current selection if it still exists.
    pub fn set_items(&mut self, items: Vec<String>) {
        let current = self.current().map(str::to_string);
        self.selected = current
            .and_then(|c| items.iter().position(|i| *i == c))
            .unwrap_or(0);
        self.items = items;
    }

    pub fn current(&self) -> Option<&str> {
        self.items.get(self.selected).map(String::as_str)
    }

    pub fn select(&mut self, name: &str) {
        if let Some(pos) = self.items.iter().position(|i| i == name) {
            self.selected = pos;
        }
    }

    pub fn next(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + self.items.len() - 1) % self.items.len();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
    /// Waiting for the user to answer a replace/rename prompt.
    Prompt(String),
}

/// The upload a replace/rename prompt was raised for. Answers apply to this
/// request, not to whatever the form holds by then.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImport {
    pub database: String,
    pub table: String,
    pub source: PathBuf,
}

pub struct App {
    pub ws: Workspace,
    pub queries: SessionQueries,
    pub page: Page,
    pub mode: Mode,
    pub focus: Field,
    pub should_quit: bool,
    pub command_buffer: String,

    pub filename: TextInput,
    pub table_name: TextInput,
    pub source_path: TextInput,
    pub query: TextInput,
    pub databases: Picker,
    pub tables: Picker,

    pub notice: Option<Notice>,
    pub pending_import: Option<PendingImport>,
    pub result: Option<Table>,
    pub result_title: String,
    pub result_scroll: usize,
    pub result_horizontal_scroll: usize,
    pub column_widths: Vec<usize>,

    pub history: Vec<String>,
    pub history_index: Option<usize>,
}

impl App {
    pub fn new(ws: Workspace) -> Self {
        let mut app = Self {
            ws,
            queries: SessionQueries::new(),
            page: Page::CreateDatabase,
            mode: Mode::Normal,
            focus: Field::Filename,
            should_quit: false,
            command_buffer: String::new(),
            filename: TextInput::default(),
            table_name: TextInput::default(),
            source_path: TextInput::default(),
            query: TextInput::default(),
            databases: Picker::default(),
            tables: Picker::default(),
            notice: None,
            pending_import: None,
            result: None,
            result_title: String::new(),
            result_scroll: 0,
            result_horizontal_scroll: 0,
            column_widths: Vec::new(),
            history: Vec::new(),
            history_index: None,
        };
        app.refresh_databases();
        app
    }

    // Pages and focus

    pub fn select_page(&mut self, page: Page) {
        debug!(page = page.label(), "page selected");
        self.page = page;
        self.mode = Mode::Normal;
        self.focus = page.fields()[0];
        self.notice = None;
        self.pending_import = None;
        self.clear_result();
        self.refresh_databases();
        if page == Page::ViewTables {
            self.refresh_tables();
        }
    }

    pub fn next_page(&mut self) {
        let next = Page::ALL[(self.page.index() + 1) % Page::ALL.len()];
        self.select_page(next);
    }

    pub fn prev_page(&mut self) {
        let prev = Page::ALL[(self.page.index() + Page::ALL.len() - 1) % Page::ALL.len()];
        self.select_page(prev);
    }

    pub fn focus_next(&mut self) {
        let fields = self.page.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + 1) % fields.len()];
    }

    pub fn focus_prev(&mut self) {
        let fields = self.page.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + fields.len() - 1) % fields.len()];
    }

    pub fn enter_insert_mode(&mut self) {
        if self.focus.is_text() {
            self.mode = Mode::Insert;
        }
    }

    pub fn enter_normal_mode(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn enter_command_mode(&mut self) {
        self.mode = Mode::Command;
        self.command_buffer.clear();
    }

    pub fn execute_command(&mut self) {
        let cmd = self.command_buffer.trim().to_string();
        match cmd.as_str() {
            "q" | "quit" => self.should_quit = true,
            "e" | "exec" | "execute" => self.submit(),
            "w" | "write" => self.download(),
            "r" | "refresh" => self.refresh_databases(),
            "clear" => {
                if let Some(input) = self.active_input_mut() {
                    input.clear();
                }
                self.clear_result();
                self.notice = None;
            }
            other => {
                if let Some(page) = other
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| Page::ALL.get(i))
                {
                    self.select_page(*page);
                } else if !other.is_empty() {
                    self.notice = Some(Notice::Error(format!("Unknown command: {}", other)));
                }
            }
        }
        self.command_buffer.clear();
        if self.mode == Mode::Command {
            self.mode = Mode::Normal;
        }
    }

    pub fn active_input(&self) -> Option<&TextInput> {
        match self.focus {
            Field::Filename => Some(&self.filename),
            Field::TableName => Some(&self.table_name),
            Field::SourcePath => Some(&self.source_path),
            Field::Query => Some(&self.query),
            _ => None,
        }
    }

    pub fn active_input_mut(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            Field::Filename => Some(&mut self.filename),
            Field::TableName => Some(&mut self.table_name),
            Field::SourcePath => Some(&mut self.source_path),
            Field::Query => Some(&mut self.query),
            _ => None,
        }
    }

    // Pickers

    pub fn refresh_databases(&mut self) {
        match self.ws.list_databases() {
            Ok(names) => self.databases.set_items(names),
            Err(e) => self.notice = Some(Notice::Error(e.to_string())),
        }
    }

    pub fn refresh_tables(&mut self) {
        let Some(database) = self.selected_database() else {
            self.tables.set_items(Vec::new());
            return;
        };
        if let Some(Outcome::Tables { tables, .. }) = self.run(Command::ListTables { database }) {
            if tables.is_empty() {
                self.notice = Some(Notice::Info("No table(s) in database".to_string()));
            }
            self.tables.set_items(tables);
        }
    }

    pub fn selected_database(&self) -> Option<String> {
        self.databases.current().map(str::to_string)
    }

    pub fn select_next(&mut self) {
        match self.focus {
            Field::Database => {
                self.databases.next();
                self.on_database_changed();
            }
            Field::Tables => self.tables.next(),
            Field::Results => self.scroll_results_down(),
            _ => {}
        }
    }

    pub fn select_prev(&mut self) {
        match self.focus {
            Field::Database => {
                self.databases.prev();
                self.on_database_changed();
            }
            Field::Tables => self.tables.prev(),
            Field::Results => self.scroll_results_up(),
            _ => {}
        }
    }

    fn on_database_changed(&mut self) {
        self.pending_import = None;
        if self.page == Page::ViewTables {
            self.clear_result();
            self.notice = None;
            self.refresh_tables();
        }
    }

    // Actions

    /// Runs the primary action of the current page.
    pub fn submit(&mut self) {
        match self.page {
            Page::CreateDatabase => self.create_database(),
            Page::UploadData => self.import(),
            Page::ViewTables => self.view_table(),
            Page::RunQuery => self.execute_query(),
        }
    }

    pub fn create_database(&mut self) {
        let filename = self.filename.value.trim().to_string();
        if let Some(Outcome::Created { .. }) = self.run(Command::CreateDb { filename: filename.clone() }) {
            self.refresh_databases();
            self.databases.select(&filename);
        }
    }

    /// Imports from the upload form, asking first if the table exists.
    pub fn import(&mut self) {
        let Some(database) = self.require_database() else {
            return;
        };
        let request = PendingImport {
            database,
            table: self.table_name.value.clone(),
            source: self.source_path.value.trim().into(),
        };
        self.run_import(request, None);
    }

    /// Answers the replace/rename prompt of a pending import.
    pub fn resolve_collision(&mut self, policy: ConflictPolicy) {
        if let Some(request) = self.pending_import.take() {
            self.run_import(request, Some(policy));
        }
    }

    fn run_import(&mut self, request: PendingImport, on_conflict: Option<ConflictPolicy>) {
        self.pending_import = None;
        let command = Command::Import {
            database: request.database.clone(),
            table: request.table.clone(),
            source: request.source.clone(),
            on_conflict,
        };
        match self.run(command) {
            Some(Outcome::NameCollision { .. }) => self.pending_import = Some(request),
            Some(Outcome::Imported { preview, .. }) => self.show_table(preview, "Uploaded data"),
            _ => {}
        }
    }

    pub fn view_table(&mut self) {
        let Some(database) = self.require_database() else {
            return;
        };
        let Some(table) = self.tables.current().map(str::to_string) else {
            self.notice = Some(Notice::Info("No table(s) in database".to_string()));
            return;
        };
        if let Some(Outcome::Preview { preview, table, .. }) = self.run(Command::View { database, table }) {
            self.show_table(preview, &table);
        }
    }

    /// Writes the selected table as `<table>.csv` into the export directory.
    pub fn download(&mut self) {
        if self.page != Page::ViewTables {
            return;
        }
        let Some(database) = self.require_database() else {
            return;
        };
        let Some(table) = self.tables.current().map(str::to_string) else {
            return;
        };
        if let Some(Outcome::Download(download)) = self.run(Command::Export { database, table }) {
            match download.save_to(&self.ws.export_dir) {
                Ok(path) => {
                    self.notice = Some(Notice::Info(format!(
                        "Downloaded {} as {} to {}",
                        download.file_name,
                        download.mime,
                        path.display()
                    )))
                }
                Err(e) => self.notice = Some(Notice::Error(e.to_string())),
            }
        }
    }

    pub fn execute_query(&mut self) {
        let Some(database) = self.require_database() else {
            return;
        };
        let sql = self.query.value.clone();
        if sql.trim().is_empty() {
            return;
        }

        if self.history.last() != Some(&sql) {
            self.history.push(sql.clone());
        }
        self.history_index = None;

        match self.run(Command::RunQuery { database, sql }) {
            Some(Outcome::Query(QueryOutput::Rows(table))) => self.show_table(table, "Results"),
            _ => self.clear_result(),
        }
    }

    pub fn save_query(&mut self) {
        let Some(database) = self.require_database() else {
            return;
        };
        let sql = self.query.value.clone();
        self.run(Command::SaveQuery { database, sql });
    }

    pub fn view_saved(&mut self) {
        if let Some(Outcome::SavedList(list)) = self.run(Command::ListSaved) {
            self.show_table(saved_queries_table(&list), "Saved queries");
        }
    }

    pub fn clear_saved(&mut self) {
        self.run(Command::ClearSaved);
        self.clear_result();
    }

    fn require_database(&mut self) -> Option<String> {
        let database = self.selected_database();
        if database.is_none() {
            self.notice = Some(Notice::Error(format!(
                "No .{} files found in {}",
                self.ws.extension,
                self.ws.dir.display()
            )));
        }
        database
    }

    /// Dispatches `command` and records the outcome or error as the notice.
    fn run(&mut self, command: Command) -> Option<Outcome> {
        match dispatch(&self.ws, &mut self.queries, command) {
            Ok(outcome) => {
                self.notice = Some(match outcome {
                    Outcome::NameCollision { .. } => Notice::Prompt(outcome.message()),
                    _ => Notice::Info(outcome.message()),
                });
                Some(outcome)
            }
            Err(e) => {
                self.notice = Some(Notice::Error(e.to_string()));
                None
            }
        }
    }

    // Results pane

    fn show_table(&mut self, table: Table, title: &str) {
        self.calculate_column_widths(&table);
        self.result = Some(table);
        self.result_title = title.to_string();
        self.result_scroll = 0;
        self.result_horizontal_scroll = 0;
    }

    fn clear_result(&mut self) {
        self.result = None;
        self.result_title.clear();
        self.column_widths.clear();
        self.result_scroll = 0;
        self.result_horizontal_scroll = 0;
    }

    fn calculate_column_widths(&mut self, table: &Table) {
        self.column_widths = table
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
                header_width.max(max_value_width).clamp(4, 40)
            })
            .collect();
    }

    pub fn scroll_results_up(&mut self) {
        if self.result_scroll > 0 {
            self.result_scroll -= 1;
        }
    }

    pub fn scroll_results_down(&mut self) {
        if let Some(ref table) = self.result {
            if self.result_scroll < table.row_count().saturating_sub(1) {
                self.result_scroll += 1;
            }
        }
    }

    pub fn scroll_results_left(&mut self) {
        if self.result_horizontal_scroll > 0 {
            self.result_horizontal_scroll -= 1;
        }
    }

    pub fn scroll_results_right(&mut self) {
        if self.result_horizontal_scroll + 1 < self.column_widths.len() {
            self.result_horizontal_scroll += 1;
        }
    }

    pub fn page_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(10);
    }

    pub fn page_down(&mut self) {
        if let Some(ref table) = self.result {
            self.result_scroll = (self.result_scroll + 10).min(table.row_count().saturating_sub(1));
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.result_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        if let Some(ref table) = self.result {
            self.result_scroll = table.row_count().saturating_sub(1);
        }
    }

    // Query history

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }

        let new_index = match self.history_index {
            None => self.history.len() - 1,
            Some(0) => 0,
            Some(i) => i - 1,
        };

        self.history_index = Some(new_index);
        let entry = self.history[new_index].clone();
        self.query.set(entry);
    }

    pub fn history_down(&mut self) {
        if self.history.is_empty() {
            return;
        }

        match self.history_index {
            None => {}
            Some(i) if i >= self.history.len() - 1 => {
                self.history_index = None;
                self.query.clear();
            }
            Some(i) => {
                self.history_index = Some(i + 1);
                let entry = self.history[i + 1].clone();
                self.query.set(entry);
            }
        }
    }
}

/// Saved queries as a table for the results pane.
fn saved_queries_table(list: &[SavedQuery]) -> Table {
    let schema = Schema::new(vec![
        Column::new("Database", DataType::Text),
        Column::new("Query", DataType::Text),
        Column::new("Saved at", DataType::Text),
    ]);
    let rows = list
        .iter()
        .map(|q| {
            Row::new(vec![
                Value::Text(q.database.clone()),
                Value::Text(q.query.clone()),
                Value::Text(q.saved_at.format("%H:%M:%S").to_string()),
            ])
        })
        .collect();
    Table::with_rows("saved_queries", schema, rows)
}
