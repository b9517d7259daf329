use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::app::{App, Field, Mode, Notice, Page, Picker, TextInput};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Notice
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(22), Constraint::Min(20)])
        .split(chunks[1]);

    draw_page_selector(frame, app, body[0]);
    draw_page(frame, app, body[1]);
    draw_notice(frame, app, chunks[2]);
    draw_status_bar(frame, app, chunks[3]);

    if app.mode == Mode::Command {
        draw_command_line(frame, app);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let header = Line::from(vec![
        Span::styled("  ", Style::default()),
        Span::styled("▦", Style::default().fg(Color::Yellow)),
        Span::styled(" tabdb", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.page.label(), Style::default().fg(Color::DarkGray)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.ws.dir.display().to_string(), Style::default().fg(Color::DarkGray)),
    ]);

    let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

fn draw_page_selector(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = Page::ALL
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let style = if *page == app.page {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} {}", i + 1, page.label())).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Select a page ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(list, area);
}

fn draw_page(frame: &mut Frame, app: &App, area: Rect) {
    let form_fields: Vec<Field> = app
        .page
        .fields()
        .iter()
        .copied()
        .filter(|f| *f != Field::Results)
        .collect();

    let mut constraints: Vec<Constraint> = form_fields
        .iter()
        .map(|f| match f {
            Field::Query => Constraint::Length(7),
            _ => Constraint::Length(3),
        })
        .collect();
    constraints.push(Constraint::Min(5));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (field, chunk) in form_fields.iter().zip(chunks.iter()) {
        match field {
            Field::Database => draw_picker(frame, app, *field, &app.databases, *chunk),
            Field::Tables => draw_picker(frame, app, *field, &app.tables, *chunk),
            Field::Query => draw_query_editor(frame, app, *chunk),
            Field::Filename => draw_text_field(frame, app, *field, &app.filename, *chunk),
            Field::TableName => draw_text_field(frame, app, *field, &app.table_name, *chunk),
            Field::SourcePath => draw_text_field(frame, app, *field, &app.source_path, *chunk),
            Field::Results => {}
        }
    }

    let results_area = chunks[chunks.len() - 1];
    if app.page == Page::CreateDatabase && app.result.is_none() {
        draw_help(frame, app, results_area);
    } else {
        draw_results(frame, app, results_area);
    }
}

fn border_style(app: &App, field: Field) -> Style {
    if app.focus == field {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_text_field(frame: &mut Frame, app: &App, field: Field, input: &TextInput, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", field.label()))
        .borders(Borders::ALL)
        .border_style(border_style(app, field));

    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(input.value.as_str()), inner);

    if app.mode == Mode::Insert && app.focus == field {
        frame.set_cursor_position((cursor_x(inner, input.cursor_column()), inner.y));
    }
}

fn draw_picker(frame: &mut Frame, app: &App, field: Field, picker: &Picker, area: Rect) {
    let block = Block::default()
        .title(format!(" {} (j/k) ", field.label()))
        .borders(Borders::ALL)
        .border_style(border_style(app, field));

    let line = match picker.current() {
        Some(name) => Line::from(vec![
            Span::styled("◀ ", Style::default().fg(Color::DarkGray)),
            Span::styled(name.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(" ▶", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("  ({}/{})", picker.selected + 1, picker.items.len()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        None => Line::from(Span::styled("(none)", Style::default().fg(Color::DarkGray))),
    };

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_query_editor(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" SQL Query (i: insert, Enter: run, s: save, v: view saved) ")
        .borders(Borders::ALL)
        .border_style(border_style(app, Field::Query));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paragraph = Paragraph::new(highlight_sql_line(&app.query.value)).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);

    if app.mode == Mode::Insert && app.focus == Field::Query && inner.width > 0 {
        let col = app.query.cursor_column();
        let width = usize::from(inner.width);
        let x = cursor_x(inner, col % width);
        let line = u16::try_from(col / width).unwrap_or(u16::MAX);
        let cursor_y = inner.y.saturating_add(line);
        frame.set_cursor_position((x, cursor_y.min(inner.bottom().saturating_sub(1))));
    }
}

fn highlight_sql_line(query: &str) -> Line<'static> {
    let keywords = [
        "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "JOIN", "INNER", "LEFT", "RIGHT",
        "OUTER", "ON", "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "LIMIT", "OFFSET",
        "AS", "DISTINCT", "COUNT", "SUM", "AVG", "MIN", "MAX", "NULL", "IS", "IN", "LIKE",
        "BETWEEN", "CASE", "WHEN", "THEN", "ELSE", "END", "CROSS", "WITH", "UNION", "ALL",
        "EXISTS", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "CREATE", "DROP",
        "TABLE", "ALTER", "INDEX", "PRAGMA",
    ];

    let mut spans = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut string_char = ' ';

    for c in query.chars() {
        if in_string {
            current.push(c);
            if c == string_char {
                spans.push(Span::styled(current.clone(), Style::default().fg(Color::Green)));
                current.clear();
                in_string = false;
            }
        } else if c == '\'' || c == '"' {
            if !current.is_empty() {
                spans.push(colorize_word(&current, &keywords));
                current.clear();
            }
            current.push(c);
            in_string = true;
            string_char = c;
        } else if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            if !current.is_empty() {
                spans.push(colorize_word(&current, &keywords));
                current.clear();
            }
            let style = match c {
                '(' | ')' | ',' => Style::default().fg(Color::Yellow),
                '=' | '<' | '>' | '!' | '+' | '-' | '*' | '/' | '%' => Style::default().fg(Color::Magenta),
                _ => Style::default(),
            };
            spans.push(Span::styled(c.to_string(), style));
        }
    }

    if !current.is_empty() {
        if in_string {
            spans.push(Span::styled(current, Style::default().fg(Color::Green)));
        } else {
            spans.push(colorize_word(&current, &keywords));
        }
    }

    Line::from(spans)
}

fn colorize_word(word: &str, keywords: &[&str]) -> Span<'static> {
    let upper = word.to_uppercase();
    if keywords.contains(&upper.as_str()) {
        Span::styled(
            word.to_string(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )
    } else if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        Span::styled(word.to_string(), Style::default().fg(Color::Cyan))
    } else {
        Span::styled(word.to_string(), Style::default())
    }
}

fn draw_help(frame: &mut Frame, app: &App, area: Rect) {
    let text = vec![
        Line::from("A database in SQLite is just a file on the same machine."),
        Line::from(format!("By convention their names end in .{}", app.ws.extension)),
        Line::from(""),
        Line::from(Span::styled(
            "i: edit filename   Enter: create database   1-4: switch page",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let help = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)))
        .wrap(Wrap { trim: true });
    frame.render_widget(help, area);
}

fn draw_results(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.result {
        Some(ref table) => format!(" {} ({} rows) ", app.result_title, table.row_count()),
        None => " Results ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(app, Field::Results));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(ref table) = app.result else {
        let hint = match app.page {
            Page::UploadData => "Pick a database, name the table, give a CSV path and press Enter",
            Page::ViewTables => "Pick a table and press Enter to preview it, d to download it as CSV",
            _ => "Enter a SQL query and press Enter to execute",
        };
        let help = Paragraph::new(hint).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, inner);
        return;
    };

    if table.row_count() == 0 && table.column_count() == 0 {
        frame.render_widget(Paragraph::new("No results"), inner);
        return;
    }

    let header_cells: Vec<Cell> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .skip(app.result_horizontal_scroll)
        .map(|(i, col)| {
            let width = app.column_widths.get(i).copied().unwrap_or(10);
            Cell::from(truncate_string(&col.name, width))
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        })
        .collect();

    let header = Row::new(header_cells).height(1);

    let visible_height = inner.height.saturating_sub(1) as usize;
    let rows: Vec<Row> = table
        .rows
        .iter()
        .skip(app.result_scroll)
        .take(visible_height)
        .map(|row| {
            let cells: Vec<Cell> = row
                .values
                .iter()
                .enumerate()
                .skip(app.result_horizontal_scroll)
                .map(|(i, val)| {
                    let width = app.column_widths.get(i).copied().unwrap_or(10);
                    let cell = Cell::from(truncate_string(&val.to_string(), width));
                    if val.is_null() {
                        cell.style(Style::default().fg(Color::DarkGray))
                    } else {
                        cell
                    }
                })
                .collect();
            Row::new(cells)
        })
        .collect();

    let widths: Vec<Constraint> = app
        .column_widths
        .iter()
        .skip(app.result_horizontal_scroll)
        .map(|&w| Constraint::Length(w as u16 + 2))
        .collect();

    let table_widget = Table::new(rows, &widths)
        .header(header)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    frame.render_widget(table_widget, inner);
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    } else {
        s.chars().take(max_len).collect()
    }
}

fn draw_notice(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.notice {
        Some(Notice::Info(msg)) => Line::from(Span::styled(format!(" {}", msg), Style::default().fg(Color::Green))),
        Some(Notice::Error(msg)) => Line::from(Span::styled(format!(" {}", msg), Style::default().fg(Color::Red))),
        Some(Notice::Prompt(msg)) => Line::from(vec![
            Span::styled(format!(" {} ", msg), Style::default().fg(Color::Yellow)),
            Span::styled("[r] Replace table  [n] Choose another name", Style::default().fg(Color::Black).bg(Color::Yellow)),
        ]),
        None => Line::from(""),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_str = match app.mode {
        Mode::Normal => "NORMAL",
        Mode::Insert => "INSERT",
        Mode::Command => "COMMAND",
    };

    let mode_color = match app.mode {
        Mode::Normal => Color::Blue,
        Mode::Insert => Color::Green,
        Mode::Command => Color::Yellow,
    };

    let help = match (app.mode, app.page) {
        (Mode::Normal, Page::ViewTables) => "1-4:page  Tab:focus  j/k:select  Enter:preview  d:download  q:quit",
        (Mode::Normal, Page::RunQuery) => "1-4:page  i:insert  Enter:run  s:save  v:saved  C:clear saved  q:quit",
        (Mode::Normal, _) => "1-4:page  Tab:focus  i:insert  j/k:select  Enter:submit  ::command  q:quit",
        (Mode::Insert, _) => "Esc:normal  Enter:submit  Tab:next field  Ctrl+C:cancel",
        (Mode::Command, _) => "e:execute  w:download  r:refresh  clear  q:quit  Esc:cancel",
    };

    let status = Line::from(vec![
        Span::styled(format!(" {} ", mode_str), Style::default().fg(Color::Black).bg(mode_color)),
        Span::raw(" "),
        Span::styled(format!("[{}]", app.focus.label()), Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(help, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}

fn draw_command_line(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let popup_area = Rect {
        x: 0,
        y: area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };

    frame.render_widget(Clear, popup_area);

    let command_line = Paragraph::new(format!(":{}", app.command_buffer)).style(Style::default().fg(Color::White));
    frame.render_widget(command_line, popup_area);

    frame.set_cursor_position((cursor_x(popup_area, app.command_buffer.chars().count() + 1), popup_area.y));
}

/// Screen column `column` cells into `area`, clamped to its last cell.
fn cursor_x(area: Rect, column: usize) -> u16 {
    let column = u16::try_from(column).unwrap_or(u16::MAX);
    area.x.saturating_add(column.min(area.width.saturating_sub(1)))
}
