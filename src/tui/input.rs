use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use super::app::{App, Field, Mode, Page};
use crate::db::ConflictPolicy;

pub fn handle_events(app: &mut App) -> std::io::Result<bool> {
    if event::poll(Duration::from_millis(100))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                handle_key_event(app, key);
            }
        }
    }
    Ok(app.should_quit)
}

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Handle Ctrl+C globally
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        if app.mode == Mode::Insert {
            app.enter_normal_mode();
        } else {
            app.should_quit = true;
        }
        return;
    }

    match app.mode {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::Insert => handle_insert_mode(app, key),
        Mode::Command => handle_command_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Collision prompt answers take priority on the upload page
    if app.pending_import.is_some() {
        match key.code {
            KeyCode::Char('r') => return app.resolve_collision(ConflictPolicy::Replace),
            KeyCode::Char('n') => return app.resolve_collision(ConflictPolicy::Fail),
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char(':') => app.enter_command_mode(),

        // Page selection
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            app.select_page(Page::ALL[index]);
        }
        KeyCode::Char(']') => app.next_page(),
        KeyCode::Char('[') => app.prev_page(),

        // Focus switching
        KeyCode::Tab => app.focus_next(),
        KeyCode::BackTab => app.focus_prev(),

        // Mode switching
        KeyCode::Char('i') => app.enter_insert_mode(),
        KeyCode::Char('I') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_start();
            }
            app.enter_insert_mode();
        }
        KeyCode::Char('a') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_right();
            }
            app.enter_insert_mode();
        }
        KeyCode::Char('A') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_end();
            }
            app.enter_insert_mode();
        }

        // Lists and scrolling
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('h') | KeyCode::Left => match app.active_input_mut() {
            Some(input) => input.move_cursor_left(),
            None => app.scroll_results_left(),
        },
        KeyCode::Char('l') | KeyCode::Right => match app.active_input_mut() {
            Some(input) => input.move_cursor_right(),
            None => app.scroll_results_right(),
        },
        KeyCode::Char('g') if app.focus == Field::Results => app.scroll_to_top(),
        KeyCode::Char('G') if app.focus == Field::Results => app.scroll_to_bottom(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.page_down(),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.page_up(),

        // Cursor motions in text fields
        KeyCode::Char('0') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_start();
            }
        }
        KeyCode::Char('$') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_end();
            }
        }
        KeyCode::Char('w') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_word_forward();
            }
        }
        KeyCode::Char('b') => {
            if let Some(input) = app.active_input_mut() {
                input.move_cursor_word_backward();
            }
        }
        KeyCode::Char('x') => {
            if let Some(input) = app.active_input_mut() {
                input.delete_char_forward();
            }
        }
        KeyCode::Char('D') => {
            if let Some(input) = app.active_input_mut() {
                input.delete_to_end();
            }
        }

        // Page actions
        KeyCode::Enter => app.submit(),
        KeyCode::Char('R') => app.refresh_databases(),
        KeyCode::Char('d') if app.page == Page::ViewTables => app.download(),
        KeyCode::Char('s') if app.page == Page::RunQuery => app.save_query(),
        KeyCode::Char('v') if app.page == Page::RunQuery => app.view_saved(),
        KeyCode::Char('C') if app.page == Page::RunQuery => app.clear_saved(),

        _ => {}
    }
}

fn handle_insert_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let is_query = app.focus == Field::Query;

    match key.code {
        KeyCode::Esc => app.enter_normal_mode(),
        KeyCode::Enter => {
            app.enter_normal_mode();
            app.submit();
        }
        KeyCode::Tab => {
            app.enter_normal_mode();
            app.focus_next();
            app.enter_insert_mode();
        }
        KeyCode::Up if is_query => app.history_up(),
        KeyCode::Down if is_query => app.history_down(),
        _ => {
            let Some(input) = app.active_input_mut() else {
                app.enter_normal_mode();
                return;
            };
            match key.code {
                KeyCode::Backspace => input.delete_char(),
                KeyCode::Delete => input.delete_char_forward(),
                KeyCode::Left => input.move_cursor_left(),
                KeyCode::Right => input.move_cursor_right(),
                KeyCode::Home => input.move_cursor_start(),
                KeyCode::End => input.move_cursor_end(),

                // Ctrl shortcuts
                KeyCode::Char('w') if ctrl => input.delete_word_backward(),
                KeyCode::Char('u') if ctrl => input.delete_to_start(),
                KeyCode::Char('k') if ctrl => input.delete_to_end(),
                KeyCode::Char('a') if ctrl => input.move_cursor_start(),
                KeyCode::Char('e') if ctrl => input.move_cursor_end(),

                KeyCode::Char(c) if !ctrl => input.insert_char(c),
                _ => {}
            }
        }
    }
}

fn handle_command_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.command_buffer.clear();
            app.enter_normal_mode();
        }
        KeyCode::Enter => app.execute_command(),
        KeyCode::Backspace => {
            app.command_buffer.pop();
            if app.command_buffer.is_empty() {
                app.enter_normal_mode();
            }
        }
        KeyCode::Char(c) => app.command_buffer.push(c),
        _ => {}
    }
}
