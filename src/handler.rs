use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode, SUGGESTIONS};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Stream(stream_event) => app.apply_stream_event(stream_event),
        AppEvent::StreamClosed => app.finish_stream(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }
    if key.code == KeyCode::Char('n') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.new_chat();
        return Ok(());
    }

    // Model picker captures keys while open
    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => {
                app.show_model_picker = false;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                app.model_picker_nav_down();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                app.model_picker_nav_up();
            }
            KeyCode::Enter => {
                app.select_model();
            }
            _ => {}
        }
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await?,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
            app.cursor = app.input.chars().count();
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        // New chat
        KeyCode::Char('n') => app.new_chat(),

        // Open model picker
        KeyCode::Char('M') => open_model_picker(app).await,

        // Welcome screen suggestion shortcuts
        KeyCode::Char(c @ '1'..='4') if app.messages.is_empty() => {
            let idx = c as usize - '1' as usize;
            if let Some(text) = SUGGESTIONS.get(idx) {
                app.submit_suggestion(text);
            }
        }

        _ => {}
    }
    Ok(())
}

async fn open_model_picker(app: &mut App) {
    match app.client.list_models().await {
        Ok(models) if !models.is_empty() => {
            app.available_models = models;
            // Select current model if in list, otherwise first
            let current_idx = app
                .available_models
                .iter()
                .position(|m| m == &app.selected_model)
                .unwrap_or(0);
            app.model_picker_state.select(Some(current_idx));
            app.show_model_picker = true;
        }
        Ok(_) => app.notify("No models available on the server".to_string()),
        Err(err) => app.notify(format!("Could not list models: {err}")),
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        // Alt+Enter inserts a line break, plain Enter sends
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, '\n');
            app.cursor += 1;
        }
        KeyCode::Enter => {
            app.submit();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_down();
            app.scroll_down();
            app.scroll_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_up();
            app.scroll_up();
            app.scroll_up();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "añc";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 1), 1);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 5), s.len());
    }
}
