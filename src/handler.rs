use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::SelectionGrace(token) => app.selection_grace_elapsed(token),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('b') => {
                app.confirm_branch();
            }
            KeyCode::Char('w') => {
                app.close_branch();
            }
            KeyCode::Char('n') => app.new_conversation(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Esc => app.clear_selection(),
        KeyCode::PageUp => {
            let view = app.view_mut(app.focus);
            let page = view.page();
            view.scroll_up(page);
        }
        KeyCode::PageDown => {
            let view = app.view_mut(app.focus);
            let page = view.page();
            view.scroll_down(page);
        }
        KeyCode::Enter => {
            if !app.input_locked() {
                app.submit();
            }
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let pos = Position::new(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.pointer_down(pos),
        MouseEventKind::Drag(MouseButton::Left) => app.pointer_drag(pos),
        MouseEventKind::Up(MouseButton::Left) => app.pointer_up(pos),
        MouseEventKind::ScrollUp => app.wheel(pos, true),
        MouseEventKind::ScrollDown => app.wheel(pos, false),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::conversation::ThreadTarget;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> AppEvent {
        AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_char_to_byte_index_handles_multibyte() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_cursor_editing() {
        let (mut app, _rx) = test_app(false);
        type_text(&mut app, "hllo");
        handle_event(&mut app, key(KeyCode::Home));
        handle_event(&mut app, key(KeyCode::Right));
        type_text(&mut app, "e");
        assert_eq!(app.input, "hello");

        handle_event(&mut app, key(KeyCode::End));
        handle_event(&mut app, key(KeyCode::Backspace));
        handle_event(&mut app, key(KeyCode::Home));
        handle_event(&mut app, key(KeyCode::Delete));
        assert_eq!(app.input, "ell");
        assert_eq!(app.input_cursor, 0);
    }

    #[tokio::test]
    async fn test_enter_is_ignored_while_focused_thread_loads() {
        let (mut app, _rx) = test_app(false);
        type_text(&mut app, "first");
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(app.input.is_empty());

        type_text(&mut app, "second");
        handle_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.input, "second");
    }

    #[test]
    fn test_ctrl_c_quits() {
        let (mut app, _rx) = test_app(false);
        handle_event(&mut app, ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_ctrl_b_without_selection_does_nothing() {
        let (mut app, _rx) = test_app(false);
        handle_event(&mut app, ctrl('b'));
        assert!(!app.has_branch());
        assert_eq!(app.focus, ThreadTarget::Main);
    }
}
