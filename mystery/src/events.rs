//! Event handling for the mystery TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, CommandAction, InputMode};
use crate::ui::{FocusedPanel, Overlay};

/// Result of handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Quit,
    NeedsRedraw,
    /// Ask the active suspect a question.
    Send(String),
    /// Start or resume a conversation.
    Open(String),
    /// Erase progress, already confirmed.
    Reset,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) => handle_key_event(app, key),
        Event::Mouse(mouse) => handle_mouse_event(app, mouse),
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

/// Handle a mouse event
fn handle_mouse_event(app: &mut App, mouse: MouseEvent) -> EventResult {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scroll_up(3);
            EventResult::NeedsRedraw
        }
        MouseEventKind::ScrollDown => {
            app.scroll_down(3);
            EventResult::NeedsRedraw
        }
        _ => EventResult::Continue,
    }
}

/// Handle a key event
fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    if app.has_overlay() {
        return handle_overlay_key(app, key);
    }

    // Global shortcuts (always work)
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return EventResult::Quit;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Insert => handle_insert_mode(app, key),
        InputMode::Command => handle_command_mode(app, key),
    }
}

/// Handle keys in NORMAL mode (vim-style navigation and hotkeys)
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        // Mode switching
        KeyCode::Char('i') | KeyCode::Char('a') => {
            app.enter_insert_mode();
            EventResult::NeedsRedraw
        }
        KeyCode::Char(':') => {
            app.enter_command_mode();
            EventResult::NeedsRedraw
        }

        KeyCode::Char('?') | KeyCode::F(1) => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('c') => {
            app.set_overlay(Overlay::Briefing);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('q') => EventResult::Quit,

        // Suspects
        KeyCode::Enter | KeyCode::Char('o') => match app.selected_character_id() {
            Some(id) => EventResult::Open(id.to_string()),
            None => EventResult::Continue,
        },
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            match app.scenario().characters.get(index) {
                Some(character) => EventResult::Open(character.id.clone()),
                None => {
                    app.set_status(format!("No suspect number {c}"));
                    EventResult::NeedsRedraw
                }
            }
        }
        KeyCode::Char('b') | KeyCode::Esc => {
            app.close_conversation();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('A') => {
            if let Some(id) = app.selected_character_id().map(str::to_string) {
                app.request_accusation(&id);
            }
            EventResult::NeedsRedraw
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => {
            match app.focused_panel {
                FocusedPanel::Suspects => app.select_next(),
                FocusedPanel::Chat => app.scroll_down(1),
                FocusedPanel::Evidence => app.evidence_scroll = app.evidence_scroll.saturating_add(1),
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            match app.focused_panel {
                FocusedPanel::Suspects => app.select_prev(),
                FocusedPanel::Chat => app.scroll_up(1),
                FocusedPanel::Evidence => app.evidence_scroll = app.evidence_scroll.saturating_sub(1),
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Char('G') => {
            app.scroll_to_bottom();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('g') => {
            app.scroll_to_top();
            EventResult::NeedsRedraw
        }
        KeyCode::PageUp => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::PageDown => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }

        // Panel focus cycling
        KeyCode::Tab => {
            app.cycle_focus();
            EventResult::NeedsRedraw
        }
        KeyCode::BackTab => {
            app.cycle_focus_reverse();
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Handle keys in INSERT mode (free text input)
fn handle_insert_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            EventResult::NeedsRedraw
        }

        KeyCode::Enter => {
            if app.is_awaiting_active() {
                app.set_status("Let them answer first...");
                return EventResult::NeedsRedraw;
            }
            match app.submit_input() {
                Some(input) => EventResult::Send(input),
                None => EventResult::NeedsRedraw,
            }
        }

        // Input editing
        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Home => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::End => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.backspace();
            EventResult::NeedsRedraw
        }
        KeyCode::Delete => {
            app.delete();
            EventResult::NeedsRedraw
        }
        KeyCode::Up => {
            app.history_prev();
            EventResult::NeedsRedraw
        }
        KeyCode::Down => {
            app.history_next();
            EventResult::NeedsRedraw
        }

        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Handle keys in COMMAND mode (: commands)
fn handle_command_mode(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.clear_input();
            EventResult::NeedsRedraw
        }

        KeyCode::Enter => {
            let command = app.input_buffer().to_string();
            app.clear_input();
            app.input_mode = InputMode::Normal;

            let action = app.process_command(&command);

            if app.should_quit {
                return EventResult::Quit;
            }
            match action {
                Some(CommandAction::Open(id)) => EventResult::Open(id),
                None => EventResult::NeedsRedraw,
            }
        }

        KeyCode::Left => {
            if app.cursor_position() > 1 {
                app.cursor_left();
            }
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            if app.cursor_position() > 1 {
                app.backspace();
            } else {
                // Backspace on just ":" exits command mode
                app.input_mode = InputMode::Normal;
                app.clear_input();
            }
            EventResult::NeedsRedraw
        }

        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}

/// Handle key when overlay is open
fn handle_overlay_key(app: &mut App, key: KeyEvent) -> EventResult {
    match app.overlay().cloned() {
        Some(Overlay::ConfirmReset) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.close_overlay();
                EventResult::Reset
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
                app.close_overlay();
                app.set_status("Reset cancelled");
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        },
        Some(Overlay::ConfirmAccuse { character_id }) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.accuse(&character_id);
                EventResult::NeedsRedraw
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
                app.close_overlay();
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        },
        _ => match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter | KeyCode::Char(' ') => {
                app.close_overlay();
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use mystery_core::testing::TestHarness;
    use mystery_core::ChatBackend;
    use std::sync::Arc;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    async fn app() -> App {
        let harness = TestHarness::new().await.unwrap();
        let backend: Arc<dyn ChatBackend> = harness.backend.clone();
        let mut app = App::new(harness.session, backend);
        app.close_overlay();
        app
    }

    #[tokio::test]
    async fn test_enter_opens_selected_suspect() {
        let mut app = app().await;
        handle_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(
            handle_event(&mut app, key(KeyCode::Enter)),
            EventResult::Open("gardener".to_string())
        );
    }

    #[tokio::test]
    async fn test_typed_question_is_sent() {
        let mut app = app().await;
        app.open_conversation("cook").await;

        handle_event(&mut app, key(KeyCode::Char('i')));
        for c in "Where?".chars() {
            handle_event(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(
            handle_event(&mut app, key(KeyCode::Enter)),
            EventResult::Send("Where?".to_string())
        );
        assert_eq!(app.input_buffer(), "");
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let mut app = app().await;
        handle_event(&mut app, key(KeyCode::Char(':')));
        for c in "reset".chars() {
            handle_event(&mut app, key(KeyCode::Char(c)));
        }
        handle_event(&mut app, key(KeyCode::Enter));
        assert!(matches!(app.overlay(), Some(Overlay::ConfirmReset)));

        assert_eq!(handle_event(&mut app, key(KeyCode::Char('n'))), EventResult::NeedsRedraw);
        assert!(!app.has_overlay());

        app.set_overlay(Overlay::ConfirmReset);
        assert_eq!(handle_event(&mut app, key(KeyCode::Char('y'))), EventResult::Reset);
    }

    #[tokio::test]
    async fn test_wrong_accusation_keeps_playing() {
        let mut app = app().await;
        handle_event(&mut app, key(KeyCode::Char('A')));
        assert!(matches!(app.overlay(), Some(Overlay::ConfirmAccuse { .. })));

        handle_event(&mut app, key(KeyCode::Char('y')));
        assert!(matches!(app.overlay(), Some(Overlay::Verdict(v)) if !v.is_correct()));

        handle_event(&mut app, key(KeyCode::Esc));
        assert!(!app.has_overlay());
        assert_eq!(handle_event(&mut app, key(KeyCode::Char('q'))), EventResult::Quit);
    }
}
