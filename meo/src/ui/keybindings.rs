//! Keybinding dispatcher.
//!
//! Translates crossterm key and mouse events into `App` calls and returns a
//! [`KeyAction`] telling the event loop whether to keep going. Overlay modes
//! (help, quit confirmation, response editor) take precedence; otherwise the
//! lifecycle state picks the handler.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use meo_core::lifecycle::{Intent, StateKind};

use crate::app::{App, Mode, PanelFocus, StatusLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

/// Dispatches a key event to the handler for the current mode and state.
pub fn handle_key(key: KeyEvent, app: &mut App) -> KeyAction {
    match app.mode {
        Mode::HelpOverlay => return handle_help(key, app),
        Mode::ConfirmQuit => return handle_confirm_quit(key, app),
        Mode::EditResponse(_) => return handle_edit_response(key, app),
        Mode::Normal => {}
    }
    match app.kind() {
        StateKind::SelectingAction | StateKind::SelectingDirection | StateKind::SelectingLockType => {
            handle_picker(key, app)
        }
        StateKind::Annotating => handle_annotation(key, app),
        StateKind::Editing => handle_editing(key, app),
        StateKind::Processing => handle_processing(key, app),
        StateKind::Reviewing | StateKind::Complete => handle_review(key, app),
    }
}

// ---------------------------------------------------------------------------
// Keys shared by the panel states
// ---------------------------------------------------------------------------

/// Scroll, focus, help and quit. Returns `None` when the key is not one of
/// them.
fn handle_common(key: KeyEvent, app: &mut App) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_top(),
        KeyCode::Char('G') | KeyCode::End => app.scroll_bottom(),
        KeyCode::Char('d') if ctrl => app.half_page_down(),
        KeyCode::Char('u') if ctrl => app.half_page_up(),
        KeyCode::Char('f') if ctrl => app.full_page_down(),
        KeyCode::Char('b') if ctrl => app.full_page_up(),
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::BackTab => app.focus = app.focus.prev(),
        KeyCode::Char('?') => {
            app.help_scroll = 0;
            app.mode = Mode::HelpOverlay;
        }
        KeyCode::Char('q') => {
            if app.kind() == StateKind::Processing {
                app.mode = Mode::ConfirmQuit;
            } else {
                return Some(KeyAction::Quit);
            }
        }
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

fn handle_editing(key: KeyEvent, app: &mut App) -> KeyAction {
    if let Some(action) = handle_common(key, app) {
        return action;
    }
    let on_chunks = app.focus == PanelFocus::Chunks;
    match key.code {
        KeyCode::Char('v') | KeyCode::Char('V') => app.toggle_selection(),
        KeyCode::Esc => app.selection_anchor = None,
        KeyCode::Enter if on_chunks => {
            // Jump to the chunk in the document.
            app.on_chunk_selected();
            app.focus = PanelFocus::Document;
        }
        KeyCode::Enter => app.confirm_selection(),
        KeyCode::Char('x') | KeyCode::Delete if on_chunks => {
            app.on_selected(Intent::RemoveChunk);
        }
        KeyCode::Char('+') | KeyCode::Char('=') if on_chunks => app.shift_execution_order(1),
        KeyCode::Char('-') if on_chunks => app.shift_execution_order(-1),
        KeyCode::Char('R') => app.dispatch(Intent::Generate),
        KeyCode::Char('L') => app.resume_last_session(),
        _ => {}
    }
    KeyAction::Continue
}

fn handle_processing(key: KeyEvent, app: &mut App) -> KeyAction {
    if let Some(action) = handle_common(key, app) {
        return action;
    }
    if matches!(key.code, KeyCode::Char('c') | KeyCode::Esc) {
        app.dispatch(Intent::Cancel);
        if app.kind() == StateKind::Processing {
            app.set_status(StatusLevel::Warning, "cancelling after the current chunk");
        }
    }
    KeyAction::Continue
}

fn handle_review(key: KeyEvent, app: &mut App) -> KeyAction {
    if let Some(action) = handle_common(key, app) {
        return action;
    }
    match key.code {
        KeyCode::Char('a') => {
            app.on_selected(Intent::Approve);
            app.on_chunk_selected();
        }
        KeyCode::Char('d') => {
            app.on_selected(Intent::Deny);
            app.on_chunk_selected();
        }
        KeyCode::Char('e') if app.kind() == StateKind::Reviewing => app.begin_edit_response(),
        KeyCode::Char('R') => app.dispatch(Intent::Generate),
        KeyCode::Char('U') => {
            app.dispatch(Intent::RollbackSession);
            app.on_chunk_selected();
        }
        KeyCode::Char('w') => {
            app.dispatch(Intent::WriteBack);
            if app.kind() == StateKind::Editing {
                let file = app.lifecycle.source().display().to_string();
                app.set_status(StatusLevel::Info, format!("wrote {file}"));
            }
        }
        KeyCode::Char('c') => app.dispatch(Intent::Close),
        KeyCode::Char('[') => app.prev_hunk(),
        KeyCode::Char(']') => app.next_hunk(),
        KeyCode::Enter if app.focus == PanelFocus::Chunks => app.focus = PanelFocus::Detail,
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// Dialogs
// ---------------------------------------------------------------------------

fn handle_picker(key: KeyEvent, app: &mut App) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => app.popup_down(),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => app.popup_up(),
        KeyCode::Enter => app.choose_popup(),
        KeyCode::Esc | KeyCode::Char('q') => app.dispatch(Intent::Cancel),
        _ => {}
    }
    KeyAction::Continue
}

fn handle_annotation(key: KeyEvent, app: &mut App) -> KeyAction {
    match key.code {
        KeyCode::Enter => app.submit_annotation(),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.submit_annotation();
        }
        KeyCode::Esc => {
            app.input.clear();
            app.dispatch(Intent::Cancel);
        }
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.input.push(c),
        _ => {}
    }
    KeyAction::Continue
}

fn handle_edit_response(key: KeyEvent, app: &mut App) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('s') if ctrl => {
            app.submit_edit_response();
            app.on_chunk_selected();
        }
        KeyCode::Esc => {
            app.input.clear();
            app.mode = Mode::Normal;
        }
        KeyCode::Enter => app.input.push('\n'),
        KeyCode::Backspace => {
            app.input.pop();
        }
        KeyCode::Char(c) if !ctrl => app.input.push(c),
        _ => {}
    }
    KeyAction::Continue
}

fn handle_help(key: KeyEvent, app: &mut App) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.help_scroll = app.help_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.help_scroll = app.help_scroll.saturating_sub(1),
        KeyCode::Char('g') => app.help_scroll = 0,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => app.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

fn handle_confirm_quit(key: KeyEvent, app: &mut App) -> KeyAction {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Quit,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.mode = Mode::Normal;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Mouse
// ---------------------------------------------------------------------------

/// Left click focuses the panel under the pointer; the wheel scrolls the
/// focused panel (or the help overlay) by three lines.
pub fn handle_mouse(mouse: MouseEvent, app: &mut App) -> KeyAction {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if app.mode == Mode::Normal => {
            let pos = Position { x: mouse.column, y: mouse.row };
            let [left, center, right] = app.panel_rects;
            if left.width > 0 && left.contains(pos) {
                app.focus = PanelFocus::Chunks;
            } else if center.width > 0 && center.contains(pos) {
                app.focus = PanelFocus::Document;
            } else if right.width > 0 && right.contains(pos) {
                app.focus = PanelFocus::Detail;
            }
        }
        MouseEventKind::ScrollUp if app.mode == Mode::HelpOverlay => {
            app.help_scroll = app.help_scroll.saturating_sub(3);
        }
        MouseEventKind::ScrollDown if app.mode == Mode::HelpOverlay => {
            app.help_scroll = app.help_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp if app.mode == Mode::Normal => app.scroll_up(3),
        MouseEventKind::ScrollDown if app.mode == Mode::Normal => app.scroll_down(3),
        _ => {}
    }
    KeyAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use meo_core::lifecycle::Lifecycle;
    use meo_core::project::ProjectState;
    use meo_core::session::{SessionSettings, SessionStore};

    const DOC: &str = "# Notes\n\nAlpha line.\nBeta line.\n";

    fn app(dir: &tempfile::TempDir) -> App {
        let source = dir.path().join("notes.md");
        std::fs::write(&source, DOC).unwrap();
        let lifecycle = Lifecycle::new(
            &source,
            DOC.to_owned(),
            ProjectState::new("notes.md", DOC),
            crate::presets::builtin().unwrap(),
            SessionStore::new(dir.path().join("sessions")),
            SessionSettings::default(),
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        App::new(lifecycle, AgentConfig::default(), tx)
    }

    fn press(app: &mut App, code: KeyCode) -> KeyAction {
        handle_key(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    #[test]
    fn visual_selection_opens_the_action_picker() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        app.doc_viewport_height = 20;

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('v'));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.selected_lines(), Some((2, 3)));

        press(&mut app, KeyCode::Enter);
        let pending = app.lifecycle.state().pending().unwrap();
        assert_eq!(pending.range.slice(DOC), Some("Alpha line.\nBeta line."));

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.kind(), StateKind::Editing);
        assert!(app.lifecycle.project().list_chunks().is_empty());
    }

    #[test]
    fn lock_chunk_is_marked_from_the_keyboard() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        app.cursor = 2;

        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.kind(), StateKind::SelectingLockType);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.kind(), StateKind::Annotating);
        press(&mut app, KeyCode::Enter);

        let chunks = app.lifecycle.project().list_chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lock_type(), Some(meo_core::types::LockType::Example));
        assert_eq!(chunks[0].annotation(), None);
    }

    #[test]
    fn help_overlay_opens_and_closes() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::HelpOverlay);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.help_scroll, 1);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn q_quits_while_editing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        assert_eq!(press(&mut app, KeyCode::Char('q')), KeyAction::Quit);
    }

    #[test]
    fn tab_cycles_focus() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        assert_eq!(app.focus, PanelFocus::Document);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, PanelFocus::Detail);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, PanelFocus::Chunks);
    }
}
