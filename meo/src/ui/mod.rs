//! UI rendering.
//!
//! [`render`] is the single entry point, called from the event loop's
//! `terminal.draw()` closure. Layout arithmetic lives in `layout.rs`; each
//! panel and dialog has its own module.

mod chunk_list;
mod details;
mod dialog;
mod diff_view;
mod document_view;
mod help;
pub mod keybindings;
mod layout;

use ratatui::Frame;
use ratatui::style::Style;
use ratatui::widgets::Block;

use meo_core::lifecycle::StateKind;

use crate::app::{App, Mode};
use crate::highlight;
use crate::theme::Theme;
use layout::{compute_layout, inner_rect, render_status_bar};

/// Renders one frame: three panels, the status bar, then whichever dialog
/// the state calls for.
///
/// Viewport heights and panel rects are written back into `app` so the next
/// keypress can compute page distances and mouse hit-tests.
pub fn render(frame: &mut Frame, app: &mut App, theme: &Theme) {
    let [left, center, right, status_bar] = compute_layout(frame, app);
    frame.render_widget(Block::new().style(Style::default().bg(theme.background)), frame.area());

    app.doc_viewport_height = inner_rect(center).height;
    app.detail_viewport_height = inner_rect(right).height;
    app.panel_rects = [left, center, right];

    if app.diff_dirty {
        app.diff = app
            .current_diff
            .as_ref()
            .map(|diff| highlight::highlight_diff(diff, theme))
            .unwrap_or_default();
        app.diff_dirty = false;
    }

    if left.width > 0 {
        chunk_list::render_chunk_list(frame, left, app, theme);
    }
    if center.width > 0 {
        document_view::render_document(frame, center, app, theme);
    }
    if right.width > 0 {
        match app.kind() {
            StateKind::Processing => details::render_progress(frame, right, app, theme),
            StateKind::Reviewing | StateKind::Complete => {
                diff_view::render_diff(frame, right, app, theme);
            }
            _ => details::render_details(frame, right, app, theme),
        }
    }
    render_status_bar(frame, status_bar, app, theme);

    match app.kind() {
        StateKind::SelectingAction | StateKind::SelectingDirection | StateKind::SelectingLockType => {
            dialog::render_picker(frame, app, theme);
        }
        StateKind::Annotating => {
            dialog::render_input(frame, app, "Annotation (optional)", "Enter saves, Esc cancels", theme);
        }
        _ => {}
    }

    match &app.mode {
        Mode::EditResponse(id) => {
            let title = format!("Edit {id}");
            dialog::render_input(frame, app, &title, "Ctrl-s saves, Esc discards", theme);
        }
        Mode::ConfirmQuit => dialog::render_confirm_quit(frame, theme),
        Mode::HelpOverlay => help::render_help_overlay(frame, theme, app.help_scroll),
        Mode::Normal => {}
    }
}
