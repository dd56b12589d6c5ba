//! Responsive 3-panel layout.
//!
//! Pure layout arithmetic; no application state is mutated here.
//!
//! # Panel geometry
//!
//! At `>= 120` columns the chunk list, document and detail panels are all
//! visible with widths from `App.left_pct / center_pct / right_pct`. Below
//! that only the focused panel is drawn, at full width.
//!
//! `Spacing::Overlap(1)` with `MergeStrategy::Fuzzy` lets neighbouring
//! borders share one column.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use meo_core::lifecycle::StateKind;

use crate::app::{App, Mode, PanelFocus, StatusLevel};
use crate::theme::Theme;

/// Terminal width below which only the focused panel is shown.
pub const WIDE_LAYOUT_MIN: u16 = 120;

/// Returns `[left, center, right, status_bar]` for the current frame.
///
/// Collapsed panels come back with zero width.
pub fn compute_layout(frame: &Frame, app: &App) -> [Rect; 4] {
    let [main_area, status_bar] =
        frame.area().layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let constraints = if frame.area().width >= WIDE_LAYOUT_MIN {
        [
            Constraint::Percentage(app.left_pct),
            Constraint::Percentage(app.center_pct),
            Constraint::Percentage(app.right_pct),
        ]
    } else {
        let visible = |panel: PanelFocus| {
            if app.focus == panel {
                Constraint::Fill(1)
            } else {
                Constraint::Length(0)
            }
        };
        [
            visible(PanelFocus::Chunks),
            visible(PanelFocus::Document),
            visible(PanelFocus::Detail),
        ]
    };
    let horizontal = Layout::horizontal(constraints).spacing(Spacing::Overlap(1));

    let [left, center, right] = main_area.layout(&horizontal);
    [left, center, right, status_bar]
}

/// Inner `Rect` of a bordered panel.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Bordered panel block; thick border when focused.
///
/// `Fuzzy` merging is required because `Exact` draws wrong junctions where
/// `Thick` and `Plain` borders meet.
pub fn panel_block<'a>(title: impl Into<Line<'a>>, is_focused: bool, theme: &Theme) -> Block<'a> {
    let border_style = if is_focused {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_focused { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

fn state_label(kind: StateKind) -> &'static str {
    match kind {
        StateKind::Editing => " EDIT ",
        StateKind::SelectingAction | StateKind::SelectingLockType | StateKind::SelectingDirection => {
            " MARK "
        }
        StateKind::Annotating => " NOTE ",
        StateKind::Processing => " RUN ",
        StateKind::Reviewing => " REVIEW ",
        StateKind::Complete => " DONE ",
    }
}

fn key_hints(app: &App) -> &'static str {
    if let Mode::EditResponse(_) = app.mode {
        return "Ctrl-s save  Esc discard";
    }
    match app.kind() {
        StateKind::Editing => "v select  Enter mark  R generate  Tab focus  ? help  q quit",
        StateKind::SelectingAction | StateKind::SelectingLockType | StateKind::SelectingDirection => {
            "j/k move  Enter choose  Esc cancel"
        }
        StateKind::Annotating => "Enter save  Esc cancel",
        StateKind::Processing => "c cancel  ? help",
        StateKind::Reviewing => "a approve  d deny  e edit  R resume  U rollback  c close",
        StateKind::Complete => "w write back  a/d revise  U rollback  c close",
    }
}

/// Renders the 1-row status bar: state badge, file name, then either the
/// current status message or the key hints for the state.
pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let badge = Span::styled(
        state_label(app.kind()),
        Style::default().fg(theme.status_mode).add_modifier(Modifier::BOLD),
    );
    let file = app
        .lifecycle
        .source()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut spans = vec![badge, Span::raw(format!(" {file} "))];

    if app.lifecycle.is_stale() {
        spans.push(Span::styled("[stale] ", Style::default().fg(theme.status_warning)));
    }

    match &app.status {
        Some(status) => {
            let fg = match status.level {
                StatusLevel::Info => theme.status_bar_fg,
                StatusLevel::Warning => theme.status_warning,
                StatusLevel::Error => theme.status_error,
            };
            spans.push(Span::styled(status.text.clone(), Style::default().fg(fg)));
        }
        None => spans.push(Span::styled(
            key_hints(app),
            Style::default().fg(theme.line_number),
        )),
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
