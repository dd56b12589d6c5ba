//! Right panel while reviewing: the selected chunk's diff.
//!
//! Uses manual virtual scrolling: only `diff.lines[diff_scroll..][..height]`
//! become list items each frame.

use ratatui::{
    Frame,
    layout::Rect,
    text::Line,
    widgets::{List, ListItem},
};

use crate::app::{App, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

pub fn render_diff(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let is_focused = app.focus == PanelFocus::Detail;
    let title = match &app.current_diff {
        Some(diff) => format!("Diff {}  +{} -{}", diff.chunk_id, diff.added, diff.removed),
        None => "Diff".to_owned(),
    };
    frame.render_widget(panel_block(title, is_focused, theme), area);
    let inner = inner_rect(area);

    let placeholder = match &app.current_diff {
        None => Some("Select a chunk to see its diff."),
        Some(diff) if diff.is_empty() => Some("No change: the chunk matches its original text."),
        Some(_) => None,
    };
    if let Some(msg) = placeholder {
        frame.render_widget(List::new([ListItem::new(Line::raw(msg))]), inner);
        return;
    }

    let total = app.diff.lines.len();
    let visible_start = app.diff_scroll.min(total.saturating_sub(1));
    let visible_end = (visible_start + usize::from(inner.height)).min(total);

    let items: Vec<ListItem> = app.diff.lines[visible_start..visible_end]
        .iter()
        .map(|l| ListItem::new(l.clone()))
        .collect();
    frame.render_widget(List::new(items), inner);
}
