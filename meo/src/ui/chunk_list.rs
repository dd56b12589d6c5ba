//! Left panel: chunk list.
//!
//! While editing the rows are the project's chunks with their direction or
//! lock type; while reviewing they are the session's editable chunks with
//! their outcomes. Each row starts with a category badge.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use meo_core::types::Category;

use crate::app::{App, ChunkRow, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

/// Renders the chunk list with `render_stateful_widget` so the `ListState`
/// highlight follows the selection.
///
/// # Arguments
///
/// * `frame`: current render frame
/// * `area`: the `Rect` for the left panel (includes borders)
/// * `app`: app state supplying the rows and `chunk_list_state`
/// * `theme`: active color theme
pub fn render_chunk_list(frame: &mut Frame, area: Rect, app: &mut App, theme: &Theme) {
    let is_focused = app.focus == PanelFocus::Chunks;
    let rows = app.chunk_rows();
    let title = if rows.is_empty() {
        "Chunks".to_owned()
    } else {
        format!("Chunks ({})", rows.len())
    };
    app.chunks_viewport_height = inner_rect(area).height;

    let items: Vec<ListItem> = if rows.is_empty() {
        vec![ListItem::new(Line::raw("No chunks. Select lines with v, mark with Enter."))]
    } else {
        rows.iter().map(|row| chunk_item(row, theme)).collect()
    };

    let list = List::new(items)
        .block(panel_block(title, is_focused, theme))
        .highlight_style(Style::default().fg(theme.border_active).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.chunk_list_state);
}

fn badge(category: Category) -> &'static str {
    match category {
        Category::Replace => "[R] ",
        Category::Tweak => "[T] ",
        Category::Lock => "[L] ",
    }
}

fn chunk_item(row: &ChunkRow, theme: &Theme) -> ListItem<'static> {
    let badge = Span::styled(badge(row.category), Style::default().fg(theme.category(row.category)));
    let outcome = Span::styled(
        format!(" {}", row.outcome.label()),
        Style::default().fg(theme.outcome(row.outcome)),
    );
    let mut lines = vec![Line::from(vec![badge, Span::raw(row.label.clone())])];

    let mut detail = vec![Span::raw("    ")];
    if !row.detail.is_empty() {
        detail.push(Span::styled(row.detail.clone(), Style::default().fg(theme.line_number)));
    }
    if row.category.is_editable() {
        detail.push(outcome);
    }
    lines.push(Line::from(detail));

    if let Some(error) = &row.error {
        lines.push(Line::from(Span::styled(
            format!("    {error}"),
            Style::default().fg(theme.status_error),
        )));
    }
    ListItem::new(lines)
}
