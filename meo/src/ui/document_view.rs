//! Centre panel: the document with chunk and selection backgrounds.
//!
//! Only the lines inside the viewport are materialised each frame. Lines
//! covered by a chunk get the background of its category; the selection in
//! progress and the cursor line are drawn on top.

use std::ops::Range;

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{List, ListItem},
};

use meo_core::types::Category;

use crate::app::{App, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

/// Whether the chunk span `chunk` touches `line`. Empty lines count as one
/// byte wide so a blank line inside a chunk is still painted.
fn covers(chunk: &Range<usize>, line: &Range<usize>) -> bool {
    chunk.start < line.end.max(line.start + 1) && line.start < chunk.end
}

/// Chunk spans over the displayed text, with their categories.
fn chunk_spans(app: &App) -> Vec<(Range<usize>, Category)> {
    match app.lifecycle.session() {
        Some(session) => session
            .records()
            .iter()
            .map(|r| (r.range.as_range(), r.category))
            .collect(),
        None => app
            .lifecycle
            .project()
            .list_chunks()
            .iter()
            .map(|c| (c.range().as_range(), c.category()))
            .collect(),
    }
}

pub fn render_document(frame: &mut Frame, area: Rect, app: &mut App, theme: &Theme) {
    let is_focused = app.focus == PanelFocus::Document;
    let title = if app.lifecycle.session().is_some() { "Working copy" } else { "Document" };
    frame.render_widget(panel_block(title, is_focused, theme), area);

    let inner = inner_rect(area);
    app.follow_cursor();

    let text = app.display_text();
    let lines = app.lines();
    if lines.is_empty() {
        frame.render_widget(List::new([ListItem::new(Line::raw("(empty document)"))]), inner);
        return;
    }

    let spans = chunk_spans(app);
    let selected = app.selected_lines();
    let visible_start = app.doc_scroll.min(lines.len().saturating_sub(1));
    let visible_end = (visible_start + usize::from(inner.height)).min(lines.len());

    let items: Vec<ListItem> = lines[visible_start..visible_end]
        .iter()
        .enumerate()
        .map(|(offset, range)| {
            let index = visible_start + offset;
            let mut style = Style::default();
            if let Some((_, category)) = spans.iter().find(|(chunk, _)| covers(chunk, range)) {
                style = style.bg(theme.category(*category));
            }
            if selected.is_some_and(|(lo, hi)| (lo..=hi).contains(&index)) {
                style = style.bg(theme.selection);
            }
            if index == app.cursor && is_focused {
                style = style.bg(theme.cursor);
            }
            let number = Span::styled(
                format!("{:>4} ", index + 1),
                Style::default().fg(theme.line_number),
            );
            let body = Span::raw(text[range.clone()].to_owned());
            ListItem::new(Line::from(vec![number, body])).style(style)
        })
        .collect();

    frame.render_widget(List::new(items), inner);
}

#[cfg(test)]
mod tests {
    use super::covers;

    #[test]
    fn blank_lines_inside_a_chunk_are_covered() {
        assert!(covers(&(0..10), &(4..4)));
        assert!(covers(&(0..10), &(8..14)));
        assert!(!covers(&(0..10), &(10..12)));
        assert!(!covers(&(5..10), &(0..5)));
    }
}
