//! Right panel outside review: chunk details while editing, the progress
//! list while processing.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

fn field(name: &'static str, value: String, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{name:<11}"), Style::default().fg(theme.line_number)),
        Span::raw(value),
    ])
}

/// Details of the selected chunk: category, range, direction or lock type,
/// order, annotation and the captured text.
pub fn render_details(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let is_focused = app.focus == PanelFocus::Detail;
    frame.render_widget(panel_block("Details", is_focused, theme), area);
    let inner = inner_rect(area);

    let chunk = app
        .selected_row()
        .and_then(|row| app.lifecycle.project().chunk(&row.id).cloned());
    let Some(chunk) = chunk else {
        let hint = Text::from(vec![
            Line::raw("No chunk selected."),
            Line::raw(""),
            Line::raw(format!("{} chunks marked.", app.lifecycle.project().list_chunks().len())),
        ]);
        frame.render_widget(Paragraph::new(hint), inner);
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            chunk.id().to_string(),
            Style::default().fg(theme.category(chunk.category())).add_modifier(Modifier::BOLD),
        )),
        field("category", chunk.category().to_string(), theme),
        field("range", chunk.range().to_string(), theme),
    ];
    if let Some(preset_id) = chunk.direction_preset_id() {
        let name = app
            .lifecycle
            .presets()
            .get(preset_id)
            .map_or_else(|| preset_id.to_owned(), |p| p.name.clone());
        lines.push(field("direction", name, theme));
        lines.push(field("order", chunk.execution_order().to_string(), theme));
    }
    if let Some(lock_type) = chunk.lock_type() {
        lines.push(field("lock type", lock_type.to_string(), theme));
    }
    lines.push(field("outcome", chunk.outcome().to_string(), theme));
    if let Some(note) = chunk.annotation() {
        lines.push(field("note", note.to_owned(), theme));
    }
    lines.push(Line::raw(""));
    lines.extend(chunk.original_text().lines().map(|l| Line::raw(l.to_owned())));

    frame.render_widget(
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
        inner,
    );
}

/// One row per chunk reported by the worker, with its latest status.
pub fn render_progress(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let is_focused = app.focus == PanelFocus::Detail;
    let done = app
        .progress
        .iter()
        .filter(|row| !matches!(row.status, meo_core::processing::ChunkStatus::Started))
        .count();
    let title = format!("Progress {done}/{}", app.progress_total);
    frame.render_widget(panel_block(title, is_focused, theme), area);
    let inner = inner_rect(area);

    if app.progress.is_empty() {
        frame.render_widget(List::new([ListItem::new(Line::raw("Starting..."))]), inner);
        return;
    }

    let items: Vec<ListItem> = app
        .progress
        .iter()
        .map(|row| {
            let mut line = vec![
                Span::styled(
                    format!("{:<11}", row.status.label()),
                    Style::default().fg(theme.chunk_status(&row.status)),
                ),
                Span::raw(row.chunk_id.to_string()),
            ];
            if let Some(message) = row.status.message() {
                line.push(Span::styled(
                    format!("  {message}"),
                    Style::default().fg(theme.line_number),
                ));
            }
            ListItem::new(Line::from(line))
        })
        .collect();
    frame.render_widget(List::new(items), inner);
}
