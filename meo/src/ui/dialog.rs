//! Modal dialogs drawn over the panels: the category, direction and lock
//! type pickers, the annotation box, the response editor and the quit
//! confirmation.
//!
//! Every dialog clears its area first so the panels underneath do not bleed
//! through.

use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Clear, List, ListItem, Paragraph, Wrap},
};

use meo_core::lifecycle::StateKind;

use crate::app::App;
use crate::theme::Theme;

fn modal<'a>(title: impl Into<Line<'a>>, theme: &Theme) -> Block<'a> {
    Block::bordered()
        .title(title)
        .border_style(Style::default().fg(theme.border_active))
}

fn modal_area(frame: &Frame, width: u16, height: u16) -> Rect {
    frame
        .area()
        .centered(Constraint::Percentage(width), Constraint::Length(height))
}

/// Picker for the current selection sub-state.
pub fn render_picker(frame: &mut Frame, app: &mut App, theme: &Theme) {
    let title = match app.kind() {
        StateKind::SelectingAction => " Mark as ",
        StateKind::SelectingDirection => " Direction ",
        StateKind::SelectingLockType => " Lock type ",
        _ => return,
    };
    let items = app.popup_items();
    let height = u16::try_from(items.len() * 2 + 2).unwrap_or(u16::MAX);
    let area = modal_area(frame, 60, height);
    frame.render_widget(Clear, area);

    let list_items: Vec<ListItem> = items
        .into_iter()
        .map(|item| {
            ListItem::new(vec![
                Line::from(Span::styled(item.label, Style::default().add_modifier(Modifier::BOLD))),
                Line::from(Span::styled(
                    format!("  {}", item.description),
                    Style::default().fg(theme.line_number),
                )),
            ])
        })
        .collect();

    let list = List::new(list_items)
        .block(modal(title, theme))
        .highlight_style(Style::default().fg(theme.border_active))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.popup_state);
}

/// Single text box used for both the annotation and the response editor.
pub fn render_input(frame: &mut Frame, app: &App, title: &str, hint: &str, theme: &Theme) {
    let lines = app.input.lines().count().max(1);
    let height = u16::try_from(lines + 4).unwrap_or(u16::MAX).min(frame.area().height);
    let area = modal_area(frame, 70, height);
    frame.render_widget(Clear, area);

    let mut text = Text::from(app.input.clone());
    // Block cursor after the last character.
    text.push_span(Span::styled(" ", Style::default().bg(theme.cursor)));
    text.push_line(Line::raw(""));
    text.push_line(Line::from(Span::styled(hint.to_owned(), Style::default().fg(theme.line_number))));

    let scroll = u16::try_from(lines.saturating_sub(usize::from(area.height.saturating_sub(4))))
        .unwrap_or(0);
    frame.render_widget(
        Paragraph::new(text)
            .block(modal(format!(" {title} "), theme))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        area,
    );
}

pub fn render_confirm_quit(frame: &mut Frame, theme: &Theme) {
    let area = modal_area(frame, 50, 5);
    frame.render_widget(Clear, area);
    let text = Text::from(vec![
        Line::raw("Processing is still running."),
        Line::raw("Quit anyway? Chunks not generated yet stay pending. (y/n)"),
    ]);
    frame.render_widget(
        Paragraph::new(text).block(modal(" Quit ", theme)).wrap(Wrap { trim: true }),
        area,
    );
}
