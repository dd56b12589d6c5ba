//! Help overlay.
//!
//! A centred modal drawn over the panels inside the same `terminal.draw()`
//! closure; `Clear` erases the background first.

use ratatui::{
    Frame,
    layout::Constraint,
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Renders the help overlay, scrolled by `help_scroll` rows.
///
/// Skipped below 60 columns, where the overlay would have no usable area.
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));
    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Help  (j/k scroll, ? or Esc to dismiss) ")
        .border_style(ratatui::style::Style::default().fg(theme.border_active));

    frame.render_widget(
        Paragraph::new(build_help_text())
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((help_scroll, 0)),
        overlay_area,
    );
}

fn build_help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Move down / up one line"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Half page down / up"),
        Line::from("  Ctrl-f / b    Full page down / up"),
        Line::from("  Tab / S-Tab   Focus next / previous panel"),
        Line::from(""),
        Line::from("Marking chunks"),
        Line::from("  v             Start / drop a line selection"),
        Line::from("  Enter         Mark the selection (or the cursor line)"),
        Line::from("  x             Remove the selected chunk (chunk list)"),
        Line::from("  + / -         Move the selected chunk later / earlier"),
        Line::from("  R             Generate rewrites for every editable chunk"),
        Line::from("  L             Resume the last session for this document"),
        Line::from(""),
        Line::from("Processing"),
        Line::from("  c / Esc       Cancel after the current chunk"),
        Line::from(""),
        Line::from("Review"),
        Line::from("  a / d         Approve / deny the selected chunk"),
        Line::from("  e             Edit the response (Ctrl-s saves)"),
        Line::from("  [ / ]         Previous / next hunk"),
        Line::from("  R             Resume pending chunks"),
        Line::from("  U             Roll back the whole session"),
        Line::from("  w             Write the result to the source file"),
        Line::from("  c             Close the session"),
        Line::from(""),
        Line::from("General"),
        Line::from("  ?             Open / close this help"),
        Line::from("  q             Quit (asks while processing)"),
    ])
}
