//! Turns a [`ChunkDiff`] into styled lines for the diff panel.
//!
//! Every line is coloured as markdown with syntect. A removed line directly
//! followed by an added line is re-rendered as a word diff, with the words
//! that changed in bold.

use std::sync::LazyLock;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use similar::{ChangeTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;

use meo_core::ledger::{ChunkDiff, DiffLine};

use crate::theme::Theme;

static PS: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static TS: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const SYNTAX_THEME: &str = "base16-ocean.dark";

/// Rendered diff plus the line index of every `@@` header.
#[derive(Debug, Default)]
pub struct HighlightedDiff {
    pub lines: Vec<Line<'static>>,
    pub hunk_offsets: Vec<usize>,
}

/// Loads the syntax and theme sets ahead of the first diff.
pub fn warm_up() {
    let _ = &*PS;
    let _ = &*TS;
}

fn syntect_to_span(style: syntect::highlighting::Style, content: &str) -> Span<'static> {
    use syntect::highlighting::{Color as SC, FontStyle};
    let to_color = |c: SC| (c.a > 0).then_some(Color::Rgb(c.r, c.g, c.b));
    let mut ratatui_style = Style::default();
    if let Some(fg) = to_color(style.foreground) {
        ratatui_style = ratatui_style.fg(fg);
    }
    if style.font_style.contains(FontStyle::BOLD) {
        ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        ratatui_style = ratatui_style.add_modifier(Modifier::UNDERLINED);
    }
    Span::styled(content.to_owned(), ratatui_style)
}

fn syntect_spans(text: &str, h: Option<&mut HighlightLines>) -> Vec<Span<'static>> {
    let Some(h) = h else {
        return vec![Span::raw(text.to_owned())];
    };
    let spans: Vec<Span<'static>> = h
        .highlight_line(text, &PS)
        .unwrap_or_default()
        .into_iter()
        .map(|(style, piece)| syntect_to_span(style, piece))
        .collect();
    if spans.is_empty() {
        vec![Span::raw(text.to_owned())]
    } else {
        spans
    }
}

/// Word-level spans for a removed/added line pair: `(old, new)`.
pub fn word_diff_spans(
    old_line: &str,
    new_line: &str,
    theme: &Theme,
) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_spans = Vec::new();
    let mut new_spans = Vec::new();
    let tinted = |color: Color, emphasized: bool| {
        let style = Style::default().fg(color);
        if emphasized {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    };

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                match change.tag() {
                    ChangeTag::Delete => {
                        old_spans.push(Span::styled(text, tinted(theme.diff_removed, emphasized)));
                    }
                    ChangeTag::Insert => {
                        new_spans.push(Span::styled(text, tinted(theme.diff_added, emphasized)));
                    }
                    ChangeTag::Equal => {
                        let span = Span::styled(text, Style::default().fg(theme.diff_context));
                        old_spans.push(span.clone());
                        new_spans.push(span);
                    }
                }
            }
        }
    }
    (old_spans, new_spans)
}

fn gutter(line: &DiffLine, theme: &Theme) -> Span<'static> {
    let number = line.new_lineno.or(line.old_lineno);
    let text = number.map_or_else(|| "     ".to_owned(), |n| format!("{n:>4} "));
    Span::styled(text, Style::default().fg(theme.line_number))
}

fn marked(line: &DiffLine, body: Vec<Span<'static>>, theme: &Theme) -> Line<'static> {
    let marker = match line.origin {
        '+' => Span::styled("+ ", Style::default().fg(theme.diff_added)),
        '-' => Span::styled("- ", Style::default().fg(theme.diff_removed)),
        _ => Span::raw("  "),
    };
    let mut spans = vec![gutter(line, theme), marker];
    spans.extend(body);
    Line::from(spans)
}

pub fn highlight_diff(diff: &ChunkDiff, theme: &Theme) -> HighlightedDiff {
    let syntax_theme = TS.themes.get(SYNTAX_THEME).or_else(|| TS.themes.values().next());
    let syntax = PS
        .find_syntax_by_extension("md")
        .unwrap_or_else(|| PS.find_syntax_plain_text());

    let mut out = HighlightedDiff::default();
    for hunk in &diff.hunks {
        out.hunk_offsets.push(out.lines.len());
        out.lines.push(Line::from(Span::styled(
            hunk.header.clone(),
            Style::default().fg(theme.diff_hunk_header),
        )));

        // Fresh highlighter per hunk: parse state never leaks across hunks.
        let mut h = syntax_theme.map(|t| HighlightLines::new(syntax, t));
        let mut pending_removed: Option<&DiffLine> = None;

        for line in &hunk.lines {
            let base = syntect_spans(&line.content, h.as_mut());
            match line.origin {
                '-' => {
                    if let Some(prev) = pending_removed.take() {
                        let spans = syntect_spans(&prev.content, None);
                        out.lines.push(marked(prev, spans, theme));
                    }
                    pending_removed = Some(line);
                }
                '+' => {
                    if let Some(prev) = pending_removed.take() {
                        let (old, new) = word_diff_spans(&prev.content, &line.content, theme);
                        out.lines.push(marked(prev, old, theme));
                        out.lines.push(marked(line, new, theme));
                    } else {
                        out.lines.push(marked(line, base, theme));
                    }
                }
                _ => {
                    if let Some(prev) = pending_removed.take() {
                        let spans = syntect_spans(&prev.content, None);
                        out.lines.push(marked(prev, spans, theme));
                    }
                    out.lines.push(marked(line, base, theme));
                }
            }
        }
        if let Some(prev) = pending_removed.take() {
            let spans = syntect_spans(&prev.content, None);
            out.lines.push(marked(prev, spans, theme));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use meo_core::ledger::DiffHunk;
    use meo_core::types::ChunkId;

    fn text(spans: &[Span<'_>]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn line(origin: char, content: &str, old: Option<u32>, new: Option<u32>) -> DiffLine {
        DiffLine {
            origin,
            content: content.to_owned(),
            old_lineno: old,
            new_lineno: new,
        }
    }

    #[test]
    fn word_diff_keeps_both_sides_intact() {
        let theme = Theme::dark();
        let (old, new) = word_diff_spans("the quick fox", "the slow fox", &theme);
        assert_eq!(text(&old), "the quick fox");
        assert_eq!(text(&new), "the slow fox");
        assert!(old.iter().any(|s| s.style.fg == Some(theme.diff_removed)));
        assert!(new.iter().any(|s| s.style.fg == Some(theme.diff_added)));
    }

    #[test]
    fn hunks_render_header_then_paired_lines() {
        let theme = Theme::dark();
        let diff = ChunkDiff {
            chunk_id: ChunkId::from_sequence(1),
            hunks: vec![DiffHunk {
                header: "@@ -3,2 +3,2 @@".to_owned(),
                old_start: 3,
                new_start: 3,
                lines: vec![
                    line(' ', "# Title", Some(3), Some(3)),
                    line('-', "Hello world.", Some(4), None),
                    line('+', "Greetings, world!", None, Some(4)),
                ],
            }],
            added: 1,
            removed: 1,
        };

        let out = highlight_diff(&diff, &theme);
        assert_eq!(out.hunk_offsets, [0]);
        assert_eq!(out.lines.len(), 4);
        assert_eq!(text(&out.lines[0].spans), "@@ -3,2 +3,2 @@");
        assert!(text(&out.lines[1].spans).ends_with("# Title"));
        assert_eq!(text(&out.lines[2].spans), "   4 - Hello world.");
        assert_eq!(text(&out.lines[3].spans), "   4 + Greetings, world!");
    }

    #[test]
    fn trailing_removed_line_is_flushed() {
        let theme = Theme::dark();
        let diff = ChunkDiff {
            chunk_id: ChunkId::from_sequence(2),
            hunks: vec![DiffHunk {
                header: "@@ -1,1 +0,0 @@".to_owned(),
                old_start: 1,
                new_start: 0,
                lines: vec![line('-', "gone", Some(1), None)],
            }],
            added: 0,
            removed: 1,
        };
        let out = highlight_diff(&diff, &theme);
        assert_eq!(out.lines.len(), 2);
        assert_eq!(text(&out.lines[1].spans), "   1 - gone");
    }
}
