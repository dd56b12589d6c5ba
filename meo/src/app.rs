//! Application state for the editor TUI.
//!
//! `App` wraps the core [`Lifecycle`] and adds what only the terminal needs:
//! focus, the line cursor and selection, popup selection, scroll offsets and
//! the transient status line. Every change to chunks or outcomes goes through
//! [`App::dispatch`]; rendering only reads.

use std::ops::Range;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;

use meo_core::error::LifecycleError;
use meo_core::ledger::ChunkDiff;
use meo_core::lifecycle::{CoreEvent, Intent, Lifecycle, RunOutcome, StateKind};
use meo_core::processing::{ChunkStatus, ProcessingEvent};
use meo_core::sidecar;
use meo_core::types::{Category, ChunkId, LockType, Outcome, TextRange};

use crate::config::AgentConfig;
use crate::event::{self, AppEvent};
use crate::highlight::HighlightedDiff;

/// How long a status message stays up, in 250 ms ticks.
const STATUS_TICKS: u16 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    HelpOverlay,
    /// Quit requested while the worker is still running.
    ConfirmQuit,
    /// Multi-line editor over the current text of a reviewed chunk.
    EditResponse(ChunkId),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Left: chunk list.
    Chunks,
    /// Centre: the document.
    #[default]
    Document,
    /// Right: details, progress or diff.
    Detail,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::Chunks => PanelFocus::Detail,
            PanelFocus::Document => PanelFocus::Chunks,
            PanelFocus::Detail => PanelFocus::Document,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::Chunks => PanelFocus::Document,
            PanelFocus::Document => PanelFocus::Detail,
            PanelFocus::Detail => PanelFocus::Chunks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    ticks_left: u16,
}

/// One row of the processing progress list.
#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub chunk_id: ChunkId,
    pub status: ChunkStatus,
}

/// One entry of the chunk list, from the project while editing and from the
/// session while reviewing.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: ChunkId,
    pub category: Category,
    pub range: TextRange,
    pub outcome: Outcome,
    pub label: String,
    pub detail: String,
    pub error: Option<String>,
}

/// One choice in the selection popups.
#[derive(Debug, Clone)]
pub struct PopupItem {
    pub label: String,
    pub description: String,
}

pub struct App {
    pub lifecycle: Lifecycle,
    agent: AgentConfig,
    events: UnboundedSender<AppEvent>,

    pub mode: Mode,
    pub focus: PanelFocus,

    /// Cursor line in the document view.
    pub cursor: usize,
    /// First line of a line-wise selection in progress.
    pub selection_anchor: Option<usize>,
    pub doc_scroll: usize,

    pub chunk_list_state: ListState,
    pub popup_state: ListState,
    /// Annotation or response being typed.
    pub input: String,

    /// Diff of the selected chunk; `diff_dirty` asks the renderer to
    /// re-highlight it.
    pub current_diff: Option<ChunkDiff>,
    pub diff: HighlightedDiff,
    pub diff_dirty: bool,
    pub diff_scroll: usize,
    pub hunk_cursor: usize,

    pub progress: Vec<ProgressRow>,
    /// Chunks in the current run.
    pub progress_total: usize,
    pub status: Option<StatusMessage>,
    pub help_scroll: u16,

    pub doc_viewport_height: u16,
    pub chunks_viewport_height: u16,
    pub detail_viewport_height: u16,
    /// Outer rects of [chunks, document, detail] from the last frame.
    pub panel_rects: [Rect; 3],

    /// Width percentages of the three panels.
    pub left_pct: u16,
    pub center_pct: u16,
    pub right_pct: u16,
}

/// Byte ranges of the lines of `text`, without line terminators.
pub fn line_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            let end = if i > start && text.as_bytes()[i - 1] == b'\r' { i - 1 } else { i };
            ranges.push(start..end);
            start = i + 1;
        }
    }
    if start < text.len() {
        ranges.push(start..text.len());
    }
    ranges
}

/// The text range covered by lines `a..=b` (either order), with blank lines
/// at either end left out. `None` when every selected line is blank.
pub fn selection_range(lines: &[Range<usize>], a: usize, b: usize) -> Option<TextRange> {
    let (lo, hi) = (a.min(b), a.max(b));
    let selected = lines.get(lo..=hi)?;
    let first = selected.iter().find(|r| !r.is_empty())?;
    let last = selected.iter().rev().find(|r| !r.is_empty())?;
    TextRange::new(first.start, last.end).ok()
}

/// Index of the line containing byte `offset`.
pub fn line_of(lines: &[Range<usize>], offset: usize) -> usize {
    lines
        .iter()
        .position(|r| offset <= r.end)
        .unwrap_or_else(|| lines.len().saturating_sub(1))
}

impl App {
    pub fn new(lifecycle: Lifecycle, agent: AgentConfig, events: UnboundedSender<AppEvent>) -> Self {
        let mut app = Self {
            lifecycle,
            agent,
            events,
            mode: Mode::Normal,
            focus: PanelFocus::default(),
            cursor: 0,
            selection_anchor: None,
            doc_scroll: 0,
            chunk_list_state: ListState::default(),
            popup_state: ListState::default(),
            input: String::new(),
            current_diff: None,
            diff: HighlightedDiff::default(),
            diff_dirty: false,
            diff_scroll: 0,
            hunk_cursor: 0,
            progress: Vec::new(),
            progress_total: 0,
            status: None,
            help_scroll: 0,
            doc_viewport_height: 0,
            chunks_viewport_height: 0,
            detail_viewport_height: 0,
            panel_rects: [Rect::default(); 3],
            left_pct: 25,
            center_pct: 45,
            right_pct: 30,
        };
        if app.lifecycle.is_stale() {
            app.set_status(
                StatusLevel::Warning,
                "source changed since these chunks were marked; remove them before generating",
            );
        }
        match app.kind() {
            StateKind::Editing => {
                if let Some(id) = app.lifecycle.unfinished_session().filter(|_| app.status.is_none()) {
                    let text = format!("session {id} is unfinished: L resumes it");
                    app.set_status(StatusLevel::Info, text);
                }
            }
            kind => app.on_state_changed(kind),
        }
        app
    }

    pub fn kind(&self) -> StateKind {
        self.lifecycle.kind()
    }

    /// The text shown in the document view: the session's working copy while
    /// reviewing, the source document otherwise.
    pub fn display_text(&self) -> &str {
        match self.lifecycle.session() {
            Some(session) => session.working_text(),
            None => self.lifecycle.document(),
        }
    }

    pub fn lines(&self) -> Vec<Range<usize>> {
        line_ranges(self.display_text())
    }

    /// Rows for the chunk list, in document order.
    pub fn chunk_rows(&self) -> Vec<ChunkRow> {
        if let Some(session) = self.lifecycle.session() {
            let mut rows: Vec<ChunkRow> = session
                .records()
                .iter()
                .filter(|r| r.is_editable())
                .map(|r| ChunkRow {
                    id: r.id.clone(),
                    category: r.category,
                    range: r.range,
                    outcome: r.outcome,
                    label: preview(&r.id, r.current_text()),
                    detail: format!("#{}", r.execution_order),
                    error: r.error.clone(),
                })
                .collect();
            rows.sort_by_key(|r| r.range.start());
            return rows;
        }
        self.lifecycle
            .project()
            .list_chunks()
            .iter()
            .map(|c| {
                let detail = match (c.direction_preset_id(), c.lock_type()) {
                    (Some(preset), _) => format!("#{} {preset}", c.execution_order()),
                    (None, Some(lock)) => format!("{lock}"),
                    (None, None) => String::new(),
                };
                ChunkRow {
                    id: c.id().clone(),
                    category: c.category(),
                    range: c.range(),
                    outcome: c.outcome(),
                    label: c.display_name(),
                    detail,
                    error: None,
                }
            })
            .collect()
    }

    pub fn selected_row(&self) -> Option<ChunkRow> {
        let index = self.chunk_list_state.selected()?;
        self.chunk_rows().into_iter().nth(index)
    }

    /// Choices for the popup of the current selection sub-state.
    pub fn popup_items(&self) -> Vec<PopupItem> {
        match self.kind() {
            StateKind::SelectingAction => Category::ALL
                .into_iter()
                .map(|c| PopupItem {
                    label: c.label().to_owned(),
                    description: category_description(c).to_owned(),
                })
                .collect(),
            StateKind::SelectingLockType => LockType::ALL
                .into_iter()
                .map(|t| PopupItem {
                    label: t.label().to_owned(),
                    description: t.description().to_owned(),
                })
                .collect(),
            StateKind::SelectingDirection => self
                .pending_category()
                .map(|category| {
                    self.lifecycle
                        .presets()
                        .for_category(category)
                        .into_iter()
                        .map(|p| PopupItem {
                            label: p.name.clone(),
                            description: p.description.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn pending_category(&self) -> Option<Category> {
        self.lifecycle.state().pending().and_then(|p| p.category)
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Applies `intent` and folds the resulting events into the view. A
    /// rejected intent only shows up on the status line.
    pub fn dispatch(&mut self, intent: Intent) {
        let name = intent.name();
        match self.lifecycle.handle(intent) {
            Ok(events) => self.apply(events),
            Err(err) => self.report(name, &err),
        }
    }

    fn report(&mut self, intent: &str, err: &LifecycleError) {
        tracing::warn!(intent, error = %err, "intent rejected");
        self.set_status(StatusLevel::Error, err.to_string());
    }

    fn apply(&mut self, events: Vec<CoreEvent>) {
        let mut chunks_changed = false;
        for event in events {
            match event {
                CoreEvent::StateChanged(kind) => self.on_state_changed(kind),
                CoreEvent::ChunkListChanged => chunks_changed = true,
                CoreEvent::ProcessingProgress {
                    index,
                    total,
                    chunk_id,
                    status,
                } => {
                    self.progress_total = total;
                    self.on_progress(index, chunk_id, status);
                }
                CoreEvent::DiffAvailable(diff) => {
                    if self.selected_row().is_some_and(|row| row.id == diff.chunk_id) {
                        self.set_diff(Some(diff));
                    }
                }
            }
        }
        if chunks_changed {
            self.clamp_chunk_selection();
            self.save_sidecar();
        }
    }

    fn on_state_changed(&mut self, kind: StateKind) {
        match kind {
            StateKind::SelectingAction
            | StateKind::SelectingLockType
            | StateKind::SelectingDirection => {
                self.popup_state.select(Some(0));
            }
            StateKind::Annotating => self.input.clear(),
            StateKind::Editing => {
                self.selection_anchor = None;
                self.progress.clear();
                self.set_diff(None);
                self.clamp_cursor();
                self.clamp_chunk_selection();
            }
            StateKind::Processing => self.start_worker(),
            StateKind::Reviewing => {
                self.focus = PanelFocus::Chunks;
                self.chunk_list_state.select(Some(0));
                self.on_chunk_selected();
                self.report_last_run();
            }
            StateKind::Complete => {
                self.set_status(
                    StatusLevel::Info,
                    "every chunk decided: w writes the result back, c closes the session",
                );
            }
        }
    }

    fn start_worker(&mut self) {
        self.progress.clear();
        let (tx, rx) = crossbeam_channel::unbounded();
        let agent = crate::agent::build(&self.agent);
        if let Err(err) = self.lifecycle.start_processing(agent, tx) {
            let kind = self.kind();
            if kind != StateKind::Processing {
                self.on_state_changed(kind);
            }
            self.report("start processing", &err);
            return;
        }
        if let Err(err) = event::forward_processing(rx, self.events.clone()) {
            tracing::error!(error = %err, "cannot relay processing events");
            self.set_status(StatusLevel::Error, format!("cannot relay progress: {err}"));
        }
        self.set_status(StatusLevel::Info, "processing; c cancels after the current chunk");
    }

    fn on_progress(&mut self, index: usize, chunk_id: ChunkId, status: ChunkStatus) {
        if let Some(message) = status.message() {
            tracing::warn!(chunk_id = %chunk_id, status = status.label(), message, "chunk not generated");
        }
        if let Some(row) = self.progress.get_mut(index) {
            row.status = status;
        } else {
            self.progress.push(ProgressRow { chunk_id, status });
        }
    }

    fn report_last_run(&mut self) {
        match self.lifecycle.last_run() {
            Some(RunOutcome::Completed(report)) => {
                let level = if report.failed.is_empty() && report.pending.is_empty() {
                    StatusLevel::Info
                } else {
                    StatusLevel::Warning
                };
                let summary = report.summary();
                self.set_status(level, summary);
            }
            Some(RunOutcome::Aborted(err)) => {
                let text = format!("processing aborted: {err}");
                self.set_status(StatusLevel::Error, text);
            }
            None => {}
        }
    }

    /// Feeds a worker message into the lifecycle.
    pub fn on_processing_event(&mut self, event: ProcessingEvent) {
        match self.lifecycle.on_processing_event(event) {
            Ok(events) => self.apply(events),
            Err(err) => self.report("processing event", &err),
        }
    }

    /// EDITING: reopen the last session started for this document.
    pub fn resume_last_session(&mut self) {
        match self.lifecycle.project().last_session() {
            Some(id) => {
                let id = id.to_owned();
                self.dispatch(Intent::ResumeSession(id));
            }
            None => self.set_status(StatusLevel::Warning, "no earlier session for this document"),
        }
    }

    /// EDITING: confirm the selection (or the cursor line).
    pub fn confirm_selection(&mut self) {
        let lines = self.lines();
        let anchor = self.selection_anchor.unwrap_or(self.cursor);
        match selection_range(&lines, anchor, self.cursor) {
            Some(range) => self.dispatch(Intent::ConfirmSelection(range)),
            None => self.set_status(StatusLevel::Warning, "nothing to mark: the selection is blank"),
        }
    }

    /// Picks the highlighted popup entry.
    pub fn choose_popup(&mut self) {
        let index = self.popup_state.selected().unwrap_or(0);
        let intent = match self.kind() {
            StateKind::SelectingAction => Category::ALL.get(index).copied().map(Intent::ChooseCategory),
            StateKind::SelectingLockType => LockType::ALL.get(index).copied().map(Intent::ChooseLockType),
            StateKind::SelectingDirection => self.pending_category().and_then(|category| {
                self.lifecycle
                    .presets()
                    .for_category(category)
                    .get(index)
                    .map(|p| Intent::ChooseDirection(p.id.clone()))
            }),
            _ => None,
        };
        if let Some(intent) = intent {
            self.dispatch(intent);
        }
    }

    /// ANNOTATING: commit the chunk with the typed annotation, or none.
    pub fn submit_annotation(&mut self) {
        let text = std::mem::take(&mut self.input);
        let annotation = Some(text).filter(|t| !t.trim().is_empty());
        self.dispatch(Intent::SetAnnotation(annotation));
        if self.kind() == StateKind::Editing {
            self.selection_anchor = None;
        }
    }

    /// Opens the response editor on the selected chunk.
    pub fn begin_edit_response(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let current = self
            .lifecycle
            .session()
            .and_then(|s| s.record(&row.id))
            .map(|r| r.current_text().to_owned())
            .unwrap_or_default();
        self.input = current;
        self.mode = Mode::EditResponse(row.id);
    }

    pub fn submit_edit_response(&mut self) {
        if let Mode::EditResponse(id) = std::mem::replace(&mut self.mode, Mode::Normal) {
            let text = std::mem::take(&mut self.input);
            self.dispatch(Intent::EditResponse(id, text));
        }
    }

    /// Dispatches an intent that targets the selected chunk.
    pub fn on_selected(&mut self, intent: impl FnOnce(ChunkId) -> Intent) {
        match self.selected_row() {
            Some(row) => self.dispatch(intent(row.id)),
            None => self.set_status(StatusLevel::Warning, "no chunk selected"),
        }
    }

    /// Moves the selected chunk `delta` places in the processing order.
    pub fn shift_execution_order(&mut self, delta: i64) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let Some(current) = self.lifecycle.project().chunk(&row.id).map(|c| c.execution_order())
        else {
            return;
        };
        let order = (i64::from(current) + delta).clamp(0, i64::from(u32::MAX));
        // Clamped to u32 range above.
        let order = u32::try_from(order).unwrap_or(current);
        self.dispatch(Intent::SetExecutionOrder(row.id, order));
    }

    // -----------------------------------------------------------------------
    // Selection and diff
    // -----------------------------------------------------------------------

    pub fn toggle_selection(&mut self) {
        self.selection_anchor = match self.selection_anchor {
            Some(_) => None,
            None => Some(self.cursor),
        };
    }

    /// Lines `lo..=hi` of the selection in progress.
    pub fn selected_lines(&self) -> Option<(usize, usize)> {
        self.selection_anchor
            .map(|a| (a.min(self.cursor), a.max(self.cursor)))
    }

    /// Syncs the cursor and diff panel to the chunk-list selection.
    pub fn on_chunk_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            self.set_diff(None);
            return;
        };
        let lines = self.lines();
        self.cursor = line_of(&lines, row.range.start());
        let diff = self
            .lifecycle
            .session()
            .map(|session| session.diff_chunk(&row.id));
        match diff {
            Some(Ok(diff)) => self.set_diff(Some(diff)),
            Some(Err(err)) => {
                self.set_diff(None);
                self.set_status(StatusLevel::Error, format!("diff of {}: {err}", row.id));
            }
            None => self.set_diff(None),
        }
    }

    fn set_diff(&mut self, diff: Option<ChunkDiff>) {
        self.current_diff = diff;
        self.diff_dirty = true;
        self.diff_scroll = 0;
        self.hunk_cursor = 0;
    }

    fn clamp_chunk_selection(&mut self) {
        let len = self.chunk_rows().len();
        match (self.chunk_list_state.selected(), len) {
            (_, 0) => self.chunk_list_state.select(None),
            (Some(i), _) if i >= len => self.chunk_list_state.select(Some(len - 1)),
            (None, _) => self.chunk_list_state.select(Some(0)),
            _ => {}
        }
    }

    fn clamp_cursor(&mut self) {
        let count = self.lines().len();
        self.cursor = self.cursor.min(count.saturating_sub(1));
    }

    /// Keeps the cursor inside the document viewport.
    pub fn follow_cursor(&mut self) {
        let height = usize::from(self.doc_viewport_height.max(1));
        if self.cursor < self.doc_scroll {
            self.doc_scroll = self.cursor;
        } else if self.cursor >= self.doc_scroll + height {
            self.doc_scroll = self.cursor + 1 - height;
        }
    }

    pub fn save_sidecar(&mut self) {
        let lifecycle = &self.lifecycle;
        if let Err(err) = sidecar::save_sidecar(lifecycle.source(), lifecycle.project()) {
            tracing::error!(error = %err, "failed to save sidecar");
            self.set_status(StatusLevel::Error, format!("sidecar not saved: {err}"));
        }
    }

    // -----------------------------------------------------------------------
    // Status line
    // -----------------------------------------------------------------------

    pub fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            ticks_left: STATUS_TICKS,
        });
    }

    /// Ages the status message; errors stay until replaced.
    pub fn on_tick(&mut self) {
        if let Some(status) = &mut self.status {
            if status.level == StatusLevel::Error {
                return;
            }
            status.ticks_left = status.ticks_left.saturating_sub(1);
            if status.ticks_left == 0 {
                self.status = None;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Chunks => {
                self.chunk_list_state.scroll_down_by(lines);
                self.clamp_chunk_selection();
                self.on_chunk_selected();
            }
            PanelFocus::Document => {
                self.cursor = self.cursor.saturating_add(usize::from(lines));
                self.clamp_cursor();
            }
            PanelFocus::Detail => {
                let last = self.diff.lines.len().saturating_sub(1);
                self.diff_scroll = (self.diff_scroll + usize::from(lines)).min(last);
            }
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Chunks => {
                self.chunk_list_state.scroll_up_by(lines);
                self.on_chunk_selected();
            }
            PanelFocus::Document => {
                self.cursor = self.cursor.saturating_sub(usize::from(lines));
            }
            PanelFocus::Detail => {
                self.diff_scroll = self.diff_scroll.saturating_sub(usize::from(lines));
            }
        }
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::Chunks => {
                self.chunk_list_state.select_first();
                self.on_chunk_selected();
            }
            PanelFocus::Document => self.cursor = 0,
            PanelFocus::Detail => self.diff_scroll = 0,
        }
    }

    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::Chunks => {
                let len = self.chunk_rows().len();
                self.chunk_list_state.select(len.checked_sub(1));
                self.on_chunk_selected();
            }
            PanelFocus::Document => {
                self.cursor = self.lines().len().saturating_sub(1);
            }
            PanelFocus::Detail => {
                self.diff_scroll = self.diff.lines.len().saturating_sub(1);
            }
        }
    }

    fn viewport_height(&self) -> u16 {
        match self.focus {
            PanelFocus::Chunks => self.chunks_viewport_height,
            PanelFocus::Document => self.doc_viewport_height,
            PanelFocus::Detail => self.detail_viewport_height,
        }
    }

    pub fn half_page_down(&mut self) {
        self.scroll_down((self.viewport_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.viewport_height() / 2).max(1));
    }

    pub fn full_page_down(&mut self) {
        self.scroll_down(self.viewport_height().max(1));
    }

    pub fn full_page_up(&mut self) {
        self.scroll_up(self.viewport_height().max(1));
    }

    pub fn prev_hunk(&mut self) {
        if self.diff.hunk_offsets.is_empty() {
            return;
        }
        self.hunk_cursor = self.hunk_cursor.saturating_sub(1);
        self.diff_scroll = self.diff.hunk_offsets[self.hunk_cursor];
    }

    pub fn next_hunk(&mut self) {
        if self.diff.hunk_offsets.is_empty() {
            return;
        }
        self.hunk_cursor = (self.hunk_cursor + 1).min(self.diff.hunk_offsets.len() - 1);
        self.diff_scroll = self.diff.hunk_offsets[self.hunk_cursor];
    }

    pub fn popup_down(&mut self) {
        let len = self.popup_items().len();
        let next = self.popup_state.selected().map_or(0, |i| i + 1);
        if next < len {
            self.popup_state.select(Some(next));
        }
    }

    pub fn popup_up(&mut self) {
        let prev = self.popup_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.popup_state.select(Some(prev));
    }
}

fn category_description(category: Category) -> &'static str {
    match category {
        Category::Replace => "Rewrite toward an outcome",
        Category::Tweak => "Fix a specific issue, keep the wording",
        Category::Lock => "Keep verbatim; shown to the agent as context",
    }
}

fn preview(id: &ChunkId, text: &str) -> String {
    const PREVIEW: usize = 30;
    let mut short: String = text
        .chars()
        .take(PREVIEW)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if text.chars().count() > PREVIEW {
        short.push_str("...");
    }
    format!("{id}: {short}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use meo_core::lifecycle::Lifecycle;
    use meo_core::project::ProjectState;
    use meo_core::session::{SessionSettings, SessionStore};

    const DOC: &str = "# Title\n\nFirst paragraph.\n\nSecond paragraph\nwraps here.\n";

    fn app(dir: &tempfile::TempDir) -> App {
        let source = dir.path().join("doc.md");
        std::fs::write(&source, DOC).unwrap();
        let lifecycle = Lifecycle::new(
            &source,
            DOC.to_owned(),
            ProjectState::new("doc.md", DOC),
            crate::presets::builtin().unwrap(),
            SessionStore::new(dir.path().join("sessions")),
            SessionSettings::default(),
        );
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        App::new(lifecycle, AgentConfig::default(), tx)
    }

    #[test]
    fn line_ranges_exclude_terminators() {
        assert_eq!(line_ranges("a\nbc\r\n\nd"), [0..1, 2..4, 6..6, 7..8]);
        assert_eq!(line_ranges("x\n"), [0..1]);
        assert!(line_ranges("").is_empty());
    }

    #[test]
    fn selection_trims_blank_edge_lines() {
        let lines = line_ranges(DOC);
        let range = selection_range(&lines, 5, 1).unwrap();
        assert_eq!(range.slice(DOC), Some("First paragraph.\n\nSecond paragraph\nwraps here."));
        assert_eq!(selection_range(&lines, 1, 1), None);
        assert_eq!(selection_range(&lines, 9, 9), None);
    }

    #[test]
    fn line_of_maps_offsets_to_lines() {
        let lines = line_ranges(DOC);
        assert_eq!(line_of(&lines, 0), 0);
        assert_eq!(line_of(&lines, DOC.find("Second").unwrap()), 4);
        assert_eq!(line_of(&lines, DOC.len()), lines.len() - 1);
    }

    #[test]
    fn marking_a_chunk_walks_the_popups_and_saves_the_sidecar() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);

        app.cursor = 2;
        app.confirm_selection();
        assert_eq!(app.kind(), StateKind::SelectingAction);
        assert_eq!(app.popup_items().len(), 3);

        // Replace, then the second replace preset ("tighter").
        app.choose_popup();
        assert_eq!(app.kind(), StateKind::SelectingDirection);
        app.popup_down();
        app.choose_popup();
        assert_eq!(app.kind(), StateKind::Annotating);

        app.input.push_str("Keep the heading tone.");
        app.submit_annotation();
        assert_eq!(app.kind(), StateKind::Editing);

        let rows = app.chunk_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "chunk_001: First paragraph.");
        assert_eq!(rows[0].detail, "#0 tighter");

        let saved = sidecar::load_sidecar(&dir.path().join("doc.md")).unwrap().unwrap();
        let chunk = &saved.list_chunks()[0];
        assert_eq!(chunk.direction_preset_id(), Some("tighter"));
        assert_eq!(chunk.annotation(), Some("Keep the heading tone."));
    }

    #[test]
    fn overlapping_selection_is_reported_not_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        let start = DOC.find("First").unwrap();
        let range = TextRange::new(start, start + "First paragraph.".len()).unwrap();
        app.lifecycle.handle(Intent::ConfirmSelection(range)).unwrap();
        app.lifecycle.handle(Intent::ChooseCategory(Category::Lock)).unwrap();
        app.lifecycle.handle(Intent::ChooseLockType(LockType::Reference)).unwrap();
        app.lifecycle.handle(Intent::SetAnnotation(None)).unwrap();

        app.cursor = 2;
        app.confirm_selection();
        assert_eq!(app.kind(), StateKind::Editing);
        let status = app.status.as_ref().unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status.text.contains("overlaps chunk_001"));
    }

    #[test]
    fn generate_without_chunks_is_rejected_on_the_status_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        app.dispatch(Intent::Generate);
        assert_eq!(app.kind(), StateKind::Editing);
        assert_eq!(app.status.as_ref().unwrap().text, "no editable chunks to generate");
    }

    #[test]
    fn resume_without_an_earlier_session_warns() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        assert!(app.status.is_none());
        app.resume_last_session();
        assert_eq!(app.kind(), StateKind::Editing);
        let status = app.status.as_ref().unwrap();
        assert_eq!(status.level, StatusLevel::Warning);
        assert_eq!(status.text, "no earlier session for this document");
    }

    #[test]
    fn info_status_expires_but_errors_stay() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app(&dir);
        app.set_status(StatusLevel::Info, "hello");
        for _ in 0..STATUS_TICKS {
            app.on_tick();
        }
        assert!(app.status.is_none());

        app.set_status(StatusLevel::Error, "broken");
        for _ in 0..STATUS_TICKS {
            app.on_tick();
        }
        assert!(app.status.is_some());
    }
}
