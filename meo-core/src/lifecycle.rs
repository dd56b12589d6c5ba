//! The chunk lifecycle state machine.
//!
//! ```text
//! EDITING --confirm selection--> SELECTING_ACTION
//! SELECTING_ACTION --lock--> SELECTING_LOCK_TYPE --type--> ANNOTATING
//! SELECTING_ACTION --replace|tweak--> SELECTING_DIRECTION --preset--> ANNOTATING
//! ANNOTATING --submit/skip--> EDITING            (chunk committed)
//! any selection sub-state --cancel--> EDITING    (pending chunk dropped)
//! EDITING --generate--> PROCESSING --finished--> REVIEWING
//! EDITING --resume session--> REVIEWING          (reopen an earlier session)
//! PROCESSING --thread failed to start--> REVIEWING
//! REVIEWING --generate--> PROCESSING             (resume pending chunks)
//! REVIEWING --all decided--> COMPLETE
//! REVIEWING | COMPLETE --close--> EDITING
//! COMPLETE --write back--> EDITING
//! ```
//!
//! [`Lifecycle::handle`] is the only writer of chunk descriptors and of
//! chunk outcomes. A rejected intent returns an error and changes nothing.
//! The machine reports what changed through [`CoreEvent`]s and knows nothing
//! about rendering.

use std::fmt;
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;

use crate::agent::Agent;
use crate::error::LifecycleError;
use crate::ledger::ChunkDiff;
use crate::presets::PresetCatalog;
use crate::processing::{
    self, CancelFlag, ChunkStatus, ProcessingEvent, ProcessingReport, SpawnFailed,
};
use crate::project::ProjectState;
use crate::session::{Session, SessionSettings, SessionStatus, SessionStore};
use crate::types::{Category, ChunkId, LockType, NewChunk, TextRange};

/// A chunk being assembled by the selection sub-states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChunk {
    pub range: TextRange,
    pub category: Option<Category>,
    pub direction_preset_id: Option<String>,
    pub lock_type: Option<LockType>,
}

impl PendingChunk {
    fn new(range: TextRange) -> Self {
        Self {
            range,
            category: None,
            direction_preset_id: None,
            lock_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Editing,
    SelectingAction(PendingChunk),
    SelectingLockType(PendingChunk),
    SelectingDirection(PendingChunk),
    Annotating(PendingChunk),
    Processing,
    Reviewing,
    Complete,
}

impl LifecycleState {
    pub fn kind(&self) -> StateKind {
        match self {
            LifecycleState::Editing => StateKind::Editing,
            LifecycleState::SelectingAction(_) => StateKind::SelectingAction,
            LifecycleState::SelectingLockType(_) => StateKind::SelectingLockType,
            LifecycleState::SelectingDirection(_) => StateKind::SelectingDirection,
            LifecycleState::Annotating(_) => StateKind::Annotating,
            LifecycleState::Processing => StateKind::Processing,
            LifecycleState::Reviewing => StateKind::Reviewing,
            LifecycleState::Complete => StateKind::Complete,
        }
    }

    /// The chunk under construction, in the selection sub-states.
    pub fn pending(&self) -> Option<&PendingChunk> {
        match self {
            LifecycleState::SelectingAction(p)
            | LifecycleState::SelectingLockType(p)
            | LifecycleState::SelectingDirection(p)
            | LifecycleState::Annotating(p) => Some(p),
            _ => None,
        }
    }
}

/// Payload-free discriminant of [`LifecycleState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Editing,
    SelectingAction,
    SelectingLockType,
    SelectingDirection,
    Annotating,
    Processing,
    Reviewing,
    Complete,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StateKind::Editing => "editing",
            StateKind::SelectingAction => "selecting an action",
            StateKind::SelectingLockType => "selecting a lock type",
            StateKind::SelectingDirection => "selecting a direction",
            StateKind::Annotating => "annotating",
            StateKind::Processing => "processing",
            StateKind::Reviewing => "reviewing",
            StateKind::Complete => "complete",
        })
    }
}

/// User requests the machine understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ConfirmSelection(TextRange),
    ChooseCategory(Category),
    ChooseDirection(String),
    ChooseLockType(LockType),
    /// Submit (`Some`) or skip (`None`) the annotation.
    SetAnnotation(Option<String>),
    /// Drops a pending chunk, or requests cancellation while processing.
    Cancel,
    RemoveChunk(ChunkId),
    SetExecutionOrder(ChunkId, u32),
    Generate,
    /// Reopens the stored session with this id for review.
    ResumeSession(String),
    Approve(ChunkId),
    Deny(ChunkId),
    EditResponse(ChunkId, String),
    RollbackSession,
    Close,
    WriteBack,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ConfirmSelection(_) => "confirm selection",
            Intent::ChooseCategory(_) => "choose category",
            Intent::ChooseDirection(_) => "choose direction",
            Intent::ChooseLockType(_) => "choose lock type",
            Intent::SetAnnotation(_) => "set annotation",
            Intent::Cancel => "cancel",
            Intent::RemoveChunk(_) => "remove chunk",
            Intent::SetExecutionOrder(..) => "set execution order",
            Intent::Generate => "generate",
            Intent::ResumeSession(_) => "resume session",
            Intent::Approve(_) => "approve",
            Intent::Deny(_) => "deny",
            Intent::EditResponse(..) => "edit response",
            Intent::RollbackSession => "rollback session",
            Intent::Close => "close",
            Intent::WriteBack => "write back",
        }
    }
}

/// Notifications for whoever renders the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    StateChanged(StateKind),
    ChunkListChanged,
    ProcessingProgress {
        index: usize,
        total: usize,
        chunk_id: ChunkId,
        status: ChunkStatus,
    },
    DiffAvailable(ChunkDiff),
}

/// How the last processing run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ProcessingReport),
    Aborted(String),
}

/// State machine over one document, its chunk set and its active session.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    source: PathBuf,
    document: String,
    project: ProjectState,
    presets: PresetCatalog,
    store: SessionStore,
    settings: SessionSettings,
    session: Option<Session>,
    cancel: Option<CancelFlag>,
    last_run: Option<RunOutcome>,
}

impl Lifecycle {
    /// Starts in EDITING over `document` (the contents of `source`).
    ///
    /// A project whose hash no longer matches but whose chunks still capture
    /// the same text is rebased onto the new snapshot.
    pub fn new(
        source: impl Into<PathBuf>,
        document: String,
        mut project: ProjectState,
        presets: PresetCatalog,
        store: SessionStore,
        settings: SessionSettings,
    ) -> Self {
        if project.is_stale(&document) && project.rebase(&document).is_ok() {
            tracing::info!(chunks = project.list_chunks().len(), "chunks rebased onto changed source");
        }
        Self {
            state: LifecycleState::Editing,
            source: source.into(),
            document,
            project,
            presets,
            store,
            settings,
            session: None,
            cancel: None,
            last_run: None,
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// The active session, unless it is out on the processing thread.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_run(&self) -> Option<&RunOutcome> {
        self.last_run.as_ref()
    }

    /// The last session started for this document, if it is still stored
    /// and not yet complete.
    pub fn unfinished_session(&self) -> Option<&str> {
        let id = self.project.last_session()?;
        match self.store.meta(id) {
            Ok(meta) if meta.status != SessionStatus::Complete => Some(id),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(session_id = id, error = %err, "last session unavailable");
                None
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.project.is_stale(&self.document)
    }

    fn reject(&self, intent: &Intent) -> LifecycleError {
        LifecycleError::InvalidIntent {
            state: self.kind(),
            intent: intent.name(),
        }
    }

    fn enter(&mut self, next: LifecycleState, events: &mut Vec<CoreEvent>) {
        let kind = next.kind();
        if kind != self.kind() {
            tracing::debug!(from = %self.kind(), to = %kind, "state change");
            events.push(CoreEvent::StateChanged(kind));
        }
        self.state = next;
    }

    /// Applies `intent` to the current state.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidIntent`] when the intent makes no sense in
    /// the current state, or the model/session error that rejected it. The
    /// state is unchanged on error.
    pub fn handle(&mut self, intent: Intent) -> Result<Vec<CoreEvent>, LifecycleError> {
        let mut events = Vec::new();
        match (&self.state, &intent) {
            (LifecycleState::Editing, Intent::ConfirmSelection(range)) => {
                self.project.check_range(&self.document, *range)?;
                let next = LifecycleState::SelectingAction(PendingChunk::new(*range));
                self.enter(next, &mut events);
            }
            (LifecycleState::SelectingAction(p), Intent::ChooseCategory(category)) => {
                let mut p = p.clone();
                p.category = Some(*category);
                let next = match category {
                    Category::Lock => LifecycleState::SelectingLockType(p),
                    Category::Replace | Category::Tweak => LifecycleState::SelectingDirection(p),
                };
                self.enter(next, &mut events);
            }
            (LifecycleState::SelectingLockType(p), Intent::ChooseLockType(lock_type)) => {
                let mut p = p.clone();
                p.lock_type = Some(*lock_type);
                self.enter(LifecycleState::Annotating(p), &mut events);
            }
            (LifecycleState::SelectingDirection(p), Intent::ChooseDirection(preset_id)) => {
                let category = p.category.unwrap_or(Category::Replace);
                let preset = self
                    .presets
                    .get(preset_id)
                    .ok_or_else(|| LifecycleError::UnknownPreset(preset_id.clone()))?;
                if !preset.applies_to(category) {
                    return Err(LifecycleError::PresetNotApplicable {
                        preset: preset_id.clone(),
                        category,
                    });
                }
                let mut p = p.clone();
                p.direction_preset_id = Some(preset_id.clone());
                self.enter(LifecycleState::Annotating(p), &mut events);
            }
            (LifecycleState::Annotating(p), Intent::SetAnnotation(annotation)) => {
                let spec = NewChunk {
                    range: p.range,
                    category: p.category.unwrap_or(Category::Lock),
                    direction_preset_id: p.direction_preset_id.clone(),
                    lock_type: p.lock_type,
                    annotation: annotation.clone().filter(|a| !a.trim().is_empty()),
                };
                let id = self.project.add_chunk(&self.document, spec)?.id().clone();
                tracing::info!(chunk_id = %id, "chunk committed");
                events.push(CoreEvent::ChunkListChanged);
                self.enter(LifecycleState::Editing, &mut events);
            }
            (
                LifecycleState::SelectingAction(_)
                | LifecycleState::SelectingLockType(_)
                | LifecycleState::SelectingDirection(_)
                | LifecycleState::Annotating(_),
                Intent::Cancel,
            ) => self.enter(LifecycleState::Editing, &mut events),
            (LifecycleState::Editing, Intent::Cancel) => {}
            (LifecycleState::Processing, Intent::Cancel) => {
                if let Some(flag) = &self.cancel {
                    flag.cancel();
                }
            }
            (LifecycleState::Editing, Intent::RemoveChunk(id)) => {
                self.project.remove_chunk(id)?;
                if self.project.list_chunks().is_empty() {
                    self.project.reset_for(&self.document);
                }
                events.push(CoreEvent::ChunkListChanged);
            }
            (LifecycleState::Editing, Intent::SetExecutionOrder(id, order)) => {
                self.project.set_execution_order(id, *order)?;
                events.push(CoreEvent::ChunkListChanged);
            }
            (LifecycleState::Editing, Intent::Generate) => {
                self.check_generate()?;
                let session = self.store.create(
                    &self.source,
                    &self.document,
                    &self.project,
                    &self.presets,
                    self.settings,
                )?;
                self.project.set_last_session(session.id());
                self.session = Some(session);
                self.sync_outcomes();
                events.push(CoreEvent::ChunkListChanged);
                self.enter(LifecycleState::Processing, &mut events);
            }
            (LifecycleState::Editing, Intent::ResumeSession(id)) => {
                let session = self.store.open(id)?;
                events.extend(self.resume(session)?);
            }
            (LifecycleState::Reviewing, Intent::Generate) => {
                let session = self.session.as_ref().ok_or(LifecycleError::NoSession)?;
                if session.pending_chunks().is_empty() {
                    return Err(LifecycleError::NothingPending);
                }
                self.enter(LifecycleState::Processing, &mut events);
            }
            (LifecycleState::Reviewing | LifecycleState::Complete, Intent::Approve(id)) => {
                self.review(id, &mut events, |s| s.approve(id))?;
            }
            (LifecycleState::Reviewing | LifecycleState::Complete, Intent::Deny(id)) => {
                self.review(id, &mut events, |s| s.deny(id))?;
            }
            (LifecycleState::Reviewing, Intent::EditResponse(id, text)) => {
                self.review(id, &mut events, |s| s.edit_response(id, text))?;
            }
            (LifecycleState::Reviewing | LifecycleState::Complete, Intent::RollbackSession) => {
                let session = self.session.as_mut().ok_or(LifecycleError::NoSession)?;
                session.rollback_session()?;
                let editable: Vec<ChunkId> = session
                    .records()
                    .iter()
                    .filter(|r| r.is_editable())
                    .map(|r| r.id.clone())
                    .collect();
                for id in &editable {
                    events.push(CoreEvent::DiffAvailable(session.diff_chunk(id)?));
                }
                self.sync_outcomes();
                events.push(CoreEvent::ChunkListChanged);
                self.settle(&mut events)?;
            }
            (LifecycleState::Reviewing | LifecycleState::Complete, Intent::Close) => {
                self.session = None;
                self.enter(LifecycleState::Editing, &mut events);
            }
            (LifecycleState::Complete, Intent::WriteBack) => {
                let session = self.session.take().ok_or(LifecycleError::NoSession)?;
                if let Err(err) = session.write_back() {
                    self.session = Some(session);
                    return Err(err.into());
                }
                self.document = session.working_text().to_owned();
                self.project.reset_for(&self.document);
                events.push(CoreEvent::ChunkListChanged);
                self.enter(LifecycleState::Editing, &mut events);
            }
            _ => return Err(self.reject(&intent)),
        }
        Ok(events)
    }

    /// Adopts a session reopened from the store and enters REVIEWING, or
    /// COMPLETE when every chunk is already decided. A session left
    /// mid-run is treated as interrupted; its pending chunks can be
    /// generated again.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidIntent`] outside EDITING,
    /// [`LifecycleError::ForeignSession`] for a session over another file,
    /// [`LifecycleError::SessionOutdated`] when the source no longer matches
    /// the session's snapshot, and storage errors from saving its status.
    pub fn resume(&mut self, mut session: Session) -> Result<Vec<CoreEvent>, LifecycleError> {
        if self.state != LifecycleState::Editing {
            return Err(LifecycleError::InvalidIntent {
                state: self.kind(),
                intent: "resume session",
            });
        }
        if session.meta().source_file != self.source {
            return Err(LifecycleError::ForeignSession {
                session: session.id().to_owned(),
                source_file: session.meta().source_file.clone(),
            });
        }
        if session.ledger().original() != self.document {
            return Err(LifecycleError::SessionOutdated(session.id().to_owned()));
        }
        if session.status() != SessionStatus::Complete {
            session.set_status(SessionStatus::Reviewing)?;
        }
        tracing::info!(
            session_id = %session.id(),
            pending = session.pending_chunks().len(),
            "session resumed"
        );

        let mut events = Vec::new();
        self.project.set_last_session(session.id());
        self.session = Some(session);
        self.sync_outcomes();
        events.push(CoreEvent::ChunkListChanged);
        self.enter(LifecycleState::Reviewing, &mut events);
        self.settle(&mut events)?;
        Ok(events)
    }

    /// Guard for EDITING --generate-->.
    fn check_generate(&self) -> Result<(), LifecycleError> {
        if self.is_stale() {
            return Err(LifecycleError::StaleSource);
        }
        let editable = self.project.editable_chunks();
        if editable.is_empty() {
            return Err(LifecycleError::NothingToGenerate);
        }
        for chunk in editable {
            let preset_id = chunk.direction_preset_id().unwrap_or_default();
            let preset = self
                .presets
                .get(preset_id)
                .ok_or_else(|| LifecycleError::UnknownPreset(preset_id.to_owned()))?;
            if !preset.applies_to(chunk.category()) {
                return Err(LifecycleError::PresetNotApplicable {
                    preset: preset_id.to_owned(),
                    category: chunk.category(),
                });
            }
        }
        Ok(())
    }

    fn review(
        &mut self,
        id: &ChunkId,
        events: &mut Vec<CoreEvent>,
        op: impl FnOnce(&mut Session) -> Result<(), crate::error::SessionError>,
    ) -> Result<(), LifecycleError> {
        let session = self.session.as_mut().ok_or(LifecycleError::NoSession)?;
        op(session)?;
        let diff = session.diff_chunk(id)?;
        self.sync_outcomes();
        events.push(CoreEvent::DiffAvailable(diff));
        events.push(CoreEvent::ChunkListChanged);
        self.settle(events)
    }

    /// REVIEWING --all decided--> COMPLETE.
    fn settle(&mut self, events: &mut Vec<CoreEvent>) -> Result<(), LifecycleError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if self.state == LifecycleState::Reviewing && session.all_decided() {
            session.set_status(SessionStatus::Complete)?;
            self.enter(LifecycleState::Complete, events);
        }
        Ok(())
    }

    /// Copies session outcomes onto the project chunks.
    fn sync_outcomes(&mut self) {
        if let Some(session) = &self.session {
            for record in session.records() {
                self.project.record_outcome(&record.id, record.outcome);
            }
        }
    }

    /// Moves the session onto a processing thread. Call after `generate`
    /// has put the machine into PROCESSING; feed every event the thread
    /// sends back into [`Lifecycle::on_processing_event`].
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidIntent`] outside PROCESSING,
    /// [`LifecycleError::AlreadyProcessing`] if a worker already holds the
    /// session, and [`LifecycleError::Spawn`] if the thread cannot start. In
    /// that last case the machine has already left PROCESSING; check
    /// [`Lifecycle::kind`].
    pub fn start_processing(
        &mut self,
        agent: Box<dyn Agent>,
        events: Sender<ProcessingEvent>,
    ) -> Result<CancelFlag, LifecycleError> {
        if self.state != LifecycleState::Processing {
            return Err(LifecycleError::InvalidIntent {
                state: self.kind(),
                intent: "start processing",
            });
        }
        if self.cancel.is_some() {
            return Err(LifecycleError::AlreadyProcessing);
        }
        let session = self.session.take().ok_or(LifecycleError::NoSession)?;
        let cancel = CancelFlag::new();
        match processing::spawn(session, agent, events, cancel.clone()) {
            Ok(_) => {
                self.cancel = Some(cancel.clone());
                Ok(cancel)
            }
            Err(failed) => Err(self.spawn_failed(failed)),
        }
    }

    /// Leaves PROCESSING after the worker failed to start: back to REVIEWING
    /// with the session restored, or to EDITING if it was lost.
    fn spawn_failed(&mut self, failed: SpawnFailed) -> LifecycleError {
        tracing::error!(error = %failed.error, "processing thread did not start");
        self.session = failed.session.map(|session| *session);
        self.state = match self.session.as_mut() {
            Some(session) => {
                if let Err(err) = session.set_status(SessionStatus::Reviewing) {
                    tracing::warn!(error = %err, "cannot record session status");
                }
                LifecycleState::Reviewing
            }
            None => LifecycleState::Editing,
        };
        LifecycleError::Spawn(failed.error)
    }

    /// Folds a worker event into the machine.
    ///
    /// Progress passes straight through as [`CoreEvent::ProcessingProgress`].
    /// `Finished` takes the session back, records the run outcome and moves
    /// to REVIEWING (or COMPLETE when nothing is left to decide).
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidIntent`] for a `Finished` event outside
    /// PROCESSING.
    pub fn on_processing_event(
        &mut self,
        event: ProcessingEvent,
    ) -> Result<Vec<CoreEvent>, LifecycleError> {
        let mut events = Vec::new();
        match event {
            ProcessingEvent::Progress {
                index,
                total,
                chunk_id,
                status,
            } => events.push(CoreEvent::ProcessingProgress {
                index,
                total,
                chunk_id,
                status,
            }),
            ProcessingEvent::Finished { session, result } => {
                if self.state != LifecycleState::Processing {
                    return Err(LifecycleError::InvalidIntent {
                        state: self.kind(),
                        intent: "finish processing",
                    });
                }
                self.session = Some(*session);
                self.cancel = None;
                self.last_run = Some(match result {
                    Ok(report) => RunOutcome::Completed(report),
                    Err(err) => RunOutcome::Aborted(err.to_string()),
                });
                self.sync_outcomes();
                events.push(CoreEvent::ChunkListChanged);
                self.enter(LifecycleState::Reviewing, &mut events);
                self.settle(&mut events)?;
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Hello world. Goodbye world.";
    const PRESETS: &str = r#"
[[preset]]
id = "richer"
name = "Richer"
prompt_template = "Add texture and detail."
categories = ["replace"]
"#;

    fn generating(dir: &tempfile::TempDir) -> Lifecycle {
        let source = dir.path().join("doc.md");
        std::fs::write(&source, DOC).unwrap();
        let mut project = ProjectState::new("doc.md", DOC);
        let range = TextRange::new(0, 12).unwrap();
        project.add_chunk(DOC, NewChunk::replace(range, "richer")).unwrap();
        let mut lc = Lifecycle::new(
            source,
            DOC.to_owned(),
            project,
            PresetCatalog::from_toml(PRESETS).unwrap(),
            SessionStore::new(dir.path().join("sessions")),
            SessionSettings::default(),
        );
        lc.handle(Intent::Generate).unwrap();
        lc
    }

    #[test]
    fn failed_spawn_returns_to_review_with_the_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut lc = generating(&dir);
        let session = lc.session.take().unwrap();

        let err = lc.spawn_failed(SpawnFailed {
            error: std::io::Error::other("no threads left"),
            session: Some(Box::new(session)),
        });
        assert!(matches!(err, LifecycleError::Spawn(_)));
        assert_eq!(lc.kind(), StateKind::Reviewing);
        assert!(lc.cancel.is_none());
        let session = lc.session().unwrap();
        assert_eq!(session.status(), SessionStatus::Reviewing);
        assert_eq!(session.pending_chunks().len(), 1);

        // Generation can be retried.
        let events = lc.handle(Intent::Generate).unwrap();
        assert_eq!(events, [CoreEvent::StateChanged(StateKind::Processing)]);
    }

    #[test]
    fn failed_spawn_without_session_returns_to_editing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut lc = generating(&dir);
        lc.session = None;

        lc.spawn_failed(SpawnFailed {
            error: std::io::Error::other("no threads left"),
            session: None,
        });
        assert_eq!(lc.kind(), StateKind::Editing);
        assert!(lc.handle(Intent::ConfirmSelection(TextRange::new(13, 27).unwrap())).is_ok());
    }
}
