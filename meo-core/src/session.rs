//! Processing sessions and the store that holds them.
//!
//! A session directory looks like:
//!
//! ```text
//! <root>/<stem>_<YYYYMMDD_HHMMSS>/
//!     session.toml     metadata + per-chunk records
//!     original.md      frozen snapshot
//!     working.md       patched copy (tracked in .git)
//!     chunks/<id>.md   one task artifact per editable chunk
//!     tasks/<id>.md    the artifact as first rendered, used to rebuild it
//!     .git/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, SessionError, StorageError};
use crate::ledger::{ChunkDiff, ChunkRecord, Revision, RevisionLedger};
use crate::patch::MatchPolicy;
use crate::presets::PresetCatalog;
use crate::project::ProjectState;
use crate::protocol::{self, ContextVisibility, DecodedArtifact};
use crate::sidecar::write_atomic;
use crate::types::{ChunkId, Outcome};

pub const SESSION_FILE: &str = "session.toml";
pub const CHUNKS_DIR: &str = "chunks";
pub const TASKS_DIR: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Directory and repository being set up.
    Creating,
    /// The processing worker owns the session.
    Generating,
    /// Artifacts written, waiting for processing.
    Editing,
    Reviewing,
    Complete,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Creating => "creating",
            SessionStatus::Generating => "generating",
            SessionStatus::Editing => "editing",
            SessionStatus::Reviewing => "reviewing",
            SessionStatus::Complete => "complete",
        }
    }
}

/// Knobs fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub visibility: ContextVisibility,
    pub policy: MatchPolicy,
}

/// The `[session]` table of `session.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionMeta {
    pub id: String,
    pub source_file: PathBuf,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub context_visibility: ContextVisibility,
    pub policy: MatchPolicy,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionRecord {
    session: SessionMeta,
    #[serde(rename = "chunk", default)]
    chunks: Vec<ChunkRecord>,
}

/// An open session: its metadata plus the revision ledger.
#[derive(Debug)]
pub struct Session {
    meta: SessionMeta,
    dir: PathBuf,
    ledger: RevisionLedger,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn status(&self) -> SessionStatus {
        self.meta.status
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger(&self) -> &RevisionLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[ChunkRecord] {
        self.ledger.records()
    }

    pub fn record(&self, id: &ChunkId) -> Option<&ChunkRecord> {
        self.ledger.record(id)
    }

    pub fn working_text(&self) -> &str {
        self.ledger.working()
    }

    pub fn artifact_path(&self, id: &ChunkId) -> PathBuf {
        self.dir.join(CHUNKS_DIR).join(format!("{id}.md"))
    }

    fn task_path(&self, id: &ChunkId) -> PathBuf {
        self.dir.join(TASKS_DIR).join(format!("{id}.md"))
    }

    /// Rewrites `chunks/<id>.md` from its pristine copy unless the file on
    /// disk still decodes as the task for `id`. Returns whether it did.
    ///
    /// # Errors
    ///
    /// [`StorageError`] when the pristine copy cannot be read or the artifact
    /// cannot be written.
    pub fn restore_artifact(&self, id: &ChunkId) -> Result<bool, SessionError> {
        let path = self.artifact_path(id);
        let intact = fs::read_to_string(&path)
            .ok()
            .and_then(|text| protocol::decode(&text).ok())
            .is_some_and(|decoded| &decoded.chunk_id == id);
        if intact {
            return Ok(false);
        }
        let task = self.task_path(id);
        let text = fs::read_to_string(&task).map_err(|e| StorageError::io(&task, e))?;
        write_atomic(&path, text.as_bytes())?;
        tracing::warn!(session_id = %self.meta.id, chunk_id = %id, "task artifact rebuilt");
        Ok(true)
    }

    /// Editable chunks still awaiting a response, in execution order.
    pub fn pending_chunks(&self) -> Vec<ChunkId> {
        let mut pending: Vec<&ChunkRecord> = self
            .records()
            .iter()
            .filter(|r| r.is_editable() && r.outcome == Outcome::Pending)
            .collect();
        pending.sort_by(|a, b| (a.execution_order, &a.id).cmp(&(b.execution_order, &b.id)));
        pending.into_iter().map(|r| r.id.clone()).collect()
    }

    /// True once every editable chunk is approved or denied.
    pub fn all_decided(&self) -> bool {
        let mut editable = self.records().iter().filter(|r| r.is_editable()).peekable();
        editable.peek().is_some() && editable.all(|r| r.outcome.is_decided())
    }

    /// Reads and decodes the task artifact of chunk `id`.
    ///
    /// # Errors
    ///
    /// [`StorageError`] when unreadable, [`crate::error::ProtocolError`] when
    /// malformed.
    pub fn read_artifact(&self, id: &ChunkId) -> Result<DecodedArtifact, SessionError> {
        let path = self.artifact_path(id);
        let text = fs::read_to_string(&path).map_err(|e| StorageError::io(path, e))?;
        Ok(protocol::decode(&text)?)
    }

    /// Writes `session.toml`, bumping `updated_at`.
    ///
    /// # Errors
    ///
    /// Serialization or write failure.
    pub fn save(&mut self) -> Result<(), SessionError> {
        self.meta.updated_at = Utc::now();
        let record = SessionRecord {
            session: self.meta.clone(),
            chunks: self.ledger.records().to_vec(),
        };
        let text = toml::to_string_pretty(&record).map_err(StorageError::from)?;
        write_atomic(&self.dir.join(SESSION_FILE), text.as_bytes())?;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates [`Session::save`] failures.
    pub fn set_status(&mut self, status: SessionStatus) -> Result<(), SessionError> {
        if self.meta.status != status {
            tracing::info!(
                session_id = %self.meta.id,
                from = self.meta.status.label(),
                to = status.label(),
                "session status"
            );
        }
        self.meta.status = status;
        self.save()
    }

    /// Runs a ledger operation and persists the records whether or not it
    /// succeeded; failed operations may still record per-chunk errors.
    fn persist<T>(
        &mut self,
        op: impl FnOnce(&mut RevisionLedger) -> Result<T, LedgerError>,
    ) -> Result<T, SessionError> {
        let result = op(&mut self.ledger);
        self.save()?;
        Ok(result?)
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::commit_chunk`].
    pub fn commit_chunk(&mut self, id: &ChunkId, response: &str) -> Result<(), SessionError> {
        self.persist(|l| l.commit_chunk(id, response))
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::mark_pending`].
    pub fn mark_pending(&mut self, id: &ChunkId, message: &str) -> Result<(), SessionError> {
        self.persist(|l| l.mark_pending(id, message))
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::approve`].
    pub fn approve(&mut self, id: &ChunkId) -> Result<(), SessionError> {
        self.persist(|l| l.approve(id))
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::deny`].
    pub fn deny(&mut self, id: &ChunkId) -> Result<(), SessionError> {
        self.persist(|l| l.deny(id))
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::edit_response`].
    pub fn edit_response(&mut self, id: &ChunkId, text: &str) -> Result<(), SessionError> {
        self.persist(|l| l.edit_response(id, text))
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::rollback_session`].
    pub fn rollback_session(&mut self) -> Result<(), SessionError> {
        self.persist(RevisionLedger::rollback_session)
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::diff_chunk`].
    pub fn diff_chunk(&self, id: &ChunkId) -> Result<ChunkDiff, SessionError> {
        Ok(self.ledger.diff_chunk(id)?)
    }

    /// # Errors
    ///
    /// See [`RevisionLedger::history`].
    pub fn history(&self) -> Result<Vec<Revision>, SessionError> {
        Ok(self.ledger.history()?)
    }

    /// Overwrites the source document with the working copy.
    ///
    /// # Errors
    ///
    /// [`StorageError`] if the source file cannot be written.
    pub fn write_back(&self) -> Result<(), SessionError> {
        write_atomic(&self.meta.source_file, self.ledger.working().as_bytes())?;
        tracing::info!(
            session_id = %self.meta.id,
            path = %self.meta.source_file.display(),
            "working copy written back"
        );
        Ok(())
    }
}

/// Directory holding every session of a workspace.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, id: &str) -> Result<PathBuf, SessionError> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\']);
        if !valid {
            return Err(SessionError::InvalidId(id.to_owned()));
        }
        Ok(self.root.join(id))
    }

    fn unique_id(&self, stem: &str) -> String {
        let base = format!("{stem}_{}", Local::now().format("%Y%m%d_%H%M%S"));
        let mut id = base.clone();
        let mut n = 2;
        while self.root.join(&id).exists() {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }

    /// Starts a session for `source` from the chunks of `project`.
    ///
    /// Renders every artifact first, so a chunk that cannot be encoded
    /// aborts before anything is written. Then initializes the ledger with
    /// `document`, writes `chunks/<id>.md` and its pristine copy under
    /// `tasks/` for each editable chunk and saves
    /// the record with status [`SessionStatus::Editing`].
    ///
    /// # Errors
    ///
    /// [`SessionError::NothingToProcess`] without editable chunks,
    /// [`SessionError::UnknownPreset`] for a preset missing from `presets`,
    /// protocol errors from encoding, and storage/ledger failures.
    pub fn create(
        &self,
        source: &Path,
        document: &str,
        project: &ProjectState,
        presets: &PresetCatalog,
        settings: SessionSettings,
    ) -> Result<Session, SessionError> {
        let editable = project.editable_chunks();
        if editable.is_empty() {
            return Err(SessionError::NothingToProcess);
        }

        let mut artifacts = Vec::with_capacity(editable.len());
        for chunk in editable {
            let prompt = presets
                .prompt_for(chunk)
                .ok_or_else(|| SessionError::UnknownPreset {
                    chunk_id: chunk.id().clone(),
                    preset: chunk.direction_preset_id().unwrap_or_default().to_owned(),
                })?;
            let context = settings.visibility.select(chunk, project.list_chunks());
            let text = protocol::encode(chunk, &context, &prompt)?;
            artifacts.push((chunk.id().clone(), text));
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_owned());
        let id = self.unique_id(&stem);
        let dir = self.session_dir(&id)?;
        let now = Utc::now();
        let meta = SessionMeta {
            id,
            source_file: source.to_path_buf(),
            status: SessionStatus::Creating,
            created_at: now,
            updated_at: now,
            context_visibility: settings.visibility,
            policy: settings.policy,
        };

        let ledger = RevisionLedger::init(&dir, document, project.list_chunks(), settings.policy)?;
        let mut session = Session { meta, dir, ledger };
        session.save()?;

        for sub in [CHUNKS_DIR, TASKS_DIR] {
            let sub = session.dir.join(sub);
            fs::create_dir_all(&sub).map_err(|e| StorageError::io(&sub, e))?;
        }
        for (chunk_id, text) in &artifacts {
            write_atomic(&session.task_path(chunk_id), text.as_bytes())?;
            write_atomic(&session.artifact_path(chunk_id), text.as_bytes())?;
        }
        session.set_status(SessionStatus::Editing)?;
        tracing::info!(session_id = %session.id(), artifacts = artifacts.len(), "session created");
        Ok(session)
    }

    /// Reopens session `id`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when no such directory exists; storage or
    /// ledger errors when its contents are unreadable.
    pub fn open(&self, id: &str) -> Result<Session, SessionError> {
        let dir = self.session_dir(id)?;
        if !dir.is_dir() {
            return Err(SessionError::NotFound(id.to_owned()));
        }
        let record = read_record(&dir)?;
        let ledger = RevisionLedger::open(&dir, record.chunks, record.session.policy)?;
        Ok(Session {
            meta: record.session,
            dir,
            ledger,
        })
    }

    /// Reads the metadata of session `id` without opening its ledger.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for unknown ids; storage errors when
    /// `session.toml` is unreadable.
    pub fn meta(&self, id: &str) -> Result<SessionMeta, SessionError> {
        let dir = self.session_dir(id)?;
        if !dir.join(SESSION_FILE).is_file() {
            return Err(SessionError::NotFound(id.to_owned()));
        }
        Ok(read_record(&dir)?.session)
    }

    /// Metadata of every readable session, newest first. Unreadable
    /// directories are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`StorageError`] if the root exists but cannot be listed.
    pub fn list(&self) -> Result<Vec<SessionMeta>, SessionError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.root, e).into()),
        };
        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.join(SESSION_FILE).is_file() {
                continue;
            }
            match read_record(&dir) {
                Ok(record) => sessions.push(record.session),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable session"),
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(sessions)
    }

    /// Removes session `id` and everything in it.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for unknown ids; storage errors on removal.
    pub fn delete(&self, id: &str) -> Result<(), SessionError> {
        let dir = self.session_dir(id)?;
        if !dir.join(SESSION_FILE).is_file() {
            return Err(SessionError::NotFound(id.to_owned()));
        }
        fs::remove_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        tracing::info!(session_id = id, "session deleted");
        Ok(())
    }
}

fn read_record(dir: &Path) -> Result<SessionRecord, StorageError> {
    let path = dir.join(SESSION_FILE);
    let text = fs::read_to_string(&path).map_err(|e| StorageError::io(&path, e))?;
    toml::from_str(&text).map_err(|source| StorageError::Parse { path, source })
}
