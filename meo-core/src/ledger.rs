//! Per-session revision ledger backed by a git repository.
//!
//! The session directory is a git work tree holding two tracked files:
//! `original.md`, frozen at session start, and `working.md`, which every
//! accepted, denied or edited response rewrites. Each change is one commit,
//! so the log doubles as an audit trail.
//!
//! The ledger also owns the per-chunk records: where each chunk currently
//! sits in `working.md` and what occupies that span.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Commit, DiffOptions, Patch, Repository, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, StorageError};
use crate::patch::{MatchPolicy, PatchEngine};
use crate::sidecar::write_atomic;
use crate::types::{Category, Chunk, ChunkId, Outcome, TextRange};

pub const ORIGINAL_FILE: &str = "original.md";
pub const WORKING_FILE: &str = "working.md";
const AUTHOR_NAME: &str = "meo";
const AUTHOR_EMAIL: &str = "meo@local";

/// Session-side state of one chunk.
///
/// `range` tracks the chunk in `working.md`; `origin` is its fixed range in
/// `original.md`. The span holds `response` when `applied`, otherwise
/// `original_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub category: Category,
    pub execution_order: u32,
    pub original_text: String,
    pub origin: TextRange,
    pub range: TextRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub applied: bool,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<String>,
}

impl ChunkRecord {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id().clone(),
            category: chunk.category(),
            execution_order: chunk.execution_order(),
            original_text: chunk.original_text().to_owned(),
            origin: chunk.range(),
            range: chunk.range(),
            response: None,
            applied: false,
            outcome: Outcome::Pending,
            error: None,
            commits: Vec::new(),
        }
    }

    /// The text currently occupying `range` in the working document.
    pub fn current_text(&self) -> &str {
        match (&self.response, self.applied) {
            (Some(response), true) => response,
            _ => &self.original_text,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.category.is_editable()
    }
}

/// A single line of a chunk diff.
///
/// `origin` follows git conventions: `'+'` added, `'-'` removed, `' '`
/// context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub origin: char,
    /// Line text without the trailing newline.
    pub content: String,
    /// Line number in `original.md`.
    pub old_lineno: Option<u32>,
    /// Line number in `working.md`.
    pub new_lineno: Option<u32>,
}

/// One `@@` hunk with line numbers rebased onto the full documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: u32,
    pub new_start: u32,
    pub lines: Vec<DiffLine>,
}

/// Net change of one chunk: its original text against its current span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDiff {
    pub chunk_id: ChunkId,
    pub hunks: Vec<DiffHunk>,
    pub added: usize,
    pub removed: usize,
}

impl ChunkDiff {
    /// True when the chunk's span is byte-identical to its original text.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Renders the diff in unified format.
    pub fn to_unified(&self) -> String {
        let mut out = format!("--- a/{ORIGINAL_FILE}\n+++ b/{WORKING_FILE}\n");
        for hunk in &self.hunks {
            out.push_str(&hunk.header);
            out.push('\n');
            for line in &hunk.lines {
                out.push(line.origin);
                out.push_str(&line.content);
                out.push('\n');
            }
        }
        out
    }
}

/// One entry of the session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: String,
    pub summary: String,
    pub time: DateTime<Utc>,
}

/// The session's git repository plus the chunk records it versions.
pub struct RevisionLedger {
    repo: Repository,
    dir: PathBuf,
    original: String,
    working: String,
    records: Vec<ChunkRecord>,
    engine: PatchEngine,
}

impl std::fmt::Debug for RevisionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionLedger")
            .field("dir", &self.dir)
            .field("records", &self.records.len())
            .field("working_len", &self.working.len())
            .finish()
    }
}

impl RevisionLedger {
    /// Creates the repository in `dir`, writes `original.md` and `working.md`
    /// from `document` and records the `Session start` commit.
    ///
    /// Every chunk gets a record, LOCK chunks included, so their ranges keep
    /// shifting with the edits around them.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the directory cannot be written or git
    /// initialization fails.
    pub fn init(
        dir: &Path,
        document: &str,
        chunks: &[Chunk],
        policy: MatchPolicy,
    ) -> Result<Self, LedgerError> {
        fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        let repo = Repository::init(dir)?;
        let mut ledger = Self {
            repo,
            dir: dir.to_path_buf(),
            original: document.to_owned(),
            working: document.to_owned(),
            records: chunks.iter().map(ChunkRecord::from_chunk).collect(),
            engine: PatchEngine::new(policy),
        };
        write_atomic(&dir.join(ORIGINAL_FILE), document.as_bytes())?;
        ledger.commit("Session start", &[ORIGINAL_FILE, WORKING_FILE])?;
        tracing::info!(dir = %dir.display(), chunks = ledger.records.len(), "ledger initialized");
        Ok(ledger)
    }

    /// Reopens an existing session repository with previously saved records.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the repository or either tracked file is
    /// missing, or a record range no longer fits `working.md`.
    pub fn open(
        dir: &Path,
        records: Vec<ChunkRecord>,
        policy: MatchPolicy,
    ) -> Result<Self, LedgerError> {
        let repo = Repository::open(dir)?;
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(|e| StorageError::io(path, e))
        };
        let original = read(ORIGINAL_FILE)?;
        let working = read(WORKING_FILE)?;
        if let Some(bad) = records
            .iter()
            .find(|r| r.range.slice(&working) != Some(r.current_text()))
        {
            return Err(StorageError::Invalid {
                path: dir.join(WORKING_FILE),
                reason: format!("{} no longer matches its recorded span {}", bad.id, bad.range),
            }
            .into());
        }
        Ok(Self {
            repo,
            dir: dir.to_path_buf(),
            original,
            working,
            records,
            engine: PatchEngine::new(policy),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn working(&self) -> &str {
        &self.working
    }

    /// Records in document order of the original.
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn record(&self, id: &ChunkId) -> Option<&ChunkRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    fn index_of(&self, id: &ChunkId) -> Result<usize, LedgerError> {
        self.records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| LedgerError::UnknownChunk(id.clone()))
    }

    fn editable_index(&self, id: &ChunkId) -> Result<usize, LedgerError> {
        let idx = self.index_of(id)?;
        if !self.records[idx].is_editable() {
            return Err(LedgerError::NotEditable(id.clone()));
        }
        Ok(idx)
    }

    /// Writes `working.md`, stages `paths` and commits on top of HEAD.
    fn commit(&mut self, message: &str, paths: &[&str]) -> Result<String, LedgerError> {
        write_atomic(&self.dir.join(WORKING_FILE), self.working.as_bytes())?;

        let mut index = self.repo.index()?;
        for path in paths {
            index.add_path(Path::new(path))?;
        }
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now(AUTHOR_NAME, AUTHOR_EMAIL)?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        tracing::debug!(commit = %oid, message, "ledger commit");
        Ok(oid.to_string())
    }

    /// Replaces whatever record `idx` currently shows with `replacement`,
    /// shifting every other record's range.
    fn replace_span(&mut self, idx: usize, replacement: &str) -> Result<(), LedgerError> {
        let anchor = self.records[idx].current_text().to_owned();
        let expected = self.records[idx].range;
        let chunk_id = self.records[idx].id.clone();
        let others = self
            .records
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, r)| &mut r.range);
        let patched = self
            .engine
            .apply(&mut self.working, &anchor, expected, replacement, others)
            .map_err(|source| LedgerError::Patch { chunk_id, source })?;
        self.records[idx].range = patched.span;
        Ok(())
    }

    fn commit_record(&mut self, idx: usize, message: String) -> Result<(), LedgerError> {
        let oid = self.commit(&message, &[WORKING_FILE])?;
        self.records[idx].commits.push(oid);
        Ok(())
    }

    /// Patches `response` into the chunk's span and commits. The outcome
    /// becomes [`Outcome::Generated`].
    ///
    /// When the anchor cannot be found the outcome becomes
    /// [`Outcome::Failed`], the error is recorded, and the working document is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Patch`] on anchor loss, plus unknown/LOCK chunk and
    /// git failures.
    pub fn commit_chunk(&mut self, id: &ChunkId, response: &str) -> Result<(), LedgerError> {
        let idx = self.editable_index(id)?;
        if response.trim().is_empty() {
            return Err(LedgerError::EmptyResponse(id.clone()));
        }
        if let Err(err) = self.replace_span(idx, response) {
            if let LedgerError::Patch { source, .. } = &err {
                tracing::warn!(chunk_id = %id, error = %source, "anchor lost");
                let record = &mut self.records[idx];
                record.outcome = Outcome::Failed;
                record.error = Some(source.to_string());
            }
            return Err(err);
        }
        let record = &mut self.records[idx];
        record.response = Some(response.to_owned());
        record.applied = true;
        record.outcome = Outcome::Generated;
        record.error = None;
        self.commit_record(idx, format!("Applied {id}"))?;
        tracing::info!(chunk_id = %id, "chunk applied");
        Ok(())
    }

    /// Leaves the chunk pending with `message` attached, e.g. after a
    /// malformed artifact or an agent failure.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownChunk`] for an id outside the session.
    pub fn mark_pending(
        &mut self,
        id: &ChunkId,
        message: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let idx = self.index_of(id)?;
        self.records[idx].error = Some(message.into());
        Ok(())
    }

    /// Accepts the chunk's current response.
    ///
    /// A generated chunk keeps its commit. A denied chunk that has a stored
    /// response gets it re-applied and committed. Approving twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotReviewable`] for chunks without a response, and
    /// [`LedgerError::Patch`] when a re-apply cannot find its anchor.
    pub fn approve(&mut self, id: &ChunkId) -> Result<(), LedgerError> {
        let idx = self.editable_index(id)?;
        let record = &self.records[idx];
        let (outcome, applied, response) = (record.outcome, record.applied, record.response.clone());
        match (outcome, response) {
            (Outcome::Approved, _) => return Ok(()),
            (Outcome::Generated, Some(_)) if applied => {}
            (Outcome::Denied, Some(response)) => {
                self.replace_span(idx, &response)?;
                self.records[idx].applied = true;
                self.commit_record(idx, format!("Re-applied {id}"))?;
            }
            (outcome, _) => {
                return Err(LedgerError::NotReviewable {
                    chunk_id: id.clone(),
                    outcome,
                })
            }
        }
        self.records[idx].outcome = Outcome::Approved;
        tracing::info!(chunk_id = %id, "chunk approved");
        Ok(())
    }

    /// Restores the chunk's original text and commits. Other chunks keep
    /// their content; only their ranges shift.
    ///
    /// A chunk that never had a response applied is marked denied without a
    /// commit.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Patch`] if the applied response cannot be found.
    pub fn deny(&mut self, id: &ChunkId) -> Result<(), LedgerError> {
        let idx = self.editable_index(id)?;
        if self.records[idx].applied {
            let original = self.records[idx].original_text.clone();
            self.replace_span(idx, &original)?;
            self.records[idx].applied = false;
            self.commit_record(idx, format!("Denied {id}"))?;
        }
        self.records[idx].outcome = Outcome::Denied;
        tracing::info!(chunk_id = %id, "chunk denied");
        Ok(())
    }

    /// Replaces the chunk's current text with `text` and commits. The chunk
    /// goes back to [`Outcome::Generated`] so the edit itself is reviewed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EmptyResponse`] for blank text and
    /// [`LedgerError::Patch`] when the current span cannot be found.
    pub fn edit_response(&mut self, id: &ChunkId, text: &str) -> Result<(), LedgerError> {
        let idx = self.editable_index(id)?;
        let text = text.trim_end();
        if text.trim().is_empty() {
            return Err(LedgerError::EmptyResponse(id.clone()));
        }
        self.replace_span(idx, text)?;
        let record = &mut self.records[idx];
        record.response = Some(text.to_owned());
        record.applied = true;
        record.outcome = Outcome::Generated;
        record.error = None;
        self.commit_record(idx, format!("Edited {id}"))?;
        Ok(())
    }

    /// Resets `working.md` to `original.md` and commits. Every applied chunk
    /// becomes [`Outcome::Denied`]; every range returns to its origin.
    ///
    /// # Errors
    ///
    /// Git or write failures.
    pub fn rollback_session(&mut self) -> Result<(), LedgerError> {
        self.working = self.original.clone();
        for record in &mut self.records {
            record.range = record.origin;
            if record.applied {
                record.applied = false;
                record.outcome = Outcome::Denied;
            }
        }
        self.commit("Rollback session", &[WORKING_FILE])?;
        tracing::info!(dir = %self.dir.display(), "session rolled back");
        Ok(())
    }

    /// Diffs the chunk's original text against its current span.
    ///
    /// Line numbers refer to `original.md` and `working.md` respectively.
    ///
    /// # Errors
    ///
    /// Unknown chunk or git diff failure.
    pub fn diff_chunk(&self, id: &ChunkId) -> Result<ChunkDiff, LedgerError> {
        let record = &self.records[self.index_of(id)?];
        let old = with_newline(&record.original_text);
        let new = with_newline(record.current_text());
        let old_base = line_offset(&self.original, record.origin.start());
        let new_base = line_offset(&self.working, record.range.start());

        let mut opts = DiffOptions::new();
        opts.context_lines(2);
        let patch = Patch::from_buffers(
            old.as_bytes(),
            Some(Path::new(ORIGINAL_FILE)),
            new.as_bytes(),
            Some(Path::new(WORKING_FILE)),
            Some(&mut opts),
        )?;

        let mut diff = ChunkDiff {
            chunk_id: id.clone(),
            hunks: Vec::new(),
            added: 0,
            removed: 0,
        };
        for h in 0..patch.num_hunks() {
            let (hunk, line_count) = patch.hunk(h)?;
            let old_start = hunk.old_start() + old_base;
            let new_start = hunk.new_start() + new_base;
            let mut lines = Vec::with_capacity(line_count);
            for l in 0..line_count {
                let line = patch.line_in_hunk(h, l)?;
                let origin = line.origin();
                match origin {
                    '+' => diff.added += 1,
                    '-' => diff.removed += 1,
                    ' ' => {}
                    _ => continue,
                }
                let content = String::from_utf8_lossy(line.content());
                lines.push(DiffLine {
                    origin,
                    content: content.trim_end_matches(['\n', '\r']).to_owned(),
                    old_lineno: line.old_lineno().map(|n| n + old_base),
                    new_lineno: line.new_lineno().map(|n| n + new_base),
                });
            }
            diff.hunks.push(DiffHunk {
                header: format!(
                    "@@ -{},{} +{},{} @@",
                    old_start,
                    hunk.old_lines(),
                    new_start,
                    hunk.new_lines()
                ),
                old_start,
                new_start,
                lines,
            });
        }
        Ok(diff)
    }

    /// The session log, newest first.
    ///
    /// # Errors
    ///
    /// Git failures while walking the history.
    pub fn history(&self) -> Result<Vec<Revision>, LedgerError> {
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(git2::Sort::TIME)?;
        let mut revisions = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            let mut id = commit.id().to_string();
            id.truncate(7);
            revisions.push(Revision {
                id,
                summary: commit.summary().unwrap_or_default().to_owned(),
                time: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
            });
        }
        Ok(revisions)
    }
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_owned()
    } else {
        format!("{text}\n")
    }
}

/// Number of complete lines before byte `offset`.
fn line_offset(document: &str, offset: usize) -> u32 {
    let head = document.get(..offset).unwrap_or(document);
    u32::try_from(head.matches('\n').count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_offset_counts_newlines_before_the_offset() {
        let doc = "one\ntwo\nthree\n";
        assert_eq!(line_offset(doc, 0), 0);
        assert_eq!(line_offset(doc, 4), 1);
        assert_eq!(line_offset(doc, doc.len()), 3);
        // Past the end counts the whole document.
        assert_eq!(line_offset(doc, 100), 3);
    }
}
