//! Error types, one enum per subsystem.
//!
//! Each enum is a `thiserror` derive so the binary can fold them into
//! `anyhow::Error` with `?` while tests can still match on variants.

use std::path::PathBuf;

use crate::lifecycle::StateKind;
use crate::types::{Category, ChunkId, Outcome, TextRange};

/// Violations of the document/chunk model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid range [{start}, {end}): start must be below end")]
    InvalidRange { start: usize, end: usize },

    #[error("range {range} lies outside the document ({len} bytes)")]
    OutOfBounds { range: TextRange, len: usize },

    #[error("range {range} does not fall on character boundaries")]
    NotCharBoundary { range: TextRange },

    #[error("range {range} overlaps {existing}")]
    RangeConflict { range: TextRange, existing: ChunkId },

    #[error("chunk {0} not found")]
    NotFound(ChunkId),

    #[error("duplicate chunk id {0}")]
    DuplicateId(ChunkId),

    #[error("{category} chunk requires a direction preset")]
    MissingDirection { category: Category },

    #[error("lock chunks take a lock type, not a direction preset")]
    UnexpectedDirection,

    #[error("lock chunk requires a lock type")]
    MissingLockType,

    #[error("{category} chunk cannot carry a lock type")]
    UnexpectedLockType { category: Category },

    #[error("chunk {id}: {reason}")]
    InvalidChunk { id: ChunkId, reason: String },
}

/// Task artifact encode/decode failures.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The artifact is missing a marker, repeats one, or carries an
    /// unreadable header. Fatal for the chunk, not for the session.
    #[error("malformed task artifact: {0}")]
    Malformed(String),

    #[error("text for {chunk_id} contains the reserved marker line `{line}`")]
    ReservedMarker { chunk_id: ChunkId, line: String },

    #[error("{0} is a lock chunk and is never sent for editing")]
    NotEditable(ChunkId),
}

/// Errors building a [`crate::presets::PresetCatalog`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse preset catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate preset id {0:?}")]
    DuplicateId(String),
    #[error("preset {0:?} applies to no editable category")]
    NoCategory(String),
}

/// Anchoring and splicing failures in the patch engine.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The anchor text was not found near its expected position. The chunk
    /// is marked failed; the engine never guesses.
    #[error("anchor for {expected} not found within {window} bytes")]
    AnchorLost { expected: TextRange, window: usize },

    #[error("replacement text is empty")]
    EmptyReplacement,
}

/// Failures reported by an [`crate::agent::Agent`].
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent invocation failed: {0}")]
    Invocation(String),

    #[error("agent produced no output")]
    NoOutput,

    #[error("artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem and (de)serialization failures for sidecars, session records
/// and configuration.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Revision ledger failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("chunk {0} is not part of this session")]
    UnknownChunk(ChunkId),

    #[error("{0} is a lock chunk and cannot be edited")]
    NotEditable(ChunkId),

    #[error("{chunk_id} cannot be reviewed while {outcome}")]
    NotReviewable { chunk_id: ChunkId, outcome: Outcome },

    #[error("response for {0} is empty")]
    EmptyResponse(ChunkId),

    #[error("{chunk_id}: {source}")]
    Patch {
        chunk_id: ChunkId,
        #[source]
        source: PatchError,
    },
}

/// Session store and processing failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("session {0} not found")]
    NotFound(String),

    #[error("invalid session id {0:?}")]
    InvalidId(String),

    #[error("{chunk_id} references unknown direction preset {preset:?}")]
    UnknownPreset { chunk_id: ChunkId, preset: String },

    #[error("session has no editable chunks")]
    NothingToProcess,
}

/// Rejected user intents.
///
/// Every variant leaves the lifecycle state and the chunk set untouched.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{intent} is not allowed while {state}")]
    InvalidIntent { state: StateKind, intent: &'static str },

    #[error("unknown direction preset {0:?}")]
    UnknownPreset(String),

    #[error("preset {preset:?} does not apply to {category} chunks")]
    PresetNotApplicable { preset: String, category: Category },

    #[error("no editable chunks to generate")]
    NothingToGenerate,

    #[error("no pending chunks left to generate")]
    NothingPending,

    #[error("the source file changed since these chunks were marked")]
    StaleSource,

    #[error("no active session")]
    NoSession,

    #[error("processing is already running")]
    AlreadyProcessing,

    #[error("failed to start the processing thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("session {session} belongs to {}", source_file.display())]
    ForeignSession { session: String, source_file: PathBuf },

    #[error("session {0} was started from a different version of the source")]
    SessionOutdated(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        Self::Session(SessionError::Ledger(err))
    }
}
