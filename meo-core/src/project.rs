//! Per-document project state: the chunk set and its invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ModelError;
use crate::types::{check_descriptors, Chunk, ChunkId, NewChunk, Outcome, TextRange};

/// Sidecar format version written by this crate.
pub const FORMAT_VERSION: &str = "1";

/// Returns the first 16 hex characters of the SHA-256 of `document`.
pub fn source_hash(document: &str) -> String {
    let digest = Sha256::digest(document.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(16);
    hash
}

/// Chunks marked on one source document, plus bookkeeping.
///
/// Chunks are kept in document order and never overlap. Ids are unique; the
/// next id is always one past the highest sequence number present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectState {
    version: String,
    source_file: String,
    source_hash: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_session: Option<String>,
    #[serde(default)]
    chunks: Vec<Chunk>,
}

impl ProjectState {
    /// Starts an empty project for `document`, stored under `source_file`.
    pub fn new(source_file: impl Into<String>, document: &str) -> Self {
        let now = Utc::now();
        Self {
            version: FORMAT_VERSION.to_owned(),
            source_file: source_file.into(),
            source_hash: source_hash(document),
            created_at: now,
            modified_at: now,
            last_session: None,
            chunks: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn last_session(&self) -> Option<&str> {
        self.last_session.as_deref()
    }

    /// True when `document` no longer matches the snapshot the chunk ranges
    /// were recorded against.
    pub fn is_stale(&self, document: &str) -> bool {
        source_hash(document) != self.source_hash
    }

    /// All chunks in document order.
    pub fn list_chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &ChunkId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id() == id)
    }

    /// The chunk covering byte `offset`, if any.
    pub fn chunk_at(&self, offset: usize) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.range().contains(offset))
    }

    /// Chunks sorted by `(execution_order, id)`, the order they are processed
    /// and reviewed in.
    pub fn in_execution_order(&self) -> Vec<&Chunk> {
        let mut ordered: Vec<&Chunk> = self.chunks.iter().collect();
        ordered.sort_by(|a, b| {
            a.execution_order()
                .cmp(&b.execution_order())
                .then_with(|| a.id().cmp(b.id()))
        });
        ordered
    }

    /// Editable (non-LOCK) chunks in execution order.
    pub fn editable_chunks(&self) -> Vec<&Chunk> {
        self.in_execution_order()
            .into_iter()
            .filter(|c| c.is_editable())
            .collect()
    }

    /// One past the highest sequence number in use.
    pub fn next_chunk_id(&self) -> ChunkId {
        let max = self
            .chunks
            .iter()
            .filter_map(|c| c.id().sequence())
            .max()
            .unwrap_or(0);
        ChunkId::from_sequence(max + 1)
    }

    fn next_execution_order(&self) -> u32 {
        self.chunks
            .iter()
            .map(|c| c.execution_order().saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Checks that `range` can become a new chunk of `document`: in bounds,
    /// on character boundaries and clear of every existing chunk.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule as a [`ModelError`].
    pub fn check_range(&self, document: &str, range: TextRange) -> Result<(), ModelError> {
        if range.end() > document.len() {
            return Err(ModelError::OutOfBounds {
                range,
                len: document.len(),
            });
        }
        if range.slice(document).is_none() {
            return Err(ModelError::NotCharBoundary { range });
        }
        if let Some(existing) = self.chunks.iter().find(|c| c.range().overlaps(&range)) {
            return Err(ModelError::RangeConflict {
                range,
                existing: existing.id().clone(),
            });
        }
        Ok(())
    }

    /// Creates a chunk over `spec.range`, capturing its text from `document`.
    ///
    /// The new chunk gets the next free id and is scheduled after every
    /// existing chunk. On error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the range is invalid for `document`, overlaps
    /// another chunk, or the descriptors do not fit the category.
    pub fn add_chunk(&mut self, document: &str, spec: NewChunk) -> Result<&Chunk, ModelError> {
        self.check_range(document, spec.range)?;
        check_descriptors(
            spec.category,
            spec.direction_preset_id.as_deref(),
            spec.lock_type,
        )?;
        let original = spec
            .range
            .slice(document)
            .ok_or(ModelError::NotCharBoundary { range: spec.range })?
            .to_owned();

        let id = self.next_chunk_id();
        let order = self.next_execution_order();
        let chunk = Chunk::new(id, original, spec, order);

        let at = self
            .chunks
            .partition_point(|c| c.range().start() < chunk.range().start());
        self.chunks.insert(at, chunk);
        self.modified_at = Utc::now();
        tracing::debug!(chunk = %self.chunks[at].id(), range = %self.chunks[at].range(), "chunk added");
        Ok(&self.chunks[at])
    }

    /// Removes the chunk with `id` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no such chunk exists.
    pub fn remove_chunk(&mut self, id: &ChunkId) -> Result<Chunk, ModelError> {
        let idx = self
            .chunks
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| ModelError::NotFound(id.clone()))?;
        self.modified_at = Utc::now();
        Ok(self.chunks.remove(idx))
    }

    /// Moves chunk `id` to `order` in the processing sequence. Ties between
    /// equal orders are broken by id.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no such chunk exists.
    pub fn set_execution_order(&mut self, id: &ChunkId, order: u32) -> Result<(), ModelError> {
        let chunk = self
            .chunks
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| ModelError::NotFound(id.clone()))?;
        chunk.set_execution_order(order);
        self.modified_at = Utc::now();
        Ok(())
    }

    pub fn set_last_session(&mut self, session_id: impl Into<String>) {
        self.last_session = Some(session_id.into());
        self.modified_at = Utc::now();
    }

    /// Copies a session result back onto the chunk. Unknown ids are ignored:
    /// the chunk may have been removed since the session started.
    pub(crate) fn record_outcome(&mut self, id: &ChunkId, outcome: Outcome) {
        if let Some(chunk) = self.chunks.iter_mut().find(|c| c.id() == id) {
            chunk.set_outcome(outcome);
        }
    }

    /// Rebases onto a new document snapshot, dropping every chunk. Used after
    /// a session writes its result back to the source file.
    pub fn reset_for(&mut self, document: &str) {
        self.chunks.clear();
        self.source_hash = source_hash(document);
        self.modified_at = Utc::now();
    }

    /// Adopts `document` as the new snapshot when every chunk still captures
    /// its original text at its range.
    ///
    /// # Errors
    ///
    /// The first chunk that no longer matches; nothing changes on error.
    pub fn rebase(&mut self, document: &str) -> Result<(), ModelError> {
        self.validate_against(document)?;
        self.source_hash = source_hash(document);
        self.modified_at = Utc::now();
        Ok(())
    }

    /// Checks the structural invariants of a loaded state: unique ids,
    /// document order, no overlaps.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut ids: Vec<&ChunkId> = self.chunks.iter().map(|c| c.id()).collect();
        ids.sort();
        if let Some(dup) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ModelError::DuplicateId(dup[0].clone()));
        }
        for pair in self.chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.range().overlaps(&b.range()) {
                return Err(ModelError::RangeConflict {
                    range: b.range(),
                    existing: a.id().clone(),
                });
            }
            if a.range().start() > b.range().start() {
                return Err(ModelError::InvalidChunk {
                    id: b.id().clone(),
                    reason: "chunks are not in document order".to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), additionally checking every chunk
    /// still captures the same text in `document`.
    ///
    /// # Errors
    ///
    /// Returns the first chunk whose range or text no longer matches.
    pub fn validate_against(&self, document: &str) -> Result<(), ModelError> {
        self.validate()?;
        for chunk in &self.chunks {
            match chunk.range().slice(document) {
                Some(text) if text == chunk.original_text() => {}
                Some(_) => {
                    return Err(ModelError::InvalidChunk {
                        id: chunk.id().clone(),
                        reason: "document text differs from the captured original".to_owned(),
                    })
                }
                None => {
                    return Err(ModelError::OutOfBounds {
                        range: chunk.range(),
                        len: document.len(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LockType;

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let hash = source_hash("hello");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, "2cf24dba5fb0a30e");
    }

    #[test]
    fn ids_continue_after_removal_of_earlier_chunks() {
        let doc = "alpha beta gamma";
        let mut state = ProjectState::new("doc.md", doc);
        state
            .add_chunk(doc, NewChunk::lock(TextRange::new(0, 5).unwrap(), LockType::Context))
            .unwrap();
        state
            .add_chunk(doc, NewChunk::replace(TextRange::new(6, 10).unwrap(), "richer"))
            .unwrap();
        state.remove_chunk(&ChunkId::from_sequence(1)).unwrap();
        let third = state
            .add_chunk(doc, NewChunk::tweak(TextRange::new(11, 16).unwrap(), "flow"))
            .unwrap();
        assert_eq!(third.id().as_str(), "chunk_003");
    }

    #[test]
    fn multibyte_split_is_rejected() {
        let doc = "héllo";
        let state = ProjectState::new("doc.md", doc);
        let err = state.check_range(doc, TextRange::new(0, 2).unwrap()).unwrap_err();
        assert!(matches!(err, ModelError::NotCharBoundary { .. }));
    }
}
