//! Owned data types for the chunk model.
//!
//! Every type here is plain data: no borrowed lifetimes, `Send`, and
//! serializable so the same values flow into the sidecar, the session record
//! and across the processing thread boundary unchanged.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A half-open byte range `[start, end)` into one document snapshot.
///
/// Construction enforces `start < end`. Offsets are bytes, so callers that
/// slice a document must also check UTF-8 boundaries; see
/// [`TextRange::slice`] and [`crate::project::ProjectState::check_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr")]
pub struct TextRange {
    start: usize,
    end: usize,
}

/// Wire shape of a [`TextRange`]; validated through `TryFrom` on load.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeRepr {
    start: usize,
    end: usize,
}

impl TryFrom<RangeRepr> for TextRange {
    type Error = ModelError;

    fn try_from(raw: RangeRepr) -> Result<Self, Self::Error> {
        TextRange::new(raw.start, raw.end)
    }
}

impl TextRange {
    /// Builds a range, rejecting empty or inverted spans.
    pub fn new(start: usize, end: usize) -> Result<Self, ModelError> {
        if start >= end {
            return Err(ModelError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always `false`; present for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// True when the two half-open ranges share at least one byte.
    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Returns the text this range covers in `document`, or `None` when the
    /// range is out of bounds or splits a UTF-8 character.
    pub fn slice<'a>(&self, document: &'a str) -> Option<&'a str> {
        document.get(self.as_range())
    }

    /// Moves both ends by `delta` bytes.
    ///
    /// Returns `None` if the shift would move `start` below zero.
    pub fn shifted(&self, delta: isize) -> Option<TextRange> {
        let start = self.start.checked_add_signed(delta)?;
        let end = self.end.checked_add_signed(delta)?;
        Some(TextRange { start, end })
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Stable chunk identifier derived from a creation sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    const PREFIX: &'static str = "chunk_";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `chunk_001`, `chunk_002`, ... (zero padded to three digits).
    pub fn from_sequence(n: u32) -> Self {
        Self(format!("{}{:03}", Self::PREFIX, n))
    }

    /// The sequence number encoded in the id, when it follows the
    /// `chunk_NNN` scheme.
    pub fn sequence(&self) -> Option<u32> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a chunk is treated during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Rewrite toward an outcome ("what should this become?").
    Replace,
    /// Fix a specific issue while keeping the text mostly intact.
    Tweak,
    /// Read-only context; never rewritten.
    Lock,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Replace, Category::Tweak, Category::Lock];

    /// Whether chunks of this category are sent to the agent.
    pub fn is_editable(self) -> bool {
        !matches!(self, Category::Lock)
    }

    /// Display label, also used verbatim in task artifacts.
    pub fn label(self) -> &'static str {
        match self {
            Category::Replace => "Replace",
            Category::Tweak => "Tweak",
            Category::Lock => "Lock",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The role a LOCK chunk plays for its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// A sample of the desired style.
    Example,
    /// Facts or material the rewrite must stay consistent with.
    Reference,
    /// Surrounding text shown for flow only.
    Context,
}

impl LockType {
    pub const ALL: [LockType; 3] = [LockType::Example, LockType::Reference, LockType::Context];

    pub fn label(self) -> &'static str {
        match self {
            LockType::Example => "example",
            LockType::Reference => "reference",
            LockType::Context => "context",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LockType::Example => "Style sample the rewrite should imitate",
            LockType::Reference => "Material the rewrite must stay consistent with",
            LockType::Context => "Surrounding text, shown for flow only",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Processing and review result of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Not yet processed (or eligible for retry).
    #[default]
    Pending,
    /// Agent replied and the reply was patched into the working copy.
    Generated,
    Approved,
    Denied,
    /// The reply could not be anchored in the working copy.
    Failed,
}

impl Outcome {
    /// Approved and denied chunks need no further review.
    pub fn is_decided(self) -> bool {
        matches!(self, Outcome::Approved | Outcome::Denied)
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Generated => "generated",
            Outcome::Approved => "approved",
            Outcome::Denied => "denied",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A marked span of the document with its edit instructions.
///
/// `range` and `original_text` are fixed at creation. The descriptive
/// fields are only ever set through [`crate::project::ProjectState::add_chunk`],
/// which the lifecycle state machine drives; `outcome` is copied in from
/// session results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChunkRepr")]
pub struct Chunk {
    id: ChunkId,
    range: TextRange,
    category: Category,
    original_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    direction_preset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lock_type: Option<LockType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotation: Option<String>,
    execution_order: u32,
    outcome: Outcome,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChunkRepr {
    id: ChunkId,
    range: TextRange,
    category: Category,
    original_text: String,
    direction_preset_id: Option<String>,
    lock_type: Option<LockType>,
    annotation: Option<String>,
    execution_order: u32,
    #[serde(default)]
    outcome: Outcome,
}

impl TryFrom<ChunkRepr> for Chunk {
    type Error = ModelError;

    fn try_from(raw: ChunkRepr) -> Result<Self, Self::Error> {
        check_descriptors(raw.category, raw.direction_preset_id.as_deref(), raw.lock_type)?;
        if raw.original_text.len() != raw.range.len() {
            return Err(ModelError::InvalidChunk {
                id: raw.id,
                reason: format!(
                    "original_text is {} bytes but range {} spans {}",
                    raw.original_text.len(),
                    raw.range,
                    raw.range.len()
                ),
            });
        }
        Ok(Chunk {
            id: raw.id,
            range: raw.range,
            category: raw.category,
            original_text: raw.original_text,
            direction_preset_id: raw.direction_preset_id,
            lock_type: raw.lock_type,
            annotation: raw.annotation,
            execution_order: raw.execution_order,
            outcome: raw.outcome,
        })
    }
}

/// Enforces the category rules: editable chunks carry a direction and no
/// lock type, LOCK chunks carry a lock type and no direction.
pub(crate) fn check_descriptors(
    category: Category,
    direction: Option<&str>,
    lock_type: Option<LockType>,
) -> Result<(), ModelError> {
    match category {
        Category::Lock => {
            if direction.is_some() {
                return Err(ModelError::UnexpectedDirection);
            }
            if lock_type.is_none() {
                return Err(ModelError::MissingLockType);
            }
        }
        Category::Replace | Category::Tweak => {
            if direction.map_or(true, |d| d.trim().is_empty()) {
                return Err(ModelError::MissingDirection { category });
            }
            if lock_type.is_some() {
                return Err(ModelError::UnexpectedLockType { category });
            }
        }
    }
    Ok(())
}

impl Chunk {
    pub(crate) fn new(
        id: ChunkId,
        original_text: String,
        spec: NewChunk,
        execution_order: u32,
    ) -> Self {
        Self {
            id,
            range: spec.range,
            category: spec.category,
            original_text,
            direction_preset_id: spec.direction_preset_id,
            lock_type: spec.lock_type,
            annotation: spec.annotation,
            execution_order,
            outcome: Outcome::Pending,
        }
    }

    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn direction_preset_id(&self) -> Option<&str> {
        self.direction_preset_id.as_deref()
    }

    pub fn lock_type(&self) -> Option<LockType> {
        self.lock_type
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn execution_order(&self) -> u32 {
        self.execution_order
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_editable(&self) -> bool {
        self.category.is_editable()
    }

    /// Short name for lists: `chunk_001: first thirty characters...`.
    pub fn display_name(&self) -> String {
        const PREVIEW: usize = 30;
        let mut preview: String = self
            .original_text
            .chars()
            .take(PREVIEW)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if self.original_text.chars().count() > PREVIEW {
            preview.push_str("...");
        }
        format!("{}: {}", self.id, preview)
    }

    pub(crate) fn set_execution_order(&mut self, order: u32) {
        self.execution_order = order;
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

/// Everything needed to create a chunk except what the model derives itself
/// (id, captured text, execution order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChunk {
    pub range: TextRange,
    pub category: Category,
    pub direction_preset_id: Option<String>,
    pub lock_type: Option<LockType>,
    pub annotation: Option<String>,
}

impl NewChunk {
    pub fn replace(range: TextRange, preset: impl Into<String>) -> Self {
        Self::editable(range, Category::Replace, preset)
    }

    pub fn tweak(range: TextRange, preset: impl Into<String>) -> Self {
        Self::editable(range, Category::Tweak, preset)
    }

    pub fn lock(range: TextRange, lock_type: LockType) -> Self {
        Self {
            range,
            category: Category::Lock,
            direction_preset_id: None,
            lock_type: Some(lock_type),
            annotation: None,
        }
    }

    fn editable(range: TextRange, category: Category, preset: impl Into<String>) -> Self {
        Self {
            range,
            category,
            direction_preset_id: Some(preset.into()),
            lock_type: None,
            annotation: None,
        }
    }

    /// Attaches free-text guidance; blank strings are dropped.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        let text = annotation.into();
        self.annotation = if text.trim().is_empty() { None } else { Some(text) };
        self
    }
}
