//! Task artifact format: one self-contained markdown file per editable chunk.
//!
//! An artifact carries the chunk id and category, the rendered instructions,
//! a read-only "document structure" block, the text to edit between fixed
//! delimiters, and a response marker. The agent writes its reply below the
//! marker; [`decode`] reads everything back.
//!
//! The id and category are read only from the header above the first
//! `## Instructions` heading, so embedded markdown may use those prefixes
//! freely. Sentinel lines (`<<<MEO ...>>>`) are reserved everywhere:
//! [`encode`] refuses any input text containing one.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{Category, Chunk, ChunkId};

pub const TASK_HEADER: &str = "# Edit Task: ";
pub const CATEGORY_PREFIX: &str = "**Category:** ";
pub const TEXT_BEGIN: &str = "<<<MEO TEXT BEGIN>>>";
pub const TEXT_END: &str = "<<<MEO TEXT END>>>";
pub const RESPONSE_MARKER: &str = "<<<MEO RESPONSE>>>";
pub const CONTEXT_END: &str = "<<<MEO CONTEXT END>>>";
const INSTRUCTIONS_HEADING: &str = "## Instructions";
const MARKER_PREFIX: &str = "<<<MEO ";
const GUIDANCE_SEPARATOR: &str = "--- Additional guidance ---";

/// Which other chunks an artifact shows in its document structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextVisibility {
    /// Target text only.
    None,
    /// LOCK chunks plus editable chunks scheduled before the target.
    PreviouslyEdited,
    /// LOCK chunks directly before or after the target in document order.
    AdjacentLocked,
    /// Every other chunk.
    #[default]
    FullDocument,
}

impl ContextVisibility {
    pub const ALL: [ContextVisibility; 4] = [
        ContextVisibility::None,
        ContextVisibility::PreviouslyEdited,
        ContextVisibility::AdjacentLocked,
        ContextVisibility::FullDocument,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ContextVisibility::None => "none",
            ContextVisibility::PreviouslyEdited => "previously-edited",
            ContextVisibility::AdjacentLocked => "adjacent-locked",
            ContextVisibility::FullDocument => "full-document",
        }
    }

    /// Picks the context chunks for `target` out of `chunks`, which must be
    /// in document order. The result keeps document order and never
    /// contains the target.
    pub fn select<'a>(self, target: &Chunk, chunks: &'a [Chunk]) -> Vec<&'a Chunk> {
        let others = chunks.iter().filter(|c| c.id() != target.id());
        match self {
            ContextVisibility::None => Vec::new(),
            ContextVisibility::FullDocument => others.collect(),
            ContextVisibility::PreviouslyEdited => {
                let key = (target.execution_order(), target.id());
                others
                    .filter(|c| !c.is_editable() || (c.execution_order(), c.id()) < key)
                    .collect()
            }
            ContextVisibility::AdjacentLocked => {
                let Some(idx) = chunks.iter().position(|c| c.id() == target.id()) else {
                    return Vec::new();
                };
                let before = idx.checked_sub(1).and_then(|i| chunks.get(i));
                let after = chunks.get(idx + 1);
                [before, after]
                    .into_iter()
                    .flatten()
                    .filter(|c| !c.is_editable())
                    .collect()
            }
        }
    }
}

/// Everything [`decode`] recovers from an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArtifact {
    pub chunk_id: ChunkId,
    pub category: Category,
    pub original_text: String,
    /// The agent's reply, or `None` if nothing follows the marker yet.
    pub response: Option<String>,
}

fn is_reserved(line: &str) -> bool {
    line.trim_end_matches('\r').starts_with(MARKER_PREFIX)
}

fn reject_reserved(chunk_id: &ChunkId, text: &str) -> Result<(), ProtocolError> {
    match text.lines().find(|l| is_reserved(l)) {
        Some(line) => Err(ProtocolError::ReservedMarker {
            chunk_id: chunk_id.clone(),
            line: line.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Renders the task artifact for `target`.
///
/// `prompt` is the resolved preset template (or category default); the
/// chunk's annotation, if any, is appended after it. `context` is shown
/// read-only in the order given and should come from
/// [`ContextVisibility::select`].
///
/// # Errors
///
/// [`ProtocolError::NotEditable`] for LOCK chunks, and
/// [`ProtocolError::ReservedMarker`] when any embedded text contains a line
/// reserved by the format.
pub fn encode(target: &Chunk, context: &[&Chunk], prompt: &str) -> Result<String, ProtocolError> {
    let id = target.id();
    if !target.is_editable() {
        return Err(ProtocolError::NotEditable(id.clone()));
    }
    reject_reserved(id, target.original_text())?;
    reject_reserved(id, prompt)?;
    if let Some(annotation) = target.annotation() {
        reject_reserved(id, annotation)?;
    }
    for chunk in context {
        reject_reserved(id, chunk.original_text())?;
    }

    let mut out = String::new();
    out.push_str(&format!("{TASK_HEADER}{id}\n\n"));
    out.push_str(&format!("{CATEGORY_PREFIX}{}\n\n", target.category().label()));

    out.push_str(&format!("{INSTRUCTIONS_HEADING}\n\n"));
    out.push_str(prompt.trim_end());
    out.push('\n');
    if let Some(annotation) = target.annotation() {
        out.push_str(&format!("\n{GUIDANCE_SEPARATOR}\n{}\n", annotation.trim_end()));
    }

    out.push_str("\n## Document Structure\n\n");
    if context.is_empty() {
        out.push_str("No other parts of the document are shown. Work only with the text below.\n");
    } else {
        out.push_str("Read-only context from the same document. Do not edit or repeat it.\n");
        for chunk in context {
            let role = match chunk.lock_type() {
                Some(lock) => format!("lock:{lock}"),
                None => chunk.category().label().to_lowercase(),
            };
            out.push_str(&format!(
                "\n{MARKER_PREFIX}CONTEXT {} {role}>>>\n{}\n{CONTEXT_END}\n",
                chunk.id(),
                chunk.original_text()
            ));
        }
    }

    out.push_str("\n## Text to Edit\n\n");
    out.push_str(&format!("{TEXT_BEGIN}\n{}\n{TEXT_END}\n", target.original_text()));

    out.push_str("\n## Your Response\n\n");
    out.push_str(
        "Write ONLY the edited text below the response marker. \
         Do not include explanations or the original text.\n\n",
    );
    out.push_str(RESPONSE_MARKER);
    out.push('\n');
    Ok(out)
}

/// A marker line found in the artifact: where it starts and where the line
/// after it begins.
#[derive(Clone, Copy)]
struct Line {
    start: usize,
    next: usize,
}

fn find_unique(
    lines: &[(Line, &str)],
    what: &str,
    matches: impl Fn(&str) -> bool,
) -> Result<(Line, String), ProtocolError> {
    let mut found = lines.iter().filter(|(_, text)| matches(*text));
    let first = found
        .next()
        .ok_or_else(|| ProtocolError::Malformed(format!("missing {what}")))?;
    if found.next().is_some() {
        return Err(ProtocolError::Malformed(format!("duplicated {what}")));
    }
    Ok((first.0, first.1.to_owned()))
}

/// Parses an artifact produced by [`encode`], possibly with a reply appended.
///
/// The response is everything after the response marker with leading blank
/// lines and trailing whitespace removed; an empty remainder decodes as
/// `None`.
///
/// # Errors
///
/// [`ProtocolError::Malformed`] when the instructions heading is missing,
/// when the header above it lacks the task or category line, or when any
/// delimiter is missing, duplicated or out of order.
pub fn decode(artifact: &str) -> Result<DecodedArtifact, ProtocolError> {
    let mut lines = Vec::new();
    let mut pos = 0;
    for raw in artifact.split_inclusive('\n') {
        let text = raw.trim_end_matches('\n').trim_end_matches('\r');
        lines.push((
            Line {
                start: pos,
                next: pos + raw.len(),
            },
            text,
        ));
        pos += raw.len();
    }

    let heading = lines
        .iter()
        .position(|(_, text)| *text == INSTRUCTIONS_HEADING)
        .ok_or_else(|| ProtocolError::Malformed("missing instructions heading".to_owned()))?;
    let header_lines = &lines[..heading];

    let (_, header) = find_unique(header_lines, "task header", |l| l.starts_with(TASK_HEADER))?;
    let chunk_id = header[TASK_HEADER.len()..].trim();
    if chunk_id.is_empty() {
        return Err(ProtocolError::Malformed("empty task identifier".to_owned()));
    }

    let (_, category_line) =
        find_unique(header_lines, "category line", |l| l.starts_with(CATEGORY_PREFIX))?;
    let category = Category::from_label(&category_line[CATEGORY_PREFIX.len()..])
        .filter(|c| c.is_editable())
        .ok_or_else(|| ProtocolError::Malformed(format!("unknown category in {category_line:?}")))?;

    let (begin, _) = find_unique(&lines, "text begin marker", |l| l == TEXT_BEGIN)?;
    let (end, _) = find_unique(&lines, "text end marker", |l| l == TEXT_END)?;
    let (response, _) = find_unique(&lines, "response marker", |l| l == RESPONSE_MARKER)?;
    if !(begin.start < end.start && end.start < response.start) {
        return Err(ProtocolError::Malformed("markers out of order".to_owned()));
    }

    let body = &artifact[begin.next..end.start];
    let original_text = body.strip_suffix('\n').unwrap_or(body).to_owned();

    let reply = artifact[response.next..]
        .trim_start_matches(['\n', '\r'])
        .trim_end();

    Ok(DecodedArtifact {
        chunk_id: ChunkId::new(chunk_id),
        category,
        original_text,
        response: (!reply.is_empty()).then(|| reply.to_owned()),
    })
}

/// True when `artifact` decodes and already carries a reply.
pub fn has_response(artifact: &str) -> bool {
    decode(artifact).is_ok_and(|d| d.response.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sentinel_lines_are_reserved() {
        assert!(is_reserved("<<<MEO RESPONSE>>>\r"));
        assert!(!is_reserved("# Edit Task: x"));
        assert!(!is_reserved("**Category:** essay"));
    }

    #[test]
    fn missing_response_marker_is_malformed() {
        let text = "# Edit Task: chunk_001\n**Category:** Tweak\n## Instructions\n<<<MEO TEXT BEGIN>>>\nx\n<<<MEO TEXT END>>>\n";
        assert!(matches!(decode(text), Err(ProtocolError::Malformed(_))));
    }
}
