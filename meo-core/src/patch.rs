//! Anchor-based text patching.
//!
//! A patch replaces the span of the working document that currently holds
//! some anchor text. The anchor is looked up, in order:
//!
//! 1. exactly at the expected offsets,
//! 2. as the nearest exact occurrence inside the search window,
//! 3. as the nearest occurrence under the whitespace/case normalization of
//!    the active [`MatchPolicy`], searching outward from the expected offset.
//!
//! Anything else is [`PatchError::AnchorLost`]. After a splice, every
//! tracked range starting at or after the old span's end moves by the length
//! delta; ranges before it are left alone.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::types::TextRange;

/// How loosely an anchor may match the working text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchPolicy {
    /// Treat any run of whitespace as a single space, and ignore leading or
    /// trailing whitespace of the anchor.
    pub collapse_whitespace: bool,
    pub case_insensitive: bool,
    /// Maximum distance in bytes between the expected and the found start.
    pub search_window: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            case_insensitive: false,
            search_window: 4096,
        }
    }
}

impl MatchPolicy {
    /// Byte-exact matching only.
    pub fn exact() -> Self {
        Self {
            collapse_whitespace: false,
            case_insensitive: false,
            ..Self::default()
        }
    }

    fn normalizes(&self) -> bool {
        self.collapse_whitespace || self.case_insensitive
    }
}

/// Which lookup step found the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// At the expected offsets.
    Exact,
    /// Byte-exact, but moved.
    Nearby,
    /// Equal only after normalization.
    Normalized,
}

/// Where [`locate`] found an anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub span: Range<usize>,
    pub kind: MatchKind,
}

/// One normalized character and the source bytes it stands for.
#[derive(Debug, Clone, Copy)]
struct Token {
    ch: char,
    start: usize,
    end: usize,
}

fn normalize(text: &str, policy: &MatchPolicy) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::with_capacity(text.len());
    for (start, c) in text.char_indices() {
        let end = start + c.len_utf8();
        if policy.collapse_whitespace && c.is_whitespace() {
            match tokens.last_mut() {
                Some(prev) if prev.ch == ' ' && prev.end == start => prev.end = end,
                _ => tokens.push(Token { ch: ' ', start, end }),
            }
        } else if policy.case_insensitive {
            tokens.extend(c.to_lowercase().map(|ch| Token { ch, start, end }));
        } else {
            tokens.push(Token { ch: c, start, end });
        }
    }
    tokens
}

/// Finds `anchor` in `document`, preferring `expected`.
///
/// # Errors
///
/// [`PatchError::AnchorLost`] when no acceptable match lies within
/// `policy.search_window` bytes of `expected.start()`.
pub fn locate(
    document: &str,
    anchor: &str,
    expected: TextRange,
    policy: &MatchPolicy,
) -> Result<Located, PatchError> {
    let lost = PatchError::AnchorLost {
        expected,
        window: policy.search_window,
    };
    if anchor.is_empty() {
        return Err(lost);
    }

    if expected.slice(document) == Some(anchor) {
        return Ok(Located {
            span: expected.as_range(),
            kind: MatchKind::Exact,
        });
    }

    let nearest = document
        .match_indices(anchor)
        .map(|(pos, _)| pos)
        .filter(|pos| pos.abs_diff(expected.start()) <= policy.search_window)
        .min_by_key(|pos| pos.abs_diff(expected.start()));
    if let Some(pos) = nearest {
        return Ok(Located {
            span: pos..pos + anchor.len(),
            kind: MatchKind::Nearby,
        });
    }

    if policy.normalizes() {
        if let Some(span) = locate_normalized(document, anchor, expected.start(), policy) {
            return Ok(Located {
                span,
                kind: MatchKind::Normalized,
            });
        }
    }
    Err(lost)
}

fn locate_normalized(
    document: &str,
    anchor: &str,
    expected: usize,
    policy: &MatchPolicy,
) -> Option<Range<usize>> {
    let hay = normalize(document, policy);
    let mut needle: Vec<char> = normalize(anchor, policy).iter().map(|t| t.ch).collect();
    if policy.collapse_whitespace {
        while needle.last() == Some(&' ') {
            needle.pop();
        }
        let lead = needle.iter().take_while(|&&c| c == ' ').count();
        needle.drain(..lead);
    }
    let m = needle.len();
    if m == 0 || m > hay.len() {
        return None;
    }

    let matches_at = |i: usize| -> Option<Range<usize>> {
        let window = hay.get(i..i + m)?;
        let hit = window.iter().zip(&needle).all(|(t, c)| t.ch == *c);
        // A lowercase expansion must not be entered or left midway.
        let clean_start = i == 0 || hay[i - 1].start != hay[i].start;
        let clean_end = hay.get(i + m).map_or(true, |t| t.start != hay[i + m - 1].start);
        (hit && clean_start && clean_end).then(|| hay[i].start..hay[i + m - 1].end)
    };

    let window = policy.search_window;
    let pivot = hay.partition_point(|t| t.start < expected);
    for step in 0.. {
        let right = pivot + step;
        let left = pivot.checked_sub(step + 1);
        let right_open = hay.get(right).is_some_and(|t| t.start - expected <= window);
        let left_open = left
            .and_then(|l| hay.get(l))
            .is_some_and(|t| expected - t.start <= window);
        if !right_open && !left_open {
            break;
        }
        if right_open {
            if let Some(span) = matches_at(right) {
                return Some(span);
            }
        }
        if left_open {
            if let Some(span) = left.and_then(matches_at) {
                return Some(span);
            }
        }
    }
    None
}

/// Result of a successful [`PatchEngine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    /// Where the replacement now sits.
    pub span: TextRange,
    /// Length change applied to later ranges.
    pub delta: isize,
    pub kind: MatchKind,
}

/// Moves every range that starts at or after `edit_end` by `delta`.
pub fn shift_ranges<'a>(
    ranges: impl IntoIterator<Item = &'a mut TextRange>,
    edit_end: usize,
    delta: isize,
) {
    if delta == 0 {
        return;
    }
    for range in ranges {
        if range.start() >= edit_end {
            if let Some(moved) = range.shifted(delta) {
                *range = moved;
            }
        }
    }
}

/// Applies anchored replacements under one [`MatchPolicy`].
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    policy: MatchPolicy,
}

impl PatchEngine {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Replaces `anchor` (expected at `expected`) with `replacement` in
    /// `document`, then shifts `others` past the edit.
    ///
    /// A match that would overlap one of `others` counts as lost: the edit
    /// would corrupt a neighbouring chunk.
    ///
    /// # Errors
    ///
    /// [`PatchError::EmptyReplacement`] for an empty replacement and
    /// [`PatchError::AnchorLost`] when the anchor cannot be placed. The
    /// document and ranges are untouched on error.
    pub fn apply<'a>(
        &self,
        document: &mut String,
        anchor: &str,
        expected: TextRange,
        replacement: &str,
        others: impl IntoIterator<Item = &'a mut TextRange>,
    ) -> Result<Patched, PatchError> {
        if replacement.is_empty() {
            return Err(PatchError::EmptyReplacement);
        }
        let found = locate(document, anchor, expected, &self.policy)?;
        let old = TextRange::new(found.span.start, found.span.end).map_err(|_| {
            PatchError::AnchorLost {
                expected,
                window: self.policy.search_window,
            }
        })?;

        let mut others: Vec<&mut TextRange> = others.into_iter().collect();
        if others.iter().any(|r| r.overlaps(&old)) {
            return Err(PatchError::AnchorLost {
                expected,
                window: self.policy.search_window,
            });
        }

        document.replace_range(old.as_range(), replacement);
        let delta = replacement.len() as isize - old.len() as isize;
        shift_ranges(others.iter_mut().map(|r| &mut **r), old.end(), delta);

        let span = TextRange::new(old.start(), old.start() + replacement.len())
            .map_err(|_| PatchError::EmptyReplacement)?;
        if found.kind != MatchKind::Exact {
            tracing::debug!(expected = %expected, found = %old, kind = ?found.kind, "anchor moved");
        }
        Ok(Patched {
            span,
            delta,
            kind: found.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: usize, end: usize) -> TextRange {
        TextRange::new(start, end).unwrap()
    }

    #[test]
    fn exact_hit_at_expected_offsets() {
        let found = locate("one two three", "two", range(4, 7), &MatchPolicy::default()).unwrap();
        assert_eq!(found.span, 4..7);
        assert_eq!(found.kind, MatchKind::Exact);
    }

    #[test]
    fn nearest_of_several_exact_occurrences_wins() {
        let doc = "ab xx ab xx ab";
        let found = locate(doc, "ab", range(7, 9), &MatchPolicy::exact()).unwrap();
        assert_eq!(found.span, 6..8);
        assert_eq!(found.kind, MatchKind::Nearby);
    }

    #[test]
    fn case_insensitive_match_maps_back_to_source_bytes() {
        let policy = MatchPolicy {
            case_insensitive: true,
            ..MatchPolicy::exact()
        };
        let found = locate("Say HELLO there", "hello", range(4, 9), &policy).unwrap();
        assert_eq!(found.span, 4..9);
        assert_eq!(found.kind, MatchKind::Normalized);
    }

    #[test]
    fn outside_window_is_lost() {
        let policy = MatchPolicy {
            search_window: 3,
            ..MatchPolicy::exact()
        };
        let doc = format!("{}target", "x".repeat(20));
        let err = locate(&doc, "target", range(0, 6), &policy).unwrap_err();
        assert!(matches!(err, PatchError::AnchorLost { window: 3, .. }));
    }
}
