//! Integration tests for the chunk model and its sidecar.
//!
//! Exercises: add_chunk, remove_chunk, list_chunks, in_execution_order,
//! set_execution_order, save_sidecar / load_sidecar, is_stale.

use meo_core::error::{ModelError, StorageError};
use meo_core::project::ProjectState;
use meo_core::sidecar::{load_or_create, load_sidecar, save_sidecar, sidecar_path};
use meo_core::types::{Category, ChunkId, LockType, NewChunk, TextRange};
use proptest::prelude::*;

const DOC: &str = "# Title\n\nFirst paragraph here.\n\nSecond paragraph here.\n\nThird one.\n";

fn range(start: usize, end: usize) -> TextRange {
    TextRange::new(start, end).unwrap()
}

fn find(doc: &str, needle: &str) -> TextRange {
    let start = doc.find(needle).unwrap();
    range(start, start + needle.len())
}

fn sample_state() -> ProjectState {
    let mut state = ProjectState::new("draft.md", DOC);
    state
        .add_chunk(DOC, NewChunk::replace(find(DOC, "Second paragraph here."), "tighter"))
        .unwrap();
    state
        .add_chunk(
            DOC,
            NewChunk::lock(find(DOC, "First paragraph here."), LockType::Context),
        )
        .unwrap();
    state
        .add_chunk(
            DOC,
            NewChunk::tweak(find(DOC, "Third one."), "flow").with_annotation("less abrupt"),
        )
        .unwrap();
    state
}

#[test]
fn chunks_list_in_document_order_and_run_in_creation_order() {
    let state = sample_state();

    let listed: Vec<&str> = state.list_chunks().iter().map(|c| c.id().as_str()).collect();
    assert_eq!(listed, ["chunk_002", "chunk_001", "chunk_003"]);

    let ordered: Vec<&str> = state
        .in_execution_order()
        .iter()
        .map(|c| c.id().as_str())
        .collect();
    assert_eq!(ordered, ["chunk_001", "chunk_002", "chunk_003"]);

    let first = state.chunk(&ChunkId::new("chunk_002")).unwrap();
    assert_eq!(first.original_text(), "First paragraph here.");
    assert_eq!(first.category(), Category::Lock);
    assert_eq!(first.direction_preset_id(), None);
}

#[test]
fn execution_order_can_be_changed() {
    let mut state = sample_state();
    state
        .set_execution_order(&ChunkId::new("chunk_003"), 0)
        .unwrap();
    state
        .set_execution_order(&ChunkId::new("chunk_001"), 0)
        .unwrap();

    let ordered: Vec<&str> = state
        .in_execution_order()
        .iter()
        .map(|c| c.id().as_str())
        .collect();
    // Equal orders fall back to id.
    assert_eq!(ordered, ["chunk_001", "chunk_003", "chunk_002"]);

    let err = state
        .set_execution_order(&ChunkId::new("chunk_404"), 1)
        .unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
}

#[test]
fn chunk_added_after_maximal_order_keeps_the_maximum() {
    let mut state = sample_state();
    state
        .set_execution_order(&ChunkId::new("chunk_003"), u32::MAX)
        .unwrap();
    let added = state
        .add_chunk(DOC, NewChunk::lock(find(DOC, "# Title"), LockType::Context))
        .unwrap();
    assert_eq!(added.execution_order(), u32::MAX);
}

#[test]
fn overlapping_range_is_rejected_and_state_unchanged() {
    let mut state = sample_state();
    let before = state.clone();

    let second = find(DOC, "Second paragraph here.");
    let overlapping = range(second.start() + 3, second.end() + 2);
    let err = state
        .add_chunk(DOC, NewChunk::replace(overlapping, "richer"))
        .unwrap_err();
    match err {
        ModelError::RangeConflict { existing, .. } => assert_eq!(existing.as_str(), "chunk_001"),
        other => panic!("expected RangeConflict, got {other:?}"),
    }
    assert_eq!(state, before);
}

#[test]
fn invalid_ranges_and_descriptors_are_rejected() {
    let mut state = ProjectState::new("draft.md", DOC);

    assert!(matches!(TextRange::new(5, 5), Err(ModelError::InvalidRange { .. })));
    assert!(matches!(
        state.add_chunk(DOC, NewChunk::replace(range(0, DOC.len() + 1), "richer")),
        Err(ModelError::OutOfBounds { .. })
    ));

    let mut missing_direction = NewChunk::replace(range(0, 7), "richer");
    missing_direction.direction_preset_id = None;
    assert!(matches!(
        state.add_chunk(DOC, missing_direction),
        Err(ModelError::MissingDirection { category: Category::Replace })
    ));

    let mut lock_with_direction = NewChunk::lock(range(0, 7), LockType::Example);
    lock_with_direction.direction_preset_id = Some("richer".to_owned());
    assert!(matches!(
        state.add_chunk(DOC, lock_with_direction),
        Err(ModelError::UnexpectedDirection)
    ));

    assert!(state.list_chunks().is_empty());
}

#[test]
fn next_id_follows_highest_sequence() {
    let mut state = sample_state();
    state.remove_chunk(&ChunkId::new("chunk_003")).unwrap();
    assert!(matches!(
        state.remove_chunk(&ChunkId::new("chunk_003")),
        Err(ModelError::NotFound(_))
    ));
    let added = state
        .add_chunk(DOC, NewChunk::lock(find(DOC, "# Title"), LockType::Reference))
        .unwrap();
    assert_eq!(added.id().as_str(), "chunk_003");
    assert_eq!(state.next_chunk_id().as_str(), "chunk_004");
}

#[test]
fn display_name_truncates_long_text() {
    let state = sample_state();
    let chunk = state.chunk(&ChunkId::new("chunk_001")).unwrap();
    assert_eq!(chunk.display_name(), "chunk_001: Second paragraph here.");

    let long = "x".repeat(40);
    let mut other = ProjectState::new("long.md", &long);
    let chunk = other
        .add_chunk(&long, NewChunk::replace(range(0, 40), "richer"))
        .unwrap();
    assert_eq!(chunk.display_name(), format!("chunk_001: {}...", "x".repeat(30)));
}

#[test]
fn sidecar_round_trip_is_lossless() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("draft.md");
    std::fs::write(&source, DOC).unwrap();

    assert!(load_sidecar(&source).unwrap().is_none());

    let state = sample_state();
    let written = save_sidecar(&source, &state).unwrap();
    assert_eq!(written, sidecar_path(&source));
    assert!(written.to_string_lossy().ends_with("draft.md.meo.toml"));

    let loaded = load_sidecar(&source).unwrap().unwrap();
    assert_eq!(loaded, state);
    assert!(!loaded.is_stale(DOC));
    assert!(loaded.is_stale(&DOC.replace("Third", "Fourth")));
}

#[test]
fn sidecar_with_unknown_field_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("draft.md");
    let state = sample_state();
    save_sidecar(&source, &state).unwrap();

    let path = sidecar_path(&source);
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("surprise = true\n{text}")).unwrap();

    assert!(matches!(load_sidecar(&source), Err(StorageError::Parse { .. })));
}

#[test]
fn sidecar_with_tampered_text_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("draft.md");
    save_sidecar(&source, &sample_state()).unwrap();

    let path = sidecar_path(&source);
    let text = std::fs::read_to_string(&path).unwrap();
    let tampered = text.replace("Third one.", "Third one!!");
    std::fs::write(&path, tampered).unwrap();

    assert!(load_sidecar(&source).is_err());
}

#[test]
fn load_or_create_starts_empty_project() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("fresh.md");
    let state = load_or_create(&source, DOC).unwrap();
    assert_eq!(state.source_file(), "fresh.md");
    assert!(state.list_chunks().is_empty());
    assert!(!state.is_stale(DOC));
}

proptest! {
    #[test]
    fn chunk_set_never_overlaps(
        attempts in prop::collection::vec((0usize..200, 1usize..40), 1..40)
    ) {
        let doc = "abcdefghij".repeat(20);
        let mut state = ProjectState::new("p.md", &doc);
        for (start, len) in attempts {
            let Ok(r) = TextRange::new(start, start + len) else { continue };
            let before = state.clone();
            if state.add_chunk(&doc, NewChunk::replace(r, "richer")).is_err() {
                prop_assert_eq!(&state, &before);
            }
        }
        prop_assert!(state.validate().is_ok());
        for pair in state.list_chunks().windows(2) {
            prop_assert!(pair[0].range().end() <= pair[1].range().start());
        }
        for chunk in state.list_chunks() {
            prop_assert_eq!(chunk.range().slice(&doc), Some(chunk.original_text()));
        }
    }
}
