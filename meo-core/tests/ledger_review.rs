//! Integration tests for sessions and the git revision ledger.
//!
//! Exercises: SessionStore::create / open / list / delete, commit_chunk,
//! approve, deny, edit_response, rollback_session, diff_chunk, history.

use std::path::{Path, PathBuf};

use meo_core::error::{LedgerError, SessionError};
use meo_core::presets::PresetCatalog;
use meo_core::project::ProjectState;
use meo_core::session::{Session, SessionSettings, SessionStatus, SessionStore};
use meo_core::types::{ChunkId, LockType, NewChunk, Outcome, TextRange};

const PRESETS: &str = r#"
[[preset]]
id = "richer"
name = "Richer"
prompt_template = "Add texture and detail."
categories = ["replace"]

[[preset]]
id = "flow"
name = "Flow"
prompt_template = "Smooth the transitions."
categories = ["tweak"]
"#;

/// Three paragraphs: chunk_001 REPLACE, chunk_002 LOCK, chunk_003 TWEAK.
const DOC: &str = "# Notes\n\nHello world.\n\nGoodbye world.\n\nSee you soon.\n";

fn find(doc: &str, needle: &str) -> TextRange {
    let start = doc.find(needle).unwrap();
    TextRange::new(start, start + needle.len()).unwrap()
}

fn id(n: u32) -> ChunkId {
    ChunkId::from_sequence(n)
}

fn project() -> ProjectState {
    let mut state = ProjectState::new("notes.md", DOC);
    state
        .add_chunk(DOC, NewChunk::replace(find(DOC, "Hello world."), "richer"))
        .unwrap();
    state
        .add_chunk(DOC, NewChunk::lock(find(DOC, "Goodbye world."), LockType::Context))
        .unwrap();
    state
        .add_chunk(DOC, NewChunk::tweak(find(DOC, "See you soon."), "flow"))
        .unwrap();
    state
}

/// Creates a session in a fresh temp dir. The `TempDir` must outlive the
/// session.
fn setup() -> (tempfile::TempDir, SessionStore, Session) {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("notes.md");
    std::fs::write(&source, DOC).unwrap();
    let store = SessionStore::new(dir.path().join("sessions"));
    let presets = PresetCatalog::from_toml(PRESETS).unwrap();
    let session = store
        .create(&source, DOC, &project(), &presets, SessionSettings::default())
        .unwrap();
    (dir, store, session)
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn summaries(session: &Session) -> Vec<String> {
    session
        .history()
        .unwrap()
        .into_iter()
        .map(|r| r.summary)
        .collect()
}

#[test]
fn create_writes_snapshot_artifacts_and_initial_commit() {
    let (_dir, store, session) = setup();

    assert_eq!(session.status(), SessionStatus::Editing);
    assert!(session.id().starts_with("notes_"));
    assert_eq!(read(&session.dir().join("original.md")), DOC);
    assert_eq!(read(&session.dir().join("working.md")), DOC);
    assert!(session.dir().join(".git").is_dir());

    assert!(session.artifact_path(&id(1)).is_file());
    assert!(!session.artifact_path(&id(2)).exists());
    assert!(session.artifact_path(&id(3)).is_file());

    // LOCK chunks still get a record so their ranges keep tracking.
    assert_eq!(session.records().len(), 3);
    assert_eq!(session.pending_chunks(), vec![id(1), id(3)]);
    assert_eq!(summaries(&session), ["Session start"]);

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, session.id());
}

#[test]
fn applied_response_shifts_later_chunks() {
    let (_dir, _store, mut session) = setup();
    let lock_before = session.record(&id(2)).unwrap().range;

    session.commit_chunk(&id(1), "Greetings, world!").unwrap();

    let working = session.working_text();
    assert!(working.contains("Greetings, world!\n\nGoodbye world."));
    let lock = session.record(&id(2)).unwrap();
    assert_eq!(lock.range.start(), lock_before.start() + 5);
    assert_eq!(lock.range.slice(working), Some("Goodbye world."));

    let record = session.record(&id(1)).unwrap();
    assert_eq!(record.outcome, Outcome::Generated);
    assert!(record.applied);
    assert_eq!(record.commits.len(), 1);
    assert_eq!(read(&session.dir().join("working.md")), working);
    assert_eq!(summaries(&session), ["Applied chunk_001", "Session start"]);
}

#[test]
fn deny_restores_original_bytes_without_touching_siblings() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.commit_chunk(&id(3), "Until next time.").unwrap();

    session.deny(&id(1)).unwrap();
    let working = session.working_text().to_owned();
    assert_eq!(working, DOC.replace("See you soon.", "Until next time."));
    let sibling = session.record(&id(3)).unwrap();
    assert_eq!(sibling.range.slice(&working), Some("Until next time."));
    assert_eq!(sibling.outcome, Outcome::Generated);
    assert!(session.diff_chunk(&id(1)).unwrap().is_empty());

    session.deny(&id(3)).unwrap();
    assert_eq!(session.working_text(), DOC);
    assert!(session.all_decided());
}

#[test]
fn approve_then_deny_leaves_empty_diff() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();

    session.approve(&id(1)).unwrap();
    assert_eq!(session.record(&id(1)).unwrap().outcome, Outcome::Approved);
    // Approving again changes nothing.
    session.approve(&id(1)).unwrap();

    session.deny(&id(1)).unwrap();
    assert_eq!(session.record(&id(1)).unwrap().outcome, Outcome::Denied);
    assert!(session.diff_chunk(&id(1)).unwrap().is_empty());
    assert_eq!(session.working_text(), DOC);
}

#[test]
fn approving_a_denied_chunk_reapplies_its_response() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.deny(&id(1)).unwrap();

    session.approve(&id(1)).unwrap();
    assert!(session.working_text().contains("Greetings, world!"));
    assert_eq!(
        summaries(&session)[0],
        "Re-applied chunk_001",
    );
}

#[test]
fn review_rejects_lock_and_pending_chunks() {
    let (_dir, _store, mut session) = setup();

    let err = session.commit_chunk(&id(2), "nope").unwrap_err();
    assert!(matches!(err, SessionError::Ledger(LedgerError::NotEditable(_))));

    let err = session.approve(&id(1)).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Ledger(LedgerError::NotReviewable {
            outcome: Outcome::Pending,
            ..
        })
    ));

    let err = session.commit_chunk(&id(9), "x").unwrap_err();
    assert!(matches!(err, SessionError::Ledger(LedgerError::UnknownChunk(_))));
}

#[test]
fn edit_response_replaces_current_text() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.approve(&id(1)).unwrap();

    session.edit_response(&id(1), "Hi there, world.\n").unwrap();
    let record = session.record(&id(1)).unwrap();
    assert_eq!(record.outcome, Outcome::Generated);
    assert_eq!(record.response.as_deref(), Some("Hi there, world."));
    assert!(session.working_text().contains("Hi there, world.\n\nGoodbye"));

    let err = session.edit_response(&id(1), "   ").unwrap_err();
    assert!(matches!(err, SessionError::Ledger(LedgerError::EmptyResponse(_))));
}

#[test]
fn rollback_resets_working_copy() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.commit_chunk(&id(3), "Until next time.").unwrap();

    session.rollback_session().unwrap();
    assert_eq!(session.working_text(), DOC);
    for record in session.records().iter().filter(|r| r.is_editable()) {
        assert_eq!(record.outcome, Outcome::Denied);
        assert!(!record.applied);
        assert_eq!(record.range, record.origin);
    }
    assert_eq!(summaries(&session)[0], "Rollback session");
    assert_eq!(summaries(&session).len(), 4);
}

#[test]
fn diff_uses_document_line_numbers() {
    let (_dir, _store, mut session) = setup();
    session.commit_chunk(&id(3), "Until\nnext time.").unwrap();

    let diff = session.diff_chunk(&id(3)).unwrap();
    assert_eq!(diff.removed, 1);
    assert_eq!(diff.added, 2);
    assert_eq!(diff.hunks.len(), 1);
    let hunk = &diff.hunks[0];
    assert_eq!(hunk.old_start, 7);
    assert_eq!(hunk.new_start, 7);
    assert_eq!(hunk.header, "@@ -7,1 +7,2 @@");

    let unified = diff.to_unified();
    assert!(unified.contains("-See you soon.\n"));
    assert!(unified.contains("+Until\n+next time.\n"));
}

#[test]
fn reopened_session_matches_saved_state() {
    let (_dir, store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.mark_pending(&id(3), "agent timed out").unwrap();

    let reopened = store.open(session.id()).unwrap();
    assert_eq!(reopened.records(), session.records());
    assert_eq!(reopened.working_text(), session.working_text());
    assert_eq!(reopened.meta(), session.meta());
    assert_eq!(
        reopened.record(&id(3)).unwrap().error.as_deref(),
        Some("agent timed out")
    );
}

#[test]
fn store_rejects_bad_ids_and_unknown_sessions() {
    let (_dir, store, session) = setup();

    assert!(matches!(store.open("../escape"), Err(SessionError::InvalidId(_))));
    assert!(matches!(store.open("missing"), Err(SessionError::NotFound(_))));

    let id = session.id().to_owned();
    drop(session);
    store.delete(&id).unwrap();
    assert!(store.list().unwrap().is_empty());
    assert!(matches!(store.delete(&id), Err(SessionError::NotFound(_))));
}

#[test]
fn create_refuses_nothing_editable_or_unknown_presets() {
    let dir = tempfile::TempDir::new().unwrap();
    let source: PathBuf = dir.path().join("notes.md");
    let store = SessionStore::new(dir.path().join("sessions"));
    let presets = PresetCatalog::from_toml(PRESETS).unwrap();

    let mut locked = ProjectState::new("notes.md", DOC);
    locked
        .add_chunk(DOC, NewChunk::lock(find(DOC, "Hello world."), LockType::Example))
        .unwrap();
    let err = store
        .create(&source, DOC, &locked, &presets, SessionSettings::default())
        .unwrap_err();
    assert!(matches!(err, SessionError::NothingToProcess));

    let mut unknown = ProjectState::new("notes.md", DOC);
    unknown
        .add_chunk(DOC, NewChunk::replace(find(DOC, "Hello world."), "vanished"))
        .unwrap();
    let err = store
        .create(&source, DOC, &unknown, &presets, SessionSettings::default())
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownPreset { preset, .. } if preset == "vanished"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn write_back_replaces_source_file() {
    let (dir, _store, mut session) = setup();
    session.commit_chunk(&id(1), "Greetings, world!").unwrap();
    session.write_back().unwrap();
    assert_eq!(read(&dir.path().join("notes.md")), session.working_text());
}
