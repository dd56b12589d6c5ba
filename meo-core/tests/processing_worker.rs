//! Integration tests for the processing worker.
//!
//! Exercises: processing::run and processing::spawn against real session
//! directories, covering cancellation, damaged artifacts, agent failures
//! and reuse of replies already present on disk.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meo_core::agent::{append_response, CompletionAgent};
use meo_core::error::AgentError;
use meo_core::presets::PresetCatalog;
use meo_core::processing::{self, CancelFlag, ChunkStatus, ProcessingEvent};
use meo_core::project::ProjectState;
use meo_core::session::{Session, SessionSettings, SessionStatus, SessionStore, TASKS_DIR};
use meo_core::types::{ChunkId, NewChunk, Outcome, TextRange};

const PRESETS: &str = r#"
[[preset]]
id = "tighter"
name = "Tighter"
prompt_template = "Cut every needless word."
categories = ["replace", "tweak"]
"#;

const DOC: &str = "One fish.\n\nTwo fish.\n\nRed fish.\n";

fn find(needle: &str) -> TextRange {
    let start = DOC.find(needle).unwrap();
    TextRange::new(start, start + needle.len()).unwrap()
}

fn id(n: u32) -> ChunkId {
    ChunkId::from_sequence(n)
}

/// A session over three editable chunks, processed in document order.
fn setup() -> (tempfile::TempDir, Session) {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("fish.md");
    std::fs::write(&source, DOC).unwrap();

    let mut project = ProjectState::new("fish.md", DOC);
    for needle in ["One fish.", "Two fish.", "Red fish."] {
        project
            .add_chunk(DOC, NewChunk::tweak(find(needle), "tighter"))
            .unwrap();
    }
    let store = SessionStore::new(dir.path().join("sessions"));
    let presets = PresetCatalog::from_toml(PRESETS).unwrap();
    let session = store
        .create(&source, DOC, &project, &presets, SessionSettings::default())
        .unwrap();
    (dir, session)
}

/// An agent that upper-cases the original text and counts its calls.
fn counting_agent(
    calls: Arc<AtomicUsize>,
) -> CompletionAgent<impl FnMut(&str) -> Result<String, AgentError> + Send> {
    CompletionAgent::new(move |artifact: &str| -> Result<String, AgentError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let decoded = meo_core::protocol::decode(artifact)
            .map_err(|e| AgentError::Invocation(e.to_string()))?;
        Ok(decoded.original_text.to_uppercase())
    })
}

fn statuses(rx: &crossbeam_channel::Receiver<ProcessingEvent>) -> Vec<(usize, ChunkStatus)> {
    rx.try_iter()
        .filter_map(|event| match event {
            ProcessingEvent::Progress { index, status, .. } => Some((index, status)),
            ProcessingEvent::Finished { .. } => None,
        })
        .collect()
}

#[test]
fn run_processes_every_pending_chunk_in_order() {
    let (_dir, mut session) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut agent = counting_agent(calls.clone());
    let (tx, rx) = crossbeam_channel::unbounded();

    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();

    assert_eq!(report.generated, [id(1), id(2), id(3)]);
    assert!(report.failed.is_empty() && report.pending.is_empty());
    assert_eq!(report.summary(), "3 generated, 0 failed, 0 pending");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.status(), SessionStatus::Reviewing);
    assert_eq!(session.working_text(), "ONE FISH.\n\nTWO FISH.\n\nRED FISH.\n");

    assert_eq!(
        statuses(&rx),
        [
            (0, ChunkStatus::Started),
            (0, ChunkStatus::Generated),
            (1, ChunkStatus::Started),
            (1, ChunkStatus::Generated),
            (2, ChunkStatus::Started),
            (2, ChunkStatus::Generated),
        ]
    );
}

#[test]
fn cancelled_run_skips_remaining_chunks() {
    let (_dir, mut session) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut agent = counting_agent(calls.clone());
    let (tx, rx) = crossbeam_channel::unbounded();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = processing::run(&mut session, &mut agent, &tx, &cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.skipped, [id(1), id(2), id(3)]);
    assert_eq!(report.summary(), "0 generated, 0 failed, 3 pending (cancelled)");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(statuses(&rx).is_empty());
    assert_eq!(session.pending_chunks().len(), 3);
    assert_eq!(session.working_text(), DOC);
}

#[test]
fn existing_reply_is_reused_without_calling_the_agent() {
    let (_dir, mut session) = setup();
    append_response(&session.artifact_path(&id(2)), "Blue fish.").unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut agent = counting_agent(calls.clone());
    let (tx, rx) = crossbeam_channel::unbounded();
    processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(statuses(&rx).contains(&(1, ChunkStatus::Reused)));
    assert_eq!(session.working_text(), "ONE FISH.\n\nBlue fish.\n\nRED FISH.\n");
}

#[test]
fn damaged_artifacts_are_rebuilt_before_the_agent_runs() {
    let (_dir, mut session) = setup();
    std::fs::write(session.artifact_path(&id(1)), "scribbles, no markers\n").unwrap();
    // A well-formed artifact filed under the wrong chunk is damaged too.
    let other = std::fs::read_to_string(session.artifact_path(&id(3))).unwrap();
    std::fs::write(session.artifact_path(&id(2)), other).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut agent = counting_agent(calls.clone());
    let (tx, _rx) = crossbeam_channel::unbounded();
    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();

    assert_eq!(report.generated, [id(1), id(2), id(3)]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.working_text(), "ONE FISH.\n\nTWO FISH.\n\nRED FISH.\n");
}

#[test]
fn artifact_without_pristine_copy_leaves_chunk_pending() {
    let (_dir, mut session) = setup();
    std::fs::write(session.artifact_path(&id(1)), "scribbles, no markers\n").unwrap();
    std::fs::remove_file(session.dir().join(TASKS_DIR).join("chunk_001.md")).unwrap();

    let mut agent =
        CompletionAgent::new(|_: &str| -> Result<String, AgentError> { Ok("Fishy.".to_owned()) });
    let (tx, rx) = crossbeam_channel::unbounded();
    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();

    assert_eq!(report.generated, [id(2), id(3)]);
    assert!(matches!(statuses(&rx)[1], (0, ChunkStatus::Malformed(_))));
    let record = session.record(&id(1)).unwrap();
    assert_eq!(record.outcome, Outcome::Pending);
    assert!(record.error.is_some());
    assert_eq!(session.pending_chunks(), [id(1)]);
}

#[test]
fn echoed_artifact_is_regenerated_on_the_next_run() {
    let (_dir, mut session) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    // The first reply repeats the whole task, duplicating its delimiters.
    let mut agent = CompletionAgent::new(move |artifact: &str| -> Result<String, AgentError> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(artifact.to_owned());
        }
        let decoded = meo_core::protocol::decode(artifact)
            .map_err(|e| AgentError::Invocation(e.to_string()))?;
        Ok(decoded.original_text.to_uppercase())
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();
    assert_eq!(report.generated, [id(2), id(3)]);
    assert_eq!(report.pending.len(), 1);
    assert!(report.pending[0].1.contains("duplicated"));
    assert!(matches!(statuses(&rx)[1], (0, ChunkStatus::Malformed(_))));
    assert_eq!(session.pending_chunks(), [id(1)]);

    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();
    assert_eq!(report.generated, [id(1)]);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(session.record(&id(1)).unwrap().outcome, Outcome::Generated);
    assert!(session.pending_chunks().is_empty());
    assert_eq!(session.working_text(), "ONE FISH.\n\nTWO FISH.\n\nRED FISH.\n");
}

#[test]
fn agent_errors_and_empty_replies_leave_chunks_pending() {
    let (_dir, mut session) = setup();
    let mut replies = vec![
        Err(AgentError::Invocation("exit status 1".to_owned())),
        Ok("   \n".to_owned()),
    ]
    .into_iter();
    let mut agent = CompletionAgent::new(move |_: &str| -> Result<String, AgentError> {
        replies
            .next()
            .unwrap_or_else(|| Ok("Green fish.".to_owned()))
    });
    let (tx, rx) = crossbeam_channel::unbounded();
    let report = processing::run(&mut session, &mut agent, &tx, &CancelFlag::new()).unwrap();

    assert_eq!(report.generated, [id(3)]);
    assert_eq!(report.pending.len(), 2);
    assert!(report.pending[0].1.contains("exit status 1"));
    let statuses = statuses(&rx);
    assert!(matches!(statuses[1], (0, ChunkStatus::AgentFailed(_))));
    assert!(matches!(statuses[3], (1, ChunkStatus::AgentFailed(_))));
    assert_eq!(session.working_text(), "One fish.\n\nTwo fish.\n\nGreen fish.\n");
}

#[test]
fn spawned_worker_hands_the_session_back() {
    let (_dir, session) = setup();
    let session_id = session.id().to_owned();
    let agent = Box::new(counting_agent(Arc::new(AtomicUsize::new(0))));
    let (tx, rx) = crossbeam_channel::unbounded();

    let handle = processing::spawn(session, agent, tx, CancelFlag::new()).unwrap();
    let finished = loop {
        match rx.recv_timeout(Duration::from_secs(30)).unwrap() {
            ProcessingEvent::Progress { .. } => continue,
            finished @ ProcessingEvent::Finished { .. } => break finished,
        }
    };
    handle.join().unwrap();

    let ProcessingEvent::Finished { session, result } = finished else {
        unreachable!()
    };
    assert_eq!(session.id(), session_id);
    assert_eq!(result.unwrap().generated.len(), 3);
    assert_eq!(session.status(), SessionStatus::Reviewing);
}
