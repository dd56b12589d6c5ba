//! Background processing of one session.
//!
//! The session is moved into a dedicated thread, which walks the pending
//! chunks in execution order: rebuild the chunk's artifact if it no longer
//! decodes, invoke the agent on it, decode the reply, patch it into the
//! working copy. Progress goes out over
//! a crossbeam channel in the same order, and the session comes back in the
//! final [`ProcessingEvent::Finished`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::agent::{self, Agent};
use crate::error::{LedgerError, SessionError};
use crate::session::{Session, SessionStatus};
use crate::types::ChunkId;

/// Shared stop request, polled between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Started,
    /// Applied from a response already present in the artifact.
    Reused,
    Generated,
    /// The reply could not be anchored; the chunk is FAILED.
    Failed(String),
    /// The artifact no longer parses after the agent ran; the chunk stays
    /// PENDING and its artifact is rebuilt on the next run.
    Malformed(String),
    /// The agent failed or left no reply; the chunk stays PENDING.
    AgentFailed(String),
}

impl ChunkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChunkStatus::Started => "working",
            ChunkStatus::Reused => "reused",
            ChunkStatus::Generated => "generated",
            ChunkStatus::Failed(_) => "failed",
            ChunkStatus::Malformed(_) => "malformed",
            ChunkStatus::AgentFailed(_) => "agent error",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ChunkStatus::Failed(m) | ChunkStatus::Malformed(m) | ChunkStatus::AgentFailed(m) => {
                Some(m)
            }
            _ => None,
        }
    }
}

/// Aggregate result of one processing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    pub generated: Vec<ChunkId>,
    /// Chunks whose reply could not be anchored.
    pub failed: Vec<(ChunkId, String)>,
    /// Chunks left pending by an agent or artifact error.
    pub pending: Vec<(ChunkId, String)>,
    /// Chunks never attempted because the run was cancelled.
    pub skipped: Vec<ChunkId>,
    pub cancelled: bool,
}

impl ProcessingReport {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} generated, {} failed, {} pending",
            self.generated.len(),
            self.failed.len(),
            self.pending.len() + self.skipped.len()
        );
        if self.cancelled {
            text.push_str(" (cancelled)");
        }
        text
    }
}

/// Messages from the processing thread.
#[derive(Debug)]
pub enum ProcessingEvent {
    Progress {
        index: usize,
        total: usize,
        chunk_id: ChunkId,
        status: ChunkStatus,
    },
    /// Always the last event. Carries the session back to the caller.
    Finished {
        session: Box<Session>,
        result: Result<ProcessingReport, SessionError>,
    },
}

/// Processes every pending chunk of `session` on the calling thread.
///
/// Per-chunk problems are recorded in the session and the report; only
/// storage and git failures abort the run.
///
/// # Errors
///
/// [`SessionError`] for failures that leave the session unusable.
pub fn run(
    session: &mut Session,
    agent: &mut dyn Agent,
    events: &Sender<ProcessingEvent>,
    cancel: &CancelFlag,
) -> Result<ProcessingReport, SessionError> {
    let queue = session.pending_chunks();
    let total = queue.len();
    let mut report = ProcessingReport::default();
    session.set_status(SessionStatus::Generating)?;
    tracing::info!(session_id = %session.id(), total, "processing started");

    for (index, id) in queue.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(
                session_id = %session.id(),
                remaining = total - index,
                "processing cancelled"
            );
            report.cancelled = true;
            report.skipped.extend(queue[index..].iter().cloned());
            break;
        }
        let progress = |status: ChunkStatus| {
            let _ = events.send(ProcessingEvent::Progress {
                index,
                total,
                chunk_id: id.clone(),
                status,
            });
        };
        progress(ChunkStatus::Started);

        let status = process_chunk(session, agent, id, &mut report)?;
        progress(status);
    }

    session.set_status(SessionStatus::Reviewing)?;
    tracing::info!(session_id = %session.id(), summary = %report.summary(), "processing finished");
    Ok(report)
}

fn process_chunk(
    session: &mut Session,
    agent: &mut dyn Agent,
    id: &ChunkId,
    report: &mut ProcessingReport,
) -> Result<ChunkStatus, SessionError> {
    if let Err(err) = session.restore_artifact(id) {
        tracing::warn!(chunk_id = %id, error = %err, "cannot rebuild artifact");
        return leave_pending(session, id, err.to_string(), report, ChunkStatus::Malformed);
    }
    let path = session.artifact_path(id);
    let reused = agent::has_response(&path);
    if !reused {
        if let Err(err) = agent.invoke(&path) {
            tracing::warn!(chunk_id = %id, error = %err, "agent failed");
            return leave_pending(session, id, err.to_string(), report, ChunkStatus::AgentFailed);
        }
    }

    let decoded = match session.read_artifact(id) {
        Ok(decoded) if &decoded.chunk_id != id => {
            let msg = format!("artifact belongs to {}", decoded.chunk_id);
            return leave_pending(session, id, msg, report, ChunkStatus::Malformed);
        }
        Ok(decoded) => decoded,
        Err(SessionError::Protocol(err)) => {
            tracing::warn!(chunk_id = %id, error = %err, "malformed artifact");
            return leave_pending(session, id, err.to_string(), report, ChunkStatus::Malformed);
        }
        Err(err) => return Err(err),
    };
    let Some(response) = decoded.response else {
        let msg = "agent left the response region empty".to_owned();
        return leave_pending(session, id, msg, report, ChunkStatus::AgentFailed);
    };

    match session.commit_chunk(id, &response) {
        Ok(()) => {
            report.generated.push(id.clone());
            Ok(if reused {
                ChunkStatus::Reused
            } else {
                ChunkStatus::Generated
            })
        }
        Err(SessionError::Ledger(LedgerError::Patch { source, .. })) => {
            let msg = source.to_string();
            report.failed.push((id.clone(), msg.clone()));
            Ok(ChunkStatus::Failed(msg))
        }
        Err(err) => Err(err),
    }
}

fn leave_pending(
    session: &mut Session,
    id: &ChunkId,
    message: String,
    report: &mut ProcessingReport,
    status: fn(String) -> ChunkStatus,
) -> Result<ChunkStatus, SessionError> {
    session.mark_pending(id, &message)?;
    report.pending.push((id.clone(), message.clone()));
    Ok(status(message))
}

/// A worker thread that never started.
#[derive(Debug)]
pub struct SpawnFailed {
    pub error: std::io::Error,
    /// The session handed to [`spawn`], if it could be taken back.
    pub session: Option<Box<Session>>,
}

/// Moves `session` onto a new thread and processes it there.
///
/// The thread always ends by sending [`ProcessingEvent::Finished`], even if
/// the run fails.
///
/// # Errors
///
/// [`SpawnFailed`] with the OS error and the session if the thread cannot
/// be spawned.
pub fn spawn(
    session: Session,
    mut agent: Box<dyn Agent>,
    events: Sender<ProcessingEvent>,
    cancel: CancelFlag,
) -> Result<JoinHandle<()>, SpawnFailed> {
    // The worker takes the session out of this slot; after a failed spawn it
    // is still there.
    let (slot_tx, slot_rx) = crossbeam_channel::bounded::<Session>(1);
    if let Err(returned) = slot_tx.send(session) {
        return Err(SpawnFailed {
            error: std::io::Error::other("session slot closed"),
            session: Some(Box::new(returned.into_inner())),
        });
    }
    let worker_slot = slot_rx.clone();
    thread::Builder::new()
        .name("meo-processing".to_owned())
        .spawn(move || {
            let Ok(mut session) = worker_slot.recv() else {
                return;
            };
            let result = run(&mut session, agent.as_mut(), &events, &cancel);
            if let Err(err) = &result {
                tracing::error!(session_id = %session.id(), error = %err, "processing aborted");
            }
            let _ = events.send(ProcessingEvent::Finished {
                session: Box::new(session),
                result,
            });
        })
        .map_err(|error| SpawnFailed {
            error,
            session: slot_rx.try_recv().ok().map(Box::new),
        })
}
