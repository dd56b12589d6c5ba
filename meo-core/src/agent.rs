//! The external agent seam.
//!
//! The processing worker only knows [`Agent::invoke`]: fill the response
//! region of one task file. Most agents are plain completion functions, so
//! [`CompletionAgent`] adapts any [`Completion`] to that contract.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::AgentError;
use crate::protocol;

/// Fills the response region of a task artifact on disk.
pub trait Agent: Send {
    /// Reads the artifact at `artifact` and appends a reply after its
    /// response marker.
    ///
    /// # Errors
    ///
    /// [`AgentError`] when the agent cannot be reached or produces nothing.
    fn invoke(&mut self, artifact: &Path) -> Result<(), AgentError>;
}

/// A `(prompt) -> text` completion function.
pub trait Completion: Send {
    /// # Errors
    ///
    /// [`AgentError::Invocation`] on transport or process failure.
    fn complete(&mut self, prompt: &str) -> Result<String, AgentError>;
}

impl<F> Completion for F
where
    F: FnMut(&str) -> Result<String, AgentError> + Send,
{
    fn complete(&mut self, prompt: &str) -> Result<String, AgentError> {
        self(prompt)
    }
}

/// Sends the whole artifact as the prompt and appends the completion.
#[derive(Debug, Clone)]
pub struct CompletionAgent<C> {
    completion: C,
}

impl<C: Completion> CompletionAgent<C> {
    pub fn new(completion: C) -> Self {
        Self { completion }
    }
}

impl<C: Completion> Agent for CompletionAgent<C> {
    fn invoke(&mut self, artifact: &Path) -> Result<(), AgentError> {
        let content = fs::read_to_string(artifact).map_err(|source| AgentError::Io {
            path: artifact.to_path_buf(),
            source,
        })?;
        let reply = self.completion.complete(&content)?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(AgentError::NoOutput);
        }
        append_response(artifact, reply)
    }
}

/// Appends `reply` to the artifact, below its response marker.
///
/// # Errors
///
/// [`AgentError::Io`] when the file cannot be opened or written.
pub fn append_response(artifact: &Path, reply: &str) -> Result<(), AgentError> {
    let io_err = |source| AgentError::Io {
        path: artifact.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new().append(true).open(artifact).map_err(io_err)?;
    writeln!(file, "\n{}", reply.trim_end()).map_err(io_err)
}

/// True when the artifact on disk already carries a reply.
pub fn has_response(artifact: &Path) -> bool {
    fs::read_to_string(artifact).is_ok_and(|text| protocol::has_response(&text))
}
