//! Runs the configured agent command as a completion function.
//!
//! The whole task artifact goes to the child's stdin and its stdout becomes
//! the reply. The processing worker calls this from its own thread, so the
//! blocking wait is fine.

use std::io::Write;
use std::process::{Command, Stdio};

use meo_core::agent::{Agent, Completion, CompletionAgent};
use meo_core::error::AgentError;

use crate::config::AgentConfig;

#[derive(Debug, Clone)]
pub struct CommandCompletion {
    command: String,
    args: Vec<String>,
}

impl CommandCompletion {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

impl Completion for CommandCompletion {
    fn complete(&mut self, prompt: &str) -> Result<String, AgentError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AgentError::Invocation(format!("cannot start {}: {e}", self.command)))?;

        // Feed stdin from a separate thread so a chatty child cannot block on
        // a full stdout pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_owned();
            std::thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| AgentError::Invocation(format!("{} did not finish: {e}", self.command)))?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The child may exit without reading everything; its status decides.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(AgentError::Invocation(format!("writing to {}: {e}", self.command)));
                }
                Err(_) => {
                    return Err(AgentError::Invocation("stdin writer panicked".to_owned()));
                }
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().next().unwrap_or_default();
            return Err(AgentError::Invocation(format!(
                "{} exited with {}: {detail}",
                self.command, output.status
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| AgentError::Invocation(format!("{} printed invalid UTF-8", self.command)))
    }
}

/// The agent the processing worker drives.
pub fn build(config: &AgentConfig) -> Box<dyn Agent> {
    tracing::debug!(command = %config.command, args = config.args.len(), "agent configured");
    Box::new(CompletionAgent::new(CommandCompletion::new(config)))
}
