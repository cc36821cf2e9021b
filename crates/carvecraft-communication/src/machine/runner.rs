//! Sequential G-code job execution
//!
//! The runner dispatches one line at a time through the command channel and
//! consults the machine state's run gate before each line, so pause and stop
//! take effect at line granularity.

use carvecraft_core::{ConnectionError, ControllerError, Error, Result};
use carvecraft_gcode::is_executable;
use std::sync::Arc;
use std::time::Duration;

use super::channel::CommandChannel;
use super::state::{MachineState, RunGate};

/// How the runner paces lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowControl {
    /// The reply to each line is the only pacing
    #[default]
    Acknowledged,
    /// Wait a fixed delay after each acknowledged line
    FixedDelay(Duration),
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every line was processed
    Completed {
        /// Lines sent to the controller
        dispatched: usize,
    },
    /// The job was paused before line index `next`; it is still running
    Paused {
        /// Index of the first line not yet dispatched
        next: usize,
    },
    /// The job stopped running before line index `next`
    Stopped {
        /// Index of the first line not dispatched
        next: usize,
    },
}

impl JobOutcome {
    /// Whether the job can be resumed
    pub fn is_paused(&self) -> bool {
        matches!(self, JobOutcome::Paused { .. })
    }
}

/// Runs jobs against one channel and state
#[derive(Debug, Clone)]
pub struct JobRunner {
    channel: Arc<CommandChannel>,
    state: Arc<MachineState>,
    flow_control: FlowControl,
}

impl JobRunner {
    /// Create a runner
    pub fn new(
        channel: Arc<CommandChannel>,
        state: Arc<MachineState>,
        flow_control: FlowControl,
    ) -> Self {
        Self {
            channel,
            state,
            flow_control,
        }
    }

    /// Run a job from its first line
    ///
    /// Fails with `NotConnected` before any side effect when there is no
    /// connection, and with `InvalidState` when a job is already running.
    pub async fn run(&self, lines: &[String]) -> Result<JobOutcome> {
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        if !self.state.start_job() {
            return Err(ControllerError::InvalidState {
                operation: "run".to_string(),
                state: self.state.describe(),
            }
            .into());
        }

        tracing::info!("Job started ({} lines)", lines.len());
        self.execute(lines, 0).await
    }

    /// Continue a resumed job from line index `next`
    ///
    /// The job must still be running and no longer paused.
    pub async fn run_from(&self, lines: &[String], next: usize) -> Result<JobOutcome> {
        if !self.state.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        if self.state.gate() != RunGate::Continue {
            return Err(ControllerError::InvalidState {
                operation: "resume".to_string(),
                state: self.state.describe(),
            }
            .into());
        }

        tracing::info!("Job resumed at line index {}", next);
        self.execute(lines, next).await
    }

    async fn execute(&self, lines: &[String], start: usize) -> Result<JobOutcome> {
        let mut dispatched = 0;

        for (index, line) in lines.iter().enumerate().skip(start) {
            match self.state.gate() {
                RunGate::Continue => {}
                RunGate::Paused => {
                    tracing::info!("Job paused before line index {}", index);
                    return Ok(JobOutcome::Paused { next: index });
                }
                RunGate::Stopped => {
                    tracing::info!("Job stopped before line index {}", index);
                    return Ok(JobOutcome::Stopped { next: index });
                }
            }

            if !is_executable(line) {
                continue;
            }

            if let Err(e) = self.channel.send(line).await {
                self.state.stop();
                tracing::error!("Job aborted at '{}': {}", line.trim(), e);
                return Err(with_line(e, line));
            }
            dispatched += 1;

            if let FlowControl::FixedDelay(delay) = self.flow_control {
                tokio::time::sleep(delay).await;
            }
        }

        self.state.stop();
        tracing::info!("Job completed ({} lines dispatched)", dispatched);
        Ok(JobOutcome::Completed { dispatched })
    }
}

/// Make sure a job failure names the line that caused it
fn with_line(error: Error, line: &str) -> Error {
    if error.command().is_some() {
        return error;
    }
    ControllerError::CommandFailed {
        command: line.trim().to_string(),
        reason: error.to_string(),
    }
    .into()
}
