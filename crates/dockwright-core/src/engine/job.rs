use super::error::EngineError;
use super::progress::{EventStream, ProgressEvent};
use super::registry::JobKey;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Transitions only move forward; terminal states are final.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        })
    }
}

/// How an external process ended; `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exited with status {code}"),
            None => f.write_str("was terminated by a signal"),
        }
    }
}

/// One docking run's bookkeeping.
#[derive(Debug, Clone)]
pub struct DockingJob {
    pub project: String,
    pub replicas: usize,
    pub log_path: PathBuf,
    pub score_table: PathBuf,
    state: JobState,
}

impl DockingJob {
    pub fn new(project: &str, replicas: usize, log_path: PathBuf, score_table: PathBuf) -> Self {
        Self {
            project: project.to_string(),
            replicas,
            log_path,
            score_table,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn transition(&mut self, next: JobState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::Internal(format!(
                "job for project '{}' cannot move from {} to {}",
                self.project, self.state, next
            )));
        }
        debug!(project = %self.project, from = %self.state, to = %next, "Job state transition.");
        self.state = next;
        Ok(())
    }
}

/// Caller's view of a submitted job: its events and its eventual terminal state.
#[derive(Debug)]
pub struct JobHandle {
    pub project: String,
    pub key: JobKey,
    pub replicas: usize,
    pub log_path: PathBuf,
    pub score_table: PathBuf,
    events: EventStream,
    task: JoinHandle<JobState>,
}

impl JobHandle {
    pub(crate) fn new(job: &DockingJob, key: JobKey, events: EventStream, task: JoinHandle<JobState>) -> Self {
        Self {
            project: job.project.clone(),
            key,
            replicas: job.replicas,
            log_path: job.log_path.clone(),
            score_table: job.score_table.clone(),
            events,
            task,
        }
    }

    /// The next event, or `None` once the job has finished and every event was read.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Waits for the supervising task and returns the job's terminal state.
    pub async fn wait(self) -> Result<JobState, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::Internal(format!("docking supervisor failed: {e}")))
    }

    /// Drains every remaining event, then waits for the terminal state.
    pub async fn collect(mut self) -> Result<(Vec<ProgressEvent>, JobState), EngineError> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        let state = self.wait().await?;
        Ok((events, state))
    }
}
