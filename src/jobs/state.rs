//! Lifecycle states of a download job and the snapshot handed to pollers.

use crate::sink::result_sink::ResultSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, never-reused identifier of one accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Full state of a job as written by its worker.
///
/// `Running` progress stays below 100; only `Succeeded` reports 100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running { progress: u8 },
    Succeeded { summary: ResultSummary },
    Failed { progress: u8, reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }

    pub fn progress(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running { progress } | JobState::Failed { progress, .. } => *progress,
            JobState::Succeeded { .. } => 100,
        }
    }

    pub fn phase(&self) -> JobPhase {
        match self {
            JobState::Pending => JobPhase::Pending,
            JobState::Running { .. } => JobPhase::Running,
            JobState::Succeeded { .. } => JobPhase::Succeeded,
            JobState::Failed { .. } => JobPhase::Failed,
        }
    }
}

/// The state tag reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Pending => "PENDING",
            JobPhase::Running => "RUNNING",
            JobPhase::Succeeded => "SUCCEEDED",
            JobPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// What a poll returns: `summary` is set only when succeeded, `error` only when failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub state: JobPhase,
    pub progress: u8,
    pub summary: Option<ResultSummary>,
    pub error: Option<String>,
}

impl From<&JobState> for JobSnapshot {
    fn from(state: &JobState) -> Self {
        let (summary, error) = match state {
            JobState::Succeeded { summary } => (Some(summary.clone()), None),
            JobState::Failed { reason, .. } => (None, Some(reason.clone())),
            JobState::Pending | JobState::Running { .. } => (None, None),
        };
        Self {
            state: state.phase(),
            progress: state.progress(),
            summary,
            error,
        }
    }
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobPhase::Succeeded | JobPhase::Failed)
    }
}
