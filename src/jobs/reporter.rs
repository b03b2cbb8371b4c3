//! The worker's write side of a job's status channel.

use crate::jobs::state::{JobId, JobState};
use crate::sink::result_sink::ResultSummary;
use log::{debug, info, warn};
use std::fmt::Display;
use tokio::sync::watch;

const ABANDONED_REASON: &str =
    "The download stopped unexpectedly before it finished. Please try again.";

/// Publishes state transitions of one job.
///
/// Every update replaces the whole [`JobState`], so readers never observe a
/// state paired with another state's progress. Terminal states are final:
/// later calls are ignored. Dropping a reporter whose job is not terminal
/// marks the job failed, so a panicking or cancelled worker never leaves a
/// job stuck in `Pending` or `Running`.
pub struct JobReporter {
    job_id: JobId,
    tx: watch::Sender<JobState>,
}

impl JobReporter {
    pub(crate) fn channel(job_id: JobId) -> (Self, watch::Receiver<JobState>) {
        let (tx, rx) = watch::channel(JobState::Pending);
        (Self { job_id, tx }, rx)
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn current(&self) -> JobState {
        self.tx.borrow().clone()
    }

    /// `Pending` -> `Running` at 0%.
    pub fn start(&self) {
        let started = self.tx.send_if_modified(|state| match state {
            JobState::Pending => {
                *state = JobState::Running { progress: 0 };
                true
            }
            _ => false,
        });
        if started {
            info!("Job {} is running", self.job_id);
        }
    }

    /// Raises progress of a running job. Lower values are ignored and values
    /// are capped at 99.
    pub fn progress(&self, percent: u8) {
        let percent = percent.min(99);
        let job_id = self.job_id;
        self.tx.send_if_modified(|state| match state {
            JobState::Running { progress } if percent > *progress => {
                *progress = percent;
                debug!("Job {} at {}%", job_id, percent);
                true
            }
            _ => false,
        });
    }

    pub fn succeed(&self, summary: ResultSummary) {
        let job_id = self.job_id;
        self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            info!("Job {} succeeded: {}", job_id, summary.key);
            *state = JobState::Succeeded { summary };
            true
        });
    }

    pub fn fail(&self, reason: impl Display) {
        let reason = reason.to_string();
        let job_id = self.job_id;
        self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            warn!("Job {} failed: {}", job_id, reason);
            *state = JobState::Failed {
                progress: state.progress(),
                reason,
            };
            true
        });
    }
}

impl Drop for JobReporter {
    fn drop(&mut self) {
        if !self.tx.borrow().is_terminal() {
            self.fail(ABANDONED_REASON);
        }
    }
}
