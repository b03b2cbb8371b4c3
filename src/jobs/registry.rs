//! Job table shared by the session gate and the tracker.

use crate::jobs::error::JobError;
use crate::jobs::reporter::JobReporter;
use crate::jobs::state::{JobId, JobSnapshot, JobState};
use crate::types::selector::StationSelector;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

struct JobEntry {
    session_id: String,
    selector: StationSelector,
    status: watch::Receiver<JobState>,
}

impl JobEntry {
    fn is_active(&self) -> bool {
        !self.status.borrow().is_terminal()
    }
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<JobId, JobEntry>,
    /// The most recent job of each session.
    latest_by_session: HashMap<String, JobId>,
}

/// Every job not yet forgotten, plus the one-active-job-per-session rule.
///
/// The check and the insert of [`JobRegistry::register`] happen under a single
/// lock, so two simultaneous submissions for one session cannot both pass.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<Jobs>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Jobs> {
        // The table stays consistent even if a holder panicked.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits a new job for `session_id`, or rejects it while the session's
    /// previous job is still pending or running.
    pub fn register(
        &self,
        session_id: &str,
        selector: StationSelector,
    ) -> Result<(JobId, JobReporter), JobError> {
        let mut jobs = self.lock();
        if let Some(&job_id) = jobs.latest_by_session.get(session_id) {
            if jobs.entries.get(&job_id).is_some_and(JobEntry::is_active) {
                info!("Rejected download for session {}: job {} in progress", session_id, job_id);
                return Err(JobError::SessionBusy {
                    session_id: session_id.to_string(),
                    job_id,
                });
            }
        }

        let job_id = JobId::new();
        let (reporter, status) = JobReporter::channel(job_id);
        info!(
            "Accepted job {} for session {}: {} {} {}..{}",
            job_id,
            session_id,
            selector.station_id(),
            selector.frequency(),
            selector.start(),
            selector.end()
        );
        jobs.entries.insert(
            job_id,
            JobEntry {
                session_id: session_id.to_string(),
                selector,
                status,
            },
        );
        jobs.latest_by_session.insert(session_id.to_string(), job_id);
        Ok((job_id, reporter))
    }

    /// Current snapshot of a job; never blocks on the worker.
    pub fn poll(&self, job_id: JobId) -> Result<JobSnapshot, JobError> {
        let jobs = self.lock();
        let entry = jobs.entries.get(&job_id).ok_or(JobError::UnknownJob(job_id))?;
        let snapshot = JobSnapshot::from(&*entry.status.borrow());
        Ok(snapshot)
    }

    /// The selector a job was submitted with.
    pub fn selector(&self, job_id: JobId) -> Option<StationSelector> {
        self.lock().entries.get(&job_id).map(|entry| entry.selector.clone())
    }

    /// Drops a terminal job. Returns whether a record was removed; forgetting
    /// an unknown or already forgotten job is not an error.
    pub fn forget(&self, job_id: JobId) -> Result<bool, JobError> {
        let mut jobs = self.lock();
        let Some(entry) = jobs.entries.get(&job_id) else {
            debug!("Forget of unknown job {} ignored", job_id);
            return Ok(false);
        };
        if entry.is_active() {
            return Err(JobError::StillActive(job_id));
        }
        let session_id = entry.session_id.clone();
        jobs.entries.remove(&job_id);
        if jobs.latest_by_session.get(&session_id) == Some(&job_id) {
            jobs.latest_by_session.remove(&session_id);
        }
        debug!("Forgot job {}", job_id);
        Ok(true)
    }

    /// Number of jobs that are pending or running.
    pub fn active_count(&self) -> usize {
        self.lock().entries.values().filter(|entry| entry.is_active()).count()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
