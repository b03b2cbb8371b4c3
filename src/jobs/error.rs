use crate::jobs::state::JobId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Session '{session_id}' already has download {job_id} in progress")]
    SessionBusy { session_id: String, job_id: JobId },

    #[error("Unknown or forgotten download job {0}")]
    UnknownJob(JobId),

    #[error("Download job {0} is still in progress and cannot be forgotten")]
    StillActive(JobId),
}
