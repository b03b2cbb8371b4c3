//! Background execution of one download job.

use crate::assemble::assembler::ArchiveAssembler;
use crate::assemble::dataset::AssembledDataset;
use crate::assemble::error::AssembleError;
use crate::jobs::reporter::JobReporter;
use crate::sink::error::StoreError;
use crate::sink::result_sink::{ResultSink, ResultSummary};
use crate::types::selector::StationSelector;
use log::{debug, error};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Why a job ended in `Failed`. The `Display` text is what pollers see.
#[derive(Debug, Error)]
pub enum JobFailure {
    #[error("The weather archive could not provide the data ({0}). Please try again.")]
    UpstreamUnavailable(#[source] AssembleError),

    #[error("The dataset could not be saved ({0}). Please try again.")]
    PersistenceFailure(#[source] StoreError),

    #[error("The weather archive did not answer within {0:?}. Please try again.")]
    Timeout(Duration),

    #[error("The download service is shutting down. Please try again.")]
    ShuttingDown,
}

impl From<AssembleError> for JobFailure {
    fn from(e: AssembleError) -> Self {
        match e {
            AssembleError::DeadlineExceeded(ceiling) => JobFailure::Timeout(ceiling),
            other => JobFailure::UpstreamUnavailable(other),
        }
    }
}

/// Runs jobs on spawned tasks, at most `permits` of them at a time.
#[derive(Clone)]
pub struct JobRunner {
    assembler: Arc<ArchiveAssembler>,
    sink: Arc<ResultSink>,
    permits: Arc<Semaphore>,
    job_ceiling: Duration,
}

impl JobRunner {
    pub fn new(
        assembler: Arc<ArchiveAssembler>,
        sink: Arc<ResultSink>,
        max_concurrent_jobs: usize,
        job_ceiling: Duration,
    ) -> Self {
        Self {
            assembler,
            sink,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            job_ceiling,
        }
    }

    /// Starts the job in the background. It stays `Pending` until a slot frees up.
    pub fn spawn(&self, selector: StationSelector, reporter: JobReporter) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(selector, reporter).await })
    }

    async fn run(&self, selector: StationSelector, reporter: JobReporter) {
        let Ok(_permit) = self.permits.acquire().await else {
            reporter.fail(JobFailure::ShuttingDown);
            return;
        };
        reporter.start();
        match self.execute(&selector, &reporter).await {
            Ok(summary) => reporter.succeed(summary),
            Err(failure) => {
                error!("Job {} for station {} failed: {:?}", reporter.job_id(), selector.station_id(), failure);
                reporter.fail(failure);
            }
        }
    }

    /// Assembles, then persists. The result only becomes visible to pollers
    /// after `persist` has returned, and nothing is stored if any step fails.
    async fn execute(
        &self,
        selector: &StationSelector,
        reporter: &JobReporter,
    ) -> Result<ResultSummary, JobFailure> {
        let deadline = Instant::now() + self.job_ceiling;
        let dataset = self
            .assembler
            .assemble(selector, deadline, self.job_ceiling, |percent| reporter.progress(percent))
            .await?;
        debug!("Job {} assembled {} rows", reporter.job_id(), dataset.height());
        self.persist_before(dataset, selector, deadline).await
    }

    /// Persists `dataset` unless the ceiling has already passed.
    ///
    /// The write itself is not cut short: a store may keep writing on a
    /// blocking thread after its future is dropped, which would leave an
    /// artifact behind for a job reported as failed.
    async fn persist_before(
        &self,
        dataset: AssembledDataset,
        selector: &StationSelector,
        deadline: Instant,
    ) -> Result<ResultSummary, JobFailure> {
        if deadline <= Instant::now() {
            return Err(JobFailure::Timeout(self.job_ceiling));
        }
        let key = self.sink.key_for(selector);
        self.sink
            .persist(dataset, &key)
            .await
            .map_err(JobFailure::PersistenceFailure)
    }

    /// Closes the slot pool; queued jobs fail instead of starting.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}
