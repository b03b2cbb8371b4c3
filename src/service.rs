//! The entry point used by the web layer: submit, poll, forget and fetch.

use crate::assemble::assembler::ArchiveAssembler;
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::jobs::registry::JobRegistry;
use crate::jobs::state::{JobId, JobSnapshot};
use crate::jobs::worker::JobRunner;
use crate::sink::error::StoreError;
use crate::sink::result_sink::ResultSink;
use crate::sink::signing::{SignedUrl, UrlSigner};
use crate::sink::store::{LocalObjectStore, ObjectStore};
use crate::source::client::{ArchiveSource, HttpArchiveSource};
use crate::types::frequency::Frequency;
use crate::types::month::Month;
use crate::types::selector::StationSelector;
use crate::utils::ensure_dir_exists;
use bon::bon;
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

/// Runs station downloads in the background and reports on them.
///
/// Each accepted submission becomes a job that fetches the requested window
/// from the upstream archive, reduces it to the measurement columns, stores it
/// durably and then reports a summary. Callers poll for progress instead of
/// waiting, and each session may only have one job in flight at a time.
///
/// # Examples
///
/// ```no_run
/// # use station_archive::{ArchiveConfig, ArchiveService, ArchiveError, JobPhase};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), ArchiveError> {
/// let service = ArchiveService::new(ArchiveConfig::from_env()?).await?;
/// let job_id = service
///     .submit_download()
///     .session_id("session-1")
///     .station_id("51442")
///     .station_name("VANCOUVER INTL A")
///     .start_year(2019)
///     .start_month(1)
///     .end_year(2019)
///     .end_month(3)
///     .frequency("Hourly")
///     .call()
///     .await?;
///
/// loop {
///     let snapshot = service.poll_job(job_id)?;
///     if snapshot.state == JobPhase::Succeeded {
///         let filename = snapshot.summary.as_ref().map(|s| s.filename.clone()).unwrap_or_default();
///         let link = service.fetch_result(&filename).await?;
///         println!("Download from {}", link.url);
///     }
///     if snapshot.is_terminal() {
///         service.forget_job(job_id)?;
///         break;
///     }
///     tokio::time::sleep(Duration::from_secs(1)).await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct ArchiveService {
    config: ArchiveConfig,
    registry: JobRegistry,
    runner: JobRunner,
    sink: Arc<ResultSink>,
    signer: UrlSigner,
}

#[bon]
impl ArchiveService {
    /// Creates a service that downloads over HTTP and stores results below
    /// `config.storage_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::StorageDirCreation`] if the storage directory
    /// cannot be created and [`ArchiveError::Source`] if the HTTP client
    /// cannot be built.
    pub async fn new(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        ensure_dir_exists(&config.storage_dir)
            .await
            .map_err(|e| ArchiveError::StorageDirCreation(config.storage_dir.clone(), e))?;
        let source = HttpArchiveSource::new(
            config.source_url.clone(),
            config.partition_timeout,
            config.max_response_bytes,
        )?;
        let store = LocalObjectStore::new(
            &config.storage_dir,
            UrlSigner::new(&config.signing_secret),
            config.public_base_url.clone(),
        );
        Ok(Self::with_components(config, Arc::new(source), Arc::new(store)))
    }

    /// Creates a service over any upstream source and object store.
    ///
    /// Links issued by `store` are checked by [`ArchiveService::open_signed`]
    /// with `config.signing_secret`, so the store should sign with the same secret.
    pub fn with_components(
        config: ArchiveConfig,
        source: Arc<dyn ArchiveSource>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let assembler = Arc::new(ArchiveAssembler::new(source, config.partition_timeout));
        let sink = Arc::new(ResultSink::new(store, config.key_prefix.clone()));
        let runner = JobRunner::new(
            assembler,
            sink.clone(),
            config.max_concurrent_jobs,
            config.job_ceiling,
        );
        Self {
            signer: UrlSigner::new(&config.signing_secret),
            config,
            registry: JobRegistry::new(),
            runner,
            sink,
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Accepts a download for `session_id` and starts it in the background.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::SessionBusy`](crate::JobError::SessionBusy) (wrapped
    /// in [`ArchiveError::Job`]) while the session's previous job is pending or
    /// running. No job is created in that case.
    pub async fn submit(
        &self,
        session_id: &str,
        selector: StationSelector,
    ) -> Result<JobId, ArchiveError> {
        let (job_id, reporter) = self.registry.register(session_id, selector.clone())?;
        self.runner.spawn(selector, reporter);
        Ok(job_id)
    }

    /// Validates a download request from the form fields and submits it.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.session_id(impl Into<String>)`: **Required.** The caller's session.
    /// * `.station_id(impl Into<String>)`: **Required.** Upstream station identifier.
    /// * `.station_name(impl Into<String>)`: Optional. Display name; defaults to the identifier.
    /// * `.start_year(i32)`, `.start_month(u32)`: **Required.** First month of the window.
    /// * `.end_year(i32)`, `.end_month(u32)`: **Required.** Last month of the window.
    /// * `.frequency(impl Into<String>)`: **Required.** `Hourly`, `Daily` or `Monthly`, any case.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidSelector`] for an unknown frequency, a
    /// month outside 1-12 or a window that does not end after it starts, and
    /// the errors of [`ArchiveService::submit`].
    #[builder]
    pub async fn submit_download(
        &self,
        #[builder(into)] session_id: String,
        #[builder(into)] station_id: String,
        #[builder(into)] station_name: Option<String>,
        start_year: i32,
        start_month: u32,
        end_year: i32,
        end_month: u32,
        #[builder(into)] frequency: String,
    ) -> Result<JobId, ArchiveError> {
        let frequency: Frequency = frequency.parse()?;
        let station_name = station_name.unwrap_or_else(|| station_id.clone());
        let selector = StationSelector::new(
            station_id,
            station_name,
            frequency,
            Month::new(start_year, start_month),
            Month::new(end_year, end_month),
        )?;
        self.submit(&session_id, selector).await
    }

    /// Non-blocking snapshot of a job. Repeated polls of a finished job give
    /// the same answer until it is forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::UnknownJob`](crate::JobError::UnknownJob) for ids
    /// that were never issued or have been forgotten.
    pub fn poll_job(&self, job_id: JobId) -> Result<JobSnapshot, ArchiveError> {
        Ok(self.registry.poll(job_id)?)
    }

    /// Discards a finished job after its outcome has been shown. Forgetting an
    /// unknown job is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::StillActive`](crate::JobError::StillActive) while
    /// the job is pending or running.
    pub fn forget_job(&self, job_id: JobId) -> Result<(), ArchiveError> {
        self.registry.forget(job_id)?;
        Ok(())
    }

    /// Issues a short-lived link to a stored result, by the filename reported
    /// in the job summary.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::ResultNotFound`] if no such result is stored.
    pub async fn fetch_result(&self, filename: &str) -> Result<SignedUrl, ArchiveError> {
        match self.sink.signed_url(filename, self.config.signed_url_ttl).await {
            Ok(link) => {
                debug!("Issued link for {} valid until {}", filename, link.expires_at);
                Ok(link)
            }
            Err(StoreError::NotFound(_) | StoreError::InvalidKey(_)) => {
                Err(ArchiveError::ResultNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the artifact behind a signed link, for the route serving `public_base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::LinkRejected`] for a tampered, foreign or
    /// expired link.
    pub async fn open_signed(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<Vec<u8>, ArchiveError> {
        if !self.signer.verify(key, expires, signature, Utc::now()) {
            return Err(ArchiveError::LinkRejected(key.to_string()));
        }
        match self.sink.store().get(key).await {
            Err(StoreError::NotFound(_) | StoreError::InvalidKey(_)) => {
                Err(ArchiveError::ResultNotFound(key.to_string()))
            }
            other => Ok(other?),
        }
    }

    /// Number of jobs that are pending or running.
    pub fn active_jobs(&self) -> usize {
        self.registry.active_count()
    }

    /// Stops admitting queued jobs to run; they fail instead. Running jobs finish.
    pub fn shutdown(&self) {
        info!("Shutting down with {} active job(s)", self.active_jobs());
        self.runner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::error::JobError;
    use crate::jobs::state::JobPhase;
    use crate::sink::store::MemoryObjectStore;
    use crate::test_support::{FailingStore, ScriptedSource};
    use crate::types::error::SelectorError;
    use crate::types::partition::FetchPartition;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    const SECRET: &str = "test-secret";

    fn config() -> ArchiveConfig {
        ArchiveConfig::builder()
            .signing_secret(SECRET)
            .partition_timeout(Duration::from_secs(5))
            .job_ceiling(Duration::from_secs(60))
            .build()
    }

    fn memory_store() -> Arc<MemoryObjectStore> {
        Arc::new(MemoryObjectStore::new(UrlSigner::new(SECRET), "/files"))
    }

    async fn wait_terminal(service: &ArchiveService, job_id: JobId) -> JobSnapshot {
        for _ in 0..1000 {
            let snapshot = service.poll_job(job_id).unwrap();
            if snapshot.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|part| part.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')))
            .unwrap()
    }

    async fn submit_alpha(service: &ArchiveService, session: &str) -> Result<JobId, ArchiveError> {
        service
            .submit_download()
            .session_id(session)
            .station_id("ALPHA")
            .start_year(2019)
            .start_month(1)
            .end_year(2019)
            .end_month(3)
            .frequency("Hourly")
            .call()
            .await
    }

    #[tokio::test]
    async fn test_alpha_hourly_download_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        let source = Arc::new(ScriptedSource::new());
        let store = memory_store();
        let service = ArchiveService::with_components(config(), source.clone(), store.clone());

        let job_id = submit_alpha(&service, "s1").await?;
        let snapshot = wait_terminal(&service, job_id).await;

        assert_eq!(snapshot.state, JobPhase::Succeeded);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.error.is_none());
        assert_eq!(
            source.calls(),
            vec![
                FetchPartition { year: 2019, month: Some(1) },
                FetchPartition { year: 2019, month: Some(2) },
                FetchPartition { year: 2019, month: Some(3) },
            ]
        );

        let summary = snapshot.summary.ok_or("missing summary")?;
        assert_eq!(summary.filename, "ALPHA_hourly_2019-01_2019-03.csv");
        assert_eq!(summary.columns[0], "Date/Time (LST)");
        assert!(summary.columns.iter().all(|c| !c.ends_with("Flag")));

        let link = service.fetch_result(&summary.filename).await?;
        let expires: i64 = query_param(&link.url, "expires").parse()?;
        let signature = query_param(&link.url, "signature");
        let body = service.open_signed(&summary.key, expires, signature).await?;
        assert!(String::from_utf8(body)?.starts_with("Date/Time (LST)"));

        assert!(matches!(
            service.open_signed(&summary.key, expires, "forged").await,
            Err(ArchiveError::LinkRejected(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_partition_leaves_no_artifact() -> Result<(), ArchiveError> {
        let store = memory_store();
        let service = ArchiveService::with_components(
            config(),
            Arc::new(ScriptedSource::new().failing_on_call(2)),
            store.clone(),
        );

        let job_id = submit_alpha(&service, "s1").await?;
        let snapshot = wait_terminal(&service, job_id).await;

        assert_eq!(snapshot.state, JobPhase::Failed);
        assert!(snapshot.summary.is_none());
        assert!(snapshot.error.is_some_and(|e| !e.is_empty()));
        assert!(store.keys().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() -> Result<(), ArchiveError> {
        let service = ArchiveService::with_components(
            config(),
            Arc::new(ScriptedSource::new()),
            Arc::new(FailingStore),
        );
        let job_id = submit_alpha(&service, "s1").await?;
        let snapshot = wait_terminal(&service, job_id).await;

        assert_eq!(snapshot.state, JobPhase::Failed);
        assert!(snapshot.progress < 100);
        assert!(snapshot.error.is_some_and(|e| e.contains("Please try again")));
        Ok(())
    }

    #[tokio::test]
    async fn test_session_gate() -> Result<(), ArchiveError> {
        let gate = Arc::new(Semaphore::new(0));
        let service = ArchiveService::with_components(
            config(),
            Arc::new(ScriptedSource::new().held_by(gate.clone())),
            memory_store(),
        );

        let first = submit_alpha(&service, "s1").await?;
        assert!(matches!(
            submit_alpha(&service, "s1").await,
            Err(ArchiveError::Job(JobError::SessionBusy { job_id, .. })) if job_id == first
        ));
        assert!(matches!(
            service.forget_job(first),
            Err(ArchiveError::Job(JobError::StillActive(_)))
        ));
        let other_session = submit_alpha(&service, "s2").await?;
        assert_eq!(service.active_jobs(), 2);

        gate.add_permits(100);
        assert_eq!(wait_terminal(&service, first).await.state, JobPhase::Succeeded);
        wait_terminal(&service, other_session).await;

        service.forget_job(first)?;
        assert!(matches!(
            service.poll_job(first),
            Err(ArchiveError::Job(JobError::UnknownJob(_)))
        ));
        let second = submit_alpha(&service, "s1").await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_job_waits_pending_while_slots_are_taken() -> Result<(), ArchiveError> {
        let gate = Arc::new(Semaphore::new(0));
        let config = ArchiveConfig::builder()
            .signing_secret(SECRET)
            .max_concurrent_jobs(1)
            .partition_timeout(Duration::from_secs(5))
            .job_ceiling(Duration::from_secs(60))
            .build();
        let service = ArchiveService::with_components(
            config,
            Arc::new(ScriptedSource::new().held_by(gate.clone())),
            memory_store(),
        );

        let first = submit_alpha(&service, "s1").await?;
        for _ in 0..1000 {
            if service.poll_job(first)?.state == JobPhase::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = submit_alpha(&service, "s2").await?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(service.poll_job(first)?.state, JobPhase::Running);
        let waiting = service.poll_job(second)?;
        assert_eq!(waiting.state, JobPhase::Pending);
        assert_eq!(waiting.progress, 0);
        assert_eq!(service.runner.available_slots(), 0);

        gate.add_permits(100);
        assert_eq!(wait_terminal(&service, first).await.state, JobPhase::Succeeded);
        assert_eq!(wait_terminal(&service, second).await.state, JobPhase::Succeeded);
        for _ in 0..100 {
            if service.runner.available_slots() == 1 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("slot was not released");
    }

    #[tokio::test]
    async fn test_polling_a_finished_job_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let service = ArchiveService::with_components(config(), Arc::new(ScriptedSource::new()), memory_store());
        let job_id = submit_alpha(&service, "s1").await?;
        wait_terminal(&service, job_id).await;

        let first = serde_json::to_string(&service.poll_job(job_id)?)?;
        for _ in 0..5 {
            assert_eq!(serde_json::to_string(&service.poll_job(job_id)?)?, first);
        }
        service.forget_job(job_id)?;
        service.forget_job(job_id)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_requests_create_no_job() {
        let source = Arc::new(ScriptedSource::new());
        let service = ArchiveService::with_components(config(), source.clone(), memory_store());

        let reversed = service
            .submit_download()
            .session_id("s1")
            .station_id("ALPHA")
            .start_year(2019)
            .start_month(3)
            .end_year(2019)
            .end_month(3)
            .frequency("Daily")
            .call()
            .await;
        assert!(matches!(
            reversed,
            Err(ArchiveError::InvalidSelector(SelectorError::EndNotAfterStart { .. }))
        ));

        let weekly = service
            .submit_download()
            .session_id("s1")
            .station_id("ALPHA")
            .start_year(2019)
            .start_month(1)
            .end_year(2019)
            .end_month(3)
            .frequency("Weekly")
            .call()
            .await;
        assert!(matches!(
            weekly,
            Err(ArchiveError::InvalidSelector(SelectorError::UnsupportedFrequency(_)))
        ));
        assert_eq!(service.active_jobs(), 0);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_monthly_download_fetches_once() -> Result<(), ArchiveError> {
        let source = Arc::new(ScriptedSource::new());
        let service = ArchiveService::with_components(config(), source.clone(), memory_store());
        let job_id = service
            .submit_download()
            .session_id("s1")
            .station_id("30247")
            .station_name("ALPHA")
            .start_year(2006)
            .start_month(4)
            .end_year(2011)
            .end_month(9)
            .frequency("monthly")
            .call()
            .await?;
        let snapshot = wait_terminal(&service, job_id).await;

        assert_eq!(snapshot.state, JobPhase::Succeeded);
        assert_eq!(source.calls().len(), 1);
        assert_eq!(snapshot.summary.map(|s| s.rows), Some(66));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_result_filename() {
        let service = ArchiveService::with_components(config(), Arc::new(ScriptedSource::new()), memory_store());
        for filename in ["nothing.csv", "../etc/passwd", ""] {
            assert!(matches!(
                service.fetch_result(filename).await,
                Err(ArchiveError::ResultNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_local_store_service() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = ArchiveConfig::builder()
            .storage_dir(dir.path().join("store"))
            .signing_secret(SECRET)
            .build();
        let store = Arc::new(LocalObjectStore::new(&config.storage_dir, UrlSigner::new(SECRET), "/files"));
        let service = ArchiveService::with_components(config, Arc::new(ScriptedSource::new()), store);

        let job_id = submit_alpha(&service, "s1").await?;
        let summary = wait_terminal(&service, job_id).await.summary.ok_or("missing summary")?;
        assert!(dir.path().join("store").join(&summary.key).is_file());
        Ok(())
    }
}
