//! Drives the per-partition fetches for one job and reports progress.

use crate::assemble::dataset::AssembledDataset;
use crate::assemble::error::AssembleError;
use crate::source::client::ArchiveSource;
use crate::types::partition::plan_partitions;
use crate::types::selector::StationSelector;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::{timeout, Instant};

/// Progress, in percent, after `completed` of `total` partitions.
///
/// Capped at 99: reaching 100 is reserved for a persisted result.
pub fn partition_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((100 * completed / total).min(99)) as u8
}

pub struct ArchiveAssembler {
    source: Arc<dyn ArchiveSource>,
    partition_timeout: Duration,
}

impl ArchiveAssembler {
    pub fn new(source: Arc<dyn ArchiveSource>, partition_timeout: Duration) -> Self {
        Self {
            source,
            partition_timeout,
        }
    }

    /// Fetches every partition of `selector` in chronological order and builds
    /// the clipped, reduced dataset.
    ///
    /// `on_progress` is called after each partition with a non-decreasing
    /// percentage below 100. Any failed or timed-out fetch aborts the whole
    /// assembly; nothing partial is returned. The elapsed-time ceiling is
    /// checked before each fetch, and each fetch may wait at most the smaller
    /// of the partition timeout and the time left before `deadline`.
    pub async fn assemble<F>(
        &self,
        selector: &StationSelector,
        deadline: Instant,
        ceiling: Duration,
        mut on_progress: F,
    ) -> Result<AssembledDataset, AssembleError>
    where
        F: FnMut(u8) + Send,
    {
        let station = selector.station_id();
        let partitions = plan_partitions(selector);
        let total = partitions.len();
        info!(
            "Assembling {} data for station {} ({} to {}) in {} partition(s)",
            selector.frequency(),
            station,
            selector.start(),
            selector.end(),
            total
        );

        let mut bodies = Vec::with_capacity(total);
        for (index, partition) in partitions.into_iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AssembleError::DeadlineExceeded(ceiling));
            }
            let waited = self.partition_timeout.min(remaining);
            let body = timeout(
                waited,
                self.source.fetch(station, selector.frequency(), partition),
            )
            .await
            .map_err(|_| {
                if waited < self.partition_timeout {
                    AssembleError::DeadlineExceeded(ceiling)
                } else {
                    AssembleError::FetchTimeout {
                        station: station.to_string(),
                        partition,
                        waited,
                    }
                }
            })?
            .map_err(|e| AssembleError::Fetch {
                station: station.to_string(),
                partition,
                source: e,
            })?;

            debug!(
                "Fetched partition {} ({}/{}) for station {}: {} bytes",
                partition,
                index + 1,
                total,
                station,
                body.len()
            );
            bodies.push((partition, body));
            on_progress(partition_progress(index + 1, total));
        }

        let selector_owned = selector.clone();
        let dataset =
            task::spawn_blocking(move || AssembledDataset::from_partitions(&selector_owned, bodies))
                .await??;
        info!(
            "Assembled {} rows x {} columns for station {}",
            dataset.height(),
            dataset.column_names().len(),
            station
        );
        Ok(dataset)
    }
}
