//! Persists assembled datasets and summarizes them for the polling client.

use crate::assemble::dataset::AssembledDataset;
use crate::sink::error::StoreError;
use crate::sink::signing::SignedUrl;
use crate::sink::store::ObjectStore;
use crate::types::selector::StationSelector;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

/// What the client receives instead of the data itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Full object key in the durable store.
    pub key: String,
    /// Last key segment, used to request a download link.
    pub filename: String,
    /// Retained column names, timestamp first.
    pub columns: Vec<String>,
    pub rows: usize,
}

pub struct ResultSink {
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
}

impl ResultSink {
    pub fn new(store: Arc<dyn ObjectStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    fn with_prefix(&self, filename: &str) -> String {
        if self.key_prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.key_prefix, filename)
        }
    }

    /// Deterministic, human-readable key for a selector's artifact, e.g.
    /// `tmp/51442_daily_2015-01_2016-12.csv`.
    pub fn key_for(&self, selector: &StationSelector) -> String {
        let station: String = selector
            .station_id()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.with_prefix(&format!(
            "{}_{}_{}_{}.csv",
            station,
            selector.frequency(),
            selector.start(),
            selector.end()
        ))
    }

    /// Maps a filename handed to the client back to its key.
    pub fn key_for_filename(&self, filename: &str) -> Result<String, StoreError> {
        if filename.is_empty() || filename.contains('/') {
            return Err(StoreError::InvalidKey(filename.to_string()));
        }
        Ok(self.with_prefix(filename))
    }

    /// Encodes and durably stores `dataset` under `key`.
    ///
    /// The dataset is consumed; only the summary outlives this call.
    pub async fn persist(
        &self,
        dataset: AssembledDataset,
        key: &str,
    ) -> Result<ResultSummary, StoreError> {
        let columns = dataset.column_names();
        let rows = dataset.height();
        let bytes = task::spawn_blocking(move || dataset.to_csv_bytes())
            .await?
            .map_err(StoreError::Encode)?;
        self.store.put(key, bytes).await?;
        info!("Persisted {} rows to {}", rows, key);

        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        Ok(ResultSummary {
            key: key.to_string(),
            filename,
            columns,
            rows,
        })
    }

    /// Issues a short-lived link for a previously persisted filename.
    pub async fn signed_url(&self, filename: &str, ttl: Duration) -> Result<SignedUrl, StoreError> {
        let key = self.key_for_filename(filename)?;
        if !self.store.exists(&key).await? {
            return Err(StoreError::NotFound(key));
        }
        self.store.signed_url(&key, ttl)
    }
}
