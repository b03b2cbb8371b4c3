//! Retrieval of raw CSV for one station and one partition from the upstream archive.

use crate::source::error::FetchError;
use crate::types::frequency::Frequency;
use crate::types::partition::FetchPartition;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use std::time::Duration;

/// Bulk-data endpoint of the national climate archive.
pub const DEFAULT_SOURCE_URL: &str = "https://climate.weather.gc.ca/climate_data/bulk_data_e.html";

/// Fetches raw tabular data for one station over one partition.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(
        &self,
        station_id: &str,
        frequency: Frequency,
        partition: FetchPartition,
    ) -> Result<Vec<u8>, FetchError>;
}

/// [`ArchiveSource`] backed by the upstream HTTP bulk-download endpoint.
pub struct HttpArchiveSource {
    base_url: String,
    download_client: Client,
    max_response_bytes: usize,
}

impl HttpArchiveSource {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, FetchError> {
        let download_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            base_url: base_url.into(),
            download_client,
            max_response_bytes,
        })
    }

    fn query(
        station_id: &str,
        frequency: Frequency,
        partition: FetchPartition,
    ) -> [(&'static str, String); 6] {
        [
            ("format", "csv".to_string()),
            ("stationID", station_id.to_string()),
            ("Year", partition.year.to_string()),
            ("Month", partition.request_month().to_string()),
            ("Day", "1".to_string()),
            ("timeframe", frequency.timeframe().to_string()),
        ]
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(
        &self,
        station_id: &str,
        frequency: Frequency,
        partition: FetchPartition,
    ) -> Result<Vec<u8>, FetchError> {
        let request = self
            .download_client
            .get(&self.base_url)
            .query(&Self::query(station_id, frequency, partition))
            .build()
            .map_err(|e| FetchError::NetworkRequest(self.base_url.clone(), e))?;
        let url = request.url().to_string();
        info!("Downloading {} data for station {} from {}", frequency, station_id, url);

        let response = self
            .download_client
            .execute(request)
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url, e)
                });
            }
        };

        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(FetchError::BodyTooLarge {
                    url,
                    limit: self.max_response_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }
        debug!("Received {} bytes for station {} ({})", body.len(), station_id, partition);

        validate_csv_body(&url, &body)?;
        Ok(body)
    }
}

/// Rejects bodies that cannot be an archive CSV export, such as the HTML error
/// page the archive serves with a 200 status for unknown stations.
pub(crate) fn validate_csv_body(url: &str, body: &[u8]) -> Result<(), FetchError> {
    let malformed = |reason: &str| FetchError::Malformed {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let text = std::str::from_utf8(body).map_err(|_| malformed("body is not UTF-8 text"))?;
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.is_empty() {
        return Err(malformed("empty body"));
    }
    if text.starts_with('<') {
        return Err(malformed("received HTML instead of CSV"));
    }
    let header = text.lines().next().unwrap_or_default();
    if !header.contains(',') {
        return Err(malformed("missing comma-separated header"));
    }
    Ok(())
}
