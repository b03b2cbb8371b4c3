use crate::source::error::FetchError;
use crate::types::partition::FetchPartition;
use polars::error::PolarsError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Fetching partition {partition} for station {station} failed")]
    Fetch {
        station: String,
        partition: FetchPartition,
        #[source]
        source: FetchError,
    },

    #[error("Fetching partition {partition} for station {station} timed out after {waited:?}")]
    FetchTimeout {
        station: String,
        partition: FetchPartition,
        waited: Duration,
    },

    #[error("Job exceeded its {0:?} time limit")]
    DeadlineExceeded(Duration),

    #[error("Parsing error processing CSV data for station '{station}' ({partition})")]
    CsvRead {
        station: String,
        partition: FetchPartition,
        #[source]
        source: PolarsError,
    },

    #[error("Partitions for station {station} could not be combined")]
    Concatenation {
        station: String,
        #[source]
        source: PolarsError,
    },

    #[error("No timestamp column found in data for station {0}")]
    MissingTimestamp(String),

    #[error("No partitions were fetched for station {0}")]
    NoPartitions(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
