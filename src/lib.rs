mod assemble;
mod config;
mod error;
mod jobs;
mod service;
mod sink;
mod source;
mod stations;
mod types;
mod utils;

#[cfg(test)]
mod test_support;

pub use config::{ArchiveConfig, ConfigError};
pub use error::ArchiveError;
pub use service::ArchiveService;

pub use types::error::SelectorError;
pub use types::frequency::Frequency;
pub use types::month::Month;
pub use types::partition::{plan_partitions, FetchPartition};
pub use types::selector::StationSelector;

pub use source::client::{ArchiveSource, HttpArchiveSource, DEFAULT_SOURCE_URL};
pub use source::error::FetchError;

pub use assemble::assembler::{partition_progress, ArchiveAssembler};
pub use assemble::dataset::{
    is_measurement_column, AssembledDataset, FLAG_SUFFIX, MEASUREMENT_PREFIXES,
    MISSING_DATA_CODES, TIMESTAMP_PREFIX,
};
pub use assemble::error::AssembleError;

pub use sink::error::StoreError;
pub use sink::result_sink::{ResultSink, ResultSummary};
pub use sink::signing::{SignedUrl, UrlSigner};
pub use sink::store::{LocalObjectStore, MemoryObjectStore, ObjectStore};

pub use jobs::error::JobError;
pub use jobs::registry::JobRegistry;
pub use jobs::reporter::JobReporter;
pub use jobs::state::{JobId, JobPhase, JobSnapshot, JobState};
pub use jobs::worker::{JobFailure, JobRunner};

pub use stations::directory::{StationDirectory, StationMatch, StationQuery};
pub use stations::error::DirectoryError;
pub use stations::station::{LatLon, Station, YearRange};

pub use utils::{default_storage_dir, ensure_dir_exists};
