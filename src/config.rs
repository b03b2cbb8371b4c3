//! Runtime settings of the download service.

use crate::source::client::DEFAULT_SOURCE_URL;
use crate::utils::storage_dir_or_temp;
use bon::Builder;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

fn random_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Settings for [`crate::ArchiveService`].
///
/// Every field has a default, so `ArchiveConfig::builder().build()` is a
/// working configuration.
///
/// # Examples
///
/// ```
/// use station_archive::ArchiveConfig;
/// use std::time::Duration;
///
/// let config = ArchiveConfig::builder()
///     .storage_dir("/var/lib/station_archive".into())
///     .max_concurrent_jobs(8)
///     .job_ceiling(Duration::from_secs(600))
///     .build();
/// assert_eq!(config.key_prefix, "tmp");
/// assert_eq!(config.signed_url_ttl, Duration::from_secs(100));
/// ```
#[derive(Clone, Builder)]
pub struct ArchiveConfig {
    /// Bulk-data endpoint of the upstream archive.
    #[builder(into, default = DEFAULT_SOURCE_URL.to_string())]
    pub source_url: String,
    /// Root of the local durable store.
    #[builder(default = storage_dir_or_temp())]
    pub storage_dir: PathBuf,
    /// Namespace of artifact keys.
    #[builder(into, default = "tmp".to_string())]
    pub key_prefix: String,
    /// Base that signed links are issued under.
    #[builder(into, default = "/files".to_string())]
    pub public_base_url: String,
    /// HMAC secret for signed links. Random per process unless set.
    #[builder(into, default = random_secret())]
    pub signing_secret: String,
    /// Longest wait for a single partition fetch.
    #[builder(default = Duration::from_secs(60))]
    pub partition_timeout: Duration,
    /// Wall-clock limit of one running job.
    #[builder(default = Duration::from_secs(15 * 60))]
    pub job_ceiling: Duration,
    #[builder(default = Duration::from_secs(100))]
    pub signed_url_ttl: Duration,
    /// Jobs beyond this many wait in `Pending`.
    #[builder(default = 4)]
    pub max_concurrent_jobs: usize,
    /// Largest accepted upstream response body.
    #[builder(default = 64 * 1024 * 1024)]
    pub max_response_bytes: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("source_url", &self.source_url)
            .field("storage_dir", &self.storage_dir)
            .field("key_prefix", &self.key_prefix)
            .field("public_base_url", &self.public_base_url)
            .field("signing_secret", &"<redacted>")
            .field("partition_timeout", &self.partition_timeout)
            .field("job_ceiling", &self.job_ceiling)
            .field("signed_url_ttl", &self.signed_url_ttl)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

fn parse_positive<T>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.clone(),
        reason,
    };
    let parsed = value.trim().parse::<T>().map_err(|e| invalid(e.to_string()))?;
    if parsed == T::default() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(Some(parsed))
}

fn parse_secs(name: &str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_positive::<u64>(name, value)?.map(Duration::from_secs))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ArchiveConfig {
    /// Reads `ARCHIVE_*` environment variables; unset ones keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`ArchiveConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));
        Ok(Self::builder()
            .maybe_source_url(var("ARCHIVE_SOURCE_URL"))
            .maybe_storage_dir(var("ARCHIVE_STORAGE_DIR").map(PathBuf::from))
            .maybe_key_prefix(var("ARCHIVE_KEY_PREFIX"))
            .maybe_public_base_url(var("ARCHIVE_PUBLIC_BASE_URL"))
            .maybe_signing_secret(var("ARCHIVE_SIGNING_SECRET"))
            .maybe_partition_timeout(parse_secs(
                "ARCHIVE_PARTITION_TIMEOUT_SECS",
                var("ARCHIVE_PARTITION_TIMEOUT_SECS"),
            )?)
            .maybe_job_ceiling(parse_secs(
                "ARCHIVE_JOB_CEILING_SECS",
                var("ARCHIVE_JOB_CEILING_SECS"),
            )?)
            .maybe_signed_url_ttl(parse_secs(
                "ARCHIVE_SIGNED_URL_TTL_SECS",
                var("ARCHIVE_SIGNED_URL_TTL_SECS"),
            )?)
            .maybe_max_concurrent_jobs(parse_positive(
                "ARCHIVE_MAX_CONCURRENT_JOBS",
                var("ARCHIVE_MAX_CONCURRENT_JOBS"),
            )?)
            .maybe_max_response_bytes(parse_positive(
                "ARCHIVE_MAX_RESPONSE_BYTES",
                var("ARCHIVE_MAX_RESPONSE_BYTES"),
            )?)
            .build())
    }
}
