use crate::types::month::Month;
use thiserror::Error;

/// Rejections raised while validating a download request, before any job exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Station identifier must not be empty")]
    EmptyStationId,

    #[error("Month {0} is outside 1-12")]
    MonthOutOfRange(u32),

    #[error("End month {end} must be after start month {start}")]
    EndNotAfterStart { start: Month, end: Month },

    #[error("Unsupported data frequency '{0}', expected Hourly, Daily or Monthly")]
    UnsupportedFrequency(String),
}
