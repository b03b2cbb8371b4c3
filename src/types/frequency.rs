//! Defines the archive frequency classes and how each maps onto the upstream
//! bulk-download endpoint.

use crate::types::error::SelectorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the time granularity of archived station records.
///
/// The upstream archive serves each class in a fixed window size: sub-daily
/// records one calendar month at a time, daily records one calendar year at a
/// time, and monthly records as a single whole-history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Hourly (or finer) observations.
    Subdaily,
    /// One summary row per day.
    Daily,
    /// One summary row per month.
    Monthly,
}

impl Frequency {
    /// The `timeframe` query value understood by the upstream archive.
    pub fn timeframe(&self) -> u8 {
        match self {
            Frequency::Subdaily => 1,
            Frequency::Daily => 2,
            Frequency::Monthly => 3,
        }
    }

    pub(crate) fn key_segment(&self) -> &'static str {
        match self {
            Frequency::Subdaily => "hourly",
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
        }
    }

    /// The label used by the download form.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Subdaily => "Hourly",
            Frequency::Daily => "Daily",
            Frequency::Monthly => "Monthly",
        }
    }
}

/// Parses the labels used by the download form, case-insensitively.
///
/// # Examples
///
/// ```
/// use station_archive::Frequency;
///
/// assert_eq!("Hourly".parse::<Frequency>().unwrap(), Frequency::Subdaily);
/// assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::Daily);
/// assert!("weekly".parse::<Frequency>().is_err());
/// ```
impl FromStr for Frequency {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "subdaily" | "sub-daily" => Ok(Frequency::Subdaily),
            "daily" => Ok(Frequency::Daily),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(SelectorError::UnsupportedFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_segment())
    }
}
