//! Splits a requested window into the fixed-size windows the upstream archive serves.

use crate::types::frequency::Frequency;
use crate::types::month::Month;
use crate::types::selector::StationSelector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One upstream request: a calendar month for sub-daily data, a calendar year
/// for daily data, or the whole station history for monthly data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchPartition {
    pub year: i32,
    pub month: Option<u32>,
}

impl FetchPartition {
    /// The `Month` query value sent upstream; year-sized partitions ask for January.
    pub fn request_month(&self) -> u32 {
        self.month.unwrap_or(1)
    }
}

impl fmt::Display for FetchPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{}", Month(self.year, month)),
            None => write!(f, "{:04}", self.year),
        }
    }
}

/// Plans the upstream requests for a selector, in chronological order.
///
/// Together the partitions cover the requested window exactly once, but each
/// partition is whole-month or whole-year sized, so responses may contain rows
/// outside the window and must be clipped afterwards.
///
/// # Examples
///
/// ```
/// use station_archive::{plan_partitions, Frequency, Month, StationSelector};
///
/// let selector = StationSelector::new("1", "ALPHA", Frequency::Subdaily, Month(2019, 1), Month(2019, 3)).unwrap();
/// assert_eq!(plan_partitions(&selector).len(), 3);
/// ```
pub fn plan_partitions(selector: &StationSelector) -> Vec<FetchPartition> {
    let start = selector.start();
    let end = selector.end();
    match selector.frequency() {
        Frequency::Subdaily => (start.ordinal()..=end.ordinal())
            .map(Month::from_ordinal)
            .map(|month| FetchPartition {
                year: month.year(),
                month: Some(month.month()),
            })
            .collect(),
        Frequency::Daily => (start.year()..=end.year())
            .map(|year| FetchPartition { year, month: None })
            .collect(),
        Frequency::Monthly => vec![FetchPartition {
            year: start.year(),
            month: None,
        }],
    }
}
