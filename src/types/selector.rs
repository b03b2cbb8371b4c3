//! The immutable description of one download request.

use crate::types::error::SelectorError;
use crate::types::frequency::Frequency;
use crate::types::month::Month;
use serde::{Deserialize, Serialize};

/// Identifies a station and the window of its archive to retrieve.
///
/// A selector can only be built through [`StationSelector::new`], which
/// guarantees that both months are valid calendar months and that the window
/// ends strictly after it starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationSelector {
    station_id: String,
    station_name: String,
    frequency: Frequency,
    start: Month,
    end: Month,
}

impl StationSelector {
    /// Validates and builds a selector.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::EmptyStationId`] for a blank identifier,
    /// [`SelectorError::MonthOutOfRange`] if either month is not in 1-12 and
    /// [`SelectorError::EndNotAfterStart`] unless `end` is later than `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// use station_archive::{Frequency, Month, StationSelector};
    ///
    /// let selector = StationSelector::new(
    ///     "51442",
    ///     "VANCOUVER INTL A",
    ///     Frequency::Daily,
    ///     Month(2015, 1),
    ///     Month(2016, 12),
    /// )
    /// .unwrap();
    /// assert_eq!(selector.month_count(), 24);
    ///
    /// assert!(StationSelector::new("51442", "", Frequency::Daily, Month(2015, 1), Month(2015, 1)).is_err());
    /// ```
    pub fn new(
        station_id: impl Into<String>,
        station_name: impl Into<String>,
        frequency: Frequency,
        start: Month,
        end: Month,
    ) -> Result<Self, SelectorError> {
        let station_id = station_id.into().trim().to_string();
        if station_id.is_empty() {
            return Err(SelectorError::EmptyStationId);
        }
        for month in [start, end] {
            if !month.is_valid() {
                return Err(SelectorError::MonthOutOfRange(month.month()));
            }
        }
        if end <= start {
            return Err(SelectorError::EndNotAfterStart { start, end });
        }
        Ok(Self {
            station_id,
            station_name: station_name.into(),
            frequency,
            start,
            end,
        })
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn start(&self) -> Month {
        self.start
    }

    pub fn end(&self) -> Month {
        self.end
    }

    /// Number of calendar months in the window, both ends included.
    pub fn month_count(&self) -> usize {
        (self.end.ordinal() - self.start.ordinal() + 1) as usize
    }

    /// Whether an archive row stamped in `month` belongs to the window.
    pub fn contains(&self, month: Month) -> bool {
        self.start <= month && month <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_equal_months() {
        let result = StationSelector::new(
            "1",
            "ALPHA",
            Frequency::Subdaily,
            Month(2019, 3),
            Month(2019, 3),
        );
        assert_eq!(
            result,
            Err(SelectorError::EndNotAfterStart {
                start: Month(2019, 3),
                end: Month(2019, 3)
            })
        );
    }

    #[test]
    fn test_rejects_reversed_window_and_bad_month() {
        assert!(matches!(
            StationSelector::new("1", "ALPHA", Frequency::Daily, Month(2020, 1), Month(2019, 12)),
            Err(SelectorError::EndNotAfterStart { .. })
        ));
        assert_eq!(
            StationSelector::new("1", "ALPHA", Frequency::Daily, Month(2020, 0), Month(2021, 1)),
            Err(SelectorError::MonthOutOfRange(0))
        );
        assert_eq!(
            StationSelector::new("  ", "ALPHA", Frequency::Daily, Month(2020, 1), Month(2021, 1)),
            Err(SelectorError::EmptyStationId)
        );
    }

    #[test]
    fn test_contains_is_inclusive() -> Result<(), SelectorError> {
        let selector = StationSelector::new(
            "1",
            "ALPHA",
            Frequency::Subdaily,
            Month(2010, 3),
            Month(2010, 5),
        )?;
        assert!(!selector.contains(Month(2010, 2)));
        assert!(selector.contains(Month(2010, 3)));
        assert!(selector.contains(Month(2010, 5)));
        assert!(!selector.contains(Month(2010, 6)));
        assert_eq!(selector.month_count(), 3);
        Ok(())
    }
}
