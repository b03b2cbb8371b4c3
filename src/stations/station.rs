use crate::types::frequency::Frequency;
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use station_archive::LatLon;
///
/// let vancouver = LatLon(49.19, -123.18);
/// assert_eq!(vancouver.0, 49.19); // Latitude
/// assert_eq!(vancouver.1, -123.18); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

/// Inclusive span of calendar years for which a station has records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn overlaps(&self, start: i32, end: i32) -> bool {
        self.start <= end && self.end >= start
    }
}

/// One row of the station reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Identifier used by the bulk data endpoint.
    pub station_id: String,
    pub climate_id: String,
    pub name: String,
    pub province: String,
    pub location: LatLon,
    /// Meters above sea level, when known.
    pub elevation: Option<f64>,
    /// Span over all frequencies.
    pub years: Option<YearRange>,
    pub hourly: Option<YearRange>,
    pub daily: Option<YearRange>,
    pub monthly: Option<YearRange>,
}

impl Station {
    /// Span of records at `frequency`, or `None` if the station has none.
    pub fn year_range(&self, frequency: Frequency) -> Option<YearRange> {
        match frequency {
            Frequency::Subdaily => self.hourly,
            Frequency::Daily => self.daily,
            Frequency::Monthly => self.monthly,
        }
    }

    /// Frequencies with at least one year of records, in Hourly, Daily, Monthly order.
    pub fn available_frequencies(&self) -> Vec<Frequency> {
        [Frequency::Subdaily, Frequency::Daily, Frequency::Monthly]
            .into_iter()
            .filter(|frequency| self.year_range(*frequency).is_some())
            .collect()
    }

    pub fn has_frequency(&self, frequency: Frequency) -> bool {
        self.year_range(frequency).is_some()
    }
}
