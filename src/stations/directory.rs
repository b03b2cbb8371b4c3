//! Loaded-once table of stations and the filters of the station search form.

use crate::stations::error::DirectoryError;
use crate::stations::station::{LatLon, Station, YearRange};
use crate::types::frequency::Frequency;
use bon::Builder;
use csv::ReaderBuilder;
use haversine::{distance, Location as HaversineLocation, Units};
use log::info;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

/// Raw row of the processed station metadata export.
#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Province")]
    province: String,
    #[serde(rename = "Climate ID")]
    climate_id: String,
    #[serde(rename = "Station ID")]
    station_id: String,
    #[serde(rename = "Latitude", alias = "Latitude (Decimal Degrees)")]
    latitude: f64,
    #[serde(rename = "Longitude", alias = "Longitude (Decimal Degrees)")]
    longitude: f64,
    #[serde(rename = "Elevation", alias = "Elevation (m)", default)]
    elevation: Option<String>,
    #[serde(rename = "First Year", default)]
    first_year: Option<String>,
    #[serde(rename = "Last Year", default)]
    last_year: Option<String>,
    #[serde(rename = "HLY First Year", alias = "First Year (Hourly)", default)]
    hourly_first: Option<String>,
    #[serde(rename = "HLY Last Year", alias = "Last Year (Hourly)", default)]
    hourly_last: Option<String>,
    #[serde(rename = "DLY First Year", alias = "First Year (Daily)", default)]
    daily_first: Option<String>,
    #[serde(rename = "DLY Last Year", alias = "Last Year (Daily)", default)]
    daily_last: Option<String>,
    #[serde(rename = "MLY First Year", alias = "First Year (Monthly)", default)]
    monthly_first: Option<String>,
    #[serde(rename = "MLY Last Year", alias = "Last Year (Monthly)", default)]
    monthly_last: Option<String>,
}

/// Cells the metadata export uses for "no value".
const MISSING_CELLS: &[&str] = &["", "-999", "N/A", "NA"];

fn parse_number(cell: Option<&str>) -> Option<f64> {
    let cell = cell?.trim();
    if MISSING_CELLS.contains(&cell) {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| *v != -999.0)
}

fn parse_year(cell: Option<&str>) -> Option<i32> {
    parse_number(cell).map(|v| v as i32)
}

fn year_range(first: Option<&str>, last: Option<&str>) -> Option<YearRange> {
    match (parse_year(first), parse_year(last)) {
        (Some(start), Some(end)) if start <= end => Some(YearRange { start, end }),
        _ => None,
    }
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station {
            station_id: row.station_id.trim().to_string(),
            climate_id: row.climate_id.trim().to_string(),
            name: row.name.trim().to_string(),
            province: row.province.trim().to_string(),
            location: LatLon(row.latitude, row.longitude),
            elevation: parse_number(row.elevation.as_deref()),
            years: year_range(row.first_year.as_deref(), row.last_year.as_deref()),
            hourly: year_range(row.hourly_first.as_deref(), row.hourly_last.as_deref()),
            daily: year_range(row.daily_first.as_deref(), row.daily_last.as_deref()),
            monthly: year_range(row.monthly_first.as_deref(), row.monthly_last.as_deref()),
        }
    }
}

/// Criteria of a station search. Criteria left unset do not filter.
///
/// # Examples
///
/// ```
/// use station_archive::{Frequency, LatLon, StationQuery};
///
/// let query = StationQuery::builder()
///     .province("BRITISH COLUMBIA")
///     .frequency(Frequency::Daily)
///     .start_year(2010)
///     .end_year(2015)
///     .near(LatLon(49.25, -123.1))
///     .radius_km(50.0)
///     .build();
/// assert_eq!(query.frequency, Some(Frequency::Daily));
/// ```
#[derive(Debug, Clone, Default, Builder)]
pub struct StationQuery {
    #[builder(into)]
    pub province: Option<String>,
    /// Only stations with records at this frequency.
    pub frequency: Option<Frequency>,
    /// Records must reach at least this year.
    pub start_year: Option<i32>,
    /// Records must begin no later than this year.
    pub end_year: Option<i32>,
    /// Center of the radius search; ignored without `radius_km`.
    pub near: Option<LatLon>,
    pub radius_km: Option<f64>,
    /// Case-insensitive substring of the station name.
    #[builder(into)]
    pub name: Option<String>,
}

/// A station that passed a [`StationQuery`], with its distance to the query
/// center when one was given.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMatch<'a> {
    pub station: &'a Station,
    pub distance_km: Option<f64>,
}

/// Immutable station reference table.
#[derive(Debug, Clone)]
pub struct StationDirectory {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
}

impl StationDirectory {
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let by_id = stations
            .iter()
            .enumerate()
            .map(|(index, station)| (station.station_id.clone(), index))
            .collect();
        Self { stations, by_id }
    }

    /// Parses the processed station metadata CSV.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectoryError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let mut stations = Vec::new();
        for row in rdr.deserialize::<StationRow>() {
            stations.push(Station::from(row?));
        }
        if stations.is_empty() {
            return Err(DirectoryError::Empty);
        }
        Ok(Self::from_stations(stations))
    }

    /// Reads and parses the station table at `path`.
    pub async fn load(path: &Path) -> Result<Self, DirectoryError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DirectoryError::Read(path.to_path_buf(), e))?;
        let directory =
            tokio::task::spawn_blocking(move || Self::from_reader(bytes.as_slice())).await??;
        info!(
            "Loaded {} stations from {}",
            directory.len(),
            path.display()
        );
        Ok(directory)
    }

    pub fn get(&self, station_id: &str) -> Option<&Station> {
        self.by_id
            .get(station_id.trim())
            .and_then(|index| self.stations.get(*index))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Distinct provinces, sorted.
    pub fn provinces(&self) -> Vec<&str> {
        self.stations
            .iter()
            .map(|station| station.province.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stations matching every set criterion of `query`.
    ///
    /// With a radius search the results are sorted by distance, closest
    /// first; otherwise they keep table order.
    pub fn search(&self, query: &StationQuery) -> Vec<StationMatch<'_>> {
        let name = query.name.as_ref().map(|name| name.trim().to_uppercase());
        let radius = match (query.near, query.radius_km) {
            (Some(center), Some(radius_km)) => Some((center, radius_km)),
            _ => None,
        };

        let mut matches: Vec<StationMatch<'_>> = self
            .stations
            .iter()
            .filter(|station| {
                query
                    .province
                    .as_ref()
                    .map_or(true, |province| station.province.eq_ignore_ascii_case(province.trim()))
            })
            .filter(|station| query.frequency.map_or(true, |f| station.has_frequency(f)))
            .filter(|station| {
                if query.start_year.is_none() && query.end_year.is_none() {
                    return true;
                }
                let span = match query.frequency {
                    Some(frequency) => station.year_range(frequency),
                    None => station.years,
                };
                span.is_some_and(|span| {
                    span.overlaps(
                        query.start_year.unwrap_or(i32::MIN),
                        query.end_year.unwrap_or(i32::MAX),
                    )
                })
            })
            .filter(|station| {
                name.as_ref()
                    .map_or(true, |name| station.name.to_uppercase().contains(name.as_str()))
            })
            .filter_map(|station| match radius {
                None => Some(StationMatch {
                    station,
                    distance_km: None,
                }),
                Some((center, radius_km)) => {
                    let dist_km = distance(
                        HaversineLocation {
                            latitude: center.0,
                            longitude: center.1,
                        },
                        HaversineLocation {
                            latitude: station.location.0,
                            longitude: station.location.1,
                        },
                        Units::Kilometers,
                    );
                    (dist_km <= radius_km).then_some(StationMatch {
                        station,
                        distance_km: Some(dist_km),
                    })
                }
            })
            .collect();

        if radius.is_some() {
            matches.sort_by_key(|m| OrderedFloat(m.distance_km.unwrap_or(f64::INFINITY)));
        }
        matches
    }
}
