//! Turns raw partition CSV bodies into the dataset handed to the result sink.
//!
//! Upstream exports carry every column as text, interleave a `... Flag`
//! annotation column after most measurements and mark gaps with sentinel
//! codes. All columns are read as strings and partitions are joined by column
//! name, then the frame is clipped to the requested window and reduced to the
//! timestamp plus the allow-listed measurement columns.

use crate::assemble::error::AssembleError;
use crate::types::month::Month;
use crate::types::partition::FetchPartition;
use crate::types::selector::StationSelector;
use polars::functions::concat_df_diagonal;
use polars::prelude::*;
use std::io::Cursor;

/// Prefix shared by the timestamp column of every frequency
/// (`Date/Time` for daily and monthly, `Date/Time (LST)` for sub-daily).
pub const TIMESTAMP_PREFIX: &str = "Date/Time";

/// Suffix of the quality-flag companion columns.
pub const FLAG_SUFFIX: &str = "Flag";

/// Name prefixes of the measurement columns that are kept.
pub const MEASUREMENT_PREFIXES: &[&str] = &[
    "Temp",
    "Dew Point Temp",
    "Rel Hum",
    "Precip. Amount",
    "Wind Dir",
    "Wind Spd",
    "Visibility",
    "Stn Press",
    "Hmdx",
    "Wind Chill",
    "Weather",
    "Max Temp",
    "Min Temp",
    "Mean Temp",
    "Heat Deg Days",
    "Cool Deg Days",
    "Total Rain",
    "Total Snow",
    "Total Precip",
    "Snow on Grnd",
    "Dir of Max Gust",
    "Spd of Max Gust",
    "Mean Max Temp",
    "Mean Min Temp",
    "Extr Max Temp",
    "Extr Min Temp",
    "Snow Grnd Last Day",
];

/// Cell values the archive uses for "no observation".
pub const MISSING_DATA_CODES: &[&str] = &["M", "NA", "N/A", "-9999", "-9999.9", "-999"];

/// Whether a column is a retained measurement column.
pub fn is_measurement_column(name: &str) -> bool {
    !name.trim_end().ends_with(FLAG_SUFFIX)
        && MEASUREMENT_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Maps sentinel codes and blank cells to `None`.
fn normalize_value(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || MISSING_DATA_CODES.contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// The clipped, reduced rows of one job, in chronological order.
#[derive(Debug, Clone)]
pub struct AssembledDataset {
    frame: DataFrame,
    timestamp_column: String,
}

impl AssembledDataset {
    /// Builds a dataset from the raw bodies of `selector`'s partitions, given in
    /// fetch order.
    ///
    /// This is CPU-bound; async callers should run it on a blocking thread.
    pub fn from_partitions(
        selector: &StationSelector,
        bodies: Vec<(FetchPartition, Vec<u8>)>,
    ) -> Result<Self, AssembleError> {
        let station = selector.station_id();
        let mut frames = Vec::with_capacity(bodies.len());
        for (partition, body) in bodies {
            let frame = parse_partition_csv(body).map_err(|e| AssembleError::CsvRead {
                station: station.to_string(),
                partition,
                source: e,
            })?;
            frames.push(frame);
        }
        if frames.is_empty() {
            return Err(AssembleError::NoPartitions(station.to_string()));
        }

        // Columns are matched by name; a column missing from a partition is null there.
        let combined = concat_df_diagonal(&frames).map_err(|e| AssembleError::Concatenation {
            station: station.to_string(),
            source: e,
        })?;
        let timestamp_column = combined
            .get_column_names()
            .into_iter()
            .find(|name| name.starts_with(TIMESTAMP_PREFIX))
            .map(|name| name.to_string())
            .ok_or_else(|| AssembleError::MissingTimestamp(station.to_string()))?;

        let clipped = clip_to_window(&combined, &timestamp_column, selector)?;
        let frame = reduce_columns(&clipped, &timestamp_column)?;

        Ok(Self {
            frame,
            timestamp_column,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    /// Retained column names, timestamp first.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Serializes the dataset as CSV with a header row; absent values are empty cells.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, PolarsError> {
        let mut frame = self.frame.clone();
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(buffer)
    }
}

/// Reads one partition body with every column typed as text.
fn parse_partition_csv(mut body: Vec<u8>) -> PolarsResult<DataFrame> {
    if body.starts_with(b"\xef\xbb\xbf") {
        body.drain(..3);
    }
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(body))
        .finish()
}

/// Keeps only rows whose own timestamp falls inside the requested months, and
/// orders them chronologically. Rows with an unreadable timestamp are dropped.
fn clip_to_window(
    frame: &DataFrame,
    timestamp_column: &str,
    selector: &StationSelector,
) -> PolarsResult<DataFrame> {
    let timestamps = frame.column(timestamp_column)?.str()?;
    let mask: BooleanChunked = timestamps
        .into_iter()
        .map(|value| Some(value.and_then(Month::parse_prefix).is_some_and(|m| selector.contains(m))))
        .collect();
    frame.filter(&mask)?.sort(
        [timestamp_column],
        SortMultipleOptions::default().with_maintain_order(true),
    )
}

/// Drops flag and non-measurement columns, replaces sentinel codes with nulls
/// and removes measurement columns left without a single value.
fn reduce_columns(frame: &DataFrame, timestamp_column: &str) -> PolarsResult<DataFrame> {
    let mut kept: Vec<Column> = Vec::new();
    for column in frame.get_columns() {
        let name = column.name().as_str();
        if name == timestamp_column {
            kept.insert(0, column.clone());
            continue;
        }
        if !is_measurement_column(name) {
            continue;
        }
        let cleaned: StringChunked = column
            .str()?
            .into_iter()
            .map(|value| value.and_then(normalize_value))
            .collect();
        if cleaned.null_count() == cleaned.len() {
            continue;
        }
        kept.push(cleaned.with_name(column.name().clone()).into_series().into());
    }
    DataFrame::new(kept)
}
