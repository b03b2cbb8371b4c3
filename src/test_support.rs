//! Canned upstream exports and scripted collaborators shared by unit tests.

use crate::sink::error::StoreError;
use crate::sink::signing::SignedUrl;
use crate::sink::store::ObjectStore;
use crate::source::client::ArchiveSource;
use crate::source::error::FetchError;
use crate::types::frequency::Frequency;
use crate::types::partition::FetchPartition;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const STATION_PREFIX: &str = "\"-123.18\",\"49.19\",\"ALPHA\",\"1108447\"";

fn days_in(year: i32, month: u32) -> u32 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// One month of hourly-style observations at 00:00 and 12:00 of the first
/// three days. `Wind Chill` only ever holds `M`, `Hmdx` is always blank and
/// `Rel Hum` is `-9999` on the second day at noon.
pub fn subdaily_csv(year: i32, month: u32) -> Vec<u8> {
    let mut csv = String::from(
        "\u{feff}\"Longitude (x)\",\"Latitude (y)\",\"Station Name\",\"Climate ID\",\
         \"Date/Time (LST)\",\"Year\",\"Month\",\"Day\",\"Time (LST)\",\
         \"Temp (°C)\",\"Temp Flag\",\"Rel Hum (%)\",\"Rel Hum Flag\",\
         \"Wind Chill\",\"Wind Chill Flag\",\"Hmdx\",\"Hmdx Flag\"\n",
    );
    for day in 1..=3u32 {
        for hour in [0u32, 12] {
            let temp = (month as f64) + (day as f64) / 10.0 - 2.0;
            let humidity = if day == 2 && hour == 12 {
                "-9999".to_string()
            } else {
                format!("{}", 60 + day + hour / 6)
            };
            let temp_flag = if day == 3 { "E" } else { "" };
            csv.push_str(&format!(
                "{STATION_PREFIX},\"{year:04}-{month:02}-{day:02} {hour:02}:00\",\"{year}\",\"{month:02}\",\"{day:02}\",\"{hour:02}:00\",\
                 \"{temp:.1}\",\"{temp_flag}\",\"{humidity}\",\"\",\"M\",\"\",\"\",\"\"\n"
            ));
        }
    }
    csv.into_bytes()
}

/// A whole calendar year of daily rows, on the 1st and 15th of every month.
pub fn daily_csv(year: i32) -> Vec<u8> {
    let mut csv = String::from(
        "\"Longitude (x)\",\"Latitude (y)\",\"Station Name\",\"Climate ID\",\"Date/Time\",\
         \"Year\",\"Month\",\"Day\",\"Data Quality\",\"Max Temp (°C)\",\"Max Temp Flag\",\
         \"Min Temp (°C)\",\"Min Temp Flag\",\"Total Precip (mm)\",\"Total Precip Flag\"\n",
    );
    for month in 1..=12u32 {
        for day in [1u32, 15] {
            let max = 5.0 + month as f64;
            let min = max - 8.5;
            let precip = if day == 15 { "M".to_string() } else { format!("{:.1}", month as f64 * 1.5) };
            csv.push_str(&format!(
                "{STATION_PREFIX},\"{year:04}-{month:02}-{day:02}\",\"{year}\",\"{month:02}\",\"{day:02}\",\"\",\
                 \"{max:.1}\",\"\",\"{min:.1}\",\"\",\"{precip}\",\"\"\n"
            ));
        }
    }
    csv.into_bytes()
}

/// The complete monthly history of a station, 2005-01 through 2012-12.
pub fn monthly_csv() -> Vec<u8> {
    let mut csv = String::from(
        "\"Longitude (x)\",\"Latitude (y)\",\"Station Name\",\"Climate ID\",\"Date/Time\",\
         \"Year\",\"Month\",\"Mean Max Temp (°C)\",\"Mean Max Temp Flag\",\
         \"Total Precip (mm)\",\"Total Precip Flag\"\n",
    );
    for year in 2005..=2012 {
        for month in 1..=12u32 {
            let mean_max = 2.0 + month as f64 + (year - 2005) as f64 / 10.0;
            let total = days_in(year, month) as f64 * 3.1;
            csv.push_str(&format!(
                "{STATION_PREFIX},\"{year:04}-{month:02}\",\"{year}\",\"{month:02}\",\
                 \"{mean_max:.1}\",\"\",\"{total:.1}\",\"\"\n"
            ));
        }
    }
    csv.into_bytes()
}

/// In-memory upstream that serves canned exports and records every request.
#[derive(Default)]
pub struct ScriptedSource {
    calls: Mutex<Vec<FetchPartition>>,
    fail_on_call: Option<usize>,
    stall: Option<Duration>,
    hold: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `call`-th fetch (1-based).
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Sleeps this long before answering each fetch.
    pub fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    /// Blocks every fetch until a permit is available on `gate`.
    pub fn held_by(mut self, gate: Arc<Semaphore>) -> Self {
        self.hold = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<FetchPartition> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ArchiveSource for ScriptedSource {
    async fn fetch(
        &self,
        station_id: &str,
        frequency: Frequency,
        partition: FetchPartition,
    ) -> Result<Vec<u8>, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(partition);
            calls.len()
        };
        if let Some(gate) = &self.hold {
            let _permit = gate.acquire().await.unwrap();
        }
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail_on_call == Some(call) {
            return Err(FetchError::Malformed {
                url: format!("scripted://{station_id}/{partition}"),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(match frequency {
            Frequency::Subdaily => subdaily_csv(partition.year, partition.request_month()),
            Frequency::Daily => daily_csv(partition.year),
            Frequency::Monthly => monthly_csv(),
        })
    }
}

/// Store whose writes always fail, as if the disk were full.
pub struct FailingStore;

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, _bytes: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::Write(
            PathBuf::from(key),
            std::io::Error::other("no space left on device"),
        ))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn signed_url(&self, key: &str, _ttl: Duration) -> Result<SignedUrl, StoreError> {
        Err(StoreError::NotFound(key.to_string()))
    }
}
