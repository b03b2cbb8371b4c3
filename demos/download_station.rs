//! Submits one download, polls it to completion and prints the signed link.
//!
//! Station, window and frequency can be given as arguments:
//! `cargo run --example download_station -- 51442 2019 1 2019 3 Hourly`

use station_archive::{ArchiveConfig, ArchiveService, JobPhase};
use std::env;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Parses argument `index`, or returns `default` when it was not given.
fn number<T>(args: &[String], index: usize, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match args.get(index) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| format!("Argument {} ({value:?}) is invalid: {e}", index + 1)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let arg = |index: usize, default: &str| args.get(index).cloned().unwrap_or_else(|| default.to_string());
    let start_year: i32 = number(&args, 1, 2019)?;
    let start_month: u32 = number(&args, 2, 1)?;
    let end_year: i32 = number(&args, 3, 2019)?;
    let end_month: u32 = number(&args, 4, 3)?;

    let service = ArchiveService::new(ArchiveConfig::from_env()?).await?;
    println!("Storing results in {}", service.config().storage_dir.display());

    let job_id = service
        .submit_download()
        .session_id("demo")
        .station_id(arg(0, "51442"))
        .start_year(start_year)
        .start_month(start_month)
        .end_year(end_year)
        .end_month(end_month)
        .frequency(arg(5, "Hourly"))
        .call()
        .await?;
    println!("Submitted job {}", job_id);

    loop {
        let snapshot = service.poll_job(job_id)?;
        println!("{} {}%", snapshot.state, snapshot.progress);
        match snapshot.state {
            JobPhase::Succeeded => {
                if let Some(summary) = &snapshot.summary {
                    println!("{} rows, columns: {:?}", summary.rows, summary.columns);
                    let link = service.fetch_result(&summary.filename).await?;
                    println!("Download link (valid until {}): {}", link.expires_at, link.url);
                }
                break;
            }
            JobPhase::Failed => {
                println!("{}", snapshot.error.unwrap_or_default());
                break;
            }
            JobPhase::Pending | JobPhase::Running => {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    service.forget_job(job_id)?;
    Ok(())
}
