//! Sync Service - Downloads the released dataset extracts for local serving
//!
//! Responsibilities:
//! - Stream the full CSV extracts from the versioned release to disk
//! - Verify and report size and sha256 digest of every download
//! - Apply rate limiting between downloads
//! - Optionally split a full extract into per-year files for the API's
//!   year-specific requests
//!
//! Usage:
//!   # All datasets:
//!   cargo run --bin sync
//!
//!   # One dataset, re-downloaded and split by year:
//!   cargo run --bin sync -- --dataset biometric --force --split-years

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

const DEFAULT_DATASETS: [&str; 3] = ["enrolment", "biometric", "demographic"];

#[derive(Parser, Debug)]
#[command(name = "sync", about = "Syncs released dataset CSVs to the local datasets directory")]
struct Args {
    /// Dataset to sync (repeatable; default: all of enrolment, biometric,
    /// demographic)
    #[arg(long = "dataset")]
    datasets: Vec<String>,

    /// Target datasets directory
    #[arg(long, default_value = "./public/datasets")]
    out_dir: PathBuf,

    /// GitHub repository holding the dataset releases
    #[arg(long, default_value = "sreecharan-desu/uidai-data-sync")]
    repo: String,

    /// Release tag of the dataset assets
    #[arg(long, default_value = "dataset-latest")]
    tag: String,

    /// Re-download even if a local copy exists
    #[arg(long, default_value = "false")]
    force: bool,

    /// Split each full extract into per-year files under split_data/
    #[arg(long, default_value = "false")]
    split_years: bool,

    /// Milliseconds to wait between downloads
    #[arg(long, default_value = "1000")]
    rate_limit_ms: u64,
}

/// Stream one release asset to disk, hashing as it lands. Returns
/// (bytes, sha256 hex digest).
async fn download_asset(
    client: &reqwest::Client,
    url: &str,
    target: &Path,
) -> Result<(u64, String)> {
    println!("  Fetching: {}", url);
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .context("HTTP request failed")?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = target.with_extension("csv.part");
    let mut file = fs::File::create(&tmp_path).await?;

    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("download interrupted")?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);
    fs::rename(&tmp_path, target).await?;

    let digest = format!("{:x}", hasher.finalize());
    Ok((size, digest))
}

/// Year of a row: dates split on `-` or `/` into three parts, and the
/// four-digit part is the year. Rows without one are unsplittable.
fn extract_year(date: &str) -> Option<&str> {
    let parts: Vec<&str> = if date.contains('-') {
        date.split('-').collect()
    } else if date.contains('/') {
        date.split('/').collect()
    } else {
        return None;
    };
    if parts.len() != 3 {
        return None;
    }
    if parts[0].len() == 4 && parts[0].bytes().all(|b| b.is_ascii_digit()) {
        return Some(parts[0]);
    }
    if parts[2].len() == 4 && parts[2].bytes().all(|b| b.is_ascii_digit()) {
        return Some(parts[2]);
    }
    None
}

/// Split a full extract into split_data/{dataset}_{year}.csv, one writer
/// per year, every file carrying the original header.
fn split_by_year(full_path: &Path, dataset: &str, out_dir: &Path) -> Result<(usize, usize)> {
    let split_dir = out_dir.join("split_data");
    std::fs::create_dir_all(&split_dir)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(full_path)
        .with_context(|| format!("Failed to open {}", full_path.display()))?;
    let headers = reader.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("date"))
        .context("No date column; cannot split by year")?;

    let mut writers: HashMap<String, csv::Writer<std::fs::File>> = HashMap::new();
    let mut written = 0usize;
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record?;
        let Some(year) = record.get(date_idx).and_then(extract_year) else {
            skipped += 1;
            continue;
        };
        let year = year.to_string();
        if !writers.contains_key(&year) {
            let path = split_dir.join(format!("{dataset}_{year}.csv"));
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            writer.write_record(&headers)?;
            writers.insert(year.clone(), writer);
        }
        // Present after the insert above.
        if let Some(writer) = writers.get_mut(&year) {
            writer.write_record(&record)?;
            written += 1;
        }
    }
    for (_, mut writer) in writers {
        writer.flush()?;
    }
    Ok((written, skipped))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let datasets: Vec<String> = if args.datasets.is_empty() {
        DEFAULT_DATASETS.iter().map(|s| s.to_string()).collect()
    } else {
        args.datasets.clone()
    };
    for dataset in &datasets {
        if !DEFAULT_DATASETS.contains(&dataset.as_str()) {
            anyhow::bail!(
                "Unknown dataset '{}'. Expected one of: {}",
                dataset,
                DEFAULT_DATASETS.join(", ")
            );
        }
    }

    println!("=== UIDAI Dataset Sync ===");
    println!("Release: {}@{}", args.repo, args.tag);
    println!("Target: {}", args.out_dir.display());

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(format!("uidai-dataset-sync/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut synced = 0;
    let mut failed = 0;

    for (i, dataset) in datasets.iter().enumerate() {
        println!("\n[{}]", dataset);
        let file_name = format!("{dataset}_full.csv");
        let target = args.out_dir.join(&file_name);

        if target.exists() && !args.force {
            println!("  Local copy present, skipping download (use --force to refresh)");
        } else {
            if i > 0 {
                println!("  Rate limit: waiting {}ms...", args.rate_limit_ms);
                sleep(Duration::from_millis(args.rate_limit_ms)).await;
            }
            let url = format!(
                "https://github.com/{}/releases/download/{}/{}",
                args.repo, args.tag, file_name
            );
            match download_asset(&client, &url, &target).await {
                Ok((size, digest)) => {
                    println!("  Downloaded: {} bytes", size);
                    println!("  Hash: sha256:{}", digest);
                    synced += 1;
                }
                Err(e) => {
                    eprintln!("  ✗ Failed: {}", e);
                    failed += 1;
                    continue;
                }
            }
        }

        if args.split_years {
            println!("  Splitting by year...");
            match split_by_year(&target, dataset, &args.out_dir) {
                Ok((written, skipped)) => {
                    println!("  Split: {} rows written, {} rows without a year", written, skipped);
                }
                Err(e) => {
                    eprintln!("  ✗ Split failed: {}", e);
                    failed += 1;
                }
            }
        }
    }

    println!("\n=== Sync Summary ===");
    println!("Synced: {}", synced);
    println!("Failed: {}", failed);
    println!("Finished at: {}", Utc::now().to_rfc3339());

    if failed > 0 {
        anyhow::bail!("{failed} operation(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_extraction_handles_both_orders() {
        assert_eq!(extract_year("01-03-2024"), Some("2024"));
        assert_eq!(extract_year("2024-03-01"), Some("2024"));
        assert_eq!(extract_year("01/03/2025"), Some("2025"));
        assert_eq!(extract_year("01-03"), None);
        assert_eq!(extract_year("01-03-24"), None);
        assert_eq!(extract_year("garbage"), None);
        assert_eq!(extract_year(""), None);
    }

    #[test]
    fn split_writes_one_file_per_year_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("biometric_full.csv");
        std::fs::write(
            &full,
            "date,state,district,pincode,bio_age_5_17,bio_age_17_\n\
             01-03-2024,Karnataka,Bengaluru,560001,10,20\n\
             05-07-2025,Kerala,Ernakulam,682001,1,2\n\
             09-08-2024,Karnataka,Mysuru,570001,3,4\n\
             not-a-date,Kerala,Ernakulam,682001,5,6\n",
        )
        .unwrap();

        let (written, skipped) = split_by_year(&full, "biometric", dir.path()).unwrap();
        assert_eq!(written, 3);
        assert_eq!(skipped, 1);

        let file_2024 =
            std::fs::read_to_string(dir.path().join("split_data").join("biometric_2024.csv")).unwrap();
        let lines: Vec<&str> = file_2024.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,state"));
        assert!(lines[1].contains("Karnataka"));

        let file_2025 =
            std::fs::read_to_string(dir.path().join("split_data").join("biometric_2025.csv")).unwrap();
        assert_eq!(file_2025.lines().count(), 2);
    }

    #[test]
    fn split_without_date_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("biometric_full.csv");
        std::fs::write(&full, "state,count\nKarnataka,5\n").unwrap();
        assert!(split_by_year(&full, "biometric", dir.path()).is_err());
    }
}
