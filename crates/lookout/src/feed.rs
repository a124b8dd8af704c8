//! MMDB acquisition from the threat-intelligence feed
//!
//! The feed generates a database for a date range on demand. The download
//! is streamed straight to disk; a surprising content type is only a
//! warning because some frontends mislabel octet streams.

use std::fs::File;
use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDate};

use crate::config::Config;
use crate::error::{LookoutError, Result};

/// Content types accepted without a warning.
const EXPECTED_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "application/x-mmdb"];

/// Download URL for a one-day date range ending today.
fn download_url(base: &str, from: NaiveDate, to: NaiveDate, version: &str) -> String {
    format!(
        "{}/v1/generate/{}/{}/{}/mmdb",
        base,
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d"),
        version
    )
}

/// Local filename for a downloaded database.
fn dated_filename(version: &str, date: NaiveDate) -> String {
    format!("m{}-{}.mmdb", version, date.format("%Y-%m-%d"))
}

/// Download today's database into the working directory.
///
/// Returns the path of the downloaded file. Every failure here is an
/// acquisition failure; the caller validates the file contents separately.
pub fn download_database(config: &Config) -> Result<PathBuf> {
    let today = Local::now().date_naive();
    let yesterday = today - Duration::days(1);
    let url = download_url(
        &config.feed_base_url,
        yesterday,
        today,
        &config.feed_format_version,
    );
    let path = config
        .work_dir
        .join(dated_filename(&config.feed_format_version, today));

    if !config.quiet {
        eprintln!("[INFO] Downloading MMDB file from: {}", url);
        eprintln!("[INFO] Saving to: {}", path.display());
    }

    let agent = ureq::AgentBuilder::new()
        .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
        .build();
    let response = agent
        .get(&url)
        .set("key", &config.feed_api_key)
        .call()
        .map_err(|e| LookoutError::Acquisition(format!("download failed: {}", e)))?;

    let content_type = response.content_type().to_string();
    if !EXPECTED_CONTENT_TYPES.contains(&content_type.as_str()) && !config.quiet {
        eprintln!("[WARN] Unexpected content type: {}", content_type);
    }

    let mut file = File::create(&path)
        .map_err(|e| LookoutError::Acquisition(format!("cannot create {}: {}", path.display(), e)))?;
    let bytes = std::io::copy(&mut response.into_reader(), &mut file)
        .map_err(|e| LookoutError::Acquisition(format!("download interrupted: {}", e)))?;
    if bytes == 0 {
        return Err(LookoutError::Acquisition(
            "feed returned an empty file".to_string(),
        ));
    }
    if !config.quiet {
        eprintln!("[INFO] MMDB file downloaded successfully. Size: {} bytes", bytes);
    }
    Ok(path)
}
