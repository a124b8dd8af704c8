//! Relay configuration and validation
//!
//! Everything is environment-supplied (with CLI flags as overrides):
//! feed credentials, lookup-store credentials and scope, the CSV sample
//! toggle, and the working directory for transient files.

use clap::Parser;
use std::path::PathBuf;

/// Configuration for one relay run
#[derive(Parser, Debug, Clone)]
#[command(name = "lookout", about = "Relay an MMDB threat feed into a lookup-table store")]
pub struct Config {
    // === Feed (database producer) ===
    /// Base URL of the feed's database-generation endpoint
    #[arg(long, env = "FEED_BASE_URL")]
    pub feed_base_url: String,

    /// Static API key sent in the feed's `key` header
    #[arg(long, env = "FEED_API_KEY")]
    pub feed_api_key: String,

    /// Feed format version selector in the download URL
    #[arg(long, env = "FEED_FORMAT_VERSION", default_value = "3")]
    pub feed_format_version: String,

    /// Use a local MMDB file instead of downloading from the feed
    #[arg(long, value_name = "PATH")]
    pub mmdb_file: Option<PathBuf>,

    // === Lookup store (consumer) ===
    /// OAuth token endpoint base URL
    #[arg(long, env = "LOOKUP_AUTH_URL")]
    pub auth_url: String,

    /// OAuth client id (client-credentials grant)
    #[arg(long, env = "LOOKUP_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, env = "LOOKUP_CLIENT_SECRET")]
    pub client_secret: String,

    /// Lookup store API base URL
    #[arg(long, env = "LOOKUP_API_URL")]
    pub api_url: String,

    /// Organization id the worker group lives under
    #[arg(long, env = "LOOKUP_ORG_ID")]
    pub organization_id: String,

    /// Worker group to commit and deploy lookups to
    #[arg(long, env = "LOOKUP_WORKER_GROUP")]
    pub worker_group: String,

    // === Artifacts ===
    /// Logical filename the binary lookup is registered under
    #[arg(long, env = "LOOKUP_FILENAME", default_value = "ti_indicators.mmdb")]
    pub lookup_filename: String,

    /// Also export and upload a CSV sample of the database
    #[arg(long, env = "CREATE_CSV_SAMPLE", default_value = "false")]
    pub create_csv_sample: bool,

    /// Maximum data rows in the CSV sample (0 = unlimited)
    #[arg(long, env = "CSV_MAX_ROWS", default_value = "100")]
    pub csv_max_rows: u64,

    /// Directory for transient working files
    #[arg(long, env = "LOOKOUT_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Suppress informational output
    #[arg(long, short, default_value = "false")]
    pub quiet: bool,
}

impl Config {
    /// Validate the configuration at startup.
    pub fn validate(&self) -> Result<(), String> {
        if !self.lookup_filename.ends_with(".mmdb") {
            return Err(format!(
                "lookup_filename '{}' must end in .mmdb",
                self.lookup_filename
            ));
        }
        if self.lookup_filename.contains('/') || self.lookup_filename.contains("..") {
            return Err(format!(
                "lookup_filename '{}' must be a bare filename",
                self.lookup_filename
            ));
        }
        for (name, value) in [
            ("feed_base_url", &self.feed_base_url),
            ("auth_url", &self.auth_url),
            ("api_url", &self.api_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(format!("{} '{}' must be an http(s) URL", name, value));
            }
        }
        Ok(())
    }

    /// Row cap for the CSV sample; `None` means unlimited.
    pub fn csv_row_cap(&self) -> Option<u64> {
        if self.csv_max_rows == 0 {
            None
        } else {
            Some(self.csv_max_rows)
        }
    }

    /// CSV sample filename derived from the lookup filename:
    /// `name.mmdb` becomes `name-SAMPLE.csv`.
    pub fn csv_filename(&self) -> String {
        let base = self
            .lookup_filename
            .strip_suffix(".mmdb")
            .unwrap_or(&self.lookup_filename);
        format!("{}-SAMPLE.csv", base)
    }
}
