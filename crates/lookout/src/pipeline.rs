//! Run orchestration
//!
//! acquire → validate → normalize filename → sync binary → (optionally)
//! transcode + sync CSV sample → cleanup. Stages run strictly in
//! sequence; the first failure aborts the run. Local working files are
//! removed on both paths: a cleanup failure after a successful run is the
//! run's terminal error, while cleanup after a failed run is best-effort
//! and never masks the original error.

use std::path::{Path, PathBuf};

use lookout_mmdb::Reader;

use crate::config::Config;
use crate::error::{LookoutError, Result};
use crate::export::{export_csv, ExportStats};
use crate::feed;
use crate::remote::{LookupApi, SyncOutcome, Synchronizer};
use crate::schema::infer_schema;

/// Records sampled for schema inference.
const SCHEMA_SAMPLE_SIZE: usize = 1000;

/// Progress log interval while counting entries.
const COUNT_LOG_INTERVAL: u64 = 100_000;

/// What a completed run did
#[derive(Debug)]
pub struct RunSummary {
    /// Entries counted by full traversal
    pub entry_count: u64,
    /// Outcome for the binary lookup artifact
    pub database: SyncOutcome,
    /// Export stats and outcome for the CSV sample, when enabled
    pub csv_sample: Option<(ExportStats, SyncOutcome)>,
}

/// Run the relay end to end against the given lookup store.
pub fn run(config: &Config, api: &impl LookupApi) -> Result<RunSummary> {
    let canonical = acquire(config)?;

    let mut produced = vec![canonical.clone()];
    let result = run_stages(config, api, &canonical, &mut produced);
    match result {
        Ok(summary) => {
            cleanup(config, &produced)?;
            Ok(summary)
        }
        Err(err) => {
            // Best effort only; the stage failure is the run's error
            for path in &produced {
                let _ = std::fs::remove_file(path);
            }
            Err(err)
        }
    }
}

/// Obtain the database and move it to its canonical logical filename.
fn acquire(config: &Config) -> Result<PathBuf> {
    let canonical = config.work_dir.join(&config.lookup_filename);
    match &config.mmdb_file {
        Some(source) => {
            if !config.quiet {
                eprintln!(
                    "[INFO] Using local MMDB file: {} -> {}",
                    source.display(),
                    canonical.display()
                );
            }
            std::fs::copy(source, &canonical).map_err(|e| {
                LookoutError::Acquisition(format!(
                    "cannot copy {} to {}: {}",
                    source.display(),
                    canonical.display(),
                    e
                ))
            })?;
        }
        None => {
            let downloaded = feed::download_database(config)?;
            if !config.quiet {
                eprintln!(
                    "[INFO] Renaming {} to {}",
                    downloaded.display(),
                    canonical.display()
                );
            }
            std::fs::rename(&downloaded, &canonical).map_err(|e| {
                LookoutError::Acquisition(format!(
                    "cannot rename {} to {}: {}",
                    downloaded.display(),
                    canonical.display(),
                    e
                ))
            })?;
        }
    }
    Ok(canonical)
}

fn run_stages(
    config: &Config,
    api: &impl LookupApi,
    canonical: &Path,
    produced: &mut Vec<PathBuf>,
) -> Result<RunSummary> {
    let entry_count = validate_and_count(config, canonical)?;
    let synchronizer = Synchronizer::new(api, &config.worker_group, config.quiet);
    let database = synchronizer.sync_file(canonical)?;

    let csv_sample = if config.create_csv_sample {
        let csv_path = config.work_dir.join(config.csv_filename());
        let stats = transcode(config, canonical, &csv_path)?;
        produced.push(csv_path.clone());
        let outcome = synchronizer.sync_file(&csv_path)?;
        Some((stats, outcome))
    } else {
        None
    };

    Ok(RunSummary {
        entry_count,
        database,
        csv_sample,
    })
}

/// Open the database, log its metadata, and count entries by full
/// traversal. The traversal consumes the reader; later passes reopen.
fn validate_and_count(config: &Config, path: &Path) -> Result<u64> {
    let reader = Reader::open(path)?;
    let metadata = reader.metadata();
    if !config.quiet {
        eprintln!("[INFO] Database type: {}", metadata.database_type);
        eprintln!("[INFO] Build epoch: {}", metadata.build_epoch);
        eprintln!(
            "[INFO] IP version: {}, node count: {}",
            metadata.ip_version, metadata.node_count
        );
        eprintln!("[INFO] Counting entries... This may take a while for large databases.");
    }

    let mut count = 0u64;
    for entry in reader.into_entries() {
        entry?;
        count += 1;
        if count % COUNT_LOG_INTERVAL == 0 && !config.quiet {
            eprintln!("[INFO] Processed {} entries...", count);
        }
    }
    if !config.quiet {
        eprintln!("[INFO] The number of entries in the MMDB file is: {}", count);
    }
    Ok(count)
}

/// Infer the schema and export the CSV sample. Each pass is its own open:
/// the reader is forward-only.
fn transcode(config: &Config, mmdb_path: &Path, csv_path: &Path) -> Result<ExportStats> {
    if !config.quiet {
        eprintln!(
            "[INFO] Converting MMDB to CSV: {} -> {}",
            mmdb_path.display(),
            csv_path.display()
        );
    }
    let schema = infer_schema(
        Reader::open(mmdb_path)?.into_entries(),
        SCHEMA_SAMPLE_SIZE,
    )?;
    let stats = export_csv(
        Reader::open(mmdb_path)?.into_entries(),
        &schema,
        csv_path,
        config.csv_row_cap(),
    )?;
    if !config.quiet {
        eprintln!(
            "[INFO] CSV export completed: {} rows, {} bytes",
            stats.rows_written, stats.bytes_written
        );
    }
    Ok(stats)
}

/// Remove this run's working files. Failure here fails the run even
/// though the remote work already succeeded; the next run re-syncs
/// idempotently.
fn cleanup(config: &Config, produced: &[PathBuf]) -> Result<()> {
    for path in produced {
        if !config.quiet {
            eprintln!("[INFO] Removing working file: {}", path.display());
        }
        std::fs::remove_file(path).map_err(|e| {
            LookoutError::Cleanup(format!("cannot remove {}: {}", path.display(), e))
        })?;
    }
    Ok(())
}
