use anyhow::{Context, Result};
use clap::Parser;

use lookout::{pipeline, BindAction, Config, HttpLookupApi};

fn main() -> Result<()> {
    let config = Config::parse();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    if !config.quiet {
        eprintln!(
            "[INFO] lookout {} - relaying {} to worker group '{}'",
            env!("CARGO_PKG_VERSION"),
            config.lookup_filename,
            config.worker_group
        );
    }

    let api = HttpLookupApi::connect(&config).context("failed to authenticate with the lookup store")?;
    if !config.quiet {
        eprintln!("[INFO] Bearer token acquired.");
    }

    let summary = pipeline::run(&config, &api).context("relay run failed")?;

    if !config.quiet {
        let action = |a: &BindAction| match a {
            BindAction::Created => "created",
            BindAction::Updated => "updated",
        };
        eprintln!("[INFO] === Run Complete ===");
        eprintln!("[INFO] Entries: {}", summary.entry_count);
        eprintln!(
            "[INFO] Database: {} ({}, commit {})",
            summary.database.artifact,
            action(&summary.database.action),
            summary.database.commit_id
        );
        if let Some((stats, outcome)) = &summary.csv_sample {
            eprintln!(
                "[INFO] CSV sample: {} ({} rows, {} bytes, {}, commit {})",
                outcome.artifact,
                stats.rows_written,
                stats.bytes_written,
                action(&outcome.action),
                outcome.commit_id
            );
        }
    }
    Ok(())
}
