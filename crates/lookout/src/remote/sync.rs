//! Per-artifact synchronization state machine
//!
//! upload → temp-filename check → exists → create-or-update → commit →
//! deploy. Any step's failure aborts the artifact with its stage attached;
//! nothing is rolled back. Re-running is idempotent: the existence check
//! disambiguates create from update, and commit/deploy are versioned
//! operations on the store side.

use std::fs::File;
use std::path::Path;

use crate::error::{LookoutError, Result, SyncStage};
use crate::remote::LookupApi;

/// How the artifact was bound to its registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindAction {
    /// A new registration was created
    Created,
    /// An existing registration was pointed at the new upload
    Updated,
}

/// Result of synchronizing one artifact
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Logical filename the artifact is registered under
    pub artifact: String,
    /// Whether the registration was created or updated
    pub action: BindAction,
    /// Commit id the deploy activated
    pub commit_id: String,
}

/// Drives the synchronization protocol for local artifact files.
pub struct Synchronizer<'a, A: LookupApi> {
    api: &'a A,
    worker_group: String,
    quiet: bool,
}

impl<'a, A: LookupApi> Synchronizer<'a, A> {
    /// Create a synchronizer for one worker group.
    pub fn new(api: &'a A, worker_group: &str, quiet: bool) -> Self {
        Self {
            api,
            worker_group: worker_group.to_string(),
            quiet,
        }
    }

    /// Synchronize one artifact file end to end.
    ///
    /// The file's name is its logical identity in the store. Content type
    /// follows the extension: `.csv` uploads as `text/csv`, everything
    /// else as `application/gzip`.
    pub fn sync_file(&self, path: &Path) -> Result<SyncOutcome> {
        let artifact = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LookoutError::Validation(format!("bad artifact path: {}", path.display())))?
            .to_string();
        let fail = |stage: SyncStage, message: String| LookoutError::Sync {
            artifact: artifact.clone(),
            stage,
            message,
        };

        let content_type = if artifact.ends_with(".csv") {
            "text/csv"
        } else {
            "application/gzip"
        };
        let mut file =
            File::open(path).map_err(|e| fail(SyncStage::Upload, format!("open failed: {}", e)))?;
        let temp_filename = self
            .api
            .upload_lookup(&artifact, content_type, &mut file)
            .map_err(|e| fail(SyncStage::Upload, e.0))?;

        // The staging name must derive from the artifact's base name; a
        // mismatch means the acknowledgment is for something else.
        let base = artifact.split('.').next().unwrap_or(&artifact);
        if !temp_filename.starts_with(base) {
            return Err(fail(
                SyncStage::Upload,
                format!("unexpected temporary filename '{}'", temp_filename),
            ));
        }
        if !self.quiet {
            eprintln!(
                "[INFO] Uploaded '{}' to {}, temporary filename: '{}'",
                artifact, self.worker_group, temp_filename
            );
        }

        let exists = self
            .api
            .lookup_exists(&artifact)
            .map_err(|e| fail(SyncStage::ExistsCheck, e.0))?;
        let action = if exists {
            self.api
                .update_lookup(&artifact, &temp_filename)
                .map_err(|e| fail(SyncStage::Update, e.0))?;
            BindAction::Updated
        } else {
            self.api
                .create_lookup(&artifact, &temp_filename)
                .map_err(|e| fail(SyncStage::Create, e.0))?;
            BindAction::Created
        };
        if !self.quiet {
            match action {
                BindAction::Updated => eprintln!(
                    "[INFO] Updated existing lookup '{}' in {}",
                    artifact, self.worker_group
                ),
                BindAction::Created => eprintln!(
                    "[INFO] Created new lookup '{}' in {}",
                    artifact, self.worker_group
                ),
            }
        }

        // The commit declares both the artifact and its metadata sidecar;
        // the store tolerates a declared-but-absent sidecar file.
        let files = vec![
            format!("groups/{}/data/lookups/{}", self.worker_group, artifact),
            format!(
                "groups/{}/data/lookups/{}",
                self.worker_group,
                sidecar_name(&artifact)
            ),
        ];
        let commit_id = self
            .api
            .commit_version("Automated lookup file update", &files)
            .map_err(|e| fail(SyncStage::Commit, e.0))?;
        if !self.quiet {
            eprintln!("[INFO] Changes committed with ID: {}", commit_id);
        }

        self.api
            .deploy(&commit_id)
            .map_err(|e| fail(SyncStage::Deploy, e.0))?;
        if !self.quiet {
            eprintln!("[INFO] Deployed commit {} to {}", commit_id, self.worker_group);
        }

        Ok(SyncOutcome {
            artifact,
            action,
            commit_id,
        })
    }
}

/// Metadata sidecar path: the last extension replaced with `.yml`.
fn sidecar_name(artifact: &str) -> String {
    match artifact.rsplit_once('.') {
        Some((stem, _)) => format!("{}.yml", stem),
        None => format!("{}.yml", artifact),
    }
}
