//! Error taxonomy for a relay run
//!
//! One closed kind per failure class, so the orchestrator and callers can
//! branch on what failed rather than on message text. Every error carries
//! the artifact/stage context it was raised with; the run as a whole
//! either completes or fails — there is no partial-success reporting.

use thiserror::Error;

/// Synchronization step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Uploading artifact bytes to the staging endpoint
    Upload,
    /// Querying whether the logical filename is already registered
    ExistsCheck,
    /// Creating a new lookup registration
    Create,
    /// Updating an existing lookup registration
    Update,
    /// Committing the change as a new version
    Commit,
    /// Deploying the committed version to the worker group
    Deploy,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStage::Upload => "upload",
            SyncStage::ExistsCheck => "exists-check",
            SyncStage::Create => "create",
            SyncStage::Update => "update",
            SyncStage::Commit => "commit",
            SyncStage::Deploy => "deploy",
        };
        f.write_str(name)
    }
}

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum LookoutError {
    /// Fetching the database from the feed failed
    #[error("acquisition failed: {0}")]
    Acquisition(String),

    /// The local database file is missing or does not open as MMDB
    #[error("validation failed: {0}")]
    Validation(String),

    /// Token endpoint rejected the credentials or was unreachable
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A synchronization step failed for one artifact
    #[error("sync of '{artifact}' failed at {stage}: {message}")]
    Sync {
        /// Logical filename of the artifact being synchronized
        artifact: String,
        /// Step that failed
        stage: SyncStage,
        /// Failure detail
        message: String,
    },

    /// Removing local working files failed
    #[error("cleanup failed: {0}")]
    Cleanup(String),
}

impl From<lookout_mmdb::MmdbError> for LookoutError {
    fn from(err: lookout_mmdb::MmdbError) -> Self {
        LookoutError::Validation(err.to_string())
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, LookoutError>;
