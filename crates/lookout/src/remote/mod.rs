//! Remote lookup store client and synchronization protocol
//!
//! The store distinguishes create from update and requires an explicit
//! commit + deploy to make an uploaded artifact live. [`LookupApi`] is the
//! transport seam: [`HttpLookupApi`] talks to the real REST API and
//! [`MockLookupApi`] backs the tests.

pub mod http;
pub mod mock;
pub mod sync;

pub use http::HttpLookupApi;
pub use mock::MockLookupApi;
pub use sync::{BindAction, SyncOutcome, Synchronizer};

use std::io::Read;

/// Transport-level failure of one API call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ApiError(pub String);

/// Result type for lookup store calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Operations the lookup store exposes, scoped to one organization and
/// worker group.
///
/// All methods are blocking; the whole relay is a sequential batch job.
pub trait LookupApi {
    /// Upload artifact bytes to the staging endpoint. Returns the
    /// server-assigned temporary filename.
    fn upload_lookup(
        &self,
        filename: &str,
        content_type: &str,
        body: &mut dyn Read,
    ) -> ApiResult<String>;

    /// Whether a lookup with this logical filename is already registered.
    /// An empty or absent item list means not found, not an error.
    fn lookup_exists(&self, id: &str) -> ApiResult<bool>;

    /// Register a new lookup bound to an uploaded temporary file.
    fn create_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()>;

    /// Point an existing registration at a new temporary file.
    fn update_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()>;

    /// Commit the listed paths as a new version. Returns the commit id;
    /// a response without one is a failure.
    fn commit_version(&self, message: &str, files: &[String]) -> ApiResult<String>;

    /// Activate a committed version for the worker group.
    fn deploy(&self, commit_id: &str) -> ApiResult<()>;
}
