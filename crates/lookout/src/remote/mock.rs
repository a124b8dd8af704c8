//! In-memory lookup store for testing
//!
//! Implements [`LookupApi`] over a `HashMap`, recording every call so
//! tests can assert on ordering, payloads, and the create-vs-update path
//! taken. Can be configured to hand back an unrelated temporary filename
//! or to fail at a named operation.

use std::collections::HashMap;
use std::io::Read;
use std::sync::RwLock;

use crate::remote::{ApiError, ApiResult, LookupApi};

/// One recorded upload
#[derive(Debug, Clone)]
pub struct UploadRecord {
    /// Logical filename the upload was staged for
    pub filename: String,
    /// Content type the client sent
    pub content_type: String,
    /// Uploaded bytes
    pub body: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    /// Registered lookups: logical id -> bound temp filename
    registered: HashMap<String, String>,
    uploads: Vec<UploadRecord>,
    calls: Vec<String>,
    commit_files: Vec<Vec<String>>,
    deploys: Vec<String>,
    commit_counter: u64,
}

/// In-memory mock of the lookup store.
pub struct MockLookupApi {
    state: RwLock<MockState>,
    /// Fixed temp filename to return instead of a derived one
    temp_filename_override: Option<String>,
    /// Operation name that should fail ("upload", "exists", "create",
    /// "update", "commit", "deploy")
    fail_at: Option<String>,
}

impl MockLookupApi {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            temp_filename_override: None,
            fail_at: None,
        }
    }

    /// Always return this temporary filename from uploads.
    pub fn with_temp_filename(mut self, name: &str) -> Self {
        self.temp_filename_override = Some(name.to_string());
        self
    }

    /// Fail the named operation with a canned error.
    pub fn failing_at(mut self, operation: &str) -> Self {
        self.fail_at = Some(operation.to_string());
        self
    }

    /// Names of all operations invoked, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.read().unwrap().calls.clone()
    }

    /// All recorded uploads, in order.
    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.state.read().unwrap().uploads.clone()
    }

    /// Whether a logical filename is currently registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.state.read().unwrap().registered.contains_key(id)
    }

    /// File list of the most recent commit.
    pub fn last_commit_files(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .commit_files
            .last()
            .cloned()
            .unwrap_or_default()
    }

    /// Commit ids deployed, in order.
    pub fn deploys(&self) -> Vec<String> {
        self.state.read().unwrap().deploys.clone()
    }

    fn check_fail(&self, operation: &str) -> ApiResult<()> {
        if self.fail_at.as_deref() == Some(operation) {
            return Err(ApiError(format!("injected {} failure", operation)));
        }
        Ok(())
    }
}

impl Default for MockLookupApi {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupApi for MockLookupApi {
    fn upload_lookup(
        &self,
        filename: &str,
        content_type: &str,
        body: &mut dyn Read,
    ) -> ApiResult<String> {
        self.check_fail("upload")?;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .map_err(|e| ApiError(e.to_string()))?;

        let mut state = self.state.write().unwrap();
        state.calls.push("upload".to_string());
        let temp = match &self.temp_filename_override {
            Some(name) => name.clone(),
            None => format!("{}.{}.tmp", filename, state.uploads.len()),
        };
        state.uploads.push(UploadRecord {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            body: bytes,
        });
        Ok(temp)
    }

    fn lookup_exists(&self, id: &str) -> ApiResult<bool> {
        self.check_fail("exists")?;
        let mut state = self.state.write().unwrap();
        state.calls.push("exists".to_string());
        Ok(state.registered.contains_key(id))
    }

    fn create_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()> {
        self.check_fail("create")?;
        let mut state = self.state.write().unwrap();
        state.calls.push("create".to_string());
        if state.registered.contains_key(id) {
            return Err(ApiError(format!("lookup '{}' already exists", id)));
        }
        state
            .registered
            .insert(id.to_string(), temp_filename.to_string());
        Ok(())
    }

    fn update_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()> {
        self.check_fail("update")?;
        let mut state = self.state.write().unwrap();
        state.calls.push("update".to_string());
        if !state.registered.contains_key(id) {
            return Err(ApiError(format!("lookup '{}' does not exist", id)));
        }
        state
            .registered
            .insert(id.to_string(), temp_filename.to_string());
        Ok(())
    }

    fn commit_version(&self, _message: &str, files: &[String]) -> ApiResult<String> {
        self.check_fail("commit")?;
        let mut state = self.state.write().unwrap();
        state.calls.push("commit".to_string());
        state.commit_files.push(files.to_vec());
        state.commit_counter += 1;
        Ok(format!("commit-{:04}", state.commit_counter))
    }

    fn deploy(&self, commit_id: &str) -> ApiResult<()> {
        self.check_fail("deploy")?;
        let mut state = self.state.write().unwrap();
        state.calls.push("deploy".to_string());
        state.deploys.push(commit_id.to_string());
        Ok(())
    }
}
