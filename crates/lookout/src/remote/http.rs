//! Blocking HTTP client for the lookup store REST API
//!
//! `connect` performs the OAuth2 client-credentials grant once; the
//! bearer token lives in memory for the rest of the run and is reused by
//! every call. A run that outlasts the token's validity window fails and
//! is retried from scratch externally.

use std::io::Read;

use serde::Deserialize;

use crate::config::Config;
use crate::error::LookoutError;
use crate::remote::{ApiError, ApiResult, LookupApi};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    filename: Option<String>,
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    items: Vec<CommitItem>,
}

#[derive(Deserialize)]
struct CommitItem {
    #[serde(default)]
    commit: Option<String>,
}

/// Authenticated client scoped to one organization and worker group.
pub struct HttpLookupApi {
    agent: ureq::Agent,
    token: String,
    /// `{api}/organizations/{org}/workspaces/main/app/api/v1/m/{group}`
    group_url: String,
    /// `{api}/organizations/{org}/workspaces/main/app/api/v1/master/groups/{group}`
    master_url: String,
    worker_group: String,
}

impl HttpLookupApi {
    /// Authenticate against the token endpoint and build a client.
    pub fn connect(config: &Config) -> Result<Self, LookoutError> {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
            .build();

        let token_url = format!("{}/oauth/token", config.auth_url);
        let response = agent
            .post(&token_url)
            .send_json(serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": config.client_id,
                "client_secret": config.client_secret,
                "audience": config.api_url,
            }))
            .map_err(|e| LookoutError::Auth(describe(e)))?;
        let token: TokenResponse = response
            .into_json()
            .map_err(|e| LookoutError::Auth(format!("malformed token response: {}", e)))?;

        let scope = format!(
            "{}/organizations/{}/workspaces/main/app/api/v1",
            config.api_url, config.organization_id
        );
        Ok(Self {
            agent,
            token: token.access_token,
            group_url: format!("{}/m/{}", scope, config.worker_group),
            master_url: format!("{}/master/groups/{}", scope, config.worker_group),
            worker_group: config.worker_group.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Render a ureq error with its status code and response body when present.
fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            format!("HTTP {}: {}", code, body)
        }
        ureq::Error::Transport(t) => t.to_string(),
    }
}

impl LookupApi for HttpLookupApi {
    fn upload_lookup(
        &self,
        filename: &str,
        content_type: &str,
        body: &mut dyn Read,
    ) -> ApiResult<String> {
        let url = format!("{}/system/lookups", self.group_url);
        let response = self
            .agent
            .put(&url)
            .query("filename", filename)
            .set("Authorization", &self.bearer())
            .set("Content-type", content_type)
            .set("accept", "application/json")
            .send(body)
            .map_err(|e| ApiError(describe(e)))?;
        let upload: UploadResponse = response
            .into_json()
            .map_err(|e| ApiError(format!("malformed upload response: {}", e)))?;
        upload
            .filename
            .ok_or_else(|| ApiError("upload response missing 'filename'".to_string()))
    }

    fn lookup_exists(&self, id: &str) -> ApiResult<bool> {
        let url = format!("{}/system/lookups/{}", self.group_url, id);
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .set("accept", "application/json")
            .call();
        let response = match response {
            Ok(r) => r,
            // Unregistered lookups surface as 404; that is a negative
            // answer, not a failure
            Err(ureq::Error::Status(404, _)) => return Ok(false),
            Err(e) => return Err(ApiError(describe(e))),
        };
        let list: ItemList = response
            .into_json()
            .map_err(|e| ApiError(format!("malformed lookup list: {}", e)))?;
        Ok(list.items.iter().any(|item| item.id.as_deref() == Some(id)))
    }

    fn create_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()> {
        let url = format!("{}/system/lookups", self.group_url);
        self.agent
            .post(&url)
            .set("Authorization", &self.bearer())
            .send_json(serde_json::json!({
                "id": id,
                "fileInfo": { "filename": temp_filename },
            }))
            .map_err(|e| ApiError(describe(e)))?;
        Ok(())
    }

    fn update_lookup(&self, id: &str, temp_filename: &str) -> ApiResult<()> {
        let url = format!("{}/system/lookups/{}", self.group_url, id);
        self.agent
            .request("PATCH", &url)
            .set("Authorization", &self.bearer())
            .set("accept", "application/json")
            .send_json(serde_json::json!({
                "id": id,
                "fileInfo": { "filename": temp_filename },
            }))
            .map_err(|e| ApiError(describe(e)))?;
        Ok(())
    }

    fn commit_version(&self, message: &str, files: &[String]) -> ApiResult<String> {
        let url = format!("{}/version/commit", self.group_url);
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.bearer())
            .send_json(serde_json::json!({
                "message": message,
                "group": self.worker_group,
                "files": files,
            }))
            .map_err(|e| ApiError(describe(e)))?;
        let commit: CommitResponse = response
            .into_json()
            .map_err(|e| ApiError(format!("malformed commit response: {}", e)))?;
        commit
            .items
            .first()
            .and_then(|item| item.commit.clone())
            .ok_or_else(|| ApiError("commit response missing commit id".to_string()))
    }

    fn deploy(&self, commit_id: &str) -> ApiResult<()> {
        let url = format!("{}/deploy", self.master_url);
        self.agent
            .request("PATCH", &url)
            .set("Authorization", &self.bearer())
            .set("accept", "application/json")
            .send_json(serde_json::json!({ "version": commit_id }))
            .map_err(|e| ApiError(describe(e)))?;
        Ok(())
    }
}
