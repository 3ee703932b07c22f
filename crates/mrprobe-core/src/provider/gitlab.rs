//! GitLab merge request client (REST API v4).
//!
//! Only the first page is requested, sorted by last update with the oldest
//! first. A project with more than `PAGE_SIZE` open merge requests against
//! the branch under-reports the count, but the stalest ones are always seen.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{
    api_error, http_client, parse_endpoint, MergeRequest, MergeRequestProvider, ProviderResult,
};
use crate::error::ProviderError;

/// https://docs.gitlab.com/ee/api/merge_requests.html#list-project-merge-requests
const OPENED_STATE: &str = "opened";
const PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
struct GitlabMergeRequest {
    iid: u64,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GitlabMergeRequest> for MergeRequest {
    fn from(mr: GitlabMergeRequest) -> Self {
        MergeRequest {
            id: format!("!{}", mr.iid),
            title: mr.title,
            created_at: mr.created_at,
            updated_at: mr.updated_at,
        }
    }
}

/// Client for one GitLab instance.
#[derive(Debug, Clone)]
pub struct GitlabProvider {
    base_url: reqwest::Url,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GitlabProvider {
    /// `endpoint` is the instance URL; `/api/v4` is appended unless present.
    pub fn new(endpoint: &str, token: Option<String>) -> ProviderResult<Self> {
        let mut base_url = parse_endpoint(endpoint)?;
        if !base_url.path().trim_end_matches('/').ends_with("/api/v4") {
            base_url
                .path_segments_mut()
                .map_err(|_| ProviderError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: "not a base URL".to_string(),
                })?
                .pop_if_empty()
                .extend(["api", "v4"]);
        }

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            http_client: http_client()?,
        })
    }

    /// `project` may be a numeric id or a `group/name` path; the path is
    /// URL-encoded into a single segment.
    pub fn merge_requests_url(&self, project: &str) -> ProviderResult<reqwest::Url> {
        if project.trim().is_empty() {
            return Err(ProviderError::InvalidProject {
                project: project.to_string(),
                reason: "empty project".to_string(),
            });
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidEndpoint {
                endpoint: self.base_url.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["projects", project, "merge_requests"]);
        Ok(url)
    }
}

#[async_trait]
impl MergeRequestProvider for GitlabProvider {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn fetch_open_merge_requests(
        &self,
        project: &str,
        target_branch: &str,
    ) -> ProviderResult<Vec<MergeRequest>> {
        let url = self.merge_requests_url(project)?;
        debug!(url = %url, target_branch = %target_branch, "listing gitlab merge requests");

        let mut request = self
            .http_client
            .get(url)
            .query(&[
                ("state", OPENED_STATE),
                ("target_branch", target_branch),
                ("order_by", "updated_at"),
                ("sort", "asc"),
                ("per_page", PAGE_SIZE),
            ]);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.text().await?;
        let merge_requests: Vec<GitlabMergeRequest> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(merge_requests.into_iter().map(MergeRequest::from).collect())
    }
}
