//! GitHub pull request client (REST API v3).
//!
//! Pull requests play the role of merge requests. Only the first page is
//! requested, least recently updated first, so projects with more than
//! `PAGE_SIZE` open pull requests against the branch under-report the count
//! but never miss the stalest ones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{
    api_error, http_client, parse_endpoint, MergeRequest, MergeRequestProvider, ProviderResult,
};
use crate::error::ProviderError;

const PAGE_SIZE: &str = "100";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct GithubPullRequest {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GithubPullRequest> for MergeRequest {
    fn from(pr: GithubPullRequest) -> Self {
        MergeRequest {
            id: format!("#{}", pr.number),
            title: pr.title,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        }
    }
}

/// Client for api.github.com or a GitHub Enterprise API root.
#[derive(Debug, Clone)]
pub struct GithubProvider {
    base_url: reqwest::Url,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GithubProvider {
    pub fn new(endpoint: &str, token: Option<String>) -> ProviderResult<Self> {
        Ok(Self {
            base_url: parse_endpoint(endpoint)?,
            token: token.filter(|t| !t.is_empty()),
            http_client: http_client()?,
        })
    }

    /// `project` must be `owner/repo`.
    pub fn pulls_url(&self, project: &str) -> ProviderResult<reqwest::Url> {
        let (owner, repo) = project
            .trim()
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| ProviderError::InvalidProject {
                project: project.to_string(),
                reason: "expected owner/repo".to_string(),
            })?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidEndpoint {
                endpoint: self.base_url.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(["repos", owner, repo, "pulls"]);
        Ok(url)
    }
}

#[async_trait]
impl MergeRequestProvider for GithubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch_open_merge_requests(
        &self,
        project: &str,
        target_branch: &str,
    ) -> ProviderResult<Vec<MergeRequest>> {
        let url = self.pulls_url(project)?;
        debug!(url = %url, target_branch = %target_branch, "listing github pull requests");

        let mut request = self
            .http_client
            .get(url)
            .query(&[
                ("state", "open"),
                ("base", target_branch),
                ("sort", "updated"),
                ("direction", "asc"),
                ("per_page", PAGE_SIZE),
            ])
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body = response.text().await?;
        let pulls: Vec<GithubPullRequest> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(pulls.into_iter().map(MergeRequest::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulls_url() {
        let provider = GithubProvider::new("https://api.github.com", None).unwrap();
        let url = provider.pulls_url("stevedores-org/mrprobe").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/stevedores-org/mrprobe/pulls"
        );
    }

    #[test]
    fn test_pulls_url_keeps_enterprise_prefix() {
        let provider = GithubProvider::new("https://ghe.example.com/api/v3/", None).unwrap();
        let url = provider.pulls_url("org/repo").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/org/repo/pulls"
        );
    }

    #[test]
    fn test_project_must_be_owner_and_repo() {
        let provider = GithubProvider::new("https://api.github.com", None).unwrap();
        for bad in ["repo", "/repo", "owner/", "a/b/c", "42"] {
            assert!(
                matches!(
                    provider.pulls_url(bad),
                    Err(ProviderError::InvalidProject { .. })
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let provider = GithubProvider::new("https://api.github.com", Some(String::new())).unwrap();
        assert!(provider.token.is_none());
    }
}
