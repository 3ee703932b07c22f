//! Git provider capability: list a project's open merge requests.
//!
//! The probe only depends on [`MergeRequestProvider`]. Concrete clients are
//! selected once from [`GitProvider`], so adding a provider touches this
//! module and nothing downstream of it.

pub mod fakes;
pub mod github;
pub mod gitlab;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProbeConfig;
use crate::error::{ConfigError, ProviderError};

pub use github::GithubProvider;
pub use gitlab::GitlabProvider;

/// Result type for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Snapshot of an open merge request as returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeRequest {
    /// Provider-specific reference, unique within one response (`!12`, `#34`).
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Supported hosted git providers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Gitlab,
    Github,
}

impl GitProvider {
    pub const ALL: [GitProvider; 2] = [GitProvider::Gitlab, GitProvider::Github];

    pub fn as_str(self) -> &'static str {
        match self {
            GitProvider::Gitlab => "gitlab",
            GitProvider::Github => "github",
        }
    }
}

impl fmt::Display for GitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GitProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        GitProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnsupportedProvider(s.to_string()))
    }
}

/// Ability to list the open merge requests of a project against a branch.
///
/// Implementations return the complete list or fail; there is no partial
/// result.
#[async_trait]
pub trait MergeRequestProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    async fn fetch_open_merge_requests(
        &self,
        project: &str,
        target_branch: &str,
    ) -> ProviderResult<Vec<MergeRequest>>;
}

/// Build the client selected by `config.git_provider`.
pub fn build_provider(config: &ProbeConfig) -> ProviderResult<Arc<dyn MergeRequestProvider>> {
    let token = config.api_token.clone();
    let provider: Arc<dyn MergeRequestProvider> = match config.git_provider {
        GitProvider::Gitlab => Arc::new(GitlabProvider::new(&config.api_endpoint, token)?),
        GitProvider::Github => Arc::new(GithubProvider::new(&config.api_endpoint, token)?),
    };
    Ok(provider)
}

pub(crate) fn http_client() -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("mrprobe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

/// Parse a base URL, keeping a trailing-slash-free path for segment pushes.
pub(crate) fn parse_endpoint(endpoint: &str) -> ProviderResult<reqwest::Url> {
    let invalid = |reason: String| ProviderError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = reqwest::Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url)
}

/// Read a failed response into an [`ProviderError::Api`].
pub(crate) async fn api_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = api_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Both providers answer errors with `{"message": ...}`.
fn api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
