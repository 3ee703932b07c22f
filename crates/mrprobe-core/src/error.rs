//! Error taxonomy for the probe.
//!
//! Every error maps to the [`Severity`] it is reported with; nothing
//! escapes the probe runner as anything other than a status line.

use std::path::PathBuf;

use thiserror::Error;

use crate::check::Severity;
use crate::perfdata::PerfDataError;

/// Problems with the probe's configuration. Always reported as CRITICAL,
/// before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("unsupported git provider '{0}' (expected one of: gitlab, github)")]
    UnsupportedProvider(String),

    #[error("critical delay ({critical}) must not be shorter than warning delay ({warning})")]
    InvalidThresholds { warning: String, critical: String },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("reading config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures of a git provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("invalid API endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid project '{project}': {reason}")]
    InvalidProject { project: String, reason: String },

    #[error("building HTTP client: {0}")]
    Client(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decoding API response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// API errors mean the host told us something is wrong; transport and
    /// decode errors mean we could not tell.
    pub fn severity(&self) -> Severity {
        match self {
            ProviderError::InvalidEndpoint { .. }
            | ProviderError::InvalidProject { .. }
            | ProviderError::Client(_)
            | ProviderError::Api { .. } => Severity::Critical,
            ProviderError::Transport(_) | ProviderError::Decode(_) => Severity::Unknown,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Anything that can end a probe run early.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("listing project merge requests: {0}")]
    Provider(#[from] ProviderError),

    #[error("creating perfdata: {0}")]
    PerfData(#[from] PerfDataError),
}

impl ProbeError {
    pub fn severity(&self) -> Severity {
        match self {
            ProbeError::Config(_) => Severity::Critical,
            ProbeError::Provider(e) => e.severity(),
            ProbeError::PerfData(_) => Severity::Unknown,
        }
    }
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;
