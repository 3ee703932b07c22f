//! Probe configuration.
//!
//! Settings arrive in layers (flags and environment, then an optional YAML
//! file, then defaults). Each layer is a [`ConfigLayer`]; the merged layer
//! is resolved once into an immutable [`ProbeConfig`] that is passed
//! explicitly to the probe.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::duration::{deserialize_opt, format_duration};
use crate::error::ConfigError;
use crate::provider::GitProvider;

/// Config file read when no explicit path is given; silently skipped if absent.
pub const DEFAULT_CONFIG_PATH: &str =
    "/etc/nagios-plugin-git-hosted-project-merge-requests/config.yaml";

pub const DEFAULT_TARGET_BRANCH: &str = "master";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WARNING_LAST_UPDATE: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_CRITICAL_LAST_UPDATE: Duration = Duration::from_secs(24 * 3600);

/// Delays since last update after which a merge request is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessThresholds {
    warning: Duration,
    critical: Duration,
}

impl StalenessThresholds {
    /// Rejects `critical < warning`.
    pub fn new(warning: Duration, critical: Duration) -> Result<Self, ConfigError> {
        if critical < warning {
            return Err(ConfigError::InvalidThresholds {
                warning: format_duration(warning),
                critical: format_duration(critical),
            });
        }
        Ok(Self { warning, critical })
    }

    pub fn warning(&self) -> Duration {
        self.warning
    }

    pub fn critical(&self) -> Duration {
        self.critical
    }
}

impl Default for StalenessThresholds {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_LAST_UPDATE,
            critical: DEFAULT_CRITICAL_LAST_UPDATE,
        }
    }
}

/// Fully resolved, read-only probe settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Provider API endpoint (instance URL).
    pub api_endpoint: String,
    /// Project identifier as understood by the provider.
    pub project: String,
    pub git_provider: GitProvider,
    pub api_token: Option<String>,
    pub target_branch: String,
    /// Wall-clock budget for the whole check.
    pub timeout: Duration,
    pub thresholds: StalenessThresholds,
    pub debug: bool,
}

impl fmt::Debug for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("project", &self.project)
            .field("git_provider", &self.git_provider)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("target_branch", &self.target_branch)
            .field("timeout", &self.timeout)
            .field("thresholds", &self.thresholds)
            .field("debug", &self.debug)
            .finish()
    }
}

/// One partial source of settings. Keys match the YAML file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigLayer {
    pub host: Option<String>,
    pub project: Option<String>,
    pub git_provider: Option<String>,
    pub api_token: Option<String>,
    pub target_branch: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub timeout: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub warning_last_update: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub critical_last_update: Option<Duration>,
    pub debug: Option<bool>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ConfigLayer {
    pub fn from_yaml_str(input: &str) -> Result<Self, serde_yaml::Error> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(input)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists; `None` when it does not.
    pub fn from_optional_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::from_file(path).map(Some)
    }

    /// Field-wise merge where `self` takes precedence over `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            host: non_empty(self.host).or(lower.host),
            project: non_empty(self.project).or(lower.project),
            git_provider: non_empty(self.git_provider).or(lower.git_provider),
            api_token: non_empty(self.api_token).or(lower.api_token),
            target_branch: non_empty(self.target_branch).or(lower.target_branch),
            timeout: self.timeout.or(lower.timeout),
            warning_last_update: self.warning_last_update.or(lower.warning_last_update),
            critical_last_update: self.critical_last_update.or(lower.critical_last_update),
            debug: self.debug.or(lower.debug),
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(self) -> Result<ProbeConfig, ConfigError> {
        let api_endpoint = non_empty(self.host).ok_or(ConfigError::Missing("host"))?;
        let project = non_empty(self.project).ok_or(ConfigError::Missing("project"))?;

        let git_provider = match non_empty(self.git_provider) {
            Some(name) => name.parse()?,
            None => GitProvider::default(),
        };

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let thresholds = StalenessThresholds::new(
            self.warning_last_update
                .unwrap_or(DEFAULT_WARNING_LAST_UPDATE),
            self.critical_last_update
                .unwrap_or(DEFAULT_CRITICAL_LAST_UPDATE),
        )?;

        Ok(ProbeConfig {
            api_endpoint: api_endpoint.trim().to_string(),
            project: project.trim().to_string(),
            git_provider,
            api_token: non_empty(self.api_token),
            target_branch: non_empty(self.target_branch)
                .unwrap_or_else(|| DEFAULT_TARGET_BRANCH.to_string()),
            timeout,
            thresholds,
            debug: self.debug.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal() -> ConfigLayer {
        ConfigLayer {
            host: Some("https://gitlab.example.com".to_string()),
            project: Some("group/project".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_applies_defaults() {
        let config = minimal().resolve().unwrap();
        assert_eq!(config.git_provider, GitProvider::Gitlab);
        assert_eq!(config.target_branch, "master");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.thresholds.warning(), Duration::from_secs(6 * 3600));
        assert_eq!(config.thresholds.critical(), Duration::from_secs(24 * 3600));
        assert!(config.api_token.is_none());
        assert!(!config.debug);
    }

    #[test]
    fn test_resolve_requires_host_and_project() {
        let err = ConfigLayer::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("host")));

        let err = ConfigLayer {
            host: Some("https://gitlab.example.com".to_string()),
            project: Some("  ".to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("project")));
    }

    #[test]
    fn test_resolve_rejects_unknown_provider() {
        let layer = ConfigLayer {
            git_provider: Some("gitea".to_string()),
            ..minimal()
        };
        assert!(matches!(
            layer.resolve(),
            Err(ConfigError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_inverted_thresholds() {
        let layer = ConfigLayer {
            warning_last_update: Some(Duration::from_secs(7200)),
            critical_last_update: Some(Duration::from_secs(3600)),
            ..minimal()
        };
        let err = layer.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThresholds { .. }));
        assert!(err.to_string().contains("1h0m0s"));
    }

    #[test]
    fn test_equal_thresholds_are_allowed() {
        let t = StalenessThresholds::new(Duration::from_secs(60), Duration::from_secs(60));
        assert!(t.is_ok());
    }

    #[test]
    fn test_resolve_rejects_zero_timeout() {
        let layer = ConfigLayer {
            timeout: Some(Duration::ZERO),
            ..minimal()
        };
        assert!(matches!(layer.resolve(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn test_upper_layer_wins_and_blank_falls_through() {
        let upper = ConfigLayer {
            project: Some("cli/project".to_string()),
            target_branch: Some(String::new()),
            ..Default::default()
        };
        let lower = ConfigLayer {
            host: Some("https://file.example.com".to_string()),
            project: Some("file/project".to_string()),
            target_branch: Some("develop".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let config = upper.or(lower).resolve().unwrap();
        assert_eq!(config.project, "cli/project");
        assert_eq!(config.api_endpoint, "https://file.example.com");
        assert_eq!(config.target_branch, "develop");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_yaml_layer() {
        let layer = ConfigLayer::from_yaml_str(
            r#"
host: https://gitlab.example.com
project: group/project
git-provider: gitlab
api-token: secret
target-branch: main
timeout: 10s
warning-last-update: 2h
critical-last-update: 1h30m
debug: true
"#,
        )
        .unwrap();

        assert_eq!(layer.api_token.as_deref(), Some("secret"));
        assert_eq!(layer.timeout, Some(Duration::from_secs(10)));
        assert_eq!(layer.critical_last_update, Some(Duration::from_secs(5400)));
        assert_eq!(layer.debug, Some(true));

        // 1h30m critical is shorter than 2h warning.
        assert!(layer.resolve().is_err());
    }

    #[test]
    fn test_yaml_layer_rejects_bad_duration() {
        let err = ConfigLayer::from_yaml_str("timeout: soon\n").unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn test_empty_yaml_is_empty_layer() {
        assert_eq!(ConfigLayer::from_yaml_str("\n").unwrap(), ConfigLayer::default());
    }

    #[test]
    fn test_from_file_and_optional_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: https://gitlab.example.com").unwrap();
        writeln!(file, "project: \"42\"").unwrap();

        let layer = ConfigLayer::from_file(file.path()).unwrap();
        assert_eq!(layer.project.as_deref(), Some("42"));

        let missing = file.path().with_extension("missing");
        assert!(ConfigLayer::from_optional_file(&missing).unwrap().is_none());
        assert!(matches!(
            ConfigLayer::from_file(&missing),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_debug_output_redacts_token() {
        let config = ConfigLayer {
            api_token: Some("glpat-very-secret".to_string()),
            ..minimal()
        }
        .resolve()
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("glpat-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
