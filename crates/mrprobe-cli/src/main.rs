//! check_merge_requests - monitoring plugin for stale merge requests
//!
//! Prints exactly one status line on stdout and exits with the supervisor
//! code of its severity (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN). Logs go
//! to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{debug, Level};

use mrprobe_core::{
    parse_duration, run_probe, Check, ConfigLayer, Outcome, ProbeConfig, Severity,
    DEFAULT_CONFIG_PATH,
};

#[derive(Parser, Debug)]
#[command(name = "check_merge_requests")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Check a hosted git project for open merge requests that have not been updated recently",
    long_about = None
)]
struct Cli {
    /// YAML config file (default: /etc/nagios-plugin-git-hosted-project-merge-requests/config.yaml if present)
    #[arg(short, long, env = "MRPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Git provider API endpoint, e.g. https://gitlab.example.com
    #[arg(short = 'H', long, env = "MRPROBE_HOST")]
    host: Option<String>,

    /// Project id or path (owner/repo for GitHub)
    #[arg(short = 'P', long, env = "MRPROBE_PROJECT")]
    project: Option<String>,

    /// Git provider: gitlab or github [default: gitlab]
    #[arg(short = 'p', long, env = "MRPROBE_GIT_PROVIDER")]
    git_provider: Option<String>,

    /// API token
    #[arg(long, env = "MRPROBE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Branch merge requests target [default: master]
    #[arg(long, env = "MRPROBE_TARGET_BRANCH")]
    target_branch: Option<String>,

    /// Deadline for the whole check [default: 30s]
    #[arg(short, long, env = "MRPROBE_TIMEOUT", value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Age since last update that raises WARNING [default: 6h]
    #[arg(long, env = "MRPROBE_WARNING_LAST_UPDATE", value_parser = parse_duration)]
    warning_last_update: Option<Duration>,

    /// Age since last update that raises CRITICAL [default: 24h]
    #[arg(long, env = "MRPROBE_CRITICAL_LAST_UPDATE", value_parser = parse_duration)]
    critical_last_update: Option<Duration>,

    /// Enable debug logging on stderr
    #[arg(short, long, env = "MRPROBE_DEBUG")]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "MRPROBE_LOG_JSON")]
    json: bool,
}

impl Cli {
    /// Flags and environment as the highest-precedence config layer.
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            host: self.host.clone(),
            project: self.project.clone(),
            git_provider: self.git_provider.clone(),
            api_token: self.api_token.clone(),
            target_branch: self.target_branch.clone(),
            timeout: self.timeout,
            warning_last_update: self.warning_last_update,
            critical_last_update: self.critical_last_update,
            debug: self.debug.then_some(true),
        }
    }

    fn load_config(&self) -> Result<ProbeConfig> {
        let file_layer = match &self.config {
            Some(path) => ConfigLayer::from_file(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => ConfigLayer::from_optional_file(Path::new(DEFAULT_CONFIG_PATH))
                .context("loading default config file")?
                .unwrap_or_default(),
        };

        let config = self
            .layer()
            .or(file_layer)
            .resolve()
            .context("invalid configuration")?;
        Ok(config)
    }
}

/// Render a failure that happened before the probe could run.
fn critical(message: impl Into<String>) -> Outcome {
    Check::new().exit(Severity::Critical, message)
}

/// First line of a clap error without its `error: ` prefix.
fn usage_error_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn report(outcome: &Outcome) -> ExitCode {
    let mut stdout = std::io::stdout().lock();
    // A closed stdout leaves nothing to report to.
    let _ = writeln!(stdout, "{}", outcome.line());
    let _ = stdout.flush();
    ExitCode::from(outcome.exit_code())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => return report(&critical(usage_error_message(&e))),
    };

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => return report(&critical(format!("{e:#}"))),
    };

    let level = if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    mrprobe_core::init_tracing(cli.json, level);
    debug!(config = ?config, "configuration resolved");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return report(&Check::new().exit(Severity::Unknown, e.to_string())),
    };

    let outcome = runtime.block_on(run_probe(config));
    // A timed-out check may still be in flight; it is not waited for.
    runtime.shutdown_background();

    report(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["check_merge_requests"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_build_top_layer() {
        let cli = parse(&[
            "-H",
            "https://gitlab.example.com",
            "-P",
            "group/project",
            "-p",
            "gitlab",
            "--target-branch",
            "main",
            "-t",
            "10s",
            "--warning-last-update",
            "1h30m",
        ]);

        let layer = cli.layer();
        assert_eq!(layer.host.as_deref(), Some("https://gitlab.example.com"));
        assert_eq!(layer.project.as_deref(), Some("group/project"));
        assert_eq!(layer.timeout, Some(Duration::from_secs(10)));
        assert_eq!(layer.warning_last_update, Some(Duration::from_secs(5400)));
        assert_eq!(layer.critical_last_update, None);
        assert_eq!(layer.debug, None);
    }

    #[test]
    fn test_bad_duration_is_a_usage_error() {
        let err = Cli::try_parse_from(["check_merge_requests", "--timeout", "soon"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let outcome = critical(usage_error_message(&err));
        assert_eq!(outcome.exit_code(), 2);
        assert!(outcome.line().contains("invalid duration 'soon'"));
        assert!(!outcome.line().starts_with("error: "));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: https://file.example.com").unwrap();
        writeln!(file, "project: file/project").unwrap();
        writeln!(file, "timeout: 5s").unwrap();
        writeln!(file, "debug: true").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = parse(&["-c", &path, "-P", "cli/project"]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.api_endpoint, "https://file.example.com");
        assert_eq!(config.project, "cli/project");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.debug);
    }

    #[test]
    fn test_missing_explicit_config_file_is_an_error() {
        let cli = parse(&["-c", "/nonexistent/mrprobe.yaml", "-H", "https://x", "-P", "p"]);
        let err = cli.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/mrprobe.yaml"));
    }

    #[test]
    fn test_invalid_configuration_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "").unwrap();

        let cli = parse(&["-c", path.to_str().unwrap(), "-H", "https://x"]);
        let err = cli.load_config().unwrap_err();

        let outcome = critical(format!("{err:#}"));
        assert_eq!(outcome.severity(), Severity::Critical);
        assert_eq!(
            outcome.line(),
            "invalid configuration: missing required setting: project"
        );
    }
}
