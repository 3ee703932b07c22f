//! mrprobe core library
//!
//! Checks a hosted git project for open merge requests that have gone stale
//! and renders the verdict as a monitoring status line with perfdata.

pub mod check;
pub mod config;
pub mod duration;
pub mod error;
pub mod evaluator;
pub mod obs;
pub mod perfdata;
pub mod probe;
pub mod provider;
pub mod runner;
pub mod telemetry;

pub use check::{Check, CheckResult, Outcome, Severity};

pub use config::{ConfigLayer, ProbeConfig, StalenessThresholds, DEFAULT_CONFIG_PATH};

pub use duration::{format_duration, parse_duration, DurationError};

pub use error::{ConfigError, ProbeError, ProviderError, Result};

pub use evaluator::{evaluate_merge_requests, merge_request_age};

pub use perfdata::{render_perfdata, PerfDataError, PerfDatum, PerfValue, Range};

pub use probe::{run_probe, run_probe_with, MergeRequestProbe};

pub use provider::{
    build_provider, GitProvider, GithubProvider, GitlabProvider, MergeRequest,
    MergeRequestProvider,
};

pub use runner::{ProbeRunner, RunReport, RunState};

pub use telemetry::init_tracing;

/// mrprobe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
