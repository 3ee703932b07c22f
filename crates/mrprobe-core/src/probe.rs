//! The merge request probe: provider, evaluator and aggregator wired
//! together under the deadline runner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, Instrument};

use crate::check::{Check, Outcome, Severity};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::evaluator::evaluate_merge_requests;
use crate::obs::{emit_merge_requests_fetched, emit_probe_finished, emit_probe_started, ProbeSpan};
use crate::provider::{build_provider, MergeRequestProvider};
use crate::runner::{ProbeRunner, RunReport};

/// Check body for one run.
pub struct MergeRequestProbe {
    config: ProbeConfig,
    provider: Arc<dyn MergeRequestProvider>,
}

impl MergeRequestProbe {
    pub fn new(config: ProbeConfig, provider: Arc<dyn MergeRequestProvider>) -> Self {
        Self { config, provider }
    }

    /// Fetch, evaluate and render. Any error ends the run with its own
    /// severity instead of evaluating a partial list.
    pub async fn check(self, mut check: Check) -> Outcome {
        match self.evaluate(&mut check).await {
            Ok(()) => check.finish(),
            Err(e) => check.exit(e.severity(), e.to_string()),
        }
    }

    async fn evaluate(&self, check: &mut Check) -> Result<(), ProbeError> {
        let fetch_started = tokio::time::Instant::now();
        let merge_requests = self
            .provider
            .fetch_open_merge_requests(&self.config.project, &self.config.target_branch)
            .await?;
        emit_merge_requests_fetched(
            merge_requests.len(),
            fetch_started.elapsed().as_millis() as u64,
        );

        evaluate_merge_requests(check, &merge_requests, &self.config.thresholds, Utc::now())?;
        Ok(())
    }
}

/// Run the probe described by `config` against its configured provider.
pub async fn run_probe(config: ProbeConfig) -> Outcome {
    match build_provider(&config) {
        Ok(provider) => run_probe_with(config, provider).await.outcome,
        Err(e) => {
            let e = ProbeError::from(e);
            Check::new().exit(e.severity(), e.to_string())
        }
    }
}

/// Run the probe with an explicit provider.
pub async fn run_probe_with(
    config: ProbeConfig,
    provider: Arc<dyn MergeRequestProvider>,
) -> RunReport {
    let probe_span = ProbeSpan::new(provider.name(), &config.project);
    let span = probe_span.span();

    async move {
        emit_probe_started(&config.target_branch, config.timeout);

        let runner = ProbeRunner::new(config.timeout);
        let probe = MergeRequestProbe::new(config, provider);
        let body_span = tracing::Span::current();
        let report = runner
            .run(move |check| probe.check(check).instrument(body_span))
            .await;

        for result in report.outcome.results() {
            if result.severity > Severity::Ok {
                info!(severity = %result.severity, message = %result.message, "check result");
            }
        }
        emit_probe_finished(report.outcome.severity(), report.elapsed);
        report
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLayer;
    use crate::error::ProviderError;
    use crate::provider::fakes::{merge_request_aged, StalledProvider, StaticProvider};
    use crate::runner::RunState;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    fn config() -> ProbeConfig {
        ConfigLayer {
            host: Some("https://gitlab.example.com".to_string()),
            project: Some("group/project".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..ConfigLayer::default()
        }
        .resolve()
        .unwrap()
    }

    #[tokio::test]
    async fn test_probe_reports_worst_request() {
        let now = Utc::now();
        let provider = Arc::new(StaticProvider::returning(vec![
            merge_request_aged("!1", now, HOUR),
            merge_request_aged("!2", now, 7 * HOUR),
        ]));

        let report = run_probe_with(config(), provider.clone()).await;
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.outcome.severity(), Severity::Warning);
        assert!(report.outcome.line().starts_with("2 results |"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_exits_with_its_severity() {
        let provider = Arc::new(StaticProvider::failing(ProviderError::Api {
            status: 404,
            message: "404 Project Not Found".to_string(),
        }));

        let outcome = MergeRequestProbe::new(config(), provider)
            .check(Check::new())
            .await;
        assert_eq!(outcome.severity(), Severity::Critical);
        assert_eq!(
            outcome.line(),
            "listing project merge requests: API returned HTTP 404: 404 Project Not Found"
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_unknown() {
        let provider = Arc::new(StaticProvider::failing(ProviderError::Transport(
            "connection refused".to_string(),
        )));
        let report = run_probe_with(config(), provider).await;
        assert_eq!(report.outcome.exit_code(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let inner = Arc::new(StaticProvider::returning(vec![]));
        let provider = Arc::new(StalledProvider::new(Duration::from_secs(60), inner));

        let report = run_probe_with(config(), provider).await;
        assert_eq!(report.state, RunState::TimedOut);
        assert_eq!(report.outcome.line(), "timeout after 5s");
    }

    #[tokio::test]
    async fn test_run_probe_rejects_bad_endpoint_before_any_call() {
        let mut config = config();
        config.api_endpoint = "not a url".to_string();

        let outcome = run_probe(config).await;
        assert_eq!(outcome.severity(), Severity::Critical);
        assert!(outcome.line().contains("not a url"));
    }
}
