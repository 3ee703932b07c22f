//! Probe lifecycle events.
//!
//! Each run gets a `ProbeSpan` carrying a fresh run id, and the `emit_*`
//! functions log the named `probe.*` events inside it.
//!
//! Events go to stderr through the subscriber installed by
//! [`crate::telemetry::init_tracing`]; stdout carries only the status line.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::check::Severity;

/// Run-scoped tracing span for one probe.
///
/// Attach it with [`tracing::Instrument`]; an entered guard must not be
/// held across `.await`.
///
/// # Example
///
/// ```ignore
/// let probe_span = ProbeSpan::new("gitlab", "group/project");
/// run(config).instrument(probe_span.span()).await;
/// // every event logged inside carries run_id, provider and project
/// ```
pub struct ProbeSpan {
    run_id: Uuid,
    span: tracing::Span,
}

impl ProbeSpan {
    /// Create a span tagged with a fresh run id.
    pub fn new(provider: &str, project: &str) -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "mrprobe.run",
            run_id = %run_id,
            provider = %provider,
            project = %project,
        );
        Self { run_id, span }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Emit event: probe started.
pub fn emit_probe_started(target_branch: &str, timeout: Duration) {
    info!(
        event = "probe.started",
        target_branch = %target_branch,
        timeout_ms = timeout.as_millis() as u64,
    );
}

/// Emit event: merge requests fetched from the provider.
pub fn emit_merge_requests_fetched(count: usize, duration_ms: u64) {
    info!(event = "probe.fetched", count = count, duration_ms = duration_ms);
}

/// Emit event: deadline expired before the check finished (warning level).
pub fn emit_probe_timed_out(timeout: Duration) {
    warn!(
        event = "probe.timed_out",
        timeout_ms = timeout.as_millis() as u64,
        "abandoning in-flight check"
    );
}

/// Emit event: probe finished with its final severity.
pub fn emit_probe_finished(severity: Severity, elapsed: Duration) {
    info!(
        event = "probe.finished",
        severity = %severity,
        exit_code = severity.exit_code(),
        duration_ms = elapsed.as_millis() as u64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_span_has_distinct_run_ids() {
        let a = ProbeSpan::new("gitlab", "group/project");
        let b = ProbeSpan::new("gitlab", "group/project");
        assert_ne!(a.run_id(), b.run_id());
        let _entered = a.span().entered();
    }
}
