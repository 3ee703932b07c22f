//! Result aggregation for a single probe run.
//!
//! A [`Check`] collects severity results and perfdata, then renders them
//! into the one-line [`Outcome`] a monitoring supervisor consumes. The
//! worst recorded severity wins.

use serde::{Deserialize, Serialize};

use crate::perfdata::{render_perfdata, PerfDatum};

/// Monitoring status vocabulary, ordered from best to worst.
///
/// `Unknown` is the ceiling: it means the check itself could not evaluate
/// state, and overrides even `Critical`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    /// Process exit code expected by the supervisor.
    pub fn exit_code(self) -> u8 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    pub severity: Severity,
    pub message: String,
}

/// Terminal rendering of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    severity: Severity,
    line: String,
    results: Vec<CheckResult>,
}

impl Outcome {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn exit_code(&self) -> u8 {
        self.severity.exit_code()
    }

    /// Status line without a trailing newline.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Results that contributed to this outcome, in insertion order.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }
}

/// Make a message safe for the status line: `|` would open the perfdata
/// section and a line break would split the line.
fn status_text(message: &str) -> String {
    message
        .chars()
        .map(|c| match c {
            '|' => '/',
            '\r' | '\n' => ' ',
            c => c,
        })
        .collect()
}

/// Accumulator for one probe run.
///
/// The terminal methods [`Check::finish`] and [`Check::exit`] consume the
/// check, so a run renders at most once.
#[derive(Debug, Default)]
pub struct Check {
    results: Vec<CheckResult>,
    perfdata: Vec<PerfDatum>,
}

impl Check {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, severity: Severity, message: impl Into<String>) {
        self.results.push(CheckResult {
            severity,
            message: message.into(),
        });
    }

    /// Label uniqueness is not checked here.
    pub fn add_perf_datum(&mut self, datum: PerfDatum) {
        self.perfdata.push(datum);
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn perfdata(&self) -> &[PerfDatum] {
        &self.perfdata
    }

    /// Max severity over all results; `Ok` when nothing was recorded.
    pub fn worst_severity(&self) -> Severity {
        self.results
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or_default()
    }

    fn summary(&self) -> String {
        match self.results.as_slice() {
            [] => "No results".to_string(),
            [only] => status_text(&only.message),
            many => format!("{} results", many.len()),
        }
    }

    /// Render the worst-status-wins outcome.
    pub fn finish(self) -> Outcome {
        let severity = self.worst_severity();
        let line = format!("{}{}", self.summary(), render_perfdata(&self.perfdata));
        Outcome {
            severity,
            line,
            results: self.results,
        }
    }

    /// Abort the run with exactly `severity` and `message`.
    ///
    /// Results recorded so far are dropped from the summary; perfdata is kept.
    pub fn exit(self, severity: Severity, message: impl Into<String>) -> Outcome {
        let result = CheckResult {
            severity,
            message: message.into(),
        };
        let line = format!(
            "{}{}",
            status_text(&result.message),
            render_perfdata(&self.perfdata)
        );
        Outcome {
            severity,
            line,
            results: vec![result],
        }
    }
}
