//! Performance data (perfdata) model and its wire rendering.
//!
//! Rendered perfdata follows the monitoring-plugin grammar
//! `'label'=<value><unit>;<warn>;<crit>;<min>;<max>`. Supervisors parse it
//! positionally, so every segment separator is always emitted even when the
//! segment itself is empty.

use std::fmt;
use std::str::FromStr;

/// Marker rendered in place of a value that could not be determined.
pub const UNDETERMINED_VALUE: &str = "U";

/// Errors produced while building perfdata.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PerfDataError {
    #[error("perfdata value may not be infinity or NaN: {0}")]
    NotFinite(f64),

    #[error("invalid threshold range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
}

/// Value of a single metric.
///
/// The float variant is only reachable through [`PerfValue::float`] and
/// [`PerfValue::count`], so it always holds a finite number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerfValue {
    Float(FiniteFloat),
    Undetermined,
}

/// An `f64` known to be neither infinite nor NaN.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct FiniteFloat(f64);

impl FiniteFloat {
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PerfValue {
    /// Build a float value, rejecting infinities and NaN.
    pub fn float(value: f64) -> Result<Self, PerfDataError> {
        if !value.is_finite() {
            return Err(PerfDataError::NotFinite(value));
        }
        Ok(PerfValue::Float(FiniteFloat(value)))
    }

    /// Build a value from an integer count.
    pub fn count(n: usize) -> Self {
        PerfValue::Float(FiniteFloat(n as f64))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PerfValue::Float(f) => Some(f.get()),
            PerfValue::Undetermined => None,
        }
    }
}

impl fmt::Display for PerfValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerfValue::Float(v) => f.write_str(&fmt_perf_float(v.get())),
            PerfValue::Undetermined => f.write_str(UNDETERMINED_VALUE),
        }
    }
}

/// Shortest decimal form that round-trips, never in scientific notation.
fn fmt_perf_float(n: f64) -> String {
    format!("{n}")
}

/// Threshold range in the monitoring-plugin convention.
///
/// `start:end` alerts outside the interval; a leading `@` alerts inside it.
/// An infinite `start` renders as `~`, an infinite `end` is omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub start: f64,
    pub end: f64,
    pub invert: bool,
}

impl Range {
    /// `0:end`, written as just `end`.
    pub fn upper(end: f64) -> Self {
        Self {
            start: 0.0,
            end,
            invert: false,
        }
    }

    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    pub fn parse(input: &str) -> Result<Self, PerfDataError> {
        let invalid = |reason: &str| PerfDataError::InvalidRange {
            range: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty range"));
        }

        let (invert, bounds) = match trimmed.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (start, end) = match bounds.split_once(':') {
            None => (0.0, parse_bound(bounds).ok_or_else(|| invalid("bad end"))?),
            Some((start, end)) => {
                let start = match start {
                    "~" => f64::NEG_INFINITY,
                    "" => 0.0,
                    s => parse_bound(s).ok_or_else(|| invalid("bad start"))?,
                };
                let end = match end {
                    "" => f64::INFINITY,
                    e => parse_bound(e).ok_or_else(|| invalid("bad end"))?,
                };
                (start, end)
            }
        };

        if start > end {
            return Err(invalid("start is greater than end"));
        }

        Ok(Self { start, end, invert })
    }
}

fn parse_bound(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl FromStr for Range {
    type Err = PerfDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Range::parse(s)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            f.write_str("@")?;
        }

        if self.start == 0.0 && self.end.is_finite() {
            return f.write_str(&fmt_perf_float(self.end));
        }

        if self.start == f64::NEG_INFINITY {
            f.write_str("~")?;
        } else {
            f.write_str(&fmt_perf_float(self.start))?;
        }
        f.write_str(":")?;
        if self.end.is_finite() {
            f.write_str(&fmt_perf_float(self.end))?;
        }
        Ok(())
    }
}

/// One metric reported alongside the check result.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfDatum {
    label: String,
    value: PerfValue,
    unit: String,
    warn: Option<Range>,
    crit: Option<Range>,
    min: Option<f64>,
    max: Option<f64>,
}

impl PerfDatum {
    pub fn new(label: impl Into<String>, unit: impl Into<String>, value: PerfValue) -> Self {
        Self {
            label: label.into(),
            value,
            unit: unit.into(),
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn with_warn(mut self, warn: Range) -> Self {
        self.warn = Some(warn);
        self
    }

    pub fn with_crit(mut self, crit: Range) -> Self {
        self.crit = Some(crit);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> PerfValue {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

fn bound(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map(fmt_perf_float)
        .unwrap_or_default()
}

impl fmt::Display for PerfDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let warn = self.warn.map(|r| r.to_string()).unwrap_or_default();
        let crit = self.crit.map(|r| r.to_string()).unwrap_or_default();

        write!(
            f,
            "'{}'={}{};{};{};{};{}",
            self.label.replace('\'', "''"),
            self.value,
            self.unit,
            warn,
            crit,
            bound(self.min),
            bound(self.max),
        )
    }
}

/// Render all metrics for appending to the status line.
///
/// Returns an empty string when there is nothing to report, so the `|`
/// delimiter never appears without metrics behind it.
pub fn render_perfdata(perfdata: &[PerfDatum]) -> String {
    if perfdata.is_empty() {
        return String::new();
    }

    let rendered: Vec<String> = perfdata.iter().map(|d| d.to_string()).collect();
    format!(" |{}", rendered.join(" "))
}
