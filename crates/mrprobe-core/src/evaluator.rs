//! Staleness evaluation of open merge requests.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::check::{Check, Severity};
use crate::config::StalenessThresholds;
use crate::duration::format_duration;
use crate::perfdata::{PerfDataError, PerfDatum, PerfValue, Range};
use crate::provider::MergeRequest;

pub const OPENED_MERGE_REQUESTS_LABEL: &str = "opened_merge_requests";
pub const OLDEST_MERGE_REQUEST_LABEL: &str = "oldest_merge_request";

/// Time since the last update, clamped at zero when the provider clock is ahead.
pub fn merge_request_age(mr: &MergeRequest, now: DateTime<Utc>) -> Duration {
    (now - mr.updated_at).to_std().unwrap_or(Duration::ZERO)
}

/// Record one result per stale merge request plus the count and
/// oldest-age metrics.
///
/// A merge request whose age equals a threshold breaches it. Ages are
/// reported in whole seconds. Only fails if a metric cannot be represented
/// as perfdata.
pub fn evaluate_merge_requests(
    check: &mut Check,
    merge_requests: &[MergeRequest],
    thresholds: &StalenessThresholds,
    now: DateTime<Utc>,
) -> Result<(), PerfDataError> {
    if merge_requests.is_empty() {
        check.add_result(Severity::Ok, "No opened merge requests");
        check.add_perf_datum(PerfDatum::new(
            OPENED_MERGE_REQUESTS_LABEL,
            "",
            PerfValue::count(0),
        ));
        return Ok(());
    }

    check.add_result(Severity::Ok, "No merge requests too old");

    let mut oldest = Duration::ZERO;
    for mr in merge_requests {
        let age = merge_request_age(mr, now);
        oldest = oldest.max(age);

        let severity = if age >= thresholds.critical() {
            Severity::Critical
        } else if age >= thresholds.warning() {
            Severity::Warning
        } else {
            continue;
        };

        check.add_result(
            severity,
            format!(
                "merge request {} \"{}\" was last updated {} ago",
                mr.id,
                mr.title,
                format_duration(whole_seconds(age)),
            ),
        );
    }

    check.add_perf_datum(PerfDatum::new(
        OPENED_MERGE_REQUESTS_LABEL,
        "",
        PerfValue::count(merge_requests.len()),
    ));
    check.add_perf_datum(
        PerfDatum::new(
            OLDEST_MERGE_REQUEST_LABEL,
            "s",
            PerfValue::float(whole_seconds(oldest).as_secs_f64())?,
        )
        .with_warn(Range::upper(thresholds.warning().as_secs_f64()))
        .with_crit(Range::upper(thresholds.critical().as_secs_f64()))
        .with_min(0.0),
    );

    Ok(())
}

fn whole_seconds(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fakes::merge_request_aged;

    const HOUR: Duration = Duration::from_secs(3600);

    fn thresholds() -> StalenessThresholds {
        StalenessThresholds::new(6 * HOUR, 24 * HOUR).unwrap()
    }

    fn evaluate(ages: &[Duration]) -> Check {
        let now = Utc::now();
        let mrs: Vec<MergeRequest> = ages
            .iter()
            .enumerate()
            .map(|(i, age)| merge_request_aged(&format!("!{}", i + 1), now, *age))
            .collect();
        let mut check = Check::new();
        evaluate_merge_requests(&mut check, &mrs, &thresholds(), now).unwrap();
        check
    }

    #[test]
    fn test_empty_list_reports_ok_without_oldest_metric() {
        let check = evaluate(&[]);
        assert_eq!(check.results().len(), 1);
        assert_eq!(check.results()[0].severity, Severity::Ok);
        assert_eq!(check.perfdata().len(), 1);
        assert_eq!(check.perfdata()[0].label(), OPENED_MERGE_REQUESTS_LABEL);
        assert_eq!(check.perfdata()[0].value().as_f64(), Some(0.0));
    }

    #[test]
    fn test_fresh_requests_only_record_baseline() {
        let check = evaluate(&[HOUR, 2 * HOUR]);
        assert_eq!(check.results().len(), 1);
        assert_eq!(check.worst_severity(), Severity::Ok);
        assert_eq!(check.perfdata()[0].value().as_f64(), Some(2.0));
    }

    #[test]
    fn test_warning_and_critical_classification() {
        let check = evaluate(&[HOUR, 7 * HOUR, 25 * HOUR]);
        let severities: Vec<Severity> = check.results().iter().map(|r| r.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Ok, Severity::Warning, Severity::Critical]
        );
        assert_eq!(check.worst_severity(), Severity::Critical);
    }

    #[test]
    fn test_only_warnings_give_warning() {
        let check = evaluate(&[7 * HOUR, 8 * HOUR]);
        assert_eq!(check.worst_severity(), Severity::Warning);
    }

    #[test]
    fn test_boundary_age_breaches() {
        let check = evaluate(&[24 * HOUR]);
        assert_eq!(check.worst_severity(), Severity::Critical);

        let check = evaluate(&[6 * HOUR]);
        assert_eq!(check.worst_severity(), Severity::Warning);
    }

    #[test]
    fn test_message_names_request_and_age() {
        let check = evaluate(&[25 * HOUR]);
        let critical = &check.results()[1];
        assert!(critical.message.contains("!1"));
        assert!(critical.message.contains("25h0m0s"));
    }

    #[test]
    fn test_oldest_metric_tracks_max_age_in_seconds() {
        let check = evaluate(&[HOUR, 25 * HOUR, 7 * HOUR]);
        let oldest = &check.perfdata()[1];
        assert_eq!(oldest.label(), OLDEST_MERGE_REQUEST_LABEL);
        assert_eq!(oldest.unit(), "s");
        assert_eq!(oldest.value().as_f64(), Some(90000.0));
        assert_eq!(
            oldest.to_string(),
            "'oldest_merge_request'=90000s;21600;86400;0;"
        );
    }

    #[test]
    fn test_future_update_is_clamped() {
        let now = Utc::now();
        let mut mr = merge_request_aged("!9", now, Duration::ZERO);
        mr.updated_at = now + chrono::Duration::minutes(5);
        assert_eq!(merge_request_age(&mr, now), Duration::ZERO);

        let mut check = Check::new();
        evaluate_merge_requests(&mut check, &[mr], &thresholds(), now).unwrap();
        assert_eq!(check.worst_severity(), Severity::Ok);
        assert_eq!(check.perfdata()[1].value().as_f64(), Some(0.0));
    }
}
