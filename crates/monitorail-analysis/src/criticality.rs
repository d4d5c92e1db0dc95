//! Slack-threshold classification

use monitorail_core::{Criticality, CriticalityReport, CriticalityRow, Schedule};

/// Classify every activity against `threshold` days of total slack.
///
/// Activities without a slack value are kept as `Unknown`.
pub fn classify(schedule: &Schedule, threshold: i64) -> CriticalityReport {
    let rows = schedule
        .activities
        .iter()
        .map(|a| CriticalityRow {
            id: a.id.clone(),
            name: a.name.clone(),
            start: a.start,
            finish: a.finish,
            total_slack: a.total_slack,
            class: Criticality::classify(a.total_slack, threshold),
        })
        .collect();

    CriticalityReport { threshold, rows }
}
