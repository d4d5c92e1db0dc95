//! Baseline vs. update comparison
//!
//! Activities are matched by id. Dates are compared as calendar days, so a
//! change of start hour alone is no variance.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use monitorail_core::{Schedule, VarianceReport, VarianceRow};

fn days_between(baseline: Option<NaiveDate>, update: Option<NaiveDate>) -> Option<i64> {
    Some((update? - baseline?).num_days())
}

pub fn compare(baseline: &Schedule, update: &Schedule) -> VarianceReport {
    let planned: HashMap<&str, _> = baseline
        .activities
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();
    let update_ids: HashSet<&str> = update.ids().collect();

    let mut report = VarianceReport::default();
    for current in &update.activities {
        let Some(plan) = planned.get(current.id.as_str()) else {
            report.only_in_update.push(current.id.clone());
            continue;
        };
        report.rows.push(VarianceRow {
            id: current.id.clone(),
            name: current.name.clone(),
            start_variance_days: days_between(plan.start_date(), current.start_date()),
            finish_variance_days: days_between(plan.finish_date(), current.finish_date()),
            baseline_percent: plan.percent_complete,
            update_percent: current.percent_complete,
        });
    }

    report.only_in_baseline = baseline
        .ids()
        .filter(|id| !update_ids.contains(id))
        .map(str::to_string)
        .collect();

    report
}
