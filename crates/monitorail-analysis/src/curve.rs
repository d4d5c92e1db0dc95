//! Cumulative progress ("SIL") curve
//!
//! Time-phased values are used when the schedule has any; they are bucketed
//! by segment start. Otherwise each activity's percent complete is
//! attributed to the bucket of its start date. The second form is a coarse
//! proxy for progress, not earned value.

use monitorail_core::{CurveBucket, CurveSource, ProgressCurve, Schedule};

use crate::AnalysisError;

/// Build the curve and report which source fed it
pub fn build(schedule: &Schedule, bucket: CurveBucket) -> Result<ProgressCurve, AnalysisError> {
    let has_timephased = schedule.activities.iter().any(|a| !a.timephased.is_empty());

    if has_timephased {
        let values = schedule
            .activities
            .iter()
            .flat_map(|a| &a.timephased)
            .map(|tp| (bucket.key(tp.start.date()), tp.value));
        return Ok(ProgressCurve::from_period_values(
            CurveSource::TimePhased,
            bucket,
            values,
        ));
    }

    let values: Vec<_> = schedule
        .activities
        .iter()
        .filter_map(|a| Some((bucket.key(a.start_date()?), a.percent_complete?)))
        .collect();
    if values.is_empty() {
        return Err(AnalysisError::NoDatedProgress);
    }

    Ok(ProgressCurve::from_period_values(
        CurveSource::StartDate,
        bucket,
        values,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use monitorail_core::{Activity, TimephasedValue};
    use pretty_assertions::assert_eq;

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn cumulative(curve: &ProgressCurve) -> Vec<f64> {
        curve.points.iter().map(|p| p.cumulative).collect()
    }

    #[test]
    fn start_date_curve_accumulates() {
        let schedule = Schedule::new("C").with_activities(vec![
            Activity::new("1", "A").start(at(1, 10)).percent_complete(10.0),
            Activity::new("2", "B").start(at(2, 3)).percent_complete(20.0),
            Activity::new("3", "C").start(at(3, 17)).percent_complete(5.0),
        ]);
        let curve = build(&schedule, CurveBucket::Month).unwrap();

        assert_eq!(curve.source, CurveSource::StartDate);
        assert_eq!(cumulative(&curve), vec![10.0, 30.0, 35.0]);
        assert_eq!(
            curve.points[0].period,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[test]
    fn same_month_values_summed() {
        let schedule = Schedule::new("C").with_activities(vec![
            Activity::new("1", "A").start(at(1, 2)).percent_complete(40.0),
            Activity::new("2", "B").start(at(1, 28)).percent_complete(30.0),
            Activity::new("3", "C").percent_complete(99.0),
        ]);
        let curve = build(&schedule, CurveBucket::Month).unwrap();

        assert_eq!(curve.points.len(), 1);
        assert_eq!(curve.points[0].value, 70.0);
    }

    #[test]
    fn timephased_preferred() {
        let schedule = Schedule::new("C").with_activities(vec![
            Activity::new("1", "A")
                .start(at(1, 2))
                .percent_complete(50.0)
                .timephased(TimephasedValue::new(at(1, 2), None, 100.0))
                .timephased(TimephasedValue::new(at(2, 3), None, 50.0)),
            Activity::new("2", "B")
                .timephased(TimephasedValue::new(at(1, 20), None, 25.0)),
        ]);
        let curve = build(&schedule, CurveBucket::Month).unwrap();

        assert_eq!(curve.source, CurveSource::TimePhased);
        assert_eq!(cumulative(&curve), vec![125.0, 175.0]);
    }

    #[test]
    fn weekly_buckets() {
        // 2025-01-06 and 2025-01-08 share a week; 2025-01-13 starts the next
        let schedule = Schedule::new("C").with_activities(vec![
            Activity::new("1", "A").start(at(1, 6)).percent_complete(10.0),
            Activity::new("2", "B").start(at(1, 8)).percent_complete(10.0),
            Activity::new("3", "C").start(at(1, 13)).percent_complete(10.0),
        ]);
        let curve = build(&schedule, CurveBucket::Week).unwrap();
        assert_eq!(cumulative(&curve), vec![20.0, 30.0]);
    }

    #[test]
    fn skipped_without_inputs() {
        let no_percent =
            Schedule::new("C").with_activities(vec![Activity::new("1", "A").start(at(1, 1))]);
        assert_eq!(
            build(&no_percent, CurveBucket::Month).unwrap_err(),
            AnalysisError::NoDatedProgress
        );

        let no_start = Schedule::new("C")
            .with_activities(vec![Activity::new("1", "A").percent_complete(5.0)]);
        assert_eq!(
            build(&no_start, CurveBucket::Month).unwrap_err(),
            AnalysisError::NoDatedProgress
        );
    }
}
