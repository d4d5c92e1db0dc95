//! # monitorail-analysis
//!
//! Period filtering and progress analyses for monitorail.
//!
//! This crate provides:
//! - The period filter (`filter_period`) and field coverage counts
//! - Slack-threshold criticality, resource tally, percent complete table
//! - Cumulative progress curve and dependency graph construction
//! - Baseline vs. update variance
//!
//! Every analysis kind is independent: the field coverage of the schedule
//! decides which kinds can run, and a kind whose input field is missing is
//! skipped with a warning while the others still run.
//!
//! ## Example
//!
//! ```rust
//! use monitorail_analysis::{AnalysisOptions, Analyzer};
//! use monitorail_core::{Activity, AnalysisKind, Schedule};
//!
//! let schedule = Schedule::new("Demo").with_activities(vec![
//!     Activity::new("1", "Scavo").total_slack(0).resource("ESC"),
//!     Activity::new("2", "Getto").total_slack(12).predecessor("1"),
//! ]);
//!
//! let result = Analyzer::new(AnalysisOptions::default()).analyze(&schedule);
//! assert_eq!(result.criticality().unwrap().flagged_count(), 1);
//! assert!(result.is_skipped(AnalysisKind::PercentComplete));
//! ```

pub mod criticality;
pub mod curve;
pub mod filter;
pub mod graph;
pub mod percent;
pub mod resources;
pub mod variance;

pub use filter::{filter_period, FieldCoverage, Filtered};

use std::collections::BTreeSet;

use monitorail_core::{
    AnalysisKind, AnalysisOutput, AnalysisResult, ConfigError, CurveBucket, CurveSource,
    Diagnostic, DiagnosticCode, Schedule,
};
use thiserror::Error;
use tracing::{debug, info};

/// Why an analysis kind could not run on a schedule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("no activity carries {0}")]
    MissingField(&'static str),

    #[error("no activity has assigned resources")]
    NoResources,

    #[error("no time-phased values and no PercentComplete")]
    NoProgressValues,

    #[error("no activity has both PercentComplete and Start")]
    NoDatedProgress,
}

/// Default slack threshold in days
pub const DEFAULT_SLACK_THRESHOLD: i64 = 5;

/// Which analyses to run and how
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub kinds: BTreeSet<AnalysisKind>,
    pub slack_threshold: i64,
    pub bucket: CurveBucket,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            kinds: AnalysisKind::SINGLE_SCHEDULE.into_iter().collect(),
            slack_threshold: DEFAULT_SLACK_THRESHOLD,
            bucket: CurveBucket::default(),
        }
    }
}

impl AnalysisOptions {
    /// Run only the given kinds
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = AnalysisKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn slack_threshold(mut self, days: i64) -> Self {
        self.slack_threshold = days;
        self
    }

    pub fn bucket(mut self, bucket: CurveBucket) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn runs(&self, kind: AnalysisKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slack_threshold < 0 {
            return Err(ConfigError::NegativeThreshold(self.slack_threshold));
        }
        Ok(())
    }
}

/// Runs the requested analyses over a schedule
#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    options: AnalysisOptions,
}

impl Analyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    fn threshold(&self) -> i64 {
        self.options.slack_threshold.max(0)
    }

    /// Run every requested single-schedule analysis
    pub fn analyze(&self, schedule: &Schedule) -> AnalysisResult {
        let mut result = AnalysisResult::new();
        let coverage = FieldCoverage::of(schedule);
        debug!(?coverage, "field coverage");

        for kind in AnalysisKind::SINGLE_SCHEDULE {
            if !self.options.runs(kind) {
                continue;
            }
            let outcome = coverage
                .require(kind)
                .and_then(|()| self.run_kind(kind, schedule, &coverage, &mut result));
            if let Err(e) = outcome {
                result.skip(kind, e.to_string());
            }
        }

        info!(
            produced = result.outputs.len(),
            skipped = result.skipped.len(),
            "analysis finished"
        );
        result
    }

    fn run_kind(
        &self,
        kind: AnalysisKind,
        schedule: &Schedule,
        coverage: &FieldCoverage,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        match kind {
            AnalysisKind::Criticality => {
                let report = criticality::classify(schedule, self.threshold());
                completed(
                    result,
                    format!(
                        "criticality: {} of {} activities critical or sub-critical (slack <= {} days)",
                        report.flagged_count(),
                        report.rows.len(),
                        report.threshold
                    ),
                );
                result.record(AnalysisOutput::Criticality(report));
            }
            AnalysisKind::ResourceTally => {
                let tally = resources::tally(schedule);
                completed(
                    result,
                    format!(
                        "resource tally: {} distinct resources on {} activities",
                        tally.entries.len(),
                        coverage.resources
                    ),
                );
                result.record(AnalysisOutput::ResourceTally(tally));
            }
            AnalysisKind::PercentComplete => {
                let table = percent::table(schedule);
                completed(
                    result,
                    format!(
                        "percent complete: {} activities, mean {:.1}%",
                        table.rows.len(),
                        table.mean().unwrap_or(0.0)
                    ),
                );
                result.record(AnalysisOutput::PercentComplete(table));
            }
            AnalysisKind::ProgressCurve => {
                let curve = curve::build(schedule, self.options.bucket)?;
                let mut source = Diagnostic::new(
                    DiagnosticCode::I007CurveSource,
                    format!(
                        "progress curve source: {} values, {} buckets",
                        curve.source.as_str(),
                        curve.bucket.as_str()
                    ),
                );
                if curve.source == CurveSource::StartDate {
                    source = source.with_note(
                        "percent complete attributed to start dates: a coarse proxy, not earned value",
                    );
                }
                result.log.push(source);
                completed(result, format!("progress curve: {} periods", curve.points.len()));
                result.record(AnalysisOutput::ProgressCurve(curve));
            }
            AnalysisKind::DependencyGraph => {
                let (graph, log) = graph::build(schedule, self.threshold());
                result.log.extend(log);
                completed(
                    result,
                    format!(
                        "dependency graph: {} nodes, {} edges",
                        graph.nodes.len(),
                        graph.edges.len()
                    ),
                );
                result.record(AnalysisOutput::DependencyGraph(graph));
            }
            // Needs a second schedule; see `analyze_update`
            AnalysisKind::Variance => {}
        }
        Ok(())
    }

    /// Analyze the update schedule and compare it against the baseline
    pub fn analyze_update(&self, baseline: &Schedule, update: &Schedule) -> AnalysisResult {
        let mut result = self.analyze(update);

        let report = variance::compare(baseline, update);
        if !report.only_in_baseline.is_empty() || !report.only_in_update.is_empty() {
            result.log.push(Diagnostic::new(
                DiagnosticCode::W012UnmatchedActivities,
                format!(
                    "{} activities only in the baseline, {} only in the update",
                    report.only_in_baseline.len(),
                    report.only_in_update.len()
                ),
            ));
        }
        completed(
            &mut result,
            format!(
                "variance: {} matched activities, {} finishing late",
                report.rows.len(),
                report.late_count()
            ),
        );
        result.record(AnalysisOutput::Variance(report));
        result
    }
}

fn completed(result: &mut AnalysisResult, message: String) {
    result
        .log
        .push(Diagnostic::new(DiagnosticCode::I006AnalysisCompleted, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitorail_core::Activity;

    #[test]
    fn default_options() {
        let options = AnalysisOptions::default();
        assert_eq!(options.slack_threshold, 5);
        assert_eq!(options.bucket, CurveBucket::Month);
        assert!(options.runs(AnalysisKind::DependencyGraph));
        assert!(!options.runs(AnalysisKind::Variance));
    }

    #[test]
    fn negative_threshold_rejected() {
        let options = AnalysisOptions::default().slack_threshold(-1);
        assert_eq!(options.validate(), Err(ConfigError::NegativeThreshold(-1)));
    }

    #[test]
    fn only_requested_kinds_run() {
        let schedule = Schedule::new("S")
            .with_activities(vec![Activity::new("1", "A").total_slack(1).percent_complete(5.0)]);
        let analyzer =
            Analyzer::new(AnalysisOptions::default().with_kinds([AnalysisKind::Criticality]));
        let result = analyzer.analyze(&schedule);

        assert_eq!(result.outputs.len(), 1);
        assert!(result.criticality().is_some());
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn skip_reason_comes_from_coverage() {
        let schedule = Schedule::new("S").with_activities(vec![
            Activity::new("1", "A").resource("R").percent_complete(50.0),
            Activity::new("2", "B").resource("R"),
        ]);
        let result = Analyzer::default().analyze(&schedule);

        assert!(result.is_skipped(AnalysisKind::Criticality));
        assert!(result.is_skipped(AnalysisKind::ProgressCurve));
        assert!(result.resource_tally().is_some());
        assert!(result.percent_complete().is_some());
        let messages: Vec<_> = result
            .log
            .iter()
            .filter(|d| d.code == DiagnosticCode::W006AnalysisSkipped)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                format!(
                    "{} analysis skipped: {}",
                    AnalysisKind::Criticality,
                    AnalysisError::MissingField("TotalSlack")
                ),
                format!(
                    "{} analysis skipped: {}",
                    AnalysisKind::ProgressCurve,
                    AnalysisError::NoDatedProgress
                ),
            ]
        );
    }
}
