//! Period filter and field coverage

use monitorail_core::{AnalysisKind, Diagnostic, DiagnosticCode, Period, Schedule};
use tracing::debug;

use crate::AnalysisError;

/// A narrowed schedule plus the filter's log
#[derive(Clone, Debug, PartialEq)]
pub struct Filtered {
    pub schedule: Schedule,
    pub log: Vec<Diagnostic>,
}

/// Keep the activities active inside `period`.
///
/// An activity is active when its interval overlaps the window
/// (`finish >= window.start && start <= window.end`). Undated activities are
/// dropped only when a window is in force. Filtering twice with the same
/// window gives the same schedule as filtering once.
pub fn filter_period(schedule: &Schedule, period: &Period) -> Filtered {
    if period.is_full() {
        return Filtered {
            schedule: schedule.clone(),
            log: vec![Diagnostic::new(
                DiagnosticCode::I003FullProjectSpan,
                "analyzing full project span",
            )],
        };
    }

    let mut undated = 0;
    let kept: Vec<_> = schedule
        .activities
        .iter()
        .filter(|a| match (a.start_date(), a.finish_date()) {
            (Some(start), Some(finish)) => period.overlaps(start, finish),
            _ => {
                undated += 1;
                false
            }
        })
        .cloned()
        .collect();

    debug!(kept = kept.len(), total = schedule.len(), %period, "period filter applied");

    let mut log = vec![Diagnostic::new(
        DiagnosticCode::I004PeriodApplied,
        format!(
            "period {period}: {} of {} activities overlap the window",
            kept.len(),
            schedule.len()
        ),
    )];
    if undated > 0 {
        log.push(Diagnostic::new(
            DiagnosticCode::W005UndatedExcluded,
            format!("{undated} activities without start or finish excluded by the analysis window"),
        ));
    }

    Filtered {
        schedule: schedule.derive(kept),
        log,
    }
}

/// How many activities carry each optional field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldCoverage {
    pub total: usize,
    pub start: usize,
    pub finish: usize,
    pub percent_complete: usize,
    pub total_slack: usize,
    pub resources: usize,
    pub predecessors: usize,
    pub timephased: usize,
    pub cost: usize,
    pub baseline: usize,
}

impl FieldCoverage {
    pub fn of(schedule: &Schedule) -> Self {
        let mut coverage = Self {
            total: schedule.len(),
            ..Self::default()
        };
        for a in &schedule.activities {
            coverage.start += usize::from(a.start.is_some());
            coverage.finish += usize::from(a.finish.is_some());
            coverage.percent_complete += usize::from(a.percent_complete.is_some());
            coverage.total_slack += usize::from(a.total_slack.is_some());
            coverage.resources += usize::from(!a.resources.is_empty());
            coverage.predecessors += usize::from(!a.predecessor_ids.is_empty());
            coverage.timephased += usize::from(!a.timephased.is_empty());
            coverage.cost += usize::from(a.cost.is_some());
            coverage.baseline +=
                usize::from(a.baseline_start.is_some() || a.baseline_finish.is_some());
        }
        coverage
    }

    /// Whether the schedule carries the inputs `kind` needs
    pub fn require(&self, kind: AnalysisKind) -> Result<(), AnalysisError> {
        match kind {
            AnalysisKind::Criticality if self.total_slack == 0 => {
                Err(AnalysisError::MissingField("TotalSlack"))
            }
            AnalysisKind::ResourceTally if self.resources == 0 => Err(AnalysisError::NoResources),
            AnalysisKind::PercentComplete if self.percent_complete == 0 => {
                Err(AnalysisError::MissingField("PercentComplete"))
            }
            AnalysisKind::ProgressCurve if self.timephased == 0 && self.percent_complete == 0 => {
                Err(AnalysisError::NoProgressValues)
            }
            _ => Ok(()),
        }
    }
}
