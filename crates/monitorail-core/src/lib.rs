//! # monitorail-core
//!
//! Core domain model and traits for the monitorail schedule analyzer.
//!
//! This crate provides:
//! - Domain types: `Activity`, `Schedule`, `TimephasedValue`
//! - Run log types: `Diagnostic`, `DiagnosticCode`, `Severity`, `RunStatus`
//! - Analysis window: `Period`, `DateBound`
//! - Analysis outputs: `AnalysisResult` and the per-kind tables
//! - The `Renderer` trait and error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use monitorail_core::{Activity, Schedule};
//!
//! let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let finish = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap().and_hms_opt(17, 0, 0).unwrap();
//!
//! let schedule = Schedule::new("Linea AV lotto 2").with_activities(vec![
//!     Activity::new("1", "Scavo trincea")
//!         .start(start)
//!         .finish(finish)
//!         .percent_complete(40.0)
//!         .total_slack(3)
//!         .resource("ESC-01"),
//!     Activity::new("2", "Posa ballast").predecessor("1"),
//! ]);
//!
//! assert_eq!(schedule.len(), 2);
//! assert!(schedule.get("2").is_some());
//! ```

pub mod analysis;
pub mod diagnostics;
pub mod period;

pub use analysis::{
    AnalysisKind, AnalysisOutput, AnalysisResult, Criticality, CriticalityReport, CriticalityRow,
    CurveBucket, CurvePoint, CurveSource, DependencyGraph, GraphEdge, GraphNode,
    PercentCompleteRow, PercentCompleteTable, ProgressCurve, ResourceCount, ResourceTally,
    SkippedAnalysis, VarianceReport, VarianceRow,
};
pub use diagnostics::{
    CollectingEmitter, Diagnostic, DiagnosticCode, DiagnosticEmitter, RunStatus, Severity,
};
pub use period::{DateBound, Period};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Identifier of an activity, unique within one schedule
pub type ActivityId = String;

/// Identifier of a resource (workforce or equipment code)
pub type ResourceId = String;

// ============================================================================
// Activity
// ============================================================================

/// One scheduled task read from a schedule export
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Stable identifier, used for predecessor linking
    pub id: ActivityId,
    /// Display label, never empty
    pub name: String,
    /// Planned start
    pub start: Option<NaiveDateTime>,
    /// Planned finish
    pub finish: Option<NaiveDateTime>,
    /// Completion percentage (0-100)
    pub percent_complete: Option<f64>,
    /// Total slack in days (pass-through, never computed here)
    pub total_slack: Option<i64>,
    /// Assigned resources, in first-seen order without duplicates
    pub resources: Vec<ResourceId>,
    /// Predecessor references into the same schedule
    pub predecessor_ids: Vec<ActivityId>,
    /// Planned cost
    pub cost: Option<Decimal>,
    /// Actual cost to date
    pub actual_cost: Option<Decimal>,
    /// Time-phased value buckets (only from converter output)
    pub timephased: Vec<TimephasedValue>,
    /// WBS / outline code
    pub wbs: Option<String>,
    /// Baseline start
    pub baseline_start: Option<NaiveDateTime>,
    /// Baseline finish
    pub baseline_finish: Option<NaiveDateTime>,
    /// Baseline cost
    pub baseline_cost: Option<Decimal>,
}

impl Activity {
    /// Create an activity with the given id and name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start: None,
            finish: None,
            percent_complete: None,
            total_slack: None,
            resources: Vec::new(),
            predecessor_ids: Vec::new(),
            cost: None,
            actual_cost: None,
            timephased: Vec::new(),
            wbs: None,
            baseline_start: None,
            baseline_finish: None,
            baseline_cost: None,
        }
    }

    /// Set the planned start
    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the planned finish
    pub fn finish(mut self, finish: NaiveDateTime) -> Self {
        self.finish = Some(finish);
        self
    }

    /// Set the completion percentage
    pub fn percent_complete(mut self, pct: f64) -> Self {
        self.percent_complete = Some(pct);
        self
    }

    /// Set the total slack in days
    pub fn total_slack(mut self, days: i64) -> Self {
        self.total_slack = Some(days);
        self
    }

    /// Assign a resource. Repeated assignments of the same id are ignored.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        if !self.resources.contains(&resource) {
            self.resources.push(resource);
        }
        self
    }

    /// Add a predecessor reference
    pub fn predecessor(mut self, id: impl Into<String>) -> Self {
        self.predecessor_ids.push(id.into());
        self
    }

    /// Set the planned cost
    pub fn cost(mut self, cost: Decimal) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Set the actual cost
    pub fn actual_cost(mut self, cost: Decimal) -> Self {
        self.actual_cost = Some(cost);
        self
    }

    /// Add a time-phased bucket
    pub fn timephased(mut self, value: TimephasedValue) -> Self {
        self.timephased.push(value);
        self
    }

    /// Set the WBS code
    pub fn wbs(mut self, wbs: impl Into<String>) -> Self {
        self.wbs = Some(wbs.into());
        self
    }

    /// Set the baseline dates
    pub fn baseline(mut self, start: NaiveDateTime, finish: NaiveDateTime) -> Self {
        self.baseline_start = Some(start);
        self.baseline_finish = Some(finish);
        self
    }

    /// Both dates present and `finish < start`
    pub fn has_inverted_dates(&self) -> bool {
        matches!((self.start, self.finish), (Some(s), Some(f)) if f < s)
    }

    /// Calendar date of the planned start
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start.map(|dt| dt.date())
    }

    /// Calendar date of the planned finish
    pub fn finish_date(&self) -> Option<NaiveDate> {
        self.finish.map(|dt| dt.date())
    }
}

/// A value attributed to a sub-interval of an activity (cost or work)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimephasedValue {
    pub start: NaiveDateTime,
    pub finish: Option<NaiveDateTime>,
    pub value: f64,
}

impl TimephasedValue {
    pub fn new(start: NaiveDateTime, finish: Option<NaiveDateTime>, value: f64) -> Self {
        Self {
            start,
            finish,
            value,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// An ingested schedule: ordered activities plus project metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Project title, if the export declares one
    pub project_name: String,
    /// Project start (declared, or earliest activity start)
    pub project_start: Option<NaiveDateTime>,
    /// Project finish (declared, or latest activity finish)
    pub project_finish: Option<NaiveDateTime>,
    /// Name of the file the schedule was read from
    pub source: Option<String>,
    /// Activities in file order
    pub activities: Vec<Activity>,
    /// Resource display names by id
    pub resources: BTreeMap<ResourceId, String>,
}

impl Schedule {
    /// Create an empty schedule
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            project_start: None,
            project_finish: None,
            source: None,
            activities: Vec::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Set the source file name
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replace the activity list
    pub fn with_activities(mut self, activities: Vec<Activity>) -> Self {
        self.activities = activities;
        self
    }

    /// Set the declared project span
    pub fn span(mut self, start: Option<NaiveDateTime>, finish: Option<NaiveDateTime>) -> Self {
        self.project_start = start;
        self.project_finish = finish;
        self
    }

    /// Register a resource display name
    pub fn resource_name(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.resources.insert(id.into(), name.into());
        self
    }

    /// Get an activity by id
    pub fn get(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Ids in file order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.activities.iter().map(|a| a.id.as_str())
    }

    /// A copy of this schedule's metadata holding a different activity list
    pub fn derive(&self, activities: Vec<Activity>) -> Self {
        Self {
            project_name: self.project_name.clone(),
            project_start: self.project_start,
            project_finish: self.project_finish,
            source: self.source.clone(),
            activities,
            resources: self.resources.clone(),
        }
    }

    /// Earliest start and latest finish over all dated activities
    pub fn activity_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.activities.iter().filter_map(|a| a.start).min()?;
        let finish = self.activities.iter().filter_map(|a| a.finish).max()?;
        Some((start, finish))
    }

    /// Display name for a resource, falling back to its id
    pub fn resource_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.resources.get(id).map(String::as_str).unwrap_or(id)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Output rendering of an analysis run
pub trait Renderer {
    type Output;

    /// Render the analysis of a (filtered) schedule
    fn render(&self, schedule: &Schedule, result: &AnalysisResult)
        -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Invalid run configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("analysis window starts after it ends ({start} > {end})")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },

    #[error("invalid date '{0}': expected YYYY-MM-DD, DD/MM/YYYY or 'file'")]
    InvalidDate(String),

    #[error("slack threshold must be non-negative, got {0}")]
    NegativeThreshold(i64),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
