//! Analysis outputs
//!
//! `AnalysisResult` maps each analysis kind that ran to its derived table and
//! carries the log of the run. Kinds that could not run are listed in
//! `skipped` with the reason.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;

use crate::{ActivityId, ConfigError, Diagnostic, DiagnosticCode, ResourceId};

// ============================================================================
// Kinds
// ============================================================================

/// The derived views an analysis run can produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    Criticality,
    ResourceTally,
    PercentComplete,
    ProgressCurve,
    DependencyGraph,
    Variance,
}

impl AnalysisKind {
    /// Kinds that run on a single schedule
    pub const SINGLE_SCHEDULE: [AnalysisKind; 5] = [
        AnalysisKind::Criticality,
        AnalysisKind::ResourceTally,
        AnalysisKind::PercentComplete,
        AnalysisKind::ProgressCurve,
        AnalysisKind::DependencyGraph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Criticality => "criticality",
            AnalysisKind::ResourceTally => "resource-tally",
            AnalysisKind::PercentComplete => "percent-complete",
            AnalysisKind::ProgressCurve => "progress-curve",
            AnalysisKind::DependencyGraph => "dependency-graph",
            AnalysisKind::Variance => "variance",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Criticality
// ============================================================================

/// Slack-based classification of one activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    /// Slack at or below zero
    Critical,
    /// Slack above zero but within the threshold
    SubCritical,
    /// Slack above the threshold
    NonCritical,
    /// No slack value in the file
    Unknown,
}

impl Criticality {
    /// Classify a slack value against a non-negative threshold
    pub fn classify(total_slack: Option<i64>, threshold: i64) -> Self {
        match total_slack {
            None => Criticality::Unknown,
            Some(s) if s <= 0 => Criticality::Critical,
            Some(s) if s <= threshold => Criticality::SubCritical,
            Some(_) => Criticality::NonCritical,
        }
    }

    /// Critical or sub-critical
    pub fn is_flagged(&self) -> bool {
        matches!(self, Criticality::Critical | Criticality::SubCritical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Critical => "critical",
            Criticality::SubCritical => "sub-critical",
            Criticality::NonCritical => "non-critical",
            Criticality::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CriticalityRow {
    pub id: ActivityId,
    pub name: String,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    pub total_slack: Option<i64>,
    pub class: Criticality,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CriticalityReport {
    pub threshold: i64,
    pub rows: Vec<CriticalityRow>,
}

impl CriticalityReport {
    /// Rows classified critical or sub-critical
    pub fn flagged(&self) -> impl Iterator<Item = &CriticalityRow> {
        self.rows.iter().filter(|r| r.class.is_flagged())
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }

    pub fn count(&self, class: Criticality) -> usize {
        self.rows.iter().filter(|r| r.class == class).count()
    }
}

// ============================================================================
// Resource tally
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCount {
    pub resource_id: ResourceId,
    /// Display name (the id when no name is known)
    pub label: String,
    pub count: usize,
}

/// Occurrences per resource, descending count, ties in first-seen order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTally {
    pub entries: Vec<ResourceCount>,
}

impl ResourceTally {
    pub fn get(&self, resource_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.resource_id == resource_id)
            .map(|e| e.count)
    }
}

// ============================================================================
// Percent complete
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentCompleteRow {
    pub id: ActivityId,
    pub name: String,
    pub percent_complete: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentCompleteTable {
    pub rows: Vec<PercentCompleteRow>,
}

impl PercentCompleteTable {
    /// Unweighted mean over the rows
    pub fn mean(&self) -> Option<f64> {
        if self.rows.is_empty() {
            return None;
        }
        let sum: f64 = self.rows.iter().map(|r| r.percent_complete).sum();
        Some(sum / self.rows.len() as f64)
    }
}

// ============================================================================
// Progress curve
// ============================================================================

/// Calendar bucket used to group curve values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveBucket {
    Day,
    /// ISO week, keyed by its Monday
    Week,
    /// Calendar month, keyed by its first day
    #[default]
    Month,
}

impl CurveBucket {
    /// Period key for a date
    pub fn key(&self, date: NaiveDate) -> NaiveDate {
        match self {
            CurveBucket::Day => date,
            CurveBucket::Week => {
                date - ChronoDuration::days(date.weekday().num_days_from_monday() as i64)
            }
            CurveBucket::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveBucket::Day => "day",
            CurveBucket::Week => "week",
            CurveBucket::Month => "month",
        }
    }
}

impl FromStr for CurveBucket {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "d" => Ok(CurveBucket::Day),
            "week" | "w" => Ok(CurveBucket::Week),
            "month" | "m" => Ok(CurveBucket::Month),
            other => Err(ConfigError::Invalid(format!(
                "unknown curve bucket '{other}' (expected day, week or month)"
            ))),
        }
    }
}

/// Where the curve values came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveSource {
    /// Time-phased buckets supplied by the converter
    TimePhased,
    /// Percent complete attributed to each activity's start date
    StartDate,
}

impl CurveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveSource::TimePhased => "time-phased",
            CurveSource::StartDate => "start-date",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub period: NaiveDate,
    pub value: f64,
    pub cumulative: f64,
}

/// Cumulative ("SIL") progress curve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressCurve {
    pub source: CurveSource,
    pub bucket: CurveBucket,
    pub points: Vec<CurvePoint>,
}

impl ProgressCurve {
    /// Build from per-period values: sort by period, merge equal periods,
    /// then accumulate.
    pub fn from_period_values(
        source: CurveSource,
        bucket: CurveBucket,
        values: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let mut grouped: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (period, value) in values {
            *grouped.entry(period).or_insert(0.0) += value;
        }

        let mut running = 0.0;
        let points = grouped
            .into_iter()
            .map(|(period, value)| {
                running += value;
                CurvePoint {
                    period,
                    value,
                    cumulative: running,
                }
            })
            .collect();

        Self {
            source,
            bucket,
            points,
        }
    }

    pub fn total(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.cumulative)
    }
}

// ============================================================================
// Dependency graph
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: ActivityId,
    pub name: String,
    pub total_slack: Option<i64>,
    /// Slack within the criticality threshold
    pub flagged: bool,
}

/// Edge from predecessor to successor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: ActivityId,
    pub to: ActivityId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// (activity, missing predecessor) pairs that resolved to nothing
    pub unresolved: Vec<(ActivityId, ActivityId)>,
}

impl DependencyGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }

    pub fn predecessors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.to == id)
            .map(|e| e.from.as_str())
    }

    /// Group node ids by longest distance from a root (Kahn's algorithm).
    ///
    /// Layer 0 holds nodes without predecessors; within a layer, node order
    /// is kept. Returns the ids left on a cycle as the error.
    pub fn layers(&self) -> Result<Vec<Vec<&str>>, Vec<&str>> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            if let (Some(&from), Some(&to)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            {
                successors[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut depth = vec![0usize; self.nodes.len()];
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut visited = 0;

        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &successors[node] {
                depth[next] = depth[next].max(depth[node] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if visited < self.nodes.len() {
            return Err((0..self.nodes.len())
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].id.as_str())
                .collect());
        }

        let layer_count = depth.iter().max().map_or(0, |d| d + 1);
        let mut layers = vec![Vec::new(); layer_count];
        for (i, node) in self.nodes.iter().enumerate() {
            layers[depth[i]].push(node.id.as_str());
        }
        Ok(layers)
    }
}

// ============================================================================
// Variance (baseline vs. update)
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarianceRow {
    pub id: ActivityId,
    pub name: String,
    /// Update start minus baseline start, in calendar days
    pub start_variance_days: Option<i64>,
    /// Update finish minus baseline finish, in calendar days
    pub finish_variance_days: Option<i64>,
    pub baseline_percent: Option<f64>,
    pub update_percent: Option<f64>,
}

impl VarianceRow {
    pub fn percent_delta(&self) -> Option<f64> {
        Some(self.update_percent? - self.baseline_percent.unwrap_or(0.0))
    }

    /// Finishing later than planned
    pub fn is_late(&self) -> bool {
        self.finish_variance_days.is_some_and(|d| d > 0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub rows: Vec<VarianceRow>,
    pub only_in_baseline: Vec<ActivityId>,
    pub only_in_update: Vec<ActivityId>,
}

impl VarianceReport {
    pub fn late_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_late()).count()
    }
}

// ============================================================================
// Result
// ============================================================================

/// Output of one analysis kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum AnalysisOutput {
    Criticality(CriticalityReport),
    ResourceTally(ResourceTally),
    PercentComplete(PercentCompleteTable),
    ProgressCurve(ProgressCurve),
    DependencyGraph(DependencyGraph),
    Variance(VarianceReport),
}

impl AnalysisOutput {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisOutput::Criticality(_) => AnalysisKind::Criticality,
            AnalysisOutput::ResourceTally(_) => AnalysisKind::ResourceTally,
            AnalysisOutput::PercentComplete(_) => AnalysisKind::PercentComplete,
            AnalysisOutput::ProgressCurve(_) => AnalysisKind::ProgressCurve,
            AnalysisOutput::DependencyGraph(_) => AnalysisKind::DependencyGraph,
            AnalysisOutput::Variance(_) => AnalysisKind::Variance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAnalysis {
    pub kind: AnalysisKind,
    pub reason: String,
}

/// Everything one analysis run produced
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub outputs: BTreeMap<AnalysisKind, AnalysisOutput>,
    pub skipped: Vec<SkippedAnalysis>,
    pub log: Vec<Diagnostic>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an output under its kind
    pub fn record(&mut self, output: AnalysisOutput) {
        self.outputs.insert(output.kind(), output);
    }

    /// Mark a kind as skipped and log the reason as a W006 warning
    pub fn skip(&mut self, kind: AnalysisKind, reason: impl Into<String>) {
        let reason = reason.into();
        self.log.push(Diagnostic::new(
            DiagnosticCode::W006AnalysisSkipped,
            format!("{kind} analysis skipped: {reason}"),
        ));
        self.skipped.push(SkippedAnalysis { kind, reason });
    }

    pub fn is_skipped(&self, kind: AnalysisKind) -> bool {
        self.skipped.iter().any(|s| s.kind == kind)
    }

    pub fn get(&self, kind: AnalysisKind) -> Option<&AnalysisOutput> {
        self.outputs.get(&kind)
    }

    pub fn criticality(&self) -> Option<&CriticalityReport> {
        match self.get(AnalysisKind::Criticality)? {
            AnalysisOutput::Criticality(r) => Some(r),
            _ => None,
        }
    }

    pub fn resource_tally(&self) -> Option<&ResourceTally> {
        match self.get(AnalysisKind::ResourceTally)? {
            AnalysisOutput::ResourceTally(t) => Some(t),
            _ => None,
        }
    }

    pub fn percent_complete(&self) -> Option<&PercentCompleteTable> {
        match self.get(AnalysisKind::PercentComplete)? {
            AnalysisOutput::PercentComplete(t) => Some(t),
            _ => None,
        }
    }

    pub fn progress_curve(&self) -> Option<&ProgressCurve> {
        match self.get(AnalysisKind::ProgressCurve)? {
            AnalysisOutput::ProgressCurve(c) => Some(c),
            _ => None,
        }
    }

    pub fn dependency_graph(&self) -> Option<&DependencyGraph> {
        match self.get(AnalysisKind::DependencyGraph)? {
            AnalysisOutput::DependencyGraph(g) => Some(g),
            _ => None,
        }
    }

    pub fn variance(&self) -> Option<&VarianceReport> {
        match self.get(AnalysisKind::Variance)? {
            AnalysisOutput::Variance(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn classify_against_threshold() {
        let classes: Vec<_> = [Some(0), Some(3), Some(5), Some(6), Some(10), Some(-4), None]
            .into_iter()
            .map(|s| Criticality::classify(s, 5))
            .collect();

        assert_eq!(
            classes,
            vec![
                Criticality::Critical,
                Criticality::SubCritical,
                Criticality::SubCritical,
                Criticality::NonCritical,
                Criticality::NonCritical,
                Criticality::Critical,
                Criticality::Unknown,
            ]
        );
    }

    #[test]
    fn zero_threshold_flags_only_critical() {
        assert!(Criticality::classify(Some(0), 0).is_flagged());
        assert!(!Criticality::classify(Some(1), 0).is_flagged());
        assert!(!Criticality::Unknown.is_flagged());
    }

    #[test]
    fn bucket_keys() {
        // 2025-01-15 is a Wednesday
        let date = d(2025, 1, 15);
        assert_eq!(CurveBucket::Day.key(date), date);
        assert_eq!(CurveBucket::Week.key(date), d(2025, 1, 13));
        assert_eq!(CurveBucket::Month.key(date), d(2025, 1, 1));
        // Monday maps to itself
        assert_eq!(CurveBucket::Week.key(d(2025, 1, 13)), d(2025, 1, 13));
    }

    #[test]
    fn bucket_from_str() {
        assert_eq!("Month".parse::<CurveBucket>().unwrap(), CurveBucket::Month);
        assert_eq!("w".parse::<CurveBucket>().unwrap(), CurveBucket::Week);
        assert!("quarter".parse::<CurveBucket>().is_err());
    }

    #[test]
    fn curve_accumulates_in_period_order() {
        let curve = ProgressCurve::from_period_values(
            CurveSource::StartDate,
            CurveBucket::Month,
            vec![
                (d(2025, 3, 1), 5.0),
                (d(2025, 1, 1), 10.0),
                (d(2025, 2, 1), 20.0),
            ],
        );

        let cumulative: Vec<f64> = curve.points.iter().map(|p| p.cumulative).collect();
        assert_eq!(cumulative, vec![10.0, 30.0, 35.0]);
        assert_eq!(curve.total(), 35.0);
    }

    #[test]
    fn curve_merges_equal_periods() {
        let curve = ProgressCurve::from_period_values(
            CurveSource::TimePhased,
            CurveBucket::Month,
            vec![(d(2025, 1, 1), 1.5), (d(2025, 1, 1), 2.5)],
        );
        assert_eq!(curve.points.len(), 1);
        assert_eq!(curve.points[0].value, 4.0);
    }

    #[test]
    fn skip_logs_warning() {
        let mut result = AnalysisResult::new();
        result.skip(AnalysisKind::Criticality, "no activity has TotalSlack");

        assert!(result.is_skipped(AnalysisKind::Criticality));
        assert!(result.criticality().is_none());
        assert_eq!(result.log.len(), 1);
        assert_eq!(result.log[0].code, DiagnosticCode::W006AnalysisSkipped);
        assert!(result.log[0].message.contains("criticality"));
    }

    #[test]
    fn record_and_fetch_by_kind() {
        let mut result = AnalysisResult::new();
        result.record(AnalysisOutput::ResourceTally(ResourceTally {
            entries: vec![ResourceCount {
                resource_id: "A".into(),
                label: "A".into(),
                count: 2,
            }],
        }));

        assert_eq!(result.resource_tally().and_then(|t| t.get("A")), Some(2));
        assert!(result.progress_curve().is_none());
    }

    #[test]
    fn graph_neighbours() {
        let graph = DependencyGraph {
            nodes: vec![],
            edges: vec![
                GraphEdge { from: "1".into(), to: "2".into() },
                GraphEdge { from: "1".into(), to: "3".into() },
                GraphEdge { from: "2".into(), to: "3".into() },
            ],
            unresolved: vec![],
        };
        assert_eq!(graph.successors("1").collect::<Vec<_>>(), vec!["2", "3"]);
        assert_eq!(graph.predecessors("3").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.into(),
            name: id.to_uppercase(),
            total_slack: None,
            flagged: false,
        }
    }

    fn edge(from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            from: from.into(),
            to: to.into(),
        }
    }

    #[test]
    fn layers_by_longest_path() {
        let graph = DependencyGraph {
            nodes: vec![node("a"), node("b"), node("c"), node("d")],
            edges: vec![edge("a", "b"), edge("b", "c"), edge("a", "c")],
            unresolved: vec![],
        };
        let layers = graph.layers().unwrap();
        assert_eq!(layers, vec![vec!["a", "d"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn layers_report_cycle() {
        let graph = DependencyGraph {
            nodes: vec![node("a"), node("b"), node("c")],
            edges: vec![edge("a", "b"), edge("b", "c"), edge("c", "b")],
            unresolved: vec![],
        };
        assert_eq!(graph.layers().unwrap_err(), vec!["b", "c"]);
    }

    #[test]
    fn variance_percent_delta() {
        let row = VarianceRow {
            id: "1".into(),
            name: "A".into(),
            start_variance_days: Some(0),
            finish_variance_days: Some(4),
            baseline_percent: Some(20.0),
            update_percent: Some(55.0),
        };
        assert_eq!(row.percent_delta(), Some(35.0));
        assert!(row.is_late());
    }
}
