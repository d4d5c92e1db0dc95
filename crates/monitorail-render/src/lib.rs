//! # monitorail-render
//!
//! Output artifacts for monitorail analysis runs.
//!
//! This crate provides:
//! - CSV tables, one per produced analysis plus the activity export
//! - SVG charts: percent complete bars, cumulative curve, dependency network
//! - Report assembly into named artifacts and writing them to a directory
//! - A plain text summary
//!
//! ## Example
//!
//! ```rust
//! use monitorail_core::{AnalysisResult, Schedule, Activity};
//! use monitorail_render::{ReportAssembler, ReportOptions};
//!
//! let schedule = Schedule::new("Demo").with_activities(vec![Activity::new("1", "Scavo")]);
//! let report = ReportAssembler::new(ReportOptions::default())
//!     .assemble(&schedule, &AnalysisResult::new());
//!
//! assert!(report.get("activities.csv").is_some());
//! ```

pub mod charts;
pub mod csv;

pub use charts::{ChartStyle, CurveChart, NetworkChart, PercentChart};
pub use csv::{read_activities_csv, CsvTable};

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use monitorail_core::{
    AnalysisKind, AnalysisOutput, AnalysisResult, Diagnostic, DiagnosticCode, RenderError,
    Renderer, Schedule,
};
use tracing::{debug, info};

/// What a report should contain
#[derive(Clone, Debug)]
pub struct ReportOptions {
    /// Render SVG charts next to the CSV tables
    pub charts: bool,
    pub chart_style: ChartStyle,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            charts: true,
            chart_style: ChartStyle::default(),
        }
    }
}

impl ReportOptions {
    pub fn charts(mut self, enabled: bool) -> Self {
        self.charts = enabled;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Csv,
    Svg,
    Text,
}

/// One output file, held in memory until written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content: String,
}

impl Artifact {
    fn csv(name: &str, table: &CsvTable) -> Self {
        Self {
            name: name.to_string(),
            kind: ArtifactKind::Csv,
            content: table.to_csv_string(),
        }
    }
}

/// Assembled artifacts plus the assembly log
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub artifacts: Vec<Artifact>,
    pub log: Vec<Diagnostic>,
}

impl Report {
    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|a| a.name.as_str())
    }

    /// Write every artifact into `dir`, creating it if needed.
    ///
    /// Returns one I009 diagnostic per written file.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<Diagnostic>, RenderError> {
        fs::create_dir_all(dir)?;
        let mut log = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let path: PathBuf = dir.join(&artifact.name);
            fs::write(&path, &artifact.content)?;
            debug!(path = %path.display(), bytes = artifact.content.len(), "artifact written");
            log.push(Diagnostic::new(
                DiagnosticCode::I009ArtifactWritten,
                format!("wrote {}", path.display()),
            ));
        }
        info!(count = self.artifacts.len(), dir = %dir.display(), "report written");
        Ok(log)
    }
}

/// Turns an analysis result into CSV and SVG artifacts
#[derive(Clone, Debug, Default)]
pub struct ReportAssembler {
    options: ReportOptions,
}

impl ReportAssembler {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Build the report. Never fails: charts that cannot be drawn are
    /// left out with a W008 warning.
    pub fn assemble(&self, schedule: &Schedule, result: &AnalysisResult) -> Report {
        let mut report = Report::default();
        report
            .artifacts
            .push(Artifact::csv("activities.csv", &csv::activities_table(schedule)));

        for output in result.outputs.values() {
            let (name, table) = match output {
                AnalysisOutput::Criticality(r) => ("criticality.csv", csv::criticality_table(r)),
                AnalysisOutput::ResourceTally(t) => ("resources.csv", csv::resources_table(t)),
                AnalysisOutput::PercentComplete(t) => {
                    ("percent_complete.csv", csv::percent_table(t))
                }
                AnalysisOutput::ProgressCurve(c) => ("progress_curve.csv", csv::curve_table(c)),
                AnalysisOutput::DependencyGraph(g) => ("dependency_edges.csv", csv::edges_table(g)),
                AnalysisOutput::Variance(v) => ("variance.csv", csv::variance_table(v)),
            };
            report.artifacts.push(Artifact::csv(name, &table));
        }

        if self.options.charts {
            let style = self.options.chart_style.clone();
            self.chart(
                &mut report,
                "percent_complete.svg",
                AnalysisKind::PercentComplete,
                PercentChart::new().style(style.clone()).render(schedule, result),
            );
            self.chart(
                &mut report,
                "progress_curve.svg",
                AnalysisKind::ProgressCurve,
                CurveChart::new().style(style.clone()).render(schedule, result),
            );
            self.chart(
                &mut report,
                "dependency_network.svg",
                AnalysisKind::DependencyGraph,
                NetworkChart::new().style(style).render(schedule, result),
            );
        }

        match TextRenderer.render(schedule, result) {
            Ok(summary) => report.artifacts.push(Artifact {
                name: "summary.txt".into(),
                kind: ArtifactKind::Text,
                content: summary,
            }),
            Err(e) => debug!(error = %e, "summary not rendered"),
        }

        report
    }

    fn chart(
        &self,
        report: &mut Report,
        name: &str,
        kind: AnalysisKind,
        rendered: Result<String, RenderError>,
    ) {
        match rendered {
            Ok(content) => report.artifacts.push(Artifact {
                name: name.to_string(),
                kind: ArtifactKind::Svg,
                content,
            }),
            Err(e) => {
                let reason = match e {
                    RenderError::InvalidData(reason) | RenderError::Format(reason) => reason,
                    RenderError::Io(e) => e.to_string(),
                };
                report.log.push(Diagnostic::new(
                    DiagnosticCode::W008ChartOmitted,
                    format!("{kind} chart omitted: {reason}"),
                ));
            }
        }
    }
}

impl Renderer for ReportAssembler {
    type Output = Report;

    fn render(&self, schedule: &Schedule, result: &AnalysisResult) -> Result<Report, RenderError> {
        Ok(self.assemble(schedule, result))
    }
}

/// Plain text summary for console output
#[derive(Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, schedule: &Schedule, result: &AnalysisResult) -> Result<String, RenderError> {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "Project: {}", schedule.project_name);
        if let Some(source) = &schedule.source {
            let _ = writeln!(out, "Source: {source}");
        }
        if let (Some(start), Some(finish)) = (schedule.project_start, schedule.project_finish) {
            let _ = writeln!(
                out,
                "Span: {} .. {}",
                start.format("%Y-%m-%d"),
                finish.format("%Y-%m-%d")
            );
        }
        let _ = writeln!(out, "Activities: {}", schedule.len());

        if let Some(report) = result.criticality() {
            let _ = writeln!(
                out,
                "Critical or sub-critical (slack <= {} d): {}",
                report.threshold,
                report.flagged_count()
            );
        }
        if let Some(tally) = result.resource_tally() {
            let top: Vec<String> = tally
                .entries
                .iter()
                .take(3)
                .map(|e| format!("{} ({})", e.label, e.count))
                .collect();
            let _ = writeln!(out, "Resources: {} [{}]", tally.entries.len(), top.join(", "));
        }
        if let Some(table) = result.percent_complete() {
            if let Some(mean) = table.mean() {
                let _ = writeln!(out, "Mean percent complete: {mean:.1}%");
            }
        }
        if let Some(curve) = result.progress_curve() {
            let _ = writeln!(
                out,
                "Progress curve: {} periods, total {:.1} ({})",
                curve.points.len(),
                curve.total(),
                curve.source.as_str()
            );
        }
        if let Some(graph) = result.dependency_graph() {
            let _ = writeln!(
                out,
                "Dependencies: {} edges, {} unresolved",
                graph.edges.len(),
                graph.unresolved.len()
            );
        }
        if let Some(variance) = result.variance() {
            let _ = writeln!(
                out,
                "Variance: {} matched, {} finishing late",
                variance.rows.len(),
                variance.late_count()
            );
        }
        for skipped in &result.skipped {
            let _ = writeln!(out, "Skipped {}: {}", skipped.kind, skipped.reason);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitorail_core::{Activity, CriticalityReport, CriticalityRow, Criticality};
    use pretty_assertions::assert_eq;

    fn schedule() -> Schedule {
        Schedule::new("Lotto 3").with_activities(vec![
            Activity::new("1", "Scavo").total_slack(0).percent_complete(50.0),
            Activity::new("2", "Getto").total_slack(9).predecessor("1"),
        ])
    }

    fn criticality() -> AnalysisOutput {
        AnalysisOutput::Criticality(CriticalityReport {
            threshold: 5,
            rows: vec![CriticalityRow {
                id: "1".into(),
                name: "Scavo".into(),
                start: None,
                finish: None,
                total_slack: Some(0),
                class: Criticality::Critical,
            }],
        })
    }

    #[test]
    fn one_csv_per_output() {
        let mut result = AnalysisResult::new();
        result.record(criticality());
        let report = ReportAssembler::new(ReportOptions::default().charts(false))
            .assemble(&schedule(), &result);

        assert_eq!(
            report.names().collect::<Vec<_>>(),
            vec!["activities.csv", "criticality.csv", "summary.txt"]
        );
        assert!(report.log.is_empty());
        assert_eq!(
            report.get("criticality.csv").unwrap().content,
            "id,name,start,finish,total_slack,class,flagged\n1,Scavo,,,0,critical,true\n"
        );
    }

    #[test]
    fn missing_chart_inputs_warn() {
        let report = ReportAssembler::default().assemble(&schedule(), &AnalysisResult::new());

        let omitted: Vec<_> = report
            .log
            .iter()
            .filter(|d| d.code == DiagnosticCode::W008ChartOmitted)
            .collect();
        assert_eq!(omitted.len(), 3);
        assert!(report.artifacts.iter().all(|a| a.kind != ArtifactKind::Svg));
    }

    #[test]
    fn writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let report = ReportAssembler::default().assemble(&schedule(), &AnalysisResult::new());

        let log = report.write_to_dir(&out).unwrap();

        assert_eq!(log.len(), report.artifacts.len());
        assert!(log.iter().all(|d| d.code == DiagnosticCode::I009ArtifactWritten));
        let written = fs::read_to_string(out.join("activities.csv")).unwrap();
        assert_eq!(written, report.get("activities.csv").unwrap().content);
    }

    #[test]
    fn summary_lists_outputs() {
        let mut result = AnalysisResult::new();
        result.record(criticality());
        result.skip(AnalysisKind::ResourceTally, "no activity has resources");

        let text = TextRenderer.render(&schedule(), &result).unwrap();
        assert!(text.starts_with("Project: Lotto 3\n"));
        assert!(text.contains("Activities: 2"));
        assert!(text.contains("Critical or sub-critical (slack <= 5 d): 1"));
        assert!(text.contains("Skipped resource-tally: no activity has resources"));
    }
}
