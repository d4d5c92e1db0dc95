//! One analysis run: ingest, window, analyze, assemble, write
//!
//! Every stage appends to a single log. Fatal problems become E-level
//! diagnostics and stop the run; nothing here returns an `Err`.

use std::fs;
use std::path::{Path, PathBuf};

use monitorail_analysis::{filter_period, Analyzer};
use monitorail_core::{AnalysisResult, Diagnostic, DiagnosticCode, RunStatus, Schedule};
use monitorail_parser::{
    detect_format, ingest, source_name, ConversionClient, FileFormat, Ingested, ServiceConfig,
};
use monitorail_render::{Report, ReportAssembler, ReportOptions};
use tracing::{info, warn};

use crate::config::RunConfig;

/// Result of a run
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub log: Vec<Diagnostic>,
    /// The analyzed (windowed) schedule
    pub schedule: Option<Schedule>,
    pub result: Option<AnalysisResult>,
    pub report: Option<Report>,
}

impl RunOutcome {
    pub fn failed(mut log: Vec<Diagnostic>, error: Diagnostic) -> Self {
        log.push(error);
        Self {
            status: RunStatus::Failed,
            log,
            schedule: None,
            result: None,
            report: None,
        }
    }
}

/// Reads schedule files, routing MPP through the conversion service
pub struct Loader {
    service: ServiceConfig,
    client: Option<ConversionClient>,
}

impl Loader {
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            service,
            client: None,
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<Ingested, Diagnostic> {
        let unreadable = |message: String| {
            Diagnostic::new(
                DiagnosticCode::E001UnreadableSchedule,
                format!("{}: {message}", path.display()),
            )
        };
        let bytes = fs::read(path).map_err(|e| unreadable(e.to_string()))?;
        let format = detect_format(path, &bytes).map_err(|e| unreadable(e.to_string()))?;
        let name = source_name(path);

        if format == FileFormat::Mpp && self.service.is_configured() {
            info!(file = %name, url = %self.service.url, "converting MPP through service");
            return self
                .client()?
                .convert(&bytes, &name)
                .map_err(|e| conversion_failed(path, &e));
        }
        ingest(&bytes, format, &name).map_err(|e| unreadable(e.to_string()))
    }

    /// Raw converter JSON for an MPP file
    pub fn convert_raw(&mut self, path: &Path) -> Result<Vec<u8>, Diagnostic> {
        if !self.service.is_configured() {
            return Err(Diagnostic::new(
                DiagnosticCode::E003InvalidConfig,
                "conversion service URL not configured (set MONITORAIL_SERVICE_URL or [service] url)",
            ));
        }
        let bytes = fs::read(path).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::E001UnreadableSchedule,
                format!("{}: {e}", path.display()),
            )
        })?;
        let name = source_name(path);
        self.client()?
            .fetch(&bytes, &name)
            .map_err(|e| conversion_failed(path, &e))
    }

    fn client(&mut self) -> Result<&mut ConversionClient, Diagnostic> {
        if self.client.is_none() {
            let client = ConversionClient::new(self.service.clone()).map_err(|e| {
                Diagnostic::new(DiagnosticCode::E002ConversionFailed, e.to_string())
            })?;
            self.client = Some(client);
        }
        self.client.as_mut().ok_or_else(|| {
            Diagnostic::new(DiagnosticCode::E002ConversionFailed, "conversion client unavailable")
        })
    }
}

fn conversion_failed(path: &Path, error: &impl std::fmt::Display) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::E002ConversionFailed,
        format!("{}: {error}", path.display()),
    )
}

/// Ingest one file and report its log, without analyzing it
pub fn check(path: &Path, service: &ServiceConfig) -> RunOutcome {
    match Loader::new(service.clone()).load(path) {
        Ok(ingested) => RunOutcome {
            status: RunStatus::from_log(&ingested.log),
            log: ingested.log,
            schedule: Some(ingested.schedule),
            result: None,
            report: None,
        },
        Err(error) => RunOutcome::failed(Vec::new(), error),
    }
}

/// Run the full pipeline for one configuration
pub fn run(config: &RunConfig) -> RunOutcome {
    let mut loader = Loader::new(config.service.clone());
    let mut log = Vec::new();

    let baseline = match loader.load(&config.baseline) {
        Ok(ingested) => {
            log.extend(ingested.log);
            ingested.schedule
        }
        Err(error) => return RunOutcome::failed(log, error),
    };
    let update = match &config.update {
        Some(path) => match loader.load(path) {
            Ok(ingested) => {
                log.extend(ingested.log);
                Some(ingested.schedule)
            }
            Err(error) => return RunOutcome::failed(log, error),
        },
        None => None,
    };

    let analyzer = Analyzer::new(config.analysis.clone());
    let (schedule, result) = match update {
        Some(update) => {
            let windowed = filter_period(&update, &config.period);
            log.extend(windowed.log);
            // Same window on both sides; the baseline's own window log is
            // not repeated
            let planned = filter_period(&baseline, &config.period).schedule;
            let result = analyzer.analyze_update(&planned, &windowed.schedule);
            (windowed.schedule, result)
        }
        None => {
            let windowed = filter_period(&baseline, &config.period);
            log.extend(windowed.log);
            let result = analyzer.analyze(&windowed.schedule);
            (windowed.schedule, result)
        }
    };
    log.extend(result.log.iter().cloned());

    let report = ReportAssembler::new(ReportOptions::default().charts(config.charts))
        .assemble(&schedule, &result);
    log.extend(report.log.iter().cloned());

    if let Some(dir) = &config.output_dir {
        match report.write_to_dir(dir) {
            Ok(written) => log.extend(written),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "report not written");
                return RunOutcome::failed(
                    log,
                    Diagnostic::new(
                        DiagnosticCode::E004WriteFailed,
                        format!("cannot write report to {}: {e}", dir.display()),
                    ),
                );
            }
        }
    }

    let status = RunStatus::from_log(&log);
    info!(%status, artifacts = report.artifacts.len(), "run finished");
    RunOutcome {
        status,
        log,
        schedule: Some(schedule),
        result: Some(result),
        report: Some(report),
    }
}

/// Convert an MPP file through the service and save the JSON answer
pub fn convert(path: &Path, output: &Path, service: &ServiceConfig) -> RunOutcome {
    let body = match Loader::new(service.clone()).convert_raw(path) {
        Ok(body) => body,
        Err(error) => return RunOutcome::failed(Vec::new(), error),
    };
    if let Err(e) = fs::write(output, &body) {
        return RunOutcome::failed(
            Vec::new(),
            Diagnostic::new(
                DiagnosticCode::E004WriteFailed,
                format!("cannot write {}: {e}", output.display()),
            ),
        );
    }
    let log = vec![Diagnostic::new(
        DiagnosticCode::I009ArtifactWritten,
        format!("wrote {}", output.display()),
    )];
    RunOutcome {
        status: RunStatus::Success,
        log,
        schedule: None,
        result: None,
        report: None,
    }
}

/// Default output path for `convert`: the input name with a `.json` extension
pub fn converted_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitorail_core::{AnalysisKind, Period};
    use pretty_assertions::assert_eq;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn full_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::for_file(fixture("plan.xml"));
        config.output_dir = Some(dir.path().to_path_buf());

        let outcome = run(&config);

        assert_eq!(outcome.status, RunStatus::Success, "{:#?}", outcome.log);
        assert_eq!(outcome.log[0].code, DiagnosticCode::I001ActivitiesRead);
        for name in ["activities.csv", "criticality.csv", "progress_curve.svg", "summary.txt"] {
            assert!(dir.path().join(name).exists(), "{name} not written");
        }
        assert!(outcome
            .log
            .iter()
            .any(|d| d.code == DiagnosticCode::I009ArtifactWritten));
    }

    #[test]
    fn schedule_without_links_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::for_file(fixture("no_links.xml"));
        config.output_dir = Some(dir.path().to_path_buf());

        let outcome = run(&config);

        assert_eq!(outcome.status, RunStatus::Success, "{:#?}", outcome.log);
        assert!(outcome
            .log
            .iter()
            .any(|d| d.code == DiagnosticCode::I005NoPredecessorLinks));
        assert!(dir.path().join("dependency_network.svg").exists());
    }

    #[test]
    fn missing_slack_is_partial() {
        let outcome = run(&RunConfig::for_file(fixture("no_slack.xml")));

        assert_eq!(outcome.status, RunStatus::Partial);
        let result = outcome.result.unwrap();
        assert!(result.is_skipped(AnalysisKind::Criticality));
        assert!(result.resource_tally().is_some());
    }

    #[test]
    fn window_narrows_schedule() {
        let mut config = RunConfig::for_file(fixture("plan.xml"));
        config.period = Period::new("2025-02-01".parse().unwrap(), "2025-02-28".parse().unwrap())
            .unwrap();

        let outcome = run(&config);
        let schedule = outcome.schedule.unwrap();
        assert_eq!(schedule.ids().collect::<Vec<_>>(), vec!["2"]);
        assert!(outcome
            .log
            .iter()
            .any(|d| d.code == DiagnosticCode::I004PeriodApplied));
    }

    #[test]
    fn update_adds_variance() {
        let mut config = RunConfig::for_file(fixture("plan.xml"));
        config.update = Some(fixture("update.xml"));

        let outcome = run(&config);
        let report = outcome.report.unwrap();
        assert!(report.get("variance.csv").is_some());
        assert_eq!(outcome.result.unwrap().variance().unwrap().late_count(), 1);
    }

    #[test]
    fn unreadable_file_fails() {
        let outcome = run(&RunConfig::for_file(fixture("corrupt.xml")));

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(
            outcome.log.last().unwrap().code,
            DiagnosticCode::E001UnreadableSchedule
        );
        assert!(outcome.report.is_none());
    }

    #[test]
    fn mpp_without_service_explains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotto.mpp");
        fs::write(&path, b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1rest").unwrap();

        let outcome = check(&path, &ServiceConfig::default());

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.log[0].message.contains("re-export as XML"));
    }

    #[test]
    fn convert_requires_service() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = convert(
            &fixture("plan.xml"),
            &dir.path().join("out.json"),
            &ServiceConfig::default(),
        );
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.log[0].code, DiagnosticCode::E003InvalidConfig);
    }

    #[test]
    fn converted_path_swaps_extension() {
        assert_eq!(
            converted_path(Path::new("dir/lotto.mpp")),
            PathBuf::from("dir/lotto.json")
        );
    }
}
