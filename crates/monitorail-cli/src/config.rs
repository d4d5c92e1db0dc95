//! Run configuration
//!
//! A run is described by an immutable [`RunConfig`], resolved from an
//! optional TOML file with command-line flags taking precedence:
//!
//! ```toml
//! baseline = "lotto2_baseline.xml"
//! update = "lotto2_aggiornamento.xml"
//! start = "2025-01-01"
//! end = "Da file Project"
//! slack_threshold = 5
//! bucket = "month"
//! charts = true
//! output_dir = "report"
//!
//! [analyses]
//! criticality = true
//! resources = true
//! progress = true
//! curve = true
//! # graph follows criticality unless set
//!
//! [service]
//! url = "https://converter.example.org"
//! timeout_secs = 300
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use monitorail_analysis::{AnalysisOptions, DEFAULT_SLACK_THRESHOLD};
use monitorail_core::{AnalysisKind, ConfigError, CurveBucket, DateBound, Period};
use monitorail_parser::ServiceConfig;
use serde::Deserialize;

/// Default report directory
pub const DEFAULT_OUTPUT_DIR: &str = "monitorail-report";

/// Analysis toggles as they appear on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    Criticality,
    Resources,
    Progress,
    Curve,
    Graph,
}

/// `[analyses]` table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toggles {
    pub criticality: bool,
    pub resources: bool,
    pub progress: bool,
    pub curve: bool,
    /// Unset means "same as criticality"
    pub graph: Option<bool>,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            criticality: true,
            resources: true,
            progress: true,
            curve: true,
            graph: None,
        }
    }
}

impl Toggles {
    pub fn disable(&mut self, toggle: Toggle) {
        match toggle {
            Toggle::Criticality => self.criticality = false,
            Toggle::Resources => self.resources = false,
            Toggle::Progress => self.progress = false,
            Toggle::Curve => self.curve = false,
            Toggle::Graph => self.graph = Some(false),
        }
    }

    pub fn kinds(&self) -> BTreeSet<AnalysisKind> {
        [
            (self.criticality, AnalysisKind::Criticality),
            (self.resources, AnalysisKind::ResourceTally),
            (self.progress, AnalysisKind::PercentComplete),
            (self.curve, AnalysisKind::ProgressCurve),
            (
                self.graph.unwrap_or(self.criticality),
                AnalysisKind::DependencyGraph,
            ),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }
}

/// Contents of a configuration file; every key is optional
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub baseline: Option<PathBuf>,
    pub update: Option<PathBuf>,
    pub start: Option<DateBound>,
    pub end: Option<DateBound>,
    pub slack_threshold: Option<i64>,
    pub bucket: Option<CurveBucket>,
    pub charts: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub analyses: Toggles,
    pub service: ServiceConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text).map_err(|e| match e {
            ConfigError::Invalid(msg) => ConfigError::Invalid(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Invalid(e.message().to_string()))
    }
}

/// Values given on the command line; `None` leaves the file's value alone
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub baseline: Option<PathBuf>,
    pub update: Option<PathBuf>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub slack_threshold: Option<i64>,
    pub bucket: Option<String>,
    pub skip: Vec<Toggle>,
    pub no_charts: bool,
    pub output_dir: Option<PathBuf>,
    pub service_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Overrides {
    /// Apply the service flags on top of file settings
    pub fn service(&self, mut service: ServiceConfig) -> ServiceConfig {
        if let Some(url) = &self.service_url {
            service.url.clone_from(url);
        }
        if let Some(key) = &self.api_key {
            service.api_key = Some(key.clone());
        }
        if let Some(secs) = self.timeout_secs {
            service.timeout_secs = secs;
        }
        service
    }
}

/// Everything one pipeline run needs
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub baseline: PathBuf,
    pub update: Option<PathBuf>,
    pub period: Period,
    pub analysis: AnalysisOptions,
    pub charts: bool,
    /// `None` keeps artifacts in memory
    pub output_dir: Option<PathBuf>,
    pub service: ServiceConfig,
}

impl RunConfig {
    /// Merge file settings and flags, then validate
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Result<Self, ConfigError> {
        let baseline = overrides
            .baseline
            .clone()
            .or(file.baseline)
            .ok_or_else(|| ConfigError::Invalid("no baseline schedule given".into()))?;

        let start = match &overrides.start {
            Some(s) => s.parse()?,
            None => file.start.unwrap_or_default(),
        };
        let end = match &overrides.end {
            Some(s) => s.parse()?,
            None => file.end.unwrap_or_default(),
        };
        let period = Period::new(start, end)?;

        let bucket = match &overrides.bucket {
            Some(s) => s.parse()?,
            None => file.bucket.unwrap_or_default(),
        };

        let mut toggles = file.analyses;
        for toggle in &overrides.skip {
            toggles.disable(*toggle);
        }

        let analysis = AnalysisOptions::default()
            .with_kinds(toggles.kinds())
            .slack_threshold(
                overrides
                    .slack_threshold
                    .or(file.slack_threshold)
                    .unwrap_or(DEFAULT_SLACK_THRESHOLD),
            )
            .bucket(bucket);
        analysis.validate()?;

        Ok(Self {
            baseline,
            update: overrides.update.clone().or(file.update),
            period,
            analysis,
            charts: !overrides.no_charts && file.charts.unwrap_or(true),
            output_dir: Some(
                overrides
                    .output_dir
                    .clone()
                    .or(file.output_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ),
            service: overrides.service(file.service),
        })
    }

    /// Config for in-memory runs with default settings
    pub fn for_file(baseline: impl Into<PathBuf>) -> Self {
        Self {
            baseline: baseline.into(),
            update: None,
            period: Period::full(),
            analysis: AnalysisOptions::default(),
            charts: true,
            output_dir: None,
            service: ServiceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_without_file() {
        let config = RunConfig::resolve(
            ConfigFile::default(),
            Overrides {
                baseline: Some("plan.xml".into()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.baseline, PathBuf::from("plan.xml"));
        assert!(config.period.is_full());
        assert_eq!(config.analysis, AnalysisOptions::default());
        assert!(config.charts);
        assert_eq!(config.output_dir, Some(PathBuf::from(DEFAULT_OUTPUT_DIR)));
        assert_eq!(config.service.timeout_secs, 300);
    }

    #[test]
    fn file_values_and_sentinel() {
        let file = ConfigFile::parse(
            r#"
            baseline = "b.xml"
            start = "01/02/2025"
            end = "Da file Project"
            slack_threshold = 10
            bucket = "week"
            charts = false

            [analyses]
            resources = false

            [service]
            url = "http://localhost:8080"
            max_retries = 0
            "#,
        )
        .unwrap();
        let config = RunConfig::resolve(file, Overrides::default()).unwrap();

        assert_eq!(
            config.period.start,
            DateBound::On(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
        );
        assert_eq!(config.period.end, DateBound::FromFile);
        assert_eq!(config.analysis.slack_threshold, 10);
        assert_eq!(config.analysis.bucket, CurveBucket::Week);
        assert!(!config.analysis.runs(AnalysisKind::ResourceTally));
        assert!(config.analysis.runs(AnalysisKind::DependencyGraph));
        assert!(!config.charts);
        assert_eq!(config.service.url, "http://localhost:8080");
        assert_eq!(config.service.max_retries, 0);
        assert_eq!(config.service.backoff_ms, 500);
    }

    #[test]
    fn flags_win_over_file() {
        let file = ConfigFile::parse("baseline = \"b.xml\"\nslack_threshold = 10\n").unwrap();
        let config = RunConfig::resolve(
            file,
            Overrides {
                baseline: Some("other.xml".into()),
                slack_threshold: Some(2),
                skip: vec![Toggle::Curve],
                service_url: Some("http://svc".into()),
                api_key: Some("k".into()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.baseline, PathBuf::from("other.xml"));
        assert_eq!(config.analysis.slack_threshold, 2);
        assert!(!config.analysis.runs(AnalysisKind::ProgressCurve));
        assert!(config.service.is_configured());
    }

    #[test]
    fn graph_follows_criticality() {
        let mut toggles = Toggles::default();
        toggles.disable(Toggle::Criticality);
        assert!(!toggles.kinds().contains(&AnalysisKind::DependencyGraph));

        toggles.graph = Some(true);
        assert!(toggles.kinds().contains(&AnalysisKind::DependencyGraph));
    }

    #[test]
    fn invalid_settings_rejected() {
        let base = || Overrides {
            baseline: Some("b.xml".into()),
            ..Overrides::default()
        };

        let inverted = Overrides {
            start: Some("2025-03-01".into()),
            end: Some("2025-02-01".into()),
            ..base()
        };
        assert!(matches!(
            RunConfig::resolve(ConfigFile::default(), inverted),
            Err(ConfigError::InvertedPeriod { .. })
        ));

        let negative = Overrides {
            slack_threshold: Some(-3),
            ..base()
        };
        assert_eq!(
            RunConfig::resolve(ConfigFile::default(), negative),
            Err(ConfigError::NegativeThreshold(-3))
        );

        let bad_date = Overrides {
            start: Some("31-31-2025".into()),
            ..base()
        };
        assert_eq!(
            RunConfig::resolve(ConfigFile::default(), bad_date),
            Err(ConfigError::InvalidDate("31-31-2025".into()))
        );

        assert!(RunConfig::resolve(ConfigFile::default(), Overrides::default()).is_err());
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(ConfigFile::parse("treshold = 5\n").is_err());
    }
}
