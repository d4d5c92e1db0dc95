//! Run log entries
//!
//! Every pipeline stage returns its log as a `Vec<Diagnostic>` next to its
//! result. Codes are stable: `E` codes are fatal, `W` codes mark a skipped or
//! degraded piece of work, `I` codes are informational.

use serde::{Deserialize, Serialize};

/// Severity of a log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable diagnostic codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// The input could not be read as a schedule
    E001UnreadableSchedule,
    /// The conversion service call failed
    E002ConversionFailed,
    /// Configuration rejected
    E003InvalidConfig,
    /// Artifacts could not be written
    E004WriteFailed,

    /// Some activities lack a field
    W001MissingField,
    /// Some field values could not be parsed and were treated as absent
    W002UnparsableField,
    /// Activities without a name were dropped
    W003UnnamedActivityDropped,
    /// Activities finish before they start
    W004FinishBeforeStart,
    /// Activities without dates were excluded by the analysis window
    W005UndatedExcluded,
    /// An analysis was skipped because its input field is absent
    W006AnalysisSkipped,
    /// Predecessor references that match no activity
    W007UnresolvedPredecessor,
    /// A chart could not be produced and was omitted
    W008ChartOmitted,
    /// Duplicate activity ids were renamed
    W009DuplicateActivityId,
    /// Percent complete outside 0-100 was clamped
    W010PercentClamped,
    /// Dependency graph contains a cycle
    W011DependencyCycle,
    /// Baseline and update schedules do not share every id
    W012UnmatchedActivities,

    /// Activity count read from the file
    I001ActivitiesRead,
    /// The file declares an XML namespace
    I002Namespace,
    /// No window applied
    I003FullProjectSpan,
    /// Window applied
    I004PeriodApplied,
    /// Dependency graph has no edges
    I005NoPredecessorLinks,
    /// An analysis ran
    I006AnalysisCompleted,
    /// Progress curve data source
    I007CurveSource,
    /// Task container strategy used during ingestion
    I008ContainerStrategy,
    /// Artifact produced
    I009ArtifactWritten,
}

impl DiagnosticCode {
    /// Short code, e.g. `W001`
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::E001UnreadableSchedule => "E001",
            DiagnosticCode::E002ConversionFailed => "E002",
            DiagnosticCode::E003InvalidConfig => "E003",
            DiagnosticCode::E004WriteFailed => "E004",
            DiagnosticCode::W001MissingField => "W001",
            DiagnosticCode::W002UnparsableField => "W002",
            DiagnosticCode::W003UnnamedActivityDropped => "W003",
            DiagnosticCode::W004FinishBeforeStart => "W004",
            DiagnosticCode::W005UndatedExcluded => "W005",
            DiagnosticCode::W006AnalysisSkipped => "W006",
            DiagnosticCode::W007UnresolvedPredecessor => "W007",
            DiagnosticCode::W008ChartOmitted => "W008",
            DiagnosticCode::W009DuplicateActivityId => "W009",
            DiagnosticCode::W010PercentClamped => "W010",
            DiagnosticCode::W011DependencyCycle => "W011",
            DiagnosticCode::W012UnmatchedActivities => "W012",
            DiagnosticCode::I001ActivitiesRead => "I001",
            DiagnosticCode::I002Namespace => "I002",
            DiagnosticCode::I003FullProjectSpan => "I003",
            DiagnosticCode::I004PeriodApplied => "I004",
            DiagnosticCode::I005NoPredecessorLinks => "I005",
            DiagnosticCode::I006AnalysisCompleted => "I006",
            DiagnosticCode::I007CurveSource => "I007",
            DiagnosticCode::I008ContainerStrategy => "I008",
            DiagnosticCode::I009ArtifactWritten => "I009",
        }
    }

    /// Severity implied by the code prefix
    pub fn default_severity(&self) -> Severity {
        match self.as_str().as_bytes()[0] {
            b'E' => Severity::Error,
            b'W' => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// One log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the severity implied by its code
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code.as_str(), self.message)
    }
}

/// Sink for diagnostics
pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: Diagnostic);

    fn emit_all(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>)
    where
        Self: Sized,
    {
        for d in diagnostics {
            self.emit(d);
        }
    }
}

/// Emitter that keeps everything in memory
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    pub diagnostics: Vec<Diagnostic>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

impl DiagnosticEmitter for CollectingEmitter {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Outcome of one pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Everything requested was produced without warnings
    Success,
    /// The run finished but something was skipped, degraded or omitted
    Partial,
    /// A fatal error stopped the run
    Failed,
}

impl RunStatus {
    /// Derive the status from an accumulated log
    pub fn from_log(log: &[Diagnostic]) -> Self {
        if log.iter().any(Diagnostic::is_error) {
            RunStatus::Failed
        } else if log.iter().any(Diagnostic::is_warning) {
            RunStatus::Partial
        } else {
            RunStatus::Success
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
