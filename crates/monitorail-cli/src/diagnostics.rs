//! Diagnostic formatting for CLI output
//!
//! - `TerminalEmitter`: rustc-style text to stderr
//! - `JsonEmitter`: machine-readable JSON
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Run finished: success or partial (warnings, skipped analyses) |
//! | 1 | Run failed, or partial under `--strict` |
//!
//! `--strict` escalates warnings to errors. `--quiet` hides everything but
//! errors and never changes the exit code.

use std::io::Write;
use std::process;

use monitorail_core::{Diagnostic, DiagnosticEmitter, Severity};
use serde::Serialize;

// ============================================================================
// Exit Code
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    /// The error count should already reflect strict-mode escalation
    pub fn from_error_count(count: usize) -> Self {
        if count > 0 {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Diagnostic Config
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticConfig {
    /// Warnings become errors
    pub strict: bool,
    /// Show errors only
    pub quiet: bool,
}

impl DiagnosticConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Default::default()
        }
    }

    pub fn effective_severity(&self, severity: Severity) -> Severity {
        match severity {
            Severity::Warning if self.strict => Severity::Error,
            s => s,
        }
    }

    pub fn should_show(&self, severity: Severity) -> bool {
        !self.quiet || self.effective_severity(severity) == Severity::Error
    }
}

// ============================================================================
// Terminal
// ============================================================================

pub struct TerminalEmitter<W: Write> {
    writer: W,
    config: DiagnosticConfig,
    error_count: usize,
    warning_count: usize,
}

impl<W: Write> TerminalEmitter<W> {
    pub fn new(writer: W, config: DiagnosticConfig) -> Self {
        Self {
            writer,
            config,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }

    fn write_diagnostic(&mut self, diagnostic: &Diagnostic) -> std::io::Result<()> {
        let severity = self.config.effective_severity(diagnostic.severity);

        // Counted even when hidden so --quiet keeps the exit code
        match severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Info => {}
        }
        if !self.config.should_show(diagnostic.severity) {
            return Ok(());
        }

        writeln!(
            self.writer,
            "{}[{}]: {}",
            severity.as_str(),
            diagnostic.code.as_str(),
            diagnostic.message
        )?;
        for note in &diagnostic.notes {
            writeln!(self.writer, "   = {}", note)?;
        }
        Ok(())
    }
}

impl<W: Write> DiagnosticEmitter for TerminalEmitter<W> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        // stderr may be closed
        let _ = self.write_diagnostic(&diagnostic);
    }
}

// ============================================================================
// JSON
// ============================================================================

pub struct JsonEmitter {
    diagnostics: Vec<JsonDiagnostic>,
    config: DiagnosticConfig,
    error_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    pub code: String,
    pub severity: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl JsonEmitter {
    pub fn new(config: DiagnosticConfig) -> Self {
        Self {
            diagnostics: Vec::new(),
            config,
            error_count: 0,
        }
    }

    pub fn diagnostics(&self) -> &[JsonDiagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_error_count(self.error_count)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.diagnostics).unwrap_or(serde_json::Value::Null)
    }
}

impl DiagnosticEmitter for JsonEmitter {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let severity = self.config.effective_severity(diagnostic.severity);
        if severity == Severity::Error {
            self.error_count += 1;
        }
        if !self.config.should_show(diagnostic.severity) {
            return;
        }

        self.diagnostics.push(JsonDiagnostic {
            code: diagnostic.code.as_str().to_string(),
            severity: severity.as_str().to_string(),
            message: diagnostic.message,
            notes: diagnostic.notes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitorail_core::DiagnosticCode;
    use pretty_assertions::assert_eq;

    fn skipped() -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::W006AnalysisSkipped,
            "criticality analysis skipped: no activity carries TotalSlack",
        )
        .with_note("re-export with the Total Slack column")
    }

    fn read() -> Diagnostic {
        Diagnostic::new(DiagnosticCode::I001ActivitiesRead, "total activities read: 4")
    }

    #[test]
    fn terminal_basic_output() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::default());
        emitter.emit(read());
        emitter.emit(skipped());

        assert_eq!(emitter.warning_count(), 1);
        assert!(emitter.exit_code().is_success());
        drop(emitter);

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "info[I001]: total activities read: 4\n\
             warning[W006]: criticality analysis skipped: no activity carries TotalSlack\n   \
             = re-export with the Total Slack column\n"
        );
    }

    #[test]
    fn strict_escalates_warnings() {
        let mut output = Vec::new();
        let mut emitter = TerminalEmitter::new(&mut output, DiagnosticConfig::strict());
        emitter.emit(skipped());

        assert_eq!(emitter.error_count(), 1);
        assert_eq!(emitter.exit_code(), ExitCode::Failure);
        drop(emitter);
        assert!(String::from_utf8(output).unwrap().starts_with("error[W006]"));
    }

    #[test]
    fn quiet_hides_but_keeps_exit_code() {
        let mut output = Vec::new();
        let config = DiagnosticConfig {
            strict: true,
            quiet: true,
        };
        let mut emitter = TerminalEmitter::new(&mut output, config);
        emitter.emit(read());
        emitter.emit(skipped());

        assert_eq!(emitter.exit_code(), ExitCode::Failure);
        drop(emitter);
        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("I001"));
        assert!(text.contains("error[W006]"));
    }

    #[test]
    fn json_collects() {
        let mut emitter = JsonEmitter::new(DiagnosticConfig::quiet());
        emitter.emit(read());
        emitter.emit(Diagnostic::new(
            DiagnosticCode::E001UnreadableSchedule,
            "plan.xml: unreadable or corrupt file",
        ));

        assert_eq!(emitter.diagnostics().len(), 1);
        assert_eq!(emitter.exit_code(), ExitCode::Failure);
        assert_eq!(
            emitter.to_json_value(),
            serde_json::json!([{
                "code": "E001",
                "severity": "error",
                "message": "plan.xml: unreadable or corrupt file"
            }])
        );
    }
}
