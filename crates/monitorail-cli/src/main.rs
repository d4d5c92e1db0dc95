//! monitorail CLI - schedule progress analysis
//!
//! Reads MS Project exports (MSPDI XML, converter JSON, MPP through the
//! conversion service), runs the progress analyses and writes CSV tables
//! and SVG charts.

mod config;
mod diagnostics;
mod pipeline;

use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use monitorail_core::{ConfigError, Diagnostic, DiagnosticCode, DiagnosticEmitter};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{ConfigFile, Overrides, RunConfig, Toggle};
use diagnostics::{DiagnosticConfig, JsonEmitter, TerminalEmitter};
use pipeline::RunOutcome;

#[derive(Parser)]
#[command(name = "monitorail")]
#[command(author, version, about = "Progress analysis for MS Project schedule exports", long_about = None)]
struct Cli {
    /// Verbose tracing output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Show errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Treat warnings as errors (partial runs exit 1)
    #[arg(long, global = true)]
    strict: bool,

    /// Output format for the run log
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct ServiceArgs {
    /// Conversion service base URL (needed for .mpp files)
    #[arg(long, env = "MONITORAIL_SERVICE_URL", global = true)]
    service_url: Option<String>,

    /// Conversion service API key
    #[arg(long, env = "MONITORAIL_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Conversion request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a schedule and write the report
    Analyze {
        /// Baseline schedule (.xml, .json or .mpp)
        #[arg(value_name = "FILE")]
        baseline: Option<PathBuf>,

        /// Updated schedule to compare against the baseline
        #[arg(short, long, value_name = "FILE")]
        update: Option<PathBuf>,

        /// Window start: YYYY-MM-DD, DD/MM/YYYY or "file"
        #[arg(long)]
        start: Option<String>,

        /// Window end: YYYY-MM-DD, DD/MM/YYYY or "file"
        #[arg(long)]
        end: Option<String>,

        /// Slack threshold in days for sub-critical activities
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<i64>,

        /// Progress curve bucket: day, week or month
        #[arg(long)]
        bucket: Option<String>,

        /// Analyses to leave out
        #[arg(long, value_enum, value_delimiter = ',')]
        skip: Vec<Toggle>,

        /// Do not render SVG charts
        #[arg(long)]
        no_charts: bool,

        /// Report directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Read a schedule and print the ingestion log
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Convert an .mpp file through the conversion service and save the JSON
    Convert {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output file (defaults to the input name with .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn config_rejected(error: &ConfigError) -> RunOutcome {
    RunOutcome::failed(
        Vec::new(),
        Diagnostic::new(DiagnosticCode::E003InvalidConfig, error.to_string()),
    )
}

fn main() -> Result<process::ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = match &cli.config {
        Some(path) => match ConfigFile::load(path) {
            Ok(file) => file,
            Err(e) => return finish(&cli, &config_rejected(&e)),
        },
        None => ConfigFile::default(),
    };
    let mut overrides = Overrides {
        service_url: cli.service.service_url.clone(),
        api_key: cli.service.api_key.clone(),
        timeout_secs: cli.service.timeout,
        ..Overrides::default()
    };

    let outcome = match &cli.command {
        Commands::Analyze {
            baseline,
            update,
            start,
            end,
            threshold,
            bucket,
            skip,
            no_charts,
            output,
        } => {
            overrides.baseline.clone_from(baseline);
            overrides.update.clone_from(update);
            overrides.start.clone_from(start);
            overrides.end.clone_from(end);
            overrides.slack_threshold = *threshold;
            overrides.bucket.clone_from(bucket);
            overrides.skip.clone_from(skip);
            overrides.no_charts = *no_charts;
            overrides.output_dir.clone_from(output);

            match RunConfig::resolve(file, overrides) {
                Ok(config) => pipeline::run(&config),
                Err(e) => config_rejected(&e),
            }
        }
        Commands::Check { file: path } => pipeline::check(path, &overrides.service(file.service)),
        Commands::Convert { file: path, output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| pipeline::converted_path(path));
            pipeline::convert(path, &output, &overrides.service(file.service))
        }
    };

    finish(&cli, &outcome)
}

#[derive(Serialize)]
struct JsonRun<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activities: Option<usize>,
    artifacts: Vec<&'a str>,
    diagnostics: serde_json::Value,
}

/// Print the log and summary, and pick the exit code
fn finish(cli: &Cli, outcome: &RunOutcome) -> Result<process::ExitCode> {
    let config = DiagnosticConfig {
        strict: cli.strict,
        quiet: cli.quiet,
    };
    let mut stdout = std::io::stdout().lock();

    let exit = match cli.format {
        OutputFormat::Text => {
            let mut emitter = TerminalEmitter::new(std::io::stderr(), config);
            emitter.emit_all(outcome.log.iter().cloned());

            if !cli.quiet {
                if let Some(summary) = outcome.report.as_ref().and_then(|r| r.get("summary.txt")) {
                    write!(stdout, "{}", summary.content).context("writing summary")?;
                } else if let Some(schedule) = &outcome.schedule {
                    writeln!(
                        stdout,
                        "{}: {} activities",
                        schedule.project_name,
                        schedule.len()
                    )
                    .context("writing summary")?;
                }
                writeln!(stdout, "Status: {}", outcome.status).context("writing summary")?;
            }
            emitter.exit_code()
        }
        OutputFormat::Json => {
            let mut emitter = JsonEmitter::new(config);
            emitter.emit_all(outcome.log.iter().cloned());

            let run = JsonRun {
                status: outcome.status.as_str(),
                project: outcome.schedule.as_ref().map(|s| s.project_name.as_str()),
                activities: outcome.schedule.as_ref().map(|s| s.len()),
                artifacts: outcome
                    .report
                    .as_ref()
                    .map(|r| r.names().collect())
                    .unwrap_or_default(),
                diagnostics: emitter.to_json_value(),
            };
            let json = serde_json::to_string_pretty(&run).context("serializing run log")?;
            writeln!(stdout, "{json}").context("writing run log")?;
            emitter.exit_code()
        }
    };

    Ok(exit.into())
}
