//! End-to-end tests of the `monitorail` binary
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | success or partial run |
//! | 1 | failed run, or partial run with `--strict` |

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn monitorail(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_monitorail"))
        .args(args)
        .env_remove("MONITORAIL_SERVICE_URL")
        .env_remove("MONITORAIL_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute monitorail")
}

fn analyze(input: &Path, out: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "analyze",
        input.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    monitorail(&args)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn analyze_writes_tables_and_charts() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report");
    let output = analyze(&fixture("plan.xml"), &out, &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    for name in [
        "activities.csv",
        "criticality.csv",
        "resources.csv",
        "percent_complete.csv",
        "progress_curve.csv",
        "dependency_edges.csv",
        "percent_complete.svg",
        "progress_curve.svg",
        "dependency_network.svg",
        "summary.txt",
    ] {
        assert!(out.join(name).exists(), "{name} not written");
    }

    let summary = stdout(&output);
    assert!(summary.contains("Project: Viadotto Rio Secco"));
    assert!(summary.contains("Critical or sub-critical (slack <= 5 d): 2"));
    assert!(summary.ends_with("Status: success\n"));

    let resources = fs::read_to_string(out.join("resources.csv")).unwrap();
    assert_eq!(
        resources,
        "resource_id,resource,count\n2,Squadra carpentieri,2\n1,Escavatore,1\n3,Squadra ferraioli,1\n"
    );
}

#[test]
fn threshold_flag_changes_classification() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report");
    let output = analyze(&fixture("plan.xml"), &out, &["--threshold", "15", "--no-charts"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("(slack <= 15 d): 3"));
    assert!(!out.join("progress_curve.svg").exists());
}

#[test]
fn schedule_without_links_passes_strict() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report");
    let output = analyze(&fixture("no_links.xml"), &out, &["--strict"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).ends_with("Status: success\n"));
    assert!(!stderr(&output).contains("W008"));
    assert_eq!(
        fs::read_to_string(out.join("dependency_edges.csv")).unwrap(),
        "from,from_name,to,to_name\n"
    );
    let network = fs::read_to_string(out.join("dependency_network.svg")).unwrap();
    assert!(network.contains("Posa micropali"));
    assert!(!network.contains("url(#arrow)"));
}

#[test]
fn missing_slack_is_partial_unless_strict() {
    let dir = tempfile::tempdir().unwrap();

    let relaxed = analyze(&fixture("no_slack.xml"), &dir.path().join("a"), &[]);
    assert_eq!(relaxed.status.code(), Some(0));
    assert!(stderr(&relaxed).contains("warning[W006]: criticality analysis skipped"));
    assert!(stdout(&relaxed).contains("Status: partial"));
    assert!(!dir.path().join("a/criticality.csv").exists());
    assert!(dir.path().join("a/resources.csv").exists());

    let strict = analyze(&fixture("no_slack.xml"), &dir.path().join("b"), &["--strict"]);
    assert_eq!(strict.status.code(), Some(1));
    assert!(stderr(&strict).contains("error[W006]"));
}

#[test]
fn corrupt_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = analyze(&fixture("corrupt.xml"), &dir.path().join("r"), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[E001]"));
    assert!(stdout(&output).contains("Status: failed"));
}

#[test]
fn inverted_window_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = analyze(
        &fixture("plan.xml"),
        &dir.path().join("r"),
        &["--start", "2025-03-01", "--end", "2025-02-01"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[E003]: analysis window starts after it ends"));
}

#[test]
fn config_file_and_update() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("avanzamento");
    let config = dir.path().join("monitorail.toml");
    fs::write(
        &config,
        format!(
            "baseline = {:?}\nupdate = {:?}\noutput_dir = {:?}\nstart = \"Da file Project\"\ncharts = false\n",
            fixture("plan.xml").display().to_string(),
            fixture("update.xml").display().to_string(),
            out.display().to_string(),
        ),
    )
    .unwrap();

    let output = monitorail(&["--config", config.to_str().unwrap(), "analyze"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    let variance = fs::read_to_string(out.join("variance.csv")).unwrap();
    let first_row = variance.lines().nth(1).unwrap();
    assert_eq!(first_row, "1,Scavo fondazioni,0,5,100,100,0");
    assert!(stdout(&output).contains("Variance: 4 matched, 1 finishing late"));
}

#[test]
fn json_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = analyze(
        &fixture("plan.xml"),
        &dir.path().join("r"),
        &["--format", "json", "--quiet"],
    );

    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["project"], "Viadotto Rio Secco");
    assert_eq!(json["activities"], 4);
    assert!(json["artifacts"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "criticality.csv"));
    // --quiet keeps errors only
    assert_eq!(json["diagnostics"], serde_json::json!([]));
}

#[test]
fn check_prints_ingestion_log() {
    let output = monitorail(&["check", fixture("plan.xml").to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).contains("info[I001]: total activities read: 4"));
    assert!(stdout(&output).contains("Viadotto Rio Secco: 4 activities"));
}

#[test]
fn mpp_without_service() {
    let dir = tempfile::tempdir().unwrap();
    let mpp = dir.path().join("lotto.mpp");
    fs::write(&mpp, b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1").unwrap();

    let check = monitorail(&["check", mpp.to_str().unwrap()]);
    assert_eq!(check.status.code(), Some(1));
    assert!(stderr(&check).contains("re-export as XML"));

    let convert = monitorail(&["convert", mpp.to_str().unwrap()]);
    assert_eq!(convert.status.code(), Some(1));
    assert!(stderr(&convert).contains("error[E003]"));
}
