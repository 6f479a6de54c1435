//! CLI smoke tests: run the built binary end to end on tiny experiments.

use std::io::Write;
use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mirror"));
    for var in ["MIRROR_CONFIG", "MIRROR_RUNS", "MIRROR_SEED", "MIRROR_WORKERS", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

const TINY: [&str; 8] = [
    "--runs", "3", "--timesteps", "40", "--dimension", "12", "--workers", "2",
];

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("sweep"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mirror"), "Expected binary name in --version output");
}

#[test]
fn test_run_emits_json_summary() {
    let output = cli_bin()
        .arg("run")
        .args(TINY)
        .arg("--no-calibration")
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(summary["config"]["num_runs"], 3);
    assert_eq!(summary["conditions"].as_array().unwrap().len(), 2);
    assert!(summary["calibration"].is_null());
}

#[test]
fn test_run_table_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.txt");
    let output = cli_bin()
        .args(["run", "--format", "table", "--condition", "simultaneous", "--output"])
        .arg(&path)
        .args(TINY)
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let table = std::fs::read_to_string(&path).unwrap();
    assert!(table.contains("simultaneous"));
    assert!(!table.contains("sequential"));
}

#[test]
fn test_config_file_is_used() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "num_runs = 2\ntimesteps = 30\ndimension = 8\nconditions = [\"sequential\"]").unwrap();
    let output = cli_bin()
        .args(["run", "--no-calibration", "--config"])
        .arg(file.path())
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["config"]["timesteps"], 30);
    assert_eq!(summary["conditions"][0]["condition"], "sequential");
}

#[test]
fn test_missing_config_file_fails() {
    let output = cli_bin()
        .args(["run", "--config", "/tmp/nonexistent_mirror_config_12345.toml"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nonexistent_mirror_config_12345"));
}

#[test]
fn test_invalid_override_fails_without_panicking() {
    let output = cli_bin().args(["run", "--runs", "0"]).output().expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("num_runs"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"));
}

#[test]
fn test_sweep_reports_each_value() {
    let output = cli_bin()
        .args(["sweep", "--parameter", "noise-std", "--values", "0.05,0.2"])
        .args(TINY)
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["parameter"], "noise_std");
    assert_eq!(report["points"].as_array().unwrap().len(), 4);
}

#[test]
fn test_calibrate_passes_by_default() {
    let output = cli_bin().arg("calibrate").output().expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["passed"], true);
}
