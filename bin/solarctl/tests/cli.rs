//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "test"
//! ems_scope: "code"
//! ems_description: "End-to-end checks for the solarctl binary."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn solarctl(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("solarctl").unwrap();
    cmd.current_dir(workdir)
        .env_remove("SOLAR_CALC_CONFIG")
        .env("SOLAR_CALC_LOG", "warn");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

const CABLE_INPUTS: &str = r#"{
  "current_a": 30,
  "voltage_v": 400,
  "length_m": 50,
  "max_voltage_drop_percent": 3,
  "material": "copper"
}"#;

#[test]
fn list_prints_every_calculator() {
    let dir = tempdir().unwrap();
    let output = solarctl(dir.path()).arg("list").output().unwrap();
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert_eq!(stdout.lines().count(), 15);
    assert!(stdout.contains("pv_sizing"));
    assert!(stdout.contains("earthing_sizing"));
}

#[test]
fn describe_json_exposes_inputs() {
    let dir = tempdir().unwrap();
    let output = solarctl(dir.path())
        .args(["describe", "cable_sizing", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let description: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(description["id"], "cable_sizing");
    assert!(description["inputs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|field| field["name"] == "current_a"));
}

#[test]
fn describe_unknown_calculator_fails() {
    let dir = tempdir().unwrap();
    let output = solarctl(dir.path())
        .args(["describe", "sun_dial"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("sun_dial"));
}

#[test]
fn validate_reports_missing_fields_with_exit_code_two() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("cable.yaml");
    fs::write(&input, "current_a: 30\n").unwrap();

    let output = solarctl(dir.path())
        .args(["validate", "cable_sizing", "--input"])
        .arg(&input)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("error: Voltage is required"));
    assert!(stdout.contains("error: Cable length is required"));
}

#[test]
fn run_applies_overrides_and_exports_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("cable.json");
    fs::write(&input, CABLE_INPUTS).unwrap();
    let reports = dir.path().join("out");

    let output = solarctl(dir.path())
        .args(["run", "cable_sizing", "--json", "--set", "length_m=50", "--input"])
        .arg(&input)
        .arg("--report-dir")
        .arg(&reports)
        .output()
        .unwrap();
    assert!(output.status.success());

    let record: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(record["calculator"], "cable_sizing");
    assert_eq!(record["result"]["success"], true);
    assert_eq!(record["result"]["outputs"]["recommended_size_mm2"], 6.0);

    let run_id = record["run_id"].as_str().unwrap();
    assert!(reports.join(format!("cable_sizing-{run_id}.json")).is_file());
}

#[test]
fn run_merges_configured_defaults() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("solar-calc.toml"),
        "[reports]\nenabled = false\n\n[defaults.cable_sizing]\nvoltage_v = 400\nlength_m = 50\nmax_voltage_drop_percent = 3.0\n",
    )
    .unwrap();

    let output = solarctl(dir.path())
        .args(["run", "cable_sizing", "--json", "--set", "current_a=30"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let record: Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(record["result"]["inputs"]["voltage_v"], 400.0);
    assert_eq!(record["result"]["outputs"]["recommended_size_mm2"], 6.0);
    assert!(!dir.path().join("reports").exists());
}

#[test]
fn failed_run_exits_non_zero() {
    let dir = tempdir().unwrap();
    let output = solarctl(dir.path())
        .args(["run", "cable_sizing", "--no-report", "--set", "current_a=30"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("cable_sizing [failed]"));
}
