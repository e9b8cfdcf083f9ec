//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Checks the shipped configuration and demo inputs stay runnable."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use solar_calc_engine::io::load_input_bag;
use solar_calc_engine::{registry, run_calculation};
use solar_common::AppConfig;

fn repo_path(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join(path)
}

#[test]
fn reference_configuration_is_valid() {
    let config = AppConfig::from_path(&repo_path("configs/solar-calc.toml"))
        .unwrap_or_else(|err| panic!("reference config rejected: {err:#}"));
    assert!(config.reports.enabled);
    assert_eq!(config.api.listen.port(), 8088);
    for calculator in config.defaults.keys() {
        assert!(registry::lookup(calculator).is_ok(), "unknown id {calculator}");
    }
}

#[test]
fn every_demo_input_runs_successfully() {
    let config = AppConfig::from_path(&repo_path("configs/solar-calc.toml")).unwrap();
    let mut seen = 0;
    for entry in fs::read_dir(repo_path("demos")).unwrap() {
        let path = entry.unwrap().path();
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let mut inputs = load_input_bag(&path)
            .unwrap_or_else(|err| panic!("failed to load {}: {err}", path.display()));
        inputs.merge_missing(&config.defaults_for(id));
        let record = run_calculation(id, &inputs).unwrap();
        assert!(
            record.result.success,
            "{} failed: {:?}",
            path.display(),
            record.result.errors
        );
        seen += 1;
    }
    assert!(seen >= 5);
}
