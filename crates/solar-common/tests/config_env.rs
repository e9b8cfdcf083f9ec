//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "test"
//! ems_scope: "code"
//! ems_description: "Configuration discovery and environment override tests."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;

use solar_common::AppConfig;

// Both phases share the process environment, so they run in one test.
#[test]
fn env_override_wins_over_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let candidate = dir.path().join("solar-calc.toml");
    fs::write(&candidate, "[api]\nlisten = \"127.0.0.1:7001\"\n").unwrap();
    let override_path = dir.path().join("override.toml");
    fs::write(
        &override_path,
        "[api]\nlisten = \"127.0.0.1:7002\"\n\n[defaults.pv_sizing]\npeak_sun_hours = 4.5\n",
    )
    .unwrap();
    let missing = dir.path().join("missing.toml");

    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);
    let loaded = AppConfig::load_with_source(&[&missing, &candidate]).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(candidate.as_path()));
    assert_eq!(loaded.config.api.listen.port(), 7001);

    let fallback = AppConfig::load_with_source(&[&missing]).unwrap();
    assert!(fallback.source.is_none());
    assert_eq!(fallback.config.api.listen.port(), 8088);

    std::env::set_var(AppConfig::ENV_CONFIG_PATH, &override_path);
    let loaded = AppConfig::load_with_source(&[&candidate]).unwrap();
    assert_eq!(loaded.source.as_deref(), Some(override_path.as_path()));
    assert_eq!(loaded.config.api.listen.port(), 7002);
    assert_eq!(
        loaded.config.defaults_for("pv_sizing").number("peak_sun_hours"),
        Some(4.5)
    );

    std::env::set_var(AppConfig::ENV_CONFIG_PATH, &missing);
    let err = AppConfig::load_with_source(&[&candidate]).unwrap_err();
    assert!(err.to_string().contains("unable to read config file"));
    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);
}
