//! ---
//! ems_section: "15-testing-qa-runbook"
//! ems_subsection: "integration-tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Multi-calculator design scenarios across engine and configuration."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use approx::assert_relative_eq;
use solar_calc_engine::model::InputBag;
use solar_calc_engine::run_calculation;
use solar_common::AppConfig;

fn number(record: &solar_calc_engine::CalculationRecord, name: &str) -> f64 {
    record
        .result
        .number(name)
        .unwrap_or_else(|| panic!("{} did not produce '{name}'", record.calculator))
}

#[test]
fn load_profile_feeds_production_and_finance() {
    let load = run_calculation(
        "load_analysis",
        &InputBag::new()
            .with("daily_consumption_kwh", 40.0)
            .with("peak_demand_kw", 6.0)
            .with("load_type", "commercial"),
    )
    .unwrap();
    assert!(load.result.success, "{:?}", load.result.errors);
    let kwp = number(&load, "recommended_pv_kwp");
    assert_relative_eq!(kwp, 10.0, epsilon = 1e-9);

    let production = run_calculation(
        "energy_production",
        &InputBag::new()
            .with("system_capacity_kwp", kwp)
            .with("peak_sun_hours", 5.0)
            .with("performance_ratio_percent", 80.0),
    )
    .unwrap();
    assert!(production.result.success);
    let annual = number(&production, "annual_production_kwh");
    assert_relative_eq!(annual, 14_600.0, epsilon = 1e-6);

    let finance = run_calculation(
        "financial_analysis",
        &InputBag::new()
            .with("system_cost", 12_000.0)
            .with("annual_production_kwh", annual)
            .with("energy_rate", 0.15),
    )
    .unwrap();
    assert!(finance.result.success, "{:?}", finance.result.errors);
    assert!(number(&finance, "npv").is_finite());
    assert!(number(&finance, "total_production_kwh") > annual * 20.0);
}

#[test]
fn pv_sizing_agrees_with_load_analysis() {
    let daily = 40.0;
    let load = run_calculation(
        "load_analysis",
        &InputBag::new()
            .with("daily_consumption_kwh", daily)
            .with("peak_demand_kw", 6.0),
    )
    .unwrap();
    let sizing = run_calculation(
        "pv_sizing",
        &InputBag::new()
            .with("daily_consumption_kwh", daily)
            .with("daily_solar_yield", 5.0)
            .with("city", "Nairobi")
            .with("country", "Kenya")
            .with("available_area_m2", 1000.0)
            .with("inverter_catalog_kw", vec![3.0, 5.0, 8.0, 10.0, 12.0]),
    )
    .unwrap();
    assert!(sizing.result.success, "{:?}", sizing.result.errors);
    assert_relative_eq!(
        number(&sizing, "consumption_based_kwp"),
        number(&load, "recommended_pv_kwp"),
        epsilon = 1e-9
    );
}

#[test]
fn configured_defaults_fill_missing_inputs() {
    let config: AppConfig = r#"
[defaults.financial_analysis]
discount_rate_percent = 6
project_lifetime_years = 20
energy_rate = 0.2
"#
    .parse()
    .unwrap();

    let mut inputs = InputBag::new()
        .with("system_cost", 20_000.0)
        .with("annual_production_kwh", 15_000.0)
        .with("energy_rate", 0.12);
    inputs.merge_missing(&config.defaults_for("financial_analysis"));
    assert_eq!(inputs.number("energy_rate"), Some(0.12));
    assert_eq!(inputs.number("project_lifetime_years"), Some(20.0));

    let record = run_calculation("financial_analysis", &inputs).unwrap();
    assert!(record.result.success);
    let table = record
        .result
        .output("cash_flow_table")
        .and_then(|value| value.as_table())
        .unwrap();
    assert_eq!(table.len(), 20);
}
