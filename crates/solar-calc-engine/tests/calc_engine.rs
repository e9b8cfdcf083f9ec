//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;

use approx::assert_abs_diff_eq;
use solar_calc_engine::{
    calculator::Calculator,
    financial::{irr, npv_at},
    io::load_input_bag,
    model::{InputBag, InverterModel},
    optimizer::{select_inverter, SelectionConstraints},
    registry, run_calculation,
    sizing::consumption_based_capacity,
};
use tempfile::tempdir;

fn catalog(sizes: &[f64]) -> Vec<InverterModel> {
    sizes
        .iter()
        .map(|kw| InverterModel {
            manufacturer: "Generic".into(),
            model: format!("{kw}kW"),
            ac_capacity_kw: *kw,
        })
        .collect()
}

#[test]
fn consumption_capacity_reference() {
    let kwp = consumption_based_capacity(50.0, 5.2, 0.80);
    assert_abs_diff_eq!(kwp, 12.02, epsilon = 0.005);
}

#[test]
fn cable_voltage_drop_reference() {
    let inputs = InputBag::new()
        .with("current_a", 30.0)
        .with("voltage_v", 400.0)
        .with("length_m", 50.0)
        .with("max_voltage_drop_percent", 3.0)
        .with("material", "copper");
    let record = run_calculation("cable_sizing", &inputs).unwrap();
    let result = &record.result;
    assert!(result.success);
    assert_abs_diff_eq!(result.number("minimum_size_mm2").unwrap(), 4.375, epsilon = 1e-9);
    assert_eq!(result.number("recommended_size_mm2"), Some(6.0));
    assert_abs_diff_eq!(result.number("voltage_drop_percent").unwrap(), 2.19, epsilon = 0.01);
}

#[test]
fn equipment_search_reference() {
    let selection = select_inverter(
        120.0,
        &catalog(&[33.0, 40.0, 50.0, 100.0, 125.0]),
        &SelectionConstraints::default(),
    )
    .unwrap();
    assert_eq!(selection.inverter.ac_capacity_kw, 100.0);
    assert_eq!(selection.quantity, 1);
    assert_abs_diff_eq!(selection.dc_ac_ratio, 1.2, epsilon = 1e-9);
}

#[test]
fn irr_reference() {
    let mut flows = vec![-50_000.0];
    flows.extend(std::iter::repeat(9_000.0).take(25));
    let solution = irr(&flows).unwrap();
    assert!(solution.converged);
    assert!(npv_at(&flows, solution.rate).abs() < 0.01);
}

#[test]
fn string_infeasibility_reference() {
    let inputs = InputBag::new()
        .with("panel_vmp_v", 41.5)
        .with("panel_voc_v", 49.5)
        .with("panel_imp_a", 13.25)
        .with("panel_wattage_w", 550.0)
        .with("inverter_mppt_min_v", 900.0)
        .with("inverter_mppt_max_v", 950.0)
        .with("inverter_max_voc_v", 1000.0);
    let record = run_calculation("string_configuration", &inputs).unwrap();
    let result = &record.result;
    assert!(!result.success);
    let min = result.number("min_panels_per_string").unwrap();
    let max = result.number("max_panels_per_string").unwrap();
    assert!(min > max);
    assert!(result.output("optimal_panels_per_string").is_none());
}

#[test]
fn every_calculator_documents_itself() {
    let mut count = 0;
    for (id, calculator) in registry::all() {
        let description = calculator.describe();
        assert_eq!(description.id, id.as_ref());
        assert!(!description.formulas.is_empty(), "{id} has no formulas");
        assert!(!description.input_definitions().is_empty());
        count += 1;
    }
    assert_eq!(count, 15);
}

#[test]
fn report_export_writes_envelope() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("battery.yaml");
    fs::write(&input_path, "daily_consumption_kwh: 12\nbackup_hours: 8\n").unwrap();

    let inputs = load_input_bag(&input_path).unwrap();
    let record = run_calculation("battery_sizing", &inputs).unwrap();
    assert!(record.result.success);

    let path = record.exporter().export(&dir.path().join("reports")).unwrap();
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some(format!("battery_sizing-{}.json", record.run_id).as_str())
    );
    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["calculator"], "battery_sizing");
    assert_eq!(written["run_id"], record.run_id.to_string());
    assert_eq!(written["schema"]["title"], "CalculationResult");
    assert_eq!(written["data"]["success"], true);
    assert!(written["data"]["outputs"]["recommended_capacity_kwh"].is_number());
}

#[test]
fn degenerate_inputs_never_produce_non_finite_outputs() {
    let cases = [
        (
            "payback_analysis",
            InputBag::new()
                .with("initial_investment", 10_000.0)
                .with("annual_savings", 100.0)
                .with("maintenance_cost", 100.0),
        ),
        (
            "carbon_offset",
            InputBag::new()
                .with("annual_production_kwh", 5_000.0)
                .with("grid_emission_factor", 0.0)
                .with("system_capacity_kwp", 4.0),
        ),
    ];
    for (id, inputs) in cases {
        let result = registry::lookup(id).unwrap().calculate(&inputs);
        assert!(result.success, "{id}: {:?}", result.errors);
        assert!(result.outputs.values().all(|value| value.is_finite()), "{id}");
    }
}
