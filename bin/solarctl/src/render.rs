//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Plain-text rendering of calculator descriptions and results."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt::Write as _;

use solar_calc_engine::model::{OutputRow, OutputValue};
use solar_calc_engine::schema::CalculatorDescription;
use solar_calc_engine::CalculationRecord;

pub fn description(description: &CalculatorDescription) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({}, {})", description.name, description.id, description.category);
    let _ = writeln!(out, "{}", description.description);
    section(&mut out, "Inputs", &description.input_definitions());
    section(&mut out, "Formulas", &description.formula_listing());
    section(&mut out, "Standard values", &description.standard_values());
    out
}

pub fn record(record: &CalculationRecord) -> String {
    let result = &record.result;
    let mut out = String::new();
    let status = if result.success { "ok" } else { "failed" };
    let _ = writeln!(out, "{} [{}] run {}", record.calculator, status, record.run_id);

    if !result.outputs.is_empty() {
        let _ = writeln!(out, "\nOutputs:");
        for (name, value) in &result.outputs {
            match value {
                OutputValue::Table(rows) => {
                    let _ = writeln!(out, "  {name}:");
                    for row in rows {
                        let _ = writeln!(out, "    - {}", table_row(row));
                    }
                }
                other => {
                    let _ = writeln!(out, "  {name}: {}", scalar(other));
                }
            }
        }
    }

    bullets(&mut out, "Calculations", &result.calculations);
    bullets(&mut out, "Assumptions", &result.assumptions);
    bullets(&mut out, "Insights", &result.insights);
    bullets(&mut out, "Warnings", result.warnings());
    bullets(&mut out, "Errors", &result.errors);
    out
}

fn section(out: &mut String, title: &str, body: &str) {
    if body.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:\n{body}");
}

fn bullets(out: &mut String, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for line in lines {
        let _ = writeln!(out, "  • {line}");
    }
}

fn table_row(row: &OutputRow) -> String {
    row.iter()
        .map(|(key, value)| format!("{key}={}", scalar(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar(value: &OutputValue) -> String {
    match value {
        OutputValue::Number(number) => format_number(*number),
        OutputValue::Flag(flag) => flag.to_string(),
        OutputValue::Text(text) => text.clone(),
        OutputValue::Series(values) => format!(
            "[{}]",
            values
                .iter()
                .map(|v| format_number(*v))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        OutputValue::Table(rows) => format!("{} rows", rows.len()),
    }
}

// Outputs are rounded at the source; trailing float noise is trimmed here.
fn format_number(value: f64) -> String {
    let rendered = format!("{value:.4}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}
