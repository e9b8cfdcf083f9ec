//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#[cfg(feature = "rest-api")]
pub mod api;
pub mod cable;
pub mod calculator;
pub mod calculators;
pub mod errors;
pub mod financial;
pub mod io;
pub mod model;
pub mod optimizer;
pub mod registry;
pub mod reports;
pub mod result;
pub mod schema;
pub mod sizing;
pub mod validation;

use chrono::{DateTime, Utc};
use solar_logging::{calc_debug, calc_info, calc_warn, log_calculation_event, CalculationOutcome, LogContext};
use uuid::Uuid;

use crate::{model::InputBag, reports::ReportExporter, result::CalculationResult};

pub use errors::{CalcEngineError, Result};

/// One executed calculation, stamped for logging and report export.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalculationRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub calculator: String,
    pub result: CalculationResult,
}

impl CalculationRecord {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

/// Looks up `id` in the registry and runs it against `inputs`.
///
/// Validation failures and infeasible designs are reported inside the record
/// (`result.success == false`); only an unknown calculator id is an `Err`.
pub fn run_calculation(id: &str, inputs: &InputBag) -> Result<CalculationRecord> {
    let calculator = registry::lookup(id)?;
    let run_id = Uuid::new_v4();
    let run_label = run_id.to_string();
    let ctx = LogContext::new()
        .with_calculator(calculator.id())
        .with_run_id(&run_label)
        .with_stage("compute");

    calc_info!(context = ctx.clone(), "running {} with {} inputs", calculator.id(), inputs.len());
    let result = calculator.calculate(inputs);

    for step in &result.calculations {
        calc_debug!(context = ctx.clone(), "{step}");
    }
    for warning in result.warnings() {
        calc_warn!(context = ctx.clone(), "{warning}");
    }
    for error in &result.errors {
        calc_warn!(context = ctx.clone(), "rejected: {error}");
    }

    let outcome = CalculationOutcome::from_result(result.success, result.warnings().len());
    log_calculation_event(
        Some(&ctx),
        "calculation.finished",
        &format!("{} outputs", result.outputs.len()),
        outcome,
    );

    Ok(CalculationRecord {
        timestamp: Utc::now(),
        run_id,
        calculator: calculator.id().to_owned(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_calculation_stamps_record() {
        solar_logging::init();
        let inputs = InputBag::new()
            .with("current_a", 32.0)
            .with("voltage_v", 230.0)
            .with("length_m", 25.0);
        let record = run_calculation("cable_sizing", &inputs).unwrap();
        assert_eq!(record.calculator, "cable_sizing");
        assert!(record.result.success);
        assert!(record.result.number("recommended_size_mm2").is_some());
    }

    #[test]
    fn unknown_calculator_is_an_error() {
        let err = run_calculation("wind_sizing", &InputBag::new()).unwrap_err();
        assert!(matches!(err, CalcEngineError::UnknownCalculator(ref id) if id == "wind_sizing"));
    }

    #[test]
    fn invalid_inputs_stay_inside_the_record() {
        let record = run_calculation("pv_sizing", &InputBag::new()).unwrap();
        assert!(!record.result.success);
        assert!(!record.result.errors.is_empty());
    }
}
