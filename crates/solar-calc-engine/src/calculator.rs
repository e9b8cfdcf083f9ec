//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use tracing::warn;

use crate::{
    errors::{CalcEngineError, Result},
    model::InputBag,
    result::{CalculationResult, ResultBuilder},
    schema::{CalculatorConfig, CalculatorDescription},
    validation::{self, ValidationReport},
};

/// Contract shared by every calculator in the family.
///
/// Implementors supply their static [`CalculatorConfig`] and the domain computation;
/// validation, failure handling, and description come from the provided methods.
pub trait Calculator: Send + Sync {
    fn config(&self) -> &'static CalculatorConfig;

    /// Populate `result` from an already validated bag.
    ///
    /// Returning [`CalcEngineError::Infeasible`] or [`CalcEngineError::InvalidInput`]
    /// turns the result into `success = false`; outputs recorded before the error are kept.
    fn compute(&self, inputs: &InputBag, result: &mut ResultBuilder) -> Result<()>;

    fn id(&self) -> &'static str {
        self.config().id
    }

    fn validate(&self, inputs: &InputBag) -> ValidationReport {
        validation::validate(&self.config().rules, inputs)
    }

    fn calculate(&self, inputs: &InputBag) -> CalculationResult {
        let report = self.validate(inputs);
        if !report.valid {
            return CalculationResult::failure(inputs, report.errors);
        }

        let mut builder = ResultBuilder::new(inputs);
        if let Err(err) = self.compute(inputs, &mut builder) {
            if !matches!(
                err,
                CalcEngineError::Infeasible(_) | CalcEngineError::InvalidInput { .. }
            ) {
                warn!(calculator = self.id(), error = %err, "calculator raised an unexpected error");
            }
            builder.fail(err.to_string());
        }
        builder.finish()
    }

    fn describe(&self) -> CalculatorDescription {
        self.config().description()
    }
}
