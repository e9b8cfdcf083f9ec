//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::warn;

use crate::model::{InputBag, OutputValue};

/// Text recorded in place of a quantity that cannot be computed.
pub const NOT_DETERMINABLE: &str = "not determinable";
/// Text recorded for a break-even that does not occur within the horizon.
pub const NOT_REACHED: &str = "not reached";

/// Uniform envelope returned by every calculator.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub success: bool,
    pub inputs: InputBag,
    pub outputs: IndexMap<String, OutputValue>,
    pub calculations: Vec<String>,
    pub assumptions: Vec<String>,
    pub insights: Vec<String>,
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl CalculationResult {
    /// A result with no usable answer: failed validation or an infeasible search.
    pub fn failure(inputs: &InputBag, errors: Vec<String>) -> Self {
        Self {
            success: false,
            inputs: inputs.clone(),
            outputs: IndexMap::new(),
            calculations: Vec::new(),
            assumptions: Vec::new(),
            insights: Vec::new(),
            warnings: None,
            errors,
        }
    }

    pub fn output(&self, name: &str) -> Option<&OutputValue> {
        self.outputs.get(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.output(name).and_then(OutputValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.output(name).and_then(OutputValue::as_text)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.output(name).and_then(OutputValue::as_flag)
    }

    pub fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or(&[])
    }

    pub fn has_warning_containing(&self, needle: &str) -> bool {
        self.warnings().iter().any(|w| w.contains(needle))
    }
}

/// Collects outputs and the derivation trail while a calculator runs.
#[derive(Debug)]
pub struct ResultBuilder {
    inputs: InputBag,
    outputs: IndexMap<String, OutputValue>,
    calculations: Vec<String>,
    assumptions: Vec<String>,
    insights: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ResultBuilder {
    pub fn new(inputs: &InputBag) -> Self {
        Self {
            inputs: inputs.clone(),
            outputs: IndexMap::new(),
            calculations: Vec::new(),
            assumptions: Vec::new(),
            insights: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record a named output. Non-finite numbers are stored as [`NOT_DETERMINABLE`].
    pub fn output(&mut self, name: &str, value: impl Into<OutputValue>) -> &mut Self {
        let value = value.into();
        let value = if value.is_finite() {
            value
        } else {
            warn!(output = name, "non-finite output replaced");
            OutputValue::Text(NOT_DETERMINABLE.to_owned())
        };
        self.outputs.insert(name.to_owned(), value);
        self
    }

    /// Record an optional quantity, falling back to `absent` text.
    pub fn output_or(&mut self, name: &str, value: Option<f64>, absent: &str) -> &mut Self {
        match value {
            Some(value) => self.output(name, value),
            None => self.output(name, absent),
        }
    }

    pub fn step(&mut self, line: impl Into<String>) -> &mut Self {
        self.calculations.push(line.into());
        self
    }

    pub fn assume(&mut self, line: impl Into<String>) -> &mut Self {
        self.assumptions.push(line.into());
        self
    }

    pub fn insight(&mut self, line: impl Into<String>) -> &mut Self {
        self.insights.push(line.into());
        self
    }

    pub fn warn(&mut self, line: impl Into<String>) -> &mut Self {
        let line = line.into();
        warn!(warning = %line, "soft constraint violated");
        self.warnings.push(line);
        self
    }

    /// Mark the result as having no usable answer.
    pub fn fail(&mut self, error: impl Into<String>) -> &mut Self {
        self.errors.push(error.into());
        self
    }

    pub fn finish(self) -> CalculationResult {
        let success = self.errors.is_empty();
        CalculationResult {
            success,
            inputs: self.inputs,
            outputs: self.outputs,
            calculations: self.calculations,
            assumptions: self.assumptions,
            insights: self.insights,
            warnings: if self.warnings.is_empty() {
                None
            } else {
                Some(self.warnings)
            },
            errors: self.errors,
        }
    }
}

/// Fixed-point rendering used in derivation strings.
pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_outputs_become_text() {
        let bag = InputBag::new();
        let mut builder = ResultBuilder::new(&bag);
        builder
            .output("ratio", f64::NAN)
            .output("payback", f64::INFINITY)
            .output("series", vec![1.0, f64::NAN])
            .output("npv", 12.5);
        let result = builder.finish();
        assert_eq!(result.text("ratio"), Some(NOT_DETERMINABLE));
        assert_eq!(result.text("payback"), Some(NOT_DETERMINABLE));
        assert_eq!(result.text("series"), Some(NOT_DETERMINABLE));
        assert_eq!(result.number("npv"), Some(12.5));
    }

    #[test]
    fn warnings_keep_success() {
        let bag = InputBag::new();
        let mut builder = ResultBuilder::new(&bag);
        builder.output("drop_percent", 3.4).warn("Voltage drop exceeds limit");
        let result = builder.finish();
        assert!(result.success);
        assert_eq!(result.warnings(), ["Voltage drop exceeds limit".to_string()]);
    }

    #[test]
    fn empty_warnings_are_omitted_from_json() {
        let result = ResultBuilder::new(&InputBag::new()).finish();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("warnings").is_none());
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn fixed_renders_decimals() {
        assert_eq!(fixed(2.1876, 2), "2.19");
        assert_eq!(fixed(37.5, 1), "37.5");
    }
}
