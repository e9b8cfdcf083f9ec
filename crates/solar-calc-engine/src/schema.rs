//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::Serialize;
use strum::{Display, EnumString};

use crate::validation::ValidationRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Sizing,
    Financial,
    Technical,
    Environmental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Number,
    Text,
    Choice,
    Sequence,
}

/// Default shown for an input field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDefault {
    Number(f64),
    Text(&'static str),
}

impl std::fmt::Display for FieldDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldDefault::Number(value) => write!(f, "{value}"),
            FieldDefault::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputField {
    pub name: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    pub description: &'static str,
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

impl InputField {
    fn base(name: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            label,
            field_type,
            unit: None,
            required: false,
            default: None,
            min: None,
            max: None,
            options: &[],
            description: "",
        }
    }

    pub fn number(name: &'static str, label: &'static str) -> Self {
        Self::base(name, label, FieldType::Number)
    }

    pub fn text(name: &'static str, label: &'static str) -> Self {
        Self::base(name, label, FieldType::Text)
    }

    pub fn choice(
        name: &'static str,
        label: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            options,
            ..Self::base(name, label, FieldType::Choice)
        }
    }

    pub fn sequence(name: &'static str, label: &'static str) -> Self {
        Self::base(name, label, FieldType::Sequence)
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_number(mut self, value: f64) -> Self {
        self.default = Some(FieldDefault::Number(value));
        self
    }

    pub fn default_text(mut self, value: &'static str) -> Self {
        self.default = Some(FieldDefault::Text(value));
        self
    }

    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Formula {
    pub name: &'static str,
    pub expression: &'static str,
    pub description: &'static str,
    pub variables: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StandardQuantity {
    Number(f64),
    Text(&'static str),
}

impl std::fmt::Display for StandardQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StandardQuantity::Number(value) => write!(f, "{value}"),
            StandardQuantity::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StandardValue {
    pub name: &'static str,
    pub value: StandardQuantity,
    pub unit: &'static str,
    pub source: &'static str,
}

impl StandardValue {
    pub const fn number(
        name: &'static str,
        value: f64,
        unit: &'static str,
        source: &'static str,
    ) -> Self {
        Self {
            name,
            value: StandardQuantity::Number(value),
            unit,
            source,
        }
    }

    pub const fn text(
        name: &'static str,
        value: &'static str,
        unit: &'static str,
        source: &'static str,
    ) -> Self {
        Self {
            name,
            value: StandardQuantity::Text(value),
            unit,
            source,
        }
    }
}

/// Static description of one calculator: form fields, rules, and documentation.
#[derive(Debug, Clone)]
pub struct CalculatorConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub inputs: Vec<InputField>,
    pub rules: Vec<ValidationRule>,
    pub formulas: Vec<Formula>,
    pub standards: Vec<StandardValue>,
}

impl CalculatorConfig {
    pub fn field(&self, name: &str) -> Option<&InputField> {
        self.inputs.iter().find(|field| field.name == name)
    }

    pub fn required_inputs(&self) -> Vec<&'static str> {
        self.inputs
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect()
    }

    pub fn description(&self) -> CalculatorDescription {
        CalculatorDescription {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            inputs: self.inputs.clone(),
            rules: self
                .rules
                .iter()
                .map(|rule| RuleSummary {
                    field: rule.field,
                    kind: rule.kind.label(),
                    message: rule.message,
                })
                .collect(),
            formulas: self.formulas.clone(),
            standards: self.standards.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub field: &'static str,
    pub kind: &'static str,
    pub message: &'static str,
}

/// Read-only catalogue view handed to presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct CalculatorDescription {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub inputs: Vec<InputField>,
    pub rules: Vec<RuleSummary>,
    pub formulas: Vec<Formula>,
    pub standards: Vec<StandardValue>,
}

impl CalculatorDescription {
    /// One bullet per input field, e.g. `• Current (A) [REQUIRED] - Design current`.
    pub fn input_definitions(&self) -> String {
        self.inputs
            .iter()
            .map(|field| {
                let mut line = format!("• {}", field.label);
                if let Some(unit) = field.unit {
                    line.push_str(&format!(" ({unit})"));
                }
                if field.required {
                    line.push_str(" [REQUIRED]");
                }
                if let Some(default) = field.default {
                    line.push_str(&format!(" [Default: {default}]"));
                }
                if !field.description.is_empty() {
                    line.push_str(&format!(" - {}", field.description));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn standard_values(&self) -> String {
        self.standards
            .iter()
            .map(|standard| {
                format!(
                    "• {}: {} {} ({})",
                    standard.name, standard.value, standard.unit, standard.source
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn formula_listing(&self) -> String {
        self.formulas
            .iter()
            .map(|formula| format!("• {}: {}", formula.name, formula.expression))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
