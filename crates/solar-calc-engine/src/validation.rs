//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Declarative input rules shared by every calculator.
//!
//! Rules are evaluated in order and every failure is collected, so a caller
//! sees all problems with an input bag at once.

use serde::{Deserialize, Serialize};

use crate::model::{InputBag, InputValue};

/// Predicate over the whole bag, used for either/or preconditions.
pub type BagPredicate = fn(&InputBag) -> bool;

#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    Required,
    Positive,
    Percentage,
    Min(f64),
    Max(f64),
    Range(f64, f64),
    /// A present value must be text naming one of the listed options.
    OneOf(&'static [&'static str]),
    Custom(BagPredicate),
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Positive => "positive",
            RuleKind::Percentage => "percentage",
            RuleKind::Min(_) => "min",
            RuleKind::Max(_) => "max",
            RuleKind::Range(_, _) => "range",
            RuleKind::OneOf(_) => "one_of",
            RuleKind::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub field: &'static str,
    pub kind: RuleKind,
    pub message: &'static str,
}

impl ValidationRule {
    pub const fn new(field: &'static str, kind: RuleKind, message: &'static str) -> Self {
        Self {
            field,
            kind,
            message,
        }
    }

    pub const fn required(field: &'static str, message: &'static str) -> Self {
        Self::new(field, RuleKind::Required, message)
    }

    pub const fn positive(field: &'static str, message: &'static str) -> Self {
        Self::new(field, RuleKind::Positive, message)
    }

    pub const fn percentage(field: &'static str, message: &'static str) -> Self {
        Self::new(field, RuleKind::Percentage, message)
    }

    pub const fn min(field: &'static str, bound: f64, message: &'static str) -> Self {
        Self::new(field, RuleKind::Min(bound), message)
    }

    pub const fn max(field: &'static str, bound: f64, message: &'static str) -> Self {
        Self::new(field, RuleKind::Max(bound), message)
    }

    pub const fn range(field: &'static str, lo: f64, hi: f64, message: &'static str) -> Self {
        Self::new(field, RuleKind::Range(lo, hi), message)
    }

    pub const fn one_of(
        field: &'static str,
        options: &'static [&'static str],
        message: &'static str,
    ) -> Self {
        Self::new(field, RuleKind::OneOf(options), message)
    }

    pub const fn custom(field: &'static str, check: BagPredicate, message: &'static str) -> Self {
        Self::new(field, RuleKind::Custom(check), message)
    }

    /// Returns `true` when the rule holds for `bag`.
    pub fn check(&self, bag: &InputBag) -> bool {
        let value = bag.get(self.field);
        match self.kind {
            RuleKind::Required => value.is_some(),
            RuleKind::Custom(check) => check(bag),
            RuleKind::Positive => numeric(value, |v| v > 0.0),
            RuleKind::Percentage => numeric(value, |v| (0.0..=100.0).contains(&v)),
            RuleKind::Min(bound) => numeric(value, |v| v >= bound),
            RuleKind::Max(bound) => numeric(value, |v| v <= bound),
            RuleKind::Range(lo, hi) => numeric(value, |v| v >= lo && v <= hi),
            RuleKind::OneOf(options) => match value {
                None => true,
                Some(InputValue::Text(text)) => options.iter().any(|option| *option == text.as_str()),
                Some(_) => false,
            },
        }
    }
}

// Numeric rules only apply to present values; a present non-number fails.
fn numeric(value: Option<&InputValue>, holds: impl Fn(f64) -> bool) -> bool {
    match value {
        None => true,
        Some(InputValue::Number(v)) => v.is_finite() && holds(*v),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Evaluate every rule against `bag` and aggregate the failures.
pub fn validate(rules: &[ValidationRule], bag: &InputBag) -> ValidationReport {
    let errors: Vec<String> = rules
        .iter()
        .filter(|rule| !rule.check(bag))
        .map(|rule| rule.message.to_owned())
        .collect();
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
