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

/// A single caller-supplied value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(f64),
    Text(String),
    Sequence(Vec<f64>),
}

impl InputValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            InputValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[f64]> {
        match self {
            InputValue::Sequence(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Parse a command-line style literal: numbers first, then comma lists, else text.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<f64>() {
            return InputValue::Number(value);
        }
        if trimmed.contains(',') {
            let parsed: Option<Vec<f64>> = trimmed
                .split(',')
                .map(|part| part.trim().parse::<f64>().ok())
                .collect();
            if let Some(values) = parsed {
                return InputValue::Sequence(values);
            }
        }
        InputValue::Text(trimmed.to_owned())
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Number(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_owned())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Text(value)
    }
}

impl From<Vec<f64>> for InputValue {
    fn from(values: Vec<f64>) -> Self {
        InputValue::Sequence(values)
    }
}

/// Named inputs for one calculation call. `null` entries are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, Option<InputValue>>",
    into = "IndexMap<String, InputValue>"
)]
pub struct InputBag {
    values: IndexMap<String, InputValue>,
}

impl From<IndexMap<String, Option<InputValue>>> for InputBag {
    fn from(raw: IndexMap<String, Option<InputValue>>) -> Self {
        let values = raw
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value)))
            .collect();
        Self { values }
    }
}

impl From<InputBag> for IndexMap<String, InputValue> {
    fn from(bag: InputBag) -> Self {
        bag.values
    }
}

impl InputBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<InputValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(InputValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(InputValue::as_text)
    }

    pub fn sequence(&self, name: &str) -> Option<&[f64]> {
        self.get(name).and_then(InputValue::as_sequence)
    }

    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.number(name).unwrap_or(default)
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.text(name).unwrap_or(default)
    }

    /// Read a 0–100 percentage and return it as a 0–1 fraction.
    pub fn fraction_or(&self, name: &str, default_percent: f64) -> f64 {
        self.number_or(name, default_percent) / 100.0
    }

    /// Fill in entries from `defaults` that this bag does not already carry.
    pub fn merge_missing(&mut self, defaults: &InputBag) {
        for (name, value) in &defaults.values {
            if !self.values.contains_key(name) {
                self.values.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<InputValue>> FromIterator<(K, V)> for InputBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = InputBag::new();
        for (name, value) in iter {
            bag.insert(name, value);
        }
        bag
    }
}

/// One row of a tabular output.
pub type OutputRow = IndexMap<String, OutputValue>;

/// A named calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Series(Vec<f64>),
    Table(Vec<OutputRow>),
}

impl OutputValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            OutputValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutputValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            OutputValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            OutputValue::Series(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&[OutputRow]> {
        match self {
            OutputValue::Table(rows) => Some(rows.as_slice()),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            OutputValue::Number(value) => value.is_finite(),
            OutputValue::Series(values) => values.iter().all(|v| v.is_finite()),
            OutputValue::Table(rows) => rows
                .iter()
                .all(|row| row.values().all(OutputValue::is_finite)),
            OutputValue::Flag(_) | OutputValue::Text(_) => true,
        }
    }
}

impl From<f64> for OutputValue {
    fn from(value: f64) -> Self {
        OutputValue::Number(value)
    }
}

impl From<u32> for OutputValue {
    fn from(value: u32) -> Self {
        OutputValue::Number(f64::from(value))
    }
}

impl From<bool> for OutputValue {
    fn from(value: bool) -> Self {
        OutputValue::Flag(value)
    }
}

impl From<&str> for OutputValue {
    fn from(value: &str) -> Self {
        OutputValue::Text(value.to_owned())
    }
}

impl From<String> for OutputValue {
    fn from(value: String) -> Self {
        OutputValue::Text(value)
    }
}

impl From<Vec<f64>> for OutputValue {
    fn from(values: Vec<f64>) -> Self {
        OutputValue::Series(values)
    }
}

impl From<Vec<OutputRow>> for OutputValue {
    fn from(rows: Vec<OutputRow>) -> Self {
        OutputValue::Table(rows)
    }
}

/// Build an [`OutputRow`] from `(column, value)` pairs.
pub fn row<const N: usize>(cells: [(&str, OutputValue); N]) -> OutputRow {
    cells
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// Inverter record from the equipment catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterModel {
    #[serde(default)]
    pub manufacturer: String,
    pub model: String,
    pub ac_capacity_kw: f64,
}

/// PV module record from the equipment catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelModel {
    #[serde(default)]
    pub manufacturer: String,
    pub model: String,
    pub rated_power_w: f64,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub length_mm: Option<f64>,
    #[serde(default)]
    pub width_mm: Option<f64>,
    #[serde(default)]
    pub efficiency: Option<f64>,
}

impl PanelModel {
    const DEFAULT_AREA_M2: f64 = 2.8;

    /// Module area from the record, its dimensions, or the 600 Wp default.
    pub fn area_m2(&self) -> f64 {
        if let Some(area) = self.area_m2.filter(|area| *area > 0.0) {
            return area;
        }
        match (self.length_mm, self.width_mm) {
            (Some(length), Some(width)) if length > 0.0 && width > 0.0 => {
                (length / 1000.0) * (width / 1000.0)
            }
            _ => Self::DEFAULT_AREA_M2,
        }
    }
}
