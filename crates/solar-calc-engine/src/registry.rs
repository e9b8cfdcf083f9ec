//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    calculator::Calculator,
    calculators::{
        battery_sizing::BatterySizing, cable_sizing::CableSizing, carbon_offset::CarbonOffset,
        dc_cable_sizing::DcCableSizing, earthing_sizing::EarthingSizing,
        energy_production::EnergyProduction, financial_analysis::FinancialAnalysis,
        inverter_sizing::InverterSizing, irradiance::IrradianceCalculation,
        load_analysis::LoadAnalysis, payback_analysis::PaybackAnalysis, pv_sizing::PvSizing,
        roi_calculation::RoiCalculation, string_configuration::StringConfiguration,
        tilt_optimization::TiltOptimization,
    },
    errors::{CalcEngineError, Result},
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculatorId {
    PvSizing,
    CableSizing,
    FinancialAnalysis,
    BatterySizing,
    InverterSizing,
    CarbonOffset,
    IrradianceCalculation,
    LoadAnalysis,
    PaybackAnalysis,
    RoiCalculation,
    EnergyProduction,
    StringConfiguration,
    TiltOptimization,
    DcCableSizing,
    EarthingSizing,
}

impl CalculatorId {
    pub fn calculator(&self) -> &'static dyn Calculator {
        match self {
            CalculatorId::PvSizing => &PvSizing,
            CalculatorId::CableSizing => &CableSizing,
            CalculatorId::FinancialAnalysis => &FinancialAnalysis,
            CalculatorId::BatterySizing => &BatterySizing,
            CalculatorId::InverterSizing => &InverterSizing,
            CalculatorId::CarbonOffset => &CarbonOffset,
            CalculatorId::IrradianceCalculation => &IrradianceCalculation,
            CalculatorId::LoadAnalysis => &LoadAnalysis,
            CalculatorId::PaybackAnalysis => &PaybackAnalysis,
            CalculatorId::RoiCalculation => &RoiCalculation,
            CalculatorId::EnergyProduction => &EnergyProduction,
            CalculatorId::StringConfiguration => &StringConfiguration,
            CalculatorId::TiltOptimization => &TiltOptimization,
            CalculatorId::DcCableSizing => &DcCableSizing,
            CalculatorId::EarthingSizing => &EarthingSizing,
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        Self::from_str(id).map_err(|_| CalcEngineError::UnknownCalculator(id.to_owned()))
    }
}

pub fn lookup(id: &str) -> Result<&'static dyn Calculator> {
    CalculatorId::parse(id).map(|id| id.calculator())
}

pub fn all() -> impl Iterator<Item = (CalculatorId, &'static dyn Calculator)> {
    CalculatorId::iter().map(|id| (id, id.calculator()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_id_dispatches_to_its_own_config() {
        let mut seen = HashSet::new();
        for (id, calculator) in all() {
            assert_eq!(calculator.id(), id.as_ref());
            assert!(seen.insert(calculator.id()));
        }
        assert_eq!(seen.len(), 15);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let err = lookup("wind_sizing").err().unwrap();
        assert!(matches!(err, CalcEngineError::UnknownCalculator(ref id) if id == "wind_sizing"));
        assert!(lookup("cable_sizing").is_ok());
    }

    #[test]
    fn every_calculator_documents_a_formula() {
        for (_, calculator) in all() {
            let description = calculator.describe();
            assert!(!description.formulas.is_empty(), "{}", description.id);
            assert!(!description.inputs.is_empty(), "{}", description.id);
        }
    }
}
