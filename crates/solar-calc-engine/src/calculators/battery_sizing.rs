//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Battery bank sizing for a backup window, by chemistry.

use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumString};

use super::grouped;
use crate::{
    calculator::Calculator,
    errors::{CalcEngineError, Result},
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

const SAFETY_BUFFER: f64 = 1.1;
const MAX_CONTINUOUS_C_RATE: f64 = 1.0;
const LEAD_ACID_MAX_DOD: f64 = 0.5;

const CHEMISTRY_NAMES: &[&str] =
    &["lithium_lfp", "lithium_nmc", "lead_acid_agm", "lead_acid_gel", "lead_acid_flooded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum BatteryChemistry {
    #[default]
    LithiumLfp,
    LithiumNmc,
    LeadAcidAgm,
    LeadAcidGel,
    LeadAcidFlooded,
}

/// Nominal characteristics used when the caller does not override them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemistrySpec {
    pub depth_of_discharge: f64,
    pub efficiency: f64,
    pub cycle_life: f64,
    pub price_per_kwh: f64,
}

impl BatteryChemistry {
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_str(raw.trim()).map_err(|_| {
            CalcEngineError::invalid_input("battery_type", format!("unknown battery chemistry '{raw}'"))
        })
    }

    pub fn spec(&self) -> ChemistrySpec {
        let (depth_of_discharge, efficiency, cycle_life, price_per_kwh) = match self {
            BatteryChemistry::LithiumLfp => (0.80, 0.92, 4000.0, 400.0),
            BatteryChemistry::LithiumNmc => (0.80, 0.90, 2000.0, 350.0),
            BatteryChemistry::LeadAcidAgm => (0.50, 0.80, 500.0, 200.0),
            BatteryChemistry::LeadAcidGel => (0.50, 0.80, 600.0, 220.0),
            BatteryChemistry::LeadAcidFlooded => (0.50, 0.85, 800.0, 150.0),
        };
        ChemistrySpec {
            depth_of_discharge,
            efficiency,
            cycle_life,
            price_per_kwh,
        }
    }

    pub fn is_lead_acid(&self) -> bool {
        matches!(
            self,
            BatteryChemistry::LeadAcidAgm | BatteryChemistry::LeadAcidGel | BatteryChemistry::LeadAcidFlooded
        )
    }

    pub fn label(&self) -> String {
        self.as_ref().replace('_', " ").to_uppercase()
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "battery_sizing",
    name: "Battery Storage Sizing",
    description: "Size battery energy storage based on load and backup requirements",
    category: Category::Sizing,
    inputs: vec![
        InputField::number("daily_consumption_kwh", "Daily Energy Consumption")
            .unit("kWh")
            .required()
            .at_least(0.0)
            .describe("Average daily energy usage to be covered by battery"),
        InputField::number("backup_hours", "Backup Hours Required")
            .unit("hours")
            .required()
            .at_least(1.0),
        InputField::choice("system_voltage_v", "System Voltage", &["12", "24", "48", "96", "400"])
            .unit("V")
            .default_number(48.0),
        InputField::number("depth_of_discharge_percent", "Depth of Discharge")
            .unit("%")
            .bounds(20.0, 100.0)
            .describe("Defaults by chemistry (lithium 80%, lead-acid 50%)"),
        InputField::choice(
            "battery_type",
            "Battery Technology",
            CHEMISTRY_NAMES,
        )
        .default_text("lithium_lfp"),
        InputField::number("peak_load_kw", "Peak Load").unit("kW"),
        InputField::number("battery_unit_kwh", "Individual Battery Capacity")
            .unit("kWh")
            .describe("Capacity of a single unit, for the unit count"),
        InputField::number("round_trip_efficiency_percent", "Round-Trip Efficiency")
            .unit("%")
            .bounds(70.0, 98.0)
            .describe("Defaults by chemistry"),
    ],
    rules: vec![
        ValidationRule::required("daily_consumption_kwh", "Daily consumption is required"),
        ValidationRule::positive("daily_consumption_kwh", "Daily consumption must be positive"),
        ValidationRule::required("backup_hours", "Backup hours required"),
        ValidationRule::min("backup_hours", 1.0, "Backup hours must be at least 1"),
        ValidationRule::positive("system_voltage_v", "System voltage must be positive"),
        ValidationRule::range("depth_of_discharge_percent", 20.0, 100.0, "DoD should be 20-100%"),
        ValidationRule::range("round_trip_efficiency_percent", 70.0, 98.0, "Efficiency should be 70-98%"),
        ValidationRule::positive("peak_load_kw", "Peak load must be positive"),
        ValidationRule::positive("battery_unit_kwh", "Battery unit capacity must be positive"),
        ValidationRule::one_of("battery_type", CHEMISTRY_NAMES, "Unknown battery technology"),
    ],
    formulas: vec![
        Formula {
            name: "Required Energy Storage",
            expression: "E = (E_daily × h / 24) / DoD / η",
            description: "Total battery capacity needed for the backup window",
            variables: &[("h", "Backup hours"), ("DoD", "Depth of discharge"), ("η", "Round-trip efficiency")],
        },
        Formula {
            name: "Battery Capacity in Ah",
            expression: "Ah = E × 1000 / V",
            description: "Capacity at the bank's nominal voltage",
            variables: &[],
        },
        Formula {
            name: "C-Rate Check",
            expression: "C = P_peak / E",
            description: "Discharge rate relative to capacity",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::number("LFP DoD", 80.0, "%", "Manufacturer Specs"),
        StandardValue::number("Lead-Acid DoD", 50.0, "%", "Industry Standard"),
        StandardValue::number("LFP Cycle Life", 4000.0, "cycles", "Industry Average"),
        StandardValue::number("Lead-Acid Cycle Life", 500.0, "cycles", "Industry Average"),
        StandardValue::number("Lithium Efficiency", 92.0, "%", "Industry Average"),
        StandardValue::number("Lead-Acid Efficiency", 80.0, "%", "Industry Average"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct BatterySizing;

impl Calculator for BatterySizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let daily = inputs.number_or("daily_consumption_kwh", 0.0);
        let backup_hours = inputs.number_or("backup_hours", 24.0);
        let voltage = inputs.number_or("system_voltage_v", 48.0);
        let chemistry = BatteryChemistry::parse(inputs.text_or("battery_type", "lithium_lfp"))?;
        let spec = chemistry.spec();
        let dod = inputs
            .number("depth_of_discharge_percent")
            .map_or(spec.depth_of_discharge, |v| v / 100.0);
        let efficiency = inputs
            .number("round_trip_efficiency_percent")
            .map_or(spec.efficiency, |v| v / 100.0);

        let backup_energy = daily * backup_hours / 24.0;
        let gross = backup_energy / dod;
        let total = gross / efficiency;
        let capacity_ah = total * 1000.0 / voltage;
        let recommended = total * SAFETY_BUFFER;
        let cost = recommended * spec.price_per_kwh;
        let cycle_life = spec.cycle_life * (spec.depth_of_discharge / dod);

        out.output("backup_energy_kwh", backup_energy)
            .output("gross_capacity_kwh", gross)
            .output("total_capacity_kwh", total)
            .output("capacity_ah", capacity_ah)
            .output("recommended_capacity_kwh", recommended)
            .output("estimated_cost", cost)
            .output("battery_type", chemistry.as_ref())
            .output("depth_of_discharge_percent", dod * 100.0)
            .output("efficiency_percent", efficiency * 100.0)
            .output("cycle_life", cycle_life);

        out.step(format!(
            "Backup Energy = {daily} kWh × ({backup_hours} ÷ 24) = {} kWh",
            fixed(backup_energy, 2)
        ))
        .step(format!(
            "Gross Capacity = {} ÷ {}% DoD = {} kWh",
            fixed(backup_energy, 2),
            fixed(dod * 100.0, 0),
            fixed(gross, 2)
        ))
        .step(format!(
            "Total Capacity = {} ÷ {}% efficiency = {} kWh",
            fixed(gross, 2),
            fixed(efficiency * 100.0, 0),
            fixed(total, 2)
        ))
        .step(format!(
            "Capacity in Ah = {} Wh ÷ {voltage}V = {} Ah",
            fixed(total * 1000.0, 0),
            fixed(capacity_ah, 0)
        ))
        .step(format!("With 10% buffer: {} kWh", fixed(recommended, 2)))
        .step(format!("Estimated cost: ${}", grouped(cost, 0)));

        let c_rate = inputs.number("peak_load_kw").map(|peak| (peak, peak / total));
        if let Some((peak, c_rate)) = c_rate {
            out.output("c_rate", c_rate)
                .output("c_rate_ok", c_rate <= MAX_CONTINUOUS_C_RATE)
                .step(format!(
                    "C-Rate check: {peak} kW ÷ {} kWh = {}C",
                    fixed(total, 2),
                    fixed(c_rate, 2)
                ));
        }
        if let Some(unit) = inputs.number("battery_unit_kwh") {
            let units = (recommended / unit).ceil();
            out.output("battery_units", units).step(format!(
                "Battery units = ⌈{} ÷ {unit}⌉ = {units}",
                fixed(recommended, 2)
            ));
        }

        let label = chemistry.label();
        out.assume(format!("Battery Type: {label}"))
            .assume(format!("Depth of Discharge: {}%", fixed(dod * 100.0, 0)))
            .assume(format!("Round-trip Efficiency: {}%", fixed(efficiency * 100.0, 0)))
            .assume(format!("Cycle Life: ~{} cycles at this DoD", fixed(cycle_life, 0)))
            .assume(format!("Price per kWh: ${}", spec.price_per_kwh))
            .assume("Temperature: Standard (25°C)");

        out.insight(format!(
            "You need a {} kWh {label} battery system",
            fixed(recommended, 1)
        ))
        .insight(format!(
            "At {voltage}V, this equals {} Ah capacity",
            fixed(capacity_ah, 0)
        ))
        .insight(format!(
            "Estimated battery cost: ${} (batteries only)",
            grouped(cost, 0)
        ))
        .insight(format!(
            "Expected cycle life: ~{} cycles at {}% DoD",
            fixed(cycle_life, 0),
            fixed(dod * 100.0, 0)
        ));

        if let Some((peak, c_rate)) = c_rate.filter(|(_, c)| *c > MAX_CONTINUOUS_C_RATE) {
            out.warn(format!(
                "Peak load ({peak} kW) results in {}C discharge rate - may exceed battery limits. Consider larger capacity or multiple parallel units.",
                fixed(c_rate, 2)
            ));
        }
        if chemistry.is_lead_acid() && dod > LEAD_ACID_MAX_DOD {
            out.warn(format!(
                "Lead-acid batteries should not exceed 50% DoD for longevity. Current setting: {}%",
                fixed(dod * 100.0, 0)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lfp_defaults_size_the_bank() {
        let bag = InputBag::new()
            .with("daily_consumption_kwh", 30.0)
            .with("backup_hours", 24.0);
        let result = BatterySizing.calculate(&bag);
        assert!(result.success);
        let total = 30.0 / 0.80 / 0.92;
        assert_relative_eq!(result.number("total_capacity_kwh").unwrap(), total, epsilon = 1e-9);
        assert_relative_eq!(result.number("capacity_ah").unwrap(), total * 1000.0 / 48.0, epsilon = 1e-9);
        assert_relative_eq!(result.number("estimated_cost").unwrap(), total * 1.1 * 400.0, epsilon = 1e-6);
        assert_relative_eq!(result.number("cycle_life").unwrap(), 4000.0);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn deep_lead_acid_discharge_warns() {
        let bag = InputBag::new()
            .with("daily_consumption_kwh", 10.0)
            .with("backup_hours", 12.0)
            .with("battery_type", "lead_acid_agm")
            .with("depth_of_discharge_percent", 80.0);
        let result = BatterySizing.calculate(&bag);
        assert!(result.has_warning_containing("50% DoD"));
        assert_relative_eq!(result.number("cycle_life").unwrap(), 500.0 * 0.5 / 0.8, epsilon = 1e-9);
    }

    #[test]
    fn high_c_rate_and_unit_count() {
        let bag = InputBag::new()
            .with("daily_consumption_kwh", 5.0)
            .with("backup_hours", 4.0)
            .with("peak_load_kw", 8.0)
            .with("battery_unit_kwh", 0.5);
        let result = BatterySizing.calculate(&bag);
        assert_eq!(result.flag("c_rate_ok"), Some(false));
        assert!(result.has_warning_containing("discharge rate"));
        let recommended = result.number("recommended_capacity_kwh").unwrap();
        assert_eq!(result.number("battery_units"), Some((recommended / 0.5).ceil()));
    }

    #[test]
    fn unknown_chemistry_is_rejected() {
        assert!(BatteryChemistry::parse("sodium_ion").is_err());
        assert_eq!(BatteryChemistry::parse("lead_acid_gel").unwrap().label(), "LEAD ACID GEL");
        for name in CHEMISTRY_NAMES {
            assert!(BatteryChemistry::parse(name).is_ok(), "{name}");
        }

        let bag = InputBag::new()
            .with("daily_consumption_kwh", 10.0)
            .with("backup_hours", 8.0)
            .with("battery_type", "sodium_ion");
        let result = BatterySizing.calculate(&bag);
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Unknown battery technology".to_string()]);
    }
}
