//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! String and main DC cable sizing on the solar-cable ampacity table.

use once_cell::sync::Lazy;

use crate::{
    cable::{
        select_cable, CableMaterial, CableRequest, CableSelection, CableTable, CircuitDuty,
        Derating, DesignCurrentPolicy, MATERIAL_NAMES,
    },
    calculator::Calculator,
    errors::Result,
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

const STRING_DROP_CEILING: f64 = 0.015;
const TOTAL_DROP_LIMIT_PERCENT: f64 = 3.0;
const MIN_STRING_SIZE_MM2: f64 = 4.0;

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "dc_cable_sizing",
    name: "DC Cable Sizing",
    description: "Size PV string and main DC cables against voltage drop and solar-cable ampacity",
    category: Category::Technical,
    inputs: vec![
        InputField::number("string_current_a", "String Current (Isc)").unit("A").required(),
        InputField::number("string_voltage_v", "String Voltage (Vmp)").unit("V").required(),
        InputField::number("number_of_strings", "Number of Strings").required().at_least(1.0),
        InputField::number("string_length_m", "String Cable Length")
            .unit("m")
            .required()
            .describe("One-way length from the string to the combiner"),
        InputField::number("main_cable_length_m", "Main DC Cable Length")
            .unit("m")
            .default_number(0.0)
            .describe("Combiner to inverter; 0 when strings land directly on the inverter"),
        InputField::number("max_voltage_drop_percent", "Maximum Voltage Drop")
            .unit("%")
            .default_number(2.0)
            .bounds(0.5, 5.0),
        InputField::choice("material", "Conductor Material", &["copper", "aluminium"])
            .default_text("copper"),
        InputField::number("ambient_temp_c", "Ambient Temperature")
            .unit("°C")
            .default_number(40.0),
    ],
    rules: vec![
        ValidationRule::required("string_current_a", "String current is required"),
        ValidationRule::positive("string_current_a", "String current must be positive"),
        ValidationRule::required("string_voltage_v", "String voltage is required"),
        ValidationRule::positive("string_voltage_v", "String voltage must be positive"),
        ValidationRule::required("number_of_strings", "Number of strings is required"),
        ValidationRule::min("number_of_strings", 1.0, "At least one string is required"),
        ValidationRule::required("string_length_m", "String cable length is required"),
        ValidationRule::positive("string_length_m", "String cable length must be positive"),
        ValidationRule::min("main_cable_length_m", 0.0, "Main cable length cannot be negative"),
        ValidationRule::range("max_voltage_drop_percent", 0.5, 5.0, "DC voltage drop should be 0.5-5%"),
        ValidationRule::one_of("material", MATERIAL_NAMES, "Conductor material must be copper or aluminium"),
    ],
    formulas: vec![
        Formula {
            name: "String Design Current",
            expression: "I_design = I_sc × 1.56",
            description: "Continuous and irradiance factors (1.25 × 1.25)",
            variables: &[("I_sc", "Module short-circuit current (A)")],
        },
        Formula {
            name: "Main Cable Current",
            expression: "I_main = I_sc × N_strings × 1.25",
            description: "Combined current of all strings",
            variables: &[],
        },
        Formula {
            name: "DC Cable Size",
            expression: "A = (2 × L × I × ρ) / (ΔV% × V) × 100",
            description: "Round-trip drop on the DC run",
            variables: &[],
        },
        Formula {
            name: "Cable Power Loss",
            expression: "P = I² × (2 × L × ρ / A)",
            description: "Heating loss per run",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::number("String Voltage Drop", 1.5, "%", "IEC 62548"),
        StandardValue::number("Total DC Voltage Drop", 3.0, "%", "IEC 62548"),
        StandardValue::number("Minimum String Cable", 4.0, "mm²", "Mechanical Strength"),
        StandardValue::number("DC Safety Factor", 1.56, "", "NEC 690.8"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct DcCableSizing;

impl Calculator for DcCableSizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let isc = inputs.number_or("string_current_a", 0.0);
        let voltage = inputs.number_or("string_voltage_v", 0.0);
        let strings = inputs.number_or("number_of_strings", 1.0).round().max(1.0);
        let string_length = inputs.number_or("string_length_m", 0.0);
        let main_length = inputs.number_or("main_cable_length_m", 0.0);
        let drop_limit = inputs.fraction_or("max_voltage_drop_percent", 2.0);
        let material = CableMaterial::parse(inputs.text_or("material", "copper"))?;
        let ambient = inputs.number_or("ambient_temp_c", 40.0);
        let policy = DesignCurrentPolicy::default();
        let derating = Derating::DcSolar {
            temperature_c: ambient,
        };

        let string_current = policy.design_current(CircuitDuty::DcString, isc, None);
        let string_limit = drop_limit.min(STRING_DROP_CEILING);
        let string = select_cable(&CableRequest {
            material,
            table: CableTable::DcSolar,
            derating,
            minimum_size_mm2: MIN_STRING_SIZE_MM2,
            ..CableRequest::new(string_current, voltage, string_length, string_limit)
        })?;
        let string_loss_w = string.evaluation.power_loss_kw * 1000.0;

        out.step(format!(
            "String design current = {isc}A × {} = {}A",
            policy.multiplier(CircuitDuty::DcString),
            fixed(string_current, 2)
        ))
        .step(format!(
            "String min size = (2 × {string_length}m × {}A × {}) ÷ ({}% × {voltage}V) × 100 = {} mm²",
            fixed(string_current, 2),
            material.resistivity(),
            fixed(string_limit * 100.0, 2),
            fixed(string.minimum_size_mm2, 2)
        ))
        .step(format!("String selected size: {} mm²", string.size_mm2))
        .step(format!(
            "String actual Vdrop = {}%",
            fixed(string.evaluation.voltage_drop_percent, 3)
        ))
        .step(format!(
            "String ampacity (derated) = {}A × {} = {}A",
            string.base_ampacity_a,
            string.derating_factor,
            fixed(string.evaluation.derated_ampacity_a, 1)
        ));

        out.output("string_design_current_a", string_current)
            .output("string_minimum_size_mm2", string.minimum_size_mm2)
            .output("string_size_mm2", string.size_mm2)
            .output("string_voltage_drop_percent", string.evaluation.voltage_drop_percent)
            .output("string_ampacity_a", string.evaluation.derated_ampacity_a)
            .output("string_ampacity_ok", string.evaluation.ampacity_ok)
            .output("string_power_loss_w", string_loss_w);

        let main: Option<(f64, CableSelection)> = if main_length > 0.0 {
            let main_current = policy.design_current(CircuitDuty::DcMain, isc * strings, None);
            let selection = select_cable(&CableRequest {
                material,
                table: CableTable::DcSolar,
                derating,
                ..CableRequest::new(main_current, voltage, main_length, drop_limit)
            })?;
            out.step(format!(
                "Main design current = {isc}A × {strings} × {} = {}A",
                policy.multiplier(CircuitDuty::DcMain),
                fixed(main_current, 2)
            ))
            .step(format!("Main selected size: {} mm²", selection.size_mm2))
            .step(format!(
                "Main actual Vdrop = {}%",
                fixed(selection.evaluation.voltage_drop_percent, 3)
            ));
            Some((main_current, selection))
        } else {
            None
        };

        let (main_current, main_size, main_drop, main_ampacity, main_ok, main_loss_w) = match &main {
            Some((current, selection)) => (
                *current,
                selection.size_mm2,
                selection.evaluation.voltage_drop_percent,
                selection.evaluation.derated_ampacity_a,
                selection.evaluation.ampacity_ok,
                selection.evaluation.power_loss_kw * 1000.0,
            ),
            None => (0.0, 0.0, 0.0, 0.0, true, 0.0),
        };
        out.output("main_design_current_a", main_current)
            .output("main_size_mm2", main_size)
            .output("main_voltage_drop_percent", main_drop)
            .output("main_ampacity_a", main_ampacity)
            .output("main_ampacity_ok", main_ok)
            .output("main_power_loss_w", main_loss_w);

        let total_drop = string.evaluation.voltage_drop_percent + main_drop;
        let total_loss_w = string_loss_w * strings + main_loss_w;
        let system_power_w = isc * voltage * strings;
        let efficiency_loss = total_loss_w / system_power_w * 100.0;
        out.step(format!(
            "Total DC voltage drop = {}% + {}% = {}%",
            fixed(string.evaluation.voltage_drop_percent, 3),
            fixed(main_drop, 3),
            fixed(total_drop, 3)
        ))
        .step(format!(
            "Total power loss = {} W × {strings} + {} W = {} W",
            fixed(string_loss_w, 2),
            fixed(main_loss_w, 2),
            fixed(total_loss_w, 2)
        ))
        .step(format!(
            "Efficiency loss = {} W ÷ ({isc}A × {voltage}V × {strings}) × 100 = {}%",
            fixed(total_loss_w, 2),
            fixed(efficiency_loss, 3)
        ));
        out.output("total_voltage_drop_percent", total_drop)
            .output("total_voltage_drop_ok", total_drop <= TOTAL_DROP_LIMIT_PERCENT)
            .output("total_power_loss_w", total_loss_w)
            .output("efficiency_loss_percent", efficiency_loss);

        out.assume(format!("Cable material: {}", material.label()))
            .assume(format!("Resistivity: {} Ω·mm²/m", material.resistivity()))
            .assume(format!("Ambient temperature: {ambient}°C"))
            .assume(format!("Temperature derating: {}", string.derating_factor))
            .assume("Solar cable rated 90°C in free air");

        out.insight(format!(
            "String cables: {} mm² {} ({}% voltage drop)",
            string.size_mm2,
            material.label(),
            fixed(string.evaluation.voltage_drop_percent, 2)
        ));
        if main.is_some() {
            out.insight(format!(
                "Main DC cable: {main_size} mm² {} ({}% voltage drop)",
                material.label(),
                fixed(main_drop, 2)
            ));
        }
        out.insight(format!(
            "Cable power loss: {} W ({}% of system power)",
            fixed(total_loss_w, 1),
            fixed(efficiency_loss, 2)
        ));

        if !string.evaluation.ampacity_ok {
            out.warn(format!(
                "String cable ampacity ({}A) less than design current ({}A). Use larger cable.",
                fixed(string.evaluation.derated_ampacity_a, 1),
                fixed(string_current, 1)
            ));
        }
        if !main_ok {
            out.warn(format!(
                "Main cable ampacity ({}A) less than design current ({}A). Use larger cable.",
                fixed(main_ampacity, 1),
                fixed(main_current, 1)
            ));
        }
        if total_drop > TOTAL_DROP_LIMIT_PERCENT {
            out.warn(format!(
                "Total DC voltage drop ({}%) exceeds 3% limit. Use larger cables.",
                fixed(total_drop, 2)
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn array() -> InputBag {
        InputBag::new()
            .with("string_current_a", 13.9)
            .with("string_voltage_v", 750.0)
            .with("number_of_strings", 6.0)
            .with("string_length_m", 40.0)
    }

    #[test]
    fn string_cable_floor_is_four_square_mm() {
        let result = DcCableSizing.calculate(&array());
        assert!(result.success);
        assert_relative_eq!(result.number("string_design_current_a").unwrap(), 13.9 * 1.56);
        assert_eq!(result.number("string_size_mm2"), Some(4.0));
        assert_eq!(result.number("main_size_mm2"), Some(0.0));
        assert_eq!(result.flag("main_ampacity_ok"), Some(true));
    }

    #[test]
    fn main_cable_uses_combined_current() {
        let result = DcCableSizing.calculate(&array().with("main_cable_length_m", 60.0));
        assert!(result.success);
        assert_relative_eq!(result.number("main_design_current_a").unwrap(), 13.9 * 6.0 * 1.25);
        let ampacity = result.number("main_ampacity_a").unwrap();
        assert!(ampacity >= result.number("main_design_current_a").unwrap());
        let total = result.number("total_voltage_drop_percent").unwrap();
        assert_relative_eq!(
            total,
            result.number("string_voltage_drop_percent").unwrap()
                + result.number("main_voltage_drop_percent").unwrap()
        );
    }

    #[test]
    fn long_low_voltage_runs_warn() {
        let bag = InputBag::new()
            .with("string_current_a", 10.0)
            .with("string_voltage_v", 48.0)
            .with("number_of_strings", 2.0)
            .with("string_length_m", 200.0)
            .with("main_cable_length_m", 400.0)
            .with("max_voltage_drop_percent", 5.0);
        let result = DcCableSizing.calculate(&bag);
        assert!(result.success);
        assert!(result.has_warning_containing("exceeds 3% limit"));
    }

    #[test]
    fn misspelled_material_is_rejected() {
        let result = DcCableSizing.calculate(&array().with("material", "alu"));
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["Conductor material must be copper or aluminium".to_string()]
        );
        assert!(DcCableSizing.calculate(&array().with("material", "aluminium")).success);
    }
}
