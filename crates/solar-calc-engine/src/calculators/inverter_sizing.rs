//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use once_cell::sync::Lazy;

use crate::{
    calculator::Calculator,
    cable::{CircuitDuty, DesignCurrentPolicy},
    errors::Result,
    model::{row, InputBag, InverterModel, OutputRow},
    optimizer::{select_inverter, SelectionConstraints},
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::temperature_adjusted,
    validation::ValidationRule,
};

pub const RECOMMENDED_DC_AC_RATIO: f64 = 1.2;
pub const INVERTER_EFFICIENCY_PERCENT: f64 = 97.5;
const RATIO_TABLE: [f64; 5] = [1.1, 1.15, 1.2, 1.25, 1.3];
pub const COMMON_SIZES_KW: [f64; 19] = [
    3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0, 15.0, 17.0, 20.0, 25.0, 30.0, 33.0, 36.0, 50.0, 60.0,
    75.0, 100.0, 125.0,
];
const VOC_COEFFICIENT_PERCENT: f64 = -0.35;
const VMP_COEFFICIENT_PERCENT: f64 = -0.40;
const COLD_EXTREME_C: f64 = -10.0;
const HOT_EXTREME_C: f64 = 70.0;
const CLIPPING_LOSS_PER_RATIO: f64 = 5.0;

pub fn clipping_risk(ratio: f64) -> &'static str {
    if ratio <= 1.1 {
        "Very Low"
    } else if ratio <= 1.2 {
        "Low"
    } else if ratio <= 1.25 {
        "Medium"
    } else {
        "Higher"
    }
}

/// Rough annual clipping loss above the recommended ratio.
pub fn clipping_loss_percent(ratio: f64) -> f64 {
    if ratio > RECOMMENDED_DC_AC_RATIO {
        (ratio - RECOMMENDED_DC_AC_RATIO) * CLIPPING_LOSS_PER_RATIO
    } else {
        0.0
    }
}

const SYSTEM_TYPE_NAMES: &[&str] = &["grid_tied", "off_grid", "hybrid"];
const PHASE_NAMES: &[&str] = &["single", "three"];

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "inverter_sizing",
    name: "Inverter Sizing",
    description: "Size the inverter from the array capacity and check string electricals",
    category: Category::Sizing,
    inputs: vec![
        InputField::number("pv_array_capacity_kwp", "PV Array Capacity").unit("kWp").required(),
        InputField::number("pv_voc_v", "Panel Voc").unit("V"),
        InputField::number("pv_vmp_v", "Panel Vmp").unit("V"),
        InputField::number("pv_isc_a", "Panel Isc").unit("A"),
        InputField::number("panels_per_string", "Panels per String"),
        InputField::number("number_of_strings", "Number of Strings"),
        InputField::choice("system_type", "System Type", SYSTEM_TYPE_NAMES)
            .default_text("grid_tied"),
        InputField::choice("grid_voltage_v", "Grid Voltage", &["120", "230", "240", "400", "480"])
            .unit("V")
            .default_number(230.0),
        InputField::choice("grid_phase", "Grid Phase", PHASE_NAMES).default_text("single"),
    ],
    rules: vec![
        ValidationRule::required("pv_array_capacity_kwp", "PV array capacity is required"),
        ValidationRule::positive("pv_array_capacity_kwp", "Capacity must be positive"),
        ValidationRule::positive("pv_voc_v", "Panel Voc must be positive"),
        ValidationRule::positive("pv_vmp_v", "Panel Vmp must be positive"),
        ValidationRule::positive("pv_isc_a", "Panel Isc must be positive"),
        ValidationRule::min("panels_per_string", 1.0, "Panels per string must be at least 1"),
        ValidationRule::min("number_of_strings", 1.0, "Number of strings must be at least 1"),
        ValidationRule::positive("grid_voltage_v", "Grid voltage must be positive"),
        ValidationRule::one_of("system_type", SYSTEM_TYPE_NAMES, "System type must be grid_tied, off_grid or hybrid"),
        ValidationRule::one_of("grid_phase", PHASE_NAMES, "Grid phase must be single or three"),
    ],
    formulas: vec![
        Formula {
            name: "DC:AC Ratio",
            expression: "Ratio = P_dc / P_ac",
            description: "Array nameplate over inverter rating",
            variables: &[],
        },
        Formula {
            name: "Inverter AC Sizing",
            expression: "P_ac = P_dc / Ratio",
            description: "Inverter size for the target ratio",
            variables: &[],
        },
        Formula {
            name: "String Voltage Check",
            expression: "V_oc,cold = V_oc × N × (1 + 0.0035 × 35)",
            description: "String open-circuit voltage at -10°C",
            variables: &[],
        },
        Formula {
            name: "Maximum Input Current",
            expression: "I_max = I_sc × N_strings × 1.25",
            description: "Combined short-circuit current with the NEC factor",
            variables: &[],
        },
        Formula {
            name: "Clipping Loss Estimate",
            expression: "Loss% = (Ratio - 1.2) × 5",
            description: "Approximate annual energy clipped above ratio 1.2",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::text("Optimal DC:AC Ratio", "1.1-1.25", "", "Industry practice"),
        StandardValue::number("Temperature Coefficient (Voc)", VOC_COEFFICIENT_PERCENT, "%/°C", "Typical c-Si"),
        StandardValue::number("Minimum Inverter Efficiency", 96.0, "%", "CEC weighted"),
        StandardValue::number("Max DC Voltage (Residential)", 600.0, "V", "NEC 690.7"),
        StandardValue::number("Max DC Voltage (Commercial)", 1000.0, "V", "IEC 62109"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct InverterSizing;

fn ratio_table(capacity_kwp: f64) -> Vec<OutputRow> {
    RATIO_TABLE
        .iter()
        .map(|&ratio| {
            row([
                ("ratio", ratio.into()),
                ("size_kw", (capacity_kwp / ratio).into()),
                ("clipping_risk", clipping_risk(ratio).into()),
            ])
        })
        .collect()
}

impl Calculator for InverterSizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let capacity = inputs.number_or("pv_array_capacity_kwp", 0.0);
        let system_type = inputs.text_or("system_type", "grid_tied");
        let grid_voltage = inputs.number_or("grid_voltage_v", 230.0);
        let three_phase = inputs.text_or("grid_phase", "single") == "three";

        let calculated = capacity / RECOMMENDED_DC_AC_RATIO;
        let (unit_kw, quantity) = match COMMON_SIZES_KW.iter().find(|&&size| size >= calculated) {
            Some(&size) => (size, 1),
            None => {
                let catalog: Vec<InverterModel> = COMMON_SIZES_KW
                    .iter()
                    .map(|&kw| InverterModel {
                        manufacturer: String::new(),
                        model: format!("{kw}kW"),
                        ac_capacity_kw: kw,
                    })
                    .collect();
                let constraints = SelectionConstraints {
                    ratio_min: 1.0,
                    ratio_max: 1.3,
                    ratio_preferred: RECOMMENDED_DC_AC_RATIO,
                    ..SelectionConstraints::default()
                };
                match select_inverter(capacity, &catalog, &constraints) {
                    Ok(selection) => (selection.inverter.ac_capacity_kw, selection.quantity),
                    Err(_) => (calculated, 1),
                }
            }
        };
        let total_ac = unit_kw * f64::from(quantity);
        let ratio = capacity / total_ac;
        let clipping = clipping_loss_percent(ratio);
        let phase_divisor = if three_phase { grid_voltage * 3f64.sqrt() } else { grid_voltage };
        let ac_current = total_ac * 1000.0 / phase_divisor;

        out.output("recommended_inverter_kw", unit_kw)
            .output("inverter_quantity", quantity)
            .output("total_ac_capacity_kw", total_ac)
            .output("calculated_size_kw", calculated)
            .output("dc_ac_ratio", ratio)
            .output("clipping_risk", clipping_risk(ratio))
            .output("clipping_loss_percent", clipping)
            .output("inverter_efficiency_percent", INVERTER_EFFICIENCY_PERCENT)
            .output("ac_output_current_a", ac_current)
            .output("ratio_options", ratio_table(capacity));

        out.step(format!("PV Array Capacity: {capacity} kWp"))
            .step(format!("Recommended DC:AC ratio: {RECOMMENDED_DC_AC_RATIO}"))
            .step(format!(
                "Calculated inverter size: {capacity} ÷ {RECOMMENDED_DC_AC_RATIO} = {} kW",
                fixed(calculated, 2)
            ))
            .step(if quantity > 1 {
                format!("Nearest common configuration: {quantity} × {unit_kw} kW")
            } else {
                format!("Nearest common size: {} kW", fixed(unit_kw, 2))
            })
            .step(format!(
                "Actual DC:AC ratio: {capacity} ÷ {} = {}",
                fixed(total_ac, 2),
                fixed(ratio, 2)
            ))
            .step(format!("Estimated clipping loss: {}%", fixed(clipping, 1)))
            .step(format!(
                "AC output current = {} W ÷ {} = {} A",
                fixed(total_ac * 1000.0, 0),
                if three_phase { format!("({grid_voltage}V × √3)") } else { format!("{grid_voltage}V") },
                fixed(ac_current, 1)
            ));

        let panels = inputs.number("panels_per_string");
        if let (Some(voc), Some(panels)) = (inputs.number("pv_voc_v"), panels) {
            let voc_cold = temperature_adjusted(voc, VOC_COEFFICIENT_PERCENT, COLD_EXTREME_C) * panels;
            out.output("string_voc_cold_v", voc_cold)
                .step(format!("String Voc (at -10°C): {} V", fixed(voc_cold, 1)));
        }
        if let (Some(vmp), Some(panels)) = (inputs.number("pv_vmp_v"), panels) {
            let vmp_hot = temperature_adjusted(vmp, VMP_COEFFICIENT_PERCENT, HOT_EXTREME_C) * panels;
            out.output("string_vmp_hot_v", vmp_hot)
                .step(format!("String Vmp (at +70°C): {} V", fixed(vmp_hot, 1)));
        }
        if let (Some(isc), Some(strings)) = (inputs.number("pv_isc_a"), inputs.number("number_of_strings")) {
            let total_isc = DesignCurrentPolicy::default().design_current(CircuitDuty::DcMain, isc * strings, None);
            out.output("max_input_current_a", total_isc)
                .step(format!("Total Isc (with 125% factor): {} A", fixed(total_isc, 1)));
        }

        out.assume(format!("System Type: {}", system_type.replace('_', " ")))
            .assume(format!(
                "Grid: {} phase, {grid_voltage}V",
                if three_phase { "three" } else { "single" }
            ))
            .assume(format!("Inverter Efficiency: {INVERTER_EFFICIENCY_PERCENT}%"))
            .assume("Temperature range: -10°C to +70°C")
            .assume(format!("Voc temp coefficient: {VOC_COEFFICIENT_PERCENT}%/°C"))
            .assume(format!("Vmp temp coefficient: {VMP_COEFFICIENT_PERCENT}%/°C"));

        out.insight(format!(
            "Recommended inverter: {} kW (DC:AC ratio = {})",
            fixed(total_ac, 1),
            fixed(ratio, 2)
        ))
        .insight("This provides good balance between cost savings and energy harvest")
        .insight(if clipping > 0.0 {
            format!(
                "Expect ~{}% energy loss from clipping at peak production",
                fixed(clipping, 1)
            )
        } else {
            "Minimal clipping expected with this configuration".to_owned()
        });

        if ratio > 1.3 {
            out.warn(format!(
                "DC:AC ratio of {} may result in significant clipping losses",
                fixed(ratio, 2)
            ));
        }
        if ratio < 1.0 {
            out.warn("DC:AC ratio below 1.0 means oversized inverter - higher cost with no benefit");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rounds_up_to_common_size() {
        let bag = InputBag::new().with("pv_array_capacity_kwp", 10.0);
        let result = InverterSizing.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.number("recommended_inverter_kw"), Some(10.0));
        assert_relative_eq!(result.number("dc_ac_ratio").unwrap(), 1.0);
        assert_eq!(result.number("clipping_loss_percent"), Some(0.0));
        assert_eq!(result.output("ratio_options").unwrap().as_table().unwrap().len(), 5);
    }

    #[test]
    fn string_checks_use_temperature_extremes() {
        let bag = InputBag::new()
            .with("pv_array_capacity_kwp", 6.6)
            .with("pv_voc_v", 49.5)
            .with("pv_vmp_v", 41.5)
            .with("pv_isc_a", 13.9)
            .with("panels_per_string", 12.0)
            .with("number_of_strings", 1.0);
        let result = InverterSizing.calculate(&bag);
        assert_relative_eq!(result.number("string_voc_cold_v").unwrap(), 49.5 * 12.0 * 1.1225, epsilon = 1e-9);
        assert_relative_eq!(result.number("string_vmp_hot_v").unwrap(), 41.5 * 12.0 * 0.82, epsilon = 1e-9);
        assert_relative_eq!(result.number("max_input_current_a").unwrap(), 13.9 * 1.25, epsilon = 1e-9);
        assert_eq!(result.number("recommended_inverter_kw"), Some(6.0));
    }

    #[test]
    fn large_arrays_split_across_units() {
        let bag = InputBag::new()
            .with("pv_array_capacity_kwp", 600.0)
            .with("grid_phase", "three")
            .with("grid_voltage_v", 400.0);
        let result = InverterSizing.calculate(&bag);
        let ratio = result.number("dc_ac_ratio").unwrap();
        assert!((1.0..=1.3).contains(&ratio));
        assert!(result.number("inverter_quantity").unwrap() > 1.0);
        let ac = result.number("total_ac_capacity_kw").unwrap();
        assert_relative_eq!(result.number("ac_output_current_a").unwrap(), ac * 1000.0 / (400.0 * 3f64.sqrt()), epsilon = 1e-9);
    }

    #[test]
    fn clipping_estimate_above_recommended_ratio() {
        assert_relative_eq!(clipping_loss_percent(1.3), 0.5, epsilon = 1e-12);
        assert_eq!(clipping_loss_percent(1.1), 0.0);
        assert_eq!(clipping_risk(1.25), "Medium");
    }

    #[test]
    fn grid_phase_must_be_single_or_three() {
        let bag = InputBag::new()
            .with("pv_array_capacity_kwp", 10.0)
            .with("grid_phase", "3ph");
        let result = InverterSizing.calculate(&bag);
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Grid phase must be single or three".to_string()]);
    }
}
