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
    errors::Result,
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::{MpptWindow, SiteTemperatures, StringLimits, StringModule, StringWindow},
    validation::ValidationRule,
};

const ISC_FROM_IMP: f64 = 1.1;
const MAX_VOC_FROM_MPPT_MAX: f64 = 1.2;

fn mppt_window_ordered(bag: &InputBag) -> bool {
    match (bag.number("inverter_mppt_min_v"), bag.number("inverter_mppt_max_v")) {
        (Some(min), Some(max)) => min < max,
        _ => true,
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "string_configuration",
    name: "String Configuration",
    description: "Panels per string and string count within the inverter MPPT window",
    category: Category::Technical,
    inputs: vec![
        InputField::number("panel_vmp_v", "Panel Vmp").unit("V").required(),
        InputField::number("panel_voc_v", "Panel Voc").unit("V").required(),
        InputField::number("panel_imp_a", "Panel Imp").unit("A").required(),
        InputField::number("panel_isc_a", "Panel Isc")
            .unit("A")
            .describe("Defaults to Imp × 1.1"),
        InputField::number("panel_wattage_w", "Panel Wattage").unit("Wp").required(),
        InputField::number("inverter_mppt_min_v", "MPPT Minimum Voltage").unit("V").required(),
        InputField::number("inverter_mppt_max_v", "MPPT Maximum Voltage").unit("V").required(),
        InputField::number("inverter_max_voc_v", "Inverter Max DC Voltage")
            .unit("V")
            .describe("Defaults to MPPT maximum × 1.2"),
        InputField::number("inverter_max_current_a", "Inverter Max Input Current").unit("A"),
        InputField::number("target_capacity_kw", "Target Array Capacity").unit("kWp"),
        InputField::number("min_temp_c", "Minimum Site Temperature")
            .unit("°C")
            .default_number(-10.0),
        InputField::number("max_temp_c", "Maximum Cell Temperature")
            .unit("°C")
            .default_number(70.0),
        InputField::number("voc_temp_coefficient_percent", "Voc Temperature Coefficient")
            .unit("%/°C")
            .default_number(-0.30),
    ],
    rules: vec![
        ValidationRule::required("panel_vmp_v", "Panel Vmp is required"),
        ValidationRule::positive("panel_vmp_v", "Panel Vmp must be positive"),
        ValidationRule::required("panel_voc_v", "Panel Voc is required"),
        ValidationRule::positive("panel_voc_v", "Panel Voc must be positive"),
        ValidationRule::required("panel_imp_a", "Panel Imp is required"),
        ValidationRule::positive("panel_imp_a", "Panel Imp must be positive"),
        ValidationRule::positive("panel_isc_a", "Panel Isc must be positive"),
        ValidationRule::required("panel_wattage_w", "Panel wattage is required"),
        ValidationRule::positive("panel_wattage_w", "Panel wattage must be positive"),
        ValidationRule::required("inverter_mppt_min_v", "Inverter MPPT minimum is required"),
        ValidationRule::positive("inverter_mppt_min_v", "MPPT minimum must be positive"),
        ValidationRule::required("inverter_mppt_max_v", "Inverter MPPT maximum is required"),
        ValidationRule::custom("inverter_mppt_max_v", mppt_window_ordered, "MPPT maximum must exceed MPPT minimum"),
        ValidationRule::positive("inverter_max_voc_v", "Inverter max voltage must be positive"),
        ValidationRule::positive("target_capacity_kw", "Target capacity must be positive"),
    ],
    formulas: vec![
        Formula {
            name: "Voc at Cold Temperature",
            expression: "Voc_cold = Voc × [1 + (β/100) × (T_min - 25)]",
            description: "Open-circuit voltage rises as cells cool",
            variables: &[("β", "Voc temperature coefficient (%/°C)")],
        },
        Formula {
            name: "Vmp at Hot Temperature",
            expression: "Vmp_hot = Vmp × [1 + (β/100) × (T_max - 25)]",
            description: "Operating voltage falls as cells heat",
            variables: &[],
        },
        Formula {
            name: "Maximum Panels per String",
            expression: "N_max = floor(V_max,inv / Voc_cold)",
            description: "Keeps the cold open-circuit voltage under the inverter limit",
            variables: &[],
        },
        Formula {
            name: "Minimum Panels per String",
            expression: "N_min = ceil(V_mppt,min / Vmp_hot)",
            description: "Keeps the hot operating voltage above the MPPT floor",
            variables: &[],
        },
        Formula {
            name: "Number of Strings",
            expression: "N_strings = ceil(P_target / (N × P_panel))",
            description: "Strings needed to reach the target capacity",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::number("Voc Temperature Coefficient", -0.30, "%/°C", "Typical mono PERC"),
        StandardValue::number("Design Cold Temperature", -10.0, "°C", "Site minimum"),
        StandardValue::number("Design Hot Temperature", 70.0, "°C", "Cell temperature"),
        StandardValue::number("Max Residential Voltage", 600.0, "V", "NEC 690.7"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct StringConfiguration;

impl Calculator for StringConfiguration {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let vmp = inputs.number_or("panel_vmp_v", 0.0);
        let voc = inputs.number_or("panel_voc_v", 0.0);
        let imp = inputs.number_or("panel_imp_a", 0.0);
        let isc = inputs.number_or("panel_isc_a", imp * ISC_FROM_IMP);
        let wattage = inputs.number_or("panel_wattage_w", 0.0);
        let mppt_min = inputs.number_or("inverter_mppt_min_v", 0.0);
        let mppt_max = inputs.number_or("inverter_mppt_max_v", 0.0);
        let max_voc = inputs.number_or("inverter_max_voc_v", mppt_max * MAX_VOC_FROM_MPPT_MAX);
        let min_temp = inputs.number_or("min_temp_c", -10.0);
        let max_temp = inputs.number_or("max_temp_c", 70.0);
        let coefficient = inputs.number_or("voc_temp_coefficient_percent", -0.30);

        let module = StringModule {
            voc_stc: voc,
            vmp_stc: vmp,
            voltage_coefficient_percent: coefficient,
        };
        let window = MpptWindow {
            mppt_min_v: mppt_min,
            mppt_max_v: mppt_max,
            max_dc_voltage_v: max_voc,
        };
        let temps = SiteTemperatures {
            cold_extreme_c: min_temp,
            hot_extreme_c: max_temp,
        };

        let limits = StringLimits::compute(module, window, temps)?;
        out.output("voc_cold_v", limits.voc_cold)
            .output("vmp_hot_v", limits.vmp_hot)
            .output("min_panels_per_string", limits.min_series)
            .output("max_panels_per_string", limits.max_series)
            .step(format!(
                "Voc at {min_temp}°C = {voc}V × [1 + ({coefficient}%) × ({min_temp} - 25)] = {}V",
                fixed(limits.voc_cold, 2)
            ))
            .step(format!(
                "Vmp at {max_temp}°C = {vmp}V × [1 + ({coefficient}%) × ({max_temp} - 25)] = {}V",
                fixed(limits.vmp_hot, 2)
            ))
            .step(format!(
                "Max panels/string = floor({max_voc}V ÷ {}V) = {} panels",
                fixed(limits.voc_cold, 2),
                limits.max_series
            ))
            .step(format!(
                "Min panels/string = ceil({mppt_min}V ÷ {}V) = {} panels",
                fixed(limits.vmp_hot, 2),
                limits.min_series
            ));

        let solved = StringWindow::within(&limits, module, window)?;
        let panels = solved.preferred_series;
        let n = f64::from(panels);
        let string_voc_cold = n * solved.voc_cold;
        let string_vmp_stc = n * vmp;
        let string_vmp_hot = n * solved.vmp_hot;

        let target = inputs.number("target_capacity_kw");
        let strings = match target {
            Some(target) => ((target * 1000.0) / (n * wattage)).ceil().max(1.0) as u32,
            None => 1,
        };
        let total_panels = strings * panels;
        let total_capacity = f64::from(total_panels) * wattage / 1000.0;
        let total_current = f64::from(strings) * isc;

        let voc_ok = string_voc_cold < max_voc;
        let vmp_min_ok = string_vmp_hot > mppt_min;
        let vmp_max_ok = string_vmp_stc < mppt_max;
        let max_current = inputs.number("inverter_max_current_a");
        let current_ok = max_current.map_or(true, |limit| isc <= limit);
        let voc_margin = (max_voc - string_voc_cold) / max_voc * 100.0;
        let vmp_min_margin = (string_vmp_hot - mppt_min) / mppt_min * 100.0;

        out.output("optimal_panels_per_string", panels)
            .output("string_voc_cold_v", string_voc_cold)
            .output("string_vmp_stc_v", string_vmp_stc)
            .output("string_vmp_hot_v", string_vmp_hot)
            .output("string_isc_a", isc)
            .output("number_of_strings", strings)
            .output("total_panels", total_panels)
            .output("total_capacity_kwp", total_capacity)
            .output("total_current_a", total_current)
            .output("voc_margin_percent", voc_margin)
            .output("vmp_min_margin_percent", vmp_min_margin)
            .output("voc_check", voc_ok)
            .output("vmp_min_check", vmp_min_ok)
            .output("vmp_max_check", vmp_max_ok)
            .output("current_check", current_ok);

        out.step(format!("Optimal panels/string = {panels} (within MPPT range)"))
            .step(format!(
                "String Voc (cold) = {panels} × {}V = {}V",
                fixed(solved.voc_cold, 2),
                fixed(string_voc_cold, 1)
            ))
            .step(format!(
                "String Vmp (hot) = {panels} × {}V = {}V",
                fixed(solved.vmp_hot, 2),
                fixed(string_vmp_hot, 1)
            ));
        if let Some(target) = target {
            out.step(format!(
                "Strings needed = ceil({target}kW × 1000 ÷ ({panels} × {wattage}W)) = {strings}"
            ))
            .step(format!(
                "Total capacity = {total_panels} × {wattage}W = {} kWp",
                fixed(total_capacity, 2)
            ));
        }

        out.assume(format!("Min Temperature: {min_temp}°C"))
            .assume(format!("Max Cell Temperature: {max_temp}°C"))
            .assume(format!("Voc Temperature Coefficient: {coefficient}%/°C"))
            .assume(format!("Panel Isc: {}A", fixed(isc, 1)));

        out.insight(format!(
            "Recommended: {panels} panels per string (range: {}-{})",
            solved.min_series, solved.max_series
        ))
        .insight(format!(
            "String voltage at cold: {}V ({}% margin to max)",
            fixed(string_voc_cold, 1),
            fixed(voc_margin, 1)
        ))
        .insight(format!(
            "String voltage at hot: {}V ({}% margin above MPPT min)",
            fixed(string_vmp_hot, 1),
            fixed(vmp_min_margin, 1)
        ));
        if target.is_some() {
            out.insight(format!(
                "Configuration: {strings} strings × {panels} panels = {total_panels} panels ({} kWp)",
                fixed(total_capacity, 2)
            ));
        }

        if !voc_ok {
            out.warn(format!(
                "String Voc at cold ({}V) reaches inverter max ({max_voc}V). Reduce panels per string.",
                fixed(string_voc_cold, 1)
            ));
        }
        if !vmp_min_ok {
            out.warn(format!(
                "String Vmp at hot ({}V) at or below MPPT min ({mppt_min}V). Add more panels.",
                fixed(string_vmp_hot, 1)
            ));
        }
        if !vmp_max_ok {
            out.warn(format!(
                "String Vmp at STC ({}V) exceeds MPPT max ({mppt_max}V)",
                fixed(string_vmp_stc, 1)
            ));
        }
        if let Some(limit) = max_current.filter(|_| !current_ok) {
            out.warn(format!(
                "String Isc ({}A) may exceed inverter max current ({limit}A).",
                fixed(isc, 1)
            ));
        }
        Ok(())
    }
}
