//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Earth conductor sizing by the adiabatic equation and rod electrode resistance.

use std::f64::consts::PI;

use once_cell::sync::Lazy;

use crate::{
    calculator::Calculator,
    errors::{CalcEngineError, Result},
    model::{row, InputBag, OutputRow},
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

pub const ROD_LENGTH_M: f64 = 3.0;
pub const ROD_DIAMETER_M: f64 = 0.016;
/// Multiplying factors for 1..=7 parallel rods spaced one rod length apart.
pub const PARALLEL_FACTORS: [f64; 7] = [1.0, 1.16, 1.29, 1.36, 1.41, 1.45, 1.48];
/// Prospective fault current per kWp when none is given.
const ESTIMATED_FAULT_KA_PER_KWP: f64 = 0.05;
const LARGE_CONDUCTOR_MM2: f64 = 120.0;
const HIGH_RESISTIVITY_OHM_M: f64 = 500.0;

const CONDUCTOR_NAMES: &[&str] =
    &["copper", "galvanized_steel", "gs", "copper_clad", "copper_clad_steel"];
const ELECTRODE_NAMES: &[&str] = &["rod", "plate", "strip", "ring"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarthConductor {
    Copper,
    GalvanizedSteel,
    CopperCladSteel,
}

impl EarthConductor {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "copper" => Ok(EarthConductor::Copper),
            "galvanized_steel" | "gs" => Ok(EarthConductor::GalvanizedSteel),
            "copper_clad" | "copper_clad_steel" => Ok(EarthConductor::CopperCladSteel),
            other => Err(CalcEngineError::invalid_input(
                "conductor_material",
                format!("unknown earth conductor '{other}'"),
            )),
        }
    }

    /// Adiabatic material constant for a 0.1–5 s fault.
    pub fn k_factor(&self) -> f64 {
        match self {
            EarthConductor::Copper => 143.0,
            EarthConductor::GalvanizedSteel => 52.0,
            EarthConductor::CopperCladSteel => 100.0,
        }
    }

    pub fn minimum_size_mm2(&self) -> f64 {
        match self {
            EarthConductor::Copper => 6.0,
            EarthConductor::GalvanizedSteel => 50.0,
            EarthConductor::CopperCladSteel => 16.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EarthConductor::Copper => "copper",
            EarthConductor::GalvanizedSteel => "galvanized steel",
            EarthConductor::CopperCladSteel => "copper clad steel",
        }
    }
}

/// `R = ρ / (2πL) × [ln(4L/d) − 1]`
pub fn rod_resistance(soil_resistivity_ohm_m: f64, length_m: f64, diameter_m: f64) -> f64 {
    soil_resistivity_ohm_m / (2.0 * PI * length_m) * ((4.0 * length_m / diameter_m).ln() - 1.0)
}

/// Combined resistance of `rods` parallel rods; counts beyond the factor table are clamped.
pub fn parallel_rods(single_ohm: f64, rods: usize) -> f64 {
    if rods == 0 {
        return single_ohm;
    }
    let rods = rods.min(PARALLEL_FACTORS.len());
    single_ohm / rods as f64 * PARALLEL_FACTORS[rods - 1]
}

pub fn soil_class(resistivity_ohm_m: f64) -> &'static str {
    if resistivity_ohm_m < 50.0 {
        "wet clay/loam"
    } else if resistivity_ohm_m < 200.0 {
        "normal soil"
    } else if resistivity_ohm_m < 500.0 {
        "dry soil"
    } else {
        "rocky/sandy"
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "earthing_sizing",
    name: "Earthing/Grounding Sizing",
    description: "Earthing conductor and electrode sizing for PV systems",
    category: Category::Technical,
    inputs: vec![
        InputField::number("system_capacity_kwp", "System Capacity")
            .unit("kWp")
            .required()
            .at_least(0.0),
        InputField::number("fault_current_ka", "Prospective Fault Current")
            .unit("kA")
            .describe("Estimated from capacity when not given"),
        InputField::number("fault_duration_s", "Disconnection Time")
            .unit("s")
            .default_number(0.4)
            .bounds(0.1, 5.0),
        InputField::number("soil_resistivity_ohm_m", "Soil Resistivity")
            .unit("Ω·m")
            .default_number(100.0)
            .bounds(1.0, 10_000.0),
        InputField::number("target_resistance_ohm", "Target Earth Resistance")
            .unit("Ω")
            .default_number(10.0)
            .bounds(1.0, 100.0),
        InputField::choice(
            "conductor_material",
            "Conductor Material",
            &["copper", "galvanized_steel", "copper_clad"],
        )
        .default_text("copper"),
        InputField::choice("electrode_type", "Electrode Type", ELECTRODE_NAMES)
            .default_text("rod"),
        InputField::number("number_of_inverters", "Number of Inverters")
            .default_number(1.0)
            .at_least(1.0),
    ],
    rules: vec![
        ValidationRule::required("system_capacity_kwp", "System capacity is required"),
        ValidationRule::positive("system_capacity_kwp", "System capacity must be positive"),
        ValidationRule::positive("fault_current_ka", "Fault current must be positive"),
        ValidationRule::range("fault_duration_s", 0.1, 5.0, "Disconnection time should be 0.1-5 s"),
        ValidationRule::range("soil_resistivity_ohm_m", 1.0, 10_000.0, "Soil resistivity should be 1-10000 Ω·m"),
        ValidationRule::range("target_resistance_ohm", 1.0, 100.0, "Target resistance should be 1-100 Ω"),
        ValidationRule::min("number_of_inverters", 1.0, "At least one inverter is required"),
        ValidationRule::one_of(
            "conductor_material",
            CONDUCTOR_NAMES,
            "Conductor material must be copper, galvanized_steel or copper_clad",
        ),
        ValidationRule::one_of("electrode_type", ELECTRODE_NAMES, "Electrode type must be rod, plate, strip or ring"),
    ],
    formulas: vec![
        Formula {
            name: "Earth Conductor Size (Adiabatic)",
            expression: "A = I × √t / k",
            description: "Minimum earth conductor cross-section",
            variables: &[("I", "Fault current (A)"), ("t", "Disconnection time (s)"), ("k", "Material factor (Cu 143, GS 52)")],
        },
        Formula {
            name: "Rod Electrode Resistance",
            expression: "R = ρ / (2πL) × [ln(4L/d) - 1]",
            description: "Resistance of a single vertical rod",
            variables: &[("ρ", "Soil resistivity (Ω·m)"), ("L", "Rod length (m)"), ("d", "Rod diameter (m)")],
        },
        Formula {
            name: "Parallel Rods Resistance",
            expression: "R_total = R_single / n × F",
            description: "Combined resistance of parallel rods",
            variables: &[("F", "Spacing factor")],
        },
    ],
    standards: vec![
        StandardValue::number("Copper k-factor", 143.0, "", "IEC 60364-5-54"),
        StandardValue::number("Steel k-factor", 52.0, "", "IEC 60364-5-54"),
        StandardValue::number("Min Earth Conductor (Cu)", 6.0, "mm²", "IEC 60364-5-54"),
        StandardValue::number("Min Earth Conductor (GS)", 50.0, "mm²", "IEC 60364-5-54"),
        StandardValue::number("Max Earth Resistance", 10.0, "Ω", "IEC 62305"),
        StandardValue::number("Rod Diameter", 16.0, "mm", "Standard practice"),
        StandardValue::number("Rod Length", ROD_LENGTH_M, "m", "Standard practice"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct EarthingSizing;

fn rod_options(single_ohm: f64, target_ohm: f64) -> Vec<OutputRow> {
    (1..=5)
        .map(|rods| {
            let resistance = parallel_rods(single_ohm, rods);
            row([
                ("rods", (rods as u32).into()),
                ("resistance_ohm", resistance.into()),
                ("meets_target", (resistance <= target_ohm).into()),
            ])
        })
        .collect()
}

impl Calculator for EarthingSizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let capacity = inputs.number_or("system_capacity_kwp", 0.0);
        let given_fault = inputs.number("fault_current_ka");
        let fault_a = given_fault.unwrap_or(capacity * ESTIMATED_FAULT_KA_PER_KWP) * 1000.0;
        let duration = inputs.number_or("fault_duration_s", 0.4);
        let resistivity = inputs.number_or("soil_resistivity_ohm_m", 100.0);
        let target = inputs.number_or("target_resistance_ohm", 10.0);
        let material = EarthConductor::parse(inputs.text_or("conductor_material", "copper"))?;
        let electrode = inputs.text_or("electrode_type", "rod");
        let inverters = inputs.number_or("number_of_inverters", 1.0).round().max(1.0) as u32;

        let adiabatic = fault_a * duration.sqrt() / material.k_factor();
        let main_earth = material.minimum_size_mm2().max((adiabatic / 5.0).ceil() * 5.0);
        let bonding = if material == EarthConductor::Copper { 4.0 } else { 16.0 };
        let pe_floor: f64 = if material == EarthConductor::Copper { 2.5 } else { 10.0 };
        let protective_earth = pe_floor.max(main_earth / 2.0);

        let single = rod_resistance(resistivity, ROD_LENGTH_M, ROD_DIAMETER_M);
        let mut rods = 1;
        let mut resistance = single;
        while resistance > target && rods < PARALLEL_FACTORS.len() {
            rods += 1;
            resistance = parallel_rods(single, rods);
        }
        let resistance_ok = resistance <= target;
        let soil = soil_class(resistivity);

        out.output("fault_current_a", fault_a)
            .output("adiabatic_size_mm2", adiabatic)
            .output("main_earth_size_mm2", main_earth)
            .output("equipment_bond_size_mm2", bonding)
            .output("protective_earth_size_mm2", protective_earth)
            .output("bonding_conductors", inverters)
            .output("single_rod_resistance_ohm", single)
            .output("rods_needed", rods as u32)
            .output("final_resistance_ohm", resistance)
            .output("rod_spacing_m", ROD_LENGTH_M)
            .output("rod_options", rod_options(single, target))
            .output("earth_resistance_ok", resistance_ok)
            .output("soil_type", soil);

        out.step(format!(
            "Conductor size = {}A × √{duration}s ÷ {} = {} mm²",
            fixed(fault_a, 0),
            material.k_factor(),
            fixed(adiabatic, 1)
        ))
        .step(format!(
            "Main earth conductor: {main_earth} mm² {} (min {} mm²)",
            material.label(),
            material.minimum_size_mm2()
        ))
        .step(format!(
            "Single rod resistance = {resistivity} ÷ (2π×{ROD_LENGTH_M}) × [ln(4×{ROD_LENGTH_M}/{ROD_DIAMETER_M}) - 1] = {} Ω",
            fixed(single, 1)
        ))
        .step(format!("Target: {target} Ω → {rods} rod(s) needed"))
        .step(format!("Final resistance: {} Ω", fixed(resistance, 1)));

        out.assume(format!(
            "Fault current: {} kA{}",
            fixed(fault_a / 1000.0, 1),
            if given_fault.is_some() { "" } else { " (estimated)" }
        ))
        .assume(format!("Disconnection time: {duration}s"))
        .assume(format!("Soil resistivity: {resistivity} Ω·m"))
        .assume(format!(
            "Rod dimensions: {ROD_LENGTH_M}m × {}mm",
            ROD_DIAMETER_M * 1000.0
        ))
        .assume(format!("Conductor material: {}", material.label()))
        .assume(format!("Electrode type: {electrode}"));

        out.insight(format!("Main earth conductor: {main_earth} mm² {}", material.label()))
            .insight(format!(
                "Earth electrode: {rods} rod(s) of {ROD_LENGTH_M}m × {}mm, spaced {ROD_LENGTH_M}m apart",
                ROD_DIAMETER_M * 1000.0
            ))
            .insight(format!(
                "Expected earth resistance: {} Ω ({} {target} Ω target)",
                fixed(resistance, 1),
                if resistance_ok { "meets" } else { "exceeds" }
            ))
            .insight(format!("Soil condition: {soil} ({resistivity} Ω·m)"))
            .insight(format!(
                "Bond each of the {inverters} inverter(s) with {bonding} mm² equipment bonding conductor"
            ));

        if !resistance_ok {
            out.warn(format!(
                "Cannot achieve {target} Ω with {rods} rods. Consider: longer rods, soil treatment, or ring electrode."
            ));
        }
        if resistivity > HIGH_RESISTIVITY_OHM_M {
            out.warn(format!(
                "High soil resistivity ({resistivity} Ω·m). Consider soil treatment or alternative electrode types."
            ));
        }
        if adiabatic > LARGE_CONDUCTOR_MM2 {
            out.warn("Large conductor size required. Verify fault current calculation and consider parallel conductors.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn adiabatic_size_rounds_to_five() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 100.0)
            .with("fault_current_ka", 10.0);
        let result = EarthingSizing.calculate(&bag);
        assert!(result.success);
        assert_relative_eq!(result.number("adiabatic_size_mm2").unwrap(), 10_000.0 * 0.4f64.sqrt() / 143.0, epsilon = 1e-9);
        assert_eq!(result.number("main_earth_size_mm2"), Some(45.0));
        assert_eq!(result.number("protective_earth_size_mm2"), Some(22.5));
    }

    #[test]
    fn rods_added_until_target_met() {
        let single = rod_resistance(100.0, ROD_LENGTH_M, ROD_DIAMETER_M);
        assert_relative_eq!(single, 29.82, epsilon = 0.01);
        let bag = InputBag::new().with("system_capacity_kwp", 20.0);
        let result = EarthingSizing.calculate(&bag);
        // four rods give 10.1 Ω, five give 8.4 Ω
        assert_eq!(result.number("rods_needed"), Some(5.0));
        assert_eq!(result.flag("earth_resistance_ok"), Some(true));
        assert_eq!(result.text("soil_type"), Some("normal soil"));
    }

    #[test]
    fn rocky_soil_caps_at_seven_rods() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 20.0)
            .with("soil_resistivity_ohm_m", 2_000.0)
            .with("target_resistance_ohm", 5.0);
        let result = EarthingSizing.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.number("rods_needed"), Some(7.0));
        assert_eq!(result.flag("earth_resistance_ok"), Some(false));
        assert!(result.has_warning_containing("Cannot achieve"));
        assert!(result.has_warning_containing("High soil resistivity"));
    }

    #[test]
    fn steel_conductors_have_larger_floor() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("conductor_material", "galvanized_steel");
        let result = EarthingSizing.calculate(&bag);
        assert_eq!(result.number("main_earth_size_mm2"), Some(50.0));
        assert_eq!(result.number("equipment_bond_size_mm2"), Some(16.0));
        assert_eq!(result.number("protective_earth_size_mm2"), Some(25.0));
    }

    #[test]
    fn protective_earth_respects_material_floor() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("conductor_material", "copper_clad");
        let result = EarthingSizing.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.number("main_earth_size_mm2"), Some(16.0));
        // half the main earth is 8 mm², below the 10 mm² non-copper floor
        assert_eq!(result.number("protective_earth_size_mm2"), Some(10.0));
    }

    #[test]
    fn unknown_conductor_material_is_rejected() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("conductor_material", "brass");
        let report = EarthingSizing.validate(&bag);
        assert!(!report.valid);
        assert!(report.errors[0].starts_with("Conductor material must be"));
        assert!(EarthConductor::parse("brass").is_err());
        assert_eq!(EarthConductor::parse("gs").unwrap(), EarthConductor::GalvanizedSteel);
    }
}
