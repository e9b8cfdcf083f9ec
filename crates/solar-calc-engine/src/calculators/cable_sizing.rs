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
    cable::{
        select_cable, BurialConditions, CableMaterial, CableRequest, CableTable, CircuitDuty,
        CircuitType, Derating, DesignCurrentPolicy, Installation, AC_SKIN_EFFECT_FACTOR,
        CIRCUIT_NAMES, INSTALLATION_NAMES, K_REFERENCE_TEMP_C, MATERIAL_NAMES,
    },
    calculator::Calculator,
    errors::Result,
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

fn is_buried(bag: &InputBag) -> bool {
    Installation::parse(bag.text_or("installation", "conduit")).is_ok_and(|method| method.is_buried())
}

// The K2 soil factor needs the soil cooler than the conductor rating.
fn soil_below_rating(bag: &InputBag) -> bool {
    !is_buried(bag) || bag.number_or("soil_temp_c", 20.0) < bag.number_or("conductor_max_temp_c", 90.0)
}

fn rating_above_reference(bag: &InputBag) -> bool {
    !is_buried(bag) || bag.number_or("conductor_max_temp_c", 90.0) > K_REFERENCE_TEMP_C
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "cable_sizing",
    name: "Cable Sizing",
    description: "Select a standard cable cross-section from voltage drop and derated ampacity",
    category: Category::Technical,
    inputs: vec![
        InputField::number("current_a", "Design Current")
            .unit("A")
            .required()
            .describe("Current the cable must carry"),
        InputField::number("voltage_v", "System Voltage").unit("V").required(),
        InputField::number("length_m", "Cable Length")
            .unit("m")
            .required()
            .describe("One-way run length"),
        InputField::number("max_voltage_drop_percent", "Maximum Voltage Drop")
            .unit("%")
            .default_number(3.0)
            .bounds(0.5, 10.0),
        InputField::choice("material", "Conductor Material", &["copper", "aluminium"])
            .default_text("copper"),
        InputField::choice("installation", "Installation Method", INSTALLATION_NAMES)
            .default_text("conduit"),
        InputField::choice("circuit", "Circuit Type", CIRCUIT_NAMES).default_text("dc"),
        InputField::number("ambient_temp_c", "Ambient Temperature")
            .unit("°C")
            .default_number(30.0),
        InputField::number("design_current_factor", "Design Current Factor")
            .default_number(1.0)
            .describe("Safety multiplier applied to the supplied current"),
        InputField::number("parallel_runs", "Parallel Runs").default_number(1.0).at_least(1.0),
        InputField::number("ac_resistance_factor", "AC Resistance Factor")
            .describe("Skin-effect multiplier; 1.1 for AC circuits and 1.0 for DC unless given"),
        InputField::number("reference_power_kw", "Reference Power")
            .unit("kW")
            .describe("Power the loss percentage is expressed against"),
        InputField::number("burial_depth_m", "Burial Depth").unit("m").default_number(0.7),
        InputField::number("soil_temp_c", "Soil Temperature").unit("°C").default_number(20.0),
        InputField::number("soil_resistivity", "Soil Thermal Resistivity")
            .unit("K·m/W")
            .default_number(1.5),
        InputField::number("conductor_max_temp_c", "Conductor Rating")
            .unit("°C")
            .default_number(90.0),
    ],
    rules: vec![
        ValidationRule::required("current_a", "Current is required"),
        ValidationRule::positive("current_a", "Current must be positive"),
        ValidationRule::required("voltage_v", "Voltage is required"),
        ValidationRule::positive("voltage_v", "Voltage must be positive"),
        ValidationRule::required("length_m", "Cable length is required"),
        ValidationRule::positive("length_m", "Cable length must be positive"),
        ValidationRule::range("max_voltage_drop_percent", 0.5, 10.0, "Voltage drop should be 0.5-10%"),
        ValidationRule::positive("design_current_factor", "Design current factor must be positive"),
        ValidationRule::min("parallel_runs", 1.0, "At least one cable run is required"),
        ValidationRule::positive("ac_resistance_factor", "AC resistance factor must be positive"),
        ValidationRule::positive("soil_resistivity", "Soil thermal resistivity must be positive"),
        ValidationRule::positive("burial_depth_m", "Burial depth must be positive"),
        ValidationRule::one_of("material", MATERIAL_NAMES, "Conductor material must be copper or aluminium"),
        ValidationRule::one_of(
            "installation",
            INSTALLATION_NAMES,
            "Installation must be conduit, cable_tray, free_air, direct_burial or underground",
        ),
        ValidationRule::one_of(
            "circuit",
            CIRCUIT_NAMES,
            "Circuit must be dc, single_phase_ac or three_phase_ac",
        ),
        ValidationRule::custom(
            "soil_temp_c",
            soil_below_rating,
            "Soil temperature must be below the conductor rating",
        ),
        ValidationRule::custom(
            "conductor_max_temp_c",
            rating_above_reference,
            "Conductor rating must exceed 20°C",
        ),
    ],
    formulas: vec![
        Formula {
            name: "Cable Cross-Section",
            expression: "A = (k × L × I × ρ) / (ΔV% × V) × 100",
            description: "Minimum area from the voltage-drop ceiling",
            variables: &[
                ("k", "2 for DC/single-phase, √3 for three-phase"),
                ("L", "One-way length (m)"),
                ("I", "Design current (A)"),
                ("ρ", "Resistivity (Ω·mm²/m)"),
            ],
        },
        Formula {
            name: "Derated Ampacity",
            expression: "I_z = I_base × K_total × N_runs",
            description: "Table ampacity after installation corrections",
            variables: &[("K_total", "Ambient factor or K1 × K2 × K3 × K4 when buried")],
        },
        Formula {
            name: "K2 Soil Temperature",
            expression: "K2 = √((θ_max − θ_soil) / (θ_max − 20))",
            description: "Correction for ground temperature",
            variables: &[],
        },
        Formula {
            name: "K3 Soil Resistivity",
            expression: "K3 = √(1.5 / ρ_soil)",
            description: "Correction for soil thermal resistivity",
            variables: &[],
        },
        Formula {
            name: "Power Loss",
            expression: "P_loss = n × I² × R / N_runs, R = ρ × L / A × f_ac",
            description: "Conductor heating loss",
            variables: &[("n", "Loaded conductors"), ("f_ac", "AC resistance factor")],
        },
    ],
    standards: vec![
        StandardValue::number("Copper Resistivity", 0.0175, "Ω·mm²/m", "IEC 60228"),
        StandardValue::number("Aluminium Resistivity", 0.0282, "Ω·mm²/m", "IEC 60228"),
        StandardValue::number("Max Voltage Drop", 3.0, "%", "IEC 60364-5-52"),
        StandardValue::number("K4 Trefoil Grouping", 0.85, "", "IEC 60287"),
        StandardValue::number("AC Skin-Effect Factor", AC_SKIN_EFFECT_FACTOR, "", "Design Practice"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct CableSizing;

impl Calculator for CableSizing {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let nameplate = inputs.number_or("current_a", 0.0);
        let voltage = inputs.number_or("voltage_v", 0.0);
        let length = inputs.number_or("length_m", 0.0);
        let drop_limit = inputs.fraction_or("max_voltage_drop_percent", 3.0);
        let material = CableMaterial::parse(inputs.text_or("material", "copper"))?;
        let installation = Installation::parse(inputs.text_or("installation", "conduit"))?;
        let circuit = CircuitType::parse(inputs.text_or("circuit", "dc"))?;
        let ambient = inputs.number_or("ambient_temp_c", 30.0);
        let runs = inputs.number_or("parallel_runs", 1.0).round().max(1.0) as u32;
        let resistance_factor = inputs.number("ac_resistance_factor").unwrap_or(match circuit {
            CircuitType::Dc => 1.0,
            _ => AC_SKIN_EFFECT_FACTOR,
        });

        let design_current = DesignCurrentPolicy::default().design_current(
            CircuitDuty::AsSupplied,
            nameplate,
            inputs.number("design_current_factor"),
        );
        out.step(format!(
            "Design current = {nameplate} A × {} = {} A",
            fixed(design_current / nameplate, 2),
            fixed(design_current, 2)
        ));

        let derating = if installation.is_buried() {
            Derating::Buried(BurialConditions {
                depth_m: inputs.number_or("burial_depth_m", 0.7),
                soil_temp_c: inputs.number_or("soil_temp_c", 20.0),
                soil_resistivity_km_w: inputs.number_or("soil_resistivity", 1.5),
                conductor_max_temp_c: inputs.number_or("conductor_max_temp_c", 90.0),
            })
        } else {
            Derating::Ambient {
                temperature_c: ambient,
            }
        };

        let request = CableRequest {
            material,
            circuit,
            table: CableTable::Conduit,
            derating,
            parallel_runs: runs,
            resistance_factor,
            ..CableRequest::new(design_current, voltage, length, drop_limit)
        };
        let selection = select_cable(&request)?;
        let mut evaluation = selection.evaluation.clone();
        if let Some(reference) = inputs.number("reference_power_kw").filter(|kw| *kw > 0.0) {
            evaluation.power_loss_percent = evaluation.power_loss_kw / reference * 100.0;
        }

        let k = circuit.drop_factor();
        let rho = material.resistivity();
        out.step(format!("Resistivity ({}): {rho} Ω·mm²/m", material.label()))
            .step(format!("Circuit factor: {} ({})", fixed(k, 3), circuit.label()))
            .step(format!(
                "Min cable size = ({} × {length} × {} × {rho} × {resistance_factor}) ÷ ({} × {voltage}) × 100 ÷ {runs} run(s) = {} mm²",
                fixed(k, 3),
                fixed(design_current, 2),
                fixed(drop_limit, 3),
                fixed(selection.minimum_size_mm2, 3)
            ))
            .step(format!("Selected standard size: {} mm²", selection.size_mm2))
            .step(format!(
                "Actual voltage drop = {} × {} × {} Ω ÷ {runs} = {} V ({}%)",
                fixed(k, 3),
                fixed(design_current, 2),
                fixed(evaluation.resistance_ohm, 5),
                fixed(evaluation.voltage_drop_v, 3),
                fixed(evaluation.voltage_drop_percent, 3)
            ));

        if let Some(factors) = selection.k_factors {
            out.step(format!(
                "K-factors: K1 {} × K2 {} × K3 {} × K4 {} = {}",
                fixed(factors.k1, 3),
                fixed(factors.k2, 3),
                fixed(factors.k3, 3),
                fixed(factors.k4, 3),
                fixed(factors.total, 3)
            ));
            out.output("k1_depth", factors.k1)
                .output("k2_soil_temperature", factors.k2)
                .output("k3_soil_resistivity", factors.k3)
                .output("k4_grouping", factors.k4);
        } else {
            out.step(format!(
                "Temperature derating at {ambient}°C: {}",
                selection.derating_factor
            ));
        }
        out.step(format!(
            "Derated ampacity: {} × {} × {runs} = {} A",
            fixed(selection.base_ampacity_a, 1),
            fixed(selection.derating_factor, 3),
            fixed(evaluation.derated_ampacity_a, 1)
        ))
        .step(format!(
            "Power loss = {} × {}² × {} Ω ÷ {runs} = {} kW ({}%)",
            circuit.loss_conductors(),
            fixed(design_current, 2),
            fixed(evaluation.resistance_ohm, 5),
            fixed(evaluation.power_loss_kw, 4),
            fixed(evaluation.power_loss_percent, 3)
        ));

        let margin = selection.safety_margin_percent(design_current);
        out.output("design_current_a", design_current)
            .output("minimum_size_mm2", selection.minimum_size_mm2)
            .output("recommended_size_mm2", selection.size_mm2)
            .output("parallel_runs", runs)
            .output("voltage_drop_percent", evaluation.voltage_drop_percent)
            .output("voltage_drop_v", evaluation.voltage_drop_v)
            .output("base_ampacity_a", selection.base_ampacity_a)
            .output("derating_factor", selection.derating_factor)
            .output("derated_ampacity_a", evaluation.derated_ampacity_a)
            .output("safety_margin_percent", margin)
            .output("power_loss_kw", evaluation.power_loss_kw)
            .output("power_loss_percent", evaluation.power_loss_percent)
            .output("ampacity_ok", evaluation.ampacity_ok)
            .output("voltage_drop_ok", evaluation.voltage_drop_ok);

        out.assume(format!("Cable material: {}", material.label()))
            .assume(format!("Resistivity: {rho} Ω·mm²/m at 20°C"))
            .assume(format!("AC resistance factor: {resistance_factor}"));
        if installation.is_buried() {
            out.assume("Buried cables laid in trefoil (K4 = 0.85)");
        } else {
            out.assume(format!("Ambient temperature: {ambient}°C"));
        }

        out.insight(format!(
            "Recommended cable size: {} mm² {}{}",
            selection.size_mm2,
            material.label(),
            if runs > 1 { format!(" × {runs} runs") } else { String::new() }
        ))
        .insight(format!(
            "Actual voltage drop ({}%) is {} the {}% limit",
            fixed(evaluation.voltage_drop_percent, 2),
            if evaluation.voltage_drop_ok { "within" } else { "EXCEEDS" },
            fixed(drop_limit * 100.0, 1)
        ));
        if evaluation.ampacity_ok {
            out.insight(format!("Cable has {}% current capacity margin", fixed(margin, 0)));
        }

        if selection.beyond_catalog {
            out.warn(format!(
                "Required cross-section {} mm² exceeds the largest standard size; add parallel runs",
                fixed(selection.minimum_size_mm2, 1)
            ));
        }
        for reason in &evaluation.reasons {
            out.warn(reason.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario() -> InputBag {
        InputBag::new()
            .with("current_a", 30.0)
            .with("voltage_v", 400.0)
            .with("length_m", 50.0)
            .with("max_voltage_drop_percent", 3.0)
    }

    #[test]
    fn copper_feeder_rounds_up_to_six_square_mm() {
        let result = CableSizing.calculate(&scenario());
        assert!(result.success);
        assert_relative_eq!(result.number("minimum_size_mm2").unwrap(), 4.375, epsilon = 1e-9);
        assert_eq!(result.number("recommended_size_mm2"), Some(6.0));
        assert_relative_eq!(result.number("voltage_drop_percent").unwrap(), 2.1875, epsilon = 1e-9);
        assert_eq!(result.flag("voltage_drop_ok"), Some(true));
        assert!(result.warnings.is_none());
    }

    #[test]
    fn design_current_factor_is_an_input() {
        let result = CableSizing.calculate(&scenario().with("design_current_factor", 1.25));
        assert_relative_eq!(result.number("design_current_a").unwrap(), 37.5);
        assert!(result.number("minimum_size_mm2").unwrap() > 4.375);
    }

    #[test]
    fn buried_run_reports_k_factors() {
        let bag = scenario()
            .with("installation", "direct_burial")
            .with("circuit", "three_phase_ac")
            .with("soil_temp_c", 30.0);
        let result = CableSizing.calculate(&bag);
        assert!(result.success);
        let total = ["k1_depth", "k2_soil_temperature", "k3_soil_resistivity", "k4_grouping"]
            .iter()
            .map(|name| result.number(name).unwrap())
            .product::<f64>();
        assert_relative_eq!(result.number("derating_factor").unwrap(), total, epsilon = 1e-12);
    }

    #[test]
    fn undersized_catalogue_is_a_warning_not_a_failure() {
        let bag = InputBag::new()
            .with("current_a", 900.0)
            .with("voltage_v", 230.0)
            .with("length_m", 400.0);
        let result = CableSizing.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.number("recommended_size_mm2"), Some(300.0));
        assert!(result.has_warning_containing("exceeds the largest standard size"));
        assert!(result.has_warning_containing("exceeds derated ampacity"));
    }

    #[test]
    fn soil_hotter_than_rating_fails() {
        let bag = scenario()
            .with("installation", "underground")
            .with("soil_temp_c", 95.0);
        let result = CableSizing.calculate(&bag);
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["Soil temperature must be below the conductor rating".to_string()]
        );
    }

    #[test]
    fn soil_temperature_is_checked_before_compute() {
        let hot = scenario()
            .with("installation", "underground")
            .with("soil_temp_c", 95.0);
        assert!(!CableSizing.validate(&hot).valid);

        let at_rating = scenario()
            .with("installation", "direct_burial")
            .with("soil_temp_c", 70.0)
            .with("conductor_max_temp_c", 70.0);
        assert!(!CableSizing.validate(&at_rating).valid);

        let cold_rating = scenario()
            .with("installation", "direct_burial")
            .with("soil_temp_c", 10.0)
            .with("conductor_max_temp_c", 15.0);
        assert_eq!(
            CableSizing.validate(&cold_rating).errors,
            vec!["Conductor rating must exceed 20°C".to_string()]
        );

        // soil inputs only matter for buried runs
        let in_air = scenario().with("installation", "free_air").with("soil_temp_c", 95.0);
        assert!(CableSizing.validate(&in_air).valid);
        assert!(CableSizing.calculate(&in_air).success);
    }

    #[test]
    fn unknown_choice_values_are_rejected() {
        let typo = scenario().with("circuit", "three-phase").with("material", "alu");
        let result = CableSizing.calculate(&typo);
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![
                "Conductor material must be copper or aluminium".to_string(),
                "Circuit must be dc, single_phase_ac or three_phase_ac".to_string(),
            ]
        );
        assert!(!CableSizing.validate(&scenario().with("installation", "buried")).valid);
        assert!(CableSizing.validate(&scenario().with("material", "aluminum")).valid);
    }

    #[test]
    fn negative_current_is_rejected() {
        let result = CableSizing.calculate(&scenario().with("current_a", -5.0));
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Current must be positive".to_string()]);
    }
}
