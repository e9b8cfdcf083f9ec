//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Cable derating, voltage-drop and power-loss model with standard-size selection.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{CalcEngineError, Result};

/// Standard LV cross-sections in mm², ascending.
pub const STANDARD_SIZES_MM2: [f64; 16] = [
    1.5, 2.5, 4.0, 6.0, 10.0, 16.0, 25.0, 35.0, 50.0, 70.0, 95.0, 120.0, 150.0, 185.0, 240.0,
    300.0,
];

/// Copper in conduit at 30 °C ambient.
const CONDUIT_AMPACITY_A: [f64; 16] = [
    18.0, 25.0, 34.0, 43.0, 60.0, 80.0, 106.0, 131.0, 159.0, 202.0, 244.0, 284.0, 324.0, 371.0,
    434.0, 497.0,
];

/// Solar DC cable cross-sections in mm², ascending.
pub const DC_SOLAR_SIZES_MM2: [f64; 14] = [
    2.5, 4.0, 6.0, 10.0, 16.0, 25.0, 35.0, 50.0, 70.0, 95.0, 120.0, 150.0, 185.0, 240.0,
];

/// Tinned copper solar cable, 90 °C rated, free air.
const DC_SOLAR_AMPACITY_A: [f64; 14] = [
    30.0, 40.0, 52.0, 71.0, 96.0, 128.0, 158.0, 192.0, 246.0, 298.0, 346.0, 394.0, 450.0, 530.0,
];

const AMBIENT_DERATING: [(f64, f64); 7] = [
    (30.0, 1.00),
    (35.0, 0.94),
    (40.0, 0.87),
    (45.0, 0.79),
    (50.0, 0.71),
    (55.0, 0.61),
    (60.0, 0.50),
];

const DC_SOLAR_DERATING: [(f64, f64); 7] = [
    (30.0, 1.00),
    (35.0, 0.96),
    (40.0, 0.91),
    (45.0, 0.87),
    (50.0, 0.82),
    (55.0, 0.76),
    (60.0, 0.71),
];

pub const K_REFERENCE_TEMP_C: f64 = 20.0;
pub const K_REFERENCE_RESISTIVITY: f64 = 1.5;
pub const K4_TREFOIL: f64 = 0.85;
pub const AC_SKIN_EFFECT_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableMaterial {
    Copper,
    Aluminium,
}

/// Accepted `material` values, including the US spelling.
pub const MATERIAL_NAMES: &[&str] = &["copper", "aluminium", "aluminum"];
pub const CIRCUIT_NAMES: &[&str] = &["dc", "single_phase_ac", "three_phase_ac"];
pub const INSTALLATION_NAMES: &[&str] =
    &["conduit", "cable_tray", "free_air", "direct_burial", "underground"];

impl CableMaterial {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "copper" => Ok(CableMaterial::Copper),
            "aluminium" | "aluminum" => Ok(CableMaterial::Aluminium),
            other => Err(CalcEngineError::invalid_input(
                "material",
                format!("unknown conductor material '{other}'"),
            )),
        }
    }

    /// Resistivity at 20 °C in Ω·mm²/m.
    pub fn resistivity(&self) -> f64 {
        match self {
            CableMaterial::Copper => 0.0175,
            CableMaterial::Aluminium => 0.0282,
        }
    }

    pub fn ampacity_factor(&self) -> f64 {
        match self {
            CableMaterial::Copper => 1.0,
            CableMaterial::Aluminium => 0.78,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CableMaterial::Copper => "copper",
            CableMaterial::Aluminium => "aluminium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitType {
    Dc,
    SinglePhaseAc,
    ThreePhaseAc,
}

impl CircuitType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "dc" => Ok(CircuitType::Dc),
            "single_phase_ac" => Ok(CircuitType::SinglePhaseAc),
            "three_phase_ac" => Ok(CircuitType::ThreePhaseAc),
            other => Err(CalcEngineError::invalid_input(
                "circuit",
                format!("unknown circuit type '{other}'"),
            )),
        }
    }

    /// Topology factor `k` in the voltage-drop formula.
    pub fn drop_factor(&self) -> f64 {
        match self {
            CircuitType::ThreePhaseAc => 3f64.sqrt(),
            CircuitType::Dc | CircuitType::SinglePhaseAc => 2.0,
        }
    }

    /// Current-carrying conductors counted in the I²R loss.
    pub fn loss_conductors(&self) -> f64 {
        match self {
            CircuitType::ThreePhaseAc => 3.0,
            CircuitType::Dc | CircuitType::SinglePhaseAc => 2.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CircuitType::Dc => "dc",
            CircuitType::SinglePhaseAc => "single_phase_ac",
            CircuitType::ThreePhaseAc => "three_phase_ac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Installation {
    Conduit,
    CableTray,
    FreeAir,
    DirectBurial,
    Underground,
}

impl Installation {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "conduit" => Ok(Installation::Conduit),
            "cable_tray" => Ok(Installation::CableTray),
            "free_air" => Ok(Installation::FreeAir),
            "direct_burial" => Ok(Installation::DirectBurial),
            "underground" => Ok(Installation::Underground),
            other => Err(CalcEngineError::invalid_input(
                "installation",
                format!("unknown installation method '{other}'"),
            )),
        }
    }

    pub fn is_buried(&self) -> bool {
        matches!(self, Installation::DirectBurial | Installation::Underground)
    }
}

/// Which safety multiplier applies to a circuit's nameplate current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitDuty {
    /// The caller already supplies a design current.
    AsSupplied,
    ContinuousAc,
    DcString,
    DcMain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignCurrentPolicy {
    pub as_supplied: f64,
    pub continuous_ac: f64,
    pub dc_string: f64,
    pub dc_main: f64,
}

impl Default for DesignCurrentPolicy {
    fn default() -> Self {
        Self {
            as_supplied: 1.0,
            continuous_ac: 1.25,
            dc_string: 1.56,
            dc_main: 1.25,
        }
    }
}

impl DesignCurrentPolicy {
    pub fn multiplier(&self, duty: CircuitDuty) -> f64 {
        match duty {
            CircuitDuty::AsSupplied => self.as_supplied,
            CircuitDuty::ContinuousAc => self.continuous_ac,
            CircuitDuty::DcString => self.dc_string,
            CircuitDuty::DcMain => self.dc_main,
        }
    }

    /// Design current for `duty`; an explicit `override_factor` replaces the policy value.
    pub fn design_current(&self, duty: CircuitDuty, current_a: f64, override_factor: Option<f64>) -> f64 {
        current_a * override_factor.unwrap_or_else(|| self.multiplier(duty))
    }
}

fn step_lookup(table: &[(f64, f64)], temperature_c: f64, above: f64) -> f64 {
    table
        .iter()
        .find(|(limit, _)| temperature_c <= *limit)
        .map(|(_, factor)| *factor)
        .unwrap_or(above)
}

/// Ambient temperature factor for cables in air or conduit.
pub fn ambient_derating(temperature_c: f64) -> f64 {
    step_lookup(&AMBIENT_DERATING, temperature_c, 0.50)
}

pub fn dc_solar_derating(temperature_c: f64) -> f64 {
    step_lookup(&DC_SOLAR_DERATING, temperature_c, 0.71)
}

/// Ampacity catalogue a selection is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableTable {
    Conduit,
    DcSolar,
}

impl CableTable {
    pub fn sizes(&self) -> &'static [f64] {
        match self {
            CableTable::Conduit => &STANDARD_SIZES_MM2,
            CableTable::DcSolar => &DC_SOLAR_SIZES_MM2,
        }
    }

    fn ampacities(&self) -> &'static [f64] {
        match self {
            CableTable::Conduit => &CONDUIT_AMPACITY_A,
            CableTable::DcSolar => &DC_SOLAR_AMPACITY_A,
        }
    }

    /// Base (copper) ampacity for a catalogue size.
    pub fn ampacity(&self, size_mm2: f64) -> Option<f64> {
        self.sizes()
            .iter()
            .position(|size| (size - size_mm2).abs() < 1e-9)
            .map(|index| self.ampacities()[index])
    }

    /// Smallest catalogue size `>= minimum`; `None` when the minimum exceeds the catalogue.
    pub fn next_size(&self, minimum_mm2: f64) -> Option<f64> {
        self.sizes().iter().copied().find(|size| *size >= minimum_mm2)
    }

    pub fn largest(&self) -> f64 {
        let sizes = self.sizes();
        sizes[sizes.len() - 1]
    }
}

/// Round a computed cross-section up to the conduit catalogue.
pub fn next_standard_size(minimum_mm2: f64) -> Option<f64> {
    CableTable::Conduit.next_size(minimum_mm2)
}

/// Ground conditions for buried runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurialConditions {
    pub depth_m: f64,
    pub soil_temp_c: f64,
    pub soil_resistivity_km_w: f64,
    pub conductor_max_temp_c: f64,
}

impl Default for BurialConditions {
    fn default() -> Self {
        Self {
            depth_m: 0.7,
            soil_temp_c: 20.0,
            soil_resistivity_km_w: K_REFERENCE_RESISTIVITY,
            conductor_max_temp_c: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KFactors {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub total: f64,
}

/// Burial depth factor; shallower runs dissipate heat better.
pub fn depth_factor(depth_m: f64) -> f64 {
    if depth_m <= 0.5 {
        1.10
    } else if depth_m <= 0.7 {
        1.00
    } else if depth_m <= 1.0 {
        0.95
    } else if depth_m <= 1.5 {
        0.90
    } else {
        0.85
    }
}

impl KFactors {
    pub fn compute(conditions: &BurialConditions) -> Result<Self> {
        if conditions.soil_temp_c >= conditions.conductor_max_temp_c {
            return Err(CalcEngineError::invalid_input(
                "soil_temp_c",
                format!(
                    "soil temperature {:.1} °C must be below the conductor rating {:.1} °C",
                    conditions.soil_temp_c, conditions.conductor_max_temp_c
                ),
            ));
        }
        if conditions.conductor_max_temp_c <= K_REFERENCE_TEMP_C {
            return Err(CalcEngineError::invalid_input(
                "conductor_max_temp_c",
                "conductor rating must exceed the 20 °C reference",
            ));
        }
        if conditions.soil_resistivity_km_w <= 0.0 {
            return Err(CalcEngineError::invalid_input(
                "soil_resistivity",
                "soil thermal resistivity must be positive",
            ));
        }

        let k1 = depth_factor(conditions.depth_m);
        let k2 = ((conditions.conductor_max_temp_c - conditions.soil_temp_c)
            / (conditions.conductor_max_temp_c - K_REFERENCE_TEMP_C))
            .sqrt();
        let k3 = (K_REFERENCE_RESISTIVITY / conditions.soil_resistivity_km_w).sqrt();
        let k4 = K4_TREFOIL;
        Ok(Self {
            k1,
            k2,
            k3,
            k4,
            total: k1 * k2 * k3 * k4,
        })
    }
}

/// Minimum cross-section (mm²) keeping the drop at or below `max_drop_fraction`.
pub fn minimum_cross_section(
    circuit: CircuitType,
    length_m: f64,
    current_a: f64,
    material: CableMaterial,
    resistance_factor: f64,
    max_drop_fraction: f64,
    voltage_v: f64,
) -> f64 {
    (circuit.drop_factor() * length_m * current_a * material.resistivity() * resistance_factor)
        / (max_drop_fraction * 100.0 * voltage_v)
        * 100.0
}

/// A cable that has been chosen (or is being considered) for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectedCable {
    pub size_mm2: f64,
    pub material: CableMaterial,
    pub parallel_runs: u32,
    /// Catalogue ampacity of one run before derating.
    pub base_ampacity_a: f64,
    #[serde(default)]
    pub reactance_ohm_per_km: Option<f64>,
}

/// The electrical duty placed on a cable run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CableLoad {
    pub current_a: f64,
    pub voltage_v: f64,
    pub length_m: f64,
    pub circuit: CircuitType,
    pub derating_factor: f64,
    pub resistance_factor: f64,
    pub max_drop_fraction: f64,
    #[serde(default)]
    pub reference_power_kw: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CableEvaluation {
    pub resistance_ohm: f64,
    pub derated_ampacity_a: f64,
    pub voltage_drop_v: f64,
    pub voltage_drop_percent: f64,
    pub power_loss_kw: f64,
    pub power_loss_percent: f64,
    pub ampacity_ok: bool,
    pub voltage_drop_ok: bool,
    pub reasons: Vec<String>,
}

impl CableEvaluation {
    /// Evaluate `cable` under `load`. With no cable selected every quantity is zero.
    pub fn evaluate(cable: Option<&SelectedCable>, load: &CableLoad) -> Self {
        let Some(cable) = cable else {
            return Self::default();
        };
        if cable.size_mm2 <= 0.0 || cable.parallel_runs == 0 {
            return Self::default();
        }

        let runs = f64::from(cable.parallel_runs);
        let resistance_ohm =
            cable.material.resistivity() * load.length_m / cable.size_mm2 * load.resistance_factor;

        let voltage_drop_v = match cable.reactance_ohm_per_km {
            Some(reactance) => {
                let resistance_per_km = resistance_ohm / load.length_m.max(f64::EPSILON) * 1000.0;
                let impedance_per_km = (resistance_per_km.powi(2) + reactance.powi(2)).sqrt();
                load.circuit.drop_factor() * load.current_a * impedance_per_km * load.length_m
                    / 1000.0
                    / runs
            }
            None => load.circuit.drop_factor() * load.current_a * resistance_ohm / runs,
        };
        let voltage_drop_percent = if load.voltage_v > 0.0 {
            (voltage_drop_v / load.voltage_v * 100.0).min(100.0)
        } else {
            0.0
        };

        let power_loss_kw =
            load.circuit.loss_conductors() * load.current_a.powi(2) * resistance_ohm / runs / 1000.0;
        let reference_kw = load.reference_power_kw.unwrap_or_else(|| match load.circuit {
            CircuitType::ThreePhaseAc => 3f64.sqrt() * load.voltage_v * load.current_a / 1000.0,
            _ => load.voltage_v * load.current_a / 1000.0,
        });
        let power_loss_percent = if reference_kw > 0.0 {
            power_loss_kw / reference_kw * 100.0
        } else {
            0.0
        };

        let derated_ampacity_a = cable.base_ampacity_a * load.derating_factor * runs;
        let ampacity_ok = derated_ampacity_a >= load.current_a;
        let voltage_drop_ok = voltage_drop_percent <= load.max_drop_fraction * 100.0;

        let mut reasons = Vec::new();
        if !ampacity_ok {
            reasons.push(format!(
                "Current {:.1} A exceeds derated ampacity {:.1} A",
                load.current_a, derated_ampacity_a
            ));
        }
        if !voltage_drop_ok {
            reasons.push(format!(
                "Voltage drop {:.2}% exceeds limit {:.2}%",
                voltage_drop_percent,
                load.max_drop_fraction * 100.0
            ));
        }

        Self {
            resistance_ohm,
            derated_ampacity_a,
            voltage_drop_v,
            voltage_drop_percent,
            power_loss_kw,
            power_loss_percent,
            ampacity_ok,
            voltage_drop_ok,
            reasons,
        }
    }

    pub fn is_adequate(&self) -> bool {
        self.ampacity_ok && self.voltage_drop_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derating {
    Ambient { temperature_c: f64 },
    DcSolar { temperature_c: f64 },
    Buried(BurialConditions),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CableRequest {
    pub design_current_a: f64,
    pub voltage_v: f64,
    pub length_m: f64,
    pub max_drop_fraction: f64,
    pub material: CableMaterial,
    pub circuit: CircuitType,
    pub table: CableTable,
    pub derating: Derating,
    pub parallel_runs: u32,
    pub resistance_factor: f64,
    pub minimum_size_mm2: f64,
}

impl CableRequest {
    pub fn new(design_current_a: f64, voltage_v: f64, length_m: f64, max_drop_fraction: f64) -> Self {
        Self {
            design_current_a,
            voltage_v,
            length_m,
            max_drop_fraction,
            material: CableMaterial::Copper,
            circuit: CircuitType::Dc,
            table: CableTable::Conduit,
            derating: Derating::Ambient { temperature_c: 30.0 },
            parallel_runs: 1,
            resistance_factor: 1.0,
            minimum_size_mm2: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableSelection {
    pub minimum_size_mm2: f64,
    pub size_mm2: f64,
    pub base_ampacity_a: f64,
    pub derating_factor: f64,
    pub k_factors: Option<KFactors>,
    pub evaluation: CableEvaluation,
    /// The computed minimum exceeded the largest catalogue size.
    pub beyond_catalog: bool,
}

impl CableSelection {
    pub fn is_adequate(&self) -> bool {
        self.evaluation.is_adequate()
    }

    pub fn safety_margin_percent(&self, design_current_a: f64) -> f64 {
        if design_current_a > 0.0 {
            (self.evaluation.derated_ampacity_a - design_current_a) / design_current_a * 100.0
        } else {
            0.0
        }
    }
}

impl Derating {
    fn resolve(&self) -> Result<(f64, Option<KFactors>)> {
        match self {
            Derating::Ambient { temperature_c } => Ok((ambient_derating(*temperature_c), None)),
            Derating::DcSolar { temperature_c } => Ok((dc_solar_derating(*temperature_c), None)),
            Derating::Buried(conditions) => {
                let factors = KFactors::compute(conditions)?;
                Ok((factors.total, Some(factors)))
            }
        }
    }
}

/// Smallest catalogue size meeting both the drop ceiling and the derated-ampacity floor.
///
/// Selection starts at the voltage-drop minimum and steps up. When no size is adequate
/// the largest one is returned with its failing checks in `evaluation.reasons`.
pub fn select_cable(request: &CableRequest) -> Result<CableSelection> {
    if request.parallel_runs == 0 {
        return Err(CalcEngineError::invalid_input(
            "parallel_runs",
            "at least one cable run is required",
        ));
    }
    let (derating_factor, k_factors) = request.derating.resolve()?;
    let runs = f64::from(request.parallel_runs);

    let minimum_size_mm2 = minimum_cross_section(
        request.circuit,
        request.length_m,
        request.design_current_a / runs,
        request.material,
        request.resistance_factor,
        request.max_drop_fraction,
        request.voltage_v,
    )
    .max(request.minimum_size_mm2);

    let sizes = request.table.sizes();
    let start = sizes.iter().position(|size| *size >= minimum_size_mm2);
    let beyond_catalog = start.is_none();
    let start = start.unwrap_or(sizes.len() - 1);

    let load = CableLoad {
        current_a: request.design_current_a,
        voltage_v: request.voltage_v,
        length_m: request.length_m,
        circuit: request.circuit,
        derating_factor,
        resistance_factor: request.resistance_factor,
        max_drop_fraction: request.max_drop_fraction,
        reference_power_kw: None,
    };

    let mut chosen: Option<CableSelection> = None;
    for &size in &sizes[start..] {
        let base_ampacity_a = request
            .table
            .ampacity(size)
            .map(|amps| amps * request.material.ampacity_factor())
            .unwrap_or(0.0);
        let cable = SelectedCable {
            size_mm2: size,
            material: request.material,
            parallel_runs: request.parallel_runs,
            base_ampacity_a,
            reactance_ohm_per_km: None,
        };
        let evaluation = CableEvaluation::evaluate(Some(&cable), &load);
        debug!(size_mm2 = size, adequate = evaluation.is_adequate(), "cable size evaluated");
        let adequate = evaluation.is_adequate();
        chosen = Some(CableSelection {
            minimum_size_mm2,
            size_mm2: size,
            base_ampacity_a,
            derating_factor,
            k_factors,
            evaluation,
            beyond_catalog,
        });
        if adequate {
            break;
        }
    }

    let selection = chosen.ok_or_else(|| CalcEngineError::infeasible("cable catalogue is empty"))?;
    if !selection.is_adequate() {
        warn!(
            "[WARN] Cable {} mm² undersized: {}",
            selection.size_mm2,
            selection.evaluation.reasons.join(", ")
        );
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario_b() -> CableRequest {
        CableRequest::new(30.0, 400.0, 50.0, 0.03)
    }

    #[test]
    fn voltage_drop_sizing_matches_reference_scenario() {
        let request = scenario_b();
        let minimum = minimum_cross_section(
            request.circuit,
            request.length_m,
            request.design_current_a,
            request.material,
            1.0,
            request.max_drop_fraction,
            request.voltage_v,
        );
        assert_relative_eq!(minimum, 4.375, epsilon = 1e-9);
        assert_eq!(next_standard_size(minimum), Some(6.0));

        let selection = select_cable(&request).unwrap();
        assert_eq!(selection.size_mm2, 6.0);
        assert_relative_eq!(selection.evaluation.voltage_drop_percent, 2.1875, epsilon = 1e-9);
        assert!(selection.is_adequate());
    }

    #[test]
    fn steps_up_when_ampacity_binds() {
        let mut request = CableRequest::new(100.0, 400.0, 5.0, 0.03);
        request.derating = Derating::Ambient { temperature_c: 45.0 };
        let selection = select_cable(&request).unwrap();
        // 25 mm² → 106 × 0.79 = 83.7 A is short; 35 mm² → 103.5 A holds
        assert_eq!(selection.size_mm2, 35.0);
        assert!(selection.evaluation.ampacity_ok);
    }

    #[test]
    fn never_rounds_down() {
        for minimum in [0.1, 1.5, 1.6, 4.0, 4.01, 299.0] {
            let size = next_standard_size(minimum).unwrap();
            assert!(size >= minimum);
        }
        assert_eq!(next_standard_size(301.0), None);
    }

    #[test]
    fn oversize_run_keeps_largest_and_reports_reasons() {
        let request = CableRequest::new(900.0, 230.0, 400.0, 0.03);
        let selection = select_cable(&request).unwrap();
        assert!(selection.beyond_catalog);
        assert_eq!(selection.size_mm2, 300.0);
        assert!(!selection.is_adequate());
        assert_eq!(selection.evaluation.reasons.len(), 2);
    }

    #[test]
    fn k_factors_multiply() {
        let factors = KFactors::compute(&BurialConditions {
            depth_m: 0.8,
            soil_temp_c: 40.0,
            soil_resistivity_km_w: 2.0,
            conductor_max_temp_c: 90.0,
        })
        .unwrap();
        assert_eq!(factors.k1, 0.95);
        assert_relative_eq!(factors.k2, (50.0f64 / 70.0).sqrt());
        assert_relative_eq!(factors.k3, (1.5f64 / 2.0).sqrt());
        assert_eq!(factors.k4, K4_TREFOIL);
        assert_relative_eq!(factors.total, factors.k1 * factors.k2 * factors.k3 * factors.k4);
        for k in [factors.k1, factors.k2, factors.k3, factors.k4] {
            assert!(k > 0.0);
        }
    }

    #[test]
    fn hot_soil_is_rejected() {
        let err = KFactors::compute(&BurialConditions {
            soil_temp_c: 95.0,
            ..BurialConditions::default()
        })
        .unwrap_err();
        assert!(matches!(err, CalcEngineError::InvalidInput { .. }));
    }

    #[test]
    fn parallel_runs_never_reduce_ampacity() {
        let mut previous = 0.0;
        for runs in 1..=4 {
            let mut request = CableRequest::new(200.0, 400.0, 80.0, 0.03);
            request.parallel_runs = runs;
            request.derating = Derating::Buried(BurialConditions::default());
            let cable = SelectedCable {
                size_mm2: 95.0,
                material: CableMaterial::Copper,
                parallel_runs: runs,
                base_ampacity_a: 244.0,
                reactance_ohm_per_km: None,
            };
            let load = CableLoad {
                current_a: 200.0,
                voltage_v: 400.0,
                length_m: 80.0,
                circuit: CircuitType::ThreePhaseAc,
                derating_factor: 0.85,
                resistance_factor: AC_SKIN_EFFECT_FACTOR,
                max_drop_fraction: 0.03,
                reference_power_kw: None,
            };
            let evaluation = CableEvaluation::evaluate(Some(&cable), &load);
            assert!(evaluation.derated_ampacity_a >= previous);
            previous = evaluation.derated_ampacity_a;
            assert!(select_cable(&request).is_ok());
        }
    }

    #[test]
    fn longer_runs_never_reduce_voltage_drop() {
        let cable = SelectedCable {
            size_mm2: 16.0,
            material: CableMaterial::Aluminium,
            parallel_runs: 1,
            base_ampacity_a: 80.0 * 0.78,
            reactance_ohm_per_km: Some(0.08),
        };
        let mut previous = 0.0;
        for length in [10.0, 50.0, 100.0, 250.0, 1000.0] {
            let load = CableLoad {
                current_a: 40.0,
                voltage_v: 400.0,
                length_m: length,
                circuit: CircuitType::ThreePhaseAc,
                derating_factor: 1.0,
                resistance_factor: AC_SKIN_EFFECT_FACTOR,
                max_drop_fraction: 0.05,
                reference_power_kw: None,
            };
            let evaluation = CableEvaluation::evaluate(Some(&cable), &load);
            assert!(evaluation.voltage_drop_percent >= previous);
            previous = evaluation.voltage_drop_percent;
        }
    }

    #[test]
    fn no_cable_selected_is_all_zero() {
        let load = CableLoad {
            current_a: 120.0,
            voltage_v: 400.0,
            length_m: 60.0,
            circuit: CircuitType::ThreePhaseAc,
            derating_factor: 0.9,
            resistance_factor: AC_SKIN_EFFECT_FACTOR,
            max_drop_fraction: 0.03,
            reference_power_kw: Some(80.0),
        };
        let evaluation = CableEvaluation::evaluate(None, &load);
        assert_eq!(evaluation, CableEvaluation::default());
        assert_eq!(evaluation.power_loss_kw, 0.0);
        assert!(!evaluation.is_adequate());
    }

    #[test]
    fn power_loss_against_reference_power() {
        let cable = SelectedCable {
            size_mm2: 35.0,
            material: CableMaterial::Copper,
            parallel_runs: 1,
            base_ampacity_a: 131.0,
            reactance_ohm_per_km: None,
        };
        let load = CableLoad {
            current_a: 100.0,
            voltage_v: 400.0,
            length_m: 100.0,
            circuit: CircuitType::ThreePhaseAc,
            derating_factor: 1.0,
            resistance_factor: AC_SKIN_EFFECT_FACTOR,
            max_drop_fraction: 0.03,
            reference_power_kw: Some(60.0),
        };
        let evaluation = CableEvaluation::evaluate(Some(&cable), &load);
        let resistance = 0.0175 * 100.0 / 35.0 * 1.1;
        assert_relative_eq!(evaluation.resistance_ohm, resistance);
        assert_relative_eq!(evaluation.power_loss_kw, 3.0 * 100.0f64.powi(2) * resistance / 1000.0);
        assert_relative_eq!(evaluation.power_loss_percent, evaluation.power_loss_kw / 60.0 * 100.0);
    }

    #[test]
    fn design_current_policy_is_explicit() {
        let policy = DesignCurrentPolicy::default();
        assert_relative_eq!(policy.design_current(CircuitDuty::DcString, 10.0, None), 15.6);
        assert_relative_eq!(policy.design_current(CircuitDuty::ContinuousAc, 10.0, None), 12.5);
        assert_relative_eq!(policy.design_current(CircuitDuty::AsSupplied, 10.0, None), 10.0);
        assert_relative_eq!(policy.design_current(CircuitDuty::DcMain, 10.0, Some(1.5)), 15.0);
    }

    #[test]
    fn derating_steps() {
        assert_eq!(ambient_derating(25.0), 1.00);
        assert_eq!(ambient_derating(30.5), 0.94);
        assert_eq!(ambient_derating(70.0), 0.50);
        assert_eq!(dc_solar_derating(40.0), 0.91);
        assert_eq!(dc_solar_derating(65.0), 0.71);
    }

    #[test]
    fn unknown_cable_options_are_rejected() {
        assert_eq!(CableMaterial::parse("aluminum").unwrap(), CableMaterial::Aluminium);
        assert_eq!(CircuitType::parse(" three_phase_ac").unwrap(), CircuitType::ThreePhaseAc);
        assert!(matches!(
            CableMaterial::parse("alu"),
            Err(CalcEngineError::InvalidInput { ref field, .. }) if field == "material"
        ));
        assert!(CircuitType::parse("three-phase").is_err());
        assert!(Installation::parse("buried").is_err());
        for name in INSTALLATION_NAMES {
            assert!(Installation::parse(name).is_ok(), "{name}");
        }
    }
}
