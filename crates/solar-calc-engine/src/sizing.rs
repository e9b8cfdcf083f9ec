//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Array capacity, module counts, and temperature-compensated string windows.

use serde::{Deserialize, Serialize};

use crate::errors::{CalcEngineError, Result};

pub const DEFAULT_PERFORMANCE_RATIO: f64 = 0.80;
pub const DEFAULT_GROUND_COVERAGE_RATIO: f64 = 0.45;
pub const DEFAULT_MODULE_WATTAGE_W: f64 = 600.0;
pub const DEFAULT_MODULE_AREA_M2: f64 = 2.8;
pub const STC_TEMPERATURE_C: f64 = 25.0;
const HOURS_PER_YEAR: f64 = 8760.0;

/// Capacity (kWp) needed to cover `daily_kwh` given a daily specific yield.
pub fn consumption_based_capacity(daily_kwh: f64, daily_yield: f64, performance_ratio: f64) -> f64 {
    daily_kwh / (daily_yield * performance_ratio)
}

/// Capacity (kWp) that fits on `area_m2` at the given ground coverage ratio.
pub fn space_based_capacity(
    area_m2: f64,
    ground_coverage_ratio: f64,
    module_area_m2: f64,
    module_wattage_w: f64,
) -> f64 {
    (area_m2 * ground_coverage_ratio / module_area_m2) * (module_wattage_w / 1000.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityReconciliation {
    pub consumption_based_kwp: f64,
    pub space_based_kwp: f64,
    pub final_kwp: f64,
    pub space_constrained: bool,
}

/// The smaller estimate wins; space is binding only when strictly smaller.
pub fn reconcile_capacity(consumption_based_kwp: f64, space_based_kwp: f64) -> CapacityReconciliation {
    let space_constrained = space_based_kwp < consumption_based_kwp;
    CapacityReconciliation {
        consumption_based_kwp,
        space_based_kwp,
        final_kwp: consumption_based_kwp.min(space_based_kwp),
        space_constrained,
    }
}

pub fn module_count(capacity_kwp: f64, module_wattage_w: f64) -> u32 {
    let count = (capacity_kwp * 1000.0 / module_wattage_w).ceil();
    if count.is_finite() && count > 0.0 {
        count as u32
    } else {
        0
    }
}

pub fn realized_capacity(module_count: u32, module_wattage_w: f64) -> f64 {
    f64::from(module_count) * module_wattage_w / 1000.0
}

/// Default tilt: `|lat| − 2°` in the tropics band, else a fixed 25°.
pub fn default_tilt(latitude: f64) -> f64 {
    let abs_lat = latitude.abs();
    if abs_lat <= 25.0 {
        (abs_lat - 2.0).max(0.0)
    } else {
        25.0
    }
}

/// Equator-facing azimuth: south in the northern hemisphere.
pub fn default_azimuth(latitude: f64) -> f64 {
    if latitude >= 0.0 {
        180.0
    } else {
        0.0
    }
}

pub const SHADING_NAMES: &[&str] = &["partial", "shade_free"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadingCondition {
    Partial,
    ShadeFree,
}

impl ShadingCondition {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "partial" => Ok(ShadingCondition::Partial),
            "shade_free" => Ok(ShadingCondition::ShadeFree),
            other => Err(CalcEngineError::invalid_input(
                "shading",
                format!("unknown shading condition '{other}'"),
            )),
        }
    }

    pub fn system_losses_percent(&self) -> f64 {
        match self {
            ShadingCondition::Partial => 14.5,
            ShadingCondition::ShadeFree => 12.0,
        }
    }

    pub fn shading_loss_percent(&self) -> f64 {
        match self {
            ShadingCondition::Partial => 3.0,
            ShadingCondition::ShadeFree => 0.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShadingCondition::Partial => "Partial Shading",
            ShadingCondition::ShadeFree => "Shade Free",
        }
    }
}

/// First-year AC energy (kWh) for an array.
pub fn annual_production(
    capacity_kwp: f64,
    daily_yield: f64,
    performance_ratio: f64,
    system_losses: f64,
) -> f64 {
    capacity_kwp * daily_yield * 365.0 * performance_ratio * (1.0 - system_losses)
}

pub fn specific_yield(annual_kwh: f64, capacity_kwp: f64) -> f64 {
    if capacity_kwp > 0.0 {
        annual_kwh / capacity_kwp
    } else {
        0.0
    }
}

pub fn capacity_factor_percent(annual_kwh: f64, capacity_kwp: f64) -> f64 {
    if capacity_kwp > 0.0 {
        annual_kwh / (capacity_kwp * HOURS_PER_YEAR) * 100.0
    } else {
        0.0
    }
}

pub fn required_area(module_count: u32, module_area_m2: f64, ground_coverage_ratio: f64) -> f64 {
    f64::from(module_count) * module_area_m2 / ground_coverage_ratio
}

/// Monthly performance ratio in percent; zero when irradiance or capacity is zero.
pub fn monthly_performance_ratio(ac_output_kwh: f64, poa_irradiance: f64, capacity_kwp: f64) -> f64 {
    if poa_irradiance == 0.0 || capacity_kwp == 0.0 {
        return 0.0;
    }
    ac_output_kwh / (poa_irradiance * capacity_kwp) * 100.0
}

/// Electrical data for the module side of a string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringModule {
    pub voc_stc: f64,
    pub vmp_stc: f64,
    /// Voltage temperature coefficient in %/°C (negative for silicon).
    pub voltage_coefficient_percent: f64,
}

/// The inverter-side voltage limits a string must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MpptWindow {
    pub mppt_min_v: f64,
    pub mppt_max_v: f64,
    pub max_dc_voltage_v: f64,
}

impl MpptWindow {
    pub fn midpoint(&self) -> f64 {
        (self.mppt_min_v + self.mppt_max_v) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteTemperatures {
    pub cold_extreme_c: f64,
    pub hot_extreme_c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringWindow {
    pub voc_cold: f64,
    pub vmp_hot: f64,
    pub min_series: u32,
    pub max_series: u32,
    pub preferred_series: u32,
}

pub fn temperature_adjusted(voltage_stc: f64, coefficient_percent: f64, temperature_c: f64) -> f64 {
    voltage_stc * (1.0 + coefficient_percent / 100.0 * (temperature_c - STC_TEMPERATURE_C))
}

/// Series-count bounds before the window is checked for feasibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StringLimits {
    pub voc_cold: f64,
    pub vmp_hot: f64,
    pub min_series: u32,
    pub max_series: u32,
}

impl StringLimits {
    pub fn compute(module: StringModule, window: MpptWindow, temps: SiteTemperatures) -> Result<Self> {
        let voc_cold = temperature_adjusted(
            module.voc_stc,
            module.voltage_coefficient_percent,
            temps.cold_extreme_c,
        );
        let vmp_hot = temperature_adjusted(
            module.vmp_stc,
            module.voltage_coefficient_percent,
            temps.hot_extreme_c,
        );
        if voc_cold <= 0.0 || vmp_hot <= 0.0 {
            return Err(CalcEngineError::infeasible(format!(
                "temperature-adjusted module voltage is not positive (Voc cold {voc_cold:.2} V, Vmp hot {vmp_hot:.2} V)"
            )));
        }

        Ok(Self {
            voc_cold,
            vmp_hot,
            max_series: (window.max_dc_voltage_v / voc_cold).floor().max(0.0) as u32,
            min_series: (window.mppt_min_v / vmp_hot).ceil().max(0.0) as u32,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min_series > self.max_series
    }
}

impl StringWindow {
    /// Solve the feasible series-count window, or report both bounds when it is empty.
    pub fn solve(module: StringModule, window: MpptWindow, temps: SiteTemperatures) -> Result<Self> {
        let limits = StringLimits::compute(module, window, temps)?;
        Self::within(&limits, module, window)
    }

    /// Choose the series count nearest the MPPT midpoint inside already computed limits.
    pub fn within(limits: &StringLimits, module: StringModule, window: MpptWindow) -> Result<Self> {
        let StringLimits {
            voc_cold,
            vmp_hot,
            min_series,
            max_series,
        } = *limits;
        if limits.is_empty() {
            return Err(CalcEngineError::infeasible(format!(
                "minimum panels per string ({min_series}) exceeds maximum panels per string ({max_series})"
            )));
        }

        let midpoint_count = (window.midpoint() / module.vmp_stc).round().max(0.0) as u32;
        let preferred_series = midpoint_count.clamp(min_series, max_series);

        Ok(Self {
            voc_cold,
            vmp_hot,
            min_series,
            max_series,
            preferred_series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn consumption_capacity_matches_reference_scenario() {
        let capacity = consumption_based_capacity(50.0, 5.2, DEFAULT_PERFORMANCE_RATIO);
        assert_relative_eq!(capacity, 12.019_230_769, epsilon = 1e-6);
    }

    #[test]
    fn reconciliation_flags_space_only_when_strictly_smaller() {
        let tied = reconcile_capacity(20.0, 20.0);
        assert_eq!(tied.final_kwp, 20.0);
        assert!(!tied.space_constrained);

        let constrained = reconcile_capacity(40.0, 25.2);
        assert_eq!(constrained.final_kwp, 25.2);
        assert!(constrained.space_constrained);

        let consumption = reconcile_capacity(10.0, 25.2);
        assert_eq!(consumption.final_kwp, 10.0);
        assert!(!consumption.space_constrained);
    }

    #[test]
    fn realized_capacity_covers_requested_capacity() {
        for capacity in [0.6, 1.0, 12.02, 37.5, 119.99, 120.0] {
            let count = module_count(capacity, DEFAULT_MODULE_WATTAGE_W);
            assert_eq!(count, (capacity * 1000.0 / 600.0).ceil() as u32);
            assert!(realized_capacity(count, DEFAULT_MODULE_WATTAGE_W) >= capacity);
        }
    }

    #[test]
    fn tilt_and_azimuth_defaults() {
        assert_eq!(default_tilt(1.0), 0.0);
        assert_eq!(default_tilt(-12.0), 10.0);
        assert_eq!(default_tilt(25.0), 23.0);
        assert_eq!(default_tilt(51.5), 25.0);
        assert_eq!(default_azimuth(0.0), 180.0);
        assert_eq!(default_azimuth(-33.9), 0.0);
    }

    #[test]
    fn monthly_pr_guards_zero_denominator() {
        assert_eq!(monthly_performance_ratio(1200.0, 0.0, 10.0), 0.0);
        assert_relative_eq!(monthly_performance_ratio(1200.0, 150.0, 10.0), 80.0);
    }

    #[test]
    fn string_window_prefers_mppt_midpoint() {
        let window = StringWindow::solve(
            StringModule {
                voc_stc: 49.5,
                vmp_stc: 41.5,
                voltage_coefficient_percent: -0.30,
            },
            MpptWindow {
                mppt_min_v: 200.0,
                mppt_max_v: 800.0,
                max_dc_voltage_v: 1000.0,
            },
            SiteTemperatures {
                cold_extreme_c: -10.0,
                hot_extreme_c: 70.0,
            },
        )
        .unwrap();
        assert_relative_eq!(window.voc_cold, 49.5 * 1.105, epsilon = 1e-9);
        assert_relative_eq!(window.vmp_hot, 41.5 * 0.865, epsilon = 1e-9);
        assert_eq!(window.max_series, 18);
        assert_eq!(window.min_series, 6);
        assert_eq!(window.preferred_series, 12);
    }

    #[test]
    fn empty_string_window_reports_both_bounds() {
        let err = StringWindow::solve(
            StringModule {
                voc_stc: 49.5,
                vmp_stc: 41.5,
                voltage_coefficient_percent: -0.30,
            },
            MpptWindow {
                mppt_min_v: 900.0,
                mppt_max_v: 950.0,
                max_dc_voltage_v: 1000.0,
            },
            SiteTemperatures {
                cold_extreme_c: -10.0,
                hot_extreme_c: 70.0,
            },
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("(26)"));
        assert!(message.contains("(18)"));
    }

    #[test]
    fn shading_condition_requires_known_name() {
        assert_eq!(ShadingCondition::parse("partial").unwrap(), ShadingCondition::Partial);
        assert_eq!(ShadingCondition::parse("shade_free").unwrap(), ShadingCondition::ShadeFree);
        assert!(ShadingCondition::parse("heavy").is_err());
    }
}
