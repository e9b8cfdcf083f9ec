//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Fixed-tilt optimum by season, tilt comparison, tracker gains and roof pitch losses.

use once_cell::sync::Lazy;

use super::irradiance::azimuth_deviation;
use crate::{
    calculator::Calculator,
    errors::Result,
    model::{row, InputBag, OutputRow},
    result::{fixed, ResultBuilder, NOT_DETERMINABLE},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::default_azimuth,
    validation::ValidationRule,
};

pub const MIN_SELF_CLEANING_TILT_DEG: f64 = 10.0;
pub const COMPARISON_TILTS: [f64; 11] = [0.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 60.0, 90.0];
/// Azimuth loss in percent per degree off equator-facing.
pub const AZIMUTH_LOSS_PERCENT_PER_DEG: f64 = 0.2;
const SEASONAL_OFFSET_DEG: f64 = 15.0;
const EARTH_AXIAL_TILT_DEG: f64 = 23.45;
const ROOF_LOSS_WARNING_PERCENT: f64 = 10.0;
const INSTALLATION_NAMES: &[&str] = &["fixed", "seasonal_adjust", "single_axis_tracker", "dual_axis_tracker"];
const SEASON_NAMES: &[&str] = &["annual", "summer", "winter"];

/// Relative annual production against a fixed array, in percent.
pub const TRACKER_GAINS: [(&str, f64); 4] = [
    ("fixed", 100.0),
    ("seasonal_adjust", 105.0),
    ("single_axis_tracker", 125.0),
    ("dual_axis_tracker", 135.0),
];

/// `cos²(tilt − optimum)` as a percentage of the optimum's production.
pub fn production_factor(tilt_deg: f64, optimal_deg: f64) -> f64 {
    (tilt_deg - optimal_deg).to_radians().cos().powi(2) * 100.0
}

pub fn tracker_gain(installation_type: &str) -> f64 {
    TRACKER_GAINS
        .iter()
        .find(|(name, _)| *name == installation_type)
        .map_or(100.0, |(_, gain)| *gain)
}

/// Inter-row pitch free of shading at winter-solstice noon; `None` when the sun stays
/// below the horizon.
pub fn row_spacing(panel_height_m: f64, tilt_deg: f64, latitude: f64) -> Option<f64> {
    let altitude = 90.0 - latitude.abs() - EARTH_AXIAL_TILT_DEG;
    if altitude <= 0.0 {
        return None;
    }
    Some(panel_height_m * tilt_deg.to_radians().sin() / altitude.to_radians().tan())
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "tilt_optimization",
    name: "Tilt Angle Optimization",
    description: "Find optimal tilt angle for maximum annual energy production",
    category: Category::Technical,
    inputs: vec![
        InputField::number("latitude", "Latitude")
            .unit("°")
            .required()
            .bounds(-90.0, 90.0),
        InputField::choice("installation_type", "Installation Type", INSTALLATION_NAMES)
            .default_text("fixed"),
        InputField::choice("seasonal_preference", "Seasonal Preference", SEASON_NAMES)
            .default_text("annual")
            .describe("Optimize for specific season or annual average"),
        InputField::number("roof_pitch_deg", "Roof Pitch")
            .unit("°")
            .bounds(0.0, 60.0)
            .describe("Existing roof angle (for roof-mounted systems)"),
        InputField::number("azimuth_deg", "Azimuth")
            .unit("°")
            .bounds(0.0, 360.0)
            .describe("Panel orientation (180° = South in Northern Hemisphere)"),
        InputField::number("panel_height_m", "Panel Slant Height")
            .unit("m")
            .describe("Enables the inter-row spacing estimate"),
    ],
    rules: vec![
        ValidationRule::required("latitude", "Latitude is required"),
        ValidationRule::range("latitude", -90.0, 90.0, "Latitude must be -90 to +90"),
        ValidationRule::range("roof_pitch_deg", 0.0, 60.0, "Roof pitch should be 0-60°"),
        ValidationRule::range("azimuth_deg", 0.0, 360.0, "Azimuth must be 0-360°"),
        ValidationRule::positive("panel_height_m", "Panel height must be positive"),
        ValidationRule::one_of(
            "installation_type",
            INSTALLATION_NAMES,
            "Installation type must be fixed, seasonal_adjust, single_axis_tracker or dual_axis_tracker",
        ),
        ValidationRule::one_of("seasonal_preference", SEASON_NAMES, "Seasonal preference must be annual, summer or winter"),
    ],
    formulas: vec![
        Formula {
            name: "Annual Optimal Tilt",
            expression: "Tilt_annual ≈ |Latitude|",
            description: "Rule of thumb for fixed annual-optimized tilt",
            variables: &[("Latitude", "Absolute value of location latitude")],
        },
        Formula {
            name: "Summer Optimal Tilt",
            expression: "Tilt_summer = max(10°, |Latitude| - 15°)",
            description: "Lower tilt to capture high summer sun",
            variables: &[],
        },
        Formula {
            name: "Winter Optimal Tilt",
            expression: "Tilt_winter = min(75°, |Latitude| + 15°)",
            description: "Higher tilt to capture low winter sun",
            variables: &[],
        },
        Formula {
            name: "Production Factor vs Tilt",
            expression: "Factor = cos(Tilt - Optimal)²",
            description: "Approximate production loss for non-optimal tilt",
            variables: &[],
        },
        Formula {
            name: "Tracker Gain",
            expression: "Single-axis: +20-25% | Dual-axis: +30-40%",
            description: "Typical production gain from tracking systems",
            variables: &[],
        },
        Formula {
            name: "Inter-Row Spacing",
            expression: "Spacing = Panel Height × sin(Tilt) ÷ tan(Solar Altitude)",
            description: "Minimum row spacing to avoid shading at winter solstice",
            variables: &[("Solar Altitude", "90° - |Latitude| - 23.45°")],
        },
    ],
    standards: vec![
        StandardValue::number("Flat Roof Minimum Tilt", MIN_SELF_CLEANING_TILT_DEG, "°", "Best Practice"),
        StandardValue::number("Single-Axis Tracker Gain", 25.0, "%", "Industry Average"),
        StandardValue::number("Dual-Axis Tracker Gain", 35.0, "%", "Industry Average"),
        StandardValue::number("Seasonal Adjustment Gain", 5.0, "%", "Industry Average"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct TiltOptimization;

fn tilt_comparison(annual_optimal: f64) -> Vec<OutputRow> {
    COMPARISON_TILTS
        .iter()
        .map(|tilt| {
            row([
                ("tilt_deg", (*tilt).into()),
                ("production_factor_percent", production_factor(*tilt, annual_optimal).into()),
                ("deviation_deg", (tilt - annual_optimal).into()),
            ])
        })
        .collect()
}

fn tracker_table() -> Vec<OutputRow> {
    TRACKER_GAINS
        .iter()
        .map(|(name, gain)| {
            row([
                ("installation_type", (*name).into()),
                ("relative_production_percent", (*gain).into()),
            ])
        })
        .collect()
}

impl Calculator for TiltOptimization {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let latitude = inputs.number_or("latitude", 0.0);
        let installation = inputs.text_or("installation_type", "fixed");
        let preference = inputs.text_or("seasonal_preference", "annual");
        let optimal_azimuth = default_azimuth(latitude);
        let azimuth = inputs.number_or("azimuth_deg", optimal_azimuth);
        let northern = latitude >= 0.0;

        let annual_optimal = latitude.abs();
        let summer_optimal = (annual_optimal - SEASONAL_OFFSET_DEG).max(10.0);
        let winter_optimal = (annual_optimal + SEASONAL_OFFSET_DEG).min(75.0);
        let selected = match preference {
            "summer" => summer_optimal,
            "winter" => winter_optimal,
            _ => annual_optimal,
        };
        let recommended = selected.max(MIN_SELF_CLEANING_TILT_DEG);

        let azimuth_diff = azimuth_deviation(azimuth, optimal_azimuth);
        let azimuth_loss = azimuth_diff * AZIMUTH_LOSS_PERCENT_PER_DEG;
        let gain = tracker_gain(installation);
        let flat_factor = production_factor(0.0, annual_optimal);

        out.output("annual_optimal_tilt_deg", annual_optimal)
            .output("summer_optimal_tilt_deg", summer_optimal)
            .output("winter_optimal_tilt_deg", winter_optimal)
            .output("selected_optimal_tilt_deg", selected)
            .output("recommended_tilt_deg", recommended)
            .output("optimal_azimuth_deg", optimal_azimuth)
            .output("azimuth_deviation_deg", azimuth_diff)
            .output("azimuth_loss_percent", azimuth_loss)
            .output("tilt_comparison", tilt_comparison(annual_optimal))
            .output("tracker_gains", tracker_table())
            .output("tracker_gain_percent", gain)
            .output("summer_factor_percent", production_factor(recommended, summer_optimal))
            .output("winter_factor_percent", production_factor(recommended, winter_optimal));

        out.step(format!(
            "Annual optimal tilt = |{latitude}°| = {}°",
            fixed(annual_optimal, 1)
        ))
        .step(format!(
            "Summer optimal tilt = |{latitude}°| - 15° = {}°",
            fixed(summer_optimal, 1)
        ))
        .step(format!(
            "Winter optimal tilt = |{latitude}°| + 15° = {}°",
            fixed(winter_optimal, 1)
        ))
        .step(format!("Selected optimal ({preference}): {}°", fixed(selected, 1)))
        .step(format!("Recommended tilt (≥10°): {}°", fixed(recommended, 1)))
        .step(format!(
            "Optimal azimuth: {optimal_azimuth}° ({} facing)",
            if northern { "South" } else { "North" }
        ))
        .step(format!(
            "Azimuth loss = {}° × 0.2%/° = {}%",
            fixed(azimuth_diff, 0),
            fixed(azimuth_loss, 1)
        ));

        let mut roof_loss = None;
        if let Some(pitch) = inputs.number("roof_pitch_deg") {
            let factor = production_factor(pitch, annual_optimal);
            let loss = 100.0 - factor;
            roof_loss = Some((pitch, loss));
            out.output("roof_pitch_deg", pitch)
                .output("roof_deviation_deg", pitch - annual_optimal)
                .output("roof_production_factor_percent", factor)
                .output("roof_loss_percent", loss)
                .step(format!("Roof pitch: {pitch}° ({}% loss vs optimal)", fixed(loss, 1)));
        }

        if let Some(height) = inputs.number("panel_height_m") {
            match row_spacing(height, recommended, latitude) {
                Some(spacing) => {
                    out.output("row_spacing_m", spacing).step(format!(
                        "Row spacing = {height} m × sin({}°) ÷ tan({}°) = {} m",
                        fixed(recommended, 0),
                        fixed(90.0 - annual_optimal - EARTH_AXIAL_TILT_DEG, 1),
                        fixed(spacing, 2)
                    ));
                }
                None => {
                    out.output("row_spacing_m", NOT_DETERMINABLE)
                        .warn("Row spacing is not determinable: the winter sun stays below the horizon");
                }
            }
        }

        out.assume(format!("Latitude: {latitude}°"))
            .assume(format!("Hemisphere: {}", if northern { "Northern" } else { "Southern" }))
            .assume(format!("Seasonal Preference: {preference}"))
            .assume(format!(
                "Optimal Azimuth: {optimal_azimuth}° ({})",
                if northern { "South" } else { "North" }
            ))
            .assume("Minimum tilt for self-cleaning: 10°");

        out.insight(format!(
            "Optimal fixed tilt for {preference} optimization: {}°",
            fixed(recommended, 0)
        ))
        .insight(format!(
            "At this location, flat panels would produce {}% of optimal",
            fixed(flat_factor, 0)
        ))
        .insight(if installation == "fixed" {
            "Consider seasonal adjustment (2×/year) for ~5% more production".to_owned()
        } else {
            format!(
                "{} provides ~{}% more production",
                installation.replace('_', " "),
                fixed(gain - 100.0, 0)
            )
        });

        if let Some((pitch, loss)) = roof_loss {
            out.insight(format!(
                "Roof pitch of {pitch}° results in {}% production loss vs optimal",
                fixed(loss, 1)
            ));
            if loss > ROOF_LOSS_WARNING_PERCENT {
                out.warn(format!(
                    "Significant loss ({}%) due to roof pitch. Consider tilt frames or alternative location.",
                    fixed(loss, 1)
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn seasonal_optima_are_clamped() {
        let bag = InputBag::new().with("latitude", 20.0).with("seasonal_preference", "summer");
        let result = TiltOptimization.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.number("summer_optimal_tilt_deg"), Some(10.0));
        assert_eq!(result.number("winter_optimal_tilt_deg"), Some(35.0));
        assert_eq!(result.number("recommended_tilt_deg"), Some(10.0));

        let far_north = TiltOptimization.calculate(&InputBag::new().with("latitude", 70.0));
        assert_eq!(far_north.number("winter_optimal_tilt_deg"), Some(75.0));
    }

    #[test]
    fn equator_recommends_self_cleaning_minimum() {
        let result = TiltOptimization.calculate(&InputBag::new().with("latitude", 3.0));
        assert_eq!(result.number("annual_optimal_tilt_deg"), Some(3.0));
        assert_eq!(result.number("recommended_tilt_deg"), Some(10.0));
    }

    #[test]
    fn comparison_table_peaks_at_latitude() {
        let result = TiltOptimization.calculate(&InputBag::new().with("latitude", 35.0));
        let table = result.output("tilt_comparison").and_then(|v| v.as_table()).unwrap();
        assert_eq!(table.len(), COMPARISON_TILTS.len());
        let at_35 = table.iter().find(|r| r["tilt_deg"].as_number() == Some(35.0)).unwrap();
        assert_relative_eq!(at_35["production_factor_percent"].as_number().unwrap(), 100.0);
        assert_relative_eq!(production_factor(25.0, 35.0), 10f64.to_radians().cos().powi(2) * 100.0);
    }

    #[test]
    fn steep_roof_warns_about_loss() {
        let bag = InputBag::new()
            .with("latitude", 10.0)
            .with("roof_pitch_deg", 40.0)
            .with("installation_type", "single_axis_tracker");
        let result = TiltOptimization.calculate(&bag);
        assert!(result.success);
        assert_relative_eq!(result.number("roof_loss_percent").unwrap(), 25.0, epsilon = 1e-9);
        assert!(result.has_warning_containing("Significant loss"));
        assert_eq!(result.number("tracker_gain_percent"), Some(125.0));
    }

    #[test]
    fn azimuth_loss_and_row_spacing() {
        let bag = InputBag::new()
            .with("latitude", -30.0)
            .with("azimuth_deg", 20.0)
            .with("panel_height_m", 2.0);
        let result = TiltOptimization.calculate(&bag);
        assert_eq!(result.number("optimal_azimuth_deg"), Some(0.0));
        assert_relative_eq!(result.number("azimuth_loss_percent").unwrap(), 4.0, epsilon = 1e-9);
        let spacing = result.number("row_spacing_m").unwrap();
        let expected = 2.0 * 30f64.to_radians().sin() / 36.55f64.to_radians().tan();
        assert_relative_eq!(spacing, expected, epsilon = 1e-9);

        let polar = InputBag::new().with("latitude", 80.0).with("panel_height_m", 2.0);
        let result = TiltOptimization.calculate(&polar);
        assert_eq!(result.text("row_spacing_m"), Some(NOT_DETERMINABLE));
    }

    #[test]
    fn unknown_installation_or_season_is_rejected() {
        let bag = InputBag::new()
            .with("latitude", 35.0)
            .with("installation_type", "tracker")
            .with("seasonal_preference", "spring");
        let report = TiltOptimization.validate(&bag);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        for name in INSTALLATION_NAMES {
            let bag = InputBag::new().with("latitude", 35.0).with("installation_type", *name);
            assert!(TiltOptimization.validate(&bag).valid, "{name}");
        }
    }
}
