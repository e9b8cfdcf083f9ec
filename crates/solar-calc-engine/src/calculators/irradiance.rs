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

use super::{energy_production::seasonal_factor, grouped};
use crate::{
    calculator::Calculator,
    errors::Result,
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::default_azimuth,
    validation::ValidationRule,
};

/// Loss per degree away from the annual optimum tilt.
pub const TILT_LOSS_PER_DEG: f64 = 0.003;
/// Loss per degree away from equator-facing azimuth.
pub const AZIMUTH_LOSS_PER_DEG: f64 = 0.002;

/// `(upper |latitude|, average PSH, typical range)` with the lower bound inclusive.
const PSH_BANDS: [(f64, f64, &str); 7] = [
    (15.0, 6.0, "5.5-6.5"),
    (25.0, 5.5, "5.0-6.0"),
    (35.0, 5.0, "4.5-5.5"),
    (45.0, 4.5, "4.0-5.0"),
    (55.0, 3.8, "3.5-4.5"),
    (65.0, 3.0, "2.5-3.5"),
    (90.0, 2.5, "2.0-3.0"),
];

pub fn psh_for_latitude(latitude: f64) -> (f64, &'static str) {
    let lat = latitude.abs();
    PSH_BANDS
        .iter()
        .find(|(upper, _, _)| lat < *upper)
        .map(|(_, psh, range)| (*psh, *range))
        .unwrap_or((2.5, "2.0-3.0"))
}

/// Smallest angle between two compass bearings.
pub fn azimuth_deviation(azimuth: f64, optimum: f64) -> f64 {
    let diff = (azimuth - optimum).abs() % 360.0;
    diff.min(360.0 - diff)
}

pub fn resource_quality(psh: f64) -> &'static str {
    if psh >= 5.5 {
        "Excellent"
    } else if psh >= 4.5 {
        "Good"
    } else if psh >= 3.5 {
        "Moderate"
    } else {
        "Low"
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "irradiance_calculation",
    name: "Solar Irradiance Calculation",
    description: "Estimate peak sun hours and plane-of-array irradiance from location and orientation",
    category: Category::Environmental,
    inputs: vec![
        InputField::number("latitude", "Latitude")
            .unit("°")
            .required()
            .bounds(-90.0, 90.0),
        InputField::number("longitude", "Longitude")
            .unit("°")
            .bounds(-180.0, 180.0),
        InputField::number("tilt_deg", "Panel Tilt")
            .unit("°")
            .bounds(0.0, 90.0)
            .describe("Defaults to the absolute latitude"),
        InputField::number("azimuth_deg", "Panel Azimuth")
            .unit("°")
            .bounds(0.0, 360.0)
            .describe("Defaults to equator-facing (180° north, 0° south)"),
        InputField::number("system_capacity_kwp", "System Capacity")
            .unit("kWp")
            .describe("Adds a production estimate when given"),
        InputField::number("performance_ratio_percent", "Performance Ratio")
            .unit("%")
            .default_number(80.0)
            .bounds(50.0, 95.0),
    ],
    rules: vec![
        ValidationRule::required("latitude", "Latitude is required"),
        ValidationRule::range("latitude", -90.0, 90.0, "Latitude must be -90 to +90"),
        ValidationRule::range("longitude", -180.0, 180.0, "Longitude must be -180 to +180"),
        ValidationRule::range("tilt_deg", 0.0, 90.0, "Tilt must be 0-90°"),
        ValidationRule::range("azimuth_deg", 0.0, 360.0, "Azimuth must be 0-360°"),
        ValidationRule::positive("system_capacity_kwp", "System capacity must be positive"),
        ValidationRule::range("performance_ratio_percent", 50.0, 95.0, "PR should be 50-95%"),
    ],
    formulas: vec![
        Formula {
            name: "Global Horizontal Irradiance (GHI)",
            expression: "GHI = DNI × cos(θz) + DHI",
            description: "Total irradiance on a horizontal surface",
            variables: &[("DNI", "Direct Normal Irradiance"), ("DHI", "Diffuse Horizontal Irradiance"), ("θz", "Solar zenith angle")],
        },
        Formula {
            name: "Plane of Array Irradiance (POA)",
            expression: "POA = DNI × cos(AOI) + DHI × (1 + cos β)/2 + GHI × ρ × (1 - cos β)/2",
            description: "Total irradiance on the tilted panel surface",
            variables: &[("AOI", "Angle of incidence"), ("β", "Panel tilt"), ("ρ", "Ground albedo")],
        },
        Formula {
            name: "Peak Sun Hours (PSH)",
            expression: "PSH = Daily Irradiation (kWh/m²/day) ÷ 1 kW/m²",
            description: "Equivalent hours of 1000 W/m² irradiance",
            variables: &[],
        },
        Formula {
            name: "Adjusted PSH",
            expression: "PSH_adj = PSH × (1 - 0.003 × Δtilt) × (1 - 0.002 × Δazimuth)",
            description: "Orientation losses against the annual optimum",
            variables: &[],
        },
        Formula {
            name: "Optimal Tilt Angle",
            expression: "Optimal Tilt ≈ |Latitude| ± 15°",
            description: "Rule of thumb for annual tilt",
            variables: &[("±15°", "Subtract for summer, add for winter")],
        },
    ],
    standards: vec![
        StandardValue::text("Tropical PSH", "5.5-6.5", "hours", "NASA POWER"),
        StandardValue::text("Temperate PSH", "3.5-5.0", "hours", "NASA POWER"),
        StandardValue::text("Desert PSH", "6.0-7.5", "hours", "NASA POWER"),
        StandardValue::number("Ground Albedo", 0.2, "", "Standard"),
        StandardValue::number("Snow Albedo", 0.6, "", "Standard"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct IrradianceCalculation;

impl Calculator for IrradianceCalculation {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let latitude = inputs.number_or("latitude", 0.0);
        let longitude = inputs.number_or("longitude", 0.0);
        let optimal_tilt = latitude.abs();
        let optimal_azimuth = default_azimuth(latitude);
        let tilt = inputs.number_or("tilt_deg", optimal_tilt);
        let azimuth = inputs.number_or("azimuth_deg", optimal_azimuth);
        let pr = inputs.fraction_or("performance_ratio_percent", 80.0);

        let (base_psh, psh_range) = psh_for_latitude(latitude);
        let tilt_adjustment = 1.0 - (tilt - optimal_tilt).abs() * TILT_LOSS_PER_DEG;
        let azimuth_adjustment = 1.0 - azimuth_deviation(azimuth, optimal_azimuth) * AZIMUTH_LOSS_PER_DEG;
        let adjusted_psh = base_psh * tilt_adjustment * azimuth_adjustment;
        let annual_ghi = adjusted_psh * 365.0;
        let quality = resource_quality(adjusted_psh);

        let northern = latitude >= 0.0;
        let monthly: Vec<f64> = (0..12).map(|month| adjusted_psh * seasonal_factor(month, northern)).collect();
        let june = monthly[5];
        let december = monthly[11];

        out.output("base_psh", base_psh)
            .output("adjusted_psh", adjusted_psh)
            .output("annual_ghi_kwh_m2", annual_ghi)
            .output("optimal_tilt_deg", optimal_tilt)
            .output("tilt_adjustment", tilt_adjustment)
            .output("azimuth_adjustment", azimuth_adjustment)
            .output("monthly_psh", monthly)
            .output("solar_quality", quality);

        out.step(format!("Latitude: {latitude}° → Base PSH range: {psh_range} hours"))
            .step(format!("Optimal tilt for annual: {}°", fixed(optimal_tilt, 1)))
            .step(format!(
                "Tilt adjustment: {}% (tilt={tilt}° vs optimal={}°)",
                fixed(tilt_adjustment * 100.0, 1),
                fixed(optimal_tilt, 1)
            ))
            .step(format!(
                "Azimuth adjustment: {}% ({azimuth}° vs optimal={optimal_azimuth}°)",
                fixed(azimuth_adjustment * 100.0, 1)
            ))
            .step(format!(
                "Adjusted average PSH: {base_psh} × {} × {} = {} hours",
                fixed(tilt_adjustment, 3),
                fixed(azimuth_adjustment, 3),
                fixed(adjusted_psh, 2)
            ))
            .step(format!(
                "Annual GHI: {} × 365 = {} kWh/m²/year",
                fixed(adjusted_psh, 2),
                fixed(annual_ghi, 0)
            ));

        let mut production = None;
        if let Some(capacity) = inputs.number("system_capacity_kwp") {
            let daily = capacity * adjusted_psh * pr;
            let annual = capacity * annual_ghi * pr;
            let specific = annual / capacity;
            out.output("daily_production_kwh", daily)
                .output("monthly_production_kwh", annual / 12.0)
                .output("annual_production_kwh", annual)
                .output("specific_yield_kwh_kwp", specific)
                .step(format!(
                    "Daily production: {capacity} kWp × {} × {pr} = {} kWh",
                    fixed(adjusted_psh, 2),
                    fixed(daily, 1)
                ))
                .step(format!("Annual production: {} kWh", fixed(annual, 0)))
                .step(format!("Specific yield: {} kWh/kWp/year", fixed(specific, 0)));
            production = Some((annual, specific));
        }

        out.assume(format!("Latitude: {latitude}°, Longitude: {longitude}°"))
            .assume(format!("Panel Tilt: {tilt}°"))
            .assume(format!("Panel Azimuth: {azimuth}°"))
            .assume(format!("Performance Ratio: {}%", fixed(pr * 100.0, 0)))
            .assume("Ground Albedo: 0.2 (standard)")
            .assume("Data: Estimated from latitude band");

        out.insight(format!(
            "Solar resource at this location is {quality} ({} PSH average)",
            fixed(adjusted_psh, 1)
        ));
        if (tilt - optimal_tilt).abs() > f64::EPSILON {
            out.insight(format!(
                "Consider adjusting tilt to {}° for optimal annual production",
                fixed(optimal_tilt, 0)
            ));
        } else {
            out.insight("Tilt angle is optimally set for annual production");
        }
        let (peak, low) = if northern { (june, december) } else { (december, june) };
        if adjusted_psh > 0.0 {
            out.insight(format!(
                "Peak-season months reach ~{}% of average, the darkest ~{}%",
                fixed(peak / adjusted_psh * 100.0, 0),
                fixed(low / adjusted_psh * 100.0, 0)
            ));
        }
        if let Some((annual, specific)) = production {
            out.insight(format!(
                "Expected annual production: {} kWh ({} kWh/kWp)",
                grouped(annual, 0),
                fixed(specific, 0)
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
    fn optimal_orientation_keeps_band_psh() {
        let bag = InputBag::new().with("latitude", 20.0);
        let result = IrradianceCalculation.calculate(&bag);
        assert!(result.success);
        assert_relative_eq!(result.number("adjusted_psh").unwrap(), 5.5);
        assert_relative_eq!(result.number("annual_ghi_kwh_m2").unwrap(), 5.5 * 365.0, epsilon = 1e-9);
        assert_eq!(result.text("solar_quality"), Some("Excellent"));
        assert!(result.output("annual_production_kwh").is_none());
    }

    #[test]
    fn orientation_losses_multiply() {
        let bag = InputBag::new()
            .with("latitude", 40.0)
            .with("tilt_deg", 30.0)
            .with("azimuth_deg", 150.0)
            .with("system_capacity_kwp", 10.0);
        let result = IrradianceCalculation.calculate(&bag);
        let expected = 4.5 * (1.0 - 10.0 * 0.003) * (1.0 - 30.0 * 0.002);
        assert_relative_eq!(result.number("adjusted_psh").unwrap(), expected, epsilon = 1e-12);
        assert_relative_eq!(
            result.number("annual_production_kwh").unwrap(),
            10.0 * expected * 365.0 * 0.8,
            epsilon = 1e-9
        );
    }

    #[test]
    fn azimuth_deviation_wraps() {
        assert_relative_eq!(azimuth_deviation(350.0, 0.0), 10.0);
        assert_relative_eq!(azimuth_deviation(90.0, 180.0), 90.0);
    }

    #[test]
    fn missing_latitude_is_rejected() {
        let result = IrradianceCalculation.calculate(&InputBag::new());
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e == "Latitude is required"));
    }
}
