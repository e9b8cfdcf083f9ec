//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Monthly and lifetime energy yield from peak sun hours and performance ratio.

use once_cell::sync::Lazy;

use super::{grouped, MONTHS};
use crate::{
    calculator::Calculator,
    errors::Result,
    financial::{CashFlowSeries, FinancialParameters},
    model::{row, InputBag, OutputRow},
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::{capacity_factor_percent, specific_yield},
    validation::ValidationRule,
};

pub const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
/// Seasonal PSH multipliers for the northern hemisphere, January first.
pub const SEASONAL_FACTORS: [f64; 12] = [0.60, 0.70, 0.90, 1.00, 1.10, 1.15, 1.15, 1.10, 1.00, 0.85, 0.70, 0.55];
pub const LIFETIME_YEARS: u32 = 25;
const MILESTONE_YEARS: [u32; 6] = [1, 5, 10, 15, 20, 25];

/// Average daily peak sun hours by latitude band; 5.0 when the latitude is unknown.
pub fn estimate_peak_sun_hours(latitude: Option<f64>) -> f64 {
    let Some(latitude) = latitude else {
        return 5.0;
    };
    let lat = latitude.abs();
    if lat < 15.0 {
        6.0
    } else if lat < 25.0 {
        5.5
    } else if lat < 35.0 {
        5.0
    } else if lat < 45.0 {
        4.5
    } else if lat < 55.0 {
        3.8
    } else {
        3.0
    }
}

/// Seasonal factor for a month index, shifted six months south of the equator.
pub fn seasonal_factor(month: usize, northern: bool) -> f64 {
    if northern {
        SEASONAL_FACTORS[month % 12]
    } else {
        SEASONAL_FACTORS[(month + 6) % 12]
    }
}

pub fn yield_rating(specific_yield_kwh_kwp: f64) -> &'static str {
    if specific_yield_kwh_kwp > 1700.0 {
        "Excellent"
    } else if specific_yield_kwh_kwp > 1400.0 {
        "Good"
    } else if specific_yield_kwh_kwp > 1100.0 {
        "Moderate"
    } else {
        "Low"
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "energy_production",
    name: "Energy Production Estimate",
    description: "Estimate monthly and annual energy production with performance ratio",
    category: Category::Technical,
    inputs: vec![
        InputField::number("system_capacity_kwp", "System Capacity")
            .unit("kWp")
            .required()
            .at_least(0.0)
            .describe("Total installed DC capacity of the PV system"),
        InputField::number("latitude", "Latitude")
            .unit("°")
            .bounds(-90.0, 90.0)
            .describe("Location latitude for solar resource estimation"),
        InputField::number("peak_sun_hours", "Peak Sun Hours")
            .unit("hours")
            .bounds(1.0, 8.0)
            .describe("Average daily peak sun hours; estimated from latitude when omitted"),
        InputField::number("performance_ratio_percent", "Performance Ratio")
            .unit("%")
            .default_number(80.0)
            .bounds(50.0, 95.0)
            .describe("System performance ratio (accounts for all losses)"),
        InputField::number("degradation_percent", "Annual Degradation")
            .unit("%/year")
            .default_number(0.5)
            .bounds(0.0, 2.0),
    ],
    rules: vec![
        ValidationRule::required("system_capacity_kwp", "System capacity is required"),
        ValidationRule::positive("system_capacity_kwp", "System capacity must be positive"),
        ValidationRule::range("latitude", -90.0, 90.0, "Latitude must be between -90 and 90"),
        ValidationRule::range("peak_sun_hours", 1.0, 8.0, "Peak sun hours should be 1-8"),
        ValidationRule::range("performance_ratio_percent", 50.0, 95.0, "PR should be 50-95%"),
        ValidationRule::range("degradation_percent", 0.0, 2.0, "Degradation should be 0-2%"),
    ],
    formulas: vec![
        Formula {
            name: "Daily Energy Production",
            expression: "E_day = Capacity × PSH × PR",
            description: "Expected daily energy generation",
            variables: &[("Capacity", "System DC capacity (kWp)"), ("PSH", "Peak Sun Hours"), ("PR", "Performance Ratio")],
        },
        Formula {
            name: "Monthly Energy Production",
            expression: "E_month = Capacity × PSH × f_month × Days × PR",
            description: "Monthly output with a seasonal factor",
            variables: &[("f_month", "Seasonal factor")],
        },
        Formula {
            name: "Annual Energy Production",
            expression: "E_year = Capacity × PSH × 365 × PR",
            description: "Expected annual energy generation",
            variables: &[],
        },
        Formula {
            name: "Specific Yield",
            expression: "SY = E_year ÷ Capacity",
            description: "Energy produced per kWp installed",
            variables: &[],
        },
        Formula {
            name: "Capacity Factor",
            expression: "CF = E_year ÷ (Capacity × 8760) × 100",
            description: "Ratio of actual to theoretical maximum production",
            variables: &[("8760", "Hours in a year")],
        },
        Formula {
            name: "Year N Production",
            expression: "E_N = E_year × (1 - d)^(N-1)",
            description: "Production in year N accounting for degradation",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::text("Performance Ratio", "75-85", "%", "IEC 61724"),
        StandardValue::text("Specific Yield (Tropical)", "1500-1800", "kWh/kWp", "Industry Data"),
        StandardValue::text("Specific Yield (Temperate)", "1000-1400", "kWh/kWp", "Industry Data"),
        StandardValue::number("Degradation Rate", 0.5, "%/year", "NREL"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyProduction;

impl Calculator for EnergyProduction {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let capacity = inputs.number_or("system_capacity_kwp", 0.0);
        let latitude = inputs.number("latitude");
        let pr = inputs.fraction_or("performance_ratio_percent", 80.0);
        let degradation = inputs.fraction_or("degradation_percent", 0.5);
        let psh = inputs
            .number("peak_sun_hours")
            .unwrap_or_else(|| estimate_peak_sun_hours(latitude));

        let daily = capacity * psh * pr;
        let annual = daily * 365.0;
        let yield_kwh_kwp = specific_yield(annual, capacity);
        let capacity_factor = capacity_factor_percent(annual, capacity);
        let rating = yield_rating(yield_kwh_kwp);

        let northern = latitude.unwrap_or(0.0) >= 0.0;
        let mut monthly = Vec::with_capacity(12);
        let monthly_table: Vec<OutputRow> = MONTHS
            .iter()
            .zip(MONTH_DAYS)
            .enumerate()
            .map(|(index, (name, days))| {
                let month_psh = psh * seasonal_factor(index, northern);
                let production = capacity * month_psh * f64::from(days) * pr;
                monthly.push(production);
                row([
                    ("month", (*name).into()),
                    ("days", days.into()),
                    ("psh", month_psh.into()),
                    ("production_kwh", production.into()),
                ])
            })
            .collect();

        let peak_month = monthly
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let series = CashFlowSeries::project(&FinancialParameters {
            degradation,
            ..FinancialParameters::new(0.0, annual, 1.0, LIFETIME_YEARS)
        });
        let mut cumulative = 0.0;
        let mut lifetime_table = Vec::with_capacity(MILESTONE_YEARS.len());
        for year_row in &series.rows {
            cumulative += year_row.production;
            if MILESTONE_YEARS.contains(&year_row.year) {
                lifetime_table.push(row([
                    ("year", year_row.year.into()),
                    ("production_kwh", year_row.production.into()),
                    ("cumulative_kwh", cumulative.into()),
                ]));
            }
        }
        let total = series.total_production();
        let final_year = series.rows.last().map_or(annual, |year_row| year_row.production);
        let retained_percent = if annual > 0.0 { final_year / annual * 100.0 } else { 0.0 };

        out.output("peak_sun_hours", psh)
            .output("daily_production_kwh", daily)
            .output("monthly_average_kwh", annual / 12.0)
            .output("annual_production_kwh", annual)
            .output("specific_yield_kwh_kwp", yield_kwh_kwp)
            .output("capacity_factor_percent", capacity_factor)
            .output("monthly_production_kwh", monthly)
            .output("monthly_breakdown", monthly_table)
            .output("lifetime_production", lifetime_table)
            .output("year25_production_kwh", final_year)
            .output("total_25_year_kwh", total)
            .output("yield_quality", rating);

        out.step(format!(
            "Daily Production = {capacity} kWp × {} PSH × {} = {} kWh",
            fixed(psh, 1),
            fixed(pr, 2),
            fixed(daily, 1)
        ))
        .step(format!(
            "Annual Production = {capacity} kWp × {} × 365 × {} = {} kWh",
            fixed(psh, 1),
            fixed(pr, 2),
            fixed(annual, 0)
        ))
        .step(format!(
            "Specific Yield = {} ÷ {capacity} = {} kWh/kWp",
            fixed(annual, 0),
            fixed(yield_kwh_kwp, 0)
        ))
        .step(format!(
            "Capacity Factor = {} ÷ ({capacity} × 8760) × 100 = {}%",
            fixed(annual, 0),
            fixed(capacity_factor, 1)
        ))
        .step(format!(
            "Year 25 Production = {} × (1 - {}%)^24 = {} kWh",
            fixed(annual, 0),
            fixed(degradation * 100.0, 1),
            fixed(final_year, 0)
        ))
        .step(format!("25-Year Total = {} kWh", fixed(total, 0)));

        out.assume(format!("System Capacity: {capacity} kWp"))
            .assume(format!(
                "Peak Sun Hours: {} hours/day{}",
                fixed(psh, 1),
                if inputs.contains("peak_sun_hours") { "" } else { " (estimated from latitude)" }
            ))
            .assume(format!("Performance Ratio: {}%", fixed(pr * 100.0, 0)))
            .assume(format!("Annual Degradation: {}%", fixed(degradation * 100.0, 1)))
            .assume(match latitude {
                Some(lat) => format!("Latitude: {lat}°"),
                None => "Latitude: Not specified".to_owned(),
            });

        out.insight(format!("Expected annual production: {} kWh", grouped(annual, 0)))
            .insight(format!(
                "Specific yield of {} kWh/kWp is {}",
                fixed(yield_kwh_kwp, 0),
                rating.to_lowercase()
            ))
            .insight(format!(
                "Over 25 years, total production will be ~{} MWh",
                fixed(total / 1000.0, 0)
            ))
            .insight(format!(
                "Year 25 production will be ~{}% of Year 1",
                fixed(retained_percent, 0)
            ));
        if let Some((best, production)) = peak_month {
            out.insight(format!(
                "Peak month is {} with {} kWh",
                MONTHS[best],
                grouped(production, 0)
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
    fn annual_production_matches_worked_example() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("peak_sun_hours", 5.0);
        let result = EnergyProduction.calculate(&bag);
        assert!(result.success);
        assert_relative_eq!(result.number("daily_production_kwh").unwrap(), 40.0, epsilon = 1e-9);
        assert_relative_eq!(result.number("annual_production_kwh").unwrap(), 14_600.0, epsilon = 1e-9);
        assert_relative_eq!(result.number("specific_yield_kwh_kwp").unwrap(), 1_460.0, epsilon = 1e-9);
        assert_eq!(result.text("yield_quality"), Some("Good"));
        assert_relative_eq!(
            result.number("year25_production_kwh").unwrap(),
            14_600.0 * 0.995f64.powi(24),
            epsilon = 1e-6
        );
    }

    #[test]
    fn peak_sun_hours_follow_latitude_band() {
        assert_eq!(estimate_peak_sun_hours(None), 5.0);
        assert_eq!(estimate_peak_sun_hours(Some(10.0)), 6.0);
        assert_eq!(estimate_peak_sun_hours(Some(-40.0)), 4.5);
        assert_eq!(estimate_peak_sun_hours(Some(60.0)), 3.0);
        let bag = InputBag::new()
            .with("system_capacity_kwp", 1.0)
            .with("latitude", 50.0);
        assert_eq!(EnergyProduction.calculate(&bag).number("peak_sun_hours"), Some(3.8));
    }

    #[test]
    fn southern_hemisphere_shifts_seasons() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("peak_sun_hours", 5.0)
            .with("latitude", -33.0);
        let result = EnergyProduction.calculate(&bag);
        let monthly = result.output("monthly_production_kwh").and_then(|v| v.as_series()).unwrap();
        assert_eq!(monthly.len(), 12);
        // January takes July's factor south of the equator.
        assert_relative_eq!(monthly[0], 10.0 * 5.0 * 1.15 * 31.0 * 0.8, epsilon = 1e-9);
        assert!(monthly[0] > monthly[6]);
    }

    #[test]
    fn lifetime_table_has_milestones() {
        let bag = InputBag::new()
            .with("system_capacity_kwp", 10.0)
            .with("peak_sun_hours", 5.0)
            .with("degradation_percent", 0.0);
        let result = EnergyProduction.calculate(&bag);
        let table = result.output("lifetime_production").and_then(|v| v.as_table()).unwrap();
        assert_eq!(table.len(), 6);
        let last = &table[5];
        assert_eq!(last["year"].as_number(), Some(25.0));
        assert_relative_eq!(last["cumulative_kwh"].as_number().unwrap(), 14_600.0 * 25.0, epsilon = 1e-6);
        assert_relative_eq!(result.number("total_25_year_kwh").unwrap(), 14_600.0 * 25.0, epsilon = 1e-6);
    }
}
