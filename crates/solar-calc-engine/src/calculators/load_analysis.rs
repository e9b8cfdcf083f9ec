//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Load factor, energy cost and a first-cut PV size from a consumption profile.

use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumString};

use super::grouped;
use crate::{
    calculator::Calculator,
    errors::{CalcEngineError, Result},
    model::InputBag,
    result::{fixed, ResultBuilder},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    sizing::{consumption_based_capacity, DEFAULT_PERFORMANCE_RATIO},
    validation::ValidationRule,
};

pub const ASSUMED_PEAK_SUN_HOURS: f64 = 5.0;
pub const DEFAULT_ELECTRICITY_RATE: f64 = 0.12;
const DAYS_PER_MONTH: f64 = 30.0;
const STORAGE_LOAD_FACTOR_PERCENT: f64 = 40.0;

const LOAD_TYPE_NAMES: &[&str] = &["residential", "commercial", "industrial", "agricultural", "mixed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LoadType {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    #[default]
    Mixed,
}

impl LoadType {
    pub fn parse(raw: &str) -> Result<Self> {
        Self::from_str(raw.trim()).map_err(|_| {
            CalcEngineError::invalid_input("load_type", format!("unknown load type '{raw}'"))
        })
    }

    /// Base load as a share of peak demand.
    pub fn base_factor(&self) -> f64 {
        match self {
            LoadType::Residential => 0.3,
            LoadType::Commercial => 0.5,
            LoadType::Industrial => 0.7,
            LoadType::Agricultural => 0.4,
            LoadType::Mixed => 0.45,
        }
    }

    pub fn peak_hours(&self) -> &'static str {
        match self {
            LoadType::Residential => "6-9 PM",
            LoadType::Commercial => "9 AM-6 PM",
            LoadType::Industrial => "Shift-dependent",
            LoadType::Agricultural => "Seasonal/Daytime",
            LoadType::Mixed => "Variable",
        }
    }

    pub fn solar_match(&self) -> &'static str {
        match self {
            LoadType::Residential => "Moderate (evening peak)",
            LoadType::Commercial => "Excellent (daytime operation)",
            LoadType::Industrial => "Good (consistent load)",
            LoadType::Agricultural => "Good (irrigation pumping)",
            LoadType::Mixed => "Moderate",
        }
    }
}

pub fn load_factor_interpretation(load_factor_percent: f64) -> &'static str {
    if load_factor_percent < 30.0 {
        "Low - high peak relative to average (typical residential)"
    } else if load_factor_percent < 50.0 {
        "Moderate - some variation (small commercial)"
    } else if load_factor_percent < 70.0 {
        "Good - relatively consistent (large commercial)"
    } else {
        "Excellent - very consistent load (industrial)"
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "load_analysis",
    name: "Load Profile Analysis",
    description: "Analyze consumption patterns, load factor and energy cost",
    category: Category::Sizing,
    inputs: vec![
        InputField::number("daily_consumption_kwh", "Daily Consumption")
            .unit("kWh")
            .required()
            .at_least(0.0),
        InputField::number("peak_demand_kw", "Peak Demand")
            .unit("kW")
            .required()
            .at_least(0.0),
        InputField::number("operating_hours", "Operating Hours")
            .unit("hours/day")
            .default_number(24.0)
            .bounds(1.0, 24.0),
        InputField::choice(
            "load_type",
            "Load Type",
            LOAD_TYPE_NAMES,
        )
        .default_text("mixed"),
        InputField::number("monthly_bill", "Monthly Electricity Bill")
            .unit("$")
            .describe("Used to derive the rate when none is given"),
        InputField::number("electricity_rate", "Electricity Rate")
            .unit("$/kWh")
            .describe("Cost per kWh (calculated from bill if not provided)"),
    ],
    rules: vec![
        ValidationRule::required("daily_consumption_kwh", "Daily consumption is required"),
        ValidationRule::positive("daily_consumption_kwh", "Daily consumption must be positive"),
        ValidationRule::required("peak_demand_kw", "Peak demand is required"),
        ValidationRule::positive("peak_demand_kw", "Peak demand must be positive"),
        ValidationRule::range("operating_hours", 1.0, 24.0, "Operating hours should be 1-24"),
        ValidationRule::positive("monthly_bill", "Monthly bill must be positive"),
        ValidationRule::positive("electricity_rate", "Electricity rate must be positive"),
        ValidationRule::one_of("load_type", LOAD_TYPE_NAMES, "Unknown load type"),
    ],
    formulas: vec![
        Formula {
            name: "Average Load",
            expression: "Average Load (kW) = Daily Consumption ÷ Operating Hours",
            description: "Average power draw during operation",
            variables: &[],
        },
        Formula {
            name: "Load Factor",
            expression: "LF = Average Load ÷ Peak Load × 100",
            description: "Ratio of average to peak demand",
            variables: &[("Higher LF", "Consistent load (industrial)"), ("Lower LF", "Spiky demand (residential)")],
        },
        Formula {
            name: "Monthly Consumption",
            expression: "Monthly (kWh) = Daily Consumption × 30",
            description: "Estimated monthly energy usage",
            variables: &[],
        },
        Formula {
            name: "Annual Consumption",
            expression: "Annual (kWh) = Daily Consumption × 365",
            description: "Estimated annual energy usage",
            variables: &[],
        },
        Formula {
            name: "Recommended PV Size",
            expression: "PV (kWp) = Annual Consumption ÷ (PSH × 365 × PR)",
            description: "Solar size offsetting the annual consumption",
            variables: &[("PSH", "Peak Sun Hours"), ("PR", "Performance Ratio")],
        },
    ],
    standards: vec![
        StandardValue::text("Residential Load Factor", "20-40", "%", "Industry Average"),
        StandardValue::text("Commercial Load Factor", "40-60", "%", "Industry Average"),
        StandardValue::text("Industrial Load Factor", "60-80", "%", "Industry Average"),
        StandardValue::number("Performance Ratio", DEFAULT_PERFORMANCE_RATIO, "", "IEC 61724"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadAnalysis;

impl Calculator for LoadAnalysis {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let daily = inputs.number_or("daily_consumption_kwh", 0.0);
        let peak = inputs.number_or("peak_demand_kw", 0.0);
        let hours = inputs.number_or("operating_hours", 24.0);
        let load_type = LoadType::parse(inputs.text_or("load_type", "mixed"))?;

        let average = daily / hours;
        let load_factor = average / peak * 100.0;
        let base_load = peak * load_type.base_factor();
        let monthly = daily * DAYS_PER_MONTH;
        let annual = daily * 365.0;

        let (rate, rate_source) = match (inputs.number("electricity_rate"), inputs.number("monthly_bill")) {
            (Some(rate), _) => (rate, "given"),
            (None, Some(bill)) if monthly > 0.0 => (bill / monthly, "derived from bill"),
            _ => (DEFAULT_ELECTRICITY_RATE, "default"),
        };

        let pv_size = consumption_based_capacity(daily, ASSUMED_PEAK_SUN_HOURS, DEFAULT_PERFORMANCE_RATIO);
        let production = pv_size * ASSUMED_PEAK_SUN_HOURS * 365.0 * DEFAULT_PERFORMANCE_RATIO;
        let offset = if annual > 0.0 { production / annual * 100.0 } else { 0.0 };
        let interpretation = load_factor_interpretation(load_factor);
        let needs_storage = load_type == LoadType::Residential || load_factor < STORAGE_LOAD_FACTOR_PERCENT;

        out.output("average_load_kw", average)
            .output("peak_demand_kw", peak)
            .output("load_factor_percent", load_factor)
            .output("load_factor_rating", interpretation)
            .output("base_load_kw", base_load)
            .output("monthly_consumption_kwh", monthly)
            .output("annual_consumption_kwh", annual)
            .output("effective_rate", rate)
            .output("daily_cost", daily * rate)
            .output("monthly_cost", monthly * rate)
            .output("annual_cost", annual * rate)
            .output("recommended_pv_kwp", pv_size)
            .output("estimated_annual_production_kwh", production)
            .output("solar_offset_percent", offset)
            .output("needs_storage", needs_storage);

        out.step(format!(
            "Average Load = {daily} kWh ÷ {hours} hours = {} kW",
            fixed(average, 2)
        ))
        .step(format!(
            "Load Factor = {} kW ÷ {peak} kW × 100 = {}%",
            fixed(average, 2),
            fixed(load_factor, 1)
        ))
        .step(format!(
            "Estimated Base Load = {peak} kW × {} = {} kW",
            load_type.base_factor(),
            fixed(base_load, 2)
        ))
        .step(format!("Monthly Consumption = {daily} × 30 = {} kWh", fixed(monthly, 0)))
        .step(format!("Annual Consumption = {daily} × 365 = {} kWh", fixed(annual, 0)))
        .step(format!(
            "Annual Cost = {} kWh × ${}/kWh = ${}",
            fixed(annual, 0),
            fixed(rate, 3),
            grouped(annual * rate, 2)
        ))
        .step(format!(
            "Recommended PV = {} ÷ ({ASSUMED_PEAK_SUN_HOURS} × 365 × {DEFAULT_PERFORMANCE_RATIO}) = {} kWp",
            fixed(annual, 0),
            fixed(pv_size, 1)
        ));

        out.assume(format!("Load Type: {}", load_type.as_ref()))
            .assume(format!("Operating Hours: {hours} hours/day"))
            .assume(format!("Electricity Rate: ${}/kWh ({rate_source})", fixed(rate, 3)))
            .assume(format!("Average PSH: {ASSUMED_PEAK_SUN_HOURS} hours (adjust for location)"))
            .assume(format!("Performance Ratio: {}%", fixed(DEFAULT_PERFORMANCE_RATIO * 100.0, 0)));

        out.insight(format!(
            "Load Factor of {}% indicates {}",
            fixed(load_factor, 1),
            interpretation.to_lowercase()
        ))
        .insight(format!(
            "A {} kWp solar system can offset ~{}% of your consumption",
            fixed(pv_size, 1),
            fixed(offset, 0)
        ))
        .insight(format!(
            "Solar-load matching: {} - Peak hours: {}",
            load_type.solar_match(),
            load_type.peak_hours()
        ))
        .insight(if needs_storage {
            "Battery storage recommended to capture solar during day for evening use"
        } else {
            "Direct solar consumption possible during operating hours"
        });

        if average > peak {
            out.warn("Average load exceeds peak demand - check consumption and operating hours");
        }
        Ok(())
    }
}
