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

use super::{grouped, whole_years};
use crate::{
    calculator::Calculator,
    errors::Result,
    financial::{CashFlowSeries, FinancialParameters},
    model::InputBag,
    result::{fixed, ResultBuilder, NOT_DETERMINABLE},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

/// kg CO₂ absorbed by a mature tree per year.
pub const TREE_ABSORPTION_KG: f64 = 22.0;
/// kg CO₂ per km for an average passenger car.
pub const CAR_EMISSIONS_KG_PER_KM: f64 = 0.12;
/// kg CO₂ for one economy long-haul flight (0.255 kg/km over 5600 km).
pub const FLIGHT_EMISSIONS_KG: f64 = 0.255 * 5600.0;
/// kg CO₂ per household per year.
pub const HOME_EMISSIONS_KG: f64 = 8000.0;
/// Manufacturing emissions per kWp of modules.
pub const EMBODIED_CARBON_KG_PER_KWP: f64 = 40.0;

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "carbon_offset",
    name: "Carbon Offset Analysis",
    description: "CO₂ avoided by PV generation and everyday equivalents",
    category: Category::Environmental,
    inputs: vec![
        InputField::number("annual_production_kwh", "Annual Energy Production")
            .unit("kWh")
            .required()
            .at_least(0.0),
        InputField::number("grid_emission_factor", "Grid Emission Factor")
            .unit("kg CO₂/kWh")
            .default_number(0.45)
            .bounds(0.0, 2.0)
            .describe("Carbon intensity of the displaced grid electricity"),
        InputField::number("project_lifetime_years", "Project Lifetime")
            .unit("years")
            .default_number(25.0)
            .bounds(1.0, 40.0),
        InputField::number("degradation_percent", "Annual Degradation")
            .unit("%")
            .default_number(0.5)
            .bounds(0.0, 2.0),
        InputField::number("system_capacity_kwp", "System Capacity")
            .unit("kWp")
            .describe("Enables the carbon payback estimate"),
    ],
    rules: vec![
        ValidationRule::required("annual_production_kwh", "Annual production is required"),
        ValidationRule::positive("annual_production_kwh", "Annual production must be positive"),
        ValidationRule::range("grid_emission_factor", 0.0, 2.0, "Emission factor should be 0-2 kg/kWh"),
        ValidationRule::range("project_lifetime_years", 1.0, 40.0, "Project lifetime should be 1-40 years"),
        ValidationRule::range("degradation_percent", 0.0, 2.0, "Degradation should be 0-2%"),
        ValidationRule::positive("system_capacity_kwp", "System capacity must be positive"),
    ],
    formulas: vec![
        Formula {
            name: "Annual CO₂ Avoided",
            expression: "CO₂ = E × EF",
            description: "Production times grid emission factor",
            variables: &[("E", "Annual production (kWh)"), ("EF", "Grid emission factor (kg/kWh)")],
        },
        Formula {
            name: "Lifetime CO₂ Avoided",
            expression: "CO₂_life = Σ E × (1 - d)^(n-1) × EF",
            description: "Degraded production summed over the lifetime",
            variables: &[],
        },
        Formula {
            name: "Equivalent Trees",
            expression: "Trees = CO₂ / 22",
            description: "Mature trees absorbing the same CO₂",
            variables: &[],
        },
        Formula {
            name: "Equivalent Driving Distance",
            expression: "km = CO₂ / 0.12",
            description: "Car travel emitting the same CO₂",
            variables: &[],
        },
        Formula {
            name: "Carbon Payback Period",
            expression: "Months = (P × 40) / CO₂_annual × 12",
            description: "Time to offset manufacturing emissions",
            variables: &[("P", "System capacity (kWp)")],
        },
    ],
    standards: vec![
        StandardValue::number("World Average Grid Factor", 0.45, "kg CO₂/kWh", "IEA"),
        StandardValue::number("Coal-Heavy Grid", 0.9, "kg CO₂/kWh", "IEA"),
        StandardValue::number("Gas-Dominated Grid", 0.4, "kg CO₂/kWh", "IEA"),
        StandardValue::number("Clean Grid (Hydro/Nuclear)", 0.05, "kg CO₂/kWh", "IEA"),
        StandardValue::number("Tree CO₂ Absorption", TREE_ABSORPTION_KG, "kg/year", "USDA"),
        StandardValue::number("Car Emissions", CAR_EMISSIONS_KG_PER_KM, "kg/km", "EPA"),
        StandardValue::number("Panel Embodied Carbon", EMBODIED_CARBON_KG_PER_KWP, "kg/kWp", "Lifecycle studies"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct CarbonOffset;

impl Calculator for CarbonOffset {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let production = inputs.number_or("annual_production_kwh", 0.0);
        let factor = inputs.number_or("grid_emission_factor", 0.45);
        let lifetime = whole_years(inputs.number_or("project_lifetime_years", 25.0));
        let degradation = inputs.fraction_or("degradation_percent", 0.5);
        let years = f64::from(lifetime);

        let series = CashFlowSeries::project(&FinancialParameters {
            degradation,
            ..FinancialParameters::new(0.0, production, 1.0, lifetime)
        });
        let lifetime_production = series.total_production();

        let annual_kg = production * factor;
        let lifetime_kg = lifetime_production * factor;
        let annual_trees = annual_kg / TREE_ABSORPTION_KG;
        let annual_km = annual_kg / CAR_EMISSIONS_KG_PER_KM;
        let lifetime_km = lifetime_kg / CAR_EMISSIONS_KG_PER_KM;
        let trees_planted = (lifetime_kg / TREE_ABSORPTION_KG / years).round();
        let flights = (lifetime_kg / FLIGHT_EMISSIONS_KG).round();
        let homes = (lifetime_kg / (HOME_EMISSIONS_KG * years)).round();

        out.output("annual_co2_kg", annual_kg)
            .output("annual_co2_tonnes", annual_kg / 1000.0)
            .output("annual_tree_equivalent", annual_trees)
            .output("annual_driving_km", annual_km)
            .output("lifetime_production_kwh", lifetime_production)
            .output("lifetime_co2_tonnes", lifetime_kg / 1000.0)
            .output("lifetime_tree_years", lifetime_kg / TREE_ABSORPTION_KG)
            .output("lifetime_driving_km", lifetime_km)
            .output("trees_planted", trees_planted)
            .output("flights_avoided", flights)
            .output("homes_equivalent", homes);

        out.step(format!(
            "Annual CO₂ avoided = {} kWh × {factor} kg/kWh = {} kg",
            grouped(production, 0),
            grouped(annual_kg, 0)
        ))
        .step(format!(
            "Annual tree equivalent = {} kg ÷ 22 kg/tree = {} trees",
            grouped(annual_kg, 0),
            fixed(annual_trees, 0)
        ))
        .step(format!(
            "Annual driving equivalent = {} kg ÷ 0.12 kg/km = {} km",
            grouped(annual_kg, 0),
            grouped(annual_km, 0)
        ))
        .step(format!(
            "Lifetime production (with {}% degradation) = {} kWh",
            fixed(degradation * 100.0, 1),
            grouped(lifetime_production, 0)
        ))
        .step(format!("Lifetime CO₂ avoided = {} tonnes", fixed(lifetime_kg / 1000.0, 1)));

        let mut payback_months = None;
        if let Some(capacity) = inputs.number("system_capacity_kwp") {
            let embodied = capacity * EMBODIED_CARBON_KG_PER_KWP;
            out.output("embodied_carbon_kg", embodied).step(format!(
                "Embodied carbon = {capacity} kWp × 40 kg/kWp = {} kg",
                fixed(embodied, 0)
            ));
            if annual_kg > 0.0 {
                let months = embodied / annual_kg * 12.0;
                payback_months = Some(months);
                out.output("carbon_payback_months", months).step(format!(
                    "Carbon payback = {} kg ÷ {} kg/year × 12 = {} months",
                    fixed(embodied, 0),
                    fixed(annual_kg, 0),
                    fixed(months, 1)
                ));
            } else {
                out.output("carbon_payback_months", NOT_DETERMINABLE)
                    .warn("Carbon payback is not determinable: the grid emission factor avoids no CO₂");
            }
        }

        out.assume(format!("Grid emission factor: {factor} kg CO₂/kWh"))
            .assume(format!("Annual degradation: {}%", fixed(degradation * 100.0, 1)))
            .assume("Tree absorption: 22 kg CO₂/year (mature tree)")
            .assume("Car emissions: 0.12 kg CO₂/km")
            .assume("Panel embodied carbon: 40 kg CO₂/kWp");

        out.insight(format!(
            "Your solar system will avoid {} tonnes of CO₂ over {lifetime} years",
            fixed(lifetime_kg / 1000.0, 1)
        ))
        .insight(format!(
            "This is equivalent to planting {trees_planted} trees and letting them grow for {lifetime} years"
        ))
        .insight(format!("Or avoiding {} km of car travel", grouped(lifetime_km, 0)));
        if let Some(months) = payback_months {
            out.insight(format!(
                "The system's manufacturing emissions are offset in just {} months",
                fixed(months, 1)
            ));
        }
        Ok(())
    }
}
