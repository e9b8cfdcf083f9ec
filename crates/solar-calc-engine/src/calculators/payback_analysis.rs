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

use super::{band, grouped};
use crate::{
    calculator::Calculator,
    errors::Result,
    financial::{CashFlowSeries, FinancialParameters},
    model::InputBag,
    result::{fixed, ResultBuilder, NOT_DETERMINABLE, NOT_REACHED},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

pub const ANALYSIS_HORIZON_YEARS: u32 = 30;
const TABLE_YEARS: usize = 15;
const TYPICAL_LIFETIME_YEARS: f64 = 25.0;

const RATINGS: [(f64, &str); 4] = [
    (5.0, "Excellent"),
    (7.0, "Good"),
    (10.0, "Acceptable"),
    (15.0, "Marginal"),
];

pub fn payback_rating(years: Option<f64>) -> &'static str {
    match years {
        Some(years) => band(years, &RATINGS, "Poor"),
        None => "Poor",
    }
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "payback_analysis",
    name: "Payback Analysis",
    description: "Simple and discounted payback with degradation and price escalation",
    category: Category::Financial,
    inputs: vec![
        InputField::number("initial_investment", "Initial Investment").unit("$").required(),
        InputField::number("annual_savings", "Year 1 Savings")
            .unit("$")
            .required()
            .describe("Electricity bill savings in the first year"),
        InputField::number("maintenance_cost", "Annual Maintenance")
            .unit("$")
            .default_number(0.0),
        InputField::number("escalation_percent", "Electricity Price Escalation")
            .unit("%/year")
            .default_number(3.0)
            .bounds(0.0, 15.0),
        InputField::number("discount_rate_percent", "Discount Rate")
            .unit("%")
            .default_number(8.0)
            .bounds(0.0, 25.0),
        InputField::number("degradation_percent", "Panel Degradation")
            .unit("%/year")
            .default_number(0.5)
            .bounds(0.0, 2.0),
        InputField::number("incentives", "Incentives").unit("$").default_number(0.0),
    ],
    rules: vec![
        ValidationRule::required("initial_investment", "Initial investment is required"),
        ValidationRule::positive("initial_investment", "Investment must be positive"),
        ValidationRule::required("annual_savings", "Annual savings is required"),
        ValidationRule::positive("annual_savings", "Annual savings must be positive"),
        ValidationRule::min("maintenance_cost", 0.0, "Maintenance cost cannot be negative"),
        ValidationRule::range("escalation_percent", 0.0, 15.0, "Escalation should be 0-15%"),
        ValidationRule::range("discount_rate_percent", 0.0, 25.0, "Discount rate should be 0-25%"),
        ValidationRule::range("degradation_percent", 0.0, 2.0, "Degradation should be 0-2%"),
        ValidationRule::min("incentives", 0.0, "Incentives cannot be negative"),
    ],
    formulas: vec![
        Formula {
            name: "Simple Payback",
            expression: "Payback = Net Investment / Year 1 Net Savings",
            description: "Years to recover the investment at first-year savings",
            variables: &[],
        },
        Formula {
            name: "Year-n Savings",
            expression: "S_n = S_1 × (1 - d)^(n-1) × (1 + e)^(n-1)",
            description: "Savings adjusted for degradation d and escalation e",
            variables: &[("d", "Degradation"), ("e", "Escalation")],
        },
        Formula {
            name: "Break-even Interpolation",
            expression: "t = (n - 1) + |Cum_(n-1)| / (Cum_n - Cum_(n-1))",
            description: "Fractional year at which the cumulative flow crosses zero",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::text("Residential Payback", "6-10", "years", "Industry average"),
        StandardValue::text("Commercial Payback", "4-7", "years", "Industry average"),
        StandardValue::number("System Lifetime", 25.0, "years", "Panel warranty"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct PaybackAnalysis;

impl Calculator for PaybackAnalysis {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let investment = inputs.number_or("initial_investment", 0.0);
        let savings = inputs.number_or("annual_savings", 0.0);
        let params = FinancialParameters {
            incentives: inputs.number_or("incentives", 0.0),
            annual_om: inputs.number_or("maintenance_cost", 0.0),
            escalation: inputs.fraction_or("escalation_percent", 3.0),
            discount_rate: inputs.fraction_or("discount_rate_percent", 8.0),
            degradation: inputs.fraction_or("degradation_percent", 0.5),
            ..FinancialParameters::from_savings(investment, savings, ANALYSIS_HORIZON_YEARS)
        };
        let series = CashFlowSeries::project(&params);
        let net = series.net_initial_cost;
        let year1_net = series.rows.first().map_or(0.0, |row| row.net_cash_flow);

        let first_year_payback = (year1_net > 0.0).then(|| net / year1_net);
        let exact = series.simple_payback();
        let discounted = series.discounted_payback();
        let simple_rating = payback_rating(exact);
        let discounted_rating = payback_rating(discounted);

        out.output("net_investment", net)
            .output("year1_net_savings", year1_net)
            .output_or("first_year_payback_years", first_year_payback, NOT_DETERMINABLE)
            .output_or("simple_payback_years", exact, NOT_REACHED)
            .output_or("break_even_year", exact.map(f64::ceil), NOT_REACHED)
            .output_or("discounted_payback_years", discounted, NOT_REACHED)
            .output("simple_rating", simple_rating)
            .output("discounted_rating", discounted_rating)
            .output("cash_flow_table", series.table(TABLE_YEARS));

        let years = |value: Option<f64>| {
            value.map_or_else(|| NOT_REACHED.to_owned(), |v| format!("{} years", fixed(v, 2)))
        };
        out.step(format!(
            "Net Investment = ${} - ${} = ${}",
            grouped(investment, 0),
            grouped(params.incentives, 0),
            grouped(net, 0)
        ))
        .step(format!(
            "Year 1 Net Savings = ${} - ${} = ${}",
            grouped(savings, 0),
            grouped(params.annual_om, 0),
            grouped(year1_net, 0)
        ))
        .step(match first_year_payback {
            Some(payback) => format!(
                "Simple Payback = ${} ÷ ${} = {} years",
                grouped(net, 0),
                grouped(year1_net, 0),
                fixed(payback, 2)
            ),
            None => format!("Simple Payback = {NOT_DETERMINABLE} (year 1 net savings ≤ 0)"),
        })
        .step(format!("Exact Payback (degradation and escalation) = {}", years(exact)))
        .step(format!(
            "Discounted Payback (with {}% discount rate) = {}",
            fixed(params.discount_rate * 100.0, 1),
            years(discounted)
        ));
        if let Some(year10) = series.rows.get(9) {
            out.step(format!(
                "Year 10 Savings = ${} × {} × {} = ${}",
                grouped(savings, 0),
                fixed((1.0 - params.degradation).powi(9), 3),
                fixed((1.0 + params.escalation).powi(9), 3),
                grouped(year10.revenue, 0)
            ));
        }

        out.assume(format!("Electricity Escalation: {}%/year", fixed(params.escalation * 100.0, 1)))
            .assume(format!("Panel Degradation: {}%/year", fixed(params.degradation * 100.0, 1)))
            .assume(format!("Discount Rate: {}%", fixed(params.discount_rate * 100.0, 1)))
            .assume(format!("Maintenance: ${}/year", grouped(params.annual_om, 0)))
            .assume(format!("Analysis horizon: {ANALYSIS_HORIZON_YEARS} years"));

        match exact {
            Some(years) => out.insight(format!(
                "Simple payback of {} years is {}",
                fixed(years, 1),
                simple_rating.to_lowercase()
            )),
            None => out.insight(format!(
                "Investment is not recovered within {ANALYSIS_HORIZON_YEARS} years"
            )),
        };
        if let Some(years) = discounted {
            out.insight(format!(
                "Discounted payback of {} years accounts for time value of money",
                fixed(years, 1)
            ));
        }
        if params.escalation > params.degradation {
            out.insight(format!(
                "Electricity price escalation ({}%) exceeds degradation ({}%) - savings increase over time",
                fixed(params.escalation * 100.0, 1),
                fixed(params.degradation * 100.0, 1)
            ));
        } else {
            out.insight("Degradation exceeds escalation - savings may decrease over time");
        }
        if params.incentives > 0.0 && year1_net > 0.0 {
            out.insight(format!(
                "Incentives of ${} reduce payback by ~{} years",
                grouped(params.incentives, 0),
                fixed(params.incentives / year1_net, 1)
            ));
        } else if params.incentives <= 0.0 {
            out.insight("Consider available incentives to reduce payback period");
        }

        match exact {
            Some(years) if years > TYPICAL_LIFETIME_YEARS => {
                out.warn("Payback period exceeds typical 25-year system lifetime");
            }
            None => {
                out.warn(format!(
                    "Payback not reached within the {ANALYSIS_HORIZON_YEARS}-year analysis horizon"
                ));
            }
            Some(_) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_savings_pay_back_at_the_ratio() {
        let bag = InputBag::new()
            .with("initial_investment", 20_000.0)
            .with("annual_savings", 4_000.0)
            .with("escalation_percent", 0.0)
            .with("degradation_percent", 0.0);
        let result = PaybackAnalysis.calculate(&bag);
        assert!(result.success);
        assert_relative_eq!(result.number("first_year_payback_years").unwrap(), 5.0);
        assert_relative_eq!(result.number("simple_payback_years").unwrap(), 5.0, epsilon = 1e-9);
        assert_eq!(result.number("break_even_year"), Some(5.0));
        assert_eq!(result.text("simple_rating"), Some("Excellent"));
        let table = result.output("cash_flow_table").unwrap().as_table().unwrap();
        assert_eq!(table.len(), 15);
    }

    #[test]
    fn year_one_figures_come_from_the_cash_flow_table() {
        let bag = InputBag::new()
            .with("initial_investment", 12_000.0)
            .with("annual_savings", 2_400.0)
            .with("maintenance_cost", 150.0);
        let result = PaybackAnalysis.calculate(&bag);
        let table = result.output("cash_flow_table").unwrap().as_table().unwrap();
        let year1 = table[0]["net_cash_flow"].as_number().unwrap();
        assert_relative_eq!(result.number("year1_net_savings").unwrap(), year1);
        assert_relative_eq!(result.number("year1_net_savings").unwrap(), 2_250.0, epsilon = 1e-9);
        assert_relative_eq!(
            result.number("first_year_payback_years").unwrap(),
            12_000.0 / year1,
            epsilon = 1e-9
        );
    }

    #[test]
    fn discounted_payback_lags_simple() {
        let bag = InputBag::new()
            .with("initial_investment", 30_000.0)
            .with("annual_savings", 3_500.0)
            .with("maintenance_cost", 200.0)
            .with("incentives", 3_000.0);
        let result = PaybackAnalysis.calculate(&bag);
        let simple = result.number("simple_payback_years").unwrap();
        let discounted = result.number("discounted_payback_years").unwrap();
        assert!(discounted > simple);
        assert!(simple < 10.0);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn maintenance_swallowing_savings_is_not_determinable() {
        let bag = InputBag::new()
            .with("initial_investment", 10_000.0)
            .with("annual_savings", 500.0)
            .with("maintenance_cost", 500.0)
            .with("escalation_percent", 0.0);
        let result = PaybackAnalysis.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.text("first_year_payback_years"), Some(NOT_DETERMINABLE));
        assert_eq!(result.text("simple_payback_years"), Some(NOT_REACHED));
        assert_eq!(result.text("simple_rating"), Some("Poor"));
        assert!(result.has_warning_containing("not reached"));
        assert!(result.outputs.values().all(|value| value.is_finite()));
    }

    #[test]
    fn ratings_follow_bands() {
        assert_eq!(payback_rating(Some(7.0)), "Good");
        assert_eq!(payback_rating(Some(12.0)), "Marginal");
        assert_eq!(payback_rating(Some(16.0)), "Poor");
        assert_eq!(payback_rating(None), "Poor");
    }
}
