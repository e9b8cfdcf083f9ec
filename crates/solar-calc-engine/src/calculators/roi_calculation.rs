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

use super::{band, grouped, whole_years};
use crate::{
    calculator::Calculator,
    errors::Result,
    financial::{CashFlowSeries, FinancialParameters},
    model::{row, InputBag, OutputRow},
    result::{fixed, ResultBuilder, NOT_DETERMINABLE},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

const MILESTONE_YEARS: [u32; 5] = [5, 10, 15, 20, 25];
const LOW_ANNUALIZED_RETURN_PERCENT: f64 = 5.0;
const REFERENCE_DISCOUNT_PERCENT: f64 = 8.0;

pub fn roi_rating(roi_percent: f64) -> &'static str {
    if roi_percent > 200.0 {
        "Excellent"
    } else if roi_percent > 100.0 {
        "Good"
    } else if roi_percent > 50.0 {
        "Acceptable"
    } else if roi_percent > 0.0 {
        "Marginal"
    } else {
        "Poor"
    }
}

pub fn bcr_rating(bcr: f64) -> &'static str {
    band(bcr, &[(1.0, "Loss-making"), (1.5, "Acceptable"), (2.0, "Good")], "Excellent")
}

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "roi_calculation",
    name: "ROI Calculation",
    description: "Lifetime return on investment, benefit-cost ratio and milestone values",
    category: Category::Financial,
    inputs: vec![
        InputField::number("total_investment", "Total Investment").unit("$").required(),
        InputField::number("annual_savings", "Year 1 Savings").unit("$").required(),
        InputField::number("project_lifetime_years", "Project Lifetime")
            .unit("years")
            .default_number(25.0)
            .bounds(1.0, 40.0),
        InputField::number("annual_om_cost", "Annual O&M Cost").unit("$").default_number(0.0),
        InputField::number("escalation_percent", "Savings Escalation")
            .unit("%/year")
            .default_number(3.0)
            .bounds(0.0, 15.0),
        InputField::number("degradation_percent", "Annual Degradation")
            .unit("%/year")
            .default_number(0.5)
            .bounds(0.0, 2.0),
        InputField::number("incentives", "Incentives").unit("$").default_number(0.0),
        InputField::number("residual_value", "Residual Value")
            .unit("$")
            .default_number(0.0)
            .describe("Salvage or resale value at end of life"),
    ],
    rules: vec![
        ValidationRule::required("total_investment", "Total investment is required"),
        ValidationRule::positive("total_investment", "Investment must be positive"),
        ValidationRule::required("annual_savings", "Annual savings is required"),
        ValidationRule::positive("annual_savings", "Annual savings must be positive"),
        ValidationRule::range("project_lifetime_years", 1.0, 40.0, "Project lifetime should be 1-40 years"),
        ValidationRule::min("annual_om_cost", 0.0, "O&M cost cannot be negative"),
        ValidationRule::range("escalation_percent", 0.0, 15.0, "Escalation should be 0-15%"),
        ValidationRule::range("degradation_percent", 0.0, 2.0, "Degradation should be 0-2%"),
        ValidationRule::min("incentives", 0.0, "Incentives cannot be negative"),
        ValidationRule::min("residual_value", 0.0, "Residual value cannot be negative"),
    ],
    formulas: vec![
        Formula {
            name: "Return on Investment",
            expression: "ROI = (Total Benefits - Total Costs) / Total Costs × 100",
            description: "Lifetime net gain relative to lifetime cost",
            variables: &[],
        },
        Formula {
            name: "Annualized ROI",
            expression: "ROI_annual = ROI / Lifetime",
            description: "Average yearly return",
            variables: &[],
        },
        Formula {
            name: "Benefit-Cost Ratio",
            expression: "BCR = Total Benefits / Total Costs",
            description: "Benefits returned per unit of cost",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::text("Good ROI", "> 100", "%", "Over 25 years"),
        StandardValue::text("Acceptable BCR", "> 1.0", "", "Break-even"),
        StandardValue::number("Reference Discount Rate", REFERENCE_DISCOUNT_PERCENT, "%", "Industry practice"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct RoiCalculation;

fn milestones(series: &CashFlowSeries) -> Vec<OutputRow> {
    MILESTONE_YEARS
        .iter()
        .filter(|&&year| year as usize <= series.rows.len())
        .map(|&year| {
            let rows = &series.rows[..year as usize];
            let benefits: f64 = rows.iter().map(|r| r.revenue).sum();
            let costs = series.net_initial_cost + rows.iter().map(|r| r.om).sum::<f64>();
            row([
                ("year", year.into()),
                ("benefits", benefits.into()),
                ("costs", costs.into()),
                ("net", (benefits - costs).into()),
            ])
        })
        .collect()
}

impl Calculator for RoiCalculation {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let investment = inputs.number_or("total_investment", 0.0);
        let savings = inputs.number_or("annual_savings", 0.0);
        let lifetime = whole_years(inputs.number_or("project_lifetime_years", 25.0));
        let params = FinancialParameters {
            incentives: inputs.number_or("incentives", 0.0),
            annual_om: inputs.number_or("annual_om_cost", 0.0),
            escalation: inputs.fraction_or("escalation_percent", 3.0),
            degradation: inputs.fraction_or("degradation_percent", 0.5),
            residual_value: inputs.number_or("residual_value", 0.0),
            ..FinancialParameters::from_savings(investment, savings, lifetime)
        };
        let series = CashFlowSeries::project(&params);

        let costs = series.total_costs();
        let benefits = series.total_benefits();
        let net_benefit = benefits - costs;
        let roi = series.roi();
        let annualized = roi.map(|roi| roi / f64::from(lifetime));
        let bcr = (costs > 0.0).then(|| benefits / costs);

        out.output("net_investment", series.net_initial_cost)
            .output("total_benefits", benefits)
            .output("total_costs", costs)
            .output("total_om_cost", series.total_om())
            .output("net_benefit", net_benefit)
            .output_or("roi_percent", roi, NOT_DETERMINABLE)
            .output_or("annualized_roi_percent", annualized, NOT_DETERMINABLE)
            .output_or("benefit_cost_ratio", bcr, NOT_DETERMINABLE)
            .output("roi_rating", roi.map_or(NOT_DETERMINABLE, roi_rating))
            .output("bcr_rating", bcr.map_or(NOT_DETERMINABLE, bcr_rating))
            .output("milestones", milestones(&series));

        out.step(format!(
            "Net Investment = ${} - ${} = ${}",
            grouped(investment, 0),
            grouped(params.incentives, 0),
            grouped(series.net_initial_cost, 0)
        ))
        .step(format!(
            "Lifetime Benefits = Σ(adjusted savings) + ${} residual = ${}",
            grouped(params.residual_value, 0),
            grouped(benefits, 0)
        ))
        .step(format!(
            "Total Costs = ${} + (${} × {lifetime}) = ${}",
            grouped(series.net_initial_cost, 0),
            grouped(params.annual_om, 0),
            grouped(costs, 0)
        ))
        .step(format!(
            "Net Benefit = ${} - ${} = ${}",
            grouped(benefits, 0),
            grouped(costs, 0),
            grouped(net_benefit, 0)
        ));

        out.assume(format!("Project Lifetime: {lifetime} years"))
            .assume(format!("Savings Escalation: {}%/year", fixed(params.escalation * 100.0, 1)))
            .assume(format!("Degradation: {}%/year", fixed(params.degradation * 100.0, 1)))
            .assume(format!("Annual O&M: ${}", grouped(params.annual_om, 0)))
            .assume(format!("Residual Value: ${}", grouped(params.residual_value, 0)));

        let (Some(roi), Some(annualized), Some(bcr)) = (roi, annualized, bcr) else {
            out.insight(format!(
                "Net benefit of ${} over system lifetime",
                grouped(net_benefit, 0)
            ))
            .warn("Incentives cover the whole lifetime cost; ROI and BCR are not determinable");
            return Ok(());
        };
        let roi_label = roi_rating(roi);
        let bcr_label = bcr_rating(bcr);

        out.step(format!(
            "ROI = ${} ÷ ${} × 100 = {}%",
            grouped(net_benefit, 0),
            grouped(costs, 0),
            fixed(roi, 1)
        ))
        .step(format!(
            "Annualized ROI = {}% ÷ {lifetime} = {}%",
            fixed(roi, 1),
            fixed(annualized, 2)
        ))
        .step(format!(
            "BCR = ${} ÷ ${} = {}",
            grouped(benefits, 0),
            grouped(costs, 0),
            fixed(bcr, 2)
        ));

        let direction = if roi > 100.0 {
            "more than doubling"
        } else if roi > 0.0 {
            "positive return on"
        } else {
            "loss on"
        };
        out.insight(format!(
            "ROI of {}% over {lifetime} years is {} - {direction} your investment",
            fixed(roi, 1),
            roi_label.to_lowercase()
        ))
        .insight(format!(
            "BCR of {} means every $1 invested returns ${} in benefits - {}",
            fixed(bcr, 2),
            fixed(bcr, 2),
            bcr_label.to_lowercase()
        ))
        .insight(format!(
            "Annualized return of {}% {} typical {REFERENCE_DISCOUNT_PERCENT}% discount rate",
            fixed(annualized, 2),
            if annualized > REFERENCE_DISCOUNT_PERCENT { "exceeds" } else { "is below" }
        ))
        .insight(format!(
            "Net benefit of ${} over system lifetime",
            grouped(net_benefit, 0)
        ));

        if roi < 0.0 {
            out.warn("Negative ROI indicates the project costs more than it saves");
        }
        if annualized < LOW_ANNUALIZED_RETURN_PERCENT {
            out.warn("Low annualized return - compare to alternative investments");
        }
        Ok(())
    }
}
