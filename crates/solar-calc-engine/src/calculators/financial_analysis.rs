//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Lifetime economics of a PV investment from a single projected cash-flow series.

use once_cell::sync::Lazy;

use super::{grouped, record_irr, whole_years};
use crate::{
    calculator::Calculator,
    errors::Result,
    financial::{CashFlowSeries, FinancialParameters},
    model::InputBag,
    result::{fixed, ResultBuilder, NOT_DETERMINABLE, NOT_REACHED},
    schema::{Category, CalculatorConfig, Formula, InputField, StandardValue},
    validation::ValidationRule,
};

static CONFIG: Lazy<CalculatorConfig> = Lazy::new(|| CalculatorConfig {
    id: "financial_analysis",
    name: "Financial Analysis",
    description: "NPV, IRR, payback, ROI and LCOE over the project lifetime",
    category: Category::Financial,
    inputs: vec![
        InputField::number("system_cost", "Total System Cost").unit("$").required(),
        InputField::number("annual_production_kwh", "Annual Energy Production")
            .unit("kWh")
            .required()
            .describe("First-year production"),
        InputField::number("energy_rate", "Electricity Rate").unit("$/kWh").required(),
        InputField::number("project_lifetime_years", "Project Lifetime")
            .unit("years")
            .default_number(25.0)
            .bounds(1.0, 40.0),
        InputField::number("discount_rate_percent", "Discount Rate")
            .unit("%")
            .default_number(8.0)
            .bounds(0.0, 30.0),
        InputField::number("degradation_percent", "Annual Degradation")
            .unit("%")
            .default_number(0.5)
            .bounds(0.0, 2.0),
        InputField::number("escalation_percent", "Electricity Price Escalation")
            .unit("%/year")
            .default_number(3.0)
            .bounds(0.0, 15.0),
        InputField::number("annual_om_cost", "Annual O&M Cost")
            .unit("$")
            .default_number(0.0),
        InputField::number("incentives", "Incentives / Rebates")
            .unit("$")
            .default_number(0.0)
            .describe("Subsidies, tax credits and rebates deducted up front"),
        InputField::number("residual_value", "Residual Value")
            .unit("$")
            .default_number(0.0),
    ],
    rules: vec![
        ValidationRule::required("system_cost", "System cost is required"),
        ValidationRule::positive("system_cost", "System cost must be positive"),
        ValidationRule::required("annual_production_kwh", "Annual production is required"),
        ValidationRule::positive("annual_production_kwh", "Annual production must be positive"),
        ValidationRule::required("energy_rate", "Electricity rate is required"),
        ValidationRule::positive("energy_rate", "Electricity rate must be positive"),
        ValidationRule::range("project_lifetime_years", 1.0, 40.0, "Project lifetime should be 1-40 years"),
        ValidationRule::range("discount_rate_percent", 0.0, 30.0, "Discount rate should be 0-30%"),
        ValidationRule::range("degradation_percent", 0.0, 2.0, "Degradation should be 0-2% per year"),
        ValidationRule::range("escalation_percent", 0.0, 15.0, "Escalation should be 0-15% per year"),
        ValidationRule::min("annual_om_cost", 0.0, "O&M cost cannot be negative"),
        ValidationRule::min("incentives", 0.0, "Incentives cannot be negative"),
        ValidationRule::min("residual_value", 0.0, "Residual value cannot be negative"),
    ],
    formulas: vec![
        Formula {
            name: "Net Present Value",
            expression: "NPV = -C0 + Σ CF_t / (1 + r)^t",
            description: "Discounted sum of yearly net cash flows",
            variables: &[("C0", "Net initial cost"), ("CF_t", "Net cash flow in year t"), ("r", "Discount rate")],
        },
        Formula {
            name: "Internal Rate of Return",
            expression: "0 = -C0 + Σ CF_t / (1 + IRR)^t",
            description: "Rate at which NPV is zero",
            variables: &[],
        },
        Formula {
            name: "Levelized Cost of Energy",
            expression: "LCOE = (C0 + Σ O&M / (1 + r)) / Σ E_t",
            description: "Lifetime cost per lifetime kWh",
            variables: &[("E_t", "Degraded production in year t")],
        },
        Formula {
            name: "Return on Investment",
            expression: "ROI = (Σ Revenue + Residual - C0 - Σ O&M) / (C0 + Σ O&M) × 100",
            description: "Lifetime gain relative to lifetime cost",
            variables: &[],
        },
        Formula {
            name: "Discounted Payback",
            expression: "n - Cum_n / DCF_n",
            description: "Fractional year at which the cumulative discounted flow turns positive",
            variables: &[],
        },
    ],
    standards: vec![
        StandardValue::number("Typical Discount Rate", 8.0, "%", "Industry practice"),
        StandardValue::number("Panel Degradation", 0.5, "%/year", "Tier 1 manufacturers"),
        StandardValue::number("Electricity Escalation", 3.0, "%/year", "Historical average"),
        StandardValue::number("System Lifetime", 25.0, "years", "Panel warranty"),
    ],
});

#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialAnalysis;

impl Calculator for FinancialAnalysis {
    fn config(&self) -> &'static CalculatorConfig {
        &CONFIG
    }

    fn compute(&self, inputs: &InputBag, out: &mut ResultBuilder) -> Result<()> {
        let system_cost = inputs.number_or("system_cost", 0.0);
        let production = inputs.number_or("annual_production_kwh", 0.0);
        let rate = inputs.number_or("energy_rate", 0.0);
        let lifetime = whole_years(inputs.number_or("project_lifetime_years", 25.0));
        let params = FinancialParameters {
            incentives: inputs.number_or("incentives", 0.0),
            discount_rate: inputs.fraction_or("discount_rate_percent", 8.0),
            degradation: inputs.fraction_or("degradation_percent", 0.5),
            escalation: inputs.fraction_or("escalation_percent", 3.0),
            annual_om: inputs.number_or("annual_om_cost", 0.0),
            residual_value: inputs.number_or("residual_value", 0.0),
            ..FinancialParameters::new(system_cost, production, rate, lifetime)
        };
        let series = CashFlowSeries::project(&params);

        let net = series.net_initial_cost;
        let npv = series.npv();
        let simple_payback = series.simple_payback();
        let discounted_payback = series.discounted_payback();
        let roi = series.roi();
        let lcoe = series.lcoe();

        out.output("net_initial_cost", net).output("npv", npv);
        let irr = record_irr(out, "irr_percent", series.irr());
        out.output_or("simple_payback_years", simple_payback, NOT_REACHED)
            .output_or("discounted_payback_years", discounted_payback, NOT_REACHED)
            .output_or("roi_percent", roi, NOT_DETERMINABLE)
            .output_or("lcoe_per_kwh", lcoe, NOT_DETERMINABLE)
            .output("total_production_kwh", series.total_production())
            .output("total_revenue", series.total_revenue())
            .output("total_om_cost", series.total_om())
            .output("cash_flow_table", series.table(lifetime as usize));

        let years = |value: Option<f64>| {
            value.map_or_else(|| NOT_REACHED.to_owned(), |v| format!("{} years", fixed(v, 1)))
        };
        out.step(format!(
            "Net Initial Cost = ${} - ${} = ${}",
            grouped(system_cost, 0),
            grouped(params.incentives, 0),
            grouped(net, 0)
        ))
        .step(format!(
            "Year 1 Revenue = {} kWh × ${rate}/kWh = ${}",
            grouped(production, 0),
            grouped(production * rate, 2)
        ))
        .step(format!("NPV = Sum of discounted cash flows = ${}", grouped(npv, 0)))
        .step(match irr {
            Some(irr) => format!("IRR = {}% (rate where NPV = 0)", fixed(irr, 2)),
            None => format!("IRR = {NOT_DETERMINABLE}"),
        })
        .step(format!("Simple Payback = {}", years(simple_payback)))
        .step(format!("Discounted Payback = {}", years(discounted_payback)))
        .step(format!(
            "Total {lifetime}-year production = {} kWh",
            grouped(series.total_production(), 0)
        ))
        .step(format!(
            "Total {lifetime}-year revenue = ${}",
            grouped(series.total_revenue(), 0)
        ));
        if let Some(roi) = roi {
            out.step(format!(
                "ROI = (${} - ${}) / ${} × 100 = {}%",
                grouped(series.total_benefits(), 0),
                grouped(series.total_costs(), 0),
                grouped(series.total_costs(), 0),
                fixed(roi, 1)
            ));
        }
        if let Some(lcoe) = lcoe {
            out.step(format!(
                "LCOE = (${} + ${} / {}) / {} kWh = ${}/kWh",
                grouped(net, 0),
                grouped(series.total_om(), 0),
                fixed(1.0 + params.discount_rate, 2),
                grouped(series.total_production(), 0),
                fixed(lcoe, 4)
            ));
        }

        out.assume(format!("Project Lifetime: {lifetime} years"))
            .assume(format!("Discount Rate: {}%", fixed(params.discount_rate * 100.0, 1)))
            .assume(format!("Annual Degradation: {}%", fixed(params.degradation * 100.0, 2)))
            .assume(format!("Electricity Escalation: {}%/year", fixed(params.escalation * 100.0, 1)))
            .assume(format!("Annual O&M: ${}", grouped(params.annual_om, 0)));

        let npv_assessment = if npv > 0.0 { "Positive (Good)" } else { "Negative (Poor)" };
        out.output("npv_assessment", npv_assessment).insight(format!(
            "This investment has an NPV of ${} - {npv_assessment}",
            grouped(npv, 0)
        ));
        if let Some(irr) = irr {
            let assessment = if irr > params.discount_rate * 100.0 {
                "Exceeds discount rate (Good)"
            } else {
                "Below discount rate (Poor)"
            };
            out.output("irr_assessment", assessment)
                .insight(format!("IRR of {}% {assessment}", fixed(irr, 1)));
        }
        if let Some(payback) = simple_payback {
            let assessment = if payback < 10.0 { "Under 10 years (Good)" } else { "Over 10 years (Long)" };
            out.output("payback_assessment", assessment).insight(format!(
                "System pays back in {} years - {assessment}",
                fixed(payback, 1)
            ));
        }
        if let Some(lcoe) = lcoe {
            let assessment = if lcoe < rate {
                "Below grid rate (Competitive)"
            } else {
                "Above grid rate (Higher)"
            };
            out.output("lcoe_assessment", assessment)
                .insight(format!("LCOE of ${}/kWh {assessment}", fixed(lcoe, 3)));
        }

        if npv < 0.0 {
            out.warn("Negative NPV indicates this may not be a financially viable investment at the given discount rate");
        }
        if simple_payback.is_none() {
            out.warn("Payback period exceeds project lifetime");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn residential() -> InputBag {
        InputBag::new()
            .with("system_cost", 55_000.0)
            .with("annual_production_kwh", 14_000.0)
            .with("energy_rate", 0.35)
            .with("incentives", 5_000.0)
            .with("annual_om_cost", 300.0)
    }

    #[test]
    fn metrics_come_from_one_series() {
        let result = FinancialAnalysis.calculate(&residential());
        assert!(result.success);
        assert_eq!(result.number("net_initial_cost"), Some(50_000.0));

        let series = CashFlowSeries::project(&FinancialParameters {
            incentives: 5_000.0,
            discount_rate: 0.08,
            degradation: 0.005,
            escalation: 0.03,
            annual_om: 300.0,
            ..FinancialParameters::new(55_000.0, 14_000.0, 0.35, 25)
        });
        assert_relative_eq!(result.number("npv").unwrap(), series.npv(), epsilon = 1e-6);
        assert_relative_eq!(
            result.number("simple_payback_years").unwrap(),
            series.simple_payback().unwrap(),
            epsilon = 1e-9
        );
        let table = result.output("cash_flow_table").unwrap().as_table().unwrap();
        assert_eq!(table.len(), 25);
        assert!(result.number("irr_percent").unwrap() > 8.0);
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn unprofitable_project_warns() {
        let bag = residential().with("energy_rate", 0.02).with("annual_om_cost", 0.0);
        let result = FinancialAnalysis.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.text("simple_payback_years"), Some(NOT_REACHED));
        assert_eq!(result.text("npv_assessment"), Some("Negative (Poor)"));
        assert!(result.has_warning_containing("Negative NPV"));
        assert!(result.has_warning_containing("exceeds project lifetime"));
    }

    #[test]
    fn flows_that_never_recover_have_no_irr() {
        let bag = residential().with("energy_rate", 0.01).with("annual_om_cost", 1_000.0);
        let result = FinancialAnalysis.calculate(&bag);
        assert!(result.success);
        assert_eq!(result.text("irr_percent"), Some(NOT_DETERMINABLE));
        assert!(result.has_warning_containing("IRR"));
        assert!(result
            .outputs
            .values()
            .all(|value| value.is_finite()));
    }

    #[test]
    fn lifetime_out_of_range_is_rejected() {
        let result = FinancialAnalysis.calculate(&residential().with("project_lifetime_years", 60.0));
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Project lifetime should be 1-40 years"]);
    }
}
