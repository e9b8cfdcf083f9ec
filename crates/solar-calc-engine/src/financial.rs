//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Year-indexed cash-flow projection and the metrics rolled up from it.
//!
//! Every metric reads the rows of one [`CashFlowSeries`]; nothing is re-derived
//! from closed-form annuity formulas.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{row, OutputRow};

pub const IRR_INITIAL_GUESS: f64 = 0.1;
pub const IRR_MAX_NEWTON_ITERATIONS: u32 = 100;
pub const IRR_MAX_BISECTION_ITERATIONS: u32 = 200;
pub const IRR_TOLERANCE: f64 = 1e-4;
const DERIVATIVE_EPSILON: f64 = 1e-12;
/// Trial rates scanned for a sign change before bisection.
const BRACKET_GRID: [f64; 12] = [-0.99, -0.9, -0.5, -0.2, 0.0, 0.05, 0.1, 0.2, 0.5, 1.0, 3.0, 10.0];

/// Economic inputs with every rate already expressed as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialParameters {
    pub initial_investment: f64,
    pub incentives: f64,
    pub first_year_production: f64,
    pub unit_price: f64,
    pub lifetime_years: u32,
    pub discount_rate: f64,
    pub degradation: f64,
    pub escalation: f64,
    pub annual_om: f64,
    pub residual_value: f64,
}

impl FinancialParameters {
    pub fn new(initial_investment: f64, first_year_production: f64, unit_price: f64, lifetime_years: u32) -> Self {
        Self {
            initial_investment,
            incentives: 0.0,
            first_year_production,
            unit_price,
            lifetime_years,
            discount_rate: 0.0,
            degradation: 0.0,
            escalation: 0.0,
            annual_om: 0.0,
            residual_value: 0.0,
        }
    }

    /// Savings-denominated projection: production is a unit factor and the price is the
    /// first-year saving.
    pub fn from_savings(initial_investment: f64, annual_savings: f64, lifetime_years: u32) -> Self {
        Self::new(initial_investment, 1.0, annual_savings, lifetime_years)
    }

    pub fn net_initial_cost(&self) -> f64 {
        self.initial_investment - self.incentives
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: u32,
    pub production: f64,
    pub unit_price: f64,
    pub revenue: f64,
    pub om: f64,
    pub net_cash_flow: f64,
    pub discounted_cash_flow: f64,
    pub cumulative_nominal: f64,
    pub cumulative_discounted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrMethod {
    Newton,
    Bisection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    /// Fractional rate.
    pub rate: f64,
    pub converged: bool,
    pub method: IrrMethod,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSeries {
    pub net_initial_cost: f64,
    pub discount_rate: f64,
    pub residual_value: f64,
    pub rows: Vec<YearRow>,
}

impl CashFlowSeries {
    pub fn project(params: &FinancialParameters) -> Self {
        let net_initial_cost = params.net_initial_cost();
        let mut cumulative_nominal = -net_initial_cost;
        let mut cumulative_discounted = -net_initial_cost;
        let mut rows = Vec::with_capacity(params.lifetime_years as usize);

        for year in 1..=params.lifetime_years {
            let exponent = (year - 1) as i32;
            let production = params.first_year_production * (1.0 - params.degradation).powi(exponent);
            let unit_price = params.unit_price * (1.0 + params.escalation).powi(exponent);
            let revenue = production * unit_price;
            let net_cash_flow = revenue - params.annual_om;
            let discounted_cash_flow = net_cash_flow / (1.0 + params.discount_rate).powi(year as i32);
            cumulative_nominal += net_cash_flow;
            cumulative_discounted += discounted_cash_flow;
            rows.push(YearRow {
                year,
                production,
                unit_price,
                revenue,
                om: params.annual_om,
                net_cash_flow,
                discounted_cash_flow,
                cumulative_nominal,
                cumulative_discounted,
            });
        }

        Self {
            net_initial_cost,
            discount_rate: params.discount_rate,
            residual_value: params.residual_value,
            rows,
        }
    }

    /// Year 0 followed by each year's net cash flow.
    pub fn flows(&self) -> Vec<f64> {
        std::iter::once(-self.net_initial_cost)
            .chain(self.rows.iter().map(|row| row.net_cash_flow))
            .collect()
    }

    pub fn npv(&self) -> f64 {
        -self.net_initial_cost + self.rows.iter().map(|row| row.discounted_cash_flow).sum::<f64>()
    }

    pub fn irr(&self) -> Option<IrrSolution> {
        irr(&self.flows())
    }

    pub fn total_production(&self) -> f64 {
        self.rows.iter().map(|row| row.production).sum()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|row| row.revenue).sum()
    }

    pub fn total_om(&self) -> f64 {
        self.rows.iter().map(|row| row.om).sum()
    }

    pub fn simple_payback(&self) -> Option<f64> {
        self.crossing(|row| row.cumulative_nominal)
    }

    pub fn discounted_payback(&self) -> Option<f64> {
        self.crossing(|row| row.cumulative_discounted)
    }

    /// Fractional year at which the chosen cumulative series first reaches zero.
    fn crossing(&self, cumulative: impl Fn(&YearRow) -> f64) -> Option<f64> {
        let mut previous = -self.net_initial_cost;
        if previous >= 0.0 {
            return Some(0.0);
        }
        for row in &self.rows {
            let current = cumulative(row);
            if let Some(year) = break_even_interpolation(previous, current, row.year - 1) {
                return Some(year);
            }
            previous = current;
        }
        None
    }

    /// `(benefits − costs) / costs × 100` with O&M in the costs and residual value in the benefits.
    pub fn roi(&self) -> Option<f64> {
        let costs = self.total_costs();
        if costs <= 0.0 {
            return None;
        }
        Some((self.total_benefits() - costs) / costs * 100.0)
    }

    pub fn total_costs(&self) -> f64 {
        self.net_initial_cost + self.total_om()
    }

    pub fn total_benefits(&self) -> f64 {
        self.total_revenue() + self.residual_value
    }

    /// Lifetime cost per unit of degraded lifetime production; O&M is discounted one period.
    pub fn lcoe(&self) -> Option<f64> {
        let production = self.total_production();
        if production <= 0.0 {
            return None;
        }
        Some((self.net_initial_cost + self.total_om() / (1.0 + self.discount_rate)) / production)
    }

    pub fn table(&self, limit: usize) -> Vec<OutputRow> {
        self.rows
            .iter()
            .take(limit)
            .map(|year| {
                row([
                    ("year", year.year.into()),
                    ("production", year.production.into()),
                    ("unit_price", year.unit_price.into()),
                    ("revenue", year.revenue.into()),
                    ("om", year.om.into()),
                    ("net_cash_flow", year.net_cash_flow.into()),
                    ("discounted_cash_flow", year.discounted_cash_flow.into()),
                    ("cumulative_nominal", year.cumulative_nominal.into()),
                    ("cumulative_discounted", year.cumulative_discounted.into()),
                ])
            })
            .collect()
    }
}

pub fn npv_at(flows: &[f64], rate: f64) -> f64 {
    flows
        .iter()
        .enumerate()
        .map(|(t, flow)| flow / (1.0 + rate).powi(t as i32))
        .sum()
}

fn npv_derivative_at(flows: &[f64], rate: f64) -> f64 {
    flows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(t, flow)| -(t as f64) * flow / (1.0 + rate).powi(t as i32 + 1))
        .sum()
}

/// Internal rate of return with a Newton-Raphson solve and a bisection fallback.
///
/// A non-converged Newton estimate is returned flagged when no sign-changing bracket
/// exists. `None` means no finite estimate was produced. Where several roots exist
/// the first one found is reported.
pub fn irr(flows: &[f64]) -> Option<IrrSolution> {
    if flows.len() < 2 {
        return None;
    }

    let mut rate = IRR_INITIAL_GUESS;
    let mut last_finite = None;
    for iteration in 1..=IRR_MAX_NEWTON_ITERATIONS {
        let npv = npv_at(flows, rate);
        if npv.abs() < IRR_TOLERANCE {
            return Some(IrrSolution {
                rate,
                converged: true,
                method: IrrMethod::Newton,
                iterations: iteration,
            });
        }
        last_finite = Some((rate, iteration));
        let derivative = npv_derivative_at(flows, rate);
        if derivative.abs() < DERIVATIVE_EPSILON {
            debug!(rate, iteration, "irr derivative collapsed");
            break;
        }
        let next = rate - npv / derivative;
        if !next.is_finite() || next <= -1.0 {
            break;
        }
        rate = next;
    }

    if let Some(solution) = bisect(flows) {
        return Some(solution);
    }

    last_finite.map(|(rate, iterations)| IrrSolution {
        rate,
        converged: false,
        method: IrrMethod::Newton,
        iterations,
    })
}

fn bisect(flows: &[f64]) -> Option<IrrSolution> {
    let (mut low, mut high) = BRACKET_GRID.windows(2).find_map(|pair| {
        let (a, b) = (npv_at(flows, pair[0]), npv_at(flows, pair[1]));
        (a.is_finite() && b.is_finite() && a.signum() != b.signum()).then_some((pair[0], pair[1]))
    })?;

    let mut low_npv = npv_at(flows, low);
    for iteration in 1..=IRR_MAX_BISECTION_ITERATIONS {
        let mid = (low + high) / 2.0;
        let mid_npv = npv_at(flows, mid);
        if mid_npv.abs() < IRR_TOLERANCE || (high - low) < 1e-12 {
            return Some(IrrSolution {
                rate: mid,
                converged: true,
                method: IrrMethod::Bisection,
                iterations: iteration,
            });
        }
        if mid_npv.signum() == low_npv.signum() {
            low = mid;
            low_npv = mid_npv;
        } else {
            high = mid;
        }
    }
    None
}

/// Fractional crossing year when two adjacent cumulative values bracket zero.
pub fn break_even_interpolation(previous: f64, next: f64, previous_year: u32) -> Option<f64> {
    if previous < 0.0 && next >= 0.0 {
        Some(f64::from(previous_year) + (-previous) / (next - previous))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn residential() -> FinancialParameters {
        FinancialParameters {
            incentives: 5_000.0,
            discount_rate: 0.08,
            degradation: 0.005,
            escalation: 0.03,
            annual_om: 300.0,
            ..FinancialParameters::new(55_000.0, 14_000.0, 0.35, 25)
        }
    }

    #[test]
    fn constant_annuity_irr_zeroes_npv() {
        let mut flows = vec![-50_000.0];
        flows.extend(std::iter::repeat(9_000.0).take(25));
        let solution = irr(&flows).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.method, IrrMethod::Newton);
        assert_abs_diff_eq!(npv_at(&flows, solution.rate), 0.0, epsilon = 0.01);
        assert!(solution.rate > 0.17 && solution.rate < 0.18);
    }

    #[test]
    fn npv_matches_discounted_sum() {
        let series = CashFlowSeries::project(&residential());
        let independent: f64 = series
            .flows()
            .iter()
            .enumerate()
            .map(|(t, flow)| flow / 1.08f64.powi(t as i32))
            .sum();
        assert_relative_eq!(series.npv(), independent, epsilon = 1e-6);
        assert_relative_eq!(series.npv(), npv_at(&series.flows(), 0.08), epsilon = 1e-6);
    }

    #[test]
    fn irr_of_projection_zeroes_npv() {
        let series = CashFlowSeries::project(&residential());
        let solution = series.irr().unwrap();
        assert!(solution.converged);
        assert_abs_diff_eq!(npv_at(&series.flows(), solution.rate), 0.0, epsilon = 0.01);
    }

    #[test]
    fn rows_follow_degradation_and_escalation() {
        let series = CashFlowSeries::project(&residential());
        let year3 = series.rows[2];
        assert_relative_eq!(year3.production, 14_000.0 * 0.995f64.powi(2));
        assert_relative_eq!(year3.unit_price, 0.35 * 1.03f64.powi(2));
        assert_relative_eq!(year3.net_cash_flow, year3.production * year3.unit_price - 300.0);
        assert_relative_eq!(year3.discounted_cash_flow, year3.net_cash_flow / 1.08f64.powi(3));
    }

    #[test]
    fn paybacks_use_the_same_rows() {
        let series = CashFlowSeries::project(&residential());
        let simple = series.simple_payback().unwrap();
        let discounted = series.discounted_payback().unwrap();
        assert!(discounted >= simple);
        let crossing = series
            .rows
            .iter()
            .find(|row| row.cumulative_nominal >= 0.0)
            .unwrap();
        assert_relative_eq!(
            simple,
            f64::from(crossing.year) - crossing.cumulative_nominal / crossing.net_cash_flow,
            epsilon = 1e-9
        );
    }

    #[test]
    fn payback_not_reached_is_none() {
        let params = FinancialParameters::new(100_000.0, 1_000.0, 0.1, 25);
        let series = CashFlowSeries::project(&params);
        assert_eq!(series.simple_payback(), None);
        assert_eq!(series.discounted_payback(), None);
    }

    #[test]
    fn zero_year_one_flow_does_not_divide_by_zero() {
        let params = FinancialParameters {
            annual_om: 100.0,
            ..FinancialParameters::from_savings(10_000.0, 100.0, 30)
        };
        let series = CashFlowSeries::project(&params);
        assert_eq!(series.rows[0].net_cash_flow, 0.0);
        assert_eq!(series.simple_payback(), None);
    }

    #[test]
    fn all_positive_flows_have_no_converged_irr() {
        let flows = vec![100.0, 100.0, 100.0];
        match irr(&flows) {
            None => {}
            Some(solution) => assert!(!solution.converged),
        }
    }

    #[test]
    fn single_late_inflow_converges() {
        let mut flows = vec![-1_000.0];
        flows.extend(std::iter::repeat(0.0).take(39));
        flows.push(50_000.0);
        let solution = irr(&flows).unwrap();
        assert!(solution.converged);
        assert_abs_diff_eq!(npv_at(&flows, solution.rate), 0.0, epsilon = IRR_TOLERANCE);
    }

    #[test]
    fn roi_counts_om_and_residual() {
        let params = FinancialParameters {
            annual_om: 200.0,
            residual_value: 2_000.0,
            ..FinancialParameters::from_savings(20_000.0, 2_500.0, 20)
        };
        let series = CashFlowSeries::project(&params);
        let costs = 20_000.0 + 200.0 * 20.0;
        let benefits = 2_500.0 * 20.0 + 2_000.0;
        assert_relative_eq!(series.roi().unwrap(), (benefits - costs) / costs * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn lcoe_divides_by_degraded_production() {
        let series = CashFlowSeries::project(&residential());
        let expected = (50_000.0 + 300.0 * 25.0 / 1.08) / series.total_production();
        assert_relative_eq!(series.lcoe().unwrap(), expected, epsilon = 1e-12);
        let empty = CashFlowSeries::project(&FinancialParameters::new(1.0, 0.0, 0.1, 10));
        assert_eq!(empty.lcoe(), None);
    }

    #[test]
    fn interpolation_brackets_zero() {
        assert_relative_eq!(break_even_interpolation(-300.0, 100.0, 6).unwrap(), 6.75);
        assert_eq!(break_even_interpolation(100.0, 300.0, 6), None);
        assert_eq!(break_even_interpolation(-300.0, -100.0, 6), None);
    }
}
