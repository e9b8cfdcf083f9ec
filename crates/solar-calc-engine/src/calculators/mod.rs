//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! One module per calculator. Each exposes a unit struct implementing
//! [`crate::calculator::Calculator`] and a lazily built configuration.

pub mod battery_sizing;
pub mod cable_sizing;
pub mod carbon_offset;
pub mod dc_cable_sizing;
pub mod earthing_sizing;
pub mod energy_production;
pub mod financial_analysis;
pub mod inverter_sizing;
pub mod irradiance;
pub mod load_analysis;
pub mod payback_analysis;
pub mod pv_sizing;
pub mod roi_calculation;
pub mod string_configuration;
pub mod tilt_optimization;

use crate::{
    financial::IrrSolution,
    result::{ResultBuilder, NOT_DETERMINABLE},
};

pub(crate) const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Fixed-point rendering with thousands separators, e.g. `12,345.68`.
pub(crate) fn grouped(value: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (whole, fraction) = match rendered.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (rendered.as_str(), None),
    };

    let mut out = String::with_capacity(rendered.len() + whole.len() / 3 + 1);
    if value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// First label whose upper bound is `>= value`.
pub(crate) fn band<'a>(value: f64, bands: &[(f64, &'a str)], otherwise: &'a str) -> &'a str {
    bands
        .iter()
        .find(|(limit, _)| value <= *limit)
        .map(|(_, label)| *label)
        .unwrap_or(otherwise)
}

/// Rounded years for loop bounds; lifetimes are validated before this is called.
pub(crate) fn whole_years(years: f64) -> u32 {
    if years.is_finite() && years > 0.0 {
        years.round() as u32
    } else {
        0
    }
}

/// Record an IRR as a percentage, or as not determinable with a warning when the
/// solver produced no converged root. Returns the percentage when recorded.
pub(crate) fn record_irr(out: &mut ResultBuilder, name: &str, solution: Option<IrrSolution>) -> Option<f64> {
    match solution {
        Some(solution) if solution.converged => {
            let percent = solution.rate * 100.0;
            out.output(name, percent);
            Some(percent)
        }
        Some(solution) => {
            out.output(name, NOT_DETERMINABLE).warn(format!(
                "IRR did not converge after {} iterations (last estimate {:.2}%)",
                solution.iterations,
                solution.rate * 100.0
            ));
            None
        }
        None => {
            out.output(name, NOT_DETERMINABLE)
                .warn("IRR is not determinable for these cash flows");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_inserts_separators() {
        assert_eq!(grouped(1234567.891, 2), "1,234,567.89");
        assert_eq!(grouped(999.0, 0), "999");
        assert_eq!(grouped(-50000.0, 0), "-50,000");
        assert_eq!(grouped(-0.001, 1), "0.0");
    }

    #[test]
    fn band_picks_first_bound() {
        let bands = [(5.0, "Excellent"), (7.0, "Good")];
        assert_eq!(band(5.0, &bands, "Poor"), "Excellent");
        assert_eq!(band(6.2, &bands, "Poor"), "Good");
        assert_eq!(band(9.0, &bands, "Poor"), "Poor");
    }
}
