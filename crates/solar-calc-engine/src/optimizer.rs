//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Exhaustive inverter model × quantity search under a DC/AC ratio constraint.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    errors::{CalcEngineError, Result},
    model::InverterModel,
};

/// Snapshot used when the caller does not supply a catalogue.
pub static DEFAULT_INVERTER_CATALOG: Lazy<Vec<InverterModel>> = Lazy::new(|| {
    [33.0, 40.0, 50.0, 100.0, 125.0]
        .into_iter()
        .map(|kw| InverterModel {
            manufacturer: "Generic".into(),
            model: format!("{kw}kW"),
            ac_capacity_kw: kw,
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionConstraints {
    pub ratio_min: f64,
    pub ratio_max: f64,
    pub ratio_preferred: f64,
    pub quantity_weight: f64,
    pub below_preferred_penalty: f64,
    pub max_quantity: u32,
}

impl Default for SelectionConstraints {
    fn default() -> Self {
        Self {
            ratio_min: 0.9,
            ratio_max: 1.25,
            ratio_preferred: 1.0,
            quantity_weight: 10.0,
            below_preferred_penalty: 100.0,
            max_quantity: 20,
        }
    }
}

impl SelectionConstraints {
    pub fn is_feasible(&self, ratio: f64) -> bool {
        ratio >= self.ratio_min && ratio <= self.ratio_max
    }

    /// Lower is better. Ratios below the preferred threshold carry a fixed penalty.
    pub fn score(&self, quantity: u32, ratio: f64) -> f64 {
        let base = f64::from(quantity) * self.quantity_weight;
        if ratio >= self.ratio_preferred {
            base + (self.ratio_max - ratio)
        } else {
            base + self.below_preferred_penalty + (self.ratio_preferred - ratio)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterSelection {
    pub inverter: InverterModel,
    pub quantity: u32,
    pub total_ac_kw: f64,
    /// Rounded to three decimals for presentation.
    pub dc_ac_ratio: f64,
    /// Unrounded ratio the score was computed from.
    pub raw_dc_ac_ratio: f64,
    pub score: f64,
}

impl InverterSelection {
    pub fn below_preferred(&self, constraints: &SelectionConstraints) -> bool {
        self.raw_dc_ac_ratio < constraints.ratio_preferred
    }
}

/// Every feasible `(model, quantity)` pair with its unrounded ratio and score.
pub fn feasible_candidates<'a>(
    required_kw: f64,
    catalog: &'a [InverterModel],
    constraints: &SelectionConstraints,
) -> Vec<(&'a InverterModel, u32, f64, f64)> {
    let mut models: Vec<&InverterModel> = catalog
        .iter()
        .filter(|model| model.ac_capacity_kw > 0.0)
        .collect();
    models.sort_by(|a, b| b.ac_capacity_kw.total_cmp(&a.ac_capacity_kw));

    let mut candidates = Vec::new();
    for model in models {
        for quantity in 1..=constraints.max_quantity {
            let ratio = required_kw / (model.ac_capacity_kw * f64::from(quantity));
            if constraints.is_feasible(ratio) {
                candidates.push((model, quantity, ratio, constraints.score(quantity, ratio)));
            }
        }
    }
    candidates
}

/// Pick the minimum-score feasible combination, or fail naming the ratio bounds.
pub fn select_inverter(
    required_kw: f64,
    catalog: &[InverterModel],
    constraints: &SelectionConstraints,
) -> Result<InverterSelection> {
    let mut best: Option<(&InverterModel, u32, f64, f64)> = None;
    for candidate in feasible_candidates(required_kw, catalog, constraints) {
        let improves = best.map_or(true, |(_, _, _, score)| candidate.3 < score);
        if improves {
            best = Some(candidate);
        }
    }

    let (model, quantity, ratio, score) = best.ok_or_else(|| {
        CalcEngineError::infeasible(format!(
            "no inverter combination keeps the DC/AC ratio for {required_kw:.2} kWp within [{:.2}, {:.2}] using up to {} units",
            constraints.ratio_min, constraints.ratio_max, constraints.max_quantity
        ))
    })?;

    debug!(model = %model.model, quantity, ratio, score, "inverter selected");
    Ok(InverterSelection {
        inverter: model.clone(),
        quantity,
        total_ac_kw: model.ac_capacity_kw * f64::from(quantity),
        dc_ac_ratio: (ratio * 1000.0).round() / 1000.0,
        raw_dc_ac_ratio: ratio,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn selects_single_hundred_kw_unit_for_120_kwp() {
        let constraints = SelectionConstraints::default();
        let selection = select_inverter(120.0, &DEFAULT_INVERTER_CATALOG, &constraints).unwrap();
        assert_eq!(selection.inverter.ac_capacity_kw, 100.0);
        assert_eq!(selection.quantity, 1);
        assert_relative_eq!(selection.dc_ac_ratio, 1.2);
        assert_relative_eq!(selection.total_ac_kw, 100.0);
    }

    #[test]
    fn no_cheaper_feasible_combination_exists() {
        let constraints = SelectionConstraints::default();
        for required in [37.8, 64.2, 120.0, 250.0, 900.0] {
            let selection =
                select_inverter(required, &DEFAULT_INVERTER_CATALOG, &constraints).unwrap();
            // the reported ratio is rounded to three decimals
            assert!(selection.dc_ac_ratio >= constraints.ratio_min - 5e-4);
            assert!(selection.dc_ac_ratio <= constraints.ratio_max + 5e-4);
            for (_, _, _, score) in
                feasible_candidates(required, &DEFAULT_INVERTER_CATALOG, &constraints)
            {
                assert!(score >= selection.score);
            }
        }
    }

    #[test]
    fn penalised_ratio_only_used_without_alternative() {
        let catalog = vec![InverterModel {
            manufacturer: "Acme".into(),
            model: "50kW".into(),
            ac_capacity_kw: 50.0,
        }];
        let constraints = SelectionConstraints::default();
        let selection = select_inverter(47.0, &catalog, &constraints).unwrap();
        assert_eq!(selection.quantity, 1);
        assert!(selection.below_preferred(&constraints));
        assert!(selection.score > constraints.below_preferred_penalty);
    }

    #[test]
    fn below_preferred_uses_unrounded_ratio() {
        let catalog = vec![InverterModel {
            manufacturer: "Acme".into(),
            model: "50kW".into(),
            ac_capacity_kw: 50.0,
        }];
        let constraints = SelectionConstraints::default();
        let selection = select_inverter(49.98, &catalog, &constraints).unwrap();
        assert_relative_eq!(selection.raw_dc_ac_ratio, 0.9996, epsilon = 1e-12);
        assert_relative_eq!(selection.dc_ac_ratio, 1.0);
        assert!(selection.below_preferred(&constraints));
    }

    #[test]
    fn infeasible_catalog_is_reported() {
        let catalog = vec![InverterModel {
            manufacturer: "Acme".into(),
            model: "100kW".into(),
            ac_capacity_kw: 100.0,
        }];
        let err = select_inverter(5.0, &catalog, &SelectionConstraints::default()).unwrap_err();
        assert!(matches!(err, CalcEngineError::Infeasible(_)));
        assert!(err.to_string().contains("[0.90, 1.25]"));
    }

    #[test]
    fn quantity_search_is_bounded() {
        let catalog = vec![InverterModel {
            manufacturer: "Acme".into(),
            model: "3kW".into(),
            ac_capacity_kw: 3.0,
        }];
        let constraints = SelectionConstraints::default();
        assert!(select_inverter(1000.0, &catalog, &constraints).is_err());
    }
}
