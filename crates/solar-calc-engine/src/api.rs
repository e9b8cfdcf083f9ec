//! ---
//! ems_section: "08-energy-models-optimization"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "PV design and financial calculation routines."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! JSON REST surface over the calculator registry.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    errors::CalcEngineError,
    model::InputBag,
    registry,
    schema::{Category, CalculatorDescription},
    validation::ValidationReport,
    CalculationRecord,
};

#[derive(Debug, Clone, Serialize)]
pub struct CalculatorSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
}

pub fn router() -> Router {
    Router::new()
        .route("/api/calculators", get(list_calculators))
        .route("/api/calculators/:id", get(describe_calculator))
        .route("/api/calculators/:id/validate", post(validate_inputs))
        .route("/api/calculators/:id/calculate", post(calculate))
}

async fn list_calculators() -> Json<Vec<CalculatorSummary>> {
    Json(
        registry::all()
            .map(|(_, calculator)| {
                let config = calculator.config();
                CalculatorSummary {
                    id: config.id,
                    name: config.name,
                    category: config.category,
                }
            })
            .collect(),
    )
}

async fn describe_calculator(Path(id): Path<String>) -> Result<Json<CalculatorDescription>, StatusCode> {
    let calculator = registry::lookup(&id).map_err(map_err)?;
    Ok(Json(calculator.describe()))
}

async fn validate_inputs(
    Path(id): Path<String>,
    Json(inputs): Json<InputBag>,
) -> Result<Json<ValidationReport>, StatusCode> {
    let calculator = registry::lookup(&id).map_err(map_err)?;
    Ok(Json(calculator.validate(&inputs)))
}

async fn calculate(
    Path(id): Path<String>,
    Json(inputs): Json<InputBag>,
) -> Result<Json<CalculationRecord>, StatusCode> {
    crate::run_calculation(&id, &inputs).map(Json).map_err(map_err)
}

fn map_err(err: CalcEngineError) -> StatusCode {
    match err {
        CalcEngineError::UnknownCalculator(_) => StatusCode::NOT_FOUND,
        CalcEngineError::InvalidInput { .. } | CalcEngineError::Infeasible(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_every_calculator() {
        let Json(summaries) = list_calculators().await;
        assert_eq!(summaries.len(), 15);
        assert!(summaries.iter().any(|s| s.id == "earthing_sizing"));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let status = describe_calculator(Path("nope".to_owned())).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let status = calculate(Path("nope".to_owned()), Json(InputBag::new())).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validate_reports_missing_fields() {
        let Json(report) = validate_inputs(Path("load_analysis".to_owned()), Json(InputBag::new()))
            .await
            .unwrap();
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e == "Peak demand is required"));
    }
}
