//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters and sinks."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Calculation-scoped logging on top of `tracing`.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and quick tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Calculator identifier, e.g. `pv_sizing`.
    pub calculator: Option<&'a str>,
    /// Identifier of a single calculation run.
    pub run_id: Option<&'a str>,
    /// Pipeline stage (validation, compute, export).
    pub stage: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a calculator identifier.
    pub fn with_calculator(mut self, calculator: &'a str) -> Self {
        self.calculator = Some(calculator);
        self
    }

    /// Attach a run identifier.
    pub fn with_run_id(mut self, run_id: &'a str) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attach a pipeline stage.
    pub fn with_stage(mut self, stage: &'a str) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Outcome recorded when a calculation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationOutcome {
    /// Outputs were produced without warnings.
    Success,
    /// Outputs were produced alongside soft-violation warnings.
    Warned,
    /// Validation or feasibility failed; no usable answer.
    Failed,
}

impl CalculationOutcome {
    /// Classify a finished calculation.
    pub fn from_result(success: bool, warnings: usize) -> Self {
        match (success, warnings) {
            (false, _) => CalculationOutcome::Failed,
            (true, 0) => CalculationOutcome::Success,
            (true, _) => CalculationOutcome::Warned,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            CalculationOutcome::Success => "success",
            CalculationOutcome::Warned => "warned",
            CalculationOutcome::Failed => "failed",
        }
    }
}

/// Emit a standardized calculation lifecycle event.
pub fn log_calculation_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: CalculationOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let outcome_label = outcome.as_str();
    let calculator = ctx.calculator.unwrap_or("");
    let run_id = ctx.run_id.unwrap_or("");
    let stage = ctx.stage.unwrap_or("");
    // `tracing::event!` needs a constant level.
    match outcome {
        CalculationOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome_label,
            calculator,
            run_id,
            stage,
            message = %message
        ),
        CalculationOutcome::Warned | CalculationOutcome::Failed => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome_label,
            calculator,
            run_id,
            stage,
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_calculator("pv_sizing")
            .with_run_id("run-1");
        calc_info!(context = ctx.clone(), "calculation started");
        calc_debug!("debug message");
        calc_warn!(context = ctx, "soft violations: {}", 2);
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(CalculationOutcome::from_result(true, 0), CalculationOutcome::Success);
        assert_eq!(CalculationOutcome::from_result(true, 3), CalculationOutcome::Warned);
        assert_eq!(CalculationOutcome::from_result(false, 0), CalculationOutcome::Failed);
    }

    #[test]
    fn calculation_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_calculator("cable_sizing").with_stage("compute");
        log_calculation_event(
            Some(&ctx),
            "calculation.finished",
            "calculation finished",
            CalculationOutcome::Success,
        );
        log_calculation_event(None, "calculation.finished", "validation failed", CalculationOutcome::Failed);
    }
}
