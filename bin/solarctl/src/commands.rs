//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Command-line front end for the PV calculators."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use solar_calc_engine::calculator::Calculator;
use solar_calc_engine::io::load_input_bag;
use solar_calc_engine::model::{InputBag, InputValue};
use solar_calc_engine::schema::Category;
use solar_calc_engine::{registry, run_calculation};
use solar_common::AppConfig;
use tracing::info;

use crate::render;

/// Exit status reported when an input bag fails validation.
const EXIT_INVALID: u8 = 2;

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Emit the catalogue as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ListEntry {
    id: &'static str,
    name: &'static str,
    category: Category,
}

impl ListCommand {
    pub fn execute(self) -> Result<ExitCode> {
        let entries: Vec<ListEntry> = registry::all()
            .map(|(_, calculator)| {
                let config = calculator.config();
                ListEntry {
                    id: config.id,
                    name: config.name,
                    category: config.category,
                }
            })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for entry in &entries {
                println!("{:<24} {:<14} {}", entry.id, entry.category, entry.name);
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Debug, Args)]
pub struct DescribeCommand {
    /// Calculator id, e.g. `pv_sizing`.
    id: String,
    /// Emit the description as JSON.
    #[arg(long)]
    json: bool,
}

impl DescribeCommand {
    pub fn execute(self) -> Result<ExitCode> {
        let description = registry::lookup(&self.id)?.describe();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&description)?);
        } else {
            print!("{}", render::description(&description));
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Calculator id, e.g. `pv_sizing`.
    id: String,
    /// Input file (JSON, YAML or TOML).
    #[arg(long, short, value_name = "FILE")]
    input: PathBuf,
    /// Emit the validation report as JSON.
    #[arg(long)]
    json: bool,
}

impl ValidateCommand {
    pub fn execute(self, config: &AppConfig) -> Result<ExitCode> {
        let calculator = registry::lookup(&self.id)?;
        let mut inputs = load_input_bag(&self.input)
            .with_context(|| format!("unable to load inputs from {}", self.input.display()))?;
        inputs.merge_missing(&config.defaults_for(calculator.id()));

        let report = calculator.validate(&inputs);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.valid {
            println!("inputs valid for {}", calculator.id());
        } else {
            for error in &report.errors {
                println!("error: {error}");
            }
        }

        if report.valid {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(EXIT_INVALID))
        }
    }
}

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Calculator id, e.g. `pv_sizing`.
    id: String,
    /// Input file (JSON, YAML or TOML).
    #[arg(long, short, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Override a single input, e.g. `--set peak_sun_hours=4.5`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
    /// Directory for the exported report (overrides configuration).
    #[arg(long = "report-dir", value_name = "DIR")]
    report_dir: Option<PathBuf>,
    /// Skip report export even when enabled in configuration.
    #[arg(long = "no-report", conflicts_with = "report_dir")]
    no_report: bool,
    /// Emit the calculation record as JSON.
    #[arg(long)]
    json: bool,
}

impl RunCommand {
    pub fn execute(self, config: &AppConfig) -> Result<ExitCode> {
        let calculator = registry::lookup(&self.id)?;
        let mut inputs = match &self.input {
            Some(path) => load_input_bag(path)
                .with_context(|| format!("unable to load inputs from {}", path.display()))?,
            None => InputBag::new(),
        };
        inputs.merge_missing(&config.defaults_for(calculator.id()));
        for raw in &self.overrides {
            let (name, value) = parse_assignment(raw)?;
            inputs.insert(name, value);
        }

        let record = run_calculation(calculator.id(), &inputs)?;

        let report_dir = match (&self.report_dir, self.no_report) {
            (_, true) => None,
            (Some(dir), false) => Some(dir.clone()),
            (None, false) if config.reports.enabled => Some(config.reports.directory.clone()),
            (None, false) => None,
        };
        let report_path = match report_dir {
            Some(dir) => {
                let path = record.exporter().export(&dir)?;
                info!(report = %path.display(), "report exported");
                Some(path)
            }
            None => None,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            print!("{}", render::record(&record));
            if let Some(path) = &report_path {
                println!("Report: {}", path.display());
            }
        }

        if record.result.success {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Split `key=value` and interpret the value as a number, list, or text.
fn parse_assignment(raw: &str) -> Result<(String, InputValue)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("missing input name in '{raw}'"));
    }
    Ok((name.to_owned(), InputValue::parse_literal(value)))
}

#[cfg(feature = "rest-api")]
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Listen address (overrides `api.listen`).
    #[arg(long, value_name = "ADDR")]
    listen: Option<std::net::SocketAddr>,
}

#[cfg(feature = "rest-api")]
impl ServeCommand {
    pub fn execute(self, config: &AppConfig) -> Result<ExitCode> {
        let addr = self.listen.unwrap_or(config.api.listen);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        runtime.block_on(serve(addr))?;
        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(feature = "rest-api")]
async fn serve(addr: std::net::SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    info!(address = %addr, "api server listening");
    let router = solar_calc_engine::api::router().layer(tower_http::trace::TraceLayer::new_for_http());
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("api server exited with error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_assignment() {
        let (name, value) = parse_assignment("peak_sun_hours=4.5").unwrap();
        assert_eq!(name, "peak_sun_hours");
        assert_eq!(value, InputValue::Number(4.5));
    }

    #[test]
    fn parses_list_and_text_assignments() {
        let (_, value) = parse_assignment("monthly_consumption_kwh=300,320, 310").unwrap();
        assert_eq!(value, InputValue::Sequence(vec![300.0, 320.0, 310.0]));
        let (_, value) = parse_assignment("material = aluminium").unwrap();
        assert_eq!(value, InputValue::Text("aluminium".to_owned()));
    }

    #[test]
    fn rejects_malformed_assignment() {
        assert!(parse_assignment("peak_sun_hours").is_err());
        assert!(parse_assignment("=4").is_err());
    }
}
