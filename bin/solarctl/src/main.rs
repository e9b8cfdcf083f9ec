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

use anyhow::Result;
use clap::{Parser, Subcommand};
use solar_common::config::{AppConfig, LoadedAppConfig, DEFAULT_CANDIDATES};
use solar_common::init_tracing;
use tracing::{debug, info};

mod commands;
mod render;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "PV design and financial calculation utility",
    long_about = None
)]
struct Cli {
    /// Configuration file; otherwise SOLAR_CALC_CONFIG or solar-calc.toml is used.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every registered calculator.
    List(commands::ListCommand),
    /// Show inputs, formulas and standard values of one calculator.
    Describe(commands::DescribeCommand),
    /// Check an input file against a calculator's rules.
    Validate(commands::ValidateCommand),
    /// Run a calculator and optionally export a report.
    Run(commands::RunCommand),
    /// Host the REST API.
    #[cfg(feature = "rest-api")]
    Serve(commands::ServeCommand),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let loaded = match &cli.config {
        Some(path) => LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: Some(path.clone()),
        },
        None => AppConfig::load_with_source(&DEFAULT_CANDIDATES)?,
    };
    init_tracing("solarctl", &loaded.config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => debug!("using built-in configuration"),
    }
    let config = loaded.config;

    match cli.command {
        Commands::List(cmd) => cmd.execute(),
        Commands::Describe(cmd) => cmd.execute(),
        Commands::Validate(cmd) => cmd.execute(&config),
        Commands::Run(cmd) => cmd.execute(&config),
        #[cfg(feature = "rest-api")]
        Commands::Serve(cmd) => cmd.execute(&config),
    }
}
