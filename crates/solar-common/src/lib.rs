//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and tracing setup for the solar tools."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the solar calculation workspace.
//! This crate exposes configuration loading and the production tracing
//! subscriber used by `solarctl` and the REST host.

pub mod config;
pub mod logging;

pub use config::{ApiConfig, AppConfig, LoadedAppConfig, LoggingConfig, ReportsConfig};
pub use logging::{init_tracing, LogFormat};
