//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Application configuration for the solar calculation tools."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use solar_calc_engine::model::{InputBag, InputValue};
use solar_calc_engine::registry::CalculatorId;
use tracing::debug;

use crate::logging::LogFormat;

/// Files inspected in order when no explicit configuration path is given.
pub const DEFAULT_CANDIDATES: [&str; 2] = ["solar-calc.toml", "configs/solar-calc.toml"];

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_reports_enabled() -> bool {
    true
}

fn default_reports_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8088))
}

/// Primary configuration object for `solarctl` and the REST host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Per-calculator input defaults, keyed by calculator id.
    #[serde(default)]
    pub defaults: IndexMap<String, InputBag>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// `source` is `None` when the built-in defaults are in effect.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "SOLAR_CALC_CONFIG";

    /// Load configuration from disk, respecting the `SOLAR_CALC_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// The environment override wins and must point at a readable file. Otherwise the
    /// first existing candidate is used, falling back to the built-in defaults.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using built-in defaults"
        );
        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    /// Read and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Input defaults configured for one calculator, empty when none are set.
    pub fn defaults_for(&self, calculator: &str) -> InputBag {
        self.defaults.get(calculator).cloned().unwrap_or_default()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        self.reports.validate()?;
        for (calculator, bag) in &self.defaults {
            if calculator.trim().is_empty() {
                return Err(anyhow!("defaults table must be keyed by a calculator id"));
            }
            CalculatorId::parse(calculator)
                .with_context(|| format!("defaults declared for '{calculator}'"))?;
            for (name, value) in bag.iter() {
                if name.trim().is_empty() {
                    return Err(anyhow!("defaults for '{calculator}' contain an empty key"));
                }
                let finite = match value {
                    InputValue::Number(number) => number.is_finite(),
                    InputValue::Sequence(values) => values.iter().all(|v| v.is_finite()),
                    InputValue::Text(_) => true,
                };
                if !finite {
                    return Err(anyhow!(
                        "default '{calculator}.{name}' must be a finite number"
                    ));
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(anyhow!("logging.directory must not be empty"));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

/// Where calculation reports are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reports_directory")]
    pub directory: PathBuf,
}

impl ReportsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.directory.as_os_str().is_empty() {
            return Err(anyhow!(
                "reports.directory must not be empty while reports are enabled"
            ));
        }
        Ok(())
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            enabled: default_reports_enabled(),
            directory: default_reports_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
        }
    }
}
