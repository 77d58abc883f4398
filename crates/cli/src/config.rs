use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use stepwise_compute::RunnerConfig;
use stepwise_core::{Config, SchedulerChoice};

use crate::cli::CliArgs;

/// CLI configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub runner: RunnerOverrides,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Runner settings that, when present, win over the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerOverrides {
    pub update_interval_ms: Option<u64>,
    pub scheduler: Option<SchedulerChoice>,
}

/// Size of the demo workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_units")]
    pub units: u64,
    #[serde(default = "default_cost_us")]
    pub cost_us: u64,
}

fn default_units() -> u64 {
    200_000
}

fn default_cost_us() -> u64 {
    5
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            units: default_units(),
            cost_us: default_cost_us(),
        }
    }
}

impl CliConfig {
    /// Return the default config file path: ~/.config/stepwise/config.toml
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("stepwise");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => match Self::default_config_path() {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))
        } else if path.is_some() {
            anyhow::bail!("config file not found: {}", config_path.display())
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve runner settings.
    /// Priority: cli flag > config file > environment > built-in default.
    pub fn resolve_runner(&self, env: &Config, args: &CliArgs) -> RunnerConfig {
        let mut runner = RunnerConfig::from_runtime(&env.runtime);
        if let Some(ms) = self.runner.update_interval_ms {
            runner.update_interval_ms = ms;
        }
        if let Some(choice) = self.runner.scheduler {
            runner.scheduler = choice;
        }
        if let Some(ms) = args.interval_ms {
            runner.update_interval_ms = ms;
        }
        if let Some(choice) = args.scheduler {
            runner.scheduler = choice;
        }
        runner
    }

    /// Resolve the demo workload size. Priority: cli flag (or its env var) > config file.
    pub fn resolve_demo(&self, args: &CliArgs) -> DemoConfig {
        DemoConfig {
            units: args.units.unwrap_or(self.demo.units),
            cost_us: args.cost_us.unwrap_or(self.demo.cost_us),
        }
    }
}
