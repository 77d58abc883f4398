use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepwise_core::{RuntimeConfig, SchedulerChoice};

use crate::scheduler::Scheduler;

/// Default minimum time between two observer notifications.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Runner configuration, typically parsed from TOML or derived from the
/// environment config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Observer notification interval in milliseconds. 0 = synchronous runs.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Host-yield strategy.
    #[serde(default)]
    pub scheduler: SchedulerChoice,
}

fn default_update_interval_ms() -> u64 { DEFAULT_UPDATE_INTERVAL.as_millis() as u64 }

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            scheduler: SchedulerChoice::default(),
        }
    }
}

impl RunnerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            update_interval_ms: runtime.update_interval_ms,
            scheduler: runtime.scheduler,
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Resolve the configured scheduler. `auto` reuses the process-wide one.
    pub fn scheduler(&self) -> Scheduler {
        match self.scheduler {
            SchedulerChoice::Auto => Scheduler::global().clone(),
            choice => Scheduler::from_choice(choice),
        }
    }
}
