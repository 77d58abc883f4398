use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `STEPWISE_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("STEPWISE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            runtime: RuntimeConfig::from_env_profiled(p),
            logging: LoggingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  runtime:  update_interval={}ms, scheduler={}",
            self.runtime.update_interval_ms,
            self.runtime.scheduler
        );
        tracing::info!("  logging:  level={}", self.logging.level);
    }

    /// Return a view suitable for `--format json` output.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "runtime": {
                "update_interval_ms": self.runtime.update_interval_ms,
                "scheduler": self.runtime.scheduler.to_string(),
            },
            "logging": { "level": self.logging.level },
        })
    }
}

// ── Runtime ───────────────────────────────────────────────────

/// Which host-yield strategy the task runtime should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerChoice {
    /// Probe the candidates in preference order and take the first available.
    #[default]
    Auto,
    Tokio,
    Waker,
    Timer,
}

impl fmt::Display for SchedulerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerChoice::Auto => write!(f, "auto"),
            SchedulerChoice::Tokio => write!(f, "tokio"),
            SchedulerChoice::Waker => write!(f, "waker"),
            SchedulerChoice::Timer => write!(f, "timer"),
        }
    }
}

impl FromStr for SchedulerChoice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(SchedulerChoice::Auto),
            "tokio" => Ok(SchedulerChoice::Tokio),
            "waker" => Ok(SchedulerChoice::Waker),
            "timer" => Ok(SchedulerChoice::Timer),
            other => Err(CoreError::InvalidValue {
                key: "STEPWISE_SCHEDULER".to_string(),
                value: other.to_string(),
                reason: "expected one of auto, tokio, waker, timer".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Minimum time between two observer notifications of one task tree.
    pub update_interval_ms: u64,
    pub scheduler: SchedulerChoice,
}

impl RuntimeConfig {
    fn from_env_profiled(p: &str) -> Self {
        let scheduler = profiled_env_or(p, "STEPWISE_SCHEDULER", "auto");
        let scheduler = match scheduler.parse() {
            Ok(choice) => choice,
            Err(e) => {
                tracing::warn!("{}; falling back to auto", e);
                SchedulerChoice::Auto
            }
        };
        Self {
            update_interval_ms: profiled_env_u64(p, "STEPWISE_UPDATE_INTERVAL_MS", 100),
            scheduler,
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    pub level: String,
}

impl LoggingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            level: profiled_env_or(p, "STEPWISE_LOG", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_choice_parses_known_names() {
        assert_eq!("auto".parse::<SchedulerChoice>(), Ok(SchedulerChoice::Auto));
        assert_eq!("".parse::<SchedulerChoice>(), Ok(SchedulerChoice::Auto));
        assert_eq!(" Tokio ".parse::<SchedulerChoice>(), Ok(SchedulerChoice::Tokio));
        assert_eq!("WAKER".parse::<SchedulerChoice>(), Ok(SchedulerChoice::Waker));
        assert_eq!("timer".parse::<SchedulerChoice>(), Ok(SchedulerChoice::Timer));
    }

    #[test]
    fn scheduler_choice_rejects_unknown_names() {
        let err = "setimmediate".parse::<SchedulerChoice>().unwrap_err();
        assert!(err.to_string().contains("STEPWISE_SCHEDULER"));
    }

    #[test]
    fn scheduler_choice_display_round_trips() {
        for choice in [
            SchedulerChoice::Auto,
            SchedulerChoice::Tokio,
            SchedulerChoice::Waker,
            SchedulerChoice::Timer,
        ] {
            assert_eq!(choice.to_string().parse::<SchedulerChoice>(), Ok(choice));
        }
    }

    #[test]
    fn profiled_keys_take_precedence() {
        // Profile name unique to this test so parallel tests don't interfere.
        env::set_var("CFGTEST_STEPWISE_UPDATE_INTERVAL_MS", "250");
        env::set_var("CFGTEST_STEPWISE_SCHEDULER", "waker");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile_label(), "CFGTEST");
        assert_eq!(config.runtime.update_interval_ms, 250);
        assert_eq!(config.runtime.scheduler, SchedulerChoice::Waker);
        env::remove_var("CFGTEST_STEPWISE_UPDATE_INTERVAL_MS");
        env::remove_var("CFGTEST_STEPWISE_SCHEDULER");
    }

    #[test]
    fn summary_reports_profile_and_scheduler() {
        let config = Config {
            profile: String::new(),
            runtime: RuntimeConfig {
                update_interval_ms: 100,
                scheduler: SchedulerChoice::Tokio,
            },
            logging: LoggingConfig { level: "debug".into() },
        };
        let summary = config.summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["runtime"]["scheduler"], "tokio");
        assert_eq!(summary["logging"]["level"], "debug");
    }
}
