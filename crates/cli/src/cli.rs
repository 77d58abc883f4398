use clap::{Parser, ValueEnum};
use stepwise_core::SchedulerChoice;

/// Run a demo workload through the stepwise task runtime.
///
/// The demo is a three-phase task: a short preparation, a CPU-bound
/// crunch split into adaptive chunks, and a verification pass fanned out
/// to three concurrent child tasks. Progress is printed as it arrives.
/// Ctrl+C requests a cooperative abort.
#[derive(Parser, Debug)]
#[command(name = "stepwise", version, about = "Cooperative task runtime demo")]
pub struct CliArgs {
    /// Units of work to crunch
    #[arg(long, env = "STEPWISE_DEMO_UNITS")]
    pub units: Option<u64>,

    /// Simulated cost of one unit, in microseconds
    #[arg(long, env = "STEPWISE_DEMO_COST_US")]
    pub cost_us: Option<u64>,

    /// Minimum time between progress reports (0 = run without reporting)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Progress output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Host-yield strategy: auto, tokio, waker or timer
    #[arg(long)]
    pub scheduler: Option<SchedulerChoice>,

    /// Path to config file (default: ~/.config/stepwise/config.toml)
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented, colored tree
    Text,
    /// One JSON snapshot per line
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::try_parse_from([
            "stepwise",
            "--units",
            "5000",
            "--cost-us",
            "3",
            "--interval-ms",
            "0",
            "--timeout-ms",
            "250",
            "--format",
            "json",
            "--scheduler",
            "timer",
        ])
        .unwrap();
        assert_eq!(args.units, Some(5000));
        assert_eq!(args.cost_us, Some(3));
        assert_eq!(args.interval_ms, Some(0));
        assert_eq!(args.timeout_ms, Some(250));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.scheduler, Some(SchedulerChoice::Timer));
    }

    #[test]
    fn rejects_unknown_scheduler() {
        assert!(CliArgs::try_parse_from(["stepwise", "--scheduler", "threads"]).is_err());
    }
}
