mod cli;
mod config;
mod demo;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use stepwise_compute::{AbortHandle, ProgressTree, RunOptions, Scheduler, TaskError};

use crate::cli::CliArgs;
use crate::config::CliConfig;
use crate::demo::demo_task;
use crate::terminal::Terminal;

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_ABORTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    stepwise_core::load_dotenv();
    let env_config = stepwise_core::Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&env_config.logging.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    env_config.log_summary();

    let file_config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    let runner = file_config.resolve_runner(&env_config, &args);
    let demo = file_config.resolve_demo(&args);

    let scheduler = runner.scheduler();
    if Scheduler::install_global(scheduler.clone()).is_err() {
        debug!("Global scheduler already resolved");
    }

    let terminal = Terminal::new(args.format);
    terminal.print_banner(demo.units, scheduler.name(), runner.update_interval_ms)?;

    let abort = AbortHandle::new();
    spawn_interrupt_watch(abort.clone());
    if let Some(ms) = args.timeout_ms {
        spawn_deadline(abort.clone(), scheduler.clone(), Duration::from_millis(ms));
    }

    let options = RunOptions {
        observer: Some(Arc::new(move |tree: &ProgressTree| {
            if let Err(e) = terminal.display_tree(tree) {
                debug!(error = %e, "Failed to display progress");
            }
        })),
        ..RunOptions::from_config(&runner).abort_handle(abort)
    };

    info!(units = demo.units, cost_us = demo.cost_us, "Starting demo run");
    match demo_task(demo).run_with(options).await {
        Ok(report) => {
            info!(checksum = report.checksum, "Demo run completed");
            terminal.print_report(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(TaskError::Aborted(reason)) => {
            info!(reason = %reason, "Demo run aborted");
            terminal.print_aborted(&reason)?;
            Ok(ExitCode::from(EXIT_ABORTED))
        }
        Err(TaskError::Failed(e)) => {
            error!(error = %e, "Demo run failed");
            terminal.print_error(&format!("{:#}", e))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Ctrl+C requests a cooperative abort of the running tree.
fn spawn_interrupt_watch(abort: AbortHandle) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                if abort.request_abort("interrupted") {
                    info!("Interrupt received, aborting at next checkpoint");
                }
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl+C"),
        }
    });
}

/// Deadline sibling: requests abort once `after` has elapsed.
fn spawn_deadline(abort: AbortHandle, scheduler: Scheduler, after: Duration) {
    tokio::spawn(async move {
        scheduler.delay(after).await;
        if abort.request_abort(format!("timed out after {}ms", after.as_millis())) {
            info!(timeout_ms = after.as_millis() as u64, "Deadline reached, aborting");
        }
    });
}
