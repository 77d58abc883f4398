//! The demo workload: prepare, crunch in adaptive chunks, verify in parallel.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use stepwise_compute::{
    chunked_subtask, multistep_task, Steps, Task, TaskContext, TaskError, TaskResult, UpdateInfo,
};

use crate::config::DemoConfig;

const STEPS: [&str; 3] = ["prepare", "crunch", "verify"];
const VERIFIERS: u64 = 3;
const PREPARE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DemoReport {
    pub units: u64,
    pub checksum: u64,
    pub verified_by: u64,
}

/// Value contributed by one unit of work.
fn unit_value(i: u64) -> u64 {
    i.wrapping_mul(i) % 1_000_003
}

fn spin(cost: Duration) {
    let start = Instant::now();
    while start.elapsed() < cost {
        std::hint::spin_loop();
    }
}

/// Progress through `[start, end)` summing unit values.
#[derive(Debug)]
struct Range {
    next: u64,
    end: u64,
    start: u64,
    sum: u64,
    cost: Duration,
}

impl Range {
    fn new(start: u64, end: u64, cost: Duration) -> Self {
        Self { next: start, end, start, sum: 0, cost }
    }

    fn len(&self) -> u64 {
        self.end - self.start
    }

    fn advance(&mut self, n: usize) -> usize {
        let take = (n as u64).min(self.end - self.next);
        for i in self.next..self.next + take {
            if !self.cost.is_zero() {
                spin(self.cost);
            }
            self.sum = self.sum.wrapping_add(unit_value(i));
        }
        self.next += take;
        take as usize
    }
}

async fn sum_range(ctx: &TaskContext, label: &str, range: Range) -> TaskResult<u64> {
    let total = range.len();
    let range = chunked_subtask(
        ctx,
        64,
        range,
        |n, r| r.advance(n),
        |_, done| UpdateInfo::progress(format!("{label} {done}/{total}"), done, total),
    )
    .await?;
    Ok(range.sum)
}

fn verifier(index: u64, start: u64, end: u64, cost: Duration) -> Task<u64> {
    Task::create(format!("verify-{}", index + 1), move |ctx: TaskContext| async move {
        sum_range(&ctx, "checked", Range::new(start, end, cost)).await
    })
}

/// Build the demo task. Reusable: every run recomputes from scratch.
pub fn demo_task(config: DemoConfig) -> Task<DemoReport> {
    multistep_task("demo", STEPS, config, |config: DemoConfig, steps: Steps, ctx| async move {
        let cost = Duration::from_micros(config.cost_us);

        steps.step(0).await?;
        ctx.update(UpdateInfo::message("warming up").with_indeterminate(true))
            .await?;
        ctx.delay(PREPARE_DELAY).await;

        steps.step(1).await?;
        let checksum = ctx
            .run_child(&crunch_task(config.units, cost), None)
            .await?;
        debug!(checksum, "crunch finished");

        steps.step(2).await?;
        let slice = config.units.div_ceil(VERIFIERS).max(1);
        let running: Vec<_> = (0..VERIFIERS)
            .map(|i| {
                let start = (i * slice).min(config.units);
                let end = ((i + 1) * slice).min(config.units);
                verifier(i, start, end, cost).run_as_child(&ctx, None)
            })
            .collect();
        let mut verified = 0u64;
        for partial in join_all(running).await {
            verified = verified.wrapping_add(partial?);
        }

        if verified != checksum {
            return Err(TaskError::failed(anyhow!(
                "verification mismatch: crunch={checksum} verify={verified}"
            )));
        }
        ctx.update_now(format!("verified {verified}")).await?;

        Ok(DemoReport {
            units: config.units,
            checksum,
            verified_by: VERIFIERS,
        })
    })
}

fn crunch_task(units: u64, cost: Duration) -> Task<u64> {
    Task::create("crunch", move |ctx: TaskContext| async move {
        sum_range(&ctx, "crunched", Range::new(0, units, cost)).await
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use stepwise_compute::{ProgressObserver, ProgressTree};

    use super::*;

    fn reference_checksum(units: u64) -> u64 {
        (0..units).fold(0u64, |acc, i| acc.wrapping_add(unit_value(i)))
    }

    fn small(units: u64) -> DemoConfig {
        DemoConfig { units, cost_us: 0 }
    }

    #[tokio::test]
    async fn synchronous_run_matches_reference() {
        let report = demo_task(small(10_000)).run(None, Duration::ZERO).await.unwrap();
        assert_eq!(report.checksum, reference_checksum(10_000));
        assert_eq!(report.verified_by, 3);
    }

    #[tokio::test]
    async fn observed_run_builds_expected_tree() {
        let last: Arc<Mutex<Option<ProgressTree>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&last);
        let observer: ProgressObserver = Arc::new(move |tree: &ProgressTree| {
            *sink.lock().unwrap() = Some(tree.clone());
        });

        let report = demo_task(DemoConfig { units: 3_000, cost_us: 1 })
            .run(Some(observer), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(report.checksum, reference_checksum(3_000));

        let tree = last.lock().unwrap().clone().unwrap();
        assert_eq!(tree.root.task_name, "demo");
        let names: Vec<&str> = tree.root.children.iter().map(|c| c.task_name.as_str()).collect();
        assert_eq!(names, vec!["crunch", "verify-1", "verify-2", "verify-3"]);
    }

    #[tokio::test]
    async fn tiny_workloads_still_verify() {
        for units in [0, 1, 2, 4] {
            let report = demo_task(small(units)).run(None, Duration::ZERO).await.unwrap();
            assert_eq!(report.checksum, reference_checksum(units));
        }
    }

    #[test]
    fn range_advance_respects_bounds() {
        let mut r = Range::new(5, 8, Duration::ZERO);
        assert_eq!(r.advance(2), 2);
        assert_eq!(r.advance(usize::MAX), 1);
        assert_eq!(r.advance(10), 0);
        assert_eq!(r.sum, unit_value(5) + unit_value(6) + unit_value(7));
    }
}
