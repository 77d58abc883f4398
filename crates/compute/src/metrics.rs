use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a single task execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Aborted,
    Failed,
}

/// Execution counters keyed by task name, across any number of runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskMetrics {
    /// Completed executions by name.
    pub completed: HashMap<String, u64>,
    /// Executions that ended through an abort.
    pub aborted: HashMap<String, u64>,
    /// Executions that ended with a failure.
    pub failed: HashMap<String, u64>,
    /// Average duration of completed executions.
    pub avg_duration: HashMap<String, Duration>,
    /// Last time each task finished, whatever the outcome.
    pub last_run: HashMap<String, DateTime<Utc>>,
}

/// Handle passed to [`RunOptions`](crate::task::RunOptions) to collect metrics.
pub type SharedTaskMetrics = Arc<RwLock<TaskMetrics>>;

pub fn new_shared_metrics() -> SharedTaskMetrics {
    Arc::new(RwLock::new(TaskMetrics::default()))
}

impl TaskMetrics {
    /// Record one finished execution.
    pub fn record(&mut self, task_name: &str, outcome: Outcome, duration: Duration) {
        self.last_run.insert(task_name.to_string(), Utc::now());

        match outcome {
            Outcome::Aborted => {
                *self.aborted.entry(task_name.to_string()).or_default() += 1;
                return;
            }
            Outcome::Failed => {
                *self.failed.entry(task_name.to_string()).or_default() += 1;
                return;
            }
            Outcome::Completed => {}
        }

        let count = {
            let entry = self.completed.entry(task_name.to_string()).or_default();
            *entry += 1;
            *entry
        };
        let prev_avg = self
            .avg_duration
            .get(task_name)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_duration.insert(task_name.to_string(), new_avg);
    }

    pub fn total_runs(&self, task_name: &str) -> u64 {
        [&self.completed, &self.aborted, &self.failed]
            .iter()
            .map(|m| m.get(task_name).copied().unwrap_or(0))
            .sum()
    }
}
