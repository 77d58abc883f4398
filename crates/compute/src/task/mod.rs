//! Task templates and their executions.
//!
//! A [`Task`] is a named, reusable computation. Each call to
//! [`Task::run`] creates a fresh progress tree whose root node belongs to
//! that run; computations may spawn children through
//! [`TaskContext::run_child`] or [`Task::run_as_child`].

mod context;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};
use crate::metrics::{Outcome, SharedTaskMetrics};
use crate::progress::{AbortHandle, ProgressTree, UpdateInfo};
use crate::scheduler::Scheduler;
use crate::types::{RunnerConfig, DEFAULT_UPDATE_INTERVAL};

pub use context::TaskContext;
use context::Execution;

/// Receives the whole progress tree on every notification.
///
/// Called while the execution's notification lock is held: observers must
/// not call back into a [`TaskContext`] of the same run. Requesting an
/// abort through the tree is fine.
pub type ProgressObserver = Arc<dyn Fn(&ProgressTree) + Send + Sync>;

type Computation<T> = dyn Fn(TaskContext) -> BoxFuture<'static, TaskResult<T>> + Send + Sync;
type AbortCallback = dyn Fn(&str) + Send + Sync;

/// A named computation that can be run any number of times.
pub struct Task<T> {
    name: Arc<str>,
    computation: Arc<Computation<T>>,
    on_abort: Option<Arc<AbortCallback>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            computation: Arc::clone(&self.computation),
            on_abort: self.on_abort.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("has_on_abort", &self.on_abort.is_some())
            .finish()
    }
}

impl Task<()> {
    /// The distinguished cancellation value. Returning it from a
    /// computation ends the run as aborted rather than failed.
    pub fn aborted(reason: impl Into<String>) -> TaskError {
        TaskError::aborted(reason)
    }
}

impl<T: Send + 'static> Task<T> {
    pub fn create<F, Fut>(name: impl Into<String>, computation: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let computation: Arc<Computation<T>> = Arc::new(move |ctx| computation(ctx).boxed());
        Self {
            name: Arc::from(name.into()),
            computation,
            on_abort: None,
        }
    }

    /// Side effect run once, with the abort reason, whenever an execution
    /// of this task ends through an abort.
    pub fn with_on_abort(mut self, on_abort: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_abort = Some(Arc::new(on_abort));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run as the root of a new progress tree.
    ///
    /// Without an observer (or with a zero interval) the run is synchronous:
    /// updates never notify or yield.
    pub async fn run(
        &self,
        observer: Option<ProgressObserver>,
        update_interval: Duration,
    ) -> TaskResult<T> {
        self.run_with(RunOptions {
            observer,
            update_interval,
            ..RunOptions::default()
        })
        .await
    }

    pub async fn run_with(&self, options: RunOptions) -> TaskResult<T> {
        let execution = Arc::new(Execution::new(&self.name, options));
        self.execute(TaskContext::root(execution)).await
    }

    /// Same as `parent.run_child(self, progress)`.
    pub fn run_as_child(
        &self,
        parent: &TaskContext,
        progress: Option<UpdateInfo>,
    ) -> impl Future<Output = TaskResult<T>> + Send + 'static {
        parent.run_child(self, progress)
    }

    pub(crate) async fn execute(&self, ctx: TaskContext) -> TaskResult<T> {
        let node = ctx.node_id();
        debug!(task = %self.name, node = node.index(), "task started");
        let started = Instant::now();

        let result = (self.computation)(ctx.clone()).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => {
                debug!(
                    task = %self.name,
                    node = node.index(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "task completed"
                );
                ctx.record(&self.name, Outcome::Completed, elapsed);
            }
            Err(TaskError::Aborted(reason)) => {
                info!(task = %self.name, node = node.index(), reason = %reason, "task aborted");
                ctx.record(&self.name, Outcome::Aborted, elapsed);
                if let Some(on_abort) = &self.on_abort {
                    on_abort(reason);
                }
            }
            Err(TaskError::Failed(e)) => {
                if node.is_root() {
                    warn!(task = %self.name, error = %e, "task failed");
                } else {
                    debug!(task = %self.name, node = node.index(), error = %e, "child task failed");
                }
                ctx.record(&self.name, Outcome::Failed, elapsed);
            }
        }

        result
    }
}

/// Everything a root run can be configured with.
#[derive(Clone)]
pub struct RunOptions {
    pub observer: Option<ProgressObserver>,
    pub update_interval: Duration,
    /// Defaults to [`Scheduler::global`].
    pub scheduler: Option<Scheduler>,
    /// Pre-created handle, for aborting from outside the run.
    pub abort: Option<AbortHandle>,
    pub metrics: Option<SharedTaskMetrics>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            observer: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            scheduler: None,
            abort: None,
            metrics: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            update_interval: config.update_interval(),
            scheduler: Some(config.scheduler()),
            ..Self::default()
        }
    }

    pub fn observer(mut self, observer: impl Fn(&ProgressTree) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn metrics(mut self, metrics: SharedTaskMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
