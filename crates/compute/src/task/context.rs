use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{TaskError, TaskResult};
use crate::metrics::{Outcome, SharedTaskMetrics};
use crate::progress::{
    lock, AbortHandle, NodeId, ProgressArena, ProgressSnapshot, ProgressTree, UpdateInfo,
};
use crate::scheduler::Scheduler;

use super::{ProgressObserver, RunOptions, Task};

/// State shared by every node of one task tree.
pub(crate) struct Execution {
    id: Uuid,
    tree: Mutex<ProgressArena>,
    observer: Option<ProgressObserver>,
    update_interval: Duration,
    scheduler: Scheduler,
    abort: AbortHandle,
    metrics: Option<SharedTaskMetrics>,
    /// Time of the last observer notification. Held while the observer
    /// runs, which keeps notifications ordered and never concurrent.
    last_notified: Mutex<Option<Instant>>,
}

impl Execution {
    pub(crate) fn new(root_task_name: &str, options: RunOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree: Mutex::new(ProgressArena::new(root_task_name)),
            observer: options.observer,
            update_interval: options.update_interval,
            scheduler: options
                .scheduler
                .unwrap_or_else(|| Scheduler::global().clone()),
            abort: options.abort.unwrap_or_default(),
            metrics: options.metrics,
            last_notified: Mutex::new(None),
        }
    }

    fn is_synchronous(&self) -> bool {
        self.observer.is_none() || self.update_interval.is_zero()
    }

    fn snapshot(&self) -> ProgressTree {
        let mut root = lock(&self.tree).snapshot(NodeId::ROOT);
        let abort_requested = self.abort.is_requested();
        if abort_requested {
            root.is_aborting = true;
        }
        ProgressTree {
            execution_id: self.id,
            root,
            abort_requested,
            abort_reason: self.abort.reason(),
            abort: self.abort.clone(),
        }
    }
}

/// Handle a running computation uses to report progress, check for
/// cancellation and spawn child tasks.
///
/// Every task execution gets its own context pointing at its own node;
/// all contexts of one tree share the same execution state.
#[derive(Clone)]
pub struct TaskContext {
    execution: Arc<Execution>,
    node: NodeId,
}

impl TaskContext {
    pub(crate) fn root(execution: Arc<Execution>) -> Self {
        Self {
            execution,
            node: NodeId::ROOT,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution.id
    }

    pub fn task_name(&self) -> String {
        lock(&self.execution.tree).node(self.node).task_name.clone()
    }

    /// True when nobody observes this run: no observer was given or the
    /// update interval is zero. Updates then never notify or yield.
    pub fn is_synchronous(&self) -> bool {
        self.execution.is_synchronous()
    }

    /// Whether enough time passed since the last notification that an
    /// update would reach the observer. Lets hot loops skip building
    /// status messages nobody will see.
    pub fn should_update(&self) -> bool {
        if self.is_synchronous() {
            return false;
        }
        match *lock(&self.execution.last_notified) {
            None => true,
            Some(at) => at.elapsed() >= self.execution.update_interval,
        }
    }

    /// Merge `info` into this node's progress and, if the update interval
    /// elapsed, notify the observer with the whole tree and yield to the host.
    ///
    /// Returns [`TaskError::Aborted`] once an abort was requested and this
    /// node allows aborting; computations should propagate it with `?`.
    pub fn update(
        &self,
        info: impl Into<UpdateInfo>,
    ) -> impl Future<Output = TaskResult<()>> + Send + '_ {
        self.update_inner(info.into(), false)
    }

    /// Like [`update`](Self::update), but notifies regardless of the
    /// interval. Meant for coarse milestones such as phase changes.
    pub fn update_now(
        &self,
        info: impl Into<UpdateInfo>,
    ) -> impl Future<Output = TaskResult<()>> + Send + '_ {
        self.update_inner(info.into(), true)
    }

    async fn update_inner(&self, info: UpdateInfo, force: bool) -> TaskResult<()> {
        if !info.is_empty() {
            lock(&self.execution.tree).apply(self.node, &info);
        }
        self.check_aborted()?;

        if !(force || self.should_update()) || self.is_synchronous() {
            return Ok(());
        }

        self.notify();
        // The observer may have requested the abort.
        self.check_aborted()?;
        self.execution.scheduler.yield_now().await;
        Ok(())
    }

    fn notify(&self) {
        let Some(observer) = &self.execution.observer else {
            return;
        };
        let mut last = lock(&self.execution.last_notified);
        *last = Some(Instant::now());
        let tree = self.execution.snapshot();
        observer(&tree);
    }

    /// `Err(Aborted)` if the tree is being aborted and this node permits it.
    pub fn check_aborted(&self) -> TaskResult<()> {
        if !self.execution.abort.is_requested() {
            return Ok(());
        }
        {
            let mut tree = lock(&self.execution.tree);
            let node = tree.node_mut(self.node);
            if !node.can_abort {
                return Ok(());
            }
            node.is_aborting = true;
        }
        Err(TaskError::Aborted(
            self.execution.abort.reason().unwrap_or_default(),
        ))
    }

    /// Request abort of the whole tree. Idempotent: only the first request
    /// counts and returns `true`.
    pub fn request_abort(&self, reason: impl Into<String>) -> bool {
        self.execution.abort.request_abort(reason)
    }

    pub fn is_abort_requested(&self) -> bool {
        self.execution.abort.is_requested()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.execution.abort.clone()
    }

    /// Run `task` as a child of this node.
    ///
    /// The child node is appended when this is called, not when the future
    /// is first polled, so children launched together and joined later keep
    /// their call order in the tree.
    pub fn run_child<S: Send + 'static>(
        &self,
        task: &Task<S>,
        progress: Option<UpdateInfo>,
    ) -> impl Future<Output = TaskResult<S>> + Send + 'static {
        let child = self.child_context(task.name(), progress.as_ref());
        let task = task.clone();
        async move { task.execute(child).await }
    }

    fn child_context(&self, task_name: &str, progress: Option<&UpdateInfo>) -> TaskContext {
        let node = {
            let mut tree = lock(&self.execution.tree);
            let node = tree.add_child(self.node, task_name);
            if let Some(info) = progress {
                tree.apply(node, info);
            }
            node
        };
        TaskContext {
            execution: Arc::clone(&self.execution),
            node,
        }
    }

    /// Snapshot of this node and its descendants.
    pub fn progress(&self) -> ProgressSnapshot {
        lock(&self.execution.tree).snapshot(self.node)
    }

    /// Snapshot of the whole tree, as an observer would see it.
    pub fn tree(&self) -> ProgressTree {
        self.execution.snapshot()
    }

    /// Time since the root of this tree started.
    pub fn elapsed(&self) -> Duration {
        lock(&self.execution.tree).root().elapsed()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.execution.scheduler
    }

    /// Suspend for at least `duration` using this run's scheduler.
    pub async fn delay(&self, duration: Duration) {
        self.execution.scheduler.delay(duration).await;
    }

    /// Cede control to the host once using this run's scheduler.
    pub async fn yield_now(&self) {
        self.execution.scheduler.yield_now().await;
    }

    pub(crate) fn record(&self, task_name: &str, outcome: Outcome, duration: Duration) {
        if let Some(metrics) = &self.execution.metrics {
            metrics
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .record(task_name, outcome, duration);
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("execution_id", &self.execution.id)
            .field("node", &self.node)
            .finish()
    }
}
