//! Cooperative task execution with hierarchical progress and advisory
//! cancellation.
//!
//! Long computations run as [`Task`]s. They report progress through their
//! [`TaskContext`], which also decides when an observer gets notified and
//! when control goes back to the host executor. Aborts are requested on
//! the tree and surface as [`TaskError::Aborted`] at the next update.

pub mod chunked;
pub mod error;
pub mod metrics;
pub mod multistep;
pub mod progress;
pub mod scheduler;
pub mod task;
pub mod types;

pub use chunked::{chunked_subtask, next_chunk_size};
pub use error::{TaskError, TaskResult};
pub use metrics::{new_shared_metrics, Outcome, SharedTaskMetrics, TaskMetrics};
pub use multistep::{multistep_task, Steps};
pub use progress::{
    AbortHandle, NodeId, ProgressArena, ProgressNode, ProgressSnapshot, ProgressTree, UpdateInfo,
};
pub use scheduler::{Scheduler, YieldStrategy};
pub use task::{ProgressObserver, RunOptions, Task, TaskContext};
pub use types::{RunnerConfig, DEFAULT_UPDATE_INTERVAL};
