use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::abort::AbortHandle;

/// Owned, serializable copy of a progress node and its descendants.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub task_name: String,
    pub message: String,
    pub current: u64,
    pub max: u64,
    pub is_indeterminate: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub can_abort: bool,
    pub is_aborting: bool,
    pub children: Vec<ProgressSnapshot>,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`, or `None` while indeterminate.
    pub fn fraction(&self) -> Option<f64> {
        if self.is_indeterminate {
            return None;
        }
        if self.max == 0 {
            return Some(0.0);
        }
        Some(self.current as f64 / self.max as f64)
    }

    /// Depth-first (pre-order) walk with each node's depth, root at 0.
    pub fn walk(&self) -> Vec<(usize, &ProgressSnapshot)> {
        let mut out = Vec::new();
        self.walk_into(0, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a ProgressSnapshot)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk_into(depth + 1, out);
        }
    }

    /// First node in pre-order with the given task name.
    pub fn find(&self, task_name: &str) -> Option<&ProgressSnapshot> {
        self.walk()
            .into_iter()
            .map(|(_, node)| node)
            .find(|node| node.task_name == task_name)
    }
}

/// What an observer receives: the whole tree, always from the root.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressTree {
    pub execution_id: Uuid,
    pub root: ProgressSnapshot,
    pub abort_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip)]
    pub(crate) abort: AbortHandle,
}

impl ProgressTree {
    /// Ask the running tree to stop at its next cooperative check.
    pub fn request_abort(&self, reason: impl Into<String>) -> bool {
        self.abort.request_abort(reason)
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}
