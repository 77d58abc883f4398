use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::snapshot::ProgressSnapshot;
use super::update::UpdateInfo;

/// Index of a node inside its execution's [`ProgressArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Every arena stores its root first.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// Progress state of one task execution within a tree.
#[derive(Debug, Clone)]
pub struct ProgressNode {
    pub task_name: String,
    pub message: String,
    pub current: u64,
    pub max: u64,
    pub is_indeterminate: bool,
    pub started_at: DateTime<Utc>,
    pub can_abort: bool,
    pub is_aborting: bool,
    started: Instant,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ProgressNode {
    fn new(task_name: &str, parent: Option<NodeId>) -> Self {
        Self {
            task_name: task_name.to_string(),
            message: String::new(),
            current: 0,
            max: 0,
            is_indeterminate: true,
            started_at: Utc::now(),
            can_abort: true,
            is_aborting: false,
            started: Instant::now(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Merge a partial update, keeping `current <= max` for determinate nodes.
    pub fn apply(&mut self, info: &UpdateInfo) {
        if let Some(message) = &info.message {
            self.message.clone_from(message);
        }
        if let Some(current) = info.current {
            self.current = current;
        }
        if let Some(max) = info.max {
            self.max = max;
        }
        if let Some(is_indeterminate) = info.is_indeterminate {
            self.is_indeterminate = is_indeterminate;
        }
        if let Some(can_abort) = info.can_abort {
            self.can_abort = can_abort;
        }
        if !self.is_indeterminate && self.current > self.max {
            self.current = self.max;
        }
    }
}

/// Flat store of every node of one execution. The root is always at
/// [`NodeId::ROOT`]; nodes are never removed.
#[derive(Debug, Clone)]
pub struct ProgressArena {
    nodes: Vec<ProgressNode>,
}

impl ProgressArena {
    pub fn new(root_task_name: &str) -> Self {
        Self {
            nodes: vec![ProgressNode::new(root_task_name, None)],
        }
    }

    /// Append a new child under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, task_name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ProgressNode::new(task_name, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&ProgressNode> {
        self.nodes.get(id.0)
    }

    pub fn root(&self) -> &ProgressNode {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &ProgressNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ProgressNode {
        &mut self.nodes[id.0]
    }

    pub fn apply(&mut self, id: NodeId, info: &UpdateInfo) {
        self.node_mut(id).apply(info);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Owned copy of the subtree rooted at `id`.
    pub fn snapshot(&self, id: NodeId) -> ProgressSnapshot {
        let node = self.node(id);
        ProgressSnapshot {
            task_name: node.task_name.clone(),
            message: node.message.clone(),
            current: node.current,
            max: node.max,
            is_indeterminate: node.is_indeterminate,
            started_at: node.started_at,
            elapsed_ms: node.elapsed().as_millis() as u64,
            can_abort: node.can_abort,
            is_aborting: node.is_aborting,
            children: node.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }
}
