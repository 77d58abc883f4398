//! Progress tree shared by all nodes of one task execution.
//!
//! Nodes live in a flat [`ProgressArena`] owned by the execution; parent and
//! child links are [`NodeId`] indices into it. Observers never see the arena
//! itself, only owned [`ProgressTree`] snapshots.

pub mod abort;
pub mod arena;
pub mod snapshot;
pub mod update;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use abort::AbortHandle;
pub use arena::{NodeId, ProgressArena, ProgressNode};
pub use snapshot::{ProgressSnapshot, ProgressTree};
pub use update::UpdateInfo;

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
///
/// Progress state is plain data; a panic in an observer must not wedge the
/// rest of the tree.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
