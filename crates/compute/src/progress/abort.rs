use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::lock;

/// Shared abort flag for one task tree.
///
/// Cancellation is all-or-nothing: every node of an execution observes the
/// same handle, so a request made anywhere aborts the whole tree.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    inner: Arc<AbortState>,
}

#[derive(Debug, Default)]
struct AbortState {
    requested: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the first request;
    /// later calls keep the original reason and change nothing.
    pub fn request_abort(&self, reason: impl Into<String>) -> bool {
        let mut slot = lock(&self.inner.reason);
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason.into());
        self.inner.requested.store(true, Ordering::Release);
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        lock(&self.inner.reason).clone()
    }

    /// Whether two handles control the same tree.
    pub fn same_as(&self, other: &AbortHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_wins() {
        let handle = AbortHandle::new();
        assert!(!handle.is_requested());
        assert!(handle.request_abort("first"));
        assert!(!handle.request_abort("second"));
        assert!(handle.is_requested());
        assert_eq!(handle.reason().as_deref(), Some("first"));
    }

    #[test]
    fn clones_share_state() {
        let handle = AbortHandle::new();
        let clone = handle.clone();
        clone.request_abort("from clone");
        assert!(handle.is_requested());
        assert!(handle.same_as(&clone));
        assert!(!handle.same_as(&AbortHandle::new()));
    }
}
