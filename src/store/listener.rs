use std::sync::Arc;

use crate::store::error::StoreResult;
use crate::store::snapshot::QuerySnapshot;

/// Callback invoked with the full result set of a live query on every change.
pub type QueryCallback = Arc<dyn Fn(StoreResult<QuerySnapshot>) + Send + Sync + 'static>;

/// Handle to an active live query. Detaches on [`ListenerRegistration::detach`] or drop.
pub struct ListenerRegistration {
    detach: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl ListenerRegistration {
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A registration with nothing to detach.
    pub fn noop() -> Self {
        Self { detach: None }
    }

    pub fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    pub fn detach(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.is_active())
            .finish()
    }
}
