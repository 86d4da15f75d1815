use std::fmt;

use crate::store::ListenerRegistration;

/// Handle for a per-list live query feeding the shared cache.
///
/// Unsubscribing (explicitly or by dropping the handle) detaches the live
/// query and evicts the list's cache entry.
#[must_use = "dropping the subscription stops it immediately"]
pub struct CacheSubscription {
    registration: Option<ListenerRegistration>,
    evict: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CacheSubscription {
    pub(crate) fn new<F>(registration: ListenerRegistration, evict: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            registration: Some(registration),
            evict: Some(Box::new(evict)),
        }
    }

    /// A handle that does nothing, returned when there is no identity yet.
    pub(crate) fn inactive() -> Self {
        Self {
            registration: None,
            evict: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.registration
            .as_ref()
            .is_some_and(ListenerRegistration::is_active)
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.detach();
        }
        if let Some(evict) = self.evict.take() {
            evict();
        }
    }
}

impl Drop for CacheSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CacheSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}
