use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type NextFn<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;
pub type ErrorFn = Arc<dyn Fn(&dyn Error) + Send + Sync + 'static>;

pub struct PartialObserver<T> {
    pub next: Option<NextFn<T>>,
    pub error: Option<ErrorFn>,
}

impl<T> PartialObserver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_next<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(callback));
        self
    }

    pub fn with_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn Error) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(callback));
        self
    }

    pub fn notify(&self, value: &T) {
        if let Some(next) = &self.next {
            next(value);
        }
    }

    pub fn notify_error(&self, error: &dyn Error) {
        if let Some(callback) = &self.error {
            callback(error);
        }
    }
}

impl<T> Clone for PartialObserver<T> {
    fn clone(&self) -> Self {
        Self {
            next: self.next.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T> Default for PartialObserver<T> {
    fn default() -> Self {
        Self {
            next: None,
            error: None,
        }
    }
}

pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;

/// Observers keyed by registration so they can be removed again.
pub struct ObserverRegistry<T> {
    next_id: AtomicU64,
    observers: Arc<Mutex<Vec<(u64, PartialObserver<T>)>>>,
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: 'static> ObserverRegistry<T> {
    pub fn add_observer(&self, observer: PartialObserver<T>) -> Unsubscribe
    where
        T: Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.observers).push((id, observer));
        let observers = Arc::downgrade(&self.observers);
        Box::new(move || {
            if let Some(observers) = observers.upgrade() {
                lock(&observers).retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Observers run without the registry lock held so they may register or
    /// remove others.
    pub fn notify(&self, value: &T) {
        for observer in self.snapshot() {
            observer.notify(value);
        }
    }

    pub fn notify_error(&self, error: &dyn Error) {
        for observer in self.snapshot() {
            observer.notify_error(error);
        }
    }

    pub fn clear(&self) {
        lock(&self.observers).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<PartialObserver<T>> {
        lock(&self.observers)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }
}
