pub mod backoff;
pub mod runtime;
pub mod subscribe;

pub use backoff::{calculate_backoff_millis, BackoffConfig, MAX_BACKOFF_MILLIS, RANDOM_FACTOR};
pub use subscribe::{ObserverRegistry, PartialObserver, Unsubscribe};
