//! Shopping-list domain: entities, repositories and the synchronization core.

pub mod config;
pub mod error;
pub mod ordering;
mod reconcile;
pub mod repository;
mod seed;
mod subscription;
mod sync;
pub mod types;

pub use config::{ReconcilePolicy, ShopSyncSettings};
pub use error::{ShopError, ShopResult};
pub use seed::{CategorySeeder, SeedOutcome};
pub use subscription::CacheSubscription;
pub use sync::ShopSync;
pub use types::{
    Category, ItemPatch, ListItem, ShopList, ShopState, Store, DEFAULT_LIST_CATEGORIES,
    LIST_ORDER_SENTINEL,
};
