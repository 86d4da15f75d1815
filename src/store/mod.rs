//! Document store contract and the in-process implementation.
//!
//! The application treats the hosted database as a black box reached through
//! [`DocumentStore`]: atomic single-document writes, atomic multi-document
//! commits bounded by [`MAX_BATCH_WRITES`], read-verified transactions and
//! live queries that push the complete result set on every change.

mod datastore;
pub mod error;
mod in_memory;
mod listener;
pub mod model;
mod query;
mod snapshot;
mod transaction;
pub mod value;
mod write_batch;

pub use datastore::{DocumentStore, Precondition, WriteOperation};
pub use error::{StoreError, StoreErrorCode, StoreResult};
pub use in_memory::InMemoryDocumentStore;
pub use listener::{ListenerRegistration, QueryCallback};
pub use model::{DocumentKey, FieldPath, ResourcePath};
pub use query::{FieldFilter, FilterOperator, OrderBy, OrderDirection, Query};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use transaction::{run_transaction, Transaction, MAX_ATTEMPTS};
pub use value::{FieldValue, Fields, WriteData};
pub use write_batch::{WriteBatch, MAX_BATCH_WRITES};
