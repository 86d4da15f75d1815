use async_trait::async_trait;

use crate::store::error::StoreResult;
use crate::store::listener::{ListenerRegistration, QueryCallback};
use crate::store::model::{DocumentKey, FieldPath, ResourcePath};
use crate::store::query::Query;
use crate::store::snapshot::DocumentSnapshot;
use crate::store::value::{FieldValue, WriteData};

/// Condition a document must satisfy for a commit to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    Exists(bool),
    /// The document must exist at exactly this version.
    Version(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    Set {
        key: DocumentKey,
        data: WriteData,
        merge: bool,
    },
    Update {
        key: DocumentKey,
        fields: Vec<(FieldPath, FieldValue)>,
    },
    Delete {
        key: DocumentKey,
    },
    /// Asserts a precondition without writing.
    Verify {
        key: DocumentKey,
        precondition: Precondition,
    },
}

impl WriteOperation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Set { key, .. }
            | WriteOperation::Update { key, .. }
            | WriteOperation::Delete { key }
            | WriteOperation::Verify { key, .. } => key,
        }
    }
}

/// The hosted document database as seen by the application.
///
/// Guarantees relied upon: single-document writes are atomic, `commit` applies
/// all of its operations or none, and listeners receive the complete result
/// set of their query whenever it changes.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait DocumentStore: Send + Sync + 'static {
    /// Adds a document with a generated id under `collection`.
    async fn create(&self, collection: &ResourcePath, data: WriteData) -> StoreResult<DocumentKey>;

    async fn get(&self, key: &DocumentKey) -> StoreResult<DocumentSnapshot>;

    async fn set(&self, key: &DocumentKey, data: WriteData, merge: bool) -> StoreResult<()>;

    /// Patches the listed fields of an existing document. Fails with `not-found` otherwise.
    async fn update(
        &self,
        key: &DocumentKey,
        fields: Vec<(FieldPath, FieldValue)>,
    ) -> StoreResult<()>;

    async fn delete(&self, key: &DocumentKey) -> StoreResult<()>;

    async fn run_query(&self, query: &Query) -> StoreResult<Vec<DocumentSnapshot>>;

    async fn commit(&self, writes: Vec<WriteOperation>) -> StoreResult<()>;

    /// Opens a live query. The callback fires with the current result set and
    /// again after every change to it.
    fn listen(&self, query: Query, callback: QueryCallback) -> ListenerRegistration;
}
