use std::sync::Arc;

use crate::shop::repository::{listen_parsed, read_string, stores_collection};
use crate::shop::types::Store;
use crate::store::{
    DocumentKey, DocumentSnapshot, DocumentStore, FieldValue, ListenerRegistration,
    OrderDirection, Query, StoreResult, WriteData,
};

/// The identity's own stores under `users/{uid}/stores`.
#[derive(Clone)]
pub struct StoreRepository {
    store: Arc<dyn DocumentStore>,
}

impl StoreRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Newest first.
    pub fn subscribe<F>(&self, uid: &str, on_next: F) -> StoreResult<ListenerRegistration>
    where
        F: Fn(StoreResult<Vec<Store>>) + Send + Sync + 'static,
    {
        let query = Query::new(stores_collection(uid)?)?
            .order_by("createdAt", OrderDirection::Descending)?;
        Ok(listen_parsed(&self.store, query, parse_store, on_next))
    }

    /// Writes `{name, branch, createdAt}`. A blank branch is stored as null.
    pub async fn create(
        &self,
        uid: &str,
        name: &str,
        branch: Option<&str>,
    ) -> StoreResult<DocumentKey> {
        let branch = branch
            .map(str::trim)
            .filter(|branch| !branch.is_empty())
            .map(str::to_string);
        let mut data = WriteData::new();
        data.insert("name".into(), FieldValue::from(name));
        data.insert("branch".into(), FieldValue::from(branch));
        data.insert("createdAt".into(), FieldValue::server_timestamp());
        self.store.create(&stores_collection(uid)?, data).await
    }

    /// Lists referencing the store keep their dangling `storeId`.
    pub async fn delete(&self, uid: &str, store_id: &str) -> StoreResult<()> {
        let key = DocumentKey::in_collection(&stores_collection(uid)?, store_id)?;
        self.store.delete(&key).await
    }
}

pub(crate) fn parse_store(snapshot: &DocumentSnapshot) -> Option<Store> {
    let fields = snapshot.data()?;
    Some(Store {
        id: snapshot.id().to_string(),
        name: read_string(fields, "name")?,
        branch: read_string(fields, "branch"),
    })
}
