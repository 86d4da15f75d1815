use std::sync::Arc;

use crate::shop::repository::{
    commit_chunked, list_subcollection, listen_parsed, read_integer, read_string, CATEGORIES,
};
use crate::shop::types::Category;
use crate::store::{
    DocumentKey, DocumentSnapshot, DocumentStore, FieldPath, FieldValue, ListenerRegistration,
    OrderDirection, Query, StoreResult, WriteData,
};

/// Categories under `lists/{listId}/categories`.
#[derive(Clone)]
pub struct CategoryRepository {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
}

impl CategoryRepository {
    pub fn new(store: Arc<dyn DocumentStore>, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    pub fn subscribe<F>(&self, list_id: &str, on_next: F) -> StoreResult<ListenerRegistration>
    where
        F: Fn(StoreResult<Vec<Category>>) + Send + Sync + 'static,
    {
        let query = Query::new(list_subcollection(list_id, CATEGORIES)?)?
            .order_by("order", OrderDirection::Ascending)?;
        Ok(listen_parsed(&self.store, query, parse_category, on_next))
    }

    pub async fn add(&self, list_id: &str, name: &str, order: i64) -> StoreResult<DocumentKey> {
        let collection = list_subcollection(list_id, CATEGORIES)?;
        self.store.create(&collection, category_data(name, order)).await
    }

    /// Assigns each category its index in `next_ids` as `order`.
    pub async fn reorder<S>(&self, list_id: &str, next_ids: &[S]) -> StoreResult<()>
    where
        S: AsRef<str>,
    {
        let collection = list_subcollection(list_id, CATEGORIES)?;
        let order = FieldPath::from_dot_separated("order")?;
        commit_chunked(&self.store, next_ids, self.chunk_size, |batch, index, id| {
            let key = DocumentKey::in_collection(&collection, id.as_ref())?;
            batch.update(key, vec![(order.clone(), FieldValue::from(index as i64))])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    pub async fn is_empty(&self, list_id: &str) -> StoreResult<bool> {
        let query = Query::new(list_subcollection(list_id, CATEGORIES)?)?;
        Ok(self.store.run_query(&query).await?.is_empty())
    }

    /// Creates one category per name with `order` equal to its position.
    pub async fn add_all<S>(&self, list_id: &str, names: &[S]) -> StoreResult<usize>
    where
        S: AsRef<str>,
    {
        let collection = list_subcollection(list_id, CATEGORIES)?;
        commit_chunked(&self.store, names, self.chunk_size, |batch, index, name| {
            let key = DocumentKey::generate_in(&collection)?;
            batch.set(key, category_data(name.as_ref(), index as i64))?;
            Ok(())
        })
        .await?;
        Ok(names.len())
    }
}

fn category_data(name: &str, order: i64) -> WriteData {
    let mut data = WriteData::new();
    data.insert("name".into(), FieldValue::from(name));
    data.insert("order".into(), FieldValue::from(order));
    data.insert("createdAt".into(), FieldValue::server_timestamp());
    data
}

pub(crate) fn parse_category(snapshot: &DocumentSnapshot) -> Option<Category> {
    let fields = snapshot.data()?;
    Some(Category {
        id: snapshot.id().to_string(),
        name: read_string(fields, "name")?,
        order: read_integer(fields, "order").unwrap_or(0),
    })
}
