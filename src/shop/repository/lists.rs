use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join;
use serde_json::{json, Value};

use crate::shop::repository::{
    as_integer, commit_chunked, list_key, list_subcollection, lists_collection, read_string,
    CATEGORIES, ITEMS,
};
use crate::shop::types::{ShopList, LIST_ORDER_SENTINEL};
use crate::store::{
    DocumentKey, DocumentSnapshot, DocumentStore, FieldPath, FieldValue, FilterOperator,
    ListenerRegistration, Query, StoreResult, WriteBatch, WriteData,
};

/// Shared lists under `lists/{listId}` together with their subcollections.
#[derive(Clone)]
pub struct ListRepository {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
}

impl ListRepository {
    pub fn new(store: Arc<dyn DocumentStore>, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    /// Writes a list owned by `uid` with `uid` as its only member.
    pub async fn create(
        &self,
        uid: &str,
        name: &str,
        store_id: Option<&str>,
        order_for_user: i64,
    ) -> StoreResult<DocumentKey> {
        let mut data = WriteData::new();
        data.insert("name".into(), FieldValue::from(name));
        data.insert("storeId".into(), FieldValue::from(store_id.map(str::to_string)));
        data.insert("ownerId".into(), FieldValue::from(uid));
        data.insert("memberIds".into(), FieldValue::from(json!([uid])));
        data.insert(
            "orderBy".into(),
            FieldValue::from(json!({ uid: order_for_user })),
        );
        data.insert("createdAt".into(), FieldValue::server_timestamp());
        self.store.create(&lists_collection(), data).await
    }

    /// Lists `uid` is a member of, sorted by that identity's position.
    pub fn subscribe_for_member<F>(&self, uid: &str, on_next: F) -> StoreResult<ListenerRegistration>
    where
        F: Fn(StoreResult<Vec<ShopList>>) + Send + Sync + 'static,
    {
        let query = Query::new(lists_collection())?.where_field(
            "memberIds",
            FilterOperator::ArrayContains,
            uid,
        )?;
        let uid = uid.to_string();
        Ok(self.store.listen(
            query,
            Arc::new(move |result| {
                on_next(result.map(|snapshot| {
                    let lists = snapshot
                        .documents()
                        .iter()
                        .filter_map(|document| parse_list(document, &uid))
                        .collect();
                    sort_for_member(lists)
                }))
            }),
        ))
    }

    /// Deletes every item, then every category, then the list document.
    ///
    /// Subcollections are removed in chunked batches; a failure part way
    /// leaves the earlier chunks deleted.
    pub async fn delete_deep(&self, list_id: &str) -> StoreResult<()> {
        let list = list_key(list_id)?;
        let items = Query::new(list_subcollection(list_id, ITEMS)?)?;
        let categories = Query::new(list_subcollection(list_id, CATEGORIES)?)?;
        let (items, categories) =
            try_join(self.store.run_query(&items), self.store.run_query(&categories)).await?;

        for documents in [items, categories] {
            commit_chunked(&self.store, &documents, self.chunk_size, |batch, _, document| {
                batch.delete(document.key().clone())?;
                Ok(())
            })
            .await?;
        }

        self.store.delete(&list).await?;
        log::debug!("deleted list {list_id} with its categories and items");
        Ok(())
    }

    /// Writes `orderBy.{uid} = index` for each list in one batch. Other
    /// identities' positions are left alone.
    pub async fn reorder_for_user<S>(&self, uid: &str, next_list_ids: &[S]) -> StoreResult<()>
    where
        S: AsRef<str>,
    {
        let field = FieldPath::new(["orderBy", uid])?;
        let mut batch = WriteBatch::new(Arc::clone(&self.store));
        for (index, list_id) in next_list_ids.iter().enumerate() {
            batch.update(
                list_key(list_id.as_ref())?,
                vec![(field.clone(), FieldValue::from(index as i64))],
            )?;
        }
        batch.commit().await
    }
}

/// Stable sort by per-identity position, keeping the first entry per id.
pub(crate) fn sort_for_member(mut lists: Vec<ShopList>) -> Vec<ShopList> {
    lists.sort_by_key(|list| list.order);
    let mut seen = HashSet::new();
    lists.retain(|list| seen.insert(list.id.clone()));
    lists
}

/// Parses a list as seen by `uid`; its order is `orderBy[uid]` or the sentinel.
pub(crate) fn parse_list(snapshot: &DocumentSnapshot, uid: &str) -> Option<ShopList> {
    let fields = snapshot.data()?;
    let member_ids = fields
        .get("memberIds")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let order = fields
        .get("orderBy")
        .and_then(Value::as_object)
        .and_then(|positions| positions.get(uid))
        .and_then(as_integer)
        .unwrap_or(LIST_ORDER_SENTINEL);

    Some(ShopList {
        id: snapshot.id().to_string(),
        name: read_string(fields, "name")?,
        store_id: read_string(fields, "storeId"),
        order,
        owner_id: read_string(fields, "ownerId")?,
        member_ids,
    })
}
