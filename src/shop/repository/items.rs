use std::sync::Arc;

use serde_json::Value;

use crate::shop::repository::{
    commit_chunked, list_subcollection, listen_parsed, read_bool, read_integer, read_string,
    ITEMS,
};
use crate::shop::types::{ItemPatch, ListItem};
use crate::store::{
    DocumentKey, DocumentSnapshot, DocumentStore, FieldPath, FieldValue, ListenerRegistration,
    OrderDirection, Query, StoreResult, WriteData,
};

/// Items under `lists/{listId}/items`.
#[derive(Clone)]
pub struct ItemRepository {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
}

impl ItemRepository {
    pub fn new(store: Arc<dyn DocumentStore>, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    pub fn subscribe<F>(&self, list_id: &str, on_next: F) -> StoreResult<ListenerRegistration>
    where
        F: Fn(StoreResult<Vec<ListItem>>) + Send + Sync + 'static,
    {
        let query = Query::new(list_subcollection(list_id, ITEMS)?)?
            .order_by("order", OrderDirection::Ascending)?;
        Ok(listen_parsed(&self.store, query, parse_item, on_next))
    }

    /// New items start unchecked with a quantity of one.
    pub async fn add(
        &self,
        list_id: &str,
        name: &str,
        category_id: Option<&str>,
        order: i64,
    ) -> StoreResult<DocumentKey> {
        let mut data = WriteData::new();
        data.insert("name".into(), FieldValue::from(name));
        data.insert("done".into(), FieldValue::from(false));
        data.insert(
            "categoryId".into(),
            FieldValue::from(category_id.map(str::to_string)),
        );
        data.insert("order".into(), FieldValue::from(order));
        data.insert("quantity".into(), FieldValue::from(1_i64));
        data.insert("createdAt".into(), FieldValue::server_timestamp());
        self.store
            .create(&list_subcollection(list_id, ITEMS)?, data)
            .await
    }

    /// Sends only the fields present in `patch`. An empty patch writes nothing.
    pub async fn update(&self, list_id: &str, item_id: &str, patch: &ItemPatch) -> StoreResult<()> {
        let fields = patch_fields(patch)?;
        if fields.is_empty() {
            return Ok(());
        }
        self.store.update(&self.item_key(list_id, item_id)?, fields).await
    }

    pub async fn delete(&self, list_id: &str, item_id: &str) -> StoreResult<()> {
        self.store.delete(&self.item_key(list_id, item_id)?).await
    }

    /// Sets `order` to the index in `next_ids` and moves every listed item
    /// into `category_id`.
    pub async fn reorder_in_category<S>(
        &self,
        list_id: &str,
        category_id: Option<&str>,
        next_ids: &[S],
    ) -> StoreResult<()>
    where
        S: AsRef<str>,
    {
        let collection = list_subcollection(list_id, ITEMS)?;
        let order = FieldPath::from_dot_separated("order")?;
        let category = FieldPath::from_dot_separated("categoryId")?;
        let category_value = FieldValue::from(category_id.map(str::to_string));
        commit_chunked(&self.store, next_ids, self.chunk_size, |batch, index, id| {
            let key = DocumentKey::in_collection(&collection, id.as_ref())?;
            batch.update(
                key,
                vec![
                    (order.clone(), FieldValue::from(index as i64)),
                    (category.clone(), category_value.clone()),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    fn item_key(&self, list_id: &str, item_id: &str) -> StoreResult<DocumentKey> {
        DocumentKey::in_collection(&list_subcollection(list_id, ITEMS)?, item_id)
    }
}

fn patch_fields(patch: &ItemPatch) -> StoreResult<Vec<(FieldPath, FieldValue)>> {
    let mut fields = Vec::new();
    let mut push = |name: &str, value: FieldValue| -> StoreResult<()> {
        fields.push((FieldPath::from_dot_separated(name)?, value));
        Ok(())
    };
    if let Some(name) = &patch.name {
        push("name", FieldValue::from(name.as_str()))?;
    }
    if let Some(done) = patch.done {
        push("done", FieldValue::from(done))?;
    }
    if let Some(category_id) = &patch.category_id {
        push("categoryId", FieldValue::from(category_id.clone()))?;
    }
    if let Some(order) = patch.order {
        push("order", FieldValue::from(order))?;
    }
    if let Some(quantity) = patch.quantity {
        push("quantity", FieldValue::from(quantity.max(1)))?;
    }
    Ok(fields)
}

pub(crate) fn parse_item(snapshot: &DocumentSnapshot) -> Option<ListItem> {
    let fields = snapshot.data()?;
    Some(ListItem {
        id: snapshot.id().to_string(),
        name: read_string(fields, "name")?,
        done: read_bool(fields, "done").unwrap_or(false),
        category_id: fields
            .get("categoryId")
            .and_then(Value::as_str)
            .map(str::to_string),
        order: read_integer(fields, "order").unwrap_or(0),
        quantity: read_integer(fields, "quantity").unwrap_or(1),
    })
}
