//! Entity repositories: one per document collection.
//!
//! Repositories translate between the typed entities of [`crate::shop::types`]
//! and raw store documents. Parsing is defensive: documents missing required
//! fields are skipped rather than reported.

mod categories;
mod invites;
mod items;
mod lists;
mod stores;

pub use categories::CategoryRepository;
pub use invites::InviteRepository;
pub use items::ItemRepository;
pub use lists::ListRepository;
pub use stores::StoreRepository;

use std::sync::Arc;

use serde_json::Value;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::{
    DocumentKey, DocumentSnapshot, DocumentStore, Fields, ListenerRegistration, Query,
    QuerySnapshot, ResourcePath, WriteBatch,
};

pub(crate) const LISTS: &str = "lists";
pub(crate) const CATEGORIES: &str = "categories";
pub(crate) const ITEMS: &str = "items";
pub(crate) const INVITES: &str = "invites";
pub(crate) const USERS: &str = "users";
pub(crate) const STORES: &str = "stores";

pub(crate) fn lists_collection() -> ResourcePath {
    ResourcePath::from_segments([LISTS])
}

pub(crate) fn list_key(list_id: &str) -> StoreResult<DocumentKey> {
    DocumentKey::in_collection(&lists_collection(), list_id)
}

/// `lists/{listId}/{name}`
pub(crate) fn list_subcollection(list_id: &str, name: &str) -> StoreResult<ResourcePath> {
    Ok(list_key(list_id)?.path().child([name]))
}

/// `users/{uid}/stores`
pub(crate) fn stores_collection(uid: &str) -> StoreResult<ResourcePath> {
    let users = ResourcePath::from_segments([USERS]);
    Ok(DocumentKey::in_collection(&users, uid)?.path().child([STORES]))
}

pub(crate) fn invites_collection() -> ResourcePath {
    ResourcePath::from_segments([INVITES])
}

/// Opens a live query and maps every pushed result set through `parse`,
/// dropping documents it rejects.
pub(crate) fn listen_parsed<T, P, F>(
    store: &Arc<dyn DocumentStore>,
    query: Query,
    parse: P,
    on_next: F,
) -> ListenerRegistration
where
    T: 'static,
    P: Fn(&DocumentSnapshot) -> Option<T> + Send + Sync + 'static,
    F: Fn(StoreResult<Vec<T>>) + Send + Sync + 'static,
{
    store.listen(
        query,
        Arc::new(move |result: StoreResult<QuerySnapshot>| {
            on_next(result.map(|snapshot| snapshot.documents().iter().filter_map(&parse).collect()))
        }),
    )
}

/// Stages `entries` into consecutive batches of at most `chunk_size`
/// operations and commits them one after another.
///
/// A failure stops at the failing chunk; earlier chunks stay committed.
pub(crate) async fn commit_chunked<T, F>(
    store: &Arc<dyn DocumentStore>,
    entries: &[T],
    chunk_size: usize,
    mut stage: F,
) -> StoreResult<usize>
where
    F: FnMut(&mut WriteBatch, usize, &T) -> StoreResult<()>,
{
    if chunk_size == 0 {
        return Err(invalid_argument("Batch chunk size must be positive"));
    }
    let mut batches = 0;
    for (chunk_index, chunk) in entries.chunks(chunk_size).enumerate() {
        let mut batch = WriteBatch::new(Arc::clone(store));
        for (offset, entry) in chunk.iter().enumerate() {
            stage(&mut batch, chunk_index * chunk_size + offset, entry)?;
        }
        batch.commit().await?;
        batches += 1;
    }
    Ok(batches)
}

pub(crate) fn read_string(fields: &Fields, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Integers stored by other clients may arrive as floats; those are truncated.
pub(crate) fn read_integer(fields: &Fields, name: &str) -> Option<i64> {
    fields.get(name).and_then(as_integer)
}

pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        _ => None,
    }
}

pub(crate) fn read_bool(fields: &Fields, name: &str) -> Option<bool> {
    fields.get(name).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, InMemoryDocumentStore, WriteData};
    use serde_json::json;

    #[test]
    fn paths_nest_under_their_parents() {
        assert_eq!(
            list_subcollection("l1", ITEMS).unwrap().canonical_string(),
            "lists/l1/items"
        );
        assert_eq!(
            stores_collection("u1").unwrap().canonical_string(),
            "users/u1/stores"
        );
        assert!(list_key("a/b").is_err());
        assert!(stores_collection("").is_err());
    }

    #[test]
    fn integers_accept_float_encodings() {
        let fields = json!({ "a": 3, "b": 2.9, "c": "4" });
        let fields = fields.as_object().unwrap();
        assert_eq!(read_integer(fields, "a"), Some(3));
        assert_eq!(read_integer(fields, "b"), Some(2));
        assert_eq!(read_integer(fields, "c"), None);
        assert_eq!(read_integer(fields, "missing"), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn chunked_commits_split_by_size() {
        let memory = InMemoryDocumentStore::new();
        let store: Arc<dyn DocumentStore> = Arc::new(memory.clone());
        let collection = ResourcePath::from_segments(["things"]);
        let ids: Vec<String> = (0..7).map(|i| format!("t{i}")).collect();

        let batches = commit_chunked(&store, &ids, 3, |batch, index, id| {
            let key = DocumentKey::in_collection(&collection, id)?;
            let mut data = WriteData::new();
            data.insert("index".into(), FieldValue::from(index as i64));
            batch.set(key, data)?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(batches, 3);
        assert_eq!(memory.commit_count(), 3);
        let last = store
            .get(&DocumentKey::in_collection(&collection, "t6").unwrap())
            .await
            .unwrap();
        assert_eq!(last.data().unwrap()["index"], json!(6));
    }
}
