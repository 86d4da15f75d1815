#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use shoplist_sync::identity::LocalIdentityProvider;
use shoplist_sync::shop::{ShopSync, ShopSyncSettings};
use shoplist_sync::store::{DocumentKey, DocumentStore, Fields, InMemoryDocumentStore};

pub struct Session {
    pub sync: ShopSync,
    pub identity: Arc<LocalIdentityProvider>,
}

pub async fn session(store: &InMemoryDocumentStore, uid: &str) -> Session {
    session_with(store, uid, ShopSyncSettings::default()).await
}

pub async fn session_with(
    store: &InMemoryDocumentStore,
    uid: &str,
    settings: ShopSyncSettings,
) -> Session {
    let identity = Arc::new(LocalIdentityProvider::with_identity(uid));
    let sync = ShopSync::new(Arc::new(store.clone()), identity.clone(), settings)
        .expect("valid settings");
    sync.start().await.expect("start");
    Session { sync, identity }
}

pub async fn document(store: &InMemoryDocumentStore, path: &str) -> Option<Fields> {
    let key = DocumentKey::from_string(path).expect("document path");
    store.get(&key).await.expect("get").into_data()
}

pub fn member_ids(fields: &Fields) -> Vec<String> {
    fields["memberIds"]
        .as_array()
        .expect("memberIds array")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}
