#![cfg(not(target_arch = "wasm32"))]

mod common;

use std::sync::{Arc, Mutex};

use common::{document, session, session_with};
use shoplist_sync::identity::LocalIdentityProvider;
use shoplist_sync::shop::{
    ItemPatch, ReconcilePolicy, ShopState, ShopSync, ShopSyncSettings, LIST_ORDER_SENTINEL,
};
use shoplist_sync::store::{InMemoryDocumentStore, ResourcePath};
use shoplist_sync::util::PartialObserver;

#[tokio::test(flavor = "current_thread")]
async fn operations_without_identity_are_noops() {
    let store = InMemoryDocumentStore::new();
    let identity = Arc::new(LocalIdentityProvider::new());
    let sync = ShopSync::new(
        Arc::new(store.clone()),
        identity,
        ShopSyncSettings::default(),
    )
    .unwrap();

    assert_eq!(sync.create_list("Arki", None).await.unwrap(), None);
    assert_eq!(sync.join_list_by_code("ABC123").await.unwrap(), None);
    sync.create_store("Prisma", None).await.unwrap();
    sync.add_item("l1", "Maito", None).await.unwrap();
    sync.change_quantity("l1", "i1", 3).await.unwrap();
    let subscription = sync.subscribe_items("l1").unwrap();
    assert!(!subscription.is_active());
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn start_signs_in_anonymously() {
    let store = InMemoryDocumentStore::new();
    let identity = Arc::new(LocalIdentityProvider::new());
    let sync = ShopSync::new(
        Arc::new(store.clone()),
        identity.clone(),
        ShopSyncSettings::default(),
    )
    .unwrap();

    sync.start().await.unwrap();

    let uid = sync.uid().expect("signed in");
    assert_eq!(uid.len(), 28);
    assert_eq!(store.listener_count(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_sign_in_is_reported() {
    let identity = Arc::new(LocalIdentityProvider::new());
    identity.disable_sign_in("offline");
    let sync = ShopSync::new(
        Arc::new(InMemoryDocumentStore::new()),
        identity,
        ShopSyncSettings::default(),
    )
    .unwrap();

    let err = sync.start().await.unwrap_err();
    assert_eq!(err.code_str(), "shop/identity");
    assert_eq!(sync.uid(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn blank_names_are_ignored() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let commits = store.commit_count();

    assert_eq!(owner.sync.create_list("   ", None).await.unwrap(), None);
    owner.sync.create_store(" \t", None).await.unwrap();
    owner.sync.add_item("l1", "", None).await.unwrap();
    owner.sync.create_category_for_list("l1", "  ").await.unwrap();
    assert_eq!(owner.sync.join_list_by_code("   ").await.unwrap(), None);

    assert_eq!(store.commit_count(), commits);
}

#[tokio::test(flavor = "current_thread")]
async fn store_labels_resolve_against_the_cache() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    owner
        .sync
        .create_store("  Prisma ", Some(" Kaleva "))
        .await
        .unwrap();
    owner.sync.create_store("Lidl", None).await.unwrap();

    let state = owner.sync.state();
    let prisma = state.stores.iter().find(|s| s.name == "Prisma").unwrap();
    let lidl = state.stores.iter().find(|s| s.name == "Lidl").unwrap();
    assert_eq!(
        owner.sync.get_store_label(Some(&prisma.id)).as_deref(),
        Some("Prisma (Kaleva)")
    );
    assert_eq!(owner.sync.get_store_label(Some(&lidl.id)).as_deref(), Some("Lidl"));
    assert_eq!(owner.sync.get_store_label(None), None);
    assert_eq!(owner.sync.get_store_label(Some("unknown")), None);
}

#[tokio::test(flavor = "current_thread")]
async fn deleting_a_store_leaves_list_references_dangling() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    owner.sync.create_store("Alepa", None).await.unwrap();
    let store_id = owner.sync.state().stores[0].id.clone();
    let list_id = owner
        .sync
        .create_list("Arki", Some(&store_id))
        .await
        .unwrap()
        .unwrap();

    owner.sync.delete_store(&store_id).await.unwrap();

    let state = owner.sync.state();
    assert!(state.stores.is_empty());
    let list = state.list(&list_id).unwrap();
    assert_eq!(list.store_id.as_deref(), Some(store_id.as_str()));
    assert_eq!(owner.sync.get_store_label(list.store_id.as_deref()), None);
}

#[tokio::test(flavor = "current_thread")]
async fn joined_lists_appear_last_and_ordering_is_per_member() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let guest = session(&store, "guest").await;
    let first = owner.sync.create_list("Yhteinen", None).await.unwrap().unwrap();
    let second = owner.sync.create_list("Toinen", None).await.unwrap().unwrap();
    let own = guest.sync.create_list("Oma", None).await.unwrap().unwrap();
    for list_id in [&first, &second] {
        let code = owner
            .sync
            .create_invite_code_for_list(list_id)
            .await
            .unwrap()
            .unwrap();
        guest.sync.join_list_by_code(&code).await.unwrap();
    }

    let state = guest.sync.state();
    let ids: Vec<_> = state.lists.iter().map(|list| list.id.clone()).collect();
    assert_eq!(ids[0], own);
    assert_eq!(state.list(&first).unwrap().order, LIST_ORDER_SENTINEL);
    assert!(!guest.sync.is_owner_of_list(state.list(&first).unwrap()));
    assert!(guest.sync.is_owner_of_list(state.list(&own).unwrap()));

    guest
        .sync
        .reorder_lists(&[&second, &first, &own])
        .await
        .unwrap();

    let guest_order: Vec<_> = guest.sync.state().lists.into_iter().map(|l| l.id).collect();
    assert_eq!(guest_order, [second.clone(), first.clone(), own]);
    let owner_order: Vec<_> = owner.sync.state().lists.into_iter().map(|l| l.id).collect();
    assert_eq!(owner_order, [first, second]);
}

#[tokio::test(flavor = "current_thread")]
async fn unsubscribing_evicts_the_cached_list_data() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let categories = owner
        .sync
        .subscribe_categories_for_list(&list_id)
        .await
        .unwrap();
    let items = owner.sync.subscribe_items(&list_id).unwrap();
    owner.sync.add_item(&list_id, "Maito", None).await.unwrap();
    let listeners = store.listener_count();

    categories.unsubscribe();
    drop(items);

    let state = owner.sync.state();
    assert!(!state.categories_by_list_id.contains_key(&list_id));
    assert!(!state.items_by_list_id.contains_key(&list_id));
    assert_eq!(store.listener_count(), listeners - 2);
}

#[tokio::test(flavor = "current_thread")]
async fn updates_only_touch_patched_fields() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let _items = owner.sync.subscribe_items(&list_id).unwrap();
    owner.sync.add_item(&list_id, "Juusto", Some("c1")).await.unwrap();
    let item_id = owner.sync.state().items(&list_id)[0].id.clone();

    owner
        .sync
        .update_item(&list_id, &item_id, &ItemPatch::new().done(true))
        .await
        .unwrap();
    owner
        .sync
        .update_item(&list_id, &item_id, &ItemPatch::new().category_id(None))
        .await
        .unwrap();

    let state = owner.sync.state();
    let item = state.item(&list_id, &item_id).unwrap();
    assert!(item.done);
    assert_eq!(item.category_id, None);
    assert_eq!(item.name, "Juusto");

    owner.sync.delete_item(&list_id, &item_id).await.unwrap();
    assert!(owner.sync.state().items(&list_id).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn identity_change_resets_the_cache() {
    let store = InMemoryDocumentStore::new();
    let session = session(&store, "first").await;
    session.sync.create_list("Ensimmäinen", None).await.unwrap();
    assert_eq!(session.sync.state().lists.len(), 1);

    session.identity.sign_in_as("second");

    let state = session.sync.state();
    assert_eq!(state.uid.as_deref(), Some("second"));
    assert!(state.lists.is_empty());
    assert_eq!(store.listener_count(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn shutdown_detaches_everything() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let items = owner.sync.subscribe_items(&list_id).unwrap();
    drop(items);

    owner.sync.shutdown();

    assert_eq!(store.listener_count(), 0);
    assert_eq!(owner.sync.state(), ShopState::default());
    assert_eq!(owner.identity.observer_count(), 0);
    assert_eq!(owner.sync.create_list("Uusi", None).await.unwrap(), None);
}

#[tokio::test(flavor = "current_thread")]
async fn watchers_see_changes_and_subscription_errors() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let names: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let names_sink = Arc::clone(&names);
    let errors_sink = Arc::clone(&errors);
    let unsubscribe = owner.sync.watch(
        PartialObserver::new()
            .with_next(move |state: &ShopState| {
                let lists = state.lists.iter().map(|list| list.name.clone()).collect();
                names_sink.lock().unwrap().push(lists);
            })
            .with_error(move |err| errors_sink.lock().unwrap().push(err.to_string())),
    );

    owner.sync.create_list("Arki", None).await.unwrap();
    assert!(names
        .lock()
        .unwrap()
        .iter()
        .any(|lists| lists == &["Arki".to_string()]));

    store.set_unavailable(true);
    assert_eq!(errors.lock().unwrap().len(), 2);
    let err = owner.sync.create_list("Toinen", None).await.unwrap_err();
    assert_eq!(err.code_str(), "store/unavailable");

    unsubscribe();
}

#[tokio::test(flavor = "current_thread")]
async fn failed_seeding_is_retried_by_the_next_subscription() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    store.set_write_budget(Some(1));

    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    assert!(
        document(&store, &format!("lists/{list_id}")).await.is_some(),
        "the list itself was written"
    );
    assert!(owner.sync.state().categories(&list_id).is_empty());

    store.set_write_budget(None);
    let _categories = owner
        .sync
        .subscribe_categories_for_list(&list_id)
        .await
        .unwrap();
    assert_eq!(owner.sync.state().categories(&list_id).len(), 11);
}

#[tokio::test(flavor = "current_thread")]
async fn preserve_pending_policy_converges_to_written_values() {
    let store = InMemoryDocumentStore::new();
    let settings = ShopSyncSettings {
        reconcile: ReconcilePolicy::PreservePending,
        ..ShopSyncSettings::default()
    };
    let owner = session_with(&store, "owner", settings).await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let _items = owner.sync.subscribe_items(&list_id).unwrap();
    owner.sync.add_item(&list_id, "a", None).await.unwrap();
    owner.sync.add_item(&list_id, "b", None).await.unwrap();
    let ids: Vec<String> = owner
        .sync
        .state()
        .items(&list_id)
        .iter()
        .map(|item| item.id.clone())
        .collect();

    owner.sync.change_quantity(&list_id, &ids[0], 4).await.unwrap();
    owner
        .sync
        .reorder_items_in_category(&list_id, None, &[&ids[1], &ids[0]])
        .await
        .unwrap();

    let state = owner.sync.state();
    let items = state.items(&list_id);
    assert_eq!(items[0].id, ids[1]);
    assert_eq!(items[1].quantity, 5);
    let stored = document(&store, &format!("lists/{list_id}/items/{}", ids[0]))
        .await
        .unwrap();
    assert_eq!(stored["quantity"], 5);
    assert_eq!(stored["order"], 1);
}

#[tokio::test(flavor = "current_thread")]
async fn interrupted_list_delete_leaves_remaining_documents() {
    let store = InMemoryDocumentStore::new();
    let settings = ShopSyncSettings {
        batch_chunk_size: 2,
        ..ShopSyncSettings::default()
    };
    let owner = session_with(&store, "owner", settings).await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    for name in ["a", "b", "c", "d", "e"] {
        owner.sync.add_item(&list_id, name, None).await.unwrap();
    }
    let items = ResourcePath::from_segments(["lists", list_id.as_str(), "items"]);
    let categories = ResourcePath::from_segments(["lists", list_id.as_str(), "categories"]);
    assert_eq!(store.document_keys_under(&items).len(), 5);

    // Two item batches go through, the third one fails.
    store.set_write_budget(Some(2));
    let err = owner.sync.delete_list(&list_id).await.unwrap_err();
    assert_eq!(err.code_str(), "store/unavailable");

    assert_eq!(store.document_keys_under(&items).len(), 1);
    assert_eq!(store.document_keys_under(&categories).len(), 11);
    assert!(document(&store, &format!("lists/{list_id}")).await.is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn created_list_appears_once_after_its_echo() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let first = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let second = owner.sync.create_list("Juhlat", None).await.unwrap().unwrap();

    let state = owner.sync.state();
    let ids: Vec<&str> = state.lists.iter().map(|list| list.id.as_str()).collect();
    assert_eq!(ids, [first.as_str(), second.as_str()]);
    let created = state.list(&second).unwrap();
    assert_eq!((created.name.as_str(), created.order), ("Juhlat", 1));
    assert_eq!(created.member_ids, ["owner"]);
}
