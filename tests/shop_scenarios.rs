#![cfg(not(target_arch = "wasm32"))]

mod common;

use common::{document, session, session_with};
use shoplist_sync::shop::{ShopSyncSettings, DEFAULT_LIST_CATEGORIES};
use shoplist_sync::store::{InMemoryDocumentStore, ResourcePath};

#[tokio::test(flavor = "current_thread")]
async fn first_list_is_cached_at_position_zero_and_seeded() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;

    let list_id = owner
        .sync
        .create_list("Viikko-ostokset", None)
        .await
        .unwrap()
        .expect("identity is ready");

    let state = owner.sync.state();
    let list = state.list(&list_id).expect("cached immediately");
    assert_eq!(list.name, "Viikko-ostokset");
    assert_eq!(list.store_id, None);
    assert_eq!(list.order, 0);

    let _categories = owner
        .sync
        .subscribe_categories_for_list(&list_id)
        .await
        .unwrap();
    let state = owner.sync.state();
    let seeded: Vec<_> = state
        .categories(&list_id)
        .iter()
        .map(|category| (category.name.as_str(), category.order))
        .collect();
    let expected: Vec<_> = DEFAULT_LIST_CATEGORIES
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index as i64))
        .collect();
    assert_eq!(seeded, expected);
}

#[tokio::test(flavor = "current_thread")]
async fn added_items_use_the_list_wide_counter() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let _categories = owner
        .sync
        .subscribe_categories_for_list(&list_id)
        .await
        .unwrap();
    let _items = owner.sync.subscribe_items(&list_id).unwrap();
    let bread = owner
        .sync
        .state()
        .categories(&list_id)
        .iter()
        .find(|category| category.name == "Leipä")
        .map(|category| category.id.clone())
        .unwrap();

    owner.sync.add_item(&list_id, "Maito", None).await.unwrap();
    owner
        .sync
        .add_item(&list_id, "Leipä", Some(&bread))
        .await
        .unwrap();

    let state = owner.sync.state();
    let items = state.items(&list_id);
    assert_eq!(items.len(), 2);
    let milk = items.iter().find(|item| item.name == "Maito").unwrap();
    assert_eq!((milk.category_id.as_deref(), milk.order), (None, 0));
    let loaf = items.iter().find(|item| item.name == "Leipä").unwrap();
    assert_eq!(loaf.category_id.as_deref(), Some(bread.as_str()));
    assert_eq!(loaf.order, 1);
    assert!(items.iter().all(|item| item.quantity == 1 && !item.done));
}

#[tokio::test(flavor = "current_thread")]
async fn quantity_never_drops_below_one() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let _items = owner.sync.subscribe_items(&list_id).unwrap();
    owner.sync.add_item(&list_id, "Kahvi", None).await.unwrap();
    let item_id = owner.sync.state().items(&list_id)[0].id.clone();

    owner
        .sync
        .change_quantity(&list_id, &item_id, -5)
        .await
        .unwrap();

    assert_eq!(owner.sync.state().item(&list_id, &item_id).unwrap().quantity, 1);
    let stored = document(&store, &format!("lists/{list_id}/items/{item_id}"))
        .await
        .unwrap();
    assert_eq!(stored["quantity"], 1);
}

#[tokio::test(flavor = "current_thread")]
async fn non_members_cannot_mint_invites() {
    let store = InMemoryDocumentStore::new();
    let owner = session(&store, "owner").await;
    let stranger = session(&store, "stranger").await;
    let list_id = owner.sync.create_list("Salainen", None).await.unwrap().unwrap();

    let code = stranger
        .sync
        .create_invite_code_for_list(&list_id)
        .await
        .unwrap();

    assert_eq!(code, None);
    assert!(store
        .document_keys_under(&ResourcePath::from_segments(["invites"]))
        .is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn category_reorder_follows_requested_sequence() {
    let store = InMemoryDocumentStore::new();
    let settings = ShopSyncSettings {
        default_categories: vec!["c1".into(), "c2".into(), "c3".into()],
        ..ShopSyncSettings::default()
    };
    let owner = session_with(&store, "owner", settings).await;
    let list_id = owner.sync.create_list("Arki", None).await.unwrap().unwrap();
    let _categories = owner
        .sync
        .subscribe_categories_for_list(&list_id)
        .await
        .unwrap();
    let id_of = |name: &str| {
        owner
            .sync
            .state()
            .categories(&list_id)
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.id.clone())
            .unwrap()
    };
    let (c1, c2, c3) = (id_of("c1"), id_of("c2"), id_of("c3"));

    owner
        .sync
        .reorder_categories_for_list(&list_id, &[&c3, &c1, &c2])
        .await
        .unwrap();

    let state = owner.sync.state();
    let orders: Vec<_> = state
        .categories(&list_id)
        .iter()
        .map(|category| (category.name.as_str(), category.order))
        .collect();
    assert_eq!(orders, [("c3", 0), ("c1", 1), ("c2", 2)]);
    let stored = document(&store, &format!("lists/{list_id}/categories/{c3}"))
        .await
        .unwrap();
    assert_eq!(stored["order"], 0);
}
