use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::identity::{Identity, IdentityProvider};
use crate::shop::config::{ReconcilePolicy, ShopSyncSettings};
use crate::shop::error::ShopResult;
use crate::shop::ordering::{next_order, reorder_categories, reorder_items_in_category};
use crate::shop::reconcile::{EntityKind, PendingFields, PendingWrites};
use crate::shop::repository::{
    CategoryRepository, InviteRepository, ItemRepository, ListRepository, StoreRepository,
};
use crate::shop::seed::CategorySeeder;
use crate::shop::subscription::CacheSubscription;
use crate::shop::types::{Category, ItemPatch, ListItem, ShopList, ShopState, Store};
use crate::store::{DocumentStore, ListenerRegistration, StoreError, StoreResult};
use crate::util::{ObserverRegistry, PartialObserver, Unsubscribe};

/// The synchronization core: one shared cache of the current identity's
/// stores, lists, categories and items, kept current by live queries and
/// mutated optimistically by the operations below.
///
/// Handles are cheap to clone and share the same cache. Operations issued
/// before an identity is available are silent no-ops.
#[derive(Clone)]
pub struct ShopSync {
    inner: Arc<ShopSyncInner>,
}

struct ShopSyncInner {
    identity: Arc<dyn IdentityProvider>,
    settings: ShopSyncSettings,
    stores: StoreRepository,
    lists: ListRepository,
    categories: CategoryRepository,
    items: ItemRepository,
    invites: InviteRepository,
    seeder: CategorySeeder,
    pending: PendingWrites,
    cache: Mutex<Cache>,
    next_feed: AtomicU64,
    /// Bumped on every identity change; callbacks from older epochs are ignored.
    epoch: AtomicU64,
    root_subscriptions: Mutex<Vec<ListenerRegistration>>,
    identity_subscription: Mutex<Option<Unsubscribe>>,
    watchers: ObserverRegistry<ShopState>,
}

impl Drop for ShopSyncInner {
    fn drop(&mut self) {
        let unsubscribe = self
            .identity_subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum CacheKind {
    Categories,
    Items,
}

/// The presentation view plus the feed token of every open per-list
/// subscription. A push is only applied while its token is still registered,
/// so a push that races an unsubscribe cannot bring an evicted entry back.
#[derive(Default)]
struct Cache {
    view: ShopState,
    feeds: HashMap<(CacheKind, String), u64>,
}

impl Cache {
    fn is_fed_by(&self, kind: CacheKind, list_id: &str, feed: u64) -> bool {
        self.feeds.get(&(kind, list_id.to_string())) == Some(&feed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ShopSync {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        settings: ShopSyncSettings,
    ) -> ShopResult<Self> {
        settings.validate()?;
        let chunk_size = settings.batch_chunk_size;
        let inner = ShopSyncInner {
            identity,
            stores: StoreRepository::new(Arc::clone(&store)),
            lists: ListRepository::new(Arc::clone(&store), chunk_size),
            categories: CategoryRepository::new(Arc::clone(&store), chunk_size),
            items: ItemRepository::new(Arc::clone(&store), chunk_size),
            invites: InviteRepository::new(
                store,
                settings.invite_code_length,
                settings.invite_max_attempts,
            ),
            settings,
            seeder: CategorySeeder::new(),
            pending: PendingWrites::default(),
            cache: Mutex::new(Cache::default()),
            next_feed: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            root_subscriptions: Mutex::new(Vec::new()),
            identity_subscription: Mutex::new(None),
            watchers: ObserverRegistry::default(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn settings(&self) -> &ShopSyncSettings {
        &self.inner.settings
    }

    /// Follows the identity provider and signs in anonymously when no
    /// identity exists yet. Root subscriptions open as soon as an identity is
    /// known.
    pub async fn start(&self) -> ShopResult<()> {
        let weak = Arc::downgrade(&self.inner);
        let observer = PartialObserver::new().with_next(move |identity: &Option<Identity>| {
            if let Some(sync) = upgrade(&weak) {
                sync.apply_identity(identity.as_ref().map(|identity| identity.uid.clone()));
            }
        });
        let unsubscribe = self.inner.identity.on_identity_changed(observer);
        let previous = lock(&self.inner.identity_subscription).replace(unsubscribe);
        if let Some(previous) = previous {
            previous();
        }

        if self.inner.identity.current_identity().is_none() {
            if let Err(err) = self.inner.identity.sign_in_anonymously().await {
                log::warn!("anonymous sign-in failed: {err}");
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Detaches every root subscription and the identity observer and clears
    /// the cache. Per-list handles still held by callers become inert.
    pub fn shutdown(&self) {
        let unsubscribe = lock(&self.inner.identity_subscription).take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.detach_roots();
        self.inner.pending.clear();
        self.inner.seeder.reset();
        self.update_cache(|cache| {
            *cache = Cache::default();
            true
        });
        log::debug!("shop sync shut down");
    }

    /// A copy of the current cache.
    pub fn state(&self) -> ShopState {
        lock(&self.inner.cache).view.clone()
    }

    pub fn uid(&self) -> Option<String> {
        lock(&self.inner.cache).view.uid.clone()
    }

    /// Registers an observer invoked with the new cache contents after every
    /// change, and with subscription errors.
    pub fn watch(&self, observer: PartialObserver<ShopState>) -> Unsubscribe {
        self.inner.watchers.add_observer(observer)
    }

    // Stores

    pub async fn create_store(&self, name: &str, branch: Option<&str>) -> ShopResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        self.inner.stores.create(&uid, name, branch).await?;
        Ok(())
    }

    pub async fn delete_store(&self, store_id: &str) -> ShopResult<()> {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        self.inner.stores.delete(&uid, store_id).await?;
        Ok(())
    }

    /// `"name (branch)"` for a known store, `None` for a missing or unknown id.
    pub fn get_store_label(&self, store_id: Option<&str>) -> Option<String> {
        let store_id = store_id?;
        lock(&self.inner.cache)
            .view
            .stores
            .iter()
            .find(|store| store.id == store_id)
            .map(Store::label)
    }

    // Lists

    /// Creates a list owned by the current identity, placed after its other
    /// lists, and seeds the default categories into it.
    ///
    /// The new list is visible in [`ShopSync::state`] when this returns.
    pub async fn create_list(&self, name: &str, store_id: Option<&str>) -> ShopResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let order = next_order(lock(&self.inner.cache).view.lists.iter().map(|list| list.order));
        let key = self.inner.lists.create(&uid, name, store_id, order).await?;
        let list_id = key.id().to_string();

        let created = ShopList {
            id: list_id.clone(),
            name: name.to_string(),
            store_id: store_id.map(str::to_string),
            order,
            owner_id: uid.clone(),
            member_ids: vec![uid],
        };
        self.update_state(|state| {
            if state.uid.as_deref() != Some(created.owner_id.as_str()) {
                return false;
            }
            // Replaces the pushed copy when the echo arrived first.
            state.lists.retain(|list| list.id != created.id);
            state.lists.push(created);
            state.lists.sort_by_key(|list| list.order);
            true
        });

        self.seed_defaults(&list_id).await;
        Ok(Some(list_id))
    }

    /// Deletes the list with all of its categories and items.
    pub async fn delete_list(&self, list_id: &str) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        self.inner.lists.delete_deep(list_id).await?;
        Ok(())
    }

    /// Stores the current identity's list positions; other members keep theirs.
    pub async fn reorder_lists<S>(&self, next_list_ids: &[S]) -> ShopResult<()>
    where
        S: AsRef<str>,
    {
        let Some(uid) = self.uid() else {
            return Ok(());
        };
        self.inner.lists.reorder_for_user(&uid, next_list_ids).await?;
        Ok(())
    }

    pub fn is_owner_of_list(&self, list: &ShopList) -> bool {
        self.uid().is_some_and(|uid| list.owner_id == uid)
    }

    // Invites

    pub async fn create_invite_code_for_list(&self, list_id: &str) -> ShopResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        self.inner.invites.create_for_list(&uid, list_id).await
    }

    /// Redeems an invite. Fails with [`ShopError::InviteNotFound`] or
    /// [`ShopError::InvalidInvite`] without changing anything.
    ///
    /// [`ShopError::InviteNotFound`]: crate::shop::ShopError::InviteNotFound
    /// [`ShopError::InvalidInvite`]: crate::shop::ShopError::InvalidInvite
    pub async fn join_list_by_code(&self, code: &str) -> ShopResult<Option<String>> {
        let Some(uid) = self.uid() else {
            return Ok(None);
        };
        self.inner.invites.join_by_code(&uid, code).await
    }

    // Categories

    /// Feeds the list's categories into the cache until the handle is
    /// released, then seeds the default categories if the list has none.
    /// A seeding failure is logged; the subscription stays open.
    pub async fn subscribe_categories_for_list(&self, list_id: &str) -> ShopResult<CacheSubscription> {
        if self.uid().is_none() {
            return Ok(CacheSubscription::inactive());
        }
        let epoch = self.epoch();
        let feed = self.open_feed(CacheKind::Categories, list_id);
        let weak = Arc::downgrade(&self.inner);
        let id = list_id.to_string();
        let registration = self
            .inner
            .categories
            .subscribe(list_id, move |result| {
                if let Some(sync) = upgrade(&weak) {
                    sync.on_categories(epoch, feed, &id, result);
                }
            })
            .inspect_err(|_| self.close_feed(CacheKind::Categories, list_id, feed))?;
        let subscription = CacheSubscription::new(
            registration,
            self.evictor(epoch, feed, list_id, CacheKind::Categories),
        );
        log::debug!("subscribed to categories of list {list_id}");

        self.seed_defaults(list_id).await;
        Ok(subscription)
    }

    pub async fn create_category_for_list(&self, list_id: &str, name: &str) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let order = next_order(
            lock(&self.inner.cache)
                .view
                .categories(list_id)
                .iter()
                .map(|category| category.order),
        );
        self.inner.categories.add(list_id, name, order).await?;
        Ok(())
    }

    /// Rewrites the cached order immediately, then stores each category's
    /// index in `next_ids` as its `order`.
    pub async fn reorder_categories_for_list<S>(&self, list_id: &str, next_ids: &[S]) -> ShopResult<()>
    where
        S: AsRef<str>,
    {
        if self.uid().is_none() {
            return Ok(());
        }
        let _pending = self.inner.pending.begin(
            EntityKind::Category,
            list_id,
            next_ids,
            PendingFields::ORDER,
        );
        self.update_state(|state| match state.categories_by_list_id.get_mut(list_id) {
            Some(current) => {
                *current = reorder_categories(current, next_ids);
                true
            }
            None => false,
        });
        self.inner.categories.reorder(list_id, next_ids).await?;
        Ok(())
    }

    // Items

    /// Feeds the list's items into the cache until the handle is released.
    pub fn subscribe_items(&self, list_id: &str) -> ShopResult<CacheSubscription> {
        if self.uid().is_none() {
            return Ok(CacheSubscription::inactive());
        }
        let epoch = self.epoch();
        let feed = self.open_feed(CacheKind::Items, list_id);
        let weak = Arc::downgrade(&self.inner);
        let id = list_id.to_string();
        let registration = self
            .inner
            .items
            .subscribe(list_id, move |result| {
                if let Some(sync) = upgrade(&weak) {
                    sync.on_items(epoch, feed, &id, result);
                }
            })
            .inspect_err(|_| self.close_feed(CacheKind::Items, list_id, feed))?;
        log::debug!("subscribed to items of list {list_id}");
        Ok(CacheSubscription::new(
            registration,
            self.evictor(epoch, feed, list_id, CacheKind::Items),
        ))
    }

    /// Adds an item after every cached item of the list, whatever its category.
    pub async fn add_item(&self, list_id: &str, name: &str, category_id: Option<&str>) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let order = next_order(
            lock(&self.inner.cache)
                .view
                .items(list_id)
                .iter()
                .map(|item| item.order),
        );
        self.inner.items.add(list_id, name, category_id, order).await?;
        Ok(())
    }

    pub async fn update_item(&self, list_id: &str, item_id: &str, patch: &ItemPatch) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        self.inner.items.update(list_id, item_id, patch).await?;
        Ok(())
    }

    pub async fn delete_item(&self, list_id: &str, item_id: &str) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        self.inner.items.delete(list_id, item_id).await?;
        Ok(())
    }

    /// Applies `delta` to the cached quantity (1 when unknown), never going
    /// below 1, and writes the resulting absolute value.
    ///
    /// Concurrent changes from other devices are not merged: the last
    /// written value wins.
    pub async fn change_quantity(&self, list_id: &str, item_id: &str, delta: i64) -> ShopResult<()> {
        if self.uid().is_none() {
            return Ok(());
        }
        let current = lock(&self.inner.cache)
            .view
            .item(list_id, item_id)
            .map_or(1, |item| item.quantity);
        let next = current.saturating_add(delta).max(1);

        let _pending = self.inner.pending.begin(
            EntityKind::Item,
            list_id,
            &[item_id],
            PendingFields::QUANTITY,
        );
        self.update_state(|state| {
            let Some(item) = state
                .items_by_list_id
                .get_mut(list_id)
                .and_then(|items| items.iter_mut().find(|item| item.id == item_id))
            else {
                return false;
            };
            item.quantity = next;
            true
        });
        self.inner
            .items
            .update(list_id, item_id, &ItemPatch::new().quantity(next))
            .await?;
        Ok(())
    }

    /// Reorders the items of one category (`None` for uncategorized) to match
    /// `next_ids`, moving any listed item into that category.
    pub async fn reorder_items_in_category<S>(
        &self,
        list_id: &str,
        category_id: Option<&str>,
        next_ids: &[S],
    ) -> ShopResult<()>
    where
        S: AsRef<str>,
    {
        if self.uid().is_none() {
            return Ok(());
        }
        let _pending = self.inner.pending.begin(
            EntityKind::Item,
            list_id,
            next_ids,
            PendingFields::ORDER_AND_CATEGORY,
        );
        self.update_state(|state| match state.items_by_list_id.get_mut(list_id) {
            Some(items) => {
                *items = reorder_items_in_category(items, category_id, next_ids);
                true
            }
            None => false,
        });
        self.inner
            .items
            .reorder_in_category(list_id, category_id, next_ids)
            .await?;
        Ok(())
    }

    // Internals

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    fn apply_identity(&self, uid: Option<String>) {
        if lock(&self.inner.cache).view.uid == uid {
            return;
        }
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.detach_roots();
        self.inner.pending.clear();
        self.inner.seeder.reset();
        self.update_cache(|cache| {
            *cache = Cache {
                view: ShopState::for_identity(uid.clone()),
                ..Cache::default()
            };
            true
        });

        if let Some(uid) = uid {
            log::debug!("identity {uid} ready; opening root subscriptions");
            let roots = self.open_root_subscriptions(&uid, epoch);
            lock(&self.inner.root_subscriptions).extend(roots);
        }
    }

    fn open_root_subscriptions(&self, uid: &str, epoch: u64) -> Vec<ListenerRegistration> {
        let weak = Arc::downgrade(&self.inner);
        let stores = self.inner.stores.subscribe(uid, move |result| {
            if let Some(sync) = upgrade(&weak) {
                sync.on_stores(epoch, result);
            }
        });
        let weak = Arc::downgrade(&self.inner);
        let lists = self.inner.lists.subscribe_for_member(uid, move |result| {
            if let Some(sync) = upgrade(&weak) {
                sync.on_lists(epoch, result);
            }
        });

        [("stores", stores), ("lists", lists)]
            .into_iter()
            .filter_map(|(what, registration)| match registration {
                Ok(registration) => Some(registration),
                Err(err) => {
                    log::warn!("could not subscribe to {what} of {uid}: {err}");
                    None
                }
            })
            .collect()
    }

    fn detach_roots(&self) {
        let roots = std::mem::take(&mut *lock(&self.inner.root_subscriptions));
        for registration in roots {
            registration.detach();
        }
    }

    fn on_stores(&self, epoch: u64, result: StoreResult<Vec<Store>>) {
        if !self.is_current(epoch) {
            return;
        }
        match result {
            Ok(stores) => self.update_state(|state| {
                state.stores = stores;
                true
            }),
            Err(err) => self.report_subscription_error("stores", &err),
        }
    }

    fn on_lists(&self, epoch: u64, result: StoreResult<Vec<ShopList>>) {
        if !self.is_current(epoch) {
            return;
        }
        match result {
            Ok(lists) => self.update_state(|state| {
                state.lists = lists;
                true
            }),
            Err(err) => self.report_subscription_error("lists", &err),
        }
    }

    fn on_categories(
        &self,
        epoch: u64,
        feed: u64,
        list_id: &str,
        result: StoreResult<Vec<Category>>,
    ) {
        if !self.is_current(epoch) {
            return;
        }
        let mut pushed = match result {
            Ok(pushed) => pushed,
            Err(err) => {
                return self.report_feed_error(CacheKind::Categories, list_id, feed, &err);
            }
        };
        let preserve = self.inner.settings.reconcile == ReconcilePolicy::PreservePending;
        self.update_cache(|cache| {
            if !cache.is_fed_by(CacheKind::Categories, list_id, feed) {
                return false;
            }
            let state = &mut cache.view;
            if preserve {
                if let Some(cached) = state.categories_by_list_id.get(list_id) {
                    self.inner
                        .pending
                        .overlay_categories(list_id, cached, &mut pushed);
                }
            }
            state
                .categories_by_list_id
                .insert(list_id.to_string(), pushed);
            true
        });
    }

    fn on_items(&self, epoch: u64, feed: u64, list_id: &str, result: StoreResult<Vec<ListItem>>) {
        if !self.is_current(epoch) {
            return;
        }
        let mut pushed = match result {
            Ok(pushed) => pushed,
            Err(err) => return self.report_feed_error(CacheKind::Items, list_id, feed, &err),
        };
        let preserve = self.inner.settings.reconcile == ReconcilePolicy::PreservePending;
        self.update_cache(|cache| {
            if !cache.is_fed_by(CacheKind::Items, list_id, feed) {
                return false;
            }
            let state = &mut cache.view;
            if preserve {
                if let Some(cached) = state.items_by_list_id.get(list_id) {
                    self.inner.pending.overlay_items(list_id, cached, &mut pushed);
                }
            }
            state.items_by_list_id.insert(list_id.to_string(), pushed);
            true
        });
    }

    fn report_feed_error(&self, kind: CacheKind, list_id: &str, feed: u64, err: &StoreError) {
        if !lock(&self.inner.cache).is_fed_by(kind, list_id, feed) {
            return;
        }
        let what = match kind {
            CacheKind::Categories => "categories",
            CacheKind::Items => "items",
        };
        self.report_subscription_error(what, err);
    }

    fn report_subscription_error(&self, what: &str, err: &StoreError) {
        log::warn!("{what} subscription failed: {err}");
        self.inner.watchers.notify_error(err);
    }

    /// Registers a new feed for the list's cache entry, replacing any older
    /// feed of the same kind.
    fn open_feed(&self, kind: CacheKind, list_id: &str) -> u64 {
        let feed = self.inner.next_feed.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.cache)
            .feeds
            .insert((kind, list_id.to_string()), feed);
        feed
    }

    fn close_feed(&self, kind: CacheKind, list_id: &str, feed: u64) {
        let mut cache = lock(&self.inner.cache);
        if cache.is_fed_by(kind, list_id, feed) {
            cache.feeds.remove(&(kind, list_id.to_string()));
        }
    }

    fn evictor(
        &self,
        epoch: u64,
        feed: u64,
        list_id: &str,
        kind: CacheKind,
    ) -> impl FnOnce() + Send + 'static {
        let weak = Arc::downgrade(&self.inner);
        let list_id = list_id.to_string();
        move || {
            let Some(sync) = upgrade(&weak) else {
                return;
            };
            if !sync.is_current(epoch) {
                return;
            }
            log::debug!("evicting cached {kind:?} of list {list_id}");
            sync.update_cache(|cache| {
                if cache.is_fed_by(kind, &list_id, feed) {
                    cache.feeds.remove(&(kind, list_id.clone()));
                }
                let view = &mut cache.view;
                match kind {
                    CacheKind::Categories => view.categories_by_list_id.remove(&list_id).is_some(),
                    CacheKind::Items => view.items_by_list_id.remove(&list_id).is_some(),
                }
            });
        }
    }

    async fn seed_defaults(&self, list_id: &str) {
        let names = &self.inner.settings.default_categories;
        if let Err(err) = self
            .inner
            .seeder
            .ensure_defaults(&self.inner.categories, list_id, names)
            .await
        {
            log::warn!("seeding default categories into list {list_id} failed: {err}");
        }
    }

    fn update_state<F>(&self, mutate: F)
    where
        F: FnOnce(&mut ShopState) -> bool,
    {
        self.update_cache(|cache| mutate(&mut cache.view));
    }

    /// Applies `mutate` under the cache lock and, when it reports a change,
    /// notifies watchers after the lock is released.
    fn update_cache<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Cache) -> bool,
    {
        let snapshot = {
            let mut cache = lock(&self.inner.cache);
            if !mutate(&mut cache) || self.inner.watchers.is_empty() {
                return;
            }
            cache.view.clone()
        };
        self.inner.watchers.notify(&snapshot);
    }
}

fn upgrade(weak: &Weak<ShopSyncInner>) -> Option<ShopSync> {
    weak.upgrade().map(|inner| ShopSync { inner })
}
