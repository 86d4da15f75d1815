use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::store::datastore::{DocumentStore, Precondition, WriteOperation};
use crate::store::error::{aborted, not_found, unavailable, StoreResult};
use crate::store::listener::{ListenerRegistration, QueryCallback};
use crate::store::model::{DocumentKey, FieldPath, ResourcePath};
use crate::store::query::Query;
use crate::store::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::store::value::{set_value_at, value_at, FieldValue, Fields, WriteData};

/// Process-local [`DocumentStore`] with live queries.
///
/// Used for tests and offline runs. Writes are applied to a staged copy and
/// swapped in only when every operation succeeds, so `commit` is atomic.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: Mutex<BTreeMap<DocumentKey, StoredDocument>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    listener_counter: AtomicU64,
    version_counter: AtomicU64,
    commit_counter: AtomicUsize,
    unavailable: AtomicBool,
    write_budget: Mutex<Option<usize>>,
}

#[derive(Clone, Debug)]
struct StoredDocument {
    fields: Fields,
    version: u64,
}

struct ListenerEntry {
    id: u64,
    query: Query,
    callback: QueryCallback,
    last_documents: Option<Vec<DocumentSnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing the connection: every operation fails with
    /// `unavailable` and active listeners receive the error and are dropped.
    pub fn set_unavailable(&self, unavailable_now: bool) {
        self.inner.unavailable.store(unavailable_now, Ordering::SeqCst);
        if unavailable_now {
            let entries: Vec<ListenerEntry> = lock(&self.inner.listeners).drain(..).collect();
            for entry in entries {
                (entry.callback)(Err(unavailable("Document store connection lost")));
            }
        }
    }

    /// Allows `remaining` more successful write calls before every further
    /// write fails with `unavailable`. `None` removes the limit.
    pub fn set_write_budget(&self, remaining: Option<usize>) {
        *lock(&self.inner.write_budget) = remaining;
    }

    /// Number of successful write calls (`commit` counts once per batch).
    pub fn commit_count(&self) -> usize {
        self.inner.commit_counter.load(Ordering::SeqCst)
    }

    /// Keys of every stored document whose path starts with `prefix`.
    pub fn document_keys_under(&self, prefix: &ResourcePath) -> Vec<DocumentKey> {
        lock(&self.inner.documents)
            .keys()
            .filter(|key| prefix.is_prefix_of(key.path()))
            .cloned()
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("Document store is unavailable"));
        }
        Ok(())
    }

    fn apply(&self, writes: Vec<WriteOperation>) -> StoreResult<()> {
        self.ensure_available()?;
        {
            let mut budget = lock(&self.inner.write_budget);
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(unavailable("Document store write budget exhausted"));
                }
                *remaining -= 1;
            }
        }

        {
            let mut documents = lock(&self.inner.documents);
            let mut staged = documents.clone();
            let version = self.inner.version_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let commit_time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            for write in writes {
                apply_write(&mut staged, write, version, &commit_time)?;
            }
            *documents = staged;
        }
        self.inner.commit_counter.fetch_add(1, Ordering::SeqCst);
        self.notify_listeners();
        Ok(())
    }

    fn notify_listeners(&self) {
        let mut pending = Vec::new();
        {
            let documents = lock(&self.inner.documents);
            let mut listeners = lock(&self.inner.listeners);
            for entry in listeners.iter_mut() {
                let results = evaluate(&documents, &entry.query);
                if entry.last_documents.as_ref() == Some(&results) {
                    continue;
                }
                entry.last_documents = Some(results.clone());
                pending.push((
                    Arc::clone(&entry.callback),
                    QuerySnapshot::new(entry.query.clone(), results),
                ));
            }
        }

        for (callback, snapshot) in pending {
            callback(Ok(snapshot));
        }
    }
}

fn evaluate(documents: &BTreeMap<DocumentKey, StoredDocument>, query: &Query) -> Vec<DocumentSnapshot> {
    let mut results: Vec<DocumentSnapshot> = documents
        .iter()
        .filter(|(key, _)| query.matches_collection(key))
        .map(|(key, stored)| {
            DocumentSnapshot::new(key.clone(), Some(stored.fields.clone()), Some(stored.version))
        })
        .filter(|snapshot| query.matches(snapshot))
        .collect();
    query.sort(&mut results);
    results
}

fn apply_write(
    documents: &mut BTreeMap<DocumentKey, StoredDocument>,
    write: WriteOperation,
    version: u64,
    commit_time: &str,
) -> StoreResult<()> {
    match write {
        WriteOperation::Set { key, data, merge } => {
            let mut fields = match (merge, documents.get(&key)) {
                (true, Some(existing)) => existing.fields.clone(),
                _ => Fields::new(),
            };
            for (name, value) in data {
                let resolved = value.resolve(fields.get(&name), commit_time);
                fields.insert(name, resolved);
            }
            documents.insert(key, StoredDocument { fields, version });
        }
        WriteOperation::Update { key, fields: updates } => {
            let existing = documents
                .get(&key)
                .ok_or_else(|| not_found(format!("Document {key} does not exist")))?;
            let mut fields = existing.fields.clone();
            for (path, value) in updates {
                let resolved = value.resolve(value_at(&fields, &path), commit_time);
                set_value_at(&mut fields, &path, resolved);
            }
            documents.insert(key, StoredDocument { fields, version });
        }
        WriteOperation::Delete { key } => {
            documents.remove(&key);
        }
        WriteOperation::Verify { key, precondition } => {
            let current = documents.get(&key).map(|stored| stored.version);
            let satisfied = match precondition {
                Precondition::Exists(expected) => current.is_some() == expected,
                Precondition::Version(expected) => current == Some(expected),
            };
            if !satisfied {
                return Err(aborted(format!(
                    "Precondition {precondition:?} failed for document {key}"
                )));
            }
        }
    }
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &ResourcePath, data: WriteData) -> StoreResult<DocumentKey> {
        let key = DocumentKey::generate_in(collection)?;
        self.apply(vec![
            WriteOperation::Verify {
                key: key.clone(),
                precondition: Precondition::Exists(false),
            },
            WriteOperation::Set {
                key: key.clone(),
                data,
                merge: false,
            },
        ])?;
        Ok(key)
    }

    async fn get(&self, key: &DocumentKey) -> StoreResult<DocumentSnapshot> {
        self.ensure_available()?;
        let documents = lock(&self.inner.documents);
        Ok(match documents.get(key) {
            Some(stored) => DocumentSnapshot::new(
                key.clone(),
                Some(stored.fields.clone()),
                Some(stored.version),
            ),
            None => DocumentSnapshot::missing(key.clone()),
        })
    }

    async fn set(&self, key: &DocumentKey, data: WriteData, merge: bool) -> StoreResult<()> {
        self.apply(vec![WriteOperation::Set {
            key: key.clone(),
            data,
            merge,
        }])
    }

    async fn update(
        &self,
        key: &DocumentKey,
        fields: Vec<(FieldPath, FieldValue)>,
    ) -> StoreResult<()> {
        self.apply(vec![WriteOperation::Update {
            key: key.clone(),
            fields,
        }])
    }

    async fn delete(&self, key: &DocumentKey) -> StoreResult<()> {
        self.apply(vec![WriteOperation::Delete { key: key.clone() }])
    }

    async fn run_query(&self, query: &Query) -> StoreResult<Vec<DocumentSnapshot>> {
        self.ensure_available()?;
        let documents = lock(&self.inner.documents);
        Ok(evaluate(&documents, query))
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> StoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.apply(writes)
    }

    fn listen(&self, query: Query, callback: QueryCallback) -> ListenerRegistration {
        if let Err(err) = self.ensure_available() {
            callback(Err(err));
            return ListenerRegistration::noop();
        }

        let id = self.inner.listener_counter.fetch_add(1, Ordering::SeqCst);
        let initial = {
            let documents = lock(&self.inner.documents);
            let results = evaluate(&documents, &query);
            lock(&self.inner.listeners).push(ListenerEntry {
                id,
                query: query.clone(),
                callback: Arc::clone(&callback),
                last_documents: Some(results.clone()),
            });
            results
        };
        callback(Ok(QuerySnapshot::new(query, initial)));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).retain(|entry| entry.id != id);
            }
        })
    }
}
