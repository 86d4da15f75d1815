use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::store::datastore::{DocumentStore, Precondition, WriteOperation};
use crate::store::error::{aborted, invalid_argument, StoreError, StoreResult};
use crate::store::model::{DocumentKey, FieldPath};
use crate::store::snapshot::DocumentSnapshot;
use crate::store::value::{FieldValue, WriteData};
use crate::util::backoff::calculate_backoff_millis;
use crate::util::runtime::sleep;

/// Attempts made by [`run_transaction`] before contention is reported.
pub const MAX_ATTEMPTS: u32 = 5;

/// Reads and buffered writes of a single transaction attempt.
///
/// Every document read is verified at commit time against the version that
/// was observed, so a concurrent change aborts (and retries) the attempt.
#[derive(Clone)]
pub struct Transaction {
    store: Arc<dyn DocumentStore>,
    state: Arc<Mutex<TransactionState>>,
}

#[derive(Default)]
struct TransactionState {
    read_versions: BTreeMap<DocumentKey, Option<u64>>,
    writes: Vec<WriteOperation>,
}

impl Transaction {
    fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(TransactionState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, TransactionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn get(&self, key: &DocumentKey) -> StoreResult<DocumentSnapshot> {
        if !self.state().writes.is_empty() {
            return Err(invalid_argument(
                "Transactions require all reads to be executed before all writes",
            ));
        }

        let snapshot = self.store.get(key).await?;
        let mut state = self.state();
        match state.read_versions.get(key) {
            Some(previous) if *previous != snapshot.version() => {
                return Err(aborted(format!(
                    "Document {key} changed between reads in the same transaction"
                )));
            }
            Some(_) => {}
            None => {
                state.read_versions.insert(key.clone(), snapshot.version());
            }
        }
        Ok(snapshot)
    }

    pub fn set(&self, key: DocumentKey, data: WriteData) {
        self.state().writes.push(WriteOperation::Set {
            key,
            data,
            merge: false,
        });
    }

    pub fn update(&self, key: DocumentKey, fields: Vec<(FieldPath, FieldValue)>) {
        self.state()
            .writes
            .push(WriteOperation::Update { key, fields });
    }

    pub fn delete(&self, key: DocumentKey) {
        self.state().writes.push(WriteOperation::Delete { key });
    }

    fn commit_operations(&self) -> Vec<WriteOperation> {
        let state = self.state();
        if state.writes.is_empty() {
            return Vec::new();
        }
        let mut operations: Vec<WriteOperation> = state
            .read_versions
            .iter()
            .map(|(key, version)| WriteOperation::Verify {
                key: key.clone(),
                precondition: match version {
                    Some(version) => Precondition::Version(*version),
                    None => Precondition::Exists(false),
                },
            })
            .collect();
        operations.extend(state.writes.iter().cloned());
        operations
    }
}

/// Runs `body` against a fresh [`Transaction`] and commits its writes atomically.
///
/// Errors returned by `body` abort without retry. A commit rejected because
/// a read document changed is retried with backoff up to [`MAX_ATTEMPTS`] times.
pub async fn run_transaction<T, E, F, Fut>(store: Arc<dyn DocumentStore>, mut body: F) -> Result<T, E>
where
    F: FnMut(Transaction) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    let mut attempt: u32 = 0;
    loop {
        let transaction = Transaction::new(Arc::clone(&store));
        let value = body(transaction.clone()).await?;
        let operations = transaction.commit_operations();
        if operations.is_empty() {
            return Ok(value);
        }

        match store.commit(operations).await {
            Ok(()) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = calculate_backoff_millis(attempt);
                log::warn!(
                    "transaction attempt {} aborted ({err}); retrying in {delay}ms",
                    attempt + 1
                );
                sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
