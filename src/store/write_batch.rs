use std::sync::Arc;

use crate::store::datastore::{DocumentStore, WriteOperation};
use crate::store::error::{resource_exhausted, StoreResult};
use crate::store::model::{DocumentKey, FieldPath};
use crate::store::value::{FieldValue, WriteData};

/// Hard per-commit operation limit of the hosted store.
pub const MAX_BATCH_WRITES: usize = 500;

/// Aggregates write operations and commits them atomically.
#[derive(Clone)]
pub struct WriteBatch {
    store: Arc<dyn DocumentStore>,
    writes: Vec<WriteOperation>,
}

impl WriteBatch {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            writes: Vec::new(),
        }
    }

    pub fn set(&mut self, key: DocumentKey, data: WriteData) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Set {
            key,
            data,
            merge: false,
        })
    }

    pub fn update(
        &mut self,
        key: DocumentKey,
        fields: Vec<(FieldPath, FieldValue)>,
    ) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Update { key, fields })
    }

    pub fn delete(&mut self, key: DocumentKey) -> StoreResult<&mut Self> {
        self.push(WriteOperation::Delete { key })
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Commits all queued writes atomically.
    pub async fn commit(self) -> StoreResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let count = self.writes.len();
        self.store.commit(self.writes).await?;
        log::debug!("committed write batch of {count} operations");
        Ok(())
    }

    fn push(&mut self, write: WriteOperation) -> StoreResult<&mut Self> {
        if self.writes.len() >= MAX_BATCH_WRITES {
            return Err(resource_exhausted(format!(
                "WriteBatch cannot contain more than {MAX_BATCH_WRITES} operations"
            )));
        }
        self.writes.push(write);
        Ok(self)
    }
}
