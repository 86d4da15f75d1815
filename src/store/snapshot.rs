use crate::store::model::DocumentKey;
use crate::store::query::Query;
use crate::store::value::Fields;

/// A read of a single document at some point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    fields: Option<Fields>,
    version: Option<u64>,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, fields: Option<Fields>, version: Option<u64>) -> Self {
        Self {
            key,
            fields,
            version,
        }
    }

    pub fn missing(key: DocumentKey) -> Self {
        Self::new(key, None, None)
    }

    /// Returns whether the document exists in the store.
    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    pub fn data(&self) -> Option<&Fields> {
        self.fields.as_ref()
    }

    pub fn into_data(self) -> Option<Fields> {
        self.fields
    }

    /// Store-assigned version, bumped on every write; `None` for missing documents.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }
}

/// The complete result set of a query.
#[derive(Clone, Debug)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>) -> Self {
        Self { query, documents }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
