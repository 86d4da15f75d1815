use std::fmt::{Display, Formatter};

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::ResourcePath;

const AUTO_ID_LENGTH: usize = 20;

/// Generates a client-side document id (20 alphanumeric characters).
pub fn auto_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(AUTO_ID_LENGTH)
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    path: ResourcePath,
    id: String,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> StoreResult<Self> {
        if path.len() < 2 || path.len() % 2 != 0 {
            return Err(invalid_argument(
                "Document keys must point to a document (even number of segments)",
            ));
        }
        let id = path.last_segment().unwrap_or_default().to_string();
        Ok(Self { path, id })
    }

    pub fn from_string(path: &str) -> StoreResult<Self> {
        Self::from_path(ResourcePath::from_string(path)?)
    }

    /// Key of a new document with a generated id inside `collection`.
    pub fn generate_in(collection: &ResourcePath) -> StoreResult<Self> {
        Self::in_collection(collection, &auto_id())
    }

    /// Key of document `id` inside `collection`.
    pub fn in_collection(collection: &ResourcePath, id: &str) -> StoreResult<Self> {
        if id.is_empty() || id.contains('/') {
            return Err(invalid_argument(format!("Invalid document id `{id}`")));
        }
        Self::from_path(collection.child([id]))
    }

    pub fn collection_path(&self) -> ResourcePath {
        self.path.without_last()
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_even_segments() {
        let err = DocumentKey::from_string("lists").unwrap_err();
        assert_eq!(err.code_str(), "store/invalid-argument");
    }

    #[test]
    fn parses_valid_path() {
        let key = DocumentKey::from_string("lists/abc/items/milk").unwrap();
        assert_eq!(key.id(), "milk");
        assert_eq!(key.collection_path().canonical_string(), "lists/abc/items");
    }

    #[test]
    fn generated_ids_are_unique() {
        let collection = ResourcePath::from_string("lists/l/items").unwrap();
        let first = DocumentKey::generate_in(&collection).unwrap();
        let second = DocumentKey::generate_in(&collection).unwrap();
        assert_eq!(first.id().len(), AUTO_ID_LENGTH);
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_slash_in_id() {
        let collection = ResourcePath::from_string("invites").unwrap();
        assert!(DocumentKey::in_collection(&collection, "a/b").is_err());
    }
}
