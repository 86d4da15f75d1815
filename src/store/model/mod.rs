mod document_key;
mod field_path;
mod resource_path;

pub use document_key::{auto_id, DocumentKey};
pub use field_path::{FieldPath, IntoFieldPath};
pub use resource_path::ResourcePath;
