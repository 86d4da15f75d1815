use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::store::model::FieldPath;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// Top-level fields of a `create`/`set` write.
pub type WriteData = BTreeMap<String, FieldValue>;

/// A value written into a document field.
///
/// Besides plain JSON, writes may carry sentinels that the store resolves when
/// the write is applied.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's commit time (RFC 3339, UTC).
    ServerTimestamp,
    /// Appends each element not already present in the existing array.
    ArrayUnion(Vec<Value>),
}

impl FieldValue {
    pub fn null() -> Self {
        FieldValue::Value(Value::Null)
    }

    pub fn server_timestamp() -> Self {
        FieldValue::ServerTimestamp
    }

    pub fn array_union<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FieldValue::ArrayUnion(elements.into_iter().map(Into::into).collect())
    }

    /// Resolves sentinels against the value currently stored at the field.
    pub(crate) fn resolve(self, current: Option<&Value>, commit_time: &str) -> Value {
        match self {
            FieldValue::Value(value) => value,
            FieldValue::ServerTimestamp => Value::String(commit_time.to_string()),
            FieldValue::ArrayUnion(elements) => {
                let mut merged = match current {
                    Some(Value::Array(existing)) => existing.clone(),
                    _ => Vec::new(),
                };
                for element in elements {
                    if !merged.contains(&element) {
                        merged.push(element);
                    }
                }
                Value::Array(merged)
            }
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Value(Value::String(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Value(Value::Bool(value))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(value) => FieldValue::Value(Value::String(value)),
            None => FieldValue::null(),
        }
    }
}

/// Reads the value at `path`, descending through nested maps.
pub fn value_at<'a>(fields: &'a Fields, path: &FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let mut current = fields.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at `path`, creating (or replacing non-map) intermediate maps.
pub fn set_value_at(fields: &mut Fields, path: &FieldPath, value: Value) {
    set_at_segments(fields, path.segments(), value);
}

fn set_at_segments(fields: &mut Fields, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        fields.insert(first.clone(), value);
        return;
    }
    let child = fields
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(map) = child {
        set_at_segments(map, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_union_skips_existing_members() {
        let current = json!(["u1", "u2"]);
        let resolved = FieldValue::array_union(["u2", "u3"]).resolve(Some(&current), "now");
        assert_eq!(resolved, json!(["u1", "u2", "u3"]));
    }

    #[test]
    fn server_timestamp_uses_commit_time() {
        let resolved = FieldValue::server_timestamp().resolve(None, "2026-01-01T00:00:00Z");
        assert_eq!(resolved, json!("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn nested_set_creates_intermediate_maps() {
        let mut fields = Fields::new();
        let path = FieldPath::from_dot_separated("orderBy.u1").unwrap();
        set_value_at(&mut fields, &path, json!(3));
        assert_eq!(value_at(&fields, &path), Some(&json!(3)));
        assert_eq!(Value::Object(fields), json!({ "orderBy": { "u1": 3 } }));
    }
}
