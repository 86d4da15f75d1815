use std::cmp::Ordering;

use serde_json::Value;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::{DocumentKey, FieldPath, IntoFieldPath, ResourcePath};
use crate::store::snapshot::DocumentSnapshot;
use crate::store::value::value_at;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    ArrayContains,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: FieldPath,
    operator: FilterOperator,
    value: Value,
}

impl FieldFilter {
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn matches(&self, snapshot: &DocumentSnapshot) -> bool {
        let Some(value) = field_value(snapshot, &self.field) else {
            return false;
        };
        match self.operator {
            FilterOperator::Equal => value == self.value,
            FilterOperator::ArrayContains => match value {
                Value::Array(values) => values.contains(&self.value),
                _ => false,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    field: FieldPath,
    direction: OrderDirection,
}

impl OrderBy {
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }
}

/// A query over the documents directly inside one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    collection_path: ResourcePath,
    filters: Vec<FieldFilter>,
    order_by: Vec<OrderBy>,
}

impl Query {
    pub fn new(collection_path: ResourcePath) -> StoreResult<Self> {
        if collection_path.len() % 2 == 0 {
            return Err(invalid_argument(
                "Queries must reference a collection (odd number of path segments)",
            ));
        }
        Ok(Self {
            collection_path,
            filters: Vec::new(),
            order_by: Vec::new(),
        })
    }

    pub fn where_field(
        mut self,
        field: impl IntoFieldPath,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> StoreResult<Self> {
        self.filters.push(FieldFilter {
            field: field.into_field_path()?,
            operator,
            value: value.into(),
        });
        Ok(self)
    }

    pub fn order_by(
        mut self,
        field: impl IntoFieldPath,
        direction: OrderDirection,
    ) -> StoreResult<Self> {
        self.order_by.push(OrderBy {
            field: field.into_field_path()?,
            direction,
        });
        Ok(self)
    }

    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn matches_collection(&self, key: &DocumentKey) -> bool {
        key.collection_path() == self.collection_path
    }

    /// Whether an existing document belongs to this query's result set.
    pub fn matches(&self, snapshot: &DocumentSnapshot) -> bool {
        snapshot.exists()
            && self.matches_collection(snapshot.key())
            && self.filters.iter().all(|filter| filter.matches(snapshot))
    }

    /// Orders matching documents; ties fall back to the document key.
    pub fn sort(&self, documents: &mut [DocumentSnapshot]) {
        documents.sort_by(|left, right| self.compare(left, right));
    }

    fn compare(&self, left: &DocumentSnapshot, right: &DocumentSnapshot) -> Ordering {
        for order in &self.order_by {
            let left_value = field_value(left, &order.field).unwrap_or(Value::Null);
            let right_value = field_value(right, &order.field).unwrap_or(Value::Null);
            let mut ordering = compare_values(&left_value, &right_value);
            if order.direction == OrderDirection::Descending {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.key().cmp(right.key())
    }
}

fn field_value(snapshot: &DocumentSnapshot, field: &FieldPath) -> Option<Value> {
    if field == &FieldPath::document_id() {
        return Some(Value::String(snapshot.key().path().canonical_string()));
    }
    value_at(snapshot.data()?, field).cloned()
}

/// Orders values by type first (null < bool < number < string < other), then by value.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => a
                    .as_f64()
                    .unwrap_or_default()
                    .partial_cmp(&b.as_f64().unwrap_or_default())
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}
