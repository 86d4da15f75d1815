use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Position given to a list for an identity that has no stored position yet.
/// Sorts the list after every list the identity has ordered explicitly.
pub const LIST_ORDER_SENTINEL: i64 = 999_999;

/// Categories seeded into a list that has none.
pub const DEFAULT_LIST_CATEGORIES: [&str; 11] = [
    "Hedelmät & vihannekset",
    "Maito & kananmunat",
    "Leipä",
    "Liha & kala",
    "Valmisruoka",
    "Kuivat tuotteet",
    "Pakasteet",
    "Juomat",
    "Makeiset & naposteltavat",
    "Hygienia",
    "Koti & siivous",
];

/// A shop the identity uses as a label for its lists (`users/{uid}/stores/{id}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Store {
    /// `"name (branch)"`, or just the name when there is no branch.
    pub fn label(&self) -> String {
        match &self.branch {
            Some(branch) => format!("{} ({})", self.name, branch),
            None => self.name.clone(),
        }
    }
}

/// A shared list as seen by the current identity (`lists/{id}`).
///
/// `order` is the current identity's entry of the document's `orderBy` map,
/// or [`LIST_ORDER_SENTINEL`] when it has none.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopList {
    pub id: String,
    pub name: String,
    pub store_id: Option<String>,
    pub order: i64,
    pub owner_id: String,
    pub member_ids: Vec<String>,
}

/// `lists/{listId}/categories/{id}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub order: i64,
}

/// `lists/{listId}/items/{id}`. `order` is scoped to items sharing `category_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: String,
    pub name: String,
    pub done: bool,
    pub category_id: Option<String>,
    pub order: i64,
    pub quantity: i64,
}

/// Sparse item update; only fields that are `Some` are written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// `Some(None)` moves the item to "uncategorized".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    pub fn category_id(mut self, category_id: Option<&str>) -> Self {
        self.category_id = Some(category_id.map(str::to_string));
        self
    }

    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.done.is_none()
            && self.category_id.is_none()
            && self.order.is_none()
            && self.quantity.is_none()
    }
}

/// Derived, disposable cache exposed to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopState {
    pub uid: Option<String>,
    pub stores: Vec<Store>,
    pub lists: Vec<ShopList>,
    pub categories_by_list_id: HashMap<String, Vec<Category>>,
    pub items_by_list_id: HashMap<String, Vec<ListItem>>,
}

impl ShopState {
    pub fn for_identity(uid: Option<String>) -> Self {
        Self {
            uid,
            ..Default::default()
        }
    }

    pub fn list(&self, list_id: &str) -> Option<&ShopList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    pub fn categories(&self, list_id: &str) -> &[Category] {
        self.categories_by_list_id
            .get(list_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn items(&self, list_id: &str) -> &[ListItem] {
        self.items_by_list_id
            .get(list_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn item(&self, list_id: &str, item_id: &str) -> Option<&ListItem> {
        self.items(list_id).iter().find(|item| item.id == item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_label_includes_branch() {
        let store = Store {
            id: "s1".into(),
            name: "Prisma".into(),
            branch: Some("Kaleva".into()),
        };
        assert_eq!(store.label(), "Prisma (Kaleva)");
        let bare = Store {
            branch: None,
            ..store
        };
        assert_eq!(bare.label(), "Prisma");
    }

    #[test]
    fn patch_distinguishes_uncategorize_from_absent() {
        let patch = ItemPatch::new().category_id(None);
        assert_eq!(patch.category_id, Some(None));
        assert!(!patch.is_empty());
        assert!(ItemPatch::new().is_empty());
    }

    #[test]
    fn state_serializes_in_camel_case() {
        let mut state = ShopState::for_identity(Some("u1".into()));
        state.lists.push(ShopList {
            id: "l1".into(),
            name: "Viikko".into(),
            store_id: None,
            order: 0,
            owner_id: "u1".into(),
            member_ids: vec!["u1".into()],
        });
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["lists"][0]["ownerId"], json!("u1"));
        assert_eq!(value["lists"][0]["storeId"], json!(null));
    }
}
