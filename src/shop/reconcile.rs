use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::shop::types::{Category, ListItem};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum EntityKind {
    Category,
    Item,
}

/// Fields of an entity with an optimistic write in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PendingFields {
    pub order: bool,
    pub category: bool,
    pub quantity: bool,
}

impl PendingFields {
    pub const ORDER: Self = Self {
        order: true,
        category: false,
        quantity: false,
    };
    pub const ORDER_AND_CATEGORY: Self = Self {
        order: true,
        category: true,
        quantity: false,
    };
    pub const QUANTITY: Self = Self {
        order: false,
        category: false,
        quantity: true,
    };
}

#[derive(Clone, Copy, Debug, Default)]
struct PendingCounts {
    order: usize,
    category: usize,
    quantity: usize,
}

impl PendingCounts {
    fn add(&mut self, fields: PendingFields) {
        self.order += usize::from(fields.order);
        self.category += usize::from(fields.category);
        self.quantity += usize::from(fields.quantity);
    }

    fn remove(&mut self, fields: PendingFields) {
        self.order -= usize::from(fields.order);
        self.category -= usize::from(fields.category);
        self.quantity -= usize::from(fields.quantity);
    }

    fn is_empty(&self) -> bool {
        self.order == 0 && self.category == 0 && self.quantity == 0
    }

    fn fields(&self) -> PendingFields {
        PendingFields {
            order: self.order > 0,
            category: self.category > 0,
            quantity: self.quantity > 0,
        }
    }
}

type PendingKey = (EntityKind, String, String);

/// Pending-write markers keyed by `(kind, list id, entity id)`.
///
/// Markers are counted so overlapping writes to the same field keep the
/// marker until the last one settles.
#[derive(Clone, Default)]
pub(crate) struct PendingWrites {
    entries: Arc<Mutex<HashMap<PendingKey, PendingCounts>>>,
}

impl PendingWrites {
    fn entries(&self) -> MutexGuard<'_, HashMap<PendingKey, PendingCounts>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `fields` of every entity in `ids` as pending until the guard drops.
    pub fn begin<S>(&self, kind: EntityKind, list_id: &str, ids: &[S], fields: PendingFields) -> PendingGuard
    where
        S: AsRef<str>,
    {
        let keys: Vec<PendingKey> = ids
            .iter()
            .map(|id| (kind, list_id.to_string(), id.as_ref().to_string()))
            .collect();
        {
            let mut entries = self.entries();
            for key in &keys {
                entries.entry(key.clone()).or_default().add(fields);
            }
        }
        PendingGuard {
            pending: self.clone(),
            keys,
            fields,
        }
    }

    pub fn fields_for(&self, kind: EntityKind, list_id: &str, id: &str) -> PendingFields {
        self.entries()
            .get(&(kind, list_id.to_string(), id.to_string()))
            .map(PendingCounts::fields)
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn finish(&self, keys: &[PendingKey], fields: PendingFields) {
        let mut entries = self.entries();
        for key in keys {
            if let Some(counts) = entries.get_mut(key) {
                counts.remove(fields);
                if counts.is_empty() {
                    entries.remove(key);
                }
            }
        }
    }

    /// Keeps optimistic `order` values of pending categories from `cached`.
    pub fn overlay_categories(&self, list_id: &str, cached: &[Category], pushed: &mut [Category]) {
        let mut changed = false;
        for category in pushed.iter_mut() {
            let pending = self.fields_for(EntityKind::Category, list_id, &category.id);
            if !pending.order {
                continue;
            }
            if let Some(local) = cached.iter().find(|local| local.id == category.id) {
                changed |= category.order != local.order;
                category.order = local.order;
            }
        }
        if changed {
            pushed.sort_by_key(|category| category.order);
        }
    }

    /// Keeps optimistic `order`, `category_id` and `quantity` values of
    /// pending items from `cached`.
    pub fn overlay_items(&self, list_id: &str, cached: &[ListItem], pushed: &mut [ListItem]) {
        let mut reordered = false;
        for item in pushed.iter_mut() {
            let pending = self.fields_for(EntityKind::Item, list_id, &item.id);
            if pending == PendingFields::default() {
                continue;
            }
            let Some(local) = cached.iter().find(|local| local.id == item.id) else {
                continue;
            };
            if pending.order {
                reordered |= item.order != local.order;
                item.order = local.order;
            }
            if pending.category {
                item.category_id = local.category_id.clone();
            }
            if pending.quantity {
                item.quantity = local.quantity;
            }
        }
        if reordered {
            pushed.sort_by_key(|item| item.order);
        }
    }
}

/// Clears its pending markers when dropped.
#[must_use]
pub(crate) struct PendingGuard {
    pending: PendingWrites,
    keys: Vec<PendingKey>,
    fields: PendingFields,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.finish(&self.keys, self.fields);
    }
}
