//! Optimistic cache rewrites for the reorder operations.

use std::collections::{HashMap, HashSet};

use crate::shop::types::{Category, ListItem};

/// Position for a new entity: one past the largest existing `order`, or 0.
pub fn next_order<I>(orders: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    orders.into_iter().max().map_or(0, |max| max.saturating_add(1))
}

/// Categories named in `next_ids`, in that order, with `order` set to their
/// index. Categories not named are dropped from the result.
pub fn reorder_categories<S>(current: &[Category], next_ids: &[S]) -> Vec<Category>
where
    S: AsRef<str>,
{
    let by_id: HashMap<&str, &Category> = current
        .iter()
        .map(|category| (category.id.as_str(), category))
        .collect();
    next_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_ref()))
        .enumerate()
        .map(|(index, category)| Category {
            order: index as i64,
            ..(*category).clone()
        })
        .collect()
}

/// Items outside `category_id` unchanged, followed by the items named in
/// `next_ids`, forced into `category_id` with their index as `order`.
///
/// Named items cached under another category are moved along, matching what
/// the remote write stores. Unnamed items of `category_id` are dropped.
pub fn reorder_items_in_category<S>(
    all: &[ListItem],
    category_id: Option<&str>,
    next_ids: &[S],
) -> Vec<ListItem>
where
    S: AsRef<str>,
{
    let by_id: HashMap<&str, &ListItem> = all.iter().map(|item| (item.id.as_str(), item)).collect();
    let named: HashSet<&str> = next_ids.iter().map(AsRef::as_ref).collect();

    let mut merged: Vec<ListItem> = all
        .iter()
        .filter(|item| {
            item.category_id.as_deref() != category_id && !named.contains(item.id.as_str())
        })
        .cloned()
        .collect();
    merged.extend(next_ids.iter().enumerate().filter_map(|(index, id)| {
        by_id.get(id.as_ref()).map(|item| ListItem {
            order: index as i64,
            category_id: category_id.map(str::to_string),
            ..(*item).clone()
        })
    }));
    merged
}
