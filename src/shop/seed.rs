use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::shop::repository::CategoryRepository;
use crate::store::StoreResult;

/// What [`CategorySeeder::ensure_defaults`] did for a list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    /// This session already handled the list.
    AlreadyHandled,
    /// The list had categories; nothing was written.
    HadCategories,
    Seeded(usize),
}

/// Seeds the default categories into lists that have none, at most once per
/// list per session.
///
/// The guard only covers this process. Two sessions racing on the same
/// empty list can both seed it.
#[derive(Debug, Default)]
pub struct CategorySeeder {
    handled: Mutex<HashSet<String>>,
}

impl CategorySeeder {
    pub fn new() -> Self {
        Self::default()
    }

    fn handled(&self) -> MutexGuard<'_, HashSet<String>> {
        self.handled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_handled(&self, list_id: &str) -> bool {
        self.handled().contains(list_id)
    }

    /// Forgets every list, so the next subscribe checks again.
    pub fn reset(&self) {
        self.handled().clear();
    }

    pub async fn ensure_defaults<S>(
        &self,
        categories: &CategoryRepository,
        list_id: &str,
        names: &[S],
    ) -> StoreResult<SeedOutcome>
    where
        S: AsRef<str>,
    {
        // Claimed before the first await so concurrent callers in this
        // session see the list as handled.
        if !self.handled().insert(list_id.to_string()) {
            return Ok(SeedOutcome::AlreadyHandled);
        }

        let result = seed_if_empty(categories, list_id, names).await;

        match &result {
            Ok(SeedOutcome::Seeded(created)) => {
                log::debug!("seeded {created} default categories into list {list_id}")
            }
            Ok(_) => {}
            Err(_) => {
                self.handled().remove(list_id);
            }
        }
        result
    }
}

async fn seed_if_empty<S>(
    categories: &CategoryRepository,
    list_id: &str,
    names: &[S],
) -> StoreResult<SeedOutcome>
where
    S: AsRef<str>,
{
    if !categories.is_empty(list_id).await? {
        return Ok(SeedOutcome::HadCategories);
    }
    let created = categories.add_all(list_id, names).await?;
    Ok(SeedOutcome::Seeded(created))
}
