use serde::Deserialize;

use crate::shop::error::{ShopError, ShopResult};
use crate::shop::types::DEFAULT_LIST_CATEGORIES;
use crate::store::MAX_BATCH_WRITES;

/// How a pushed snapshot is combined with optimistic local edits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Every push replaces the cached collection wholesale.
    #[default]
    ReplaceOnPush,
    /// Entities with a write still in flight keep their optimistic
    /// `order`/`categoryId`/`quantity` until that write settles.
    PreservePending,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShopSyncSettings {
    /// Operations per batched write for chunked deletes and reorders.
    pub batch_chunk_size: usize,
    pub invite_code_length: usize,
    pub invite_max_attempts: u32,
    pub reconcile: ReconcilePolicy,
    pub default_categories: Vec<String>,
}

impl Default for ShopSyncSettings {
    fn default() -> Self {
        Self {
            batch_chunk_size: 450,
            invite_code_length: 6,
            invite_max_attempts: 5,
            reconcile: ReconcilePolicy::default(),
            default_categories: DEFAULT_LIST_CATEGORIES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl ShopSyncSettings {
    pub fn from_json_str(json: &str) -> ShopResult<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|err| ShopError::InvalidSettings(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ShopResult<()> {
        if self.batch_chunk_size == 0 || self.batch_chunk_size > MAX_BATCH_WRITES {
            return Err(ShopError::InvalidSettings(format!(
                "batchChunkSize must be between 1 and {MAX_BATCH_WRITES}"
            )));
        }
        if self.invite_code_length == 0 {
            return Err(ShopError::InvalidSettings(
                "inviteCodeLength must be positive".into(),
            ));
        }
        if self.invite_max_attempts == 0 {
            return Err(ShopError::InvalidSettings(
                "inviteMaxAttempts must be positive".into(),
            ));
        }
        Ok(())
    }
}
