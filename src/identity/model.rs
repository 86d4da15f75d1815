use serde::{Deserialize, Serialize};

use crate::util::ObserverRegistry;

/// Stable per-device identity handed out by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Observers of identity changes.
pub type IdentityListeners = ObserverRegistry<Option<Identity>>;
