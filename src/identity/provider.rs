use async_trait::async_trait;

use crate::identity::error::IdentityResult;
use crate::identity::model::Identity;
use crate::util::{PartialObserver, Unsubscribe};

/// Source of the anonymous, stable identity the synchronization core acts as.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait IdentityProvider: Send + Sync + 'static {
    fn current_identity(&self) -> Option<Identity>;

    /// Returns the current identity, creating an anonymous one when none exists.
    async fn sign_in_anonymously(&self) -> IdentityResult<Identity>;

    /// Registers an observer for identity changes. The observer is invoked
    /// immediately with the current identity.
    fn on_identity_changed(&self, observer: PartialObserver<Option<Identity>>) -> Unsubscribe;
}
