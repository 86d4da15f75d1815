use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::identity::error::{IdentityError, IdentityResult};
use crate::identity::model::{Identity, IdentityListeners};
use crate::identity::provider::IdentityProvider;
use crate::util::{PartialObserver, Unsubscribe};

const UID_LENGTH: usize = 28;

/// In-process identity provider minting random anonymous uids.
#[derive(Default)]
pub struct LocalIdentityProvider {
    current: Mutex<Option<Identity>>,
    listeners: IdentityListeners,
    disabled: Mutex<Option<String>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out already signed in as `uid`.
    pub fn with_identity(uid: impl Into<String>) -> Self {
        let provider = Self::default();
        *provider.current() = Some(Identity::new(uid));
        provider
    }

    fn current(&self) -> MutexGuard<'_, Option<Identity>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes subsequent anonymous sign-ins fail with `reason`.
    pub fn disable_sign_in(&self, reason: impl Into<String>) {
        *self.disabled.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Switches to `uid` and notifies observers.
    pub fn sign_in_as(&self, uid: impl Into<String>) -> Identity {
        let identity = Identity::new(uid);
        *self.current() = Some(identity.clone());
        self.listeners.notify(&Some(identity.clone()));
        identity
    }

    pub fn sign_out(&self) {
        let previous = self.current().take();
        if previous.is_some() {
            self.listeners.notify(&None);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.listeners.len()
    }
}

fn generate_uid() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(UID_LENGTH)
        .collect()
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl IdentityProvider for LocalIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.current().clone()
    }

    async fn sign_in_anonymously(&self) -> IdentityResult<Identity> {
        if let Some(reason) = self
            .disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(IdentityError::Disabled(reason));
        }
        if let Some(identity) = self.current_identity() {
            return Ok(identity);
        }
        Ok(self.sign_in_as(generate_uid()))
    }

    fn on_identity_changed(&self, observer: PartialObserver<Option<Identity>>) -> Unsubscribe {
        observer.notify(&self.current_identity());
        self.listeners.add_observer(observer)
    }
}
