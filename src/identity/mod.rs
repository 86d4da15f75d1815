//! Identity provider seam: who the synchronization core acts as.

pub mod error;
mod local;
mod model;
mod provider;

pub use error::{IdentityError, IdentityResult};
pub use local::LocalIdentityProvider;
pub use model::{Identity, IdentityListeners};
pub use provider::IdentityProvider;
