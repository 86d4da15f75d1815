use std::fmt;

use crate::identity::IdentityError;
use crate::store::StoreError;

pub type ShopResult<T> = Result<T, ShopError>;

#[derive(Debug, Clone)]
pub enum ShopError {
    /// The invite code does not exist (never created or already redeemed).
    InviteNotFound(String),
    /// The invite document exists but does not reference a list.
    InvalidInvite(String),
    Store(StoreError),
    Identity(IdentityError),
    InvalidSettings(String),
}

impl ShopError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ShopError::InviteNotFound(_) => "shop/invite-not-found",
            ShopError::InvalidInvite(_) => "shop/invalid-invite",
            ShopError::Store(err) => err.code_str(),
            ShopError::Identity(_) => "shop/identity",
            ShopError::InvalidSettings(_) => "shop/invalid-settings",
        }
    }
}

impl fmt::Display for ShopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShopError::InviteNotFound(code) => write!(f, "Invite `{code}` was not found"),
            ShopError::InvalidInvite(code) => write!(f, "Invite `{code}` is malformed"),
            ShopError::Store(err) => write!(f, "{err}"),
            ShopError::Identity(err) => write!(f, "{err}"),
            ShopError::InvalidSettings(message) => write!(f, "Invalid settings: {message}"),
        }
    }
}

impl std::error::Error for ShopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShopError::Store(err) => Some(err),
            ShopError::Identity(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ShopError {
    fn from(error: StoreError) -> Self {
        ShopError::Store(error)
    }
}

impl From<IdentityError> for ShopError {
    fn from(error: IdentityError) -> Self {
        ShopError::Identity(error)
    }
}
