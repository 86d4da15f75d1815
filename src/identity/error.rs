use std::fmt;

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone)]
pub enum IdentityError {
    Network(String),
    Disabled(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::Network(message) => write!(f, "Network error: {message}"),
            IdentityError::Disabled(message) => write!(f, "Sign-in disabled: {message}"),
        }
    }
}

impl std::error::Error for IdentityError {}
