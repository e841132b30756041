//! Session store error types.

use thiserror::Error;

use overseer_provider::ProviderError;

/// Errors returned by [`SessionStore`](crate::SessionStore) operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected before reaching the provider.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider accepted the request but returned no principal.
    #[error("no session returned by provider")]
    NoSession,

    /// Provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AuthError {
    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            Self::Provider(e) => e.message(),
            other => other.to_string(),
        }
    }
}
