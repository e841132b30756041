//! Provider error types.

use thiserror::Error;

/// Errors reported by a session provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("no internet connection: {0}")]
    Offline(String),

    /// Wrong email or password.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// The caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The addressed user does not exist.
    #[error("user not found: {0}")]
    NotFound(String),

    /// The provider rejected the request.
    #[error("provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-like status code.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// The stored session expired and could not be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// The provider answered with something unreadable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Session persistence error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ProviderError {
    /// User-facing message for notifications.
    ///
    /// Rejections carry the provider's own message verbatim.
    pub fn message(&self) -> String {
        match self {
            Self::Offline(_) => "No internet connection".to_string(),
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns `true` for connectivity failures.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}
