//! Directory error types.

use thiserror::Error;

/// Errors that prevent the directory from being opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The viewer is not signed in as an administrator.
    #[error("access denied: administrator privileges required")]
    AccessDenied,
}
