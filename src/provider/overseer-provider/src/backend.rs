//! Provider trait definitions.

use async_trait::async_trait;

use overseer_identity::{MetadataPatch, Principal, Session, UserMetadata};

use crate::{ProviderError, SessionListener, Subscription};

/// Registration request.
#[derive(Debug, Clone)]
pub struct SignUp {
    /// Email address (already normalized by the caller).
    pub email: String,
    /// Plain-text password, sent to the provider only.
    pub password: String,
    /// Initial user metadata.
    pub metadata: UserMetadata,
}

/// Session side of the identity provider.
///
/// Implementations never keep authoritative state on the Overseer side:
/// the provider is the source of truth and pushes changes through
/// [`SessionProvider::on_session_change`].
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the current session, if any.
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Signs in with email and password.
    ///
    /// On success a `SignedIn` event is pushed to every listener.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError>;

    /// Registers a new principal.
    async fn sign_up(&self, request: &SignUp) -> Result<Principal, ProviderError>;

    /// Ends the current session.
    ///
    /// On success a `SignedOut` event is pushed to every listener.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Registers a session-change listener.
    ///
    /// The listener stays registered until the returned [`Subscription`]
    /// is released or dropped.
    fn on_session_change(&self, listener: SessionListener) -> Subscription;

    /// Returns the name of this provider for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Admin-privileged user directory of the identity provider.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Lists every principal, in provider order.
    async fn list_users(&self) -> Result<Vec<Principal>, ProviderError>;

    /// Merges `patch` into the user metadata of principal `id`.
    async fn update_user(&self, id: &str, patch: &MetadataPatch) -> Result<(), ProviderError>;

    /// Deletes principal `id`.
    async fn delete_user(&self, id: &str) -> Result<(), ProviderError>;
}
