//! # Overseer Provider - HTTP Backend
//!
//! Client for GoTrue-compatible identity providers (the auth service behind
//! Supabase and similar platforms).
//!
//! All calls go to `{url}/auth/v1`. The signed-in session is kept in a
//! [`SessionStorage`] and refreshed when it is about to expire.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod storage;
mod wire;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use overseer_identity::{MetadataPatch, Principal, Session};
use overseer_provider::{
    AdminApi, ListenerRegistry, ProviderError, SessionEvent, SessionListener, SessionProvider,
    SignUp, Subscription,
};

pub use claims::{AccessClaims, TokenVerifier};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};

/// Sessions expiring within this many seconds are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Page size used when listing users.
const USERS_PER_PAGE: usize = 200;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Provider endpoint, e.g. `https://project.supabase.co`.
    pub url: String,
    /// API key sent with every request. Admin calls need a service key.
    pub api_key: String,
    /// JWT secret used to verify stored access tokens (optional).
    pub jwt_secret: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Creates a configuration with the default timeout and no JWT secret.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            jwt_secret: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the JWT secret.
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Checks that the endpoint and key are present.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.url.trim().is_empty() {
            return Err(ProviderError::Configuration("provider URL is empty".into()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ProviderError::Configuration(format!(
                "provider URL must start with http:// or https://: {}",
                self.url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration("provider API key is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Identity provider reached over HTTP.
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
    verifier: Option<TokenVerifier>,
    storage: Arc<dyn SessionStorage>,
    listeners: ListenerRegistry,
}

impl HttpProvider {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn new(
        config: ProviderConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to create HTTP client: {e}")))?;

        let base_url = format!("{}/auth/v1", config.url.trim_end_matches('/'));
        debug!(url = %base_url, "HTTP provider configured");

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            verifier: config.jwt_secret.as_deref().map(TokenVerifier::new),
            storage,
            listeners: ListenerRegistry::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of user `id` under the admin API. The id is a single
    /// percent-encoded path segment.
    fn user_url(&self, id: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.url("/admin/users"))
            .map_err(|e| ProviderError::Configuration(format!("invalid provider URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Configuration("provider URL cannot be a base".into()))?
            .push(id);
        Ok(url)
    }

    /// Request authenticated with the API key only.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.keyed(self.client.request(method, self.url(path)))
    }

    fn keyed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Request made on behalf of a signed-in principal.
    fn session_request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ProviderError::Offline(e.to_string())
            } else {
                ProviderError::InvalidResponse(e.to_string())
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(wire::status_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        let request = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&wire::RefreshGrant { refresh_token });

        let response: wire::TokenResponse = self.send_json(request).await?;
        Ok(response.into_session())
    }

    /// Merges `patch` into the stored session when it belongs to user `id`.
    async fn sync_own_session(&self, id: &str, patch: &MetadataPatch) -> Result<(), ProviderError> {
        let Some(mut session) = self.storage.load().await? else {
            return Ok(());
        };
        if session.user.id != id {
            return Ok(());
        }

        session.user.user_metadata.merge(patch);
        self.storage.save(&session).await?;
        self.listeners.emit(&SessionEvent::user_updated(session));
        Ok(())
    }

    /// Drops the stored session and tells listeners.
    async fn end_session(&self) -> Result<(), ProviderError> {
        self.storage.clear().await?;
        self.listeners.emit(&SessionEvent::signed_out());
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for HttpProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(session) = self.storage.load().await? else {
            return Ok(None);
        };

        let mut expired = session.is_expired_at(Utc::now(), EXPIRY_MARGIN_SECS);

        if let Some(verifier) = &self.verifier {
            match verifier.verify(&session.access_token) {
                Ok(claims) if claims.sub == session.user.id => {},
                Ok(_) => {
                    warn!(user_id = %session.user.id, "Stored token belongs to another user");
                    self.end_session().await?;
                    return Ok(None);
                },
                Err(ProviderError::SessionExpired) => expired = true,
                Err(e) => {
                    warn!(error = %e, "Discarding stored session");
                    self.end_session().await?;
                    return Ok(None);
                },
            }
        }

        if !expired {
            return Ok(Some(session));
        }

        debug!(user_id = %session.user.id, "Refreshing expired session");
        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.storage.save(&refreshed).await?;
                info!(user_id = %refreshed.user.id, "Session refreshed");
                self.listeners.emit(&SessionEvent::token_refreshed(refreshed.clone()));
                Ok(Some(refreshed))
            },
            Err(e) if e.is_offline() => Err(e),
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                self.end_session().await?;
                Err(ProviderError::SessionExpired)
            },
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let request = self
            .request(Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(&wire::PasswordGrant { email, password });

        let response: wire::TokenResponse = match self.send_json(request).await {
            Ok(response) => response,
            Err(ProviderError::Rejected { status: 400, message })
                if wire::is_invalid_credentials(&message) =>
            {
                return Err(ProviderError::InvalidCredentials)
            },
            Err(e) => return Err(e),
        };

        let session = response.into_session();
        self.storage.save(&session).await?;

        info!(user_id = %session.user.id, "Signed in");
        self.listeners.emit(&SessionEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUp) -> Result<Principal, ProviderError> {
        let body = wire::SignUpRequest {
            email: &request.email,
            password: &request.password,
            data: &request.metadata,
        };

        let response: wire::SignUpResponse = self
            .send_json(self.request(Method::POST, "/signup").json(&body))
            .await?;

        let principal = response.into_principal();
        info!(user_id = %principal.id, "Registered user");
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        if let Some(session) = self.storage.load().await? {
            let request = self.session_request(Method::POST, "/logout", &session.access_token);
            match self.send(request).await {
                Ok(_) => {},
                // The provider already forgot the session.
                Err(ProviderError::Unauthorized(_) | ProviderError::NotFound(_)) => {
                    debug!("Provider session already gone");
                },
                Err(e) => return Err(e),
            }
        }

        self.end_session().await?;
        info!("Signed out");
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.listeners.register(listener)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[async_trait]
impl AdminApi for HttpProvider {
    async fn list_users(&self) -> Result<Vec<Principal>, ProviderError> {
        let mut users = Vec::new();
        let mut page = 1usize;

        loop {
            let request = self
                .request(Method::GET, "/admin/users")
                .query(&[("page", page), ("per_page", USERS_PER_PAGE)]);
            let batch: wire::UserListResponse = self.send_json(request).await?;

            let fetched = batch.users.len();
            users.extend(batch.users);
            if fetched < USERS_PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(count = users.len(), "Listed users");
        Ok(users)
    }

    async fn update_user(&self, id: &str, patch: &MetadataPatch) -> Result<(), ProviderError> {
        let request = self
            .keyed(self.client.request(Method::PUT, self.user_url(id)?))
            .json(&wire::UpdateUserRequest {
                user_metadata: patch,
            });
        self.send(request).await?;
        debug!(user_id = %id, ?patch, "Updated user metadata");

        // The provider already holds the change; a local sync failure is not
        // the caller's failure.
        if let Err(e) = self.sync_own_session(id, patch).await {
            warn!(user_id = %id, error = %e, "Failed to update stored session");
        }

        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<(), ProviderError> {
        self.send(self.keyed(self.client.request(Method::DELETE, self.user_url(id)?)))
            .await?;
        info!(user_id = %id, "Deleted user");
        Ok(())
    }
}
