//! # Overseer Provider - In-Memory Backend
//!
//! A stand-in for the identity provider, used for local development and
//! tests. It keeps accounts and the current session in memory, pushes the
//! same session events a remote provider would, and can be told to fail
//! individual operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;
mod password;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use overseer_identity::{AdminPolicy, AppMetadata, MetadataPatch, Principal, Session};
use overseer_provider::{
    AdminApi, ListenerRegistry, ProviderError, SessionEvent, SessionListener, SessionProvider,
    SignUp, Subscription,
};

pub use fixtures::FIXTURE_PASSWORD;

/// Lifetime of sessions issued by the in-memory provider.
const SESSION_TTL_SECS: i64 = 3600;

/// Minimum password length accepted on sign-up.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Provider operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`SessionProvider::get_current_session`].
    GetSession,
    /// [`SessionProvider::sign_in`].
    SignIn,
    /// [`SessionProvider::sign_up`].
    SignUp,
    /// [`SessionProvider::sign_out`].
    SignOut,
    /// [`AdminApi::list_users`].
    ListUsers,
    /// [`AdminApi::update_user`].
    UpdateUser,
    /// [`AdminApi::delete_user`].
    DeleteUser,
}

struct Account {
    principal: Principal,
    password_hash: Option<String>,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    session: Option<Session>,
}

/// In-memory identity provider.
pub struct MemoryProvider {
    state: RwLock<State>,
    listeners: ListenerRegistry,
    failures: Mutex<HashMap<Operation, ProviderError>>,
}

impl MemoryProvider {
    /// Creates a provider with no accounts.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            listeners: ListenerRegistry::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a provider seeded with the fixture accounts.
    ///
    /// Every fixture account signs in with [`FIXTURE_PASSWORD`].
    pub fn with_fixtures(policy: &AdminPolicy) -> Result<Self, ProviderError> {
        let provider = Self::new();
        let hash = password::hash_password(FIXTURE_PASSWORD)?;

        {
            let mut state = provider.state.write();
            for principal in fixtures::fixture_principals(policy, Utc::now()) {
                state.accounts.push(Account {
                    principal,
                    password_hash: Some(hash.clone()),
                });
            }
        }

        info!(accounts = provider.user_count(), "In-memory provider seeded with fixtures");
        Ok(provider)
    }

    /// Adds an account. Without a password the account cannot sign in.
    pub fn insert_user(
        &self,
        principal: Principal,
        password: Option<&str>,
    ) -> Result<(), ProviderError> {
        let password_hash = password.map(password::hash_password).transpose()?;

        let mut state = self.state.write();
        state.accounts.retain(|a| a.principal.id != principal.id);
        state.accounts.push(Account {
            principal,
            password_hash,
        });
        Ok(())
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail(&self, operation: Operation, error: ProviderError) {
        self.failures.lock().insert(operation, error);
    }

    /// Returns a copy of account `id`.
    pub fn user(&self, id: &str) -> Option<Principal> {
        self.state
            .read()
            .accounts
            .iter()
            .find(|a| a.principal.id == id)
            .map(|a| a.principal.clone())
    }

    /// Number of accounts.
    pub fn user_count(&self) -> usize {
        self.state.read().accounts.len()
    }

    /// Number of registered session listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn take_failure(&self, operation: Operation) -> Result<(), ProviderError> {
        match self.failures.lock().remove(&operation) {
            Some(error) => {
                debug!(?operation, %error, "Injected failure");
                Err(error)
            },
            None => Ok(()),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for MemoryProvider {
    async fn get_current_session(&self) -> Result<Option<Session>, ProviderError> {
        self.take_failure(Operation::GetSession)?;

        let mut state = self.state.write();
        if state.session.as_ref().is_some_and(Session::is_expired) {
            debug!("Discarding expired in-memory session");
            state.session = None;
        }
        Ok(state.session.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        self.take_failure(Operation::SignIn)?;

        let session = {
            let mut state = self.state.write();
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.principal.email_matches(email))
                .ok_or(ProviderError::InvalidCredentials)?;

            let valid = account
                .password_hash
                .as_deref()
                .is_some_and(|hash| password::verify_password(password, hash));
            if !valid {
                return Err(ProviderError::InvalidCredentials);
            }

            let now = Utc::now();
            account.principal.last_sign_in_at = Some(now);

            let session = Session {
                access_token: password::generate_token(32),
                refresh_token: password::generate_token(16),
                expires_at: Some((now + Duration::seconds(SESSION_TTL_SECS)).timestamp()),
                user: account.principal.clone(),
            };
            state.session = Some(session.clone());
            session
        };

        info!(user_id = %session.user.id, "Signed in");
        self.listeners.emit(&SessionEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUp) -> Result<Principal, ProviderError> {
        self.take_failure(Operation::SignUp)?;

        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::Rejected {
                status: 422,
                message: format!("Password should be at least {MIN_PASSWORD_LENGTH} characters"),
            });
        }

        let exists = self
            .state
            .read()
            .accounts
            .iter()
            .any(|a| a.principal.email_matches(&request.email));
        if exists {
            return Err(ProviderError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let mut principal = Principal::new(password::generate_token(16), &request.email, Utc::now())
            .with_metadata(request.metadata.clone());
        principal.app_metadata = AppMetadata {
            provider: Some("email".to_string()),
        };

        self.insert_user(principal.clone(), Some(&request.password))?;
        info!(user_id = %principal.id, "Registered user");
        Ok(principal)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.take_failure(Operation::SignOut)?;

        self.state.write().session = None;
        info!("Signed out");
        self.listeners.emit(&SessionEvent::signed_out());
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.listeners.register(listener)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl AdminApi for MemoryProvider {
    async fn list_users(&self) -> Result<Vec<Principal>, ProviderError> {
        self.take_failure(Operation::ListUsers)?;

        Ok(self
            .state
            .read()
            .accounts
            .iter()
            .map(|a| a.principal.clone())
            .collect())
    }

    async fn update_user(&self, id: &str, patch: &MetadataPatch) -> Result<(), ProviderError> {
        self.take_failure(Operation::UpdateUser)?;

        let updated_session = {
            let mut state = self.state.write();
            let account = state
                .accounts
                .iter_mut()
                .find(|a| a.principal.id == id)
                .ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
            account.principal.user_metadata.merge(patch);
            let principal = account.principal.clone();

            match state.session.as_mut() {
                Some(session) if session.user.id == id => {
                    session.user = principal;
                    Some(session.clone())
                },
                _ => None,
            }
        };

        debug!(user_id = %id, ?patch, "Updated user metadata");
        if let Some(session) = updated_session {
            self.listeners.emit(&SessionEvent::user_updated(session));
        }
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<(), ProviderError> {
        self.take_failure(Operation::DeleteUser)?;

        let ended_session = {
            let mut state = self.state.write();
            let before = state.accounts.len();
            state.accounts.retain(|a| a.principal.id != id);
            if state.accounts.len() == before {
                return Err(ProviderError::NotFound(id.to_string()));
            }

            let owned = state.session.as_ref().is_some_and(|s| s.user.id == id);
            if owned {
                state.session = None;
            }
            owned
        };

        info!(user_id = %id, "Deleted user");
        if ended_session {
            self.listeners.emit(&SessionEvent::signed_out());
        }
        Ok(())
    }
}
