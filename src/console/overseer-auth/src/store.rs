//! Session store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use overseer_identity::{AdminPolicy, Principal, UserMetadata, ROLE_ADMIN, ROLE_USER};
use overseer_provider::{SessionEvent, SessionEventKind, SessionProvider, SignUp, Subscription};

use crate::{AuthError, SessionSnapshot};

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    /// Signed-in principal.
    pub principal: Principal,
    /// Whether the principal is an administrator.
    pub is_admin: bool,
    /// Greeting to show the user.
    pub greeting: &'static str,
}

/// State shared with the provider listener.
struct Shared {
    policy: AdminPolicy,
    sender: watch::Sender<Arc<SessionSnapshot>>,
    /// Bumped on every applied event.
    revision: AtomicU64,
}

impl Shared {
    fn apply(&self, event: &SessionEvent) {
        let session = match event.kind {
            SessionEventKind::SignedOut => None,
            SessionEventKind::SignedIn
            | SessionEventKind::TokenRefreshed
            | SessionEventKind::UserUpdated => event.session.clone(),
        };
        let snapshot = Arc::new(SessionSnapshot::settled(session, &self.policy));

        debug!(
            kind = ?event.kind,
            signed_in = snapshot.is_signed_in(),
            is_admin = snapshot.is_admin,
            "Session changed"
        );

        self.sender.send_modify(|current| {
            self.revision.fetch_add(1, Ordering::SeqCst);
            *current = snapshot;
        });
    }
}

/// Mirrors the provider's session into published snapshots.
///
/// Mount it with [`SessionStore::start`]. The provider subscription is
/// released by [`SessionStore::release`] or when the store is dropped.
pub struct SessionStore {
    provider: Arc<dyn SessionProvider>,
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionStore {
    /// Creates a store in the loading state.
    pub fn new(provider: Arc<dyn SessionProvider>, policy: AdminPolicy) -> Self {
        let (sender, _) = watch::channel(Arc::new(SessionSnapshot::loading()));
        Self {
            provider,
            shared: Arc::new(Shared {
                policy,
                sender,
                revision: AtomicU64::new(0),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to session changes, then performs the initial lookup.
    pub async fn start(&self) {
        self.subscribe_to_changes();
        self.initialize().await;
    }

    /// Looks up the current session once and publishes it.
    ///
    /// A lookup failure is logged and treated as "no session". If an event
    /// was applied while the lookup was in flight, its newer state is kept.
    pub async fn initialize(&self) {
        let revision = self.shared.revision.load(Ordering::SeqCst);

        let session = match self.provider.get_current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Session lookup failed");
                None
            },
        };
        let snapshot = Arc::new(SessionSnapshot::settled(session, &self.shared.policy));

        let applied = self.shared.sender.send_if_modified(|current| {
            if self.shared.revision.load(Ordering::SeqCst) != revision {
                return false;
            }
            *current = snapshot;
            true
        });

        if applied {
            let current = self.snapshot();
            info!(
                signed_in = current.is_signed_in(),
                is_admin = current.is_admin,
                "Session initialized"
            );
        } else {
            debug!("Session changed during lookup; keeping newer state");
        }
    }

    /// Registers the session-change listener.
    ///
    /// Calling it again while subscribed does nothing.
    pub fn subscribe_to_changes(&self) {
        let mut slot = self.subscription.lock();
        if slot.as_ref().is_some_and(Subscription::is_active) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let subscription = self
            .provider
            .on_session_change(Arc::new(move |event: &SessionEvent| shared.apply(event)));
        *slot = Some(subscription);
        debug!(provider = self.provider.name(), "Subscribed to session changes");
    }

    /// Releases the provider subscription. Further calls do nothing.
    pub fn release(&self) {
        if let Some(mut subscription) = self.subscription.lock().take() {
            if subscription.unsubscribe() {
                debug!("Released session subscription");
            }
        }
    }

    /// Returns `true` while the store is subscribed to the provider.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.shared.sender.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.shared.sender.subscribe()
    }

    /// Admin policy the store resolves against.
    pub fn policy(&self) -> &AdminPolicy {
        &self.shared.policy
    }

    /// Signs in with email and password.
    ///
    /// The published state follows from the provider's `SignedIn` event.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let session = self.provider.sign_in(&email, password).await?;
        let principal = session.user;
        if principal.id.is_empty() {
            return Err(AuthError::NoSession);
        }

        let is_admin = self.shared.policy.resolve_admin(&principal);
        let greeting = if is_admin {
            "Welcome back Administrator!"
        } else {
            "Welcome back!"
        };

        info!(user_id = %principal.id, is_admin, "Sign-in succeeded");
        Ok(SignInOutcome {
            principal,
            is_admin,
            greeting,
        })
    }

    /// Registers a new principal.
    ///
    /// `name` defaults to the local part of the email. The designated
    /// administrator is registered as admin, everyone else as user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Principal, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => email.split('@').next().unwrap_or_default().to_string(),
        };
        let is_admin = self.shared.policy.is_designated_admin(&email);

        let request = SignUp {
            email,
            password: password.to_string(),
            metadata: UserMetadata {
                name: Some(name),
                is_admin: Some(is_admin),
                role: Some(if is_admin { ROLE_ADMIN } else { ROLE_USER }.to_string()),
                ..UserMetadata::default()
            },
        };

        let principal = self.provider.sign_up(&request).await?;
        info!(user_id = %principal.id, is_admin, "Sign-up succeeded");
        Ok(principal)
    }

    /// Ends the current session.
    ///
    /// The published state is cleared by the provider's `SignedOut` event.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        Ok(())
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.release();
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
