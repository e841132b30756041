//! Session-change events and listener bookkeeping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use overseer_identity::Session;

/// Kind of session change pushed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    /// A principal signed in.
    SignedIn,
    /// The session was terminated.
    SignedOut,
    /// The access token was refreshed.
    TokenRefreshed,
    /// The signed-in principal's record changed.
    UserUpdated,
}

/// A session change pushed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// What happened.
    pub kind: SessionEventKind,
    /// The session after the change (`None` after sign-out).
    pub session: Option<Session>,
}

impl SessionEvent {
    /// A `SignedIn` event.
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: SessionEventKind::SignedIn,
            session: Some(session),
        }
    }

    /// A `SignedOut` event.
    pub fn signed_out() -> Self {
        Self {
            kind: SessionEventKind::SignedOut,
            session: None,
        }
    }

    /// A `TokenRefreshed` event.
    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: SessionEventKind::TokenRefreshed,
            session: Some(session),
        }
    }

    /// A `UserUpdated` event.
    pub fn user_updated(session: Session) -> Self {
        Self {
            kind: SessionEventKind::UserUpdated,
            session: Some(session),
        }
    }
}

/// Callback invoked for every session change.
pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct RegistryInner {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, SessionListener>>,
}

/// Listener set shared by provider implementations.
///
/// Listeners are called in registration order, outside the internal lock,
/// so a listener may itself subscribe or unsubscribe.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Registers a listener and returns the handle that releases it.
    pub fn register(&self, listener: SessionListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, listener);
        debug!(listener_id = id, "Session listener registered");

        Subscription {
            id,
            registry: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Delivers `event` to every registered listener.
    pub fn emit(&self, event: &SessionEvent) {
        let listeners: Vec<SessionListener> =
            self.inner.listeners.lock().values().cloned().collect();

        trace!(kind = ?event.kind, listeners = listeners.len(), "Emitting session event");

        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle to a registered session listener.
///
/// Releasing is idempotent, and dropping the handle releases it. The handle
/// only holds a weak reference, so it never keeps a provider alive.
#[must_use = "dropping a Subscription releases the listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Option<Weak<RegistryInner>>,
}

impl Subscription {
    /// Releases the listener.
    ///
    /// Returns `true` if this call removed it, `false` if it was already
    /// released or the provider is gone.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(registry) = self.registry.take() else {
            return false;
        };

        match registry.upgrade() {
            Some(inner) => {
                let removed = inner.listeners.lock().remove(&self.id).is_some();
                if removed {
                    debug!(listener_id = self.id, "Session listener released");
                }
                removed
            },
            None => false,
        }
    }

    /// Returns `true` until the subscription is released.
    pub fn is_active(&self) -> bool {
        self.registry
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|inner| inner.listeners.lock().contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> SessionListener {
        let counter = Arc::clone(counter);
        Arc::new(move |_event: &SessionEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_listeners() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let _a = registry.register(counting_listener(&counter));
        let _b = registry.register(counting_listener(&counter));

        registry.emit(&SessionEvent::signed_out());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut sub = registry.register(counting_listener(&counter));
        assert!(sub.is_active());
        assert_eq!(registry.len(), 1);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());
        assert!(registry.is_empty());

        registry.emit(&SessionEvent::signed_out());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_releases_listener() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let _sub = registry.register(counting_listener(&counter));
            assert_eq!(registry.len(), 1);
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut sub = registry.register(counting_listener(&counter));

        drop(registry);
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_listener_may_unsubscribe_during_emit() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_clone = Arc::clone(&slot);
        let sub = registry.register(Arc::new(move |_event: &SessionEvent| {
            if let Some(mut sub) = slot_clone.lock().take() {
                sub.unsubscribe();
            }
        }));
        *slot.lock() = Some(sub);

        registry.emit(&SessionEvent::signed_out());
        assert!(registry.is_empty());
    }
}
