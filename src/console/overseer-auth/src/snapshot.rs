//! Published session state.

use overseer_identity::{resolve_admin, AdminPolicy, Principal, Session};

/// Session state at one point in time.
///
/// Snapshots are never mutated after being published; every change
/// publishes a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Current session, if signed in.
    pub session: Option<Session>,
    /// Whether the signed-in principal is an administrator.
    pub is_admin: bool,
    /// `true` until the first session lookup has completed.
    pub loading: bool,
}

impl SessionSnapshot {
    /// State before the first lookup.
    pub fn loading() -> Self {
        Self {
            session: None,
            is_admin: false,
            loading: true,
        }
    }

    /// Settled state for `session`, with the admin flag resolved against
    /// `policy`.
    pub fn settled(session: Option<Session>, policy: &AdminPolicy) -> Self {
        let is_admin = session
            .as_ref()
            .is_some_and(|s| resolve_admin(policy, s.principal()));
        Self {
            session,
            is_admin,
            loading: false,
        }
    }

    /// Signed-in principal.
    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(Session::principal)
    }

    /// Returns `true` when a session is present.
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}
