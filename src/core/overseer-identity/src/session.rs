//! Session type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Principal;

/// A live authentication context binding a [`Principal`] to a token.
///
/// Sessions are owned by the provider. Overseer only ever holds a cached
/// copy, which may be stale until the next session-change event arrives.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for provider calls made on behalf of the principal.
    pub access_token: String,

    /// Token used to obtain a new access token.
    #[serde(default)]
    pub refresh_token: String,

    /// Expiration timestamp (Unix seconds), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// The signed-in principal.
    pub user: Principal,
}

impl Session {
    /// Returns `true` if the session expires within `leeway_secs` of `now`.
    ///
    /// A session without a known expiration never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now.timestamp() + leeway_secs,
            None => false,
        }
    }

    /// Returns `true` if the session has expired (no leeway).
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now(), 0)
    }

    /// The signed-in principal.
    pub fn principal(&self) -> &Principal {
        &self.user
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user.id)
            .finish()
    }
}
