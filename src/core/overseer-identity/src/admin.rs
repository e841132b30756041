//! Admin resolution.
//!
//! Decides whether a principal holds administrative privileges. The
//! decision is recomputed from the principal's email and metadata every
//! time it is needed; it is never stored.

use crate::{Principal, ROLE_ADMIN};

/// Admin resolution policy.
///
/// Holds the single designated administrator address. The address is
/// fixed at construction and compared ignoring ASCII case, like
/// [`Principal::email_matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicy {
    admin_email: String,
}

impl AdminPolicy {
    /// Creates a policy for the given administrator address.
    pub fn new(admin_email: impl AsRef<str>) -> Self {
        Self {
            admin_email: admin_email.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// The designated administrator address (ASCII lowercase).
    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Returns `true` if `email` is the designated administrator address.
    pub fn is_designated_admin(&self, email: &str) -> bool {
        !self.admin_email.is_empty() && email.trim().eq_ignore_ascii_case(&self.admin_email)
    }

    /// Resolves admin status. First match wins:
    ///
    /// 1. email is the designated administrator address
    /// 2. `isAdmin` metadata flag is `true`
    /// 3. `role` metadata is `"admin"`
    ///
    /// Absent metadata reads as `false`; this never fails.
    pub fn resolve_admin(&self, principal: &Principal) -> bool {
        if self.is_designated_admin(&principal.email) {
            return true;
        }

        let metadata = &principal.user_metadata;
        metadata.is_admin() || metadata.role() == ROLE_ADMIN
    }
}

/// Resolves admin status of `principal` under `policy`.
pub fn resolve_admin(policy: &AdminPolicy, principal: &Principal) -> bool {
    policy.resolve_admin(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserMetadata;
    use chrono::Utc;

    fn policy() -> AdminPolicy {
        AdminPolicy::new("Owner@Example.com")
    }

    fn principal(email: &str, is_admin: Option<bool>, role: Option<&str>) -> Principal {
        Principal::new("id", email, Utc::now()).with_metadata(UserMetadata {
            is_admin,
            role: role.map(str::to_string),
            ..UserMetadata::default()
        })
    }

    #[test]
    fn test_designated_email_wins_over_metadata() {
        let p = principal("OWNER@example.COM", Some(false), Some("user"));
        assert!(policy().resolve_admin(&p));
    }

    #[test]
    fn test_email_case_folding_is_ascii() {
        let policy = AdminPolicy::new("Ärger@Example.com");
        let same = Principal::new("id", "Ärger@EXAMPLE.com", Utc::now());
        assert!(policy.resolve_admin(&same));
        assert!(same.email_matches(policy.admin_email()));

        // Non-ASCII letters must match exactly, in both comparisons.
        let folded = Principal::new("id", "ärger@example.com", Utc::now());
        assert!(!policy.resolve_admin(&folded));
        assert!(!folded.email_matches(policy.admin_email()));
    }

    #[test]
    fn test_metadata_flags() {
        let policy = policy();
        let cases = [
            (Some(true), None, true),
            (None, Some("admin"), true),
            (Some(false), Some("admin"), true),
            (Some(true), Some("user"), true),
            (Some(false), Some("user"), false),
            (None, Some("Admin"), false),
            (None, None, false),
        ];

        for (is_admin, role, expected) in cases {
            let p = principal("someone@example.com", is_admin, role);
            assert_eq!(
                policy.resolve_admin(&p),
                expected,
                "isAdmin={is_admin:?} role={role:?}"
            );
        }
    }

    #[test]
    fn test_missing_metadata_resolves_false() {
        let p = Principal::new("id", "x@y.com", Utc::now());
        assert!(!resolve_admin(&policy(), &p));
    }

    #[test]
    fn test_empty_policy_matches_nobody() {
        let p = Principal::new("id", "", Utc::now());
        assert!(!AdminPolicy::new("").resolve_admin(&p));
    }

    #[test]
    fn test_listed_pair_scenario() {
        let policy = AdminPolicy::new("owner@example.com");
        let admin = principal("admin@example.com", Some(true), Some("admin"));
        let user = principal("user@example.com", Some(false), Some("user"));

        assert!(policy.resolve_admin(&admin));
        assert!(!policy.resolve_admin(&user));
    }
}
