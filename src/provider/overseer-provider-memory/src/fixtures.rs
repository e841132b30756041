//! Fixture accounts for local development.

use chrono::{DateTime, Duration, Utc};

use overseer_identity::{AdminPolicy, AppMetadata, Principal, UserMetadata, ROLE_ADMIN, ROLE_USER};

/// Password of every fixture account.
pub const FIXTURE_PASSWORD: &str = "overseer-dev";

/// The four fixture accounts: an admin, a regular user, a banned user and
/// the designated administrator.
pub(crate) fn fixture_principals(policy: &AdminPolicy, now: DateTime<Utc>) -> Vec<Principal> {
    vec![
        fixture("1", "admin@example.com", now, "Admin User", true, false),
        fixture("2", "user@example.com", now, "Regular User", false, false),
        fixture(
            "3",
            "banned@example.com",
            now - Duration::days(7),
            "Banned User",
            false,
            true,
        ),
        fixture(
            "4",
            policy.admin_email(),
            now - Duration::days(30),
            "Administrator",
            true,
            false,
        ),
    ]
}

fn fixture(
    id: &str,
    email: &str,
    created_at: DateTime<Utc>,
    name: &str,
    is_admin: bool,
    banned: bool,
) -> Principal {
    let mut principal = Principal::new(id, email, created_at).with_metadata(UserMetadata {
        name: Some(name.to_string()),
        is_admin: Some(is_admin),
        role: Some(if is_admin { ROLE_ADMIN } else { ROLE_USER }.to_string()),
        banned: banned.then_some(true),
        ..UserMetadata::default()
    });
    principal.app_metadata = AppMetadata {
        provider: Some("email".to_string()),
    };
    principal
}
