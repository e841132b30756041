//! Integration tests for Overseer.
//!
//! These tests wire the session store and the directory view to a real
//! provider implementation, the way the console shell does.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::Arc;

use anyhow::{Context, Result};

use overseer_auth::SessionStore;
use overseer_directory::DirectoryView;
use overseer_identity::AdminPolicy;
use overseer_provider::{AdminApi, SessionProvider};
use overseer_provider_memory::MemoryProvider;

/// Designated administrator used by the tests.
pub const ADMIN_EMAIL: &str = "owner@example.com";

// ============================================================================
// Console Harness
// ============================================================================

/// A mounted console: one provider, one session store.
pub struct Console {
    /// Session side of the provider.
    pub session: Arc<dyn SessionProvider>,
    /// Admin side of the provider.
    pub admin: Arc<dyn AdminApi>,
    /// Mounted session store.
    pub store: SessionStore,
}

impl Console {
    /// Mounts a console on `provider`.
    pub async fn mount<P>(provider: Arc<P>, policy: AdminPolicy) -> Self
    where
        P: SessionProvider + AdminApi + 'static,
    {
        let session: Arc<dyn SessionProvider> = provider.clone();
        let admin: Arc<dyn AdminApi> = provider;
        let store = SessionStore::new(session.clone(), policy);
        store.start().await;
        Self {
            session,
            admin,
            store,
        }
    }

    /// Mounts a console on the in-memory provider with fixture accounts.
    pub async fn with_fixtures() -> Result<(Self, Arc<MemoryProvider>)> {
        let policy = AdminPolicy::new(ADMIN_EMAIL);
        let provider = Arc::new(
            MemoryProvider::with_fixtures(&policy).context("Failed to seed fixtures")?,
        );
        let console = Self::mount(provider.clone(), policy).await;
        Ok((console, provider))
    }

    /// Opens the directory as the current viewer and loads it.
    pub async fn directory(&self) -> Result<DirectoryView> {
        let view = DirectoryView::open(
            self.admin.clone(),
            self.store.policy().clone(),
            &self.store.snapshot(),
        )?;
        view.list_users().await;
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use overseer_directory::{AlwaysConfirm, DirectoryError, Level, MutationOutcome, SkipReason};
    use overseer_identity::{resolve_admin, Principal, UserMetadata};
    use overseer_provider::ProviderError;
    use overseer_provider_http::{FileSessionStorage, HttpProvider, ProviderConfig};
    use overseer_provider_memory::{Operation, FIXTURE_PASSWORD};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_listed_admin_scenario() {
        let policy = AdminPolicy::new(ADMIN_EMAIL);
        let provider = Arc::new(MemoryProvider::new());
        let metadata = |admin: bool| UserMetadata {
            is_admin: Some(admin),
            role: Some(if admin { "admin" } else { "user" }.to_string()),
            ..Default::default()
        };
        provider
            .insert_user(
                Principal::new("a", "admin@example.com", Default::default())
                    .with_metadata(metadata(true)),
                Some("admin-pass"),
            )
            .unwrap();
        provider
            .insert_user(
                Principal::new("b", "user@example.com", Default::default())
                    .with_metadata(metadata(false)),
                None,
            )
            .unwrap();

        let console = Console::mount(provider, policy).await;
        console.store.sign_in("admin@example.com", "admin-pass").await.unwrap();
        let view = console.directory().await.unwrap();

        let admins: Vec<String> = view
            .rows()
            .iter()
            .filter(|row| row.is_admin())
            .map(|row| row.email().to_string())
            .collect();
        assert_eq!(admins, vec!["admin@example.com"]);
    }

    #[test]
    fn test_designated_admin_wins_over_metadata() {
        let policy = AdminPolicy::new(ADMIN_EMAIL);
        let demoted = Principal::new("x", "Owner@Example.com", Default::default()).with_metadata(
            UserMetadata {
                is_admin: Some(false),
                role: Some("user".into()),
                ..Default::default()
            },
        );
        assert!(resolve_admin(&policy, &demoted));

        let bare = Principal::new("y", "x@y.com", Default::default());
        assert!(!resolve_admin(&policy, &bare));
    }

    #[tokio::test]
    async fn test_console_session_lifecycle() {
        let (console, provider) = Console::with_fixtures().await.unwrap();
        assert!(!console.store.snapshot().loading);
        assert!(console.store.snapshot().session.is_none());

        let outcome = console.store.sign_in(ADMIN_EMAIL, FIXTURE_PASSWORD).await.unwrap();
        assert_eq!(outcome.greeting, "Welcome back Administrator!");

        let view = console.directory().await.unwrap();
        assert_eq!(view.rows().len(), 4);

        assert!(view.toggle_admin("2", true).await.is_applied());
        assert!(view.ban_user("3", false).await.is_applied());
        assert!(view.delete_user("2", &AlwaysConfirm).await.is_applied());

        // The provider agrees with the reconciled rows.
        assert!(provider.user("2").is_none());
        assert!(!provider.user("3").unwrap().user_metadata.is_banned());
        let fresh = view.refresh().await;
        assert_eq!(fresh, view.rows());
        assert_eq!(fresh.len(), 3);

        console.store.sign_out().await.unwrap();
        let snapshot = console.store.snapshot();
        assert!(snapshot.session.is_none());
        assert!(!snapshot.is_admin);

        console.store.release();
        console.store.release();
        assert_eq!(provider.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_regular_user_cannot_open_directory() {
        let (console, _provider) = Console::with_fixtures().await.unwrap();
        console
            .store
            .sign_in("user@example.com", FIXTURE_PASSWORD)
            .await
            .unwrap();

        let err = console.directory().await.err().unwrap();
        assert_eq!(
            err.downcast_ref::<DirectoryError>(),
            Some(&DirectoryError::AccessDenied)
        );
    }

    #[tokio::test]
    async fn test_directory_network_error() {
        let (console, provider) = Console::with_fixtures().await.unwrap();
        console.store.sign_in(ADMIN_EMAIL, FIXTURE_PASSWORD).await.unwrap();

        provider.fail(
            Operation::ListUsers,
            ProviderError::Rejected {
                status: 503,
                message: "network error".into(),
            },
        );
        let view = console.directory().await.unwrap();

        assert!(view.rows().is_empty());
        let notifications = view.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, Level::Error);
        assert!(notifications[0].message.contains("network error"));
    }

    #[tokio::test]
    async fn test_self_demotion_reaches_session() {
        let (console, _provider) = Console::with_fixtures().await.unwrap();
        console
            .store
            .sign_in("admin@example.com", FIXTURE_PASSWORD)
            .await
            .unwrap();
        assert!(console.store.snapshot().is_admin);

        let view = console.directory().await.unwrap();
        assert!(view.toggle_admin("1", false).await.is_applied());

        // The provider pushed UserUpdated; the flag follows the new metadata.
        assert!(!console.store.snapshot().is_admin);
    }

    #[tokio::test]
    async fn test_deleting_own_account_signs_out() {
        let (console, _provider) = Console::with_fixtures().await.unwrap();
        console
            .store
            .sign_in("admin@example.com", FIXTURE_PASSWORD)
            .await
            .unwrap();

        let view = console.directory().await.unwrap();
        assert!(view.delete_user("1", &AlwaysConfirm).await.is_applied());
        assert_eq!(
            view.ban_user("1", true).await,
            MutationOutcome::Skipped(SkipReason::UnknownRow)
        );

        assert!(console.store.snapshot().session.is_none());
    }

    fn user_json(id: &str, email: &str, metadata: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "email": email,
            "created_at": "2024-02-01T12:00:00Z",
            "last_sign_in_at": null,
            "user_metadata": metadata,
            "app_metadata": { "provider": "github" },
        })
    }

    async fn mock_provider() -> MockServer {
        let server = MockServer::start().await;
        let owner = user_json("u-owner", ADMIN_EMAIL, json!({ "name": "Owner" }));

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token",
                "refresh_token": "refresh-token",
                "expires_in": 3600,
                "user": owner.clone(),
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/admin/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    owner,
                    user_json("u-2", "dev@example.com", json!({ "role": "admin" })),
                    user_json("u-3", "guest@example.com", json!(null)),
                ],
            })))
            .mount(&server)
            .await;

        server
    }

    fn http_provider(server: &MockServer, dir: &TempDir) -> Arc<HttpProvider> {
        let storage = Arc::new(FileSessionStorage::new(dir.path().join("session.json")));
        Arc::new(HttpProvider::new(ProviderConfig::new(server.uri(), "service-key"), storage).unwrap())
    }

    #[tokio::test]
    async fn test_http_console_flow() {
        let server = mock_provider().await;
        let dir = TempDir::new().unwrap();
        let policy = AdminPolicy::new(ADMIN_EMAIL);

        let console = Console::mount(http_provider(&server, &dir), policy.clone()).await;
        assert!(console.store.snapshot().session.is_none());

        let outcome = console.store.sign_in(ADMIN_EMAIL, "secret").await.unwrap();
        assert!(outcome.is_admin);

        let view = console.directory().await.unwrap();
        let rows = view.rows();
        let admins: Vec<&str> = rows.iter().filter(|r| r.is_admin()).map(|r| r.id()).collect();
        assert_eq!(admins, vec!["u-owner", "u-2"]);
        assert_eq!(rows[2].name(), "guest");
        assert_eq!(rows[2].provider().label(), "GitHub");

        // A second mount, as after a restart, resumes from the session file.
        let restarted = Console::mount(http_provider(&server, &dir), policy).await;
        let snapshot = restarted.store.snapshot();
        assert_eq!(snapshot.principal().unwrap().id, "u-owner");
        assert!(snapshot.is_admin);
    }
}
