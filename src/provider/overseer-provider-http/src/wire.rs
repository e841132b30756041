//! Request and response bodies of the provider's REST API.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use overseer_identity::{MetadataPatch, Principal, Session, UserMetadata};
use overseer_provider::ProviderError;

use crate::claims;

#[derive(Serialize)]
pub(crate) struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub(crate) struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: &'a UserMetadata,
}

#[derive(Serialize)]
pub(crate) struct UpdateUserRequest<'a> {
    pub user_metadata: &'a MetadataPatch,
}

/// Body of a successful token grant.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Principal,
}

impl TokenResponse {
    /// Converts the grant into a session.
    ///
    /// The expiration comes from `expires_at`, else `expires_in`, else the
    /// access token's `exp` claim.
    pub fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs))
            .or_else(|| claims::unverified_expiry(&self.access_token));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Body of a sign-up: a session when the provider auto-confirms, else the
/// bare user.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpResponse {
    WithSession { user: Principal },
    User(Principal),
}

impl SignUpResponse {
    pub fn into_principal(self) -> Principal {
        match self {
            Self::WithSession { user } | Self::User(user) => user,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct UserListResponse {
    #[serde(default)]
    pub users: Vec<Principal>,
}

/// Error body. Providers disagree on the field name.
#[derive(Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Extracts the human-readable message from an error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

/// Message the provider gives a password grant with a wrong email or password.
const INVALID_CREDENTIALS: &str = "Invalid login credentials";

/// Returns `true` if a rejected password grant means wrong credentials, as
/// opposed to e.g. an unconfirmed email.
pub(crate) fn is_invalid_credentials(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case(INVALID_CREDENTIALS)
}

/// Maps a non-success status and body to a provider error.
pub(crate) fn status_error(status: u16, body: &str) -> ProviderError {
    let message = error_message(body).unwrap_or_else(|| format!("request failed with status {status}"));

    match status {
        401 | 403 => ProviderError::Unauthorized(message),
        404 => ProviderError::NotFound(message),
        _ => ProviderError::Rejected { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_json() -> serde_json::Value {
        json!({
            "id": "u1",
            "email": "a@example.com",
            "created_at": "2024-01-01T00:00:00Z",
        })
    }

    #[test]
    fn test_error_message_field_precedence() {
        assert_eq!(
            error_message(r#"{"msg":"first","message":"third"}"#).as_deref(),
            Some("first")
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(401, r#"{"msg":"invalid JWT"}"#),
            ProviderError::Unauthorized(m) if m == "invalid JWT"
        ));
        assert!(matches!(status_error(404, ""), ProviderError::NotFound(_)));
        assert!(matches!(
            status_error(500, ""),
            ProviderError::Rejected { status: 500, message } if message == "request failed with status 500"
        ));
    }

    #[test]
    fn test_token_response_expiry_from_expires_in() {
        let body = json!({
            "access_token": "not-a-jwt",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": user_json(),
        });
        let session = serde_json::from_value::<TokenResponse>(body)
            .unwrap()
            .into_session();

        let expires_at = session.expires_at.unwrap();
        assert!(expires_at > Utc::now().timestamp() + 3500);
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let bare: SignUpResponse = serde_json::from_value(user_json()).unwrap();
        assert_eq!(bare.into_principal().id, "u1");

        let wrapped: SignUpResponse = serde_json::from_value(json!({
            "access_token": "t",
            "user": user_json(),
        }))
        .unwrap();
        assert_eq!(wrapped.into_principal().id, "u1");
    }
}
