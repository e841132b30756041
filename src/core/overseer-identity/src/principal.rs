//! Principal type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{AppMetadata, IdentityProvider, UserMetadata};

/// An account as known to the identity provider.
///
/// Principals are created by the provider on registration. Overseer only
/// reads them, edits their [`UserMetadata`] through admin actions, and
/// deletes them on explicit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Provider-assigned unique identifier.
    pub id: String,

    /// Email address. Compare with [`Principal::email_matches`].
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,

    /// Registration timestamp.
    pub created_at: DateTime<Utc>,

    /// Last successful authentication, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,

    /// User-editable metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_metadata: UserMetadata,

    /// Provider-owned metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub app_metadata: AppMetadata,
}

impl Principal {
    /// Creates a principal with empty metadata.
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            created_at,
            last_sign_in_at: None,
            user_metadata: UserMetadata::default(),
            app_metadata: AppMetadata::default(),
        }
    }

    /// Sets the user metadata.
    pub fn with_metadata(mut self, metadata: UserMetadata) -> Self {
        self.user_metadata = metadata;
        self
    }

    /// Compares the email address case-insensitively.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Local part of the email address (before `@`).
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// Display name: the metadata name, else the email local part.
    pub fn display_name(&self) -> &str {
        match self.user_metadata.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email_local_part(),
        }
    }

    /// Login method this principal registered with.
    pub fn identity_provider(&self) -> IdentityProvider {
        self.app_metadata.identity_provider()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
