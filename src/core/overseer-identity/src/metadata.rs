//! Principal metadata.
//!
//! The provider stores user metadata as a free-form JSON object. Overseer
//! reads four well-known keys from it and carries everything else through
//! untouched.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Role string of an administrator.
pub const ROLE_ADMIN: &str = "admin";

/// Role string of a regular user.
pub const ROLE_USER: &str = "user";

/// The user-editable metadata bag of a principal.
///
/// Every well-known field is optional. The accessors apply the defaults
/// (`isAdmin = false`, `role = "user"`, `banned = false`), so an absent
/// field and a false one read the same. Values of the wrong JSON type are
/// treated as absent rather than failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Display name.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub name: Option<String>,

    /// Explicit admin flag.
    #[serde(
        rename = "isAdmin",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_bool"
    )]
    pub is_admin: Option<bool>,

    /// Role string (`"admin"` or `"user"`).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub role: Option<String>,

    /// Banned flag.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_bool"
    )]
    pub banned: Option<bool>,

    /// Keys Overseer does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserMetadata {
    /// Returns the explicit admin flag, defaulting to `false`.
    pub fn is_admin(&self) -> bool {
        self.is_admin.unwrap_or(false)
    }

    /// Returns the role, defaulting to `"user"`.
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(ROLE_USER)
    }

    /// Returns the banned flag, defaulting to `false`.
    pub fn is_banned(&self) -> bool {
        self.banned.unwrap_or(false)
    }

    /// Applies the fields set on `patch`, leaving every other field as is.
    pub fn merge(&mut self, patch: &MetadataPatch) {
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = Some(is_admin);
        }
        if let Some(role) = &patch.role {
            self.role = Some(role.clone());
        }
        if let Some(banned) = patch.banned {
            self.banned = Some(banned);
        }
    }

    /// Returns a copy with `patch` applied.
    pub fn merged(&self, patch: &MetadataPatch) -> Self {
        let mut merged = self.clone();
        merged.merge(patch);
        merged
    }
}

/// A partial metadata update sent to the provider.
///
/// Only fields that are `Some` are serialized, and the provider merges them
/// into the stored metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// New admin flag.
    #[serde(rename = "isAdmin", default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,

    /// New role string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// New banned flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned: Option<bool>,
}

impl MetadataPatch {
    /// Patch that sets only the banned flag.
    pub fn ban(banned: bool) -> Self {
        Self {
            banned: Some(banned),
            ..Self::default()
        }
    }

    /// Patch that grants or revokes admin status.
    ///
    /// `role` always mirrors `isAdmin`: `"admin"` when granting, `"user"`
    /// when revoking.
    pub fn admin(make_admin: bool) -> Self {
        let role = if make_admin { ROLE_ADMIN } else { ROLE_USER };
        Self {
            is_admin: Some(make_admin),
            role: Some(role.to_string()),
            ..Self::default()
        }
    }

    /// Returns `true` if the patch sets no field.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_admin.is_none() && self.role.is_none() && self.banned.is_none()
    }
}

/// Provider-owned metadata (not editable by admin actions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Login method tag, e.g. `"google"` or `"email"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl AppMetadata {
    /// Classifies the login method tag.
    pub fn identity_provider(&self) -> IdentityProvider {
        IdentityProvider::from_tag(self.provider.as_deref())
    }
}

/// External login method a principal signed up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityProvider {
    /// Google OAuth.
    Google,
    /// GitHub OAuth.
    GitHub,
    /// Facebook OAuth.
    Facebook,
    /// Twitter OAuth.
    Twitter,
    /// Email and password (also the fallback for unknown tags).
    Email,
}

impl IdentityProvider {
    /// Classifies a provider tag case-insensitively.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::to_ascii_lowercase).as_deref() {
            Some("google") => Self::Google,
            Some("github") => Self::GitHub,
            Some("facebook") => Self::Facebook,
            Some("twitter") => Self::Twitter,
            _ => Self::Email,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::GitHub => "GitHub",
            Self::Facebook => "Facebook",
            Self::Twitter => "Twitter",
            Self::Email => "Email",
        }
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}
