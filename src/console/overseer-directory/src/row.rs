//! Directory rows.

use std::fmt;

use chrono::{DateTime, Utc};

use overseer_identity::{resolve_admin, AdminPolicy, IdentityProvider, MetadataPatch, Principal};

/// Format of the JOINED and LAST SIGN IN cells, e.g. `Mar 7, 2024, 09:15 AM`.
const DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

/// Listing projection of a principal.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRow {
    principal: Principal,
    is_admin: bool,
}

/// Column of the directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Avatar, name and email.
    User,
    /// Active or Banned.
    Status,
    /// Admin or User.
    Role,
    /// Login method.
    Provider,
    /// Registration date.
    Joined,
    /// Last sign-in date.
    LastSignIn,
    /// Row actions.
    Actions,
}

impl Column {
    /// Table header.
    pub fn header(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Status => "STATUS",
            Self::Role => "ROLE",
            Self::Provider => "PROVIDER",
            Self::Joined => "JOINED",
            Self::LastSignIn => "LAST SIGN IN",
            Self::Actions => "ACTIONS",
        }
    }
}

/// Mutation offered on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Grant admin status.
    MakeAdmin,
    /// Revoke admin status.
    RemoveAdmin,
    /// Ban the user.
    Ban,
    /// Lift the ban.
    Unban,
    /// Delete the user.
    Delete,
}

impl Action {
    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MakeAdmin => "Make Admin",
            Self::RemoveAdmin => "Remove Admin",
            Self::Ban => "Ban",
            Self::Unban => "Unban",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl DirectoryRow {
    /// Projects `principal`, resolving its admin flag against `policy`.
    pub fn new(principal: Principal, policy: &AdminPolicy) -> Self {
        let is_admin = resolve_admin(policy, &principal);
        Self {
            principal,
            is_admin,
        }
    }

    /// Columns visible to the viewer.
    pub fn columns(viewer_is_admin: bool) -> Vec<Column> {
        let mut columns = vec![Column::User, Column::Status, Column::Role];
        if viewer_is_admin {
            columns.push(Column::Provider);
        }
        columns.push(Column::Joined);
        if viewer_is_admin {
            columns.push(Column::LastSignIn);
        }
        columns.push(Column::Actions);
        columns
    }

    /// Merges a successful mutation into the row.
    pub(crate) fn apply(&mut self, patch: &MetadataPatch, policy: &AdminPolicy) {
        self.principal.user_metadata.merge(patch);
        self.is_admin = resolve_admin(policy, &self.principal);
    }

    /// Principal id.
    pub fn id(&self) -> &str {
        &self.principal.id
    }

    /// Email address.
    pub fn email(&self) -> &str {
        &self.principal.email
    }

    /// Metadata name, else the email local part.
    pub fn name(&self) -> &str {
        self.principal.display_name()
    }

    /// Up to two uppercase initials of the display name or email.
    pub fn initials(&self) -> String {
        let source = self
            .principal
            .user_metadata
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(self.principal.email.as_str());

        source
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .take(2)
            .collect()
    }

    /// Derived admin flag.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Banned flag.
    pub fn is_banned(&self) -> bool {
        self.principal.user_metadata.is_banned()
    }

    /// Login method.
    pub fn provider(&self) -> IdentityProvider {
        self.principal.identity_provider()
    }

    /// Registration timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.principal.created_at
    }

    /// Last sign-in timestamp.
    pub fn last_sign_in_at(&self) -> Option<DateTime<Utc>> {
        self.principal.last_sign_in_at
    }

    /// Underlying principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Actions offered for this row.
    pub fn actions(&self) -> Vec<Action> {
        vec![
            if self.is_admin {
                Action::RemoveAdmin
            } else {
                Action::MakeAdmin
            },
            if self.is_banned() {
                Action::Unban
            } else {
                Action::Ban
            },
            Action::Delete,
        ]
    }

    /// Text of a cell. The ACTIONS cell lists the action labels.
    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::User => format!("{} <{}>", self.name(), self.email()),
            Column::Status => String::from(if self.is_banned() { "Banned" } else { "Active" }),
            Column::Role => String::from(if self.is_admin { "Admin" } else { "User" }),
            Column::Provider => self.provider().label().to_string(),
            Column::Joined => format_date(self.created_at()),
            Column::LastSignIn => self
                .last_sign_in_at()
                .map(format_date)
                .unwrap_or_else(|| "Never".to_string()),
            Column::Actions => self
                .actions()
                .iter()
                .map(Action::label)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use overseer_identity::{AppMetadata, UserMetadata};

    fn policy() -> AdminPolicy {
        AdminPolicy::new("root@example.com")
    }

    fn principal(email: &str, metadata: UserMetadata) -> Principal {
        let created = Utc.with_ymd_and_hms(2024, 3, 7, 9, 15, 0).unwrap();
        Principal::new("u1", email, created).with_metadata(metadata)
    }

    #[test]
    fn test_columns_gated_for_non_admins() {
        let headers = |admin| {
            DirectoryRow::columns(admin)
                .iter()
                .map(Column::header)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            headers(true),
            vec!["USER", "STATUS", "ROLE", "PROVIDER", "JOINED", "LAST SIGN IN", "ACTIONS"]
        );
        assert_eq!(headers(false), vec!["USER", "STATUS", "ROLE", "JOINED", "ACTIONS"]);
    }

    #[test]
    fn test_initials() {
        let named = DirectoryRow::new(
            principal(
                "ada@example.com",
                UserMetadata {
                    name: Some("ada lovelace byron".into()),
                    ..Default::default()
                },
            ),
            &policy(),
        );
        assert_eq!(named.initials(), "AL");

        let unnamed = DirectoryRow::new(principal("zed@example.com", UserMetadata::default()), &policy());
        assert_eq!(unnamed.initials(), "Z");
        assert_eq!(unnamed.name(), "zed");
    }

    #[test]
    fn test_cells() {
        let mut p = principal(
            "ada@example.com",
            UserMetadata {
                name: Some("Ada".into()),
                banned: Some(true),
                ..Default::default()
            },
        );
        p.app_metadata = AppMetadata {
            provider: Some("GitHub".into()),
        };
        let row = DirectoryRow::new(p, &policy());

        assert_eq!(row.cell(Column::User), "Ada <ada@example.com>");
        assert_eq!(row.cell(Column::Status), "Banned");
        assert_eq!(row.cell(Column::Role), "User");
        assert_eq!(row.cell(Column::Provider), "GitHub");
        assert_eq!(row.cell(Column::Joined), "Mar 7, 2024, 09:15 AM");
        assert_eq!(row.cell(Column::LastSignIn), "Never");
        assert_eq!(row.cell(Column::Actions), "Make Admin | Unban | Delete");
    }

    #[test]
    fn test_designated_admin_row() {
        let row = DirectoryRow::new(
            principal(
                "ROOT@example.com",
                UserMetadata {
                    is_admin: Some(false),
                    role: Some("user".into()),
                    ..Default::default()
                },
            ),
            &policy(),
        );

        assert!(row.is_admin());
        assert_eq!(row.actions(), vec![Action::RemoveAdmin, Action::Ban, Action::Delete]);
    }

    #[test]
    fn test_apply_recomputes_admin() {
        let mut row = DirectoryRow::new(principal("ada@example.com", UserMetadata::default()), &policy());
        assert!(!row.is_admin());

        row.apply(&MetadataPatch::admin(true), &policy());
        assert!(row.is_admin());
        assert_eq!(row.principal().user_metadata.role(), "admin");

        row.apply(&MetadataPatch::admin(false), &policy());
        assert!(!row.is_admin());
        assert_eq!(row.principal().user_metadata.is_admin, Some(false));
        assert_eq!(row.principal().user_metadata.role(), "user");
    }
}
