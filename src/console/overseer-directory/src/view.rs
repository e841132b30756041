//! Directory view and admin mutations.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use overseer_auth::SessionSnapshot;
use overseer_identity::{AdminPolicy, MetadataPatch};
use overseer_provider::{AdminApi, ProviderError};

use crate::{DirectoryError, DirectoryRow, Notification};

/// Question asked before deleting a user.
pub const DELETE_PROMPT: &str =
    "Are you sure you want to delete this user? This action cannot be undone.";

/// Asks the user to confirm a destructive action.
pub trait Confirm: Send + Sync {
    /// Returns `true` to proceed.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirms everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Why a mutation was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another mutation for the same row is in flight.
    Busy,
    /// The user declined the confirmation.
    Cancelled,
    /// No row with that id is listed.
    UnknownRow,
}

/// Result of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The provider accepted the change and the row was reconciled.
    Applied,
    /// Nothing was sent to the provider.
    Skipped(SkipReason),
    /// The provider rejected the change; carries its message.
    Failed(String),
}

impl MutationOutcome {
    /// Returns `true` for [`MutationOutcome::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Marks a row as having a mutation in flight until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

/// Mutation applied to the rows.
#[derive(Debug, Clone)]
enum Change {
    Patched(String, MetadataPatch),
    Deleted(String),
}

/// Changes applied while a fetch is outstanding. A fetch replays the
/// changes recorded after it started onto its result.
#[derive(Debug, Default)]
struct Journal {
    fetches: usize,
    changes: Vec<Change>,
}

/// Counts an outstanding fetch until dropped.
struct FetchGuard<'a> {
    journal: &'a Mutex<Journal>,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        let mut journal = self.journal.lock();
        journal.fetches -= 1;
        if journal.fetches == 0 {
            journal.changes.clear();
        }
    }
}

/// Admin view over the provider's user directory.
pub struct DirectoryView {
    api: Arc<dyn AdminApi>,
    policy: AdminPolicy,
    rows: RwLock<Vec<DirectoryRow>>,
    in_flight: Mutex<HashSet<String>>,
    journal: Mutex<Journal>,
    notifications: Mutex<Vec<Notification>>,
}

impl DirectoryView {
    /// Opens the directory for the viewer described by `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::AccessDenied`] unless the viewer is an
    /// administrator.
    pub fn open(
        api: Arc<dyn AdminApi>,
        policy: AdminPolicy,
        snapshot: &SessionSnapshot,
    ) -> Result<Self, DirectoryError> {
        if !snapshot.is_admin {
            warn!(
                user_id = snapshot.principal().map(|p| p.id.as_str()).unwrap_or("-"),
                "Directory access denied"
            );
            return Err(DirectoryError::AccessDenied);
        }

        Ok(Self {
            api,
            policy,
            rows: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            journal: Mutex::new(Journal::default()),
            notifications: Mutex::new(Vec::new()),
        })
    }

    /// Fetches every principal, in provider order.
    ///
    /// Mutations applied while the fetch is running are replayed onto its
    /// result. On failure the rows are cleared and an error notification is
    /// recorded; the returned list is then empty.
    pub async fn list_users(&self) -> Vec<DirectoryRow> {
        let (_fetch, mark) = self.begin_fetch();

        match self.api.list_users().await {
            Ok(principals) => {
                let mut rows: Vec<DirectoryRow> = principals
                    .into_iter()
                    .map(|p| DirectoryRow::new(p, &self.policy))
                    .collect();

                let journal = self.journal.lock();
                let replayed = journal.changes.len() - mark;
                for change in &journal.changes[mark..] {
                    replay(&mut rows, change, &self.policy);
                }
                debug!(count = rows.len(), replayed, "Loaded users");
                *self.rows.write() = rows.clone();
                rows
            },
            Err(e) => {
                warn!(error = %e, "Failed to load users");
                self.rows.write().clear();
                self.notify(Notification::error(format!(
                    "Failed to load users: {}",
                    e.message()
                )));
                Vec::new()
            },
        }
    }

    /// Reloads the directory.
    pub async fn refresh(&self) -> Vec<DirectoryRow> {
        self.list_users().await
    }

    /// Bans or unbans user `id`.
    pub async fn ban_user(&self, id: &str, banned: bool) -> MutationOutcome {
        let (done, verb) = if banned {
            ("banned", "ban")
        } else {
            ("unbanned", "unban")
        };
        self.patch_row(
            id,
            MetadataPatch::ban(banned),
            format!("User {done} successfully"),
            format!("Failed to {verb} user"),
        )
        .await
    }

    /// Grants or revokes admin status of user `id`.
    pub async fn toggle_admin(&self, id: &str, make_admin: bool) -> MutationOutcome {
        let done = if make_admin {
            "promoted to admin"
        } else {
            "demoted from admin"
        };
        self.patch_row(
            id,
            MetadataPatch::admin(make_admin),
            format!("User {done} successfully"),
            "Failed to change admin status".to_string(),
        )
        .await
    }

    /// Deletes user `id` after confirmation.
    pub async fn delete_user(&self, id: &str, confirm: &dyn Confirm) -> MutationOutcome {
        let _guard = match self.begin(id) {
            Ok(guard) => guard,
            Err(reason) => return MutationOutcome::Skipped(reason),
        };

        if !confirm.confirm(DELETE_PROMPT) {
            debug!(user_id = %id, "Deletion cancelled");
            return MutationOutcome::Skipped(SkipReason::Cancelled);
        }

        match self.api.delete_user(id).await {
            Ok(()) => {
                self.record(Change::Deleted(id.to_string()));
                info!(user_id = %id, "User deleted");
                self.notify(Notification::success("User deleted successfully"));
                MutationOutcome::Applied
            },
            Err(e) => self.failed(id, "Failed to delete user", &e),
        }
    }

    async fn patch_row(
        &self,
        id: &str,
        patch: MetadataPatch,
        success: String,
        failure: String,
    ) -> MutationOutcome {
        let _guard = match self.begin(id) {
            Ok(guard) => guard,
            Err(reason) => return MutationOutcome::Skipped(reason),
        };

        match self.api.update_user(id, &patch).await {
            Ok(()) => {
                self.record(Change::Patched(id.to_string(), patch.clone()));
                info!(user_id = %id, ?patch, "User updated");
                self.notify(Notification::success(success));
                MutationOutcome::Applied
            },
            Err(e) => self.failed(id, &failure, &e),
        }
    }

    /// Applies `change` to the rows and journals it for outstanding fetches.
    fn record(&self, change: Change) {
        let mut journal = self.journal.lock();
        replay(&mut self.rows.write(), &change, &self.policy);
        if journal.fetches > 0 {
            journal.changes.push(change);
        }
    }

    /// Registers a fetch; returns its guard and its position in the journal.
    fn begin_fetch(&self) -> (FetchGuard<'_>, usize) {
        let mut journal = self.journal.lock();
        journal.fetches += 1;
        let mark = journal.changes.len();
        (
            FetchGuard {
                journal: &self.journal,
            },
            mark,
        )
    }

    /// Claims row `id` for a mutation.
    fn begin(&self, id: &str) -> Result<InFlightGuard<'_>, SkipReason> {
        if !self.rows.read().iter().any(|row| row.id() == id) {
            return Err(SkipReason::UnknownRow);
        }
        if !self.in_flight.lock().insert(id.to_string()) {
            debug!(user_id = %id, "Mutation already in flight");
            return Err(SkipReason::Busy);
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            id: id.to_string(),
        })
    }

    fn failed(&self, id: &str, context: &str, error: &ProviderError) -> MutationOutcome {
        warn!(user_id = %id, error = %error, "{context}");
        let message = error.message();
        self.notify(Notification::error(format!("{context}: {message}")));
        MutationOutcome::Failed(message)
    }

    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    /// Current rows.
    pub fn rows(&self) -> Vec<DirectoryRow> {
        self.rows.read().clone()
    }

    /// Row `id`, if listed.
    pub fn row(&self, id: &str) -> Option<DirectoryRow> {
        self.rows.read().iter().find(|row| row.id() == id).cloned()
    }

    /// Returns `true` while a mutation for row `id` is in flight.
    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.lock().contains(id)
    }

    /// Notifications recorded so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Removes and returns the recorded notifications.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    /// Admin policy rows are resolved against.
    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }
}

fn replay(rows: &mut Vec<DirectoryRow>, change: &Change, policy: &AdminPolicy) {
    match change {
        Change::Patched(id, patch) => {
            if let Some(row) = rows.iter_mut().find(|row| row.id() == id) {
                row.apply(patch, policy);
            }
        },
        Change::Deleted(id) => rows.retain(|row| row.id() != id),
    }
}
