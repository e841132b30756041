//! # Overseer Directory
//!
//! Admin view over the identity provider's user directory.
//!
//! [`DirectoryView`] keeps a reconciled cache of [`DirectoryRow`]s: the
//! provider stays authoritative and every successful mutation is merged
//! into the one row it touched. Mutations are serialized per row.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod notification;
pub mod row;
pub mod view;

pub use error::DirectoryError;
pub use notification::{Level, Notification};
pub use row::{Action, Column, DirectoryRow};
pub use view::{
    AlwaysConfirm, Confirm, DirectoryView, MutationOutcome, NeverConfirm, SkipReason, DELETE_PROMPT,
};
